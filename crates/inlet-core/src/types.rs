// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical, provider-agnostic domain types.
//!
//! Every channel crate normalizes its wire format into these types; the
//! ingestion pipeline and storage layer never see provider JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Messaging providers Inlet ingests from.
///
/// Instagram and Facebook are distinct channels even though both ride the
/// Meta Graph API -- a lead can hold one identity on each.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Whatsapp,
    Instagram,
    Facebook,
    Tiktok,
}

/// The kind of content carried by an inbound message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Location,
    Postback,
    QuickReply,
    Reaction,
    StoryReply,
    StoryMention,
    Unsupported,
}

/// Who authored a stored message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Lead,
    Ai,
    Staff,
    System,
}

/// Conversation lifecycle states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Pending,
    WaitingResponse,
    Escalated,
    Resolved,
    Archived,
}

impl ConversationStatus {
    /// The "open" set: at most one conversation per (tenant, lead,
    /// channel) may be in one of these states at a time.
    pub fn is_open(self) -> bool {
        matches!(self, ConversationStatus::Active | ConversationStatus::Pending)
    }

    /// Terminal states. A new inbound message reopens the conversation
    /// instead of spawning a duplicate thread.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConversationStatus::Resolved | ConversationStatus::Archived
        )
    }
}

/// Delivery states reported by provider status callbacks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Sent,
    Delivered,
    Read,
    Failed,
}

/// Downstream job kinds created by the dispatcher.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    AiResponse,
    SendMessage,
}

/// A single inbound message, normalized from any provider's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: ChannelKind,
    /// Provider-scoped endpoint the event arrived on (WhatsApp
    /// phone-number-id, Meta page id, TikTok client key). Used to pick
    /// the channel connection within the tenant.
    pub endpoint_id: String,
    /// Sender's external identity on this channel (phone, PSID, open-id).
    pub sender_external_id: String,
    /// The provider's message id -- the idempotency key.
    pub provider_message_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    /// Provider message id this message replies to, if any.
    pub reply_to_provider_id: Option<String>,
    /// Display name supplied in the webhook itself (WhatsApp contacts
    /// block). Saves a profile fetch when present.
    pub sender_name: Option<String>,
    /// Phone/email when the provider ever supplies one -- feeds the
    /// best-effort cross-channel identity link.
    pub sender_phone: Option<String>,
    pub sender_email: Option<String>,
    /// Channel-specific leftovers worth keeping (postback payloads,
    /// story URLs, location coordinates).
    pub metadata: Option<serde_json::Value>,
}

/// A delivery-status callback for a previously sent outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub channel: ChannelKind,
    pub endpoint_id: String,
    /// Provider message id of the outbound message this status refers to.
    pub provider_message_id: String,
    pub state: DeliveryState,
    pub recipient_external_id: Option<String>,
    /// Provider error description when `state` is `Failed`.
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Read-only snapshot of one tenant channel connection, fetched per
/// webhook event. Never mutated by the ingestion path.
#[derive(Debug, Clone)]
pub struct ChannelContext {
    pub tenant_id: String,
    pub tenant_slug: String,
    pub branch_id: Option<String>,
    pub channel: ChannelKind,
    pub connection_id: String,
    pub endpoint_id: String,
    pub access_token: String,
    pub app_secret: String,
    pub webhook_verify_token: Option<String>,
    pub ai_enabled: bool,
    pub ai_personality: Option<String>,
    pub custom_instructions: Option<String>,
    pub first_message_delay_secs: i64,
    pub subsequent_message_delay_secs: i64,
}

/// Best-effort sender profile from a provider lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SenderProfile {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn channel_kind_round_trips() {
        for kind in [
            ChannelKind::Whatsapp,
            ChannelKind::Instagram,
            ChannelKind::Facebook,
            ChannelKind::Tiktok,
        ] {
            let s = kind.to_string();
            assert_eq!(ChannelKind::from_str(&s).unwrap(), kind);
        }
        assert_eq!(ChannelKind::Whatsapp.to_string(), "whatsapp");
        assert!(ChannelKind::from_str("telegram").is_err());
    }

    #[test]
    fn message_kind_serializes_snake_case() {
        let json = serde_json::to_string(&MessageKind::QuickReply).unwrap();
        assert_eq!(json, "\"quick_reply\"");
        assert_eq!(MessageKind::StoryMention.to_string(), "story_mention");
    }

    #[test]
    fn conversation_status_sets() {
        assert!(ConversationStatus::Active.is_open());
        assert!(ConversationStatus::Pending.is_open());
        assert!(!ConversationStatus::WaitingResponse.is_open());
        assert!(!ConversationStatus::Escalated.is_open());

        assert!(ConversationStatus::Resolved.is_terminal());
        assert!(ConversationStatus::Archived.is_terminal());
        assert!(!ConversationStatus::Escalated.is_terminal());
        assert!(!ConversationStatus::Active.is_terminal());
    }

    #[test]
    fn job_type_matches_queue_rows() {
        assert_eq!(JobType::AiResponse.to_string(), "ai_response");
        assert_eq!(JobType::SendMessage.to_string(), "send_message");
        assert_eq!(JobType::from_str("ai_response").unwrap(), JobType::AiResponse);
    }
}
