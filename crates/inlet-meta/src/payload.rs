// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meta messaging webhook payload normalization.
//!
//! Instagram and Facebook Messenger deliver the same envelope: entries
//! keyed by page id, each with a `messaging` array mixing messages,
//! postbacks, reactions, and delivery receipts. Events are deserialized
//! from raw JSON values so one malformed event never sinks its siblings.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use inlet_core::channel::NormalizedBatch;
use inlet_core::{
    ChannelKind, DeliveryState, DeliveryStatus, InboundMessage, InletError, MessageKind,
};

#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    /// The page (or Instagram business account) id the event targets.
    pub id: String,
    // Raw values: one bad event must not fail the whole batch.
    #[serde(default)]
    pub messaging: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MessagingEvent {
    sender: Party,
    #[serde(default)]
    timestamp: Option<i64>,
    message: Option<MessageBody>,
    postback: Option<Postback>,
    reaction: Option<Reaction>,
    delivery: Option<Delivery>,
    read: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Party {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    mid: Option<String>,
    text: Option<String>,
    #[serde(default)]
    is_echo: bool,
    #[serde(default)]
    is_deleted: bool,
    #[serde(default)]
    attachments: Vec<Attachment>,
    quick_reply: Option<QuickReply>,
    reply_to: Option<ReplyTo>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    #[serde(rename = "type")]
    kind: Option<String>,
    payload: Option<AttachmentPayload>,
}

#[derive(Debug, Deserialize)]
struct AttachmentPayload {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuickReply {
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyTo {
    mid: Option<String>,
    story: Option<Story>,
}

#[derive(Debug, Deserialize)]
struct Story {
    url: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Postback {
    mid: Option<String>,
    title: Option<String>,
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Reaction {
    mid: Option<String>,
    action: Option<String>,
    emoji: Option<String>,
    reaction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delivery {
    #[serde(default)]
    mids: Vec<String>,
}

/// Response body of a successful Send API call.
#[derive(Debug, Deserialize)]
pub struct SendResponse {
    pub message_id: Option<String>,
}

/// Graph API user profile response.
#[derive(Debug, Deserialize)]
pub struct ProfileResponse {
    pub name: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_pic: Option<String>,
}

impl ProfileResponse {
    pub fn into_profile(self) -> inlet_core::SenderProfile {
        let display_name = self
            .name
            .or_else(|| match (&self.first_name, &self.last_name) {
                (Some(first), Some(last)) => Some(format!("{first} {last}")),
                (Some(first), None) => Some(first.clone()),
                _ => None,
            })
            .or(self.username);
        inlet_core::SenderProfile {
            display_name,
            avatar_url: self.profile_pic,
            phone: None,
            email: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    error_subcode: Option<i64>,
}

/// Extract the Graph API error subcode from an error response body.
pub fn graph_error_subcode(body: &str) -> Option<i64> {
    serde_json::from_str::<GraphErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.error_subcode)
}

/// Normalize one webhook body into canonical messages and statuses.
pub fn normalize(body: &[u8], channel: ChannelKind) -> Result<NormalizedBatch, InletError> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| InletError::Payload {
        channel,
        message: e.to_string(),
    })?;

    let mut batch = NormalizedBatch::default();
    for entry in envelope.entry {
        let endpoint_id = entry.id;
        for raw in entry.messaging {
            match serde_json::from_value::<MessagingEvent>(raw) {
                Ok(event) => convert_event(event, &endpoint_id, channel, &mut batch),
                Err(e) => {
                    warn!(error = %e, channel = %channel, "skipping malformed messaging event");
                }
            }
        }
    }
    Ok(batch)
}

fn convert_event(
    event: MessagingEvent,
    endpoint_id: &str,
    channel: ChannelKind,
    batch: &mut NormalizedBatch,
) {
    let timestamp = parse_epoch_millis(event.timestamp);
    let sender_id = event.sender.id;

    if let Some(delivery) = event.delivery {
        for mid in delivery.mids {
            batch.statuses.push(DeliveryStatus {
                channel,
                endpoint_id: endpoint_id.to_string(),
                provider_message_id: mid,
                state: DeliveryState::Delivered,
                recipient_external_id: Some(sender_id.clone()),
                error: None,
                timestamp,
            });
        }
        return;
    }
    if event.read.is_some() {
        // Read receipts carry only a watermark, not message ids.
        debug!(channel = %channel, "dropping watermark-only read receipt");
        return;
    }

    if let Some(postback) = event.postback {
        let Some(mid) = postback.mid else {
            debug!(channel = %channel, "dropping postback without mid");
            return;
        };
        batch.messages.push(InboundMessage {
            channel,
            endpoint_id: endpoint_id.to_string(),
            sender_external_id: sender_id,
            provider_message_id: mid,
            timestamp,
            kind: MessageKind::Postback,
            text: postback.title,
            media_url: None,
            media_type: None,
            reply_to_provider_id: None,
            sender_name: None,
            sender_phone: None,
            sender_email: None,
            metadata: postback
                .payload
                .map(|p| serde_json::json!({ "payload": p })),
        });
        return;
    }

    if let Some(reaction) = event.reaction {
        if reaction.action.as_deref() == Some("unreact") {
            return;
        }
        let Some(text) = reaction.emoji.or(reaction.reaction) else {
            return;
        };
        let Some(mid) = reaction.mid else {
            return;
        };
        batch.messages.push(InboundMessage {
            channel,
            endpoint_id: endpoint_id.to_string(),
            sender_external_id: sender_id.clone(),
            // Reactions have no mid of their own; derive a stable one so
            // provider retries still deduplicate.
            provider_message_id: format!("react:{mid}:{sender_id}"),
            timestamp,
            kind: MessageKind::Reaction,
            text: Some(text),
            media_url: None,
            media_type: None,
            reply_to_provider_id: Some(mid),
            sender_name: None,
            sender_phone: None,
            sender_email: None,
            metadata: None,
        });
        return;
    }

    let Some(message) = event.message else {
        debug!(channel = %channel, "dropping messaging event with no payload");
        return;
    };
    if message.is_echo {
        // Echo of our own outbound message.
        return;
    }
    if message.is_deleted {
        return;
    }
    let Some(mid) = message.mid.clone() else {
        debug!(channel = %channel, "dropping message without mid");
        return;
    };

    let (kind, media_url, media_type, story_meta) = classify_attachments(&message);

    // Quick replies override: the tapped button's label rides in `text`.
    let (kind, metadata) = if let Some(quick_reply) = message.quick_reply {
        (
            MessageKind::QuickReply,
            quick_reply
                .payload
                .map(|p| serde_json::json!({ "payload": p })),
        )
    } else {
        (kind, story_meta)
    };

    if message.text.is_none() && media_url.is_none() && kind == MessageKind::Text {
        // No content worth storing at all.
        debug!(channel = %channel, "dropping contentless message");
        return;
    }

    batch.messages.push(InboundMessage {
        channel,
        endpoint_id: endpoint_id.to_string(),
        sender_external_id: sender_id,
        provider_message_id: mid,
        timestamp,
        kind,
        text: message.text,
        media_url,
        media_type,
        reply_to_provider_id: message.reply_to.and_then(|r| r.mid),
        sender_name: None,
        sender_phone: None,
        sender_email: None,
        metadata,
    });
}

type AttachmentInfo = (
    MessageKind,
    Option<String>,
    Option<String>,
    Option<serde_json::Value>,
);

/// Derive kind/media from the message's attachments and story pointer.
fn classify_attachments(message: &MessageBody) -> AttachmentInfo {
    if let Some(story) = message.reply_to.as_ref().and_then(|r| r.story.as_ref()) {
        let metadata = serde_json::json!({
            "story_id": story.id,
            "story_url": story.url,
        });
        return (MessageKind::StoryReply, story.url.clone(), None, Some(metadata));
    }

    let Some(attachment) = message.attachments.first() else {
        return (MessageKind::Text, None, None, None);
    };
    let url = attachment.payload.as_ref().and_then(|p| p.url.clone());
    let kind = match attachment.kind.as_deref() {
        Some("image") => MessageKind::Image,
        Some("video") => MessageKind::Video,
        Some("audio") => MessageKind::Audio,
        Some("file") => MessageKind::Document,
        Some("story_mention") => MessageKind::StoryMention,
        Some("location") => MessageKind::Location,
        _ => MessageKind::Unsupported,
    };
    (kind, url, None, None)
}

/// Meta timestamps are epoch milliseconds.
fn parse_epoch_millis(raw: Option<i64>) -> DateTime<Utc> {
    raw.and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}
