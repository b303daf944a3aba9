// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TikTok Business Messaging webhook payload normalization.
//!
//! The envelope carries the app's client key plus an event list mixing
//! inbound messages and delivery statuses. Events are deserialized from
//! raw JSON values so one malformed event never sinks its siblings.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use inlet_core::channel::NormalizedBatch;
use inlet_core::{
    ChannelKind, DeliveryState, DeliveryStatus, InboundMessage, InletError, MessageKind,
};

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub client_key: String,
    // Raw values: one bad event must not fail the whole batch.
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Event {
    event: String,
    data: Option<EventData>,
}

#[derive(Debug, Deserialize)]
struct EventData {
    message_id: Option<String>,
    from_open_id: Option<String>,
    to_open_id: Option<String>,
    message_type: Option<String>,
    content: Option<String>,
    media_url: Option<String>,
    create_time: Option<i64>,
    status: Option<String>,
    error_message: Option<String>,
}

/// Response body of a Business API send call.
#[derive(Debug, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub code: i64,
    pub message: Option<String>,
    pub data: Option<SendData>,
}

#[derive(Debug, Deserialize)]
pub struct SendData {
    pub message_id: Option<String>,
}

/// Response body of a Business API user lookup.
#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
pub struct UserData {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserResponse {
    pub fn into_profile(self) -> inlet_core::SenderProfile {
        let data = self.data.unwrap_or(UserData {
            display_name: None,
            avatar_url: None,
        });
        inlet_core::SenderProfile {
            display_name: data.display_name,
            avatar_url: data.avatar_url,
            phone: None,
            email: None,
        }
    }
}

/// Normalize one webhook body into canonical messages and statuses.
pub fn normalize(body: &[u8]) -> Result<NormalizedBatch, InletError> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| InletError::Payload {
        channel: ChannelKind::Tiktok,
        message: e.to_string(),
    })?;

    let mut batch = NormalizedBatch::default();
    for raw in envelope.events {
        let event = match serde_json::from_value::<Event>(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "skipping malformed tiktok event");
                continue;
            }
        };
        match event.event.as_str() {
            "message.receive" => {
                if let Some(msg) = event.data.and_then(|d| convert_message(d, &envelope.client_key))
                {
                    batch.messages.push(msg);
                }
            }
            "message.status" => {
                if let Some(status) =
                    event.data.and_then(|d| convert_status(d, &envelope.client_key))
                {
                    batch.statuses.push(status);
                }
            }
            other => {
                debug!(event = other, "ignoring unhandled tiktok event type");
            }
        }
    }
    Ok(batch)
}

fn convert_message(data: EventData, client_key: &str) -> Option<InboundMessage> {
    let message_id = data.message_id?;
    let from = data.from_open_id?;

    let kind = match data.message_type.as_deref() {
        Some("text") | None => MessageKind::Text,
        Some("image") => MessageKind::Image,
        Some("video") => MessageKind::Video,
        Some(other) => {
            debug!(kind = other, "storing unrecognized tiktok message type as unsupported");
            MessageKind::Unsupported
        }
    };

    if kind == MessageKind::Text && data.content.as_deref().unwrap_or_default().is_empty() {
        debug!(provider_message_id = %message_id, "dropping contentless tiktok message");
        return None;
    }

    Some(InboundMessage {
        channel: ChannelKind::Tiktok,
        endpoint_id: client_key.to_string(),
        sender_external_id: from,
        provider_message_id: message_id,
        timestamp: parse_epoch_secs(data.create_time),
        kind,
        text: data.content,
        media_url: data.media_url,
        media_type: None,
        reply_to_provider_id: None,
        sender_name: None,
        sender_phone: None,
        sender_email: None,
        metadata: None,
    })
}

fn convert_status(data: EventData, client_key: &str) -> Option<DeliveryStatus> {
    let message_id = data.message_id?;
    let state = match data.status.as_deref() {
        Some("sent") => DeliveryState::Sent,
        Some("delivered") => DeliveryState::Delivered,
        Some("read") => DeliveryState::Read,
        Some("failed") => DeliveryState::Failed,
        other => {
            debug!(status = ?other, "ignoring unknown tiktok status");
            return None;
        }
    };
    Some(DeliveryStatus {
        channel: ChannelKind::Tiktok,
        endpoint_id: client_key.to_string(),
        provider_message_id: message_id,
        state,
        recipient_external_id: data.to_open_id,
        error: data.error_message,
        timestamp: parse_epoch_secs(data.create_time),
    })
}

fn parse_epoch_secs(raw: Option<i64>) -> DateTime<Utc> {
    raw.and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}
