// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API webhook payload normalization.
//!
//! One webhook POST can bundle several entries, each with several
//! messages and statuses. Individual events are deserialized from raw
//! JSON values so one malformed message never sinks its siblings.

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
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    // Raw values: one bad message must not fail the whole batch.
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct Metadata {
    pub phone_number_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Contact {
    pub wa_id: String,
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Deserialize)]
pub struct ContactProfile {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaMessage {
    from: String,
    id: String,
    timestamp: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<TextBody>,
    image: Option<MediaBody>,
    video: Option<MediaBody>,
    audio: Option<MediaBody>,
    sticker: Option<MediaBody>,
    document: Option<DocumentBody>,
    location: Option<LocationBody>,
    reaction: Option<ReactionBody>,
    button: Option<ButtonBody>,
    interactive: Option<InteractiveBody>,
    context: Option<ContextBody>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    body: String,
}

#[derive(Debug, Deserialize)]
struct MediaBody {
    id: Option<String>,
    mime_type: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentBody {
    id: Option<String>,
    mime_type: Option<String>,
    caption: Option<String>,
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocationBody {
    latitude: f64,
    longitude: f64,
    name: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReactionBody {
    message_id: Option<String>,
    emoji: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ButtonBody {
    text: Option<String>,
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InteractiveBody {
    button_reply: Option<InteractiveReply>,
    list_reply: Option<InteractiveReply>,
}

#[derive(Debug, Deserialize)]
struct InteractiveReply {
    id: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContextBody {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaStatus {
    id: String,
    status: String,
    recipient_id: Option<String>,
    timestamp: Option<String>,
    #[serde(default)]
    errors: Vec<WaStatusError>,
}

#[derive(Debug, Deserialize)]
struct WaStatusError {
    code: Option<i64>,
    title: Option<String>,
    message: Option<String>,
}

/// Response body of a successful Cloud API send.
#[derive(Debug, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    code: Option<i64>,
}

/// Extract the Graph API error code from an error response body.
pub fn graph_error_code(body: &str) -> Option<i64> {
    serde_json::from_str::<GraphErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.code)
}

/// Normalize one webhook body into canonical messages and statuses.
pub fn normalize(body: &[u8]) -> Result<NormalizedBatch, InletError> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| InletError::Payload {
        channel: ChannelKind::Whatsapp,
        message: e.to_string(),
    })?;

    let mut batch = NormalizedBatch::default();
    for entry in envelope.entry {
        for change in entry.changes {
            let value = change.value;
            let Some(endpoint_id) = value.metadata.as_ref().and_then(|m| m.phone_number_id.clone())
            else {
                // Non-message change (account updates etc.) -- nothing to ingest.
                continue;
            };

            for raw in value.messages {
                match serde_json::from_value::<WaMessage>(raw.clone()) {
                    Ok(msg) => {
                        if let Some(inbound) = convert_message(msg, &endpoint_id, &value.contacts) {
                            batch.messages.push(inbound);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "skipping malformed whatsapp message");
                    }
                }
            }

            for raw in value.statuses {
                match serde_json::from_value::<WaStatus>(raw) {
                    Ok(status) => {
                        if let Some(delivery) = convert_status(status, &endpoint_id) {
                            batch.statuses.push(delivery);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "skipping malformed whatsapp status");
                    }
                }
            }
        }
    }
    Ok(batch)
}

fn convert_message(
    msg: WaMessage,
    endpoint_id: &str,
    contacts: &[Contact],
) -> Option<InboundMessage> {
    let (kind, text, media_url, media_type, metadata) = extract_content(&msg)?;

    let sender_name = contacts
        .iter()
        .find(|c| c.wa_id == msg.from)
        .and_then(|c| c.profile.as_ref())
        .and_then(|p| p.name.clone());

    Some(InboundMessage {
        channel: ChannelKind::Whatsapp,
        endpoint_id: endpoint_id.to_string(),
        sender_external_id: msg.from.clone(),
        provider_message_id: msg.id,
        timestamp: parse_epoch_secs(msg.timestamp.as_deref()),
        kind,
        text,
        media_url,
        media_type,
        reply_to_provider_id: msg.context.and_then(|c| c.id),
        sender_name,
        // On WhatsApp the external id IS the phone number.
        sender_phone: Some(msg.from),
        sender_email: None,
        metadata,
    })
}

type Content = (
    MessageKind,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<serde_json::Value>,
);

/// Pick the richest content representation, or `None` to drop the event.
fn extract_content(msg: &WaMessage) -> Option<Content> {
    if let Some(text) = &msg.text {
        return Some((MessageKind::Text, Some(text.body.clone()), None, None, None));
    }

    for (kind, media) in [
        (MessageKind::Image, &msg.image),
        (MessageKind::Video, &msg.video),
        (MessageKind::Audio, &msg.audio),
        (MessageKind::Image, &msg.sticker),
    ] {
        if let Some(media) = media {
            // Caption beats a generic media label; the Cloud API hands out
            // opaque media ids, which ride in the media_url slot until the
            // media worker exchanges them for a download URL.
            return Some((
                kind,
                media.caption.clone(),
                media.id.clone(),
                media.mime_type.clone(),
                None,
            ));
        }
    }

    if let Some(doc) = &msg.document {
        let text = doc.caption.clone().or_else(|| doc.filename.clone());
        return Some((
            MessageKind::Document,
            text,
            doc.id.clone(),
            doc.mime_type.clone(),
            None,
        ));
    }

    if let Some(loc) = &msg.location {
        let text = loc.name.clone().or_else(|| loc.address.clone());
        let metadata = serde_json::json!({
            "latitude": loc.latitude,
            "longitude": loc.longitude,
        });
        return Some((MessageKind::Location, text, None, None, Some(metadata)));
    }

    if let Some(reaction) = &msg.reaction {
        // A removed reaction has no emoji -- nothing actionable.
        let emoji = reaction.emoji.clone()?;
        let metadata = reaction
            .message_id
            .clone()
            .map(|id| serde_json::json!({ "reacted_to": id }));
        return Some((MessageKind::Reaction, Some(emoji), None, None, metadata));
    }

    if let Some(button) = &msg.button {
        let metadata = button
            .payload
            .clone()
            .map(|p| serde_json::json!({ "payload": p }));
        return Some((MessageKind::QuickReply, button.text.clone(), None, None, metadata));
    }

    if let Some(interactive) = &msg.interactive {
        let reply = interactive
            .button_reply
            .as_ref()
            .or(interactive.list_reply.as_ref())?;
        let metadata = reply.id.clone().map(|id| serde_json::json!({ "payload": id }));
        return Some((MessageKind::QuickReply, reply.title.clone(), None, None, metadata));
    }

    match msg.kind.as_deref() {
        // "unsupported" arrives for message types the API cannot relay.
        Some("unsupported") | None => {
            debug!(provider_message_id = %msg.id, "dropping contentless whatsapp event");
            None
        }
        Some(other) => {
            debug!(kind = other, "storing unrecognized whatsapp message type as unsupported");
            Some((MessageKind::Unsupported, None, None, None, None))
        }
    }
}

fn convert_status(status: WaStatus, endpoint_id: &str) -> Option<DeliveryStatus> {
    let state = match status.status.as_str() {
        "sent" => DeliveryState::Sent,
        "delivered" => DeliveryState::Delivered,
        "read" => DeliveryState::Read,
        "failed" => DeliveryState::Failed,
        other => {
            debug!(status = other, "ignoring unknown whatsapp status");
            return None;
        }
    };
    let error = status.errors.first().map(|e| {
        let code = e.code.map(|c| c.to_string()).unwrap_or_default();
        let text = e
            .message
            .clone()
            .or_else(|| e.title.clone())
            .unwrap_or_default();
        format!("{code} {text}").trim().to_string()
    });
    Some(DeliveryStatus {
        channel: ChannelKind::Whatsapp,
        endpoint_id: endpoint_id.to_string(),
        provider_message_id: status.id,
        state,
        recipient_external_id: status.recipient_id,
        error,
        timestamp: parse_epoch_secs(status.timestamp.as_deref()),
    })
}

/// WhatsApp timestamps are epoch seconds as strings.
fn parse_epoch_secs(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}
