// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed provider payload fixtures.
//!
//! Builders for realistic webhook bodies in each provider's wire format,
//! plus the header values that make them pass signature verification.

use serde_json::json;

use inlet_core::signature::hmac_sha256_hex;

/// A WhatsApp Cloud API text-message webhook body.
pub fn whatsapp_text(endpoint_id: &str, from: &str, mid: &str, text: &str, name: &str) -> Vec<u8> {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "waba-1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550001111",
                        "phone_number_id": endpoint_id,
                    },
                    "contacts": [{ "profile": { "name": name }, "wa_id": from }],
                    "messages": [{
                        "from": from,
                        "id": mid,
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": { "body": text },
                    }],
                },
            }],
        }],
    })
    .to_string()
    .into_bytes()
}

/// A WhatsApp status-callback webhook body.
pub fn whatsapp_status(endpoint_id: &str, mid: &str, status: &str) -> Vec<u8> {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "waba-1",
            "changes": [{
                "field": "messages",
                "value": {
                    "metadata": { "phone_number_id": endpoint_id },
                    "statuses": [{
                        "id": mid,
                        "status": status,
                        "timestamp": "1700000050",
                        "recipient_id": "5215551234567",
                    }],
                },
            }],
        }],
    })
    .to_string()
    .into_bytes()
}

/// A Meta (Instagram/Facebook) text-message webhook body.
pub fn meta_text(object: &str, page_id: &str, psid: &str, mid: &str, text: &str) -> Vec<u8> {
    json!({
        "object": object,
        "entry": [{
            "id": page_id,
            "time": 1700000000000i64,
            "messaging": [{
                "sender": { "id": psid },
                "recipient": { "id": page_id },
                "timestamp": 1700000000000i64,
                "message": { "mid": mid, "text": text },
            }],
        }],
    })
    .to_string()
    .into_bytes()
}

/// A TikTok text-message webhook body.
pub fn tiktok_text(client_key: &str, open_id: &str, mid: &str, text: &str) -> Vec<u8> {
    json!({
        "client_key": client_key,
        "events": [{
            "event": "message.receive",
            "event_id": "evt-1",
            "data": {
                "message_id": mid,
                "from_open_id": open_id,
                "message_type": "text",
                "content": text,
                "create_time": 1700000000,
            },
        }],
    })
    .to_string()
    .into_bytes()
}

/// The `X-Hub-Signature-256` header value for a Meta-style body.
pub fn meta_signature(secret: &str, body: &[u8]) -> String {
    format!("sha256={}", hmac_sha256_hex(secret, body))
}

/// The `TikTok-Signature` header value (`t=...,s=...`) for a body.
pub fn tiktok_signature(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut message = timestamp.to_string().into_bytes();
    message.push(b'.');
    message.extend_from_slice(body);
    format!("t={timestamp},s={}", hmac_sha256_hex(secret, &message))
}
