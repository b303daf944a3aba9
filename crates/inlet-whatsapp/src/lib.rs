// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API channel adapter for Inlet.
//!
//! Implements [`ChannelAdapter`] for the WhatsApp Business Cloud API:
//! `X-Hub-Signature-256` webhook verification, payload normalization,
//! and text sends through the Graph API with truncation and a bounded
//! timeout.

pub mod payload;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use inlet_core::channel::{ChannelAdapter, NormalizedBatch, WebhookHeaders};
use inlet_core::signature::verify_hmac_sha256_hex;
use inlet_core::text::truncate_with_marker;
use inlet_core::{ChannelContext, ChannelKind, InletError, SenderProfile};

/// WhatsApp caps text messages at 4096 characters.
pub const WHATSAPP_MAX_TEXT: usize = 4096;

/// Graph API error code for sends outside the 24-hour customer window.
const ERROR_CODE_REENGAGEMENT: i64 = 131_047;

/// WhatsApp adapter configuration.
///
/// Mirrors the `providers` section of the Inlet config to avoid a
/// dependency on the config crate from a channel crate.
#[derive(Debug, Clone)]
pub struct WhatsappConfig {
    /// Graph API base, e.g. `https://graph.facebook.com/v19.0`.
    pub api_base: String,
    /// Hard deadline for send calls.
    pub send_timeout: Duration,
}

impl Default for WhatsappConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com/v19.0".to_string(),
            send_timeout: Duration::from_secs(30),
        }
    }
}

/// WhatsApp Cloud API channel adapter implementing [`ChannelAdapter`].
pub struct WhatsappChannel {
    http: reqwest::Client,
    config: WhatsappConfig,
}

impl WhatsappChannel {
    /// Creates a new WhatsApp channel adapter.
    pub fn new(config: WhatsappConfig) -> Result<Self, InletError> {
        let http = reqwest::Client::builder()
            .timeout(config.send_timeout)
            .build()
            .map_err(|e| InletError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn map_send_error(&self, e: reqwest::Error) -> InletError {
        if e.is_timeout() {
            InletError::ProviderTimeout {
                duration: self.config.send_timeout,
            }
        } else {
            InletError::ProviderApi {
                channel: ChannelKind::Whatsapp,
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ChannelAdapter for WhatsappChannel {
    fn channel(&self) -> ChannelKind {
        ChannelKind::Whatsapp
    }

    fn max_text_length(&self) -> usize {
        WHATSAPP_MAX_TEXT
    }

    fn verify_signature(&self, body: &[u8], headers: &WebhookHeaders, secret: &str) -> bool {
        let Some(signature) = headers.signature.as_deref() else {
            return false;
        };
        let Some(hex_sig) = signature.strip_prefix("sha256=") else {
            return false;
        };
        verify_hmac_sha256_hex(secret, hex_sig, body)
    }

    fn normalize(&self, body: &[u8]) -> Result<NormalizedBatch, InletError> {
        payload::normalize(body)
    }

    async fn send_text(
        &self,
        ctx: &ChannelContext,
        recipient_id: &str,
        text: &str,
    ) -> Result<String, InletError> {
        let text = truncate_with_marker(text, WHATSAPP_MAX_TEXT);
        let url = format!(
            "{}/{}/messages",
            self.config.api_base, ctx.endpoint_id
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&ctx.access_token)
            .json(&serde_json::json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": recipient_id,
                "type": "text",
                "text": { "body": text },
            }))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status.is_success() {
            let body: payload::SendResponse = response
                .json()
                .await
                .map_err(|e| self.map_send_error(e))?;
            let id = body
                .messages
                .into_iter()
                .next()
                .map(|m| m.id)
                .ok_or_else(|| InletError::ProviderApi {
                    channel: ChannelKind::Whatsapp,
                    status: status.as_u16(),
                    message: "send response carried no message id".into(),
                })?;
            debug!(provider_message_id = %id, "whatsapp message sent");
            return Ok(id);
        }

        let error_body = response.text().await.unwrap_or_default();
        let code = payload::graph_error_code(&error_body);
        if status.as_u16() == 429 {
            return Err(InletError::ProviderRateLimited {
                channel: ChannelKind::Whatsapp,
                reason: error_body,
            });
        }
        if code == Some(ERROR_CODE_REENGAGEMENT) {
            return Err(InletError::MessagingWindowClosed {
                channel: ChannelKind::Whatsapp,
            });
        }
        Err(InletError::ProviderApi {
            channel: ChannelKind::Whatsapp,
            status: status.as_u16(),
            message: error_body,
        })
    }

    async fn fetch_profile(
        &self,
        _ctx: &ChannelContext,
        _external_id: &str,
    ) -> Result<SenderProfile, InletError> {
        // The Cloud API has no profile lookup by phone number; the display
        // name rides in the webhook's contacts block instead.
        Ok(SenderProfile::default())
    }
}
