// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meta Graph API channel adapter for Inlet.
//!
//! Covers both Instagram Messaging and Facebook Messenger -- the two
//! share the webhook shape, the `X-Hub-Signature-256` signing scheme,
//! and the Send API; one adapter instance is constructed per channel
//! kind.

pub mod payload;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use inlet_core::channel::{ChannelAdapter, NormalizedBatch, WebhookHeaders};
use inlet_core::signature::verify_hmac_sha256_hex;
use inlet_core::text::truncate_with_marker;
use inlet_core::{ChannelContext, ChannelKind, InletError, SenderProfile};

/// The Send API caps text messages at 2000 characters.
pub const META_MAX_TEXT: usize = 2000;

/// Graph API error subcode for sends outside the messaging window.
const SUBCODE_OUTSIDE_WINDOW: i64 = 2_018_278;

/// Meta adapter configuration.
///
/// Mirrors the `providers` section of the Inlet config to avoid a
/// dependency on the config crate from a channel crate.
#[derive(Debug, Clone)]
pub struct MetaConfig {
    /// Graph API base, e.g. `https://graph.facebook.com/v19.0`.
    pub api_base: String,
    /// Hard deadline for send calls.
    pub send_timeout: Duration,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com/v19.0".to_string(),
            send_timeout: Duration::from_secs(30),
        }
    }
}

/// Graph API channel adapter implementing [`ChannelAdapter`] for one of
/// the two Meta channels.
pub struct MetaChannel {
    channel: ChannelKind,
    http: reqwest::Client,
    config: MetaConfig,
}

impl MetaChannel {
    /// Creates a new Meta channel adapter for `channel`.
    ///
    /// `channel` must be [`ChannelKind::Instagram`] or
    /// [`ChannelKind::Facebook`].
    pub fn new(channel: ChannelKind, config: MetaConfig) -> Result<Self, InletError> {
        if !matches!(channel, ChannelKind::Instagram | ChannelKind::Facebook) {
            return Err(InletError::Config(format!(
                "MetaChannel cannot speak for {channel}"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(config.send_timeout)
            .build()
            .map_err(|e| InletError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            channel,
            http,
            config,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> InletError {
        if e.is_timeout() {
            InletError::ProviderTimeout {
                duration: self.config.send_timeout,
            }
        } else {
            InletError::ProviderApi {
                channel: self.channel,
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ChannelAdapter for MetaChannel {
    fn channel(&self) -> ChannelKind {
        self.channel
    }

    fn max_text_length(&self) -> usize {
        META_MAX_TEXT
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
        payload::normalize(body, self.channel)
    }

    async fn send_text(
        &self,
        ctx: &ChannelContext,
        recipient_id: &str,
        text: &str,
    ) -> Result<String, InletError> {
        let text = truncate_with_marker(text, META_MAX_TEXT);
        let url = format!("{}/me/messages", self.config.api_base);

        let response = self
            .http
            .post(&url)
            .query(&[("access_token", ctx.access_token.as_str())])
            .json(&serde_json::json!({
                "recipient": { "id": recipient_id },
                "messaging_type": "RESPONSE",
                "message": { "text": text },
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
            let id = body.message_id.ok_or_else(|| InletError::ProviderApi {
                channel: self.channel,
                status: status.as_u16(),
                message: "send response carried no message id".into(),
            })?;
            debug!(provider_message_id = %id, channel = %self.channel, "meta message sent");
            return Ok(id);
        }

        let error_body = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 {
            return Err(InletError::ProviderRateLimited {
                channel: self.channel,
                reason: error_body,
            });
        }
        if payload::graph_error_subcode(&error_body) == Some(SUBCODE_OUTSIDE_WINDOW) {
            return Err(InletError::MessagingWindowClosed {
                channel: self.channel,
            });
        }
        Err(InletError::ProviderApi {
            channel: self.channel,
            status: status.as_u16(),
            message: error_body,
        })
    }

    async fn fetch_profile(
        &self,
        ctx: &ChannelContext,
        external_id: &str,
    ) -> Result<SenderProfile, InletError> {
        let fields = match self.channel {
            ChannelKind::Instagram => "name,username,profile_pic",
            _ => "first_name,last_name,profile_pic",
        };
        let url = format!("{}/{}", self.config.api_base, external_id);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("fields", fields),
                ("access_token", ctx.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(InletError::ProviderApi {
                channel: self.channel,
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: payload::ProfileResponse = response
            .json()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Ok(body.into_profile())
    }
}
