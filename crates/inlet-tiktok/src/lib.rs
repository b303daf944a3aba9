// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TikTok Business Messaging channel adapter for Inlet.
//!
//! TikTok signs webhooks with HMAC-SHA256 over `"{timestamp}.{body}"`,
//! delivered as a `t=...,s=...` header pair; stale timestamps are
//! rejected before any MAC work. Sends go through the Business API,
//! which reports errors as body-level codes even on HTTP 200 -- the
//! per-user daily cap and the 24-hour window expiry surface as distinct
//! error kinds.

pub mod payload;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use inlet_core::channel::{ChannelAdapter, NormalizedBatch, WebhookHeaders};
use inlet_core::signature::verify_hmac_sha256_hex;
use inlet_core::text::truncate_with_marker;
use inlet_core::{ChannelContext, ChannelKind, InletError, SenderProfile};

/// TikTok caps direct-message text at 1000 characters.
pub const TIKTOK_MAX_TEXT: usize = 1000;

/// Maximum accepted signature timestamp skew, in seconds.
const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;

/// Body-level error code for the 10-messages-per-user-per-day cap.
const ERROR_CODE_DAILY_LIMIT: i64 = 40_100;

/// Body-level error code for a closed 24-hour messaging window.
const ERROR_CODE_WINDOW_EXPIRED: i64 = 40_102;

/// TikTok adapter configuration.
///
/// Mirrors the `providers` section of the Inlet config to avoid a
/// dependency on the config crate from a channel crate.
#[derive(Debug, Clone)]
pub struct TiktokConfig {
    /// Business API base, e.g. `https://business-api.tiktok.com`.
    pub api_base: String,
    /// Hard deadline for send calls.
    pub send_timeout: Duration,
}

impl Default for TiktokConfig {
    fn default() -> Self {
        Self {
            api_base: "https://business-api.tiktok.com".to_string(),
            send_timeout: Duration::from_secs(30),
        }
    }
}

/// TikTok Business Messaging adapter implementing [`ChannelAdapter`].
pub struct TiktokChannel {
    http: reqwest::Client,
    config: TiktokConfig,
}

impl TiktokChannel {
    /// Creates a new TikTok channel adapter.
    pub fn new(config: TiktokConfig) -> Result<Self, InletError> {
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
                channel: ChannelKind::Tiktok,
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

/// Verify a TikTok signature with an explicit clock, for testability.
///
/// The signed string is `"{timestamp}.{body}"`; timestamps further than
/// [`MAX_TIMESTAMP_SKEW_SECS`] from `now_secs` are rejected outright.
pub fn verify_with_now(
    body: &[u8],
    headers: &WebhookHeaders,
    secret: &str,
    now_secs: i64,
) -> bool {
    let (Some(signature), Some(timestamp)) =
        (headers.signature.as_deref(), headers.timestamp.as_deref())
    else {
        return false;
    };
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now_secs - ts).abs() > MAX_TIMESTAMP_SKEW_SECS {
        return false;
    }

    let mut message = Vec::with_capacity(timestamp.len() + 1 + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'.');
    message.extend_from_slice(body);
    verify_hmac_sha256_hex(secret, signature, &message)
}

#[async_trait]
impl ChannelAdapter for TiktokChannel {
    fn channel(&self) -> ChannelKind {
        ChannelKind::Tiktok
    }

    fn max_text_length(&self) -> usize {
        TIKTOK_MAX_TEXT
    }

    fn verify_signature(&self, body: &[u8], headers: &WebhookHeaders, secret: &str) -> bool {
        verify_with_now(body, headers, secret, chrono::Utc::now().timestamp())
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
        let text = truncate_with_marker(text, TIKTOK_MAX_TEXT);
        let url = format!(
            "{}/open_api/v1.3/business/message/send/",
            self.config.api_base
        );

        let response = self
            .http
            .post(&url)
            .header("Access-Token", &ctx.access_token)
            .json(&serde_json::json!({
                "business_id": ctx.endpoint_id,
                "to_open_id": recipient_id,
                "message_type": "text",
                "content": { "text": text },
            }))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(InletError::ProviderRateLimited {
                channel: ChannelKind::Tiktok,
                reason: response.text().await.unwrap_or_default(),
            });
        }
        if !status.is_success() {
            return Err(InletError::ProviderApi {
                channel: ChannelKind::Tiktok,
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        // TikTok reports most failures as body-level codes on HTTP 200.
        let body: payload::SendResponse = response
            .json()
            .await
            .map_err(|e| self.map_send_error(e))?;
        match body.code {
            0 => {
                let id = body
                    .data
                    .and_then(|d| d.message_id)
                    .ok_or_else(|| InletError::ProviderApi {
                        channel: ChannelKind::Tiktok,
                        status: status.as_u16(),
                        message: "send response carried no message id".into(),
                    })?;
                debug!(provider_message_id = %id, "tiktok message sent");
                Ok(id)
            }
            ERROR_CODE_DAILY_LIMIT => Err(InletError::ProviderRateLimited {
                channel: ChannelKind::Tiktok,
                reason: body
                    .message
                    .unwrap_or_else(|| "per-user daily message cap reached".into()),
            }),
            ERROR_CODE_WINDOW_EXPIRED => Err(InletError::MessagingWindowClosed {
                channel: ChannelKind::Tiktok,
            }),
            code => Err(InletError::ProviderApi {
                channel: ChannelKind::Tiktok,
                status: status.as_u16(),
                message: format!("code {code}: {}", body.message.unwrap_or_default()),
            }),
        }
    }

    async fn fetch_profile(
        &self,
        ctx: &ChannelContext,
        external_id: &str,
    ) -> Result<SenderProfile, InletError> {
        let url = format!("{}/open_api/v1.3/business/user/get/", self.config.api_base);
        let response = self
            .http
            .get(&url)
            .header("Access-Token", &ctx.access_token)
            .query(&[("open_id", external_id)])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(InletError::ProviderApi {
                channel: ChannelKind::Tiktok,
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: payload::UserResponse = response
            .json()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Ok(body.into_profile())
    }
}
