// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Inlet ingestion service.

use std::time::Duration;

use thiserror::Error;

use crate::types::ChannelKind;

/// The primary error type used across all Inlet crates.
///
/// Duplicate events are deliberately *not* represented here -- re-delivery
/// of an already-processed message is a success-path outcome reported via
/// flags, never an error.
#[derive(Debug, Error)]
pub enum InletError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection, query failure, migration).
    ///
    /// The only class that is safe to surface as a non-2xx webhook
    /// response: the provider's own retry redelivers the batch and the
    /// idempotency keys absorb the replay.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Webhook signature missing or mismatched. Hard boundary: the payload
    /// gets no further processing of any kind.
    #[error("signature verification failed for {channel} webhook")]
    AuthenticationFailure { channel: ChannelKind },

    /// No active tenant with the given slug.
    #[error("tenant not found: {slug}")]
    TenantNotFound { slug: String },

    /// Tenant exists but has no connected channel matching the event.
    #[error("no connected {channel} channel for tenant {slug} (endpoint {endpoint_id})")]
    ChannelNotConnected {
        slug: String,
        channel: ChannelKind,
        endpoint_id: String,
    },

    /// The webhook body could not be parsed at all. Individual malformed
    /// events inside an otherwise valid batch are skipped, not errored.
    #[error("unparseable {channel} payload: {message}")]
    Payload {
        channel: ChannelKind,
        message: String,
    },

    /// An outbound provider call exceeded its deadline. The delivery
    /// outcome is ambiguous -- the caller must not blindly re-send.
    #[error("provider request timed out after {duration:?}")]
    ProviderTimeout { duration: Duration },

    /// The provider refused the send due to a rate limit (e.g. TikTok's
    /// per-user daily message cap).
    #[error("{channel} rate limited: {reason}")]
    ProviderRateLimited {
        channel: ChannelKind,
        reason: String,
    },

    /// The provider's customer-service messaging window has expired for
    /// this recipient.
    #[error("{channel} messaging window closed for recipient")]
    MessagingWindowClosed { channel: ChannelKind },

    /// Any other provider API failure.
    #[error("{channel} API error ({status}): {message}")]
    ProviderApi {
        channel: ChannelKind,
        status: u16,
        message: String,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl InletError {
    /// Whether retrying the whole webhook delivery is safe and useful.
    pub fn is_transient(&self) -> bool {
        matches!(self, InletError::Storage { .. })
    }
}
