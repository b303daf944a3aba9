// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for messaging provider integrations.
//!
//! Each provider crate (WhatsApp, Meta, TikTok) implements this trait;
//! the gateway and ingestion pipeline are written against it and never
//! touch provider wire formats directly.

use async_trait::async_trait;

use crate::error::InletError;
use crate::types::{ChannelContext, ChannelKind, DeliveryStatus, InboundMessage, SenderProfile};

/// Signature material extracted from a webhook request's headers.
///
/// WhatsApp/Meta populate only `signature` (`X-Hub-Signature-256`);
/// TikTok supplies a signature and the timestamp it was computed with.
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
}

/// Result of normalizing one webhook body: the actionable messages plus
/// any delivery-status callbacks bundled in the same request.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub messages: Vec<InboundMessage>,
    pub statuses: Vec<DeliveryStatus>,
}

impl NormalizedBatch {
    /// Total number of events the batch carries.
    pub fn len(&self) -> usize {
        self.messages.len() + self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.statuses.is_empty()
    }
}

/// Adapter for one messaging provider's wire format and REST API.
///
/// Verification and normalization are pure CPU work over the raw body;
/// sends and profile fetches go over the network with bounded timeouts.
#[async_trait]
pub trait ChannelAdapter: Send + Sync + 'static {
    /// The channel this adapter speaks for.
    fn channel(&self) -> ChannelKind;

    /// Maximum outbound text length (characters) the provider accepts.
    fn max_text_length(&self) -> usize;

    /// Verify the webhook signature over the raw body.
    ///
    /// Must be constant-time on the comparison and free of side effects.
    /// A `false` return rejects the entire webhook with no further
    /// processing.
    fn verify_signature(&self, body: &[u8], headers: &WebhookHeaders, secret: &str) -> bool;

    /// Parse a verified webhook body into canonical events.
    ///
    /// Individual malformed or non-actionable events (echoes, deletions,
    /// contentless reactions) are skipped, never failing the batch; an
    /// `Err` means the body as a whole was unparseable.
    fn normalize(&self, body: &[u8]) -> Result<NormalizedBatch, InletError>;

    /// Send a text reply, truncating to the channel limit first.
    ///
    /// Returns the provider's message id. Timeout and rate-limit
    /// failures surface as the distinct [`InletError`] variants so the
    /// caller can decide whether a retry is safe.
    async fn send_text(
        &self,
        ctx: &ChannelContext,
        recipient_id: &str,
        text: &str,
    ) -> Result<String, InletError>;

    /// Fetch the sender's profile (display name, avatar).
    ///
    /// Best-effort: callers treat any error as "no profile available".
    async fn fetch_profile(
        &self,
        ctx: &ChannelContext,
        external_id: &str,
    ) -> Result<SenderProfile, InletError>;
}
