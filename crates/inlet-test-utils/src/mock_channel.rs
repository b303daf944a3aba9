// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable mock channel adapter.
//!
//! Lets pipeline tests exercise identity/conversation/store/dispatch
//! logic without any provider HTTP: profile fetches are configured up
//! front and sends are recorded.

use std::sync::Mutex;

use async_trait::async_trait;

use inlet_core::channel::{ChannelAdapter, NormalizedBatch, WebhookHeaders};
use inlet_core::{ChannelContext, ChannelKind, InletError, SenderProfile};

/// A mock [`ChannelAdapter`].
pub struct MockAdapter {
    channel: ChannelKind,
    profile: Mutex<Result<SenderProfile, String>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl MockAdapter {
    pub fn new(channel: ChannelKind) -> Self {
        Self {
            channel,
            profile: Mutex::new(Ok(SenderProfile::default())),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Configure the profile returned by `fetch_profile`.
    pub fn with_profile(self, profile: SenderProfile) -> Self {
        *self.profile.lock().unwrap() = Ok(profile);
        self
    }

    /// Make every `fetch_profile` call fail.
    pub fn with_failing_profile(self, reason: &str) -> Self {
        *self.profile.lock().unwrap() = Err(reason.to_string());
        self
    }

    /// Messages recorded by `send_text`, as (recipient, text).
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelAdapter for MockAdapter {
    fn channel(&self) -> ChannelKind {
        self.channel
    }

    fn max_text_length(&self) -> usize {
        4096
    }

    fn verify_signature(&self, _body: &[u8], headers: &WebhookHeaders, _secret: &str) -> bool {
        headers.signature.is_some()
    }

    fn normalize(&self, _body: &[u8]) -> Result<NormalizedBatch, InletError> {
        Ok(NormalizedBatch::default())
    }

    async fn send_text(
        &self,
        _ctx: &ChannelContext,
        recipient_id: &str,
        text: &str,
    ) -> Result<String, InletError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient_id.to_string(), text.to_string()));
        Ok(format!("mock-{}", self.sent.lock().unwrap().len()))
    }

    async fn fetch_profile(
        &self,
        _ctx: &ChannelContext,
        _external_id: &str,
    ) -> Result<SenderProfile, InletError> {
        match &*self.profile.lock().unwrap() {
            Ok(profile) => Ok(profile.clone()),
            Err(reason) => Err(InletError::ProviderApi {
                channel: self.channel,
                status: 500,
                message: reason.clone(),
            }),
        }
    }
}
