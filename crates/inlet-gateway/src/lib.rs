// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP webhook gateway for the Inlet ingestion service.
//!
//! One route pair per (tenant slug, channel): the `GET` side answers the
//! Meta/WhatsApp subscription handshake, the `POST` side runs
//! verification and hands verified batches to the shared pipeline.
//! Webhooks are acknowledged with `200` once best-effort processing
//! completes -- per-event failures are logged, never surfaced, so
//! providers do not retry-storm already-processed events. The only
//! non-2xx answers: bad signature (401), unroutable path (404), and
//! transient storage failure (503, safe to redeliver).

pub mod handlers;
pub mod server;

use std::collections::HashMap;
use std::sync::Arc;

use inlet_core::channel::ChannelAdapter;
use inlet_core::ChannelKind;
use inlet_ingest::Pipeline;
use inlet_storage::Database;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Database handle for health checks.
    pub db: Database,
    /// The shared ingestion pipeline.
    pub pipeline: Arc<Pipeline>,
    /// One adapter per supported channel.
    pub adapters: Arc<HashMap<ChannelKind, Arc<dyn ChannelAdapter>>>,
}

impl GatewayState {
    pub fn adapter(&self, channel: ChannelKind) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel).cloned()
    }
}
