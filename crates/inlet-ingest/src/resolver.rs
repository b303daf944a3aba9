// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant and channel-connection resolution.
//!
//! Maps (tenant slug, channel, provider endpoint id) to the
//! [`ChannelContext`] carrying credentials and AI settings. Resolution
//! failures are non-retryable rejections of a single event -- the caller
//! logs and skips, never failing the batch.

use inlet_core::{ChannelContext, ChannelKind, InletError};
use inlet_storage::queries::connections;
use inlet_storage::Database;

/// Read-only resolver over the tenants/channel_connections tables.
#[derive(Clone)]
pub struct TenantResolver {
    db: Database,
}

impl TenantResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All connected contexts for (tenant slug, channel).
    ///
    /// The gateway calls this before signature verification: the
    /// webhook's signing secret lives on the connection, so every
    /// candidate secret must be available up front. Normally one.
    pub async fn connections_for(
        &self,
        tenant_slug: &str,
        channel: ChannelKind,
    ) -> Result<Vec<ChannelContext>, InletError> {
        connections::contexts_for(&self.db, tenant_slug, channel).await
    }

    /// Resolve the single context an event belongs to.
    pub async fn resolve(
        &self,
        tenant_slug: &str,
        channel: ChannelKind,
        endpoint_id: &str,
    ) -> Result<ChannelContext, InletError> {
        let tenant = connections::find_tenant(&self.db, tenant_slug).await?;
        match tenant {
            Some(t) if t.active => {}
            _ => {
                return Err(InletError::TenantNotFound {
                    slug: tenant_slug.to_string(),
                });
            }
        }

        let contexts = self.connections_for(tenant_slug, channel).await?;
        pick_context(&contexts, endpoint_id)
            .cloned()
            .ok_or_else(|| InletError::ChannelNotConnected {
                slug: tenant_slug.to_string(),
                channel,
                endpoint_id: endpoint_id.to_string(),
            })
    }
}

/// Pick the context matching an event's endpoint id from a prefetched
/// candidate list.
pub fn pick_context<'a>(
    contexts: &'a [ChannelContext],
    endpoint_id: &str,
) -> Option<&'a ChannelContext> {
    contexts.iter().find(|c| c.endpoint_id == endpoint_id)
}
