// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lifecycle management.
//!
//! Same concurrency contract as lead creation: at most one open
//! conversation per (tenant, lead, channel) under concurrent calls. The
//! storage layer does the transactional work; this layer adds the
//! per-key serialization.

use std::sync::Arc;

use tracing::debug;

use inlet_core::{ChannelContext, InletError};
use inlet_storage::queries::conversations::{self, ConversationUpsert};
use inlet_storage::Database;

use crate::locks::KeyedLocks;

/// Result of [`ConversationManager::find_or_create_or_reopen`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationOutcome {
    pub conversation_id: String,
    pub is_new: bool,
    pub was_reopened: bool,
}

/// Finds, creates, or reopens the conversation for a lead on a channel.
#[derive(Clone)]
pub struct ConversationManager {
    db: Database,
    locks: Arc<KeyedLocks>,
}

impl ConversationManager {
    pub fn new(db: Database, locks: Arc<KeyedLocks>) -> Self {
        Self { db, locks }
    }

    /// Resolve the conversation a new inbound message belongs to.
    ///
    /// A closed (`resolved`/`archived`) conversation is transitioned
    /// back to `active` rather than duplicated.
    pub async fn find_or_create_or_reopen(
        &self,
        ctx: &ChannelContext,
        lead_id: &str,
    ) -> Result<ConversationOutcome, InletError> {
        let key = format!("conv:{}:{}:{}", ctx.tenant_id, lead_id, ctx.channel);
        let _guard = self.locks.acquire(&key).await;

        let handle = conversations::find_or_create_or_reopen(
            &self.db,
            ConversationUpsert {
                tenant_id: ctx.tenant_id.clone(),
                branch_id: ctx.branch_id.clone(),
                lead_id: lead_id.to_string(),
                channel: ctx.channel.to_string(),
                channel_connection_id: ctx.connection_id.clone(),
                ai_enabled: ctx.ai_enabled,
            },
        )
        .await?;

        if handle.is_new {
            debug!(conversation_id = %handle.id, channel = %ctx.channel, "conversation created");
        } else if handle.was_reopened {
            debug!(conversation_id = %handle.id, channel = %ctx.channel, "conversation reopened");
        }

        Ok(ConversationOutcome {
            conversation_id: handle.id,
            is_new: handle.is_new,
            was_reopened: handle.was_reopened,
        })
    }
}
