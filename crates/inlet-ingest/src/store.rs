// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent message persistence.

use tracing::debug;

use inlet_core::{ChannelContext, InboundMessage, InletError};
use inlet_storage::queries::messages::{self, NewIncomingMessage};
use inlet_storage::Database;

/// Result of [`MessageStore::save_incoming`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    pub message_id: String,
    pub is_duplicate: bool,
}

/// Persists inbound messages with provider-retry deduplication.
#[derive(Clone)]
pub struct MessageStore {
    db: Database,
}

impl MessageStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Idempotently persist `msg` into `conversation_id`.
    ///
    /// A duplicate (same tenant + provider message id) performs no
    /// mutation at all: no new row, no counter bump.
    pub async fn save_incoming(
        &self,
        ctx: &ChannelContext,
        conversation_id: &str,
        msg: &InboundMessage,
    ) -> Result<StoreOutcome, InletError> {
        let metadata = msg
            .metadata
            .as_ref()
            .map(|m| m.to_string());

        let (message_id, is_duplicate) = messages::insert_incoming(
            &self.db,
            NewIncomingMessage {
                tenant_id: ctx.tenant_id.clone(),
                conversation_id: conversation_id.to_string(),
                content: msg.text.clone().unwrap_or_default(),
                message_kind: msg.kind.to_string(),
                channel: msg.channel.to_string(),
                media_url: msg.media_url.clone(),
                media_type: msg.media_type.clone(),
                provider_message_id: msg.provider_message_id.clone(),
                reply_to_provider_id: msg.reply_to_provider_id.clone(),
                metadata,
            },
        )
        .await?;

        if is_duplicate {
            debug!(
                provider_message_id = %msg.provider_message_id,
                "provider re-delivery recognized as duplicate"
            );
        }
        Ok(StoreOutcome {
            message_id,
            is_duplicate,
        })
    }
}
