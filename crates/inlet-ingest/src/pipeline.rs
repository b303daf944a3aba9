// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shared ingestion pipeline.
//!
//! One [`Pipeline`] instance serves every channel; the per-channel
//! adapters feed it canonical events. Per event: resolve the lead,
//! resolve the conversation, persist the message, and schedule the AI
//! response with the connection's delay policy. Duplicates short-circuit
//! before dispatch.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, info};

use inlet_core::channel::ChannelAdapter;
use inlet_core::{ChannelContext, DeliveryStatus, InboundMessage, InletError};
use inlet_storage::Database;

use crate::conversation::ConversationManager;
use crate::dispatch::{AiResponsePayload, JobDispatcher};
use crate::identity::IdentityResolver;
use crate::locks::KeyedLocks;
use crate::resolver::TenantResolver;
use crate::status::StatusReconciler;
use crate::store::MessageStore;

/// Everything that happened while ingesting one message.
#[derive(Debug, Clone)]
pub struct EventOutcome {
    pub lead_id: String,
    pub lead_is_new: bool,
    pub lead_cross_linked: bool,
    pub conversation_id: String,
    pub conversation_is_new: bool,
    pub conversation_reopened: bool,
    pub message_id: String,
    pub is_duplicate: bool,
    /// The scheduled `ai_response` job, when AI handling is enabled and
    /// the message was not a duplicate.
    pub job_id: Option<i64>,
}

/// The channel-agnostic ingestion pipeline.
pub struct Pipeline {
    resolver: TenantResolver,
    identity: IdentityResolver,
    conversations: ConversationManager,
    store: MessageStore,
    dispatcher: JobDispatcher,
    reconciler: StatusReconciler,
}

impl Pipeline {
    /// Build a pipeline over `db`. `profile_timeout` bounds the
    /// best-effort provider profile fetch during lead creation.
    pub fn new(db: Database, profile_timeout: Duration) -> Self {
        let locks = Arc::new(KeyedLocks::new());
        Self {
            resolver: TenantResolver::new(db.clone()),
            identity: IdentityResolver::new(db.clone(), Arc::clone(&locks), profile_timeout),
            conversations: ConversationManager::new(db.clone(), locks),
            store: MessageStore::new(db.clone()),
            dispatcher: JobDispatcher::new(db.clone()),
            reconciler: StatusReconciler::new(db),
        }
    }

    /// The tenant resolver, shared with the gateway for candidate-secret
    /// lookup before verification.
    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    /// Ingest one canonical inbound message.
    pub async fn process_message(
        &self,
        adapter: &dyn ChannelAdapter,
        ctx: &ChannelContext,
        msg: &InboundMessage,
    ) -> Result<EventOutcome, InletError> {
        let identity = self.identity.find_or_create(adapter, ctx, msg).await?;
        let conversation = self
            .conversations
            .find_or_create_or_reopen(ctx, &identity.lead_id)
            .await?;
        let stored = self
            .store
            .save_incoming(ctx, &conversation.conversation_id, msg)
            .await?;

        counter!("inlet_messages_ingested_total", "channel" => msg.channel.to_string())
            .increment(1);

        if stored.is_duplicate {
            counter!("inlet_duplicate_events_total", "channel" => msg.channel.to_string())
                .increment(1);
            return Ok(EventOutcome {
                lead_id: identity.lead_id,
                lead_is_new: identity.is_new,
                lead_cross_linked: identity.was_cross_linked,
                conversation_id: conversation.conversation_id,
                conversation_is_new: conversation.is_new,
                conversation_reopened: conversation.was_reopened,
                message_id: stored.message_id,
                is_duplicate: true,
                job_id: None,
            });
        }

        let job_id = if ctx.ai_enabled {
            let is_first_message = conversation.is_new;
            let delay_secs = if is_first_message {
                ctx.first_message_delay_secs
            } else {
                ctx.subsequent_message_delay_secs
            };
            let payload = AiResponsePayload {
                tenant_id: ctx.tenant_id.clone(),
                conversation_id: conversation.conversation_id.clone(),
                message_id: stored.message_id.clone(),
                lead_id: identity.lead_id.clone(),
                channel: msg.channel,
                channel_connection_id: ctx.connection_id.clone(),
                is_first_message,
                ai_personality: ctx.ai_personality.clone(),
                custom_instructions: ctx.custom_instructions.clone(),
            };
            let id = self
                .dispatcher
                .enqueue_ai_response(&payload, delay_secs)
                .await?;
            counter!("inlet_jobs_enqueued_total", "job_type" => "ai_response").increment(1);
            Some(id)
        } else {
            debug!(
                conversation_id = %conversation.conversation_id,
                "ai disabled for connection, skipping dispatch"
            );
            None
        };

        info!(
            tenant = %ctx.tenant_slug,
            channel = %msg.channel,
            lead_id = %identity.lead_id,
            lead_is_new = identity.is_new,
            conversation_id = %conversation.conversation_id,
            conversation_is_new = conversation.is_new,
            conversation_reopened = conversation.was_reopened,
            "message ingested"
        );

        Ok(EventOutcome {
            lead_id: identity.lead_id,
            lead_is_new: identity.is_new,
            lead_cross_linked: identity.was_cross_linked,
            conversation_id: conversation.conversation_id,
            conversation_is_new: conversation.is_new,
            conversation_reopened: conversation.was_reopened,
            message_id: stored.message_id,
            is_duplicate: false,
            job_id,
        })
    }

    /// Apply one delivery-status callback, scoped to the context's tenant.
    pub async fn apply_status(
        &self,
        ctx: &ChannelContext,
        status: &DeliveryStatus,
    ) -> Result<bool, InletError> {
        self.reconciler.apply(&ctx.tenant_id, status).await
    }

    /// The dispatcher, for collaborators that enqueue send jobs.
    pub fn dispatcher(&self) -> &JobDispatcher {
        &self.dispatcher
    }
}
