// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead identity resolution: find-or-create with cross-channel linking.
//!
//! The most concurrency-sensitive step in the pipeline. Webhook retries
//! and rapid double-sends can invoke this twice before either call
//! commits; the per-key lock serializes them, and the partial unique
//! indexes catch anything that slips through (multi-process deployments).
//!
//! Cross-channel linking and profile enrichment are best-effort side
//! paths: any failure logs a warning and the plain create proceeds.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use inlet_core::channel::ChannelAdapter;
use inlet_core::{ChannelContext, ChannelKind, InboundMessage, InletError};
use inlet_storage::models::Lead;
use inlet_storage::queries::leads;
use inlet_storage::Database;

use crate::locks::KeyedLocks;

/// Result of [`IdentityResolver::find_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityOutcome {
    pub lead_id: String,
    pub is_new: bool,
    pub was_cross_linked: bool,
}

/// Finds or creates the lead behind an external sender identity.
#[derive(Clone)]
pub struct IdentityResolver {
    db: Database,
    locks: Arc<KeyedLocks>,
    profile_timeout: Duration,
}

impl IdentityResolver {
    pub fn new(db: Database, locks: Arc<KeyedLocks>, profile_timeout: Duration) -> Self {
        Self {
            db,
            locks,
            profile_timeout,
        }
    }

    /// Find or create the lead for the message's sender.
    ///
    /// At most one lead is created per (tenant, channel, external id)
    /// even under concurrent invocation.
    pub async fn find_or_create(
        &self,
        adapter: &dyn ChannelAdapter,
        ctx: &ChannelContext,
        msg: &InboundMessage,
    ) -> Result<IdentityOutcome, InletError> {
        let external_id = &msg.sender_external_id;
        let key = format!("lead:{}:{}:{}", ctx.tenant_id, msg.channel, external_id);
        let _guard = self.locks.acquire(&key).await;

        if let Some(lead) =
            leads::find_by_identity(&self.db, &ctx.tenant_id, msg.channel, external_id).await?
        {
            return Ok(IdentityOutcome {
                lead_id: lead.id,
                is_new: false,
                was_cross_linked: false,
            });
        }

        // Best-effort cross-channel link: the same person may already be
        // known through another channel, matched by phone or email when
        // the provider supplies one.
        if let Some(outcome) = self.try_cross_link(ctx, msg).await {
            return Ok(outcome);
        }

        let profile = self.enrich_profile(adapter, ctx, external_id, msg).await;

        let lead = self.build_lead(ctx, msg, profile);
        let (lead_id, created) = leads::insert_or_existing(&self.db, lead, msg.channel).await?;
        if created {
            debug!(lead_id = %lead_id, channel = %msg.channel, "lead created");
        }
        Ok(IdentityOutcome {
            lead_id,
            is_new: created,
            was_cross_linked: false,
        })
    }

    /// Attach this channel identity to an existing lead matched by
    /// contact info. `None` means "no link, fall through to create".
    async fn try_cross_link(
        &self,
        ctx: &ChannelContext,
        msg: &InboundMessage,
    ) -> Option<IdentityOutcome> {
        if msg.sender_phone.is_none() && msg.sender_email.is_none() {
            return None;
        }

        let found = match leads::find_by_contact(
            &self.db,
            &ctx.tenant_id,
            msg.sender_phone.as_deref(),
            msg.sender_email.as_deref(),
        )
        .await
        {
            Ok(found) => found?,
            Err(e) => {
                warn!(error = %e, "cross-channel lookup failed, proceeding without link");
                return None;
            }
        };

        // Never overwrite an identity the lead already holds on this
        // channel -- that would merge two different people.
        if channel_identity(&found, msg.channel).is_some() {
            return if channel_identity(&found, msg.channel).map(String::as_str)
                == Some(msg.sender_external_id.as_str())
            {
                Some(IdentityOutcome {
                    lead_id: found.id,
                    is_new: false,
                    was_cross_linked: false,
                })
            } else {
                None
            };
        }

        match leads::attach_identity(&self.db, &found.id, msg.channel, &msg.sender_external_id)
            .await
        {
            Ok(()) => {
                debug!(lead_id = %found.id, channel = %msg.channel, "cross-channel identity linked");
                Some(IdentityOutcome {
                    lead_id: found.id,
                    is_new: false,
                    was_cross_linked: true,
                })
            }
            Err(e) => {
                warn!(error = %e, "cross-channel link failed, proceeding without link");
                None
            }
        }
    }

    /// Fetch the sender profile when the webhook carried no display name.
    ///
    /// Bounded by `profile_timeout`; only duplicate deliveries of the
    /// same sender wait behind it, other keys are unaffected.
    async fn enrich_profile(
        &self,
        adapter: &dyn ChannelAdapter,
        ctx: &ChannelContext,
        external_id: &str,
        msg: &InboundMessage,
    ) -> inlet_core::SenderProfile {
        if msg.sender_name.is_some() {
            return inlet_core::SenderProfile {
                display_name: msg.sender_name.clone(),
                ..Default::default()
            };
        }
        match tokio::time::timeout(
            self.profile_timeout,
            adapter.fetch_profile(ctx, external_id),
        )
        .await
        {
            Ok(Ok(profile)) => profile,
            Ok(Err(e)) => {
                warn!(error = %e, "profile fetch failed, using placeholder name");
                inlet_core::SenderProfile::default()
            }
            Err(_) => {
                warn!(timeout = ?self.profile_timeout, "profile fetch timed out, using placeholder name");
                inlet_core::SenderProfile::default()
            }
        }
    }

    fn build_lead(
        &self,
        ctx: &ChannelContext,
        msg: &InboundMessage,
        profile: inlet_core::SenderProfile,
    ) -> Lead {
        let name = profile
            .display_name
            .or_else(|| Some(placeholder_name(msg.channel)));
        let mut lead = Lead {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            branch_id: ctx.branch_id.clone(),
            name,
            phone: msg.sender_phone.clone().or(profile.phone),
            instagram_id: None,
            facebook_id: None,
            tiktok_id: None,
            email: msg.sender_email.clone().or(profile.email),
            source_channel: msg.channel.to_string(),
            score: 0,
            first_contact_at: String::new(),
            deleted_at: None,
            created_at: String::new(),
        };
        match msg.channel {
            ChannelKind::Whatsapp => lead.phone = Some(msg.sender_external_id.clone()),
            ChannelKind::Instagram => lead.instagram_id = Some(msg.sender_external_id.clone()),
            ChannelKind::Facebook => lead.facebook_id = Some(msg.sender_external_id.clone()),
            ChannelKind::Tiktok => lead.tiktok_id = Some(msg.sender_external_id.clone()),
        }
        lead
    }
}

fn channel_identity(lead: &Lead, channel: ChannelKind) -> Option<&String> {
    match channel {
        ChannelKind::Whatsapp => lead.phone.as_ref(),
        ChannelKind::Instagram => lead.instagram_id.as_ref(),
        ChannelKind::Facebook => lead.facebook_id.as_ref(),
        ChannelKind::Tiktok => lead.tiktok_id.as_ref(),
    }
}

/// Generic fallback name when neither webhook nor profile supplied one.
fn placeholder_name(channel: ChannelKind) -> String {
    match channel {
        ChannelKind::Whatsapp => "WhatsApp contact",
        ChannelKind::Instagram => "Instagram contact",
        ChannelKind::Facebook => "Facebook contact",
        ChannelKind::Tiktok => "TikTok contact",
    }
    .to_string()
}
