// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery-status reconciliation.
//!
//! Applies sent/delivered/read/failed callbacks to previously stored
//! outbound messages, always scoped to the tenant. A miss is a normal
//! no-op: the status may belong to another tenant's webhook or a long-
//! pruned message.

use tracing::debug;

use inlet_core::{DeliveryState, DeliveryStatus, InletError};
use inlet_storage::queries::messages;
use inlet_storage::Database;

/// Applies provider delivery callbacks to stored messages.
#[derive(Clone)]
pub struct StatusReconciler {
    db: Database,
}

impl StatusReconciler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Apply one status callback for `tenant_id`.
    ///
    /// Returns whether a message was updated. The provider error string
    /// is stored only for `failed` states.
    pub async fn apply(
        &self,
        tenant_id: &str,
        status: &DeliveryStatus,
    ) -> Result<bool, InletError> {
        let error = if status.state == DeliveryState::Failed {
            status.error.clone()
        } else {
            None
        };

        let found = messages::apply_status(
            &self.db,
            tenant_id,
            &status.provider_message_id,
            &status.state.to_string(),
            error,
        )
        .await?;

        if !found {
            debug!(
                provider_message_id = %status.provider_message_id,
                "status callback matched no message for tenant, ignoring"
            );
        }
        Ok(found)
    }
}
