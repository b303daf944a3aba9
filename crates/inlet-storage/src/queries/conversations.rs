// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lookup, creation, and reopening.
//!
//! The whole find-or-create-or-reopen decision runs inside one
//! transaction on the single writer connection, so concurrent webhook
//! deliveries cannot observe a half-made conversation. The partial
//! unique index on open conversations backstops multi-process
//! deployments.

use rusqlite::params;

use inlet_core::{ConversationStatus, InletError};

use crate::database::Database;
use crate::models::Conversation;

/// Inputs for [`find_or_create_or_reopen`].
#[derive(Debug, Clone)]
pub struct ConversationUpsert {
    pub tenant_id: String,
    pub branch_id: Option<String>,
    pub lead_id: String,
    pub channel: String,
    pub channel_connection_id: String,
    pub ai_enabled: bool,
}

/// Outcome of [`find_or_create_or_reopen`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHandle {
    pub id: String,
    pub is_new: bool,
    pub was_reopened: bool,
}

const CONVERSATION_COLUMNS: &str = "id, tenant_id, branch_id, lead_id, channel,
    channel_connection_id, status, ai_handling, started_at, last_message_at,
    message_count, created_at";

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        branch_id: row.get(2)?,
        lead_id: row.get(3)?,
        channel: row.get(4)?,
        channel_connection_id: row.get(5)?,
        status: row.get(6)?,
        ai_handling: row.get(7)?,
        started_at: row.get(8)?,
        last_message_at: row.get(9)?,
        message_count: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// Find the conversation a new inbound message belongs to, creating or
/// reopening one as needed.
///
/// Resolution order:
/// 1. An open (`active`/`pending`) conversation is reused as-is.
/// 2. Otherwise the most recent conversation decides: `resolved` or
///    `archived` flips back to `active` (`was_reopened`); a
///    `waiting_response`/`escalated` one is reused without a status
///    change (a human is handling it -- no duplicate thread).
/// 3. With no prior conversation at all, a new `active` row is created.
pub async fn find_or_create_or_reopen(
    db: &Database,
    upsert: ConversationUpsert,
) -> Result<ConversationHandle, InletError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let open: Option<String> = {
                match tx.query_row(
                    "SELECT id FROM conversations
                     WHERE tenant_id = ?1 AND lead_id = ?2 AND channel = ?3
                       AND status IN ('active', 'pending')
                     LIMIT 1",
                    params![upsert.tenant_id, upsert.lead_id, upsert.channel],
                    |row| row.get(0),
                ) {
                    Ok(id) => Some(id),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };
            if let Some(id) = open {
                tx.commit()?;
                return Ok(ConversationHandle {
                    id,
                    is_new: false,
                    was_reopened: false,
                });
            }

            let latest: Option<(String, String)> = {
                match tx.query_row(
                    "SELECT id, status FROM conversations
                     WHERE tenant_id = ?1 AND lead_id = ?2 AND channel = ?3
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1",
                    params![upsert.tenant_id, upsert.lead_id, upsert.channel],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                ) {
                    Ok(pair) => Some(pair),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };

            if let Some((id, status)) = latest {
                let status: ConversationStatus =
                    status.parse().unwrap_or(ConversationStatus::Active);
                if status.is_terminal() {
                    // Reopen in place so conversation history is not
                    // fragmented across rows.
                    tx.execute(
                        "UPDATE conversations SET status = 'active' WHERE id = ?1",
                        params![id],
                    )?;
                    tx.commit()?;
                    return Ok(ConversationHandle {
                        id,
                        is_new: false,
                        was_reopened: true,
                    });
                }
                // waiting_response / escalated: keep routing into it.
                tx.commit()?;
                return Ok(ConversationHandle {
                    id,
                    is_new: false,
                    was_reopened: false,
                });
            }

            let new_id = uuid::Uuid::new_v4().to_string();
            let inserted = tx.execute(
                "INSERT INTO conversations (
                    id, tenant_id, branch_id, lead_id, channel,
                    channel_connection_id, status, ai_handling
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', ?7)",
                params![
                    new_id,
                    upsert.tenant_id,
                    upsert.branch_id,
                    upsert.lead_id,
                    upsert.channel,
                    upsert.channel_connection_id,
                    upsert.ai_enabled,
                ],
            );

            match inserted {
                Ok(_) => {
                    tx.commit()?;
                    Ok(ConversationHandle {
                        id: new_id,
                        is_new: true,
                        was_reopened: false,
                    })
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    // Another process created the open conversation first.
                    let id: String = tx.query_row(
                        "SELECT id FROM conversations
                         WHERE tenant_id = ?1 AND lead_id = ?2 AND channel = ?3
                           AND status IN ('active', 'pending')
                         LIMIT 1",
                        params![upsert.tenant_id, upsert.lead_id, upsert.channel],
                        |row| row.get(0),
                    )?;
                    tx.commit()?;
                    Ok(ConversationHandle {
                        id,
                        is_new: false,
                        was_reopened: false,
                    })
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a conversation by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Conversation>, InletError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
            match conn.query_row(&sql, params![id], conversation_from_row) {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Set a conversation's status. Used by the escalation/resolution flows
/// that live outside the ingestion path (and by tests simulating them).
pub async fn set_status(db: &Database, id: &str, status: &str) -> Result<(), InletError> {
    let id = id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET status = ?2 WHERE id = ?1",
                params![id, status],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
