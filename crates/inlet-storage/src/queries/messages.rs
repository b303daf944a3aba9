// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence with provider-retry idempotency.
//!
//! The provider message id, scoped to the tenant, is the idempotency
//! key: a second delivery of the same id must change nothing -- no new
//! row, no counter bump.

use rusqlite::params;

use inlet_core::InletError;

use crate::database::Database;
use crate::models::MessageRecord;

/// Inputs for [`insert_incoming`].
#[derive(Debug, Clone)]
pub struct NewIncomingMessage {
    pub tenant_id: String,
    pub conversation_id: String,
    pub content: String,
    pub message_kind: String,
    pub channel: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub provider_message_id: String,
    pub reply_to_provider_id: Option<String>,
    pub metadata: Option<String>,
}

/// Inputs for [`insert_outbound`]. The provider message id is filled in
/// by the send worker once the provider acknowledges.
#[derive(Debug, Clone)]
pub struct NewOutboundMessage {
    pub tenant_id: String,
    pub conversation_id: String,
    pub sender_kind: String,
    pub content: String,
    pub channel: String,
    pub status: String,
    pub provider_message_id: Option<String>,
}

const MESSAGE_COLUMNS: &str = "id, tenant_id, conversation_id, sender_kind, content,
    message_kind, channel, media_url, media_type, status, provider_message_id,
    provider_error, reply_to_provider_id, metadata, created_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        conversation_id: row.get(2)?,
        sender_kind: row.get(3)?,
        content: row.get(4)?,
        message_kind: row.get(5)?,
        channel: row.get(6)?,
        media_url: row.get(7)?,
        media_type: row.get(8)?,
        status: row.get(9)?,
        provider_message_id: row.get(10)?,
        provider_error: row.get(11)?,
        reply_to_provider_id: row.get(12)?,
        metadata: row.get(13)?,
        created_at: row.get(14)?,
    })
}

/// Idempotently persist an inbound message.
///
/// Returns `(message_id, is_duplicate)`. On a fresh insert the owning
/// conversation's `message_count` and `last_message_at` are updated in
/// the same transaction, so concurrent messages in one conversation
/// cannot lose counter updates.
pub async fn insert_incoming(
    db: &Database,
    msg: NewIncomingMessage,
) -> Result<(String, bool), InletError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<String> = {
                match tx.query_row(
                    "SELECT id FROM messages
                     WHERE tenant_id = ?1 AND provider_message_id = ?2",
                    params![msg.tenant_id, msg.provider_message_id],
                    |row| row.get(0),
                ) {
                    Ok(id) => Some(id),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };
            if let Some(id) = existing {
                tx.commit()?;
                return Ok((id, true));
            }

            let new_id = uuid::Uuid::new_v4().to_string();
            let inserted = tx.execute(
                "INSERT INTO messages (
                    id, tenant_id, conversation_id, sender_kind, content,
                    message_kind, channel, media_url, media_type, status,
                    provider_message_id, reply_to_provider_id, metadata
                ) VALUES (?1, ?2, ?3, 'lead', ?4, ?5, ?6, ?7, ?8, 'received', ?9, ?10, ?11)",
                params![
                    new_id,
                    msg.tenant_id,
                    msg.conversation_id,
                    msg.content,
                    msg.message_kind,
                    msg.channel,
                    msg.media_url,
                    msg.media_type,
                    msg.provider_message_id,
                    msg.reply_to_provider_id,
                    msg.metadata,
                ],
            );

            match inserted {
                Ok(_) => {
                    tx.execute(
                        "UPDATE conversations
                         SET message_count = message_count + 1,
                             last_message_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![msg.conversation_id],
                    )?;
                    tx.commit()?;
                    Ok((new_id, false))
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    // A concurrent delivery inserted the same provider id.
                    let id: String = tx.query_row(
                        "SELECT id FROM messages
                         WHERE tenant_id = ?1 AND provider_message_id = ?2",
                        params![msg.tenant_id, msg.provider_message_id],
                        |row| row.get(0),
                    )?;
                    tx.commit()?;
                    Ok((id, true))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist an outbound message row (written by the send worker).
pub async fn insert_outbound(
    db: &Database,
    msg: NewOutboundMessage,
) -> Result<String, InletError> {
    db.connection()
        .call(move |conn| {
            let new_id = uuid::Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO messages (
                    id, tenant_id, conversation_id, sender_kind, content,
                    message_kind, channel, status, provider_message_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, 'text', ?6, ?7, ?8)",
                params![
                    new_id,
                    msg.tenant_id,
                    msg.conversation_id,
                    msg.sender_kind,
                    msg.content,
                    msg.channel,
                    msg.status,
                    msg.provider_message_id,
                ],
            )?;
            Ok(new_id)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply a delivery-status callback, scoped to the tenant.
///
/// Matching purely by provider message id across tenants would leak
/// cross-tenant information, so the tenant id is part of the lookup key.
/// Returns `false` when no message matched (a normal no-op).
pub async fn apply_status(
    db: &Database,
    tenant_id: &str,
    provider_message_id: &str,
    status: &str,
    error: Option<String>,
) -> Result<bool, InletError> {
    let tenant_id = tenant_id.to_string();
    let provider_message_id = provider_message_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE messages
                 SET status = ?3, provider_error = COALESCE(?4, provider_error)
                 WHERE tenant_id = ?1 AND provider_message_id = ?2",
                params![tenant_id, provider_message_id, status, error],
            )?;
            Ok(updated > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a message by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<MessageRecord>, InletError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
            match conn.query_row(&sql, params![id], message_from_row) {
                Ok(m) => Ok(Some(m)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a message by (tenant, provider message id).
pub async fn find_by_provider_id(
    db: &Database,
    tenant_id: &str,
    provider_message_id: &str,
) -> Result<Option<MessageRecord>, InletError> {
    let tenant_id = tenant_id.to_string();
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE tenant_id = ?1 AND provider_message_id = ?2"
            );
            match conn.query_row(&sql, params![tenant_id, provider_message_id], message_from_row)
            {
                Ok(m) => Ok(Some(m)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelConnection, Lead, Tenant};
    use crate::queries::connections::{insert_connection, insert_tenant};
    use crate::queries::conversations::{self, ConversationUpsert};
    use crate::queries::leads::insert_or_existing;
    use inlet_core::ChannelKind;
    use tempfile::tempdir;

    async fn seed_tenant(db: &Database, tenant_id: &str, slug: &str) {
        insert_tenant(
            db,
            &Tenant {
                id: tenant_id.into(),
                slug: slug.into(),
                name: slug.into(),
                active: true,
                created_at: String::new(),
            },
        )
        .await
        .unwrap();
        insert_connection(
            db,
            &ChannelConnection {
                id: format!("conn-{tenant_id}"),
                tenant_id: tenant_id.into(),
                branch_id: None,
                channel: "whatsapp".into(),
                endpoint_id: format!("ep-{tenant_id}"),
                access_token: "token".into(),
                app_secret: "secret".into(),
                webhook_verify_token: None,
                status: "connected".into(),
                ai_enabled: true,
                ai_personality: None,
                custom_instructions: None,
                first_message_delay_secs: 0,
                subsequent_message_delay_secs: 0,
            },
        )
        .await
        .unwrap();
    }

    async fn seed_conversation(db: &Database, tenant_id: &str, lead_id: &str) -> String {
        insert_or_existing(
            db,
            Lead {
                id: lead_id.into(),
                tenant_id: tenant_id.into(),
                branch_id: None,
                name: None,
                phone: Some(format!("555-{lead_id}")),
                instagram_id: None,
                facebook_id: None,
                tiktok_id: None,
                email: None,
                source_channel: "whatsapp".into(),
                score: 0,
                first_contact_at: String::new(),
                deleted_at: None,
                created_at: String::new(),
            },
            ChannelKind::Whatsapp,
        )
        .await
        .unwrap();
        conversations::find_or_create_or_reopen(
            db,
            ConversationUpsert {
                tenant_id: tenant_id.into(),
                branch_id: None,
                lead_id: lead_id.into(),
                channel: "whatsapp".into(),
                channel_connection_id: format!("conn-{tenant_id}"),
                ai_enabled: true,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn incoming(tenant_id: &str, conversation_id: &str, pmid: &str, text: &str) -> NewIncomingMessage {
        NewIncomingMessage {
            tenant_id: tenant_id.into(),
            conversation_id: conversation_id.into(),
            content: text.into(),
            message_kind: "text".into(),
            channel: "whatsapp".into(),
            media_url: None,
            media_type: None,
            provider_message_id: pmid.into(),
            reply_to_provider_id: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn insert_bumps_conversation_counters() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        seed_tenant(&db, "t1", "acme").await;
        let conv = seed_conversation(&db, "t1", "l1").await;

        let (id, dup) = insert_incoming(&db, incoming("t1", &conv, "wamid.1", "hola"))
            .await
            .unwrap();
        assert!(!dup);

        let stored = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(stored.content, "hola");
        assert_eq!(stored.sender_kind, "lead");
        assert_eq!(stored.status, "received");

        let conv = conversations::get(&db, &conv).await.unwrap().unwrap();
        assert_eq!(conv.message_count, 1);
        assert!(conv.last_message_at.is_some());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn redelivery_is_a_duplicate_and_changes_nothing() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        seed_tenant(&db, "t1", "acme").await;
        let conv = seed_conversation(&db, "t1", "l1").await;

        let (first, dup) = insert_incoming(&db, incoming("t1", &conv, "wamid.1", "hola"))
            .await
            .unwrap();
        assert!(!dup);

        let (second, dup) = insert_incoming(&db, incoming("t1", &conv, "wamid.1", "hola"))
            .await
            .unwrap();
        assert!(dup);
        assert_eq!(second, first);

        let conv = conversations::get(&db, &conv).await.unwrap().unwrap();
        assert_eq!(conv.message_count, 1, "duplicate must not double-count");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn same_provider_id_in_other_tenant_is_not_a_duplicate() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        seed_tenant(&db, "t1", "acme").await;
        seed_tenant(&db, "t2", "other").await;
        let conv1 = seed_conversation(&db, "t1", "l1").await;
        let conv2 = seed_conversation(&db, "t2", "l2").await;

        let (_, dup) = insert_incoming(&db, incoming("t1", &conv1, "wamid.X", "a")).await.unwrap();
        assert!(!dup);
        let (_, dup) = insert_incoming(&db, incoming("t2", &conv2, "wamid.X", "b")).await.unwrap();
        assert!(!dup, "idempotency key is (tenant, provider id)");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn apply_status_is_tenant_scoped() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        seed_tenant(&db, "t1", "acme").await;
        seed_tenant(&db, "t2", "other").await;
        let conv1 = seed_conversation(&db, "t1", "l1").await;
        let conv2 = seed_conversation(&db, "t2", "l2").await;

        let out1 = insert_outbound(
            &db,
            NewOutboundMessage {
                tenant_id: "t1".into(),
                conversation_id: conv1,
                sender_kind: "ai".into(),
                content: "reply".into(),
                channel: "whatsapp".into(),
                status: "sent".into(),
                provider_message_id: Some("wamid.out".into()),
            },
        )
        .await
        .unwrap();
        let out2 = insert_outbound(
            &db,
            NewOutboundMessage {
                tenant_id: "t2".into(),
                conversation_id: conv2,
                sender_kind: "ai".into(),
                content: "reply".into(),
                channel: "whatsapp".into(),
                status: "sent".into(),
                provider_message_id: Some("wamid.out".into()),
            },
        )
        .await
        .unwrap();

        let found = apply_status(&db, "t1", "wamid.out", "read", None).await.unwrap();
        assert!(found);

        let m1 = get(&db, &out1).await.unwrap().unwrap();
        let m2 = get(&db, &out2).await.unwrap().unwrap();
        assert_eq!(m1.status, "read");
        assert_eq!(m2.status, "sent", "tenant B's message must be untouched");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn apply_status_miss_is_a_noop() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        seed_tenant(&db, "t1", "acme").await;
        let found = apply_status(&db, "t1", "wamid.unknown", "delivered", None)
            .await
            .unwrap();
        assert!(!found);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_status_records_provider_error() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        seed_tenant(&db, "t1", "acme").await;
        let conv = seed_conversation(&db, "t1", "l1").await;
        let out = insert_outbound(
            &db,
            NewOutboundMessage {
                tenant_id: "t1".into(),
                conversation_id: conv,
                sender_kind: "ai".into(),
                content: "reply".into(),
                channel: "whatsapp".into(),
                status: "sent".into(),
                provider_message_id: Some("wamid.f".into()),
            },
        )
        .await
        .unwrap();

        apply_status(&db, "t1", "wamid.f", "failed", Some("131047 re-engagement".into()))
            .await
            .unwrap();
        let m = get(&db, &out).await.unwrap().unwrap();
        assert_eq!(m.status, "failed");
        assert_eq!(m.provider_error.as_deref(), Some("131047 re-engagement"));
        db.close().await.unwrap();
    }
}
