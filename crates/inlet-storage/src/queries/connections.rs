// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant and channel-connection lookup.
//!
//! The ingestion path only ever *reads* these tables; the insert
//! operations exist for provisioning tooling and tests.

use rusqlite::params;

use inlet_core::{ChannelContext, ChannelKind, InletError};

use crate::database::Database;
use crate::models::{ChannelConnection, Tenant};

/// Insert a tenant.
pub async fn insert_tenant(db: &Database, tenant: &Tenant) -> Result<(), InletError> {
    let t = tenant.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenants (id, slug, name, active) VALUES (?1, ?2, ?3, ?4)",
                params![t.id, t.slug, t.name, t.active],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a channel connection.
pub async fn insert_connection(
    db: &Database,
    connection: &ChannelConnection,
) -> Result<(), InletError> {
    let c = connection.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO channel_connections (
                    id, tenant_id, branch_id, channel, endpoint_id, access_token,
                    app_secret, webhook_verify_token, status, ai_enabled,
                    ai_personality, custom_instructions,
                    first_message_delay_secs, subsequent_message_delay_secs
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    c.id,
                    c.tenant_id,
                    c.branch_id,
                    c.channel,
                    c.endpoint_id,
                    c.access_token,
                    c.app_secret,
                    c.webhook_verify_token,
                    c.status,
                    c.ai_enabled,
                    c.ai_personality,
                    c.custom_instructions,
                    c.first_message_delay_secs,
                    c.subsequent_message_delay_secs,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a tenant by slug.
pub async fn find_tenant(db: &Database, slug: &str) -> Result<Option<Tenant>, InletError> {
    let slug = slug.to_string();
    db.connection()
        .call(move |conn| {
            match conn.query_row(
                "SELECT id, slug, name, active, created_at FROM tenants WHERE slug = ?1",
                params![slug],
                |row| {
                    Ok(Tenant {
                        id: row.get(0)?,
                        slug: row.get(1)?,
                        name: row.get(2)?,
                        active: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            ) {
                Ok(tenant) => Ok(Some(tenant)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All connected channel contexts for an active tenant on one channel.
///
/// The gateway needs every candidate before signature verification (the
/// app secret lives on the connection); an empty result means the webhook
/// path targets nothing and the caller rejects it.
pub async fn contexts_for(
    db: &Database,
    tenant_slug: &str,
    channel: ChannelKind,
) -> Result<Vec<ChannelContext>, InletError> {
    let slug = tenant_slug.to_string();
    let channel_str = channel.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.slug, c.branch_id, c.id, c.endpoint_id, c.access_token,
                        c.app_secret, c.webhook_verify_token, c.ai_enabled, c.ai_personality,
                        c.custom_instructions, c.first_message_delay_secs,
                        c.subsequent_message_delay_secs
                 FROM channel_connections c
                 JOIN tenants t ON t.id = c.tenant_id
                 WHERE t.slug = ?1 AND t.active = 1
                   AND c.channel = ?2 AND c.status = 'connected'
                 ORDER BY c.created_at ASC",
            )?;
            let rows = stmt.query_map(params![slug, channel_str], |row| {
                Ok(ChannelContext {
                    tenant_id: row.get(0)?,
                    tenant_slug: row.get(1)?,
                    branch_id: row.get(2)?,
                    channel,
                    connection_id: row.get(3)?,
                    endpoint_id: row.get(4)?,
                    access_token: row.get(5)?,
                    app_secret: row.get(6)?,
                    webhook_verify_token: row.get(7)?,
                    ai_enabled: row.get(8)?,
                    ai_personality: row.get(9)?,
                    custom_instructions: row.get(10)?,
                    first_message_delay_secs: row.get(11)?,
                    subsequent_message_delay_secs: row.get(12)?,
                })
            })?;
            let mut contexts = Vec::new();
            for row in rows {
                contexts.push(row?);
            }
            Ok(contexts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_tenant(id: &str, slug: &str, active: bool) -> Tenant {
        Tenant {
            id: id.to_string(),
            slug: slug.to_string(),
            name: format!("{slug} clinic"),
            active,
            created_at: String::new(),
        }
    }

    fn make_connection(id: &str, tenant_id: &str, channel: &str, endpoint: &str) -> ChannelConnection {
        ChannelConnection {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            branch_id: None,
            channel: channel.to_string(),
            endpoint_id: endpoint.to_string(),
            access_token: "token".to_string(),
            app_secret: "secret".to_string(),
            webhook_verify_token: Some("verify".to_string()),
            status: "connected".to_string(),
            ai_enabled: true,
            ai_personality: None,
            custom_instructions: None,
            first_message_delay_secs: 30,
            subsequent_message_delay_secs: 10,
        }
    }

    #[tokio::test]
    async fn contexts_for_returns_matching_connections() {
        let (db, _dir) = setup_db().await;
        insert_tenant(&db, &make_tenant("t1", "acme", true)).await.unwrap();
        insert_connection(&db, &make_connection("c1", "t1", "whatsapp", "1555001"))
            .await
            .unwrap();
        insert_connection(&db, &make_connection("c2", "t1", "instagram", "page9"))
            .await
            .unwrap();

        let contexts = contexts_for(&db, "acme", ChannelKind::Whatsapp).await.unwrap();
        assert_eq!(contexts.len(), 1);
        let ctx = &contexts[0];
        assert_eq!(ctx.tenant_id, "t1");
        assert_eq!(ctx.tenant_slug, "acme");
        assert_eq!(ctx.endpoint_id, "1555001");
        assert_eq!(ctx.channel, ChannelKind::Whatsapp);
        assert_eq!(ctx.first_message_delay_secs, 30);
        assert!(ctx.ai_enabled);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn inactive_tenant_has_no_contexts() {
        let (db, _dir) = setup_db().await;
        insert_tenant(&db, &make_tenant("t1", "gone", false)).await.unwrap();
        insert_connection(&db, &make_connection("c1", "t1", "whatsapp", "1555001"))
            .await
            .unwrap();

        let contexts = contexts_for(&db, "gone", ChannelKind::Whatsapp).await.unwrap();
        assert!(contexts.is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn disconnected_connection_is_excluded() {
        let (db, _dir) = setup_db().await;
        insert_tenant(&db, &make_tenant("t1", "acme", true)).await.unwrap();
        let mut conn = make_connection("c1", "t1", "tiktok", "ck_1");
        conn.status = "disconnected".to_string();
        insert_connection(&db, &conn).await.unwrap();

        let contexts = contexts_for(&db, "acme", ChannelKind::Tiktok).await.unwrap();
        assert!(contexts.is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_slug_has_no_contexts() {
        let (db, _dir) = setup_db().await;
        let contexts = contexts_for(&db, "nobody", ChannelKind::Facebook).await.unwrap();
        assert!(contexts.is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_endpoint_per_tenant_is_rejected() {
        let (db, _dir) = setup_db().await;
        insert_tenant(&db, &make_tenant("t1", "acme", true)).await.unwrap();
        insert_connection(&db, &make_connection("c1", "t1", "whatsapp", "1555001"))
            .await
            .unwrap();
        let result =
            insert_connection(&db, &make_connection("c2", "t1", "whatsapp", "1555001")).await;
        assert!(result.is_err(), "UNIQUE(tenant, channel, endpoint) should hold");
        db.close().await.unwrap();
    }
}
