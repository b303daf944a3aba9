// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tempdir database harness with seeding helpers.

use tempfile::TempDir;

use inlet_storage::models::{ChannelConnection, Tenant};
use inlet_storage::queries::connections::{insert_connection, insert_tenant};
use inlet_storage::Database;

/// A fresh migrated database in a tempdir, dropped with the test.
pub struct TestDb {
    pub db: Database,
    _dir: TempDir,
}

impl TestDb {
    /// Open a fresh database.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("inlet-test.db");
        let db = Database::open(path.to_str().unwrap()).await.expect("open test db");
        Self { db, _dir: dir }
    }

    /// Seed an active tenant.
    pub async fn seed_tenant(&self, id: &str, slug: &str) {
        insert_tenant(
            &self.db,
            &Tenant {
                id: id.to_string(),
                slug: slug.to_string(),
                name: format!("{slug} inc"),
                active: true,
                created_at: String::new(),
            },
        )
        .await
        .expect("seed tenant");
    }

    /// Seed a connected channel connection.
    pub async fn seed_connection(&self, seed: ConnectionSeed) {
        insert_connection(
            &self.db,
            &ChannelConnection {
                id: seed.id,
                tenant_id: seed.tenant_id,
                branch_id: None,
                channel: seed.channel,
                endpoint_id: seed.endpoint_id,
                access_token: seed.access_token,
                app_secret: seed.app_secret,
                webhook_verify_token: seed.webhook_verify_token,
                status: "connected".to_string(),
                ai_enabled: seed.ai_enabled,
                ai_personality: None,
                custom_instructions: None,
                first_message_delay_secs: seed.first_message_delay_secs,
                subsequent_message_delay_secs: seed.subsequent_message_delay_secs,
            },
        )
        .await
        .expect("seed connection");
    }

    /// Row count of one of the domain tables.
    pub async fn count(&self, table: &str) -> i64 {
        assert!(
            ["tenants", "channel_connections", "leads", "conversations", "messages", "jobs"]
                .contains(&table),
            "unknown table {table}"
        );
        let sql = format!("SELECT COUNT(*) FROM {table}");
        self.db
            .connection()
            .call(move |conn| {
                let n = conn.query_row(&sql, [], |row| row.get(0))?;
                Ok::<i64, tokio_rusqlite::Error>(n)
            })
            .await
            .expect("count")
    }
}

/// Inputs for [`TestDb::seed_connection`], with workable defaults.
#[derive(Debug, Clone)]
pub struct ConnectionSeed {
    pub id: String,
    pub tenant_id: String,
    pub channel: String,
    pub endpoint_id: String,
    pub access_token: String,
    pub app_secret: String,
    pub webhook_verify_token: Option<String>,
    pub ai_enabled: bool,
    pub first_message_delay_secs: i64,
    pub subsequent_message_delay_secs: i64,
}

impl Default for ConnectionSeed {
    fn default() -> Self {
        Self {
            id: "conn-1".to_string(),
            tenant_id: "t1".to_string(),
            channel: "whatsapp".to_string(),
            endpoint_id: "1555001".to_string(),
            access_token: "test-token".to_string(),
            app_secret: "test-secret".to_string(),
            webhook_verify_token: Some("verify-token".to_string()),
            ai_enabled: true,
            first_message_delay_secs: 30,
            subsequent_message_delay_secs: 10,
        }
    }
}
