// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead identity lookup and race-safe creation.
//!
//! A lead carries one external-identity column per channel. Creation
//! relies on the partial unique indexes: losing an insert race is
//! answered by re-selecting the winner, never surfaced as an error.

use rusqlite::params;

use inlet_core::{ChannelKind, InletError};

use crate::database::Database;
use crate::models::Lead;

/// The leads column holding the external identity for a channel.
pub fn identity_column(channel: ChannelKind) -> &'static str {
    match channel {
        ChannelKind::Whatsapp => "phone",
        ChannelKind::Instagram => "instagram_id",
        ChannelKind::Facebook => "facebook_id",
        ChannelKind::Tiktok => "tiktok_id",
    }
}

const LEAD_COLUMNS: &str = "id, tenant_id, branch_id, name, phone, instagram_id, facebook_id,
    tiktok_id, email, source_channel, score, first_contact_at, deleted_at, created_at";

fn lead_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        branch_id: row.get(2)?,
        name: row.get(3)?,
        phone: row.get(4)?,
        instagram_id: row.get(5)?,
        facebook_id: row.get(6)?,
        tiktok_id: row.get(7)?,
        email: row.get(8)?,
        source_channel: row.get(9)?,
        score: row.get(10)?,
        first_contact_at: row.get(11)?,
        deleted_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

/// Find the live lead holding `external_id` on `channel` for a tenant.
///
/// Soft-deleted leads are never matched.
pub async fn find_by_identity(
    db: &Database,
    tenant_id: &str,
    channel: ChannelKind,
    external_id: &str,
) -> Result<Option<Lead>, InletError> {
    let tenant_id = tenant_id.to_string();
    let external_id = external_id.to_string();
    let column = identity_column(channel);
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {LEAD_COLUMNS} FROM leads
                 WHERE tenant_id = ?1 AND {column} = ?2 AND deleted_at IS NULL"
            );
            match conn.query_row(&sql, params![tenant_id, external_id], lead_from_row) {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a lead, or return the existing one if a concurrent insert won
/// the race on the same (tenant, channel identity).
///
/// Returns `(lead_id, created)`.
pub async fn insert_or_existing(
    db: &Database,
    lead: Lead,
    channel: ChannelKind,
) -> Result<(String, bool), InletError> {
    let column = identity_column(channel);
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO leads (
                    id, tenant_id, branch_id, name, phone, instagram_id,
                    facebook_id, tiktok_id, email, source_channel
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    lead.id,
                    lead.tenant_id,
                    lead.branch_id,
                    lead.name,
                    lead.phone,
                    lead.instagram_id,
                    lead.facebook_id,
                    lead.tiktok_id,
                    lead.email,
                    lead.source_channel,
                ],
            );

            match inserted {
                Ok(_) => Ok((lead.id, true)),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    // Someone else just created this identity -- re-select.
                    let external_id = match channel {
                        ChannelKind::Whatsapp => lead.phone.as_deref(),
                        ChannelKind::Instagram => lead.instagram_id.as_deref(),
                        ChannelKind::Facebook => lead.facebook_id.as_deref(),
                        ChannelKind::Tiktok => lead.tiktok_id.as_deref(),
                    }
                    .unwrap_or_default()
                    .to_string();
                    let sql = format!(
                        "SELECT id FROM leads
                         WHERE tenant_id = ?1 AND {column} = ?2 AND deleted_at IS NULL"
                    );
                    let id: String = conn.query_row(
                        &sql,
                        params![lead.tenant_id, external_id],
                        |row| row.get(0),
                    )?;
                    Ok((id, false))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a live lead in the tenant by phone or email, preferring phone.
///
/// Feeds the best-effort cross-channel identity link.
pub async fn find_by_contact(
    db: &Database,
    tenant_id: &str,
    phone: Option<&str>,
    email: Option<&str>,
) -> Result<Option<Lead>, InletError> {
    let tenant_id = tenant_id.to_string();
    let phone = phone.map(str::to_string);
    let email = email.map(str::to_string);
    db.connection()
        .call(move |conn| {
            for (column, value) in [("phone", phone), ("email", email)] {
                let Some(value) = value else { continue };
                let sql = format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE tenant_id = ?1 AND {column} = ?2 AND deleted_at IS NULL"
                );
                match conn.query_row(&sql, params![tenant_id, value], lead_from_row) {
                    Ok(lead) => return Ok(Some(lead)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(None)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Attach a channel identity to an existing lead (cross-channel link).
pub async fn attach_identity(
    db: &Database,
    lead_id: &str,
    channel: ChannelKind,
    external_id: &str,
) -> Result<(), InletError> {
    let lead_id = lead_id.to_string();
    let external_id = external_id.to_string();
    let column = identity_column(channel);
    db.connection()
        .call(move |conn| {
            let sql = format!("UPDATE leads SET {column} = ?1 WHERE id = ?2");
            conn.execute(&sql, params![external_id, lead_id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a lead by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Lead>, InletError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1");
            match conn.query_row(&sql, params![id], lead_from_row) {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Soft-delete a lead. Its identities become reusable immediately.
pub async fn soft_delete(db: &Database, id: &str) -> Result<(), InletError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE leads SET deleted_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
