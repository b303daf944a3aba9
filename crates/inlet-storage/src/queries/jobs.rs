// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job queue operations for crash-safe downstream processing.
//!
//! The ingestion path only enqueues; the dequeue/ack/fail side is
//! consumed by the external AI-response and send workers.

use rusqlite::params;

use inlet_core::InletError;

use crate::database::Database;
use crate::models::JobRecord;

/// Inputs for [`enqueue`].
#[derive(Debug, Clone)]
pub struct NewJob {
    pub tenant_id: String,
    pub job_type: String,
    pub payload: String,
    pub priority: i64,
    pub max_attempts: i64,
    /// RFC3339 UTC instant before which the job must not be dequeued.
    pub scheduled_for: String,
}

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        job_type: row.get(2)?,
        payload: row.get(3)?,
        status: row.get(4)?,
        priority: row.get(5)?,
        attempts: row.get(6)?,
        max_attempts: row.get(7)?,
        scheduled_for: row.get(8)?,
        locked_until: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const JOB_COLUMNS: &str = "id, tenant_id, job_type, payload, status, priority, attempts,
    max_attempts, scheduled_for, locked_until, created_at, updated_at";

/// Enqueue a new job. Returns the auto-generated job id.
pub async fn enqueue(db: &Database, job: NewJob) -> Result<i64, InletError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO jobs (tenant_id, job_type, payload, priority, max_attempts, scheduled_for)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    job.tenant_id,
                    job.job_type,
                    job.payload,
                    job.priority,
                    job.max_attempts,
                    job.scheduled_for,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dequeue the next due pending job of the given type.
///
/// Atomically selects the highest-priority, oldest due entry
/// (`scheduled_for <= now`) and marks it "processing" with a 5-minute
/// lock. Returns `None` when nothing is due.
pub async fn dequeue_due(db: &Database, job_type: &str) -> Result<Option<JobRecord>, InletError> {
    let job_type = job_type.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let sql = format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     WHERE job_type = ?1 AND status = 'pending'
                       AND scheduled_for <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     ORDER BY priority DESC, scheduled_for ASC, id ASC
                     LIMIT 1"
                );
                let mut stmt = tx.prepare(&sql)?;
                stmt.query_row(params![job_type], job_from_row)
            };

            match result {
                Ok(job) => {
                    tx.execute(
                        "UPDATE jobs SET status = 'processing',
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+5 minutes'),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![job.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(JobRecord {
                        status: "processing".to_string(),
                        ..job
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acknowledge successful processing: marks the job "done".
pub async fn ack(db: &Database, id: i64) -> Result<(), InletError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'done', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a job attempt as failed.
///
/// Increments attempts. At `max_attempts` the job goes to "failed";
/// otherwise it returns to "pending" for retry with the lock cleared.
pub async fn fail(db: &Database, id: i64) -> Result<(), InletError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i64, i64) = conn.query_row(
                "SELECT attempts, max_attempts FROM jobs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            let status = if new_attempts >= max_attempts { "failed" } else { "pending" };
            conn.execute(
                "UPDATE jobs SET status = ?1, attempts = ?2, locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![status, new_attempts, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Return "processing" jobs whose lock expired back to "pending".
///
/// Called on startup to recover jobs orphaned by a worker crash.
pub async fn release_stale(db: &Database) -> Result<u64, InletError> {
    db.connection()
        .call(|conn| {
            let count = conn.execute(
                "UPDATE jobs SET status = 'pending', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE status = 'processing'
                   AND locked_until IS NOT NULL
                   AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                [],
            )?;
            Ok(count as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a job by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<JobRecord>, InletError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
            match conn.query_row(&sql, params![id], job_from_row) {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
