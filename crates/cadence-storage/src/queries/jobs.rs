// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retryable job rows.
//!
//! Claiming is a transaction that flips due `pending` rows to `processing`
//! with a lock deadline; a crashed worker's jobs return to `pending` once the
//! deadline passes (see [`recover_expired`]).

use cadence_core::CadenceError;
use cadence_core::types::JobType;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{JOB_COLUMNS, RetryableJob, job_from_row};

/// Create a pending job eligible at `next_attempt_at`.
pub async fn create_job(
    db: &Database,
    job_type: JobType,
    payload: &str,
    max_attempts: u32,
    next_attempt_at: &str,
    last_error: Option<&str>,
    now: &str,
) -> Result<i64, CadenceError> {
    let payload = payload.to_string();
    let next_attempt_at = next_attempt_at.to_string();
    let last_error = last_error.map(str::to_string);
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO retry_jobs (job_type, payload, status, attempts, max_attempts,
                                         next_attempt_at, last_error, created_at, updated_at)
                 VALUES (?1, ?2, 'pending', 0, ?3, ?4, ?5, ?6, ?6)",
                params![
                    job_type.to_string(),
                    payload,
                    max_attempts,
                    next_attempt_at,
                    last_error,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a job by ID.
pub async fn get_job(db: &Database, id: i64) -> Result<Option<RetryableJob>, CadenceError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM retry_jobs WHERE id = ?1"),
                params![id],
                job_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Claim up to `limit` due jobs, oldest due first, locking them until `locked_until`.
pub async fn claim_due(
    db: &Database,
    now: &str,
    locked_until: &str,
    limit: u32,
) -> Result<Vec<RetryableJob>, CadenceError> {
    let (now, locked_until) = (now.to_string(), locked_until.to_string());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let jobs = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM retry_jobs
                     WHERE status = 'pending' AND next_attempt_at <= ?1
                     ORDER BY next_attempt_at ASC, id ASC
                     LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![now, limit], job_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            let mut claimed = Vec::with_capacity(jobs.len());
            for mut job in jobs {
                let n = tx.execute(
                    "UPDATE retry_jobs SET status = 'processing', locked_until = ?1, updated_at = ?2
                     WHERE id = ?3 AND status = 'pending'",
                    params![locked_until, now, job.id],
                )?;
                if n == 1 {
                    job.status = cadence_core::types::JobStatus::Processing;
                    job.locked_until = Some(locked_until.clone());
                    claimed.push(job);
                }
            }
            tx.commit()?;
            Ok(claimed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Terminal success. The row is kept (archived) with status `succeeded`.
pub async fn mark_succeeded(db: &Database, id: i64, now: &str) -> Result<bool, CadenceError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE retry_jobs
                 SET status = 'succeeded', attempts = attempts + 1, locked_until = NULL,
                     last_error = NULL, updated_at = ?1
                 WHERE id = ?2 AND status = 'processing'",
                params![now, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Failed attempt with budget left: back to `pending` at `next_attempt_at`.
pub async fn reschedule(
    db: &Database,
    id: i64,
    attempts: u32,
    next_attempt_at: &str,
    error: &str,
    now: &str,
) -> Result<bool, CadenceError> {
    let (next_attempt_at, error, now) =
        (next_attempt_at.to_string(), error.to_string(), now.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE retry_jobs
                 SET status = 'pending', attempts = ?1, next_attempt_at = ?2, last_error = ?3,
                     locked_until = NULL, updated_at = ?4
                 WHERE id = ?5 AND status = 'processing'",
                params![attempts, next_attempt_at, error, now, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Budget exhausted (or unrecoverable): permanently `failed` with a reason.
pub async fn mark_failed(
    db: &Database,
    id: i64,
    attempts: u32,
    error: &str,
    reason: &str,
    now: &str,
) -> Result<bool, CadenceError> {
    let (error, reason, now) = (error.to_string(), reason.to_string(), now.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE retry_jobs
                 SET status = 'failed', attempts = ?1, last_error = ?2, failure_reason = ?3,
                     locked_until = NULL, updated_at = ?4
                 WHERE id = ?5 AND status = 'processing'",
                params![attempts, error, reason, now, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Operator retry: any non-processing job goes back to `pending`, due now,
/// with a fresh attempt budget.
pub async fn retry_now(db: &Database, id: i64, now: &str) -> Result<bool, CadenceError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE retry_jobs
                 SET status = 'pending', attempts = 0, next_attempt_at = ?1,
                     failure_reason = NULL, locked_until = NULL, updated_at = ?1
                 WHERE id = ?2 AND status IN ('pending', 'failed', 'succeeded')",
                params![now, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Permanently failed jobs, most recent first.
pub async fn list_failed(db: &Database, limit: u32) -> Result<Vec<RetryableJob>, CadenceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM retry_jobs
                 WHERE status = 'failed'
                 ORDER BY updated_at DESC
                 LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], job_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Return `processing` jobs whose lock deadline passed to `pending`.
pub async fn recover_expired(db: &Database, now: &str) -> Result<usize, CadenceError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE retry_jobs
                 SET status = 'pending', locked_until = NULL, updated_at = ?1
                 WHERE status = 'processing' AND locked_until IS NOT NULL AND locked_until <= ?1",
                params![now],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
