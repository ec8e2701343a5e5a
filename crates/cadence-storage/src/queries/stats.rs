// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily send snapshots.
//!
//! Live counts are always derived from `email_sends`; this table only keeps
//! a per-day history written by the midnight job.

use cadence_core::CadenceError;
use rusqlite::params;
use serde::Serialize;

use crate::database::Database;

/// One snapshot row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySendStat {
    pub day: String,
    pub scope: String,
    pub scope_id: String,
    pub sent_count: u32,
}

/// Snapshot the sent counts of `[start, end)` under `day`.
///
/// Existing rows for the same day are left untouched, so running the job
/// twice is harmless. Returns the number of rows written.
pub async fn snapshot_day(
    db: &Database,
    day: &str,
    start: &str,
    end: &str,
    now: &str,
) -> Result<usize, CadenceError> {
    let (day, start, end, now) = (
        day.to_string(),
        start.to_string(),
        end.to_string(),
        now.to_string(),
    );
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let campaigns = tx.execute(
                "INSERT OR IGNORE INTO daily_send_stats (day, scope, scope_id, sent_count, recorded_at)
                 SELECT ?1, 'campaign', campaign_id, COUNT(*), ?4 FROM email_sends
                 WHERE status = 'sent' AND sent_at >= ?2 AND sent_at < ?3
                 GROUP BY campaign_id",
                params![day, start, end, now],
            )?;
            let tenants = tx.execute(
                "INSERT OR IGNORE INTO daily_send_stats (day, scope, scope_id, sent_count, recorded_at)
                 SELECT ?1, 'tenant', tenant_id, COUNT(*), ?4 FROM email_sends
                 WHERE status = 'sent' AND sent_at >= ?2 AND sent_at < ?3
                 GROUP BY tenant_id",
                params![day, start, end, now],
            )?;
            tx.commit()?;
            Ok(campaigns + tenants)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Snapshot rows for one day.
pub async fn for_day(db: &Database, day: &str) -> Result<Vec<DailySendStat>, CadenceError> {
    let day = day.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT day, scope, scope_id, sent_count FROM daily_send_stats
                 WHERE day = ?1 ORDER BY scope, scope_id",
            )?;
            let rows = stmt.query_map(params![day], |row| {
                Ok(DailySendStat {
                    day: row.get(0)?,
                    scope: row.get(1)?,
                    scope_id: row.get(2)?,
                    sent_count: row.get(3)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
