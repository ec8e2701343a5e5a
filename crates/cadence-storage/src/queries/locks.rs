// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing locks. The primary key on `lead_id` is the mutual exclusion:
//! acquiring is a single insert, never check-then-insert.

use cadence_core::CadenceError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::RoutingLock;

/// Try to take the lock on `lead_id`. Returns `false` if someone holds it.
pub async fn try_acquire(
    db: &Database,
    lead_id: &str,
    holder_id: &str,
    now: &str,
) -> Result<bool, CadenceError> {
    let (lead_id, holder_id, now) = (lead_id.to_string(), holder_id.to_string(), now.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO routing_locks (lead_id, holder_id, acquired_at)
                 VALUES (?1, ?2, ?3)",
                params![lead_id, holder_id, now],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Release a lock, but only if `holder_id` still holds it.
pub async fn release(db: &Database, lead_id: &str, holder_id: &str) -> Result<bool, CadenceError> {
    let (lead_id, holder_id) = (lead_id.to_string(), holder_id.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM routing_locks WHERE lead_id = ?1 AND holder_id = ?2",
                params![lead_id, holder_id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Current holder of a lock, if any.
pub async fn get_lock(db: &Database, lead_id: &str) -> Result<Option<RoutingLock>, CadenceError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT lead_id, holder_id, acquired_at FROM routing_locks WHERE lead_id = ?1",
                params![lead_id],
                |row| {
                    Ok(RoutingLock {
                        lead_id: row.get(0)?,
                        holder_id: row.get(1)?,
                        acquired_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete every lock acquired at or before `cutoff`, whoever holds it.
pub async fn release_stale(db: &Database, cutoff: &str) -> Result<usize, CadenceError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM routing_locks WHERE acquired_at <= ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[tokio::test]
    async fn second_holder_is_refused() {
        let db = fixtures::db().await;
        let now = fixtures::now();
        assert!(try_acquire(&db, "l-1", "worker-a", &now).await.unwrap());
        assert!(!try_acquire(&db, "l-1", "worker-b", &now).await.unwrap());

        // Only the holder can release.
        assert!(!release(&db, "l-1", "worker-b").await.unwrap());
        assert!(release(&db, "l-1", "worker-a").await.unwrap());
        assert!(try_acquire(&db, "l-1", "worker-b", &now).await.unwrap());
    }

    #[tokio::test]
    async fn stale_locks_are_released() {
        let db = fixtures::db().await;
        try_acquire(&db, "l-old", "crashed", "2026-03-01T10:00:00.000Z")
            .await
            .unwrap();
        try_acquire(&db, "l-new", "alive", "2026-03-01T10:09:00.000Z")
            .await
            .unwrap();

        let released = release_stale(&db, "2026-03-01T10:05:00.000Z").await.unwrap();
        assert_eq!(released, 1);
        assert!(get_lock(&db, "l-old").await.unwrap().is_none());
        assert_eq!(get_lock(&db, "l-new").await.unwrap().unwrap().holder_id, "alive");
    }
}
