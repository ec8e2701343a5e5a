// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash-safe work queue between the scheduler and the workers.
//!
//! Entries survive a restart: a `processing` entry whose lock expired is put
//! back to `pending` by [`recover_expired`].

use cadence_core::CadenceError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{QUEUE_COLUMNS, QueueEntry, queue_entry_from_row};

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(db: &Database, queue_name: &str, payload: &str) -> Result<i64, CadenceError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload) VALUES (?1, ?2)",
                params![queue_name, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dequeue the oldest pending entry, marking it `processing` for `lock_secs`.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    lock_secs: u64,
) -> Result<Option<QueueEntry>, CadenceError> {
    let queue_name = queue_name.to_string();
    let lock = format!("+{lock_secs} seconds");
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = tx.query_row(
                &format!(
                    "SELECT {QUEUE_COLUMNS} FROM queue
                     WHERE queue_name = ?1 AND status = 'pending'
                     ORDER BY id ASC
                     LIMIT 1"
                ),
                params![queue_name],
                queue_entry_from_row,
            );

            match result {
                Ok(entry) => {
                    tx.execute(
                        "UPDATE queue SET status = 'processing',
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?2",
                        params![lock, entry.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(QueueEntry {
                        status: "processing".to_string(),
                        ..entry
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark an entry `completed`.
pub async fn ack(db: &Database, id: i64) -> Result<(), CadenceError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count a failed attempt. Below `max_attempts` the entry goes back to
/// `pending`; at the limit it becomes `failed`. Returns `true` if it failed
/// for good.
pub async fn fail(db: &Database, id: i64) -> Result<bool, CadenceError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i32, i32) = conn.query_row(
                "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            let exhausted = new_attempts >= max_attempts;
            conn.execute(
                "UPDATE queue SET status = ?1, attempts = ?2, locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![
                    if exhausted { "failed" } else { "pending" },
                    new_attempts,
                    id
                ],
            )?;
            Ok(exhausted)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Put `processing` entries whose lock expired back to `pending`.
pub async fn recover_expired(db: &Database) -> Result<usize, CadenceError> {
    db.connection()
        .call(|conn| {
            conn.execute(
                "UPDATE queue SET status = 'pending', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE status = 'processing'
                   AND locked_until <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                [],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of pending entries in a queue.
pub async fn pending_count(db: &Database, queue_name: &str) -> Result<u64, CadenceError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM queue WHERE queue_name = ?1 AND status = 'pending'",
                params![queue_name],
                |row| row.get(0),
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
    async fn fifo_per_queue() {
        let db = fixtures::db().await;
        let first = enqueue(&db, "compose", r#"{"n":1}"#).await.unwrap();
        enqueue(&db, "dispatch", r#"{"n":2}"#).await.unwrap();
        enqueue(&db, "compose", r#"{"n":3}"#).await.unwrap();

        let entry = dequeue(&db, "compose", 300).await.unwrap().unwrap();
        assert_eq!(entry.id, first);
        assert_eq!(entry.status, "processing");
        ack(&db, entry.id).await.unwrap();

        let entry = dequeue(&db, "compose", 300).await.unwrap().unwrap();
        assert_eq!(entry.payload, r#"{"n":3}"#);
        assert!(dequeue(&db, "compose", 300).await.unwrap().is_none());
        assert_eq!(pending_count(&db, "dispatch").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fail_requeues_until_max_attempts() {
        let db = fixtures::db().await;
        let id = enqueue(&db, "compose", "{}").await.unwrap();

        for _ in 0..2 {
            dequeue(&db, "compose", 300).await.unwrap().unwrap();
            assert!(!fail(&db, id).await.unwrap());
        }
        dequeue(&db, "compose", 300).await.unwrap().unwrap();
        assert!(fail(&db, id).await.unwrap());
        assert!(dequeue(&db, "compose", 300).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_lock_entries_are_recovered() {
        let db = fixtures::db().await;
        enqueue(&db, "dispatch", "{}").await.unwrap();
        dequeue(&db, "dispatch", 0).await.unwrap().unwrap();
        assert_eq!(recover_expired(&db).await.unwrap(), 1);
        assert!(dequeue(&db, "dispatch", 300).await.unwrap().is_some());
    }
}
