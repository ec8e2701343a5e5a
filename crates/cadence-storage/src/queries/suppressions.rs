// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suppression list. Append-only: entries are inserted, never updated.

use cadence_core::CadenceError;
use cadence_core::types::{SuppressionKind, SuppressionReason};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{SUPPRESSION_COLUMNS, SuppressionEntry, suppression_from_row};

/// Append a suppression entry. Values are stored lowercased.
pub async fn add(
    db: &Database,
    tenant_id: Option<&str>,
    value: &str,
    kind: SuppressionKind,
    reason: SuppressionReason,
    expires_at: Option<&str>,
    now: &str,
) -> Result<i64, CadenceError> {
    let tenant_id = tenant_id.map(str::to_string);
    let value = value.trim().to_ascii_lowercase();
    let expires_at = expires_at.map(str::to_string);
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO suppressions (tenant_id, value, kind, reason, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    tenant_id,
                    value,
                    kind.to_string(),
                    reason.to_string(),
                    expires_at,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The oldest entry currently blocking `address` or `domain` for a tenant.
///
/// Global entries (no tenant) apply to everyone. Entries whose `expires_at`
/// is at or before `now` no longer match.
pub async fn find_active(
    db: &Database,
    tenant_id: &str,
    address: &str,
    domain: Option<&str>,
    now: &str,
) -> Result<Option<SuppressionEntry>, CadenceError> {
    let tenant_id = tenant_id.to_string();
    let address = address.to_string();
    let domain = domain.map(str::to_string);
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {SUPPRESSION_COLUMNS} FROM suppressions
                     WHERE ((kind = 'address' AND value = ?1)
                            OR (kind = 'domain' AND ?2 IS NOT NULL AND value = ?2))
                       AND (tenant_id IS NULL OR tenant_id = ?3)
                       AND (expires_at IS NULL OR expires_at > ?4)
                     ORDER BY id ASC
                     LIMIT 1"
                ),
                params![address, domain, tenant_id, now],
                suppression_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All entries, newest first.
pub async fn list(db: &Database, limit: u32) -> Result<Vec<SuppressionEntry>, CadenceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUPPRESSION_COLUMNS} FROM suppressions ORDER BY id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], suppression_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[tokio::test]
    async fn address_match_is_case_insensitive_and_tenant_scoped() {
        let db = fixtures::db().await;
        let now = fixtures::now();
        add(
            &db,
            Some("t-1"),
            " Ada@Acme.test ",
            SuppressionKind::Address,
            SuppressionReason::Unsubscribed,
            None,
            &now,
        )
        .await
        .unwrap();

        let hit = find_active(&db, "t-1", "ada@acme.test", Some("acme.test"), &now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.reason, SuppressionReason::Unsubscribed);
        assert!(
            find_active(&db, "t-2", "ada@acme.test", Some("acme.test"), &now)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn global_domain_entry_and_expiry() {
        let db = fixtures::db().await;
        add(
            &db,
            None,
            "spam.test",
            SuppressionKind::Domain,
            SuppressionReason::Complained,
            Some("2026-06-01T00:00:00.000Z"),
            "2026-01-01T00:00:00.000Z",
        )
        .await
        .unwrap();

        let before = find_active(&db, "t-9", "x@spam.test", Some("spam.test"), "2026-05-31T23:59:59.000Z")
            .await
            .unwrap();
        assert!(before.is_some());
        let after = find_active(&db, "t-9", "x@spam.test", Some("spam.test"), "2026-06-01T00:00:00.000Z")
            .await
            .unwrap();
        assert!(after.is_none());
        assert_eq!(list(&db, 10).await.unwrap().len(), 1);
    }
}
