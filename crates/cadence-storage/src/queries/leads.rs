// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead CRUD operations.

use cadence_core::CadenceError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{LEAD_COLUMNS, Lead, lead_from_row};

/// Create a lead.
pub async fn create_lead(db: &Database, lead: &Lead) -> Result<(), CadenceError> {
    let lead = lead.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO leads (id, tenant_id, email, first_name, last_name, company,
                                    title, timezone, segment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    lead.id,
                    lead.tenant_id,
                    lead.email,
                    lead.first_name,
                    lead.last_name,
                    lead.company,
                    lead.title,
                    lead.timezone,
                    lead.segment,
                    lead.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a lead by ID.
pub async fn get_lead(db: &Database, id: &str) -> Result<Option<Lead>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                params![id],
                lead_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a lead. Its enrollments and sends cascade.
pub async fn delete_lead(db: &Database, id: &str) -> Result<bool, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute("DELETE FROM leads WHERE id = ?1", params![id])?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[tokio::test]
    async fn create_get_delete() {
        let db = fixtures::db().await;
        fixtures::tenant(&db, "t-1", None).await;
        fixtures::lead(&db, "t-1", "l-1", "ada@acme.test").await;

        let lead = get_lead(&db, "l-1").await.unwrap().unwrap();
        assert_eq!(lead.email, "ada@acme.test");
        assert_eq!(lead.company.as_deref(), Some("Acme"));

        assert!(delete_lead(&db, "l-1").await.unwrap());
        assert!(get_lead(&db, "l-1").await.unwrap().is_none());
        assert!(!delete_lead(&db, "l-1").await.unwrap());
    }
}
