// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant CRUD operations.

use cadence_core::CadenceError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{TENANT_COLUMNS, Tenant, tenant_from_row};

/// Create a tenant.
pub async fn create_tenant(db: &Database, tenant: &Tenant) -> Result<(), CadenceError> {
    let tenant = tenant.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenants (id, name, daily_send_limit, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    tenant.id,
                    tenant.name,
                    tenant.daily_send_limit,
                    tenant.created_at
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a tenant by ID.
pub async fn get_tenant(db: &Database, id: &str) -> Result<Option<Tenant>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1"),
                params![id],
                tenant_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Change a tenant's daily send ceiling (`None` = unlimited).
pub async fn set_daily_send_limit(
    db: &Database,
    id: &str,
    limit: Option<u32>,
) -> Result<bool, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tenants SET daily_send_limit = ?1 WHERE id = ?2",
                params![limit, id],
            )?;
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
    async fn create_and_update_limit() {
        let db = fixtures::db().await;
        fixtures::tenant(&db, "t-1", None).await;

        assert!(set_daily_send_limit(&db, "t-1", Some(50)).await.unwrap());
        let tenant = get_tenant(&db, "t-1").await.unwrap().unwrap();
        assert_eq!(tenant.daily_send_limit, Some(50));
        assert!(get_tenant(&db, "t-missing").await.unwrap().is_none());
    }
}
