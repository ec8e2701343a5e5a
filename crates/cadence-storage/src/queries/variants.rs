// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A/B variants and their per-enrollment assignments.

use cadence_core::CadenceError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{VARIANT_COLUMNS, Variant, variant_from_row};
use crate::queries::aliased;

/// Create a variant.
pub async fn create_variant(db: &Database, variant: &Variant) -> Result<(), CadenceError> {
    let variant = variant.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO variants ({VARIANT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    variant.id,
                    variant.campaign_id,
                    variant.key,
                    variant.subject_template,
                    variant.body_template,
                    variant.weight,
                    variant.active,
                    variant.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active variants of a campaign in a stable order (by key).
pub async fn list_active(db: &Database, campaign_id: &str) -> Result<Vec<Variant>, CadenceError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VARIANT_COLUMNS} FROM variants
                 WHERE campaign_id = ?1 AND active = 1
                 ORDER BY key ASC"
            ))?;
            let rows = stmt.query_map(params![campaign_id], variant_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Turn a variant on or off. Existing assignments are unaffected.
pub async fn set_active(db: &Database, id: &str, active: bool) -> Result<bool, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE variants SET active = ?1 WHERE id = ?2",
                params![active, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The variant already assigned to an enrollment, if any.
pub async fn get_assignment(
    db: &Database,
    campaign_lead_id: &str,
) -> Result<Option<Variant>, CadenceError> {
    let campaign_lead_id = campaign_lead_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM variant_assignments a
                     JOIN variants v ON v.id = a.variant_id
                     WHERE a.campaign_lead_id = ?1",
                    aliased(VARIANT_COLUMNS, "v")
                ),
                params![campaign_lead_id],
                variant_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Store `variant_id` for the enrollment unless one is already stored, then
/// return whichever variant is stored. One statement decides the winner, so
/// concurrent callers always agree.
pub async fn assign_if_absent(
    db: &Database,
    campaign_lead_id: &str,
    variant_id: &str,
    now: &str,
) -> Result<Variant, CadenceError> {
    let (campaign_lead_id, variant_id, now) = (
        campaign_lead_id.to_string(),
        variant_id.to_string(),
        now.to_string(),
    );
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO variant_assignments (campaign_lead_id, variant_id, assigned_at)
                 VALUES (?1, ?2, ?3)",
                params![campaign_lead_id, variant_id, now],
            )?;
            conn.query_row(
                &format!(
                    "SELECT {} FROM variant_assignments a
                     JOIN variants v ON v.id = a.variant_id
                     WHERE a.campaign_lead_id = ?1",
                    aliased(VARIANT_COLUMNS, "v")
                ),
                params![campaign_lead_id],
                variant_from_row,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
