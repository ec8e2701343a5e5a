// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign template pool.

use cadence_core::CadenceError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{TEMPLATE_COLUMNS, Template, template_from_row};

/// Add a template to a campaign's pool.
pub async fn create_template(db: &Database, template: &Template) -> Result<(), CadenceError> {
    let template = template.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO templates ({TEMPLATE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    template.id,
                    template.campaign_id,
                    template.name,
                    template.step_number,
                    template.segment,
                    template.subject_template,
                    template.body_template,
                    template.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The whole pool for a campaign, newest first.
pub async fn list_for_campaign(
    db: &Database,
    campaign_id: &str,
) -> Result<Vec<Template>, CadenceError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TEMPLATE_COLUMNS} FROM templates
                 WHERE campaign_id = ?1
                 ORDER BY created_at DESC, id ASC"
            ))?;
            let rows = stmt.query_map(params![campaign_id], template_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
