// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign CRUD and lifecycle writes.

use cadence_core::types::CampaignStatus;
use cadence_core::{CadenceError, CampaignSettings};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{CAMPAIGN_COLUMNS, Campaign, campaign_from_row};

/// Create a campaign.
pub async fn create_campaign(db: &Database, campaign: &Campaign) -> Result<(), CadenceError> {
    let campaign = campaign.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO campaigns (id, tenant_id, name, status, total_steps,
                                        auto_send_approved, daily_send_limit, settings,
                                        starts_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    campaign.id,
                    campaign.tenant_id,
                    campaign.name,
                    campaign.status.to_string(),
                    campaign.total_steps,
                    campaign.auto_send_approved,
                    campaign.daily_send_limit,
                    campaign.settings.to_json(),
                    campaign.starts_at,
                    campaign.created_at,
                    campaign.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a campaign by ID.
pub async fn get_campaign(db: &Database, id: &str) -> Result<Option<Campaign>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id],
                campaign_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List campaigns in one status, oldest first.
pub async fn list_by_status(
    db: &Database,
    status: CampaignStatus,
) -> Result<Vec<Campaign>, CadenceError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE status = ?1 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![status], campaign_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Scheduled campaigns whose start time has passed (or that have none).
pub async fn list_startable(db: &Database, now: &str) -> Result<Vec<Campaign>, CadenceError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE status = 'scheduled' AND (starts_at IS NULL OR starts_at <= ?1)
                 ORDER BY starts_at ASC"
            ))?;
            let rows = stmt.query_map(params![now], campaign_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move a campaign from `from` to `to`. Returns `false` if the campaign was
/// not in `from` (someone else already moved it).
pub async fn transition_status(
    db: &Database,
    id: &str,
    from: CampaignStatus,
    to: CampaignStatus,
    now: &str,
) -> Result<bool, CadenceError> {
    let (id, now) = (id.to_string(), now.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE campaigns SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![to.to_string(), now, id, from.to_string()],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Replace the settings blob.
pub async fn update_settings(
    db: &Database,
    id: &str,
    settings: &CampaignSettings,
    now: &str,
) -> Result<bool, CadenceError> {
    let (id, now, json) = (id.to_string(), now.to_string(), settings.to_json());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE campaigns SET settings = ?1, updated_at = ?2 WHERE id = ?3",
                params![json, now, id],
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
    async fn conditional_transition_applies_once() {
        let db = fixtures::db().await;
        fixtures::tenant(&db, "t-1", None).await;
        fixtures::campaign(&db, "t-1", "c-1", CampaignStatus::Scheduled, 3).await;
        let now = fixtures::now();

        assert!(
            transition_status(&db, "c-1", CampaignStatus::Scheduled, CampaignStatus::Active, &now)
                .await
                .unwrap()
        );
        assert!(
            !transition_status(&db, "c-1", CampaignStatus::Scheduled, CampaignStatus::Active, &now)
                .await
                .unwrap()
        );
        let active = list_by_status(&db, CampaignStatus::Active).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].total_steps, 3);
    }

    #[tokio::test]
    async fn startable_respects_starts_at() {
        let db = fixtures::db().await;
        fixtures::tenant(&db, "t-1", None).await;
        let mut later = fixtures::campaign(&db, "t-1", "c-now", CampaignStatus::Scheduled, 1).await;
        later.id = "c-later".into();
        later.starts_at = Some("2999-01-01T00:00:00.000Z".into());
        create_campaign(&db, &later).await.unwrap();

        let startable = list_startable(&db, &fixtures::now()).await.unwrap();
        let ids: Vec<_> = startable.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c-now"]);
    }

    #[tokio::test]
    async fn settings_round_trip_through_json_column() {
        let db = fixtures::db().await;
        fixtures::tenant(&db, "t-1", None).await;
        fixtures::campaign(&db, "t-1", "c-1", CampaignStatus::Draft, 2).await;

        let mut settings = CampaignSettings::default();
        settings.send_window.timezone = "Europe/Berlin".into();
        settings.value_props = vec!["faster onboarding".into()];
        update_settings(&db, "c-1", &settings, &fixtures::now())
            .await
            .unwrap();

        let campaign = get_campaign(&db, "c-1").await.unwrap().unwrap();
        assert_eq!(campaign.settings, settings);
    }
}
