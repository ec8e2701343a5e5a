// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign lifecycle operations.

use cadence_bus::{BusEvent, EventBus};
use cadence_core::time::format_ts;
use cadence_core::types::{Campaign, CampaignStatus};
use cadence_core::{CadenceError, CampaignEvent};
use cadence_storage::Database;
use cadence_storage::queries::campaigns;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Moves campaigns through their transition table and announces each change.
#[derive(Clone)]
pub struct CampaignLifecycle {
    db: Database,
    bus: EventBus,
}

impl CampaignLifecycle {
    pub fn new(db: Database, bus: EventBus) -> Self {
        Self { db, bus }
    }

    pub async fn schedule(&self, id: &str, now: DateTime<Utc>) -> Result<CampaignStatus, CadenceError> {
        self.apply(id, CampaignEvent::Schedule, now).await
    }

    /// Activation validates the campaign's settings first.
    pub async fn activate(&self, id: &str, now: DateTime<Utc>) -> Result<CampaignStatus, CadenceError> {
        self.apply(id, CampaignEvent::Activate, now).await
    }

    pub async fn pause(&self, id: &str, now: DateTime<Utc>) -> Result<CampaignStatus, CadenceError> {
        self.apply(id, CampaignEvent::Pause, now).await
    }

    pub async fn resume(&self, id: &str, now: DateTime<Utc>) -> Result<CampaignStatus, CadenceError> {
        self.apply(id, CampaignEvent::Resume, now).await
    }

    pub async fn complete(&self, id: &str, now: DateTime<Utc>) -> Result<CampaignStatus, CadenceError> {
        self.apply(id, CampaignEvent::Complete, now).await
    }

    async fn apply(
        &self,
        id: &str,
        event: CampaignEvent,
        now: DateTime<Utc>,
    ) -> Result<CampaignStatus, CadenceError> {
        let campaign = campaigns::get_campaign(&self.db, id)
            .await?
            .ok_or_else(|| CadenceError::not_found("campaign", id))?;
        let to = campaign.status.apply(event)?;

        if event == CampaignEvent::Activate {
            validate(&campaign)?;
        }

        if !campaigns::transition_status(&self.db, id, campaign.status, to, &format_ts(now)).await? {
            return Err(CadenceError::Conflict(format!(
                "campaign {id} changed status while applying {event}"
            )));
        }

        info!(campaign_id = id, from = %campaign.status, %to, "campaign status changed");
        self.bus.publish(BusEvent::CampaignStatusChanged {
            campaign_id: id.to_string(),
            from: campaign.status,
            to,
        });
        Ok(to)
    }
}

/// Settings and shape checks applied before a campaign may run.
pub fn validate(campaign: &Campaign) -> Result<(), CadenceError> {
    let mut problems = match campaign.settings.validate() {
        Ok(()) => Vec::new(),
        Err(problems) => problems,
    };
    if campaign.total_steps == 0 {
        problems.push("total_steps must be at least 1".to_string());
    }
    if problems.is_empty() {
        return Ok(());
    }
    warn!(campaign_id = %campaign.id, problems = ?problems, "campaign failed validation");
    Err(CadenceError::Config(format!(
        "campaign {} is invalid: {}",
        campaign.id,
        problems.join("; ")
    )))
}
