// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequence scheduler tick.
//!
//! Each tick is a set of idempotent sweeps over persisted state:
//!
//! 1. activate `scheduled` campaigns whose start time has passed
//! 2. queue composition for due leads of active campaigns with an open window
//! 3. queue the first step for enriched leads that have not started
//! 4. complete leads that have sent every step
//! 5. re-queue dispatch for approved, unsent email of active campaigns
//!
//! Running a tick twice queues duplicate work at worst, and every consumer
//! re-checks state before writing.

use cadence_config::model::SchedulerConfig;
use cadence_core::time::format_ts;
use cadence_core::types::{CampaignLead, CampaignStatus};
use cadence_core::{CadenceError, LeadEvent};
use cadence_delivery::{ApprovalGate, is_within_window};
use cadence_storage::Database;
use cadence_storage::queries::{campaigns, enrollments, sends};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::campaigns::CampaignLifecycle;
use crate::compose::{ComposeRequest, enqueue_compose};

/// Totals of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub activated: usize,
    pub due_enqueued: usize,
    pub started: usize,
    pub completed: usize,
    pub redispatched: usize,
}

#[derive(Clone)]
pub struct SequenceScheduler {
    db: Database,
    lifecycle: CampaignLifecycle,
    gate: ApprovalGate,
    batch_size: u32,
}

impl SequenceScheduler {
    pub fn new(
        db: Database,
        lifecycle: CampaignLifecycle,
        gate: ApprovalGate,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            db,
            lifecycle,
            gate,
            batch_size: config.batch_size.max(1),
        }
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> Result<ScanReport, CadenceError> {
        let mut report = ScanReport {
            activated: self.activate_due(now).await?,
            ..ScanReport::default()
        };

        for campaign in campaigns::list_by_status(&self.db, CampaignStatus::Active).await? {
            for cl in enrollments::list_ready(&self.db, &campaign.id, self.batch_size).await? {
                self.enqueue_compose(&cl, campaign.auto_send_approved).await?;
                report.started += 1;
            }

            let window = campaign.settings.send_window.resolve();
            if !is_within_window(&window, None, now) {
                debug!(campaign_id = %campaign.id, "send window closed, due leads wait");
                continue;
            }
            let due = enrollments::list_due(&self.db, &campaign.id, &format_ts(now), self.batch_size).await?;
            for cl in &due {
                self.enqueue_compose(cl, campaign.auto_send_approved).await?;
            }
            report.due_enqueued += due.len();
        }

        for cl in enrollments::list_finished(&self.db, self.batch_size).await? {
            if complete_enrollment(&self.db, &cl, now).await? {
                report.completed += 1;
            }
        }

        for send in sends::list_dispatchable(&self.db, self.batch_size).await? {
            self.gate.enqueue_dispatch(&send.id).await?;
            report.redispatched += 1;
        }

        if report != ScanReport::default() {
            info!(
                activated = report.activated,
                due_enqueued = report.due_enqueued,
                started = report.started,
                completed = report.completed,
                redispatched = report.redispatched,
                "sequence scan finished"
            );
        }
        Ok(report)
    }

    async fn activate_due(&self, now: DateTime<Utc>) -> Result<usize, CadenceError> {
        let mut activated = 0;
        for campaign in campaigns::list_startable(&self.db, &format_ts(now)).await? {
            match self.lifecycle.activate(&campaign.id, now).await {
                Ok(_) => activated += 1,
                Err(e @ (CadenceError::Config(_) | CadenceError::Conflict(_))) => {
                    warn!(campaign_id = %campaign.id, error = %e, "campaign left scheduled");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(activated)
    }

    async fn enqueue_compose(&self, cl: &CampaignLead, auto_send: bool) -> Result<i64, CadenceError> {
        let request = ComposeRequest {
            campaign_lead_id: cl.id.clone(),
            step: cl.current_step + 1,
            auto_send,
        };
        enqueue_compose(&self.db, &request).await
    }
}

/// Mark a lead that has sent every step `completed`. No-op for leads that
/// already left the sequence.
pub async fn complete_enrollment(
    db: &Database,
    cl: &CampaignLead,
    now: DateTime<Utc>,
) -> Result<bool, CadenceError> {
    let Some(to) = cl.status.transition(LeadEvent::Completed) else {
        return Ok(false);
    };
    let applied = enrollments::transition_status(db, &cl.id, cl.status, to, &format_ts(now)).await?;
    if applied {
        info!(campaign_lead_id = %cl.id, steps = cl.current_step, "sequence completed");
    }
    Ok(applied)
}
