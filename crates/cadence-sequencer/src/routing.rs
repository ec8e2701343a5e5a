// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead routing: enroll a lead into a campaign under its routing lock.
//!
//! The lock is a single insert keyed by lead id. While another worker holds
//! it, routing is persisted as a `routing` retry job instead of waiting.

use async_trait::async_trait;
use cadence_bus::{BusEvent, EventBus};
use cadence_core::CadenceError;
use cadence_core::time::format_ts;
use cadence_core::types::{CampaignLead, CampaignStatus, JobType, RetryableJob};
use cadence_storage::Database;
use cadence_storage::queries::{campaigns, enrollments, leads, locks};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::retry::{JobHandler, JobScheduler};

/// Payload of a `routing` retry job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub lead_id: String,
    pub campaign_id: String,
}

/// Result of routing a lead.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    Enrolled(CampaignLead),
    AlreadyEnrolled(CampaignLead),
    /// The lock was held; a routing job will try again.
    Deferred { job_id: i64 },
}

#[derive(Clone)]
pub struct LeadRouter {
    db: Database,
    bus: EventBus,
    jobs: JobScheduler,
    holder_id: String,
}

impl LeadRouter {
    pub fn new(db: Database, bus: EventBus, jobs: JobScheduler) -> Self {
        Self {
            db,
            bus,
            jobs,
            holder_id: format!("router-{}", uuid::Uuid::new_v4()),
        }
    }

    /// Enroll `lead_id` into `campaign_id`. Idempotent per (campaign, lead).
    pub async fn route_lead(
        &self,
        lead_id: &str,
        campaign_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RouteOutcome, CadenceError> {
        match self.try_route(lead_id, campaign_id, now).await {
            Err(CadenceError::Conflict(message)) => {
                let request = RouteRequest {
                    lead_id: lead_id.to_string(),
                    campaign_id: campaign_id.to_string(),
                };
                let job_id = self
                    .jobs
                    .schedule(JobType::Routing, &request, &CadenceError::Conflict(message), now)
                    .await?;
                Ok(RouteOutcome::Deferred { job_id })
            }
            other => other,
        }
    }

    /// Route once. A held lock is reported as [`CadenceError::Conflict`].
    pub async fn try_route(
        &self,
        lead_id: &str,
        campaign_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RouteOutcome, CadenceError> {
        let ts = format_ts(now);
        if !locks::try_acquire(&self.db, lead_id, &self.holder_id, &ts).await? {
            let holder = locks::get_lock(&self.db, lead_id).await?;
            debug!(
                lead_id,
                holder = holder.as_ref().map(|l| l.holder_id.as_str()).unwrap_or("-"),
                "routing lock held"
            );
            return Err(CadenceError::Conflict(format!("routing lock for lead {lead_id} is held")));
        }

        let result = self.enroll(lead_id, campaign_id, &ts).await;

        if !locks::release(&self.db, lead_id, &self.holder_id).await? {
            warn!(lead_id, "routing lock was released by cleanup before we finished");
        }
        result
    }

    async fn enroll(
        &self,
        lead_id: &str,
        campaign_id: &str,
        ts: &str,
    ) -> Result<RouteOutcome, CadenceError> {
        let lead = leads::get_lead(&self.db, lead_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("lead", lead_id))?;
        let campaign = campaigns::get_campaign(&self.db, campaign_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("campaign", campaign_id))?;
        if lead.tenant_id != campaign.tenant_id {
            return Err(CadenceError::Internal(format!(
                "lead {lead_id} and campaign {campaign_id} belong to different tenants"
            )));
        }
        if campaign.status == CampaignStatus::Completed {
            return Err(CadenceError::InvalidTransition {
                entity: "campaign",
                from: campaign.status.to_string(),
                event: "enroll".into(),
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        let (cl, created) = enrollments::enroll(&self.db, &id, campaign_id, lead_id, ts).await?;
        if !created {
            debug!(lead_id, campaign_id, campaign_lead_id = %cl.id, "lead already enrolled");
            return Ok(RouteOutcome::AlreadyEnrolled(cl));
        }

        info!(lead_id, campaign_id, campaign_lead_id = %cl.id, "lead enrolled");
        self.bus.publish(BusEvent::LeadEnrolled {
            campaign_id: campaign_id.to_string(),
            campaign_lead_id: cl.id.clone(),
        });
        Ok(RouteOutcome::Enrolled(cl))
    }
}

/// Re-runs routing jobs. A still-held lock fails the attempt so the job backs off.
pub struct RoutingJobHandler {
    router: LeadRouter,
}

impl RoutingJobHandler {
    pub fn new(router: LeadRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl JobHandler for RoutingJobHandler {
    async fn handle(&self, job: &RetryableJob, now: DateTime<Utc>) -> Result<(), CadenceError> {
        let request: RouteRequest = serde_json::from_str(&job.payload)
            .map_err(|e| CadenceError::Internal(format!("routing job {}: {e}", job.id)))?;
        self.router
            .try_route(&request.lead_id, &request.campaign_id, now)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use cadence_config::model::RetryConfig;
    use cadence_core::types::{JobStatus, LeadStatus};
    use cadence_storage::queries::jobs;
    use cadence_test_utils::fixtures;

    use super::*;
    use crate::retry::RetryProcessor;

    async fn setup() -> (Database, EventBus, RetryProcessor, LeadRouter) {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", None).await;
        fixtures::campaign(&db, "t-1", "c-1", CampaignStatus::Active, 3).await;
        fixtures::lead(&db, "t-1", "l-1", "ada@acme.test").await;
        let bus = EventBus::default();
        let mut retry = RetryProcessor::new(db.clone(), RetryConfig::default());
        let router = LeadRouter::new(db.clone(), bus.clone(), retry.scheduler());
        retry.register(JobType::Routing, std::sync::Arc::new(RoutingJobHandler::new(router.clone())));
        (db, bus, retry, router)
    }

    #[tokio::test]
    async fn routing_enrolls_once_and_releases_the_lock() {
        let (db, bus, _retry, router) = setup().await;
        let mut rx = bus.subscribe();

        let first = router.route_lead("l-1", "c-1", Utc::now()).await.unwrap();
        let RouteOutcome::Enrolled(cl) = first else {
            panic!("expected a new enrollment");
        };
        assert_eq!(cl.status, LeadStatus::Pending);
        assert_eq!(cl.current_step, 0);
        assert_eq!(rx.recv().await.unwrap().name, "campaign.lead-enrolled");
        assert!(locks::get_lock(&db, "l-1").await.unwrap().is_none());

        let second = router.route_lead("l-1", "c-1", Utc::now()).await.unwrap();
        assert!(matches!(second, RouteOutcome::AlreadyEnrolled(ref again) if again.id == cl.id));
    }

    #[tokio::test]
    async fn held_lock_defers_to_a_routing_job() {
        let (db, _bus, retry, router) = setup().await;
        let now = Utc::now();
        locks::try_acquire(&db, "l-1", "someone-else", &format_ts(now)).await.unwrap();

        let outcome = router.route_lead("l-1", "c-1", now).await.unwrap();
        let RouteOutcome::Deferred { job_id } = outcome else {
            panic!("expected deferral");
        };

        // The other holder finishes; the job succeeds on its next attempt.
        locks::release(&db, "l-1", "someone-else").await.unwrap();
        let report = retry.drain(now + chrono::Duration::minutes(2)).await.unwrap();
        assert_eq!(report.succeeded, 1);
        let job = jobs::get_job(&db, job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn unknown_lead_is_a_data_error_and_releases_the_lock() {
        let (db, _bus, _retry, router) = setup().await;
        let err = router.route_lead("l-404", "c-1", Utc::now()).await.unwrap_err();
        assert!(matches!(err, CadenceError::NotFound { .. }));
        assert!(locks::get_lock(&db, "l-404").await.unwrap().is_none());
    }
}
