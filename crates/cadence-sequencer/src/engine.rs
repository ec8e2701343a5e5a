// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The assembled engine: every component wired to one database, one bus and
//! the configured adapters, plus the background loops that drive them.
//!
//! Work reaches the engine three ways. Bus events (enrollment, sent email,
//! inbound reply) are handled as they arrive. The `compose` and `dispatch`
//! queues are polled by a worker. Cron loops run the scan, retry drain,
//! cleanup, daily reset and reply sweep. Each path re-reads state before it
//! writes, so a missed event only delays work until the next sweep.

use std::sync::Arc;
use std::time::Duration;

use cadence_bus::{BusEvent, EventBus, EventEnvelope};
use cadence_config::model::CadenceConfig;
use cadence_core::time::utc_day_bounds;
use cadence_core::types::{CampaignStatus, JobType, LeadStatus, Reply, RetryableJob, SendStatus};
use cadence_core::{CadenceError, ContentProvider, ReplyClassifier, TransportAdapter};
use cadence_delivery::{
    ApprovalGate, ApproveOutcome, DISPATCH_QUEUE, Dispatcher, SendLimitGate, SuppressionChecker,
};
use cadence_reply::{ReplyProcessor, SweepReport};
use cadence_storage::Database;
use cadence_storage::queries::sends::SendScope;
use cadence_storage::queries::{campaigns, enrollments, queue, sends};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::campaigns::CampaignLifecycle;
use crate::compose::{COMPOSE_QUEUE, ComposeRequest, StepComposer, enqueue_compose};
use crate::cron::{CronSchedule, run_cron};
use crate::enrichment::{EnrichOutcome, Enricher, EnrichmentJobHandler, EnrichmentRequest};
use crate::handlers::{SendJob, SendJobHandler};
use crate::retry::{CleanupReport, DrainReport, JobHandler, RetryProcessor};
use crate::routing::{LeadRouter, RoutingJobHandler};
use crate::scheduler::{ScanReport, SequenceScheduler, complete_enrollment};
use crate::workflow::{StepPolicy, run_step};

/// Entries handled by one queue pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub composed: u32,
    pub dispatched: u32,
}

/// Per-status counts for one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignStats {
    pub campaign_id: String,
    pub status: CampaignStatus,
    pub leads: Vec<(LeadStatus, u64)>,
    pub sends: Vec<(SendStatus, u64)>,
    pub sent_today: u32,
}

pub struct Engine {
    db: Database,
    config: CadenceConfig,
    bus: EventBus,
    lifecycle: CampaignLifecycle,
    router: LeadRouter,
    enricher: Enricher,
    composer: StepComposer,
    gate: ApprovalGate,
    dispatcher: Dispatcher,
    limits: SendLimitGate,
    suppression: SuppressionChecker,
    scheduler: SequenceScheduler,
    replies: ReplyProcessor,
    retry: RetryProcessor,
    step_policy: StepPolicy,
}

impl Engine {
    pub fn new(
        db: Database,
        config: CadenceConfig,
        bus: EventBus,
        transport: Arc<dyn TransportAdapter>,
        content: Arc<dyn ContentProvider>,
        classifier: Arc<dyn ReplyClassifier>,
    ) -> Self {
        let suppression = SuppressionChecker::new(db.clone());
        let limits = SendLimitGate::new(db.clone(), &config.delivery);
        let dispatcher = Dispatcher::new(
            db.clone(),
            transport,
            suppression.clone(),
            limits.clone(),
            bus.clone(),
        );
        let gate = ApprovalGate::new(db.clone(), bus.clone());
        let composer = StepComposer::new(db.clone(), content.clone(), gate.clone(), bus.clone());
        let lifecycle = CampaignLifecycle::new(db.clone(), bus.clone());
        let scheduler =
            SequenceScheduler::new(db.clone(), lifecycle.clone(), gate.clone(), &config.scheduler);
        let replies = ReplyProcessor::new(
            db.clone(),
            classifier,
            content,
            bus.clone(),
            config.reply.clone(),
        );

        let mut retry = RetryProcessor::new(db.clone(), config.retry.clone());
        let router = LeadRouter::new(db.clone(), bus.clone(), retry.scheduler());
        let enricher = Enricher::new(db.clone());
        retry.register(JobType::Routing, Arc::new(RoutingJobHandler::new(router.clone())));
        retry.register(
            JobType::Send,
            Arc::new(SendJobHandler::new(composer.clone(), dispatcher.clone())),
        );
        retry.register(
            JobType::Enrichment,
            Arc::new(EnrichmentJobHandler::new(enricher.clone())),
        );

        Self {
            step_policy: StepPolicy::from_config(&config.delivery),
            db,
            config,
            bus,
            lifecycle,
            router,
            enricher,
            composer,
            gate,
            dispatcher,
            limits,
            suppression,
            scheduler,
            replies,
            retry,
        }
    }

    /// Register (or replace) the handler for a retryable job type, e.g. a
    /// webhook delivery handler or a custom enrichment source.
    pub fn with_job_handler(mut self, job_type: JobType, handler: Arc<dyn JobHandler>) -> Self {
        self.retry.register(job_type, handler);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &CadenceConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn router(&self) -> &LeadRouter {
        &self.router
    }

    pub fn lifecycle(&self) -> &CampaignLifecycle {
        &self.lifecycle
    }

    pub fn suppression(&self) -> &SuppressionChecker {
        &self.suppression
    }

    pub fn retry(&self) -> &RetryProcessor {
        &self.retry
    }

    /// Operator approval of a pending send.
    pub async fn approve(&self, send_id: &str, now: DateTime<Utc>) -> Result<ApproveOutcome, CadenceError> {
        self.gate.approve(send_id, now).await
    }

    /// Store an inbound reply; classification follows on the bus.
    pub async fn receive_reply(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply, CadenceError> {
        self.replies.receive(sender, subject, body, now).await
    }

    pub async fn retry_now(&self, job_id: i64, now: DateTime<Utc>) -> Result<bool, CadenceError> {
        self.retry.retry_now(job_id, now).await
    }

    pub async fn failed_jobs(&self, limit: u32) -> Result<Vec<RetryableJob>, CadenceError> {
        self.retry.failed_jobs(limit).await
    }

    pub async fn campaign_stats(
        &self,
        campaign_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CampaignStats, CadenceError> {
        let campaign = campaigns::get_campaign(&self.db, campaign_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("campaign", campaign_id))?;
        let (start, end) = utc_day_bounds(now);
        Ok(CampaignStats {
            campaign_id: campaign.id.clone(),
            status: campaign.status,
            leads: enrollments::status_counts(&self.db, campaign_id).await?,
            sends: sends::status_counts(&self.db, campaign_id).await?,
            sent_today: sends::count_sent(&self.db, SendScope::Campaign(campaign_id), &start, &end)
                .await?,
        })
    }

    // --- scheduled entry points ---

    pub async fn scan(&self, now: DateTime<Utc>) -> Result<ScanReport, CadenceError> {
        self.scheduler.tick(now).await
    }

    pub async fn drain_retries(&self, now: DateTime<Utc>) -> Result<DrainReport, CadenceError> {
        self.retry.drain(now).await
    }

    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<CleanupReport, CadenceError> {
        self.retry.cleanup(now).await
    }

    /// Midnight job: snapshot yesterday's send totals.
    pub async fn daily_reset(&self, now: DateTime<Utc>) -> Result<usize, CadenceError> {
        self.limits.roll_over(now).await
    }

    pub async fn sweep_replies(&self, now: DateTime<Utc>) -> Result<SweepReport, CadenceError> {
        self.replies.sweep(now).await
    }

    // --- queues ---

    /// Take one entry off `queue_name` and run it. Returns `false` when the
    /// queue was empty.
    ///
    /// Transient failures that survive the immediate attempts become a `send`
    /// retry job. Anything else is logged and dropped; the entry is acked
    /// either way so it is never run twice from the queue.
    pub async fn process_queue_once(
        &self,
        queue_name: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, CadenceError> {
        let Some(entry) =
            queue::dequeue(&self.db, queue_name, self.config.retry.job_lock_secs).await?
        else {
            return Ok(false);
        };

        match send_job_from_entry(queue_name, &entry.payload) {
            Ok(job) => match self.run_send_job(&job, now).await {
                Ok(()) => {}
                Err(e) if e.is_transient() => {
                    let job_id = self.retry.schedule(JobType::Send, &job, &e, now).await?;
                    warn!(
                        queue = queue_name,
                        entry_id = entry.id,
                        job_id,
                        error = %e,
                        "queued work failed, handed to retry processor"
                    );
                }
                Err(e) => {
                    error!(queue = queue_name, entry_id = entry.id, error = %e, "queued work aborted");
                }
            },
            Err(e) => {
                error!(queue = queue_name, entry_id = entry.id, error = %e, "unreadable queue entry dropped");
            }
        }

        queue::ack(&self.db, entry.id).await?;
        Ok(true)
    }

    /// Work both queues until empty or `batch_size` entries each. Compose
    /// runs first so auto-approved drafts go out in the same pass.
    pub async fn drain_queues(&self, now: DateTime<Utc>) -> Result<QueueReport, CadenceError> {
        let limit = self.config.scheduler.batch_size.max(1);
        let mut report = QueueReport::default();
        while report.composed < limit && self.process_queue_once(COMPOSE_QUEUE, now).await? {
            report.composed += 1;
        }
        while report.dispatched < limit && self.process_queue_once(DISPATCH_QUEUE, now).await? {
            report.dispatched += 1;
        }
        Ok(report)
    }

    async fn run_send_job(&self, job: &SendJob, now: DateTime<Utc>) -> Result<(), CadenceError> {
        match job {
            SendJob::Compose(request) => {
                let outcome = run_step("compose", self.step_policy, || {
                    self.composer.compose_step(request, now)
                })
                .await?;
                debug!(campaign_lead_id = %request.campaign_lead_id, ?outcome, "compose finished");
            }
            SendJob::Dispatch(request) => {
                let outcome = run_step("dispatch", self.step_policy, || {
                    self.dispatcher.dispatch(&request.send_id, now)
                })
                .await?;
                debug!(send_id = %request.send_id, outcome = outcome.label(), "dispatch finished");
            }
        }
        Ok(())
    }

    // --- events ---

    pub async fn handle_event(
        &self,
        envelope: &EventEnvelope,
        now: DateTime<Utc>,
    ) -> Result<(), CadenceError> {
        match &envelope.event {
            BusEvent::LeadEnrolled {
                campaign_lead_id, ..
            } => self.on_enrolled(campaign_lead_id, now).await,
            BusEvent::EmailSent {
                campaign_lead_id, ..
            } => self.on_sent(campaign_lead_id, now).await,
            BusEvent::ReplyReceived { reply_id } => {
                let outcome = self.replies.process(reply_id, now).await?;
                debug!(reply_id, ?outcome, "reply processed");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn on_enrolled(&self, campaign_lead_id: &str, now: DateTime<Utc>) -> Result<(), CadenceError> {
        match self.enricher.enrich(campaign_lead_id, now).await {
            Ok(EnrichOutcome::Enriched { .. }) => self.start_sequence(campaign_lead_id).await,
            Ok(EnrichOutcome::Skipped(_)) => Ok(()),
            Err(e) if e.is_transient() => {
                let request = EnrichmentRequest {
                    campaign_lead_id: campaign_lead_id.to_string(),
                };
                let job_id = self
                    .retry
                    .schedule(JobType::Enrichment, &request, &e, now)
                    .await?;
                warn!(campaign_lead_id, job_id, error = %e, "enrichment deferred");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Queue step 1 right away when the campaign is already running. Leads
    /// of campaigns that are not active yet are started by the scan.
    async fn start_sequence(&self, campaign_lead_id: &str) -> Result<(), CadenceError> {
        let Some(cl) = enrollments::get_campaign_lead(&self.db, campaign_lead_id).await? else {
            return Ok(());
        };
        let Some(campaign) = campaigns::get_campaign(&self.db, &cl.campaign_id).await? else {
            return Ok(());
        };
        if campaign.status != CampaignStatus::Active || cl.status != LeadStatus::Ready {
            return Ok(());
        }
        let request = ComposeRequest {
            campaign_lead_id: cl.id.clone(),
            step: cl.current_step + 1,
            auto_send: campaign.auto_send_approved,
        };
        enqueue_compose(&self.db, &request).await?;
        Ok(())
    }

    async fn on_sent(&self, campaign_lead_id: &str, now: DateTime<Utc>) -> Result<(), CadenceError> {
        let Some(cl) = enrollments::get_campaign_lead(&self.db, campaign_lead_id).await? else {
            return Ok(());
        };
        let Some(campaign) = campaigns::get_campaign(&self.db, &cl.campaign_id).await? else {
            return Ok(());
        };
        if cl.current_step >= campaign.total_steps {
            complete_enrollment(&self.db, &cl, now).await?;
        }
        Ok(())
    }

    // --- background loops ---

    /// Start the event loop, the queue worker and the cron loops. All of
    /// them stop when `cancel` fires.
    pub fn spawn(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Result<Vec<JoinHandle<()>>, CadenceError> {
        let cfg = &self.config.scheduler;
        let scan = CronSchedule::parse("sequence-scan", &cfg.scan_cron)?;
        let retry = CronSchedule::parse("retry-drain", &cfg.retry_cron)?;
        let cleanup = CronSchedule::parse("lock-cleanup", &cfg.cleanup_cron)?;
        let reset = CronSchedule::parse("daily-reset", &cfg.reset_cron)?;
        let sweep = CronSchedule::parse("reply-sweep", &cfg.reply_sweep_cron)?;

        let mut handles = vec![
            tokio::spawn(event_loop(
                Arc::clone(self),
                self.bus.subscribe(),
                cancel.clone(),
            )),
            tokio::spawn(queue_worker(Arc::clone(self), cancel.clone())),
        ];

        let engine = Arc::clone(self);
        handles.push(tokio::spawn(run_cron(scan, cancel.clone(), move |now| {
            let engine = Arc::clone(&engine);
            async move { engine.scan(now).await }
        })));
        let engine = Arc::clone(self);
        handles.push(tokio::spawn(run_cron(retry, cancel.clone(), move |now| {
            let engine = Arc::clone(&engine);
            async move { engine.drain_retries(now).await }
        })));
        let engine = Arc::clone(self);
        handles.push(tokio::spawn(run_cron(cleanup, cancel.clone(), move |now| {
            let engine = Arc::clone(&engine);
            async move { engine.cleanup(now).await }
        })));
        let engine = Arc::clone(self);
        handles.push(tokio::spawn(run_cron(reset, cancel.clone(), move |now| {
            let engine = Arc::clone(&engine);
            async move { engine.daily_reset(now).await }
        })));
        let engine = Arc::clone(self);
        handles.push(tokio::spawn(run_cron(sweep, cancel, move |now| {
            let engine = Arc::clone(&engine);
            async move { engine.sweep_replies(now).await }
        })));

        info!(tasks = handles.len(), "engine started");
        Ok(handles)
    }
}

fn send_job_from_entry(queue_name: &str, payload: &str) -> Result<SendJob, CadenceError> {
    let parsed = match queue_name {
        COMPOSE_QUEUE => serde_json::from_str(payload).map(SendJob::Compose),
        DISPATCH_QUEUE => serde_json::from_str(payload).map(SendJob::Dispatch),
        other => return Err(CadenceError::Internal(format!("unknown queue `{other}`"))),
    };
    parsed.map_err(|e| CadenceError::Internal(format!("{queue_name} payload: {e}")))
}

async fn event_loop(
    engine: Arc<Engine>,
    mut events: broadcast::Receiver<EventEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(envelope) => {
                    if let Err(e) = engine.handle_event(&envelope, Utc::now()).await {
                        warn!(event = %envelope.name, error = %e, "event handler failed (non-fatal)");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event loop lagged, sweeps will pick up the missed work");
                }
                Err(RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => {
                info!("event loop shutting down");
                break;
            }
        }
    }
}

async fn queue_worker(engine: Arc<Engine>, cancel: CancellationToken) {
    let poll = Duration::from_secs(engine.config.scheduler.queue_poll_secs.max(1));
    let mut interval = tokio::time::interval(poll);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match engine.drain_queues(Utc::now()).await {
                    Ok(report) if report != QueueReport::default() => {
                        debug!(composed = report.composed, dispatched = report.dispatched, "queues drained");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "queue worker pass failed (non-fatal)"),
                }
            }
            _ = cancel.cancelled() => {
                info!("queue worker shutting down");
                break;
            }
        }
    }
}
