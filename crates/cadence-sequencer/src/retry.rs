// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry/backoff processor.
//!
//! Failed operations are persisted as [`RetryableJob`]s and re-attempted by
//! [`RetryProcessor::drain`] on an escalating schedule. A job whose budget
//! runs out (or whose error is not transient) is marked `failed` with a
//! reason and stays visible until an operator retries it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadence_config::model::RetryConfig;
use cadence_core::CadenceError;
use cadence_core::time::format_ts;
use cadence_core::types::{JobType, RetryableJob};
use cadence_storage::Database;
use cadence_storage::queries::{jobs, locks, queue, sends};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Delay before the next attempt of a job that has been tried `attempts`
/// times. The last entry repeats; an empty schedule means one minute.
pub fn backoff_delay(schedule_secs: &[u64], attempts: u32) -> Duration {
    let index = (attempts as usize).min(schedule_secs.len().saturating_sub(1));
    Duration::from_secs(schedule_secs.get(index).copied().unwrap_or(60))
}

/// Re-runs one kind of job from its stored payload.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &RetryableJob, now: DateTime<Utc>) -> Result<(), CadenceError>;
}

/// Totals of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub claimed: usize,
    pub succeeded: usize,
    pub rescheduled: usize,
    pub failed: usize,
    /// Jobs whose bookkeeping write errored. They stay claimed until their
    /// lock lease runs out and cleanup returns them to the queue.
    pub errored: usize,
}

/// Totals of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub locks_released: usize,
    pub jobs_recovered: usize,
    pub queue_recovered: usize,
    /// `sending` claims whose lease ran out, handed back to `approved`.
    pub claims_recovered: usize,
}

/// Persists failed operations as retryable jobs. Cheap to clone; handed to
/// the components that fail over to the retry queue.
#[derive(Clone)]
pub struct JobScheduler {
    db: Database,
    config: RetryConfig,
}

impl JobScheduler {
    pub fn new(db: Database, config: RetryConfig) -> Self {
        Self { db, config }
    }

    /// Persist a failed operation for later. The first retry is due after
    /// the first backoff delay.
    pub async fn schedule<P: Serialize>(
        &self,
        job_type: JobType,
        payload: &P,
        error: &CadenceError,
        now: DateTime<Utc>,
    ) -> Result<i64, CadenceError> {
        let payload = serde_json::to_string(payload)
            .map_err(|e| CadenceError::Internal(format!("{job_type} job payload: {e}")))?;
        let due = now + self.delay_after(0);
        let message = error.to_string();
        let id = jobs::create_job(
            &self.db,
            job_type,
            &payload,
            self.config.max_attempts,
            &format_ts(due),
            Some(&message),
            &format_ts(now),
        )
        .await?;
        warn!(job_id = id, %job_type, error = %message, "operation failed, scheduled for retry");
        Ok(id)
    }

    fn delay_after(&self, attempts: u32) -> chrono::Duration {
        let delay = backoff_delay(&self.config.backoff_secs, attempts);
        chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::hours(1))
    }
}

#[derive(Clone)]
pub struct RetryProcessor {
    db: Database,
    config: RetryConfig,
    scheduler: JobScheduler,
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl RetryProcessor {
    pub fn new(db: Database, config: RetryConfig) -> Self {
        Self {
            scheduler: JobScheduler::new(db.clone(), config.clone()),
            db,
            config,
            handlers: HashMap::new(),
        }
    }

    pub fn scheduler(&self) -> JobScheduler {
        self.scheduler.clone()
    }

    /// Register the handler for a job type, replacing any previous one.
    pub fn register(&mut self, job_type: JobType, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(job_type, handler);
    }

    pub fn has_handler(&self, job_type: JobType) -> bool {
        self.handlers.contains_key(&job_type)
    }

    pub async fn schedule<P: Serialize>(
        &self,
        job_type: JobType,
        payload: &P,
        error: &CadenceError,
        now: DateTime<Utc>,
    ) -> Result<i64, CadenceError> {
        self.scheduler.schedule(job_type, payload, error, now).await
    }

    /// Claim and run every due job.
    pub async fn drain(&self, now: DateTime<Utc>) -> Result<DrainReport, CadenceError> {
        let lock_until = now + secs(self.config.job_lock_secs);
        let claimed = jobs::claim_due(
            &self.db,
            &format_ts(now),
            &format_ts(lock_until),
            self.config.drain_batch,
        )
        .await?;

        let mut report = DrainReport {
            claimed: claimed.len(),
            ..DrainReport::default()
        };
        for job in claimed {
            match self.run_job(&job, now).await {
                Ok(JobResult::Succeeded) => report.succeeded += 1,
                Ok(JobResult::Rescheduled) => report.rescheduled += 1,
                Ok(JobResult::Failed) => report.failed += 1,
                Err(e) => {
                    warn!(job_id = job.id, job_type = %job.job_type, error = %e, "retry job bookkeeping failed");
                    report.errored += 1;
                }
            }
        }
        if report.claimed > 0 {
            info!(
                claimed = report.claimed,
                succeeded = report.succeeded,
                rescheduled = report.rescheduled,
                failed = report.failed,
                errored = report.errored,
                "retry drain finished"
            );
        }
        Ok(report)
    }

    /// Operator entry point: make a job due now with a fresh budget.
    pub async fn retry_now(&self, id: i64, now: DateTime<Utc>) -> Result<bool, CadenceError> {
        if jobs::get_job(&self.db, id).await?.is_none() {
            return Err(CadenceError::not_found("retry_job", id.to_string()));
        }
        let reset = jobs::retry_now(&self.db, id, &format_ts(now)).await?;
        if reset {
            info!(job_id = id, "job reset for manual retry");
        } else {
            debug!(job_id = id, "job is being processed, manual retry skipped");
        }
        Ok(reset)
    }

    /// Permanently failed jobs, most recent first.
    pub async fn failed_jobs(&self, limit: u32) -> Result<Vec<RetryableJob>, CadenceError> {
        jobs::list_failed(&self.db, limit).await
    }

    /// Release stale routing locks, and unlock jobs, queue entries and send
    /// claims whose worker disappeared.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<CleanupReport, CadenceError> {
        let cutoff = now - secs(self.config.lock_stale_secs);
        let report = CleanupReport {
            locks_released: locks::release_stale(&self.db, &format_ts(cutoff)).await?,
            jobs_recovered: jobs::recover_expired(&self.db, &format_ts(now)).await?,
            queue_recovered: queue::recover_expired(&self.db).await?,
            claims_recovered: sends::recover_expired_claims(&self.db, &format_ts(now)).await?,
        };
        if report != CleanupReport::default() {
            info!(
                locks_released = report.locks_released,
                jobs_recovered = report.jobs_recovered,
                queue_recovered = report.queue_recovered,
                claims_recovered = report.claims_recovered,
                "cleanup finished"
            );
        }
        Ok(report)
    }

    async fn run_job(&self, job: &RetryableJob, now: DateTime<Utc>) -> Result<JobResult, CadenceError> {
        let ts = format_ts(now);
        let attempts = job.attempts + 1;

        let Some(handler) = self.handlers.get(&job.job_type) else {
            let reason = format!("no handler registered for {} jobs", job.job_type);
            error!(job_id = job.id, %reason, "retry job cannot run");
            jobs::mark_failed(&self.db, job.id, attempts, &reason, &reason, &ts).await?;
            return Ok(JobResult::Failed);
        };

        match handler.handle(job, now).await {
            Ok(()) => {
                jobs::mark_succeeded(&self.db, job.id, &ts).await?;
                info!(job_id = job.id, job_type = %job.job_type, attempts, "retry job succeeded");
                Ok(JobResult::Succeeded)
            }
            Err(e) if !e.is_transient() => {
                let message = e.to_string();
                error!(job_id = job.id, job_type = %job.job_type, error = %message, "retry job failed permanently");
                jobs::mark_failed(&self.db, job.id, attempts, &message, "permanent error", &ts).await?;
                Ok(JobResult::Failed)
            }
            Err(e) if attempts >= job.max_attempts => {
                let message = e.to_string();
                let reason = format!("gave up after {attempts} attempts");
                error!(job_id = job.id, job_type = %job.job_type, error = %message, %reason, "retry budget exhausted");
                jobs::mark_failed(&self.db, job.id, attempts, &message, &reason, &ts).await?;
                Ok(JobResult::Failed)
            }
            Err(e) => {
                let message = e.to_string();
                let next = now + self.scheduler.delay_after(attempts);
                warn!(job_id = job.id, job_type = %job.job_type, attempts, next_attempt_at = %format_ts(next), error = %message, "retry job failed, backing off");
                jobs::reschedule(&self.db, job.id, attempts, &format_ts(next), &message, &ts).await?;
                Ok(JobResult::Rescheduled)
            }
        }
    }
}

fn secs(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1000))
}

enum JobResult {
    Succeeded,
    Rescheduled,
    Failed,
}
