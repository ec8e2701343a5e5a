// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot operator commands.
//!
//! These run against the same database as a live `cadence serve`; writes
//! they make (an approval, a reset job) are picked up by the running
//! engine's queue worker and retry drain.

use std::fmt::Write as _;

use cadence_config::model::CadenceConfig;
use cadence_core::CadenceError;
use cadence_core::types::{RetryableJob, SuppressionReason};
use cadence_delivery::ApproveOutcome;
use cadence_sequencer::{CampaignStats, CronSchedule, Engine};
use cadence_storage::Database;
use chrono::{Duration, Utc};

/// `cadence check-config`: the configuration already loaded and validated;
/// print what the engine will run with.
pub fn check_config(config: &CadenceConfig) -> Result<(), CadenceError> {
    print!("{}", describe_config(config)?);
    println!("configuration OK");
    Ok(())
}

fn describe_config(config: &CadenceConfig) -> Result<String, CadenceError> {
    let mut out = String::new();
    let _ = writeln!(out, "engine:     {}", config.engine.name);
    let _ = writeln!(out, "database:   {}", config.storage.database_path);
    match &config.smtp.host {
        Some(host) => {
            let _ = writeln!(out, "transport:  smtp {host}:{}", config.smtp.port);
        }
        None => {
            let _ = writeln!(out, "transport:  log only (no smtp.host)");
        }
    }
    let sched = &config.scheduler;
    for (name, expr) in [
        ("scan", &sched.scan_cron),
        ("retry", &sched.retry_cron),
        ("cleanup", &sched.cleanup_cron),
        ("reset", &sched.reset_cron),
        ("replies", &sched.reply_sweep_cron),
    ] {
        let next = CronSchedule::parse("check", expr)?.next_after(Utc::now())?;
        let _ = writeln!(out, "{name:<11} {expr:<14} next {}", next.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(out)
}

/// `cadence migrate`: open the database, which applies pending migrations.
pub async fn migrate(config: &CadenceConfig) -> Result<(), CadenceError> {
    let db = Database::from_config(&config.storage).await?;
    db.close().await?;
    println!("database migrated: {}", config.storage.database_path);
    Ok(())
}

pub async fn approve(engine: &Engine, send_id: &str) -> Result<(), CadenceError> {
    match engine.approve(send_id, Utc::now()).await? {
        ApproveOutcome::Approved => println!("send {send_id} approved and queued for dispatch"),
        ApproveOutcome::AlreadyApproved => println!("send {send_id} was already approved"),
        ApproveOutcome::NotPending(status) => {
            return Err(CadenceError::InvalidTransition {
                entity: "email_send",
                from: status.to_string(),
                event: "approve".into(),
            });
        }
    }
    Ok(())
}

pub async fn retry_job(engine: &Engine, job_id: i64) -> Result<(), CadenceError> {
    if engine.retry_now(job_id, Utc::now()).await? {
        println!("job {job_id} reset, it runs on the next retry drain");
    } else {
        println!("job {job_id} is being processed right now, nothing changed");
    }
    Ok(())
}

pub async fn failed_jobs(engine: &Engine, limit: u32, json: bool) -> Result<(), CadenceError> {
    let jobs = engine.failed_jobs(limit).await?;
    if json {
        let rendered = serde_json::to_string_pretty(&jobs)
            .map_err(|e| CadenceError::Internal(format!("failed to render jobs: {e}")))?;
        println!("{rendered}");
    } else {
        print!("{}", format_failed_jobs(&jobs));
    }
    Ok(())
}

fn format_failed_jobs(jobs: &[RetryableJob]) -> String {
    if jobs.is_empty() {
        return "no failed jobs\n".to_string();
    }
    let mut out = format!("{:<8} {:<12} {:<9} {:<26} REASON\n", "ID", "TYPE", "ATTEMPTS", "UPDATED");
    for job in jobs {
        let reason = job
            .failure_reason
            .as_deref()
            .or(job.last_error.as_deref())
            .unwrap_or("-");
        let _ = writeln!(
            out,
            "{:<8} {:<12} {:<9} {:<26} {reason}",
            job.id,
            job.job_type.to_string(),
            format!("{}/{}", job.attempts, job.max_attempts),
            job.updated_at,
        );
    }
    out
}

pub async fn stats(engine: &Engine, campaign_id: &str, json: bool) -> Result<(), CadenceError> {
    let stats = engine.campaign_stats(campaign_id, Utc::now()).await?;
    if json {
        let rendered = serde_json::to_string_pretty(&stats)
            .map_err(|e| CadenceError::Internal(format!("failed to render stats: {e}")))?;
        println!("{rendered}");
    } else {
        print!("{}", format_stats(&stats));
    }
    Ok(())
}

fn format_stats(stats: &CampaignStats) -> String {
    let mut out = format!("campaign {} ({})\n", stats.campaign_id, stats.status);
    out.push_str("  leads:\n");
    if stats.leads.is_empty() {
        out.push_str("    none\n");
    }
    for (status, count) in &stats.leads {
        let _ = writeln!(out, "    {:<20} {count}", status.to_string());
    }
    out.push_str("  sends:\n");
    if stats.sends.is_empty() {
        out.push_str("    none\n");
    }
    for (status, count) in &stats.sends {
        let _ = writeln!(out, "    {:<20} {count}", status.to_string());
    }
    let _ = writeln!(out, "  sent today: {}", stats.sent_today);
    out
}

pub async fn suppress(
    engine: &Engine,
    value: &str,
    tenant: Option<&str>,
    reason: SuppressionReason,
    expires_in_days: Option<i64>,
) -> Result<(), CadenceError> {
    let now = Utc::now();
    let expires_at = expires_in_days.map(|days| now + Duration::days(days));
    let id = engine
        .suppression()
        .suppress(tenant, value, reason, expires_at, now)
        .await?;
    let scope = tenant.map_or_else(|| "all tenants".to_string(), |t| format!("tenant {t}"));
    println!("suppression {id} added: {} for {scope} ({reason})", value.trim());
    Ok(())
}

#[cfg(test)]
mod tests {
    use cadence_core::types::{CampaignStatus, JobStatus, JobType, LeadStatus, SendStatus};

    use super::*;

    #[test]
    fn default_config_describes_every_schedule() {
        let text = describe_config(&CadenceConfig::default()).unwrap();
        assert!(text.contains("log only"));
        for name in ["scan", "retry", "cleanup", "reset", "replies"] {
            assert!(text.contains(name), "missing {name} in\n{text}");
        }
    }

    #[test]
    fn stats_list_each_status() {
        let stats = CampaignStats {
            campaign_id: "c-1".into(),
            status: CampaignStatus::Active,
            leads: vec![(LeadStatus::InSequence, 4), (LeadStatus::Unsubscribed, 1)],
            sends: vec![(SendStatus::Sent, 10), (SendStatus::RateLimited, 1)],
            sent_today: 10,
        };
        let text = format_stats(&stats);
        assert!(text.starts_with("campaign c-1 (active)"));
        assert!(text.contains("in_sequence"));
        assert!(text.contains("rate_limited"));
        assert!(text.contains("sent today: 10"));
    }

    #[test]
    fn failed_jobs_show_reason() {
        let job = RetryableJob {
            id: 7,
            job_type: JobType::Send,
            payload: "{}".into(),
            status: JobStatus::Failed,
            attempts: 5,
            max_attempts: 5,
            next_attempt_at: "2026-03-02T12:00:00.000Z".into(),
            locked_until: None,
            last_error: Some("transport error: timeout".into()),
            failure_reason: Some("gave up after 5 attempts".into()),
            created_at: "2026-03-02T11:00:00.000Z".into(),
            updated_at: "2026-03-02T12:00:00.000Z".into(),
        };
        let text = format_failed_jobs(&[job]);
        assert!(text.contains("gave up after 5 attempts"));
        assert!(text.contains("5/5"));
        assert_eq!(format_failed_jobs(&[]), "no failed jobs\n");
    }
}
