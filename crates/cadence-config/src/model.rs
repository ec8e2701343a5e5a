// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Cadence engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Cadence configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CadenceConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Cron schedules and batch sizes for the periodic jobs.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Dispatcher and send-limit settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Retry/backoff processor settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Reply classification settings.
    #[serde(default)]
    pub reply: ReplyConfig,

    /// SMTP transport settings.
    #[serde(default)]
    pub smtp: SmtpConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Instance name, used as the routing lock holder prefix.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Address for the Prometheus scrape endpoint (e.g. `127.0.0.1:9464`).
    /// Unset disables metrics export.
    #[serde(default)]
    pub metrics_listen: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            log_level: default_log_level(),
            metrics_listen: None,
        }
    }
}

fn default_engine_name() -> String {
    "cadence".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("cadence").join("cadence.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("cadence.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Cron schedules (5-field, UTC) and batch sizes for the periodic jobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Sequence scan: activate campaigns, enqueue due steps, auto-complete.
    #[serde(default = "default_scan_cron")]
    pub scan_cron: String,

    /// Retry queue drain.
    #[serde(default = "default_retry_cron")]
    pub retry_cron: String,

    /// Stale routing lock and job lock cleanup.
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,

    /// Daily counter rollover (midnight UTC).
    #[serde(default = "default_reset_cron")]
    pub reset_cron: String,

    /// Unclassified reply sweep.
    #[serde(default = "default_reply_sweep_cron")]
    pub reply_sweep_cron: String,

    /// Maximum due leads enqueued per campaign per scan.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Seconds between work queue polls.
    #[serde(default = "default_queue_poll_secs")]
    pub queue_poll_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_cron: default_scan_cron(),
            retry_cron: default_retry_cron(),
            cleanup_cron: default_cleanup_cron(),
            reset_cron: default_reset_cron(),
            reply_sweep_cron: default_reply_sweep_cron(),
            batch_size: default_batch_size(),
            queue_poll_secs: default_queue_poll_secs(),
        }
    }
}

fn default_scan_cron() -> String {
    "0 * * * *".to_string()
}

fn default_retry_cron() -> String {
    "*/5 * * * *".to_string()
}

fn default_cleanup_cron() -> String {
    "*/10 * * * *".to_string()
}

fn default_reset_cron() -> String {
    "0 0 * * *".to_string()
}

fn default_reply_sweep_cron() -> String {
    "*/15 * * * *".to_string()
}

fn default_batch_size() -> u32 {
    100
}

fn default_queue_poll_secs() -> u64 {
    5
}

/// Dispatcher and send-limit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Daily ceiling applied to campaigns that do not set their own.
    /// `None` means unlimited.
    #[serde(default)]
    pub default_campaign_daily_limit: Option<u32>,

    /// Immediate in-process attempts before a failure becomes a retryable job.
    #[serde(default = "default_immediate_attempts")]
    pub immediate_attempts: u32,

    /// Delay between immediate attempts, in milliseconds.
    #[serde(default = "default_immediate_delay_ms")]
    pub immediate_delay_ms: u64,

    /// How long a send claimed for the transport stays `sending` before
    /// cleanup hands it back to `approved`.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            default_campaign_daily_limit: None,
            immediate_attempts: default_immediate_attempts(),
            immediate_delay_ms: default_immediate_delay_ms(),
            claim_lease_secs: default_claim_lease_secs(),
        }
    }
}

fn default_immediate_attempts() -> u32 {
    3
}

fn default_immediate_delay_ms() -> u64 {
    500
}

fn default_claim_lease_secs() -> u64 {
    300
}

/// Retry/backoff processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Delay before attempt N+1, keyed by attempts so far. The last entry repeats.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: Vec<u64>,

    /// Attempts after which a job is marked permanently failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Routing locks older than this are released by cleanup.
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,

    /// How long a claimed job stays locked before cleanup returns it to pending.
    #[serde(default = "default_job_lock_secs")]
    pub job_lock_secs: u64,

    /// Maximum jobs processed per drain.
    #[serde(default = "default_drain_batch")]
    pub drain_batch: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff_secs(),
            max_attempts: default_max_attempts(),
            lock_stale_secs: default_lock_stale_secs(),
            job_lock_secs: default_job_lock_secs(),
            drain_batch: default_drain_batch(),
        }
    }
}

fn default_backoff_secs() -> Vec<u64> {
    vec![60, 300, 900, 3600]
}

fn default_max_attempts() -> u32 {
    5
}

fn default_lock_stale_secs() -> u64 {
    300
}

fn default_job_lock_secs() -> u64 {
    300
}

fn default_drain_batch() -> u32 {
    50
}

/// Reply classification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyConfig {
    /// Minimum intent score (0-10) for drafting a suggested response.
    #[serde(default = "default_suggest_min_intent")]
    pub suggest_min_intent: u8,

    /// Maximum unclassified replies reprocessed per sweep.
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch: u32,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            suggest_min_intent: default_suggest_min_intent(),
            sweep_batch: default_sweep_batch(),
        }
    }
}

fn default_suggest_min_intent() -> u8 {
    3
}

fn default_sweep_batch() -> u32 {
    50
}

/// SMTP transport configuration. No host disables real delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    /// SMTP relay host. `None` runs with the logging transport.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Envelope and header sender.
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Use STARTTLS (true) or implicit TLS (false).
    #[serde(default = "default_starttls")]
    pub starttls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
            starttls: default_starttls(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "outreach@localhost".to_string()
}

fn default_starttls() -> bool {
    true
}
