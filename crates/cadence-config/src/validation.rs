// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Checks the constraints serde cannot express: parseable cron expressions,
//! non-empty paths, sane retry bounds. All problems are collected.

use std::str::FromStr;

use croner::Cron;

use crate::diagnostic::ConfigError;
use crate::model::CadenceConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration, returning every problem found.
pub fn validate_config(config: &CadenceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.engine.name.trim().is_empty() {
        errors.push(ConfigError::validation("engine.name must not be empty"));
    }
    if !LOG_LEVELS.contains(&config.engine.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::validation(format!(
            "engine.log_level `{}` must be one of {}",
            config.engine.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if let Some(addr) = &config.engine.metrics_listen {
        if addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ConfigError::validation(format!(
                "engine.metrics_listen `{addr}` must be a socket address like 127.0.0.1:9464"
            )));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let schedules = [
        ("scheduler.scan_cron", &config.scheduler.scan_cron),
        ("scheduler.retry_cron", &config.scheduler.retry_cron),
        ("scheduler.cleanup_cron", &config.scheduler.cleanup_cron),
        ("scheduler.reset_cron", &config.scheduler.reset_cron),
        ("scheduler.reply_sweep_cron", &config.scheduler.reply_sweep_cron),
    ];
    for (key, expr) in schedules {
        if let Err(e) = Cron::from_str(expr) {
            errors.push(ConfigError::validation(format!(
                "{key} `{expr}` is not a valid cron expression: {e}"
            )));
        }
    }
    if config.scheduler.batch_size == 0 {
        errors.push(ConfigError::validation(
            "scheduler.batch_size must be at least 1",
        ));
    }
    if config.scheduler.queue_poll_secs == 0 {
        errors.push(ConfigError::validation(
            "scheduler.queue_poll_secs must be at least 1",
        ));
    }

    if config.delivery.default_campaign_daily_limit == Some(0) {
        errors.push(ConfigError::validation(
            "delivery.default_campaign_daily_limit must be at least 1 when set",
        ));
    }
    if config.delivery.immediate_attempts == 0 {
        errors.push(ConfigError::validation(
            "delivery.immediate_attempts must be at least 1",
        ));
    }

    if config.retry.backoff_secs.is_empty() {
        errors.push(ConfigError::validation(
            "retry.backoff_secs must contain at least one delay",
        ));
    }
    if config.retry.max_attempts == 0 {
        errors.push(ConfigError::validation(
            "retry.max_attempts must be at least 1",
        ));
    }
    if config.retry.lock_stale_secs == 0 {
        errors.push(ConfigError::validation(
            "retry.lock_stale_secs must be at least 1",
        ));
    }
    if config.retry.job_lock_secs == 0 {
        errors.push(ConfigError::validation(
            "retry.job_lock_secs must be at least 1",
        ));
    }

    if config.reply.suggest_min_intent > 10 {
        errors.push(ConfigError::validation(format!(
            "reply.suggest_min_intent must be between 0 and 10, got {}",
            config.reply.suggest_min_intent
        )));
    }

    if let Some(host) = &config.smtp.host
        && host.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "smtp.host must not be empty when set",
        ));
    }
    if !config.smtp.from_address.contains('@') {
        errors.push(ConfigError::validation(format!(
            "smtp.from_address `{}` is not an email address",
            config.smtp.from_address
        )));
    }
    if config.smtp.username.is_some() != config.smtp.password.is_some() {
        errors.push(ConfigError::validation(
            "smtp.username and smtp.password must be set together",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&CadenceConfig::default()).is_ok());
    }

    #[test]
    fn bad_cron_is_reported_with_key() {
        let mut config = CadenceConfig::default();
        config.scheduler.retry_cron = "every five minutes".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("scheduler.retry_cron"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = CadenceConfig::default();
        config.retry.backoff_secs.clear();
        config.retry.max_attempts = 0;
        config.reply.suggest_min_intent = 11;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn metrics_listen_must_be_an_address() {
        let mut config = CadenceConfig::default();
        config.engine.metrics_listen = Some("localhost".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("engine.metrics_listen"));

        config.engine.metrics_listen = Some("127.0.0.1:9464".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn smtp_credentials_must_pair() {
        let mut config = CadenceConfig::default();
        config.smtp.username = Some("mailer".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("set together"));
    }
}
