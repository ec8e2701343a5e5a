// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Cadence configuration system.

use cadence_config::diagnostic::ConfigError;
use cadence_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[engine]
name = "outreach-1"
log_level = "debug"

[storage]
database_path = "/tmp/cadence-test.db"
wal_mode = false

[scheduler]
scan_cron = "*/30 * * * *"
batch_size = 25

[delivery]
default_campaign_daily_limit = 200
immediate_attempts = 2
immediate_delay_ms = 100

[retry]
backoff_secs = [30, 120]
max_attempts = 4

[reply]
suggest_min_intent = 5

[smtp]
host = "smtp.example.com"
port = 465
username = "mailer"
password = "secret"
from_address = "sales@example.com"
starttls = false
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.engine.name, "outreach-1");
    assert_eq!(config.storage.database_path, "/tmp/cadence-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.scheduler.scan_cron, "*/30 * * * *");
    assert_eq!(config.scheduler.retry_cron, "*/5 * * * *");
    assert_eq!(config.scheduler.batch_size, 25);
    assert_eq!(config.delivery.default_campaign_daily_limit, Some(200));
    assert_eq!(config.retry.backoff_secs, vec![30, 120]);
    assert_eq!(config.retry.max_attempts, 4);
    assert_eq!(config.reply.suggest_min_intent, 5);
    assert_eq!(config.smtp.host.as_deref(), Some("smtp.example.com"));
    assert_eq!(config.smtp.port, 465);
    assert!(!config.smtp.starttls);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.retry.backoff_secs, vec![60, 300, 900, 3600]);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.lock_stale_secs, 300);
    assert_eq!(config.reply.suggest_min_intent, 3);
    assert_eq!(config.scheduler.reset_cron, "0 0 * * *");
    assert!(config.smtp.host.is_none());
}

#[test]
fn unknown_key_gets_suggestion_and_span() {
    let toml = "[retry]\nmax_attemps = 3\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(key, "max_attemps");
            assert_eq!(suggestion.as_deref(), Some("max_attempts"));
            assert!(span.is_some());
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[metrics]\nenabled = true\n").unwrap_err();
    assert!(err.to_string().contains("metrics"));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[retry]\nmax_attempts = \"five\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn validation_errors_surface_through_load() {
    let errors = load_and_validate_str("[scheduler]\nscan_cron = \"soon\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}
