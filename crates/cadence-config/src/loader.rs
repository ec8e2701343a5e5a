// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! `./cadence.toml` > `~/.config/cadence/cadence.toml` > `/etc/cadence/cadence.toml`,
//! with `CADENCE_*` environment variables overriding all files.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CadenceConfig;

/// Top-level sections, in the order they are tried when mapping env vars.
const SECTIONS: &[&str] = &[
    "engine",
    "storage",
    "scheduler",
    "delivery",
    "retry",
    "reply",
    "smtp",
];

pub(crate) const LOCAL_FILE: &str = "cadence.toml";
pub(crate) const SYSTEM_FILE: &str = "/etc/cadence/cadence.toml";

pub(crate) fn user_file() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("cadence/cadence.toml"))
        .unwrap_or_default()
}

/// Load from the standard hierarchy plus environment overrides.
pub fn load_config() -> Result<CadenceConfig, figment::Error> {
    build_figment().extract()
}

/// Load from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<CadenceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CadenceConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load from an explicit file, still honouring environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<CadenceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CadenceConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full provider stack before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CadenceConfig::default()))
        .merge(Toml::file(SYSTEM_FILE))
        .merge(Toml::file(user_file()))
        .merge(Toml::file(LOCAL_FILE))
        .merge(env_provider())
}

/// Map `CADENCE_RETRY_MAX_ATTEMPTS` to `retry.max_attempts`.
///
/// Only the first underscore after a known section name becomes a dot;
/// `Env::split("_")` would break keys such as `max_attempts`.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("CADENCE_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("retry_max_attempts"), "retry.max_attempts");
        assert_eq!(map_env_key("smtp_from_address"), "smtp.from_address");
        assert_eq!(
            map_env_key("delivery_default_campaign_daily_limit"),
            "delivery.default_campaign_daily_limit"
        );
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn env_override_wins_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("cadence.toml", "[retry]\nmax_attempts = 2\n")?;
            jail.set_env("CADENCE_RETRY_MAX_ATTEMPTS", "9");
            let config = load_config_from_path(Path::new("cadence.toml"))?;
            assert_eq!(config.retry.max_attempts, 9);
            Ok(())
        });
    }
}
