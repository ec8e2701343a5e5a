// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Cadence outreach engine.
//!
//! TOML parsing with `deny_unknown_fields`, an XDG file hierarchy,
//! `CADENCE_*` environment overrides, and miette diagnostics with
//! typo suggestions.
//!
//! ```no_run
//! use cadence_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("database: {}", config.storage.database_path);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::CadenceConfig;

use std::path::Path;

/// Load from the standard hierarchy and validate.
pub fn load_and_validate() -> Result<CadenceConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &collect_toml_sources(),
        )),
    }
}

/// Load an explicit file (plus environment overrides) and validate.
pub fn load_and_validate_path(path: &Path) -> Result<CadenceConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources: Vec<(String, String)> = std::fs::read_to_string(path)
                .map(|content| vec![(path.display().to_string(), content)])
                .unwrap_or_default();
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load a TOML string and validate. Used by tests and `check-config`.
pub fn load_and_validate_str(toml_content: &str) -> Result<CadenceConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

fn collect_toml_sources() -> Vec<(String, String)> {
    let mut sources = Vec::new();

    if let Ok(content) = std::fs::read_to_string(loader::LOCAL_FILE) {
        let path = std::env::current_dir()
            .map(|d| d.join(loader::LOCAL_FILE).display().to_string())
            .unwrap_or_else(|_| loader::LOCAL_FILE.to_string());
        sources.push((path, content));
    }

    let user = loader::user_file();
    if let Ok(content) = std::fs::read_to_string(&user) {
        sources.push((user.display().to_string(), content));
    }

    if let Ok(content) = std::fs::read_to_string(loader::SYSTEM_FILE) {
        sources.push((loader::SYSTEM_FILE.to_string(), content));
    }

    sources
}
