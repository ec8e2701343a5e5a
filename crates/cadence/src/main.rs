// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cadence - outreach campaign sequencing and delivery engine.
//!
//! This is the binary entry point: the long-running `serve` command and the
//! operator commands that work against the same database.

mod ops;
mod serve;
mod shutdown;

use std::path::PathBuf;

use cadence_config::model::CadenceConfig;
use cadence_core::CadenceError;
use cadence_core::types::SuppressionReason;
use clap::{Parser, Subcommand};

/// Cadence - outreach campaign sequencing and delivery engine.
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about, long_about = None)]
struct Cli {
    /// Configuration file. Defaults to the standard search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the engine: scheduler, workers and cron jobs.
    Serve,
    /// Validate the configuration and print the effective schedules.
    CheckConfig,
    /// Create or upgrade the database schema.
    Migrate,
    /// Approve a send that is waiting for manual review.
    Approve { send_id: String },
    /// Make a retry job due now with a fresh attempt budget.
    RetryJob { job_id: i64 },
    /// List jobs that exhausted their retries.
    FailedJobs {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Per-status lead and send counts for a campaign.
    Stats {
        campaign_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Block an address (`a@b.com`) or a whole domain (`b.com`).
    Suppress {
        value: String,
        /// Limit the block to one tenant. Omit for a global block.
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long, default_value = "manually_blocked")]
        reason: SuppressionReason,
        /// Lift the block automatically after this many days.
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => cadence_config::load_and_validate_path(path),
        None => cadence_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            cadence_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    serve::init_tracing(&config.engine.log_level);

    if let Err(e) = run(cli.command, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: CadenceConfig) -> Result<(), CadenceError> {
    match command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::CheckConfig => ops::check_config(&config),
        Commands::Migrate => ops::migrate(&config).await,
        Commands::Approve { send_id } => {
            let engine = serve::build_engine(&config).await?;
            ops::approve(&engine, &send_id).await
        }
        Commands::RetryJob { job_id } => {
            let engine = serve::build_engine(&config).await?;
            ops::retry_job(&engine, job_id).await
        }
        Commands::FailedJobs { limit, json } => {
            let engine = serve::build_engine(&config).await?;
            ops::failed_jobs(&engine, limit, json).await
        }
        Commands::Stats { campaign_id, json } => {
            let engine = serve::build_engine(&config).await?;
            ops::stats(&engine, &campaign_id, json).await
        }
        Commands::Suppress {
            value,
            tenant,
            reason,
            expires_in_days,
        } => {
            let engine = serve::build_engine(&config).await?;
            ops::suppress(&engine, &value, tenant.as_deref(), reason, expires_in_days).await
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_operator_commands() {
        let cli = Cli::try_parse_from(["cadence", "approve", "send-1"]).unwrap();
        assert!(matches!(cli.command, Commands::Approve { send_id } if send_id == "send-1"));

        let cli = Cli::try_parse_from([
            "cadence",
            "--config",
            "/tmp/cadence.toml",
            "suppress",
            "acme.test",
            "--reason",
            "complained",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cadence.toml")));
        match cli.command {
            Commands::Suppress {
                value,
                tenant,
                reason,
                ..
            } => {
                assert_eq!(value, "acme.test");
                assert_eq!(tenant, None);
                assert_eq!(reason, SuppressionReason::Complained);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_suppression_reason() {
        assert!(Cli::try_parse_from(["cadence", "suppress", "a@b.test", "--reason", "spite"]).is_err());
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = cadence_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.engine.name, "cadence");
    }
}
