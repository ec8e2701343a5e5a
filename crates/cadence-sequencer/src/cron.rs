// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cron-driven periodic jobs (5-field expressions, evaluated in UTC).

use std::future::Future;
use std::str::FromStr;

use cadence_core::CadenceError;
use chrono::{DateTime, Utc};
use croner::Cron;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A named, parsed cron expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    name: &'static str,
    expr: String,
    cron: Cron,
}

impl CronSchedule {
    pub fn parse(name: &'static str, expr: &str) -> Result<Self, CadenceError> {
        let cron = Cron::from_str(expr)
            .map_err(|e| CadenceError::Config(format!("{name} schedule `{expr}`: {e}")))?;
        Ok(Self {
            name,
            expr: expr.to_string(),
            cron,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// First occurrence strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, CadenceError> {
        self.cron
            .find_next_occurrence(&now, false)
            .map_err(|e| CadenceError::Config(format!("{} schedule `{}`: {e}", self.name, self.expr)))
    }
}

/// Run `job` at every occurrence of `schedule` until `cancel` fires.
/// Job errors are logged; the loop keeps going.
pub async fn run_cron<F, Fut, T>(schedule: CronSchedule, cancel: CancellationToken, mut job: F)
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = Result<T, CadenceError>>,
    T: std::fmt::Debug,
{
    info!(job = schedule.name(), expr = %schedule.expr, "cron job started");
    loop {
        let next = match schedule.next_after(Utc::now()) {
            Ok(next) => next,
            Err(e) => {
                warn!(job = schedule.name(), error = %e, "no next occurrence, stopping");
                return;
            }
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => {
                info!(job = schedule.name(), "cron job shutting down");
                return;
            }
        }

        match job(Utc::now()).await {
            Ok(result) => debug!(job = schedule.name(), ?result, "cron job finished"),
            Err(e) => warn!(job = schedule.name(), error = %e, "cron job failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn next_occurrence_follows_the_expression() {
        let hourly = CronSchedule::parse("scan", "0 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 10, 15, 0).unwrap();
        assert_eq!(
            hourly.next_after(now).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap()
        );

        let midnight = CronSchedule::parse("reset", "0 0 * * *").unwrap();
        assert_eq!(
            midnight.next_after(now).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn bad_expression_is_a_config_error() {
        let err = CronSchedule::parse("retry", "every five minutes").unwrap_err();
        assert!(matches!(err, CadenceError::Config(_)));
    }

    #[tokio::test]
    async fn cancelled_loop_returns() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let schedule = CronSchedule::parse("scan", "0 * * * *").unwrap();
        run_cron(schedule, cancel, |_| async { Ok::<_, CadenceError>(()) }).await;
    }
}
