// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process step runner with immediate retries.
//!
//! A step that keeps failing with a transient error after its immediate
//! attempts is handed back to the caller, which persists it as a
//! [`RetryableJob`](cadence_core::types::RetryableJob). Non-transient errors
//! are returned at once.

use std::future::Future;
use std::time::Duration;

use cadence_config::model::DeliveryConfig;
use cadence_core::CadenceError;
use tracing::{debug, warn};

/// Immediate retry policy for [`run_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl StepPolicy {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            attempts: config.immediate_attempts.max(1),
            delay: Duration::from_millis(config.immediate_delay_ms),
        }
    }

    /// One attempt, no delay.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Run `step` up to `policy.attempts` times while it fails transiently.
pub async fn run_step<T, F, Fut>(name: &str, policy: StepPolicy, mut step: F) -> Result<T, CadenceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CadenceError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match step().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(step = name, attempt, "step succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(step = name, attempt, error = %e, "transient step failure, retrying");
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy(attempts: u32) -> StepPolicy {
        StepPolicy {
            attempts,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = run_step("flaky", policy(3), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CadenceError::transport("connection reset"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_last_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = run_step("down", policy(2), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CadenceError::transport("down"))
            }
        })
        .await;
        assert!(matches!(result, Err(CadenceError::Transport { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = run_step("missing", policy(5), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CadenceError::not_found("lead", "l-1"))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
