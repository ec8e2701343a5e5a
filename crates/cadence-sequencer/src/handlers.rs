// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `send` retry jobs: compose or dispatch work that failed after its
//! immediate attempts.

use async_trait::async_trait;
use cadence_core::CadenceError;
use cadence_core::types::RetryableJob;
use cadence_delivery::{DispatchRequest, Dispatcher};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compose::{ComposeRequest, StepComposer};
use crate::retry::JobHandler;

/// Payload of a `send` retry job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SendJob {
    Compose(ComposeRequest),
    Dispatch(DispatchRequest),
}

pub struct SendJobHandler {
    composer: StepComposer,
    dispatcher: Dispatcher,
}

impl SendJobHandler {
    pub fn new(composer: StepComposer, dispatcher: Dispatcher) -> Self {
        Self {
            composer,
            dispatcher,
        }
    }
}

#[async_trait]
impl JobHandler for SendJobHandler {
    async fn handle(&self, job: &RetryableJob, now: DateTime<Utc>) -> Result<(), CadenceError> {
        let payload: SendJob = serde_json::from_str(&job.payload)
            .map_err(|e| CadenceError::Internal(format!("send job {}: {e}", job.id)))?;
        match payload {
            SendJob::Compose(request) => {
                let outcome = self.composer.compose_step(&request, now).await?;
                debug!(job_id = job.id, ?outcome, "compose retried");
            }
            SendJob::Dispatch(request) => {
                let outcome = self.dispatcher.dispatch(&request.send_id, now).await?;
                debug!(job_id = job.id, outcome = outcome.label(), "dispatch retried");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_tagged_by_kind() {
        let job = SendJob::Dispatch(DispatchRequest {
            send_id: "s-1".into(),
        });
        let json = serde_json::to_string(&job).unwrap();
        assert_eq!(json, r#"{"kind":"dispatch","send_id":"s-1"}"#);
        let back: SendJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }
}
