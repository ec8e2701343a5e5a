// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport used when no SMTP host is configured.

use async_trait::async_trait;
use cadence_core::types::{AdapterType, HealthStatus, OutboundEmail};
use cadence_core::{CadenceError, PluginAdapter, TransportAdapter};
use tracing::info;

use crate::smtp::message_id_for;

pub struct LogTransport {
    from: String,
}

impl LogTransport {
    pub fn new(from_address: &str) -> Self {
        Self {
            from: from_address.to_string(),
        }
    }
}

#[async_trait]
impl PluginAdapter for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        Ok(HealthStatus::Degraded("no SMTP host configured, email is only logged".into()))
    }
}

#[async_trait]
impl TransportAdapter for LogTransport {
    async fn send_email(&self, email: &OutboundEmail) -> Result<String, CadenceError> {
        let message_id = message_id_for(&email.idempotency_key, &self.from);
        info!(
            to = %email.to,
            subject = %email.subject,
            message_id = %message_id,
            "email logged (no SMTP host)"
        );
        Ok(message_id)
    }
}
