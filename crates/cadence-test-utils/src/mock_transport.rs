// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport adapter that captures outbound email.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use cadence_core::types::{AdapterType, HealthStatus, OutboundEmail};
use cadence_core::{CadenceError, PluginAdapter, TransportAdapter};
use tokio::sync::Mutex;

/// A transport that records every email instead of delivering it.
///
/// Like a provider honouring idempotency keys, a second send with the same
/// key returns the first message id without recording a duplicate.
pub struct MockTransport {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    by_key: Arc<Mutex<HashMap<String, String>>>,
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            by_key: Arc::new(Mutex::new(HashMap::new())),
            failures_left: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// Fail the next `n` calls with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Emails accepted so far, in order.
    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Every `send_email` call, including failed and de-duplicated ones.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl TransportAdapter for MockTransport {
    async fn send_email(&self, email: &OutboundEmail) -> Result<String, CadenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CadenceError::transport("mock transport failure"));
        }

        let mut by_key = self.by_key.lock().await;
        if let Some(existing) = by_key.get(&email.idempotency_key) {
            return Ok(existing.clone());
        }
        let message_id = format!("<mock-{}@cadence.test>", uuid::Uuid::new_v4());
        by_key.insert(email.idempotency_key.clone(), message_id.clone());
        self.sent.lock().await.push(email.clone());
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(key: &str) -> OutboundEmail {
        OutboundEmail {
            to: "ada@acme.test".into(),
            subject: "Hi".into(),
            body_html: "<p>Hi</p>".into(),
            body_text: "Hi".into(),
            idempotency_key: key.into(),
        }
    }

    #[tokio::test]
    async fn records_and_deduplicates() {
        let transport = MockTransport::new();
        let a = transport.send_email(&email("s-1")).await.unwrap();
        let b = transport.send_email(&email("s-1")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(transport.sent_count().await, 1);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn fails_the_requested_number_of_times() {
        let transport = MockTransport::new();
        transport.fail_next(2);
        assert!(transport.send_email(&email("s-1")).await.is_err());
        assert!(transport.send_email(&email("s-1")).await.is_err());
        assert!(transport.send_email(&email("s-1")).await.is_ok());
        assert_eq!(transport.sent_count().await, 1);
    }
}
