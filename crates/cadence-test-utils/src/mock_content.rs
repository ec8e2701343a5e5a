// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock content provider with deterministic output.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use cadence_core::types::{AdapterType, ComposeContext, Draft, HealthStatus, ReplyContext};
use cadence_core::{CadenceError, ContentProvider, PluginAdapter};

/// Drafts `Step N for <email>` and a fixed suggested reply.
pub struct MockContent {
    failures_left: AtomicU32,
    compose_calls: AtomicU32,
}

impl MockContent {
    pub fn new() -> Self {
        Self {
            failures_left: AtomicU32::new(0),
            compose_calls: AtomicU32::new(0),
        }
    }

    /// Fail the next `n` calls (compose or draft_reply) with a provider error.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn compose_calls(&self) -> u32 {
        self.compose_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), CadenceError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(CadenceError::provider("mock content failure"))
        } else {
            Ok(())
        }
    }
}

impl Default for MockContent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockContent {
    fn name(&self) -> &str {
        "mock-content"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Content
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ContentProvider for MockContent {
    async fn compose(&self, context: &ComposeContext) -> Result<Draft, CadenceError> {
        self.compose_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        let text = format!("Step {} for {}", context.step_number, context.lead.email);
        Ok(Draft {
            subject: format!("{} ({}/{})", context.campaign_name, context.step_number, context.total_steps),
            body_html: format!("<p>{text}</p>"),
            body_text: text,
            template_id: None,
            variant_id: None,
        })
    }

    async fn draft_reply(&self, context: &ReplyContext) -> Result<String, CadenceError> {
        self.take_failure()?;
        Ok(format!("Thanks for getting back to us about \"{}\".", context.subject))
    }
}
