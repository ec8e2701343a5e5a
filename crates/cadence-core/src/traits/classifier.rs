// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply classification trait.

use async_trait::async_trait;

use crate::error::CadenceError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Classification;

/// Classifies inbound reply text into sentiment, intent and confidence.
#[async_trait]
pub trait ReplyClassifier: PluginAdapter {
    /// Classify the reply subject and body.
    async fn classify(&self, subject: &str, body: &str) -> Result<Classification, CadenceError>;
}
