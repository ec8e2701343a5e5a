// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock reply classifier with pre-configured results.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::types::{AdapterType, Classification, HealthStatus, Sentiment};
use cadence_core::{CadenceError, PluginAdapter, ReplyClassifier};
use tokio::sync::Mutex;

/// Pops queued results in FIFO order; a neutral, low-intent classification
/// is returned once the queue is empty.
pub struct MockClassifier {
    results: Arc<Mutex<VecDeque<Result<Classification, String>>>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queue a classification.
    pub async fn push(&self, sentiment: Sentiment, intent_score: u8) {
        self.results.lock().await.push_back(Ok(Classification {
            sentiment,
            intent_score,
            confidence: 0.9,
        }));
    }

    /// Queue a classifier failure.
    pub async fn push_failure(&self, message: &str) {
        self.results.lock().await.push_back(Err(message.to_string()));
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockClassifier {
    fn name(&self) -> &str {
        "mock-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ReplyClassifier for MockClassifier {
    async fn classify(&self, _subject: &str, _body: &str) -> Result<Classification, CadenceError> {
        match self.results.lock().await.pop_front() {
            Some(Ok(classification)) => Ok(classification),
            Some(Err(message)) => Err(CadenceError::provider(message)),
            None => Ok(Classification {
                sentiment: Sentiment::Neutral,
                intent_score: 1,
                confidence: 0.5,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_results_come_back_in_order() {
        let classifier = MockClassifier::new();
        classifier.push(Sentiment::Positive, 8).await;
        classifier.push_failure("model offline").await;

        let first = classifier.classify("Re: hi", "sounds great").await.unwrap();
        assert_eq!(first.sentiment, Sentiment::Positive);
        assert!(classifier.classify("Re: hi", "...").await.is_err());
        let fallback = classifier.classify("Re: hi", "...").await.unwrap();
        assert_eq!(fallback.sentiment, Sentiment::Neutral);
    }
}
