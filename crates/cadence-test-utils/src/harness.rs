// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness with a temp database and mock adapters.
//!
//! `TestHarness` owns a migrated SQLite database in a temp directory, a
//! default configuration, an event bus and the three mock adapters. The
//! engine crates build their components on top of it in their own tests.

use std::sync::Arc;

use cadence_bus::EventBus;
use cadence_config::model::{CadenceConfig, StorageConfig};
use cadence_core::CadenceError;
use cadence_storage::Database;

use crate::mock_classifier::MockClassifier;
use crate::mock_content::MockContent;
use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: CadenceConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = CadenceConfig::default();
        // No sleeping between immediate attempts in tests.
        config.delivery.immediate_delay_ms = 0;
        Self { config }
    }

    /// Replace the whole configuration. The database path is always overridden.
    pub fn with_config(mut self, config: CadenceConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default per-campaign daily limit.
    pub fn with_default_campaign_limit(mut self, limit: u32) -> Self {
        self.config.delivery.default_campaign_daily_limit = Some(limit);
        self
    }

    pub async fn build(self) -> Result<TestHarness, CadenceError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| CadenceError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        let db = Database::from_config(&config.storage).await?;

        Ok(TestHarness {
            db,
            config,
            bus: EventBus::new(256),
            transport: Arc::new(MockTransport::new()),
            content: Arc::new(MockContent::new()),
            classifier: Arc::new(MockClassifier::new()),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// Migrated database (temp file, removed on drop).
    pub db: Database,
    pub config: CadenceConfig,
    pub bus: EventBus,
    pub transport: Arc<MockTransport>,
    pub content: Arc<MockContent>,
    pub classifier: Arc<MockClassifier>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<TestHarness, CadenceError> {
        Self::builder().build().await
    }
}
