// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Cadence integration tests.
//!
//! Provides mock adapters, storage fixtures and a test harness for fast,
//! deterministic tests without an SMTP relay or a model endpoint.
//!
//! # Components
//!
//! - [`MockTransport`] - Records outbound email, can be told to fail
//! - [`MockContent`] - Deterministic drafts and suggested replies
//! - [`MockClassifier`] - Pre-configured reply classifications
//! - [`TestHarness`] - Temp SQLite database, config and event bus
//! - [`fixtures`] - Seed tenants, leads, campaigns and enrollments

pub mod fixtures;
pub mod harness;
pub mod mock_classifier;
pub mod mock_content;
pub mod mock_transport;

pub use harness::TestHarness;
pub use mock_classifier::MockClassifier;
pub use mock_content::MockContent;
pub use mock_transport::MockTransport;
