// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Cadence outreach sequencing engine.
//!
//! This crate provides the foundational types, the campaign and enrollment
//! state machines, typed campaign settings, the error type, and the adapter
//! traits implemented by transports and content providers.

pub mod error;
pub mod settings;
pub mod state;
pub mod time;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CadenceError;
pub use settings::{CampaignSettings, ResolvedWindow, SendWindow, SequenceSettings};
pub use state::{CampaignEvent, LeadEvent};
pub use types::{AdapterType, HealthStatus};

// Re-export all adapter traits at crate root.
pub use traits::{ContentProvider, PluginAdapter, ReplyClassifier, TransportAdapter};
