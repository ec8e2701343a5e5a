// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Cadence outreach engine.

use thiserror::Error;

/// The primary error type used across all Cadence crates.
///
/// Policy outcomes (suppressed, rate limited, outside the send window) are
/// NOT errors; they are reported through outcome enums by the delivery crate.
#[derive(Debug, Error)]
pub enum CadenceError {
    /// Configuration errors (invalid TOML, bad cron expression, invalid settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound email transport failures. Always treated as transient.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Content generation or classification provider failures.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A required row is missing (lead deleted mid-flight, unknown id).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A state machine rejected an event.
    #[error("invalid {entity} transition: {from} cannot accept {event}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        event: String,
    },

    /// A conditional write lost a race or a lock is held by someone else.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CadenceError {
    /// Whether retrying the same operation later can succeed.
    ///
    /// Transport, provider, timeout and conflict errors are transient and
    /// escalate to the retry processor. Missing rows and invalid transitions
    /// are data-integrity failures and are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CadenceError::Transport { .. }
                | CadenceError::Provider { .. }
                | CadenceError::Timeout { .. }
                | CadenceError::Conflict(_)
                | CadenceError::Storage { .. }
        )
    }

    /// Shorthand for a transport failure without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        CadenceError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a provider failure without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        CadenceError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a missing row.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CadenceError::NotFound {
            entity,
            id: id.into(),
        }
    }
}
