// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery pipeline for the Cadence outreach engine.
//!
//! The gates ([`SuppressionChecker`], [`SendLimitGate`], the send-window
//! evaluator and the [`ApprovalGate`]) decide whether a composed email may
//! leave; the [`Dispatcher`] runs them in order and hands approved email to
//! the transport.

pub mod approval;
pub mod dispatcher;
pub mod limits;
pub mod recording;
pub mod suppression;
pub mod window;

use serde::{Deserialize, Serialize};

pub use approval::{ApprovalGate, ApproveOutcome, GateDecision, requires_approval};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use limits::{LimitCheck, SendLimitGate};
pub use suppression::{SuppressionCheck, SuppressionChecker};
pub use window::is_within_window;

/// Work queue consumed by the dispatch worker.
pub const DISPATCH_QUEUE: &str = "dispatch";

/// Payload of a [`DISPATCH_QUEUE`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub send_id: String,
}
