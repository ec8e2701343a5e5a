// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound reply handling for the Cadence outreach engine.
//!
//! [`KeywordClassifier`] is the built-in heuristic [`ReplyClassifier`]
//! (cadence_core::ReplyClassifier); [`ReplyProcessor`] stores replies,
//! classifies them, moves the lead and drafts suggested responses.

pub mod classifier;
pub mod responder;

pub use classifier::KeywordClassifier;
pub use responder::{ReplyOutcome, ReplyProcessor, SweepReport, sender_address};
