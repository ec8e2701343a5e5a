// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery metrics.

use metrics::describe_counter;

/// Register metric descriptions. Call once after installing a recorder.
pub fn register_metrics() {
    describe_counter!("cadence_sends_total", "Dispatch attempts by outcome");
    describe_counter!("cadence_transport_errors_total", "Transport send failures");
}

/// Count one dispatch outcome.
pub fn record_send_outcome(outcome: &'static str) {
    metrics::counter!("cadence_sends_total", "outcome" => outcome).increment(1);
}

pub fn record_transport_error() {
    metrics::counter!("cadence_transport_errors_total").increment(1);
}
