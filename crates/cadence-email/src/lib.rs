// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound email transports.
//!
//! [`SmtpTransport`] relays through the configured SMTP host with `lettre`.
//! Without a host the engine runs with [`LogTransport`], which accepts every
//! email and only logs it.

pub mod log;
pub mod smtp;

use std::sync::Arc;

use cadence_config::model::SmtpConfig;
use cadence_core::{CadenceError, TransportAdapter};

pub use log::LogTransport;
pub use smtp::SmtpTransport;

/// The transport selected by `[smtp]`.
pub fn from_config(config: &SmtpConfig) -> Result<Arc<dyn TransportAdapter>, CadenceError> {
    match config.host.as_deref() {
        Some(host) if !host.trim().is_empty() => Ok(Arc::new(SmtpTransport::new(config)?)),
        _ => Ok(Arc::new(LogTransport::new(&config.from_address))),
    }
}
