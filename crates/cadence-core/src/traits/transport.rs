// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound email transport trait.

use async_trait::async_trait;

use crate::error::CadenceError;
use crate::traits::adapter::PluginAdapter;
use crate::types::OutboundEmail;

/// Adapter for the email delivery provider.
///
/// Failures are returned as `Err` (never encoded in the success value) and
/// are treated as transient by the dispatcher.
#[async_trait]
pub trait TransportAdapter: PluginAdapter {
    /// Sends one email and returns the provider's message id.
    async fn send_email(&self, email: &OutboundEmail) -> Result<String, CadenceError>;
}
