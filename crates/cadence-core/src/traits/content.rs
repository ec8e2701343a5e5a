// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content generation trait.

use async_trait::async_trait;

use crate::error::CadenceError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ComposeContext, Draft, ReplyContext};

/// Drafts outbound emails when no template fits, and suggested replies.
#[async_trait]
pub trait ContentProvider: PluginAdapter {
    /// Draft the email for one sequence step.
    async fn compose(&self, context: &ComposeContext) -> Result<Draft, CadenceError>;

    /// Draft a suggested response to a classified reply.
    async fn draft_reply(&self, context: &ReplyContext) -> Result<String, CadenceError>;
}
