// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the external collaborators.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod classifier;
pub mod content;
pub mod transport;

pub use adapter::PluginAdapter;
pub use classifier::ReplyClassifier;
pub use content::ContentProvider;
pub use transport::TransportAdapter;
