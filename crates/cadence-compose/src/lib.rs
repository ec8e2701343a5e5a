// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email composition for the Cadence outreach engine.
//!
//! - [`VariantAssignor`] picks and remembers one A/B variant per enrollment.
//! - [`Composer`] turns a step into subject and bodies: the assigned variant
//!   first, then the best-fitting template, then the content provider.
//! - [`BuiltinContent`] is the content provider used when none is configured.

pub mod builtin;
pub mod composer;
pub mod render;
pub mod variant;

pub use builtin::BuiltinContent;
pub use composer::{Composer, best_fit_template};
pub use render::{TemplateVars, render, text_to_html};
pub use variant::{VariantAssignor, choose_variant};
