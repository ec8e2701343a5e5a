// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequencing and orchestration for the Cadence outreach engine.
//!
//! - [`SequenceScheduler`] finds due work and queues it
//! - [`StepComposer`] drafts one step and routes it through the approval gate
//! - [`LeadRouter`] enrolls leads under a routing lock
//! - [`Enricher`] prepares pending leads for their first step
//! - [`CampaignLifecycle`] drives campaign status changes
//! - [`RetryProcessor`] persists failed work and replays it with backoff
//! - [`Engine`] wires all of it together and runs the background loops

pub mod campaigns;
pub mod compose;
pub mod cron;
pub mod engine;
pub mod enrichment;
pub mod handlers;
pub mod retry;
pub mod routing;
pub mod scheduler;
pub mod workflow;

pub use campaigns::CampaignLifecycle;
pub use compose::{COMPOSE_QUEUE, ComposeOutcome, ComposeRequest, SkipReason, StepComposer};
pub use cron::{CronSchedule, run_cron};
pub use engine::{CampaignStats, Engine, QueueReport};
pub use enrichment::{EnrichOutcome, Enricher, EnrichmentRequest};
pub use handlers::SendJob;
pub use retry::{CleanupReport, DrainReport, JobHandler, JobScheduler, RetryProcessor, backoff_delay};
pub use routing::{LeadRouter, RouteOutcome, RouteRequest};
pub use scheduler::{ScanReport, SequenceScheduler};
pub use workflow::{StepPolicy, run_step};
