// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the storage, delivery, compose, reply and
//! sequencer crates.
//!
//! Status enums render to the exact snake_case strings stored in SQLite, so
//! `to_string()` / `from_str()` are the only conversions the query layer needs.
//! Timestamps are RFC 3339 UTC strings (see [`crate::time`]).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of pluggable adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Classifier,
    Content,
}

/// Lifecycle status of a campaign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Active,
    Paused,
    Completed,
}

/// Sequencing status of one enrollment (campaign lead).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Pending,
    Ready,
    AwaitingApproval,
    InSequence,
    Replied,
    Positive,
    NotInterested,
    Unsubscribed,
    Completed,
}

impl LeadStatus {
    /// Terminal statuses are never selected by the scheduler again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LeadStatus::Completed | LeadStatus::NotInterested | LeadStatus::Unsubscribed
        )
    }
}

/// Status of one concrete email for one step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    PendingApproval,
    Approved,
    /// Claimed by a dispatcher; the transport call is in flight.
    Sending,
    Sent,
    Suppressed,
    RateLimited,
    Failed,
}

impl SendStatus {
    /// Terminal for this attempt. A step may only be re-composed once its
    /// previous attempt is terminal and not `sent`.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            SendStatus::PendingApproval | SendStatus::Approved | SendStatus::Sending
        )
    }
}

/// Why an address is suppressed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    Unsubscribed,
    Bounced,
    Complained,
    ManuallyBlocked,
}

/// Whether a suppression entry matches a full address or a whole domain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SuppressionKind {
    Address,
    Domain,
}

/// Kind of work a retryable job performs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Routing,
    Send,
    Enrichment,
    Webhook,
}

/// Status of a retryable job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

/// Reply sentiment produced by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Question,
    NotInterested,
    OutOfOffice,
    Unsubscribe,
}

impl Sentiment {
    /// Sentiments that may receive a drafted suggested response.
    pub fn wants_suggested_reply(self) -> bool {
        matches!(
            self,
            Sentiment::Positive | Sentiment::Neutral | Sentiment::Question
        )
    }
}

/// Which daily ceiling blocked a send.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    Campaign,
    Tenant,
    None,
}

/// A tenant owning campaigns and leads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    /// Daily send ceiling across all campaigns. `None` = unlimited.
    pub daily_send_limit: Option<u32>,
    pub created_at: String,
}

/// A prospect that can be enrolled into campaigns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub tenant_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    /// IANA timezone of the lead, overriding the campaign window timezone.
    pub timezone: Option<String>,
    /// Audience segment used by template best-fit scoring.
    pub segment: Option<String>,
    pub created_at: String,
}

/// A tenant-owned outreach definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub total_steps: u32,
    pub auto_send_approved: bool,
    /// Per-campaign daily send ceiling. `None` = unlimited.
    pub daily_send_limit: Option<u32>,
    pub settings: crate::settings::CampaignSettings,
    pub starts_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-lead sequencing progress inside one campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignLead {
    pub id: String,
    pub campaign_id: String,
    pub lead_id: String,
    pub current_step: u32,
    pub status: LeadStatus,
    pub last_sent_at: Option<String>,
    pub next_email_scheduled_at: Option<String>,
    /// Opaque enrichment payload (JSON) from the enrichment vendor.
    pub enrichment: Option<String>,
    pub matched_value_prop: Option<String>,
    pub reply_sentiment: Option<Sentiment>,
    pub intent_score: Option<u8>,
    pub created_at: String,
    pub updated_at: String,
}

/// One concrete message instance for one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSend {
    pub id: String,
    pub campaign_lead_id: String,
    pub campaign_id: String,
    pub tenant_id: String,
    pub recipient: String,
    pub subject: String,
    pub body_html: String,
    pub body_text: String,
    pub step_number: u32,
    pub status: SendStatus,
    pub message_id: Option<String>,
    pub variant_id: Option<String>,
    pub template_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub approved_at: Option<String>,
    pub sent_at: Option<String>,
    pub updated_at: String,
}

/// One arm of an A/B content experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub campaign_id: String,
    pub key: String,
    pub subject_template: String,
    pub body_template: String,
    pub weight: u32,
    pub active: bool,
    pub created_at: String,
}

/// An entry of a campaign's template pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub campaign_id: String,
    pub name: String,
    /// Step this template was written for. `None` fits any step.
    pub step_number: Option<u32>,
    /// Audience segment this template targets. `None` fits any segment.
    pub segment: Option<String>,
    pub subject_template: String,
    pub body_template: String,
    pub created_at: String,
}

/// A do-not-contact marker for an address or a domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionEntry {
    pub id: i64,
    /// `None` applies to every tenant.
    pub tenant_id: Option<String>,
    pub value: String,
    pub kind: SuppressionKind,
    pub reason: SuppressionReason,
    /// Temporary suppressions stop matching after this instant.
    pub expires_at: Option<String>,
    pub created_at: String,
}

/// An inbound reply and its classification, once classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub campaign_lead_id: Option<String>,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: String,
    pub sentiment: Option<Sentiment>,
    pub intent_score: Option<u8>,
    pub confidence: Option<f32>,
    pub suggested_response: Option<String>,
    pub classified_at: Option<String>,
}

/// A failed unit of work eligible for a later attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryableJob {
    pub id: i64,
    pub job_type: JobType,
    /// JSON payload carrying the ids needed to re-fetch current state.
    pub payload: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_attempt_at: String,
    pub locked_until: Option<String>,
    pub last_error: Option<String>,
    /// Set only once the retry budget is exhausted.
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A short-lived mutual-exclusion marker on a lead during routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingLock {
    pub lead_id: String,
    pub holder_id: String,
    pub acquired_at: String,
}

/// A work queue entry handed from the scheduler to the workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

/// Output of the reply classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub sentiment: Sentiment,
    /// Buying intent, 0-10.
    pub intent_score: u8,
    /// Classifier confidence, 0.0-1.0.
    pub confidence: f32,
}

/// A composed email ready to be stored as an `EmailSend`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub subject: String,
    pub body_html: String,
    pub body_text: String,
    pub template_id: Option<String>,
    pub variant_id: Option<String>,
}

/// Everything a content provider needs to draft an email for one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeContext {
    pub campaign_name: String,
    pub step_number: u32,
    pub total_steps: u32,
    pub lead: Lead,
    pub value_prop: Option<String>,
    pub enrichment: Option<String>,
}

/// Context for drafting a suggested response to an inbound reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyContext {
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub classification: Classification,
    pub lead: Option<Lead>,
}

/// A message handed to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body_html: String,
    pub body_text: String,
    /// Stable key (the `EmailSend` id) so a re-delivered send can be
    /// de-duplicated by the provider.
    pub idempotency_key: String,
}
