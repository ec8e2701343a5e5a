// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities and their row mappings.
//!
//! The canonical types live in `cadence-core::types`; this module re-exports
//! them and owns the column lists and `from_row` mappers shared by the query
//! modules.

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;

pub use cadence_core::types::{
    Campaign, CampaignLead, EmailSend, Lead, QueueEntry, Reply, RetryableJob, RoutingLock,
    SuppressionEntry, Template, Tenant, Variant,
};
use cadence_core::CampaignSettings;

/// Read a TEXT column and parse it into a strum enum.
pub(crate) fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Nullable variant of [`parse_col`].
pub(crate) fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        value
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub(crate) const TENANT_COLUMNS: &str = "id, name, daily_send_limit, created_at";

pub(crate) fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: row.get(0)?,
        name: row.get(1)?,
        daily_send_limit: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) const LEAD_COLUMNS: &str =
    "id, tenant_id, email, first_name, last_name, company, title, timezone, segment, created_at";

pub(crate) fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        company: row.get(5)?,
        title: row.get(6)?,
        timezone: row.get(7)?,
        segment: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub(crate) const CAMPAIGN_COLUMNS: &str = "id, tenant_id, name, status, total_steps, \
     auto_send_approved, daily_send_limit, settings, starts_at, created_at, updated_at";

pub(crate) fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    let settings: String = row.get(7)?;
    Ok(Campaign {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        status: parse_col(row, 3)?,
        total_steps: row.get(4)?,
        auto_send_approved: row.get(5)?,
        daily_send_limit: row.get(6)?,
        settings: CampaignSettings::from_json(&settings),
        starts_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub(crate) const CAMPAIGN_LEAD_COLUMNS: &str = "id, campaign_id, lead_id, current_step, status, \
     last_sent_at, next_email_scheduled_at, enrichment, matched_value_prop, reply_sentiment, \
     intent_score, created_at, updated_at";

pub(crate) fn campaign_lead_from_row(row: &Row<'_>) -> rusqlite::Result<CampaignLead> {
    Ok(CampaignLead {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        lead_id: row.get(2)?,
        current_step: row.get(3)?,
        status: parse_col(row, 4)?,
        last_sent_at: row.get(5)?,
        next_email_scheduled_at: row.get(6)?,
        enrichment: row.get(7)?,
        matched_value_prop: row.get(8)?,
        reply_sentiment: parse_opt_col(row, 9)?,
        intent_score: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub(crate) const SEND_COLUMNS: &str = "id, campaign_lead_id, campaign_id, tenant_id, recipient, \
     subject, body_html, body_text, step_number, status, message_id, variant_id, template_id, \
     last_error, created_at, approved_at, sent_at, updated_at";

pub(crate) fn send_from_row(row: &Row<'_>) -> rusqlite::Result<EmailSend> {
    Ok(EmailSend {
        id: row.get(0)?,
        campaign_lead_id: row.get(1)?,
        campaign_id: row.get(2)?,
        tenant_id: row.get(3)?,
        recipient: row.get(4)?,
        subject: row.get(5)?,
        body_html: row.get(6)?,
        body_text: row.get(7)?,
        step_number: row.get(8)?,
        status: parse_col(row, 9)?,
        message_id: row.get(10)?,
        variant_id: row.get(11)?,
        template_id: row.get(12)?,
        last_error: row.get(13)?,
        created_at: row.get(14)?,
        approved_at: row.get(15)?,
        sent_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

pub(crate) const VARIANT_COLUMNS: &str =
    "id, campaign_id, key, subject_template, body_template, weight, active, created_at";

pub(crate) fn variant_from_row(row: &Row<'_>) -> rusqlite::Result<Variant> {
    Ok(Variant {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        key: row.get(2)?,
        subject_template: row.get(3)?,
        body_template: row.get(4)?,
        weight: row.get(5)?,
        active: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) const TEMPLATE_COLUMNS: &str =
    "id, campaign_id, name, step_number, segment, subject_template, body_template, created_at";

pub(crate) fn template_from_row(row: &Row<'_>) -> rusqlite::Result<Template> {
    Ok(Template {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        name: row.get(2)?,
        step_number: row.get(3)?,
        segment: row.get(4)?,
        subject_template: row.get(5)?,
        body_template: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) const SUPPRESSION_COLUMNS: &str =
    "id, tenant_id, value, kind, reason, expires_at, created_at";

pub(crate) fn suppression_from_row(row: &Row<'_>) -> rusqlite::Result<SuppressionEntry> {
    Ok(SuppressionEntry {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        value: row.get(2)?,
        kind: parse_col(row, 3)?,
        reason: parse_col(row, 4)?,
        expires_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub(crate) const REPLY_COLUMNS: &str = "id, campaign_lead_id, sender, subject, body, received_at, \
     sentiment, intent_score, confidence, suggested_response, classified_at";

pub(crate) fn reply_from_row(row: &Row<'_>) -> rusqlite::Result<Reply> {
    let confidence: Option<f64> = row.get(8)?;
    Ok(Reply {
        id: row.get(0)?,
        campaign_lead_id: row.get(1)?,
        sender: row.get(2)?,
        subject: row.get(3)?,
        body: row.get(4)?,
        received_at: row.get(5)?,
        sentiment: parse_opt_col(row, 6)?,
        intent_score: row.get(7)?,
        confidence: confidence.map(|c| c as f32),
        suggested_response: row.get(9)?,
        classified_at: row.get(10)?,
    })
}

pub(crate) const JOB_COLUMNS: &str = "id, job_type, payload, status, attempts, max_attempts, \
     next_attempt_at, locked_until, last_error, failure_reason, created_at, updated_at";

pub(crate) fn job_from_row(row: &Row<'_>) -> rusqlite::Result<RetryableJob> {
    Ok(RetryableJob {
        id: row.get(0)?,
        job_type: parse_col(row, 1)?,
        payload: row.get(2)?,
        status: parse_col(row, 3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        next_attempt_at: row.get(6)?,
        locked_until: row.get(7)?,
        last_error: row.get(8)?,
        failure_reason: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub(crate) const QUEUE_COLUMNS: &str =
    "id, queue_name, payload, status, attempts, max_attempts, created_at, updated_at, locked_until";

pub(crate) fn queue_entry_from_row(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        locked_until: row.get(8)?,
    })
}
