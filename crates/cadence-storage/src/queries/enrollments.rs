// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign lead (enrollment) operations.
//!
//! Status writes take the expected previous status and report whether they
//! applied. Callers compute the target status through
//! [`LeadStatus::apply`](cadence_core::types::LeadStatus) first.

use cadence_core::CadenceError;
use cadence_core::types::{LeadStatus, Sentiment};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{CAMPAIGN_LEAD_COLUMNS, CampaignLead, campaign_lead_from_row, parse_col};
use crate::queries::aliased;

/// Enroll a lead into a campaign. Re-enrolling returns the existing row.
///
/// Returns the enrollment and whether this call created it.
pub async fn enroll(
    db: &Database,
    id: &str,
    campaign_id: &str,
    lead_id: &str,
    now: &str,
) -> Result<(CampaignLead, bool), CadenceError> {
    let (id, campaign_id, lead_id, now) = (
        id.to_string(),
        campaign_id.to_string(),
        lead_id.to_string(),
        now.to_string(),
    );
    db.connection()
        .call(move |conn| {
            let created = conn.execute(
                "INSERT OR IGNORE INTO campaign_leads
                     (id, campaign_id, lead_id, current_step, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, 'pending', ?4, ?4)",
                params![id, campaign_id, lead_id, now],
            )? == 1;
            let row = conn.query_row(
                &format!(
                    "SELECT {CAMPAIGN_LEAD_COLUMNS} FROM campaign_leads
                     WHERE campaign_id = ?1 AND lead_id = ?2"
                ),
                params![campaign_id, lead_id],
                campaign_lead_from_row,
            )?;
            Ok((row, created))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an enrollment by ID.
pub async fn get_campaign_lead(
    db: &Database,
    id: &str,
) -> Result<Option<CampaignLead>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CAMPAIGN_LEAD_COLUMNS} FROM campaign_leads WHERE id = ?1"),
                params![id],
                campaign_lead_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Leads of one campaign whose next step is due, oldest due first.
pub async fn list_due(
    db: &Database,
    campaign_id: &str,
    now: &str,
    limit: u32,
) -> Result<Vec<CampaignLead>, CadenceError> {
    let (campaign_id, now) = (campaign_id.to_string(), now.to_string());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM campaign_leads cl
                 JOIN campaigns c ON c.id = cl.campaign_id
                 WHERE cl.campaign_id = ?1
                   AND cl.status = 'in_sequence'
                   AND cl.next_email_scheduled_at IS NOT NULL
                   AND cl.next_email_scheduled_at <= ?2
                   AND cl.current_step < c.total_steps
                 ORDER BY cl.next_email_scheduled_at ASC, cl.id ASC
                 LIMIT ?3",
                aliased(CAMPAIGN_LEAD_COLUMNS, "cl")
            ))?;
            let rows = stmt.query_map(params![campaign_id, now, limit], campaign_lead_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Enriched leads that have not started their sequence yet.
pub async fn list_ready(
    db: &Database,
    campaign_id: &str,
    limit: u32,
) -> Result<Vec<CampaignLead>, CadenceError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_LEAD_COLUMNS} FROM campaign_leads
                 WHERE campaign_id = ?1 AND status = 'ready' AND current_step = 0
                 ORDER BY created_at ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![campaign_id, limit], campaign_lead_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Leads still in progress that have already sent every step.
pub async fn list_finished(db: &Database, limit: u32) -> Result<Vec<CampaignLead>, CadenceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM campaign_leads cl
                 JOIN campaigns c ON c.id = cl.campaign_id
                 WHERE cl.status IN ('pending', 'ready', 'awaiting_approval', 'in_sequence')
                   AND cl.current_step >= c.total_steps
                 ORDER BY cl.updated_at ASC
                 LIMIT ?1",
                aliased(CAMPAIGN_LEAD_COLUMNS, "cl")
            ))?;
            let rows = stmt.query_map(params![limit], campaign_lead_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Conditional status change. Terminal targets clear the next scheduled send.
pub async fn transition_status(
    db: &Database,
    id: &str,
    from: LeadStatus,
    to: LeadStatus,
    now: &str,
) -> Result<bool, CadenceError> {
    let (id, now) = (id.to_string(), now.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE campaign_leads
                 SET status = ?1, updated_at = ?2,
                     next_email_scheduled_at = CASE WHEN ?3 THEN NULL ELSE next_email_scheduled_at END
                 WHERE id = ?4 AND status = ?5",
                params![to.to_string(), now, to.is_terminal(), id, from.to_string()],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Push the next attempt of a lead to `until` (rate limited, window closed).
pub async fn defer(
    db: &Database,
    id: &str,
    from: LeadStatus,
    to: LeadStatus,
    until: &str,
    now: &str,
) -> Result<bool, CadenceError> {
    let (id, until, now) = (id.to_string(), until.to_string(), now.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE campaign_leads
                 SET status = ?1, next_email_scheduled_at = ?2, updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![to.to_string(), until, now, id, from.to_string()],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Store the enrichment payload and matched value proposition.
pub async fn record_enrichment(
    db: &Database,
    id: &str,
    from: LeadStatus,
    to: LeadStatus,
    enrichment: Option<&str>,
    value_prop: Option<&str>,
    now: &str,
) -> Result<bool, CadenceError> {
    let (id, now) = (id.to_string(), now.to_string());
    let enrichment = enrichment.map(str::to_string);
    let value_prop = value_prop.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE campaign_leads
                 SET status = ?1, enrichment = ?2, matched_value_prop = ?3, updated_at = ?4
                 WHERE id = ?5 AND status = ?6",
                params![to.to_string(), enrichment, value_prop, now, id, from.to_string()],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Store a reply classification and move the lead in one conditional write.
pub async fn record_reply(
    db: &Database,
    id: &str,
    from: LeadStatus,
    to: LeadStatus,
    sentiment: Sentiment,
    intent_score: u8,
    now: &str,
) -> Result<bool, CadenceError> {
    let (id, now) = (id.to_string(), now.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE campaign_leads
                 SET status = ?1, reply_sentiment = ?2, intent_score = ?3, updated_at = ?4,
                     next_email_scheduled_at = CASE WHEN ?5 THEN next_email_scheduled_at ELSE NULL END
                 WHERE id = ?6 AND status = ?7",
                params![
                    to.to_string(),
                    sentiment.to_string(),
                    intent_score,
                    now,
                    to == LeadStatus::InSequence,
                    id,
                    from.to_string()
                ],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The enrollment an inbound reply most likely belongs to: the most recently
/// mailed enrollment of a lead with this address.
pub async fn find_by_sender(
    db: &Database,
    sender: &str,
) -> Result<Option<CampaignLead>, CadenceError> {
    let sender = sender.trim().to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM campaign_leads cl
                     JOIN leads l ON l.id = cl.lead_id
                     WHERE l.email = ?1
                     ORDER BY cl.last_sent_at DESC NULLS LAST, cl.updated_at DESC
                     LIMIT 1",
                    aliased(CAMPAIGN_LEAD_COLUMNS, "cl")
                ),
                params![sender],
                campaign_lead_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Per-status enrollment counts for one campaign.
pub async fn status_counts(
    db: &Database,
    campaign_id: &str,
) -> Result<Vec<(LeadStatus, u64)>, CadenceError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM campaign_leads
                 WHERE campaign_id = ?1 GROUP BY status ORDER BY status",
            )?;
            let rows = stmt.query_map(params![campaign_id], |row| {
                Ok((parse_col(row, 0)?, row.get(1)?))
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
