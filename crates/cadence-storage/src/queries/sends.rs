// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! EmailSend operations.
//!
//! The partial unique index `idx_email_sends_one_live_per_step` guarantees at
//! most one `pending_approval | approved | sending | sent` row per
//! (enrollment, step). Daily send counts are derived from `sent` rows here;
//! there is no separate counter to drift.
//!
//! A dispatcher must claim a send (`approved -> sending`, see
//! [`claim_for_transport`]) before calling the transport. The claim re-counts
//! sent and in-flight rows against both daily ceilings in the same
//! transaction, so concurrent dispatches can neither overshoot a ceiling nor
//! send one row twice.

use cadence_core::CadenceError;
use cadence_core::state::LeadEvent;
use cadence_core::types::{LeadStatus, LimitType, SendStatus};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{EmailSend, SEND_COLUMNS, parse_col, send_from_row};
use crate::queries::aliased;

/// Result of storing a composed draft.
#[derive(Debug, Clone)]
pub enum DraftInsert {
    /// The row was created and the lead moved.
    Created(EmailSend),
    /// A live or sent row already exists for this step; nothing was written.
    Existing(EmailSend),
    /// The lead is no longer in the expected status or step; nothing was written.
    LeadMoved,
}

/// Result of recording a confirmed transport send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentRecord {
    /// The send moved `sending -> sent` in this call.
    pub applied: bool,
    /// The lead's `current_step` advanced in this call.
    pub lead_advanced: bool,
    /// Lead status after the write.
    pub lead_status: Option<LeadStatus>,
}

/// Result of claiming an approved send for the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendClaim {
    /// The send moved `approved -> sending`; the caller owns the transport call.
    Claimed,
    /// Sent plus in-flight rows already fill this ceiling; nothing was written.
    Limited(LimitType),
    /// The send was not `approved` (another dispatcher claimed it, or it moved on).
    NotApproved,
}

/// Daily ceilings re-checked by [`claim_for_transport`]. `None` is unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyCeilings {
    pub campaign: Option<u32>,
    pub tenant: Option<u32>,
}

/// Which daily ceiling to count against.
#[derive(Debug, Clone, Copy)]
pub enum SendScope<'a> {
    Campaign(&'a str),
    Tenant(&'a str),
}

/// Store a draft and move its lead, atomically.
///
/// The lead must be in `lead_from` with `current_step = send.step_number - 1`.
/// It moves to `lead_to` and its next scheduled send is cleared.
pub async fn insert_draft(
    db: &Database,
    send: &EmailSend,
    lead_from: LeadStatus,
    lead_to: LeadStatus,
) -> Result<DraftInsert, CadenceError> {
    let send = send.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO email_sends ({SEND_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                             ?16, ?17, ?18)"
                ),
                params![
                    send.id,
                    send.campaign_lead_id,
                    send.campaign_id,
                    send.tenant_id,
                    send.recipient,
                    send.subject,
                    send.body_html,
                    send.body_text,
                    send.step_number,
                    send.status.to_string(),
                    send.message_id,
                    send.variant_id,
                    send.template_id,
                    send.last_error,
                    send.created_at,
                    send.approved_at,
                    send.sent_at,
                    send.updated_at,
                ],
            )?;

            if inserted == 0 {
                let existing = tx.query_row(
                    &format!(
                        "SELECT {SEND_COLUMNS} FROM email_sends
                         WHERE (campaign_lead_id = ?1 AND step_number = ?2
                                AND status IN ('pending_approval', 'approved', 'sending', 'sent'))
                            OR id = ?3
                         LIMIT 1"
                    ),
                    params![send.campaign_lead_id, send.step_number, send.id],
                    send_from_row,
                )?;
                return Ok(DraftInsert::Existing(existing));
            }

            let moved = tx.execute(
                "UPDATE campaign_leads
                 SET status = ?1, next_email_scheduled_at = NULL, updated_at = ?2
                 WHERE id = ?3 AND status = ?4 AND current_step = ?5",
                params![
                    lead_to.to_string(),
                    send.created_at,
                    send.campaign_lead_id,
                    lead_from.to_string(),
                    send.step_number.saturating_sub(1),
                ],
            )?;
            if moved == 0 {
                // Dropping the transaction rolls back the insert.
                return Ok(DraftInsert::LeadMoved);
            }

            tx.commit()?;
            Ok(DraftInsert::Created(send))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a send by ID.
pub async fn get_send(db: &Database, id: &str) -> Result<Option<EmailSend>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SEND_COLUMNS} FROM email_sends WHERE id = ?1"),
                params![id],
                send_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// `pending_approval -> approved`. Returns `false` if the send was not pending.
pub async fn approve(db: &Database, id: &str, now: &str) -> Result<bool, CadenceError> {
    let (id, now) = (id.to_string(), now.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE email_sends SET status = 'approved', approved_at = ?1, updated_at = ?1
                 WHERE id = ?2 AND status = 'pending_approval'",
                params![now, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Conditional status change with an optional error note.
pub async fn transition_status(
    db: &Database,
    id: &str,
    from: SendStatus,
    to: SendStatus,
    note: Option<&str>,
    now: &str,
) -> Result<bool, CadenceError> {
    let (id, now) = (id.to_string(), now.to_string());
    let note = note.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE email_sends
                 SET status = ?1, last_error = COALESCE(?2, last_error), updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![to.to_string(), note, now, id, from.to_string()],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Claim an approved send for the transport, in one transaction.
///
/// Counts today's `sent` rows plus every `sending` row for the campaign and
/// the tenant, and refuses the claim when either ceiling is already filled.
/// Otherwise moves the send `approved -> sending` with a lease that
/// [`recover_expired_claims`] honors.
pub async fn claim_for_transport(
    db: &Database,
    id: &str,
    ceilings: DailyCeilings,
    day_start: &str,
    day_end: &str,
    lease_until: &str,
    now: &str,
) -> Result<SendClaim, CadenceError> {
    let (id, now, lease_until) = (id.to_string(), now.to_string(), lease_until.to_string());
    let (day_start, day_end) = (day_start.to_string(), day_end.to_string());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let row: Option<(SendStatus, String, String)> = tx
                .query_row(
                    "SELECT status, campaign_id, tenant_id FROM email_sends WHERE id = ?1",
                    params![id],
                    |row| Ok((parse_col(row, 0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let Some((SendStatus::Approved, campaign_id, tenant_id)) = row else {
                return Ok(SendClaim::NotApproved);
            };

            let scopes = [
                (ceilings.campaign, "campaign_id", campaign_id, LimitType::Campaign),
                (ceilings.tenant, "tenant_id", tenant_id, LimitType::Tenant),
            ];
            for (ceiling, column, scope_id, limit_type) in scopes {
                let Some(ceiling) = ceiling else { continue };
                let committed: u32 = tx.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM email_sends
                         WHERE {column} = ?1
                           AND ((status = 'sent' AND sent_at >= ?2 AND sent_at < ?3)
                                OR status = 'sending')"
                    ),
                    params![scope_id, day_start, day_end],
                    |row| row.get(0),
                )?;
                if committed >= ceiling {
                    return Ok(SendClaim::Limited(limit_type));
                }
            }

            tx.execute(
                "UPDATE email_sends SET status = 'sending', claimed_until = ?1, updated_at = ?2
                 WHERE id = ?3 AND status = 'approved'",
                params![lease_until, now, id],
            )?;
            tx.commit()?;
            Ok(SendClaim::Claimed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Give a claimed send back after a failed transport call: `sending ->
/// approved`, remembering the error. Returns `false` if the claim was gone.
pub async fn release_claim(
    db: &Database,
    id: &str,
    error: &str,
    now: &str,
) -> Result<bool, CadenceError> {
    let (id, error, now) = (id.to_string(), error.to_string(), now.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE email_sends
                 SET status = 'approved', claimed_until = NULL, last_error = ?1, updated_at = ?2
                 WHERE id = ?3 AND status = 'sending'",
                params![error, now, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Return `sending` claims whose lease passed to `approved`. The provider
/// de-duplicates a re-dispatch on the send id if the lost call had landed.
pub async fn recover_expired_claims(db: &Database, now: &str) -> Result<usize, CadenceError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE email_sends
                 SET status = 'approved', claimed_until = NULL,
                     last_error = COALESCE(last_error, 'send claim expired'), updated_at = ?1
                 WHERE status = 'sending' AND claimed_until IS NOT NULL AND claimed_until <= ?1",
                params![now],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a confirmed transport send in one transaction.
///
/// Marks the send `sent` (only while its `sending` claim is held), stores the
/// message id, then advances the lead to this step (only if it was on the
/// previous step) and schedules its next send at `next_at`. A replay finds
/// the send already `sent` and writes nothing.
pub async fn record_sent(
    db: &Database,
    id: &str,
    message_id: &str,
    next_at: Option<&str>,
    now: &str,
) -> Result<SentRecord, CadenceError> {
    let (id, message_id, now) = (id.to_string(), message_id.to_string(), now.to_string());
    let next_at = next_at.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let applied = tx.execute(
                "UPDATE email_sends
                 SET status = 'sent', message_id = ?1, sent_at = ?2, updated_at = ?2,
                     last_error = NULL, claimed_until = NULL
                 WHERE id = ?3 AND status = 'sending'",
                params![message_id, now, id],
            )? == 1;
            if !applied {
                return Ok(SentRecord {
                    applied: false,
                    lead_advanced: false,
                    lead_status: None,
                });
            }

            let (lead_id, step): (String, u32) = tx.query_row(
                "SELECT campaign_lead_id, step_number FROM email_sends WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let (status, current_step): (LeadStatus, u32) = tx.query_row(
                "SELECT status, current_step FROM campaign_leads WHERE id = ?1",
                params![lead_id],
                |row| Ok((parse_col(row, 0)?, row.get(1)?)),
            )?;

            // A lead that replied while the send was in flight keeps its status.
            let next_status = status.transition(LeadEvent::Sent).unwrap_or(status);
            let schedule = if next_status == LeadStatus::InSequence {
                next_at
            } else {
                None
            };

            let lead_advanced = current_step + 1 == step
                && tx.execute(
                    "UPDATE campaign_leads
                     SET current_step = ?1, status = ?2, last_sent_at = ?3,
                         next_email_scheduled_at = ?4, updated_at = ?3
                     WHERE id = ?5 AND current_step = ?6 AND status = ?7",
                    params![
                        step,
                        next_status.to_string(),
                        now,
                        schedule,
                        lead_id,
                        current_step,
                        status.to_string()
                    ],
                )? == 1;

            tx.commit()?;
            Ok(SentRecord {
                applied: true,
                lead_advanced,
                lead_status: Some(next_status),
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Approved, unsent sends of active campaigns, oldest approval first.
pub async fn list_dispatchable(db: &Database, limit: u32) -> Result<Vec<EmailSend>, CadenceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM email_sends s
                 JOIN campaigns c ON c.id = s.campaign_id
                 WHERE s.status = 'approved' AND c.status = 'active'
                 ORDER BY s.approved_at ASC
                 LIMIT ?1",
                aliased(SEND_COLUMNS, "s")
            ))?;
            let rows = stmt.query_map(params![limit], send_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Sends of one campaign in one status, newest first.
pub async fn list_by_status(
    db: &Database,
    campaign_id: &str,
    status: SendStatus,
) -> Result<Vec<EmailSend>, CadenceError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SEND_COLUMNS} FROM email_sends
                 WHERE campaign_id = ?1 AND status = ?2
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![campaign_id, status.to_string()], send_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every send ever created for one enrollment, in step order.
pub async fn list_for_campaign_lead(
    db: &Database,
    campaign_lead_id: &str,
) -> Result<Vec<EmailSend>, CadenceError> {
    let campaign_lead_id = campaign_lead_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SEND_COLUMNS} FROM email_sends
                 WHERE campaign_lead_id = ?1
                 ORDER BY step_number ASC, created_at ASC"
            ))?;
            let rows = stmt.query_map(params![campaign_lead_id], send_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of `sent` rows in `[start, end)` for a campaign or tenant.
pub async fn count_sent(
    db: &Database,
    scope: SendScope<'_>,
    start: &str,
    end: &str,
) -> Result<u32, CadenceError> {
    let (sql, scope_id) = match scope {
        SendScope::Campaign(id) => (
            "SELECT COUNT(*) FROM email_sends
             WHERE campaign_id = ?1 AND status = 'sent' AND sent_at >= ?2 AND sent_at < ?3",
            id.to_string(),
        ),
        SendScope::Tenant(id) => (
            "SELECT COUNT(*) FROM email_sends
             WHERE tenant_id = ?1 AND status = 'sent' AND sent_at >= ?2 AND sent_at < ?3",
            id.to_string(),
        ),
    };
    let (start, end) = (start.to_string(), end.to_string());
    db.connection()
        .call(move |conn| conn.query_row(sql, params![scope_id, start, end], |row| row.get(0)))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Per-status send counts for one campaign.
pub async fn status_counts(
    db: &Database,
    campaign_id: &str,
) -> Result<Vec<(SendStatus, u64)>, CadenceError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM email_sends
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
