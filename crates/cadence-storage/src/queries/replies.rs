// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound replies and their classifications.

use cadence_core::CadenceError;
use cadence_core::types::Classification;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{REPLY_COLUMNS, Reply, reply_from_row};

/// Store an inbound reply (unclassified). Re-delivery of the same id is ignored.
pub async fn insert_reply(db: &Database, reply: &Reply) -> Result<bool, CadenceError> {
    let reply = reply.clone();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO replies
                     (id, campaign_lead_id, sender, subject, body, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    reply.id,
                    reply.campaign_lead_id,
                    reply.sender,
                    reply.subject,
                    reply.body,
                    reply.received_at,
                ],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a reply by ID.
pub async fn get_reply(db: &Database, id: &str) -> Result<Option<Reply>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {REPLY_COLUMNS} FROM replies WHERE id = ?1"),
                params![id],
                reply_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Attach the enrollment a reply was matched to.
pub async fn link_campaign_lead(
    db: &Database,
    id: &str,
    campaign_lead_id: &str,
) -> Result<(), CadenceError> {
    let (id, campaign_lead_id) = (id.to_string(), campaign_lead_id.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE replies SET campaign_lead_id = ?1
                 WHERE id = ?2 AND campaign_lead_id IS NULL",
                params![campaign_lead_id, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Store the classification. Only the first classification of a reply sticks.
pub async fn record_classification(
    db: &Database,
    id: &str,
    classification: &Classification,
    suggested_response: Option<&str>,
    now: &str,
) -> Result<bool, CadenceError> {
    let (id, now) = (id.to_string(), now.to_string());
    let classification = classification.clone();
    let suggested_response = suggested_response.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE replies
                 SET sentiment = ?1, intent_score = ?2, confidence = ?3,
                     suggested_response = ?4, classified_at = ?5
                 WHERE id = ?6 AND classified_at IS NULL",
                params![
                    classification.sentiment.to_string(),
                    classification.intent_score,
                    f64::from(classification.confidence),
                    suggested_response,
                    now,
                    id
                ],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Unclassified replies, oldest first.
pub async fn list_unclassified(db: &Database, limit: u32) -> Result<Vec<Reply>, CadenceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REPLY_COLUMNS} FROM replies
                 WHERE classified_at IS NULL
                 ORDER BY received_at ASC
                 LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], reply_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
