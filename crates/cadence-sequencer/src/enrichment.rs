// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enrichment step: snapshot the lead's profile and match a value
//! proposition, moving the enrollment `pending -> ready`.

use async_trait::async_trait;
use cadence_core::time::format_ts;
use cadence_core::types::{Lead, LeadStatus, RetryableJob};
use cadence_core::{CadenceError, LeadEvent};
use cadence_delivery::suppression::domain_of;
use cadence_storage::Database;
use cadence_storage::queries::{campaigns, enrollments, leads};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::retry::JobHandler;

/// Payload of an `enrichment` retry job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub campaign_lead_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    Enriched { value_prop: Option<String> },
    /// The enrollment had already left `pending`.
    Skipped(LeadStatus),
}

/// Pick the value proposition sharing the most words with the lead's
/// title, segment and company. Ties go to the earlier entry; with no overlap
/// the first entry is used.
pub fn match_value_prop<'a>(value_props: &'a [String], lead: &Lead) -> Option<&'a str> {
    let keywords: Vec<String> = [&lead.title, &lead.segment, &lead.company]
        .into_iter()
        .flatten()
        .flat_map(|field| {
            field
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| w.len() >= 3)
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
        })
        .collect();

    let mut best: Option<(&str, usize)> = None;
    for prop in value_props.iter().filter(|p| !p.trim().is_empty()) {
        let text = prop.to_lowercase();
        let score = keywords.iter().filter(|k| text.contains(k.as_str())).count();
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((prop.as_str(), score));
        }
    }
    best.map(|(prop, _)| prop)
}

#[derive(Clone)]
pub struct Enricher {
    db: Database,
}

impl Enricher {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn enrich(
        &self,
        campaign_lead_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EnrichOutcome, CadenceError> {
        let cl = enrollments::get_campaign_lead(&self.db, campaign_lead_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("campaign_lead", campaign_lead_id))?;
        if cl.status != LeadStatus::Pending {
            debug!(campaign_lead_id, status = %cl.status, "enrichment skipped");
            return Ok(EnrichOutcome::Skipped(cl.status));
        }
        let lead = leads::get_lead(&self.db, &cl.lead_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("lead", &cl.lead_id))?;
        let campaign = campaigns::get_campaign(&self.db, &cl.campaign_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("campaign", &cl.campaign_id))?;

        let to = cl.status.apply(LeadEvent::Enriched)?;
        let value_prop = match_value_prop(&campaign.settings.value_props, &lead).map(str::to_string);
        let profile = serde_json::json!({
            "email_domain": domain_of(&lead.email),
            "company": lead.company,
            "title": lead.title,
            "segment": lead.segment,
            "timezone": lead.timezone,
        })
        .to_string();

        let applied = enrollments::record_enrichment(
            &self.db,
            campaign_lead_id,
            cl.status,
            to,
            Some(&profile),
            value_prop.as_deref(),
            &format_ts(now),
        )
        .await?;
        if !applied {
            let current = enrollments::get_campaign_lead(&self.db, campaign_lead_id)
                .await?
                .map(|c| c.status)
                .unwrap_or(cl.status);
            return Ok(EnrichOutcome::Skipped(current));
        }

        info!(
            campaign_lead_id,
            value_prop = value_prop.as_deref().unwrap_or("-"),
            "lead enriched"
        );
        Ok(EnrichOutcome::Enriched { value_prop })
    }
}

/// Re-runs enrichment jobs.
pub struct EnrichmentJobHandler {
    enricher: Enricher,
}

impl EnrichmentJobHandler {
    pub fn new(enricher: Enricher) -> Self {
        Self { enricher }
    }
}

#[async_trait]
impl JobHandler for EnrichmentJobHandler {
    async fn handle(&self, job: &RetryableJob, now: DateTime<Utc>) -> Result<(), CadenceError> {
        let request: EnrichmentRequest = serde_json::from_str(&job.payload)
            .map_err(|e| CadenceError::Internal(format!("enrichment job {}: {e}", job.id)))?;
        self.enricher.enrich(&request.campaign_lead_id, now).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::types::CampaignStatus;
    use cadence_test_utils::fixtures;

    use super::*;

    fn lead(title: Option<&str>, segment: Option<&str>) -> Lead {
        Lead {
            id: "l-1".into(),
            tenant_id: "t-1".into(),
            email: "ada@acme.test".into(),
            first_name: Some("Ada".into()),
            last_name: None,
            company: Some("Acme".into()),
            title: title.map(str::to_string),
            timezone: None,
            segment: segment.map(str::to_string),
            created_at: "2026-03-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn value_prop_follows_title_overlap() {
        let props = vec![
            "cut cloud spend for finance teams".to_string(),
            "ship faster with fewer engineering incidents".to_string(),
        ];
        let pick = match_value_prop(&props, &lead(Some("VP Engineering"), None));
        assert_eq!(pick, Some("ship faster with fewer engineering incidents"));
        let pick = match_value_prop(&props, &lead(Some("CFO"), Some("finance")));
        assert_eq!(pick, Some("cut cloud spend for finance teams"));
        let pick = match_value_prop(&props, &lead(None, None));
        assert_eq!(pick, Some("cut cloud spend for finance teams"));
        assert_eq!(match_value_prop(&[], &lead(None, None)), None);
    }

    #[tokio::test]
    async fn enrichment_moves_pending_to_ready_once() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", None).await;
        let mut campaign = fixtures::new_campaign("t-1", "c-1", CampaignStatus::Active, 3);
        campaign.settings.value_props = vec!["faster onboarding".into()];
        fixtures::save_campaign(&db, &campaign).await;
        fixtures::lead(&db, "t-1", "l-1", "ada@acme.test").await;
        let cl = fixtures::enroll(&db, "c-1", "l-1").await;

        let enricher = Enricher::new(db.clone());
        let outcome = enricher.enrich(&cl.id, Utc::now()).await.unwrap();
        assert_eq!(
            outcome,
            EnrichOutcome::Enriched {
                value_prop: Some("faster onboarding".into())
            }
        );
        let stored = enrollments::get_campaign_lead(&db, &cl.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeadStatus::Ready);
        assert!(stored.enrichment.unwrap().contains("acme.test"));

        let again = enricher.enrich(&cl.id, Utc::now()).await.unwrap();
        assert_eq!(again, EnrichOutcome::Skipped(LeadStatus::Ready));
    }
}
