// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily send ceilings per campaign and per tenant.
//!
//! Counts are derived from `sent` EmailSend rows inside the current UTC day.
//! The only "increment" is the conditional `sending -> sent` write, which
//! happens once per row, so a replayed send step never double-counts and
//! the daily reset needs no counter writes at all.
//!
//! [`SendLimitGate::check`] is an early read. The binding decision is
//! [`SendLimitGate::claim`], which also counts in-flight `sending` rows.

use cadence_config::model::DeliveryConfig;
use cadence_core::CadenceError;
use cadence_core::time::{format_ts, utc_day_bounds, utc_day_start};
use cadence_core::types::{Campaign, LimitType};
use cadence_storage::Database;
use cadence_storage::queries::sends::{self, DailyCeilings, SendClaim, SendScope};
use cadence_storage::queries::{stats, tenants};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

/// Outcome of a limit check. `None` remaining means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitCheck {
    pub can_send: bool,
    pub limit_type: LimitType,
    pub campaign_remaining: Option<u32>,
    pub tenant_remaining: Option<u32>,
}

/// Enforces per-campaign and per-tenant daily ceilings.
#[derive(Clone)]
pub struct SendLimitGate {
    db: Database,
    default_campaign_limit: Option<u32>,
    claim_lease: Duration,
}

impl SendLimitGate {
    pub fn new(db: Database, config: &DeliveryConfig) -> Self {
        let lease_secs = i64::try_from(config.claim_lease_secs).unwrap_or(i64::MAX / 1000);
        Self {
            db,
            default_campaign_limit: config.default_campaign_daily_limit,
            claim_lease: Duration::seconds(lease_secs),
        }
    }

    async fn ceilings(&self, campaign: &Campaign) -> Result<DailyCeilings, CadenceError> {
        let tenant = tenants::get_tenant(&self.db, &campaign.tenant_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("tenant", &campaign.tenant_id))?;
        Ok(DailyCeilings {
            campaign: campaign.daily_send_limit.or(self.default_campaign_limit),
            tenant: tenant.daily_send_limit,
        })
    }

    /// Claim `send_id` for the transport if both ceilings still have room
    /// once sent and in-flight sends are counted. Atomic against other
    /// dispatchers.
    pub async fn claim(
        &self,
        campaign: &Campaign,
        send_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SendClaim, CadenceError> {
        let ceilings = self.ceilings(campaign).await?;
        let (start, end) = utc_day_bounds(now);
        sends::claim_for_transport(
            &self.db,
            send_id,
            ceilings,
            &start,
            &end,
            &format_ts(now + self.claim_lease),
            &format_ts(now),
        )
        .await
    }

    /// Check whether one more send is allowed today for the campaign and
    /// its tenant. The campaign ceiling is checked first.
    pub async fn check(
        &self,
        campaign: &Campaign,
        now: DateTime<Utc>,
    ) -> Result<LimitCheck, CadenceError> {
        let (start, end) = utc_day_bounds(now);
        let ceilings = self.ceilings(campaign).await?;

        let campaign_remaining = match ceilings.campaign {
            Some(limit) => {
                let sent =
                    sends::count_sent(&self.db, SendScope::Campaign(&campaign.id), &start, &end)
                        .await?;
                Some(remaining(limit, sent, "campaign", &campaign.id))
            }
            None => None,
        };

        let tenant_remaining = match ceilings.tenant {
            Some(limit) => {
                let sent =
                    sends::count_sent(&self.db, SendScope::Tenant(&campaign.tenant_id), &start, &end)
                        .await?;
                Some(remaining(limit, sent, "tenant", &campaign.tenant_id))
            }
            None => None,
        };

        let limit_type = if campaign_remaining == Some(0) {
            LimitType::Campaign
        } else if tenant_remaining == Some(0) {
            LimitType::Tenant
        } else {
            LimitType::None
        };

        Ok(LimitCheck {
            can_send: limit_type == LimitType::None,
            limit_type,
            campaign_remaining,
            tenant_remaining,
        })
    }

    /// Daily rollover. Snapshots the previous UTC day's totals into
    /// `daily_send_stats`; running it twice for the same day writes nothing.
    pub async fn roll_over(&self, now: DateTime<Utc>) -> Result<usize, CadenceError> {
        let today = utc_day_start(now);
        let yesterday = today - Duration::days(1);
        let day = yesterday.format("%Y-%m-%d").to_string();

        let written = stats::snapshot_day(
            &self.db,
            &day,
            &format_ts(yesterday),
            &format_ts(today),
            &format_ts(now),
        )
        .await?;
        info!(day = %day, rows = written, "daily send counters rolled over");
        Ok(written)
    }
}

fn remaining(limit: u32, sent: u32, scope: &str, scope_id: &str) -> u32 {
    let left = limit.saturating_sub(sent);
    if left > 0 && u64::from(sent) * 5 >= u64::from(limit) * 4 {
        warn!(scope, scope_id, sent, limit, "approaching daily send limit (80%+)");
    }
    left
}

#[cfg(test)]
mod tests {
    use cadence_core::types::{CampaignStatus, LeadStatus};
    use cadence_storage::queries::{sends, stats};
    use cadence_test_utils::fixtures;
    use chrono::TimeZone;

    use super::*;

    /// Seed `count` sent emails for `campaign` at `sent_at`.
    async fn seed_sent(db: &Database, campaign: &Campaign, count: u32, sent_at: &str) {
        let tag: String = sent_at.chars().filter(char::is_ascii_digit).collect();
        for i in 0..count {
            let lead = fixtures::lead(
                db,
                &campaign.tenant_id,
                &format!("{}-{tag}-{i}", campaign.id),
                &format!("lead{tag}{i}@{}.test", campaign.id),
            )
            .await;
            let cl = fixtures::enroll(db, &campaign.id, &lead.id).await;
            let cl = fixtures::force_lead_state(db, &cl.id, LeadStatus::InSequence, 0, None).await;
            let send = fixtures::approved_send(db, campaign, &lead, &cl).await;
            let claim = sends::claim_for_transport(
                db,
                &send.id,
                DailyCeilings::default(),
                "0000-01-01T00:00:00.000Z",
                "9999-01-01T00:00:00.000Z",
                sent_at,
                sent_at,
            )
            .await
            .unwrap();
            assert_eq!(claim, SendClaim::Claimed);
            let record = sends::record_sent(db, &send.id, "<m@x>", None, sent_at).await.unwrap();
            assert!(record.applied);
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn campaign_limit_blocks_the_eleventh_send() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", None).await;
        let mut campaign = fixtures::new_campaign("t-1", "c-1", CampaignStatus::Active, 3);
        campaign.daily_send_limit = Some(10);
        fixtures::save_campaign(&db, &campaign).await;

        let gate = SendLimitGate::new(db.clone(), &DeliveryConfig::default());
        seed_sent(&db, &campaign, 9, "2026-03-02T08:00:00.000Z").await;
        let check = gate.check(&campaign, noon()).await.unwrap();
        assert!(check.can_send);
        assert_eq!(check.campaign_remaining, Some(1));
        assert_eq!(check.tenant_remaining, None);

        seed_sent(&db, &campaign, 1, "2026-03-02T09:00:00.000Z").await;
        let check = gate.check(&campaign, noon()).await.unwrap();
        assert!(!check.can_send);
        assert_eq!(check.limit_type, LimitType::Campaign);
        assert_eq!(check.campaign_remaining, Some(0));
    }

    #[tokio::test]
    async fn counts_reset_at_utc_midnight() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", None).await;
        let mut campaign = fixtures::new_campaign("t-1", "c-1", CampaignStatus::Active, 3);
        campaign.daily_send_limit = Some(2);
        fixtures::save_campaign(&db, &campaign).await;
        seed_sent(&db, &campaign, 2, "2026-03-01T23:30:00.000Z").await;

        let gate = SendLimitGate::new(db.clone(), &DeliveryConfig::default());
        let before = Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 0).unwrap();
        assert!(!gate.check(&campaign, before).await.unwrap().can_send);
        let after = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 1).unwrap();
        let check = gate.check(&campaign, after).await.unwrap();
        assert!(check.can_send);
        assert_eq!(check.campaign_remaining, Some(2));
    }

    #[tokio::test]
    async fn tenant_limit_spans_campaigns() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", Some(3)).await;
        let a = fixtures::campaign(&db, "t-1", "ca", CampaignStatus::Active, 3).await;
        let b = fixtures::campaign(&db, "t-1", "cb", CampaignStatus::Active, 3).await;
        seed_sent(&db, &a, 2, "2026-03-02T08:00:00.000Z").await;
        seed_sent(&db, &b, 1, "2026-03-02T08:00:00.000Z").await;

        let gate = SendLimitGate::new(db.clone(), &DeliveryConfig::default());
        let check = gate.check(&b, noon()).await.unwrap();
        assert_eq!(check.limit_type, LimitType::Tenant);
        assert_eq!(check.campaign_remaining, None);
        assert_eq!(check.tenant_remaining, Some(0));
    }

    #[tokio::test]
    async fn configured_default_applies_to_campaigns_without_a_limit() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", None).await;
        let campaign = fixtures::campaign(&db, "t-1", "c-1", CampaignStatus::Active, 3).await;
        seed_sent(&db, &campaign, 1, "2026-03-02T08:00:00.000Z").await;

        let config = DeliveryConfig {
            default_campaign_daily_limit: Some(1),
            ..DeliveryConfig::default()
        };
        let gate = SendLimitGate::new(db.clone(), &config);
        assert_eq!(
            gate.check(&campaign, noon()).await.unwrap().limit_type,
            LimitType::Campaign
        );
    }

    #[tokio::test]
    async fn roll_over_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", None).await;
        let campaign = fixtures::campaign(&db, "t-1", "c-1", CampaignStatus::Active, 3).await;
        seed_sent(&db, &campaign, 3, "2026-03-01T10:00:00.000Z").await;

        let gate = SendLimitGate::new(db.clone(), &DeliveryConfig::default());
        let midnight = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        assert_eq!(gate.roll_over(midnight).await.unwrap(), 2);
        assert_eq!(gate.roll_over(midnight).await.unwrap(), 0);

        let rows = stats::for_day(&db, "2026-03-01").await.unwrap();
        assert!(rows.iter().all(|r| r.sent_count == 3));
    }
}
