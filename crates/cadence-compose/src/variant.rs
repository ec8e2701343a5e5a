// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A/B variant assignment.
//!
//! The choice is a weighted hash of (campaign id, enrollment id), so every
//! caller computes the same variant for the same enrollment. It is persisted
//! on first composition with insert-if-absent and never re-randomized, even
//! if weights or the active set change later.

use cadence_core::CadenceError;
use cadence_core::time::format_ts;
use cadence_core::types::Variant;
use cadence_storage::Database;
use cadence_storage::queries::variants;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

fn bucket(campaign_id: &str, campaign_lead_id: &str) -> u64 {
    let digest = Sha256::new()
        .chain_update(campaign_id.as_bytes())
        .chain_update(b":")
        .chain_update(campaign_lead_id.as_bytes())
        .finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Deterministic weighted choice among `variants` (expected in a stable
/// order). Zero-weight variants are never chosen unless all weights are zero,
/// in which case every variant weighs the same.
pub fn choose_variant<'a>(
    variants: &'a [Variant],
    campaign_id: &str,
    campaign_lead_id: &str,
) -> Option<&'a Variant> {
    if variants.is_empty() {
        return None;
    }
    let total: u64 = variants.iter().map(|v| u64::from(v.weight)).sum();
    let point = bucket(campaign_id, campaign_lead_id);
    if total == 0 {
        let index = (point % variants.len() as u64) as usize;
        return variants.get(index);
    }

    let mut point = point % total;
    for variant in variants {
        let weight = u64::from(variant.weight);
        if point < weight {
            return Some(variant);
        }
        point -= weight;
    }
    variants.last()
}

/// Assigns and remembers one variant per enrollment.
#[derive(Clone)]
pub struct VariantAssignor {
    db: Database,
}

impl VariantAssignor {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The enrollment's variant, assigning one on first use. `None` when the
    /// campaign has no active variants and nothing was assigned before.
    pub async fn assign(
        &self,
        campaign_lead_id: &str,
        campaign_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Variant>, CadenceError> {
        if let Some(existing) = variants::get_assignment(&self.db, campaign_lead_id).await? {
            debug!(campaign_lead_id, variant = %existing.key, "variant already assigned");
            return Ok(Some(existing));
        }

        let active = variants::list_active(&self.db, campaign_id).await?;
        let Some(choice) = choose_variant(&active, campaign_id, campaign_lead_id) else {
            return Ok(None);
        };

        let stored =
            variants::assign_if_absent(&self.db, campaign_lead_id, &choice.id, &format_ts(now))
                .await?;
        info!(campaign_lead_id, variant = %stored.key, "variant assigned");
        Ok(Some(stored))
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::types::CampaignStatus;
    use cadence_test_utils::fixtures;
    use proptest::prelude::*;

    use super::*;

    fn variant(id: &str, key: &str, weight: u32) -> Variant {
        Variant {
            id: id.into(),
            campaign_id: "c-1".into(),
            key: key.into(),
            subject_template: format!("Subject {key}"),
            body_template: format!("Body {key}"),
            weight,
            active: true,
            created_at: "2026-03-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn weights_shape_the_split() {
        let variants = vec![variant("v-a", "a", 3), variant("v-b", "b", 1)];
        let picks_a = (0..4000)
            .filter(|i| {
                choose_variant(&variants, "c-1", &format!("cl-{i}")).map(|v| v.key.as_str()) == Some("a")
            })
            .count();
        // Expect ~3000; the hash is uniform enough for a wide margin.
        assert!((2700..3300).contains(&picks_a), "picked a {picks_a} times");
    }

    #[test]
    fn zero_weight_is_never_chosen() {
        let variants = vec![variant("v-a", "a", 0), variant("v-b", "b", 5)];
        for i in 0..200 {
            let pick = choose_variant(&variants, "c-1", &format!("cl-{i}")).unwrap();
            assert_eq!(pick.key, "b");
        }
    }

    #[test]
    fn empty_pool_has_no_choice() {
        assert!(choose_variant(&[], "c-1", "cl-1").is_none());
    }

    proptest! {
        #[test]
        fn choice_is_deterministic(id in "[a-z0-9-]{1,24}", wa in 0u32..10, wb in 0u32..10) {
            let variants = vec![variant("v-a", "a", wa), variant("v-b", "b", wb)];
            let first = choose_variant(&variants, "c-1", &id).map(|v| v.id.clone());
            let second = choose_variant(&variants, "c-1", &id).map(|v| v.id.clone());
            prop_assert!(first.is_some());
            prop_assert_eq!(first, second);
        }
    }

    #[tokio::test]
    async fn assignment_is_stable_across_calls_and_pool_changes() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", None).await;
        fixtures::campaign(&db, "t-1", "c-1", CampaignStatus::Active, 3).await;
        fixtures::lead(&db, "t-1", "l-1", "ada@acme.test").await;
        let cl = fixtures::enroll(&db, "c-1", "l-1").await;
        variants::create_variant(&db, &variant("v-a", "a", 1)).await.unwrap();
        variants::create_variant(&db, &variant("v-b", "b", 1)).await.unwrap();

        let assignor = VariantAssignor::new(db.clone());
        let first = assignor.assign(&cl.id, "c-1", Utc::now()).await.unwrap().unwrap();

        // Deactivating the assigned arm does not move the enrollment.
        variants::set_active(&db, &first.id, false).await.unwrap();
        for _ in 0..5 {
            let again = assignor.assign(&cl.id, "c-1", Utc::now()).await.unwrap().unwrap();
            assert_eq!(again.id, first.id);
        }
    }

    #[tokio::test]
    async fn concurrent_assignments_agree() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", None).await;
        fixtures::campaign(&db, "t-1", "c-1", CampaignStatus::Active, 3).await;
        fixtures::lead(&db, "t-1", "l-1", "ada@acme.test").await;
        let cl = fixtures::enroll(&db, "c-1", "l-1").await;
        for (id, key) in [("v-a", "a"), ("v-b", "b"), ("v-c", "c")] {
            variants::create_variant(&db, &variant(id, key, 1)).await.unwrap();
        }

        let assignor = VariantAssignor::new(db.clone());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let assignor = assignor.clone();
                let id = cl.id.clone();
                tokio::spawn(async move { assignor.assign(&id, "c-1", Utc::now()).await })
            })
            .collect();
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn no_active_variants_means_none() {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", None).await;
        fixtures::campaign(&db, "t-1", "c-1", CampaignStatus::Active, 3).await;
        fixtures::lead(&db, "t-1", "l-1", "ada@acme.test").await;
        let cl = fixtures::enroll(&db, "c-1", "l-1").await;
        let assignor = VariantAssignor::new(db);
        assert!(assignor.assign(&cl.id, "c-1", Utc::now()).await.unwrap().is_none());
    }
}
