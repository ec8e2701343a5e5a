// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suppression checker.
//!
//! An address is suppressed when an unexpired entry matches the exact address
//! or its domain, either for the tenant or globally. The list is append-only.

use cadence_core::CadenceError;
use cadence_core::time::format_ts;
use cadence_core::types::{SuppressionKind, SuppressionReason};
use cadence_storage::Database;
use cadence_storage::queries::suppressions;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Result of a suppression lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionCheck {
    pub suppressed: bool,
    pub reason: Option<SuppressionReason>,
}

impl SuppressionCheck {
    fn clear() -> Self {
        Self {
            suppressed: false,
            reason: None,
        }
    }
}

/// Lowercased domain part of an address, if it has one.
pub fn domain_of(address: &str) -> Option<String> {
    let (local, domain) = address.trim().rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}

/// Read-side of the suppression list plus the append entry point.
#[derive(Clone)]
pub struct SuppressionChecker {
    db: Database,
}

impl SuppressionChecker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether `address` may not receive mail from `tenant_id` at `now`.
    pub async fn check(
        &self,
        tenant_id: &str,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<SuppressionCheck, CadenceError> {
        let address = address.trim().to_ascii_lowercase();
        let domain = domain_of(&address);
        let hit = suppressions::find_active(
            &self.db,
            tenant_id,
            &address,
            domain.as_deref(),
            &format_ts(now),
        )
        .await?;

        Ok(match hit {
            Some(entry) => {
                debug!(
                    tenant_id,
                    address = %address,
                    entry_id = entry.id,
                    kind = %entry.kind,
                    reason = %entry.reason,
                    "recipient suppressed"
                );
                SuppressionCheck {
                    suppressed: true,
                    reason: Some(entry.reason),
                }
            }
            None => SuppressionCheck::clear(),
        })
    }

    /// Append a suppression entry. A value containing `@` is an address,
    /// anything else a domain. `tenant_id = None` suppresses globally.
    pub async fn suppress(
        &self,
        tenant_id: Option<&str>,
        value: &str,
        reason: SuppressionReason,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<i64, CadenceError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(CadenceError::Internal(
                "suppression value must not be empty".into(),
            ));
        }
        let kind = if value.contains('@') {
            SuppressionKind::Address
        } else {
            SuppressionKind::Domain
        };
        let expires_at = expires_at.map(format_ts);
        let id = suppressions::add(
            &self.db,
            tenant_id,
            value,
            kind,
            reason,
            expires_at.as_deref(),
            &format_ts(now),
        )
        .await?;
        info!(
            entry_id = id,
            tenant_id = tenant_id.unwrap_or("*"),
            %kind,
            %reason,
            "suppression entry added"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use cadence_storage::Database;
    use chrono::Duration;

    use super::*;

    async fn checker() -> SuppressionChecker {
        let db = Database::open_in_memory().await.unwrap();
        cadence_test_utils::fixtures::tenant(&db, "t-1", None).await;
        cadence_test_utils::fixtures::tenant(&db, "t-2", None).await;
        SuppressionChecker::new(db)
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("Ada@Acme.TEST").as_deref(), Some("acme.test"));
        assert_eq!(domain_of("no-at-sign"), None);
        assert_eq!(domain_of("@acme.test"), None);
    }

    #[tokio::test]
    async fn exact_address_is_case_insensitive() {
        let checker = checker().await;
        let now = Utc::now();
        checker
            .suppress(Some("t-1"), "ada@acme.test", SuppressionReason::Unsubscribed, None, now)
            .await
            .unwrap();

        let check = checker.check("t-1", "ADA@acme.test", now).await.unwrap();
        assert!(check.suppressed);
        assert_eq!(check.reason, Some(SuppressionReason::Unsubscribed));
        assert!(!checker.check("t-1", "bob@acme.test", now).await.unwrap().suppressed);
    }

    #[tokio::test]
    async fn domain_entries_cover_every_address() {
        let checker = checker().await;
        let now = Utc::now();
        checker
            .suppress(Some("t-1"), "competitor.test", SuppressionReason::ManuallyBlocked, None, now)
            .await
            .unwrap();
        let check = checker.check("t-1", "anyone@competitor.test", now).await.unwrap();
        assert_eq!(check.reason, Some(SuppressionReason::ManuallyBlocked));
    }

    #[tokio::test]
    async fn tenant_entries_do_not_leak_but_global_ones_apply() {
        let checker = checker().await;
        let now = Utc::now();
        checker
            .suppress(Some("t-1"), "ada@acme.test", SuppressionReason::Unsubscribed, None, now)
            .await
            .unwrap();
        assert!(!checker.check("t-2", "ada@acme.test", now).await.unwrap().suppressed);

        checker
            .suppress(None, "bounce@acme.test", SuppressionReason::Bounced, None, now)
            .await
            .unwrap();
        assert!(checker.check("t-2", "bounce@acme.test", now).await.unwrap().suppressed);
    }

    #[tokio::test]
    async fn expired_entries_stop_matching() {
        let checker = checker().await;
        let now = Utc::now();
        checker
            .suppress(
                Some("t-1"),
                "ada@acme.test",
                SuppressionReason::Complained,
                Some(now + Duration::hours(1)),
                now,
            )
            .await
            .unwrap();
        assert!(checker.check("t-1", "ada@acme.test", now).await.unwrap().suppressed);
        let later = now + Duration::hours(2);
        assert!(!checker.check("t-1", "ada@acme.test", later).await.unwrap().suppressed);
    }

    #[tokio::test]
    async fn empty_value_is_rejected() {
        let checker = checker().await;
        let err = checker
            .suppress(None, "  ", SuppressionReason::Bounced, None, Utc::now())
            .await;
        assert!(err.is_err());
    }
}
