// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.

pub mod campaigns;
pub mod enrollments;
pub mod jobs;
pub mod leads;
pub mod locks;
pub mod queue;
pub mod replies;
pub mod sends;
pub mod stats;
pub mod suppressions;
pub mod templates;
pub mod tenants;
pub mod variants;

/// Prefix every column of a column list with a table alias.
pub(crate) fn aliased(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod fixtures {
    use cadence_core::time::format_ts;
    use cadence_core::types::{Campaign, CampaignStatus, Lead, Tenant};
    use cadence_core::CampaignSettings;
    use chrono::Utc;

    use crate::database::Database;

    pub async fn db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    pub fn now() -> String {
        format_ts(Utc::now())
    }

    pub async fn tenant(db: &Database, id: &str, limit: Option<u32>) -> Tenant {
        let tenant = Tenant {
            id: id.to_string(),
            name: format!("Tenant {id}"),
            daily_send_limit: limit,
            created_at: now(),
        };
        super::tenants::create_tenant(db, &tenant).await.unwrap();
        tenant
    }

    pub async fn lead(db: &Database, tenant_id: &str, id: &str, email: &str) -> Lead {
        let lead = Lead {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            email: email.to_string(),
            first_name: Some("Ada".into()),
            last_name: None,
            company: Some("Acme".into()),
            title: None,
            timezone: None,
            segment: None,
            created_at: now(),
        };
        super::leads::create_lead(db, &lead).await.unwrap();
        lead
    }

    pub async fn campaign(
        db: &Database,
        tenant_id: &str,
        id: &str,
        status: CampaignStatus,
        total_steps: u32,
    ) -> Campaign {
        let ts = now();
        let campaign = Campaign {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: format!("Campaign {id}"),
            status,
            total_steps,
            auto_send_approved: false,
            daily_send_limit: None,
            settings: CampaignSettings::default(),
            starts_at: None,
            created_at: ts.clone(),
            updated_at: ts,
        };
        super::campaigns::create_campaign(db, &campaign).await.unwrap();
        campaign
    }
}
