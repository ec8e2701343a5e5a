// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage fixtures. Every helper panics on failure; they are for tests only.

use cadence_core::CampaignSettings;
use cadence_core::time::format_ts;
use cadence_core::types::{
    Campaign, CampaignLead, CampaignStatus, EmailSend, Lead, LeadStatus, SendStatus, Tenant,
};
use cadence_storage::Database;
use cadence_storage::queries::{campaigns, enrollments, leads, sends, tenants};
use chrono::Utc;
use rusqlite::params;

pub fn now() -> String {
    format_ts(Utc::now())
}

pub async fn tenant(db: &Database, id: &str, daily_send_limit: Option<u32>) -> Tenant {
    let tenant = Tenant {
        id: id.to_string(),
        name: format!("Tenant {id}"),
        daily_send_limit,
        created_at: now(),
    };
    tenants::create_tenant(db, &tenant).await.unwrap();
    tenant
}

pub async fn lead(db: &Database, tenant_id: &str, id: &str, email: &str) -> Lead {
    let lead = Lead {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        email: email.to_string(),
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
        company: Some("Acme".into()),
        title: Some("CTO".into()),
        timezone: None,
        segment: None,
        created_at: now(),
    };
    leads::create_lead(db, &lead).await.unwrap();
    lead
}

/// An unsaved campaign with permissive settings: every weekday, all day, UTC.
pub fn new_campaign(tenant_id: &str, id: &str, status: CampaignStatus, total_steps: u32) -> Campaign {
    let ts = now();
    let mut settings = CampaignSettings::default();
    settings.send_window.start_time = "00:00".into();
    settings.send_window.end_time = "23:59".into();
    settings.send_window.weekdays = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"]
        .iter()
        .map(|d| d.to_string())
        .collect();
    Campaign {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        name: format!("Campaign {id}"),
        status,
        total_steps,
        auto_send_approved: true,
        daily_send_limit: None,
        settings,
        starts_at: None,
        created_at: ts.clone(),
        updated_at: ts,
    }
}

pub async fn save_campaign(db: &Database, campaign: &Campaign) {
    campaigns::create_campaign(db, campaign).await.unwrap();
}

pub async fn campaign(
    db: &Database,
    tenant_id: &str,
    id: &str,
    status: CampaignStatus,
    total_steps: u32,
) -> Campaign {
    let campaign = new_campaign(tenant_id, id, status, total_steps);
    save_campaign(db, &campaign).await;
    campaign
}

pub async fn enroll(db: &Database, campaign_id: &str, lead_id: &str) -> CampaignLead {
    let id = format!("cl-{campaign_id}-{lead_id}");
    enrollments::enroll(db, &id, campaign_id, lead_id, &now())
        .await
        .unwrap()
        .0
}

/// Overwrite an enrollment's progress directly.
pub async fn force_lead_state(
    db: &Database,
    campaign_lead_id: &str,
    status: LeadStatus,
    current_step: u32,
    next_email_scheduled_at: Option<&str>,
) -> CampaignLead {
    let (id, next) = (
        campaign_lead_id.to_string(),
        next_email_scheduled_at.map(str::to_string),
    );
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE campaign_leads
                 SET status = ?1, current_step = ?2, next_email_scheduled_at = ?3
                 WHERE id = ?4",
                params![status.to_string(), current_step, next, id],
            )
        })
        .await
        .map_err(cadence_storage::database::map_tr_err)
        .unwrap();
    enrollments::get_campaign_lead(db, campaign_lead_id)
        .await
        .unwrap()
        .unwrap()
}

/// An unsaved send for the enrollment's next step.
pub fn new_send(campaign: &Campaign, lead: &Lead, cl: &CampaignLead, status: SendStatus) -> EmailSend {
    let ts = now();
    let step = cl.current_step + 1;
    EmailSend {
        id: format!("send-{}-{step}", cl.id),
        campaign_lead_id: cl.id.clone(),
        campaign_id: campaign.id.clone(),
        tenant_id: campaign.tenant_id.clone(),
        recipient: lead.email.clone(),
        subject: format!("Step {step}"),
        body_html: format!("<p>Step {step}</p>"),
        body_text: format!("Step {step}"),
        step_number: step,
        status,
        message_id: None,
        variant_id: None,
        template_id: None,
        last_error: None,
        created_at: ts.clone(),
        approved_at: (status == SendStatus::Approved).then(|| ts.clone()),
        sent_at: None,
        updated_at: ts,
    }
}

/// Store an approved send for the enrollment's next step; the lead moves to
/// `in_sequence`.
pub async fn approved_send(db: &Database, campaign: &Campaign, lead: &Lead, cl: &CampaignLead) -> EmailSend {
    let send = new_send(campaign, lead, cl, SendStatus::Approved);
    match sends::insert_draft(db, &send, cl.status, LeadStatus::InSequence)
        .await
        .unwrap()
    {
        sends::DraftInsert::Created(send) => send,
        other => panic!("expected a new send, got {other:?}"),
    }
}
