// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compose step: draft the next email of one enrollment, store it, and
//! route it through the approval gate.
//!
//! The request is re-checked against current state before anything is
//! written, so stale or duplicate queue entries are harmless: the draft
//! insert is conditional on the lead still being on the previous step.

use std::sync::Arc;

use cadence_bus::{BusEvent, EventBus};
use cadence_compose::{Composer, VariantAssignor};
use cadence_core::time::format_ts;
use cadence_core::types::{
    CampaignStatus, ComposeContext, EmailSend, LeadStatus, SendStatus,
};
use cadence_core::{CadenceError, ContentProvider, LeadEvent};
use cadence_delivery::{ApprovalGate, GateDecision, requires_approval};
use cadence_storage::Database;
use cadence_storage::queries::sends::DraftInsert;
use cadence_storage::queries::{campaigns, enrollments, leads, queue, sends, templates};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Work queue consumed by the compose worker.
pub const COMPOSE_QUEUE: &str = "compose";

/// Payload of a [`COMPOSE_QUEUE`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub campaign_lead_id: String,
    pub step: u32,
    /// Auto-send flag when the request was queued. Informational; the gate
    /// reads the campaign's current flag.
    pub auto_send: bool,
}

/// Put a compose request on [`COMPOSE_QUEUE`].
pub async fn enqueue_compose(db: &Database, request: &ComposeRequest) -> Result<i64, CadenceError> {
    let payload = serde_json::to_string(request)
        .map_err(|e| CadenceError::Internal(format!("compose payload: {e}")))?;
    queue::enqueue(db, COMPOSE_QUEUE, &payload).await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeOutcome {
    Queued { send_id: String, decision: GateDecision },
    /// A live or sent email already exists for this step.
    Existing { send_id: String, status: SendStatus },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    CampaignNotActive(CampaignStatus),
    LeadNotSequencing(LeadStatus),
    /// The lead is not on the step before the requested one.
    StaleStep { current_step: u32 },
    PastLastStep,
}

#[derive(Clone)]
pub struct StepComposer {
    db: Database,
    variants: VariantAssignor,
    composer: Arc<Composer>,
    gate: ApprovalGate,
    bus: EventBus,
}

impl StepComposer {
    pub fn new(
        db: Database,
        content: Arc<dyn ContentProvider>,
        gate: ApprovalGate,
        bus: EventBus,
    ) -> Self {
        Self {
            variants: VariantAssignor::new(db.clone()),
            composer: Arc::new(Composer::new(content)),
            db,
            gate,
            bus,
        }
    }

    pub async fn compose_step(
        &self,
        request: &ComposeRequest,
        now: DateTime<Utc>,
    ) -> Result<ComposeOutcome, CadenceError> {
        let cl_id = request.campaign_lead_id.as_str();
        let cl = enrollments::get_campaign_lead(&self.db, cl_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("campaign_lead", cl_id))?;
        let campaign = campaigns::get_campaign(&self.db, &cl.campaign_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("campaign", &cl.campaign_id))?;

        let skip = if campaign.status != CampaignStatus::Active {
            Some(SkipReason::CampaignNotActive(campaign.status))
        } else if !cl.status.in_progress() {
            Some(SkipReason::LeadNotSequencing(cl.status))
        } else if request.step > campaign.total_steps {
            Some(SkipReason::PastLastStep)
        } else if cl.current_step + 1 != request.step {
            Some(SkipReason::StaleStep {
                current_step: cl.current_step,
            })
        } else {
            None
        };
        if let Some(reason) = skip {
            debug!(campaign_lead_id = cl_id, step = request.step, ?reason, "compose skipped");
            return Ok(ComposeOutcome::Skipped(reason));
        }

        let needs_approval = requires_approval(request.step, campaign.auto_send_approved);
        let Some(lead_to) = cl.status.transition(LeadEvent::DraftQueued {
            requires_approval: needs_approval,
        }) else {
            return Ok(ComposeOutcome::Skipped(SkipReason::LeadNotSequencing(cl.status)));
        };

        let lead = leads::get_lead(&self.db, &cl.lead_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("lead", &cl.lead_id))?;
        let variant = self.variants.assign(&cl.id, &campaign.id, now).await?;
        let pool = templates::list_for_campaign(&self.db, &campaign.id).await?;
        let ctx = ComposeContext {
            campaign_name: campaign.name.clone(),
            step_number: request.step,
            total_steps: campaign.total_steps,
            value_prop: cl.matched_value_prop.clone(),
            enrichment: cl.enrichment.clone(),
            lead,
        };
        let draft = self.composer.compose(&ctx, variant.as_ref(), &pool).await?;

        let ts = format_ts(now);
        let send = EmailSend {
            id: uuid::Uuid::new_v4().to_string(),
            campaign_lead_id: cl.id.clone(),
            campaign_id: campaign.id.clone(),
            tenant_id: campaign.tenant_id.clone(),
            recipient: ctx.lead.email.clone(),
            subject: draft.subject,
            body_html: draft.body_html,
            body_text: draft.body_text,
            step_number: request.step,
            status: SendStatus::PendingApproval,
            message_id: None,
            variant_id: draft.variant_id,
            template_id: draft.template_id,
            last_error: None,
            created_at: ts.clone(),
            approved_at: None,
            sent_at: None,
            updated_at: ts,
        };

        let send = match sends::insert_draft(&self.db, &send, cl.status, lead_to).await? {
            DraftInsert::Created(send) => send,
            DraftInsert::Existing(existing) => {
                debug!(campaign_lead_id = cl_id, step = request.step, send_id = %existing.id, "draft already exists");
                return Ok(ComposeOutcome::Existing {
                    send_id: existing.id,
                    status: existing.status,
                });
            }
            DraftInsert::LeadMoved => {
                debug!(campaign_lead_id = cl_id, step = request.step, "lead moved while composing");
                return Ok(ComposeOutcome::Skipped(SkipReason::StaleStep {
                    current_step: cl.current_step,
                }));
            }
        };

        info!(
            campaign_lead_id = cl_id,
            send_id = %send.id,
            step = send.step_number,
            variant = send.variant_id.as_deref().unwrap_or("-"),
            template = send.template_id.as_deref().unwrap_or("-"),
            "email composed"
        );
        self.bus.publish(BusEvent::EmailComposed {
            send_id: send.id.clone(),
            campaign_lead_id: cl.id.clone(),
            step: send.step_number,
        });
        let decision = self.gate.route(&send, campaign.auto_send_approved, now).await?;
        Ok(ComposeOutcome::Queued {
            send_id: send.id,
            decision,
        })
    }
}
