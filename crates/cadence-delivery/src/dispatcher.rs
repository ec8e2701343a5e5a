// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatcher: the last stop before the transport.
//!
//! For one `approved` EmailSend the checks run in a fixed order:
//!
//! 1. lead still sequencing (a reply or unsubscribe halts the sequence)
//! 2. suppression: mark `suppressed`, lead `unsubscribed`
//! 3. daily limits: mark `rate_limited`, defer the lead to the next UTC day
//! 4. send window: leave `approved` for the scheduler's approved-sends sweep
//! 5. claim `approved -> sending`, re-checking the daily limits atomically
//! 6. transport, keyed by the send id
//!
//! Only the dispatch holding the claim calls the transport, and only a
//! confirmed transport send moves the claim to `sent`. Concurrent or
//! replayed dispatches of one send therefore never send or count twice.

use std::sync::Arc;

use cadence_bus::{BusEvent, EventBus};
use cadence_core::state::LeadEvent;
use cadence_core::time::{format_ts, next_utc_midnight};
use cadence_core::types::{
    Campaign, CampaignLead, CampaignStatus, EmailSend, LeadStatus, LimitType, OutboundEmail,
    SendStatus, SuppressionReason,
};
use cadence_core::{CadenceError, TransportAdapter};
use cadence_storage::Database;
use cadence_storage::queries::sends::SendClaim;
use cadence_storage::queries::{campaigns, enrollments, leads, sends};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::limits::SendLimitGate;
use crate::recording;
use crate::suppression::SuppressionChecker;
use crate::window::is_within_window;

/// What happened to a dispatch request. Policy blocks are outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { message_id: String },
    /// The send was already `sent`; the transport was not called.
    AlreadySent,
    Suppressed(SuppressionReason),
    RateLimited(LimitType),
    /// Outside the send window; the send stays `approved`.
    OutsideWindow,
    /// The campaign is not active; the send stays `approved`.
    CampaignInactive(CampaignStatus),
    /// The send is not `approved` (still pending, in flight elsewhere, or terminal).
    NotApproved(SendStatus),
    /// The lead left the sequence; the send was marked `failed`.
    Halted(LeadStatus),
}

impl DispatchOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent { .. } => "sent",
            DispatchOutcome::AlreadySent => "already_sent",
            DispatchOutcome::Suppressed(_) => "suppressed",
            DispatchOutcome::RateLimited(_) => "rate_limited",
            DispatchOutcome::OutsideWindow => "outside_window",
            DispatchOutcome::CampaignInactive(_) => "campaign_inactive",
            DispatchOutcome::NotApproved(_) => "not_approved",
            DispatchOutcome::Halted(_) => "halted",
        }
    }
}

/// Sends approved email through the configured transport.
#[derive(Clone)]
pub struct Dispatcher {
    db: Database,
    transport: Arc<dyn TransportAdapter>,
    suppression: SuppressionChecker,
    limits: SendLimitGate,
    bus: EventBus,
}

impl Dispatcher {
    pub fn new(
        db: Database,
        transport: Arc<dyn TransportAdapter>,
        suppression: SuppressionChecker,
        limits: SendLimitGate,
        bus: EventBus,
    ) -> Self {
        Self {
            db,
            transport,
            suppression,
            limits,
            bus,
        }
    }

    /// Dispatch one send. Transport failures hand the send back to
    /// `approved` and return the error so the caller's retry policy can
    /// re-attempt it.
    pub async fn dispatch(
        &self,
        send_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, CadenceError> {
        let outcome = self.dispatch_inner(send_id, now).await;
        match &outcome {
            Ok(outcome) => recording::record_send_outcome(outcome.label()),
            Err(CadenceError::Transport { .. }) => recording::record_transport_error(),
            Err(_) => {}
        }
        outcome
    }

    async fn dispatch_inner(
        &self,
        send_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, CadenceError> {
        let send = sends::get_send(&self.db, send_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("email_send", send_id))?;
        match send.status {
            SendStatus::Approved => {}
            SendStatus::Sent => {
                debug!(send_id, "already sent, skipping transport");
                return Ok(DispatchOutcome::AlreadySent);
            }
            other => return Ok(DispatchOutcome::NotApproved(other)),
        }

        let cl = enrollments::get_campaign_lead(&self.db, &send.campaign_lead_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("campaign_lead", &send.campaign_lead_id))?;
        let campaign = campaigns::get_campaign(&self.db, &send.campaign_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("campaign", &send.campaign_id))?;
        let lead = leads::get_lead(&self.db, &cl.lead_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("lead", &cl.lead_id))?;
        let ts = format_ts(now);

        if campaign.status != CampaignStatus::Active {
            debug!(send_id, campaign_id = %campaign.id, status = %campaign.status, "campaign not active");
            return Ok(DispatchOutcome::CampaignInactive(campaign.status));
        }

        if !matches!(cl.status, LeadStatus::AwaitingApproval | LeadStatus::InSequence) {
            sends::transition_status(
                &self.db,
                send_id,
                SendStatus::Approved,
                SendStatus::Failed,
                Some(&format!("sequence halted: lead is {}", cl.status)),
                &ts,
            )
            .await?;
            info!(send_id, lead_status = %cl.status, "sequence halted, send dropped");
            return Ok(DispatchOutcome::Halted(cl.status));
        }

        let suppression = self.suppression.check(&send.tenant_id, &send.recipient, now).await?;
        if let Some(reason) = suppression.reason {
            return self.block_suppressed(&send, &cl, reason, &ts).await;
        }

        let limit = self.limits.check(&campaign, now).await?;
        if !limit.can_send {
            return self.block_rate_limited(&send, &cl, limit.limit_type, now).await;
        }

        let window = campaign.settings.send_window.resolve();
        if !is_within_window(&window, lead.timezone.as_deref(), now) {
            debug!(send_id, "outside send window, leaving approved");
            return Ok(DispatchOutcome::OutsideWindow);
        }

        match self.limits.claim(&campaign, send_id, now).await? {
            SendClaim::Claimed => {}
            SendClaim::Limited(limit_type) => {
                return self.block_rate_limited(&send, &cl, limit_type, now).await;
            }
            SendClaim::NotApproved => return self.claim_lost(send_id).await,
        }

        let email = OutboundEmail {
            to: send.recipient.clone(),
            subject: send.subject.clone(),
            body_html: send.body_html.clone(),
            body_text: send.body_text.clone(),
            idempotency_key: send.id.clone(),
        };
        let message_id = match self.transport.send_email(&email).await {
            Ok(id) => id,
            Err(e) => {
                warn!(send_id, error = %e, transport = self.transport.name(), "transport send failed");
                if !sends::release_claim(&self.db, send_id, &e.to_string(), &ts).await? {
                    warn!(send_id, "send claim expired before the transport failed");
                }
                return Err(e);
            }
        };

        let next_at = next_step_at(&campaign, send.step_number, now).map(format_ts);
        let record = sends::record_sent(&self.db, send_id, &message_id, next_at.as_deref(), &ts).await?;
        if !record.applied {
            // The claim expired mid-call and another dispatch took the row;
            // the provider de-duplicates on the idempotency key.
            warn!(send_id, "send claim lost before the send was recorded");
            return Ok(DispatchOutcome::AlreadySent);
        }
        if !record.lead_advanced {
            warn!(
                send_id,
                campaign_lead_id = %cl.id,
                step = send.step_number,
                "send recorded but lead step did not advance"
            );
        }

        info!(
            send_id,
            campaign_lead_id = %cl.id,
            step = send.step_number,
            message_id = %message_id,
            "email sent"
        );
        self.bus.publish(BusEvent::EmailSent {
            send_id: send.id.clone(),
            campaign_lead_id: cl.id.clone(),
            step: send.step_number,
        });
        Ok(DispatchOutcome::Sent { message_id })
    }

    /// Another dispatch got the claim first. Report where the row is now.
    async fn claim_lost(&self, send_id: &str) -> Result<DispatchOutcome, CadenceError> {
        let status = sends::get_send(&self.db, send_id)
            .await?
            .map(|send| send.status)
            .ok_or_else(|| CadenceError::not_found("email_send", send_id))?;
        debug!(send_id, %status, "send claimed by another dispatch");
        Ok(match status {
            SendStatus::Sent => DispatchOutcome::AlreadySent,
            other => DispatchOutcome::NotApproved(other),
        })
    }

    async fn block_suppressed(
        &self,
        send: &EmailSend,
        cl: &CampaignLead,
        reason: SuppressionReason,
        ts: &str,
    ) -> Result<DispatchOutcome, CadenceError> {
        sends::transition_status(
            &self.db,
            &send.id,
            SendStatus::Approved,
            SendStatus::Suppressed,
            Some(&format!("recipient suppressed: {reason}")),
            ts,
        )
        .await?;
        if let Some(to) = cl.status.transition(LeadEvent::Suppressed) {
            enrollments::transition_status(&self.db, &cl.id, cl.status, to, ts).await?;
        }
        info!(send_id = %send.id, %reason, "send blocked by suppression list");
        Ok(DispatchOutcome::Suppressed(reason))
    }

    async fn block_rate_limited(
        &self,
        send: &EmailSend,
        cl: &CampaignLead,
        limit_type: LimitType,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, CadenceError> {
        let ts = format_ts(now);
        sends::transition_status(
            &self.db,
            &send.id,
            SendStatus::Approved,
            SendStatus::RateLimited,
            Some(&format!("{limit_type} daily limit reached")),
            &ts,
        )
        .await?;
        // The scheduler re-discovers the lead after midnight and composes the
        // step again.
        let until = format_ts(next_utc_midnight(now));
        let to = cl.status.apply(LeadEvent::Deferred)?;
        enrollments::defer(&self.db, &cl.id, cl.status, to, &until, &ts).await?;
        info!(send_id = %send.id, %limit_type, until = %until, "send deferred by daily limit");
        Ok(DispatchOutcome::RateLimited(limit_type))
    }
}

/// When the step after `sent_step` becomes due, or `None` after the last step.
pub fn next_step_at(campaign: &Campaign, sent_step: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if sent_step >= campaign.total_steps {
        return None;
    }
    let days = campaign.settings.sequence.delay_after_step(sent_step);
    Some(now + Duration::days(i64::from(days)))
}
