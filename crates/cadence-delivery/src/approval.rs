// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approval gate.
//!
//! Step 1 always waits for a human. Later steps skip review only when the
//! campaign has `auto_send_approved` set. Either way the send becomes
//! `approved` through the same conditional write, and approval immediately
//! enqueues a dispatch.

use cadence_bus::{BusEvent, EventBus};
use cadence_core::CadenceError;
use cadence_core::time::format_ts;
use cadence_core::types::{EmailSend, SendStatus};
use cadence_storage::Database;
use cadence_storage::queries::{queue, sends};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{DISPATCH_QUEUE, DispatchRequest};

/// Whether a composed step must wait for manual approval.
pub fn requires_approval(step_number: u32, auto_send_approved: bool) -> bool {
    step_number <= 1 || !auto_send_approved
}

/// What the gate did with a freshly stored draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    AwaitingApproval,
    AutoApproved,
}

/// Result of an approval attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproveOutcome {
    /// `pending_approval -> approved` applied in this call.
    Approved,
    /// The send was already approved or sent; nothing changed.
    AlreadyApproved,
    /// The send is in a terminal non-sent status and cannot be approved.
    NotPending(SendStatus),
}

#[derive(Clone)]
pub struct ApprovalGate {
    db: Database,
    bus: EventBus,
}

impl ApprovalGate {
    pub fn new(db: Database, bus: EventBus) -> Self {
        Self { db, bus }
    }

    /// Route a stored `pending_approval` draft.
    pub async fn route(
        &self,
        send: &EmailSend,
        auto_send_approved: bool,
        now: DateTime<Utc>,
    ) -> Result<GateDecision, CadenceError> {
        if requires_approval(send.step_number, auto_send_approved) {
            info!(
                send_id = %send.id,
                step = send.step_number,
                "email awaiting manual approval"
            );
            return Ok(GateDecision::AwaitingApproval);
        }
        match self.approve(&send.id, now).await? {
            ApproveOutcome::NotPending(status) => Err(CadenceError::InvalidTransition {
                entity: "email_send",
                from: status.to_string(),
                event: "auto_approve".into(),
            }),
            _ => Ok(GateDecision::AutoApproved),
        }
    }

    /// Approve a pending send and enqueue its dispatch. Operator entry point.
    pub async fn approve(
        &self,
        send_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ApproveOutcome, CadenceError> {
        let send = sends::get_send(&self.db, send_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("email_send", send_id))?;

        let outcome = match send.status {
            SendStatus::PendingApproval => {
                if sends::approve(&self.db, send_id, &format_ts(now)).await? {
                    ApproveOutcome::Approved
                } else {
                    // Lost a race with another approver.
                    ApproveOutcome::AlreadyApproved
                }
            }
            SendStatus::Approved | SendStatus::Sending | SendStatus::Sent => {
                ApproveOutcome::AlreadyApproved
            }
            other => ApproveOutcome::NotPending(other),
        };

        if outcome == ApproveOutcome::Approved {
            self.enqueue_dispatch(send_id).await?;
            self.bus.publish(BusEvent::EmailApproved {
                send_id: send_id.to_string(),
            });
            info!(send_id, step = send.step_number, "email approved");
        } else {
            debug!(send_id, ?outcome, "approval was a no-op");
        }
        Ok(outcome)
    }

    /// Put a dispatch request for `send_id` on the dispatch queue.
    pub async fn enqueue_dispatch(&self, send_id: &str) -> Result<i64, CadenceError> {
        let payload = serde_json::to_string(&DispatchRequest {
            send_id: send_id.to_string(),
        })
        .map_err(|e| CadenceError::Internal(format!("dispatch payload: {e}")))?;
        queue::enqueue(&self.db, DISPATCH_QUEUE, &payload).await
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::types::{CampaignStatus, LeadStatus};
    use cadence_storage::queries::queue;
    use cadence_test_utils::fixtures;

    use super::*;

    #[test]
    fn first_step_always_needs_approval() {
        assert!(requires_approval(1, true));
        assert!(requires_approval(1, false));
        assert!(requires_approval(2, false));
        assert!(!requires_approval(2, true));
        assert!(!requires_approval(5, true));
    }

    async fn pending_send(db: &Database, step_done: u32) -> EmailSend {
        fixtures::tenant(db, "t-1", None).await;
        let campaign = fixtures::campaign(db, "t-1", "c-1", CampaignStatus::Active, 3).await;
        let lead = fixtures::lead(db, "t-1", "l-1", "ada@acme.test").await;
        let cl = fixtures::enroll(db, "c-1", "l-1").await;
        let cl = fixtures::force_lead_state(db, &cl.id, LeadStatus::InSequence, step_done, None).await;
        let send = fixtures::new_send(&campaign, &lead, &cl, SendStatus::PendingApproval);
        match sends::insert_draft(db, &send, LeadStatus::InSequence, LeadStatus::AwaitingApproval)
            .await
            .unwrap()
        {
            sends::DraftInsert::Created(send) => send,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn manual_approval_enqueues_dispatch_once() {
        let db = Database::open_in_memory().await.unwrap();
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let gate = ApprovalGate::new(db.clone(), bus);
        let send = pending_send(&db, 0).await;

        assert_eq!(
            gate.route(&send, true, Utc::now()).await.unwrap(),
            GateDecision::AwaitingApproval
        );
        assert_eq!(queue::pending_count(&db, DISPATCH_QUEUE).await.unwrap(), 0);

        assert_eq!(gate.approve(&send.id, Utc::now()).await.unwrap(), ApproveOutcome::Approved);
        assert_eq!(
            gate.approve(&send.id, Utc::now()).await.unwrap(),
            ApproveOutcome::AlreadyApproved
        );
        assert_eq!(queue::pending_count(&db, DISPATCH_QUEUE).await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap().name, "campaign.email-approved");

        let stored = sends::get_send(&db, &send.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SendStatus::Approved);
        assert!(stored.approved_at.is_some());
    }

    #[tokio::test]
    async fn follow_up_on_auto_send_campaign_is_approved_immediately() {
        let db = Database::open_in_memory().await.unwrap();
        let gate = ApprovalGate::new(db.clone(), EventBus::default());
        let send = pending_send(&db, 1).await;
        assert_eq!(send.step_number, 2);

        assert_eq!(
            gate.route(&send, true, Utc::now()).await.unwrap(),
            GateDecision::AutoApproved
        );
        assert_eq!(queue::pending_count(&db, DISPATCH_QUEUE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn terminal_sends_cannot_be_approved() {
        let db = Database::open_in_memory().await.unwrap();
        let gate = ApprovalGate::new(db.clone(), EventBus::default());
        let send = pending_send(&db, 0).await;
        let now = format_ts(Utc::now());
        assert!(
            sends::transition_status(&db, &send.id, SendStatus::PendingApproval, SendStatus::Failed, None, &now)
                .await
                .unwrap()
        );
        assert_eq!(
            gate.approve(&send.id, Utc::now()).await.unwrap(),
            ApproveOutcome::NotPending(SendStatus::Failed)
        );
        assert!(gate.approve("missing", Utc::now()).await.is_err());
    }
}
