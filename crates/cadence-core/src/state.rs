// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transition tables for campaign and enrollment status.
//!
//! Every status write in the storage layer goes through these tables first,
//! then persists with a conditional `UPDATE ... WHERE status = <from>` so a
//! re-delivered operation that lost the race becomes a no-op.

use std::fmt;

use crate::error::CadenceError;
use crate::types::{CampaignStatus, LeadStatus, Sentiment};

/// Events that move a campaign lead through its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadEvent {
    /// Enrichment finished and a value proposition was matched.
    Enriched,
    /// A draft for the next step was stored.
    DraftQueued { requires_approval: bool },
    /// The transport confirmed a send.
    Sent,
    /// A send was blocked by a policy (rate limit) and will be re-discovered.
    Deferred,
    /// The recipient is suppressed.
    Suppressed,
    /// A reply was classified.
    Replied(Sentiment),
    /// Every step of the sequence has been sent.
    Completed,
}

impl fmt::Display for LeadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeadEvent::Enriched => write!(f, "enriched"),
            LeadEvent::DraftQueued { requires_approval } => {
                write!(f, "draft_queued(requires_approval={requires_approval})")
            }
            LeadEvent::Sent => write!(f, "sent"),
            LeadEvent::Deferred => write!(f, "deferred"),
            LeadEvent::Suppressed => write!(f, "suppressed"),
            LeadEvent::Replied(sentiment) => write!(f, "replied({sentiment})"),
            LeadEvent::Completed => write!(f, "completed"),
        }
    }
}

/// Status a lead moves to after a classified reply.
fn reply_target(sentiment: Sentiment) -> LeadStatus {
    match sentiment {
        Sentiment::Positive => LeadStatus::Positive,
        Sentiment::Unsubscribe => LeadStatus::Unsubscribed,
        Sentiment::Negative | Sentiment::NotInterested => LeadStatus::NotInterested,
        Sentiment::Neutral | Sentiment::Question | Sentiment::OutOfOffice => LeadStatus::Replied,
    }
}

impl LeadStatus {
    /// Statuses in which the sequence is still running.
    pub fn in_progress(self) -> bool {
        matches!(
            self,
            LeadStatus::Pending
                | LeadStatus::Ready
                | LeadStatus::AwaitingApproval
                | LeadStatus::InSequence
        )
    }

    /// The single enrollment transition table. `None` rejects the event.
    pub fn transition(self, event: LeadEvent) -> Option<LeadStatus> {
        use LeadStatus::*;

        match (self, event) {
            (Pending, LeadEvent::Enriched) => Some(Ready),

            (Pending | Ready | InSequence | AwaitingApproval, LeadEvent::DraftQueued { requires_approval: true }) => {
                Some(AwaitingApproval)
            }
            (Pending | Ready | InSequence, LeadEvent::DraftQueued { requires_approval: false }) => {
                Some(InSequence)
            }

            (AwaitingApproval | InSequence, LeadEvent::Sent) => Some(InSequence),
            (s, LeadEvent::Deferred) if s.in_progress() => Some(InSequence),
            (s, LeadEvent::Suppressed) if !s.is_terminal() => Some(Unsubscribed),
            (s, LeadEvent::Completed) if s.in_progress() => Some(Completed),

            (s, LeadEvent::Replied(sentiment)) if s.in_progress() || s == Completed => {
                Some(reply_target(sentiment))
            }
            // Later replies may escalate an engaged lead but never downgrade it.
            (Replied | Positive, LeadEvent::Replied(sentiment)) => match reply_target(sentiment) {
                Replied => Some(self),
                Positive => Some(Positive),
                target => Some(target),
            },
            (NotInterested, LeadEvent::Replied(Sentiment::Unsubscribe)) => Some(Unsubscribed),

            _ => None,
        }
    }

    /// Like [`transition`](Self::transition) but returns an error on rejection.
    pub fn apply(self, event: LeadEvent) -> Result<LeadStatus, CadenceError> {
        self.transition(event)
            .ok_or_else(|| CadenceError::InvalidTransition {
                entity: "campaign_lead",
                from: self.to_string(),
                event: event.to_string(),
            })
    }
}

/// Events in a campaign's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignEvent {
    Schedule,
    Activate,
    Pause,
    Resume,
    Complete,
}

impl fmt::Display for CampaignEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CampaignEvent::Schedule => "schedule",
            CampaignEvent::Activate => "activate",
            CampaignEvent::Pause => "pause",
            CampaignEvent::Resume => "resume",
            CampaignEvent::Complete => "complete",
        };
        f.write_str(name)
    }
}

impl CampaignStatus {
    /// The campaign transition table. `None` rejects the event.
    pub fn transition(self, event: CampaignEvent) -> Option<CampaignStatus> {
        use CampaignStatus::*;

        match (self, event) {
            (Draft, CampaignEvent::Schedule) => Some(Scheduled),
            (Scheduled, CampaignEvent::Activate) => Some(Active),
            (Active, CampaignEvent::Pause) => Some(Paused),
            (Paused, CampaignEvent::Resume) => Some(Active),
            (Active | Paused, CampaignEvent::Complete) => Some(Completed),
            _ => None,
        }
    }

    /// Like [`transition`](Self::transition) but returns an error on rejection.
    pub fn apply(self, event: CampaignEvent) -> Result<CampaignStatus, CadenceError> {
        self.transition(event)
            .ok_or_else(|| CadenceError::InvalidTransition {
                entity: "campaign",
                from: self.to_string(),
                event: event.to_string(),
            })
    }
}
