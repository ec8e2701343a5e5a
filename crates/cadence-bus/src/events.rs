// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event types published on the bus.
//!
//! Events carry ids only. Handlers re-read current state from storage, so a
//! re-delivered or late event never acts on a stale snapshot.

use cadence_core::types::CampaignStatus;
use serde::{Deserialize, Serialize};

/// Everything the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    LeadEnrolled {
        campaign_id: String,
        campaign_lead_id: String,
    },
    EmailComposed {
        send_id: String,
        campaign_lead_id: String,
        step: u32,
    },
    EmailApproved {
        send_id: String,
    },
    EmailSent {
        send_id: String,
        campaign_lead_id: String,
        step: u32,
    },
    CampaignStatusChanged {
        campaign_id: String,
        from: CampaignStatus,
        to: CampaignStatus,
    },
    ReplyReceived {
        reply_id: String,
    },
}

impl BusEvent {
    /// Stable external name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            BusEvent::LeadEnrolled { .. } => "campaign.lead-enrolled",
            BusEvent::EmailComposed { .. } => "campaign.email-composed",
            BusEvent::EmailApproved { .. } => "campaign.email-approved",
            BusEvent::EmailSent { .. } => "campaign.email-sent",
            BusEvent::CampaignStatusChanged { .. } => "campaign.status-changed",
            BusEvent::ReplyReceived { .. } => "reply.received",
        }
    }
}

/// A published event with delivery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique per publication; handlers may use it to de-duplicate.
    pub id: String,
    pub name: String,
    pub occurred_at: String,
    pub event: BusEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_namespaced() {
        let sent = BusEvent::EmailSent {
            send_id: "s-1".into(),
            campaign_lead_id: "cl-1".into(),
            step: 1,
        };
        assert_eq!(sent.name(), "campaign.email-sent");
        assert_eq!(
            BusEvent::ReplyReceived {
                reply_id: "r-1".into()
            }
            .name(),
            "reply.received"
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = BusEvent::CampaignStatusChanged {
            campaign_id: "c-1".into(),
            from: CampaignStatus::Scheduled,
            to: CampaignStatus::Active,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "campaign_status_changed");
        assert_eq!(json["to"], "active");
    }
}
