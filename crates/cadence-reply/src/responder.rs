// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply processor: store, classify, move the lead, draft a response.
//!
//! The classification write is conditional on the reply still being
//! unclassified and happens last, so a crash or classifier failure leaves the
//! reply for the sweep to pick up again.

use std::sync::Arc;

use cadence_bus::{BusEvent, EventBus};
use cadence_config::model::ReplyConfig;
use cadence_core::state::LeadEvent;
use cadence_core::time::format_ts;
use cadence_core::types::{
    CampaignLead, Classification, Lead, LeadStatus, Reply, ReplyContext, Sentiment,
    SuppressionReason,
};
use cadence_core::{CadenceError, ContentProvider, ReplyClassifier};
use cadence_delivery::SuppressionChecker;
use cadence_storage::Database;
use cadence_storage::queries::{enrollments, leads, replies};
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use tracing::{debug, info, warn};

/// Result of processing one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Classified {
        classification: Classification,
        /// Lead status after the reply, when the reply matched an enrollment.
        lead_status: Option<LeadStatus>,
        suggested_response: bool,
    },
    /// The classifier failed; the reply stays unclassified.
    Unclassified,
    AlreadyClassified,
}

/// Totals of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub processed: usize,
    pub classified: usize,
    pub unclassified: usize,
    /// Replies whose processing errored; they stay for the next sweep.
    pub failed: usize,
}

/// Bare, lowercased address from a `From` header value
/// (`Ada <ada@acme.test>`). `None` when the value holds no valid address.
pub fn sender_address(sender: &str) -> Option<String> {
    sender
        .trim()
        .parse::<Mailbox>()
        .ok()
        .map(|mailbox| mailbox.email.to_string().to_ascii_lowercase())
}

#[derive(Clone)]
pub struct ReplyProcessor {
    db: Database,
    classifier: Arc<dyn ReplyClassifier>,
    content: Arc<dyn ContentProvider>,
    suppression: SuppressionChecker,
    bus: EventBus,
    config: ReplyConfig,
}

impl ReplyProcessor {
    pub fn new(
        db: Database,
        classifier: Arc<dyn ReplyClassifier>,
        content: Arc<dyn ContentProvider>,
        bus: EventBus,
        config: ReplyConfig,
    ) -> Self {
        Self {
            suppression: SuppressionChecker::new(db.clone()),
            db,
            classifier,
            content,
            bus,
            config,
        }
    }

    /// Store an inbound reply, match it to an enrollment and announce it.
    pub async fn receive(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply, CadenceError> {
        let address = sender_address(sender);
        let matched = match &address {
            Some(address) => enrollments::find_by_sender(&self.db, address).await?,
            None => {
                warn!(sender, "reply sender has no valid address");
                None
            }
        };
        let reply = Reply {
            id: uuid::Uuid::new_v4().to_string(),
            campaign_lead_id: matched.as_ref().map(|cl| cl.id.clone()),
            sender: address.unwrap_or_else(|| sender.trim().to_string()),
            subject: subject.to_string(),
            body: body.to_string(),
            received_at: format_ts(now),
            sentiment: None,
            intent_score: None,
            confidence: None,
            suggested_response: None,
            classified_at: None,
        };
        replies::insert_reply(&self.db, &reply).await?;
        info!(
            reply_id = %reply.id,
            campaign_lead_id = reply.campaign_lead_id.as_deref().unwrap_or("-"),
            "reply received"
        );
        self.bus.publish(BusEvent::ReplyReceived {
            reply_id: reply.id.clone(),
        });
        Ok(reply)
    }

    /// Classify a stored reply and apply its effects.
    pub async fn process(&self, reply_id: &str, now: DateTime<Utc>) -> Result<ReplyOutcome, CadenceError> {
        let mut reply = replies::get_reply(&self.db, reply_id)
            .await?
            .ok_or_else(|| CadenceError::not_found("reply", reply_id))?;
        if reply.classified_at.is_some() {
            return Ok(ReplyOutcome::AlreadyClassified);
        }

        let classification = match self.classifier.classify(&reply.subject, &reply.body).await {
            Ok(c) => c,
            Err(e) => {
                warn!(reply_id, error = %e, classifier = self.classifier.name(), "classification failed");
                return Ok(ReplyOutcome::Unclassified);
            }
        };
        let ts = format_ts(now);

        // Late match: the enrollment may have been created after the reply arrived.
        let address = sender_address(&reply.sender);
        if reply.campaign_lead_id.is_none()
            && let Some(address) = &address
            && let Some(cl) = enrollments::find_by_sender(&self.db, address).await?
        {
            replies::link_campaign_lead(&self.db, reply_id, &cl.id).await?;
            reply.campaign_lead_id = Some(cl.id);
        }

        let enrollment = match &reply.campaign_lead_id {
            Some(id) => enrollments::get_campaign_lead(&self.db, id).await?,
            None => None,
        };
        let lead = match &enrollment {
            Some(cl) => leads::get_lead(&self.db, &cl.lead_id).await?,
            None => None,
        };

        let lead_status = match &enrollment {
            Some(cl) => self.apply_to_lead(cl, &classification, &ts).await?,
            None => None,
        };

        if classification.sentiment == Sentiment::Unsubscribe {
            match &address {
                Some(address) => self.suppress_sender(address, lead.as_ref(), now).await?,
                None => warn!(reply_id, sender = %reply.sender, "unsubscribe without a sender address, nothing to suppress"),
            }
        }

        let suggested = self.suggest(&reply, &classification, lead).await;

        let recorded = replies::record_classification(
            &self.db,
            reply_id,
            &classification,
            suggested.as_deref(),
            &ts,
        )
        .await?;
        if !recorded {
            return Ok(ReplyOutcome::AlreadyClassified);
        }

        info!(
            reply_id,
            sentiment = %classification.sentiment,
            intent = classification.intent_score,
            lead_status = lead_status.map(|s| s.to_string()).as_deref().unwrap_or("-"),
            "reply classified"
        );
        Ok(ReplyOutcome::Classified {
            classification,
            lead_status,
            suggested_response: suggested.is_some(),
        })
    }

    /// Reprocess unclassified replies, oldest first.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, CadenceError> {
        let pending = replies::list_unclassified(&self.db, self.config.sweep_batch).await?;
        let mut report = SweepReport::default();
        for reply in pending {
            report.processed += 1;
            match self.process(&reply.id, now).await {
                Ok(ReplyOutcome::Classified { .. }) => report.classified += 1,
                Ok(ReplyOutcome::Unclassified) => report.unclassified += 1,
                Ok(ReplyOutcome::AlreadyClassified) => {}
                Err(e) => {
                    warn!(reply_id = %reply.id, error = %e, "reply processing failed");
                    report.failed += 1;
                }
            }
        }
        if report.processed > 0 {
            info!(
                processed = report.processed,
                classified = report.classified,
                unclassified = report.unclassified,
                failed = report.failed,
                "reply sweep finished"
            );
        }
        Ok(report)
    }

    /// Move the lead through the transition table. Re-reads once if another
    /// writer moved it between the read and the conditional write.
    async fn apply_to_lead(
        &self,
        cl: &CampaignLead,
        classification: &Classification,
        ts: &str,
    ) -> Result<Option<LeadStatus>, CadenceError> {
        let event = LeadEvent::Replied(classification.sentiment);
        let mut current = cl.status;
        for _ in 0..2 {
            let Some(to) = current.transition(event) else {
                debug!(campaign_lead_id = %cl.id, status = %current, %event, "reply does not move lead");
                return Ok(Some(current));
            };
            if enrollments::record_reply(
                &self.db,
                &cl.id,
                current,
                to,
                classification.sentiment,
                classification.intent_score,
                ts,
            )
            .await?
            {
                return Ok(Some(to));
            }
            current = enrollments::get_campaign_lead(&self.db, &cl.id)
                .await?
                .ok_or_else(|| CadenceError::not_found("campaign_lead", &cl.id))?
                .status;
        }
        Err(CadenceError::Conflict(format!(
            "campaign lead {} changed concurrently while applying a reply",
            cl.id
        )))
    }

    async fn suppress_sender(
        &self,
        address: &str,
        lead: Option<&Lead>,
        now: DateTime<Utc>,
    ) -> Result<(), CadenceError> {
        // Without a matched lead the tenant is unknown; suppress everywhere.
        let tenant_id = lead.map(|l| l.tenant_id.as_str());
        let check_tenant = tenant_id.unwrap_or("");
        if self.suppression.check(check_tenant, address, now).await?.suppressed {
            return Ok(());
        }
        self.suppression
            .suppress(tenant_id, address, SuppressionReason::Unsubscribed, None, now)
            .await?;
        Ok(())
    }

    async fn suggest(
        &self,
        reply: &Reply,
        classification: &Classification,
        lead: Option<Lead>,
    ) -> Option<String> {
        if !classification.sentiment.wants_suggested_reply()
            || classification.intent_score < self.config.suggest_min_intent
        {
            return None;
        }
        let ctx = ReplyContext {
            sender: reply.sender.clone(),
            subject: reply.subject.clone(),
            body: reply.body.clone(),
            classification: classification.clone(),
            lead,
        };
        match self.content.draft_reply(&ctx).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!(reply_id = %reply.id, error = %e, "suggested response failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::types::CampaignStatus;
    use cadence_storage::queries::suppressions;
    use cadence_test_utils::{MockClassifier, MockContent, fixtures};

    use super::*;

    struct Setup {
        db: Database,
        classifier: Arc<MockClassifier>,
        content: Arc<MockContent>,
        processor: ReplyProcessor,
        cl: CampaignLead,
    }

    async fn setup() -> Setup {
        let db = Database::open_in_memory().await.unwrap();
        fixtures::tenant(&db, "t-1", None).await;
        fixtures::campaign(&db, "t-1", "c-1", CampaignStatus::Active, 3).await;
        fixtures::lead(&db, "t-1", "l-1", "ada@acme.test").await;
        let cl = fixtures::enroll(&db, "c-1", "l-1").await;
        let cl = fixtures::force_lead_state(&db, &cl.id, LeadStatus::InSequence, 1, Some("2026-03-05T09:00:00.000Z")).await;

        let classifier = Arc::new(MockClassifier::new());
        let content = Arc::new(MockContent::new());
        let processor = ReplyProcessor::new(
            db.clone(),
            classifier.clone(),
            content.clone(),
            EventBus::default(),
            ReplyConfig::default(),
        );
        Setup {
            db,
            classifier,
            content,
            processor,
            cl,
        }
    }

    #[test]
    fn sender_address_parsing() {
        assert_eq!(sender_address("Ada Lovelace <Ada@Acme.test>").as_deref(), Some("ada@acme.test"));
        assert_eq!(sender_address(" ada@acme.test ").as_deref(), Some("ada@acme.test"));
        assert_eq!(sender_address("Mailer <>"), None);
        assert_eq!(sender_address("acme.test"), None);
        assert_eq!(sender_address(""), None);
    }

    #[tokio::test]
    async fn unsubscribe_reply_halts_and_suppresses() {
        let s = setup().await;
        s.classifier.push(Sentiment::Unsubscribe, 0).await;
        let reply = s
            .processor
            .receive("Ada <ada@acme.test>", "Re: hi", "please unsubscribe me", Utc::now())
            .await
            .unwrap();
        assert_eq!(reply.campaign_lead_id.as_deref(), Some(s.cl.id.as_str()));

        let outcome = s.processor.process(&reply.id, Utc::now()).await.unwrap();
        match outcome {
            ReplyOutcome::Classified { lead_status, suggested_response, .. } => {
                assert_eq!(lead_status, Some(LeadStatus::Unsubscribed));
                assert!(!suggested_response);
            }
            other => panic!("unexpected {other:?}"),
        }

        let cl = enrollments::get_campaign_lead(&s.db, &s.cl.id).await.unwrap().unwrap();
        assert_eq!(cl.status, LeadStatus::Unsubscribed);
        assert!(cl.next_email_scheduled_at.is_none());
        let entries = suppressions::list(&s.db, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "ada@acme.test");
        assert_eq!(entries[0].tenant_id.as_deref(), Some("t-1"));
        assert_eq!(entries[0].reason, SuppressionReason::Unsubscribed);
    }

    #[tokio::test]
    async fn positive_reply_gets_a_suggested_response() {
        let s = setup().await;
        s.classifier.push(Sentiment::Positive, 7).await;
        let reply = s
            .processor
            .receive("ada@acme.test", "Re: hi", "let's talk", Utc::now())
            .await
            .unwrap();
        s.processor.process(&reply.id, Utc::now()).await.unwrap();

        let stored = replies::get_reply(&s.db, &reply.id).await.unwrap().unwrap();
        assert_eq!(stored.sentiment, Some(Sentiment::Positive));
        assert!(stored.suggested_response.is_some());
        let cl = enrollments::get_campaign_lead(&s.db, &s.cl.id).await.unwrap().unwrap();
        assert_eq!(cl.status, LeadStatus::Positive);
        assert_eq!(cl.intent_score, Some(7));
    }

    #[tokio::test]
    async fn low_intent_question_gets_no_suggestion() {
        let s = setup().await;
        s.classifier.push(Sentiment::Question, 2).await;
        let reply = s
            .processor
            .receive("ada@acme.test", "Re: hi", "who is this?", Utc::now())
            .await
            .unwrap();
        s.processor.process(&reply.id, Utc::now()).await.unwrap();
        let stored = replies::get_reply(&s.db, &reply.id).await.unwrap().unwrap();
        assert!(stored.suggested_response.is_none());
        let cl = enrollments::get_campaign_lead(&s.db, &s.cl.id).await.unwrap().unwrap();
        assert_eq!(cl.status, LeadStatus::Replied);
    }

    #[tokio::test]
    async fn suggestion_failure_does_not_block_classification() {
        let s = setup().await;
        s.classifier.push(Sentiment::Positive, 9).await;
        s.content.fail_next(1);
        let reply = s
            .processor
            .receive("ada@acme.test", "Re: hi", "yes!", Utc::now())
            .await
            .unwrap();
        let outcome = s.processor.process(&reply.id, Utc::now()).await.unwrap();
        assert!(matches!(
            outcome,
            ReplyOutcome::Classified { suggested_response: false, .. }
        ));
    }

    #[tokio::test]
    async fn classifier_failure_leaves_reply_for_the_sweep() {
        let s = setup().await;
        s.classifier.push_failure("model offline").await;
        let reply = s
            .processor
            .receive("ada@acme.test", "Re: hi", "not interested", Utc::now())
            .await
            .unwrap();
        assert_eq!(
            s.processor.process(&reply.id, Utc::now()).await.unwrap(),
            ReplyOutcome::Unclassified
        );
        let cl = enrollments::get_campaign_lead(&s.db, &s.cl.id).await.unwrap().unwrap();
        assert_eq!(cl.status, LeadStatus::InSequence);

        s.classifier.push(Sentiment::NotInterested, 0).await;
        let report = s.processor.sweep(Utc::now()).await.unwrap();
        assert_eq!(report, SweepReport { processed: 1, classified: 1, unclassified: 0, failed: 0 });
        let cl = enrollments::get_campaign_lead(&s.db, &s.cl.id).await.unwrap().unwrap();
        assert_eq!(cl.status, LeadStatus::NotInterested);

        assert_eq!(
            s.processor.process(&reply.id, Utc::now()).await.unwrap(),
            ReplyOutcome::AlreadyClassified
        );
    }

    #[tokio::test]
    async fn unknown_sender_unsubscribe_is_suppressed_globally() {
        let s = setup().await;
        s.classifier.push(Sentiment::Unsubscribe, 0).await;
        let reply = s
            .processor
            .receive("stranger@else.test", "Re: hi", "unsubscribe", Utc::now())
            .await
            .unwrap();
        assert!(reply.campaign_lead_id.is_none());
        s.processor.process(&reply.id, Utc::now()).await.unwrap();
        let entries = suppressions::list(&s.db, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].tenant_id.is_none());
    }
    #[tokio::test]
    async fn unsubscribe_without_address_is_classified_but_not_suppressed() {
        let s = setup().await;
        let t0 = Utc::now();
        s.classifier.push(Sentiment::Unsubscribe, 0).await;
        s.classifier.push(Sentiment::Positive, 8).await;
        let bad = s
            .processor
            .receive("Mailer <>", "Re: hi", "unsubscribe", t0)
            .await
            .unwrap();
        assert!(bad.campaign_lead_id.is_none());
        let good = s
            .processor
            .receive("ada@acme.test", "Re: hi", "let's talk", t0 + chrono::Duration::seconds(1))
            .await
            .unwrap();

        let report = s.processor.sweep(t0 + chrono::Duration::seconds(2)).await.unwrap();
        assert_eq!(report, SweepReport { processed: 2, classified: 2, unclassified: 0, failed: 0 });
        assert!(suppressions::list(&s.db, 10).await.unwrap().is_empty());
        for id in [&bad.id, &good.id] {
            let stored = replies::get_reply(&s.db, id).await.unwrap().unwrap();
            assert!(stored.classified_at.is_some());
        }
    }

    #[tokio::test]
    async fn sweep_continues_past_a_failing_reply() {
        let s = setup().await;
        let t0 = Utc::now();
        s.classifier.push(Sentiment::Unsubscribe, 0).await;
        s.classifier.push(Sentiment::Positive, 8).await;
        let failing = s
            .processor
            .receive("stranger@else.test", "Re: hi", "unsubscribe", t0)
            .await
            .unwrap();
        let good = s
            .processor
            .receive("ada@acme.test", "Re: hi", "let's talk", t0 + chrono::Duration::seconds(1))
            .await
            .unwrap();
        // Suppression writes now fail, so only the unsubscribe reply errors.
        s.db.connection()
            .call(|conn| conn.execute_batch("DROP TABLE suppressions"))
            .await
            .unwrap();

        let report = s.processor.sweep(t0 + chrono::Duration::seconds(2)).await.unwrap();
        assert_eq!(report, SweepReport { processed: 2, classified: 1, unclassified: 0, failed: 1 });
        let stored = replies::get_reply(&s.db, &failing.id).await.unwrap().unwrap();
        assert!(stored.classified_at.is_none());
        let stored = replies::get_reply(&s.db, &good.id).await.unwrap().unwrap();
        assert_eq!(stored.sentiment, Some(Sentiment::Positive));
    }
}
