// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in content provider.
//!
//! Writes plain step copy from fixed outlines (opener, follow-ups, a closing
//! note on the last step) and short acknowledgements for replies. It never
//! calls out, so a deployment without a generation service still produces
//! sendable drafts.

use async_trait::async_trait;
use cadence_core::types::{
    AdapterType, ComposeContext, Draft, HealthStatus, ReplyContext, Sentiment,
};
use cadence_core::{CadenceError, ContentProvider, PluginAdapter};

use crate::render::{TemplateVars, render, text_to_html};

const OPENER_SUBJECT: &str = "{{company}} and {{campaign}}";
const OPENER_BODY: &str = "Hi {{first_name}},\n\n\
I'm reaching out because teams like yours often care about {{value_prop}}.\n\n\
Would a short call next week be useful?";
const OPENER_BODY_NO_PROP: &str = "Hi {{first_name}},\n\n\
I'm reaching out about {{campaign}} and thought it might be relevant to your team.\n\n\
Would a short call next week be useful?";

const FOLLOW_UP_SUBJECT: &str = "Re: {{company}} and {{campaign}}";
const FOLLOW_UP_BODY: &str = "Hi {{first_name}},\n\n\
Following up on my last note. Happy to share how others approached this.\n\n\
Is this worth a conversation?";

const CLOSING_SUBJECT: &str = "Closing the loop";
const CLOSING_BODY: &str = "Hi {{first_name}},\n\n\
I haven't heard back, so I'll assume the timing isn't right and stop here.\n\n\
If that changes, just reply to this email.";

/// Outline-based content provider with no external calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinContent;

impl BuiltinContent {
    pub fn new() -> Self {
        Self
    }

    fn outline(ctx: &ComposeContext) -> (&'static str, &'static str) {
        let has_prop = ctx.value_prop.as_deref().is_some_and(|p| !p.trim().is_empty());
        match ctx.step_number {
            0 | 1 if has_prop => (OPENER_SUBJECT, OPENER_BODY),
            0 | 1 => (OPENER_SUBJECT, OPENER_BODY_NO_PROP),
            n if n >= ctx.total_steps && ctx.total_steps > 1 => (CLOSING_SUBJECT, CLOSING_BODY),
            _ => (FOLLOW_UP_SUBJECT, FOLLOW_UP_BODY),
        }
    }
}

#[async_trait]
impl PluginAdapter for BuiltinContent {
    fn name(&self) -> &str {
        "builtin"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Content
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ContentProvider for BuiltinContent {
    async fn compose(&self, context: &ComposeContext) -> Result<Draft, CadenceError> {
        let vars = TemplateVars::from_context(context);
        let (subject, body) = Self::outline(context);
        // A missing company leaves a dangling "and"; fall back to the campaign name.
        let subject = match render(subject, &vars).trim() {
            s if s.starts_with("and ") || s.starts_with("Re: and ") => context.campaign_name.clone(),
            s => s.to_string(),
        };
        let body_text = render(body, &vars);
        Ok(Draft {
            subject,
            body_html: text_to_html(&body_text),
            body_text,
            template_id: None,
            variant_id: None,
        })
    }

    async fn draft_reply(&self, context: &ReplyContext) -> Result<String, CadenceError> {
        let name = context
            .lead
            .as_ref()
            .and_then(|l| l.first_name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("there");
        let line = match context.classification.sentiment {
            Sentiment::Positive => {
                "Great to hear from you. Would any time later this week work for a quick call?"
            }
            Sentiment::Question => {
                "Good question. Let me pull together the details and follow up shortly."
            }
            Sentiment::Neutral => "Thanks for the reply. Happy to share more whenever it's useful.",
            _ => {
                return Err(CadenceError::Provider {
                    message: format!(
                        "no suggested response for {} replies",
                        context.classification.sentiment
                    ),
                    source: None,
                });
            }
        };
        Ok(format!("Hi {name},\n\n{line}"))
    }
}
