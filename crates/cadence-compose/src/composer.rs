// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composer: turns a sequence step into a draft.
//!
//! Source precedence is the assigned variant, then the best-fitting template
//! from the campaign's pool, then the content provider. A variant carries the
//! copy of the opening step only; later steps of a variant's enrollment are
//! composed from the pool or the provider and keep the variant id for
//! attribution. Composition writes nothing; storing the draft is the caller's
//! job.

use std::cmp::Ordering;
use std::sync::Arc;

use cadence_core::types::{ComposeContext, Draft, Template, Variant};
use cadence_core::{CadenceError, ContentProvider};
use tracing::debug;

/// The step whose copy an A/B variant replaces.
pub const VARIANT_STEP: u32 = 1;

use crate::render::{TemplateVars, render, text_to_html};

/// Fit score of a template for a step and segment. `None` disqualifies.
///
/// An exact step or segment match scores 2, an unrestricted field scores 1,
/// a mismatch disqualifies.
fn fit_score(template: &Template, step: u32, segment: Option<&str>) -> Option<u32> {
    let step_score = match template.step_number {
        Some(s) if s == step => 2,
        Some(_) => return None,
        None => 1,
    };
    let segment_score = match (template.segment.as_deref(), segment) {
        (None, _) => 1,
        (Some(want), Some(have)) if want.eq_ignore_ascii_case(have) => 2,
        (Some(_), _) => return None,
    };
    Some(step_score + segment_score)
}

/// Highest-scoring template; ties go to the most recently created.
pub fn best_fit_template<'a>(
    templates: &'a [Template],
    step: u32,
    segment: Option<&str>,
) -> Option<&'a Template> {
    templates
        .iter()
        .filter_map(|t| fit_score(t, step, segment).map(|score| (score, t)))
        .max_by(|(sa, ta), (sb, tb)| match sa.cmp(sb) {
            Ordering::Equal => ta.created_at.cmp(&tb.created_at),
            other => other,
        })
        .map(|(_, t)| t)
}

/// Drafts the email for one step.
#[derive(Clone)]
pub struct Composer {
    content: Arc<dyn ContentProvider>,
}

impl Composer {
    pub fn new(content: Arc<dyn ContentProvider>) -> Self {
        Self { content }
    }

    pub async fn compose(
        &self,
        ctx: &ComposeContext,
        variant: Option<&Variant>,
        templates: &[Template],
    ) -> Result<Draft, CadenceError> {
        let vars = TemplateVars::from_context(ctx);

        if let Some(variant) = variant
            && ctx.step_number == VARIANT_STEP
        {
            debug!(variant = %variant.key, step = ctx.step_number, "composing from variant");
            let body_text = render(&variant.body_template, &vars);
            return Ok(Draft {
                subject: render(&variant.subject_template, &vars),
                body_html: text_to_html(&body_text),
                body_text,
                template_id: None,
                variant_id: Some(variant.id.clone()),
            });
        }

        let variant_id = variant.map(|v| v.id.clone());

        if let Some(template) = best_fit_template(templates, ctx.step_number, ctx.lead.segment.as_deref()) {
            debug!(template = %template.name, step = ctx.step_number, "composing from template");
            let body_text = render(&template.body_template, &vars);
            return Ok(Draft {
                subject: render(&template.subject_template, &vars),
                body_html: text_to_html(&body_text),
                body_text,
                template_id: Some(template.id.clone()),
                variant_id,
            });
        }

        debug!(provider = self.content.name(), step = ctx.step_number, "no template fits, generating");
        let mut draft = self.content.compose(ctx).await?;
        if draft.subject.trim().is_empty() || draft.body_text.trim().is_empty() {
            return Err(CadenceError::provider(format!(
                "{} returned an empty draft",
                self.content.name()
            )));
        }
        if draft.body_html.trim().is_empty() {
            draft.body_html = text_to_html(&draft.body_text);
        }
        if draft.variant_id.is_none() {
            draft.variant_id = variant_id;
        }
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::types::Lead;
    use cadence_test_utils::MockContent;

    use super::*;

    fn template(id: &str, step: Option<u32>, segment: Option<&str>, created_at: &str) -> Template {
        Template {
            id: id.into(),
            campaign_id: "c-1".into(),
            name: format!("tpl {id}"),
            step_number: step,
            segment: segment.map(str::to_string),
            subject_template: format!("[{id}] Hi {{{{first_name}}}}"),
            body_template: "Hello {{first_name}} at {{company}}".into(),
            created_at: created_at.into(),
        }
    }

    fn ctx(step: u32, segment: Option<&str>) -> ComposeContext {
        ComposeContext {
            campaign_name: "Spring".into(),
            step_number: step,
            total_steps: 3,
            lead: Lead {
                id: "l-1".into(),
                tenant_id: "t-1".into(),
                email: "ada@acme.test".into(),
                first_name: Some("Ada".into()),
                last_name: None,
                company: Some("Acme".into()),
                title: None,
                timezone: None,
                segment: segment.map(str::to_string),
                created_at: "2026-03-01T00:00:00.000Z".into(),
            },
            value_prop: None,
            enrichment: None,
        }
    }

    #[test]
    fn exact_matches_beat_generic_templates() {
        let pool = vec![
            template("generic", None, None, "2026-03-05T00:00:00.000Z"),
            template("step2", Some(2), None, "2026-03-01T00:00:00.000Z"),
            template("step2-smb", Some(2), Some("smb"), "2026-03-01T00:00:00.000Z"),
        ];
        assert_eq!(best_fit_template(&pool, 2, Some("smb")).unwrap().id, "step2-smb");
        assert_eq!(best_fit_template(&pool, 2, Some("enterprise")).unwrap().id, "step2");
        assert_eq!(best_fit_template(&pool, 1, Some("smb")).unwrap().id, "generic");
    }

    #[test]
    fn ties_go_to_the_newest_template() {
        let pool = vec![
            template("old", Some(1), None, "2026-03-01T00:00:00.000Z"),
            template("new", Some(1), None, "2026-03-04T00:00:00.000Z"),
        ];
        assert_eq!(best_fit_template(&pool, 1, None).unwrap().id, "new");
    }

    #[test]
    fn mismatched_templates_are_excluded() {
        let pool = vec![template("step3", Some(3), None, "2026-03-01T00:00:00.000Z")];
        assert!(best_fit_template(&pool, 1, None).is_none());
    }

    fn variant() -> Variant {
        Variant {
            id: "v-a".into(),
            campaign_id: "c-1".into(),
            key: "a".into(),
            subject_template: "A for {{first_name}}".into(),
            body_template: "Variant body for {{company}}".into(),
            weight: 1,
            active: true,
            created_at: "2026-03-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn variant_takes_precedence_over_templates() {
        let composer = Composer::new(Arc::new(MockContent::new()));
        let variant = variant();
        let pool = vec![template("generic", None, None, "2026-03-01T00:00:00.000Z")];
        let draft = composer.compose(&ctx(1, None), Some(&variant), &pool).await.unwrap();
        assert_eq!(draft.subject, "A for Ada");
        assert_eq!(draft.body_text, "Variant body for Acme");
        assert_eq!(draft.body_html, "<p>Variant body for Acme</p>");
        assert_eq!(draft.variant_id.as_deref(), Some("v-a"));
        assert!(draft.template_id.is_none());
    }

    #[tokio::test]
    async fn later_steps_of_a_variant_use_step_copy() {
        let content = Arc::new(MockContent::new());
        let composer = Composer::new(content.clone());
        let variant = variant();
        let pool = vec![
            template("opener", Some(1), None, "2026-03-01T00:00:00.000Z"),
            template("follow-up", Some(2), None, "2026-03-01T00:00:00.000Z"),
        ];

        let second = composer.compose(&ctx(2, None), Some(&variant), &pool).await.unwrap();
        assert_eq!(second.subject, "[follow-up] Hi Ada");
        assert_eq!(second.template_id.as_deref(), Some("follow-up"));
        assert_eq!(second.variant_id.as_deref(), Some("v-a"));

        // No template for step 3: the provider writes it, still attributed.
        let third = composer.compose(&ctx(3, None), Some(&variant), &pool).await.unwrap();
        assert_eq!(third.body_text, "Step 3 for ada@acme.test");
        assert_eq!(third.variant_id.as_deref(), Some("v-a"));
        assert_eq!(content.compose_calls(), 1);
        assert_ne!(second.subject, third.subject);
    }

    #[tokio::test]
    async fn template_render() {
        let content = Arc::new(MockContent::new());
        let composer = Composer::new(content.clone());
        let pool = vec![template("generic", None, None, "2026-03-01T00:00:00.000Z")];
        let draft = composer.compose(&ctx(1, None), None, &pool).await.unwrap();
        assert_eq!(draft.subject, "[generic] Hi Ada");
        assert_eq!(draft.template_id.as_deref(), Some("generic"));
        assert_eq!(content.compose_calls(), 0);
    }

    #[tokio::test]
    async fn falls_back_to_content_provider() {
        let content = Arc::new(MockContent::new());
        let composer = Composer::new(content.clone());
        let draft = composer.compose(&ctx(2, None), None, &[]).await.unwrap();
        assert_eq!(draft.body_text, "Step 2 for ada@acme.test");
        assert_eq!(content.compose_calls(), 1);

        content.fail_next(1);
        assert!(composer.compose(&ctx(2, None), None, &[]).await.is_err());
    }
}
