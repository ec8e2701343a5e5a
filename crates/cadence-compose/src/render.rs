// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `{{placeholder}}` rendering for subject and body templates.

use std::collections::HashMap;
use std::sync::LazyLock;

use cadence_core::types::ComposeContext;
use regex::{Captures, Regex};
use tracing::debug;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").unwrap());

/// Values available to templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: HashMap<&'static str, String>,
}

impl TemplateVars {
    /// Build the variable set for one step.
    ///
    /// Missing lead fields render as empty strings, except `first_name` which
    /// falls back to `there` so greetings stay readable.
    pub fn from_context(ctx: &ComposeContext) -> Self {
        let lead = &ctx.lead;
        let first = lead.first_name.clone().unwrap_or_default();
        let last = lead.last_name.clone().unwrap_or_default();
        let full = format!("{first} {last}").trim().to_string();

        let mut values = HashMap::new();
        values.insert(
            "first_name",
            if first.is_empty() { "there".to_string() } else { first },
        );
        values.insert("last_name", last);
        values.insert("full_name", full);
        values.insert("company", lead.company.clone().unwrap_or_default());
        values.insert("title", lead.title.clone().unwrap_or_default());
        values.insert("email", lead.email.clone());
        values.insert("value_prop", ctx.value_prop.clone().unwrap_or_default());
        values.insert("campaign", ctx.campaign_name.clone());
        values.insert("step", ctx.step_number.to_string());
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Replace every `{{name}}` with its value. Unknown names render empty.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            match vars.get(name) {
                Some(value) => value.to_string(),
                None => {
                    debug!(placeholder = name, "unknown template placeholder");
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Plain text to minimal HTML: escaped, blank lines split paragraphs,
/// single newlines become `<br>`.
pub fn text_to_html(text: &str) -> String {
    text.trim()
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p.trim()).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use cadence_core::types::Lead;

    use super::*;

    fn ctx(first_name: Option<&str>) -> ComposeContext {
        ComposeContext {
            campaign_name: "Spring".into(),
            step_number: 2,
            total_steps: 3,
            lead: Lead {
                id: "l-1".into(),
                tenant_id: "t-1".into(),
                email: "ada@acme.test".into(),
                first_name: first_name.map(str::to_string),
                last_name: Some("Lovelace".into()),
                company: Some("Acme".into()),
                title: None,
                timezone: None,
                segment: None,
                created_at: "2026-03-01T00:00:00.000Z".into(),
            },
            value_prop: Some("faster onboarding".into()),
            enrichment: None,
        }
    }

    #[test]
    fn renders_known_placeholders() {
        let vars = TemplateVars::from_context(&ctx(Some("Ada")));
        let out = render("Hi {{first_name}}, {{ company }} and {{value_prop}} (step {{step}})", &vars);
        assert_eq!(out, "Hi Ada, Acme and faster onboarding (step 2)");
    }

    #[test]
    fn unknown_and_missing_values() {
        let vars = TemplateVars::from_context(&ctx(None));
        assert_eq!(render("Hi {{first_name}}{{nope}}!", &vars), "Hi there!");
        assert_eq!(render("{{title}}|{{full_name}}", &vars), "|Lovelace");
        assert_eq!(render("no placeholders", &vars), "no placeholders");
    }

    #[test]
    fn html_is_escaped_and_paragraphed() {
        let html = text_to_html("Hi <b>Ada</b>,\nquick one.\n\nThanks & bye");
        assert_eq!(
            html,
            "<p>Hi &lt;b&gt;Ada&lt;/b&gt;,<br>quick one.</p>\n<p>Thanks &amp; bye</p>"
        );
    }
}
