// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed per-campaign settings (send window, sequence timing, value props).
//!
//! Settings are stored as one JSON column. Reading is tolerant: anything that
//! fails to parse falls back to the documented defaults (09:00-17:00,
//! Monday-Friday, UTC, 3 days between steps). [`CampaignSettings::validate`]
//! is strict and runs when a campaign is activated.

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_START: &str = "09:00";
const DEFAULT_END: &str = "17:00";
const DEFAULT_STEP_DELAY_DAYS: u32 = 3;

/// All per-campaign settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSettings {
    #[serde(default)]
    pub send_window: SendWindow,
    #[serde(default)]
    pub sequence: SequenceSettings,
    /// A/B value propositions; the enrichment step picks one per lead.
    #[serde(default)]
    pub value_props: Vec<String>,
}

impl CampaignSettings {
    /// Parse the stored JSON, falling back to defaults on malformed input.
    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "malformed campaign settings, using defaults");
                Self::default()
            }
        }
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> String {
        // Plain strings, integers and vectors only; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Strict validation used at campaign activation. Collects every problem.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = self.send_window.validate();
        if self.sequence.step_delays_days.contains(&0) {
            errors.push("sequence.step_delays_days must be at least 1 day".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Raw send-window configuration as entered by the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendWindow {
    /// Time of day, `HH:MM` or `HH:MM:SS`.
    #[serde(default = "default_start")]
    pub start_time: String,
    #[serde(default = "default_end")]
    pub end_time: String,
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Allowed weekdays (`mon`, `tuesday`, ...).
    #[serde(default = "default_weekdays")]
    pub weekdays: Vec<String>,
}

impl Default for SendWindow {
    fn default() -> Self {
        Self {
            start_time: default_start(),
            end_time: default_end(),
            timezone: default_timezone(),
            weekdays: default_weekdays(),
        }
    }
}

fn default_start() -> String {
    DEFAULT_START.to_string()
}

fn default_end() -> String {
    DEFAULT_END.to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_weekdays() -> Vec<String> {
    ["mon", "tue", "wed", "thu", "fri"]
        .iter()
        .map(|d| d.to_string())
        .collect()
}

/// A send window with parsed times and weekdays.
///
/// The timezone stays a string: resolving it is the evaluator's job, and a
/// failure there fails open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    /// Minute of day, inclusive.
    pub start_minute: u32,
    /// Minute of day, inclusive.
    pub end_minute: u32,
    pub timezone: String,
    pub weekdays: Vec<Weekday>,
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

impl SendWindow {
    /// Resolve into typed values, replacing invalid parts with defaults.
    pub fn resolve(&self) -> ResolvedWindow {
        let (start_minute, end_minute) =
            match (parse_time(&self.start_time), parse_time(&self.end_time)) {
                (Some(start), Some(end)) if start <= end => {
                    (minute_of_day(start), minute_of_day(end))
                }
                _ => {
                    warn!(
                        start = %self.start_time,
                        end = %self.end_time,
                        "invalid send window times, using 09:00-17:00"
                    );
                    (9 * 60, 17 * 60)
                }
            };

        let parsed: Option<Vec<Weekday>> = self
            .weekdays
            .iter()
            .map(|d| d.trim().parse::<Weekday>().ok())
            .collect();
        let weekdays = match parsed {
            Some(days) if !days.is_empty() => days,
            _ => {
                warn!(weekdays = ?self.weekdays, "invalid send window weekdays, using Mon-Fri");
                vec![
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                ]
            }
        };

        ResolvedWindow {
            start_minute,
            end_minute,
            timezone: self.timezone.trim().to_string(),
            weekdays,
        }
    }

    /// Strict validation; returns one message per problem.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let start = parse_time(&self.start_time);
        let end = parse_time(&self.end_time);
        if start.is_none() {
            errors.push(format!(
                "send_window.start_time `{}` is not a valid time of day",
                self.start_time
            ));
        }
        if end.is_none() {
            errors.push(format!(
                "send_window.end_time `{}` is not a valid time of day",
                self.end_time
            ));
        }
        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            errors.push(format!(
                "send_window.start_time {} is after end_time {}",
                self.start_time, self.end_time
            ));
        }
        if self.weekdays.is_empty() {
            errors.push("send_window.weekdays must not be empty".to_string());
        }
        for day in &self.weekdays {
            if day.trim().parse::<Weekday>().is_err() {
                errors.push(format!("send_window.weekdays contains unknown day `{day}`"));
            }
        }
        if self.timezone.trim().parse::<chrono_tz::Tz>().is_err() {
            errors.push(format!(
                "send_window.timezone `{}` is not a known IANA timezone",
                self.timezone
            ));
        }
        errors
    }
}

/// Timing between sequence steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSettings {
    /// Days to wait after step N before step N+1. The last entry repeats.
    #[serde(default = "default_step_delays")]
    pub step_delays_days: Vec<u32>,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            step_delays_days: default_step_delays(),
        }
    }
}

fn default_step_delays() -> Vec<u32> {
    vec![DEFAULT_STEP_DELAY_DAYS]
}

impl SequenceSettings {
    /// Days to wait after sending `sent_step` before the following step.
    pub fn delay_after_step(&self, sent_step: u32) -> u32 {
        let index = sent_step.saturating_sub(1) as usize;
        self.step_delays_days
            .get(index)
            .or_else(|| self.step_delays_days.last())
            .copied()
            .unwrap_or(DEFAULT_STEP_DELAY_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_to_business_hours() {
        let resolved = SendWindow::default().resolve();
        assert_eq!(resolved.start_minute, 540);
        assert_eq!(resolved.end_minute, 1020);
        assert_eq!(resolved.weekdays.len(), 5);
        assert_eq!(resolved.timezone, "UTC");
    }

    #[test]
    fn malformed_times_fall_back_to_defaults() {
        let window = SendWindow {
            start_time: "nine".into(),
            end_time: "17:00".into(),
            ..SendWindow::default()
        };
        let resolved = window.resolve();
        assert_eq!((resolved.start_minute, resolved.end_minute), (540, 1020));
        assert!(!window.validate().is_empty());
    }

    #[test]
    fn inverted_window_is_invalid() {
        let window = SendWindow {
            start_time: "18:00".into(),
            end_time: "08:00".into(),
            ..SendWindow::default()
        };
        assert!(window.validate().iter().any(|e| e.contains("after end_time")));
        assert_eq!(window.resolve().start_minute, 540);
    }

    #[test]
    fn unknown_timezone_fails_validation_only() {
        let window = SendWindow {
            timezone: "Mars/Olympus".into(),
            ..SendWindow::default()
        };
        assert_eq!(window.validate().len(), 1);
        assert_eq!(window.resolve().timezone, "Mars/Olympus");
    }

    #[test]
    fn settings_json_is_tolerant() {
        let settings = CampaignSettings::from_json("{not json");
        assert_eq!(settings, CampaignSettings::default());

        let settings = CampaignSettings::from_json(
            r#"{"send_window":{"start_time":"08:30","weekdays":["sat","sun"]},"value_props":["speed"]}"#,
        );
        assert_eq!(settings.send_window.start_time, "08:30");
        assert_eq!(settings.send_window.end_time, "17:00");
        assert_eq!(settings.value_props, vec!["speed"]);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn step_delays_repeat_last_entry() {
        let seq = SequenceSettings {
            step_delays_days: vec![2, 5],
        };
        assert_eq!(seq.delay_after_step(1), 2);
        assert_eq!(seq.delay_after_step(2), 5);
        assert_eq!(seq.delay_after_step(7), 5);
        let empty = SequenceSettings {
            step_delays_days: vec![],
        };
        assert_eq!(empty.delay_after_step(1), 3);
    }
}
