//! Condition-based status shared by stateful entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ConditionStatus,
    pub last_update_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary_status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary_status_message: String,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub transitioning: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Display words per condition type suffix: (transitioning, error, done).
const DISPLAYS: &[(&str, [&str; 3])] = &[
    ("Progressing", ["Progressing", "Progressing", "Progressed"]),
    ("Provisioned", ["Provisioning", "ProvisionFailed", "Provisioned"]),
    ("Initialized", ["Initializing", "InitializeFailed", "Initialized"]),
    ("Scheduled", ["Scheduling", "ScheduleFailed", "Scheduled"]),
    ("Accepted", ["Accepting", "NotAccepted", "Accepted"]),
    ("Deployed", ["Deploying", "DeployFailed", "Deployed"]),
    ("Synced", ["Syncing", "SyncFailed", "Synced"]),
    ("Available", ["Preparing", "Unavailable", "Available"]),
    ("Ready", ["Preparing", "Unready", "Ready"]),
    ("Active", ["Preparing", "Inactive", "Active"]),
];

/// Readable summary of one step: (display, error, transitioning).
fn decide(step: &str, status: ConditionStatus) -> (String, bool, bool) {
    let mut words = [step.to_string(), step.to_string(), step.to_string()];
    for (suffix, replace) in DISPLAYS {
        if let Some(prefix) = step.strip_suffix(suffix) {
            words = (*replace).map(|w| format!("{prefix}{w}"));
        }
    }
    let [transitioning, error, done] = words;
    match status {
        ConditionStatus::Unknown => (transitioning, false, true),
        ConditionStatus::False => (error, true, false),
        ConditionStatus::True => (done, false, false),
    }
}

impl Status {
    pub fn condition(&self, kind: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }

    /// Sets status and message of a condition, adding it when missing.
    /// The update time only moves when something changed.
    pub fn set(&mut self, kind: &str, status: ConditionStatus, message: impl Into<String>) {
        let message = message.into();
        let now = Utc::now();
        match self.conditions.iter_mut().find(|c| c.kind == kind) {
            Some(c) => {
                if c.status != status || c.message != message {
                    c.status = status;
                    c.message = message;
                    c.last_update_time = now;
                }
            }
            None => self.conditions.push(Condition {
                kind: kind.to_string(),
                status,
                last_update_time: now,
                reason: String::new(),
                message,
            }),
        }
    }

    pub fn set_true(&mut self, kind: &str, message: impl Into<String>) {
        self.set(kind, ConditionStatus::True, message)
    }

    pub fn set_false(&mut self, kind: &str, message: impl Into<String>) {
        self.set(kind, ConditionStatus::False, message)
    }

    pub fn set_unknown(&mut self, kind: &str, message: impl Into<String>) {
        self.set(kind, ConditionStatus::Unknown, message)
    }

    pub fn remove(&mut self, kind: &str) {
        self.conditions.retain(|c| c.kind != kind);
    }

    /// Clears all conditions and starts over with `kind` unknown.
    pub fn reset(&mut self, kind: &str, message: impl Into<String>) {
        self.conditions.clear();
        self.set_unknown(kind, message);
    }

    pub fn is_true(&self, kind: &str) -> bool {
        self.condition(kind).map(|c| c.status == ConditionStatus::True).unwrap_or(false)
    }

    pub fn is_false(&self, kind: &str) -> bool {
        self.condition(kind).map(|c| c.status == ConditionStatus::False).unwrap_or(false)
    }

    pub fn is_unknown(&self, kind: &str) -> bool {
        self.condition(kind).map(|c| c.status == ConditionStatus::Unknown).unwrap_or(false)
    }

    /// Walks `steps` in order and stores the summary of the first step that is
    /// failing or in progress, or of the last present step when all are done.
    /// Without any matching condition the last step counts as done.
    pub fn summarize(&mut self, steps: &[&str]) {
        let Some(last) = steps.last() else {
            return;
        };
        let mut summary: Option<(String, bool, bool, String)> = None;
        for step in steps {
            let Some(c) = self.condition(step) else {
                continue;
            };
            let (display, error, transitioning) = decide(step, c.status);
            summary = Some((display, error, transitioning, c.message.clone()));
            if error || transitioning {
                break;
            }
        }
        let (display, error, transitioning, message) = summary.unwrap_or_else(|| {
            let (display, error, transitioning) = decide(last, ConditionStatus::True);
            (display, error, transitioning, String::new())
        });
        self.summary_status = display;
        self.error = error;
        self.transitioning = transitioning;
        self.summary_status_message = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEPS: &[&str] = &["Deployed", "Ready"];

    #[test]
    fn summary_stops_at_first_unfinished_step() {
        let mut st = Status::default();
        st.set_true("Deployed", "");
        st.set_unknown("Ready", "waiting for pods");
        st.summarize(STEPS);
        assert_eq!(st.summary_status, "Preparing");
        assert!(st.transitioning);
        assert!(!st.error);
        assert_eq!(st.summary_status_message, "waiting for pods");
    }

    #[test]
    fn failed_step_is_an_error() {
        let mut st = Status::default();
        st.set_false("Deployed", "apply failed");
        st.set_true("Ready", "");
        st.summarize(STEPS);
        assert_eq!(st.summary_status, "DeployFailed");
        assert!(st.error);
    }

    #[test]
    fn all_done_reports_last_step() {
        let mut st = Status::default();
        st.set_true("Deployed", "");
        st.set_true("Ready", "");
        st.summarize(STEPS);
        assert_eq!(st.summary_status, "Ready");
        assert!(!st.error && !st.transitioning);

        let mut empty = Status::default();
        empty.summarize(STEPS);
        assert_eq!(empty.summary_status, "Ready");
    }

    #[test]
    fn set_only_touches_changed_conditions() {
        let mut st = Status::default();
        st.set_true("Ready", "ok");
        let first = st.conditions[0].last_update_time;
        st.set_true("Ready", "ok");
        assert_eq!(st.conditions[0].last_update_time, first);
        assert_eq!(st.conditions.len(), 1);

        st.reset("Deployed", "");
        assert!(st.is_unknown("Deployed"));
        assert!(st.condition("Ready").is_none());
        st.remove("Deployed");
        assert!(st.conditions.is_empty());
    }
}
