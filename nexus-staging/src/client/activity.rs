//! Decoding of the staging activity log.
//!
//! The server records every action on a staging repository as an activity
//! with a list of events. Closing runs the validation rules, and their
//! outcome is only visible here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::core::Stage;
use crate::errors::StageError;
use crate::xml::XmlDocument;

/// Event recorded when a close succeeds.
pub const REPOSITORY_CLOSED: &str = "repositoryClosed";
/// Event recorded when a close fails.
pub const REPOSITORY_CLOSE_FAILED: &str = "repositoryCloseFailed";
/// Event recorded for each validation rule that failed.
pub const RULE_FAILED: &str = "ruleFailed";

/// One activity (e.g. `open`, `close`, `release`) on a staging repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageActivity {
    /// Activity name.
    pub name: String,
    /// When the activity started.
    pub started: Option<DateTime<Utc>>,
    /// When the activity finished.
    pub stopped: Option<DateTime<Utc>>,
    /// Events in the order they were recorded.
    pub events: Vec<ActivityEvent>,
}

impl StageActivity {
    /// Returns the first event called `name`.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&ActivityEvent> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Returns every event called `name`.
    pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ActivityEvent> + 'a {
        self.events.iter().filter(move |e| e.name == name)
    }
}

/// A single event within an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEvent {
    /// Event name.
    pub name: String,
    /// When the event was recorded.
    pub timestamp: Option<DateTime<Utc>>,
    /// Event properties in document order.
    pub properties: Vec<(String, String)>,
}

impl ActivityEvent {
    /// Returns the value of the first property called `name`.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parses an activity log document.
pub fn parse_activity(doc: &XmlDocument<'_>) -> Result<Vec<StageActivity>, StageError> {
    let mut activities = Vec::new();
    for activity in doc.select("/list/stagingActivity")? {
        let mut events = Vec::new();
        for event in doc.select_from(activity, "events/stagingActivityEvent")? {
            let mut properties = Vec::new();
            for property in doc.select_from(event, "properties/stagingProperty")? {
                let name = doc.required_text_from(property, "name")?;
                let value = doc.text_from(property, "value")?.unwrap_or_default();
                properties.push((name, value));
            }
            events.push(ActivityEvent {
                name: doc.required_text_from(event, "name")?,
                timestamp: parse_timestamp(doc.text_from(event, "timestamp")?),
                properties,
            });
        }
        activities.push(StageActivity {
            name: doc.required_text_from(activity, "name")?,
            started: parse_timestamp(doc.text_from(activity, "started")?),
            stopped: parse_timestamp(doc.text_from(activity, "stopped")?),
            events,
        });
    }
    Ok(activities)
}

/// Timestamps are informational; one the server formats unexpectedly is dropped.
fn parse_timestamp(text: Option<String>) -> Option<DateTime<Utc>> {
    let text = text?;
    DateTime::parse_from_rfc3339(&text)
        .or_else(|_| DateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| debug!(timestamp = %text, error = %e, "Ignoring unparseable timestamp"))
        .ok()
}

/// Outcome of the most recent close, as recorded in the activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The repository was closed.
    Closed,
    /// Closing failed.
    Failed(CloseFailure),
    /// The close activity records neither success nor failure, or is absent.
    Unrecorded,
}

/// Why a close failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    /// The `cause` property of the failure event.
    pub cause: Option<String>,
    /// The `failureMessage` of every failed rule, in order.
    pub failed_rules: Vec<String>,
}

impl CloseFailure {
    /// Renders the failure as a multi-line message.
    #[must_use]
    pub fn message(&self, stage: &Stage) -> String {
        let mut message = format!("Closing stage {} failed.", stage.stage_id());
        for line in self.cause.iter().chain(&self.failed_rules) {
            message.push_str("\n\t");
            message.push_str(line);
        }
        message
    }
}

/// Decodes the outcome of the last `close` activity.
#[must_use]
pub fn close_outcome(activities: &[StageActivity]) -> CloseOutcome {
    let Some(close) = activities.iter().rev().find(|a| a.name == "close") else {
        return CloseOutcome::Unrecorded;
    };

    if close.event(REPOSITORY_CLOSED).is_some() {
        return CloseOutcome::Closed;
    }

    match close.event(REPOSITORY_CLOSE_FAILED) {
        Some(failed) => CloseOutcome::Failed(CloseFailure {
            cause: failed.property("cause").map(str::to_string),
            failed_rules: close
                .events_named(RULE_FAILED)
                .filter_map(|e| e.property("failureMessage"))
                .map(str::to_string)
                .collect(),
        }),
        None => CloseOutcome::Unrecorded,
    }
}
