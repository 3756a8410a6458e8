use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// The type tag of an [`Event`].
///
/// Known kinds serialize to their snake_case name; anything else round-trips
/// through [`EventKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Something went wrong while handling a task.
    Error,
    /// A task finished successfully.
    TaskCompletion,
    /// An order changed status.
    OrderStatus,
    /// Equipment broke or became unavailable.
    EquipmentIssue,
    /// A safety hazard was observed.
    SafetyConcern,
    /// A task was handed to another agent.
    TaskAssignment,
    /// A task moved from one owner to another.
    TaskReassignment,
    /// A decision returned by the LLM backend.
    Decision,
    /// A non-blocking quality finding.
    QualityWarning,
    /// Additional staff was requested for a station.
    StaffRequest,
    /// A staff request was escalated or answered.
    StaffRequestFollowup,
    /// A member left a station.
    StaffRelease,
    /// Periodic station assessment.
    StationStatus,
    /// A delayed order was escalated.
    OrderEscalation,
    /// A message between agents.
    Communication,
    /// A crisis was injected into the scenario.
    Crisis,
    /// Any other kind.
    Other(String),
}

impl EventKind {
    /// The wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Error => "error",
            Self::TaskCompletion => "task_completion",
            Self::OrderStatus => "order_status",
            Self::EquipmentIssue => "equipment_issue",
            Self::SafetyConcern => "safety_concern",
            Self::TaskAssignment => "task_assignment",
            Self::TaskReassignment => "task_reassignment",
            Self::Decision => "decision",
            Self::QualityWarning => "quality_warning",
            Self::StaffRequest => "staff_request",
            Self::StaffRequestFollowup => "staff_request_followup",
            Self::StaffRelease => "staff_release",
            Self::StationStatus => "station_status",
            Self::OrderEscalation => "order_escalation",
            Self::Communication => "communication",
            Self::Crisis => "crisis",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "error" => Self::Error,
            "task_completion" => Self::TaskCompletion,
            "order_status" => Self::OrderStatus,
            "equipment_issue" => Self::EquipmentIssue,
            "safety_concern" => Self::SafetyConcern,
            "task_assignment" => Self::TaskAssignment,
            "task_reassignment" => Self::TaskReassignment,
            "decision" => Self::Decision,
            "quality_warning" => Self::QualityWarning,
            "staff_request" => Self::StaffRequest,
            "staff_request_followup" => Self::StaffRequestFollowup,
            "staff_release" => Self::StaffRelease,
            "station_status" => Self::StationStatus,
            "order_escalation" => Self::OrderEscalation,
            "communication" => Self::Communication,
            "crisis" => Self::Crisis,
            _ => Self::Other(value),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something an agent observed or did. Immutable once appended to memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event.
    pub id: Uuid,
    /// Scenario time at which the event happened.
    pub timestamp: DateTime<Utc>,
    /// Type tag.
    pub kind: EventKind,
    /// Free-text description; this is what gets embedded.
    pub content: String,
    /// Arbitrary key-value metadata (`priority`, `important`, `task_type`, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Creates a new event stamped with the given scenario time.
    pub fn new(kind: EventKind, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            kind,
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Builder: attach one metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Reads a string metadata entry.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Reads the numeric `priority` metadata entry, if present.
    pub fn priority(&self) -> Option<i64> {
        self.metadata.get("priority").and_then(serde_json::Value::as_i64)
    }

    /// Whether the `important` metadata flag is set to `true`.
    pub fn is_flagged_important(&self) -> bool {
        self.metadata
            .get("important")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names_roundtrip() {
        for kind in [
            EventKind::Error,
            EventKind::TaskCompletion,
            EventKind::StaffRequestFollowup,
            EventKind::Other("inspection".into()),
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            let back: EventKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
        assert_eq!(
            serde_json::to_string(&EventKind::OrderStatus).unwrap(),
            "\"order_status\""
        );
    }

    #[test]
    fn test_metadata_accessors() {
        let event = Event::new(EventKind::Decision, "fire table 4", Utc::now())
            .with_meta("priority", 9)
            .with_meta("important", true)
            .with_meta("task_type", "order_assignment");
        assert_eq!(event.priority(), Some(9));
        assert!(event.is_flagged_important());
        assert_eq!(event.meta_str("task_type"), Some("order_assignment"));
    }

    #[test]
    fn test_missing_metadata_defaults() {
        let event = Event::new(EventKind::Communication, "hello", Utc::now());
        assert_eq!(event.priority(), None);
        assert!(!event.is_flagged_important());
    }
}
