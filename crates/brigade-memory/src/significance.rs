use brigade_core::{Event, EventKind};
use serde::{Deserialize, Serialize};

fn default_kinds() -> Vec<EventKind> {
    vec![
        EventKind::Error,
        EventKind::TaskCompletion,
        EventKind::OrderStatus,
        EventKind::EquipmentIssue,
        EventKind::SafetyConcern,
    ]
}

fn default_priority_threshold() -> i64 {
    8
}

fn default_keywords() -> Vec<String> {
    [
        "urgent",
        "critical",
        "emergency",
        "failure",
        "success",
        "completed",
        "error",
        "warning",
        "alert",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Rules deciding which events are promoted to long-term memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificancePolicy {
    /// Event kinds that are always significant.
    #[serde(default = "default_kinds")]
    pub kinds: Vec<EventKind>,
    /// Metadata `priority` at or above this value is significant.
    #[serde(default = "default_priority_threshold")]
    pub priority_threshold: i64,
    /// Case-insensitive substrings of the content that make it significant.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for SignificancePolicy {
    fn default() -> Self {
        Self {
            kinds: default_kinds(),
            priority_threshold: default_priority_threshold(),
            keywords: default_keywords(),
        }
    }
}

impl SignificancePolicy {
    /// Whether the event should be promoted.
    pub fn is_significant(&self, event: &Event) -> bool {
        if self.kinds.contains(&event.kind) {
            return true;
        }
        if event
            .priority()
            .is_some_and(|p| p >= self.priority_threshold)
        {
            return true;
        }
        if event.is_flagged_important() {
            return true;
        }
        let content = event.content.to_lowercase();
        self.keywords
            .iter()
            .any(|k| content.contains(&k.to_lowercase()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(kind: EventKind, content: &str) -> Event {
        Event::new(kind, content, Utc::now())
    }

    #[test]
    fn test_significant_kinds() {
        let policy = SignificancePolicy::default();
        assert!(policy.is_significant(&event(EventKind::Error, "x")));
        assert!(policy.is_significant(&event(EventKind::SafetyConcern, "x")));
        assert!(!policy.is_significant(&event(EventKind::Communication, "ok")));
    }

    #[test]
    fn test_priority_threshold_is_inclusive() {
        let policy = SignificancePolicy::default();
        let low = event(EventKind::Decision, "fire it").with_meta("priority", 7);
        let high = event(EventKind::Decision, "fire it").with_meta("priority", 8);
        assert!(!policy.is_significant(&low));
        assert!(policy.is_significant(&high));
    }

    #[test]
    fn test_important_flag() {
        let policy = SignificancePolicy::default();
        let e = event(EventKind::Decision, "note").with_meta("important", true);
        assert!(policy.is_significant(&e));
        let e = event(EventKind::Decision, "note").with_meta("important", false);
        assert!(!policy.is_significant(&e));
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let policy = SignificancePolicy::default();
        assert!(policy.is_significant(&event(EventKind::Decision, "URGENT refire")));
        assert!(policy.is_significant(&event(EventKind::Decision, "step completed")));
        assert!(!policy.is_significant(&event(EventKind::Decision, "plate table 3")));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let policy: SignificancePolicy =
            serde_json::from_str(r#"{"priority_threshold": 5}"#).unwrap();
        assert_eq!(policy.priority_threshold, 5);
        assert_eq!(policy.kinds.len(), 5);
        assert_eq!(policy.keywords.len(), 9);
    }
}
