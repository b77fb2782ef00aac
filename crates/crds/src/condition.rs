//! Status conditions
//!
//! An ordered list of typed conditions carried in a resource status.
//! Updates happen in place: reason and message are always overwritten, while
//! `lastTransitionTime` only moves when the status value actually changes.
//! Re-applying an unchanged condition therefore produces no diff.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tri-state condition status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    /// Condition holds
    True,

    /// Condition does not hold
    False,

    /// Not evaluated yet
    #[default]
    Unknown,
}

/// A single named status condition
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, unique within a list (e.g. "Overlap")
    #[serde(rename = "type")]
    pub type_: String,

    /// Current status of the condition
    pub status: ConditionStatus,

    /// Machine readable reason for the last transition
    #[serde(default)]
    pub reason: String,

    /// Human readable detail
    #[serde(default)]
    pub message: String,

    /// When the status last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// Build a condition without a transition time; `set_condition` fills it in.
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: None,
        }
    }
}

/// Set `new_condition` in `conditions`.
///
/// Returns `true` when the list changed in any observable way.
pub fn set_condition(conditions: &mut Vec<Condition>, new_condition: Condition) -> bool {
    let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.type_ == new_condition.type_)
    else {
        let mut new_condition = new_condition;
        if new_condition.last_transition_time.is_none() {
            new_condition.last_transition_time = Some(Utc::now());
        }
        conditions.push(new_condition);
        return true;
    };

    let mut changed = false;
    if existing.status != new_condition.status {
        existing.status = new_condition.status;
        existing.last_transition_time = Some(new_condition.last_transition_time.unwrap_or_else(Utc::now));
        changed = true;
    }
    if existing.reason != new_condition.reason {
        existing.reason = new_condition.reason;
        changed = true;
    }
    if existing.message != new_condition.message {
        existing.message = new_condition.message;
        changed = true;
    }
    changed
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Remove a condition by type, keeping the order of the rest.
///
/// Returns `true` if a condition was removed.
pub fn remove_condition(conditions: &mut Vec<Condition>, type_: &str) -> bool {
    let before = conditions.len();
    conditions.retain(|c| c.type_ != type_);
    conditions.len() != before
}

/// True when the condition is present with status `True`
pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_).is_some_and(|c| c.status == ConditionStatus::True)
}

/// True when the condition is present with status `False`
pub fn is_condition_false(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_).is_some_and(|c| c.status == ConditionStatus::False)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn test_set_appends_with_transition_time() {
        let mut conditions = Vec::new();
        let changed = set_condition(
            &mut conditions,
            Condition::new("Overlap", ConditionStatus::Unknown, "NotChecked", ""),
        );

        assert!(changed);
        assert_eq!(conditions.len(), 1);
        assert!(conditions[0].last_transition_time.is_some());
    }

    #[test]
    fn test_set_same_status_keeps_transition_time() {
        let mut original = Condition::new("Overlap", ConditionStatus::True, "NoOverlap", "");
        original.last_transition_time = Some(at(100));
        let mut conditions = vec![original];

        let changed = set_condition(
            &mut conditions,
            Condition::new("Overlap", ConditionStatus::True, "NoOverlap", ""),
        );

        assert!(!changed);
        assert_eq!(conditions[0].last_transition_time, Some(at(100)));
    }

    #[test]
    fn test_set_same_status_overwrites_reason_and_message() {
        let mut original = Condition::new("Overlap", ConditionStatus::False, "Overlap", "old");
        original.last_transition_time = Some(at(100));
        let mut conditions = vec![original];

        let changed = set_condition(
            &mut conditions,
            Condition::new("Overlap", ConditionStatus::False, "Overlap", "new"),
        );

        assert!(changed);
        assert_eq!(conditions[0].message, "new");
        assert_eq!(conditions[0].last_transition_time, Some(at(100)));
    }

    #[test]
    fn test_set_status_change_moves_transition_time() {
        let mut original = Condition::new("Overlap", ConditionStatus::Unknown, "NotChecked", "");
        original.last_transition_time = Some(at(100));
        let mut conditions = vec![original];

        let mut update = Condition::new("Overlap", ConditionStatus::True, "NoOverlap", "");
        update.last_transition_time = Some(at(200));
        assert!(set_condition(&mut conditions, update));

        assert_eq!(conditions[0].status, ConditionStatus::True);
        assert_eq!(conditions[0].reason, "NoOverlap");
        assert_eq!(conditions[0].last_transition_time, Some(at(200)));
    }

    #[test]
    fn test_set_does_not_reorder() {
        let mut conditions = vec![
            Condition::new("A", ConditionStatus::True, "", ""),
            Condition::new("B", ConditionStatus::True, "", ""),
            Condition::new("C", ConditionStatus::True, "", ""),
        ];

        set_condition(&mut conditions, Condition::new("B", ConditionStatus::False, "", ""));

        let types: Vec<_> = conditions.iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(types, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_remove_and_queries() {
        let mut conditions = vec![
            Condition::new("A", ConditionStatus::True, "", ""),
            Condition::new("B", ConditionStatus::False, "", ""),
            Condition::new("C", ConditionStatus::Unknown, "", ""),
        ];

        assert!(is_condition_true(&conditions, "A"));
        assert!(is_condition_false(&conditions, "B"));
        assert!(!is_condition_true(&conditions, "C"));
        assert!(!is_condition_false(&conditions, "C"));
        assert!(!is_condition_true(&conditions, "missing"));

        assert!(remove_condition(&mut conditions, "B"));
        assert!(!remove_condition(&mut conditions, "B"));
        assert!(find_condition(&conditions, "B").is_none());
        let types: Vec<_> = conditions.iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(types, vec!["A", "C"]);
    }
}
