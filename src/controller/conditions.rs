//! Condition management helpers following Kubernetes API conventions

use crate::crd::Condition;

/// Insert `condition`, replacing any existing condition of the same type.
///
/// The transition time of an existing condition is kept when its status does
/// not change.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            let transition_time = if existing.status == condition.status {
                existing.last_transition_time.clone()
            } else {
                condition.last_transition_time.clone()
            };
            *existing = Condition {
                last_transition_time: transition_time,
                ..condition
            };
        }
        None => conditions.push(condition),
    }
}

pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_)
        .map(Condition::is_true)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CONDITION_READY;

    #[test]
    fn test_set_condition_adds_and_replaces() {
        let mut conditions = vec![];
        set_condition(&mut conditions, Condition::ready(false, "Error", "first"));
        assert_eq!(conditions.len(), 1);

        set_condition(&mut conditions, Condition::ready(true, "Reconciled", "second"));
        assert_eq!(conditions.len(), 1);
        assert!(is_condition_true(&conditions, CONDITION_READY));
        assert_eq!(conditions[0].message, "second");
    }

    #[test]
    fn test_transition_time_kept_when_status_unchanged() {
        let mut original = Condition::ready(true, "Reconciled", "a");
        original.last_transition_time = "2024-01-01T00:00:00+00:00".to_string();
        let mut conditions = vec![original];

        set_condition(&mut conditions, Condition::ready(true, "Reconciled", "b"));
        assert_eq!(conditions[0].last_transition_time, "2024-01-01T00:00:00+00:00");

        set_condition(&mut conditions, Condition::ready(false, "Error", "c"));
        assert_ne!(conditions[0].last_transition_time, "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_missing_condition_is_not_true() {
        assert!(!is_condition_true(&[], CONDITION_READY));
        assert!(find_condition(&[], CONDITION_READY).is_none());
    }
}
