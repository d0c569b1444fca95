//! Snapshot membership predicates for the iteration filter.

use tickethistory_core::{FieldValue, TicketInfo};

/// Keeps snapshots whose milestone is `name` at snapshot time.
pub fn in_milestone(name: impl Into<String>) -> impl Fn(&TicketInfo) -> bool + Send + Sync + 'static {
    let name = name.into();
    move |info| info.milestone.as_deref() == Some(name.as_str())
}

/// Keeps snapshots whose milestone is any of `names`.
pub fn in_any_milestone<I, S>(names: I) -> impl Fn(&TicketInfo) -> bool + Send + Sync + 'static
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    move |info| {
        info.milestone
            .as_deref()
            .is_some_and(|m| names.iter().any(|n| n == m))
    }
}

/// Keeps snapshots where `field` equals `value` at snapshot time.
pub fn field_equals(
    field: impl Into<String>,
    value: impl Into<FieldValue>,
) -> impl Fn(&TicketInfo) -> bool + Send + Sync + 'static {
    let field = field.into();
    let value = value.into();
    move |info| info.value(&field).as_ref() == Some(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tickethistory_core::Ticket;

    fn snapshot(milestone: &str, team: &str) -> TicketInfo {
        let time = Utc.with_ymd_and_hms(2017, 3, 6, 9, 0, 0).unwrap();
        let mut state = BTreeMap::new();
        state.insert("milestone".to_string(), FieldValue::text(milestone));
        state.insert("team".to_string(), FieldValue::text(team));
        TicketInfo::from_state(Arc::new(Ticket::new(1u64, time)), time, state)
    }

    #[test]
    fn test_in_milestone() {
        let keep = in_milestone("sprint-1");
        assert!(keep(&snapshot("sprint-1", "red")));
        assert!(!keep(&snapshot("sprint-2", "red")));

        let any = in_any_milestone(["sprint-1", "sprint-2"]);
        assert!(any(&snapshot("sprint-2", "red")));
        assert!(!any(&snapshot("backlog", "red")));
    }

    #[test]
    fn test_field_equals() {
        let keep = field_equals("team", "red");
        assert!(keep(&snapshot("sprint-1", "red")));
        assert!(!keep(&snapshot("sprint-1", "blue")));
        assert!(!field_equals("missing", "red")(&snapshot("sprint-1", "red")));
    }
}
