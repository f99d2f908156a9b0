//! Diff generation for audit logging
//!
//! Produces a one-line summary of the top-level fields an update changed.
//! Bookkeeping timestamps are left out: every commit refreshes `modified_at`,
//! so listing it would only add noise.

use serde_json::{Map, Value};

const BOOKKEEPING_FIELDS: [&str; 2] = ["created_at", "modified_at"];

const MAX_STRING_CHARS: usize = 47;

/// Summarize the field changes between two serialized entities
///
/// Returns `None` when nothing but bookkeeping changed.
pub fn generate_diff(before: &Value, after: &Value) -> Option<String> {
    let (before_obj, after_obj) = match (before, after) {
        (Value::Object(b), Value::Object(a)) => (b, a),
        _ if before == after => return None,
        _ => return Some(format!("{} -> {}", format_value(before), format_value(after))),
    };

    let changes: Vec<String> = changed_keys(before_obj, after_obj)
        .into_iter()
        .map(|key| {
            let old = before_obj.get(key).map_or_else(|| "(none)".into(), format_value);
            let new = after_obj.get(key).map_or_else(|| "(none)".into(), format_value);
            format!("{}: {} -> {}", key, old, new)
        })
        .collect();

    if changes.is_empty() {
        None
    } else {
        Some(changes.join(", "))
    }
}

/// Keys whose value differs, in before-then-added order
fn changed_keys<'a>(before: &'a Map<String, Value>, after: &'a Map<String, Value>) -> Vec<&'a str> {
    let removed_or_changed = before
        .iter()
        .filter(|(key, value)| after.get(key.as_str()) != Some(*value))
        .map(|(key, _)| key.as_str());

    let added = after
        .keys()
        .filter(|key| !before.contains_key(key.as_str()))
        .map(String::as_str);

    removed_or_changed
        .chain(added)
        .filter(|key| !BOOKKEEPING_FIELDS.contains(key))
        .collect()
}

/// Format a JSON value for human-readable display
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) if s.chars().count() > MAX_STRING_CHARS + 3 => {
            let head: String = s.chars().take(MAX_STRING_CHARS).collect();
            format!("\"{}...\"", head)
        }
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_field_change() {
        let before = json!({"description": "Grocery", "notes": ""});
        let after = json!({"description": "Groceries", "notes": ""});

        let diff = generate_diff(&before, &after).unwrap();
        assert_eq!(diff, "description: \"Grocery\" -> \"Groceries\"");
    }

    #[test]
    fn test_lifecycle_stamps() {
        let before = json!({"name": "Savings", "modified_at": "2025-01-01T00:00:00Z"});
        let after = json!({
            "name": "Savings",
            "modified_at": "2025-01-02T00:00:00Z",
            "hidden_at": "2025-01-02T00:00:00Z"
        });

        let diff = generate_diff(&before, &after).unwrap();
        assert!(diff.starts_with("hidden_at: (none) -> "));
        assert!(!diff.contains("modified_at"));
    }

    #[test]
    fn test_only_bookkeeping_changed() {
        let before = json!({"name": "Savings", "modified_at": "2025-01-01T00:00:00Z"});
        let after = json!({"name": "Savings", "modified_at": "2025-01-02T00:00:00Z"});

        assert!(generate_diff(&before, &after).is_none());
    }

    #[test]
    fn test_removed_field() {
        let before = json!({"envelope_id": "abc", "amount": -500});
        let after = json!({"amount": -500});

        let diff = generate_diff(&before, &after).unwrap();
        assert_eq!(diff, "envelope_id: \"abc\" -> (none)");
    }

    #[test]
    fn test_long_string_truncation() {
        let before = json!({"notes": "é".repeat(100)});
        let after = json!({"notes": "short"});

        let diff = generate_diff(&before, &after).unwrap();
        assert!(diff.contains("...\""));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!(null)), "null");
        assert_eq!(format_value(&json!(42)), "42");
        assert_eq!(format_value(&json!([1, 2, 3])), "[3 items]");
        assert_eq!(format_value(&json!({"a": 1, "b": 2})), "{2 fields}");
    }
}
