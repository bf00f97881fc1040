use serde_json::Value;
use store_object::driver::Attributes;

/// Condition on one attribute of a cached child entity
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    EqualString(String),
    /// Matches integer values and strings that parse to the same integer
    EqualInt(i64),
    /// Matches when the attribute is absent or differs
    NotEqual(Value),
    Exists,
}

impl Matcher {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Matcher::EqualString(expected) => value.and_then(Value::as_str) == Some(expected.as_str()),
            Matcher::EqualInt(expected) => value.and_then(as_integer) == Some(*expected),
            Matcher::NotEqual(other) => value != Some(other),
            Matcher::Exists => value.is_some_and(|v| !v.is_null()),
        }
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Check an entity against every `(attribute, matcher)` pair
pub fn is_match(entity: &Attributes, matchers: &[(String, Matcher)]) -> bool {
    matchers
        .iter()
        .all(|(name, matcher)| matcher.matches(entity.get(name)))
}

/// Filter an embedded child value, which is either one object or an array of them
pub fn filter_children(value: Option<&Value>, matchers: &[(String, Matcher)]) -> Vec<Attributes> {
    let candidates: Vec<&Attributes> = match value {
        Some(Value::Object(object)) => vec![object],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    };
    candidates
        .into_iter()
        .filter(|child| is_match(child, matchers))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_equal_int_accepts_numeric_strings() {
        let matcher = Matcher::EqualInt(12);
        assert!(matcher.matches(Some(&json!(12))));
        assert!(matcher.matches(Some(&json!("12"))));
        assert!(!matcher.matches(Some(&json!("12a"))));
        assert!(!matcher.matches(Some(&json!(13))));
        assert!(!matcher.matches(None));
    }

    #[test]
    fn test_string_exists_and_not_equal() {
        assert!(Matcher::EqualString("up".into()).matches(Some(&json!("up"))));
        assert!(!Matcher::EqualString("up".into()).matches(Some(&json!(1))));

        assert!(Matcher::Exists.matches(Some(&json!(0))));
        assert!(!Matcher::Exists.matches(Some(&Value::Null)));
        assert!(!Matcher::Exists.matches(None));

        let not_down = Matcher::NotEqual(json!("down"));
        assert!(not_down.matches(Some(&json!("up"))));
        assert!(not_down.matches(None));
        assert!(!not_down.matches(Some(&json!("down"))));
    }

    #[test]
    fn test_filter_children() {
        let entity = object(json!({
            "id": 1,
            "$interface": [
                {"id": 10, "if_index": 1, "status": "up"},
                {"id": 11, "if_index": "2", "status": "down"},
                {"id": 12, "if_index": 3},
                "garbage"
            ],
            "$address": {"id": 20, "ip": "10.0.0.1"}
        }));

        let matchers = vec![("if_index".to_string(), Matcher::EqualInt(2))];
        let found = filter_children(entity.get("$interface"), &matchers);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("id"), Some(&json!(11)));

        let matchers = vec![("status".to_string(), Matcher::Exists)];
        assert_eq!(filter_children(entity.get("$interface"), &matchers).len(), 2);

        assert_eq!(filter_children(entity.get("$address"), &[]).len(), 1);
        assert!(filter_children(entity.get("$missing"), &[]).is_empty());
    }
}
