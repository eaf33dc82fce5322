//! Boolean coercion for caller-supplied flags.
//!
//! Every flag that arrives as loosely typed input (JSON option bags, query
//! strings, form fields) goes through [`truthy`] or [`parse_flag`], so the
//! accepted spellings are the same everywhere.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Spellings accepted as `true`, compared after trimming and lowercasing.
pub const TRUE_LITERALS: &[&str] = &["true", "1", "yes", "y", "t", "on"];

/// Interpret a textual flag. Anything outside [`TRUE_LITERALS`] is false.
pub fn parse_flag(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    TRUE_LITERALS.contains(&normalized.as_str())
}

/// Interpret a JSON value as a flag: `true`, the number `1`, or a string
/// accepted by [`parse_flag`].
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64() == Some(1.0),
        Value::String(text) => parse_flag(text),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Query-string flag: a bare `?flag` (empty value) counts as set.
pub fn query_flag(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(raw) if raw.trim().is_empty() => true,
        Some(raw) => parse_flag(raw),
    }
}

/// Serde adapter applying [`truthy`] to an optional field.
pub fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().is_some_and(truthy))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn accepted_literals_are_true() {
        for literal in ["true", "1", "yes", "y", "t", "on", " YES ", "True"] {
            assert!(parse_flag(literal), "{literal:?} should be true");
        }
    }

    #[test]
    fn everything_else_is_false() {
        for literal in ["false", "0", "no", "", "2", "truthy", "n"] {
            assert!(!parse_flag(literal), "{literal:?} should be false");
        }
    }

    #[test]
    fn json_values_follow_the_same_rules() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!(1.0)));
        assert!(truthy(&json!("yes")));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(2)));
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(["true"])));
    }

    #[test]
    fn bare_query_flags_are_set() {
        assert!(query_flag(Some("")));
        assert!(query_flag(Some("1")));
        assert!(!query_flag(Some("false")));
        assert!(!query_flag(None));
    }

    #[test]
    fn serde_adapter_defaults_missing_fields_to_false() {
        #[derive(Deserialize)]
        struct Options {
            #[serde(default, deserialize_with = "deserialize_truthy")]
            overwrite: bool,
        }

        let set: Options = serde_json::from_value(json!({ "overwrite": "t" })).unwrap();
        let unset: Options = serde_json::from_value(json!({})).unwrap();
        let null: Options = serde_json::from_value(json!({ "overwrite": null })).unwrap();
        assert!(set.overwrite);
        assert!(!unset.overwrite);
        assert!(!null.overwrite);
    }
}
