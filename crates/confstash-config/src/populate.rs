//! Type coercion of string option values.
//!
//! Each value is classified in order:
//!
//! 1. `None` → `null`
//! 2. float (`^[-+]?\d*\.\d+$`) → number
//! 3. integer (`^[-+]?[0-9]+$`) → number
//! 4. `True…` / `False…` prefix → boolean
//! 5. `eval:<expr>` → the literal value of `<expr>`
//! 6. anything else stays a string

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};

/// A flat, string-keyed bag of coerced option values.
pub type Params = serde_json::Map<String, Value>;

static FLOAT_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d*\.\d+$").expect("valid float regex"));
static INT_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?[0-9]+$").expect("valid int regex"));
static BOOL_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(True|False)").expect("valid bool regex"));
static EVAL_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^eval:\s*(.+)$").expect("valid eval regex"));

/// Coerce a single option value.
pub fn coerce_value(value: &str) -> ConfigResult<Value> {
    if value == "None" {
        return Ok(Value::Null);
    }
    if FLOAT_REGEXP.is_match(value) {
        if let Some(num) = value.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Ok(Value::Number(num));
        }
    }
    if INT_REGEXP.is_match(value) {
        // Out-of-range integers stay strings.
        if let Ok(num) = value.parse::<i64>() {
            return Ok(Value::from(num));
        }
        return Ok(Value::String(value.to_string()));
    }
    if BOOL_REGEXP.is_match(value) {
        return Ok(Value::Bool(value == "True"));
    }
    if let Some(caps) = EVAL_REGEXP.captures(value) {
        return eval_literal(caps[1].trim());
    }
    Ok(Value::String(value.to_string()))
}

/// Evaluate a literal expression.
///
/// Accepts JSON literals plus the bare words `None`, `True` and `False`.
pub fn eval_literal(expression: &str) -> ConfigResult<Value> {
    match expression {
        "None" => return Ok(Value::Null),
        "True" => return Ok(Value::Bool(true)),
        "False" => return Ok(Value::Bool(false)),
        _ => {}
    }
    serde_json::from_str(expression).map_err(|e| ConfigError::Eval {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Coerce every value of `options` into a [`Params`] map.
pub fn coerce_options<'a, I>(options: I, parse_types: bool) -> ConfigResult<Params>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut params = Params::new();
    for (key, value) in options {
        let coerced = if parse_types {
            coerce_value(value)?
        } else {
            Value::String(value.clone())
        };
        params.insert(key.clone(), coerced);
    }
    Ok(params)
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_in_order() {
        assert_eq!(coerce_value("None").unwrap(), Value::Null);
        assert_eq!(coerce_value("3.14").unwrap(), json!(3.14));
        assert_eq!(coerce_value("-.5").unwrap(), json!(-0.5));
        assert_eq!(coerce_value("42").unwrap(), json!(42));
        assert_eq!(coerce_value("+7").unwrap(), json!(7));
        assert_eq!(coerce_value("True").unwrap(), json!(true));
        assert_eq!(coerce_value("False").unwrap(), json!(false));
        assert_eq!(coerce_value("hello").unwrap(), json!("hello"));
    }

    #[test]
    fn bool_prefix_only_true_when_exact() {
        // Matches the boolean prefix but is not exactly `True`.
        assert_eq!(coerce_value("Trueish").unwrap(), json!(false));
        assert_eq!(coerce_value("true").unwrap(), json!("true"));
    }

    #[test]
    fn floats_need_a_fraction() {
        assert_eq!(coerce_value("1.").unwrap(), json!("1."));
        assert_eq!(coerce_value("1e5").unwrap(), json!("1e5"));
    }

    #[test]
    fn huge_integers_stay_strings() {
        let big = "123456789012345678901234567890";
        assert_eq!(coerce_value(big).unwrap(), json!(big));
    }

    #[test]
    fn eval_parses_literals() {
        assert_eq!(coerce_value("eval: [1, 2, 3]").unwrap(), json!([1, 2, 3]));
        assert_eq!(
            coerce_value("eval:{\"a\": 1}").unwrap(),
            json!({"a": 1})
        );
        assert_eq!(coerce_value("eval: None").unwrap(), Value::Null);
    }

    #[test]
    fn eval_rejects_non_literals() {
        let err = coerce_value("eval: 1 + 2").unwrap_err();
        assert!(matches!(err, ConfigError::Eval { .. }));
    }

    #[test]
    fn coerce_options_can_skip_parsing() {
        let k = "n".to_string();
        let v = "5".to_string();
        let raw = coerce_options([(&k, &v)], false).unwrap();
        assert_eq!(raw["n"], json!("5"));
        let typed = coerce_options([(&k, &v)], true).unwrap();
        assert_eq!(typed["n"], json!(5));
    }
}
