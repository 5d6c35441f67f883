// JSON value coercion helpers
// Payload leaves arrive as serde_json::Value; every parser decides what a leaf
// is by matching on its closed variant set here rather than inspecting it ad hoc
//
// Numan Thabit 2025 Nov

use serde_json::Value;

/// Numeric view of a payload leaf. Only JSON numbers qualify; strings, bools,
/// null, arrays and objects never become metrics.
pub fn as_metric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Null | Value::Bool(_) | Value::String(_) | Value::Array(_) | Value::Object(_) => {
            None
        }
    }
}

/// String view used for dimension values supplied by the service itself.
pub fn as_dimension_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Value of a string field, if present and a string.
pub fn str_field<'a>(map: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_numbers_are_metric_values() {
        assert_eq!(as_metric_value(&json!(5)), Some(5.0));
        assert_eq!(as_metric_value(&json!(-0.25)), Some(-0.25));
        assert_eq!(as_metric_value(&json!("5")), None);
        assert_eq!(as_metric_value(&json!(true)), None);
        assert_eq!(as_metric_value(&json!(null)), None);
        assert_eq!(as_metric_value(&json!([1])), None);
        assert_eq!(as_metric_value(&json!({"v": 1})), None);
    }

    #[test]
    fn dimension_values_coerce_scalars() {
        assert_eq!(as_dimension_value(&json!("prod")).as_deref(), Some("prod"));
        assert_eq!(as_dimension_value(&json!(3)).as_deref(), Some("3"));
        assert_eq!(as_dimension_value(&json!(false)).as_deref(), Some("false"));
        assert_eq!(as_dimension_value(&json!(null)), None);
    }
}
