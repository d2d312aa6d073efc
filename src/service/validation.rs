//! Request body validation. The default validator applies the per-column rules from config.

use crate::config::{EntityDescriptor, ValidationRule};
use regex::Regex;
use serde_json::{Map, Value};

/// Validates a create/update body. `Err` carries every failure message, in column order.
pub trait Validator: Send + Sync {
    fn validate(&self, entity: &EntityDescriptor, body: &Map<String, Value>) -> Result<(), Vec<String>>;
}

/// Applies `EntityDescriptor::validation`. Entities without rules accept any object.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleValidator;

impl Validator for RuleValidator {
    fn validate(&self, entity: &EntityDescriptor, body: &Map<String, Value>) -> Result<(), Vec<String>> {
        let mut columns: Vec<&String> = entity.validation.keys().collect();
        columns.sort();
        let mut errors = Vec::new();
        for col in columns {
            let rule = &entity.validation[col];
            let val = body.get(col.as_str());
            if rule.required == Some(true) && val.map_or(true, Value::is_null) {
                errors.push(format!("{} is required", col));
                continue;
            }
            if let Some(v) = val {
                validate_field(col, v, rule, entity.patterns.get(col.as_str()), &mut errors);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule, pattern: Option<&Regex>, errors: &mut Vec<String>) {
    if v.is_null() {
        return;
    }
    if let Some(format) = &rule.format {
        if let Some(message) = check_format(col, v, format) {
            errors.push(message);
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                errors.push(format!("{} must be at most {} characters", col, max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                errors.push(format!("{} must be at least {} characters", col, min));
            }
        }
        if pattern.is_some_and(|re| !re.is_match(s)) {
            errors.push(format!("{} does not match required pattern", col));
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.push(format!(
                "{} must be one of: {}",
                col,
                allowed.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
            ));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                errors.push(format!("{} must be at least {}", col, min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                errors.push(format!("{} must be at most {}", col, max));
            }
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(col: &str, v: &Value, format: &str) -> Option<String> {
    let s = v.as_str()?;
    match format.to_lowercase().as_str() {
        "email" if !s.contains('@') || s.len() < 3 => Some(format!("{} must be a valid email", col)),
        "uuid" if uuid::Uuid::parse_str(s).is_err() => Some(format!("{} must be a valid UUID", col)),
        "date-time" if chrono::DateTime::parse_from_rfc3339(s).is_err() => {
            Some(format!("{} must be an RFC 3339 date-time", col))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_from_str, resolve};
    use serde_json::json;

    fn widgets() -> EntityDescriptor {
        let config = load_from_str(
            r#"{"entities":[{
                "name": "widgets",
                "fillable": ["name", "email", "qty", "kind", "code"],
                "validation": {
                    "name": {"required": true, "max_length": 5},
                    "email": {"format": "email"},
                    "qty": {"minimum": 1, "maximum": 10},
                    "kind": {"allowed": ["a", "b"]},
                    "code": {"pattern": "^[A-Z]{3}$"}
                }
            }]}"#,
        )
        .unwrap();
        resolve(&config).unwrap().entities.remove(0)
    }

    fn check(body: Value) -> Result<(), Vec<String>> {
        RuleValidator.validate(&widgets(), body.as_object().unwrap())
    }

    #[test]
    fn valid_body_passes() {
        assert!(check(json!({"name": "bolt", "email": "a@b.c", "qty": 3, "kind": "a"})).is_ok());
    }

    #[test]
    fn collects_every_message() {
        let errors = check(json!({"email": "nope", "qty": 50, "kind": "z"})).unwrap_err();
        assert_eq!(
            errors,
            vec![
                "email must be a valid email".to_string(),
                "kind must be one of: \"a\", \"b\"".to_string(),
                "name is required".to_string(),
                "qty must be at most 10".to_string(),
            ]
        );
    }

    #[test]
    fn null_required_field_fails() {
        let errors = check(json!({"name": null})).unwrap_err();
        assert_eq!(errors, vec!["name is required".to_string()]);
    }

    #[test]
    fn pattern_is_compiled_at_resolve_time() {
        let entity = widgets();
        assert!(entity.patterns["code"].is_match("ABC"));
        assert!(check(json!({"name": "bolt", "code": "ABC"})).is_ok());
        assert_eq!(
            check(json!({"name": "bolt", "code": "abcd"})).unwrap_err(),
            vec!["code does not match required pattern".to_string()]
        );
    }

    #[test]
    fn length_counts_characters() {
        assert!(check(json!({"name": "héllo"})).is_ok());
        assert!(check(json!({"name": "toolong"})).is_err());
    }
}
