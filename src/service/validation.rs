//! Request body validation against per-field rules.

use crate::error::ServiceError;
use crate::store::Document;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn is_email(s: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
        .map(|re| re.is_match(s))
        .unwrap_or(false)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldFormat {
    Email,
}

#[derive(Clone, Debug, Default)]
pub struct ValidationRule {
    /// Human name used in messages.
    pub label: String,
    pub required: bool,
    pub must_be_string: bool,
    pub format: Option<FieldFormat>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Field whose value this one must equal, and the message when it does not.
    pub equals: Option<(String, String)>,
}

impl ValidationRule {
    pub fn string(label: &str) -> Self {
        ValidationRule {
            label: label.to_string(),
            must_be_string: true,
            ..Default::default()
        }
    }

    pub fn any(label: &str) -> Self {
        ValidationRule {
            label: label.to_string(),
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn email(mut self) -> Self {
        self.format = Some(FieldFormat::Email);
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub fn equals(mut self, field: &str, message: &str) -> Self {
        self.equals = Some((field.to_string(), message.to_string()));
        self
    }
}

/// Ordered field rules; the first failing rule is reported.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    fields: Vec<(String, ValidationRule)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, rule: ValidationRule) -> Self {
        self.fields.push((name.to_string(), rule));
        self
    }

    fn rule(&self, name: &str) -> Option<&ValidationRule> {
        self.fields.iter().find(|(f, _)| f == name).map(|(_, r)| r)
    }
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a full body: required fields must be present and no field outside
    /// the schema may appear.
    pub fn validate(body: &Document, schema: &Schema) -> Result<(), ServiceError> {
        for (name, rule) in &schema.fields {
            match body.get(name) {
                None | Some(Value::Null) if rule.required => {
                    return Err(ServiceError::validation(format!("{} is required", rule.label)));
                }
                None | Some(Value::Null) => {}
                Some(v) => validate_field(body, v, rule, false)?,
            }
        }
        if let Some(key) = body.keys().find(|k| schema.rule(k).is_none()) {
            return Err(ServiceError::validation(format!("{} is not allowed", key)));
        }
        Ok(())
    }

    /// Validate only the fields present in body (bulk updates). Required and unknown fields are not enforced.
    pub fn validate_partial(body: &Document, schema: &Schema) -> Result<(), ServiceError> {
        for (name, v) in body {
            if let Some(rule) = schema.rule(name) {
                if !v.is_null() {
                    validate_field(body, v, rule, true)?;
                }
            }
        }
        Ok(())
    }
}

fn validate_field(body: &Document, v: &Value, rule: &ValidationRule, partial: bool) -> Result<(), ServiceError> {
    let label = &rule.label;
    if rule.must_be_string {
        let Some(s) = v.as_str() else {
            return Err(ServiceError::validation(format!("{} must be a string", label)));
        };
        if s.is_empty() {
            return Err(ServiceError::validation(format!("{} is not allowed to be empty", label)));
        }
    }
    if let Some(s) = v.as_str() {
        if rule.format == Some(FieldFormat::Email) && !is_email(s) {
            return Err(ServiceError::validation(format!("{} must be a valid email", label)));
        }
        let len = s.chars().count();
        if let Some(min) = rule.min_length {
            if len < min {
                return Err(ServiceError::validation(format!(
                    "{} length must be at least {} characters long",
                    label, min
                )));
            }
        }
        if let Some(max) = rule.max_length {
            if len > max {
                return Err(ServiceError::validation(format!(
                    "{} length must be less than or equal to {} characters long",
                    label, max
                )));
            }
        }
    }
    if let Some((other, message)) = &rule.equals {
        let other_value = body.get(other);
        if !(partial && other_value.is_none()) && other_value != Some(v) {
            return Err(ServiceError::validation(message.clone()));
        }
    }
    Ok(())
}
