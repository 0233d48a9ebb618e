//! Attribute values and format validation

use crate::core::schema::AttributeKind;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// A typed attribute value as stored by the data store.
///
/// Conversion to and from JSON is shape-checked against the attribute's
/// declared [`AttributeKind`]; a value that does not fit its kind never
/// reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(DateTime<Utc>),
    Null,
}

impl AttributeValue {
    /// Get the value as text if possible
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Convert to a JSON scalar.
    ///
    /// Dates are rendered as RFC 3339 strings. Non-finite floats degrade to
    /// JSON null since JSON cannot carry them.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Int(i) => Value::Number((*i).into()),
            AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttributeValue::Text(s) => Value::String(s.clone()),
            AttributeValue::Date(d) => Value::String(d.to_rfc3339()),
            AttributeValue::Null => Value::Null,
        }
    }

    /// Parse a JSON value against a declared kind.
    ///
    /// Returns `None` when the JSON shape does not match the kind. JSON null
    /// parses to [`AttributeValue::Null`] for every kind; nullability is the
    /// caller's check. `Opaque` attributes accept nothing.
    pub fn from_json(value: &Value, kind: AttributeKind) -> Option<AttributeValue> {
        if value.is_null() {
            return Some(AttributeValue::Null);
        }
        match kind {
            AttributeKind::Boolean => value.as_bool().map(AttributeValue::Bool),
            AttributeKind::Integer => value.as_i64().map(AttributeValue::Int),
            AttributeKind::Float => value.as_f64().map(AttributeValue::Float),
            AttributeKind::Text => value.as_str().map(|s| AttributeValue::Text(s.to_string())),
            AttributeKind::Date => value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| AttributeValue::Date(d.with_timezone(&Utc))),
            AttributeKind::Opaque => None,
        }
    }
}

/// Format validators for text attributes
#[derive(Debug, Clone)]
pub enum FieldFormat {
    Email,
    Url,
    Phone,
    Custom(Regex),
}

impl FieldFormat {
    /// Validate a text value against this format
    pub fn validate(&self, value: &str) -> bool {
        match self {
            FieldFormat::Email => Self::is_valid_email(value),
            FieldFormat::Url => Self::is_valid_url(value),
            FieldFormat::Phone => Self::is_valid_phone(value),
            FieldFormat::Custom(regex) => regex.is_match(value),
        }
    }

    fn is_valid_email(email: &str) -> bool {
        static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = EMAIL_REGEX.get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
        });
        regex.is_match(email)
    }

    fn is_valid_url(url: &str) -> bool {
        static URL_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = URL_REGEX.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap());
        regex.is_match(url)
    }

    fn is_valid_phone(phone: &str) -> bool {
        static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
        // E.164: 8 to 15 digits
        let regex = PHONE_REGEX.get_or_init(|| Regex::new(r"^\+?[1-9]\d{7,14}$").unwrap());
        regex.is_match(phone)
    }
}
