//! Declarative field rules and the single validation engine shared by every
//! record type.
//!
//! A record is serialized to a JSON object and checked against its
//! [`Ruleset`] before each write. The schema is closed: fields the ruleset
//! does not declare are rejected.

use std::fmt;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::email::EMAIL_RE;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Primitive type a field value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Boolean,
    /// RFC 3339 timestamp string.
    DateTime,
    /// Array whose elements are strings (checked against the field pattern).
    StringList,
}

/// Optional regex constraint on string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Email,
}

impl Pattern {
    fn regex(self) -> &'static Regex {
        match self {
            Self::Email => &EMAIL_RE,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Email => "a valid email address",
        }
    }
}

/// Constraint set for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub nullable: bool,
    /// Reject strings that are empty after trimming.
    pub non_blank: bool,
    pub pattern: Option<Pattern>,
}

impl FieldRule {
    /// A required, non-nullable field.
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            nullable: false,
            non_blank: false,
            pattern: None,
        }
    }

    /// An optional field that may also be `null`.
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            nullable: true,
            non_blank: false,
            pattern: None,
        }
    }

    pub const fn non_blank(mut self) -> Self {
        self.non_blank = true;
        self
    }

    pub const fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }
}

/// All rules for one collection.
#[derive(Debug)]
pub struct Ruleset {
    pub collection: &'static str,
    pub fields: &'static [FieldRule],
}

impl Ruleset {
    fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|r| r.name == name)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A single field-level violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Every violation found in one record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ValidationError {
    pub collection: &'static str,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// True if `field` has at least one violation.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed for {} record: ", self.collection)?;
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.reason)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Check `record` against `ruleset`, collecting every violation.
pub fn validate(record: &Map<String, Value>, ruleset: &Ruleset) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    for key in record.keys() {
        if ruleset.rule(key).is_none() {
            errors.push(FieldError::new(key.as_str(), "unknown field"));
        }
    }

    for rule in ruleset.fields {
        match record.get(rule.name) {
            None => {
                if rule.required {
                    errors.push(FieldError::new(rule.name, "required field"));
                }
            }
            Some(Value::Null) => {
                if !rule.nullable {
                    errors.push(FieldError::new(rule.name, "null value not allowed"));
                }
            }
            Some(value) => check_value(rule, value, &mut errors),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            collection: ruleset.collection,
            errors,
        })
    }
}

fn check_value(rule: &FieldRule, value: &Value, errors: &mut Vec<FieldError>) {
    match (rule.kind, value) {
        (FieldKind::String, Value::String(s)) => check_string(rule, rule.name, s, errors),
        (FieldKind::Boolean, Value::Bool(_)) => {}
        (FieldKind::DateTime, Value::String(s)) => {
            if chrono::DateTime::parse_from_rfc3339(s).is_err() {
                errors.push(FieldError::new(rule.name, "must be an RFC 3339 datetime"));
            }
        }
        (FieldKind::StringList, Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                let field = format!("{}[{i}]", rule.name);
                match item {
                    Value::String(s) => check_string(rule, &field, s, errors),
                    _ => errors.push(FieldError::new(field, "must be of string type")),
                }
            }
        }
        (kind, _) => errors.push(FieldError::new(
            rule.name,
            format!("must be of {} type", kind_name(kind)),
        )),
    }
}

fn check_string(rule: &FieldRule, field: &str, s: &str, errors: &mut Vec<FieldError>) {
    if rule.non_blank && s.trim().is_empty() {
        errors.push(FieldError::new(field, "must not be blank"));
        return;
    }
    if let Some(pattern) = rule.pattern {
        if !pattern.regex().is_match(s) {
            errors.push(FieldError::new(
                field,
                format!("value '{s}' is not {}", pattern.describe()),
            ));
        }
    }
}

fn kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::String => "string",
        FieldKind::Boolean => "boolean",
        FieldKind::DateTime => "datetime",
        FieldKind::StringList => "list",
    }
}

// ---------------------------------------------------------------------------
// Record trait
// ---------------------------------------------------------------------------

/// A typed record persisted in one collection.
pub trait Record: Serialize {
    /// Collection (table) name.
    const COLLECTION: &'static str;

    /// Field rules for this record type.
    fn ruleset() -> &'static Ruleset;

    /// Serialize and validate against [`Record::ruleset`].
    fn validate(&self) -> Result<(), ValidationError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => validate(&map, Self::ruleset()),
            Ok(_) => Err(ValidationError {
                collection: Self::COLLECTION,
                errors: vec![FieldError::new("$", "record must serialize to an object")],
            }),
            Err(e) => Err(ValidationError {
                collection: Self::COLLECTION,
                errors: vec![FieldError::new("$", format!("not serializable: {e}"))],
            }),
        }
    }
}
