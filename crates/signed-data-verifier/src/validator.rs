//! Structural validation of decoded payloads.
//!
//! A validator answers one question: does this JSON have the right shape for
//! `T`? It never looks at provenance. The verifier calls it before any
//! signature work and turns a rejection into [`DecodeError::Rejected`].
//!
//! [`DecodeError::Rejected`]: crate::error::DecodeError::Rejected

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::types::Environment;

/// Shape check for a payload that will be decoded into `T`.
pub trait Validator<T>: Send + Sync {
    /// Whether `payload` has an acceptable structure.
    fn validate(&self, payload: &Value) -> bool;

    /// Name used in rejection errors.
    fn shape(&self) -> &'static str {
        "payload"
    }
}

/// Expected JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// A JSON number without a fractional part.
    Integer,
    Number,
    Bool,
    /// A string holding a known environment wire name.
    Environment,
    /// An array of strings.
    StringArray,
    /// A nested object checked against its own rules.
    Object(&'static [FieldRule]),
}

/// One rule in a [`FieldValidator`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldRule {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Table-driven validator.
///
/// The payload must be a JSON object. Every field named in the table that is
/// present and not `null` must have the listed kind; absent fields and fields
/// not in the table are accepted.
pub struct FieldValidator<T> {
    shape: &'static str,
    rules: &'static [FieldRule],
    _marker: PhantomData<fn() -> T>,
}

impl<T> FieldValidator<T> {
    pub const fn new(shape: &'static str, rules: &'static [FieldRule]) -> Self {
        Self {
            shape,
            rules,
            _marker: PhantomData,
        }
    }

    pub fn rules(&self) -> &'static [FieldRule] {
        self.rules
    }
}

impl<T> fmt::Debug for FieldValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldValidator")
            .field("shape", &self.shape)
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl<T> Validator<T> for FieldValidator<T> {
    fn validate(&self, payload: &Value) -> bool {
        object_matches(payload, self.rules)
    }

    fn shape(&self) -> &'static str {
        self.shape
    }
}

fn object_matches(value: &Value, rules: &[FieldRule]) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };

    rules.iter().all(|rule| match object.get(rule.name) {
        None | Some(Value::Null) => true,
        Some(field) => kind_matches(field, rule.kind),
    })
}

fn kind_matches(value: &Value, kind: FieldKind) -> bool {
    match kind {
        FieldKind::String => value.is_string(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Number => value.is_number(),
        FieldKind::Bool => value.is_boolean(),
        FieldKind::Environment => value
            .as_str()
            .map(|s| serde_json::from_value::<Environment>(Value::from(s)).is_ok())
            .unwrap_or(false),
        FieldKind::StringArray => value
            .as_array()
            .map(|items| items.iter().all(Value::is_string))
            .unwrap_or(false),
        FieldKind::Object(rules) => object_matches(value, rules),
    }
}
