//! Field values carried by import records and stored entities

use serde::Serialize;

/// A single typed field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    /// Comma-joined strings (e.g. print types "PAPER,ALU")
    TextList(Vec<String>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value as f64 (integers widen)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Change requested by one import cell
///
/// An absent cell produces no patch at all, so "leave unchanged" and
/// "clear this field" stay distinguishable during an update.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPatch {
    /// Overwrite with a new value
    Set(FieldValue),
    /// Explicitly clear a nullable field
    Clear,
}
