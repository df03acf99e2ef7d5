//! Value: custom-property and constraint-property payloads.
//!
//! Values serialize untagged so that library JSON written by the authoring side
//! (plain numbers, strings, `{ "matrix": [[..]] }`, `{ "type": .., "name": .. }`)
//! reads back without a wrapper. Numeric payloads use f32 like the bone channels.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Coarse kind of a [`Value`], handy for dispatch and diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Vector,
    Matrix,
    ObjectRef,
    List,
    Record,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// Explicit "no value" (unset pointers serialize as null)
    Null,

    /// Boolean flag
    Bool(bool),

    /// Integer property (host integer properties keep integer semantics)
    Int(i64),

    /// Scalar float
    Float(f32),

    /// Text / enum identifiers
    Text(String),

    /// Numeric array property (vector-valued custom properties)
    Vector(Vec<f32>),

    /// Row-major 3x3 or 4x4 matrix
    Matrix { matrix: Vec<Vec<f32>> },

    /// Pointer to another datablock, recorded by kind and name
    ObjectRef {
        #[serde(rename = "type")]
        kind: String,
        name: String,
    },

    /// Heterogeneous list
    List(Vec<Value>),

    /// Anything else the host exposed as a nested mapping
    Record(IndexMap<String, Value>),
}

impl Value {
    /// Return the coarse kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Vector(_) => ValueKind::Vector,
            Value::Matrix { .. } => ValueKind::Matrix,
            Value::ObjectRef { .. } => ValueKind::ObjectRef,
            Value::List(_) => ValueKind::List,
            Value::Record(_) => ValueKind::Record,
        }
    }

    /// Float payload, if this is a `Float`. Ints are deliberately not widened here:
    /// blending only applies to float properties.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Matrix rows when this value is a square 3x3 or 4x4 matrix.
    pub fn as_square_matrix(&self) -> Option<&[Vec<f32>]> {
        match self {
            Value::Matrix { matrix } => {
                let n = matrix.len();
                if (n == 3 || n == 4) && matrix.iter().all(|row| row.len() == n) {
                    Some(matrix)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Convenience constructors
    pub fn f(v: f32) -> Self {
        Value::Float(v)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn object_ref(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Value::ObjectRef {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn matrix(rows: Vec<Vec<f32>>) -> Self {
        Value::Matrix { matrix: rows }
    }
}
