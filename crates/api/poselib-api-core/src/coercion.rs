//! Coercion of raw keyframe values into typed channel values.
//! Keyframes store a single f32 per point; the channel decides what it means:
//! - float channels and float properties take it as-is
//! - integer properties truncate toward zero
//! - boolean properties are true for any non-zero value
//! - rotation mode maps the integer code through the fixed mode table

use crate::{RotationMode, Value, ValueKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("value {raw} is not a valid rotation mode code (expected 0..=7)")]
    RotationModeCode { raw: f32 },
    #[error("cannot write a numeric key into a {kind:?} value")]
    NotNumeric { kind: ValueKind },
    #[error("component {index} out of range for a vector of length {len}")]
    ComponentOutOfRange { index: usize, len: usize },
    #[error("non-finite value {raw}")]
    NonFinite { raw: f32 },
}

/// Map a keyframed rotation-mode value to its mode. Fractional values truncate
/// toward zero; the resulting code must be in 0..=7.
pub fn rotation_mode_from_raw(raw: f32) -> Result<RotationMode, CoercionError> {
    if !raw.is_finite() {
        return Err(CoercionError::RotationModeCode { raw });
    }
    let code = raw.trunc();
    if code != raw {
        log::warn!("rotation mode key {raw} truncated to {code}");
    }
    RotationMode::from_code(code as i64).ok_or(CoercionError::RotationModeCode { raw })
}

/// Rotation mode as the raw value stored in a keyframe.
pub fn rotation_mode_to_raw(mode: RotationMode) -> f32 {
    mode.code() as f32
}

/// Coerce `raw` into a value shaped like `existing`.
///
/// `index` addresses a component of a vector-valued property; scalar properties
/// ignore it.
pub fn coerce_like(existing: &Value, raw: f32, index: Option<usize>) -> Result<Value, CoercionError> {
    if !raw.is_finite() {
        return Err(CoercionError::NonFinite { raw });
    }
    match existing {
        Value::Float(_) => Ok(Value::Float(raw)),
        Value::Int(_) => Ok(Value::Int(raw.trunc() as i64)),
        Value::Bool(_) => Ok(Value::Bool(raw != 0.0)),
        Value::Vector(items) => {
            let i = index.unwrap_or(0);
            if i >= items.len() {
                return Err(CoercionError::ComponentOutOfRange {
                    index: i,
                    len: items.len(),
                });
            }
            let mut out = items.clone();
            out[i] = raw;
            Ok(Value::Vector(out))
        }
        other => Err(CoercionError::NotNumeric { kind: other.kind() }),
    }
}

/// Numeric reading of a value for keyframing. Bools read as 0/1, ints widen,
/// vector-valued properties read the addressed component.
pub fn to_float(v: &Value, index: Option<usize>) -> Option<f32> {
    match v {
        Value::Float(f) => Some(*f),
        Value::Int(i) => Some(*i as f32),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Vector(items) => items.get(index.unwrap_or(0)).copied(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_mode_codes() {
        assert_eq!(rotation_mode_from_raw(0.0), Ok(RotationMode::Quaternion));
        assert_eq!(rotation_mode_from_raw(1.0), Ok(RotationMode::Xyz));
        assert_eq!(rotation_mode_from_raw(6.0), Ok(RotationMode::Zyx));
        assert_eq!(rotation_mode_from_raw(7.0), Ok(RotationMode::AxisAngle));
        assert!(rotation_mode_from_raw(8.0).is_err());
        assert!(rotation_mode_from_raw(-1.0).is_err());
        assert!(rotation_mode_from_raw(f32::NAN).is_err());
    }

    #[test]
    fn fractional_rotation_mode_codes_truncate() {
        assert_eq!(rotation_mode_from_raw(2.5), Ok(RotationMode::Xzy));
        assert_eq!(rotation_mode_from_raw(6.9), Ok(RotationMode::Zyx));
        assert_eq!(rotation_mode_from_raw(-0.5), Ok(RotationMode::Quaternion));
        assert!(rotation_mode_from_raw(8.2).is_err());
        assert_eq!(rotation_mode_to_raw(RotationMode::Yzx), 4.0);
    }

    #[test]
    fn coerce_scalars_keep_their_type() {
        assert_eq!(coerce_like(&Value::Float(0.0), 2.5, None), Ok(Value::Float(2.5)));
        assert_eq!(coerce_like(&Value::Int(0), 2.9, None), Ok(Value::Int(2)));
        assert_eq!(coerce_like(&Value::Int(0), -2.9, None), Ok(Value::Int(-2)));
        assert_eq!(coerce_like(&Value::Bool(false), 1.0, None), Ok(Value::Bool(true)));
        assert_eq!(coerce_like(&Value::Bool(true), 0.0, None), Ok(Value::Bool(false)));
    }

    #[test]
    fn coerce_vector_component() {
        let v = Value::Vector(vec![0.0, 0.0, 0.0]);
        assert_eq!(
            coerce_like(&v, 4.0, Some(1)),
            Ok(Value::Vector(vec![0.0, 4.0, 0.0]))
        );
        assert!(matches!(
            coerce_like(&v, 4.0, Some(3)),
            Err(CoercionError::ComponentOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn coerce_rejects_non_numeric_targets() {
        assert!(matches!(
            coerce_like(&Value::text("IK"), 1.0, None),
            Err(CoercionError::NotNumeric { kind: ValueKind::Text })
        ));
        assert!(coerce_like(&Value::Float(0.0), f32::INFINITY, None).is_err());
    }

    #[test]
    fn to_float_reads_numeric_shapes() {
        assert_eq!(to_float(&Value::Bool(true), None), Some(1.0));
        assert_eq!(to_float(&Value::Int(3), None), Some(3.0));
        assert_eq!(to_float(&Value::Vector(vec![1.0, 2.0]), Some(1)), Some(2.0));
        assert_eq!(to_float(&Value::text("x"), None), None);
    }
}
