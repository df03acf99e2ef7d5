//! Blend formulas shared by the pose blender and the dirty-set filter.
//! - normal blend: `f * reference + (1 - f) * snapshot`
//! - additive: `snapshot + f * (reference - neutral)` where neutral is 0 for
//!   location, Euler and quaternion xyz, and 1 for scale and quaternion w
//! - custom float properties use the normal formula, everything else is copied

use crate::Value;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
}

impl BlendMode {
    pub fn from_additive(additive: bool) -> Self {
        if additive {
            BlendMode::Additive
        } else {
            BlendMode::Normal
        }
    }

    /// Valid blend factor interval for this mode.
    pub fn factor_range(self) -> (f32, f32) {
        match self {
            BlendMode::Normal => (0.0, 1.0),
            BlendMode::Additive => (-1.0, 1.0),
        }
    }

    /// Clamp a blend factor into the mode's interval. NaN maps to 0.
    pub fn clamp_factor(self, factor: f32) -> f32 {
        if factor.is_nan() {
            return 0.0;
        }
        let (lo, hi) = self.factor_range();
        factor.clamp(lo, hi)
    }
}

/// Neutral element of a channel component.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Neutral {
    Zero,
    One,
}

impl Neutral {
    #[inline]
    pub fn value(self) -> f32 {
        match self {
            Neutral::Zero => 0.0,
            Neutral::One => 1.0,
        }
    }

    pub fn from_value(v: f32) -> Self {
        if v == 1.0 {
            Neutral::One
        } else {
            Neutral::Zero
        }
    }
}

/// Linear interpolation towards the reference. Exact at `factor` 0 and 1, and
/// returns `snapshot` untouched when both sides already agree.
#[inline]
pub fn lerp(reference: f32, snapshot: f32, factor: f32) -> f32 {
    if reference == snapshot {
        return snapshot;
    }
    factor * reference + (1.0 - factor) * snapshot
}

/// Blend one channel component.
///
/// The additive form is algebraically `f * ref + snap - f * n`; it is evaluated as
/// `snap + f * (ref - n)` so a reference sitting on the neutral element leaves the
/// snapshot bit-identical.
#[inline]
pub fn blend_component(
    reference: f32,
    snapshot: f32,
    factor: f32,
    mode: BlendMode,
    neutral: Neutral,
) -> f32 {
    match mode {
        BlendMode::Normal => lerp(reference, snapshot, factor),
        BlendMode::Additive => snapshot + factor * (reference - neutral.value()),
    }
}

/// Blend fixed-size component arrays with a per-component neutral.
pub fn blend_array<const N: usize>(
    reference: &[f32; N],
    snapshot: &[f32; N],
    factor: f32,
    mode: BlendMode,
    neutral: impl Fn(usize) -> Neutral,
) -> [f32; N] {
    let mut out = [0.0f32; N];
    for i in 0..N {
        out[i] = blend_component(reference[i], snapshot[i], factor, mode, neutral(i));
    }
    out
}

/// Whether blending `reference` over `snapshot` could change the component.
///
/// Normal mode: the values differ. Additive mode: the reference is off neutral.
pub fn would_change(reference: f32, snapshot: f32, mode: BlendMode, neutral: Neutral) -> bool {
    match mode {
        BlendMode::Normal => reference != snapshot,
        BlendMode::Additive => reference != neutral.value(),
    }
}

/// Blend a custom property value.
///
/// Float reference and float snapshot are blended with the normal formula; any
/// other combination copies the reference verbatim.
pub fn blend_property(reference: &Value, snapshot: Option<&Value>, factor: f32) -> Value {
    match (reference, snapshot) {
        (Value::Float(r), Some(Value::Float(s))) => Value::Float(lerp(*r, *s, factor)),
        _ => reference.clone(),
    }
}
