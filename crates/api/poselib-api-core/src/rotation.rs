//! Rotation modes and Euler/Quaternion conversion.
//!
//! Quaternions are stored in host order `[w, x, y, z]` (component 0 is `w`).
//! An Euler mode `ABC` applies the rotation about A first, then B, then C, so the
//! resulting rotation is `R = R_C * R_B * R_A`.

use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rotation representation a bone is currently driven by.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationMode {
    #[default]
    #[serde(rename = "QUATERNION")]
    Quaternion,
    #[serde(rename = "XYZ")]
    Xyz,
    #[serde(rename = "XZY")]
    Xzy,
    #[serde(rename = "YXZ")]
    Yxz,
    #[serde(rename = "YZX")]
    Yzx,
    #[serde(rename = "ZXY")]
    Zxy,
    #[serde(rename = "ZYX")]
    Zyx,
    #[serde(rename = "AXIS_ANGLE")]
    AxisAngle,
}

impl RotationMode {
    /// All modes in storage-code order.
    pub const ALL: [RotationMode; 8] = [
        RotationMode::Quaternion,
        RotationMode::Xyz,
        RotationMode::Xzy,
        RotationMode::Yxz,
        RotationMode::Yzx,
        RotationMode::Zxy,
        RotationMode::Zyx,
        RotationMode::AxisAngle,
    ];

    /// Integer code used when the mode is stored as a keyframed channel.
    pub fn code(self) -> i64 {
        match self {
            RotationMode::Quaternion => 0,
            RotationMode::Xyz => 1,
            RotationMode::Xzy => 2,
            RotationMode::Yxz => 3,
            RotationMode::Yzx => 4,
            RotationMode::Zxy => 5,
            RotationMode::Zyx => 6,
            RotationMode::AxisAngle => 7,
        }
    }

    /// Map a stored integer code back to its mode. Codes outside 0..=7 are rejected.
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn is_euler(self) -> bool {
        self.euler_axes().is_some()
    }

    /// Axis indices (0=X, 1=Y, 2=Z) in application order for Euler modes.
    pub fn euler_axes(self) -> Option<[usize; 3]> {
        match self {
            RotationMode::Xyz => Some([0, 1, 2]),
            RotationMode::Xzy => Some([0, 2, 1]),
            RotationMode::Yxz => Some([1, 0, 2]),
            RotationMode::Yzx => Some([1, 2, 0]),
            RotationMode::Zxy => Some([2, 0, 1]),
            RotationMode::Zyx => Some([2, 1, 0]),
            RotationMode::Quaternion | RotationMode::AxisAngle => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RotationMode::Quaternion => "QUATERNION",
            RotationMode::Xyz => "XYZ",
            RotationMode::Xzy => "XZY",
            RotationMode::Yxz => "YXZ",
            RotationMode::Yzx => "YZX",
            RotationMode::Zxy => "ZXY",
            RotationMode::Zyx => "ZYX",
            RotationMode::AxisAngle => "AXIS_ANGLE",
        }
    }
}

impl fmt::Display for RotationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown rotation mode '{s}'"))
    }
}

fn axis_unit(axis: usize) -> Unit<Vector3<f32>> {
    match axis {
        0 => Vector3::x_axis(),
        1 => Vector3::y_axis(),
        _ => Vector3::z_axis(),
    }
}

/// Convert Euler angles (radians, indexed X/Y/Z) in the given order to a
/// quaternion `[w, x, y, z]`. Returns `None` for non-Euler modes.
pub fn euler_to_quaternion(euler: [f32; 3], mode: RotationMode) -> Option<[f32; 4]> {
    let axes = mode.euler_axes()?;
    let mut q = UnitQuaternion::identity();
    for axis in axes {
        q = UnitQuaternion::from_axis_angle(&axis_unit(axis), euler[axis]) * q;
    }
    Some([q.w, q.i, q.j, q.k])
}

/// Convert a quaternion `[w, x, y, z]` to Euler angles (indexed X/Y/Z) in the given
/// order. The quaternion is normalized first. Returns `None` for non-Euler modes.
pub fn quaternion_to_euler(q: [f32; 4], mode: RotationMode) -> Option<[f32; 3]> {
    let [a, b, c] = mode.euler_axes()?;
    let unit = UnitQuaternion::from_quaternion(Quaternion::new(q[0], q[1], q[2], q[3]));
    let m = unit.to_rotation_matrix().into_inner();
    let r = |row: usize, col: usize| m[(row, col)];

    // +1 for cyclic orders (XYZ, YZX, ZXY), -1 for the others.
    let s = if b == (a + 1) % 3 { 1.0 } else { -1.0 };

    let sin_b = (-s * r(c, a)).clamp(-1.0, 1.0);
    let beta = sin_b.asin();
    let (alpha, gamma) = if sin_b.abs() < 0.999_999 {
        (
            (s * r(c, b)).atan2(r(c, c)),
            (s * r(b, a)).atan2(r(a, a)),
        )
    } else {
        // Gimbal lock: first and last axes are coupled, put everything on the last.
        (0.0, (-s * r(a, b)).atan2(r(b, b)))
    };

    let mut out = [0.0f32; 3];
    out[a] = alpha;
    out[b] = beta;
    out[c] = gamma;
    Some(out)
}
