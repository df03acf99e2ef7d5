//! Pose bones, their constraints and the channel interpreter.
//!
//! Every keyable attribute of a bone is reached through [`ChannelKind`] plus an
//! optional component index; there is no string evaluation at runtime.

use indexmap::IndexMap;
use poselib_api_core::coercion::{coerce_like, rotation_mode_from_raw, to_float};
use poselib_api_core::rotation::{euler_to_quaternion, quaternion_to_euler};
use poselib_api_core::{ChannelError, ChannelKind, RotationMode, Value};
use serde::{Deserialize, Serialize};

fn identity_quaternion() -> [f32; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

fn default_axis_angle() -> [f32; 4] {
    [0.0, 0.0, 1.0, 0.0]
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// A constraint attached to a pose bone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    /// Host constraint type identifier (`COPY_ROTATION`, `CHILD_OF`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Target object name
    #[serde(default)]
    pub target: Option<String>,
    /// Every other serialisable property (subtarget, spaces, influence, matrices...)
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
}

impl Constraint {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            target: None,
            properties: IndexMap::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// Rotation of a bone in the representation its mode selects.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Rotation {
    Euler([f32; 3], RotationMode),
    Quaternion([f32; 4]),
    AxisAngle([f32; 4]),
}

impl Rotation {
    pub fn mode(&self) -> RotationMode {
        match self {
            Rotation::Euler(_, mode) => *mode,
            Rotation::Quaternion(_) => RotationMode::Quaternion,
            Rotation::AxisAngle(_) => RotationMode::AxisAngle,
        }
    }

    /// Re-express this rotation in `target`'s representation.
    ///
    /// Same mode returns the values untouched. Euler orders are converted through a
    /// quaternion. Axis-angle on either side yields `None`.
    pub fn convert_to(&self, target: RotationMode) -> Option<Rotation> {
        if self.mode() == target {
            return Some(*self);
        }
        let q = match self {
            Rotation::Euler(e, mode) => euler_to_quaternion(*e, *mode)?,
            Rotation::Quaternion(q) => *q,
            Rotation::AxisAngle(_) => return None,
        };
        match target {
            RotationMode::Quaternion => Some(Rotation::Quaternion(q)),
            RotationMode::AxisAngle => None,
            euler => quaternion_to_euler(q, euler).map(|e| Rotation::Euler(e, euler)),
        }
    }
}

/// A pose bone: transform channels, lock flags, custom properties and constraints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default)]
    pub location: [f32; 3],
    #[serde(default)]
    pub rotation_mode: RotationMode,
    #[serde(default)]
    pub rotation_euler: [f32; 3],
    /// `[w, x, y, z]`
    #[serde(default = "identity_quaternion")]
    pub rotation_quaternion: [f32; 4],
    /// `[angle, x, y, z]`
    #[serde(default = "default_axis_angle")]
    pub rotation_axis_angle: [f32; 4],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
    #[serde(default)]
    pub lock_location: [bool; 3],
    #[serde(default)]
    pub lock_rotation: [bool; 3],
    #[serde(default)]
    pub lock_rotation_w: bool,
    #[serde(default)]
    pub lock_scale: [bool; 3],
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Bone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: [0.0; 3],
            rotation_mode: RotationMode::Quaternion,
            rotation_euler: [0.0; 3],
            rotation_quaternion: identity_quaternion(),
            rotation_axis_angle: default_axis_angle(),
            scale: unit_scale(),
            lock_location: [false; 3],
            lock_rotation: [false; 3],
            lock_rotation_w: false,
            lock_scale: [false; 3],
            properties: IndexMap::new(),
            selected: false,
            hidden: false,
            constraints: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: [f32; 3]) -> Self {
        self.location = location;
        self
    }

    pub fn with_euler(mut self, mode: RotationMode, angles: [f32; 3]) -> Self {
        self.rotation_mode = mode;
        self.rotation_euler = angles;
        self
    }

    pub fn with_quaternion(mut self, q: [f32; 4]) -> Self {
        self.rotation_mode = RotationMode::Quaternion;
        self.rotation_quaternion = q;
        self
    }

    pub fn with_scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    /// Selected and visible, the bones an operation acts on.
    pub fn is_active_selection(&self) -> bool {
        self.selected && !self.hidden
    }

    /// Current rotation in the bone's own mode.
    pub fn rotation(&self) -> Rotation {
        match self.rotation_mode {
            RotationMode::Quaternion => Rotation::Quaternion(self.rotation_quaternion),
            RotationMode::AxisAngle => Rotation::AxisAngle(self.rotation_axis_angle),
            euler => Rotation::Euler(self.rotation_euler, euler),
        }
    }

    /// Lock state of one channel component. Scalar channels are never locked.
    pub fn is_locked(&self, kind: &ChannelKind, index: usize) -> bool {
        let pick = |flags: &[bool; 3], i: usize| flags.get(i).copied().unwrap_or(false);
        match kind {
            ChannelKind::Location => pick(&self.lock_location, index),
            ChannelKind::RotationEuler => pick(&self.lock_rotation, index),
            ChannelKind::RotationQuaternion | ChannelKind::RotationAxisAngle => {
                if index == 0 {
                    self.lock_rotation_w
                } else {
                    pick(&self.lock_rotation, index - 1)
                }
            }
            ChannelKind::Scale => pick(&self.lock_scale, index),
            ChannelKind::RotationMode | ChannelKind::Property(_) => false,
        }
    }

    fn components(&self, kind: &ChannelKind) -> Option<&[f32]> {
        match kind {
            ChannelKind::Location => Some(&self.location[..]),
            ChannelKind::RotationEuler => Some(&self.rotation_euler[..]),
            ChannelKind::RotationQuaternion => Some(&self.rotation_quaternion[..]),
            ChannelKind::RotationAxisAngle => Some(&self.rotation_axis_angle[..]),
            ChannelKind::Scale => Some(&self.scale[..]),
            ChannelKind::RotationMode | ChannelKind::Property(_) => None,
        }
    }

    fn components_mut(&mut self, kind: &ChannelKind) -> Option<&mut [f32]> {
        match kind {
            ChannelKind::Location => Some(&mut self.location[..]),
            ChannelKind::RotationEuler => Some(&mut self.rotation_euler[..]),
            ChannelKind::RotationQuaternion => Some(&mut self.rotation_quaternion[..]),
            ChannelKind::RotationAxisAngle => Some(&mut self.rotation_axis_angle[..]),
            ChannelKind::Scale => Some(&mut self.scale[..]),
            ChannelKind::RotationMode | ChannelKind::Property(_) => None,
        }
    }

    fn component_index(kind: &ChannelKind, index: Option<usize>) -> Result<usize, ChannelError> {
        let arity = kind.arity().unwrap_or(0);
        match index {
            Some(i) if i < arity => Ok(i),
            Some(i) => Err(ChannelError::IndexOutOfRange {
                channel: kind.to_string(),
                arity,
                index: i as i32,
            }),
            None => Err(ChannelError::MissingIndex {
                channel: kind.to_string(),
            }),
        }
    }

    fn reject_index(kind: &ChannelKind, index: Option<usize>) -> Result<(), ChannelError> {
        match index {
            None => Ok(()),
            Some(i) => Err(ChannelError::UnexpectedIndex {
                channel: kind.to_string(),
                index: i as i32,
            }),
        }
    }

    /// Read one channel as the raw number a keyframe stores.
    pub fn get_channel(&self, kind: &ChannelKind, index: Option<usize>) -> Result<f32, ChannelError> {
        match kind {
            ChannelKind::RotationMode => {
                Self::reject_index(kind, index)?;
                Ok(self.rotation_mode.code() as f32)
            }
            ChannelKind::Property(key) => {
                let value = self
                    .properties
                    .get(key)
                    .ok_or_else(|| ChannelError::MissingProperty { key: key.clone() })?;
                to_float(value, index).ok_or_else(|| ChannelError::TypeMismatch {
                    channel: kind.to_string(),
                    reason: format!("{:?} property has no numeric reading", value.kind()),
                })
            }
            _ => {
                let i = Self::component_index(kind, index)?;
                Ok(self.components(kind).map(|values| values[i]).unwrap_or_default())
            }
        }
    }

    /// Write one raw keyframe value into a channel, coercing it to the channel's type.
    ///
    /// Rotation mode values go through the fixed mode-code table; property values keep
    /// the existing property's type.
    pub fn set_channel(
        &mut self,
        kind: &ChannelKind,
        index: Option<usize>,
        raw: f32,
    ) -> Result<(), ChannelError> {
        let mismatch = |reason: String| ChannelError::TypeMismatch {
            channel: kind.to_string(),
            reason,
        };
        match kind {
            ChannelKind::RotationMode => {
                Self::reject_index(kind, index)?;
                self.rotation_mode =
                    rotation_mode_from_raw(raw).map_err(|e| mismatch(e.to_string()))?;
            }
            ChannelKind::Property(key) => {
                let existing = self
                    .properties
                    .get(key)
                    .ok_or_else(|| ChannelError::MissingProperty { key: key.clone() })?;
                let value =
                    coerce_like(existing, raw, index).map_err(|e| mismatch(e.to_string()))?;
                self.properties.insert(key.clone(), value);
            }
            _ => {
                let i = Self::component_index(kind, index)?;
                if !raw.is_finite() {
                    return Err(mismatch(format!("non-finite value {raw}")));
                }
                if let Some(values) = self.components_mut(kind) {
                    values[i] = raw;
                }
            }
        }
        Ok(())
    }

    /// Overwrite the rotation with `rotation`, switching the mode to match.
    /// Locks are not consulted; callers write component-wise when locks matter.
    pub fn set_rotation(&mut self, rotation: Rotation) {
        match rotation {
            Rotation::Euler(e, mode) => {
                self.rotation_mode = mode;
                self.rotation_euler = e;
            }
            Rotation::Quaternion(q) => {
                self.rotation_mode = RotationMode::Quaternion;
                self.rotation_quaternion = q;
            }
            Rotation::AxisAngle(a) => {
                self.rotation_mode = RotationMode::AxisAngle;
                self.rotation_axis_angle = a;
            }
        }
    }

    /// Name for a new constraint on this bone, deduplicated with a `.NNN` suffix.
    pub fn unique_constraint_name(&self, base: &str) -> String {
        crate::scene::unique_name(base, |n| self.constraints.iter().any(|c| c.name == n))
    }
}
