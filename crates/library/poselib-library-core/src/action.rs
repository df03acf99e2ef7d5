//! Actions, f-curves and keyframes.
//!
//! An action is an ordered set of f-curves. Each f-curve addresses one channel
//! component (`data_path` + `array_index`, `-1` for scalar channels) and owns keyframes
//! kept sorted by frame.

use poselib_api_core::{ChannelError, ChannelPath};
use serde::{Deserialize, Serialize};

use crate::ids::ActionId;

/// Keys closer than this on the frame axis are the same key.
pub const FRAME_EPSILON: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: f32,
    pub value: f32,
}

fn scalar_index() -> i32 {
    -1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FCurve {
    /// Host data path, e.g. `pose.bones["spine01"].location`.
    /// Kept verbatim so curves on channels the engine does not model survive a load.
    pub data_path: String,
    #[serde(default = "scalar_index")]
    pub array_index: i32,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
    /// Channel group name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl FCurve {
    pub fn new(data_path: impl Into<String>, array_index: i32) -> Self {
        Self {
            data_path: data_path.into(),
            array_index,
            keyframes: Vec::new(),
            group: None,
        }
    }

    /// Typed view of the data path.
    pub fn channel(&self) -> Result<ChannelPath, ChannelError> {
        ChannelPath::parse(&self.data_path)
    }

    /// Bone named by the data path, if it addresses a bone at all.
    pub fn bone_name(&self) -> Option<String> {
        ChannelPath::bone_of(&self.data_path)
    }

    /// Component index, `None` for scalar curves.
    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.array_index).ok()
    }

    /// Insert a key, replacing any key at the same frame. Keeps frame order.
    pub fn insert(&mut self, frame: f32, value: f32) {
        match self
            .keyframes
            .iter()
            .position(|k| (k.frame - frame).abs() < FRAME_EPSILON)
        {
            Some(i) => self.keyframes[i] = Keyframe { frame, value },
            None => {
                let at = self.keyframes.partition_point(|k| k.frame < frame);
                self.keyframes.insert(at, Keyframe { frame, value });
            }
        }
    }

    /// Remove every key with `start <= frame <= end`. Returns the number removed.
    pub fn delete_range(&mut self, start: f32, end: f32) -> usize {
        let before = self.keyframes.len();
        self.keyframes
            .retain(|k| k.frame < start - FRAME_EPSILON || k.frame > end + FRAME_EPSILON);
        before - self.keyframes.len()
    }

    /// Keys whose frame lies inside `[start, end]`.
    pub fn keys_in(&self, start: f32, end: f32) -> impl Iterator<Item = &Keyframe> + '_ {
        self.keyframes
            .iter()
            .filter(move |k| k.frame >= start && k.frame <= end)
    }

    pub fn value_at(&self, frame: f32) -> Option<f32> {
        self.keyframes
            .iter()
            .find(|k| (k.frame - frame).abs() < FRAME_EPSILON)
            .map(|k| k.value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Assigned when the action enters a scene.
    #[serde(skip)]
    pub id: Option<ActionId>,
    pub name: String,
    #[serde(default)]
    pub fcurves: Vec<FCurve>,
    /// Channel group names in creation order.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            fcurves: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn fcurve(&self, data_path: &str, array_index: i32) -> Option<&FCurve> {
        self.fcurves
            .iter()
            .find(|fc| fc.data_path == data_path && fc.array_index == array_index)
    }

    pub fn fcurve_mut(&mut self, data_path: &str, array_index: i32) -> Option<&mut FCurve> {
        self.fcurves
            .iter_mut()
            .find(|fc| fc.data_path == data_path && fc.array_index == array_index)
    }

    /// Find or create the curve for (`data_path`, `array_index`).
    pub fn ensure_fcurve(&mut self, data_path: &str, array_index: i32) -> &mut FCurve {
        let pos = match self
            .fcurves
            .iter()
            .position(|fc| fc.data_path == data_path && fc.array_index == array_index)
        {
            Some(pos) => pos,
            None => {
                self.fcurves.push(FCurve::new(data_path, array_index));
                self.fcurves.len() - 1
            }
        };
        &mut self.fcurves[pos]
    }

    /// Put every ungrouped curve that addresses a bone into a group named after the
    /// bone, creating groups on first use. Already grouped curves are left alone.
    pub fn group_by_bone(&mut self) {
        for fc in self.fcurves.iter_mut() {
            if fc.group.is_some() {
                continue;
            }
            if let Some(bone) = fc.bone_name() {
                if !self.groups.iter().any(|g| *g == bone) {
                    self.groups.push(bone.clone());
                }
                fc.group = Some(bone);
            }
        }
    }

    pub fn key_count(&self) -> usize {
        self.fcurves.iter().map(|fc| fc.keyframes.len()).sum()
    }

    /// Frame span covered by keys, `None` for an empty action.
    pub fn frame_range(&self) -> Option<(f32, f32)> {
        let mut frames = self.fcurves.iter().flat_map(|fc| fc.keyframes.iter().map(|k| k.frame));
        let first = frames.next()?;
        Some(frames.fold((first, first), |(lo, hi), f| (lo.min(f), hi.max(f))))
    }

    /// Validate basic invariants (finite keys, frame-sorted curves, parseable paths).
    pub fn validate_basic(&self) -> Result<(), String> {
        for fc in &self.fcurves {
            let mut last = -f32::INFINITY;
            for k in &fc.keyframes {
                if !k.frame.is_finite() || !k.value.is_finite() {
                    return Err(format!(
                        "keyframe on '{}'[{}] must be finite",
                        fc.data_path, fc.array_index
                    ));
                }
                if k.frame < last {
                    return Err(format!(
                        "keyframes on '{}'[{}] must be sorted by frame",
                        fc.data_path, fc.array_index
                    ));
                }
                last = k.frame;
            }
        }
        Ok(())
    }
}
