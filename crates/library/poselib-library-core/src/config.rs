//! Library configuration: file names and naming conventions used by the engines.

use serde::{Deserialize, Serialize};

/// Configuration for library file layout and generated names.
/// Every field has a default, so partial JSON overrides are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scene file stored inside `.pose` items.
    pub pose_file: String,
    /// Scene file stored inside `.anim` items.
    pub animation_file: String,
    /// Appended to the name of every constraint created from a constraint set.
    pub constraint_suffix: String,
    /// Appended to the item base name when quick-pasting an action.
    pub quick_paste_action_suffix: String,
    /// Recorded constraint properties that are host bookkeeping, never written back.
    pub excluded_constraint_properties: Vec<String>,
    /// Tolerance of the BonesToBlend comparison. 0 compares exactly.
    pub float_epsilon: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pose_file: "pose.blend".into(),
            animation_file: "animation.blend".into(),
            constraint_suffix: "_POSELIB".into(),
            quick_paste_action_suffix: "_ACTION".into(),
            excluded_constraint_properties: [
                "type",
                "rna_type",
                "name",
                "is_override_data",
                "is_valid",
                "error_location",
                "error_rotation",
                "target",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            float_epsilon: 0.0,
        }
    }
}

impl Config {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn is_excluded_constraint_property(&self, name: &str) -> bool {
        self.excluded_constraint_properties.iter().any(|p| p == name)
    }
}
