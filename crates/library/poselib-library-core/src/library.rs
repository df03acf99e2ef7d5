//! Library items on disk: item kinds, JSON metadata and selection-set operations.
//!
//! ```text
//! <folder>/<name>.pose/        pose.blend  pose.json
//! <folder>/<name>.anim/        animation.blend  animation.json
//! <folder>/<name>.selection/   selection_set.json
//! <folder>/<name>.constraint/  constraint_set.json
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::constraints::ConstraintData;
use crate::error::{PoseLibError, PoseLibResult, SelectionReport, Warning};
use crate::scene::Scene;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    #[serde(rename = "POSE")]
    Pose,
    #[serde(rename = "ANIMATION")]
    Animation,
    #[serde(rename = "SELECTION SET")]
    SelectionSet,
    #[serde(rename = "CONSTRAINT SET")]
    ConstraintSet,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [
        ItemKind::Pose,
        ItemKind::Animation,
        ItemKind::SelectionSet,
        ItemKind::ConstraintSet,
    ];

    /// Directory suffix, without the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            ItemKind::Pose => "pose",
            ItemKind::Animation => "anim",
            ItemKind::SelectionSet => "selection",
            ItemKind::ConstraintSet => "constraint",
        }
    }

    pub fn metadata_file(self) -> &'static str {
        match self {
            ItemKind::Pose => "pose.json",
            ItemKind::Animation => "animation.json",
            ItemKind::SelectionSet => "selection_set.json",
            ItemKind::ConstraintSet => "constraint_set.json",
        }
    }

    /// Scene file stored next to the metadata, if the kind has one.
    pub fn scene_file(self, config: &Config) -> Option<&str> {
        match self {
            ItemKind::Pose => Some(&config.pose_file),
            ItemKind::Animation => Some(&config.animation_file),
            ItemKind::SelectionSet | ItemKind::ConstraintSet => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Pose => "POSE",
            ItemKind::Animation => "ANIMATION",
            ItemKind::SelectionSet => "SELECTION SET",
            ItemKind::ConstraintSet => "CONSTRAINT SET",
        }
    }

    /// Kind named by an item directory's suffix; folders yield `None`.
    pub fn from_dir(dir: &Path) -> Option<Self> {
        let ext = dir.extension()?.to_str()?;
        Self::ALL.into_iter().find(|k| k.suffix() == ext)
    }
}

/// The `metadata` object of an item JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemMetadata {
    pub name: String,
    /// Bones selected when the item was authored.
    #[serde(rename = "boneNames")]
    pub bone_names: Vec<String>,
    pub objects: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ItemKind>,
    pub user: String,
    pub date: String,
    pub content: String,
    /// `"<in>-<out>"`
    #[serde(rename = "frameRange")]
    pub frame_range: String,
    /// Keys this crate does not interpret, kept for round trips.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl ItemMetadata {
    /// Parse `frameRange`. `None` when it is absent or malformed.
    pub fn frame_range(&self) -> Option<(i32, i32)> {
        let (start, end) = self.frame_range.trim().split_once('-')?;
        Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
    }

    pub fn set_frame_range(&mut self, start: i32, end: i32) {
        self.frame_range = format!("{start}-{end}");
    }
}

/// Whole item JSON document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDocument {
    #[serde(default)]
    pub metadata: ItemMetadata,
    #[serde(
        rename = "constraintData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub constraint_data: Option<ConstraintData>,
}

/// A loaded library item directory.
#[derive(Clone, Debug, PartialEq)]
pub struct LibraryItem {
    pub dir: PathBuf,
    pub kind: ItemKind,
    pub document: ItemDocument,
}

impl LibraryItem {
    /// Read the item in `dir`; the kind comes from the directory suffix.
    pub fn load(dir: &Path) -> PoseLibResult<Self> {
        let kind = ItemKind::from_dir(dir)
            .ok_or_else(|| PoseLibError::library_file(dir, "not a library item directory"))?;
        let path = dir.join(kind.metadata_file());
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PoseLibError::library_file(&path, "metadata file is missing"),
            _ => PoseLibError::io(&path, e),
        })?;
        let document = serde_json::from_str(&text).map_err(|e| PoseLibError::json(&path, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            kind,
            document,
        })
    }

    pub fn metadata(&self) -> &ItemMetadata {
        &self.document.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ItemMetadata {
        &mut self.document.metadata
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(self.kind.metadata_file())
    }

    /// Base name: the directory name up to its first dot.
    pub fn base_name(&self) -> String {
        item_base_name(&self.dir)
    }

    pub fn save(&self) -> PoseLibResult<()> {
        write_item(&self.dir, self.kind, &self.document)
    }
}

pub(crate) fn item_base_name(dir: &Path) -> String {
    dir.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .unwrap_or_default()
        .to_string()
}

/// Directory name for a new item: surrounding whitespace trimmed, inner spaces
/// replaced with `_`, kind suffix appended.
pub fn item_dir_name(name: &str, kind: ItemKind) -> PoseLibResult<String> {
    let trimmed = name.trim();
    let invalid = |reason: &str| PoseLibError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid("name is empty"));
    }
    if trimmed.contains(['/', '\\']) {
        return Err(invalid("name contains a path separator"));
    }
    if trimmed.starts_with('.') {
        return Err(invalid("name starts with a dot"));
    }
    Ok(format!("{}.{}", trimmed.replace(' ', "_"), kind.suffix()))
}

/// Write an item's metadata JSON: keys sorted, 4-space indentation.
///
/// Sorting applies at every level, `constraintData` included, so a constraint
/// stack reads back in name order rather than stack order.
pub fn write_item(dir: &Path, kind: ItemKind, document: &ItemDocument) -> PoseLibResult<()> {
    let path = dir.join(kind.metadata_file());
    // Round-tripping through `serde_json::Value` sorts object keys.
    let value = serde_json::to_value(document).map_err(|e| PoseLibError::json(&path, e))?;
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| PoseLibError::json(&path, e))?;
    fs::create_dir_all(dir).map_err(|e| PoseLibError::io(dir, e))?;
    fs::write(&path, out).map_err(|e| PoseLibError::io(&path, e))
}

/// Clear every bone selection, then select the item's bones on the single selected
/// rig. Bones that end up unselected (missing or hidden) are reported.
pub fn select_item_bones(
    scene: &mut Scene,
    metadata: &ItemMetadata,
) -> PoseLibResult<SelectionReport> {
    let rig = scene.single_selected_rig()?;
    scene.clear_bone_selection();
    let mut report = SelectionReport::default();
    for name in &metadata.bone_names {
        match scene.bone_mut(rig, name) {
            Some(bone) => bone.selected = true,
            None => log::debug!("bone '{name}' not found"),
        }
    }
    let selected = scene.selected_bones(rig);
    for name in &metadata.bone_names {
        if selected.contains(name) {
            report.selected.push(name.clone());
        } else {
            report.warnings.push(Warning::new(
                name.as_str(),
                "could not be selected (hidden or non-existent)",
            ));
        }
    }
    Ok(report)
}

/// Add the selected bones to a selection-set item, or remove them, then rewrite
/// its metadata and reselect its bones.
pub fn update_selection_set(
    scene: &mut Scene,
    item_dir: &Path,
    add: bool,
) -> PoseLibResult<SelectionReport> {
    let mut item = LibraryItem::load(item_dir)?;
    if item.kind != ItemKind::SelectionSet {
        return Err(PoseLibError::library_file(
            item.metadata_path(),
            format!("{} item is not a selection set", item.kind.as_str()),
        ));
    }
    let rig = scene.single_selected_rig()?;
    let selected = scene.selected_bones(rig);
    let metadata = item.metadata_mut();
    for bone in selected {
        let present = metadata.bone_names.contains(&bone);
        if add && !present {
            metadata.bone_names.push(bone);
        } else if !add && present {
            metadata.bone_names.retain(|b| *b != bone);
        }
    }
    metadata.content = format!("{} bone(s)", metadata.bone_names.len());
    item.save()?;
    log::debug!("selection set {} now holds {}", item_dir.display(), item.metadata().content);
    select_item_bones(scene, item.metadata())
}
