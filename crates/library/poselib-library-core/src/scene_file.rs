//! Scene files: the serialised content of `pose.blend` / `animation.blend`.
//!
//! Reading is a seam (`SceneFileReader`) so hosts can plug in their own format. The
//! JSON encoding below is what the standalone tools and tests use.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::{PoseLibError, PoseLibResult};
use crate::rig::Bone;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    #[default]
    #[serde(rename = "ARMATURE")]
    Armature,
    #[serde(rename = "MESH")]
    Mesh,
    #[serde(rename = "EMPTY")]
    Empty,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Armature => "ARMATURE",
            ObjectType::Mesh => "MESH",
            ObjectType::Empty => "EMPTY",
        }
    }
}

/// A top-level object stored in a scene file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ObjectType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bones: Vec<Bone>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    /// Where the file was read from (diagnostics only).
    #[serde(skip)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub objects: Vec<ObjectData>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl SceneFile {
    pub fn path(&self) -> &Path {
        self.source.as_deref().unwrap_or_else(|| Path::new("<memory>"))
    }

    /// Top-level object names, without materialising anything.
    pub fn object_names(&self) -> Vec<&str> {
        self.objects.iter().map(|o| o.name.as_str()).collect()
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn object(&self, name: &str) -> Option<&ObjectData> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// The name of the only object in the file; zero or several is a library error.
    pub fn single_object(&self) -> PoseLibResult<&str> {
        match self.object_names()[..] {
            [only] => Ok(only),
            ref names => Err(PoseLibError::library_file(
                self.path(),
                format!("file contains {} objects, expected exactly one", names.len()),
            )),
        }
    }

    /// The name of the only action in the file; zero or several is a library error.
    pub fn single_action(&self) -> PoseLibResult<&str> {
        match self.action_names()[..] {
            [only] => Ok(only),
            ref names => Err(PoseLibError::library_file(
                self.path(),
                format!("file contains {} actions, expected exactly one", names.len()),
            )),
        }
    }
}

/// Loads scene files from storage.
pub trait SceneFileReader {
    fn read(&self, path: &Path) -> PoseLibResult<SceneFile>;
}

/// Reads the JSON scene-file encoding.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonSceneFileReader;

impl SceneFileReader for JsonSceneFileReader {
    fn read(&self, path: &Path) -> PoseLibResult<SceneFile> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PoseLibError::library_file(path, "scene file is missing"),
            _ => PoseLibError::io(path, e),
        })?;
        let mut file: SceneFile =
            serde_json::from_str(&text).map_err(|e| PoseLibError::json(path, e))?;
        file.source = Some(path.to_path_buf());
        Ok(file)
    }
}

/// Scene files held in memory, keyed by path. Useful for hosts that stage files
/// before writing them and for tests.
#[derive(Clone, Debug, Default)]
pub struct MemorySceneFileReader {
    files: HashMap<PathBuf, SceneFile>,
}

impl MemorySceneFileReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, file: SceneFile) {
        self.files.insert(path.into(), file);
    }
}

impl SceneFileReader for MemorySceneFileReader {
    fn read(&self, path: &Path) -> PoseLibResult<SceneFile> {
        let mut file = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| PoseLibError::library_file(path, "scene file is missing"))?;
        file.source = Some(path.to_path_buf());
        Ok(file)
    }
}

/// Write a scene file in the JSON encoding.
pub fn write_scene_file(path: &Path, file: &SceneFile) -> PoseLibResult<()> {
    let text = serde_json::to_string_pretty(file).map_err(|e| PoseLibError::json(path, e))?;
    fs::write(path, text).map_err(|e| PoseLibError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_entity_checks() {
        let mut file = SceneFile::default();
        assert!(matches!(
            file.single_object(),
            Err(PoseLibError::LibraryFile { .. })
        ));
        file.objects.push(ObjectData {
            name: "rig".into(),
            kind: ObjectType::Armature,
            bones: vec![Bone::new("spine")],
        });
        assert_eq!(file.single_object().unwrap(), "rig");
        file.objects.push(ObjectData {
            name: "rig2".into(),
            kind: ObjectType::Armature,
            bones: Vec::new(),
        });
        let err = file.single_object().unwrap_err();
        assert!(err.to_string().contains("2 objects"));
    }

    #[test]
    fn json_reader_reports_missing_file_as_library_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonSceneFileReader
            .read(&dir.path().join("pose.blend"))
            .unwrap_err();
        assert!(matches!(err, PoseLibError::LibraryFile { .. }));
    }

    #[test]
    fn json_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("animation.blend");
        let mut action = Action::new("walk");
        action
            .ensure_fcurve("pose.bones[\"spine\"].location", 1)
            .insert(10.0, 5.0);
        let file = SceneFile {
            source: None,
            objects: Vec::new(),
            actions: vec![action],
        };
        write_scene_file(&path, &file).unwrap();
        let back = JsonSceneFileReader.read(&path).unwrap();
        assert_eq!(back.single_action().unwrap(), "walk");
        assert_eq!(back.source.as_deref(), Some(path.as_path()));
        assert_eq!(back.actions, file.actions);
    }
}
