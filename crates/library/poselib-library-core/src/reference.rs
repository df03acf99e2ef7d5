//! ReferencePoseLoader: imports a stored pose as a hidden, detached reference object.
//!
//! The reference only lives inside a [`ReferencePose`] guard; dropping the guard
//! deletes the object and sweeps orphaned data, on success and on error alike.

use std::ops::{Deref, DerefMut};
use std::path::Path;

use crate::cleanup::delete_reference;
use crate::config::Config;
use crate::error::{PoseLibError, PoseLibResult};
use crate::ids::ObjectId;
use crate::scene::Scene;
use crate::scene_file::SceneFileReader;

/// Scoped handle to an imported reference object. Derefs to the scene.
pub struct ReferencePose<'s> {
    scene: &'s mut Scene,
    object: ObjectId,
}

impl<'s> ReferencePose<'s> {
    /// Load `<item_dir>/<pose_file>`, which must hold exactly one armature object.
    ///
    /// Reference bones whose names appear in `selection` are marked selected; all
    /// others are deselected.
    pub fn load(
        scene: &'s mut Scene,
        reader: &dyn SceneFileReader,
        item_dir: &Path,
        config: &Config,
        selection: &[String],
    ) -> PoseLibResult<Self> {
        let path = item_dir.join(&config.pose_file);
        let file = reader.read(&path)?;
        let name = file.single_object()?;
        let object = scene.import_object(&file, name)?;
        let mut guard = ReferencePose { scene, object };

        if guard.scene.bones(object).is_none() {
            return Err(PoseLibError::library_file(
                &path,
                format!("object '{name}' is not an armature"),
            ));
        }
        if let Some(bones) = guard.scene.bones_mut(object) {
            for bone in bones.values_mut() {
                bone.selected = selection.iter().any(|s| *s == bone.name);
            }
        }
        log::debug!("loaded reference pose from {}", path.display());
        Ok(guard)
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Split into the scene and the reference id for calls that need both.
    pub fn parts(&mut self) -> (&mut Scene, ObjectId) {
        (&mut *self.scene, self.object)
    }
}

impl Deref for ReferencePose<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        &*self.scene
    }
}

impl DerefMut for ReferencePose<'_> {
    fn deref_mut(&mut self) -> &mut Scene {
        &mut *self.scene
    }
}

impl Drop for ReferencePose<'_> {
    fn drop(&mut self) {
        delete_reference(&mut *self.scene, self.object);
    }
}

/// Run `f` against a freshly loaded reference pose, deleting it afterwards whatever
/// `f` returns.
pub fn with_reference_pose<T>(
    scene: &mut Scene,
    reader: &dyn SceneFileReader,
    item_dir: &Path,
    config: &Config,
    selection: &[String],
    f: impl FnOnce(&mut Scene, ObjectId) -> PoseLibResult<T>,
) -> PoseLibResult<T> {
    let mut reference = ReferencePose::load(scene, reader, item_dir, config, selection)?;
    let (scene, object) = reference.parts();
    f(scene, object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::Bone;
    use crate::scene_file::{MemorySceneFileReader, ObjectData, ObjectType, SceneFile};

    fn pose_file(objects: Vec<ObjectData>) -> SceneFile {
        SceneFile {
            source: None,
            objects,
            actions: Vec::new(),
        }
    }

    fn rig_data(name: &str) -> ObjectData {
        ObjectData {
            name: name.into(),
            kind: ObjectType::Armature,
            bones: vec![Bone::new("spine01"), Bone::new("head")],
        }
    }

    #[test]
    fn reference_is_hidden_detached_and_marked() {
        let mut reader = MemorySceneFileReader::new();
        reader.insert("lib/a.pose/pose.blend", pose_file(vec![rig_data("rig")]));
        let mut scene = Scene::new();
        let baseline = scene.counts();
        let selection = vec!["head".to_string()];

        let seen = with_reference_pose(
            &mut scene,
            &reader,
            Path::new("lib/a.pose"),
            &Config::default(),
            &selection,
            |scene, reference| {
                let object = scene.object(reference).unwrap();
                assert!(object.hide_viewport && object.hide_render && !object.selected);
                assert_eq!(scene.object_users(reference), 0);
                Ok(scene.selected_bones(reference))
            },
        )
        .unwrap();
        assert_eq!(seen, vec!["head".to_string()]);
        assert_eq!(scene.counts(), baseline);
    }

    #[test]
    fn cleanup_runs_when_the_body_fails() {
        let mut reader = MemorySceneFileReader::new();
        reader.insert("a.pose/pose.blend", pose_file(vec![rig_data("rig")]));
        let mut scene = Scene::new();
        let baseline = scene.counts();
        let result: PoseLibResult<()> = with_reference_pose(
            &mut scene,
            &reader,
            Path::new("a.pose"),
            &Config::default(),
            &[],
            |_, _| Err(PoseLibError::Blend("boom".into())),
        );
        assert!(matches!(result, Err(PoseLibError::Blend(_))));
        assert_eq!(scene.counts(), baseline);
    }

    #[test]
    fn file_must_hold_exactly_one_armature() {
        let mut reader = MemorySceneFileReader::new();
        reader.insert(
            "two.pose/pose.blend",
            pose_file(vec![rig_data("a"), rig_data("b")]),
        );
        reader.insert(
            "mesh.pose/pose.blend",
            pose_file(vec![ObjectData {
                name: "cube".into(),
                kind: ObjectType::Mesh,
                bones: Vec::new(),
            }]),
        );
        let mut scene = Scene::new();
        let config = Config::default();
        for dir in ["two.pose", "mesh.pose", "missing.pose"] {
            let err = ReferencePose::load(&mut scene, &reader, Path::new(dir), &config, &[])
                .err()
                .unwrap();
            assert!(matches!(err, PoseLibError::LibraryFile { .. }), "{dir}: {err}");
        }
        assert_eq!(scene.counts(), Default::default());
    }
}
