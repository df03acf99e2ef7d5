//! PoseSnapshot: the fixed "before" state a blend session interpolates from.

use indexmap::IndexMap;
use poselib_api_core::{RotationMode, Value};

use crate::error::PoseLibResult;
use crate::ids::ObjectId;
use crate::rig::{Bone, Rotation};
use crate::scene::Scene;

/// Transform state of one bone, rotation kept in the bone's own mode.
#[derive(Clone, Debug, PartialEq)]
pub struct BoneSnapshot {
    pub rotation: Rotation,
    pub location: [f32; 3],
    pub scale: [f32; 3],
    pub properties: IndexMap<String, Value>,
}

impl BoneSnapshot {
    pub fn of(bone: &Bone) -> Self {
        Self {
            rotation: bone.rotation(),
            location: bone.location,
            scale: bone.scale,
            properties: bone.properties.clone(),
        }
    }

    pub fn rotation_mode(&self) -> RotationMode {
        self.rotation.mode()
    }
}

/// Every bone of one rig, keyed by bone name.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseSnapshot {
    /// Name of the rig object at capture time.
    pub object: String,
    pub bones: IndexMap<String, BoneSnapshot>,
}

impl PoseSnapshot {
    /// Snapshot the single selected rig. Fails with a selection error, without
    /// touching the scene, unless exactly one armature object is selected.
    pub fn capture(scene: &Scene) -> PoseLibResult<Self> {
        let rig = scene.single_selected_rig()?;
        Ok(Self::capture_object(scene, rig))
    }

    /// Snapshot every bone of `object`. Non-armature objects yield an empty snapshot.
    pub fn capture_object(scene: &Scene, object: ObjectId) -> Self {
        let name = scene
            .object(object)
            .map(|o| o.name.clone())
            .unwrap_or_default();
        let bones = scene
            .bones(object)
            .map(|bones| {
                bones
                    .values()
                    .map(|b| (b.name.clone(), BoneSnapshot::of(b)))
                    .collect()
            })
            .unwrap_or_default();
        log::debug!("captured pose of '{name}'");
        Self {
            object: name,
            bones,
        }
    }

    pub fn bone(&self, name: &str) -> Option<&BoneSnapshot> {
        self.bones.get(name)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PoseLibError, SelectionError};
    use crate::scene_file::ObjectType;

    #[test]
    fn capture_covers_every_bone_verbatim() {
        let mut scene = Scene::new();
        let rig = scene.add_armature_object(
            "rig",
            vec![
                Bone::new("spine01").with_euler(RotationMode::Zyx, [0.1, 0.2, 0.3]),
                Bone::new("head")
                    .with_location([0.0, 1.0, 0.0])
                    .with_property("look", Value::Float(0.5)),
            ],
        );
        scene.set_selected(rig, true);

        let snap = PoseSnapshot::capture(&scene).unwrap();
        assert_eq!(snap.object, "rig");
        assert_eq!(snap.len(), 2);
        assert_eq!(
            snap.bone("spine01").unwrap().rotation,
            Rotation::Euler([0.1, 0.2, 0.3], RotationMode::Zyx)
        );
        let head = snap.bone("head").unwrap();
        assert_eq!(head.rotation_mode(), RotationMode::Quaternion);
        assert_eq!(head.location, [0.0, 1.0, 0.0]);
        assert_eq!(head.properties["look"], Value::Float(0.5));
    }

    #[test]
    fn capture_requires_one_rig() {
        let mut scene = Scene::new();
        assert!(matches!(
            PoseSnapshot::capture(&scene),
            Err(PoseLibError::Selection(SelectionError::WrongCount { found: 0, .. }))
        ));
        let cube = scene.add_object("cube", ObjectType::Mesh);
        scene.set_selected(cube, true);
        assert!(matches!(
            PoseSnapshot::capture(&scene),
            Err(PoseLibError::Selection(SelectionError::WrongType { .. }))
        ));
    }
}
