//! Orphan cleanup for library-imported helper data.

use crate::ids::ObjectId;
use crate::scene::{DataCounts, Scene};

/// Remove every collection, object and armature datablock with zero users.
///
/// Collections go first (with the objects only they held), then unlinked objects,
/// then armature data no object points at. Returns how many of each were removed.
pub fn remove_orphans(scene: &mut Scene) -> DataCounts {
    let mut removed = DataCounts::default();

    // Removing a collection can orphan its children, so repeat until stable.
    loop {
        let orphans: Vec<_> = scene
            .collections()
            .filter(|c| scene.collection_users(c.id) == 0)
            .map(|c| c.id)
            .collect();
        if orphans.is_empty() {
            break;
        }
        for id in orphans {
            if scene.remove_collection(id).is_some() {
                removed.collections += 1;
            }
        }
    }

    let objects: Vec<_> = scene
        .objects()
        .filter(|o| scene.object_users(o.id) == 0)
        .map(|o| o.id)
        .collect();
    for id in objects {
        if scene.remove_object(id).is_some() {
            removed.objects += 1;
        }
    }

    let armatures: Vec<_> = scene
        .armatures()
        .filter(|a| scene.armature_users(a.id) == 0)
        .map(|a| a.id)
        .collect();
    for id in armatures {
        if scene.remove_armature(id).is_some() {
            removed.armatures += 1;
        }
    }

    if removed != DataCounts::default() {
        log::debug!(
            "removed orphans: {} objects, {} armatures, {} collections",
            removed.objects,
            removed.armatures,
            removed.collections
        );
    }
    removed
}

/// Delete an imported reference object, then sweep everything it orphaned.
pub fn delete_reference(scene: &mut Scene, object: ObjectId) -> DataCounts {
    let mut removed = DataCounts::default();
    if scene.remove_object(object).is_some() {
        removed.objects += 1;
    }
    let swept = remove_orphans(scene);
    DataCounts {
        objects: removed.objects + swept.objects,
        armatures: swept.armatures,
        actions: swept.actions,
        collections: swept.collections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::Bone;
    use crate::scene_file::{ObjectData, ObjectType, SceneFile};

    #[test]
    fn imported_reference_leaves_no_residue() {
        let mut scene = Scene::new();
        scene.add_armature_object("rig", vec![Bone::new("spine01")]);
        let baseline = scene.counts();

        let file = SceneFile {
            source: None,
            objects: vec![ObjectData {
                name: "rig".into(),
                kind: ObjectType::Armature,
                bones: vec![Bone::new("spine01")],
            }],
            actions: Vec::new(),
        };
        let reference = scene.import_object(&file, "rig").unwrap();
        assert_eq!(scene.object(reference).unwrap().name, "rig.001");
        assert_eq!(scene.counts().objects, baseline.objects + 1);

        let removed = delete_reference(&mut scene, reference);
        assert_eq!(removed.objects, 1);
        assert_eq!(removed.armatures, 1);
        assert_eq!(scene.counts(), baseline);
    }

    #[test]
    fn nested_orphan_collections_are_swept() {
        let mut scene = Scene::new();
        let keep = scene.add_object("keep", ObjectType::Empty);
        let outer = scene.new_collection("outer", None);
        let inner = scene.new_collection("inner", Some(outer));
        let held = scene.add_object("held", ObjectType::Mesh);
        scene.unlink_object(held);
        scene.link_to_collection(inner, held);
        scene.unlink_collection(outer);

        let removed = remove_orphans(&mut scene);
        assert_eq!(removed.collections, 2);
        assert_eq!(removed.objects, 1);
        assert!(scene.object(keep).is_some());
        assert_eq!(scene.counts().collections, 0);
    }
}
