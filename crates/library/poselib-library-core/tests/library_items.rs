use poselib_library_core::{
    item_dir_name, select_item_bones, update_selection_set, Config, ItemKind,
    JsonSceneFileReader, LibraryItem, ObjectId, PoseLibError, Scene, SceneFileReader,
};
use poselib_test_fixtures::{items, rigs};

fn biped_scene() -> (Scene, ObjectId) {
    let file = JsonSceneFileReader
        .read(&rigs::path("biped").expect("biped rig path"))
        .expect("read biped rig");
    let mut scene = Scene::new();
    let id = scene.import_object(&file, "biped").expect("import biped");
    scene.link_object(id);
    scene.select_only(id);
    (scene, id)
}

#[test]
fn fixture_items_load_with_kind_and_metadata() {
    let nod = LibraryItem::load(&items::path("nod").unwrap()).unwrap();
    assert_eq!(nod.kind, ItemKind::Animation);
    assert_eq!(nod.base_name(), "nod");
    assert_eq!(nod.metadata().frame_range(), Some((1, 24)));
    assert_eq!(nod.metadata().kind, Some(ItemKind::Animation));

    let pose = LibraryItem::load(&items::path("spine-twist").unwrap()).unwrap();
    assert_eq!(pose.metadata().bone_names, vec!["spine01", "spine02", "neck", "head"]);
    assert_eq!(pose.metadata().frame_range(), None);

    let set = LibraryItem::load(&items::path("torso").unwrap()).unwrap();
    assert_eq!(set.kind, ItemKind::SelectionSet);
    assert!(set.document.constraint_data.is_none());
}

#[test]
fn selection_set_selects_what_it_can() {
    let (mut scene, rig) = biped_scene();
    let set = LibraryItem::load(&items::path("torso").unwrap()).unwrap();
    let report = select_item_bones(&mut scene, set.metadata()).unwrap();
    assert_eq!(report.selected, vec!["spine01", "spine02", "neck"]);
    let skipped: Vec<_> = report.warnings.iter().map(|w| w.subject.as_str()).collect();
    assert_eq!(skipped, vec!["hand.R", "tail"]);
    assert_eq!(scene.selected_bones(rig), vec!["spine01", "spine02", "neck"]);
}

#[test]
fn selection_set_add_and_remove_rewrite_the_item() {
    let root = tempfile::tempdir().unwrap();
    let dir = items::copy_to("torso", root.path()).unwrap();
    let (mut scene, rig) = biped_scene();

    scene.clear_bone_selection();
    scene.bone_mut(rig, "head").unwrap().selected = true;
    scene.bone_mut(rig, "spine01").unwrap().selected = true;
    let report = update_selection_set(&mut scene, &dir, true).unwrap();
    assert_eq!(report.selected, vec!["spine01", "spine02", "neck", "head"]);
    let item = LibraryItem::load(&dir).unwrap();
    assert_eq!(item.metadata().content, "6 bone(s)");
    assert_eq!(item.metadata().bone_names.last().map(String::as_str), Some("head"));
    // untouched metadata survives the rewrite
    assert_eq!(item.metadata().user, "anim01");

    scene.clear_bone_selection();
    scene.bone_mut(rig, "neck").unwrap().selected = true;
    update_selection_set(&mut scene, &dir, false).unwrap();
    let item = LibraryItem::load(&dir).unwrap();
    assert_eq!(
        item.metadata().bone_names,
        vec!["spine01", "spine02", "hand.R", "tail", "head"]
    );
    assert_eq!(item.metadata().content, "5 bone(s)");
}

#[test]
fn selection_set_updates_need_a_selection_item() {
    let (mut scene, _rig) = biped_scene();
    let err = update_selection_set(&mut scene, &items::path("nod").unwrap(), true).unwrap_err();
    assert!(matches!(err, PoseLibError::LibraryFile { .. }));
}

#[test]
fn new_item_names_are_normalised() {
    assert_eq!(item_dir_name("  Arm Wave ", ItemKind::Pose).unwrap(), "Arm_Wave.pose");
    assert_eq!(
        item_dir_name("walk", ItemKind::Animation).unwrap(),
        "walk.anim"
    );
    for bad in ["", "   ", "a/b", ".hidden"] {
        assert!(
            matches!(
                item_dir_name(bad, ItemKind::SelectionSet),
                Err(PoseLibError::InvalidName { .. })
            ),
            "{bad:?}"
        );
    }
}

#[test]
fn config_overrides_fall_back_to_defaults() {
    let config = Config::from_json_str(r#"{ "constraint_suffix": "_LIB", "float_epsilon": 0.001 }"#)
        .unwrap();
    assert_eq!(config.constraint_suffix, "_LIB");
    assert_eq!(config.float_epsilon, 0.001);
    assert_eq!(config.pose_file, "pose.blend");
    assert!(config.is_excluded_constraint_property("rna_type"));
}
