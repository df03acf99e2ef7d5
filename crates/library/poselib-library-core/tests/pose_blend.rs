use poselib_library_core::{
    blend_pose, paste_pose, with_reference_pose, BlendMode, BlendParams, BonesToBlend, Config,
    JsonSceneFileReader, ObjectId, PoseLibError, PoseSnapshot, RotationMode, Scene,
    SceneFileReader, Value,
};
use poselib_test_fixtures::{items, rigs};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

/// The biped fixture linked into a fresh scene with the rig selected.
fn biped_scene() -> (Scene, ObjectId) {
    let file = JsonSceneFileReader
        .read(&rigs::path("biped").expect("biped rig path"))
        .expect("read biped rig");
    let mut scene = Scene::new();
    let mut rig = None;
    for name in file.object_names() {
        let id = scene.import_object(&file, name).expect("import rig object");
        scene.link_object(id);
        let object = scene.object_mut(id).expect("imported object");
        object.hide_viewport = false;
        object.hide_render = false;
        if name == "biped" {
            rig = Some(id);
        }
    }
    let rig = rig.expect("biped object in fixture");
    scene.select_only(rig);
    (scene, rig)
}

fn paste(scene: &mut Scene, item: &str, factor: f32, additive: bool) -> Result<(), PoseLibError> {
    let dir = items::path(item).expect("fixture item");
    paste_pose(
        scene,
        &JsonSceneFileReader,
        &dir,
        &Config::default(),
        factor,
        additive,
        None,
    )
    .map(|_| ())
}

#[test]
fn half_blend_of_spine_scenario() {
    let (mut scene, rig) = biped_scene();
    let baseline = scene.counts();
    paste(&mut scene, "spine-twist", 0.5, false).expect("paste pose");

    let spine = scene.bone(rig, "spine01").unwrap();
    assert_eq!(spine.rotation_mode, RotationMode::Xyz);
    approx(spine.location[0], 0.0, 1e-6);
    approx(spine.location[1], 1.0, 1e-6);
    approx(spine.location[2], 0.0, 1e-6);
    approx(spine.rotation_euler[2], 0.25, 1e-6);
    assert_eq!(spine.scale, [1.0, 1.0, 1.0]);

    // float property lerped, text property copied
    let neck = scene.bone(rig, "neck").unwrap();
    assert_eq!(neck.properties["stretch"], Value::Float(0.5));
    assert_eq!(neck.properties["space"], Value::text("WORLD"));

    // root is authored in the pose but not selected on the rig
    assert_eq!(scene.bone(rig, "root").unwrap().location, [0.0; 3]);

    // no keys without auto-keying, no leftover reference data
    assert!(scene.object(rig).unwrap().action.is_none());
    assert_eq!(scene.counts(), baseline);
}

#[test]
fn locked_channels_survive_any_factor_and_mode() {
    for (factor, additive) in [(0.3, false), (1.0, false), (-1.0, true), (0.7, true)] {
        let (mut scene, rig) = biped_scene();
        paste(&mut scene, "spine-twist", factor, additive).expect("paste pose");
        let head = scene.bone(rig, "head").unwrap();
        assert_eq!(head.location, [0.0; 3], "factor {factor} additive {additive}");
        assert_eq!(head.rotation_quaternion[0], 1.0);
        approx(head.rotation_quaternion[1], 0.5 * factor, 1e-6);
    }
}

#[test]
fn boundary_factors_reproduce_snapshot_and_reference() {
    let (mut scene, rig) = biped_scene();
    let before = PoseSnapshot::capture(&scene).unwrap();
    paste(&mut scene, "spine-twist", 0.0, false).expect("paste at 0");
    for (name, bone) in &before.bones {
        let live = scene.bone(rig, name).unwrap();
        assert_eq!(live.location, bone.location, "{name}");
        assert_eq!(live.scale, bone.scale, "{name}");
        assert_eq!(live.rotation(), bone.rotation, "{name}");
    }

    paste(&mut scene, "spine-twist", 1.0, false).expect("paste at 1");
    let spine = scene.bone(rig, "spine01").unwrap();
    assert_eq!(spine.location, [0.0, 2.0, 0.0]);
    assert_eq!(spine.rotation_euler, [0.0, 0.0, 0.5]);
}

#[test]
fn additive_moves_by_reference_delta() {
    let (mut scene, rig) = biped_scene();
    scene.bone_mut(rig, "spine01").unwrap().location = [1.0, 1.0, 1.0];
    paste(&mut scene, "spine-twist", 0.5, true).expect("paste additive");
    let spine = scene.bone(rig, "spine01").unwrap();
    assert_eq!(spine.location, [1.0, 2.0, 1.0]);
    // reference scale is neutral: untouched
    assert_eq!(spine.scale, [1.0, 1.0, 1.0]);
}

#[test]
fn axis_angle_rejects_without_writing_or_leaking() {
    let (mut scene, rig) = biped_scene();
    scene.bone_mut(rig, "neck").unwrap().rotation_mode = RotationMode::AxisAngle;
    let before = PoseSnapshot::capture(&scene).unwrap();
    let baseline = scene.counts();

    let err = paste(&mut scene, "spine-twist", 0.5, false).unwrap_err();
    match err {
        PoseLibError::UnsupportedRotation { bone, side } => {
            assert_eq!(bone, "neck");
            assert_eq!(side, "live");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(PoseSnapshot::capture(&scene).unwrap(), before);
    assert_eq!(scene.counts(), baseline);
}

#[test]
fn multi_object_pose_file_is_a_library_error() {
    let (mut scene, _rig) = biped_scene();
    let baseline = scene.counts();
    let err = paste(&mut scene, "two-rigs", 0.5, false).unwrap_err();
    assert!(matches!(err, PoseLibError::LibraryFile { .. }), "{err}");
    assert_eq!(scene.counts(), baseline);
}

#[test]
fn auto_key_inserts_grouped_keys_at_current_frame() {
    let (mut scene, rig) = biped_scene();
    scene.auto_keyframe = true;
    scene.frame_current = 24;
    paste(&mut scene, "spine-twist", 1.0, false).expect("paste pose");

    let action = scene.object(rig).unwrap().action.expect("action created");
    let action = scene.action(action).unwrap();
    assert_eq!(action.name, "bipedAction");
    let loc = action
        .fcurve("pose.bones[\"spine01\"].location", 1)
        .expect("spine01 location curve");
    assert_eq!(loc.value_at(24.0), Some(2.0));
    assert_eq!(loc.group.as_deref(), Some("spine01"));
    assert!(action
        .fcurve("pose.bones[\"spine01\"].rotation_mode", -1)
        .is_some());
    assert!(action.fcurve("pose.bones[\"neck\"][\"stretch\"]", -1).is_some());
    // locked components are never keyed
    assert!(action.fcurve("pose.bones[\"head\"].location", 0).is_none());
    assert!(action
        .fcurve("pose.bones[\"head\"].rotation_quaternion", 0)
        .is_none());
    assert!(action.groups.iter().any(|g| g == "neck"));
}

#[test]
fn dirty_set_keeps_every_bone_that_would_move() {
    let (mut scene, rig) = biped_scene();
    let snapshot = PoseSnapshot::capture(&scene).unwrap();
    let dir = items::path("spine-twist").unwrap();
    let selection = scene.selected_bones(rig);
    let set: Vec<String> = ["spine01", "spine02", "neck", "head"]
        .map(String::from)
        .to_vec();

    with_reference_pose(
        &mut scene,
        &JsonSceneFileReader,
        &dir,
        &Config::default(),
        &selection,
        |scene, reference| {
            for mode in [BlendMode::Normal, BlendMode::Additive] {
                let all = BonesToBlend::candidates(scene, rig, reference, &set);
                let dirty = BonesToBlend::compute(scene, rig, reference, &snapshot, &set, mode, 0.0);
                let names: Vec<_> = dirty.pairs().map(|(r, _)| r.to_string()).collect();
                assert_eq!(names, vec!["spine01", "neck", "head"], "{mode:?}");

                // blending the whole candidate set moves nothing outside the dirty set
                let params = BlendParams::new(0.5, mode);
                let before = PoseSnapshot::capture_object(scene, rig);
                blend_pose(scene, rig, reference, &snapshot, &all, &params)?;
                let after = PoseSnapshot::capture_object(scene, rig);
                for (name, bone) in &after.bones {
                    if !dirty.contains(name) {
                        assert_eq!(Some(bone), before.bone(name), "{name} moved in {mode:?}");
                    }
                }
                // restore for the next mode
                let reset = BlendParams::new(0.0, BlendMode::Normal);
                blend_pose(scene, rig, reference, &snapshot, &all, &reset)?;
            }
            Ok(())
        },
    )
    .expect("blend with reference");
}
