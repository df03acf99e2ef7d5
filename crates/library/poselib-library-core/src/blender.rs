//! PoseBlender: writes a blend of a reference pose and a fixed snapshot onto a rig.
//!
//! Every value is recomputed from the snapshot, never from the live bone, so
//! repeated calls with the same factor are bit-for-bit stable.

use std::path::Path;

use poselib_api_core::blend::{blend_component, blend_property};
use poselib_api_core::coercion::to_float;
use poselib_api_core::{BlendMode, ChannelKind, ChannelPath, Neutral, RotationMode, Value};

use crate::config::Config;
use crate::dirty::BonesToBlend;
use crate::error::{BlendReport, PoseLibError, PoseLibResult, SelectionError, Warning};
use crate::ids::ObjectId;
use crate::library::LibraryItem;
use crate::reference::with_reference_pose;
use crate::rig::{Bone, Rotation};
use crate::scene::Scene;
use crate::scene_file::SceneFileReader;
use crate::snapshot::{BoneSnapshot, PoseSnapshot};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlendParams {
    /// Clamped into the mode's range before use.
    pub factor: f32,
    pub mode: BlendMode,
    pub insert_keyframes: bool,
}

impl BlendParams {
    pub fn new(factor: f32, mode: BlendMode) -> Self {
        Self {
            factor: mode.clamp_factor(factor),
            mode,
            insert_keyframes: false,
        }
    }

    pub fn with_keyframes(mut self, insert: bool) -> Self {
        self.insert_keyframes = insert;
        self
    }
}

/// One transform channel of a bone pair: reference values next to snapshot values,
/// both in the reference bone's representation.
pub(crate) struct ChannelPair {
    pub kind: ChannelKind,
    pub reference: Vec<f32>,
    pub snapshot: Vec<f32>,
}

impl ChannelPair {
    pub fn neutral(&self, index: usize) -> Neutral {
        Neutral::from_value(self.kind.neutral(index).unwrap_or(0.0))
    }
}

/// Refuse axis-angle on either side of a pair.
pub(crate) fn check_rotation(
    bone: &str,
    reference: RotationMode,
    live: RotationMode,
) -> PoseLibResult<()> {
    let side = if reference == RotationMode::AxisAngle {
        "reference"
    } else if live == RotationMode::AxisAngle {
        "live"
    } else {
        return Ok(());
    };
    Err(PoseLibError::UnsupportedRotation {
        bone: bone.to_string(),
        side: side.to_string(),
    })
}

/// Location, rotation and scale of a bone pair, the snapshot rotation converted
/// into the reference's mode.
pub(crate) fn channel_pairs(
    reference: &Bone,
    snapshot: &BoneSnapshot,
) -> PoseLibResult<[ChannelPair; 3]> {
    check_rotation(&reference.name, reference.rotation_mode, snapshot.rotation_mode())?;
    let converted = snapshot
        .rotation
        .convert_to(reference.rotation_mode)
        .ok_or_else(|| {
            PoseLibError::Blend(format!(
                "cannot convert {} rotation of '{}' to {}",
                snapshot.rotation_mode(),
                reference.name,
                reference.rotation_mode
            ))
        })?;
    let rotation = match (reference.rotation(), converted) {
        (Rotation::Quaternion(r), Rotation::Quaternion(s)) => ChannelPair {
            kind: ChannelKind::RotationQuaternion,
            reference: r.to_vec(),
            snapshot: s.to_vec(),
        },
        (Rotation::Euler(r, _), Rotation::Euler(s, _)) => ChannelPair {
            kind: ChannelKind::RotationEuler,
            reference: r.to_vec(),
            snapshot: s.to_vec(),
        },
        _ => {
            return Err(PoseLibError::Blend(format!(
                "rotation of '{}' did not convert to {}",
                reference.name, reference.rotation_mode
            )))
        }
    };
    Ok([
        ChannelPair {
            kind: ChannelKind::Location,
            reference: reference.location.to_vec(),
            snapshot: snapshot.location.to_vec(),
        },
        rotation,
        ChannelPair {
            kind: ChannelKind::Scale,
            reference: reference.scale.to_vec(),
            snapshot: snapshot.scale.to_vec(),
        },
    ])
}

/// What one bone blend wrote, for keying afterwards.
struct Written {
    /// (channel, component) pairs
    channels: Vec<(ChannelKind, Option<usize>)>,
}

fn blend_bone(
    live: &mut Bone,
    reference: &Bone,
    snapshot: &BoneSnapshot,
    params: &BlendParams,
    warnings: &mut Vec<Warning>,
) -> PoseLibResult<Written> {
    let pairs = channel_pairs(reference, snapshot)?;
    let mut written = Written {
        channels: vec![(ChannelKind::RotationMode, None)],
    };
    // Mode is copied, never blended.
    live.rotation_mode = reference.rotation_mode;

    for pair in &pairs {
        for i in 0..pair.reference.len() {
            if live.is_locked(&pair.kind, i) {
                continue;
            }
            let value = blend_component(
                pair.reference[i],
                pair.snapshot[i],
                params.factor,
                params.mode,
                pair.neutral(i),
            );
            live.set_channel(&pair.kind, Some(i), value)?;
            written.channels.push((pair.kind.clone(), Some(i)));
        }
    }

    for (key, value) in &reference.properties {
        let subject = format!("{}[\"{key}\"]", live.name);
        let Some(current) = live.properties.get(key) else {
            warnings.push(Warning::new(subject, "property not found on live bone, skipped"));
            continue;
        };
        let next = match (current, value) {
            (Value::Float(_), other) => {
                let numeric = match other {
                    Value::Vector(_) => None,
                    scalar => to_float(scalar, None),
                };
                let Some(r) = numeric else {
                    warnings.push(Warning::new(
                        subject,
                        format!("cannot write {:?} into a float property, skipped", other.kind()),
                    ));
                    continue;
                };
                blend_property(&Value::Float(r), snapshot.properties.get(key), params.factor)
            }
            _ => value.clone(),
        };
        let kind = ChannelKind::Property(key.clone());
        match &next {
            Value::Vector(components) => {
                written
                    .channels
                    .extend((0..components.len()).map(|i| (kind.clone(), Some(i))));
            }
            other if to_float(other, None).is_some() => written.channels.push((kind, None)),
            _ => {}
        }
        live.properties.insert(key.clone(), next);
    }
    Ok(written)
}

fn write_bones(
    scene: &mut Scene,
    target: ObjectId,
    work: &[(Bone, String, &BoneSnapshot)],
    params: &BlendParams,
    report: &mut BlendReport,
) -> PoseLibResult<()> {
    let frame = scene.frame_current as f32;
    for (ref_bone, live_name, snap) in work {
        let live = scene
            .bone_mut(target, live_name)
            .ok_or_else(|| PoseLibError::Blend(format!("bone '{live_name}' vanished from rig")))?;
        let written = blend_bone(live, ref_bone, snap, params, &mut report.warnings)?;
        log::debug!("blended '{live_name}' at factor {}", params.factor);
        report.bones.push(live_name.clone());

        if params.insert_keyframes {
            for (kind, index) in written.channels {
                let path = ChannelPath::bone(live_name.as_str(), kind);
                scene.keyframe_insert(target, &path, index, frame)?;
                report.keys_inserted += 1;
            }
        }
    }
    if params.insert_keyframes && !work.is_empty() {
        scene.group_channels_by_bone(target);
    }
    Ok(())
}

/// Blend every pair of `bones` from the reference object onto `target`.
///
/// Axis-angle on either side of any pair fails with `UnsupportedRotation` before a
/// single channel is written. Any later failure is logged and surfaced as `Blend`;
/// bones already written stay written.
pub fn blend_pose(
    scene: &mut Scene,
    target: ObjectId,
    reference: ObjectId,
    snapshot: &PoseSnapshot,
    bones: &BonesToBlend,
    params: &BlendParams,
) -> PoseLibResult<BlendReport> {
    let mut report = BlendReport::default();

    let mut work = Vec::with_capacity(bones.len());
    for (ref_name, live_name) in bones.pairs() {
        let Some(ref_bone) = scene.bone(reference, ref_name) else {
            report
                .warnings
                .push(Warning::new(ref_name, "bone missing from reference pose"));
            continue;
        };
        let Some(snap) = snapshot.bone(live_name) else {
            report
                .warnings
                .push(Warning::new(live_name, "bone missing from snapshot"));
            continue;
        };
        let Some(live) = scene.bone(target, live_name) else {
            report
                .warnings
                .push(Warning::new(live_name, "bone missing from rig"));
            continue;
        };
        check_rotation(live_name, ref_bone.rotation_mode, snap.rotation_mode())?;
        check_rotation(live_name, ref_bone.rotation_mode, live.rotation_mode)?;
        work.push((ref_bone.clone(), live_name.to_string(), snap));
    }

    let outcome = write_bones(scene, target, &work, params, &mut report);
    match outcome {
        Ok(()) => Ok(report),
        Err(e @ PoseLibError::UnsupportedRotation { .. }) => Err(e),
        Err(e) => {
            log::error!("blend pose failed: {e}");
            Err(PoseLibError::Blend(e.to_string()))
        }
    }
}

/// Apply a pose item onto the single selected rig: load the reference, blend its
/// authored bones that are also selected, then delete the reference.
///
/// `snapshot` defaults to the rig's current pose. Keys are inserted when the scene's
/// auto-keying is on.
pub fn paste_pose(
    scene: &mut Scene,
    reader: &dyn SceneFileReader,
    item_dir: &Path,
    config: &Config,
    factor: f32,
    additive: bool,
    snapshot: Option<&PoseSnapshot>,
) -> PoseLibResult<BlendReport> {
    let target = scene.single_selected_rig()?;
    let selection = scene.selected_bones(target);
    if selection.is_empty() {
        let object = scene
            .object(target)
            .map(|o| o.name.clone())
            .unwrap_or_default();
        return Err(SelectionError::NoBones { object }.into());
    }
    let item = LibraryItem::load(item_dir)?;
    let captured;
    let snapshot = match snapshot {
        Some(s) => s,
        None => {
            captured = PoseSnapshot::capture_object(scene, target);
            &captured
        }
    };
    let params = BlendParams::new(factor, BlendMode::from_additive(additive))
        .with_keyframes(scene.auto_keyframe);
    let selection_set = &item.metadata().bone_names;

    with_reference_pose(scene, reader, item_dir, config, &selection, |scene, reference| {
        let bones = BonesToBlend::candidates(scene, target, reference, selection_set);
        blend_pose(scene, target, reference, snapshot, &bones, &params)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    fn pair_scene(live: Bone, reference: Bone) -> (Scene, ObjectId, ObjectId) {
        let mut scene = Scene::new();
        let rig = scene.add_armature_object("rig", vec![live.selected()]);
        scene.set_selected(rig, true);
        let reference = scene.add_armature_object("ref", vec![reference.selected()]);
        (scene, rig, reference)
    }

    fn run(
        scene: &mut Scene,
        rig: ObjectId,
        reference: ObjectId,
        params: BlendParams,
    ) -> PoseLibResult<BlendReport> {
        let snapshot = PoseSnapshot::capture_object(scene, rig);
        let names = vec!["spine01".to_string()];
        let bones = BonesToBlend::candidates(scene, rig, reference, &names);
        blend_pose(scene, rig, reference, &snapshot, &bones, &params)
    }

    #[test]
    fn half_blend_moves_halfway() {
        let (mut scene, rig, reference) = pair_scene(
            Bone::new("spine01").with_euler(RotationMode::Xyz, [0.0; 3]),
            Bone::new("spine01")
                .with_location([0.0, 2.0, 0.0])
                .with_euler(RotationMode::Xyz, [0.0, 0.0, 0.5]),
        );
        let report = run(&mut scene, rig, reference, BlendParams::new(0.5, BlendMode::Normal)).unwrap();
        assert_eq!(report.bones, vec!["spine01".to_string()]);
        let bone = scene.bone(rig, "spine01").unwrap();
        assert_eq!(bone.location, [0.0, 1.0, 0.0]);
        assert_eq!(bone.rotation_euler, [0.0, 0.0, 0.25]);
        assert_eq!(bone.scale, [1.0; 3]);
        assert_eq!(report.keys_inserted, 0);
    }

    #[test]
    fn additive_scale_and_w_are_deltas_from_one() {
        let (mut scene, rig, reference) = pair_scene(
            Bone::new("spine01").with_scale([2.0; 3]),
            Bone::new("spine01")
                .with_scale([1.5, 1.0, 0.5])
                .with_location([1.0, 0.0, 0.0]),
        );
        run(&mut scene, rig, reference, BlendParams::new(1.0, BlendMode::Additive)).unwrap();
        let bone = scene.bone(rig, "spine01").unwrap();
        assert_eq!(bone.scale, [2.5, 2.0, 1.5]);
        assert_eq!(bone.location, [1.0, 0.0, 0.0]);
        assert_eq!(bone.rotation_quaternion, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn locked_channels_are_untouched() {
        let mut live = Bone::new("spine01").with_location([0.3, 0.3, 0.3]);
        live.lock_location = [true, false, true];
        live.lock_rotation_w = true;
        let (mut scene, rig, reference) = pair_scene(
            live,
            Bone::new("spine01")
                .with_location([5.0, 5.0, 5.0])
                .with_quaternion([0.0, 1.0, 0.0, 0.0]),
        );
        run(&mut scene, rig, reference, BlendParams::new(1.0, BlendMode::Normal)).unwrap();
        let bone = scene.bone(rig, "spine01").unwrap();
        assert_eq!(bone.location, [0.3, 5.0, 0.3]);
        assert_eq!(bone.rotation_quaternion, [1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn euler_snapshot_is_converted_to_reference_quaternion() {
        let (mut scene, rig, reference) = pair_scene(
            Bone::new("spine01").with_euler(RotationMode::Xyz, [0.0, 0.0, 1.0]),
            Bone::new("spine01"),
        );
        run(&mut scene, rig, reference, BlendParams::new(0.0, BlendMode::Normal)).unwrap();
        let bone = scene.bone(rig, "spine01").unwrap();
        assert_eq!(bone.rotation_mode, RotationMode::Quaternion);
        let q = bone.rotation_quaternion;
        assert!(approx(q[0], 0.5f32.cos(), 1e-6));
        assert!(approx(q[3], 0.5f32.sin(), 1e-6));
    }

    #[test]
    fn axis_angle_is_rejected_before_any_write() {
        let mut live = Bone::new("spine01").with_location([1.0, 1.0, 1.0]);
        live.rotation_mode = RotationMode::AxisAngle;
        let (mut scene, rig, reference) =
            pair_scene(live.clone(), Bone::new("spine01").with_location([9.0; 3]));
        let err = run(&mut scene, rig, reference, BlendParams::new(1.0, BlendMode::Normal))
            .unwrap_err();
        assert!(matches!(err, PoseLibError::UnsupportedRotation { ref side, .. } if side == "live"));
        let bone = scene.bone(rig, "spine01").unwrap();
        assert_eq!(bone.location, live.location);
    }

    #[test]
    fn properties_blend_copy_or_warn() {
        let live = Bone::new("spine01")
            .with_property("ik_fk", Value::Float(0.0))
            .with_property("space", Value::text("WORLD"))
            .with_property("weight", Value::Float(1.0));
        let reference = Bone::new("spine01")
            .with_property("ik_fk", Value::Float(1.0))
            .with_property("space", Value::text("LOCAL"))
            .with_property("weight", Value::text("heavy"))
            .with_property("extra", Value::Float(3.0));
        let (mut scene, rig, reference) = pair_scene(live, reference);
        let report = run(
            &mut scene,
            rig,
            reference,
            BlendParams::new(0.25, BlendMode::Normal).with_keyframes(true),
        )
        .unwrap();
        let bone = scene.bone(rig, "spine01").unwrap();
        assert_eq!(bone.properties["ik_fk"], Value::Float(0.25));
        assert_eq!(bone.properties["space"], Value::text("LOCAL"));
        assert_eq!(bone.properties["weight"], Value::Float(1.0));
        let subjects: Vec<_> = report.warnings.iter().map(|w| w.subject.as_str()).collect();
        assert_eq!(subjects, vec!["spine01[\"weight\"]", "spine01[\"extra\"]"]);
        // rotation mode + 3 location + 4 quaternion + 3 scale + ik_fk
        assert_eq!(report.keys_inserted, 12);
        let action = scene.object(rig).unwrap().action.unwrap();
        assert_eq!(scene.action(action).unwrap().groups, vec!["spine01".to_string()]);
    }

    #[test]
    fn integral_reference_blends_into_float_property() {
        let (mut scene, rig, reference) = pair_scene(
            Bone::new("spine01")
                .with_property("ik_fk", Value::Float(0.0))
                .with_property("pin", Value::Float(0.0)),
            Bone::new("spine01")
                .with_property("ik_fk", Value::Int(1))
                .with_property("pin", Value::Bool(true)),
        );
        let report = run(&mut scene, rig, reference, BlendParams::new(0.5, BlendMode::Normal)).unwrap();
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        let bone = scene.bone(rig, "spine01").unwrap();
        assert_eq!(bone.properties["ik_fk"], Value::Float(0.5));
        assert_eq!(bone.properties["pin"], Value::Float(0.5));

        // a JSON integer in a stored pose reads back as Int
        let stored: Value = serde_json::from_str("1").unwrap();
        assert_eq!(stored, Value::Int(1));
    }

    #[test]
    fn repeated_blends_do_not_accumulate() {
        let (mut scene, rig, reference) = pair_scene(
            Bone::new("spine01").with_location([0.1, 0.2, 0.3]),
            Bone::new("spine01").with_location([0.7, -0.4, 2.9]),
        );
        let snapshot = PoseSnapshot::capture_object(&scene, rig);
        let names = vec!["spine01".to_string()];
        let bones = BonesToBlend::candidates(&scene, rig, reference, &names);
        let params = BlendParams::new(0.37, BlendMode::Normal);
        blend_pose(&mut scene, rig, reference, &snapshot, &bones, &params).unwrap();
        let first = scene.bone(rig, "spine01").unwrap().clone();
        blend_pose(&mut scene, rig, reference, &snapshot, &bones, &params).unwrap();
        assert_eq!(scene.bone(rig, "spine01").unwrap(), &first);
    }
}
