//! AnimationTransplanter: pastes a stored action onto the selected object.
//!
//! Quick paste assigns the whole stored action. Merge paste clears the destination
//! window on the selected bones, then copies the source window's keys across with
//! their frames shifted, writing every value through the bone channel interpreter.

use std::path::Path;

use poselib_api_core::{ChannelError, ChannelPath};
use serde::{Deserialize, Serialize};

use crate::action::FCurve;
use crate::cleanup::remove_orphans;
use crate::config::Config;
use crate::error::{PasteReport, PoseLibError, PoseLibResult, SelectionError, Warning};
use crate::ids::{ActionId, ObjectId};
use crate::library::item_base_name;
use crate::scene::{Scene, TRANSFORM_CHANNELS};
use crate::scene_file::SceneFileReader;

/// Where the pasted window starts on the destination timeline.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartFrame {
    #[default]
    CurrentFrame,
    SceneStart,
    SourceStart,
}

impl StartFrame {
    /// Destination `(in, out)` for a source window.
    pub fn window(self, scene: &Scene, source_in: f32, source_out: f32) -> (f32, f32) {
        let start = match self {
            StartFrame::CurrentFrame => scene.frame_current as f32,
            StartFrame::SceneStart => scene.frame_start as f32,
            StartFrame::SourceStart => source_in,
        };
        (start, start + (source_out - source_in))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteOptions {
    pub quick_paste: bool,
    pub start_frame: StartFrame,
}

/// Source window and its destination.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Window {
    source_in: f32,
    source_out: f32,
    dest_in: f32,
    dest_out: f32,
}

impl Window {
    fn remap(&self, frame: f32) -> f32 {
        self.dest_in + (frame - self.source_in)
    }
}

/// Paste the action stored in `<item_dir>/<animation_file>` onto the single
/// selected object.
pub fn paste_animation(
    scene: &mut Scene,
    reader: &dyn SceneFileReader,
    item_dir: &Path,
    config: &Config,
    source_in: f32,
    source_out: f32,
    options: PasteOptions,
) -> PoseLibResult<PasteReport> {
    if !source_in.is_finite() || !source_out.is_finite() || source_out < source_in {
        return Err(PoseLibError::Paste(format!(
            "invalid source window {source_in}-{source_out}"
        )));
    }
    let target = match scene.selected_objects().as_slice() {
        [only] => *only,
        selected => {
            return Err(SelectionError::WrongCount {
                expected: 1,
                found: selected.len(),
            }
            .into())
        }
    };
    let selection = if options.quick_paste {
        Vec::new()
    } else {
        let rig = scene.single_selected_rig()?;
        let bones = scene.selected_bones(rig);
        if bones.is_empty() {
            let object = scene.object(rig).map(|o| o.name.clone()).unwrap_or_default();
            return Err(SelectionError::NoBones { object }.into());
        }
        bones
    };

    let path = item_dir.join(&config.animation_file);
    let file = reader.read(&path)?;
    let name = file.single_action()?;
    let imported = scene.import_action(&file, name)?;

    if options.quick_paste {
        let wanted = format!("{}{}", item_base_name(item_dir), config.quick_paste_action_suffix);
        let action = scene.rename_action(imported, &wanted).unwrap_or(wanted);
        scene.set_action(target, Some(imported));
        let keys_written = scene.action(imported).map_or(0, |a| a.key_count());
        log::debug!("quick-pasted '{action}' ({keys_written} keys)");
        return Ok(PasteReport {
            action,
            keys_written,
            ..PasteReport::default()
        });
    }

    let (dest_in, dest_out) = options.start_frame.window(scene, source_in, source_out);
    let window = Window {
        source_in,
        source_out,
        dest_in,
        dest_out,
    };
    let mut report = PasteReport::default();
    let outcome = merge_action(scene, target, imported, window, &selection, &mut report);

    // The stored action never outlives the paste.
    scene.remove_action(imported);
    remove_orphans(scene);

    match outcome {
        Ok(()) => Ok(report),
        Err(e @ PoseLibError::Paste(_)) => {
            log::error!("{e}");
            Err(e)
        }
        Err(e) => {
            log::error!("paste animation failed: {e}");
            Err(PoseLibError::Paste(e.to_string()))
        }
    }
}

/// Delete keys inside the destination window on every unlocked transform
/// component and custom property of the selected bones.
fn clear_window(
    scene: &mut Scene,
    target: ObjectId,
    selection: &[String],
    window: Window,
) -> usize {
    if scene.object(target).and_then(|o| o.action).is_none() {
        return 0;
    }
    let mut deleted = 0;
    for bone_name in selection {
        let Some(bone) = scene.bone(target, bone_name).cloned() else {
            continue;
        };
        for kind in TRANSFORM_CHANNELS {
            for i in 0..kind.arity().unwrap_or(0) {
                if bone.is_locked(&kind, i) {
                    continue;
                }
                let path = ChannelPath::bone(bone_name.as_str(), kind.clone());
                deleted +=
                    scene.keyframe_delete(target, &path, Some(i), window.dest_in, window.dest_out);
            }
        }
        for key in bone.properties.keys() {
            let path = ChannelPath::property(bone_name.as_str(), key.as_str());
            deleted += scene.keyframe_delete(target, &path, None, window.dest_in, window.dest_out);
        }
    }
    deleted
}

/// Copy one stored curve's keys inside the source window. Stops at the first
/// property that does not exist on the live bone, with a warning.
fn paste_curve(
    scene: &mut Scene,
    target: ObjectId,
    fc: &FCurve,
    path: &ChannelPath,
    index: Option<usize>,
    window: Window,
    report: &mut PasteReport,
) -> PoseLibResult<()> {
    let Some(bone_name) = path.bone_name() else {
        return Ok(());
    };
    for key in fc.keys_in(window.source_in, window.source_out) {
        let frame = window.remap(key.frame);
        let bone = scene.bone_mut(target, bone_name).ok_or_else(|| {
            PoseLibError::Paste(format!("bone '{bone_name}' not found on destination"))
        })?;
        if index.is_some_and(|i| bone.is_locked(&path.kind, i)) {
            return Ok(());
        }
        match bone.set_channel(&path.kind, index, key.value) {
            Ok(()) => {}
            Err(ChannelError::MissingProperty { key }) => {
                report.warnings.push(Warning::new(
                    format!("{bone_name}[\"{key}\"]"),
                    "property not found on live bone, skipped",
                ));
                return Ok(());
            }
            Err(e) => {
                return Err(PoseLibError::Paste(format!(
                    "{}[{}] at frame {}: {e}",
                    fc.data_path, fc.array_index, key.frame
                )))
            }
        }
        scene.keyframe_insert(target, path, index, frame)?;
        report.keys_written += 1;
    }
    Ok(())
}

fn merge_action(
    scene: &mut Scene,
    target: ObjectId,
    source: ActionId,
    window: Window,
    selection: &[String],
    report: &mut PasteReport,
) -> PoseLibResult<()> {
    report.keys_deleted = clear_window(scene, target, selection, window);
    let dest = scene.ensure_action(target)?;

    let curves = scene
        .action(source)
        .map(|a| a.fcurves.clone())
        .unwrap_or_default();
    for fc in &curves {
        let Some(bone) = fc.bone_name() else {
            continue;
        };
        if !selection.contains(&bone) {
            continue;
        }
        let path = match fc.channel() {
            Ok(path) => path,
            Err(_) => {
                report.warnings.push(Warning::new(
                    fc.data_path.as_str(),
                    "channel cannot be pasted, skipped",
                ));
                continue;
            }
        };
        let index = path
            .kind
            .component(fc.array_index)
            .map_err(|e| PoseLibError::Paste(format!("{}: {e}", fc.data_path)))?;
        paste_curve(scene, target, fc, &path, index, window, report)?;
    }

    scene.group_channels_by_bone(target);
    report.action = scene
        .action(dest)
        .map(|a| a.name.clone())
        .unwrap_or_default();
    log::debug!(
        "merged {} keys into '{}' over {}-{}",
        report.keys_written,
        report.action,
        window.dest_in,
        window.dest_out
    );
    Ok(())
}
