//! Interactive pose blending for one library item.
//!
//! A session caches the rig's pose from before the first slider tick and the set of
//! bones worth blending. Every tick re-imports the reference pose, blends from the
//! cached snapshot and deletes the reference again, so ticks never accumulate.

use std::path::{Path, PathBuf};

use poselib_api_core::BlendMode;

use crate::blender::{blend_pose, BlendParams};
use crate::config::Config;
use crate::dirty::BonesToBlend;
use crate::error::{BlendReport, PoseLibError, PoseLibResult, SelectionError};
use crate::ids::ObjectId;
use crate::library::{ItemKind, LibraryItem};
use crate::reference::with_reference_pose;
use crate::scene::Scene;
use crate::scene_file::SceneFileReader;
use crate::snapshot::PoseSnapshot;

#[derive(Clone, Debug)]
pub struct BlendSession {
    item_dir: PathBuf,
    config: Config,
    selection_set: Vec<String>,
    snapshot: Option<PoseSnapshot>,
    bones: Option<BonesToBlend>,
    mode: BlendMode,
    factor: f32,
}

impl BlendSession {
    /// Start a session on a `.pose` item.
    pub fn open(item_dir: impl Into<PathBuf>, config: Config) -> PoseLibResult<Self> {
        let item_dir = item_dir.into();
        let selection_set = load_selection_set(&item_dir)?;
        Ok(Self {
            item_dir,
            config,
            selection_set,
            snapshot: None,
            bones: None,
            mode: BlendMode::Normal,
            factor: 0.0,
        })
    }

    pub fn item_dir(&self) -> &Path {
        &self.item_dir
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn mode(&self) -> BlendMode {
        self.mode
    }

    /// Pose the rig had before the first tick of this session.
    pub fn snapshot(&self) -> Option<&PoseSnapshot> {
        self.snapshot.as_ref()
    }

    /// Cached bones-to-blend; filled by the first tick.
    pub fn bones(&self) -> Option<&BonesToBlend> {
        self.bones.as_ref()
    }

    /// Switch between normal and additive blending. A change resets the factor to 0
    /// and drops the cached bone set.
    pub fn set_additive(&mut self, additive: bool) {
        let mode = BlendMode::from_additive(additive);
        if mode != self.mode {
            self.mode = mode;
            self.factor = 0.0;
            self.bones = None;
        }
    }

    /// Re-read the item metadata; the bone set is recomputed on the next tick.
    pub fn reload(&mut self) -> PoseLibResult<()> {
        self.selection_set = load_selection_set(&self.item_dir)?;
        self.bones = None;
        Ok(())
    }

    /// One slider tick. Never inserts keyframes.
    pub fn blend(
        &mut self,
        scene: &mut Scene,
        reader: &dyn SceneFileReader,
        factor: f32,
    ) -> PoseLibResult<BlendReport> {
        let (target, selection) = selected_rig_bones(scene)?;
        let target_name = scene
            .object(target)
            .map(|o| o.name.as_str())
            .unwrap_or_default();
        if self
            .snapshot
            .as_ref()
            .is_some_and(|s| s.object != target_name)
        {
            log::debug!("blend target changed to '{target_name}', recapturing");
            self.snapshot = None;
            self.bones = None;
        }
        let snapshot: &PoseSnapshot = self
            .snapshot
            .get_or_insert_with(|| PoseSnapshot::capture_object(scene, target));

        let params = BlendParams::new(factor, self.mode);
        let (mode, epsilon) = (self.mode, self.config.float_epsilon);
        let selection_set = &self.selection_set;
        let cache = &mut self.bones;
        let report = with_reference_pose(
            scene,
            reader,
            &self.item_dir,
            &self.config,
            &selection,
            |scene, reference| {
                let bones = cache.get_or_insert_with(|| {
                    BonesToBlend::compute(
                        scene,
                        target,
                        reference,
                        snapshot,
                        selection_set,
                        mode,
                        epsilon,
                    )
                });
                blend_pose(scene, target, reference, snapshot, bones, &params)
            },
        )?;
        self.factor = params.factor;
        Ok(report)
    }

    /// Put the rig back to the snapshot.
    pub fn reset(
        &mut self,
        scene: &mut Scene,
        reader: &dyn SceneFileReader,
    ) -> PoseLibResult<BlendReport> {
        self.blend(scene, reader, 0.0)
    }

    /// Commit the current factor over every candidate bone, keying when the scene
    /// auto-keys, then end the session. A factor of 0 applies the full pose.
    pub fn apply(
        &mut self,
        scene: &mut Scene,
        reader: &dyn SceneFileReader,
    ) -> PoseLibResult<BlendReport> {
        let (target, selection) = selected_rig_bones(scene)?;
        let captured;
        let snapshot = match &self.snapshot {
            Some(s) => s,
            None => {
                captured = PoseSnapshot::capture_object(scene, target);
                &captured
            }
        };
        let factor = if self.factor == 0.0 { 1.0 } else { self.factor };
        let params = BlendParams::new(factor, self.mode).with_keyframes(scene.auto_keyframe);
        let selection_set = &self.selection_set;
        let report = with_reference_pose(
            scene,
            reader,
            &self.item_dir,
            &self.config,
            &selection,
            |scene, reference| {
                let bones = BonesToBlend::candidates(scene, target, reference, selection_set);
                blend_pose(scene, target, reference, snapshot, &bones, &params)
            },
        )?;
        self.snapshot = None;
        self.bones = None;
        self.factor = 0.0;
        log::debug!(
            "applied {} at {factor} over {} bones",
            self.item_dir.display(),
            report.bones.len()
        );
        Ok(report)
    }
}

fn load_selection_set(item_dir: &Path) -> PoseLibResult<Vec<String>> {
    let item = LibraryItem::load(item_dir)?;
    if item.kind != ItemKind::Pose {
        return Err(PoseLibError::library_file(
            item_dir,
            format!("{} items cannot be blended", item.kind.as_str()),
        ));
    }
    Ok(item.document.metadata.bone_names)
}

fn selected_rig_bones(scene: &Scene) -> PoseLibResult<(ObjectId, Vec<String>)> {
    let target = scene.single_selected_rig()?;
    let selection = scene.selected_bones(target);
    if selection.is_empty() {
        let object = scene
            .object(target)
            .map(|o| o.name.clone())
            .unwrap_or_default();
        return Err(SelectionError::NoBones { object }.into());
    }
    Ok((target, selection))
}
