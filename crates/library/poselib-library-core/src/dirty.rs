//! BonesToBlend: the per-session set of bones a blend actually has to touch.
//!
//! Computed once per reference load; slider ticks reuse it. A bone is left out only
//! when blending it is a guaranteed no-op for the session's mode.

use hashbrown::HashSet;
use indexmap::IndexMap;
use poselib_api_core::blend::would_change;
use poselib_api_core::{BlendMode, Neutral, RotationMode};

use crate::blender::channel_pairs;
use crate::ids::ObjectId;
use crate::rig::Bone;
use crate::scene::Scene;
use crate::snapshot::{BoneSnapshot, PoseSnapshot};

/// Reference bone name to live bone name, in reference bone order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BonesToBlend {
    pairs: IndexMap<String, String>,
    mode: Option<BlendMode>,
}

impl BonesToBlend {
    /// Every reference bone that is marked, listed in the item's selection set and
    /// selected on the live rig. No change filtering.
    pub fn candidates(
        scene: &Scene,
        target: ObjectId,
        reference: ObjectId,
        selection_set: &[String],
    ) -> Self {
        let wanted: HashSet<&str> = selection_set.iter().map(String::as_str).collect();
        let pairs = scene
            .bones(reference)
            .into_iter()
            .flat_map(|bones| bones.values())
            .filter(|b| b.selected && wanted.contains(b.name.as_str()))
            .filter(|b| {
                scene
                    .bone(target, &b.name)
                    .is_some_and(Bone::is_active_selection)
            })
            .map(|b| (b.name.clone(), b.name.clone()))
            .collect();
        Self { pairs, mode: None }
    }

    /// Candidates narrowed to the bones whose blend would change something.
    ///
    /// Axis-angle bones are always kept so the blend reports them instead of
    /// skipping them silently.
    pub fn compute(
        scene: &Scene,
        target: ObjectId,
        reference: ObjectId,
        snapshot: &PoseSnapshot,
        selection_set: &[String],
        mode: BlendMode,
        epsilon: f32,
    ) -> Self {
        let mut set = Self::candidates(scene, target, reference, selection_set);
        set.pairs.retain(|ref_name, live_name| {
            match (scene.bone(reference, ref_name), snapshot.bone(live_name)) {
                (Some(reference), Some(snap)) => {
                    let live = scene.bone(target, live_name);
                    is_dirty(reference, snap, live, mode, epsilon)
                }
                _ => false,
            }
        });
        set.mode = Some(mode);
        log::debug!("{} bones to blend ({mode:?})", set.pairs.len());
        set
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(r, l)| (r.as_str(), l.as_str()))
    }

    pub fn contains(&self, reference_bone: &str) -> bool {
        self.pairs.contains_key(reference_bone)
    }

    /// Mode the set was filtered for, `None` when unfiltered.
    pub fn mode(&self) -> Option<BlendMode> {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn changes(reference: f32, snapshot: f32, mode: BlendMode, neutral: Neutral, epsilon: f32) -> bool {
    if epsilon <= 0.0 {
        return would_change(reference, snapshot, mode, neutral);
    }
    let base = match mode {
        BlendMode::Normal => snapshot,
        BlendMode::Additive => neutral.value(),
    };
    (reference - base).abs() > epsilon
}

fn is_dirty(
    reference: &Bone,
    snapshot: &BoneSnapshot,
    live: Option<&Bone>,
    mode: BlendMode,
    epsilon: f32,
) -> bool {
    let Some(live) = live else {
        return false;
    };
    if reference.rotation_mode == RotationMode::AxisAngle
        || snapshot.rotation_mode() == RotationMode::AxisAngle
        || live.rotation_mode != reference.rotation_mode
    {
        return true;
    }
    let Ok(pairs) = channel_pairs(reference, snapshot) else {
        return true;
    };
    let transform = pairs.iter().any(|pair| {
        (0..pair.reference.len()).any(|i| {
            !live.is_locked(&pair.kind, i)
                && changes(
                    pair.reference[i],
                    pair.snapshot[i],
                    mode,
                    pair.neutral(i),
                    epsilon,
                )
        })
    });
    // Properties are copied or lerped in both modes.
    transform
        || reference
            .properties
            .iter()
            .any(|(key, value)| snapshot.properties.get(key) != Some(value))
}
