//! Pose library engine (host-agnostic)
//!
//! Blends stored reference poses onto a live rig, transplants stored actions into a
//! rig's timeline and recreates stored bone constraints on paired objects. All
//! operations run against an explicit [`Scene`]; library items are read from disk
//! through [`LibraryItem`] and the [`SceneFileReader`] seam.

pub mod action;
pub mod blender;
pub mod cleanup;
pub mod config;
pub mod constraints;
pub mod dirty;
pub mod error;
pub mod ids;
pub mod library;
pub mod reference;
pub mod rig;
pub mod scene;
pub mod scene_file;
pub mod session;
pub mod snapshot;
pub mod transplant;

// Re-exports for hosts
pub use action::{Action, FCurve, Keyframe};
pub use blender::{blend_pose, paste_pose, BlendParams};
pub use cleanup::{delete_reference, remove_orphans};
pub use config::Config;
pub use constraints::{
    apply_constraint_data, apply_constraints, capture_constraints, load_constraint_data,
    select_constraint_bones, ConstraintData, ObjectConstraints, PairingEntry, PairingMap,
    TargetPairing,
};
pub use dirty::BonesToBlend;
pub use error::{
    BlendReport, ConstraintReport, PasteReport, PoseLibError, PoseLibResult, SelectionError,
    SelectionReport, Warning,
};
pub use ids::{ActionId, ArmatureId, CollectionId, ObjectId};
pub use library::{
    item_dir_name, select_item_bones, update_selection_set, write_item, ItemDocument, ItemKind,
    ItemMetadata, LibraryItem,
};
pub use reference::{with_reference_pose, ReferencePose};
pub use rig::{Bone, Constraint, Rotation};
pub use scene::{DataCounts, Scene};
pub use scene_file::{
    write_scene_file, JsonSceneFileReader, MemorySceneFileReader, ObjectData, ObjectType,
    SceneFile, SceneFileReader,
};
pub use session::BlendSession;
pub use snapshot::{BoneSnapshot, PoseSnapshot};
pub use transplant::{paste_animation, PasteOptions, StartFrame};
pub use poselib_api_core::{BlendMode, ChannelKind, ChannelPath, RotationMode, Value, ValueKind};
