//! Constraint sets: capture constraints from selected bones and re-create them on a
//! user-chosen destination rig.
//!
//! Recorded JSON shape (`constraintData`):
//! ```json
//! { "rig": { "bone_constraints": { "hand.L": { "Copy Rotation": {
//!     "name": "Copy Rotation", "type": "COPY_ROTATION",
//!     "target": { "type": "ARMATURE", "name": "rig_ctrl" },
//!     "subtarget": "hand_ctrl.L", "influence": 1.0 } } } } }
//! ```

use std::path::Path;

use indexmap::IndexMap;
use poselib_api_core::Value;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{
    ConstraintReport, PoseLibError, PoseLibResult, SelectionError, SelectionReport, Warning,
};
use crate::ids::ObjectId;
use crate::library::{ItemKind, LibraryItem};
use crate::rig::Constraint;
use crate::scene::Scene;

/// Recorded properties of one constraint, keyed by property name.
pub type ConstraintProperties = IndexMap<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectConstraints {
    /// bone name -> constraint name -> properties
    #[serde(default)]
    pub bone_constraints: IndexMap<String, IndexMap<String, ConstraintProperties>>,
}

/// Source object name -> recorded constraints.
pub type ConstraintData = IndexMap<String, ObjectConstraints>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetPairing {
    #[serde(rename = "destinationTarget", default)]
    pub destination_target: Option<String>,
}

/// Where one recorded source object goes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingEntry {
    /// Destination object name
    pub object: String,
    /// Per recorded constraint name, an explicit target override.
    #[serde(default)]
    pub constraints: IndexMap<String, TargetPairing>,
}

impl PairingEntry {
    pub fn to(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            constraints: IndexMap::new(),
        }
    }

    pub fn with_target(mut self, constraint: impl Into<String>, target: impl Into<String>) -> Self {
        self.constraints.insert(
            constraint.into(),
            TargetPairing {
                destination_target: Some(target.into()),
            },
        );
        self
    }
}

/// Source object name -> destination pairing.
pub type PairingMap = IndexMap<String, PairingEntry>;

/// Selected object called `name`.
fn selected_named(scene: &Scene, name: &str) -> Option<ObjectId> {
    scene
        .selected_objects()
        .into_iter()
        .find(|id| scene.object(*id).is_some_and(|o| o.name == name))
}

/// Resolve the destination target of a recreated constraint.
///
/// Explicit per-constraint pairing wins; otherwise the recorded target is mapped
/// through the object pairing, falling back to an object of the same name.
fn resolve_target(
    scene: &Scene,
    pairing: &PairingMap,
    entry: &PairingEntry,
    constraint: &str,
    recorded: Option<&Value>,
    warnings: &mut Vec<Warning>,
) -> Option<String> {
    if let Some(explicit) = entry
        .constraints
        .get(constraint)
        .and_then(|p| p.destination_target.as_deref())
    {
        if scene.object_by_name(explicit).is_some() {
            return Some(explicit.to_string());
        }
        warnings.push(Warning::new(constraint, format!("target object '{explicit}' not found")));
        return None;
    }
    let source = match recorded {
        Some(Value::ObjectRef { name, .. }) => name.as_str(),
        Some(Value::Text(name)) if name != "None" => name.as_str(),
        _ => return None,
    };
    let mapped = pairing
        .get(source)
        .map(|p| p.object.as_str())
        .unwrap_or(source);
    if scene.object_by_name(mapped).is_some() {
        Some(mapped.to_string())
    } else {
        warnings.push(Warning::new(constraint, format!("target object '{mapped}' not found")));
        None
    }
}

/// Copy a recorded property into the form the new constraint stores.
/// `None` skips the property.
fn convert_property(
    scene: &Scene,
    subject: &str,
    value: &Value,
    warnings: &mut Vec<Warning>,
) -> Option<Value> {
    match value {
        Value::Matrix { matrix } => {
            if value.as_square_matrix().is_none() {
                warnings.push(Warning::new(subject, "matrix is not 3x3 or 4x4, skipped"));
                return None;
            }
            let n = matrix.len();
            let mut rows = vec![vec![0.0f32; n]; n];
            for (i, row) in matrix.iter().enumerate() {
                for (j, elem) in row.iter().enumerate() {
                    rows[i][j] = *elem;
                }
            }
            Some(Value::matrix(rows))
        }
        Value::ObjectRef { name, .. } => match scene.object_by_name(name) {
            Some(_) => Some(value.clone()),
            None => {
                warnings.push(Warning::new(subject, format!("object '{name}' not found")));
                Some(Value::Null)
            }
        },
        Value::Text(s) if s == "None" => Some(Value::Null),
        Value::Record(_) => {
            warnings.push(Warning::new(subject, "nested property cannot be restored, skipped"));
            None
        }
        other => Some(other.clone()),
    }
}

/// Re-create recorded constraints on the paired destination objects.
///
/// Destinations must be among the selected objects. Every gap (unpaired object,
/// missing destination, missing bone, unknown property) becomes a warning and the
/// batch carries on.
pub fn apply_constraint_data(
    scene: &mut Scene,
    data: &ConstraintData,
    pairing: &PairingMap,
    config: &Config,
) -> ConstraintReport {
    let mut report = ConstraintReport::default();
    for (source, recorded) in data {
        let Some(entry) = pairing.get(source) else {
            report
                .warnings
                .push(Warning::new(source.as_str(), "no destination object paired"));
            continue;
        };
        let Some(dest) = selected_named(scene, &entry.object) else {
            report.warnings.push(Warning::new(
                entry.object.as_str(),
                format!("did not find object to pair with '{source}' amongst selected objects"),
            ));
            continue;
        };

        for (bone_name, constraints) in &recorded.bone_constraints {
            if scene.bone(dest, bone_name).is_none() {
                report.warnings.push(Warning::new(
                    bone_name.as_str(),
                    format!("did not find bone in '{}'", entry.object),
                ));
                continue;
            }
            for (key, props) in constraints {
                let Some(kind) = props.get("type").and_then(Value::as_text) else {
                    report
                        .warnings
                        .push(Warning::new(key.as_str(), "recorded constraint has no type"));
                    continue;
                };
                let base = props
                    .get("name")
                    .and_then(Value::as_text)
                    .unwrap_or(key.as_str());
                let target = resolve_target(
                    scene,
                    pairing,
                    entry,
                    base,
                    props.get("target"),
                    &mut report.warnings,
                );

                let mut constraint = Constraint::new(String::new(), kind);
                constraint.target = target;
                for (prop, value) in props {
                    if config.is_excluded_constraint_property(prop) {
                        continue;
                    }
                    let subject = format!("{bone_name}/{base}.{prop}");
                    if let Some(v) = convert_property(scene, &subject, value, &mut report.warnings) {
                        constraint.properties.insert(prop.clone(), v);
                    }
                }
                if kind == "CHILD_OF" {
                    report.warnings.push(Warning::new(
                        format!("{bone_name}/{base}"),
                        "CHILD_OF inverse matrix is not set",
                    ));
                }

                let Some(bone) = scene.bone_mut(dest, bone_name) else {
                    continue;
                };
                let name = format!("{base}{}", config.constraint_suffix);
                constraint.name = bone.unique_constraint_name(&name);
                log::debug!("created {kind} '{}' on {bone_name}", constraint.name);
                report
                    .created
                    .push((entry.object.clone(), bone_name.clone(), constraint.name.clone()));
                bone.constraints.push(constraint);
            }
        }
    }
    report
}

/// Apply a constraint-set item.
pub fn apply_constraints(
    scene: &mut Scene,
    item_dir: &Path,
    config: &Config,
    pairing: &PairingMap,
) -> PoseLibResult<ConstraintReport> {
    let data = load_constraint_data(item_dir)?;
    Ok(apply_constraint_data(scene, &data, pairing, config))
}

/// Read `constraintData` from a constraint-set item.
pub fn load_constraint_data(item_dir: &Path) -> PoseLibResult<ConstraintData> {
    let item = LibraryItem::load(item_dir)?;
    if item.kind != ItemKind::ConstraintSet {
        return Err(PoseLibError::library_file(
            item.metadata_path(),
            format!("{} item is not a constraint set", item.kind.as_str()),
        ));
    }
    let path = item.metadata_path();
    item.document
        .constraint_data
        .ok_or_else(|| PoseLibError::library_file(path, "found no constraint data"))
}

/// Record the constraints on the selected bones of every selected armature.
/// Constraints targeting their own object are skipped.
pub fn capture_constraints(scene: &Scene) -> PoseLibResult<ConstraintData> {
    let objects: Vec<_> = scene
        .selected_objects()
        .into_iter()
        .filter(|id| scene.bones(*id).is_some())
        .collect();
    if objects.is_empty() {
        return Err(SelectionError::WrongCount {
            expected: 1,
            found: 0,
        }
        .into());
    }
    let mut data = ConstraintData::new();
    for id in objects {
        let (Some(object), Some(bones)) = (scene.object(id), scene.bones(id)) else {
            continue;
        };
        let selected: Vec<_> = bones.values().filter(|b| b.is_active_selection()).collect();
        if selected.is_empty() {
            return Err(SelectionError::NoBones {
                object: object.name.clone(),
            }
            .into());
        }
        let mut recorded = ObjectConstraints::default();
        for bone in selected {
            for cons in &bone.constraints {
                if cons.target.as_deref() == Some(object.name.as_str()) {
                    continue;
                }
                let target = match &cons.target {
                    Some(name) => match scene.object_by_name(name).and_then(|t| scene.object(t)) {
                        Some(t) => Value::object_ref(t.kind.object_type().as_str(), name.as_str()),
                        None => Value::Null,
                    },
                    None => Value::Null,
                };
                let mut props = ConstraintProperties::new();
                props.insert("name".into(), Value::text(cons.name.as_str()));
                props.insert("type".into(), Value::text(cons.kind.as_str()));
                props.insert("target".into(), target);
                for (k, v) in &cons.properties {
                    props.insert(k.clone(), v.clone());
                }
                recorded
                    .bone_constraints
                    .entry(bone.name.clone())
                    .or_default()
                    .insert(cons.name.clone(), props);
            }
        }
        data.insert(object.name.clone(), recorded);
    }
    Ok(data)
}

/// Select, on each paired destination object, the bones carrying recorded
/// constraints. Every other bone and object is deselected first.
pub fn select_constraint_bones(
    scene: &mut Scene,
    data: &ConstraintData,
    pairing: &PairingMap,
) -> SelectionReport {
    let mut report = SelectionReport::default();
    scene.clear_bone_selection();
    let candidates = scene.selected_objects();
    for id in &candidates {
        scene.set_selected(*id, false);
    }
    for (source, recorded) in data {
        let Some(entry) = pairing.get(source) else {
            report
                .warnings
                .push(Warning::new(source.as_str(), "no destination object paired"));
            continue;
        };
        let dest = candidates
            .iter()
            .copied()
            .find(|id| scene.object(*id).is_some_and(|o| o.name == entry.object));
        let Some(dest) = dest else {
            report.warnings.push(Warning::new(
                entry.object.as_str(),
                format!("did not find object to pair with '{source}' amongst selected objects"),
            ));
            continue;
        };
        scene.set_selected(dest, true);
        if scene.bones(dest).is_none() {
            report
                .warnings
                .push(Warning::new(entry.object.as_str(), "object does not have any bones"));
            continue;
        }
        for bone_name in recorded.bone_constraints.keys() {
            match scene.bone_mut(dest, bone_name) {
                Some(bone) => {
                    bone.selected = true;
                    report.selected.push(bone_name.clone());
                }
                None => report.warnings.push(Warning::new(
                    bone_name.as_str(),
                    format!("did not find bone in '{}'", entry.object),
                )),
            }
        }
    }
    report
}
