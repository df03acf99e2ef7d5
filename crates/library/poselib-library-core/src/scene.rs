//! Scene: the explicit data-store context every engine operation receives.
//!
//! Objects, armatures, actions and collections live in id-keyed arenas. User counts
//! are derived from links (scene and collection membership, object data, assigned
//! actions), so an entity with zero users is exactly an orphan.

use indexmap::IndexMap;
use poselib_api_core::{ChannelError, ChannelKind, ChannelPath};

use crate::action::Action;
use crate::error::{PoseLibError, PoseLibResult, SelectionError};
use crate::ids::{ActionId, ArmatureId, CollectionId, IdAllocator, ObjectId};
use crate::rig::Bone;
use crate::scene_file::{ObjectType, SceneFile};

/// `base`, or `base.001`, `base.002`... whichever is free first.
pub(crate) fn unique_name(base: &str, exists: impl Fn(&str) -> bool) -> String {
    if !exists(base) {
        return base.to_string();
    }
    (1u32..)
        .map(|n| format!("{base}.{n:03}"))
        .find(|candidate| !exists(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Armature(ArmatureId),
    Mesh,
    Empty,
}

impl ObjectKind {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectKind::Armature(_) => ObjectType::Armature,
            ObjectKind::Mesh => ObjectType::Mesh,
            ObjectKind::Empty => ObjectType::Empty,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Object {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
    pub selected: bool,
    pub hide_viewport: bool,
    pub hide_render: bool,
    /// Active action
    pub action: Option<ActionId>,
}

impl Object {
    pub fn armature(&self) -> Option<ArmatureId> {
        match self.kind {
            ObjectKind::Armature(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Armature {
    pub id: ArmatureId,
    pub name: String,
    pub bones: IndexMap<String, Bone>,
}

#[derive(Clone, Debug)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub objects: Vec<ObjectId>,
    pub children: Vec<CollectionId>,
}

/// Entity counts, used to check that operations leave no residue behind.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DataCounts {
    pub objects: usize,
    pub armatures: usize,
    pub actions: usize,
    pub collections: usize,
}

#[derive(Clone, Debug)]
pub struct Scene {
    ids: IdAllocator,
    objects: IndexMap<ObjectId, Object>,
    armatures: IndexMap<ArmatureId, Armature>,
    actions: IndexMap<ActionId, Action>,
    collections: IndexMap<CollectionId, Collection>,
    /// Scene master collection links
    linked_objects: Vec<ObjectId>,
    linked_collections: Vec<CollectionId>,

    pub frame_current: i32,
    pub frame_start: i32,
    pub frame_end: i32,
    /// Host auto-keying toggle, read when an operation decides to insert keys.
    pub auto_keyframe: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            objects: IndexMap::new(),
            armatures: IndexMap::new(),
            actions: IndexMap::new(),
            collections: IndexMap::new(),
            linked_objects: Vec::new(),
            linked_collections: Vec::new(),
            frame_current: 1,
            frame_start: 1,
            frame_end: 250,
            auto_keyframe: false,
        }
    }

    // ----- construction -----

    fn unique_object_name(&self, base: &str) -> String {
        unique_name(base, |n| self.objects.values().any(|o| o.name == n))
    }

    fn unique_action_name(&self, base: &str) -> String {
        unique_name(base, |n| self.actions.values().any(|a| a.name == n))
    }

    fn insert_object(&mut self, name: &str, kind: ObjectKind) -> ObjectId {
        let id = self.ids.alloc_object();
        let name = self.unique_object_name(name);
        self.objects.insert(
            id,
            Object {
                id,
                name,
                kind,
                selected: false,
                hide_viewport: false,
                hide_render: false,
                action: None,
            },
        );
        id
    }

    fn insert_armature(&mut self, name: &str, bones: impl IntoIterator<Item = Bone>) -> ArmatureId {
        let id = self.ids.alloc_armature();
        let bones = bones.into_iter().map(|b| (b.name.clone(), b)).collect();
        self.armatures.insert(
            id,
            Armature {
                id,
                name: name.to_string(),
                bones,
            },
        );
        id
    }

    /// Create an armature object linked to the scene.
    pub fn add_armature_object(
        &mut self,
        name: &str,
        bones: impl IntoIterator<Item = Bone>,
    ) -> ObjectId {
        let armature = self.insert_armature(name, bones);
        let id = self.insert_object(name, ObjectKind::Armature(armature));
        self.linked_objects.push(id);
        id
    }

    /// Create a non-armature object linked to the scene.
    pub fn add_object(&mut self, name: &str, object_type: ObjectType) -> ObjectId {
        let id = match object_type {
            ObjectType::Armature => return self.add_armature_object(name, Vec::new()),
            ObjectType::Mesh => self.insert_object(name, ObjectKind::Mesh),
            ObjectType::Empty => self.insert_object(name, ObjectKind::Empty),
        };
        self.linked_objects.push(id);
        id
    }

    /// Create a collection under `parent`, or under the scene when `None`.
    pub fn new_collection(&mut self, name: &str, parent: Option<CollectionId>) -> CollectionId {
        let id = self.ids.alloc_collection();
        self.collections.insert(
            id,
            Collection {
                id,
                name: name.to_string(),
                objects: Vec::new(),
                children: Vec::new(),
            },
        );
        match parent.and_then(|p| self.collections.get_mut(&p)) {
            Some(parent) => parent.children.push(id),
            None => self.linked_collections.push(id),
        }
        id
    }

    pub fn link_to_collection(&mut self, collection: CollectionId, object: ObjectId) {
        if let Some(c) = self.collections.get_mut(&collection) {
            if !c.objects.contains(&object) {
                c.objects.push(object);
            }
        }
    }

    pub fn link_object(&mut self, object: ObjectId) {
        if !self.linked_objects.contains(&object) {
            self.linked_objects.push(object);
        }
    }

    pub fn unlink_object(&mut self, object: ObjectId) {
        self.linked_objects.retain(|o| *o != object);
    }

    /// Detach a collection from the scene and every parent collection.
    pub fn unlink_collection(&mut self, collection: CollectionId) {
        self.linked_collections.retain(|c| *c != collection);
        for c in self.collections.values_mut() {
            c.children.retain(|child| *child != collection);
        }
    }

    // ----- lookup -----

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    pub fn object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects.values().find(|o| o.name == name).map(|o| o.id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn armature(&self, id: ArmatureId) -> Option<&Armature> {
        self.armatures.get(&id)
    }

    pub fn armatures(&self) -> impl Iterator<Item = &Armature> {
        self.armatures.values()
    }

    pub fn collection(&self, id: CollectionId) -> Option<&Collection> {
        self.collections.get(&id)
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    pub fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(&id)
    }

    pub fn action_mut(&mut self, id: ActionId) -> Option<&mut Action> {
        self.actions.get_mut(&id)
    }

    pub fn action_by_name(&self, name: &str) -> Option<ActionId> {
        self.actions
            .iter()
            .find(|(_, a)| a.name == name)
            .map(|(id, _)| *id)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    /// Bones of an armature object, `None` for other objects.
    pub fn bones(&self, object: ObjectId) -> Option<&IndexMap<String, Bone>> {
        let armature = self.objects.get(&object)?.armature()?;
        self.armatures.get(&armature).map(|a| &a.bones)
    }

    pub fn bones_mut(&mut self, object: ObjectId) -> Option<&mut IndexMap<String, Bone>> {
        let armature = self.objects.get(&object)?.armature()?;
        self.armatures.get_mut(&armature).map(|a| &mut a.bones)
    }

    pub fn bone(&self, object: ObjectId, name: &str) -> Option<&Bone> {
        self.bones(object)?.get(name)
    }

    pub fn bone_mut(&mut self, object: ObjectId, name: &str) -> Option<&mut Bone> {
        self.bones_mut(object)?.get_mut(name)
    }

    pub fn counts(&self) -> DataCounts {
        DataCounts {
            objects: self.objects.len(),
            armatures: self.armatures.len(),
            actions: self.actions.len(),
            collections: self.collections.len(),
        }
    }

    // ----- users -----

    pub fn object_users(&self, id: ObjectId) -> usize {
        let scene = usize::from(self.linked_objects.contains(&id));
        scene
            + self
                .collections
                .values()
                .filter(|c| c.objects.contains(&id))
                .count()
    }

    pub fn armature_users(&self, id: ArmatureId) -> usize {
        self.objects
            .values()
            .filter(|o| o.armature() == Some(id))
            .count()
    }

    pub fn action_users(&self, id: ActionId) -> usize {
        self.objects
            .values()
            .filter(|o| o.action == Some(id))
            .count()
    }

    pub fn collection_users(&self, id: CollectionId) -> usize {
        let scene = usize::from(self.linked_collections.contains(&id));
        scene
            + self
                .collections
                .values()
                .filter(|c| c.children.contains(&id))
                .count()
    }

    // ----- removal -----

    /// Remove an object and every link to it. Its armature data stays until orphan
    /// cleanup removes it.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<Object> {
        self.linked_objects.retain(|o| *o != id);
        for c in self.collections.values_mut() {
            c.objects.retain(|o| *o != id);
        }
        self.objects.shift_remove(&id)
    }

    pub fn remove_armature(&mut self, id: ArmatureId) -> Option<Armature> {
        self.armatures.shift_remove(&id)
    }

    /// Remove a collection and its links. Objects it held are not removed.
    pub fn remove_collection(&mut self, id: CollectionId) -> Option<Collection> {
        self.unlink_collection(id);
        self.collections.shift_remove(&id)
    }

    /// Remove an action, unassigning it from any object.
    pub fn remove_action(&mut self, id: ActionId) -> Option<Action> {
        for o in self.objects.values_mut() {
            if o.action == Some(id) {
                o.action = None;
            }
        }
        self.actions.shift_remove(&id)
    }

    // ----- selection -----

    /// Selected objects in creation order.
    pub fn selected_objects(&self) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.selected)
            .map(|o| o.id)
            .collect()
    }

    pub fn set_selected(&mut self, object: ObjectId, selected: bool) {
        if let Some(o) = self.objects.get_mut(&object) {
            o.selected = selected;
        }
    }

    /// Deselect everything, then select `object`.
    pub fn select_only(&mut self, object: ObjectId) {
        for o in self.objects.values_mut() {
            o.selected = o.id == object;
        }
    }

    /// The one selected object, which must be an armature.
    pub fn single_selected_rig(&self) -> Result<ObjectId, SelectionError> {
        let selected = self.selected_objects();
        let (only, object) = match selected.as_slice() {
            [only] => match self.objects.get(only) {
                Some(object) => (*only, object),
                None => {
                    return Err(SelectionError::WrongCount {
                        expected: 1,
                        found: 0,
                    })
                }
            },
            _ => {
                return Err(SelectionError::WrongCount {
                    expected: 1,
                    found: selected.len(),
                })
            }
        };
        if object.armature().is_none() {
            return Err(SelectionError::WrongType {
                object: object.name.clone(),
                kind: object.kind.object_type().as_str().to_string(),
            });
        }
        Ok(only)
    }

    /// Names of the selected, visible bones of an armature object.
    pub fn selected_bones(&self, object: ObjectId) -> Vec<String> {
        self.bones(object)
            .map(|bones| {
                bones
                    .values()
                    .filter(|b| b.is_active_selection())
                    .map(|b| b.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Deselect every bone of every armature.
    pub fn clear_bone_selection(&mut self) {
        for armature in self.armatures.values_mut() {
            for bone in armature.bones.values_mut() {
                bone.selected = false;
            }
        }
    }

    // ----- animation -----

    /// Create an action with a free name derived from `name`.
    pub fn new_action(&mut self, name: &str) -> ActionId {
        let id = self.ids.alloc_action();
        let mut action = Action::new(self.unique_action_name(name));
        action.id = Some(id);
        self.actions.insert(id, action);
        id
    }

    /// Rename an action, resolving collisions with a numeric suffix.
    pub fn rename_action(&mut self, id: ActionId, name: &str) -> Option<String> {
        let free = unique_name(name, |n| {
            self.actions
                .iter()
                .any(|(other, a)| *other != id && a.name == n)
        });
        let action = self.actions.get_mut(&id)?;
        action.name = free.clone();
        Some(free)
    }

    pub fn set_action(&mut self, object: ObjectId, action: Option<ActionId>) {
        if let Some(o) = self.objects.get_mut(&object) {
            o.action = action;
        }
    }

    /// The object's active action, created as `<object>Action` when absent.
    pub fn ensure_action(&mut self, object: ObjectId) -> PoseLibResult<ActionId> {
        let o = self.objects.get(&object).ok_or_else(|| missing_object(object))?;
        if let Some(existing) = o.action.filter(|a| self.actions.contains_key(a)) {
            return Ok(existing);
        }
        let name = format!("{}Action", o.name);
        let id = self.new_action(&name);
        self.set_action(object, Some(id));
        Ok(id)
    }

    /// Key the current value of a bone channel at `frame` into the object's action.
    /// Returns the keyed value.
    pub fn keyframe_insert(
        &mut self,
        object: ObjectId,
        path: &ChannelPath,
        index: Option<usize>,
        frame: f32,
    ) -> PoseLibResult<f32> {
        let bone_name = path.bone_name().ok_or_else(|| ChannelError::InvalidPath {
            path: path.to_string(),
            reason: "object-level channels cannot be keyed on a rig".into(),
        })?;
        let bone = self
            .bone(object, bone_name)
            .ok_or_else(|| ChannelError::InvalidPath {
                path: path.to_string(),
                reason: "bone not found on object".into(),
            })?;
        let value = bone.get_channel(&path.kind, index)?;
        let action = self.ensure_action(object)?;
        let array_index = index.map(|i| i as i32).unwrap_or(-1);
        if let Some(action) = self.actions.get_mut(&action) {
            action
                .ensure_fcurve(&path.to_string(), array_index)
                .insert(frame, value);
        }
        log::debug!("keyed {path}[{array_index}] = {value} at frame {frame}");
        Ok(value)
    }

    /// Delete keys of a channel inside `[start, end]` on the object's active action.
    /// `index: None` addresses every component curve of the channel.
    /// Returns the number of keys removed; 0 when the object has no action.
    pub fn keyframe_delete(
        &mut self,
        object: ObjectId,
        path: &ChannelPath,
        index: Option<usize>,
        start: f32,
        end: f32,
    ) -> usize {
        let Some(action) = self
            .objects
            .get(&object)
            .and_then(|o| o.action)
            .and_then(|a| self.actions.get_mut(&a))
        else {
            return 0;
        };
        let data_path = path.to_string();
        action
            .fcurves
            .iter_mut()
            .filter(|fc| fc.data_path == data_path)
            .filter(|fc| index.map_or(true, |i| fc.array_index == i as i32))
            .map(|fc| fc.delete_range(start, end))
            .sum()
    }

    /// Group the object's action curves into per-bone channel groups.
    pub fn group_channels_by_bone(&mut self, object: ObjectId) {
        if let Some(action) = self
            .objects
            .get(&object)
            .and_then(|o| o.action)
            .and_then(|a| self.actions.get_mut(&a))
        {
            action.group_by_bone();
        }
    }

    // ----- import -----

    /// Instantiate a named object from a scene file. The object is not linked to the
    /// scene, not selected and hidden; it has zero users until linked.
    pub fn import_object(&mut self, file: &SceneFile, name: &str) -> PoseLibResult<ObjectId> {
        let data = file.object(name).ok_or_else(|| {
            PoseLibError::library_file(file.path(), format!("no object named '{name}'"))
        })?;
        let kind = match data.kind {
            ObjectType::Armature => {
                ObjectKind::Armature(self.insert_armature(&data.name, data.bones.iter().cloned()))
            }
            ObjectType::Mesh => ObjectKind::Mesh,
            ObjectType::Empty => ObjectKind::Empty,
        };
        let id = self.insert_object(&data.name, kind);
        if let Some(o) = self.objects.get_mut(&id) {
            o.hide_viewport = true;
            o.hide_render = true;
        }
        log::debug!("imported object '{}' from {}", data.name, file.path().display());
        Ok(id)
    }

    /// Instantiate a named action from a scene file, with zero users.
    pub fn import_action(&mut self, file: &SceneFile, name: &str) -> PoseLibResult<ActionId> {
        let data = file.action(name).ok_or_else(|| {
            PoseLibError::library_file(file.path(), format!("no action named '{name}'"))
        })?;
        let id = self.new_action(&data.name);
        if let Some(action) = self.actions.get_mut(&id) {
            action.fcurves = data.fcurves.clone();
            action.groups = data.groups.clone();
        }
        Ok(id)
    }
}

fn missing_object(id: ObjectId) -> PoseLibError {
    PoseLibError::Channel(ChannelError::InvalidPath {
        path: format!("{id:?}"),
        reason: "object not in scene".into(),
    })
}

/// Channels that transform-keying and range deletion address on a bone.
pub const TRANSFORM_CHANNELS: [ChannelKind; 4] = [
    ChannelKind::Location,
    ChannelKind::RotationEuler,
    ChannelKind::RotationQuaternion,
    ChannelKind::Scale,
];
