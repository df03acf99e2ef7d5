//! Identifiers and a simple allocator for scene data-store entities.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArmatureId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(pub u32);

/// Monotonic allocator for ObjectId, ArmatureId, ActionId and CollectionId.
/// Ids are never reused within a scene, so a removed entity's id stays dangling.
#[derive(Default, Debug, Clone)]
pub struct IdAllocator {
    next_object: u32,
    next_armature: u32,
    next_action: u32,
    next_collection: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_object(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object = self.next_object.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_armature(&mut self) -> ArmatureId {
        let id = ArmatureId(self.next_armature);
        self.next_armature = self.next_armature.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_action(&mut self) -> ActionId {
        let id = ActionId(self.next_action);
        self.next_action = self.next_action.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_collection(&mut self) -> CollectionId {
        let id = CollectionId(self.next_collection);
        self.next_collection = self.next_collection.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_object(), ObjectId(0));
        assert_eq!(alloc.alloc_object(), ObjectId(1));
        assert_eq!(alloc.alloc_armature(), ArmatureId(0));
        assert_eq!(alloc.alloc_action(), ActionId(0));
        assert_eq!(alloc.alloc_action(), ActionId(1));
        assert_eq!(alloc.alloc_collection(), CollectionId(0));
    }
}
