use std::collections::HashMap;

use mosaic_protocol::EntityKey;

/// Append-only assignment of spiral slots to entity keys.
///
/// One registry is shared by every entity category so all of them land on a
/// single spiral. Slots follow first-seen order and are never reused.
#[derive(Debug, Default, Clone)]
pub struct EntityKeyRegistry {
    slots: HashMap<EntityKey, usize>,
    next_slot: usize,
}

impl EntityKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot_for(&mut self, key: &EntityKey) -> usize {
        if let Some(&slot) = self.slots.get(key) {
            return slot;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(key.clone(), slot);
        slot
    }

    pub fn get(&self, key: &EntityKey) -> Option<usize> {
        self.slots.get(key).copied()
    }

    /// Number of slots handed out so far.
    pub fn len(&self) -> usize {
        self.next_slot
    }

    pub fn is_empty(&self) -> bool {
        self.next_slot == 0
    }
}
