use crate::api::events::EventHandler;
use crate::api::types::EntityId;
use crate::components::entity::Entity;

struct Entry {
    entity: Entity,
    behavior: Option<Box<dyn EventHandler>>,
    /// The behavior is currently out of its slot, running a handler.
    busy: bool,
    /// Destroy was requested while busy; finish it once the handler returns.
    doomed: bool,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Live entity registry: a dense arena addressed by generational handles.
///
/// Destroyed slots are reused with a bumped generation, so a stale
/// `EntityId` simply stops resolving. The registry also keeps the list of
/// collision-enabled handles; stale or disabled handles in that list are
/// pruned lazily when it is read.
pub struct World {
    slots: Vec<Slot>,
    free: Vec<u32>,
    colliders: Vec<EntityId>,
    len: usize,
}

impl World {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            colliders: Vec::new(),
            len: 0,
        }
    }

    /// Register an entity and its behavior. Returns the new handle.
    pub fn insert(&mut self, entity: Entity, behavior: Option<Box<dyn EventHandler>>) -> EntityId {
        let collision = entity.collision;
        let entry = Entry {
            entity,
            behavior,
            busy: false,
            doomed: false,
        };
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            EntityId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            EntityId::new(index, 0)
        };
        self.len += 1;
        if collision {
            self.colliders.push(id);
        }
        id
    }

    /// Free an entity's slot. Returns the entity and its behavior if the
    /// handle was live.
    pub fn remove(&mut self, id: EntityId) -> Option<(Entity, Option<Box<dyn EventHandler>>)> {
        let slot = self.slot_mut(id)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.len -= 1;
        Some((entry.entity, entry.behavior))
    }

    fn slot_mut(&mut self, id: EntityId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|s| s.generation == id.generation() && s.entry.is_some())
    }

    fn entry(&self, id: EntityId) -> Option<&Entry> {
        self.slots
            .get(id.index() as usize)
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.entry.as_ref())
    }

    fn entry_mut(&mut self, id: EntityId) -> Option<&mut Entry> {
        self.slot_mut(id).and_then(|s| s.entry.as_mut())
    }

    /// Whether `id` refers to a live entity that is not being destroyed.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entry(id).is_some_and(|e| !e.doomed)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entry(id).map(|e| &e.entity)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entry_mut(id).map(|e| &mut e.entity)
    }

    /// Overwrite an entity's data in place, keeping its handle.
    pub(crate) fn replace(&mut self, id: EntityId, entity: Entity) -> bool {
        let collision = entity.collision;
        let Some(entry) = self.entry_mut(id) else {
            return false;
        };
        entry.entity = entity;
        if collision && !self.colliders.contains(&id) {
            self.colliders.push(id);
        }
        true
    }

    /// Iterate over all live entities.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.entry
                .as_ref()
                .filter(|e| !e.doomed)
                .map(|e| (EntityId::new(i as u32, s.generation), &e.entity))
        })
    }

    /// Find the first entity with the given tag.
    pub fn find_by_tag(&self, tag: &str) -> Option<EntityId> {
        self.iter().find(|(_, e)| e.tag == tag).map(|(id, _)| id)
    }

    /// Find all entities with the given tag.
    pub fn find_all_by_tag(&self, tag: &str) -> Vec<EntityId> {
        self.iter().filter(|(_, e)| e.tag == tag).map(|(id, _)| id).collect()
    }

    /// Handles of every live entity, in slot order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Clear per-frame motion flags.
    pub(crate) fn begin_frame(&mut self) {
        for entry in self.slots.iter_mut().filter_map(|s| s.entry.as_mut()) {
            entry.entity.begin_frame();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // -- Collision membership --

    /// Toggle collision participation for `id`.
    pub fn set_collision(&mut self, id: EntityId, enabled: bool) {
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        entry.entity.collision = enabled;
        if enabled && !self.colliders.contains(&id) {
            self.colliders.push(id);
        }
    }

    /// Current collision-enabled handles, pruning stale entries first.
    pub fn colliders(&mut self) -> Vec<EntityId> {
        let mut colliders = std::mem::take(&mut self.colliders);
        colliders.retain(|id| self.contains(*id) && self.get(*id).is_some_and(|e| e.collision));
        self.colliders = colliders;
        self.colliders.clone()
    }

    // -- Behaviors --

    /// Take the behavior out for the duration of a handler call.
    pub(crate) fn take_behavior(&mut self, id: EntityId) -> Option<Box<dyn EventHandler>> {
        let entry = self.entry_mut(id)?;
        let behavior = entry.behavior.take()?;
        entry.busy = true;
        Some(behavior)
    }

    /// Put a behavior back after its handler returned.
    pub(crate) fn restore_behavior(&mut self, id: EntityId, behavior: Box<dyn EventHandler>) {
        if let Some(entry) = self.entry_mut(id) {
            entry.busy = false;
            entry.behavior = Some(behavior);
        }
    }

    pub(crate) fn set_behavior(&mut self, id: EntityId, behavior: Option<Box<dyn EventHandler>>) {
        if let Some(entry) = self.entry_mut(id) {
            entry.behavior = behavior;
        }
    }

    pub(crate) fn is_busy(&self, id: EntityId) -> bool {
        self.entry(id).is_some_and(|e| e.busy)
    }

    pub(crate) fn doom(&mut self, id: EntityId) {
        if let Some(entry) = self.entry_mut(id) {
            entry.doomed = true;
        }
    }

    pub(crate) fn is_doomed(&self, id: EntityId) -> bool {
        self.entry(id).is_some_and(|e| e.doomed)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
