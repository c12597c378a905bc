//! Rooms: an ordered entity list, views and a background, plus the snapshot
//! a reset restores.
//!
//! Room state moves between uninitialized (never activated), started and
//! active. Activation and its events are driven by the game; this module
//! owns the data and the snapshot bookkeeping.

use crate::api::events::{BehaviorFactory, EventHandler};
use crate::api::types::EntityId;
use crate::assets::registry::SpriteStore;
use crate::components::background::Background;
use crate::components::entity::Entity;
use crate::core::registry::World;
use crate::renderer::view::View;
use crate::systems::update::sync_sprite_bbox;

/// An entity that belongs to the room's initial configuration.
struct Template {
    entity: Entity,
    factory: Option<BehaviorFactory>,
    /// Handle of the live copy, if one was ever registered.
    live: Option<EntityId>,
}

/// Initial configuration captured when the room is added to a game.
struct Snapshot {
    views: Vec<View>,
    background: Background,
}

pub struct Room {
    pub width: f32,
    pub height: f32,
    pub views: Vec<View>,
    pub background: Background,
    entities: Vec<EntityId>,
    started: bool,
    initialized: bool,
    pub(crate) handler: Option<Box<dyn EventHandler>>,
    templates: Vec<Template>,
    snapshot: Option<Snapshot>,
}

impl Room {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            views: Vec::new(),
            background: Background::default(),
            entities: Vec::new(),
            started: false,
            initialized: false,
            handler: None,
            templates: Vec::new(),
            snapshot: None,
        }
    }

    // -- Builder pattern --

    pub fn with_view(mut self, view: View) -> Self {
        self.views.push(view);
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_handler(mut self, handler: Box<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Add an entity to the initial configuration. It is registered when the
    /// room first starts, and restored (with a fresh handler from `factory`)
    /// on every reset.
    pub fn with_entity(mut self, entity: Entity, factory: Option<BehaviorFactory>) -> Self {
        self.templates.push(Template {
            entity,
            factory,
            live: None,
        });
        self
    }

    // -- Queries --

    /// Live entity handles in insertion order.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    /// Whether the room has fired its start events since the last reset.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Whether the initial entities were ever registered.
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    /// Views to composite. A room without views is seen through one
    /// full-screen view at the room origin.
    pub fn effective_views(&self, screen_width: f32, screen_height: f32) -> Vec<View> {
        if self.views.is_empty() {
            vec![View::full_screen(screen_width, screen_height)]
        } else {
            self.views.clone()
        }
    }

    // -- Membership --

    /// Append `id` unless it is already listed.
    pub(crate) fn push_entity(&mut self, id: EntityId) {
        if !self.entities.contains(&id) {
            self.entities.push(id);
        }
    }

    pub(crate) fn remove_entity(&mut self, id: EntityId) -> bool {
        let before = self.entities.len();
        self.entities.retain(|e| *e != id);
        self.entities.len() != before
    }

    pub(crate) fn set_started(&mut self, started: bool) {
        self.started = started;
    }

    // -- Snapshot --

    /// Record the current views and background as the reset target.
    pub(crate) fn capture(&mut self) {
        self.snapshot = Some(Snapshot {
            views: self.views.clone(),
            background: self.background.clone(),
        });
    }

    /// Restore the initial configuration.
    ///
    /// Views and background return to their snapshot. Initial entities are
    /// overwritten in place if still alive, or registered again if not, and
    /// get fresh handlers. Every other entity leaves the list; the live ones
    /// are returned so the caller can free those no other room holds.
    /// The room is left not started.
    pub(crate) fn reset(&mut self, world: &mut World, sprites: &SpriteStore) -> Vec<EntityId> {
        if let Some(snapshot) = &self.snapshot {
            self.views = snapshot.views.clone();
            self.background = snapshot.background.clone();
        }
        self.background.mark_dirty();

        let mut restored = Vec::with_capacity(self.templates.len());
        for template in &mut self.templates {
            let mut entity = template.entity.clone();
            sync_sprite_bbox(&mut entity, sprites);
            let behavior = template.factory.as_ref().map(|make| make());

            let id = match template.live {
                Some(id) if world.contains(id) => {
                    world.replace(id, entity);
                    world.set_behavior(id, behavior);
                    id
                }
                _ => world.insert(entity, behavior),
            };
            template.live = Some(id);
            restored.push(id);
        }

        let dropped = self
            .entities
            .iter()
            .copied()
            .filter(|id| !restored.contains(id) && world.contains(*id))
            .collect();
        self.entities = restored;
        self.started = false;
        self.initialized = true;
        dropped
    }
}
