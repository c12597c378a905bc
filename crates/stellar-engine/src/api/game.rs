use std::collections::{HashMap, VecDeque};

use glam::Vec2;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::api::error::EngineError;
use crate::api::events::{deliver_input, EventHandler};
use crate::api::types::{EntityId, FontHandle, RoomId, SoundHandle, SpriteId};
use crate::assets::loader::AssetLoader;
use crate::assets::manifest::GameManifest;
use crate::assets::registry::SpriteStore;
use crate::components::entity::Entity;
use crate::components::sprite::Sprite;
use crate::core::collision::{self, ContactKind};
use crate::core::registry::World;
use crate::core::room::Room;
use crate::core::time::{Clock, DeltaTimer, FrameTiming};
use crate::input::queue::{InputEvent, InputSource};
use crate::renderer::draw::Frame;
use crate::renderer::traits::Presenter;
use crate::systems::render::Compositor;
use crate::systems::update::{sync_sprite_bbox, update_entity, UpdateEvent};

/// Configuration for the engine, provided by the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Logical screen width in pixels (default: 640).
    pub width: u32,
    /// Logical screen height in pixels (default: 480).
    pub height: u32,
    /// Target frame rate (default: 60).
    pub fps: f32,
    /// Scale motion and alarms by measured frame time (default: off).
    pub delta: bool,
    /// Lowest virtual frame rate delta timing compensates for (default: 15).
    pub delta_min: f32,
    /// Highest virtual frame rate. Faster real frames count as this rate.
    pub delta_max: Option<f32>,
    /// Device pixels per logical pixel (default: 1).
    pub scale: f32,
    /// Run the collision pass every frame (default: on).
    pub collision_events: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 60.0,
            delta: false,
            delta_min: 15.0,
            delta_max: None,
            scale: 1.0,
            collision_events: true,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    NotStarted,
    Running,
    Ended,
}

/// Room change requested from a handler, applied at the top of the next frame.
#[derive(Debug, Clone, Copy)]
enum RoomRequest {
    Goto(usize),
    Next,
    Previous,
}

/// Owns every room, the live entity registry and the sprite store, and runs
/// the frame sequence: input, step, update, collision, composite.
pub struct Game {
    config: GameConfig,
    world: World,
    sprites: SpriteStore,
    rooms: Vec<Room>,
    current: usize,
    handler: Option<Box<dyn EventHandler>>,
    timer: DeltaTimer,
    timing: FrameTiming,
    compositor: Compositor,
    mouse: EntityId,
    sounds: HashMap<String, SoundHandle>,
    fonts: HashMap<String, FontHandle>,
    playing: Vec<SoundHandle>,
    requests: VecDeque<RoomRequest>,
    state: GameState,
    ending: bool,
    paused: bool,
    frames: u64,
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        let mut timer = DeltaTimer::new(config.fps);
        if config.delta {
            timer = timer.with_delta(config.delta_min, config.delta_max);
        }
        let timing = timer.measure(timer.frame_time());

        let mut world = World::new();
        let mouse = world.insert(Entity::new(0.0, 0.0).with_tag("mouse").with_z(i32::MAX), None);

        Self {
            config,
            world,
            sprites: SpriteStore::new(),
            rooms: Vec::new(),
            current: 0,
            handler: None,
            timer,
            timing,
            compositor: Compositor::new(),
            mouse,
            sounds: HashMap::new(),
            fonts: HashMap::new(),
            playing: Vec::new(),
            requests: VecDeque::new(),
            state: GameState::NotStarted,
            ending: false,
            paused: false,
            frames: 0,
        }
    }

    /// Build a game from a manifest: sprites (in name order), sounds, fonts,
    /// then rooms.
    pub fn from_manifest(manifest: &GameManifest, loader: &dyn AssetLoader) -> Result<Self, EngineError> {
        let mut game = Self::new(manifest.config.clone());

        let mut names: Vec<&String> = manifest.sprites.keys().collect();
        names.sort();
        for name in names {
            let sprite = manifest.sprites[name].apply(Sprite::load(name, loader)?);
            game.sprites.insert(sprite);
        }
        for name in &manifest.sounds {
            game.load_sound(name, loader)?;
        }
        for name in &manifest.fonts {
            game.load_font(name, loader)?;
        }
        for desc in &manifest.rooms {
            let room = desc.build(&game.sprites)?;
            game.add_room(room);
        }
        info!(
            "game built from manifest: {} sprites, {} rooms",
            game.sprites.len(),
            game.rooms.len()
        );
        Ok(game)
    }

    pub fn with_handler(mut self, handler: Box<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn set_handler(&mut self, handler: Box<dyn EventHandler>) {
        self.handler = Some(handler);
    }

    /// Append a room. Its current views and background become the state a
    /// reset returns to.
    pub fn add_room(&mut self, mut room: Room) -> RoomId {
        room.capture();
        self.rooms.push(room);
        RoomId(self.rooms.len() - 1)
    }

    // -- Accessors --

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id.0)
    }

    pub fn room_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id.0)
    }

    pub fn current_room(&self) -> RoomId {
        RoomId(self.current)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn sprites(&self) -> &SpriteStore {
        &self.sprites
    }

    /// Mutable sprite access. Forces a full redraw on the next frame.
    pub fn sprites_mut(&mut self) -> &mut SpriteStore {
        self.compositor.invalidate();
        &mut self.sprites
    }

    pub fn load_sprite(&mut self, name: &str, loader: &dyn AssetLoader) -> Result<SpriteId, EngineError> {
        Ok(self.sprites.load(name, loader)?)
    }

    pub fn load_sound(&mut self, name: &str, loader: &dyn AssetLoader) -> Result<SoundHandle, EngineError> {
        let handle = loader.load_sound(name)?;
        self.sounds.insert(name.to_string(), handle);
        Ok(handle)
    }

    pub fn load_font(&mut self, name: &str, loader: &dyn AssetLoader) -> Result<FontHandle, EngineError> {
        let handle = loader.load_font(name)?;
        self.fonts.insert(name.to_string(), handle);
        Ok(handle)
    }

    pub fn sound(&self, name: &str) -> Option<SoundHandle> {
        self.sounds.get(name).copied()
    }

    pub fn font(&self, name: &str) -> Option<FontHandle> {
        self.fonts.get(name).copied()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Live entity by handle. Stale or destroyed handles yield `None`.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.world.get(id).filter(|_| self.world.contains(id))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if !self.world.contains(id) {
            return None;
        }
        self.world.get_mut(id)
    }

    /// Toggle whether an entity takes part in collision tests.
    pub fn set_collision(&mut self, id: EntityId, enabled: bool) {
        self.world.set_collision(id, enabled);
    }

    /// The built-in pointer entity.
    pub fn mouse(&self) -> EntityId {
        self.mouse
    }

    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Frames processed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    // -- Entities --

    /// Register an entity in the current room. Its create event fires right
    /// away if the room has already started, otherwise when it starts.
    ///
    /// Entities created before the first room starts are dropped by that
    /// room's reset; initial entities belong in `Room::with_entity`.
    pub fn create(&mut self, mut entity: Entity, behavior: Option<Box<dyn EventHandler>>) -> EntityId {
        assert!(!self.rooms.is_empty(), "cannot create an entity in a game without rooms");
        sync_sprite_bbox(&mut entity, &self.sprites);
        let id = self.world.insert(entity, behavior);
        let room = &mut self.rooms[self.current];
        room.push_entity(id);
        debug!("created entity {:?} in room {}", id, self.current);
        if room.started() {
            self.dispatch_entity(id, |h, ctx| h.on_create(ctx));
        }
        id
    }

    /// Destroy an entity: it leaves every room and the collision list at
    /// once. Its destroy event runs now, or as soon as its own running
    /// handler returns. Stale handles and the mouse are ignored.
    pub fn destroy(&mut self, id: EntityId) {
        if id == self.mouse || !self.world.contains(id) {
            return;
        }
        debug!("destroying entity {:?}", id);
        for room in &mut self.rooms {
            room.remove_entity(id);
        }
        self.world.doom(id);
        if !self.world.is_busy(id) {
            self.finish_destroy(id);
        }
    }

    fn finish_destroy(&mut self, id: EntityId) {
        if let Some(mut behavior) = self.world.take_behavior(id) {
            let mut ctx = EventContext {
                game: self,
                this: Some(id),
            };
            behavior.on_destroy(&mut ctx);
        }
        self.world.remove(id);
    }

    // -- Game and room control --

    /// Fire the game start event and start the first room.
    pub fn start(&mut self) {
        assert!(!self.rooms.is_empty(), "cannot start a game without rooms");
        if self.state != GameState::NotStarted {
            return;
        }
        info!("game starting with {} rooms", self.rooms.len());
        self.state = GameState::Running;
        self.dispatch_game(|h, ctx| h.on_game_start(ctx));
        self.start_room(RoomId(0));
    }

    /// Reset a room to its initial configuration, then resume it.
    pub fn start_room(&mut self, room: RoomId) {
        self.check_room(room);
        self.reset_room(room.0);
        self.resume_room(room);
    }

    /// Make a room current without resetting it. Start and create events
    /// fire only if the room has not started since its last reset.
    pub fn resume_room(&mut self, room: RoomId) {
        self.check_room(room);
        let index = room.0;
        self.current = index;
        if !self.rooms[index].initialized() {
            self.reset_room(index);
        }
        if self.rooms[index].started() {
            info!("resuming room {}", index);
            return;
        }

        info!("starting room {}", index);
        self.rooms[index].set_started(true);
        let entities = self.rooms[index].entities().to_vec();
        self.dispatch_game(|h, ctx| h.on_room_start(ctx));
        self.dispatch_room(index, |h, ctx| h.on_room_start(ctx));
        for id in entities {
            self.dispatch_entity(id, |h, ctx| h.on_create(ctx));
        }
    }

    /// End the current room and move on to the next one, ending the game
    /// if there is none.
    pub fn end_room(&mut self) {
        self.switch_room(Some(self.current + 1));
    }

    /// End the current room and activate `room`. An unknown room ends the
    /// game.
    pub fn goto_room(&mut self, room: RoomId) {
        self.switch_room(Some(room.0));
    }

    pub fn pause(&mut self) {
        if !self.paused {
            info!("game paused");
            self.paused = true;
        }
    }

    pub fn unpause(&mut self) {
        if self.paused {
            info!("game unpaused");
            self.paused = false;
        }
    }

    /// Request the game to end. Observed at the top of the next frame.
    pub fn end(&mut self) {
        match self.state {
            GameState::NotStarted => self.state = GameState::Ended,
            GameState::Running => self.ending = true,
            GameState::Ended => {}
        }
    }

    fn check_room(&self, room: RoomId) {
        assert!(
            room.0 < self.rooms.len(),
            "room index {} out of range ({} rooms)",
            room.0,
            self.rooms.len()
        );
    }

    fn reset_room(&mut self, index: usize) {
        let dropped = self.rooms[index].reset(&mut self.world, &self.sprites);
        for id in dropped {
            if !self.rooms.iter().any(|r| r.contains(id)) {
                self.world.remove(id);
            }
        }
    }

    fn switch_room(&mut self, target: Option<usize>) {
        let leaving = self.current;
        info!("ending room {}", leaving);
        self.dispatch_game(|h, ctx| h.on_room_end(ctx));
        self.dispatch_room(leaving, |h, ctx| h.on_room_end(ctx));
        self.reset_room(leaving);

        match target.filter(|index| *index < self.rooms.len()) {
            Some(index) => self.resume_room(RoomId(index)),
            None => {
                warn!("no room to follow room {}, ending game", leaving);
                self.end();
            }
        }
    }

    fn apply_room_requests(&mut self) {
        while let Some(request) = self.requests.pop_front() {
            if self.ending {
                self.requests.clear();
                break;
            }
            let target = match request {
                RoomRequest::Goto(index) => Some(index),
                RoomRequest::Next => Some(self.current + 1),
                RoomRequest::Previous => self.current.checked_sub(1),
            };
            self.switch_room(target);
        }
    }

    fn shutdown(&mut self) {
        self.ending = false;
        if self.state != GameState::Running {
            self.state = GameState::Ended;
            return;
        }
        info!("game ending after {} frames", self.frames);
        let current = self.current;
        self.dispatch_game(|h, ctx| h.on_game_end(ctx));
        self.dispatch_room(current, |h, ctx| h.on_game_end(ctx));
        self.state = GameState::Ended;
    }

    // -- Dispatch --

    fn dispatch_game<F>(&mut self, f: F)
    where
        F: FnOnce(&mut dyn EventHandler, &mut EventContext<'_>),
    {
        let Some(mut handler) = self.handler.take() else {
            return;
        };
        let mut ctx = EventContext { game: self, this: None };
        f(handler.as_mut(), &mut ctx);
        if self.handler.is_none() {
            self.handler = Some(handler);
        }
    }

    fn dispatch_room<F>(&mut self, index: usize, f: F)
    where
        F: FnOnce(&mut dyn EventHandler, &mut EventContext<'_>),
    {
        let Some(mut handler) = self.rooms[index].handler.take() else {
            return;
        };
        let mut ctx = EventContext { game: self, this: None };
        f(handler.as_mut(), &mut ctx);
        let room = &mut self.rooms[index];
        if room.handler.is_none() {
            room.handler = Some(handler);
        }
    }

    /// Run `f` against an entity's handler. A destroy requested while it ran
    /// completes once it returns.
    fn dispatch_entity<F>(&mut self, id: EntityId, f: F)
    where
        F: FnOnce(&mut dyn EventHandler, &mut EventContext<'_>),
    {
        if !self.world.contains(id) {
            return;
        }
        let Some(mut behavior) = self.world.take_behavior(id) else {
            return;
        };
        let mut ctx = EventContext {
            game: self,
            this: Some(id),
        };
        f(behavior.as_mut(), &mut ctx);
        self.world.restore_behavior(id, behavior);
        if self.world.is_doomed(id) {
            self.finish_destroy(id);
        }
    }

    /// Game, then room, then every entity of the current room in order.
    fn broadcast(&mut self, f: &dyn Fn(&mut dyn EventHandler, &mut EventContext<'_>)) {
        self.dispatch_game(f);
        self.dispatch_room(self.current, f);
        let entities = self.rooms[self.current].entities().to_vec();
        for id in entities {
            self.dispatch_entity(id, f);
        }
    }

    fn dispatch_contact(&mut self, id: EntityId, other: EntityId, kind: ContactKind) {
        if !self.world.contains(id) || !self.world.contains(other) {
            return;
        }
        self.dispatch_entity(id, |h, ctx| match kind {
            ContactKind::Left => h.on_collision_left(ctx, other),
            ContactKind::Right => h.on_collision_right(ctx, other),
            ContactKind::Top => h.on_collision_top(ctx, other),
            ContactKind::Bottom => h.on_collision_bottom(ctx, other),
            ContactKind::Any => h.on_collision(ctx, other),
        });
    }

    /// Collision-enabled entities of the current room, plus the mouse.
    fn collision_candidates(&mut self) -> Vec<EntityId> {
        let room = &self.rooms[self.current];
        let mouse = self.mouse;
        self.world
            .colliders()
            .into_iter()
            .filter(|id| *id == mouse || room.contains(*id))
            .collect()
    }

    // -- Frame --

    /// Process one frame: `real_ms` of real time has passed and `events`
    /// arrived since the previous one. Returns what to present.
    pub fn frame(&mut self, real_ms: f64, events: &[InputEvent]) -> Frame {
        if self.state == GameState::NotStarted {
            self.start();
        }
        self.apply_room_requests();
        if self.ending {
            self.shutdown();
        }
        if self.state == GameState::Ended {
            return Frame::default();
        }

        self.timing = self.timer.measure(real_ms);
        self.world.begin_frame();

        for event in events {
            match *event {
                InputEvent::MouseMove { x, y, .. } => self.move_mouse(Vec2::new(x, y)),
                InputEvent::Resize { .. } => {
                    self.compositor.invalidate();
                    continue;
                }
                _ => {}
            }
            let paused = self.paused;
            self.broadcast(&|h, ctx| deliver_input(h, ctx, event, paused));
        }

        if !self.paused {
            self.step();
        }

        let overlay = [self.mouse];
        let screen = Vec2::new(self.config.width as f32, self.config.height as f32);
        let mut frame = self.compositor.compose(
            self.current,
            &mut self.rooms[self.current],
            &mut self.world,
            &mut self.sprites,
            &overlay,
            screen,
            self.config.scale,
        );
        frame.sounds = std::mem::take(&mut self.playing);
        self.frames += 1;
        frame
    }

    fn step(&mut self) {
        let timing = self.timing;
        self.broadcast(&|h, ctx| h.on_step(ctx, timing.real_ms));

        let entities = self.rooms[self.current].entities().to_vec();
        for id in entities {
            if !self.world.contains(id) {
                continue;
            }
            let Some(entity) = self.world.get_mut(id) else {
                continue;
            };
            for event in update_entity(entity, &self.sprites, &timing) {
                match event {
                    UpdateEvent::AnimationEnd => self.dispatch_entity(id, |h, ctx| h.on_animation_end(ctx)),
                    UpdateEvent::Alarm(name) => self.dispatch_entity(id, |h, ctx| h.on_alarm(ctx, &name)),
                }
            }
        }

        if self.config.collision_events {
            let candidates = self.collision_candidates();
            let movers: Vec<EntityId> = candidates
                .iter()
                .copied()
                .filter(|id| self.world.get(*id).is_some_and(|e| e.moved()))
                .collect();
            let contacts = collision::detect_contacts(&self.world, &mut self.sprites, &movers, &candidates);
            for contact in contacts {
                self.dispatch_contact(contact.mover, contact.other, contact.kind);
                self.dispatch_contact(contact.other, contact.mover, contact.kind.mirror());
            }
        }

        self.rooms[self.current]
            .background
            .animate(timing.elapsed_ms, &self.sprites);
    }

    /// Place the mouse entity under a logical screen point, through the
    /// first view whose port contains it.
    fn move_mouse(&mut self, point: Vec2) {
        let views = self.rooms[self.current].effective_views(self.config.width as f32, self.config.height as f32);
        let Some(view) = views
            .iter()
            .find(|v| v.contains_screen_point(point))
            .or(views.first())
        else {
            return;
        };
        let pos = view.screen_to_room(point);
        if let Some(mouse) = self.world.get_mut(self.mouse) {
            mouse.set_position(pos);
        }
    }

    /// Drive frames until the game ends: wait for the clock, poll input,
    /// process, present.
    /// Resize the presenter's surface and redraw everything next frame.
    pub fn resize(&mut self, presenter: &mut dyn Presenter, width: u32, height: u32) {
        debug!("display resized to {}x{}", width, height);
        presenter.resize(width, height);
        self.compositor.invalidate();
    }

    pub fn run(&mut self, clock: &mut dyn Clock, input: &mut dyn InputSource, presenter: &mut dyn Presenter) {
        info!("running on the {} presenter", presenter.backend());
        while self.state != GameState::Ended {
            let real_ms = clock.tick(self.timer.fps());
            let events = input.poll();
            for event in &events {
                if let InputEvent::Resize { width, height } = *event {
                    presenter.resize(width, height);
                }
            }
            let frame = self.frame(real_ms, &events);
            if self.state == GameState::Running {
                presenter.present(&frame);
            }
        }
    }
}

/// What a handler sees of the game while it runs.
pub struct EventContext<'a> {
    game: &'a mut Game,
    this: Option<EntityId>,
}

impl<'a> EventContext<'a> {
    /// The entity whose handler is running, if any.
    pub fn this(&self) -> Option<EntityId> {
        self.this
    }

    /// The running entity's data. Still readable from its destroy event.
    pub fn this_entity(&self) -> Option<&Entity> {
        self.this.and_then(|id| self.game.world.get(id))
    }

    pub fn this_entity_mut(&mut self) -> Option<&mut Entity> {
        self.this.and_then(|id| self.game.world.get_mut(id))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.game.entity(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.game.entity_mut(id)
    }

    pub fn world(&self) -> &World {
        &self.game.world
    }

    pub fn create(&mut self, entity: Entity, behavior: Option<Box<dyn EventHandler>>) -> EntityId {
        self.game.create(entity, behavior)
    }

    pub fn destroy(&mut self, id: EntityId) {
        self.game.destroy(id);
    }

    pub fn destroy_self(&mut self) {
        if let Some(id) = self.this {
            self.game.destroy(id);
        }
    }

    pub fn set_collision(&mut self, id: EntityId, enabled: bool) {
        self.game.set_collision(id, enabled);
    }

    pub fn collides(&mut self, a: EntityId, b: EntityId) -> bool {
        collision::collides(&self.game.world, &mut self.game.sprites, a, b)
    }

    /// Collision-enabled entities of the current room overlapping `id`.
    pub fn collisions(&mut self, id: EntityId) -> Vec<EntityId> {
        let candidates = self.game.collision_candidates();
        collision::colliding_with(&self.game.world, &mut self.game.sprites, id, &candidates)
    }

    // Room changes apply at the start of the next frame.

    pub fn goto_room(&mut self, room: RoomId) {
        self.game.requests.push_back(RoomRequest::Goto(room.0));
    }

    pub fn next_room(&mut self) {
        self.game.requests.push_back(RoomRequest::Next);
    }

    pub fn previous_room(&mut self) {
        self.game.requests.push_back(RoomRequest::Previous);
    }

    pub fn current_room(&self) -> RoomId {
        self.game.current_room()
    }

    pub fn room(&self) -> &Room {
        &self.game.rooms[self.game.current]
    }

    pub fn room_mut(&mut self) -> &mut Room {
        &mut self.game.rooms[self.game.current]
    }

    pub fn end_game(&mut self) {
        self.game.end();
    }

    pub fn pause(&mut self) {
        self.game.pause();
    }

    pub fn unpause(&mut self) {
        self.game.unpause();
    }

    pub fn is_paused(&self) -> bool {
        self.game.paused
    }

    /// Queue a sound for this frame's output.
    pub fn play_sound(&mut self, sound: SoundHandle) {
        self.game.playing.push(sound);
    }

    pub fn sound(&self, name: &str) -> Option<SoundHandle> {
        self.game.sound(name)
    }

    pub fn font(&self, name: &str) -> Option<FontHandle> {
        self.game.font(name)
    }

    pub fn sprites(&self) -> &SpriteStore {
        &self.game.sprites
    }

    /// Mutable sprite access. Forces a full redraw on the next frame.
    pub fn sprite_mut(&mut self, id: SpriteId) -> &mut Sprite {
        self.game.compositor.invalidate();
        self.game.sprites.get_mut(id)
    }

    pub fn config(&self) -> &GameConfig {
        &self.game.config
    }

    pub fn timing(&self) -> FrameTiming {
        self.game.timing
    }

    pub fn mouse(&self) -> EntityId {
        self.game.mouse
    }
}
