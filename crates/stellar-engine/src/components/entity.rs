use std::collections::BTreeMap;

use glam::Vec2;

use crate::api::types::{Color, SpriteId};
use crate::components::animation::Animation;

/// How an entity's collision shape is tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionMode {
    /// Plain axis-aligned bounding box.
    #[default]
    Rectangle,
    /// Ellipse inscribed in the bounding box.
    Ellipse,
    /// Opaque pixels of the current transformed sprite frame.
    Precise,
}

/// Bounding box offset and size, relative to the entity's position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Absolute edges for an owner standing at `pos`.
    pub fn at(&self, pos: Vec2) -> Bounds {
        let left = pos.x + self.x;
        let top = pos.y + self.y;
        Bounds {
            left,
            top,
            right: left + self.width,
            bottom: top + self.height,
        }
    }
}

/// Absolute bounding-box edges in room space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Strict overlap: touching edges do not count.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Shared region of two boxes, if they overlap.
    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Bounds {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        })
    }
}

/// Per-draw transform. Every field takes part in the sprite cache key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawTransform {
    pub xscale: f32,
    pub yscale: f32,
    /// Counterclockwise, in degrees.
    pub rotation: f32,
    pub alpha: u8,
    /// Multiplied into the image's color channels when set.
    pub blend: Option<Color>,
}

impl Default for DrawTransform {
    fn default() -> Self {
        Self {
            xscale: 1.0,
            yscale: 1.0,
            rotation: 0.0,
            alpha: 255,
            blend: None,
        }
    }
}

/// The per-object simulation unit.
///
/// Position, bounding box and velocity are private so that every write goes
/// through a mutator keeping the derived fields (previous position, absolute
/// bounds, the polar velocity form) in step and raising the redraw flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Free-form tag for finding entities by name.
    pub tag: String,
    pos: Vec2,
    previous: Vec2,
    z: i32,
    sprite: Option<SpriteId>,
    visible: bool,
    pub(crate) collision: bool,
    collision_mode: CollisionMode,
    bbox: BoundingBox,
    pub(crate) bbox_from_sprite: bool,
    bounds: Bounds,
    velocity: Vec2,
    speed: f32,
    direction: f32,
    pub(crate) animation: Animation,
    transform: DrawTransform,
    alarms: BTreeMap<String, f64>,
    moved: bool,
    changed: bool,
}

impl Entity {
    /// Create an entity at `(x, y)` with no sprite and an empty bounding box.
    pub fn new(x: f32, y: f32) -> Self {
        let pos = Vec2::new(x, y);
        let bbox = BoundingBox::default();
        Self {
            tag: String::new(),
            pos,
            previous: pos,
            z: 0,
            sprite: None,
            visible: true,
            collision: true,
            collision_mode: CollisionMode::Rectangle,
            bbox,
            bbox_from_sprite: true,
            bounds: bbox.at(pos),
            velocity: Vec2::ZERO,
            speed: 0.0,
            direction: 0.0,
            animation: Animation::default(),
            transform: DrawTransform::default(),
            alarms: BTreeMap::new(),
            moved: false,
            changed: true,
        }
    }

    // -- Builder pattern --

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    /// Use `sprite` for drawing. Unless a bounding box is given explicitly,
    /// the sprite's suggested box is adopted when the entity is registered.
    pub fn with_sprite(mut self, sprite: SpriteId) -> Self {
        self.sprite = Some(sprite);
        self
    }

    pub fn with_bbox(mut self, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.set_bbox(BoundingBox::new(x, y, width, height));
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_collision(mut self, enabled: bool) -> Self {
        self.collision = enabled;
        self
    }

    pub fn with_collision_mode(mut self, mode: CollisionMode) -> Self {
        self.collision_mode = mode;
        self
    }

    pub fn with_velocity(mut self, xvelocity: f32, yvelocity: f32) -> Self {
        self.set_velocity(xvelocity, yvelocity);
        self
    }

    pub fn with_motion(mut self, speed: f32, direction: f32) -> Self {
        self.speed = speed;
        self.direction = direction;
        self.recompute_velocity();
        self
    }

    pub fn with_image_fps(mut self, fps: f32) -> Self {
        self.animation.fps = Some(fps);
        self
    }

    pub fn with_transform(mut self, transform: DrawTransform) -> Self {
        self.transform = transform;
        self
    }

    // -- Position --

    pub fn x(&self) -> f32 {
        self.pos.x
    }

    pub fn y(&self) -> f32 {
        self.pos.y
    }

    pub fn position(&self) -> Vec2 {
        self.pos
    }

    pub fn xprevious(&self) -> f32 {
        self.previous.x
    }

    pub fn yprevious(&self) -> f32 {
        self.previous.y
    }

    pub fn previous_position(&self) -> Vec2 {
        self.previous
    }

    /// Move to `pos`. The old position becomes the previous-position shadow.
    pub fn set_position(&mut self, pos: Vec2) {
        if pos == self.pos {
            return;
        }
        self.previous = self.pos;
        self.pos = pos;
        self.bounds = self.bbox.at(pos);
        self.moved = true;
        self.changed = true;
    }

    pub fn set_x(&mut self, x: f32) {
        self.set_position(Vec2::new(x, self.pos.y));
    }

    pub fn set_y(&mut self, y: f32) {
        self.set_position(Vec2::new(self.pos.x, y));
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.set_position(self.pos + delta);
    }

    /// Whether the entity moved since the start of the current frame.
    pub fn moved(&self) -> bool {
        self.moved
    }

    pub(crate) fn begin_frame(&mut self) {
        self.moved = false;
    }

    // -- Bounding box --

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn set_bbox(&mut self, bbox: BoundingBox) {
        self.bbox = bbox;
        self.bbox_from_sprite = false;
        self.bounds = bbox.at(self.pos);
        self.changed = true;
    }

    pub(crate) fn adopt_sprite_bbox(&mut self, bbox: BoundingBox) {
        self.bbox = bbox;
        self.bounds = bbox.at(self.pos);
    }

    /// Absolute edges at the current position.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Absolute edges the entity would have at `pos`.
    pub fn bounds_at(&self, pos: Vec2) -> Bounds {
        self.bbox.at(pos)
    }

    pub fn bbox_left(&self) -> f32 {
        self.bounds.left
    }

    pub fn bbox_right(&self) -> f32 {
        self.bounds.right
    }

    pub fn bbox_top(&self) -> f32 {
        self.bounds.top
    }

    pub fn bbox_bottom(&self) -> f32 {
        self.bounds.bottom
    }

    // -- Velocity --

    pub fn xvelocity(&self) -> f32 {
        self.velocity.x
    }

    pub fn yvelocity(&self) -> f32 {
        self.velocity.y
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Direction of motion in degrees, counterclockwise from the +x axis.
    /// Room space is y-down, so 90 points toward the top of the room.
    pub fn direction(&self) -> f32 {
        self.direction
    }

    pub fn set_velocity(&mut self, xvelocity: f32, yvelocity: f32) {
        self.velocity = Vec2::new(xvelocity, yvelocity);
        self.recompute_polar();
    }

    pub fn set_xvelocity(&mut self, xvelocity: f32) {
        self.set_velocity(xvelocity, self.velocity.y);
    }

    pub fn set_yvelocity(&mut self, yvelocity: f32) {
        self.set_velocity(self.velocity.x, yvelocity);
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
        self.recompute_velocity();
    }

    pub fn set_direction(&mut self, direction: f32) {
        self.direction = direction.rem_euclid(360.0);
        self.recompute_velocity();
    }

    fn recompute_velocity(&mut self) {
        let rad = self.direction.to_radians();
        self.velocity = Vec2::new(self.speed * rad.cos(), -self.speed * rad.sin());
    }

    fn recompute_polar(&mut self) {
        self.speed = self.velocity.length();
        if self.speed != 0.0 {
            self.direction = (-self.velocity.y).atan2(self.velocity.x).to_degrees().rem_euclid(360.0);
        }
    }

    // -- Drawing --

    pub fn z(&self) -> i32 {
        self.z
    }

    pub fn set_z(&mut self, z: i32) {
        self.z = z;
        self.changed = true;
    }

    pub fn sprite(&self) -> Option<SpriteId> {
        self.sprite
    }

    pub fn set_sprite(&mut self, sprite: Option<SpriteId>) {
        self.sprite = sprite;
        self.animation.index = 0.0;
        self.changed = true;
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.changed = true;
    }

    pub fn transform(&self) -> DrawTransform {
        self.transform
    }

    pub fn set_scale(&mut self, xscale: f32, yscale: f32) {
        self.transform.xscale = xscale;
        self.transform.yscale = yscale;
        self.changed = true;
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.transform.rotation = rotation;
        self.changed = true;
    }

    pub fn set_alpha(&mut self, alpha: u8) {
        self.transform.alpha = alpha;
        self.changed = true;
    }

    pub fn set_blend(&mut self, blend: Option<Color>) {
        self.transform.blend = blend;
        self.changed = true;
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn image_index(&self) -> f64 {
        self.animation.index
    }

    pub fn set_image_index(&mut self, index: f64) {
        self.animation.index = index.max(0.0);
        self.changed = true;
    }

    pub fn set_image_fps(&mut self, fps: Option<f32>) {
        self.animation.fps = fps;
    }

    pub fn set_animating(&mut self, playing: bool) {
        self.animation.playing = playing;
    }

    /// Mark the entity for redraw.
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub(crate) fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    // -- Collision --

    pub fn collision(&self) -> bool {
        self.collision
    }

    pub fn collision_mode(&self) -> CollisionMode {
        self.collision_mode
    }

    pub fn set_collision_mode(&mut self, mode: CollisionMode) {
        self.collision_mode = mode;
    }

    // -- Alarms --

    /// Start (or restart) alarm `name`, counting down `frames` nominal frames.
    pub fn set_alarm(&mut self, name: impl Into<String>, frames: f64) {
        self.alarms.insert(name.into(), frames);
    }

    pub fn alarm(&self, name: &str) -> Option<f64> {
        self.alarms.get(name).copied()
    }

    pub fn cancel_alarm(&mut self, name: &str) -> Option<f64> {
        self.alarms.remove(name)
    }

    /// Count every alarm down by `amount`. Alarms reaching zero are removed
    /// and their names returned in name order.
    pub(crate) fn count_down_alarms(&mut self, amount: f64) -> Vec<String> {
        let mut fired = Vec::new();
        for (name, remaining) in self.alarms.iter_mut() {
            *remaining -= amount;
            if *remaining <= 0.0 {
                fired.push(name.clone());
            }
        }
        for name in &fired {
            self.alarms.remove(name);
        }
        fired
    }
}
