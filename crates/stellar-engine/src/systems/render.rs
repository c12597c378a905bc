//! Compositor: turns room, view and entity state into a `Frame`.
//!
//! The background is recomposited only when something that feeds it changed
//! (the background itself, a view, the room, or the device scale). Otherwise
//! the frame carries the screen rectangles of entities that changed, and
//! every draw touching them.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use glam::Vec2;

use crate::api::types::EntityId;
use crate::assets::registry::SpriteStore;
use crate::components::background::Background;
use crate::components::entity::{DrawTransform, Entity};
use crate::core::registry::World;
use crate::core::room::Room;
use crate::renderer::draw::{DrawCommand, Frame, Rect};
use crate::renderer::view::View;

pub struct Compositor {
    /// Screen rectangles each entity covered in the previous frame.
    drawn: HashMap<EntityId, Vec<Rect>>,
    last_views: Vec<View>,
    last_room: Option<usize>,
    last_scale: f32,
    force: bool,
    recomposites: u64,
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            drawn: HashMap::new(),
            last_views: Vec::new(),
            last_room: None,
            last_scale: 1.0,
            force: true,
            recomposites: 0,
        }
    }

    /// Force a full redraw on the next frame.
    pub fn invalidate(&mut self) {
        self.force = true;
    }

    /// How many frames were full redraws so far.
    pub fn recomposites(&self) -> u64 {
        self.recomposites
    }

    /// Build the frame for `room`.
    ///
    /// `overlay` lists entities drawn on top of the room's own (the mouse
    /// proxy). `screen` is the logical screen size, `scale` the device scale.
    #[allow(clippy::too_many_arguments)]
    pub fn compose(
        &mut self,
        room_index: usize,
        room: &mut Room,
        world: &mut World,
        sprites: &mut SpriteStore,
        overlay: &[EntityId],
        screen: Vec2,
        scale: f32,
    ) -> Frame {
        let views = room.effective_views(screen.x, screen.y);
        let screen_rect = Rect::from_edges(0.0, 0.0, screen.x * scale, screen.y * scale);
        let background_dirty = room.background.take_dirty();
        let full = self.force
            || background_dirty
            || self.last_room != Some(room_index)
            || self.last_views != views
            || self.last_scale != scale;

        let mut entries: Vec<(EntityId, i32, Vec<DrawCommand>)> = Vec::new();
        let mut changed = Vec::new();
        for id in room.entities().iter().chain(overlay).copied() {
            if !world.contains(id) {
                continue;
            }
            let Some(entity) = world.get_mut(id) else {
                continue;
            };
            if entity.take_changed() {
                changed.push(id);
            }
            let draws = entity_draws(entity, sprites, &views, scale, &screen_rect);
            entries.push((id, entity.z(), draws));
        }
        // Stable: equal z keeps room order.
        entries.sort_by_key(|(_, z, _)| *z);

        let mut frame = Frame {
            full_redraw: full,
            ..Default::default()
        };

        if full {
            self.recomposites += 1;
            log::debug!(
                "recompositing background of room {} ({} views, {} layers)",
                room_index,
                views.len(),
                room.background.layers().len()
            );
            frame.fill = Some(room.background.color());
            frame.background = layer_draws(&room.background, sprites, &views, scale);
            frame.dirty = vec![screen_rect];
            frame.draws = entries.iter().flat_map(|(_, _, d)| d.iter().cloned()).collect();
        } else {
            let mut dirty: Vec<Rect> = Vec::new();
            let current: HashSet<EntityId> = entries.iter().map(|(id, _, _)| *id).collect();
            for id in &changed {
                dirty.extend(self.drawn.get(id).into_iter().flatten().copied());
                if let Some((_, _, draws)) = entries.iter().find(|(e, _, _)| e == id) {
                    dirty.extend(draws.iter().map(|d| d.dest));
                }
            }
            for (id, rects) in &self.drawn {
                if !current.contains(id) {
                    dirty.extend(rects.iter().copied());
                }
            }
            let mut dirty: Vec<Rect> = dirty.iter().filter_map(|r| r.intersect(&screen_rect)).collect();
            dedup(&mut dirty);

            // Grow the dirty set until every draw touching it is included,
            // so a redrawn entity never paints over one left untouched.
            let all: Vec<&DrawCommand> = entries.iter().flat_map(|(_, _, d)| d.iter()).collect();
            let mut included = vec![false; all.len()];
            loop {
                let mut grew = false;
                for (i, cmd) in all.iter().enumerate() {
                    if !included[i] && dirty.iter().any(|r| r.intersects(&cmd.dest)) {
                        included[i] = true;
                        if let Some(visible) = cmd.dest.intersect(&screen_rect) {
                            if !dirty.contains(&visible) {
                                dirty.push(visible);
                            }
                        }
                        grew = true;
                    }
                }
                if !grew {
                    break;
                }
            }
            frame.draws = all
                .iter()
                .zip(&included)
                .filter(|(_, inc)| **inc)
                .map(|(cmd, _)| (*cmd).clone())
                .collect();
            frame.dirty = dirty;
        }

        self.drawn = entries
            .into_iter()
            .map(|(id, _, draws)| (id, draws.iter().map(|d| d.dest).collect()))
            .collect();
        self.last_views = views;
        self.last_room = Some(room_index);
        self.last_scale = scale;
        self.force = false;
        frame
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup(rects: &mut Vec<Rect>) {
    let mut seen = HashSet::new();
    rects.retain(|r| seen.insert(*r));
}

/// Draw commands for one entity across every view.
///
/// With a single full-screen view the entity's rectangle is used as is.
/// With several views, an entity entirely inside exactly one view port is
/// drawn directly; otherwise each view it touches gets a clipped proxy draw.
fn entity_draws(
    entity: &Entity,
    sprites: &mut SpriteStore,
    views: &[View],
    scale: f32,
    screen_rect: &Rect,
) -> Vec<DrawCommand> {
    if !entity.visible() {
        return Vec::new();
    }
    let Some(sprite_id) = entity.sprite() else {
        return Vec::new();
    };
    let sprite = sprites.get_mut(sprite_id);
    let t = entity.transform();
    let scaled = DrawTransform {
        xscale: t.xscale * scale,
        yscale: t.yscale * scale,
        ..t
    };
    let frame = entity.animation().frame(sprite.frame_count());
    let image = sprite.transformed(frame, &scaled);
    let origin = sprite.transformed_origin(scaled.xscale, scaled.yscale, scaled.rotation);

    let placed: Vec<(DrawCommand, Rect)> = views
        .iter()
        .map(|view| {
            let top_left = view.room_to_screen(entity.position()) * scale - origin;
            let cmd = DrawCommand::whole(
                Rc::clone(&image),
                top_left.x.floor() as i32,
                top_left.y.floor() as i32,
                entity.z(),
            );
            (cmd, view.port_rect(scale))
        })
        .collect();

    if let [(cmd, port)] = placed.as_slice() {
        if port == screen_rect {
            return vec![cmd.clone()];
        }
    }

    let touching: Vec<&(DrawCommand, Rect)> = placed
        .iter()
        .filter(|(cmd, port)| cmd.dest.intersects(port))
        .collect();
    if let [(cmd, port)] = touching.as_slice() {
        if port.contains(&cmd.dest) {
            return vec![cmd.clone()];
        }
    }
    touching.iter().filter_map(|(cmd, port)| cmd.proxy(port)).collect()
}

/// Background layer draws for every view, clipped to the view's port.
///
/// A layer sits at `layer_offset - view_offset * scroll_rate` within the
/// port. Repeating axes fold that start into `[-size, 0)` and tile forward
/// until the port is covered.
fn layer_draws(background: &Background, sprites: &mut SpriteStore, views: &[View], scale: f32) -> Vec<DrawCommand> {
    let mut draws = Vec::new();
    for view in views {
        let port = view.port_rect(scale);
        for layer in background.layers() {
            let sprite = sprites.get_mut(layer.sprite);
            let frame = layer.animation().frame(sprite.frame_count());
            let image = if scale == 1.0 {
                sprite.base_frame(frame)
            } else {
                let t = DrawTransform {
                    xscale: scale,
                    yscale: scale,
                    ..DrawTransform::default()
                };
                sprite.transformed(frame, &t)
            };
            let (w, h) = (image.width() as i32, image.height() as i32);
            if w == 0 || h == 0 {
                continue;
            }

            let x = port.x + ((layer.x - view.x * layer.xscroll_rate) * scale).floor() as i32;
            let y = port.y + ((layer.y - view.y * layer.yscroll_rate) * scale).floor() as i32;
            let xs = tile_starts(x, w, port.x, port.right(), layer.repeat_x);
            let ys = tile_starts(y, h, port.y, port.bottom(), layer.repeat_y);
            for ty in &ys {
                for tx in &xs {
                    let cmd = DrawCommand::whole(Rc::clone(&image), *tx, *ty, layer.z);
                    draws.extend(cmd.clipped(&port));
                }
            }
        }
    }
    draws
}

fn tile_starts(start: i32, size: i32, port_start: i32, port_end: i32, repeat: bool) -> Vec<i32> {
    if !repeat {
        return vec![start];
    }
    let mut at = port_start + (start - port_start).rem_euclid(size) - size;
    let mut starts = Vec::new();
    while at < port_end {
        starts.push(at);
        at += size;
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{Color, SpriteId};
    use crate::components::background::Layer;
    use crate::components::sprite::Sprite;
    use image::{Rgba, RgbaImage};

    const SCREEN: Vec2 = Vec2::new(640.0, 480.0);

    struct Fixture {
        world: World,
        sprites: SpriteStore,
        room: Room,
        block: SpriteId,
        compositor: Compositor,
    }

    impl Fixture {
        fn new(room: Room) -> Self {
            let mut sprites = SpriteStore::new();
            let block = sprites.insert(Sprite::new(
                "block",
                vec![RgbaImage::from_pixel(20, 10, Rgba([200, 0, 0, 255]))],
            ));
            Self {
                world: World::new(),
                sprites,
                room,
                block,
                compositor: Compositor::new(),
            }
        }

        fn spawn(&mut self, x: f32, y: f32) -> EntityId {
            let id = self.world.insert(Entity::new(x, y).with_sprite(self.block), None);
            self.room.push_entity(id);
            id
        }

        fn compose(&mut self) -> Frame {
            self.compositor
                .compose(0, &mut self.room, &mut self.world, &mut self.sprites, &[], SCREEN, 1.0)
        }
    }

    fn split_room() -> Room {
        Room::new(640.0, 480.0)
            .with_view(View::new(0.0, 0.0, 0.0, 0.0, 320.0, 480.0))
            .with_view(View::new(320.0, 0.0, 320.0, 0.0, 320.0, 480.0))
    }

    #[test]
    fn first_frame_is_full_then_quiet() {
        let mut fx = Fixture::new(Room::new(640.0, 480.0));
        fx.spawn(10.0, 10.0);
        let first = fx.compose();
        assert!(first.full_redraw);
        assert_eq!(first.fill, Some(Color::BLACK));
        assert_eq!(first.draws.len(), 1);

        let second = fx.compose();
        assert!(!second.full_redraw);
        assert!(second.draws.is_empty());
        assert!(second.dirty.is_empty());
        assert_eq!(fx.compositor.recomposites(), 1);
    }

    #[test]
    fn moving_entity_dirties_old_and_new_rects() {
        let mut fx = Fixture::new(Room::new(640.0, 480.0));
        let mover = fx.spawn(0.0, 0.0);
        let neighbour = fx.spawn(25.0, 0.0);
        let far = fx.spawn(300.0, 300.0);
        fx.compose();

        fx.world.get_mut(mover).unwrap().set_position(Vec2::new(10.0, 0.0));
        let frame = fx.compose();
        assert!(!frame.full_redraw);
        assert!(frame.dirty.contains(&Rect::new(0, 0, 20, 10)));
        assert!(frame.dirty.contains(&Rect::new(10, 0, 20, 10)));
        // The neighbour overlaps the new rect and is redrawn too.
        let dests: Vec<Rect> = frame.draws.iter().map(|d| d.dest).collect();
        assert_eq!(dests, vec![Rect::new(10, 0, 20, 10), Rect::new(25, 0, 20, 10)]);
        let _ = (neighbour, far);
    }

    #[test]
    fn removed_entity_leaves_dirty_rect() {
        let mut fx = Fixture::new(Room::new(640.0, 480.0));
        let gone = fx.spawn(40.0, 40.0);
        fx.compose();
        fx.room.remove_entity(gone);
        fx.world.remove(gone);
        let frame = fx.compose();
        assert_eq!(frame.dirty, vec![Rect::new(40, 40, 20, 10)]);
        assert!(frame.draws.is_empty());
    }

    #[test]
    fn straddling_entity_gets_two_proxies_without_gap() {
        let mut fx = Fixture::new(split_room());
        fx.spawn(310.0, 100.0);
        let frame = fx.compose();

        assert_eq!(frame.draws.len(), 2);
        let (left, right) = (&frame.draws[0], &frame.draws[1]);
        assert!(left.is_proxy() && right.is_proxy());
        assert_eq!(left.dest, Rect::new(310, 100, 10, 10));
        assert_eq!(right.dest, Rect::new(320, 100, 10, 10));
        assert_eq!(left.source, Some(Rect::new(0, 0, 10, 10)));
        assert_eq!(right.source, Some(Rect::new(10, 0, 10, 10)));
        assert_eq!(left.dest.w + right.dest.w, 20);
    }

    #[test]
    fn entity_inside_one_view_is_drawn_directly() {
        let mut fx = Fixture::new(split_room());
        fx.spawn(100.0, 100.0);
        let frame = fx.compose();
        assert_eq!(frame.draws.len(), 1);
        assert!(!frame.draws[0].is_proxy());
    }

    #[test]
    fn entity_seen_by_two_views_gets_one_proxy_each() {
        // Both views look at the same room area.
        let room = Room::new(640.0, 480.0)
            .with_view(View::new(0.0, 0.0, 0.0, 0.0, 320.0, 480.0))
            .with_view(View::new(0.0, 0.0, 320.0, 0.0, 320.0, 480.0));
        let mut fx = Fixture::new(room);
        fx.spawn(50.0, 50.0);
        let frame = fx.compose();
        let dests: Vec<Rect> = frame.draws.iter().map(|d| d.dest).collect();
        assert_eq!(dests, vec![Rect::new(50, 50, 20, 10), Rect::new(370, 50, 20, 10)]);
        assert!(frame.draws.iter().all(|d| d.is_proxy()));
    }

    #[test]
    fn single_view_draws_offscreen_entities_directly() {
        let mut fx = Fixture::new(Room::new(640.0, 480.0));
        fx.spawn(630.0, 0.0);
        let frame = fx.compose();
        assert_eq!(frame.draws[0].dest, Rect::new(630, 0, 20, 10));
        assert!(!frame.draws[0].is_proxy());
    }

    #[test]
    fn view_change_forces_full_redraw() {
        let mut fx = Fixture::new(Room::new(640.0, 480.0).with_view(View::full_screen(640.0, 480.0)));
        fx.compose();
        assert!(!fx.compose().full_redraw);
        fx.room.views[0].x = 5.0;
        assert!(fx.compose().full_redraw);
    }

    #[test]
    fn repeating_layer_tiles_from_folded_start() {
        let mut fx = Fixture::new(Room::new(1000.0, 480.0).with_view(View::new(30.0, 0.0, 0.0, 0.0, 320.0, 240.0)));
        let strip = fx.sprites.insert(Sprite::new("strip", vec![RgbaImage::new(100, 50)]));
        fx.room.background.add_layer(Layer::new(strip).with_repeat(true, false));
        let frame = fx.compose();

        let xs: Vec<i32> = frame.background.iter().map(|d| d.dest.x).collect();
        assert_eq!(xs, vec![0, 70, 170, 270]);
        assert_eq!(frame.background[0].source, Some(Rect::new(30, 0, 70, 50)));
        assert_eq!(frame.background[3].dest.w, 50);
    }

    #[test]
    fn scroll_rate_scales_view_motion() {
        let mut fx = Fixture::new(Room::new(1000.0, 480.0).with_view(View::new(200.0, 0.0, 0.0, 0.0, 640.0, 480.0)));
        let hills = fx.sprites.insert(Sprite::new("hills", vec![RgbaImage::new(50, 50)]));
        fx.room
            .background
            .add_layer(Layer::new(hills).with_offset(150.0, 10.0).with_scroll_rate(0.5, 0.0));
        let frame = fx.compose();
        assert_eq!(frame.background.len(), 1);
        assert_eq!(frame.background[0].dest, Rect::new(50, 10, 50, 50));
    }

    #[test]
    fn device_scale_enlarges_draws() {
        let mut fx = Fixture::new(Room::new(640.0, 480.0));
        fx.spawn(10.0, 5.0);
        let frame = fx
            .compositor
            .compose(0, &mut fx.room, &mut fx.world, &mut fx.sprites, &[], SCREEN, 2.0);
        assert_eq!(frame.draws[0].dest, Rect::new(20, 10, 40, 20));
        assert_eq!(frame.dirty, vec![Rect::new(0, 0, 1280, 960)]);
    }

    #[test]
    fn higher_z_draws_later() {
        let mut fx = Fixture::new(Room::new(640.0, 480.0));
        let back = fx.spawn(0.0, 0.0);
        let front = fx.spawn(100.0, 0.0);
        fx.world.get_mut(back).unwrap().set_z(5);
        fx.world.get_mut(front).unwrap().set_z(-5);
        let frame = fx.compose();
        let zs: Vec<i32> = frame.draws.iter().map(|d| d.z).collect();
        assert_eq!(zs, vec![-5, 5]);
    }
}
