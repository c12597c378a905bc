//! Collision detection and directional classification.
//!
//! Two rectangle-mode entities collide when their bounding boxes overlap.
//! If either side uses an ellipse or precise mask, both shapes are sampled
//! as masks over the overlap of the two bounding boxes instead.
//!
//! Resolution works on movers: for each entity that moved this frame and
//! now overlaps another, its horizontal and vertical displacement are undone
//! one at a time to find out which axis caused the contact.

use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;

use crate::api::types::EntityId;
use crate::assets::registry::SpriteStore;
use crate::components::entity::{Bounds, CollisionMode, Entity};
use crate::core::mask::Mask;
use crate::core::registry::World;

/// An entity's collision shape at one particular position.
#[derive(Debug, Clone)]
pub struct Shape {
    pub bounds: Bounds,
    pub mode: CollisionMode,
    mask: Rc<Mask>,
    /// Room-space position of the mask's top-left corner.
    mask_origin: Vec2,
}

impl Shape {
    /// Shape of `entity` as if it stood at `pos`.
    ///
    /// # Panics
    /// If the entity uses precise collision without a sprite.
    pub fn of(entity: &Entity, pos: Vec2, sprites: &mut SpriteStore) -> Self {
        let bounds = entity.bounds_at(pos);
        let corner = Vec2::new(bounds.left, bounds.top);
        let (mask, mask_origin) = match entity.collision_mode() {
            CollisionMode::Rectangle => (Rc::new(Mask::Full), corner),
            CollisionMode::Ellipse => (
                Rc::new(Mask::Ellipse {
                    width: bounds.width(),
                    height: bounds.height(),
                }),
                corner,
            ),
            CollisionMode::Precise => {
                let Some(sprite_id) = entity.sprite() else {
                    panic!("entity '{}' uses precise collision but has no sprite", entity.tag);
                };
                let sprite = sprites.get_mut(sprite_id);
                let t = entity.transform();
                let frame = entity.animation().frame(sprite.frame_count());
                let mask = sprite.precise_mask(frame, t.xscale, t.yscale, t.rotation);
                let origin = sprite.transformed_origin(t.xscale, t.yscale, t.rotation);
                (mask, pos - origin)
            }
        };
        Self {
            bounds,
            mode: entity.collision_mode(),
            mask,
            mask_origin,
        }
    }

    /// Symmetric overlap test.
    pub fn overlaps(&self, other: &Shape) -> bool {
        let Some(region) = self.bounds.intersection(&other.bounds) else {
            return false;
        };
        if self.mode == CollisionMode::Rectangle && other.mode == CollisionMode::Rectangle {
            return true;
        }

        // Sample each pixel cell of the overlap at its centre, pulled inside
        // the region so slivers narrower than a pixel are still sampled.
        let (x0, x1) = (region.left.floor() as i32, region.right.ceil() as i32);
        let (y0, y1) = (region.top.floor() as i32, region.bottom.ceil() as i32);
        for py in y0..y1 {
            let cy = (py as f32 + 0.5).clamp(region.top, region.bottom);
            for px in x0..x1 {
                let cx = (px as f32 + 0.5).clamp(region.left, region.right);
                if self.test(cx, cy) && other.test(cx, cy) {
                    return true;
                }
            }
        }
        false
    }

    fn test(&self, x: f32, y: f32) -> bool {
        self.mask.test(x - self.mask_origin.x, y - self.mask_origin.y)
    }
}

/// Whether two live entities currently collide. Stale handles never collide.
pub fn collides(world: &World, sprites: &mut SpriteStore, a: EntityId, b: EntityId) -> bool {
    if a == b {
        return false;
    }
    let (Some(ea), Some(eb)) = (live(world, a), live(world, b)) else {
        return false;
    };
    Shape::of(ea, ea.position(), sprites).overlaps(&Shape::of(eb, eb.position(), sprites))
}

/// Every candidate currently colliding with `id`.
pub fn colliding_with(world: &World, sprites: &mut SpriteStore, id: EntityId, candidates: &[EntityId]) -> Vec<EntityId> {
    candidates
        .iter()
        .copied()
        .filter(|other| collides(world, sprites, id, *other))
        .collect()
}

fn live(world: &World, id: EntityId) -> Option<&Entity> {
    world.get(id).filter(|_| world.contains(id))
}

/// Which side of the mover the contact is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactKind {
    Left,
    Right,
    Top,
    Bottom,
    /// Overlap that no single axis of this frame's motion explains.
    Any,
}

impl ContactKind {
    /// The side as seen from the other entity.
    pub fn mirror(self) -> Self {
        match self {
            ContactKind::Left => ContactKind::Right,
            ContactKind::Right => ContactKind::Left,
            ContactKind::Top => ContactKind::Bottom,
            ContactKind::Bottom => ContactKind::Top,
            ContactKind::Any => ContactKind::Any,
        }
    }
}

/// A collision event to deliver: `mover` gets `kind`, `other` gets the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub mover: EntityId,
    pub other: EntityId,
    pub kind: ContactKind,
}

/// Classify every contact caused by `movers` against `candidates`.
///
/// Positions are read, never written, so the result reflects one stable
/// snapshot of the frame. Contacts come out ordered by mover, then by
/// candidate order.
pub fn detect_contacts(
    world: &World,
    sprites: &mut SpriteStore,
    movers: &[EntityId],
    candidates: &[EntityId],
) -> Vec<Contact> {
    let mut shapes: HashMap<EntityId, Shape> = HashMap::with_capacity(candidates.len());
    for id in candidates {
        if let Some(e) = live(world, *id) {
            shapes.insert(*id, Shape::of(e, e.position(), sprites));
        }
    }

    let mut contacts = Vec::new();
    for mover_id in movers {
        let Some(mover) = live(world, *mover_id).filter(|e| e.collision()) else {
            continue;
        };
        let pos = mover.position();
        let prev = mover.previous_position();
        let current = Shape::of(mover, pos, sprites);

        for other_id in candidates {
            if other_id == mover_id {
                continue;
            }
            let Some(other) = shapes.get(other_id) else {
                continue;
            };
            if !current.overlaps(other) {
                continue;
            }

            let x_clear = !Shape::of(mover, Vec2::new(prev.x, pos.y), sprites).overlaps(other);
            let y_clear = !Shape::of(mover, Vec2::new(pos.x, prev.y), sprites).overlaps(other);
            let horizontal = if pos.x > prev.x {
                ContactKind::Right
            } else {
                ContactKind::Left
            };
            let vertical = if pos.y > prev.y {
                ContactKind::Bottom
            } else {
                ContactKind::Top
            };

            let kinds = match (x_clear, y_clear) {
                (true, true) => {
                    let (xdepth, ydepth) = penetration(mover, &current.bounds, &other.bounds);
                    // Ties go to the horizontal axis.
                    if xdepth >= ydepth {
                        vec![horizontal]
                    } else {
                        vec![vertical]
                    }
                }
                (true, false) => vec![horizontal],
                (false, true) => vec![vertical],
                (false, false) => {
                    if Shape::of(mover, prev, sprites).overlaps(other) {
                        vec![ContactKind::Any]
                    } else {
                        vec![horizontal, vertical]
                    }
                }
            };
            contacts.extend(kinds.into_iter().map(|kind| Contact {
                mover: *mover_id,
                other: *other_id,
                kind,
            }));
        }
    }
    contacts
}

/// Penetration depth on each axis, measured on the edge pair facing the
/// direction of travel. Velocity picks the direction; a zero velocity
/// component falls back to this frame's displacement.
fn penetration(mover: &Entity, m: &Bounds, o: &Bounds) -> (f32, f32) {
    let displacement = mover.position() - mover.previous_position();
    let heading = |velocity: f32, moved: f32| if velocity != 0.0 { velocity } else { moved };

    let xdepth = if heading(mover.xvelocity(), displacement.x) > 0.0 {
        m.right - o.left
    } else {
        o.right - m.left
    };
    let ydepth = if heading(mover.yvelocity(), displacement.y) > 0.0 {
        m.bottom - o.top
    } else {
        o.bottom - m.top
    };
    (xdepth, ydepth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::sprite::Sprite;
    use image::{Rgba, RgbaImage};

    fn boxed(x: f32, y: f32, w: f32, h: f32) -> Entity {
        Entity::new(x, y).with_bbox(0.0, 0.0, w, h)
    }

    fn moved(mut e: Entity, to: Vec2) -> Entity {
        e.set_position(to);
        e
    }

    #[test]
    fn collides_is_symmetric_across_modes() {
        let mut sprites = SpriteStore::new();
        let modes = [CollisionMode::Rectangle, CollisionMode::Ellipse];
        let offsets = [0.0, 4.0, 7.5, 9.0, 9.9, 10.0, 12.0];
        for ma in modes {
            for mb in modes {
                for dx in offsets {
                    for dy in offsets {
                        let mut world = World::new();
                        let a = world.insert(boxed(0.0, 0.0, 10.0, 10.0).with_collision_mode(ma), None);
                        let b = world.insert(boxed(dx, dy, 10.0, 10.0).with_collision_mode(mb), None);
                        assert_eq!(
                            collides(&world, &mut sprites, a, b),
                            collides(&world, &mut sprites, b, a),
                            "{ma:?} vs {mb:?} at ({dx}, {dy})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn full_masks_agree_with_rectangles() {
        let mut sprites = SpriteStore::new();
        let offsets = [-10.5, -9.9, -3.2, 0.0, 0.3, 9.7, 9.99, 10.0, 10.01];
        for dx in offsets {
            for dy in offsets {
                let a = boxed(0.0, 0.0, 10.0, 10.0);
                let b = boxed(dx, dy, 10.0, 10.0);
                let rect_a = Shape::of(&a, a.position(), &mut sprites);
                let rect_b = Shape::of(&b, b.position(), &mut sprites);
                // Same shapes, forced through the sampling path.
                let mask_a = Shape {
                    mode: CollisionMode::Ellipse,
                    mask: Rc::new(Mask::Full),
                    ..rect_a.clone()
                };
                assert_eq!(rect_a.overlaps(&rect_b), mask_a.overlaps(&rect_b), "offset ({dx}, {dy})");
            }
        }
    }

    #[test]
    fn ellipses_miss_at_the_corners() {
        let mut sprites = SpriteStore::new();
        let mut world = World::new();
        let a = world.insert(boxed(0.0, 0.0, 10.0, 10.0).with_collision_mode(CollisionMode::Ellipse), None);
        let b = world.insert(boxed(9.0, 9.0, 10.0, 10.0).with_collision_mode(CollisionMode::Ellipse), None);
        let c = world.insert(boxed(9.0, 9.0, 10.0, 10.0), None);
        assert!(!collides(&world, &mut sprites, a, b));
        assert!(!collides(&world, &mut sprites, a, c));

        let d = world.insert(boxed(9.0, 0.0, 10.0, 10.0), None);
        assert!(collides(&world, &mut sprites, a, d));
    }

    #[test]
    fn precise_masks_sample_sprite_pixels() {
        // 4x4 sprite with only the left column solid.
        let mut img = RgbaImage::new(4, 4);
        for y in 0..4 {
            img.put_pixel(0, y, Rgba([255, 255, 255, 255]));
        }
        let mut sprites = SpriteStore::new();
        let sprite = sprites.insert(Sprite::new("bar", vec![img]));

        let mut world = World::new();
        let a = world.insert(
            Entity::new(0.0, 0.0)
                .with_sprite(sprite)
                .with_bbox(0.0, 0.0, 4.0, 4.0)
                .with_collision_mode(CollisionMode::Precise),
            None,
        );
        let right_side = world.insert(boxed(2.0, 0.0, 4.0, 4.0), None);
        let left_side = world.insert(boxed(-3.5, 0.0, 4.0, 4.0), None);
        assert!(!collides(&world, &mut sprites, a, right_side));
        assert!(collides(&world, &mut sprites, a, left_side));
        assert!(collides(&world, &mut sprites, left_side, a));
    }

    #[test]
    #[should_panic(expected = "precise collision")]
    fn precise_without_sprite_fails_fast() {
        let mut sprites = SpriteStore::new();
        let e = boxed(0.0, 0.0, 4.0, 4.0).with_collision_mode(CollisionMode::Precise);
        Shape::of(&e, e.position(), &mut sprites);
    }

    #[test]
    fn stale_partner_never_collides() {
        let mut sprites = SpriteStore::new();
        let mut world = World::new();
        let a = world.insert(boxed(0.0, 0.0, 10.0, 10.0), None);
        let b = world.insert(boxed(5.0, 5.0, 10.0, 10.0), None);
        assert!(collides(&world, &mut sprites, a, b));
        world.remove(b);
        assert!(!collides(&world, &mut sprites, a, b));
    }

    #[test]
    fn pure_horizontal_contact() {
        let mut sprites = SpriteStore::new();
        let mut world = World::new();
        let a = world.insert(
            moved(boxed(0.0, 0.0, 10.0, 10.0).with_velocity(5.0, 0.0), Vec2::new(5.0, 0.0)),
            None,
        );
        let b = world.insert(boxed(12.0, 0.0, 10.0, 10.0), None);
        let contacts = detect_contacts(&world, &mut sprites, &[a], &[a, b]);
        assert_eq!(
            contacts,
            vec![Contact {
                mover: a,
                other: b,
                kind: ContactKind::Right
            }]
        );
    }

    #[test]
    fn pure_vertical_contact_moving_up() {
        let mut sprites = SpriteStore::new();
        let mut world = World::new();
        let a = world.insert(moved(boxed(0.0, 20.0, 10.0, 10.0), Vec2::new(0.0, 15.0)), None);
        let b = world.insert(boxed(2.0, 0.0, 10.0, 18.0), None);
        let contacts = detect_contacts(&world, &mut sprites, &[a], &[b]);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].kind, ContactKind::Top);
        assert_eq!(contacts[0].kind.mirror(), ContactKind::Bottom);
    }

    #[test]
    fn corner_picks_deeper_axis() {
        let mut sprites = SpriteStore::new();
        let mut world = World::new();
        // From (0,0) to (6,4): x depth 6, y depth 4 against a box at (10,10).
        let a = world.insert(
            moved(boxed(0.0, 0.0, 10.0, 10.0).with_velocity(6.0, 4.0), Vec2::new(6.0, 4.0)),
            None,
        );
        let b = world.insert(boxed(10.0, 10.0, 10.0, 10.0), None);
        let contacts = detect_contacts(&world, &mut sprites, &[a], &[b]);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].kind, ContactKind::Right);

        // Deeper on y this time.
        let c = world.insert(
            moved(boxed(0.0, 30.0, 10.0, 10.0).with_velocity(3.0, 7.0), Vec2::new(3.0, 37.0)),
            None,
        );
        let d = world.insert(boxed(10.0, 40.0, 10.0, 10.0), None);
        let contacts = detect_contacts(&world, &mut sprites, &[c], &[d]);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].kind, ContactKind::Bottom);
    }

    #[test]
    fn corner_tie_goes_horizontal_every_time() {
        for _ in 0..3 {
            let mut sprites = SpriteStore::new();
            let mut world = World::new();
            let a = world.insert(
                moved(boxed(0.0, 0.0, 10.0, 10.0).with_velocity(-5.0, -5.0), Vec2::new(-5.0, -5.0)),
                None,
            );
            let b = world.insert(boxed(-20.0, -20.0, 20.0, 20.0), None);
            let contacts = detect_contacts(&world, &mut sprites, &[a], &[b]);
            assert_eq!(contacts.len(), 1);
            assert_eq!(contacts[0].kind, ContactKind::Left);
        }
    }

    #[test]
    fn prior_overlap_is_non_directional() {
        let mut sprites = SpriteStore::new();
        let mut world = World::new();
        let a = world.insert(moved(boxed(0.0, 0.0, 10.0, 10.0), Vec2::new(1.0, 1.0)), None);
        let b = world.insert(boxed(2.0, 2.0, 10.0, 10.0), None);
        let contacts = detect_contacts(&world, &mut sprites, &[a], &[b]);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].kind, ContactKind::Any);
    }

    #[test]
    fn wedge_fires_both_axes() {
        // An L-shaped precise sprite whose notch lets either axis alone
        // keep touching, while undoing both clears the contact.
        let mut img = RgbaImage::new(10, 10);
        for i in 0..10 {
            img.put_pixel(i, 9, Rgba([0, 0, 0, 255]));
            img.put_pixel(9, i, Rgba([0, 0, 0, 255]));
        }
        let mut sprites = SpriteStore::new();
        let l_shape = sprites.insert(Sprite::new("l", vec![img]));

        let mut world = World::new();
        let wall = world.insert(
            Entity::new(0.0, 0.0)
                .with_sprite(l_shape)
                .with_bbox(0.0, 0.0, 10.0, 10.0)
                .with_collision_mode(CollisionMode::Precise),
            None,
        );
        // A 2x2 block moving diagonally from the notch's inside corner at (7,7)
        // into the corner of the L at (8.5, 8.5).
        let block = world.insert(moved(boxed(7.0, 7.0, 2.0, 2.0), Vec2::new(8.5, 8.5)), None);
        let contacts = detect_contacts(&world, &mut sprites, &[block], &[wall]);
        let kinds: Vec<ContactKind> = contacts.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ContactKind::Right, ContactKind::Bottom]);
    }

    #[test]
    fn non_moving_entities_are_not_resolved() {
        let mut sprites = SpriteStore::new();
        let mut world = World::new();
        let a = world.insert(boxed(0.0, 0.0, 10.0, 10.0), None);
        let b = world.insert(boxed(5.0, 0.0, 10.0, 10.0), None);
        assert!(detect_contacts(&world, &mut sprites, &[], &[a, b]).is_empty());
        assert_eq!(colliding_with(&world, &mut sprites, a, &[a, b]), vec![b]);
    }
}
