//! Update system: animation, alarms and motion for one entity per call.

use crate::assets::registry::SpriteStore;
use crate::components::entity::{BoundingBox, Entity};
use crate::core::time::FrameTiming;

/// Something the update pass observed that a handler must hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    AnimationEnd,
    Alarm(String),
}

/// Refresh a sprite-derived bounding box from the sprite's suggested box,
/// scaled by the entity's draw scale. Entities with an explicit box keep it.
pub fn sync_sprite_bbox(entity: &mut Entity, sprites: &SpriteStore) {
    if !entity.bbox_from_sprite {
        return;
    }
    let Some(sprite_id) = entity.sprite() else {
        return;
    };
    let base = sprites.get(sprite_id).bbox();
    let t = entity.transform();
    let (x, width) = scale_span(base.x, base.width, t.xscale);
    let (y, height) = scale_span(base.y, base.height, t.yscale);
    let bbox = BoundingBox::new(x, y, width, height);
    if bbox != entity.bbox() {
        entity.adopt_sprite_bbox(bbox);
    }
}

fn scale_span(offset: f32, size: f32, scale: f32) -> (f32, f32) {
    if scale >= 0.0 {
        (offset * scale, size * scale)
    } else {
        ((offset + size) * scale, size * -scale)
    }
}

/// Advance one entity by one frame.
///
/// In order: the animation index moves by `elapsed_ms` over the frame
/// period (one `AnimationEnd` per wrap), alarms count down by `delta_mult`
/// (expired ones are removed and reported in name order), and a non-zero
/// velocity is integrated scaled by `delta_mult`.
pub fn update_entity(entity: &mut Entity, sprites: &SpriteStore, timing: &FrameTiming) -> Vec<UpdateEvent> {
    let mut events = Vec::new();

    if let Some(sprite_id) = entity.sprite() {
        let sprite = sprites.get(sprite_id);
        let count = sprite.frame_count();
        let fps = entity.animation.fps.unwrap_or(sprite.fps());
        let before = entity.animation.frame(count);
        let wraps = entity.animation.advance(timing.elapsed_ms, fps, count);
        if entity.animation.frame(count) != before {
            entity.mark_changed();
        }
        events.extend((0..wraps).map(|_| UpdateEvent::AnimationEnd));
    }

    events.extend(
        entity
            .count_down_alarms(timing.delta_mult)
            .into_iter()
            .map(UpdateEvent::Alarm),
    );

    let velocity = entity.velocity();
    if velocity != glam::Vec2::ZERO {
        entity.translate(velocity * timing.delta_mult as f32);
    }

    sync_sprite_bbox(entity, sprites);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::sprite::Sprite;
    use glam::Vec2;
    use image::RgbaImage;

    fn timing(elapsed_ms: f64, delta_mult: f64) -> FrameTiming {
        FrameTiming {
            real_ms: elapsed_ms,
            elapsed_ms,
            delta_mult,
        }
    }

    #[test]
    fn velocity_integrates_with_delta_mult() {
        let sprites = SpriteStore::new();
        let mut e = Entity::new(0.0, 0.0).with_velocity(5.0, -2.0);
        update_entity(&mut e, &sprites, &timing(33.0, 2.0));
        assert_eq!(e.position(), Vec2::new(10.0, -4.0));
        assert_eq!(e.previous_position(), Vec2::ZERO);
        assert!(e.moved());
    }

    #[test]
    fn still_entities_do_not_move() {
        let sprites = SpriteStore::new();
        let mut e = Entity::new(3.0, 4.0);
        e.begin_frame();
        update_entity(&mut e, &sprites, &timing(16.0, 1.0));
        assert!(!e.moved());
    }

    #[test]
    fn alarms_fire_once_in_name_order() {
        let sprites = SpriteStore::new();
        let mut e = Entity::new(0.0, 0.0);
        e.set_alarm("b", 2.0);
        e.set_alarm("a", 1.5);
        e.set_alarm("later", 10.0);

        assert!(update_entity(&mut e, &sprites, &timing(16.0, 1.0)).is_empty());
        let fired = update_entity(&mut e, &sprites, &timing(16.0, 1.0));
        assert_eq!(fired, vec![UpdateEvent::Alarm("a".into()), UpdateEvent::Alarm("b".into())]);
        assert!(update_entity(&mut e, &sprites, &timing(16.0, 1.0)).is_empty());
        assert_eq!(e.alarm("later"), Some(7.0));
    }

    #[test]
    fn alarms_count_down_by_delta_mult() {
        let sprites = SpriteStore::new();
        let mut e = Entity::new(0.0, 0.0);
        e.set_alarm("blink", 5.0);
        e.set_alarm("fuse", 6.0);

        assert!(update_entity(&mut e, &sprites, &timing(40.0, 2.5)).is_empty());
        assert_eq!(e.alarm("blink"), Some(2.5));
        assert_eq!(e.alarm("fuse"), Some(3.5));

        let fired = update_entity(&mut e, &sprites, &timing(40.0, 2.5));
        assert_eq!(fired, vec![UpdateEvent::Alarm("blink".into())]);
        assert_eq!(e.alarm("blink"), None);
        assert_eq!(e.alarm("fuse"), Some(1.0));

        let fired = update_entity(&mut e, &sprites, &timing(40.0, 2.5));
        assert_eq!(fired, vec![UpdateEvent::Alarm("fuse".into())]);
    }

    #[test]
    fn out_of_range_image_index_is_folded() {
        let mut sprites = SpriteStore::new();
        let walk = sprites.insert(Sprite::new("walk", vec![RgbaImage::new(2, 2); 2]).with_fps(10.0));
        let mut e = Entity::new(0.0, 0.0).with_sprite(walk);
        e.set_image_index(1e17);

        let events = update_entity(&mut e, &sprites, &timing(50.0, 1.0));
        assert!(events.is_empty());
        assert!(e.image_index() >= 0.0 && e.image_index() < 2.0);
    }

    #[test]
    fn animation_end_fires_per_wrap() {
        let mut sprites = SpriteStore::new();
        // 2 frames at 10 fps: one full cycle per 200ms.
        let walk = sprites.insert(Sprite::new("walk", vec![RgbaImage::new(2, 2); 2]).with_fps(10.0));
        let mut e = Entity::new(0.0, 0.0).with_sprite(walk);
        e.take_changed();

        let events = update_entity(&mut e, &sprites, &timing(450.0, 1.0));
        assert_eq!(events, vec![UpdateEvent::AnimationEnd, UpdateEvent::AnimationEnd]);
        assert!((e.image_index() - 0.5).abs() < 1e-9);
        assert!(!e.take_changed());

        update_entity(&mut e, &sprites, &timing(100.0, 1.0));
        assert!(e.take_changed());
    }

    #[test]
    fn sprite_bbox_follows_scale() {
        let mut sprites = SpriteStore::new();
        let ship = sprites.insert(Sprite::new("ship", vec![RgbaImage::new(10, 6)]).with_origin(5.0, 3.0));
        let mut e = Entity::new(100.0, 100.0).with_sprite(ship);
        sync_sprite_bbox(&mut e, &sprites);
        assert_eq!(e.bbox(), BoundingBox::new(-5.0, -3.0, 10.0, 6.0));

        e.set_scale(-2.0, 1.0);
        sync_sprite_bbox(&mut e, &sprites);
        assert_eq!(e.bbox(), BoundingBox::new(-10.0, -3.0, 20.0, 6.0));
        assert_eq!(e.bbox_left(), 90.0);
    }

    #[test]
    fn explicit_bbox_is_kept() {
        let mut sprites = SpriteStore::new();
        let ship = sprites.insert(Sprite::new("ship", vec![RgbaImage::new(10, 6)]));
        let mut e = Entity::new(0.0, 0.0).with_sprite(ship).with_bbox(1.0, 1.0, 2.0, 2.0);
        sync_sprite_bbox(&mut e, &sprites);
        assert_eq!(e.bbox(), BoundingBox::new(1.0, 1.0, 2.0, 2.0));
    }
}
