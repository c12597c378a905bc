use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::renderer::draw::Rect;

/// A camera: maps a `width` x `height` window of room space at `(x, y)`
/// onto the screen port of the same size at `(xport, yport)`.
///
/// Screen coordinates here are logical; the compositor multiplies in the
/// device scale factor when it emits draw rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub xport: f32,
    #[serde(default)]
    pub yport: f32,
    pub width: f32,
    pub height: f32,
}

impl View {
    pub fn new(x: f32, y: f32, xport: f32, yport: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            xport,
            yport,
            width,
            height,
        }
    }

    /// A view covering the whole screen, looking at the room origin.
    pub fn full_screen(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, width, height)
    }

    /// The screen port in device pixels.
    pub fn port_rect(&self, scale: f32) -> Rect {
        Rect::from_edges(
            self.xport * scale,
            self.yport * scale,
            (self.xport + self.width) * scale,
            (self.yport + self.height) * scale,
        )
    }

    /// Room-space point to logical screen space.
    pub fn room_to_screen(&self, point: Vec2) -> Vec2 {
        Vec2::new(point.x - self.x + self.xport, point.y - self.y + self.yport)
    }

    /// Logical screen-space point to room space.
    pub fn screen_to_room(&self, point: Vec2) -> Vec2 {
        Vec2::new(point.x - self.xport + self.x, point.y - self.yport + self.y)
    }

    /// Whether a logical screen point falls inside this view's port.
    pub fn contains_screen_point(&self, point: Vec2) -> bool {
        point.x >= self.xport
            && point.x < self.xport + self.width
            && point.y >= self.yport
            && point.y < self.yport + self.height
    }

    /// Centre the view on `target`, keeping it inside a room of
    /// `room_width` x `room_height`. A view larger than the room is
    /// centred on the room instead.
    pub fn follow(&mut self, target: Vec2, room_width: f32, room_height: f32) {
        self.x = clamp_axis(target.x - self.width / 2.0, self.width, room_width);
        self.y = clamp_axis(target.y - self.height / 2.0, self.height, room_height);
    }
}

fn clamp_axis(start: f32, span: f32, room: f32) -> f32 {
    if span >= room {
        (room - span) / 2.0
    } else {
        start.clamp(0.0, room - span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_room_mapping_round_trips() {
        let view = View::new(100.0, 50.0, 320.0, 0.0, 320.0, 240.0);
        let room = Vec2::new(150.0, 70.0);
        let screen = view.room_to_screen(room);
        assert_eq!(screen, Vec2::new(370.0, 20.0));
        assert_eq!(view.screen_to_room(screen), room);
    }

    #[test]
    fn contains_screen_point_uses_port() {
        let view = View::new(0.0, 0.0, 320.0, 0.0, 320.0, 480.0);
        assert!(view.contains_screen_point(Vec2::new(320.0, 10.0)));
        assert!(view.contains_screen_point(Vec2::new(639.0, 479.0)));
        assert!(!view.contains_screen_point(Vec2::new(319.9, 10.0)));
        assert!(!view.contains_screen_point(Vec2::new(640.0, 10.0)));
    }

    #[test]
    fn port_rect_applies_scale() {
        let view = View::new(0.0, 0.0, 10.0, 20.0, 100.0, 50.0);
        assert_eq!(view.port_rect(2.0), Rect::new(20, 40, 200, 100));
    }

    #[test]
    fn follow_clamps_to_room() {
        let mut view = View::full_screen(100.0, 100.0);
        view.follow(Vec2::new(0.0, 0.0), 500.0, 400.0);
        assert_eq!((view.x, view.y), (0.0, 0.0));

        view.follow(Vec2::new(1000.0, 1000.0), 500.0, 400.0);
        assert_eq!((view.x, view.y), (400.0, 300.0));

        view.follow(Vec2::new(250.0, 200.0), 500.0, 400.0);
        assert_eq!((view.x, view.y), (200.0, 150.0));
    }

    #[test]
    fn follow_centres_small_rooms() {
        let mut view = View::full_screen(200.0, 100.0);
        view.follow(Vec2::new(30.0, 30.0), 100.0, 400.0);
        assert!((view.x - -50.0).abs() < 1e-6);
        assert!((view.y - 0.0).abs() < 1e-6);
    }
}
