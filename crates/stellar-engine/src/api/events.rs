//! The event-handler contract shared by entities, rooms and the game.
//!
//! Every method defaults to a no-op, so a handler only overrides what it
//! cares about. Directional collision events fall back to `on_collision`.

use std::rc::Rc;

use crate::api::game::EventContext;
use crate::api::types::{EntityId, KeyCode, MouseButton};
use crate::input::queue::InputEvent;

/// Builds a fresh handler. Room snapshots keep one per initial entity so a
/// reset can hand the entity a handler in its initial state.
pub type BehaviorFactory = Rc<dyn Fn() -> Box<dyn EventHandler>>;

#[allow(unused_variables)]
pub trait EventHandler {
    // -- Lifecycle --

    fn on_game_start(&mut self, ctx: &mut EventContext<'_>) {}
    fn on_game_end(&mut self, ctx: &mut EventContext<'_>) {}
    fn on_room_start(&mut self, ctx: &mut EventContext<'_>) {}
    fn on_room_end(&mut self, ctx: &mut EventContext<'_>) {}
    fn on_create(&mut self, ctx: &mut EventContext<'_>) {}
    fn on_destroy(&mut self, ctx: &mut EventContext<'_>) {}

    // -- Per frame --

    /// `elapsed_ms` is real time since the previous frame, unclamped.
    fn on_step(&mut self, ctx: &mut EventContext<'_>, elapsed_ms: f64) {}
    fn on_alarm(&mut self, ctx: &mut EventContext<'_>, alarm: &str) {}
    fn on_animation_end(&mut self, ctx: &mut EventContext<'_>) {}

    // -- Collisions --

    fn on_collision(&mut self, ctx: &mut EventContext<'_>, other: EntityId) {}

    fn on_collision_left(&mut self, ctx: &mut EventContext<'_>, other: EntityId) {
        self.on_collision(ctx, other);
    }

    fn on_collision_right(&mut self, ctx: &mut EventContext<'_>, other: EntityId) {
        self.on_collision(ctx, other);
    }

    fn on_collision_top(&mut self, ctx: &mut EventContext<'_>, other: EntityId) {
        self.on_collision(ctx, other);
    }

    fn on_collision_bottom(&mut self, ctx: &mut EventContext<'_>, other: EntityId) {
        self.on_collision(ctx, other);
    }

    // -- Input --

    fn on_key_press(&mut self, ctx: &mut EventContext<'_>, key: KeyCode) {}
    fn on_key_release(&mut self, ctx: &mut EventContext<'_>, key: KeyCode) {}
    fn on_mouse_move(&mut self, ctx: &mut EventContext<'_>, dx: f32, dy: f32) {}
    fn on_mouse_button_press(&mut self, ctx: &mut EventContext<'_>, button: MouseButton) {}
    fn on_mouse_button_release(&mut self, ctx: &mut EventContext<'_>, button: MouseButton) {}
    fn on_joystick_axis_move(&mut self, ctx: &mut EventContext<'_>, joystick: u32, axis: u32, value: f32) {}
    fn on_joystick_hat_move(&mut self, ctx: &mut EventContext<'_>, joystick: u32, hat: u32, x: i8, y: i8) {}
    fn on_joystick_button_press(&mut self, ctx: &mut EventContext<'_>, joystick: u32, button: u32) {}
    fn on_joystick_button_release(&mut self, ctx: &mut EventContext<'_>, joystick: u32, button: u32) {}
    fn on_close(&mut self, ctx: &mut EventContext<'_>) {}

    // -- Paused mirrors --

    fn on_paused_key_press(&mut self, ctx: &mut EventContext<'_>, key: KeyCode) {}
    fn on_paused_key_release(&mut self, ctx: &mut EventContext<'_>, key: KeyCode) {}
    fn on_paused_mouse_move(&mut self, ctx: &mut EventContext<'_>, dx: f32, dy: f32) {}
    fn on_paused_mouse_button_press(&mut self, ctx: &mut EventContext<'_>, button: MouseButton) {}
    fn on_paused_mouse_button_release(&mut self, ctx: &mut EventContext<'_>, button: MouseButton) {}
    fn on_paused_joystick_axis_move(&mut self, ctx: &mut EventContext<'_>, joystick: u32, axis: u32, value: f32) {}
    fn on_paused_joystick_hat_move(&mut self, ctx: &mut EventContext<'_>, joystick: u32, hat: u32, x: i8, y: i8) {}
    fn on_paused_joystick_button_press(&mut self, ctx: &mut EventContext<'_>, joystick: u32, button: u32) {}
    fn on_paused_joystick_button_release(&mut self, ctx: &mut EventContext<'_>, joystick: u32, button: u32) {}
    fn on_paused_close(&mut self, ctx: &mut EventContext<'_>) {}
}

/// A handler that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl EventHandler for NoEvents {}

/// Route one raw input event to the matching handler method, picking the
/// paused mirror while the game is paused.
pub(crate) fn deliver_input(
    handler: &mut dyn EventHandler,
    ctx: &mut EventContext<'_>,
    event: &InputEvent,
    paused: bool,
) {
    match *event {
        InputEvent::KeyPress { key } if paused => handler.on_paused_key_press(ctx, key),
        InputEvent::KeyPress { key } => handler.on_key_press(ctx, key),
        InputEvent::KeyRelease { key } if paused => handler.on_paused_key_release(ctx, key),
        InputEvent::KeyRelease { key } => handler.on_key_release(ctx, key),
        InputEvent::MouseMove { dx, dy, .. } if paused => handler.on_paused_mouse_move(ctx, dx, dy),
        InputEvent::MouseMove { dx, dy, .. } => handler.on_mouse_move(ctx, dx, dy),
        InputEvent::MouseButtonPress { button } if paused => handler.on_paused_mouse_button_press(ctx, button),
        InputEvent::MouseButtonPress { button } => handler.on_mouse_button_press(ctx, button),
        InputEvent::MouseButtonRelease { button } if paused => {
            handler.on_paused_mouse_button_release(ctx, button)
        }
        InputEvent::MouseButtonRelease { button } => handler.on_mouse_button_release(ctx, button),
        InputEvent::JoystickAxisMove { joystick, axis, value } if paused => {
            handler.on_paused_joystick_axis_move(ctx, joystick, axis, value)
        }
        InputEvent::JoystickAxisMove { joystick, axis, value } => {
            handler.on_joystick_axis_move(ctx, joystick, axis, value)
        }
        InputEvent::JoystickHatMove { joystick, hat, x, y } if paused => {
            handler.on_paused_joystick_hat_move(ctx, joystick, hat, x, y)
        }
        InputEvent::JoystickHatMove { joystick, hat, x, y } => handler.on_joystick_hat_move(ctx, joystick, hat, x, y),
        InputEvent::JoystickButtonPress { joystick, button } if paused => {
            handler.on_paused_joystick_button_press(ctx, joystick, button)
        }
        InputEvent::JoystickButtonPress { joystick, button } => handler.on_joystick_button_press(ctx, joystick, button),
        InputEvent::JoystickButtonRelease { joystick, button } if paused => {
            handler.on_paused_joystick_button_release(ctx, joystick, button)
        }
        InputEvent::JoystickButtonRelease { joystick, button } => {
            handler.on_joystick_button_release(ctx, joystick, button)
        }
        InputEvent::Close if paused => handler.on_paused_close(ctx),
        InputEvent::Close => handler.on_close(ctx),
        InputEvent::Resize { .. } => {}
    }
}
