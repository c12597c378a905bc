use crate::api::types::{KeyCode, MouseButton};

/// Raw input events the engine understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyPress { key: KeyCode },
    KeyRelease { key: KeyCode },
    /// The pointer moved to screen position `(x, y)`, by `(dx, dy)`.
    MouseMove { x: f32, y: f32, dx: f32, dy: f32 },
    MouseButtonPress { button: MouseButton },
    MouseButtonRelease { button: MouseButton },
    JoystickAxisMove { joystick: u32, axis: u32, value: f32 },
    JoystickHatMove { joystick: u32, hat: u32, x: i8, y: i8 },
    JoystickButtonPress { joystick: u32, button: u32 },
    JoystickButtonRelease { joystick: u32, button: u32 },
    /// The user asked to close the window.
    Close,
    /// The display surface changed size, in device pixels.
    Resize { width: u32, height: u32 },
}

/// Input collaborator: yields the events gathered since the previous poll.
pub trait InputSource {
    fn poll(&mut self) -> Vec<InputEvent>;
}

/// A queue of input events.
/// The host pushes events as they arrive; the game drains them once per frame.
pub struct InputQueue {
    events: Vec<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(32),
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    /// Drain all pending events. Returns a Vec and clears the queue.
    pub fn drain(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.events)
    }

    /// Iterate over pending events without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &InputEvent> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for InputQueue {
    fn poll(&mut self) -> Vec<InputEvent> {
        self.drain()
    }
}
