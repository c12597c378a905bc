pub mod api;
pub mod core;
pub mod components;
pub mod systems;
pub mod renderer;
pub mod input;
pub mod assets;

// Re-export key types at crate root for convenience
pub use api::error::{AssetError, EngineError};
pub use api::events::{BehaviorFactory, EventHandler, NoEvents};
pub use api::game::{EventContext, Game, GameConfig, GameState};
pub use api::types::{Color, EntityId, FontHandle, KeyCode, MouseButton, RoomId, SoundHandle, SpriteId};
pub use assets::loader::{AssetLoader, DirectoryLoader, MemoryLoader};
pub use assets::manifest::{GameManifest, LayerDescriptor, RoomDescriptor, SpriteDescriptor};
pub use assets::registry::SpriteStore;
pub use components::animation::Animation;
pub use components::background::{Background, Layer};
pub use components::entity::{BoundingBox, Bounds, CollisionMode, DrawTransform, Entity};
pub use components::sprite::{CacheStats, Sprite, Transparency};
pub use core::collision::{Contact, ContactKind};
pub use core::mask::Mask;
pub use core::registry::World;
pub use core::room::Room;
pub use core::time::{Clock, DeltaTimer, FrameTiming, SystemClock};
pub use input::queue::{InputEvent, InputQueue, InputSource};
pub use renderer::canvas::Canvas;
pub use renderer::draw::{DrawCommand, Frame, Rect};
pub use renderer::traits::Presenter;
pub use renderer::view::View;
pub use systems::render::Compositor;
