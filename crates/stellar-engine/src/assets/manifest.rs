use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::api::error::EngineError;
use crate::api::game::GameConfig;
use crate::api::types::Color;
use crate::assets::registry::SpriteStore;
use crate::components::background::{Background, Layer};
use crate::components::entity::BoundingBox;
use crate::components::sprite::{Sprite, Transparency};
use crate::core::room::Room;
use crate::renderer::view::View;

/// Game manifest describing configuration, sprites and rooms.
/// Loaded from a JSON file at runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameManifest {
    #[serde(default)]
    pub config: GameConfig,
    /// Sprites to load, by asset name.
    #[serde(default)]
    pub sprites: HashMap<String, SpriteDescriptor>,
    /// Sound asset names to load up front.
    #[serde(default)]
    pub sounds: Vec<String>,
    /// Font asset names to load up front.
    #[serde(default)]
    pub fonts: Vec<String>,
    /// Rooms in activation order.
    #[serde(default)]
    pub rooms: Vec<RoomDescriptor>,
}

/// Display parameters for one sprite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpriteDescriptor {
    /// Origin in frame pixels (default: top-left).
    #[serde(default)]
    pub origin: [f32; 2],
    /// Suggested animation rate (default: the sprite's own, 60).
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default)]
    pub transparency: Transparency,
    /// Display size `[width, height]`; frames are resized to it.
    #[serde(default)]
    pub size: Option<[u32; 2]>,
    /// Suggested bounding box `[x, y, width, height]`.
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
}

/// Describes a room's initial configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDescriptor {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default = "default_background")]
    pub background: Color,
    #[serde(default)]
    pub layers: Vec<LayerDescriptor>,
}

/// Describes a parallax background layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Name of a sprite listed in the manifest.
    pub sprite: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: i32,
    #[serde(default = "default_scroll_rate")]
    pub xscroll_rate: f32,
    #[serde(default = "default_scroll_rate")]
    pub yscroll_rate: f32,
    #[serde(default)]
    pub repeat_x: bool,
    #[serde(default)]
    pub repeat_y: bool,
    #[serde(default)]
    pub fps: Option<f32>,
}

fn default_background() -> Color {
    Color::BLACK
}

fn default_scroll_rate() -> f32 {
    1.0
}

impl GameManifest {
    /// Parse a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl SpriteDescriptor {
    /// Apply these display parameters to a freshly loaded sprite.
    pub fn apply(&self, sprite: Sprite) -> Sprite {
        let [ox, oy] = self.origin;
        let mut sprite = sprite.with_origin(ox, oy).with_transparency(self.transparency);
        if let Some(fps) = self.fps {
            sprite = sprite.with_fps(fps);
        }
        if let Some([w, h]) = self.size {
            sprite = sprite.with_size(w, h);
        }
        if let Some([x, y, w, h]) = self.bbox {
            sprite = sprite.with_bbox(BoundingBox::new(x, y, w, h));
        }
        sprite
    }
}

impl RoomDescriptor {
    /// Build the room. Layer sprites must already be in `sprites`.
    pub fn build(&self, sprites: &SpriteStore) -> Result<Room, EngineError> {
        let mut background = Background::new(self.background);
        for desc in &self.layers {
            let sprite = sprites.lookup(&desc.sprite).ok_or_else(|| EngineError::UnknownSprite {
                name: desc.sprite.clone(),
            })?;
            let mut layer = Layer::new(sprite)
                .with_offset(desc.x, desc.y)
                .with_z(desc.z)
                .with_scroll_rate(desc.xscroll_rate, desc.yscroll_rate)
                .with_repeat(desc.repeat_x, desc.repeat_y);
            if let Some(fps) = desc.fps {
                layer = layer.with_fps(fps);
            }
            background.add_layer(layer);
        }

        let room = self
            .views
            .iter()
            .fold(Room::new(self.width, self.height), |room, view| room.with_view(*view));
        Ok(room.with_background(background))
    }
}
