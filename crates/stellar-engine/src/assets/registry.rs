use std::collections::HashMap;

use crate::api::error::AssetError;
use crate::api::types::SpriteId;
use crate::assets::loader::AssetLoader;
use crate::components::sprite::Sprite;

/// Owns every sprite in the game and hands out `SpriteId`s.
/// Entities and background layers refer to sprites by id, so one sprite
/// (and its transform cache) is shared by all of them.
pub struct SpriteStore {
    sprites: Vec<Sprite>,
    names: HashMap<String, SpriteId>,
}

impl SpriteStore {
    pub fn new() -> Self {
        Self {
            sprites: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Add a sprite. A later sprite with the same name takes over the name.
    pub fn insert(&mut self, sprite: Sprite) -> SpriteId {
        let id = SpriteId(self.sprites.len() as u32);
        self.names.insert(sprite.name().to_string(), id);
        self.sprites.push(sprite);
        id
    }

    /// Return the sprite named `name`, loading it through `loader` the
    /// first time it is asked for.
    pub fn load(&mut self, name: &str, loader: &dyn AssetLoader) -> Result<SpriteId, AssetError> {
        if let Some(id) = self.lookup(name) {
            return Ok(id);
        }
        let sprite = Sprite::load(name, loader)?;
        log::debug!("loaded sprite '{}' ({} frames)", name, sprite.frame_count());
        Ok(self.insert(sprite))
    }

    /// Look up a sprite by name. Returns None if not found.
    pub fn lookup(&self, name: &str) -> Option<SpriteId> {
        self.names.get(name).copied()
    }

    /// # Panics
    /// If `id` was not issued by this store.
    pub fn get(&self, id: SpriteId) -> &Sprite {
        match self.sprites.get(id.index()) {
            Some(sprite) => sprite,
            None => panic!("sprite id {} was not issued by this store", id.index()),
        }
    }

    /// # Panics
    /// If `id` was not issued by this store.
    pub fn get_mut(&mut self, id: SpriteId) -> &mut Sprite {
        match self.sprites.get_mut(id.index()) {
            Some(sprite) => sprite,
            None => panic!("sprite id {} was not issued by this store", id.index()),
        }
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

impl Default for SpriteStore {
    fn default() -> Self {
        Self::new()
    }
}
