use crate::api::types::{Color, SpriteId};
use crate::assets::registry::SpriteStore;
use crate::components::animation::Animation;

/// Parallax background layer.
///
/// The layer sits at `(x, y)` in room space, but moves against each view at
/// `scroll_rate` times the view's own motion: 1.0 scrolls with the room,
/// 0.0 stays pinned to the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub sprite: SpriteId,
    pub x: f32,
    pub y: f32,
    /// Layers draw in ascending z.
    pub z: i32,
    pub xscroll_rate: f32,
    pub yscroll_rate: f32,
    pub repeat_x: bool,
    pub repeat_y: bool,
    pub(crate) animation: Animation,
}

impl Layer {
    pub fn new(sprite: SpriteId) -> Self {
        Self {
            sprite,
            x: 0.0,
            y: 0.0,
            z: 0,
            xscroll_rate: 1.0,
            yscroll_rate: 1.0,
            repeat_x: false,
            repeat_y: false,
            animation: Animation::default(),
        }
    }

    pub fn with_offset(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    pub fn with_scroll_rate(mut self, xscroll_rate: f32, yscroll_rate: f32) -> Self {
        self.xscroll_rate = xscroll_rate;
        self.yscroll_rate = yscroll_rate;
        self
    }

    pub fn with_repeat(mut self, repeat_x: bool, repeat_y: bool) -> Self {
        self.repeat_x = repeat_x;
        self.repeat_y = repeat_y;
        self
    }

    /// Override the sprite's suggested frame rate for this layer.
    pub fn with_fps(mut self, fps: f32) -> Self {
        self.animation.fps = Some(fps);
        self
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }
}

/// Room background: a fill color under z-ordered parallax layers.
///
/// Every mutation raises the dirty flag; the compositor takes the flag and
/// recomposites the whole background when it is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    color: Color,
    layers: Vec<Layer>,
    dirty: bool,
}

impl Background {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            layers: Vec::new(),
            dirty: true,
        }
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.add_layer(layer);
        self
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        self.dirty = true;
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Insert keeping ascending z; equal z keeps insertion order.
    pub fn add_layer(&mut self, layer: Layer) {
        let at = self.layers.partition_point(|l| l.z <= layer.z);
        self.layers.insert(at, layer);
        self.dirty = true;
    }

    pub fn remove_layer(&mut self, index: usize) -> Option<Layer> {
        if index >= self.layers.len() {
            return None;
        }
        self.dirty = true;
        Some(self.layers.remove(index))
    }

    /// Mutable access to a layer; marks the background dirty.
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        let layer = self.layers.get_mut(index)?;
        self.dirty = true;
        Some(layer)
    }

    pub fn clear_layers(&mut self) {
        self.layers.clear();
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Advance layer animations. A layer whose shown frame changes marks the
    /// background dirty.
    pub(crate) fn animate(&mut self, elapsed_ms: f64, sprites: &SpriteStore) {
        for layer in &mut self.layers {
            let sprite = sprites.get(layer.sprite);
            let count = sprite.frame_count();
            if count < 2 {
                continue;
            }
            let before = layer.animation.frame(count);
            let fps = layer.animation.fps.unwrap_or(sprite.fps());
            layer.animation.advance(elapsed_ms, fps, count);
            if layer.animation.frame(count) != before {
                self.dirty = true;
            }
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::new(Color::BLACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::sprite::Sprite;
    use image::RgbaImage;

    fn store_with(frames: usize, fps: f32) -> (SpriteStore, SpriteId) {
        let mut store = SpriteStore::new();
        let id = store.insert(Sprite::new("sky", vec![RgbaImage::new(4, 4); frames]).with_fps(fps));
        (store, id)
    }

    #[test]
    fn layers_stay_sorted_by_z() {
        let (_, sky) = store_with(1, 1.0);
        let mut bg = Background::new(Color::WHITE);
        bg.add_layer(Layer::new(sky).with_z(5));
        bg.add_layer(Layer::new(sky).with_z(-1));
        bg.add_layer(Layer::new(sky).with_z(5).with_offset(1.0, 0.0));
        let zs: Vec<i32> = bg.layers().iter().map(|l| l.z).collect();
        assert_eq!(zs, vec![-1, 5, 5]);
        assert_eq!(bg.layers()[2].x, 1.0);
    }

    #[test]
    fn mutations_raise_dirty_flag() {
        let (_, sky) = store_with(1, 1.0);
        let mut bg = Background::new(Color::BLACK).with_layer(Layer::new(sky));
        assert!(bg.take_dirty());
        assert!(!bg.is_dirty());

        bg.set_color(Color::WHITE);
        assert!(bg.take_dirty());

        bg.layer_mut(0).unwrap().x = 3.0;
        assert!(bg.take_dirty());
        assert!(bg.layer_mut(7).is_none());
        assert!(!bg.is_dirty());
    }

    #[test]
    fn animation_dirties_only_on_frame_change() {
        // 10 fps, 100ms per frame
        let (store, sky) = store_with(3, 10.0);
        let mut bg = Background::new(Color::BLACK).with_layer(Layer::new(sky));
        bg.take_dirty();

        bg.animate(50.0, &store);
        assert!(!bg.take_dirty());
        bg.animate(60.0, &store);
        assert!(bg.take_dirty());
        assert_eq!(bg.layers()[0].animation().frame(3), 1);
    }
}
