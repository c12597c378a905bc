//! Sprites and their transformed-frame cache.
//!
//! A sprite keeps its frames exactly as loaded and derives a set of base
//! frames from them (resized to the display size, transparency policy
//! applied). Transformed variants of a base frame are produced on demand and
//! memoized by the full transform key. Changing any display parameter
//! rebuilds the base frames and drops every cached variant.

use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::api::error::AssetError;
use crate::api::types::Color;
use crate::assets::loader::AssetLoader;
use crate::components::entity::{BoundingBox, DrawTransform};
use crate::core::mask::Mask;

/// How frame pixels become transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transparency {
    /// Ignore source alpha; every pixel is opaque.
    Opaque,
    /// Use the source alpha channel as is.
    #[default]
    Alpha,
    /// Pixels matching this color (alpha ignored) become transparent.
    ColorKey(Color),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TransformKey {
    frame: usize,
    xscale: u32,
    yscale: u32,
    rotation: u32,
    alpha: u8,
    blend: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MaskKey {
    frame: usize,
    xscale: u32,
    yscale: u32,
    rotation: u32,
}

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// A visual asset: frames plus display parameters.
#[derive(Debug, Clone)]
pub struct Sprite {
    name: String,
    raw_frames: Vec<RgbaImage>,
    base_frames: Vec<Rc<RgbaImage>>,
    width: u32,
    height: u32,
    origin: Vec2,
    transparency: Transparency,
    fps: f32,
    bbox: Option<BoundingBox>,
    cache: HashMap<TransformKey, Rc<RgbaImage>>,
    masks: HashMap<MaskKey, Rc<Mask>>,
    stats: CacheStats,
}

impl Sprite {
    /// Build a sprite from decoded frames. The display size is taken from
    /// the first frame.
    ///
    /// # Panics
    /// If `frames` is empty: a sprite must have something to show.
    pub fn new(name: impl Into<String>, frames: Vec<RgbaImage>) -> Self {
        let name = name.into();
        assert!(!frames.is_empty(), "sprite '{name}' has no frames");
        let (width, height) = frames[0].dimensions();
        let mut sprite = Self {
            name,
            raw_frames: frames,
            base_frames: Vec::new(),
            width,
            height,
            origin: Vec2::ZERO,
            transparency: Transparency::default(),
            fps: 60.0,
            bbox: None,
            cache: HashMap::new(),
            masks: HashMap::new(),
            stats: CacheStats::default(),
        };
        sprite.refresh();
        sprite
    }

    /// Load frames for `name` through the asset collaborator.
    pub fn load(name: &str, loader: &dyn AssetLoader) -> Result<Self, AssetError> {
        let frames = loader.load_sprite_frames(name)?;
        if frames.is_empty() {
            return Err(AssetError::NotFound { name: name.to_string() });
        }
        Ok(Self::new(name, frames))
    }

    // -- Builder pattern --

    pub fn with_origin(mut self, x: f32, y: f32) -> Self {
        self.set_origin(x, y);
        self
    }

    pub fn with_fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_transparency(mut self, transparency: Transparency) -> Self {
        self.set_transparency(transparency);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.set_size(width, height);
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.set_bbox(Some(bbox));
        self
    }

    // -- Display parameters --

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_count(&self) -> usize {
        self.base_frames.len()
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn transparency(&self) -> Transparency {
        self.transparency
    }

    /// Suggested bounding box for entities using this sprite. Defaults to
    /// the full frame, positioned so the origin sits at the entity position.
    pub fn bbox(&self) -> BoundingBox {
        self.bbox.unwrap_or(BoundingBox::new(
            -self.origin.x,
            -self.origin.y,
            self.width as f32,
            self.height as f32,
        ))
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.refresh();
    }

    pub fn set_transparency(&mut self, transparency: Transparency) {
        self.transparency = transparency;
        self.refresh();
    }

    pub fn set_origin(&mut self, x: f32, y: f32) {
        self.origin = Vec2::new(x, y);
        self.drop_cached();
    }

    pub fn set_bbox(&mut self, bbox: Option<BoundingBox>) {
        self.bbox = bbox;
        self.drop_cached();
    }

    pub fn set_fps(&mut self, fps: f32) {
        self.fps = fps;
    }

    /// Untransformed frame after size and transparency are applied.
    pub fn base_frame(&self, frame: usize) -> Rc<RgbaImage> {
        Rc::clone(&self.base_frames[frame % self.base_frames.len()])
    }

    // -- Caches --

    /// Recompute base frames and drop every cached variant.
    fn refresh(&mut self) {
        self.base_frames = self
            .raw_frames
            .iter()
            .map(|raw| Rc::new(build_base(raw, self.width, self.height, self.transparency)))
            .collect();
        self.drop_cached();
    }

    /// Drop cached variants and masks; base frames stay.
    fn drop_cached(&mut self) {
        if !self.cache.is_empty() || !self.masks.is_empty() {
            log::debug!(
                "sprite '{}': dropping {} cached frames, {} masks",
                self.name,
                self.cache.len(),
                self.masks.len()
            );
        }
        self.cache.clear();
        self.masks.clear();
    }

    /// Frame `frame` under `transform`, memoized by the exact transform.
    pub fn transformed(&mut self, frame: usize, transform: &DrawTransform) -> Rc<RgbaImage> {
        let frame = frame % self.base_frames.len();
        let key = TransformKey {
            frame,
            xscale: transform.xscale.to_bits(),
            yscale: transform.yscale.to_bits(),
            rotation: transform.rotation.to_bits(),
            alpha: transform.alpha,
            blend: transform.blend,
        };
        if let Some(image) = self.cache.get(&key) {
            self.stats.hits += 1;
            return Rc::clone(image);
        }

        self.stats.misses += 1;
        log::trace!("sprite '{}': cache miss for frame {} {:?}", self.name, frame, transform);
        let image = Rc::new(apply_transform(&self.base_frames[frame], transform));
        self.cache.insert(key, Rc::clone(&image));
        image
    }

    /// Solid pixels of frame `frame` under the geometric part of a transform.
    pub fn precise_mask(&mut self, frame: usize, xscale: f32, yscale: f32, rotation: f32) -> Rc<Mask> {
        let frame = frame % self.base_frames.len();
        let key = MaskKey {
            frame,
            xscale: xscale.to_bits(),
            yscale: yscale.to_bits(),
            rotation: rotation.to_bits(),
        };
        if let Some(mask) = self.masks.get(&key) {
            return Rc::clone(mask);
        }
        let geometry = DrawTransform {
            xscale,
            yscale,
            rotation,
            ..DrawTransform::default()
        };
        let image = self.transformed(frame, &geometry);
        let mask = Rc::new(Mask::from_image(&image));
        self.masks.insert(key, Rc::clone(&mask));
        mask
    }

    /// Where the origin lands inside the image produced by `transformed`
    /// for the given scale and rotation.
    pub fn transformed_origin(&self, xscale: f32, yscale: f32, rotation: f32) -> Vec2 {
        let (w, h) = scaled_size(self.width, self.height, xscale, yscale);
        let (w, h) = (w as f32, h as f32);
        let mut ox = self.origin.x * xscale.abs();
        let mut oy = self.origin.y * yscale.abs();
        if xscale < 0.0 {
            ox = w - ox;
        }
        if yscale < 0.0 {
            oy = h - oy;
        }

        let degrees = rotation.rem_euclid(360.0);
        if degrees == 0.0 || w == 0.0 || h == 0.0 {
            return Vec2::new(ox, oy);
        }
        let (nw, nh) = rotated_size(w as u32, h as u32, degrees);
        let (sin, cos) = sin_cos_degrees(degrees);
        let (px, py) = (ox - w / 2.0, oy - h / 2.0);
        Vec2::new(
            px * cos + py * sin + nw as f32 / 2.0,
            -px * sin + py * cos + nh as f32 / 2.0,
        )
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.stats
    }
}

fn build_base(raw: &RgbaImage, width: u32, height: u32, transparency: Transparency) -> RgbaImage {
    let mut image = if raw.dimensions() == (width, height) {
        raw.clone()
    } else if width == 0 || height == 0 {
        RgbaImage::new(width, height)
    } else {
        imageops::resize(raw, width, height, FilterType::Nearest)
    };

    let pixels = bytemuck::cast_slice_mut::<u8, Color>(&mut image);
    match transparency {
        Transparency::Alpha => {}
        Transparency::Opaque => pixels.iter_mut().for_each(|p| p.a = 255),
        Transparency::ColorKey(key) => pixels
            .iter_mut()
            .filter(|p| p.same_rgb(&key))
            .for_each(|p| p.a = 0),
    }
    image
}

/// Flip, scale, rotate, then alpha and blend, in that order.
fn apply_transform(base: &RgbaImage, transform: &DrawTransform) -> RgbaImage {
    let mut image = base.clone();
    if transform.xscale < 0.0 {
        imageops::flip_horizontal_in_place(&mut image);
    }
    if transform.yscale < 0.0 {
        imageops::flip_vertical_in_place(&mut image);
    }

    let (w, h) = scaled_size(image.width(), image.height(), transform.xscale, transform.yscale);
    if w == 0 || h == 0 {
        return RgbaImage::new(w, h);
    }
    if (w, h) != image.dimensions() {
        image = imageops::resize(&image, w, h, FilterType::Nearest);
    }

    image = rotate(&image, transform.rotation.rem_euclid(360.0));

    if transform.alpha < 255 || transform.blend.is_some() {
        let pixels = bytemuck::cast_slice_mut::<u8, Color>(&mut image);
        for p in pixels.iter_mut() {
            if transform.alpha < 255 {
                p.a = mul8(p.a, transform.alpha);
            }
            if let Some(blend) = transform.blend {
                p.r = mul8(p.r, blend.r);
                p.g = mul8(p.g, blend.g);
                p.b = mul8(p.b, blend.b);
            }
        }
    }
    image
}

fn mul8(a: u8, b: u8) -> u8 {
    ((a as u16 * b as u16 + 127) / 255) as u8
}

fn scaled_size(width: u32, height: u32, xscale: f32, yscale: f32) -> (u32, u32) {
    (
        (width as f32 * xscale.abs()).round() as u32,
        (height as f32 * yscale.abs()).round() as u32,
    )
}

/// Exact at right angles, so the fast rotation paths and the origin math agree.
fn sin_cos_degrees(degrees: f32) -> (f32, f32) {
    match degrees {
        d if d == 90.0 => (1.0, 0.0),
        d if d == 180.0 => (0.0, -1.0),
        d if d == 270.0 => (-1.0, 0.0),
        d => d.to_radians().sin_cos(),
    }
}

fn rotated_size(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let (sin, cos) = sin_cos_degrees(degrees);
    let (w, h) = (width as f32, height as f32);
    let nw = (w * cos.abs() + h * sin.abs()).ceil() as u32;
    let nh = (w * sin.abs() + h * cos.abs()).ceil() as u32;
    (nw, nh)
}

/// Counterclockwise rotation on an expanded canvas, nearest neighbour.
fn rotate(image: &RgbaImage, degrees: f32) -> RgbaImage {
    match degrees {
        d if d == 0.0 => return image.clone(),
        // imageops rotates clockwise
        d if d == 90.0 => return imageops::rotate270(image),
        d if d == 180.0 => return imageops::rotate180(image),
        d if d == 270.0 => return imageops::rotate90(image),
        _ => {}
    }

    let (w, h) = (image.width() as f32, image.height() as f32);
    let (nw, nh) = rotated_size(image.width(), image.height(), degrees);
    let (sin, cos) = sin_cos_degrees(degrees);
    let mut out = RgbaImage::from_pixel(nw, nh, Rgba([0, 0, 0, 0]));
    let (ncx, ncy) = (nw as f32 / 2.0, nh as f32 / 2.0);
    for oy in 0..nh {
        for ox in 0..nw {
            let dx = ox as f32 + 0.5 - ncx;
            let dy = oy as f32 + 0.5 - ncy;
            let sx = dx * cos - dy * sin + w / 2.0;
            let sy = dx * sin + dy * cos + h / 2.0;
            if sx >= 0.0 && sy >= 0.0 && sx < w && sy < h {
                out.put_pixel(ox, oy, *image.get_pixel(sx as u32, sy as u32));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn same_key_returns_identical_image() {
        let mut sprite = Sprite::new("ball", vec![checker(4, 4)]);
        let t = DrawTransform {
            xscale: 2.0,
            ..Default::default()
        };
        let a = sprite.transformed(0, &t);
        let b = sprite.transformed(0, &t);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(sprite.cache_stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn each_key_component_misses() {
        let mut sprite = Sprite::new("ball", vec![checker(4, 4), checker(4, 4)]);
        let base = DrawTransform::default();
        let first = sprite.transformed(0, &base);

        let variants = [
            DrawTransform { xscale: 2.0, ..base },
            DrawTransform { yscale: 2.0, ..base },
            DrawTransform { rotation: 45.0, ..base },
            DrawTransform { alpha: 128, ..base },
            DrawTransform { blend: Some(Color::rgb(10, 10, 10)), ..base },
        ];
        for (i, v) in variants.iter().enumerate() {
            let img = sprite.transformed(0, v);
            assert!(!Rc::ptr_eq(&first, &img), "variant {i} hit the cache");
        }
        let other_frame = sprite.transformed(1, &base);
        assert!(!Rc::ptr_eq(&first, &other_frame));
        assert_eq!(sprite.cache_len(), 7);
    }

    #[test]
    fn display_changes_invalidate_cache() {
        let mut sprite = Sprite::new("ball", vec![checker(4, 4)]);
        let t = DrawTransform::default();
        let before = sprite.transformed(0, &t);
        sprite.set_size(8, 8);
        assert_eq!(sprite.cache_len(), 0);
        let after = sprite.transformed(0, &t);
        assert!(!Rc::ptr_eq(&before, &after));
        assert_eq!(after.dimensions(), (8, 8));
    }

    #[test]
    fn origin_and_bbox_keep_base_frames() {
        let mut sprite = Sprite::new("ball", vec![checker(4, 4)]);
        let base = sprite.base_frame(0);
        sprite.transformed(0, &DrawTransform::default());

        sprite.set_origin(2.0, 2.0);
        assert_eq!(sprite.cache_len(), 0);
        sprite.set_bbox(Some(BoundingBox::new(0.0, 0.0, 2.0, 2.0)));
        assert!(Rc::ptr_eq(&base, &sprite.base_frame(0)));

        sprite.set_transparency(Transparency::Opaque);
        assert!(!Rc::ptr_eq(&base, &sprite.base_frame(0)));
    }

    #[test]
    fn color_key_clears_matching_pixels() {
        let sprite = Sprite::new("ball", vec![checker(2, 1)])
            .with_transparency(Transparency::ColorKey(Color::rgb(255, 0, 0)));
        let base = sprite.base_frame(0);
        assert_eq!(base.get_pixel(0, 0).0[3], 0);
        assert_eq!(base.get_pixel(1, 0).0[3], 255);
    }

    #[test]
    fn negative_scale_flips() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        let mut sprite = Sprite::new("arrow", vec![img]);
        let out = sprite.transformed(
            0,
            &DrawTransform {
                xscale: -1.0,
                ..Default::default()
            },
        );
        assert_eq!(out.get_pixel(1, 0).0[3], 255);
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn alpha_and_blend_scale_channels() {
        let mut sprite = Sprite::new("white", vec![RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]))]);
        let out = sprite.transformed(
            0,
            &DrawTransform {
                alpha: 128,
                blend: Some(Color::rgb(255, 0, 128)),
                ..Default::default()
            },
        );
        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 128, 128]);
    }

    #[test]
    fn quarter_turn_swaps_dimensions_and_origin() {
        let mut sprite = Sprite::new("bar", vec![checker(8, 2)]).with_origin(0.0, 0.0);
        let t = DrawTransform {
            rotation: 90.0,
            ..Default::default()
        };
        let out = sprite.transformed(0, &t);
        assert_eq!(out.dimensions(), (2, 8));
        // The top-left corner of a bar turned counterclockwise ends up bottom-left.
        let origin = sprite.transformed_origin(1.0, 1.0, 90.0);
        assert!((origin.x - 0.0).abs() < 1e-5);
        assert!((origin.y - 8.0).abs() < 1e-5);
    }

    #[test]
    fn arbitrary_rotation_expands_canvas() {
        let mut sprite = Sprite::new("square", vec![checker(10, 10)]);
        let out = sprite.transformed(
            0,
            &DrawTransform {
                rotation: 45.0,
                ..Default::default()
            },
        );
        assert_eq!(out.dimensions(), (15, 15));
        // Corners of the expanded canvas are empty
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
        assert_eq!(out.get_pixel(7, 7).0[3], 255);
    }

    #[test]
    fn default_bbox_covers_frame_around_origin() {
        let sprite = Sprite::new("s", vec![checker(6, 4)]).with_origin(3.0, 2.0);
        assert_eq!(sprite.bbox(), BoundingBox::new(-3.0, -2.0, 6.0, 4.0));
    }

    #[test]
    fn precise_mask_matches_transformed_frame() {
        let mut img = RgbaImage::new(4, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        let mut sprite = Sprite::new("dot", vec![img]);
        let mask = sprite.precise_mask(0, 2.0, 1.0, 0.0);
        assert!(mask.test(1.5, 0.5));
        assert!(!mask.test(2.5, 0.5));
        let again = sprite.precise_mask(0, 2.0, 1.0, 0.0);
        assert!(Rc::ptr_eq(&mask, &again));
    }
}
