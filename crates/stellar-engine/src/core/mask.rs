//! Collision masks: per-shape membership tests in an entity's local space.

use image::RgbaImage;

/// Boolean membership test over a local rectangle.
#[derive(Debug, Clone, PartialEq)]
pub enum Mask {
    /// Every point is solid.
    Full,
    /// Ellipse inscribed in a `width` x `height` box.
    Ellipse { width: f32, height: f32 },
    /// One flag per pixel, row-major.
    Bitmap {
        width: u32,
        height: u32,
        bits: Vec<bool>,
    },
}

impl Mask {
    /// Solid wherever the image is not fully transparent.
    pub fn from_image(image: &RgbaImage) -> Self {
        let bits = image.pixels().map(|p| p.0[3] > 0).collect();
        Mask::Bitmap {
            width: image.width(),
            height: image.height(),
            bits,
        }
    }

    /// Test the point `(x, y)` relative to the mask's top-left corner.
    pub fn test(&self, x: f32, y: f32) -> bool {
        match self {
            Mask::Full => true,
            Mask::Ellipse { width, height } => {
                let a = width / 2.0;
                let b = height / 2.0;
                if a <= 0.0 || b <= 0.0 {
                    return false;
                }
                let dx = (x - a) / a;
                let dy = (y - b) / b;
                dx * dx + dy * dy <= 1.0
            }
            Mask::Bitmap { width, height, bits } => {
                if x < 0.0 || y < 0.0 {
                    return false;
                }
                let (ix, iy) = (x as u32, y as u32);
                if ix >= *width || iy >= *height {
                    return false;
                }
                bits[(iy * width + ix) as usize]
            }
        }
    }
}
