//! Draw commands: the compositor's output, consumed by a `Presenter`.

use std::rc::Rc;

use image::RgbaImage;

use crate::api::types::{Color, SoundHandle};

/// Integer rectangle in device pixels. Right and bottom edges are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Smallest pixel rectangle covering the given float edges.
    pub fn from_edges(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        let x = left.floor() as i32;
        let y = top.floor() as i32;
        Self {
            x,
            y,
            w: (right.ceil() as i32 - x).max(0),
            h: (bottom.ceil() as i32 - y).max(0),
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > x && bottom > y).then(|| Rect::new(x, y, right - x, bottom - y))
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.intersect(other).is_some()
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x && other.y >= self.y && other.right() <= self.right() && other.bottom() <= self.bottom()
    }
}

/// One blit: `image` (or its `source` sub-rectangle) onto `dest`.
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub image: Rc<RgbaImage>,
    pub dest: Rect,
    /// Sub-rectangle of `image` to copy, for clipped proxy draws. `None`
    /// copies the whole image.
    pub source: Option<Rect>,
    pub z: i32,
}

impl DrawCommand {
    /// A draw of the whole image at `(x, y)`.
    pub fn whole(image: Rc<RgbaImage>, x: i32, y: i32, z: i32) -> Self {
        let dest = Rect::new(x, y, image.width() as i32, image.height() as i32);
        Self {
            image,
            dest,
            source: None,
            z,
        }
    }

    /// Clip to `clip`. Returns `None` if nothing is left; a draw entirely
    /// inside `clip` comes back unchanged.
    pub fn clipped(&self, clip: &Rect) -> Option<DrawCommand> {
        if clip.contains(&self.dest) {
            return Some(self.clone());
        }
        self.proxy(clip)
    }

    /// One-shot copy of the part of this draw inside `clip`, always carrying
    /// an explicit source rectangle.
    pub fn proxy(&self, clip: &Rect) -> Option<DrawCommand> {
        let visible = self.dest.intersect(clip)?;
        let base = self.source.unwrap_or(Rect::new(0, 0, self.dest.w, self.dest.h));
        let source = Rect::new(
            base.x + visible.x - self.dest.x,
            base.y + visible.y - self.dest.y,
            visible.w,
            visible.h,
        );
        Some(DrawCommand {
            image: Rc::clone(&self.image),
            dest: visible,
            source: Some(source),
            z: self.z,
        })
    }

    pub fn is_proxy(&self) -> bool {
        self.source.is_some()
    }
}

/// Everything the presenter needs for one frame.
///
/// On a full redraw, the presenter fills the screen with `fill`, paints the
/// `background` commands into its background surface and then draws every
/// command in `draws`. Otherwise it restores the background under each
/// `dirty` rectangle and draws `draws`, which then holds exactly the
/// commands touching those rectangles.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub full_redraw: bool,
    pub fill: Option<Color>,
    pub background: Vec<DrawCommand>,
    pub dirty: Vec<Rect>,
    pub draws: Vec<DrawCommand>,
    /// Sounds started during the frame, in order.
    pub sounds: Vec<SoundHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_and_contains() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(&b), Some(Rect::new(5, 5, 5, 5)));
        assert!(a.intersect(&Rect::new(10, 0, 5, 5)).is_none());
        assert!(a.contains(&Rect::new(2, 2, 8, 8)));
        assert!(!a.contains(&b));
    }

    #[test]
    fn from_edges_covers_fractions() {
        assert_eq!(Rect::from_edges(0.5, 1.2, 3.1, 4.0), Rect::new(0, 1, 4, 3));
    }

    #[test]
    fn clipping_splits_without_gap() {
        let cmd = DrawCommand::whole(Rc::new(RgbaImage::new(20, 8)), 310, 0, 0);
        let left = cmd.clipped(&Rect::new(0, 0, 320, 480)).unwrap();
        let right = cmd.clipped(&Rect::new(320, 0, 320, 480)).unwrap();

        assert_eq!(left.dest, Rect::new(310, 0, 10, 8));
        assert_eq!(left.source, Some(Rect::new(0, 0, 10, 8)));
        assert_eq!(right.dest, Rect::new(320, 0, 10, 8));
        assert_eq!(right.source, Some(Rect::new(10, 0, 10, 8)));
        assert_eq!(left.dest.right(), right.dest.x);
    }

    #[test]
    fn clipping_an_inside_draw_is_identity() {
        let cmd = DrawCommand::whole(Rc::new(RgbaImage::new(4, 4)), 10, 10, 3);
        let same = cmd.clipped(&Rect::new(0, 0, 100, 100)).unwrap();
        assert!(!same.is_proxy());
        assert_eq!(same.dest, cmd.dest);
        assert!(cmd.clipped(&Rect::new(50, 50, 10, 10)).is_none());

        let proxy = cmd.proxy(&Rect::new(0, 0, 100, 100)).unwrap();
        assert_eq!(proxy.dest, cmd.dest);
        assert_eq!(proxy.source, Some(Rect::new(0, 0, 4, 4)));
    }

    #[test]
    fn clipping_a_proxy_composes_sources() {
        let cmd = DrawCommand::whole(Rc::new(RgbaImage::new(10, 10)), 0, 0, 0);
        let once = cmd.clipped(&Rect::new(2, 2, 100, 100)).unwrap();
        let twice = once.clipped(&Rect::new(0, 0, 5, 5)).unwrap();
        assert_eq!(twice.dest, Rect::new(2, 2, 3, 3));
        assert_eq!(twice.source, Some(Rect::new(2, 2, 3, 3)));
    }
}
