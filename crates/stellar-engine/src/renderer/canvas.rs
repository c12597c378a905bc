use image::{imageops, Rgba, RgbaImage};

use super::draw::{DrawCommand, Frame, Rect};
use super::traits::Presenter;

/// Software presenter compositing into an in-memory image.
///
/// Keeps a background surface so that partial frames can restore what lies
/// under their dirty rectangles. Useful headless and for checking the
/// compositor's output pixel by pixel.
pub struct Canvas {
    background: RgbaImage,
    screen: RgbaImage,
    frames: u64,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            background: RgbaImage::new(width, height),
            screen: RgbaImage::new(width, height),
            frames: 0,
        }
    }

    pub fn screen(&self) -> &RgbaImage {
        &self.screen
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.screen.width() as i32, self.screen.height() as i32)
    }

    fn blit(target: &mut RgbaImage, cmd: &DrawCommand) {
        let source = cmd.source.unwrap_or(Rect::new(0, 0, cmd.dest.w, cmd.dest.h));
        if source.is_empty() || source.x < 0 || source.y < 0 {
            return;
        }
        let sub = imageops::crop_imm(
            &*cmd.image,
            source.x as u32,
            source.y as u32,
            source.w as u32,
            source.h as u32,
        )
        .to_image();
        imageops::overlay(target, &sub, cmd.dest.x as i64, cmd.dest.y as i64);
    }

    fn restore(&mut self, rect: &Rect) {
        let Some(rect) = rect.intersect(&self.bounds()) else {
            return;
        };
        let patch =
            imageops::crop_imm(&self.background, rect.x as u32, rect.y as u32, rect.w as u32, rect.h as u32).to_image();
        imageops::replace(&mut self.screen, &patch, rect.x as i64, rect.y as i64);
    }
}

impl Presenter for Canvas {
    fn backend(&self) -> &'static str {
        "canvas"
    }

    fn present(&mut self, frame: &Frame) {
        if frame.full_redraw {
            let fill = frame.fill.map(|c| Rgba([c.r, c.g, c.b, c.a])).unwrap_or(Rgba([0, 0, 0, 255]));
            for pixel in self.background.pixels_mut() {
                *pixel = fill;
            }
            for cmd in &frame.background {
                Self::blit(&mut self.background, cmd);
            }
            self.screen = self.background.clone();
        } else {
            for rect in &frame.dirty {
                self.restore(rect);
            }
        }
        for cmd in &frame.draws {
            Self::blit(&mut self.screen, cmd);
        }
        self.frames += 1;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.background = RgbaImage::new(width, height);
        self.screen = RgbaImage::new(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Color;
    use std::rc::Rc;

    fn solid(w: u32, h: u32, v: u8) -> Rc<RgbaImage> {
        Rc::new(RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255])))
    }

    #[test]
    fn full_redraw_fills_and_draws() {
        let mut canvas = Canvas::new(8, 8);
        let frame = Frame {
            full_redraw: true,
            fill: Some(Color::rgb(10, 20, 30)),
            draws: vec![DrawCommand::whole(solid(2, 2, 200), 1, 1, 0)],
            ..Default::default()
        };
        canvas.present(&frame);
        assert_eq!(canvas.screen().get_pixel(0, 0).0, [10, 20, 30, 255]);
        assert_eq!(canvas.screen().get_pixel(2, 2).0, [200, 200, 200, 255]);
        assert_eq!(canvas.frames_presented(), 1);
    }

    #[test]
    fn partial_frame_restores_background() {
        let mut canvas = Canvas::new(8, 8);
        canvas.present(&Frame {
            full_redraw: true,
            fill: Some(Color::BLACK),
            draws: vec![DrawCommand::whole(solid(2, 2, 200), 0, 0, 0)],
            ..Default::default()
        });
        canvas.present(&Frame {
            dirty: vec![Rect::new(0, 0, 2, 2), Rect::new(4, 4, 2, 2)],
            draws: vec![DrawCommand::whole(solid(2, 2, 90), 4, 4, 0)],
            ..Default::default()
        });
        assert_eq!(canvas.screen().get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(canvas.screen().get_pixel(5, 5).0, [90, 90, 90, 255]);
    }

    #[test]
    fn proxy_draws_copy_their_source_region() {
        let mut image = RgbaImage::from_pixel(4, 1, Rgba([0, 0, 0, 255]));
        image.put_pixel(2, 0, Rgba([255, 0, 0, 255]));
        let cmd = DrawCommand::whole(Rc::new(image), 0, 0, 0);
        let proxy = cmd.clipped(&Rect::new(2, 0, 2, 1)).unwrap();

        let mut canvas = Canvas::new(4, 1);
        canvas.present(&Frame {
            full_redraw: true,
            fill: Some(Color::WHITE),
            draws: vec![proxy],
            ..Default::default()
        });
        assert_eq!(canvas.screen().get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(canvas.screen().get_pixel(2, 0).0, [255, 0, 0, 255]);
    }
}
