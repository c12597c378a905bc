//! Animation state for sprite frame sequences.
//!
//! The frame index is fractional and advances by elapsed time over the frame
//! period. Every time it runs off either end of the sequence it wraps, and
//! the wrap is reported so the caller can fire an animation-end event.

use crate::core::time::frame_period;

/// Playback position of an entity's sprite animation.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    /// Fractional frame index, kept within `[0, frame_count)`.
    pub(crate) index: f64,
    /// Frames per second; `None` defers to the sprite's suggested rate.
    pub(crate) fps: Option<f32>,
    /// Whether the index advances at all.
    pub(crate) playing: bool,
}

impl Default for Animation {
    fn default() -> Self {
        Self {
            index: 0.0,
            fps: None,
            playing: true,
        }
    }
}

impl Animation {
    pub fn index(&self) -> f64 {
        self.index
    }

    pub fn fps(&self) -> Option<f32> {
        self.fps
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whole frame currently shown, for a sequence of `frame_count` frames.
    pub fn frame(&self, frame_count: usize) -> usize {
        if frame_count == 0 {
            return 0;
        }
        (self.index.floor().max(0.0) as usize) % frame_count
    }

    /// Advance by `elapsed_ms` at `fps`. Returns how many times the index
    /// wrapped past the end (or the start, when playing backwards).
    pub fn advance(&mut self, elapsed_ms: f64, fps: f32, frame_count: usize) -> u32 {
        if !self.playing || frame_count == 0 || fps == 0.0 {
            return 0;
        }

        let count = frame_count as f64;
        // An index set out of range is folded back without counting wraps.
        let start = wrap_index(self.index, count);
        let step = elapsed_ms / frame_period(fps.abs() as f64);
        let moved = if fps < 0.0 { start - step } else { start + step };

        self.index = wrap_index(moved, count);
        (moved / count).floor().abs() as u32
    }
}

/// `index` folded into `[0, count)`.
fn wrap_index(index: f64, count: f64) -> f64 {
    let wrapped = index.rem_euclid(count);
    if wrapped < count {
        wrapped
    } else {
        0.0
    }
}
