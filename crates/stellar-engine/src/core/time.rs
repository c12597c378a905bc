use std::time::{Duration, Instant};

/// Smallest per-frame time quantum, in milliseconds. Frame rates high
/// enough to push the nominal frame time below this are clamped to it.
pub const MIN_FRAME_TIME_MS: f64 = 1.0;

/// Timing for one frame, as handed to the update and event passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Real milliseconds since the previous frame. Passed to step handlers.
    pub real_ms: f64,
    /// Effective milliseconds used for animation advancement.
    pub elapsed_ms: f64,
    /// Effective frame time over nominal frame time. Scales motion and alarms.
    pub delta_mult: f64,
}

/// Derives effective frame timing from measured real time.
///
/// With delta timing off every frame counts as exactly one nominal frame.
/// With it on, the real time is clamped between the `delta_max` and
/// `delta_min` virtual frame rates so a long stall never produces a huge step.
#[derive(Debug, Clone)]
pub struct DeltaTimer {
    fps: f64,
    delta: bool,
    delta_min: f64,
    delta_max: Option<f64>,
}

impl DeltaTimer {
    pub fn new(fps: f32) -> Self {
        Self {
            fps: fps as f64,
            delta: false,
            delta_min: 15.0,
            delta_max: None,
        }
    }

    pub fn with_delta(mut self, delta_min: f32, delta_max: Option<f32>) -> Self {
        self.delta = true;
        self.delta_min = delta_min as f64;
        self.delta_max = delta_max.map(f64::from);
        self
    }

    /// Target frame rate.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn delta_enabled(&self) -> bool {
        self.delta
    }

    /// Nominal milliseconds per frame, never below `MIN_FRAME_TIME_MS`.
    pub fn frame_time(&self) -> f64 {
        frame_period(self.fps)
    }

    /// Longest effective frame, dictated by the minimum virtual frame rate.
    pub fn max_frame_time(&self) -> f64 {
        frame_period(self.delta_min).max(self.frame_time())
    }

    /// Upper bound on `delta_mult` while delta timing is on.
    pub fn max_delta_mult(&self) -> f64 {
        self.max_frame_time() / self.frame_time()
    }

    /// Turn a measured real frame duration into frame timing.
    pub fn measure(&self, real_ms: f64) -> FrameTiming {
        let nominal = self.frame_time();
        if !self.delta {
            return FrameTiming {
                real_ms,
                elapsed_ms: nominal,
                delta_mult: 1.0,
            };
        }

        let mut elapsed = real_ms.max(0.0).min(self.max_frame_time());
        if let Some(max_fps) = self.delta_max {
            elapsed = elapsed.max(frame_period(max_fps).min(self.max_frame_time()));
        }
        FrameTiming {
            real_ms,
            elapsed_ms: elapsed,
            delta_mult: elapsed / nominal,
        }
    }
}

/// Milliseconds per frame at `rate` frames per second, floored to the
/// minimum quantum. Non-positive rates are treated as the minimum quantum.
pub fn frame_period(rate: f64) -> f64 {
    if rate <= 0.0 {
        return MIN_FRAME_TIME_MS;
    }
    (1000.0 / rate).max(MIN_FRAME_TIME_MS)
}

/// Frame-rate clock collaborator.
pub trait Clock {
    /// Block until the next tick at `fps`, then return the real milliseconds
    /// elapsed since the previous call.
    fn tick(&mut self, fps: f64) -> f64;
}

/// `Clock` backed by `std::time::Instant` and thread sleep.
pub struct SystemClock {
    last: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { last: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn tick(&mut self, fps: f64) -> f64 {
        let period = Duration::from_secs_f64(frame_period(fps) / 1000.0);
        let since = self.last.elapsed();
        if since < period {
            std::thread::sleep(period - since);
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed.as_secs_f64() * 1000.0
    }
}
