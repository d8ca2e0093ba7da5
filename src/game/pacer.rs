//! Frame rate cap

use std::thread;
use std::time::{Duration, Instant};

/// Sleeps out the rest of each frame and reports the real frame time
#[derive(Debug, Clone)]
pub struct FramePacer {
    last: Instant,
}

impl FramePacer {
    /// Pacer whose first frame starts now
    pub fn new() -> Self {
        FramePacer {
            last: Instant::now(),
        }
    }

    /// Restart timing from now, e.g. after a blocking screen
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    /// Wait until `1 / fps` has passed since the previous tick.
    /// Returns the seconds elapsed since the previous tick.
    pub fn tick(&mut self, fps: u32) -> f64 {
        let frame = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
        let elapsed = self.last.elapsed();
        if elapsed < frame {
            thread::sleep(frame - elapsed);
        }
        let now = Instant::now();
        let delta = now.duration_since(self.last);
        self.last = now;
        delta.as_secs_f64()
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_caps_rate() {
        let mut pacer = FramePacer::new();
        let start = Instant::now();
        let mut total = 0.0;
        for _ in 0..5 {
            total += pacer.tick(100);
        }
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(total >= 0.05);
    }

    #[test]
    fn test_tick_after_slow_frame() {
        let mut pacer = FramePacer::new();
        thread::sleep(Duration::from_millis(30));
        // Already past the frame budget: no extra sleep
        let delta = pacer.tick(60);
        assert!(delta >= 0.03 && delta < 0.5);
    }
}
