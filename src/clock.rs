//! Song clock reconciliation
//!
//! The audio engine's elapsed time only moves once per written chunk and
//! runs on a different clock than the frame loop. [`ClockReconciler`]
//! keeps its own estimate that advances with wall-clock frame deltas and
//! is nudged toward the device reading by a fraction of the observed drift
//! each frame, never snapped to it.

/// Tunables for [`ClockReconciler`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSettings {
    /// Fraction of the drift applied per frame (damping constant `k`)
    pub drift_correction: f64,
    /// Window of the running drift average, in frames
    pub drift_smoothing: f64,
    /// Output latency subtracted from the estimate to get song time
    pub latency: f64,
}

impl Default for ClockSettings {
    fn default() -> Self {
        ClockSettings {
            drift_correction: 0.05,
            drift_smoothing: 30.0,
            latency: 0.0,
        }
    }
}

/// Damped drift filter producing the song position
#[derive(Debug, Clone)]
pub struct ClockReconciler {
    settings: ClockSettings,
    estimate: f64,
    device_time: f64,
    average_drift: f64,
    paused: bool,
}

impl ClockReconciler {
    /// Create a clock whose estimate starts at `start` seconds.
    ///
    /// A session with pre-roll `p` over a device that can absorb `f`
    /// seconds of audio up front starts at `f - p`, so the first beats
    /// scroll in while the device buffer fills.
    pub fn new(start: f64, settings: ClockSettings) -> Self {
        ClockReconciler {
            settings,
            estimate: start,
            device_time: 0.0,
            average_drift: 0.0,
            paused: false,
        }
    }

    /// Advance by one frame of `delta` wall-clock seconds, given the
    /// latest device reading. A reading of zero means playback has not
    /// started and is ignored. Returns the new song time.
    pub fn advance(&mut self, delta: f64, device_time: f64) -> f64 {
        if self.paused {
            return self.song_time();
        }

        let previous = self.estimate;
        let mut estimate = previous + delta.max(0.0);

        if device_time != 0.0 {
            self.device_time = device_time;
            let drift = device_time - estimate;
            self.average_drift += (drift - self.average_drift) / self.settings.drift_smoothing;
            estimate += drift * self.settings.drift_correction;
            log::trace!("clock drift {drift:+.4}s (avg {:+.4}s)", self.average_drift);
        }

        self.estimate = estimate.max(previous);
        self.song_time()
    }

    /// Freeze the clock
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Continue from the frozen value; the paused span is dropped
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// True while frozen
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Reconciled estimate before latency compensation
    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    /// Position used for judging and rendering
    pub fn song_time(&self) -> f64 {
        self.estimate - self.settings.latency
    }

    /// Last non-zero device reading
    pub fn device_time(&self) -> f64 {
        self.device_time
    }

    /// Running average of `device_time - estimate`
    pub fn average_drift(&self) -> f64 {
        self.average_drift
    }

    /// Replace the latency offset
    pub fn set_latency(&mut self, latency: f64) {
        self.settings.latency = latency;
    }

    /// Current latency offset
    pub fn latency(&self) -> f64 {
        self.settings.latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const FRAME: f64 = 1.0 / 60.0;

    #[test]
    fn test_free_runs_before_playback() {
        let mut clock = ClockReconciler::new(-2.5, ClockSettings::default());
        for _ in 0..60 {
            clock.advance(FRAME, 0.0);
        }
        assert_abs_diff_eq!(clock.song_time(), -1.5, epsilon = 1e-9);
        assert_eq!(clock.device_time(), 0.0);
    }

    #[test]
    fn test_converges_to_fixed_device_time() {
        let mut clock = ClockReconciler::new(0.0, ClockSettings::default());
        let mut last = clock.estimate();
        for _ in 0..500 {
            let now = clock.advance(0.0, 2.0);
            assert!(now >= last);
            last = now;
        }
        assert_abs_diff_eq!(clock.estimate(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_tracks_device_ahead() {
        let mut clock = ClockReconciler::new(0.0, ClockSettings::default());
        let mut device = 0.5;
        let mut last = clock.estimate();
        for _ in 0..600 {
            device += FRAME;
            let now = clock.advance(FRAME, device);
            assert!(now >= last);
            last = now;
        }
        assert_abs_diff_eq!(clock.estimate(), device, epsilon = 1e-3);
        assert!(clock.average_drift().abs() < 1e-2);
    }

    #[test]
    fn test_never_runs_backwards() {
        let mut clock = ClockReconciler::new(5.0, ClockSettings::default());
        // Device far behind the estimate
        let before = clock.estimate();
        clock.advance(FRAME, 1.0);
        assert!(clock.estimate() >= before);
        assert!(clock.average_drift() < 0.0);
    }

    #[test]
    fn test_correction_is_damped() {
        let settings = ClockSettings {
            drift_correction: 0.05,
            ..ClockSettings::default()
        };
        let mut clock = ClockReconciler::new(0.0, settings);
        clock.advance(0.0, 1.0);
        assert_abs_diff_eq!(clock.estimate(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_pause_excises_time() {
        let mut clock = ClockReconciler::new(0.0, ClockSettings::default());
        clock.advance(0.5, 0.0);
        clock.pause();
        assert!(clock.is_paused());
        for _ in 0..100 {
            clock.advance(FRAME, 0.0);
        }
        assert_abs_diff_eq!(clock.estimate(), 0.5, epsilon = 1e-12);

        clock.resume();
        clock.advance(FRAME, 0.0);
        assert_abs_diff_eq!(clock.estimate(), 0.5 + FRAME, epsilon = 1e-12);
    }

    #[test]
    fn test_latency_offset() {
        let mut clock = ClockReconciler::new(
            1.0,
            ClockSettings {
                latency: 0.1,
                ..ClockSettings::default()
            },
        );
        assert_abs_diff_eq!(clock.song_time(), 0.9, epsilon = 1e-12);
        clock.set_latency(0.0);
        assert_eq!(clock.latency(), 0.0);
        assert_eq!(clock.song_time(), 1.0);
    }
}
