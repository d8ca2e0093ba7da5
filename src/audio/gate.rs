//! Pause gate shared by the main loop and the feed thread
//!
//! The main loop closes and opens the gate; the feed thread checks it
//! before every chunk and blocks on a condition variable while it is
//! closed. Shutting the gate down releases any waiter for good, so a
//! feed thread parked on a paused gate can always be joined.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    shutdown: bool,
}

/// Blocking pause gate
#[derive(Debug, Default)]
pub struct PauseGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl PauseGate {
    /// Create an open (unpaused) gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate. Ignored after shutdown.
    pub fn pause(&self) {
        let mut state = self.state.lock();
        if !state.shutdown {
            state.paused = true;
            // Wakes a pre-roll hold so it stops counting
            self.cond.notify_all();
        }
    }

    /// Open the gate and wake the waiter
    pub fn resume(&self) {
        let mut state = self.state.lock();
        state.paused = false;
        self.cond.notify_all();
    }

    /// Release every waiter permanently
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.paused = false;
        state.shutdown = true;
        self.cond.notify_all();
    }

    /// True while the gate is closed
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// True once [`PauseGate::shutdown`] was called
    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Block while the gate is closed.
    /// Returns `false` if the gate was shut down instead of reopened.
    pub fn wait_while_paused(&self) -> bool {
        let mut state = self.state.lock();
        while state.paused && !state.shutdown {
            self.cond.wait(&mut state);
        }
        !state.shutdown
    }

    /// Sleep for `duration` of unpaused time unless the gate is shut
    /// down first. Time spent paused does not count toward `duration`.
    /// Returns `false` if interrupted by shutdown.
    pub fn hold(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        let mut state = self.state.lock();
        while !state.shutdown {
            if state.paused {
                self.cond.wait(&mut state);
                continue;
            }
            if remaining.is_zero() {
                break;
            }
            let started = Instant::now();
            let timed_out = self
                .cond
                .wait_until(&mut state, started + remaining)
                .timed_out();
            remaining = remaining.saturating_sub(started.elapsed());
            if timed_out {
                break;
            }
        }
        !state.shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_open_gate_does_not_block() {
        let gate = PauseGate::new();
        assert!(!gate.is_paused());
        assert!(gate.wait_while_paused());
    }

    #[test]
    fn test_resume_releases_waiter() {
        let gate = Arc::new(PauseGate::new());
        gate.pause();

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait_while_paused())
        };

        thread::sleep(Duration::from_millis(20));
        gate.resume();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_shutdown_releases_paused_waiter() {
        let gate = Arc::new(PauseGate::new());
        gate.pause();

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait_while_paused())
        };

        thread::sleep(Duration::from_millis(20));
        gate.shutdown();
        assert!(!waiter.join().unwrap());
        assert!(!gate.is_paused());
    }

    #[test]
    fn test_pause_after_shutdown_is_ignored() {
        let gate = PauseGate::new();
        gate.shutdown();
        gate.pause();
        assert!(!gate.is_paused());
        assert!(!gate.wait_while_paused());
    }

    #[test]
    fn test_hold_times_out() {
        let gate = PauseGate::new();
        let start = Instant::now();
        assert!(gate.hold(Duration::from_millis(15)));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_hold_interrupted_by_shutdown() {
        let gate = Arc::new(PauseGate::new());
        let sleeper = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.hold(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        gate.shutdown();
        assert!(!sleeper.join().unwrap());
    }

    #[test]
    fn test_hold_does_not_count_paused_time() {
        let gate = Arc::new(PauseGate::new());
        let sleeper = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let start = Instant::now();
                let finished = gate.hold(Duration::from_millis(100));
                (finished, start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        gate.pause();
        thread::sleep(Duration::from_millis(200));
        assert!(!sleeper.is_finished());
        gate.resume();

        let (finished, elapsed) = sleeper.join().unwrap();
        assert!(finished);
        // 100ms unpaused plus the 200ms pause
        assert!(elapsed >= Duration::from_millis(280), "held {elapsed:?}");
    }
}
