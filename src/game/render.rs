//! Render seam

use crate::judge::{JudgingEngine, SessionSummary};
use crate::{format_song_time, Result};
use log::{debug, info};

/// Which screen is up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Beats are scrolling
    Playing,
    /// Final score screen
    Results,
}

/// Everything a renderer may show for one frame
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Current screen
    pub phase: Phase,
    /// Session state
    pub judge: &'a JudgingEngine,
    /// Latency-compensated song time
    pub song_time: f64,
    /// True while paused
    pub paused: bool,
    /// Running average of audio clock drift
    pub average_drift: f64,
    /// Track length for the progress bar, if known
    pub duration: Option<f64>,
    /// Final totals, on the results screen
    pub summary: Option<&'a SessionSummary>,
}

/// Draws frames. Called once per loop iteration.
pub trait Renderer {
    /// Draw one frame
    fn draw(&mut self, frame: &Frame<'_>) -> Result<()>;
}

/// Renderer for runs without a screen: logs progress and the results
#[derive(Debug, Clone)]
pub struct LogRenderer {
    frames: u64,
    every: u64,
    reported: bool,
}

impl LogRenderer {
    /// Log a progress line every `every` frames
    pub fn new(every: u64) -> Self {
        LogRenderer {
            frames: 0,
            every: every.max(1),
            reported: false,
        }
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new(60)
    }
}

impl Renderer for LogRenderer {
    fn draw(&mut self, frame: &Frame<'_>) -> Result<()> {
        match frame.phase {
            Phase::Playing => {
                if self.frames % self.every == 0 {
                    debug!(
                        "{} score {} combo {} drift {:+.4}s{}",
                        format_song_time(frame.song_time),
                        frame.judge.score(),
                        frame.judge.combo(),
                        frame.average_drift,
                        if frame.paused { " (paused)" } else { "" }
                    );
                }
                self.frames += 1;
            }
            Phase::Results => {
                if !self.reported {
                    if let Some(summary) = frame.summary {
                        info!("Results:\n{summary}");
                    }
                    self.reported = true;
                }
            }
        }
        Ok(())
    }
}
