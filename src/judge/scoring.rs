//! Tiers, combo multiplier and session totals

use serde::Serialize;
use std::fmt;

/// Outcome of a judged beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgement {
    /// Within a quarter of the lenience window
    Perfect,
    /// Within half of the lenience window
    Great,
    /// Within the lenience window
    Ok,
    /// Scrolled past the miss window without a press
    Miss,
}

impl Judgement {
    /// Classify a press `delta` seconds away from its beat.
    ///
    /// Returns `None` when the press is outside the window; the beat then
    /// stays pending.
    pub fn classify(delta: f64, lenience: f64) -> Option<Self> {
        let delta = delta.abs();
        if delta < lenience / 4.0 {
            Some(Judgement::Perfect)
        } else if delta < lenience / 2.0 {
            Some(Judgement::Great)
        } else if delta <= lenience {
            Some(Judgement::Ok)
        } else {
            None
        }
    }

    /// Points before the combo multiplier
    pub fn base_score(self) -> u32 {
        match self {
            Judgement::Perfect => 30,
            Judgement::Great => 20,
            Judgement::Ok => 10,
            Judgement::Miss => 0,
        }
    }

    /// Combo increment
    pub fn combo_step(self) -> u32 {
        match self {
            Judgement::Perfect => 3,
            Judgement::Great => 2,
            Judgement::Ok => 1,
            Judgement::Miss => 0,
        }
    }

    /// True for any scoring tier
    pub fn is_hit(self) -> bool {
        self != Judgement::Miss
    }

    /// Feedback label
    pub fn label(self) -> &'static str {
        match self {
            Judgement::Perfect => "perfect!",
            Judgement::Great => "great!",
            Judgement::Ok => "ok!",
            Judgement::Miss => "miss!",
        }
    }

    /// Label colour
    pub fn color(self) -> (u8, u8, u8) {
        match self {
            Judgement::Perfect => (70, 175, 255),
            Judgement::Great => (40, 255, 115),
            Judgement::Ok => (255, 200, 40),
            Judgement::Miss => (255, 75, 75),
        }
    }
}

impl fmt::Display for Judgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Score multiplier for the current combo
pub fn combo_multiplier(combo: u32) -> f64 {
    match combo {
        75.. => 2.0,
        50..=74 => 1.5,
        25..=49 => 1.2,
        _ => 1.0,
    }
}

/// Per-tier counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    /// Perfect hits
    pub perfect: u32,
    /// Great hits
    pub great: u32,
    /// Ok hits
    pub ok: u32,
    /// Missed beats
    pub missed: u32,
}

impl TierCounts {
    /// Count one judgement
    pub fn record(&mut self, judgement: Judgement) {
        match judgement {
            Judgement::Perfect => self.perfect += 1,
            Judgement::Great => self.great += 1,
            Judgement::Ok => self.ok += 1,
            Judgement::Miss => self.missed += 1,
        }
    }

    /// Beats hit in any tier
    pub fn hits(&self) -> u32 {
        self.perfect + self.great + self.ok
    }

    /// Hit percentage of resolved beats, 0 when nothing was resolved
    pub fn accuracy(&self) -> f64 {
        let resolved = (self.hits() + self.missed).max(1);
        f64::from(self.hits()) / f64::from(resolved) * 100.0
    }
}

/// Final, read-only result of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Final score
    pub score: u64,
    /// Hit percentage
    pub accuracy: f64,
    /// Tier counters
    pub counts: TierCounts,
    /// Beats in the session when it was loaded
    pub total_beats: usize,
    /// Highest combo reached
    pub max_combo: u32,
    /// Sorted letters of the lanes that were played
    pub layers: String,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "final score: {}", self.score)?;
        writeln!(f, "perfect: {}", self.counts.perfect)?;
        writeln!(f, "great: {}", self.counts.great)?;
        writeln!(f, "ok: {}", self.counts.ok)?;
        writeln!(f, "missed: {}", self.counts.missed)?;
        write!(f, "accuracy: {:.1}% ({})", self.accuracy, self.layers)
    }
}
