//! Beat judging
//!
//! [`JudgingEngine`] owns the lanes for one play session. Every frame it
//! is advanced to the reconciled song time, which turns overdue beats into
//! shadows, and key presses are scored against the soonest pending beat of
//! the pressed lane.

mod engine;
mod scoring;

pub use engine::{Feedback, JudgeSettings, JudgingEngine, VisibleBeat, FEEDBACK_FRAMES};
pub use scoring::{combo_multiplier, Judgement, SessionSummary, TierCounts};
