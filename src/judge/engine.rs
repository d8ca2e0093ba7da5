use super::scoring::{combo_multiplier, Judgement, SessionSummary, TierCounts};
use crate::layer::{BeatRecord, LayerId, Layers};
use log::{debug, info};

/// Frames a feedback label stays on screen
pub const FEEDBACK_FRAMES: u32 = 30;

/// Timing windows for a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgeSettings {
    /// Largest press offset that still scores, in seconds
    pub lenience: f64,
    /// How long a beat may be overdue before it counts as missed
    pub miss_window: f64,
    /// How far ahead beats become visible
    pub preview_length: f64,
    /// How long a shadow lingers past the miss window
    pub shadow_duration: f64,
}

impl JudgeSettings {
    /// Settings with the given window and default display timings.
    /// The miss window equals the lenience window.
    pub fn with_lenience(lenience: f64) -> Self {
        JudgeSettings {
            lenience,
            miss_window: lenience,
            preview_length: 1.25,
            shadow_duration: 0.375,
        }
    }
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self::with_lenience(0.05)
    }
}

/// The most recent judgement and how many frames it has been shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    /// What happened
    pub judgement: Judgement,
    /// Frames since it happened
    pub age: u32,
}

/// A pending beat inside the preview horizon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleBeat {
    /// Beat timestamp
    pub time: f64,
    /// Seconds until the beat reaches the judgment line (negative when late)
    pub offset: f64,
    /// True if a press now would score
    pub hittable: bool,
}

/// Session state: lanes, score, combo and counters
#[derive(Debug, Clone)]
pub struct JudgingEngine {
    layers: Layers,
    settings: JudgeSettings,
    score: u64,
    combo: u32,
    max_combo: u32,
    counts: TierCounts,
    feedback: Option<Feedback>,
    song_time: f64,
    finished: bool,
}

impl JudgingEngine {
    /// Start a session over loaded lanes
    pub fn new(layers: Layers, settings: JudgeSettings) -> Self {
        JudgingEngine {
            layers,
            settings,
            score: 0,
            combo: 0,
            max_combo: 0,
            counts: TierCounts::default(),
            feedback: None,
            song_time: f64::NEG_INFINITY,
            finished: false,
        }
    }

    /// Move the session to `song_time`: expire overdue beats into shadows
    /// and drop shadows that have faded out. Returns how many beats were
    /// missed on this frame.
    pub fn advance(&mut self, song_time: f64) -> u32 {
        if self.finished {
            return 0;
        }
        self.song_time = song_time;

        if let Some(feedback) = self.feedback.as_mut() {
            feedback.age += 1;
            if feedback.age > FEEDBACK_FRAMES {
                self.feedback = None;
            }
        }

        let miss_window = self.settings.miss_window;
        let shadow_limit = miss_window + self.settings.shadow_duration;
        let mut missed = 0;

        for layer in self.layers.iter_mut() {
            // Pending beats are ascending, so only the front can be overdue
            while layer
                .next_beat()
                .is_some_and(|beat| song_time - beat.time > miss_window)
            {
                if let Some(beat) = layer.shadow_next_beat() {
                    debug!("{} missed beat at {:.3}s", beat.layer, beat.time);
                    missed += 1;
                }
            }

            while layer
                .oldest_shadow()
                .is_some_and(|shadow| song_time - shadow.time > shadow_limit)
            {
                layer.pop_oldest_shadow();
            }
        }

        if missed > 0 {
            self.counts.missed += missed;
            self.combo = 0;
            self.show(Judgement::Miss);
        }
        missed
    }

    /// Judge a press on `layer` at `song_time` against its soonest pending
    /// beat. A press outside the window changes nothing.
    pub fn press(&mut self, layer: LayerId, song_time: f64) -> Option<Judgement> {
        if self.finished {
            return None;
        }
        let lenience = self.settings.lenience;
        let lane = self.layers.get_mut(layer)?;
        let beat = lane.next_beat()?;
        let judgement = Judgement::classify(beat.time - song_time, lenience)?;
        lane.pop_next_beat();

        let points = f64::from(judgement.base_score()) * self.multiplier();
        self.score += points.round() as u64;
        self.combo += judgement.combo_step();
        self.max_combo = self.max_combo.max(self.combo);
        self.counts.record(judgement);
        self.show(judgement);
        Some(judgement)
    }

    /// Judge a press of `key`, if it is bound to a lane
    pub fn press_key(&mut self, key: char, song_time: f64) -> Option<Judgement> {
        let layer = self.layers.layer_for_key(key)?;
        self.press(layer, song_time)
    }

    fn show(&mut self, judgement: Judgement) {
        self.feedback = Some(Feedback { judgement, age: 0 });
    }

    /// Pending beats of `layer` that are inside the preview horizon
    pub fn visible_beats(
        &self,
        layer: LayerId,
        song_time: f64,
    ) -> impl Iterator<Item = VisibleBeat> + '_ {
        let horizon = song_time + self.settings.preview_length;
        let lenience = self.settings.lenience;
        self.layers
            .get(layer)
            .into_iter()
            .flat_map(|lane| lane.beats())
            .take_while(move |beat| beat.time <= horizon)
            .map(move |beat| {
                let offset = beat.time - song_time;
                VisibleBeat {
                    time: beat.time,
                    offset,
                    hittable: offset.abs() <= lenience,
                }
            })
    }

    /// Shadows of `layer`, oldest first
    pub fn shadows(&self, layer: LayerId) -> impl Iterator<Item = &BeatRecord> + '_ {
        self.layers
            .get(layer)
            .into_iter()
            .flat_map(|lane| lane.shadows())
    }

    /// End the session. Later calls to [`advance`](Self::advance) and
    /// [`press`](Self::press) do nothing.
    pub fn finish(&mut self) -> SessionSummary {
        if !self.finished {
            self.finished = true;
            info!(
                "Session finished: score {}, accuracy {:.1}%",
                self.score,
                self.accuracy()
            );
        }
        self.summary()
    }

    /// True after [`finish`](Self::finish)
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Current totals
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            score: self.score,
            accuracy: self.accuracy(),
            counts: self.counts,
            total_beats: self.total_beats(),
            max_combo: self.max_combo,
            layers: self.layers.mask().to_letters(),
        }
    }

    /// Lanes in play
    pub fn layers(&self) -> &Layers {
        &self.layers
    }

    /// Timing windows
    pub fn settings(&self) -> &JudgeSettings {
        &self.settings
    }

    /// Song time of the last advance
    pub fn song_time(&self) -> f64 {
        self.song_time
    }

    /// Score so far
    pub fn score(&self) -> u64 {
        self.score
    }

    /// Current combo
    pub fn combo(&self) -> u32 {
        self.combo
    }

    /// Multiplier for the current combo
    pub fn multiplier(&self) -> f64 {
        combo_multiplier(self.combo)
    }

    /// Tier counters
    pub fn counts(&self) -> TierCounts {
        self.counts
    }

    /// Hit percentage of resolved beats
    pub fn accuracy(&self) -> f64 {
        self.counts.accuracy()
    }

    /// Label to show, if one is still live
    pub fn feedback(&self) -> Option<Feedback> {
        self.feedback
    }

    /// Beats loaded into the session
    pub fn total_beats(&self) -> usize {
        self.layers.total_beats()
    }

    /// Beats neither hit nor missed yet
    pub fn remaining_beats(&self) -> usize {
        self.layers.remaining_beats()
    }
}
