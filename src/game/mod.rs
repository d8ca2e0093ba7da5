//! Game loop driver
//!
//! One iteration per frame, in this order:
//! 1. drain input; `Escape` toggles pause, `Quit` ends the session
//! 2. unless paused, advance the song clock with the frame delta and the
//!    audio engine's elapsed time
//! 3. judge key presses at the new song time, then advance the judge
//! 4. render
//! 5. sleep out the rest of the frame
//!
//! The session ends when the audio stream closes or on quit, after which
//! the results screen runs at a lower frame cap.

mod input;
mod pacer;
mod render;

pub use input::{InputEvent, InputSource, ScriptedInput};
pub use pacer::FramePacer;
pub use render::{Frame, LogRenderer, Phase, Renderer};

use crate::audio::AudioEngine;
use crate::clock::{ClockReconciler, ClockSettings};
use crate::judge::{JudgingEngine, SessionSummary};
use crate::Result;
use log::{debug, info};

/// Outcome of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Keep going
    Running,
    /// Session over
    Finished,
}

/// Drives one play session
pub struct GameLoop<I: InputSource, R: Renderer> {
    audio: AudioEngine,
    clock: ClockReconciler,
    judge: JudgingEngine,
    input: I,
    renderer: R,
    pacer: FramePacer,
    playing_fps: u32,
    results_fps: u32,
    hold_results: bool,
    duration: Option<f64>,
    paused: bool,
    quit: bool,
}

impl<I: InputSource, R: Renderer> GameLoop<I, R> {
    /// Assemble a session over an opened audio engine.
    ///
    /// The clock starts at `fast_forward - pre_roll` so beats begin to
    /// scroll while the device buffer fills.
    pub fn new(
        audio: AudioEngine,
        judge: JudgingEngine,
        clock_settings: ClockSettings,
        input: I,
        renderer: R,
    ) -> Self {
        let start = audio.get_fast_forward_time() - audio.pre_roll();
        GameLoop {
            clock: ClockReconciler::new(start, clock_settings),
            audio,
            judge,
            input,
            renderer,
            pacer: FramePacer::new(),
            playing_fps: 60,
            results_fps: 30,
            hold_results: true,
            duration: None,
            paused: false,
            quit: false,
        }
    }

    /// Frame caps while playing and on the results screen
    pub fn frame_rates(mut self, playing: u32, results: u32) -> Self {
        self.playing_fps = playing;
        self.results_fps = results;
        self
    }

    /// Keep the results screen up until a key is pressed
    pub fn hold_results(mut self, hold: bool) -> Self {
        self.hold_results = hold;
        self
    }

    /// Track length, for progress display
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = (seconds > 0.0).then_some(seconds);
        self
    }

    /// Play the session to the end and return its totals
    pub fn run(mut self) -> Result<SessionSummary> {
        self.audio.play()?;
        info!(
            "Session started: {} lanes, {} beats, lenience {:.3}s",
            self.judge.layers().len(),
            self.judge.total_beats(),
            self.judge.settings().lenience
        );

        self.pacer.reset();
        loop {
            let delta = self.pacer.tick(self.playing_fps);
            if self.step_frame(delta)? == LoopState::Finished {
                break;
            }
        }

        let summary = self.judge.finish();
        self.audio.close();
        self.show_results(&summary)?;
        Ok(summary)
    }

    /// Run one playing frame with the given wall-clock delta, without pacing
    pub fn step_frame(&mut self, delta: f64) -> Result<LoopState> {
        let events = self.input.poll_events()?;
        let mut presses = Vec::new();
        let mut advanced = false;

        for event in events {
            match event {
                InputEvent::KeyDown(key) if !self.paused => presses.push(key),
                InputEvent::KeyDown(_) | InputEvent::KeyUp(_) => {}
                InputEvent::Escape => {
                    // Presses made before the pause still count
                    if !self.paused && !self.quit {
                        self.settle(delta, &mut presses, &mut advanced);
                    }
                    self.toggle_pause();
                }
                InputEvent::Quit => {
                    info!("Quit at {:.2}s", self.clock.song_time());
                    self.audio.stop_stream();
                    self.quit = true;
                }
            }
        }

        if !self.paused && !self.quit {
            self.settle(delta, &mut presses, &mut advanced);
        }

        self.renderer.draw(&Frame {
            phase: Phase::Playing,
            judge: &self.judge,
            song_time: self.clock.song_time(),
            paused: self.paused,
            average_drift: self.clock.average_drift(),
            duration: self.duration,
            summary: None,
        })?;

        if self.quit || !self.audio.is_stream_open() {
            Ok(LoopState::Finished)
        } else {
            Ok(LoopState::Running)
        }
    }

    /// Advance the clock once per frame, judge `presses` at the new song
    /// time, then sweep for misses.
    fn settle(&mut self, delta: f64, presses: &mut Vec<char>, advanced: &mut bool) {
        let song_time = if *advanced {
            self.clock.song_time()
        } else {
            self.clock.advance(delta, self.audio.get_time())
        };
        for key in presses.drain(..) {
            if let Some(judgement) = self.judge.press_key(key, song_time) {
                debug!("{key} -> {judgement} at {song_time:.3}s");
            }
        }
        if !*advanced {
            self.judge.advance(song_time);
            *advanced = true;
        }
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        if self.paused {
            self.audio.pause();
            self.clock.pause();
            info!("Paused at {:.2}s", self.clock.song_time());
        } else {
            self.clock.resume();
            self.audio.unpause();
            info!("Resumed");
        }
    }

    fn show_results(&mut self, summary: &SessionSummary) -> Result<()> {
        self.pacer.reset();
        loop {
            self.renderer.draw(&Frame {
                phase: Phase::Results,
                judge: &self.judge,
                song_time: self.clock.song_time(),
                paused: false,
                average_drift: self.clock.average_drift(),
                duration: self.duration,
                summary: Some(summary),
            })?;

            if !self.hold_results {
                return Ok(());
            }
            let dismissed = self
                .input
                .poll_events()?
                .iter()
                .any(|event| !matches!(event, InputEvent::KeyUp(_)));
            if dismissed {
                return Ok(());
            }
            self.pacer.tick(self.results_fps);
        }
    }

    /// Session state
    pub fn judge(&self) -> &JudgingEngine {
        &self.judge
    }

    /// Song clock
    pub fn clock(&self) -> &ClockReconciler {
        &self.clock
    }

    /// Audio engine
    pub fn audio(&self) -> &AudioEngine {
        &self.audio
    }

    /// True while paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFormat, EngineSettings, NullDevice};
    use crate::judge::JudgeSettings;
    use crate::layer::{KeyBindings, LayerId, LayerMask, Layers};
    use approx::assert_abs_diff_eq;
    use std::io::Cursor;

    const FRAME: f64 = 1.0 / 60.0;

    #[derive(Default)]
    struct CountingRenderer {
        playing: usize,
        results: usize,
    }

    impl Renderer for CountingRenderer {
        fn draw(&mut self, frame: &Frame<'_>) -> Result<()> {
            match frame.phase {
                Phase::Playing => self.playing += 1,
                Phase::Results => self.results += 1,
            }
            Ok(())
        }
    }

    /// Engine with an open stream that is never played, so the device
    /// time stays at zero and the clock runs on frame deltas alone
    fn idle_audio() -> AudioEngine {
        let mut audio = AudioEngine::new(
            AudioFormat::standard(),
            EngineSettings {
                pre_roll: 0.0,
                ..EngineSettings::default()
            },
        );
        audio.set_device(Box::new(
            NullDevice::unpaced(AudioFormat::standard()).with_buffer_frames(0),
        ));
        audio.open_source(Cursor::new(Vec::new())).unwrap();
        audio
    }

    fn judge(beats: &[(LayerId, f64)]) -> JudgingEngine {
        let mut layers = Layers::new(LayerMask::all());
        for (id, time) in beats.iter().rev() {
            layers.get_mut(*id).unwrap().insert_beat_front(*time);
        }
        for layer in layers.iter_mut() {
            layer.count_beats();
        }
        layers.bind_keys(&KeyBindings::default());
        JudgingEngine::new(layers, JudgeSettings::with_lenience(0.1))
    }

    fn game(
        beats: &[(LayerId, f64)],
        script: Vec<(u64, InputEvent)>,
    ) -> GameLoop<ScriptedInput, CountingRenderer> {
        GameLoop::new(
            idle_audio(),
            judge(beats),
            ClockSettings::default(),
            ScriptedInput::new(script),
            CountingRenderer::default(),
        )
    }

    #[test]
    fn test_press_judged_at_song_time() {
        let mut game = game(
            &[(LayerId::A, 1.0)],
            vec![(59, InputEvent::KeyDown('s'))],
        );
        for _ in 0..60 {
            assert_eq!(game.step_frame(FRAME).unwrap(), LoopState::Running);
        }
        assert_abs_diff_eq!(game.clock().song_time(), 1.0, epsilon = 1e-9);
        assert_eq!(game.judge().counts().perfect, 1);
        assert_eq!(game.judge().score(), 30);
        assert_eq!(game.renderer.playing, 60);
    }

    #[test]
    fn test_unpressed_beat_missed() {
        let mut game = game(&[(LayerId::F, 0.5)], vec![]);
        for _ in 0..40 {
            game.step_frame(FRAME).unwrap();
        }
        assert_eq!(game.judge().counts().missed, 1);
        assert_eq!(game.judge().layers().get(LayerId::F).unwrap().shadow_count(), 1);
    }

    #[test]
    fn test_escape_pauses_clock_and_input() {
        let mut game = game(
            &[(LayerId::B, 0.25)],
            vec![
                (10, InputEvent::Escape),
                (15, InputEvent::KeyDown('d')),
                (20, InputEvent::Escape),
            ],
        );
        for _ in 0..30 {
            game.step_frame(FRAME).unwrap();
        }
        assert!(!game.is_paused());
        assert!(!game.audio().is_paused());
        // Frames 0..=10 run up to the pause, 20..30 after it
        assert_abs_diff_eq!(game.clock().song_time(), 21.0 * FRAME, epsilon = 1e-9);
        // Press during pause was dropped
        assert_eq!(game.judge().counts().hits(), 0);
    }

    #[test]
    fn test_quit_finishes() {
        let mut game = game(&[(LayerId::A, 1.0)], vec![(3, InputEvent::Quit)]);
        for _ in 0..3 {
            assert_eq!(game.step_frame(FRAME).unwrap(), LoopState::Running);
        }
        assert_eq!(game.step_frame(FRAME).unwrap(), LoopState::Finished);
        assert!(!game.audio().is_stream_open());
    }

    #[test]
    fn test_stream_end_finishes() {
        let mut game = game(&[(LayerId::A, 1.0)], vec![]);
        assert_eq!(game.step_frame(FRAME).unwrap(), LoopState::Running);
        game.audio.stop_stream();
        assert_eq!(game.step_frame(FRAME).unwrap(), LoopState::Finished);
    }

    #[test]
    fn test_run_to_end_of_stream() {
        // Empty source: the stream closes on the first chunk read
        let game = game(&[(LayerId::A, 100.0)], vec![(0, InputEvent::KeyDown('s'))])
            .frame_rates(200, 200)
            .hold_results(false);
        let summary = game.run().unwrap();
        assert_eq!(summary.total_beats, 1);
        assert_eq!(summary.score, 0);
    }

    #[test]
    fn test_pre_roll_shifts_start() {
        let mut audio = AudioEngine::new(
            AudioFormat::standard(),
            EngineSettings {
                pre_roll: 3.0,
                ..EngineSettings::default()
            },
        );
        audio.set_device(Box::new(
            NullDevice::unpaced(AudioFormat::standard()).with_buffer_frames(44_100),
        ));
        let game = GameLoop::new(
            audio,
            judge(&[]),
            ClockSettings::default(),
            ScriptedInput::default(),
            CountingRenderer::default(),
        );
        assert_abs_diff_eq!(game.clock().song_time(), -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_press_before_escape_is_judged() {
        let mut game = game(
            &[(LayerId::A, FRAME)],
            vec![(0, InputEvent::KeyDown('s')), (0, InputEvent::Escape)],
        );
        game.step_frame(FRAME).unwrap();
        assert!(game.is_paused());
        assert_eq!(game.judge().counts().perfect, 1);
        assert_abs_diff_eq!(game.clock().song_time(), FRAME, epsilon = 1e-12);

        // Paused frames leave the clock alone
        game.step_frame(FRAME).unwrap();
        assert_abs_diff_eq!(game.clock().song_time(), FRAME, epsilon = 1e-12);
    }
}
