//! Rizumu rhythm game core
//!
//! Falling beat markers scroll toward a judgment line in sync with an
//! audio track while the player presses one key per lane. The audio and
//! the simulation never share a clock: the feed thread only knows how many
//! PCM chunks it has pushed into the device, and the main loop only knows
//! its own wall clock. The [`clock`] module reconciles the two.
//!
//! # Pipeline
//! - [`beatmap`]: reads the binary `(layer, time)` beat map into lanes
//! - [`audio`]: decodes the track through an external process and feeds the output device
//! - [`clock`]: damped drift filter producing the song position
//! - [`judge`]: miss detection, hit windows, score/combo bookkeeping
//! - [`game`]: per-frame driver (input, clock, judge, render, pacing)
//!
//! # Crate feature flags
//! - `streaming` (default): rodio-backed output device (`audio::RodioDevice`)
//! - `tui` (default): terminal frontend (`tui`)
//!
//! # Quick start
//! ```no_run
//! use rizumu::beatmap::BeatMapReader;
//! use rizumu::judge::{JudgeSettings, JudgingEngine};
//! use rizumu::layer::{LayerId, LayerMask};
//!
//! let layers = BeatMapReader::new(LayerMask::all())
//!     .load_file("tmp/out.track")
//!     .unwrap();
//! let mut engine = JudgingEngine::new(layers, JudgeSettings::with_lenience(0.08));
//! engine.advance(1.0);
//! let _ = engine.press(LayerId::A, 1.01);
//! ```

#![warn(missing_docs)]

pub mod audio;
pub mod beatmap;
pub mod clock;
pub mod config;
pub mod game;
pub mod judge;
pub mod layer;
pub mod track;
#[cfg(feature = "tui")]
pub mod tui;

pub use audio::{AudioEngine, OutputDevice};
pub use beatmap::BeatMapReader;
pub use clock::ClockReconciler;
pub use config::GameConfig;
pub use game::{GameLoop, InputEvent, InputSource, Renderer};
pub use judge::{Judgement, JudgingEngine, SessionSummary};
pub use layer::{BeatRecord, Layer, LayerId, LayerMask, Layers};
pub use track::{Track, TrackLibrary};

/// Error types for rizumu operations
#[derive(thiserror::Error, Debug)]
pub enum RizumuError {
    /// `open` was called before an output device was selected
    #[error("Output device not initialized")]
    DeviceNotInitialized,

    /// Beat map ends in the middle of a record
    #[error("Malformed beat map: truncated record at byte {offset} ({remaining} trailing bytes)")]
    MalformedMap {
        /// Byte offset of the layer tag that starts the truncated record
        offset: usize,
        /// Number of bytes left after that offset
        remaining: usize,
    },

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// Decode pipeline could not be started
    #[error("Decoder error: {0}")]
    Decoder(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Track library error
    #[error("Library error: {0}")]
    Library(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for RizumuError {
    /// Converts a String into `RizumuError::Other`.
    fn from(s: String) -> Self {
        RizumuError::Other(s)
    }
}

impl From<&str> for RizumuError {
    fn from(s: &str) -> Self {
        RizumuError::Other(s.to_string())
    }
}

/// Result type for rizumu operations
pub type Result<T> = std::result::Result<T, RizumuError>;

/// Format a song position as `m:ss.s`, clamping negative values to zero.
pub fn format_song_time(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).round() as u64;
    format!("{}:{:02}.{}", tenths / 600, tenths % 600 / 10, tenths % 10)
}
