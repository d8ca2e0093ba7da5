//! Game configuration
//!
//! Loaded from an optional JSON file; every field falls back to its
//! default when missing.

use crate::audio::EngineSettings;
use crate::clock::ClockSettings;
use crate::judge::JudgeSettings;
use crate::layer::{KeyBindings, LayerMask};
use crate::{Result, RizumuError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// All tunables of a play session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// One key per lane in `A..F` order, `-` for an unbound lane
    pub key_bindings: String,
    /// Lanes read from the beat map
    pub enabled_layers: LayerMask,
    /// Drop enabled lanes that have no beats
    pub prune_unused_layers: bool,
    /// Seconds of upcoming beats shown ahead of the judgment line
    pub preview_length: f64,
    /// Lenience window with no lanes
    pub lenience_base: f64,
    /// Lenience added per lane in play
    pub lenience_per_layer: f64,
    /// Overdue time before a beat is missed; `None` uses the lenience
    pub miss_window: Option<f64>,
    /// How long shadows linger past the miss window
    pub shadow_duration: f64,
    /// Damping constant of the clock drift filter
    pub drift_correction: f64,
    /// Window of the drift average, in frames
    pub drift_smoothing: f64,
    /// Share of the device output latency subtracted from song time
    pub latency_factor: f64,
    /// Seconds of silence before the track starts
    pub pre_roll: f64,
    /// Frame cap while playing
    pub playing_fps: u32,
    /// Frame cap on the results screen
    pub results_fps: u32,
    /// Output device index; `None` for the system default
    pub device: Option<usize>,
    /// Track library file
    pub library_path: PathBuf,
    /// Program used to decode audio
    pub decoder_program: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        let engine = EngineSettings::default();
        GameConfig {
            key_bindings: "sdfjkl".to_string(),
            enabled_layers: LayerMask::all(),
            prune_unused_layers: false,
            preview_length: 1.25,
            lenience_base: 0.05,
            lenience_per_layer: 0.005,
            miss_window: None,
            shadow_duration: 0.375,
            drift_correction: 0.05,
            drift_smoothing: 30.0,
            latency_factor: 0.75,
            pre_roll: engine.pre_roll,
            playing_fps: 60,
            results_fps: 30,
            device: None,
            library_path: PathBuf::from("library/saved.library.json"),
            decoder_program: engine.decoder_program,
        }
    }
}

impl GameConfig {
    /// Read and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            RizumuError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let config: GameConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check ranges and bindings
    pub fn validate(&self) -> Result<()> {
        let bindings = self.bindings()?;
        if bindings.has_duplicates() {
            return Err(RizumuError::Config(format!(
                "Duplicate key in bindings '{}'",
                self.key_bindings
            )));
        }
        if self.enabled_layers.is_empty() {
            return Err(RizumuError::Config("No lanes enabled".to_string()));
        }
        if self.lenience_base <= 0.0 || self.lenience_per_layer < 0.0 {
            return Err(RizumuError::Config(
                "Lenience must be positive".to_string(),
            ));
        }
        if self.miss_window.is_some_and(|w| w <= 0.0) {
            return Err(RizumuError::Config(
                "Miss window must be positive".to_string(),
            ));
        }
        if !(self.drift_correction > 0.0 && self.drift_correction <= 1.0) {
            return Err(RizumuError::Config(format!(
                "Drift correction {} outside (0, 1]",
                self.drift_correction
            )));
        }
        if self.drift_smoothing < 1.0 {
            return Err(RizumuError::Config(
                "Drift smoothing must be at least one frame".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.latency_factor) {
            return Err(RizumuError::Config(format!(
                "Latency factor {} outside [0, 1]",
                self.latency_factor
            )));
        }
        if self.playing_fps == 0 || self.results_fps == 0 {
            return Err(RizumuError::Config("Frame caps must be positive".to_string()));
        }
        if self.pre_roll < 0.0 || self.preview_length <= 0.0 || self.shadow_duration < 0.0 {
            return Err(RizumuError::Config(
                "Negative timing in configuration".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed key bindings
    pub fn bindings(&self) -> Result<KeyBindings> {
        KeyBindings::from_keys(&self.key_bindings).ok_or_else(|| {
            RizumuError::Config(format!(
                "Key bindings '{}' must have exactly six characters",
                self.key_bindings
            ))
        })
    }

    /// Lenience window for a session with `layer_count` lanes
    pub fn lenience(&self, layer_count: usize) -> f64 {
        self.lenience_base + self.lenience_per_layer * layer_count as f64
    }

    /// Judge windows for a session with `layer_count` lanes
    pub fn judge_settings(&self, layer_count: usize) -> JudgeSettings {
        let lenience = self.lenience(layer_count);
        JudgeSettings {
            lenience,
            miss_window: self.miss_window.unwrap_or(lenience),
            preview_length: self.preview_length,
            shadow_duration: self.shadow_duration,
        }
    }

    /// Clock filter settings for a device with the given output latency
    pub fn clock_settings(&self, output_latency: f64) -> ClockSettings {
        ClockSettings {
            drift_correction: self.drift_correction,
            drift_smoothing: self.drift_smoothing,
            latency: output_latency * self.latency_factor,
        }
    }

    /// Audio engine settings
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            pre_roll: self.pre_roll,
            decoder_program: self.decoder_program.clone(),
        }
    }
}
