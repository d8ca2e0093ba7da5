//! rizumu - terminal rhythm game
//!
//! Plays an audio track with its beat map, lists output devices, or shows
//! the saved track library.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use std::path::{Path, PathBuf};

use rizumu::audio::{AudioEngine, AudioFormat, NullDevice, OutputDevice};
use rizumu::beatmap::BeatMapReader;
use rizumu::clock::ClockSettings;
use rizumu::config::GameConfig;
use rizumu::game::{GameLoop, InputSource, LogRenderer, Renderer, ScriptedInput};
use rizumu::judge::{JudgingEngine, SessionSummary};
use rizumu::layer::LayerMask;
use rizumu::track::{Track, TrackLibrary};

/// Rizumu - rhythm game with drift-corrected audio sync
#[derive(Parser, Debug)]
#[command(name = "rizumu")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a track
    Play {
        /// Audio file
        audio: PathBuf,

        /// Beat map (defaults to the one saved in the library)
        #[arg(short, long)]
        map: Option<PathBuf>,

        /// Output device index (see `rizumu devices`)
        #[arg(short, long)]
        device: Option<usize>,

        /// Lanes to play, e.g. `ADF`
        #[arg(short, long)]
        layers: Option<String>,

        /// Drop lanes without beats
        #[arg(long)]
        prune: bool,

        /// Play without sound
        #[arg(long)]
        mute: bool,

        /// Log progress instead of drawing the terminal frontend
        #[arg(long)]
        no_tui: bool,
    },

    /// List output devices
    Devices,

    /// Show saved tracks and high scores
    Library {
        /// Library file (overrides the configuration)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let interactive =
        matches!(&cli.command, Commands::Play { no_tui: false, .. }) && tui_available();
    let default_filter = if interactive { "warn" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let mut config = match &cli.config {
        Some(path) => GameConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GameConfig::default(),
    };

    match cli.command {
        Commands::Play {
            audio,
            map,
            device,
            layers,
            prune,
            mute,
            no_tui: _,
        } => {
            if let Some(device) = device {
                config.device = Some(device);
            }
            if let Some(letters) = layers {
                config.enabled_layers = LayerMask::from_letters(&letters)
                    .with_context(|| format!("Invalid lane letters '{letters}'"))?;
            }
            config.prune_unused_layers |= prune;
            config.validate()?;
            play(&config, &audio, map, mute, interactive)
        }
        Commands::Devices => list_devices(),
        Commands::Library { path } => {
            show_library(path.as_deref().unwrap_or(config.library_path.as_path()))
        }
    }
}

#[cfg(feature = "tui")]
fn tui_available() -> bool {
    rizumu::tui::terminal_supports_tui()
}

#[cfg(not(feature = "tui"))]
fn tui_available() -> bool {
    false
}

fn open_device(
    config: &GameConfig,
    format: AudioFormat,
    mute: bool,
) -> Result<Box<dyn OutputDevice>> {
    if mute {
        return Ok(Box::new(NullDevice::paced(format)));
    }
    open_output(config, format)
}

#[cfg(feature = "streaming")]
fn open_output(config: &GameConfig, format: AudioFormat) -> Result<Box<dyn OutputDevice>> {
    let device = rizumu::audio::RodioDevice::open(config.device, format)
        .context("Failed to open output device")?;
    Ok(Box::new(device))
}

#[cfg(not(feature = "streaming"))]
fn open_output(_config: &GameConfig, format: AudioFormat) -> Result<Box<dyn OutputDevice>> {
    warn!("Built without the streaming feature, playing silently");
    Ok(Box::new(NullDevice::paced(format)))
}

fn play(
    config: &GameConfig,
    audio_path: &Path,
    map: Option<PathBuf>,
    mute: bool,
    interactive: bool,
) -> Result<()> {
    let mut library = TrackLibrary::load(&config.library_path)
        .with_context(|| format!("Failed to load library {}", config.library_path.display()))?;

    let saved = library.find(audio_path).cloned();
    let Some(map_path) = map.or_else(|| saved.as_ref().and_then(|t| t.map_path.clone())) else {
        bail!(
            "No beat map for {}; pass one with --map",
            audio_path.display()
        );
    };

    let mut layers = BeatMapReader::new(config.enabled_layers)
        .prune_unused(config.prune_unused_layers)
        .load_file(&map_path)
        .with_context(|| format!("Failed to read beat map {}", map_path.display()))?;
    if layers.is_empty() {
        bail!("Beat map {} has no playable lanes", map_path.display());
    }
    layers.bind_keys(&config.bindings()?);
    let lane_count = layers.len();
    let judge = JudgingEngine::new(layers, config.judge_settings(lane_count));

    let format = AudioFormat::standard();
    let mut audio = AudioEngine::new(format, config.engine_settings());
    audio.set_device(open_device(config, format, mute)?);
    audio
        .open(audio_path)
        .with_context(|| format!("Failed to open {}", audio_path.display()))?;

    let clock_settings = config.clock_settings(audio.output_latency());
    let mut track = saved.unwrap_or_else(|| Track::new(audio_path));
    track.map_path = Some(map_path);
    let title = track.display_name();
    let duration = track.duration;
    library.add_track(track);

    let summary = if interactive {
        run_tui(audio, judge, clock_settings, config, &title, duration)?
    } else {
        run_session(
            audio,
            judge,
            clock_settings,
            ScriptedInput::default(),
            LogRenderer::default(),
            config,
            duration,
            false,
        )?
    };

    println!("{summary}");
    if library.record_result(audio_path, &summary) {
        println!("New high score!");
    }
    library
        .save(&config.library_path)
        .with_context(|| format!("Failed to save library {}", config.library_path.display()))?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_session<I: InputSource, R: Renderer>(
    audio: AudioEngine,
    judge: JudgingEngine,
    clock_settings: ClockSettings,
    input: I,
    renderer: R,
    config: &GameConfig,
    duration: f64,
    hold_results: bool,
) -> Result<SessionSummary> {
    let summary = GameLoop::new(audio, judge, clock_settings, input, renderer)
        .frame_rates(config.playing_fps, config.results_fps)
        .duration(duration)
        .hold_results(hold_results)
        .run()?;
    Ok(summary)
}

#[cfg(feature = "tui")]
fn run_tui(
    audio: AudioEngine,
    judge: JudgingEngine,
    clock_settings: ClockSettings,
    config: &GameConfig,
    title: &str,
    duration: f64,
) -> Result<SessionSummary> {
    use rizumu::tui::{TerminalInput, TuiRenderer};

    let renderer = TuiRenderer::enter(title).context("Failed to set up the terminal")?;
    run_session(
        audio,
        judge,
        clock_settings,
        TerminalInput::new(),
        renderer,
        config,
        duration,
        true,
    )
}

#[cfg(not(feature = "tui"))]
fn run_tui(
    audio: AudioEngine,
    judge: JudgingEngine,
    clock_settings: ClockSettings,
    config: &GameConfig,
    _title: &str,
    duration: f64,
) -> Result<SessionSummary> {
    run_session(
        audio,
        judge,
        clock_settings,
        ScriptedInput::default(),
        LogRenderer::default(),
        config,
        duration,
        false,
    )
}

#[cfg(feature = "streaming")]
fn list_devices() -> Result<()> {
    let devices = rizumu::audio::list_output_devices()?;
    if devices.is_empty() {
        warn!("No stereo output devices found");
    }
    for device in devices {
        println!("{:>3}  {} ({} ch)", device.index, device.name, device.channels);
    }
    Ok(())
}

#[cfg(not(feature = "streaming"))]
fn list_devices() -> Result<()> {
    bail!("Built without the streaming feature; no output devices available")
}

fn show_library(path: &Path) -> Result<()> {
    let library = TrackLibrary::load(path)
        .with_context(|| format!("Failed to load library {}", path.display()))?;
    info!("{} tracks in {}", library.len(), path.display());
    for track in library.tracks() {
        let layers = track.high_score_layers.as_deref().unwrap_or("-");
        println!(
            "{:<40} {:>8}  {:>5.1}%  {}",
            track.display_name(),
            track.high_score,
            track.high_score_accuracy,
            layers
        );
    }
    Ok(())
}
