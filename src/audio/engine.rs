//! Audio playback engine and feed thread

use super::decoder::{read_chunk, DecodePipeline, DEFAULT_DECODER};
use super::{AudioFormat, DeviceSink, OutputDevice, PauseGate, SAMPLE_WIDTH};
use crate::{Result, RizumuError};
use log::{debug, info, warn};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Tunables for [`AudioEngine`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Delay before the first chunk is written, in seconds
    pub pre_roll: f64,
    /// Program used to decode the track to raw PCM
    pub decoder_program: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            pre_roll: 3.0,
            decoder_program: DEFAULT_DECODER.to_string(),
        }
    }
}

/// State visible to both the main loop and the feed thread
#[derive(Debug, Default)]
struct Shared {
    /// Elapsed playback time (f64 bits), written by the feed thread only
    time: AtomicU64,
    stream_open: AtomicBool,
    gate: PauseGate,
}

impl Shared {
    fn time(&self) -> f64 {
        f64::from_bits(self.time.load(Ordering::Relaxed))
    }

    fn advance_time(&self, seconds: f64) {
        let time = self.time() + seconds;
        self.time.store(time.to_bits(), Ordering::Relaxed);
    }
}

/// Streams decoded PCM into an output device on a dedicated thread.
///
/// Lifecycle: [`set_device`](Self::set_device), [`open`](Self::open),
/// [`play`](Self::play), then poll [`is_stream_open`](Self::is_stream_open)
/// every frame and [`close`](Self::close) at the end.
pub struct AudioEngine {
    format: AudioFormat,
    settings: EngineSettings,
    device: Option<Box<dyn OutputDevice>>,
    source: Option<Box<dyn Read + Send>>,
    sink: Option<Box<dyn DeviceSink>>,
    shared: Arc<Shared>,
    feed: Option<JoinHandle<()>>,
}

impl AudioEngine {
    /// Create an engine with no device selected
    pub fn new(format: AudioFormat, settings: EngineSettings) -> Self {
        AudioEngine {
            format,
            settings,
            device: None,
            source: None,
            sink: None,
            shared: Arc::new(Shared::default()),
            feed: None,
        }
    }

    /// PCM format written to the device
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Delay before the first chunk, in seconds
    pub fn pre_roll(&self) -> f64 {
        self.settings.pre_roll
    }

    /// Select the output device, closing any previous one
    pub fn set_device(&mut self, device: Box<dyn OutputDevice>) {
        self.close();
        info!("Using output device '{}'", device.name());
        self.device = Some(device);
    }

    /// True once a device was selected
    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    /// Start decoding `path` and open the device stream.
    ///
    /// A path that does not exist is rejected up front. Anything that goes
    /// wrong after that, including a decoder that cannot be started, shows
    /// up as an immediately empty stream, the same as a finished track.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.device.is_none() {
            return Err(RizumuError::DeviceNotInitialized);
        }
        let path = path.as_ref();
        if !path.exists() {
            return Err(RizumuError::Decoder(format!(
                "Audio file not found: {}",
                path.display()
            )));
        }
        let pipeline = DecodePipeline::spawn(&self.settings.decoder_program, path, &self.format);
        self.open_source(pipeline)
    }

    /// Open the device stream over an already-decoded PCM source
    /// (signed 16-bit little-endian, interleaved).
    pub fn open_source<R: Read + Send + 'static>(&mut self, source: R) -> Result<()> {
        self.join_feed();
        let device = self
            .device
            .as_mut()
            .ok_or(RizumuError::DeviceNotInitialized)?;

        let mut sink = device.open_sink()?;
        sink.start();

        self.shared = Arc::new(Shared::default());
        self.shared.stream_open.store(true, Ordering::Relaxed);
        self.source = Some(Box::new(source));
        self.sink = Some(sink);
        Ok(())
    }

    /// Start the feed thread
    pub fn play(&mut self) -> Result<()> {
        let (Some(source), Some(sink)) = (self.source.take(), self.sink.take()) else {
            return Err(RizumuError::Other(
                "play() called without an open stream".to_string(),
            ));
        };

        let shared = Arc::clone(&self.shared);
        let format = self.format;
        let pre_roll = Duration::from_secs_f64(self.settings.pre_roll.max(0.0));

        let handle = std::thread::Builder::new()
            .name("rizumu-feed".to_string())
            .spawn(move || run_feed_loop(source, sink, shared, format, pre_roll))?;
        self.feed = Some(handle);
        Ok(())
    }

    /// Hold the feed thread before its next chunk
    pub fn pause(&self) {
        debug!("Playback paused at {:.3}s", self.get_time());
        self.shared.gate.pause();
    }

    /// Release the feed thread
    pub fn unpause(&self) {
        debug!("Playback resumed at {:.3}s", self.get_time());
        self.shared.gate.resume();
    }

    /// True while paused
    pub fn is_paused(&self) -> bool {
        self.shared.gate.is_paused()
    }

    /// Seconds of audio handed to the device so far.
    ///
    /// Counted by the feed thread around each write; not a hardware clock.
    pub fn get_time(&self) -> f64 {
        self.shared.time()
    }

    /// Seconds of audio the device can currently take without blocking
    pub fn get_fast_forward_time(&self) -> f64 {
        self.device.as_ref().map_or(0.0, |device| {
            device.write_available() as f64 / f64::from(self.format.sample_rate)
        })
    }

    /// Device output latency in seconds (zero without a device)
    pub fn output_latency(&self) -> f64 {
        self.device
            .as_ref()
            .map_or(0.0, |device| device.output_latency())
    }

    /// False once the track ended or the stream was stopped
    pub fn is_stream_open(&self) -> bool {
        self.shared.stream_open.load(Ordering::Relaxed)
    }

    /// Ask the feed thread to stop after its current chunk
    pub fn stop_stream(&self) {
        self.shared.stream_open.store(false, Ordering::Relaxed);
    }

    /// Stop the stream, join the feed thread and release the device.
    /// Safe to call repeatedly and without a prior [`play`](Self::play).
    pub fn close(&mut self) {
        self.join_feed();
        self.source = None;
        self.sink = None;
        if let Some(mut device) = self.device.take() {
            device.close();
            info!("Output device '{}' closed", device.name());
        }
    }

    fn join_feed(&mut self) {
        self.stop_stream();
        self.shared.gate.shutdown();
        if let Some(handle) = self.feed.take() {
            if handle.join().is_err() {
                warn!("Feed thread panicked");
            }
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Feed loop: pre-roll, then one chunk per iteration until the source
/// runs dry or the stream is stopped.
fn run_feed_loop(
    mut source: Box<dyn Read + Send>,
    mut sink: Box<dyn DeviceSink>,
    shared: Arc<Shared>,
    format: AudioFormat,
    pre_roll: Duration,
) {
    debug!("Feed thread started ({:?} pre-roll)", pre_roll);
    if !shared.gate.hold(pre_roll) {
        sink.stop();
        return;
    }

    let mut bytes = vec![0u8; format.chunk_bytes()];
    let mut samples: Vec<i16> = Vec::with_capacity(format.chunk_samples());

    while shared.stream_open.load(Ordering::Relaxed) {
        if shared.gate.is_paused() {
            sink.stop();
            if !shared.gate.wait_while_paused() {
                break;
            }
            sink.start();
        }

        let read = read_chunk(source.as_mut(), &mut bytes);
        if read == 0 {
            info!("End of audio stream at {:.2}s", shared.time());
            break;
        }

        samples.clear();
        samples.extend(
            bytes[..read]
                .chunks_exact(SAMPLE_WIDTH)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        );

        // Half the chunk before the blocking write, half after
        let half = format.samples_to_seconds(samples.len()) / 2.0;
        shared.advance_time(half);
        sink.write(&samples);
        shared.advance_time(half);
    }

    shared.stream_open.store(false, Ordering::Relaxed);
    sink.stop();
    debug!("Feed thread finished");
}
