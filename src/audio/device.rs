//! Output devices
//!
//! [`OutputDevice`] is what the engine owns on the main thread. Opening it
//! hands out a [`DeviceSink`], the only part that crosses into the feed
//! thread. This mirrors how the platform stream handle usually cannot
//! leave the thread that created it while its sample queue can.

use super::AudioFormat;
use crate::Result;
use std::thread;
use std::time::Duration;

/// Write side of an open device stream, owned by the feed thread
pub trait DeviceSink: Send {
    /// Start (or restart) playback
    fn start(&mut self);

    /// Stop playback, keeping queued samples
    fn stop(&mut self);

    /// Queue interleaved samples, blocking until they are accepted.
    /// Returns the number of samples accepted.
    fn write(&mut self, samples: &[i16]) -> usize;
}

/// An output device selected for playback
pub trait OutputDevice {
    /// Human-readable device name
    fn name(&self) -> String;

    /// Open the device stream and return its write side
    fn open_sink(&mut self) -> Result<Box<dyn DeviceSink>>;

    /// Sample frames that can currently be written without blocking
    fn write_available(&self) -> usize;

    /// Estimated output latency in seconds
    fn output_latency(&self) -> f64;

    /// Stop the stream and release the device. Must tolerate repeated calls.
    fn close(&mut self);
}

/// Silent device that consumes samples in real time (or instantly).
///
/// Used for muted runs and for driving the engine in tests.
#[derive(Debug, Clone)]
pub struct NullDevice {
    format: AudioFormat,
    paced: bool,
    buffer_frames: usize,
    latency: f64,
}

impl NullDevice {
    /// Device that sleeps for the duration of every write
    pub fn paced(format: AudioFormat) -> Self {
        NullDevice {
            format,
            paced: true,
            buffer_frames: format.ring_buffer_size / usize::from(format.channels.max(1)),
            latency: 0.0,
        }
    }

    /// Device that accepts writes immediately
    pub fn unpaced(format: AudioFormat) -> Self {
        NullDevice {
            paced: false,
            ..Self::paced(format)
        }
    }

    /// Override the reported free buffer space (in frames)
    pub fn with_buffer_frames(mut self, frames: usize) -> Self {
        self.buffer_frames = frames;
        self
    }

    /// Override the reported output latency
    pub fn with_latency(mut self, seconds: f64) -> Self {
        self.latency = seconds;
        self
    }
}

struct NullSink {
    format: AudioFormat,
    paced: bool,
}

impl DeviceSink for NullSink {
    fn start(&mut self) {}

    fn stop(&mut self) {}

    fn write(&mut self, samples: &[i16]) -> usize {
        if self.paced {
            let seconds = self.format.samples_to_seconds(samples.len());
            thread::sleep(Duration::from_secs_f64(seconds));
        }
        samples.len()
    }
}

impl OutputDevice for NullDevice {
    fn name(&self) -> String {
        "null".to_string()
    }

    fn open_sink(&mut self) -> Result<Box<dyn DeviceSink>> {
        Ok(Box::new(NullSink {
            format: self.format,
            paced: self.paced,
        }))
    }

    fn write_available(&self) -> usize {
        self.buffer_frames
    }

    fn output_latency(&self) -> f64 {
        self.latency
    }

    fn close(&mut self) {}
}

#[cfg(feature = "streaming")]
pub use rodio_device::{list_output_devices, DeviceInfo, RodioDevice};

#[cfg(feature = "streaming")]
mod rodio_device {
    use super::{DeviceSink, OutputDevice};
    use crate::audio::{AudioFormat, RingBuffer, BUFFER_BACKOFF_MICROS};
    use crate::{Result, RizumuError};
    use log::{debug, info};
    use rodio::cpal::traits::{DeviceTrait, HostTrait};
    use rodio::{OutputStream, Sink, Source};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// An enumerated output device
    #[derive(Debug, Clone)]
    pub struct DeviceInfo {
        /// Index to pass to [`RodioDevice::open`]
        pub index: usize,
        /// Device name
        pub name: String,
        /// Channels of the default output configuration
        pub channels: u16,
    }

    /// List output devices that can play stereo
    pub fn list_output_devices() -> Result<Vec<DeviceInfo>> {
        let host = rodio::cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| RizumuError::AudioDevice(format!("Failed to enumerate devices: {e}")))?;

        Ok(devices
            .enumerate()
            .filter_map(|(index, device)| {
                let name = device.name().ok()?;
                let channels = device.default_output_config().ok()?.channels();
                (channels >= 2).then_some(DeviceInfo {
                    index,
                    name,
                    channels,
                })
            })
            .collect())
    }

    /// Audio source that reads from the ring buffer
    struct RingBufferSource {
        ring_buffer: Arc<RingBuffer>,
        format: AudioFormat,
        playing: Arc<AtomicBool>,
        finished: Arc<AtomicBool>,
        /// Batch buffer (reduces lock contention)
        buffer: Vec<i16>,
        buffer_pos: usize,
        buffer_len: usize,
    }

    impl RingBufferSource {
        fn new(
            ring_buffer: Arc<RingBuffer>,
            format: AudioFormat,
            playing: Arc<AtomicBool>,
            finished: Arc<AtomicBool>,
        ) -> Self {
            let batch = format.chunk_samples();
            RingBufferSource {
                ring_buffer,
                format,
                playing,
                finished,
                buffer: vec![0; batch],
                buffer_pos: 0,
                buffer_len: 0,
            }
        }
    }

    impl Source for RingBufferSource {
        fn current_frame_len(&self) -> Option<usize> {
            None
        }

        fn channels(&self) -> u16 {
            self.format.channels
        }

        fn sample_rate(&self) -> u32 {
            self.format.sample_rate
        }

        fn total_duration(&self) -> Option<Duration> {
            None
        }
    }

    impl Iterator for RingBufferSource {
        type Item = i16;

        fn next(&mut self) -> Option<i16> {
            if self.finished.load(Ordering::Relaxed) {
                return None;
            }

            // Stopped stream: hold queued samples, emit silence
            if !self.playing.load(Ordering::Relaxed) {
                return Some(0);
            }

            if self.buffer_pos >= self.buffer_len {
                self.buffer_len = self.ring_buffer.read(&mut self.buffer);
                self.buffer_pos = 0;
                if self.buffer_len == 0 {
                    // Underrun
                    return Some(0);
                }
            }

            let sample = self.buffer[self.buffer_pos];
            self.buffer_pos += 1;
            Some(sample)
        }
    }

    struct RingBufferSink {
        ring_buffer: Arc<RingBuffer>,
        playing: Arc<AtomicBool>,
        finished: Arc<AtomicBool>,
    }

    impl DeviceSink for RingBufferSink {
        fn start(&mut self) {
            self.playing.store(true, Ordering::Relaxed);
        }

        fn stop(&mut self) {
            self.playing.store(false, Ordering::Relaxed);
        }

        fn write(&mut self, samples: &[i16]) -> usize {
            let mut total_written = 0;
            let mut remaining = samples;

            // Backpressure: wait for the device to drain, unless it is closing
            while !remaining.is_empty() && !self.finished.load(Ordering::Relaxed) {
                let written = self.ring_buffer.write(remaining);
                total_written += written;
                if written == 0 {
                    std::thread::sleep(Duration::from_micros(BUFFER_BACKOFF_MICROS));
                } else {
                    remaining = &remaining[written..];
                }
            }

            total_written
        }
    }

    /// Output device backed by rodio
    pub struct RodioDevice {
        name: String,
        format: AudioFormat,
        ring_buffer: Arc<RingBuffer>,
        playing: Arc<AtomicBool>,
        finished: Arc<AtomicBool>,
        sink: Option<Sink>,
        stream: Option<OutputStream>,
    }

    impl RodioDevice {
        /// Open the output device at `index` (see [`list_output_devices`]),
        /// or the system default when `index` is `None`.
        pub fn open(index: Option<usize>, format: AudioFormat) -> Result<Self> {
            let (stream, handle, name) = match index {
                Some(index) => {
                    let host = rodio::cpal::default_host();
                    let device = host
                        .output_devices()
                        .map_err(|e| {
                            RizumuError::AudioDevice(format!("Failed to enumerate devices: {e}"))
                        })?
                        .nth(index)
                        .ok_or_else(|| {
                            RizumuError::AudioDevice(format!("No output device at index {index}"))
                        })?;
                    let name = device.name().unwrap_or_else(|_| format!("device {index}"));
                    let (stream, handle) = OutputStream::try_from_device(&device).map_err(|e| {
                        RizumuError::AudioDevice(format!("Failed to open '{name}': {e}"))
                    })?;
                    (stream, handle, name)
                }
                None => {
                    let (stream, handle) = OutputStream::try_default().map_err(|e| {
                        RizumuError::AudioDevice(format!("Failed to create audio stream: {e}"))
                    })?;
                    (stream, handle, "default".to_string())
                }
            };

            let sink = Sink::try_new(&handle)
                .map_err(|e| RizumuError::AudioDevice(format!("Failed to create audio sink: {e}")))?;

            let ring_buffer = Arc::new(RingBuffer::new(format.ring_buffer_size)?);
            let playing = Arc::new(AtomicBool::new(false));
            let finished = Arc::new(AtomicBool::new(false));

            sink.append(RingBufferSource::new(
                Arc::clone(&ring_buffer),
                format,
                Arc::clone(&playing),
                Arc::clone(&finished),
            ));

            info!(
                "Output device '{}' ready ({} Hz, {} ch, {:.1}ms buffer)",
                name,
                format.sample_rate,
                format.channels,
                format.latency_ms()
            );

            Ok(RodioDevice {
                name,
                format,
                ring_buffer,
                playing,
                finished,
                sink: Some(sink),
                stream: Some(stream),
            })
        }
    }

    impl OutputDevice for RodioDevice {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn open_sink(&mut self) -> Result<Box<dyn DeviceSink>> {
            if self.finished.load(Ordering::Relaxed) {
                return Err(RizumuError::AudioDevice(format!(
                    "Device '{}' already closed",
                    self.name
                )));
            }
            self.ring_buffer.flush();
            self.playing.store(true, Ordering::Relaxed);
            Ok(Box::new(RingBufferSink {
                ring_buffer: Arc::clone(&self.ring_buffer),
                playing: Arc::clone(&self.playing),
                finished: Arc::clone(&self.finished),
            }))
        }

        fn write_available(&self) -> usize {
            self.ring_buffer.available_write() / usize::from(self.format.channels.max(1))
        }

        fn output_latency(&self) -> f64 {
            self.format.latency_ms() / 1000.0
        }

        fn close(&mut self) {
            self.playing.store(false, Ordering::Relaxed);
            self.finished.store(true, Ordering::Relaxed);
            if let Some(sink) = self.sink.take() {
                sink.stop();
            }
            if self.stream.take().is_some() {
                debug!("Output device '{}' released", self.name);
            }
        }
    }

    impl Drop for RodioDevice {
        fn drop(&mut self) {
            self.close();
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn try_device() -> Option<RodioDevice> {
            match RodioDevice::open(None, AudioFormat::standard()) {
                Ok(device) => Some(device),
                Err(err) => {
                    eprintln!("Skipping rodio device test (audio backend unavailable): {err}");
                    None
                }
            }
        }

        #[test]
        fn test_ring_buffer_source_silence_when_stopped() {
            let ring_buffer = Arc::new(RingBuffer::new(64).unwrap());
            ring_buffer.write(&[5; 8]);
            let mut source = RingBufferSource::new(
                Arc::clone(&ring_buffer),
                AudioFormat::standard(),
                Arc::new(AtomicBool::new(false)),
                Arc::new(AtomicBool::new(false)),
            );

            assert_eq!(source.next(), Some(0));
            assert_eq!(ring_buffer.available_read(), 8);
        }

        #[test]
        fn test_ring_buffer_source_plays_queued_samples() {
            let ring_buffer = Arc::new(RingBuffer::new(64).unwrap());
            ring_buffer.write(&[5, 6]);
            let mut source = RingBufferSource::new(
                ring_buffer,
                AudioFormat::standard(),
                Arc::new(AtomicBool::new(true)),
                Arc::new(AtomicBool::new(false)),
            );

            assert_eq!(source.next(), Some(5));
            assert_eq!(source.next(), Some(6));
            // Underrun
            assert_eq!(source.next(), Some(0));
        }

        #[test]
        fn test_ring_buffer_source_finished_signal() {
            let finished = Arc::new(AtomicBool::new(false));
            let mut source = RingBufferSource::new(
                Arc::new(RingBuffer::new(64).unwrap()),
                AudioFormat::standard(),
                Arc::new(AtomicBool::new(true)),
                Arc::clone(&finished),
            );
            assert!(source.next().is_some());
            finished.store(true, Ordering::Relaxed);
            assert_eq!(source.next(), None);
            assert_eq!(source.channels(), 2);
            assert_eq!(source.sample_rate(), 44_100);
        }

        #[test]
        fn test_closed_sink_stops_blocking() {
            let finished = Arc::new(AtomicBool::new(true));
            let mut sink = RingBufferSink {
                ring_buffer: Arc::new(RingBuffer::new(4).unwrap()),
                playing: Arc::new(AtomicBool::new(true)),
                finished,
            };
            assert_eq!(sink.write(&[1; 100]), 0);
        }

        #[test]
        fn test_device_open_and_close() {
            let Some(mut device) = try_device() else {
                return;
            };
            assert!(device.write_available() > 0);
            assert!(device.output_latency() > 0.0);
            let mut sink = device.open_sink().unwrap();
            sink.write(&[0; 256]);
            device.close();
            device.close();
            assert!(device.open_sink().is_err());
        }
    }
}
