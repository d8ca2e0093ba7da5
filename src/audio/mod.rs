//! Audio playback
//!
//! The track is decoded by an external process into raw PCM and pushed,
//! one fixed-size chunk at a time, into the output device by a dedicated
//! feed thread. The main loop never touches the PCM data. It only reads
//! the feed thread's elapsed-time counter and toggles the pause gate.
//!
//! - [`decoder`]: external decode pipeline (`ffmpeg` by default)
//! - [`device`]: output device seam and the rodio-backed implementation
//! - [`ring_buffer`]: sample queue between the feed thread and the device callback
//! - [`gate`]: blocking pause gate shared with the feed thread
//! - [`engine`]: [`AudioEngine`], the public face of all of the above

pub mod decoder;
pub mod device;
pub mod engine;
pub mod gate;
pub mod ring_buffer;

pub use decoder::DecodePipeline;
#[cfg(feature = "streaming")]
pub use device::{list_output_devices, DeviceInfo, RodioDevice};
pub use device::{DeviceSink, NullDevice, OutputDevice};
pub use engine::{AudioEngine, EngineSettings};
pub use gate::PauseGate;
pub use ring_buffer::{RingBuffer, RingBufferError};

/// Output sample rate (44.1 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Output channel count (stereo)
pub const DEFAULT_CHANNELS: u16 = 2;

/// Sample frames per chunk written to the device
pub const DEFAULT_FRAME_SIZE: usize = 512;

/// Bytes per sample (signed 16-bit)
pub const SAMPLE_WIDTH: usize = 2;

/// Buffer backoff time in microseconds
pub const BUFFER_BACKOFF_MICROS: u64 = 100;

/// PCM layout shared by the decoder, the feed thread and the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of interleaved channels
    pub channels: u16,

    /// Sample frames per chunk
    pub frame_size: usize,

    /// Size of the device ring buffer (in samples, all channels)
    /// Larger buffers = more latency but less chance of underrun
    pub ring_buffer_size: usize,
}

impl AudioFormat {
    /// Stereo, 16-bit, 44.1 kHz, 512-frame chunks.
    /// Ring buffer = 8192 samples ≈ 93ms @ 44.1kHz stereo
    pub fn standard() -> Self {
        AudioFormat {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            frame_size: DEFAULT_FRAME_SIZE,
            ring_buffer_size: 8192,
        }
    }

    /// Duration of one full chunk in seconds
    pub fn frame_time(&self) -> f64 {
        self.frame_size as f64 / f64::from(self.sample_rate)
    }

    /// Interleaved samples per chunk
    pub fn chunk_samples(&self) -> usize {
        self.frame_size * usize::from(self.channels)
    }

    /// Bytes per chunk of decoded PCM
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_samples() * SAMPLE_WIDTH
    }

    /// Duration of `samples` interleaved samples in seconds
    pub fn samples_to_seconds(&self, samples: usize) -> f64 {
        let frames = samples / usize::from(self.channels.max(1));
        frames as f64 / f64::from(self.sample_rate)
    }

    /// Ring buffer latency in milliseconds
    pub fn latency_ms(&self) -> f64 {
        self.samples_to_seconds(self.ring_buffer_size) * 1000.0
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_standard_format() {
        let format = AudioFormat::standard();
        assert_eq!(format.chunk_samples(), 1024);
        assert_eq!(format.chunk_bytes(), 2048);
        assert_relative_eq!(format.frame_time(), 512.0 / 44100.0);
    }

    #[test]
    fn test_format_latency() {
        let latency = AudioFormat::standard().latency_ms();
        assert!(latency > 90.0 && latency < 95.0);
    }

    #[test]
    fn test_samples_to_seconds() {
        let format = AudioFormat::standard();
        assert_relative_eq!(format.samples_to_seconds(88_200), 1.0);
    }
}
