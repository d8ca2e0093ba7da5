//! External decode pipeline
//!
//! Any format the decoder program understands is turned into raw signed
//! 16-bit little-endian interleaved PCM on its stdout. Its diagnostics are
//! discarded. A decoder that cannot be started, crashes, or exits early
//! simply yields an empty stream, which the feed thread treats as end of
//! track.

use super::AudioFormat;
use log::{debug, warn};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

/// Default decoder program
pub const DEFAULT_DECODER: &str = "ffmpeg";

/// Decoded PCM byte stream backed by a child process
pub struct DecodePipeline {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl DecodePipeline {
    /// Command line for decoding `path` into `format`
    pub fn command(program: &str, path: &Path, format: &AudioFormat) -> Command {
        let mut cmd = Command::new(program);
        cmd.arg("-i")
            .arg(path)
            .args(["-loglevel", "error", "-f", "s16le", "-ac"])
            .arg(format.channels.to_string())
            .arg("-ar")
            .arg(format.sample_rate.to_string())
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd
    }

    /// Start decoding `path`.
    ///
    /// A decoder that fails to start is logged and produces an empty stream.
    pub fn spawn(program: &str, path: &Path, format: &AudioFormat) -> Self {
        match Self::command(program, path, format).spawn() {
            Ok(mut child) => {
                debug!("Decoder '{}' started for {}", program, path.display());
                let stdout = child.stdout.take();
                DecodePipeline {
                    child: Some(child),
                    stdout,
                }
            }
            Err(e) => {
                warn!("Failed to start decoder '{program}': {e}");
                DecodePipeline::empty()
            }
        }
    }

    /// A pipeline that is already at end of stream
    pub fn empty() -> Self {
        DecodePipeline {
            child: None,
            stdout: None,
        }
    }

    fn reap(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            // Exits on its own at end of track; kill covers early shutdown
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Read for DecodePipeline {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stdout.as_mut() {
            Some(stdout) => stdout.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for DecodePipeline {
    fn drop(&mut self) {
        self.reap();
    }
}

/// Fill `buf` from `reader` until it is full or the stream ends.
///
/// Read errors count as end of stream. Returns the number of bytes read.
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Decoded stream read failed, treating as end of stream: {e}");
                break;
            }
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_command_line() {
        let cmd = DecodePipeline::command("ffmpeg", Path::new("song.mp3"), &AudioFormat::standard());
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-i", "song.mp3", "-loglevel", "error", "-f", "s16le", "-ac", "2", "-ar",
                "44100", "-"
            ]
        );
    }

    #[test]
    fn test_missing_decoder_is_empty_stream() {
        let mut pipeline = DecodePipeline::spawn(
            "rizumu-no-such-decoder",
            Path::new("song.mp3"),
            &AudioFormat::standard(),
        );
        let mut buf = [0u8; 64];
        assert_eq!(read_chunk(&mut pipeline, &mut buf), 0);
    }

    #[test]
    fn test_read_chunk_fills_buffer() {
        let mut reader = Cursor::new(vec![1u8; 10]);
        let mut buf = [0u8; 4];
        assert_eq!(read_chunk(&mut reader, &mut buf), 4);
        assert_eq!(read_chunk(&mut reader, &mut buf), 4);
        assert_eq!(read_chunk(&mut reader, &mut buf), 2);
        assert_eq!(read_chunk(&mut reader, &mut buf), 0);
    }

    struct Trickle(Vec<u8>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0.remove(0);
            Ok(1)
        }
    }

    #[test]
    fn test_read_chunk_collects_short_reads() {
        let mut reader = Trickle(vec![9; 6]);
        let mut buf = [0u8; 4];
        assert_eq!(read_chunk(&mut reader, &mut buf), 4);
        assert_eq!(buf, [9; 4]);
    }
}
