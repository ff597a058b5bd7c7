//! Turns encoded streams (mp3, ogg, ...) into the raw PCM a voice transport
//! paces in 20 ms frames.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use super::{AudioStream, filters::ffmpeg::TranscodedStream};
use crate::common::{AudioFormat, PlaybackError};

pub trait PcmDecoder: Send + Sync {
    /// Wraps `stream` so it reads as 48 kHz stereo s16le.
    fn decode(&self, stream: AudioStream, format: AudioFormat)
    -> Result<AudioStream, PlaybackError>;
}

/// Decodes by piping the stream through `ffmpeg`.
pub struct FfmpegDecoder {
    ffmpeg_path: String,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

/// ffmpeg demuxer for `format`, when it cannot be left to probing.
fn demuxer(format: AudioFormat) -> Option<&'static str> {
    match format {
        AudioFormat::Mp3 => Some("mp3"),
        AudioFormat::Ogg | AudioFormat::Opus => Some("ogg"),
        AudioFormat::Flac => Some("flac"),
        AudioFormat::Wav => Some("wav"),
        AudioFormat::Aac => Some("aac"),
        AudioFormat::Webm => Some("matroska"),
        AudioFormat::Mp4 => Some("mov"),
        AudioFormat::Pcm | AudioFormat::Unknown => None,
    }
}

pub fn decode_args(format: AudioFormat) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(String::from)
        .collect();
    if let Some(demuxer) = demuxer(format) {
        args.push("-f".into());
        args.push(demuxer.into());
    }
    for arg in [
        "-i", "pipe:0", "-f", "s16le", "-ar", "48000", "-ac", "2", "-vn", "pipe:1",
    ] {
        args.push(arg.into());
    }
    args
}

impl PcmDecoder for FfmpegDecoder {
    fn decode(
        &self,
        mut stream: AudioStream,
        format: AudioFormat,
    ) -> Result<AudioStream, PlaybackError> {
        let mut child = Command::new(&self.ffmpeg_path)
            .args(decode_args(format))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                warn!("failed to spawn ffmpeg decoder: {}", e);
                PlaybackError::build(
                    format!("Failed to start decoder: {e}"),
                    format!("DecoderError: {e}"),
                )
            })?;

        let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(PlaybackError::build(
                "ffmpeg decoder has no pipes",
                "DecoderError: stdio unavailable",
            ));
        };

        // closing stdin at the end of the source lets ffmpeg flush and exit
        let feeder = tokio::spawn(async move {
            if let Err(e) = tokio::io::copy(&mut stream, &mut stdin).await {
                debug!("decoder input ended early: {}", e);
            }
        });

        debug!("decoding {:?} through ffmpeg (pid {:?})", format, child.id());
        Ok(Box::new(TranscodedStream::new(child, stdout).with_feeder(feeder)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_the_demuxer_and_writes_pcm() {
        let args = decode_args(AudioFormat::Mp3);
        assert_eq!(args[3..5], ["-f", "mp3"]);
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "pipe:0");
        assert!(args.ends_with(&["-vn".to_string(), "pipe:1".to_string()]));
        assert!(args.windows(2).any(|w| w == ["-ar", "48000"]));
    }

    #[test]
    fn unknown_formats_are_probed() {
        let args = decode_args(AudioFormat::Unknown);
        assert_eq!(args[3], "-i");
    }
}
