//! Filter pipeline backed by an external `ffmpeg` process.
//!
//! The source is read by ffmpeg itself (seeking with `-ss`), run through an
//! `-af` chain built from the filter config and written to stdout as raw
//! 48 kHz stereo s16le.

use std::{
    f32::consts::PI,
    pin::Pin,
    process::Stdio,
    task::{Context, Poll},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, ReadBuf},
    process::{Child, ChildStdout, Command},
    task::JoinHandle,
};
use tracing::{debug, warn};

use super::{FilterPipeline, FilterRequest, clamp, disabled_filters};
use crate::{
    audio::AudioResource,
    common::{AudioFormat, PlaybackError},
    configs::FiltersConfig,
    player::state::Filters,
};

/// Centre frequencies of the 15 equalizer bands.
pub const EQ_FREQUENCIES: [u32; 15] = [
    25, 40, 63, 100, 160, 250, 400, 630, 1000, 1600, 2500, 4000, 6300, 10000, 16000,
];

const SAMPLE_RATE: u32 = 48_000;

pub struct FfmpegPipeline {
    config: FiltersConfig,
    user_agent: String,
}

impl FfmpegPipeline {
    pub fn new(config: FiltersConfig, user_agent: impl Into<String>) -> Self {
        Self {
            config,
            user_agent: user_agent.into(),
        }
    }

    /// Command line for `request`, without the program name.
    pub fn args(&self, request: &FilterRequest) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
            .into_iter()
            .map(String::from)
            .collect();

        if matches!(request.protocol.as_str(), "http" | "https") {
            args.push("-user_agent".into());
            args.push(self.user_agent.clone());
            if let Some(headers) = request
                .additional_data
                .get("headers")
                .and_then(|h| h.as_object())
            {
                let joined: String = headers
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| format!("{k}: {v}\r\n")))
                    .collect();
                if !joined.is_empty() {
                    args.push("-headers".into());
                    args.push(joined);
                }
            }
        }

        if let Some(seek) = request.seek_ms.filter(|ms| *ms > 0) {
            args.push("-ss".into());
            args.push(seconds(seek));
        }
        if let Some(end) = request.end_time_ms {
            args.push("-to".into());
            args.push(seconds(end));
        }

        args.push("-i".into());
        args.push(request.url.clone());

        let chain = filter_chain(&request.filters);
        if !chain.is_empty() {
            args.push("-af".into());
            args.push(chain.join(","));
        }

        for arg in [
            "-f",
            "s16le",
            "-ar",
            "48000",
            "-ac",
            "2",
            "-vn",
            "pipe:1",
        ] {
            args.push(arg.into());
        }
        args
    }
}

#[async_trait]
impl FilterPipeline for FfmpegPipeline {
    fn configure(&self, mut filters: Filters) -> Filters {
        let dropped = disabled_filters(&filters, &self.config);
        if !dropped.is_empty() {
            debug!("Ignoring disabled filters: {}", dropped.join(", "));
            filters.retain(|name| !dropped.iter().any(|d| *d == name));
        }
        clamp(filters)
    }

    async fn build(&self, request: FilterRequest) -> Result<AudioResource, PlaybackError> {
        if request.url.is_empty() {
            return Err(PlaybackError::build(
                "No source to apply filters to",
                "FilterError: missing url",
            ));
        }

        let args = self.args(&request);
        debug!(
            "[{}] spawning {} for '{}' (replacing transcoder {:?})",
            request.guild_id, self.config.ffmpeg_path, request.info.title, request.transcoder
        );

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                warn!("[{}] failed to spawn ffmpeg: {}", request.guild_id, e);
                PlaybackError::build(format!("Failed to start ffmpeg: {e}"), format!("FilterError: {e}"))
            })?;

        let pid = child.id();
        let Some(stdout) = child.stdout.take() else {
            return Err(PlaybackError::build(
                "ffmpeg has no output pipe",
                "FilterError: stdout unavailable",
            ));
        };

        let stream = TranscodedStream::new(child, stdout);
        Ok(AudioResource::new(Box::new(stream), AudioFormat::Pcm).with_transcoder(pid))
    }
}

/// Output of a running transcoder. Dropping it kills the process and stops
/// whatever feeds its stdin.
pub(crate) struct TranscodedStream {
    _child: Child,
    stdout: ChildStdout,
    feeder: Option<JoinHandle<()>>,
}

impl TranscodedStream {
    pub(crate) fn new(child: Child, stdout: ChildStdout) -> Self {
        Self {
            _child: child,
            stdout,
            feeder: None,
        }
    }

    pub(crate) fn with_feeder(mut self, feeder: JoinHandle<()>) -> Self {
        self.feeder = Some(feeder);
        self
    }
}

impl Drop for TranscodedStream {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

impl AsyncRead for TranscodedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

fn seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Builds the `-af` filter list, in the order the effects are applied.
pub fn filter_chain(filters: &Filters) -> Vec<String> {
    let mut chain = Vec::new();

    if let Some(volume) = filters.volume {
        chain.push(format!("volume={volume}"));
    }

    if let Some(bands) = &filters.equalizer {
        for band in bands.iter().filter(|b| b.gain != 0.0) {
            let Some(freq) = EQ_FREQUENCIES.get(usize::from(band.band)) else {
                continue;
            };
            let gain_db = 20.0 * (1.0 + band.gain).max(0.01).log10();
            chain.push(format!(
                "equalizer=f={freq}:width_type=o:width=1:g={gain_db:.2}"
            ));
        }
    }

    if let Some(ts) = &filters.timescale {
        let speed = ts.speed.unwrap_or(1.0);
        let pitch = ts.pitch.unwrap_or(1.0);
        let rate = ts.rate.unwrap_or(1.0);
        if pitch * rate != 1.0 {
            chain.push(format!(
                "asetrate={:.0},aresample={SAMPLE_RATE}",
                f64::from(SAMPLE_RATE) * pitch * rate
            ));
        }
        let tempo = speed / pitch;
        if tempo != 1.0 {
            chain.push(format!("atempo={:.4}", tempo.clamp(0.5, 100.0)));
        }
    }

    if let Some(tremolo) = &filters.tremolo {
        chain.push(format!(
            "tremolo=f={}:d={}",
            tremolo.frequency.unwrap_or(2.0),
            tremolo.depth.unwrap_or(0.5)
        ));
    }

    if let Some(vibrato) = &filters.vibrato {
        chain.push(format!(
            "vibrato=f={}:d={}",
            vibrato.frequency.unwrap_or(2.0),
            vibrato.depth.unwrap_or(0.5)
        ));
    }

    if let Some(hz) = filters
        .rotation
        .as_ref()
        .and_then(|r| r.rotation_hz)
        .filter(|hz| *hz > 0.0)
    {
        chain.push(format!("apulsator=hz={hz}"));
    }

    if let Some(smoothing) = filters
        .low_pass
        .as_ref()
        .and_then(|l| l.smoothing)
        .filter(|s| *s > 1.0)
    {
        let cutoff = SAMPLE_RATE as f32 / (2.0 * PI * smoothing);
        chain.push(format!("lowpass=f={cutoff:.0}"));
    }

    if let Some(high_pass) = &filters.high_pass {
        if let Some(cutoff) = high_pass.cutoff_frequency {
            chain.push(format!("highpass=f={cutoff}"));
        }
        if let Some(boost) = high_pass.boost_factor.filter(|b| *b != 1.0) {
            chain.push(format!("volume={boost}"));
        }
    }

    if let Some(echo) = &filters.echo {
        let delay_ms = (echo.echo_length.unwrap_or(1.0) * 1000.0).max(1.0);
        chain.push(format!(
            "aecho=0.8:0.88:{delay_ms:.0}:{}",
            echo.decay.unwrap_or(0.5)
        ));
    }

    if let Some(mix) = &filters.channel_mix {
        chain.push(format!(
            "pan=stereo|c0={}*c0+{}*c1|c1={}*c0+{}*c1",
            mix.left_to_left.unwrap_or(1.0),
            mix.right_to_left.unwrap_or(0.0),
            mix.left_to_right.unwrap_or(0.0),
            mix.right_to_right.unwrap_or(1.0),
        ));
    }

    chain
}
