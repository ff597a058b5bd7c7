pub mod ffmpeg;

use async_trait::async_trait;

pub use ffmpeg::FfmpegPipeline;

use crate::{
    audio::AudioResource,
    common::{GuildId, PlaybackError},
    configs::FiltersConfig,
    player::state::Filters,
    protocol::tracks::TrackInfo,
};

/// Everything needed to (re)build a filtered stream for one track.
#[derive(Debug, Clone)]
pub struct FilterRequest {
    pub guild_id: GuildId,
    pub info: TrackInfo,
    pub filters: Filters,
    pub protocol: String,
    pub url: String,
    /// Start offset, used when filters change mid-track.
    pub seek_ms: Option<u64>,
    pub end_time_ms: Option<u64>,
    /// Transcoder of the resource being replaced, if any.
    pub transcoder: Option<u32>,
    pub additional_data: serde_json::Value,
}

/// Turns a track plus a filter config into a re-encoded playable resource.
#[async_trait]
pub trait FilterPipeline: Send + Sync {
    /// Normalizes a requested config: drops filters this node does not
    /// allow and clamps parameters into their valid ranges.
    fn configure(&self, filters: Filters) -> Filters;

    async fn build(&self, request: FilterRequest) -> Result<AudioResource, PlaybackError>;
}

/// Returns the requested filters the server configuration does not allow.
pub fn disabled_filters(filters: &Filters, config: &FiltersConfig) -> Vec<&'static str> {
    filters
        .active_names()
        .into_iter()
        .filter(|name| !config.is_enabled(name))
        .collect()
}

/// Clamps every filter parameter into the range the effect accepts.
pub fn clamp(mut filters: Filters) -> Filters {
    if let Some(volume) = filters.volume.as_mut() {
        *volume = volume.clamp(0.0, 5.0);
    }
    if let Some(bands) = filters.equalizer.as_mut() {
        bands.retain(|b| usize::from(b.band) < ffmpeg::EQ_FREQUENCIES.len());
        for band in bands.iter_mut() {
            band.gain = band.gain.clamp(-0.25, 1.0);
        }
    }
    if let Some(ts) = filters.timescale.as_mut() {
        for value in [&mut ts.speed, &mut ts.pitch, &mut ts.rate] {
            if let Some(v) = value.as_mut() {
                *v = v.clamp(0.1, 10.0);
            }
        }
    }
    if let Some(tremolo) = filters.tremolo.as_mut() {
        tremolo.frequency = tremolo.frequency.map(|f| f.clamp(0.1, 20_000.0));
        tremolo.depth = tremolo.depth.map(|d| d.clamp(0.0, 1.0));
    }
    if let Some(vibrato) = filters.vibrato.as_mut() {
        vibrato.frequency = vibrato.frequency.map(|f| f.clamp(0.1, 14.0));
        vibrato.depth = vibrato.depth.map(|d| d.clamp(0.0, 1.0));
    }
    if let Some(rotation) = filters.rotation.as_mut() {
        rotation.rotation_hz = rotation.rotation_hz.map(|hz| hz.clamp(0.0, 100.0));
    }
    if let Some(low_pass) = filters.low_pass.as_mut() {
        low_pass.smoothing = low_pass.smoothing.map(|s| s.max(1.0));
    }
    if let Some(high_pass) = filters.high_pass.as_mut() {
        high_pass.cutoff_frequency = high_pass.cutoff_frequency.map(|f| f.clamp(1, 24_000));
        high_pass.boost_factor = high_pass.boost_factor.map(|b| b.clamp(0.0, 5.0));
    }
    if let Some(echo) = filters.echo.as_mut() {
        echo.echo_length = echo.echo_length.map(|l| l.clamp(0.0, 10.0));
        echo.decay = echo.decay.map(|d| d.clamp(0.0, 1.0));
    }
    if let Some(mix) = filters.channel_mix.as_mut() {
        for value in [
            &mut mix.left_to_left,
            &mut mix.left_to_right,
            &mut mix.right_to_left,
            &mut mix.right_to_right,
        ] {
            if let Some(v) = value.as_mut() {
                *v = v.clamp(0.0, 1.0);
            }
        }
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::state::{EqBand, TimescaleFilter};

    #[test]
    fn reports_filters_disabled_by_config() {
        let config = FiltersConfig {
            echo: false,
            ..Default::default()
        };
        let filters: Filters =
            serde_json::from_str(r#"{"volume":1.0,"echo":{"echoLength":1.0,"decay":0.5}}"#).unwrap();
        assert_eq!(disabled_filters(&filters, &config), vec!["echo"]);

        let off = FiltersConfig {
            enabled: false,
            ..Default::default()
        };
        assert_eq!(disabled_filters(&filters, &off), vec!["volume", "echo"]);
    }

    #[test]
    fn clamps_out_of_range_parameters() {
        let filters = clamp(Filters {
            volume: Some(9.0),
            equalizer: Some(vec![
                EqBand { band: 0, gain: 3.0 },
                EqBand { band: 40, gain: 0.1 },
            ]),
            timescale: Some(TimescaleFilter {
                speed: Some(0.0),
                pitch: None,
                rate: Some(1.5),
            }),
            ..Default::default()
        });

        assert_eq!(filters.volume, Some(5.0));
        assert_eq!(filters.equalizer, Some(vec![EqBand { band: 0, gain: 1.0 }]));
        let ts = filters.timescale.unwrap();
        assert_eq!(ts.speed, Some(0.1));
        assert_eq!(ts.rate, Some(1.5));
    }
}
