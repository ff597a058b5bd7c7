use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FiltersConfig {
    /// Global switch. When off, filter updates are ignored.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_true")]
    pub volume: bool,
    #[serde(default = "default_true")]
    pub equalizer: bool,
    #[serde(default = "default_true")]
    pub timescale: bool,
    #[serde(default = "default_true")]
    pub tremolo: bool,
    #[serde(default = "default_true")]
    pub vibrato: bool,
    #[serde(default = "default_true")]
    pub rotation: bool,
    #[serde(default = "default_true")]
    pub channel_mix: bool,
    #[serde(default = "default_true")]
    pub low_pass: bool,
    #[serde(default = "default_true")]
    pub high_pass: bool,
    #[serde(default = "default_true")]
    pub echo: bool,
}

fn default_true() -> bool {
    true
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffmpeg_path: default_ffmpeg_path(),
            volume: true,
            equalizer: true,
            timescale: true,
            tremolo: true,
            vibrato: true,
            rotation: true,
            channel_mix: true,
            low_pass: true,
            high_pass: true,
            echo: true,
        }
    }
}

impl FiltersConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        if !self.enabled {
            return false;
        }
        match name {
            "volume" => self.volume,
            "equalizer" => self.equalizer,
            "timescale" => self.timescale,
            "tremolo" => self.tremolo,
            "vibrato" => self.vibrato,
            "rotation" => self.rotation,
            "channel_mix" | "channelMix" => self.channel_mix,
            "low_pass" | "lowPass" => self.low_pass,
            "high_pass" | "highPass" => self.high_pass,
            "echo" => self.echo,
            _ => false,
        }
    }
}
