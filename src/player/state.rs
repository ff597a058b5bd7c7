use serde::{Deserialize, Serialize};

use crate::{common::types::GuildId, protocol::tracks::Track};

/// Accepts `null` (clear) or a string (set) for track fields, so an absent
/// field can still be told apart from an explicit `null`.
pub fn deserialize_track_encoded<'de, D>(deserializer: D) -> Result<Option<TrackEncoded>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: serde_json::Value = serde::Deserialize::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(Some(TrackEncoded::Clear)),
        serde_json::Value::String(s) => Ok(Some(TrackEncoded::Set(s))),
        _ => Err(serde::de::Error::custom("expected string or null")),
    }
}

/// Session config of one guild, as returned by REST endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub guild_id: GuildId,
    pub track: Option<Track>,
    pub volume: i32,
    pub paused: bool,
    /// Present only while a track is playing or paused.
    pub state: Option<PlayerState>,
    pub voice: VoiceState,
    pub filters: Filters,
}

impl Player {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            track: None,
            volume: 100,
            paused: false,
            state: None,
            voice: VoiceState::default(),
            filters: Filters::default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Players {
    pub players: Vec<Player>,
}

/// Playback telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Unix timestamp in milliseconds.
    pub time: u64,
    /// Real-time position in milliseconds, derived from delivered frames.
    pub position: u64,
    /// Whether the voice transport is connected.
    pub connected: bool,
    /// Voice round-trip estimate in milliseconds. -1 if unknown.
    pub ping: i64,
}

/// Voice credentials forwarded by the control client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub session_id: String,
}

impl VoiceState {
    pub fn is_complete(&self) -> bool {
        !self.token.is_empty() && !self.endpoint.is_empty() && !self.session_id.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndTime {
    Clear,    // JSON: null
    Set(u64), // JSON: number
}

impl EndTime {
    pub fn as_ms(self) -> Option<u64> {
        match self {
            Self::Clear => None,
            Self::Set(ms) => Some(ms),
        }
    }
}

/// Request body for PATCH /v4/sessions/{sessionId}/players/{guildId}.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    #[serde(default, deserialize_with = "deserialize_track_encoded")]
    pub encoded_track: Option<TrackEncoded>,
    #[serde(default)]
    pub track: Option<PlayerUpdateTrack>,
    #[serde(default)]
    pub end_time: Option<EndTime>,
    #[serde(default)]
    pub volume: Option<i32>,
    #[serde(default)]
    pub paused: Option<bool>,
    #[serde(default)]
    pub filters: Option<Filters>,
    #[serde(default)]
    pub voice: Option<VoiceState>,
}

impl PlayerUpdate {
    /// The track change requested by this update, if any. `track.encoded`
    /// wins over the legacy top-level `encodedTrack`.
    pub fn track_change(&self) -> Option<(TrackEncoded, Option<serde_json::Value>)> {
        if let Some(track) = &self.track {
            if let Some(encoded) = &track.encoded {
                return Some((encoded.clone(), track.user_data.clone()));
            }
        }
        self.encoded_track.clone().map(|encoded| (encoded, None))
    }
}

/// Track field in a player update request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdateTrack {
    /// Base64-encoded track. Null to stop. Omit to keep current.
    #[serde(default, deserialize_with = "deserialize_track_encoded")]
    pub encoded: Option<TrackEncoded>,
    /// User data to attach to the track.
    #[serde(default)]
    pub user_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrackEncoded {
    Clear,       // JSON: null
    Set(String), // JSON: string
}

macro_rules! define_filters {
    ($($field:ident : $type:ty => $name:expr),* $(,)?) => {
        /// Audio filters. Every `None` field is inactive.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct Filters {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$type>,
            )*
        }

        impl Filters {
            /// Get names of all supported filters in camelCase.
            pub fn names() -> Vec<String> {
                vec![
                    $($name.into()),*
                ]
            }

            /// Names of the filters set on this config.
            pub fn active_names(&self) -> Vec<&'static str> {
                let mut names = Vec::new();
                $(
                    if self.$field.is_some() {
                        names.push($name);
                    }
                )*
                names
            }

            /// Merge incoming partial filter update with existing state.
            pub fn merge_from(&mut self, incoming: Filters) {
                $(
                    if incoming.$field.is_some() {
                        self.$field = incoming.$field;
                    }
                )*
            }

            /// Drops every filter `keep` rejects, by camelCase name.
            pub fn retain(&mut self, keep: impl Fn(&str) -> bool) {
                $(
                    if !keep($name) {
                        self.$field = None;
                    }
                )*
            }

            /// Returns true if every filter field is `None`.
            pub fn is_all_none(&self) -> bool {
                $(
                    self.$field.is_none() &&
                )* true
            }
        }
    };
}

define_filters! {
    volume: f32 => "volume",
    equalizer: Vec<EqBand> => "equalizer",
    timescale: TimescaleFilter => "timescale",
    tremolo: TremoloFilter => "tremolo",
    vibrato: VibratoFilter => "vibrato",
    rotation: RotationFilter => "rotation",
    channel_mix: ChannelMixFilter => "channelMix",
    low_pass: LowPassFilter => "lowPass",
    high_pass: HighPassFilter => "highPass",
    echo: EchoFilter => "echo",
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    pub band: u8,
    pub gain: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimescaleFilter {
    pub speed: Option<f64>,
    pub pitch: Option<f64>,
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TremoloFilter {
    pub frequency: Option<f32>,
    pub depth: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VibratoFilter {
    pub frequency: Option<f32>,
    pub depth: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationFilter {
    pub rotation_hz: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMixFilter {
    pub left_to_left: Option<f32>,
    pub left_to_right: Option<f32>,
    pub right_to_left: Option<f32>,
    pub right_to_right: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowPassFilter {
    pub smoothing: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighPassFilter {
    pub cutoff_frequency: Option<i32>,
    pub boost_factor: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoFilter {
    pub echo_length: Option<f32>,
    pub decay: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_body_tells_null_from_absent() {
        let body: PlayerUpdate = serde_json::from_str(r#"{"encodedTrack": null}"#).unwrap();
        assert_eq!(body.track_change(), Some((TrackEncoded::Clear, None)));

        let body: PlayerUpdate = serde_json::from_str(r#"{"volume": 50}"#).unwrap();
        assert_eq!(body.track_change(), None);
        assert_eq!(body.volume, Some(50));
    }

    #[test]
    fn nested_track_wins_and_keeps_user_data() {
        let body: PlayerUpdate = serde_json::from_str(
            r#"{"encodedTrack":"old","track":{"encoded":"new","userData":{"requester":1}}}"#,
        )
        .unwrap();
        let (encoded, user_data) = body.track_change().unwrap();
        assert_eq!(encoded, TrackEncoded::Set("new".into()));
        assert_eq!(user_data.unwrap()["requester"], 1);
    }

    #[test]
    fn filters_merge_and_retain() {
        let mut filters: Filters =
            serde_json::from_str(r#"{"volume":0.8,"timescale":{"speed":1.2}}"#).unwrap();
        assert_eq!(filters.active_names(), vec!["volume", "timescale"]);

        filters.merge_from(Filters {
            echo: Some(EchoFilter {
                echo_length: Some(0.5),
                decay: Some(0.3),
            }),
            ..Default::default()
        });
        assert_eq!(filters.active_names(), vec!["volume", "timescale", "echo"]);

        filters.retain(|name| name != "timescale");
        assert!(filters.timescale.is_none());
        assert!(!filters.is_all_none());

        filters.retain(|_| false);
        assert!(filters.is_all_none());
    }

    #[test]
    fn idle_player_serializes_without_state() {
        let json = serde_json::to_value(Player::new("G1".into())).unwrap();
        assert_eq!(json["guildId"], "G1");
        assert_eq!(json["volume"], 100);
        assert!(json["state"].is_null());
        assert!(json["track"].is_null());
    }
}
