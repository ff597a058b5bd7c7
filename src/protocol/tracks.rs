use std::io::{Cursor, Read};

use base64::prelude::*;
use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

/// Bit 30 of the message header: a version byte follows.
const TRACK_INFO_VERSIONED: u32 = 1;
const TRACK_INFO_VERSION: u8 = 3;

/// A playable track: the opaque encoded form plus its decoded metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Base64-encoded track data.
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default = "default_json_object")]
    pub plugin_info: serde_json::Value,
    /// Opaque client data, echoed back in every event about this track.
    #[serde(default = "default_json_object")]
    pub user_data: serde_json::Value,
}

fn default_json_object() -> serde_json::Value {
    serde_json::json!({})
}

impl Track {
    /// Create a new Track from info and encode it.
    pub fn new(info: TrackInfo) -> Self {
        let encoded = encode_info(&info);
        Self {
            encoded,
            info,
            plugin_info: default_json_object(),
            user_data: default_json_object(),
        }
    }

    pub fn with_user_data(mut self, user_data: Option<serde_json::Value>) -> Self {
        if let Some(data) = user_data {
            self.user_data = data;
        }
        self
    }

    /// Re-encodes the current info.
    pub fn encode(&self) -> String {
        encode_info(&self.info)
    }

    /// Decode a track from its base64 form.
    ///
    /// Supports message versions 1 to 3:
    ///   [u32 header: payload size | flags << 30]
    ///   [u8 version]        -- only when flags & 1
    ///   [utf title] [utf author] [u64 length] [utf identifier] [u8 is_stream]
    ///   [opt_utf uri]       -- v2+
    ///   [opt_utf artwork]   -- v3+
    ///   [opt_utf isrc]      -- v3+
    ///   [utf source_name] [u64 position]
    pub fn decode(encoded: &str) -> Option<Self> {
        let data = BASE64_STANDARD.decode(encoded).ok()?;
        if data.len() < 4 {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let header = cursor.read_u32::<BigEndian>().ok()?;
        let flags = (header >> 30) & 0x03;

        let version = if flags & TRACK_INFO_VERSIONED != 0 {
            cursor.read_u8().ok()?
        } else {
            1
        };
        if version > TRACK_INFO_VERSION {
            return None;
        }

        let title = read_utf(&mut cursor)?;
        let author = read_utf(&mut cursor)?;
        let length = cursor.read_u64::<BigEndian>().ok()?;
        let identifier = read_utf(&mut cursor)?;
        let is_stream = cursor.read_u8().ok()? != 0;

        let uri = if version >= 2 {
            read_opt_utf(&mut cursor)?
        } else {
            None
        };
        let (artwork_url, isrc) = if version >= 3 {
            (read_opt_utf(&mut cursor)?, read_opt_utf(&mut cursor)?)
        } else {
            (None, None)
        };

        let source_name = read_utf(&mut cursor)?;
        let position = cursor.read_u64::<BigEndian>().unwrap_or(0);

        Some(Self {
            encoded: encoded.to_string(),
            info: TrackInfo {
                identifier,
                is_seekable: !is_stream,
                author,
                length,
                is_stream,
                position,
                title,
                uri,
                artwork_url,
                isrc,
                source_name,
            },
            plugin_info: default_json_object(),
            user_data: default_json_object(),
        })
    }
}

fn encode_info(info: &TrackInfo) -> String {
    let mut body = vec![TRACK_INFO_VERSION];

    write_utf(&mut body, &info.title);
    write_utf(&mut body, &info.author);
    body.extend_from_slice(&info.length.to_be_bytes());
    write_utf(&mut body, &info.identifier);
    body.push(u8::from(info.is_stream));
    write_opt_utf(&mut body, info.uri.as_deref());
    write_opt_utf(&mut body, info.artwork_url.as_deref());
    write_opt_utf(&mut body, info.isrc.as_deref());
    write_utf(&mut body, &info.source_name);
    body.extend_from_slice(&info.position.to_be_bytes());

    let header = (body.len() as u32 & 0x3FFF_FFFF) | (TRACK_INFO_VERSIONED << 30);
    let mut out = Vec::with_capacity(body.len() + 4);
    out.extend_from_slice(&header.to_be_bytes());
    out.extend_from_slice(&body);

    BASE64_STANDARD.encode(&out)
}

fn write_utf(w: &mut Vec<u8>, s: &str) {
    // modified UTF-8 length prefix is a u16; longer strings are cut at a char boundary
    let mut end = s.len().min(u16::MAX as usize);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    w.extend_from_slice(&(end as u16).to_be_bytes());
    w.extend_from_slice(&s.as_bytes()[..end]);
}

fn write_opt_utf(w: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            w.push(1);
            write_utf(w, s);
        }
        None => w.push(0),
    }
}

fn read_utf<R: Read>(r: &mut R) -> Option<String> {
    let len = r.read_u16::<BigEndian>().ok()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).ok()?;
    String::from_utf8(buf).ok()
}

/// Outer `None` means the buffer was truncated.
fn read_opt_utf<R: Read>(r: &mut R) -> Option<Option<String>> {
    let present = r.read_u8().ok()? != 0;
    if present { read_utf(r).map(Some) } else { Some(None) }
}

/// Metadata for an audio track.
///
/// Immutable once produced, except `position`, which search resolvers use to
/// rank results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Duration in milliseconds. 0 for live streams.
    pub length: u64,
    pub is_stream: bool,
    pub position: u64,
    pub title: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub source_name: String,
}
