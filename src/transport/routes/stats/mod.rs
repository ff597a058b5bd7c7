pub mod info;
pub mod track;

pub use info::{get_info, get_metrics, get_stats, get_version};
pub use track::decode_track;
