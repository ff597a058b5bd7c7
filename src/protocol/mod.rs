pub mod events;
pub mod info;
pub mod opcodes;
pub mod stats;
pub mod tracks;

pub use events::*;
pub use info::*;
pub use opcodes::IncomingMessage;
pub use stats::*;
pub use tracks::{Track, TrackInfo};
