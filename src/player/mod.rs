//! Per-guild playback state machine.
//!
//! Each guild gets one actor task owning a [`PlayerContext`]. Commands
//! arrive through a [`PlayerHandle`], transport events through the voice
//! session's channel, and both are processed strictly one at a time.

pub mod context;
pub mod handle;
pub mod manager;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use context::{PlaybackCache, PlayerContext, PlayerServices};
pub use handle::{Pending, PlayerCommand, PlayerHandle, PlayerRegistry};
pub use state::*;
