mod commands;
mod connection;
mod error;
mod events;
mod filters;
mod monitor;
mod start;

pub use commands::{pause, stop, update_voice, volume};
pub use connection::wait_for_connection;
pub use error::send_load_failed;
pub use events::handle_voice_event;
pub use filters::apply_filters;
pub use monitor::spawn_player_updates;
pub use start::play;
