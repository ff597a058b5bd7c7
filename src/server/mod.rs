pub mod app_state;
pub mod session_manager;

pub use app_state::{AppState, now_ms};
pub use session_manager::Session;
