pub mod base;
pub mod filters;
pub mod logging;
pub mod player;
pub mod server;
pub mod sources;

pub use base::*;
pub use filters::*;
pub use logging::*;
pub use player::*;
pub use server::*;
pub use sources::*;
