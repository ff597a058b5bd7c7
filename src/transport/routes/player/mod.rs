pub mod destroy;
pub mod get;
pub mod update;

pub use destroy::destroy_player;
pub use get::{get_player, get_players};
pub use update::update_player;
