pub mod player;
pub mod stats;
