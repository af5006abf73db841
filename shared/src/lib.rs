pub mod game_modes;
pub mod protocol;
pub mod types;
