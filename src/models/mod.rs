pub mod game_session;
pub mod player;
