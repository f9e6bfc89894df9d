pub mod constants;
pub mod error;
pub mod game;
pub mod link;
pub mod maze;
pub mod maze_store;
pub mod occupant;
pub mod protocol;
pub mod rng;
pub mod session;
pub mod types;
