#![warn(clippy::all)]
#![deny(rust_2018_idioms)]

pub mod arena;
pub mod board;
pub mod brain;
pub mod config;
pub mod coords;
pub mod decision;
pub mod estimator;
pub mod game;
pub mod negotiator;
pub mod tracker;
pub mod types;

#[cfg(test)]
mod testing;

pub use board::{CatanMap, MapType};
pub use brain::RobotBrain;
pub use config::{RobotParameters, Strategy};
pub use game::{GameConfig, GameState};
pub use types::{Color, Resource};
