//! Complete games between robot brains, for the simulator and smoke tests.

mod game;
mod roster;
mod stats;

pub use game::{ArenaError, Match, MatchOutcome, TURNS_LIMIT};
pub use roster::{ROBOT_KINDS, RobotKind, RosterError, SeatSpec, parse_roster, parse_seat, print_robot_help};
pub use stats::{GameStats, SeatSummary, Summary};
