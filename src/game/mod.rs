pub mod bank;
pub mod players;
pub mod resources;
pub mod state;

pub use bank::Bank;
pub use players::{MAX_CITIES, MAX_ROADS, MAX_SETTLEMENTS, PlayerState};
pub use resources::{
    COST_CITY, COST_DEVELOPMENT, COST_ROAD, COST_SETTLEMENT, ResourceError, ResourceSet, cost_of,
    cost_times,
};
pub use state::{
    GameConfig, GameError, GamePhase, GameState, PieceKey, RoadPath, Structure, TempPlacement,
};
