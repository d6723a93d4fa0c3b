//! Chooses what to build next.
//!
//! Two strategies fill the [`BuildPlan`]: [`FastStrategy`] ranks pieces by
//! production speedup and time to build, [`SmartStrategy`] places each candidate
//! speculatively and scores the change in everybody's win-game ETA.

mod fast;
pub mod placement;
mod plan;
pub mod scoring;
mod smart;
pub mod tactics;

use tracing::debug;

use crate::config::{RobotParameters, Strategy};
use crate::game::{COST_CITY, COST_DEVELOPMENT, COST_ROAD, COST_SETTLEMENT, GameState};
use crate::tracker::{
    PossibleCard, PossibleCity, PossiblePiece, PossibleRoad, PossibleSettlement, TrackerSet,
};

pub use fast::FastStrategy;
pub use plan::BuildPlan;
pub use smart::SmartStrategy;

/// A way of turning the trackers into a build plan.
pub trait DecisionStrategy {
    fn name(&self) -> &'static str;

    fn plan(
        &self,
        dm: &mut DecisionMaker,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        plan: &mut BuildPlan,
    );
}

#[derive(Debug, Clone)]
pub struct DecisionMaker {
    player: usize,
    params: RobotParameters,
    favorite_road: Option<PossibleRoad>,
    favorite_settlement: Option<PossibleSettlement>,
    favorite_city: Option<PossibleCity>,
    possible_card: Option<PossibleCard>,
    threatened_roads: Vec<PossibleRoad>,
    good_roads: Vec<PossibleRoad>,
    threatened_settlements: Vec<PossibleSettlement>,
    good_settlements: Vec<PossibleSettlement>,
}

impl DecisionMaker {
    pub fn new(player: usize, params: RobotParameters) -> Self {
        Self {
            player,
            params,
            favorite_road: None,
            favorite_settlement: None,
            favorite_city: None,
            possible_card: None,
            threatened_roads: Vec::new(),
            good_roads: Vec::new(),
            threatened_settlements: Vec::new(),
            good_settlements: Vec::new(),
        }
    }

    pub fn player(&self) -> usize {
        self.player
    }

    pub fn params(&self) -> &RobotParameters {
        &self.params
    }

    pub fn favorite_road(&self) -> Option<&PossibleRoad> {
        self.favorite_road.as_ref()
    }

    pub fn favorite_settlement(&self) -> Option<&PossibleSettlement> {
        self.favorite_settlement.as_ref()
    }

    pub fn favorite_city(&self) -> Option<&PossibleCity> {
        self.favorite_city.as_ref()
    }

    pub fn possible_card(&self) -> Option<&PossibleCard> {
        self.possible_card.as_ref()
    }

    /// Scored settlements split by whether somebody else races us for them.
    pub fn scored_settlements(&self) -> (&[PossibleSettlement], &[PossibleSettlement]) {
        (&self.threatened_settlements, &self.good_settlements)
    }

    pub fn scored_roads(&self) -> (&[PossibleRoad], &[PossibleRoad]) {
        (&self.threatened_roads, &self.good_roads)
    }

    fn strategy(&self) -> &'static dyn DecisionStrategy {
        match self.params.strategy {
            Strategy::Smart => &SmartStrategy,
            Strategy::Fast => &FastStrategy,
        }
    }

    fn clear(&mut self) {
        self.favorite_road = None;
        self.favorite_settlement = None;
        self.favorite_city = None;
        self.possible_card = None;
        self.threatened_roads.clear();
        self.good_roads.clear();
        self.threatened_settlements.clear();
        self.good_settlements.clear();
    }

    /// Replaces `plan` with a fresh one for the current position.
    ///
    /// `state` is borrowed mutably for speculative placements only; it is
    /// unchanged when this returns.
    pub fn plan_stuff(&mut self, state: &mut GameState, trackers: &mut TrackerSet, plan: &mut BuildPlan) {
        self.clear();
        plan.reset();
        let strategy = self.strategy();
        strategy.plan(self, state, trackers, plan);
        if plan.is_empty() {
            self.plan_affordable(state, trackers, plan);
        }
        debug!(
            player = self.player,
            strategy = strategy.name(),
            len = plan.len(),
            current = ?plan.current().map(PossiblePiece::piece_type),
            "build plan"
        );
    }

    /// Something we can pay for right now, so a full hand is never left idle.
    fn plan_affordable(&self, state: &GameState, trackers: &TrackerSet, plan: &mut BuildPlan) {
        let owner = &state.players[self.player];
        let hand = &owner.resources;
        let ours = trackers.get(self.player);

        if owner.cities_left() > 0 && hand.contains(&COST_CITY) {
            let best = ours
                .possible_cities()
                .values()
                .max_by_key(|city| city.speedup_total());
            if let Some(city) = best {
                plan.push(PossiblePiece::City(city.clone()));
                return;
            }
        }
        if owner.settlements_left() > 0 && hand.contains(&COST_SETTLEMENT) {
            let best = ours
                .possible_settlements()
                .values()
                .filter(|settlement| settlement.is_buildable_now())
                .max_by_key(|settlement| settlement.speedup_total());
            if let Some(settlement) = best {
                plan.push(PossiblePiece::Settlement(settlement.clone()));
                return;
            }
        }
        if owner.roads_left() > 0 && hand.contains(&COST_ROAD) {
            if let Some(road) = ours.possible_roads().values().find(|road| road.is_buildable_now()) {
                plan.push(PossiblePiece::Road(road.clone()));
                return;
            }
        }
        if state.dev_deck_len() > 0 && hand.contains(&COST_DEVELOPMENT) {
            plan.push(PossiblePiece::Card(PossibleCard {
                player: self.player,
                eta: 0,
                score: 0.0,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ResourceSet;
    use crate::testing::{new_state, trail, trail_nodes};

    #[test]
    fn a_full_hand_always_yields_a_plan() {
        for params in [RobotParameters::default(), RobotParameters::fast()] {
            let mut state = new_state(23);
            let edges = trail(&state, 2);
            let nodes = trail_nodes(&edges);
            state.build_settlement(0, nodes[0], true).expect("settlement");
            state.build_road(0, edges[0], true).expect("road");
            state.start_play();
            state.players[0].resources = ResourceSet::from_counts([4, 4, 4, 4, 4]);
            let mut trackers = TrackerSet::new(&state, 0, params.max_game_length);
            let mut dm = DecisionMaker::new(0, params);
            let mut plan = BuildPlan::new();
            dm.plan_stuff(&mut state, &mut trackers, &mut plan);
            assert!(!plan.is_empty());
        }
    }

    #[test]
    fn planning_leaves_the_board_as_it_was() {
        let mut state = new_state(23);
        let edges = trail(&state, 2);
        let nodes = trail_nodes(&edges);
        state.build_settlement(0, nodes[0], true).expect("settlement");
        state.build_road(0, edges[0], true).expect("road");
        state.start_play();
        let occupancy = state.node_occupancy.clone();
        let roads = state.road_occupancy.clone();
        let mut trackers = TrackerSet::new(&state, 0, 300);
        let mut dm = DecisionMaker::new(0, RobotParameters::default());
        dm.plan_stuff(&mut state, &mut trackers, &mut BuildPlan::new());
        assert_eq!(state.node_occupancy, occupancy);
        assert_eq!(state.road_occupancy, roads);
        assert_eq!(trackers, TrackerSet::new(&state, 0, 300));
    }
}
