//! One robot seat: trackers, planner and negotiator behind a single call surface.
//!
//! The harness owns the authoritative [`GameState`]; the brain reads it, plans
//! against it with bracketed speculation and hands back actions for the
//! harness to apply.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::board::{EdgeId, NodeId, TileId};
use crate::config::RobotParameters;
use crate::decision::{BuildPlan, DecisionMaker, placement, tactics};
use crate::game::{GameState, PieceKey, ResourceSet};
use crate::negotiator::{NegotiationStrategy, Negotiator, OfferResponse, TradeOffer};
use crate::tracker::{PossiblePiece, TrackerSet};
use crate::types::{DevelopmentCard, Resource};

#[derive(Debug, Clone)]
pub struct RobotBrain {
    player: usize,
    params: RobotParameters,
    trackers: TrackerSet,
    decision_maker: DecisionMaker,
    negotiator: Negotiator,
    plan: BuildPlan,
    rng: StdRng,
}

impl RobotBrain {
    pub fn new(state: &GameState, player: usize, params: RobotParameters, seed: u64) -> Self {
        Self {
            player,
            trackers: TrackerSet::new(state, player, params.max_game_length),
            decision_maker: DecisionMaker::new(player, params.clone()),
            negotiator: Negotiator::new(player, state.num_players(), params.clone()),
            plan: BuildPlan::new(),
            rng: StdRng::seed_from_u64(seed ^ (player as u64).wrapping_mul(0x9e37_79b9)),
            params,
        }
    }

    pub fn player(&self) -> usize {
        self.player
    }

    pub fn params(&self) -> &RobotParameters {
        &self.params
    }

    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    pub fn trackers(&self) -> &TrackerSet {
        &self.trackers
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    fn sync(&mut self, state: &GameState) {
        self.trackers.refresh_all(state);
        self.trackers.update_win_game_etas();
    }

    fn can_play(&self, state: &GameState, card: DevelopmentCard) -> bool {
        state.players[self.player].can_play_dev_card(card)
    }

    /// Whether `piece` is still legal and paid for right now.
    fn buildable(&self, state: &GameState, piece: &PossiblePiece) -> bool {
        if !state.players[self.player].resources.contains(&piece.cost()) {
            return false;
        }
        match piece.key() {
            Some(PieceKey::Road(edge)) => state.is_legal_road(self.player, edge),
            Some(PieceKey::Settlement(node)) => state.is_legal_settlement(self.player, node, true),
            Some(PieceKey::City(node)) => state.is_legal_city(self.player, node),
            None => state.dev_deck_len() > 0,
        }
    }
}

// events
impl RobotBrain {
    /// Somebody's piece landed on the board.
    pub fn on_piece_placed(&mut self, state: &GameState, player: usize, piece: PieceKey) {
        match piece {
            PieceKey::Road(edge) => self.trackers.add_new_road(state, player, edge),
            PieceKey::Settlement(node) => self.trackers.add_new_settlement(state, player, node),
            PieceKey::City(node) => self.trackers.add_new_city(state, player, node),
        }
        self.trackers.update_win_game_etas();

        let stale = self
            .plan
            .iter()
            .filter_map(PossiblePiece::key)
            .any(|key| key == piece && player != self.player);
        if stale {
            debug!(player = self.player, taken_by = player, ?piece, "plan invalidated");
            self.plan.reset();
        }
    }

    /// The rules engine refused one of our pieces; `state` no longer holds it.
    pub fn on_piece_rejected(&mut self, state: &GameState, piece: PieceKey) {
        let player = self.player;
        match piece {
            PieceKey::Road(edge) => self.trackers.cancel_wrong_road(state, player, edge),
            PieceKey::Settlement(node) => self.trackers.cancel_wrong_settlement(state, player, node),
            PieceKey::City(node) => self.trackers.cancel_wrong_city(state, player, node),
        }
        self.trackers.update_win_game_etas();
        self.plan.reset();
        debug!(player, ?piece, "piece rejected");
    }

    /// Forgets last turn's trading and refreshes the trackers.
    pub fn on_turn_start(&mut self, state: &GameState) {
        let beliefs = self.negotiator.beliefs_mut();
        beliefs.reset_offers_made();
        beliefs.reset_target_pieces();
        beliefs.reset_is_selling(state);
        beliefs.reset_wants_another_offer();
        self.sync(state);
    }

    pub fn on_offer_rejected(&mut self, rejector: usize, offer: &TradeOffer) {
        self.negotiator
            .beliefs_mut()
            .record_resources_from_reject(rejector, offer);
    }

    pub fn on_offer_unanswered(&mut self, offer: &TradeOffer) {
        self.negotiator
            .beliefs_mut()
            .record_resources_from_no_response(offer);
    }
}

// planning
impl RobotBrain {
    /// Replans from the current position.
    pub fn plan_stuff(&mut self, state: &mut GameState) -> &BuildPlan {
        self.sync(state);
        self.decision_maker
            .plan_stuff(state, &mut self.trackers, &mut self.plan);
        self.negotiator
            .beliefs_mut()
            .set_target_piece(self.player, &self.plan);
        &self.plan
    }

    /// The lead piece, taken off the plan, if it can be built right now.
    pub fn next_build(&mut self, state: &mut GameState) -> Option<PossiblePiece> {
        if self.plan.is_empty() {
            self.plan_stuff(state);
        }
        let lead = self.plan.current()?;
        if !self.buildable(state, lead) {
            trace!(player = self.player, piece = ?lead.piece_type(), "lead piece not buildable yet");
            return None;
        }
        self.plan.advance()
    }

    /// A free road for Road Building: the planned one if possible, else the best buildable one.
    pub fn choose_free_road(&mut self, state: &mut GameState) -> Option<EdgeId> {
        if self.plan.is_empty() {
            self.plan_stuff(state);
        }
        if let Some(PossiblePiece::Road(road)) = self.plan.current() {
            if state.is_legal_road(self.player, road.edge) {
                let edge = road.edge;
                self.plan.advance();
                return Some(edge);
            }
        }
        let best = self
            .trackers
            .ours()
            .possible_roads()
            .values()
            .filter(|road| road.is_buildable_now() && state.is_legal_road(self.player, road.edge))
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .map(|road| road.edge);
        best.or_else(|| {
            state
                .map
                .land_edges
                .iter()
                .copied()
                .find(|edge| state.is_legal_road(self.player, *edge))
        })
    }

    pub fn choose_initial_settlement(&mut self, state: &GameState) -> Option<NodeId> {
        let first = state.players[self.player].settlements.iter().next().copied();
        let node = match first {
            Some(first) => placement::plan_second_settlement(state, self.player, first),
            None => placement::plan_initial_settlements(state, self.player).map(|(node, _)| node),
        };
        debug!(player = self.player, ?node, "initial settlement");
        node
    }

    pub fn choose_initial_road(&mut self, state: &GameState, settlement: NodeId) -> Option<EdgeId> {
        placement::plan_initial_road(state, self.player, settlement).map(|(edge, _)| edge)
    }
}

// trading
impl RobotBrain {
    pub fn make_offer(&mut self, state: &mut GameState) -> Option<TradeOffer> {
        if !self.params.trading {
            return None;
        }
        if self.plan.is_empty() {
            self.plan_stuff(state);
        }
        self.negotiator
            .make_offer(state, &mut self.trackers, &self.plan, &mut self.rng)
    }

    pub fn offer_to_bank(&mut self, state: &mut GameState) -> Option<TradeOffer> {
        if self.plan.is_empty() {
            self.plan_stuff(state);
        }
        self.negotiator.offer_to_bank(state, &self.trackers, &self.plan)
    }

    /// Our answer to `offer`; a non-trading seat rejects everything.
    pub fn consider_offer(&mut self, state: &mut GameState, offer: &TradeOffer) -> OfferResponse {
        self.negotiator.beliefs_mut().record_resources_from_offer(offer);
        if !self.params.trading {
            return OfferResponse::Reject;
        }
        let response = self
            .negotiator
            .consider_offer(state, &mut self.trackers, offer, self.player);
        debug!(player = self.player, %offer, ?response, "answering offer");
        response
    }

    /// Fills in the blank side of `offer`; the completion comes back with `Complete`.
    pub fn handle_partial_offer(
        &mut self,
        state: &mut GameState,
        offer: &TradeOffer,
    ) -> (OfferResponse, Option<TradeOffer>) {
        self.negotiator.beliefs_mut().record_resources_from_offer(offer);
        if !self.params.trading {
            return (OfferResponse::Reject, None);
        }
        match self
            .negotiator
            .handle_partial_offer(state, &mut self.trackers, offer)
        {
            OfferResponse::Complete => (
                OfferResponse::Complete,
                self.negotiator.best_completed_offer().cloned(),
            ),
            response => (response, None),
        }
    }

    pub fn make_counter_offer(&mut self, state: &mut GameState, original: &TradeOffer) -> Option<TradeOffer> {
        if !self.params.trading {
            return None;
        }
        if self.plan.is_empty() {
            self.plan_stuff(state);
        }
        self.negotiator
            .make_counter_offer(state, &mut self.trackers, &self.plan, original)
    }
}

// robber, discards and cards
impl RobotBrain {
    pub fn choose_discards(&mut self, state: &GameState, count: u32) -> ResourceSet {
        tactics::choose_discards(state, &self.trackers, self.player, &self.plan, count, &mut self.rng)
    }

    pub fn choose_robber_hex(&mut self, state: &GameState) -> TileId {
        let victim = tactics::select_player_to_thwart(&self.trackers)
            .unwrap_or((self.player + 1) % state.num_players());
        tactics::select_robber_hex(state, self.player, victim, &mut self.rng)
    }

    pub fn choose_robber_victim(&self, choices: &[usize]) -> Option<usize> {
        tactics::choose_robber_victim(&self.trackers, choices)
    }

    pub fn choose_monopoly(&self, state: &GameState) -> Option<Resource> {
        tactics::choose_monopoly(state, self.player)
    }

    /// Two Year of Plenty picks toward the lead piece.
    pub fn choose_free_resources(&self, state: &GameState) -> ResourceSet {
        let target = self
            .plan
            .current()
            .map_or(ResourceSet::EMPTY, PossiblePiece::cost);
        tactics::choose_free_resources(state, &self.trackers, self.player, &target)
    }

    pub fn wants_knight(&self, state: &GameState) -> bool {
        self.can_play(state, DevelopmentCard::Knight)
            && (tactics::should_play_knight(state, self.player)
                || (self.trackers.ours().knights_to_buy().is_some_and(|n| n > 0)
                    && tactics::should_play_knight_for_la(state, self.player)))
    }

    /// Road Building pays off only when the plan leads with a road.
    pub fn wants_road_building(&self, state: &GameState) -> bool {
        self.can_play(state, DevelopmentCard::RoadBuilding)
            && matches!(self.plan.current(), Some(PossiblePiece::Road(_)))
            && tactics::should_play_road_building(state, self.player)
    }

    pub fn wants_discovery(&self, state: &GameState) -> bool {
        self.can_play(state, DevelopmentCard::YearOfPlenty)
            && tactics::should_play_discovery(state, self.player, &self.plan)
    }

    pub fn wants_monopoly(&self, state: &GameState) -> Option<Resource> {
        if !self.can_play(state, DevelopmentCard::Monopoly) {
            return None;
        }
        self.choose_monopoly(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::new_state;

    fn placed(seed: u64) -> (GameState, Vec<RobotBrain>) {
        let mut state = new_state(seed);
        let mut brains: Vec<RobotBrain> = (0..state.num_players())
            .map(|p| RobotBrain::new(&state, p, RobotParameters::default(), seed))
            .collect();
        for player in 0..state.num_players() {
            let node = brains[player]
                .choose_initial_settlement(&state)
                .expect("a spot");
            state.build_settlement(player, node, true).expect("settlement");
            let edge = brains[player]
                .choose_initial_road(&state, node)
                .expect("a road");
            state.build_road(player, edge, true).expect("road");
            for brain in &mut brains {
                brain.on_piece_placed(&state, player, PieceKey::Settlement(node));
                brain.on_piece_placed(&state, player, PieceKey::Road(edge));
            }
        }
        state.start_play();
        for brain in &mut brains {
            brain.on_turn_start(&state);
        }
        (state, brains)
    }

    #[test]
    fn initial_choices_are_legal() {
        let (state, _) = placed(3);
        for player in 0..state.num_players() {
            assert_eq!(state.players[player].settlements.len(), 1);
            assert_eq!(state.players[player].roads.len(), 1);
        }
    }

    #[test]
    fn planning_leaves_the_board_untouched() {
        let (mut state, mut brains) = placed(5);
        let before_nodes = state.node_occupancy.clone();
        let before_roads = state.road_occupancy.clone();
        brains[0].plan_stuff(&mut state);
        assert_eq!(state.node_occupancy, before_nodes);
        assert_eq!(state.road_occupancy, before_roads);
    }

    #[test]
    fn next_build_waits_for_resources() {
        let (mut state, mut brains) = placed(8);
        state.players[0].resources = ResourceSet::EMPTY;
        assert!(brains[0].next_build(&mut state).is_none());
    }

    #[test]
    fn affordable_hand_always_gets_a_plan() {
        let (mut state, mut brains) = placed(11);
        state.players[0].resources = ResourceSet::from_counts([4, 4, 4, 4, 4]);
        assert!(!brains[0].plan_stuff(&mut state).is_empty());
        if let Some(piece) = brains[0].next_build(&mut state) {
            assert!(state.players[0].resources.contains(&piece.cost()));
        }
    }

    #[test]
    fn non_trading_seats_stay_out_of_the_market() {
        let (mut state, _) = placed(13);
        let params = RobotParameters {
            trading: false,
            ..RobotParameters::default()
        };
        let mut brain = RobotBrain::new(&state, 1, params, 13);
        let offer = TradeOffer::new(
            0,
            [1],
            ResourceSet::single(Resource::Wood, 1),
            ResourceSet::single(Resource::Ore, 1),
        );
        assert_eq!(brain.consider_offer(&mut state, &offer), OfferResponse::Reject);
        assert!(brain.make_offer(&mut state).is_none());
    }

    #[test]
    fn rejection_clears_the_plan() {
        let (mut state, mut brains) = placed(17);
        brains[0].plan_stuff(&mut state);
        let node = *state.players[0].settlements.iter().next().expect("settlement");
        brains[0].on_piece_rejected(&state, PieceKey::City(node));
        assert!(brains[0].plan().is_empty());
    }
}
