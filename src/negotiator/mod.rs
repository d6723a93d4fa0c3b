//! Trading with the other seats.
//!
//! Every trade is valued by how many rolls it saves toward the lead piece of
//! the build plan, against the best the bank or a harbor would do (the BATNA).
//! Offers are only made to players who are not about to win, and only when at
//! least one of them would, as far as we can tell, accept.

mod beliefs;
mod offer;
mod search;

use rand::Rng;
use tracing::{debug, trace};

use crate::config::RobotParameters;
use crate::decision::{BuildPlan, DecisionMaker};
use crate::game::{GameState, ResourceSet};
use crate::tracker::{PossiblePiece, TrackerSet};
use crate::types::Resource;

pub use beliefs::Beliefs;
pub use offer::{OfferResponse, PARTIAL_COMPLETIONS, TradeOffer};
pub use search::ETA_CUTOFF;

use search::{Appraiser, Candidate};

/// Players whose win-game ETA is below this are not traded with.
pub const WIN_GAME_CUTOFF: u32 = 25;

/// A way of making and answering trade offers.
pub trait NegotiationStrategy {
    fn make_offer(
        &mut self,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        plan: &BuildPlan,
        rng: &mut impl Rng,
    ) -> Option<TradeOffer>;

    fn make_counter_offer(
        &mut self,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        plan: &BuildPlan,
        original: &TradeOffer,
    ) -> Option<TradeOffer>;

    fn consider_offer(
        &mut self,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        offer: &TradeOffer,
        receiver: usize,
    ) -> OfferResponse;

    fn offer_to_bank(&self, state: &GameState, trackers: &TrackerSet, plan: &BuildPlan) -> Option<TradeOffer>;

    fn handle_partial_offer(
        &mut self,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        offer: &TradeOffer,
    ) -> OfferResponse;
}

#[derive(Debug, Clone)]
pub struct Negotiator {
    player: usize,
    params: RobotParameters,
    beliefs: Beliefs,
    last_offer_eta: u32,
    best_completed_offer: Option<TradeOffer>,
}

impl Negotiator {
    pub fn new(player: usize, num_players: usize, params: RobotParameters) -> Self {
        Self {
            player,
            params,
            beliefs: Beliefs::new(num_players),
            last_offer_eta: ETA_CUTOFF,
            best_completed_offer: None,
        }
    }

    pub fn player(&self) -> usize {
        self.player
    }

    pub fn beliefs(&self) -> &Beliefs {
        &self.beliefs
    }

    pub fn beliefs_mut(&mut self) -> &mut Beliefs {
        &mut self.beliefs
    }

    /// Rolls to target under the last offer found acceptable, or [`ETA_CUTOFF`].
    pub fn last_offer_eta(&self) -> u32 {
        self.last_offer_eta
    }

    /// The completion chosen by the last [`handle_partial_offer`](NegotiationStrategy::handle_partial_offer).
    pub fn best_completed_offer(&self) -> Option<&TradeOffer> {
        self.best_completed_offer.as_ref()
    }

    /// `player`'s next piece, planned on their behalf if nothing is cached.
    fn target_piece(&mut self, state: &mut GameState, trackers: &mut TrackerSet, player: usize) -> Option<PossiblePiece> {
        if let Some(piece) = self.beliefs.target_piece(player) {
            return Some(piece.clone());
        }
        let mut plan = BuildPlan::new();
        DecisionMaker::new(player, self.params.clone()).plan_stuff(state, trackers, &mut plan);
        let piece = plan.current()?.clone();
        trace!(player, piece = ?piece.piece_type(), "target piece planned");
        self.beliefs.remember_target(player, piece.clone());
        Some(piece)
    }

    /// Our lead piece: the cached one, else the plan's, else a fresh plan.
    fn our_target(&mut self, state: &mut GameState, trackers: &mut TrackerSet, plan: &BuildPlan) -> Option<PossiblePiece> {
        let cached = self
            .beliefs
            .target_piece(self.player)
            .or(plan.current())
            .cloned();
        let piece = match cached {
            Some(piece) => piece,
            None => self.target_piece(state, trackers, self.player)?,
        };
        self.beliefs.remember_target(self.player, piece.clone());
        Some(piece)
    }

    /// Our hand falls short of `target` and holds nothing we cannot see.
    fn worth_trading_for(&self, state: &GameState, target: &ResourceSet) -> bool {
        let hand = &state.players[self.player].resources;
        !hand.contains(target) && hand.unknown() == 0
    }

    fn search(
        &mut self,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        target: &ResourceSet,
        asked: impl Fn(&Beliefs, Resource) -> bool,
        bank_assisted: &[u8],
    ) -> Option<TradeOffer> {
        let found = {
            let appraiser = Appraiser::new(state, trackers, self.player);
            let beliefs = &self.beliefs;
            search::candidates(&appraiser, target, |resource| asked(beliefs, resource), bank_assisted)
        };
        trace!(player = self.player, candidates = found.len(), "offer search");
        found
            .into_iter()
            .find_map(|candidate| self.make_offer_aux(state, trackers, candidate))
    }

    /// Turns a candidate into an offer, if it is new and somebody would take it.
    fn make_offer_aux(
        &mut self,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        candidate: Candidate,
    ) -> Option<TradeOffer> {
        let Candidate { give, get, wanted } = candidate;
        if self.beliefs.already_offered(&give, &get)
            || self.beliefs.mirrors_standing_offer(self.player, &give, &get)
        {
            return None;
        }

        let seats: Vec<usize> = if state.current_player == self.player {
            (0..state.num_players()).filter(|p| *p != self.player).collect()
        } else {
            vec![state.current_player]
        };
        let recipients: Vec<usize> = seats
            .into_iter()
            .filter(|&p| {
                self.beliefs.is_selling(p, wanted)
                    && state.players[p].resources.total() >= get.total()
                    && trackers.get(p).win_game_eta() >= WIN_GAME_CUTOFF
            })
            .collect();
        if recipients.is_empty() {
            return None;
        }

        let offer = TradeOffer::new(self.player, recipients.iter().copied(), give, get);
        let acceptable = recipients
            .iter()
            .any(|&p| self.consider_offer(state, trackers, &offer, p) == OfferResponse::Accept);
        acceptable.then_some(offer)
    }
}

impl NegotiationStrategy for Negotiator {
    fn make_offer(
        &mut self,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        plan: &BuildPlan,
        rng: &mut impl Rng,
    ) -> Option<TradeOffer> {
        if plan.is_empty() {
            return None;
        }
        let target = self.our_target(state, trackers, plan)?.cost();
        if !self.worth_trading_for(state, &target) {
            return None;
        }
        let us = self.player;
        let mut offer = self.search(
            state,
            trackers,
            &target,
            |beliefs, resource| beliefs.someone_selling(us, resource),
            &[1],
        )?;
        self.beliefs.add_to_offers_made(offer.clone());

        if !self.beliefs.already_offered(&ResourceSet::EMPTY, &offer.get)
            && rng.gen_bool(self.params.partial_offer_probability)
        {
            offer.give.clear();
            self.beliefs.add_to_offers_made(offer.clone());
        }
        debug!(player = us, %offer, partial = offer.is_partial(), "making offer");
        Some(offer)
    }

    fn make_counter_offer(
        &mut self,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        plan: &BuildPlan,
        original: &TradeOffer,
    ) -> Option<TradeOffer> {
        let target = self.our_target(state, trackers, plan)?.cost();
        if !self.worth_trading_for(state, &target) {
            return None;
        }
        let offered = original.give;
        let counter = self.search(
            state,
            trackers,
            &target,
            |_, resource| offered.has(resource),
            &[1, 2, 3],
        )?;
        self.beliefs.add_to_offers_made(counter.clone());
        debug!(player = self.player, %original, %counter, "countering");
        Some(counter)
    }

    fn consider_offer(
        &mut self,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        offer: &TradeOffer,
        receiver: usize,
    ) -> OfferResponse {
        let hand = state.players[receiver].resources;
        if hand.unknown() == 0 && !hand.contains(&offer.get) {
            return OfferResponse::Reject;
        }
        let Some(receiver_target) = self.target_piece(state, trackers, receiver) else {
            return OfferResponse::Reject;
        };
        let Some(sender_target) = self.target_piece(state, trackers, offer.from) else {
            return OfferResponse::Reject;
        };

        let sender_eta = trackers.get(offer.from).win_game_eta();
        if sender_eta <= WIN_GAME_CUTOFF {
            trace!(receiver, sender = offer.from, sender_eta, "sender too close to winning");
            return OfferResponse::Reject;
        }
        if receiver_target.races(&sender_target) {
            trace!(receiver, sender = offer.from, "racing the sender");
            return OfferResponse::Reject;
        }

        let appraiser = Appraiser::new(state, trackers, receiver);
        let target = receiver_target.cost();
        let batna_eta = appraiser.eta(&target, &ResourceSet::EMPTY, &ResourceSet::EMPTY);
        let offer_eta = appraiser.eta(&target, &offer.get, &offer.give);
        let response = if offer_eta < batna_eta {
            self.last_offer_eta = offer_eta;
            OfferResponse::Accept
        } else {
            self.last_offer_eta = ETA_CUTOFF;
            OfferResponse::Counter
        };
        trace!(receiver, %offer, offer_eta, batna_eta, ?response, "considered offer");
        response
    }

    fn offer_to_bank(&self, state: &GameState, trackers: &TrackerSet, plan: &BuildPlan) -> Option<TradeOffer> {
        let target = plan.current()?.cost();
        let appraiser = Appraiser::new(state, trackers, self.player);
        appraiser.bank_offer(&target, appraiser.hand())
    }

    fn handle_partial_offer(
        &mut self,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        offer: &TradeOffer,
    ) -> OfferResponse {
        self.best_completed_offer = None;
        let (known, fill_give) = match (offer.give.is_empty(), offer.get.is_empty()) {
            (true, false) => (offer.get, true),
            (false, true) => (offer.give, false),
            _ => return OfferResponse::Reject,
        };

        let mut best_eta = ETA_CUTOFF;
        for proposal in PARTIAL_COMPLETIONS.iter() {
            if known.contains(proposal) || proposal.contains(&known) {
                continue;
            }
            let (give, get) = if fill_give {
                (*proposal, offer.get)
            } else {
                (offer.give, *proposal)
            };
            if self.beliefs.already_offered(&get, &give) {
                continue;
            }
            let inverse = TradeOffer::new(self.player, [offer.from], get, give);
            if self.consider_offer(state, trackers, &inverse, offer.from) == OfferResponse::Reject {
                continue;
            }
            let completed = TradeOffer::new(offer.from, offer.to.iter().copied(), give, get);
            if self.consider_offer(state, trackers, &completed, self.player) == OfferResponse::Accept
                && self.last_offer_eta < best_eta
            {
                best_eta = self.last_offer_eta;
                self.best_completed_offer = Some(completed);
                if best_eta == 0 {
                    break;
                }
            }
        }

        match &self.best_completed_offer {
            Some(completed) => {
                debug!(player = self.player, %offer, %completed, best_eta, "completing partial offer");
                OfferResponse::Complete
            }
            None => OfferResponse::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::NodeId;
    use crate::config::RobotParameters;
    use crate::testing::new_state;
    use crate::tracker::{PossibleCard, PossibleCity, PossibleRoad};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Four seats with one settlement each, play started, seat 0 to move.
    fn table(seed: u64) -> (GameState, Vec<NodeId>) {
        let mut state = new_state(seed);
        let mut nodes = Vec::new();
        for player in 0..state.num_players() {
            let node = state
                .map
                .land_nodes
                .iter()
                .copied()
                .find(|node| state.is_legal_settlement(player, *node, false))
                .expect("free spot");
            state.build_settlement(player, node, true).expect("settlement");
            nodes.push(node);
        }
        state.start_play();
        (state, nodes)
    }

    fn card_target(player: usize) -> PossiblePiece {
        PossiblePiece::Card(PossibleCard {
            player,
            eta: 0,
            score: 0.0,
        })
    }

    fn quiet_params() -> RobotParameters {
        RobotParameters {
            partial_offer_probability: 0.0,
            ..RobotParameters::default()
        }
    }

    fn single_plan(piece: PossiblePiece) -> BuildPlan {
        let mut plan = BuildPlan::new();
        plan.push(piece);
        plan
    }

    /// Seat 0 wants a card and is one wheat short; everyone else wants a road and
    /// holds a wheat they do not need.
    fn wheat_market(seed: u64) -> (GameState, TrackerSet, Negotiator, BuildPlan) {
        let (mut state, _) = table(seed);
        state.players[0].resources = ResourceSet::from_counts([1, 0, 1, 0, 1]);
        for player in 1..state.num_players() {
            state.players[player].resources = ResourceSet::from_counts([0, 1, 0, 1, 0]);
        }
        let trackers = TrackerSet::new(&state, 0, 300);
        let mut negotiator = Negotiator::new(0, state.num_players(), quiet_params());
        let edge = *state.map.land_edges.iter().next().expect("edge");
        for player in 1..state.num_players() {
            negotiator
                .beliefs_mut()
                .remember_target(player, PossiblePiece::Road(PossibleRoad::new(player, edge)));
        }
        (state, trackers, negotiator, single_plan(card_target(0)))
    }

    #[test]
    fn offers_beat_the_bank() {
        let (mut state, mut trackers, mut negotiator, plan) = wheat_market(5);
        let mut rng = StdRng::seed_from_u64(5);
        let offer = negotiator
            .make_offer(&mut state, &mut trackers, &plan, &mut rng)
            .expect("someone sells wheat");
        assert_eq!(offer.get, ResourceSet::single(Resource::Wheat, 1));
        assert!(!offer.to.contains(&0));

        let target = card_target(0).cost();
        let appraiser = Appraiser::new(&state, &trackers, 0);
        let batna = search::Batna::of(&appraiser, &target);
        let eta = appraiser.eta(&target, &offer.give, &offer.get);
        assert!(batna.beaten_by(eta, &offer.give));
    }

    #[test]
    fn the_same_offer_is_never_made_twice() {
        let (mut state, mut trackers, mut negotiator, plan) = wheat_market(5);
        let mut rng = StdRng::seed_from_u64(6);
        let mut seen: Vec<(ResourceSet, ResourceSet)> = Vec::new();
        while let Some(offer) = negotiator.make_offer(&mut state, &mut trackers, &plan, &mut rng) {
            assert!(!seen.contains(&(offer.give, offer.get)), "{offer} repeated");
            seen.push((offer.give, offer.get));
            assert!(seen.len() < 64);
        }
        assert!(!seen.is_empty());

        negotiator.beliefs_mut().reset_offers_made();
        assert!(negotiator.make_offer(&mut state, &mut trackers, &plan, &mut rng).is_some());
    }

    #[test]
    fn partial_offers_always_go_out_blank_when_asked_to() {
        let (mut state, mut trackers, _, plan) = wheat_market(5);
        let mut negotiator = Negotiator::new(
            0,
            state.num_players(),
            RobotParameters {
                partial_offer_probability: 1.0,
                ..RobotParameters::default()
            },
        );
        let edge = *state.map.land_edges.iter().next().expect("edge");
        for player in 1..state.num_players() {
            negotiator
                .beliefs_mut()
                .remember_target(player, PossiblePiece::Road(PossibleRoad::new(player, edge)));
        }
        let mut rng = StdRng::seed_from_u64(1);
        let offer = negotiator
            .make_offer(&mut state, &mut trackers, &plan, &mut rng)
            .expect("offer");
        assert!(offer.give.is_empty());
        assert!(offer.is_partial());
        let second = negotiator.make_offer(&mut state, &mut trackers, &plan, &mut rng);
        assert!(second.is_none_or(|second| !second.give.is_empty()));
    }

    #[test]
    fn nothing_to_trade_for_when_the_hand_already_pays() {
        let (mut state, mut trackers, mut negotiator, plan) = wheat_market(5);
        state.players[0].resources = ResourceSet::from_counts([0, 0, 1, 1, 1]);
        let mut rng = StdRng::seed_from_u64(2);
        assert!(negotiator.make_offer(&mut state, &mut trackers, &plan, &mut rng).is_none());
        assert!(negotiator.offer_to_bank(&state, &trackers, &plan).is_none());
        assert!(
            negotiator
                .make_offer(&mut state, &mut trackers, &BuildPlan::new(), &mut rng)
                .is_none()
        );
    }

    #[test]
    fn receivers_reject_what_they_cannot_pay() {
        let (mut state, mut trackers, mut negotiator, _) = wheat_market(5);
        let offer = TradeOffer::new(
            1,
            [0],
            ResourceSet::single(Resource::Brick, 1),
            ResourceSet::single(Resource::Wheat, 1),
        );
        negotiator.beliefs_mut().remember_target(0, card_target(0));
        assert_eq!(
            negotiator.consider_offer(&mut state, &mut trackers, &offer, 0),
            OfferResponse::Reject
        );
    }

    #[test]
    fn helpful_offers_are_accepted_and_useless_ones_countered() {
        let (mut state, mut trackers, mut negotiator, _) = wheat_market(5);
        negotiator.beliefs_mut().remember_target(0, card_target(0));
        let helpful = TradeOffer::new(
            1,
            [0],
            ResourceSet::single(Resource::Wheat, 1),
            ResourceSet::single(Resource::Wood, 1),
        );
        assert_eq!(
            negotiator.consider_offer(&mut state, &mut trackers, &helpful, 0),
            OfferResponse::Accept
        );
        assert_eq!(negotiator.last_offer_eta(), 0);

        let useless = TradeOffer::new(
            1,
            [0],
            ResourceSet::single(Resource::Brick, 1),
            ResourceSet::single(Resource::Wood, 1),
        );
        assert_eq!(
            negotiator.consider_offer(&mut state, &mut trackers, &useless, 0),
            OfferResponse::Counter
        );
        assert_eq!(negotiator.last_offer_eta(), ETA_CUTOFF);
    }

    /// Seat 1 wants a city, holds three wheat and asks seat 0 for an ore.
    fn ore_request(seed: u64, our_hand: [u8; 5]) -> (GameState, TrackerSet, Negotiator, TradeOffer) {
        let (mut state, nodes) = table(seed);
        state.players[0].resources = ResourceSet::from_counts(our_hand);
        state.players[1].resources = ResourceSet::from_counts([0, 0, 0, 3, 0]);
        let trackers = TrackerSet::new(&state, 0, 300);
        let mut negotiator = Negotiator::new(0, state.num_players(), quiet_params());
        negotiator.beliefs_mut().remember_target(0, card_target(0));
        negotiator.beliefs_mut().remember_target(
            1,
            PossiblePiece::City(PossibleCity {
                player: 1,
                node: nodes[1],
                speedup: [0; 4],
                score: 0.0,
            }),
        );
        let partial = TradeOffer::new(1, [0], ResourceSet::EMPTY, ResourceSet::single(Resource::Ore, 1));
        (state, trackers, negotiator, partial)
    }

    #[test]
    fn partial_offer_is_completed_from_the_catalog() {
        let (mut state, mut trackers, mut negotiator, partial) = ore_request(13, [0, 0, 1, 0, 2]);
        let response = negotiator.handle_partial_offer(&mut state, &mut trackers, &partial);
        assert_eq!(response, OfferResponse::Complete);
        let completed = negotiator.best_completed_offer().expect("completion").clone();
        assert!(PARTIAL_COMPLETIONS.contains(&completed.give));
        assert_eq!(completed.get, partial.get);
        assert_eq!(completed.from, 1);
        assert!(completed.give.has(Resource::Wheat));
        assert!(!completed.give.has(Resource::Ore));
    }

    #[test]
    fn partial_offer_is_rejected_when_no_completion_helps() {
        let (mut state, mut trackers, mut negotiator, partial) = ore_request(13, [0, 0, 1, 0, 0]);
        let response = negotiator.handle_partial_offer(&mut state, &mut trackers, &partial);
        assert_eq!(response, OfferResponse::Reject);
        assert!(negotiator.best_completed_offer().is_none());
    }

    #[test]
    fn counter_offers_draw_on_what_was_offered() {
        let (mut state, mut trackers, mut negotiator, plan) = wheat_market(5);
        state.current_player = 1;
        let original = TradeOffer::new(
            1,
            [0],
            ResourceSet::single(Resource::Wheat, 1),
            ResourceSet::from_counts([0, 0, 1, 0, 1]),
        );
        if let Some(counter) = negotiator.make_counter_offer(&mut state, &mut trackers, &plan, &original) {
            assert!(counter.get.kinds().all(|resource| original.give.has(resource)));
            assert_eq!(counter.to.iter().copied().collect::<Vec<_>>(), vec![1]);
            assert!(negotiator.beliefs().already_offered(&counter.give, &counter.get));
        }
    }
}
