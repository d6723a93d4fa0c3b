use tracing::{debug, trace};

use crate::board::EdgeId;
use crate::estimator::BuildingSpeedEstimator;
use crate::game::{GameState, PieceKey};
use crate::tracker::{PossibleCard, PossiblePiece, PossibleRoad, TrackerSet};
use crate::types::{DevelopmentCard, PieceType};

use super::scoring::{EtaSnapshot, eta_bonus, wgeta_bonus};
use super::{BuildPlan, DecisionMaker, DecisionStrategy};

/// Share of a speculative knight's win-game bonus credited to a card purchase.
const KNIGHT_CARD_WEIGHT: f64 = 0.58;
/// Share of a speculative victory point credited to a card purchase.
const VP_CARD_WEIGHT: f64 = 0.21;

/// Scores every buildable piece by how it moves the race to ten points.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartStrategy;

impl DecisionStrategy for SmartStrategy {
    fn name(&self) -> &'static str {
        "smart"
    }

    fn plan(
        &self,
        dm: &mut DecisionMaker,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        plan: &mut BuildPlan,
    ) {
        let player = dm.player;
        trackers.update_win_game_etas();
        let before = EtaSnapshot::of(trackers);
        let owner = state.players[player].clone();
        let etas = {
            let ours = trackers.get(player);
            ours.estimator().estimates_from_now(&owner.resources, ours.ports())
        };
        let params = dm.params.clone();

        if owner.settlements_left() > 0 {
            let candidates: Vec<_> = trackers
                .get(player)
                .possible_settlements()
                .values()
                .filter(|settlement| settlement.is_buildable_now())
                .cloned()
                .collect();
            for mut settlement in candidates {
                let Some(bonus) = trackers.speculate(
                    state,
                    player,
                    PieceKey::Settlement(settlement.node),
                    |_, copy| {
                        copy.update_win_game_etas();
                        wgeta_bonus(&params, player, &before, copy)
                    },
                ) else {
                    continue;
                };
                settlement.eta = etas[PieceType::Settlement];
                settlement.score = eta_bonus(&params, settlement.eta, bonus);
                trace!(player, node = settlement.node, score = settlement.score, "settlement scored");
                if dm
                    .favorite_settlement
                    .as_ref()
                    .is_none_or(|fav| settlement.score > fav.score)
                {
                    dm.favorite_settlement = Some(settlement.clone());
                }
                if settlement.threats.is_empty() {
                    dm.good_settlements.push(settlement);
                } else {
                    dm.threatened_settlements.push(settlement);
                }
            }
        }

        if owner.roads_left() > 0 {
            let candidates: Vec<_> = trackers
                .get(player)
                .possible_roads()
                .values()
                .filter(|road| road.is_buildable_now())
                .cloned()
                .collect();
            for mut road in candidates {
                let Some(mut bonus) = score_road(dm, state, trackers, &before, road.edge) else {
                    continue;
                };
                if !road.threats.is_empty() {
                    bonus *= params.threat_multiplier;
                }
                road.score = eta_bonus(&params, etas[PieceType::Road], bonus);
                if dm.favorite_road.as_ref().is_none_or(|fav| road.score > fav.score) {
                    dm.favorite_road = Some(road.clone());
                }
                if road.threats.is_empty() {
                    dm.good_roads.push(road);
                } else {
                    dm.threatened_roads.push(road);
                }
            }
        }

        if owner.cities_left() > 0 {
            let candidates: Vec<_> = trackers
                .get(player)
                .possible_cities()
                .values()
                .cloned()
                .collect();
            for mut city in candidates {
                let Some(bonus) =
                    trackers.speculate(state, player, PieceKey::City(city.node), |_, copy| {
                        copy.update_win_game_etas();
                        wgeta_bonus(&params, player, &before, copy)
                    })
                else {
                    continue;
                };
                city.score = eta_bonus(&params, etas[PieceType::City], bonus);
                if dm.favorite_city.as_ref().is_none_or(|fav| city.score > fav.score) {
                    dm.favorite_city = Some(city);
                }
            }
        }

        let settlement = dm.favorite_settlement.clone();
        let road = dm.favorite_road.clone();
        let city_eta = etas[PieceType::City];
        let beats = |score: f64, eta: u32, other: Option<(f64, u32)>| match other {
            None => true,
            Some((other_score, other_eta)) => {
                score > other_score || (score == other_score && eta < other_eta)
            }
        };
        let settlement_rival = settlement
            .as_ref()
            .map(|s| (s.score, etas[PieceType::Settlement]));
        let road_rival = road.as_ref().map(|r| (r.score, etas[PieceType::Road]));

        match (&dm.favorite_city, &road, &settlement) {
            (Some(city), _, _)
                if city.score > 0.0
                    && beats(city.score, city_eta, settlement_rival)
                    && beats(city.score, city_eta, road_rival) =>
            {
                plan.push(PossiblePiece::City(city.clone()));
            }
            (_, Some(road), _)
                if road.score > 0.0 && settlement.as_ref().is_none_or(|s| road.score > s.score) =>
            {
                plan.push(PossiblePiece::Road(road.clone()));
            }
            (_, _, Some(settlement)) => {
                plan.push(PossiblePiece::Settlement(settlement.clone()));
            }
            _ => {}
        }

        if state.dev_deck_len() > 0 {
            let card = score_card(dm, state, trackers, &before, etas[PieceType::Card]);
            let replace = plan.current().is_none_or(|pick| pick.score() < card.score);
            if replace {
                plan.advance();
                plan.push(PossiblePiece::Card(card.clone()));
            }
            dm.possible_card = Some(card);
        }

        plan_road_building_pair(dm, state, trackers, &before, plan);
    }
}

fn score_road(
    dm: &DecisionMaker,
    state: &mut GameState,
    trackers: &TrackerSet,
    before: &EtaSnapshot,
    edge: EdgeId,
) -> Option<f64> {
    let player = dm.player;
    trackers.speculate(state, player, PieceKey::Road(edge), |_, copy| {
        copy.update_win_game_etas();
        wgeta_bonus(&dm.params, player, before, copy)
    })
}

/// What a development card is worth: a share of a knight and of a hidden point.
fn score_card(
    dm: &DecisionMaker,
    state: &mut GameState,
    trackers: &TrackerSet,
    before: &EtaSnapshot,
    eta: u32,
) -> PossibleCard {
    let player = dm.player;
    let rescored = |st: &GameState| {
        let mut copy = trackers.clone();
        copy.refresh_all(st);
        copy.update_win_game_etas();
        wgeta_bonus(&dm.params, player, before, &copy)
    };
    let knight = state.with_extra_knight(player, |st| rescored(&*st)) * KNIGHT_CARD_WEIGHT;
    let point = state.with_extra_victory_card(player, |st| rescored(&*st)) * VP_CARD_WEIGHT;
    let bonus = knight + point + dm.params.dev_card_multiplier;
    PossibleCard {
        player,
        eta,
        score: eta_bonus(&dm.params, eta, bonus),
    }
}

/// With an old Road Building card in hand, plans the favorite road together with
/// the best road it opens up so both go down on the one card.
fn plan_road_building_pair(
    dm: &DecisionMaker,
    state: &mut GameState,
    trackers: &TrackerSet,
    before: &EtaSnapshot,
    plan: &mut BuildPlan,
) {
    let player = dm.player;
    let owner = &state.players[player];
    if owner.has_played_dev_card_this_turn
        || owner.roads_left() < 2
        || owner.old_card_count(DevelopmentCard::RoadBuilding) == 0
        || plan.is_empty()
    {
        return;
    }
    let Some(favorite) = dm.favorite_road.clone() else {
        return;
    };

    let params = &dm.params;
    let second = trackers.speculate(state, player, PieceKey::Road(favorite.edge), |st, copy| {
        let candidates: Vec<PossibleRoad> = copy
            .get(player)
            .possible_roads()
            .values()
            .filter(|road| road.is_buildable_now() && road.edge != favorite.edge)
            .cloned()
            .collect();
        let mut best: Option<PossibleRoad> = None;
        for mut road in candidates {
            let Some(score) = copy.speculate(st, player, PieceKey::Road(road.edge), |_, inner| {
                inner.update_win_game_etas();
                wgeta_bonus(params, player, before, inner)
            }) else {
                continue;
            };
            road.score = score;
            if best.as_ref().is_none_or(|b| road.score > b.score) {
                best = Some(road);
            }
        }
        best
    });
    let Some(Some(second)) = second else {
        return;
    };

    debug!(player, first = ?favorite.edge, second = ?second.edge, "planning road building pair");
    if matches!(plan.current(), Some(PossiblePiece::Road(_))) {
        if let Some(top) = plan.advance() {
            plan.push(PossiblePiece::Road(second));
            plan.push(top);
        }
    } else {
        plan.push(PossiblePiece::Road(second));
        plan.push(PossiblePiece::Road(favorite));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RobotParameters;
    use crate::testing::{new_state, trail, trail_nodes};

    #[test]
    fn winning_settlement_earns_the_full_share() {
        let mut state = new_state(29);
        let edges = trail(&state, 2);
        let nodes = trail_nodes(&edges);
        state.build_settlement(0, nodes[0], true).expect("settlement");
        state.build_road(0, edges[0], true).expect("road");
        state.build_road(0, edges[1], true).expect("road");
        state.start_play();
        state.players[0].victory_cards = 8;
        assert_eq!(state.players[0].total_points(), 9);

        let params = RobotParameters {
            adversarial_factor: 0.0,
            leader_adversarial_factor: 0.0,
            eta_bonus_factor: 0.0,
            ..RobotParameters::default()
        };
        let mut trackers = TrackerSet::new(&state, 0, params.max_game_length);
        let mut dm = DecisionMaker::new(0, params);
        let mut plan = BuildPlan::new();
        dm.plan_stuff(&mut state, &mut trackers, &mut plan);

        let (threatened, good) = dm.scored_settlements();
        let scored = threatened
            .iter()
            .chain(good)
            .find(|settlement| settlement.node == nodes[2])
            .expect("spot scored");
        assert_eq!(scored.score, 25.0);
        assert!(!plan.is_empty());
    }

    /// Seed 31 board: one settlement with one road, play started.
    fn one_road_out() -> GameState {
        let mut state = new_state(31);
        let edges = trail(&state, 1);
        let nodes = trail_nodes(&edges);
        state.build_settlement(0, nodes[0], true).expect("settlement");
        state.build_road(0, edges[0], true).expect("road");
        state.start_play();
        state
    }

    fn smart_plan(state: &mut GameState) -> (DecisionMaker, BuildPlan) {
        let mut trackers = TrackerSet::new(state, 0, 300);
        let mut dm = DecisionMaker::new(0, RobotParameters::default());
        let mut plan = BuildPlan::new();
        dm.plan_stuff(state, &mut trackers, &mut plan);
        (dm, plan)
    }

    #[test]
    fn road_building_card_plans_two_roads() {
        let mut state = one_road_out();
        state.players[0].dev_cards.push(DevelopmentCard::RoadBuilding);
        let (dm, plan) = smart_plan(&mut state);

        let favorite = dm.favorite_road().expect("a favorite road").edge;
        assert!(plan.len() >= 3, "plan: {plan:?}");
        let front: Vec<&PossiblePiece> = plan.iter().take(2).collect();
        let (PossiblePiece::Road(first), PossiblePiece::Road(second)) = (front[0], front[1]) else {
            panic!("plan does not start with two roads: {plan:?}");
        };
        assert_eq!(first.edge, favorite);
        assert_ne!(first.edge, second.edge);
    }

    #[test]
    fn road_building_bought_this_turn_adds_nothing() {
        let mut state = one_road_out();
        let (_, without_card) = smart_plan(&mut state);

        state.players[0].fresh_dev_cards.push(DevelopmentCard::RoadBuilding);
        let (_, with_fresh_card) = smart_plan(&mut state);
        assert_eq!(with_fresh_card, without_card);
    }
}
