//! Opening placement: where the two free settlements and their roads go.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use tracing::debug;

use crate::board::{EdgeId, NodeId, normalize_edge, other_end};
use crate::estimator::{
    BuildingSpeedEstimator, DEFAULT_ROLL_LIMIT, FastEstimator, PortFlags, ProductionProfile,
};
use crate::game::{GameState, ResourceSet, cost_of};
use crate::types::{PieceType, Resource};

/// Percentage of rolls showing each number, indexed by the number.
pub const NUMBER_RATING: [u32; 13] = [0, 0, 3, 6, 8, 11, 14, 17, 14, 11, 8, 6, 3];

const PAIR_SPEED_LIMIT: u32 = 4 * DEFAULT_ROLL_LIMIT;
const ORDER_CUTOFF: u32 = 100;
/// A resource rolled on more than this share of rolls makes its harbor interesting.
const RARITY_THRESHOLD: u32 = 33;

/// Summed from-nothing estimates for the opening pieces, stopping once `limit` is reached.
///
/// Returns the speed and whether every piece was estimated.
fn opening_speed(state: &GameState, nodes: &[NodeId], limit: u32) -> (u32, bool) {
    let (estimator, ports) = estimator_for(state, nodes);
    let mut speed = 0;
    for piece in [PieceType::Settlement, PieceType::City, PieceType::Card, PieceType::Road] {
        match estimator.estimate_rolls(&ResourceSet::EMPTY, &cost_of(piece), limit, &ports) {
            Ok(estimate) => speed += estimate.rolls,
            Err(_) => return (limit, false),
        }
        if speed >= limit {
            return (speed, piece == PieceType::Road);
        }
    }
    (speed, true)
}

/// Like [`opening_speed`] but a piece past the cutoff counts as the cutoff.
fn capped_speed(state: &GameState, node: NodeId, cutoff: u32) -> u32 {
    let (estimator, ports) = estimator_for(state, &[node]);
    PieceType::ALL
        .iter()
        .map(|piece| {
            estimator.rolls_or(
                &ResourceSet::EMPTY,
                &cost_of(*piece),
                cutoff,
                &ports,
                cutoff,
            )
        })
        .sum()
}

fn estimator_for(state: &GameState, nodes: &[NodeId]) -> (FastEstimator, PortFlags) {
    let mut profile = ProductionProfile::default();
    let mut ports = PortFlags::NONE;
    for &node in nodes {
        profile.add_node(&state.map, node);
        ports = ports.with(state.map.port_at(node));
    }
    (FastEstimator::new(profile), ports)
}

fn probability_total(state: &GameState, nodes: &[NodeId]) -> u32 {
    nodes
        .iter()
        .flat_map(|node| state.map.tiles_of(*node))
        .map(|tile| NUMBER_RATING[usize::from(tile.number.unwrap_or(0))])
        .sum()
}

fn legal_spots(state: &GameState, player: usize) -> Vec<NodeId> {
    state
        .map
        .land_nodes
        .iter()
        .copied()
        .filter(|node| state.is_legal_settlement(player, *node, false))
        .collect()
}

/// Picks both opening settlements; the first one returned is the one to place first.
pub fn plan_initial_settlements(state: &GameState, player: usize) -> Option<(NodeId, NodeId)> {
    let spots = legal_spots(state, player);
    let mut best: Option<(NodeId, NodeId)> = None;
    let mut best_speed = PAIR_SPEED_LIMIT;
    let mut best_prob = 0;

    for (&first, &second) in spots.iter().tuple_combinations() {
        if state.map.are_adjacent(first, second) {
            continue;
        }
        let (speed, all_the_way) = opening_speed(state, &[first, second], best_speed);
        let prob = probability_total(state, &[first, second]);
        if speed < best_speed || best.is_none() {
            best = Some((first, second));
            best_speed = speed;
            best_prob = prob;
        } else if speed == best_speed && all_the_way && prob > best_prob {
            best = Some((first, second));
            best_prob = prob;
        }
    }

    let (first, second) = best?;
    let ordered = if capped_speed(state, first, ORDER_CUTOFF) > capped_speed(state, second, ORDER_CUTOFF) {
        (second, first)
    } else {
        (first, second)
    };
    debug!(player, first = ordered.0, second = ordered.1, speed = best_speed, "opening pair");
    Some(ordered)
}

/// Best partner for the settlement already at `first`.
pub fn plan_second_settlement(state: &GameState, player: usize, first: NodeId) -> Option<NodeId> {
    let mut best: Option<NodeId> = None;
    let mut best_speed = PAIR_SPEED_LIMIT;
    let mut best_prob = 0;

    for second in legal_spots(state, player) {
        if second == first || state.map.are_adjacent(first, second) {
            continue;
        }
        let (speed, _) = opening_speed(state, &[first, second], best_speed);
        let prob = probability_total(state, &[first, second]);
        if speed < best_speed || best.is_none() || (speed == best_speed && prob > best_prob) {
            best = Some(second);
            best_speed = speed;
            best_prob = prob;
        }
    }
    debug!(player, first, second = ?best, speed = best_speed, "second settlement");
    best
}

/// Share of rolls producing each resource on this board.
fn resource_rarity(state: &GameState) -> [u32; 5] {
    let mut rarity = [0; 5];
    for tile in state.map.land_tiles.values() {
        if let (Some(resource), Some(number)) = (tile.resource, tile.number) {
            rarity[resource.index()] += NUMBER_RATING[usize::from(number)];
        }
    }
    rarity
}

fn number_score(state: &GameState, node: NodeId, profile: Option<&ProductionProfile>) -> u32 {
    let mut score = 0;
    for tile in state.map.tiles_of(node) {
        let number = tile.number.unwrap_or(0);
        let rating = NUMBER_RATING[usize::from(number)];
        score += rating;
        if let Some(profile) = profile {
            if number != 0 && !profile.has_number(number) {
                score += rating;
            }
        }
    }
    score
}

fn port_nodes(state: &GameState, kind: Option<Resource>) -> BTreeSet<NodeId> {
    state.map.port_nodes.get(&kind).cloned().unwrap_or_default()
}

/// Scores the spots we might build toward from our new settlement.
fn score_nearby_spots(state: &GameState, player: usize, nodes: &mut BTreeMap<NodeId, u32>) {
    const NUMBER_WEIGHT: u32 = 3;
    const MISC_PORT_WEIGHT: u32 = 5;
    const PORT_WEIGHT: u32 = 10;

    let profile = ProductionProfile::for_player(state, player);
    let ports = PortFlags::for_player(state, player);
    let rarity = resource_rarity(state);
    let misc = port_nodes(state, None);

    for (node, score) in nodes.iter_mut() {
        *score += (number_score(state, *node, Some(&profile)) * 100 / 80) * NUMBER_WEIGHT;
        if !ports.has_misc() && misc.contains(node) {
            *score += 100 * MISC_PORT_WEIGHT;
        }
        for resource in Resource::ALL {
            let share = rarity[resource.index()];
            if share > RARITY_THRESHOLD
                && !ports.has(resource)
                && port_nodes(state, Some(resource)).contains(node)
            {
                *score += 100 * (share * PORT_WEIGHT / 56);
            }
        }
    }
}

/// Scores every open spot the way an opponent might, for the look-ahead.
fn score_open_spots(state: &GameState, nodes: &mut BTreeMap<NodeId, u32>) {
    let rarity = resource_rarity(state);
    let misc = port_nodes(state, None);
    let near = |node: NodeId, targets: &BTreeSet<NodeId>| {
        !targets.contains(&node) && !state.map.nodes_two_away(node).is_disjoint(targets)
    };
    for (node, score) in nodes.iter_mut() {
        *score += (number_score(state, *node, None) * 100 / 40) * 100;
        if near(*node, &misc) {
            *score += 100 * 5;
        }
        for resource in Resource::ALL {
            let share = rarity[resource.index()];
            if share > RARITY_THRESHOLD && near(*node, &port_nodes(state, Some(resource))) {
                *score += 100 * (share * 10 / 56);
            }
        }
    }
}

/// Settlements the other seats place before our second one.
fn enemy_builds_before_our_next(state: &GameState, player: usize) -> usize {
    let after_us = state.num_players().saturating_sub(player + 1);
    2 * after_us
}

/// Road from `settlement` toward the best spot two away, and that spot.
///
/// After the first settlement the spots opponents are likely to grab first are
/// ruled out.
pub fn plan_initial_road(state: &GameState, player: usize, settlement: NodeId) -> Option<(EdgeId, NodeId)> {
    let mut two_away: BTreeMap<NodeId, u32> = state
        .map
        .nodes_two_away(settlement)
        .into_iter()
        .filter(|node| state.is_legal_settlement(player, *node, false))
        .map(|node| (node, 0))
        .collect();
    score_nearby_spots(state, player, &mut two_away);

    let mut taken: BTreeSet<NodeId> = BTreeSet::new();
    let first_round = state.players[player].settlements.len() + state.players[player].cities.len() == 1;
    let builds = if first_round {
        enemy_builds_before_our_next(state, player)
    } else {
        0
    };
    if builds > 0 {
        let mut open: BTreeMap<NodeId, u32> = legal_spots(state, player)
            .into_iter()
            .map(|node| (node, 0))
            .collect();
        score_open_spots(state, &mut open);
        for _ in 0..builds {
            let Some((&node, _)) = open.iter().filter(|(n, _)| !taken.contains(*n)).max_by_key(|(_, s)| **s)
            else {
                break;
            };
            taken.insert(node);
            taken.extend(state.map.neighbors(node));
        }
    }

    let destination = two_away
        .iter()
        .filter(|(node, score)| !taken.contains(*node) && **score > 0)
        .max_by_key(|(_, score)| **score)
        .map(|(node, _)| *node);

    let road_toward = |target: NodeId| {
        state
            .map
            .neighbors(settlement)
            .find(|middle| state.map.are_adjacent(*middle, target))
            .map(|middle| normalize_edge(settlement, middle))
            .filter(|edge| state.is_legal_road(player, *edge))
    };

    if let Some(target) = destination {
        if let Some(edge) = road_toward(target) {
            debug!(player, settlement, target, ?edge, "initial road");
            return Some((edge, target));
        }
    }
    let edge = state
        .map
        .edges_of(settlement)
        .iter()
        .copied()
        .find(|edge| state.is_legal_road(player, *edge))?;
    Some((edge, other_end(edge, settlement)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::new_state;

    #[test]
    fn number_rating_tracks_dice_weights() {
        for number in 2..=12u8 {
            let expected = (crate::board::dice_weight(number) * 100 + 18) / 36;
            assert!(NUMBER_RATING[usize::from(number)].abs_diff(expected) <= 1);
        }
    }

    #[test]
    fn opening_pair_is_legal_and_apart() {
        let state = new_state(3);
        let (first, second) = plan_initial_settlements(&state, 0).expect("a pair");
        assert_ne!(first, second);
        assert!(state.is_legal_settlement(0, first, false));
        assert!(state.is_legal_settlement(0, second, false));
        assert!(!state.map.are_adjacent(first, second));
    }

    #[test]
    fn second_settlement_and_roads_are_legal() {
        let mut state = new_state(3);
        let (first, _) = plan_initial_settlements(&state, 0).expect("a pair");
        state.build_settlement(0, first, true).expect("settlement");
        let (edge, target) = plan_initial_road(&state, 0, first).expect("road");
        assert!(state.is_legal_road(0, edge));
        assert_ne!(target, first);
        state.build_road(0, edge, true).expect("road");

        let second = plan_second_settlement(&state, 0, first).expect("second");
        assert!(state.is_legal_settlement(0, second, false));
        assert!(!state.map.are_adjacent(first, second));
        state.build_settlement(0, second, true).expect("settlement");
        let (edge, _) = plan_initial_road(&state, 0, second).expect("road");
        assert!(state.is_legal_road(0, edge));
    }
}
