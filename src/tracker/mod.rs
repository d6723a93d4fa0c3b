//! Per-player lookahead over pieces that could be built later.
//!
//! A [`PlayerTracker`] is rebuilt from the board whenever anything is placed, so a
//! possible piece never outlives the board it was derived from. Speculation works
//! on a cloned [`TrackerSet`] next to a temporary piece on the state.

mod eta;
pub mod longest_road;
mod pieces;
mod set;

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::board::{EdgeId, NodeId, PortKind, edge_contains_node, other_end};
use crate::estimator::{
    BuildingSpeedEstimator, DEFAULT_ROLL_LIMIT, FastEstimator, PortFlags, ProductionEntry,
    ProductionProfile,
};
use crate::game::{COST_DEVELOPMENT, COST_ROAD, GameState, ResourceSet, cost_times};
use crate::types::DevelopmentCard;

pub use pieces::{
    PossibleCard, PossibleCity, PossiblePiece, PossibleRoad, PossibleSettlement, RoadChain, Threat,
};
pub use set::{Speculation, TrackerSet};

/// ETA for a bonus title that cannot be reached.
pub const INFEASIBLE_ETA: u32 = 500;
/// Per-step roll cap used by win-game and race estimates.
pub const STEP_CUTOFF: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerTracker {
    player: usize,
    estimator: FastEstimator,
    ports: PortFlags,
    roads: BTreeMap<EdgeId, PossibleRoad>,
    settlements: BTreeMap<NodeId, PossibleSettlement>,
    cities: BTreeMap<NodeId, PossibleCity>,
    /// Production and harbor of every candidate node, for rollouts.
    node_production: BTreeMap<NodeId, Vec<ProductionEntry>>,
    node_ports: BTreeMap<NodeId, PortKind>,
    pending_initial_settlement: Option<NodeId>,
    points: u8,
    vps_to_win: u8,
    settlements_left: usize,
    cities_left: usize,
    roads_left: usize,
    knights_to_buy: Option<u32>,
    lr_path: Option<Vec<EdgeId>>,
    has_largest_army: bool,
    has_longest_road: bool,
    la_eta: u32,
    lr_eta: u32,
    win_game_eta: u32,
}

impl PlayerTracker {
    pub fn new(state: &GameState, player: usize, count_hidden_points: bool) -> Self {
        let mut tracker = Self {
            player,
            estimator: FastEstimator::new(ProductionProfile::default()),
            ports: PortFlags::NONE,
            roads: BTreeMap::new(),
            settlements: BTreeMap::new(),
            cities: BTreeMap::new(),
            node_production: BTreeMap::new(),
            node_ports: BTreeMap::new(),
            pending_initial_settlement: None,
            points: 0,
            vps_to_win: state.config.vps_to_win,
            settlements_left: 0,
            cities_left: 0,
            roads_left: 0,
            knights_to_buy: None,
            lr_path: None,
            has_largest_army: false,
            has_longest_road: false,
            la_eta: INFEASIBLE_ETA,
            lr_eta: INFEASIBLE_ETA,
            win_game_eta: 0,
        };
        tracker.refresh(state, count_hidden_points);
        tracker
    }

    pub fn player(&self) -> usize {
        self.player
    }

    pub fn estimator(&self) -> &FastEstimator {
        &self.estimator
    }

    pub fn ports(&self) -> &PortFlags {
        &self.ports
    }

    pub fn possible_roads(&self) -> &BTreeMap<EdgeId, PossibleRoad> {
        &self.roads
    }

    pub fn possible_settlements(&self) -> &BTreeMap<NodeId, PossibleSettlement> {
        &self.settlements
    }

    pub fn possible_cities(&self) -> &BTreeMap<NodeId, PossibleCity> {
        &self.cities
    }

    pub fn pending_initial_settlement(&self) -> Option<NodeId> {
        self.pending_initial_settlement
    }

    pub fn win_game_eta(&self) -> u32 {
        self.win_game_eta
    }

    pub fn la_eta(&self) -> u32 {
        self.la_eta
    }

    pub fn lr_eta(&self) -> u32 {
        self.lr_eta
    }

    /// Knights still to buy for Largest Army; `None` when out of reach or held.
    pub fn knights_to_buy(&self) -> Option<u32> {
        self.knights_to_buy
    }

    /// New roads, in build order, that would take Longest Road.
    pub fn longest_road_path(&self) -> Option<&[EdgeId]> {
        self.lr_path.as_deref()
    }

    pub fn roads_to_go_for_lr(&self) -> Option<usize> {
        self.lr_path.as_ref().map(Vec::len)
    }

    pub fn points(&self) -> u8 {
        self.points
    }

    pub(crate) fn set_pending_initial_settlement(&mut self, node: Option<NodeId>) {
        self.pending_initial_settlement = node;
    }

    /// Rebuilds every possible piece and the race data from the board.
    pub fn refresh(&mut self, state: &GameState, count_hidden_points: bool) {
        let owner = &state.players[self.player];
        self.estimator = FastEstimator::with_robber(
            ProductionProfile::for_player(state, self.player),
            Some(state.robber_tile),
        );
        self.ports = PortFlags::for_player(state, self.player);
        self.points = if count_hidden_points {
            owner.total_points()
        } else {
            owner.public_points()
        };
        self.vps_to_win = state.config.vps_to_win;
        self.settlements_left = owner.settlements_left();
        self.cities_left = owner.cities_left();
        self.roads_left = owner.roads_left();
        self.has_largest_army = owner.has_largest_army;
        self.has_longest_road = owner.has_longest_road;

        self.refresh_roads(state);
        self.refresh_settlements(state);
        self.refresh_cities(state);
        self.refresh_node_data(state);
        self.refresh_largest_army(state);
        self.refresh_longest_road(state);
        trace!(
            player = self.player,
            roads = self.roads.len(),
            settlements = self.settlements.len(),
            cities = self.cities.len(),
            "tracker refreshed"
        );
    }

    fn refresh_roads(&mut self, state: &GameState) {
        self.roads.clear();
        if self.roads_left == 0 {
            return;
        }
        for &edge in &state.map.land_edges {
            if state.is_legal_road(self.player, edge) {
                self.roads.insert(edge, PossibleRoad::new(self.player, edge));
            }
        }
        if self.roads_left < 2 {
            return;
        }
        let first_level: Vec<EdgeId> = self.roads.keys().copied().collect();
        for first in first_level {
            for end in [first.0, first.1] {
                if state.is_opponent_building(self.player, end) {
                    continue;
                }
                for &next in state.map.edges_of(end) {
                    if next == first || !state.is_open_edge(next) {
                        continue;
                    }
                    if self.roads.get(&next).is_some_and(PossibleRoad::is_buildable_now) {
                        continue;
                    }
                    let road = self
                        .roads
                        .entry(next)
                        .or_insert_with(|| PossibleRoad::new(self.player, next));
                    if !road.necessary_roads.contains(&first) {
                        road.necessary_roads.push(first);
                    }
                }
            }
        }
    }

    fn refresh_settlements(&mut self, state: &GameState) {
        self.settlements.clear();
        let owner = &state.players[self.player];
        if self.settlements_left == 0 || (owner.roads.is_empty() && owner.settlements.is_empty()) {
            return;
        }
        let before = self
            .estimator
            .estimates_from_nothing(&self.ports, DEFAULT_ROLL_LIMIT);

        for &node in &state.map.land_nodes {
            if !state.is_potential_settlement_spot(node) {
                continue;
            }
            let Some((necessary_roads, road_path)) = self.route_to(state, node) else {
                continue;
            };
            let after = FastEstimator::with_robber(
                self.estimator.profile().with_node(&state.map, node),
                Some(state.robber_tile),
            )
            .estimates_from_nothing(
                &self.ports.with(state.map.port_at(node)),
                DEFAULT_ROLL_LIMIT,
            );
            self.settlements.insert(
                node,
                PossibleSettlement {
                    player: self.player,
                    node,
                    necessary_roads,
                    road_path,
                    conflicts: BTreeSet::new(),
                    threats: BTreeSet::new(),
                    speedup: before.minus(&after),
                    eta: 0,
                    score: 0.0,
                },
            );
        }

        let nodes: Vec<NodeId> = self.settlements.keys().copied().collect();
        for node in &nodes {
            let conflicts: BTreeSet<NodeId> = nodes
                .iter()
                .copied()
                .filter(|other| state.map.are_adjacent(*node, *other))
                .collect();
            if let Some(settlement) = self.settlements.get_mut(node) {
                settlement.conflicts = conflicts;
            }
        }
    }

    /// Roads leading to `node` and the cheapest build order, if reachable.
    fn route_to(&self, state: &GameState, node: NodeId) -> Option<(RoadChain, Vec<EdgeId>)> {
        if state.touches_own_road(self.player, node) {
            return Some((RoadChain::new(), Vec::new()));
        }
        let leading: Vec<&PossibleRoad> = self
            .roads
            .values()
            .filter(|road| edge_contains_node(road.edge, node))
            .collect();
        let direct: RoadChain = leading
            .iter()
            .filter(|road| road.is_buildable_now())
            .map(|road| road.edge)
            .collect();
        if let Some(first) = direct.first() {
            let path = vec![*first];
            return Some((direct, path));
        }
        let two_step: RoadChain = leading.iter().map(|road| road.edge).collect();
        let via = leading.first()?;
        let before = *via.necessary_roads.first()?;
        Some((two_step, vec![before, via.edge]))
    }

    fn refresh_cities(&mut self, state: &GameState) {
        self.cities.clear();
        if self.cities_left == 0 {
            return;
        }
        let before = self
            .estimator
            .estimates_from_nothing(&self.ports, DEFAULT_ROLL_LIMIT);
        for &node in &state.players[self.player].settlements {
            if self.pending_initial_settlement == Some(node) {
                continue;
            }
            let after = FastEstimator::with_robber(
                self.estimator.profile().with_node(&state.map, node),
                Some(state.robber_tile),
            )
            .estimates_from_nothing(&self.ports, DEFAULT_ROLL_LIMIT);
            self.cities.insert(
                node,
                PossibleCity {
                    player: self.player,
                    node,
                    speedup: before.minus(&after),
                    score: 0.0,
                },
            );
        }
    }

    fn refresh_node_data(&mut self, state: &GameState) {
        self.node_production.clear();
        self.node_ports.clear();
        for &node in self.settlements.keys().chain(self.cities.keys()) {
            let entries = ProductionProfile::default()
                .with_node(&state.map, node)
                .entries()
                .to_vec();
            self.node_production.insert(node, entries);
            if let Some(kind) = state.map.port_at(node) {
                self.node_ports.insert(node, kind);
            }
        }
    }

    fn refresh_largest_army(&mut self, state: &GameState) {
        self.knights_to_buy = None;
        if self.has_largest_army {
            self.la_eta = 0;
            return;
        }
        let owner = &state.players[self.player];
        let threshold = match state.largest_army_holder() {
            Some(holder) => u32::from(state.players[holder].knights_played) + 1,
            None => 3,
        };
        let knights = u32::from(owner.knights_played)
            + owner.old_card_count(DevelopmentCard::Knight) as u32
            + owner.new_card_count(DevelopmentCard::Knight) as u32;
        let to_buy = threshold.saturating_sub(knights);
        if to_buy == 0 {
            self.knights_to_buy = Some(0);
            self.la_eta = 0;
            return;
        }
        if state.dev_deck_len() == 0 {
            self.la_eta = INFEASIBLE_ETA;
            return;
        }
        self.knights_to_buy = Some(to_buy);
        self.la_eta = self.estimator.rolls_or(
            &ResourceSet::EMPTY,
            &cost_times(&COST_DEVELOPMENT, to_buy),
            STEP_CUTOFF,
            &self.ports,
            INFEASIBLE_ETA,
        );
    }

    fn refresh_longest_road(&mut self, state: &GameState) {
        self.lr_path = None;
        if self.has_longest_road {
            self.lr_eta = 0;
            return;
        }
        let Some(path) = longest_road::roads_to_longest_road(state, self.player) else {
            self.lr_eta = INFEASIBLE_ETA;
            return;
        };
        self.lr_eta = self.estimator.rolls_or(
            &ResourceSet::EMPTY,
            &cost_times(&COST_ROAD, path.len() as u32),
            STEP_CUTOFF,
            &self.ports,
            INFEASIBLE_ETA,
        );
        self.lr_path = Some(path);
    }

    pub(crate) fn clear_threats(&mut self) {
        for road in self.roads.values_mut() {
            road.threats.clear();
        }
        for settlement in self.settlements.values_mut() {
            settlement.threats.clear();
        }
    }

    /// Recomputes this player's win-game ETA from its tracked pieces.
    pub fn recalc_win_game_eta(&mut self, max_game_length: u32) {
        self.win_game_eta = eta::win_game_eta(self, max_game_length);
    }

    /// Shortest road sequence from the player's network to `node`, by breadth-first search.
    pub fn road_path_to(&self, state: &GameState, node: NodeId) -> Option<Vec<EdgeId>> {
        self.settlements
            .get(&node)
            .map(|settlement| settlement.road_path.clone())
            .or_else(|| shortest_road_path(state, self.player, node, self.roads_left))
    }
}

/// Breadth-first search over open edges from the player's network, bounded by `limit` roads.
pub fn shortest_road_path(
    state: &GameState,
    player: usize,
    target: NodeId,
    limit: usize,
) -> Option<Vec<EdgeId>> {
    use std::collections::VecDeque;

    let owner = &state.players[player];
    let mut frontier: VecDeque<(NodeId, Vec<EdgeId>)> = VecDeque::new();
    let mut seen: BTreeSet<NodeId> = BTreeSet::new();
    for &(a, b) in &owner.roads {
        for node in [a, b] {
            if seen.insert(node) {
                frontier.push_back((node, Vec::new()));
            }
        }
    }
    for node in owner.buildings() {
        if seen.insert(node) {
            frontier.push_back((node, Vec::new()));
        }
    }
    while let Some((node, path)) = frontier.pop_front() {
        if node == target {
            return Some(path);
        }
        if path.len() >= limit || state.is_opponent_building(player, node) {
            continue;
        }
        for &edge in state.map.edges_of(node) {
            let next = other_end(edge, node);
            if state.is_open_edge(edge) && seen.insert(next) {
                let mut extended = path.clone();
                extended.push(edge);
                frontier.push_back((next, extended));
            }
        }
    }
    None
}
