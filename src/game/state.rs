use std::collections::{BTreeSet, HashMap, HashSet};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    board::{CatanMap, EdgeId, MapError, MapType, NodeId, PortKind, TileId, normalize_edge, other_end},
    types::{Color, DevelopmentCard, PieceType, Resource},
};

use super::{
    bank::Bank,
    players::PlayerState,
    resources::{COST_CITY, COST_DEVELOPMENT, COST_ROAD, COST_SETTLEMENT, ResourceSet},
};

pub const MIN_LONGEST_ROAD: u8 = 5;
pub const MIN_LARGEST_ARMY: u8 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub num_players: usize,
    pub map_type: MapType,
    pub vps_to_win: u8,
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            num_players: 4,
            map_type: MapType::Base,
            vps_to_win: 10,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    InitialPlacement,
    Playing,
    Completed { winner: Option<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Structure {
    Settlement { player: usize },
    City { player: usize },
}

impl Structure {
    pub fn owner(&self) -> usize {
        match self {
            Structure::Settlement { player } | Structure::City { player } => *player,
        }
    }

    fn multiplier(&self) -> u8 {
        match self {
            Structure::Settlement { .. } => 1,
            Structure::City { .. } => 2,
        }
    }
}

/// A board piece identified by where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PieceKey {
    Road(EdgeId),
    Settlement(NodeId),
    City(NodeId),
}

impl PieceKey {
    pub fn piece_type(&self) -> PieceType {
        match self {
            PieceKey::Road(_) => PieceType::Road,
            PieceKey::Settlement(_) => PieceType::Settlement,
            PieceKey::City(_) => PieceType::City,
        }
    }
}

/// One longest trail through a connected group of a player's roads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoadPath {
    pub start: NodeId,
    pub end: NodeId,
    pub length: u8,
}

impl RoadPath {
    pub fn has_endpoint(&self, node: NodeId) -> bool {
        self.start == node || self.end == node
    }
}

/// Undo token for a speculative placement.
#[derive(Debug)]
#[must_use = "a temporary piece stays on the board until undone"]
pub struct TempPlacement {
    player: usize,
    piece: PieceKey,
    prior_roads: Vec<(bool, u8)>,
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("game already completed")]
    GameFinished,
    #[error("games need 2 to 4 players, got {0}")]
    InvalidPlayerCount(usize),
    #[error("invalid player index {0}")]
    InvalidPlayer(usize),
    #[error("node {0} already occupied")]
    NodeOccupied(NodeId),
    #[error("cannot build adjacent to another settlement")]
    DistanceRuleViolation,
    #[error("piece must connect to the player's network")]
    MustConnectToNetwork,
    #[error("edge {0:?} is not a land edge")]
    EdgeNotFound(EdgeId),
    #[error("edge {0:?} already occupied")]
    EdgeOccupied(EdgeId),
    #[error("no {0} pieces left")]
    NoPiecesLeft(PieceType),
    #[error("insufficient resources")]
    InsufficientResources,
    #[error("bank resources unavailable")]
    BankOutOfResources,
    #[error("development deck is empty")]
    EmptyDeck,
    #[error("action not allowed: {0}")]
    IllegalAction(&'static str),
    #[error(transparent)]
    Map(#[from] MapError),
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub config: GameConfig,
    pub map: CatanMap,
    pub players: Vec<PlayerState>,
    pub bank: Bank,
    pub phase: GamePhase,
    pub current_player: usize,
    pub turn: u32,
    pub robber_tile: TileId,
    pub node_occupancy: HashMap<NodeId, Structure>,
    pub road_occupancy: HashMap<EdgeId, usize>,
    rng: StdRng,
}

impl GameState {
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        if !(2..=4).contains(&config.num_players) {
            return Err(GameError::InvalidPlayerCount(config.num_players));
        }
        let mut rng = StdRng::seed_from_u64(config.seed);
        let map = CatanMap::build_with_rng(config.map_type, &mut rng)?;
        Ok(Self::with_map(config, map, rng))
    }

    /// Builds a state around an already constructed board.
    pub fn with_map(config: GameConfig, map: CatanMap, mut rng: StdRng) -> Self {
        let robber_tile = map.desert().unwrap_or(0);
        let players = Color::ORDERED
            .iter()
            .take(config.num_players)
            .map(|color| PlayerState::new(*color))
            .collect();
        let bank = Bank::standard(&mut rng);
        Self {
            config,
            map,
            players,
            bank,
            phase: GamePhase::InitialPlacement,
            current_player: 0,
            turn: 0,
            robber_tile,
            node_occupancy: HashMap::new(),
            road_occupancy: HashMap::new(),
            rng,
        }
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, idx: usize) -> &PlayerState {
        &self.players[idx]
    }

    pub fn is_initial_placement(&self) -> bool {
        self.phase == GamePhase::InitialPlacement
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, GamePhase::Completed { .. })
    }

    pub fn owner_at(&self, node: NodeId) -> Option<usize> {
        self.node_occupancy.get(&node).map(Structure::owner)
    }

    pub fn road_owner(&self, edge: EdgeId) -> Option<usize> {
        self.road_occupancy.get(&normalize_edge(edge.0, edge.1)).copied()
    }

    pub fn is_opponent_building(&self, player: usize, node: NodeId) -> bool {
        self.owner_at(node).is_some_and(|owner| owner != player)
    }

    /// Free land node with no building on it or next to it.
    pub fn is_potential_settlement_spot(&self, node: NodeId) -> bool {
        self.map.land_nodes.contains(&node)
            && !self.node_occupancy.contains_key(&node)
            && self
                .map
                .neighbors(node)
                .all(|neighbor| !self.node_occupancy.contains_key(&neighbor))
    }

    pub fn validate_settlement(
        &self,
        player: usize,
        node: NodeId,
        require_network: bool,
    ) -> Result<(), GameError> {
        if self.players[player].settlements_left() == 0 {
            return Err(GameError::NoPiecesLeft(PieceType::Settlement));
        }
        if self.node_occupancy.contains_key(&node) {
            return Err(GameError::NodeOccupied(node));
        }
        if !self.is_potential_settlement_spot(node) {
            return Err(GameError::DistanceRuleViolation);
        }
        if require_network && !self.touches_own_road(player, node) {
            return Err(GameError::MustConnectToNetwork);
        }
        Ok(())
    }

    pub fn is_legal_settlement(&self, player: usize, node: NodeId, require_network: bool) -> bool {
        self.validate_settlement(player, node, require_network).is_ok()
    }

    pub fn validate_road(&self, player: usize, edge: EdgeId) -> Result<(), GameError> {
        let edge = normalize_edge(edge.0, edge.1);
        if self.players[player].roads_left() == 0 {
            return Err(GameError::NoPiecesLeft(PieceType::Road));
        }
        if !self.map.land_edges.contains(&edge) {
            return Err(GameError::EdgeNotFound(edge));
        }
        if self.road_occupancy.contains_key(&edge) {
            return Err(GameError::EdgeOccupied(edge));
        }
        let connected = [edge.0, edge.1].into_iter().any(|node| {
            self.players[player].owns_building_at(node)
                || (!self.is_opponent_building(player, node) && self.touches_own_road(player, node))
        });
        if !connected {
            return Err(GameError::MustConnectToNetwork);
        }
        Ok(())
    }

    pub fn is_legal_road(&self, player: usize, edge: EdgeId) -> bool {
        self.validate_road(player, edge).is_ok()
    }

    pub fn is_legal_city(&self, player: usize, node: NodeId) -> bool {
        let state = &self.players[player];
        state.cities_left() > 0 && state.settlements.contains(&node)
    }

    /// Land edge with no road on it.
    pub fn is_open_edge(&self, edge: EdgeId) -> bool {
        let edge = normalize_edge(edge.0, edge.1);
        self.map.land_edges.contains(&edge) && !self.road_occupancy.contains_key(&edge)
    }

    pub fn touches_own_road(&self, player: usize, node: NodeId) -> bool {
        self.map
            .edges_of(node)
            .iter()
            .any(|edge| self.road_occupancy.get(edge) == Some(&player))
    }

    pub fn player_ports(&self, player: usize) -> BTreeSet<Option<Resource>> {
        self.players[player]
            .buildings()
            .filter_map(|node| self.map.port_at(node))
            .collect()
    }

    pub fn maritime_rate(&self, player: usize, resource: Resource) -> u8 {
        let ports = self.player_ports(player);
        if ports.contains(&Some(resource)) {
            2
        } else if ports.contains(&PortKind::None) {
            3
        } else {
            4
        }
    }

    pub fn longest_road_holder(&self) -> Option<usize> {
        self.players.iter().position(|p| p.has_longest_road)
    }

    pub fn largest_army_holder(&self) -> Option<usize> {
        self.players.iter().position(|p| p.has_largest_army)
    }

    pub fn dev_deck_len(&self) -> usize {
        self.bank.development_deck_len()
    }

    pub fn robber_touches(&self, player: usize) -> bool {
        self.map
            .tile(self.robber_tile)
            .is_some_and(|tile| tile.node_ids().any(|n| self.owner_at(n) == Some(player)))
    }

    pub fn winner(&self) -> Option<usize> {
        self.players
            .iter()
            .position(|p| p.total_points() >= self.config.vps_to_win)
    }
}

// building
impl GameState {
    /// Places a settlement; initial ones are free and need no road.
    pub fn build_settlement(&mut self, player: usize, node: NodeId, initial: bool) -> Result<(), GameError> {
        self.validate_settlement(player, node, !initial)?;
        if !initial {
            self.pay_cost(player, &COST_SETTLEMENT)?;
        }
        self.put_settlement(player, node);
        self.update_longest_road();
        Ok(())
    }

    pub fn build_road(&mut self, player: usize, edge: EdgeId, free: bool) -> Result<(), GameError> {
        self.validate_road(player, edge)?;
        if !free {
            self.pay_cost(player, &COST_ROAD)?;
        }
        self.put_road(player, normalize_edge(edge.0, edge.1));
        self.update_longest_road();
        Ok(())
    }

    pub fn build_city(&mut self, player: usize, node: NodeId) -> Result<(), GameError> {
        if !self.is_legal_city(player, node) {
            return Err(GameError::IllegalAction("no settlement to upgrade"));
        }
        self.pay_cost(player, &COST_CITY)?;
        self.put_city(player, node);
        Ok(())
    }

    /// Removes a piece; used to reject a placement after the fact.
    pub fn remove_piece(&mut self, player: usize, piece: PieceKey) {
        match piece {
            PieceKey::Road(edge) => {
                let edge = normalize_edge(edge.0, edge.1);
                if self.road_occupancy.get(&edge) == Some(&player) {
                    self.road_occupancy.remove(&edge);
                    self.players[player].roads.remove(&edge);
                }
            }
            PieceKey::Settlement(node) => {
                if self.players[player].settlements.remove(&node) {
                    self.node_occupancy.remove(&node);
                }
            }
            PieceKey::City(node) => {
                if self.players[player].cities.remove(&node) {
                    self.players[player].settlements.insert(node);
                    self.node_occupancy
                        .insert(node, Structure::Settlement { player });
                }
            }
        }
        self.update_longest_road();
    }

    pub fn give_starting_resources(&mut self, player: usize, node: NodeId) {
        let mut set = ResourceSet::EMPTY;
        for tile in self.map.tiles_of(node) {
            if let Some(resource) = tile.resource {
                set.add(resource, 1);
            }
        }
        if self.bank.dispense(&set).is_ok() {
            self.players[player].add_resources(&set);
        }
    }

    fn put_settlement(&mut self, player: usize, node: NodeId) {
        self.players[player].settlements.insert(node);
        self.node_occupancy
            .insert(node, Structure::Settlement { player });
    }

    fn put_city(&mut self, player: usize, node: NodeId) {
        self.players[player].settlements.remove(&node);
        self.players[player].cities.insert(node);
        self.node_occupancy.insert(node, Structure::City { player });
    }

    fn put_road(&mut self, player: usize, edge: EdgeId) {
        self.players[player].roads.insert(edge);
        self.road_occupancy.insert(edge, player);
    }

    fn pay_cost(&mut self, player: usize, cost: &ResourceSet) -> Result<(), GameError> {
        self.players[player]
            .remove_resources(cost)
            .map_err(|_| GameError::InsufficientResources)?;
        self.bank.receive(cost);
        Ok(())
    }
}

// speculation
impl GameState {
    /// Puts a piece on the board without paying for it or checking connectivity.
    pub fn put_temp_piece(&mut self, player: usize, piece: PieceKey) -> Result<TempPlacement, GameError> {
        if player >= self.players.len() {
            return Err(GameError::InvalidPlayer(player));
        }
        let prior_roads = self
            .players
            .iter()
            .map(|p| (p.has_longest_road, p.longest_road_length))
            .collect();
        match piece {
            PieceKey::Road(edge) => {
                if !self.is_open_edge(edge) {
                    return Err(GameError::EdgeOccupied(edge));
                }
                self.put_road(player, normalize_edge(edge.0, edge.1));
            }
            PieceKey::Settlement(node) => {
                if self.node_occupancy.contains_key(&node) {
                    return Err(GameError::NodeOccupied(node));
                }
                self.put_settlement(player, node);
            }
            PieceKey::City(node) => {
                if !self.players[player].settlements.contains(&node) {
                    return Err(GameError::IllegalAction("no settlement to upgrade"));
                }
                self.put_city(player, node);
            }
        }
        self.update_longest_road();
        trace!(player, ?piece, "temporary piece placed");
        Ok(TempPlacement {
            player,
            piece,
            prior_roads,
        })
    }

    pub fn undo_temp_piece(&mut self, token: TempPlacement) {
        let TempPlacement {
            player,
            piece,
            prior_roads,
        } = token;
        match piece {
            PieceKey::Road(edge) => {
                let edge = normalize_edge(edge.0, edge.1);
                self.road_occupancy.remove(&edge);
                self.players[player].roads.remove(&edge);
            }
            PieceKey::Settlement(node) => {
                self.node_occupancy.remove(&node);
                self.players[player].settlements.remove(&node);
            }
            PieceKey::City(node) => {
                self.players[player].cities.remove(&node);
                self.put_settlement(player, node);
            }
        }
        for (state, (has_longest, length)) in self.players.iter_mut().zip(prior_roads) {
            state.has_longest_road = has_longest;
            state.longest_road_length = length;
        }
        trace!(player, ?piece, "temporary piece removed");
    }

    /// Runs `f` with `piece` on the board and always takes it back off.
    pub fn with_temp_piece<R>(
        &mut self,
        player: usize,
        piece: PieceKey,
        f: impl FnOnce(&mut GameState) -> R,
    ) -> Result<R, GameError> {
        let token = self.put_temp_piece(player, piece)?;
        let result = f(self);
        self.undo_temp_piece(token);
        Ok(result)
    }

    /// Runs `f` as if `player` had played one more knight.
    pub fn with_extra_knight<R>(&mut self, player: usize, f: impl FnOnce(&mut GameState) -> R) -> R {
        let prior_army: Vec<bool> = self.players.iter().map(|p| p.has_largest_army).collect();
        self.players[player].knights_played += 1;
        self.update_largest_army();
        let result = f(self);
        self.players[player].knights_played -= 1;
        for (state, held) in self.players.iter_mut().zip(prior_army) {
            state.has_largest_army = held;
        }
        result
    }

    /// Runs `f` as if `player` held one more victory point card.
    pub fn with_extra_victory_card<R>(&mut self, player: usize, f: impl FnOnce(&mut GameState) -> R) -> R {
        self.players[player].victory_cards += 1;
        let result = f(self);
        self.players[player].victory_cards -= 1;
        result
    }
}

// turn flow
impl GameState {
    pub fn start_play(&mut self) {
        self.phase = GamePhase::Playing;
        self.current_player = 0;
        self.turn = 1;
    }

    pub fn roll_dice(&mut self) -> (u8, u8) {
        (self.rng.gen_range(1..=6), self.rng.gen_range(1..=6))
    }

    /// Hands out production for `dice_sum`; returns what each player received.
    pub fn distribute_resources(&mut self, dice_sum: u8) -> Vec<ResourceSet> {
        let mut received = vec![ResourceSet::EMPTY; self.players.len()];
        let producing: Vec<(Resource, Vec<NodeId>)> = self
            .map
            .land_tiles
            .values()
            .filter(|tile| tile.number == Some(dice_sum) && tile.id != self.robber_tile)
            .filter_map(|tile| tile.resource.map(|r| (r, tile.node_ids().collect())))
            .collect();
        for (resource, nodes) in producing {
            for node in nodes {
                let Some(structure) = self.node_occupancy.get(&node).copied() else {
                    continue;
                };
                let set = ResourceSet::single(resource, structure.multiplier());
                if self.bank.dispense(&set).is_ok() {
                    self.players[structure.owner()].add_resources(&set);
                    received[structure.owner()].add_set(&set);
                }
            }
        }
        received
    }

    pub fn discard(&mut self, player: usize, set: &ResourceSet) -> Result<(), GameError> {
        self.players[player]
            .remove_resources(set)
            .map_err(|_| GameError::InsufficientResources)?;
        self.bank.receive(set);
        Ok(())
    }

    /// Moves the robber and steals a random card from `victim`.
    pub fn move_robber(&mut self, thief: usize, tile: TileId, victim: Option<usize>) -> Result<Option<Resource>, GameError> {
        if tile == self.robber_tile || self.map.tile(tile).is_none() {
            return Err(GameError::IllegalAction("robber must move to another land hex"));
        }
        self.robber_tile = tile;
        let Some(victim) = victim else {
            return Ok(None);
        };
        if victim >= self.players.len() || victim == thief {
            return Err(GameError::InvalidPlayer(victim));
        }
        let bag: Vec<Resource> = self.players[victim]
            .resources
            .iter()
            .flat_map(|(resource, n)| std::iter::repeat(resource).take(n as usize))
            .collect();
        if bag.is_empty() {
            return Ok(None);
        }
        let stolen = bag[self.rng.gen_range(0..bag.len())];
        self.players[victim]
            .resources
            .subtract(stolen, 1)
            .map_err(|_| GameError::InsufficientResources)?;
        self.players[thief].resources.add(stolen, 1);
        Ok(Some(stolen))
    }

    pub fn buy_development_card(&mut self, player: usize) -> Result<DevelopmentCard, GameError> {
        if self.bank.development_deck_len() == 0 {
            return Err(GameError::EmptyDeck);
        }
        self.pay_cost(player, &COST_DEVELOPMENT)?;
        let card = self.bank.draw_development_card().ok_or(GameError::EmptyDeck)?;
        self.players[player].add_dev_card(card);
        Ok(card)
    }

    pub fn play_knight(&mut self, player: usize) -> Result<(), GameError> {
        self.consume_card(player, DevelopmentCard::Knight)?;
        self.update_largest_army();
        Ok(())
    }

    pub fn play_year_of_plenty(&mut self, player: usize, picks: &ResourceSet) -> Result<(), GameError> {
        if picks.known_total() == 0 || picks.known_total() > 2 {
            return Err(GameError::IllegalAction("year of plenty takes one or two resources"));
        }
        self.bank
            .dispense(picks)
            .map_err(|_| GameError::BankOutOfResources)?;
        self.consume_card(player, DevelopmentCard::YearOfPlenty)?;
        self.players[player].add_resources(picks);
        Ok(())
    }

    pub fn play_monopoly(&mut self, player: usize, resource: Resource) -> Result<u8, GameError> {
        self.consume_card(player, DevelopmentCard::Monopoly)?;
        let mut taken = 0u8;
        for (idx, other) in self.players.iter_mut().enumerate() {
            if idx == player {
                continue;
            }
            let amount = other.resources.get(resource);
            other.resources.set(resource, 0);
            taken = taken.saturating_add(amount);
        }
        self.players[player].resources.add(resource, taken);
        Ok(taken)
    }

    pub fn play_road_building(&mut self, player: usize) -> Result<(), GameError> {
        self.consume_card(player, DevelopmentCard::RoadBuilding)
    }

    pub fn maritime_trade(&mut self, player: usize, give: Resource, get: Resource) -> Result<(), GameError> {
        if give == get {
            return Err(GameError::IllegalAction("maritime trade needs two kinds"));
        }
        let rate = self.maritime_rate(player, give);
        let give_set = ResourceSet::single(give, rate);
        let get_set = ResourceSet::single(get, 1);
        if !self.players[player].resources.contains(&give_set) {
            return Err(GameError::InsufficientResources);
        }
        self.bank
            .dispense(&get_set)
            .map_err(|_| GameError::BankOutOfResources)?;
        self.discard(player, &give_set)?;
        self.players[player].add_resources(&get_set);
        Ok(())
    }

    /// `from` hands over `give` and receives `get` from `to`.
    pub fn domestic_trade(
        &mut self,
        from: usize,
        to: usize,
        give: &ResourceSet,
        get: &ResourceSet,
    ) -> Result<(), GameError> {
        if !self.players[from].resources.contains(give) || !self.players[to].resources.contains(get) {
            return Err(GameError::InsufficientResources);
        }
        self.players[from]
            .remove_resources(give)
            .map_err(|_| GameError::InsufficientResources)?;
        self.players[to]
            .remove_resources(get)
            .map_err(|_| GameError::InsufficientResources)?;
        self.players[from].add_resources(get);
        self.players[to].add_resources(give);
        Ok(())
    }

    pub fn end_turn(&mut self) {
        self.players[self.current_player].reset_for_new_turn();
        self.current_player = (self.current_player + 1) % self.players.len();
        self.turn += 1;
    }

    pub fn check_victory(&mut self) -> Option<usize> {
        if let GamePhase::Completed { winner } = self.phase {
            return winner;
        }
        let winner = self.winner();
        if winner.is_some() {
            self.phase = GamePhase::Completed { winner };
        }
        winner
    }

    fn consume_card(&mut self, player: usize, card: DevelopmentCard) -> Result<(), GameError> {
        if self.players[player].consume_dev_card(card) {
            Ok(())
        } else {
            Err(GameError::IllegalAction("card not playable"))
        }
    }
}

// longest road and largest army
impl GameState {
    fn update_longest_road(&mut self) {
        let lengths: Vec<u8> = (0..self.players.len())
            .map(|idx| self.player_longest_road(idx))
            .collect();
        let holder = self.longest_road_holder();
        let best = lengths.iter().copied().max().unwrap_or(0);
        let new_holder = if best < MIN_LONGEST_ROAD {
            None
        } else if holder.is_some_and(|h| lengths[h] == best) {
            holder
        } else {
            let mut leaders = lengths.iter().enumerate().filter(|(_, len)| **len == best);
            match (leaders.next(), leaders.next()) {
                (Some((idx, _)), None) => Some(idx),
                _ => None,
            }
        };
        for (idx, player) in self.players.iter_mut().enumerate() {
            player.longest_road_length = lengths[idx];
            player.has_longest_road = new_holder == Some(idx);
        }
    }

    fn update_largest_army(&mut self) {
        let holder = self.largest_army_holder();
        let held = holder.map_or(0, |h| self.players[h].knights_played);
        let challenger = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.knights_played >= MIN_LARGEST_ARMY && p.knights_played > held)
            .max_by_key(|(_, p)| p.knights_played)
            .map(|(idx, _)| idx);
        if let Some(new_holder) = challenger {
            for (idx, player) in self.players.iter_mut().enumerate() {
                player.has_largest_army = idx == new_holder;
            }
        }
    }

    pub fn player_longest_road(&self, player: usize) -> u8 {
        self.road_paths(player)
            .iter()
            .map(|path| path.length)
            .max()
            .unwrap_or(0)
    }

    /// The longest trail of each connected group of `player`'s roads.
    pub fn road_paths(&self, player: usize) -> Vec<RoadPath> {
        let roads = &self.players[player].roads;
        let mut seen_nodes: HashSet<NodeId> = HashSet::new();
        let mut paths = Vec::new();
        let nodes: BTreeSet<NodeId> = roads.iter().flat_map(|&(a, b)| [a, b]).collect();
        for &start in &nodes {
            if seen_nodes.contains(&start) {
                continue;
            }
            let component = self.road_component(player, start);
            let mut best: Option<RoadPath> = None;
            for &node in &component {
                let (length, end) = self.longest_from_node(player, node, node, &mut HashSet::new());
                let candidate = RoadPath {
                    start: node.min(end),
                    end: node.max(end),
                    length,
                };
                if best.is_none_or(|b| candidate.length > b.length) {
                    best = Some(candidate);
                }
            }
            seen_nodes.extend(component);
            paths.extend(best);
        }
        paths
    }

    fn road_component(&self, player: usize, start: NodeId) -> BTreeSet<NodeId> {
        let mut component = BTreeSet::from([start]);
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for edge in self.map.edges_of(node) {
                if self.road_occupancy.get(edge) != Some(&player) {
                    continue;
                }
                let next = other_end(*edge, node);
                if component.insert(next) {
                    stack.push(next);
                }
            }
        }
        component
    }

    fn longest_from_node(
        &self,
        player: usize,
        origin: NodeId,
        node: NodeId,
        visited_edges: &mut HashSet<EdgeId>,
    ) -> (u8, NodeId) {
        let mut best = (0, node);
        // an opponent building cuts the trail, but a trail may still start there
        if node != origin && self.is_opponent_building(player, node) {
            return best;
        }
        for edge in self.map.edges_of(node) {
            if self.road_occupancy.get(edge) != Some(&player) || visited_edges.contains(edge) {
                continue;
            }
            visited_edges.insert(*edge);
            let (length, end) = self.longest_from_node(player, origin, other_end(*edge, node), visited_edges);
            visited_edges.remove(edge);
            if length + 1 > best.0 {
                best = (length + 1, end);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_state(seed: u64) -> GameState {
        GameState::new(GameConfig {
            seed,
            ..GameConfig::default()
        })
        .expect("state builds")
    }

    /// A straight trail of `len` edges starting at some land node, following land edges.
    fn trail(state: &GameState, len: usize) -> Vec<EdgeId> {
        for &start in &state.map.land_nodes {
            let mut path = Vec::new();
            let mut node = start;
            let mut visited = HashSet::from([start]);
            while path.len() < len {
                let next = state
                    .map
                    .edges_of(node)
                    .iter()
                    .find(|e| !visited.contains(&other_end(**e, node)));
                let Some(edge) = next else { break };
                node = other_end(*edge, node);
                visited.insert(node);
                path.push(*edge);
            }
            if path.len() == len {
                return path;
            }
        }
        panic!("no trail of length {len}");
    }

    fn lay_roads(state: &mut GameState, player: usize, edges: &[EdgeId]) {
        for edge in edges {
            state.put_road(player, *edge);
        }
        state.update_longest_road();
    }

    #[test]
    fn temp_piece_round_trip_restores_board() {
        let mut state = new_state(5);
        let node = *state.map.land_nodes.iter().next().expect("node");
        let token = state.put_temp_piece(0, PieceKey::Settlement(node)).expect("placed");
        assert_eq!(state.owner_at(node), Some(0));
        state.undo_temp_piece(token);
        assert_eq!(state.owner_at(node), None);
        assert!(state.players[0].settlements.is_empty());
    }

    #[test]
    fn with_temp_piece_undoes_after_closure() {
        let mut state = new_state(5);
        let edges = trail(&state, 5);
        lay_roads(&mut state, 1, &edges[..4]);
        let seen = state
            .with_temp_piece(1, PieceKey::Road(edges[4]), |s| s.players[1].has_longest_road)
            .expect("placed");
        assert!(seen);
        assert!(!state.players[1].has_longest_road);
        assert_eq!(state.players[1].longest_road_length, 4);
    }

    #[test]
    fn road_needs_connection_and_stops_at_opponent_buildings() {
        let mut state = new_state(9);
        let edges = trail(&state, 3);
        let (a, b) = edges[0];
        let (start, middle) = if edges[1].0 == b || edges[1].1 == b { (a, b) } else { (b, a) };
        state.build_settlement(0, start, true).expect("initial settlement");
        assert!(state.is_legal_road(0, edges[0]));
        assert!(!state.is_legal_road(0, edges[1]));
        state.build_road(0, edges[0], true).expect("road");
        assert!(state.is_legal_road(0, edges[1]));
        state.put_settlement(1, middle);
        assert!(!state.is_legal_road(0, edges[1]));
    }

    #[test]
    fn longest_road_needs_five_segments() {
        let mut state = new_state(13);
        let edges = trail(&state, 5);
        lay_roads(&mut state, 0, &edges[..4]);
        assert_eq!(state.longest_road_holder(), None);
        lay_roads(&mut state, 0, &edges[4..]);
        assert_eq!(state.longest_road_holder(), Some(0));
        let paths = state.road_paths(0);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].length, 5);
    }

    #[test]
    fn opponent_settlement_splits_a_trail() {
        let mut state = new_state(13);
        let edges = trail(&state, 4);
        lay_roads(&mut state, 0, &edges);
        let cut = if edges[1].0 == edges[2].0 || edges[1].0 == edges[2].1 {
            edges[1].0
        } else {
            edges[1].1
        };
        state.put_settlement(1, cut);
        assert_eq!(state.player_longest_road(0), 2);
    }

    #[test]
    fn largest_army_needs_three_and_a_strict_lead() {
        let mut state = new_state(21);
        state.players[0].knights_played = 3;
        state.update_largest_army();
        assert_eq!(state.largest_army_holder(), Some(0));
        state.players[1].knights_played = 3;
        state.update_largest_army();
        assert_eq!(state.largest_army_holder(), Some(0));
        state.players[1].knights_played = 4;
        state.update_largest_army();
        assert_eq!(state.largest_army_holder(), Some(1));
    }

    #[test]
    fn maritime_rate_follows_ports() {
        let mut state = new_state(2);
        let generic = state
            .map
            .port_nodes
            .get(&None)
            .and_then(|nodes| nodes.iter().next().copied())
            .expect("generic port");
        assert_eq!(state.maritime_rate(0, Resource::Wood), 4);
        state.put_settlement(0, generic);
        assert_eq!(state.maritime_rate(0, Resource::Wood), 3);
    }
}
