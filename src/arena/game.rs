use std::time::{Duration, Instant};

use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::brain::RobotBrain;
use crate::config::RobotParameters;
use crate::game::{GameConfig, GameError, GamePhase, GameState, PieceKey};
use crate::negotiator::{OfferResponse, TradeOffer};
use crate::types::Color;

pub const TURNS_LIMIT: u32 = 1000;
const MAX_OFFERS_PER_TURN: usize = 3;
const MAX_BANK_TRADES_PER_TURN: usize = 4;
const MAX_BUILDS_PER_TURN: usize = 10;
const DISCARD_LIMIT: u32 = 7;

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("{got} seats for a {expected} player game")]
    SeatCount { expected: usize, got: usize },
    #[error("seat {0} found no legal initial placement")]
    NoPlacement(usize),
}

/// How one game ended.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub id: Uuid,
    pub seed: u64,
    pub winner: Option<usize>,
    pub winner_color: Option<Color>,
    pub turns: u32,
    pub points: Vec<u8>,
    pub trades: u32,
    pub duration: Duration,
}

/// One game: the authoritative state plus a brain per seat.
pub struct Match {
    pub id: Uuid,
    pub seed: u64,
    pub state: GameState,
    brains: Vec<RobotBrain>,
    trades: u32,
}

impl Match {
    pub fn new(config: GameConfig, seats: &[RobotParameters]) -> Result<Self, ArenaError> {
        if seats.len() != config.num_players {
            return Err(ArenaError::SeatCount {
                expected: config.num_players,
                got: seats.len(),
            });
        }
        let seed = config.seed;
        let state = GameState::new(config)?;
        let brains = seats
            .iter()
            .enumerate()
            .map(|(player, params)| RobotBrain::new(&state, player, params.clone(), seed))
            .collect();
        Ok(Self {
            id: Uuid::new_v4(),
            seed,
            state,
            brains,
            trades: 0,
        })
    }

    pub fn brain(&self, player: usize) -> &RobotBrain {
        &self.brains[player]
    }

    pub fn winner(&self) -> Option<usize> {
        match self.state.phase {
            GamePhase::Completed { winner } => winner,
            _ => None,
        }
    }

    pub fn play(&mut self) -> Result<MatchOutcome, ArenaError> {
        let start = Instant::now();
        self.initial_placement()?;
        self.state.start_play();
        while self.state.check_victory().is_none() && self.state.turn < TURNS_LIMIT {
            self.play_turn()?;
        }
        let outcome = MatchOutcome {
            id: self.id,
            seed: self.seed,
            winner: self.winner(),
            winner_color: self.winner().map(|p| self.state.players[p].color),
            turns: self.state.turn,
            points: self.state.players.iter().map(|p| p.total_points()).collect(),
            trades: self.trades,
            duration: start.elapsed(),
        };
        info!(id = %self.id, winner = ?outcome.winner, turns = outcome.turns, trades = outcome.trades, "game over");
        Ok(outcome)
    }

    fn broadcast(&mut self, player: usize, piece: PieceKey) {
        for brain in &mut self.brains {
            brain.on_piece_placed(&self.state, player, piece);
        }
    }

    /// Snake order: every seat once, then back again; the second settlement pays out.
    fn initial_placement(&mut self) -> Result<(), ArenaError> {
        let n = self.state.num_players();
        let order: Vec<(usize, bool)> = (0..n)
            .map(|p| (p, false))
            .chain((0..n).rev().map(|p| (p, true)))
            .collect();
        for (player, second) in order {
            self.state.current_player = player;
            let node = self.brains[player]
                .choose_initial_settlement(&self.state)
                .ok_or(ArenaError::NoPlacement(player))?;
            self.state.build_settlement(player, node, true)?;
            if second {
                self.state.give_starting_resources(player, node);
            }
            self.broadcast(player, PieceKey::Settlement(node));

            let edge = self.brains[player]
                .choose_initial_road(&self.state, node)
                .ok_or(ArenaError::NoPlacement(player))?;
            self.state.build_road(player, edge, true)?;
            self.broadcast(player, PieceKey::Road(edge));
        }
        Ok(())
    }

    fn play_turn(&mut self) -> Result<(), ArenaError> {
        let player = self.state.current_player;
        for brain in &mut self.brains {
            brain.on_turn_start(&self.state);
        }

        if self.brains[player].wants_knight(&self.state) {
            self.play_knight(player)?;
        }
        let (a, b) = self.state.roll_dice();
        let roll = a + b;
        trace!(turn = self.state.turn, player, roll, "rolled");
        if roll == 7 {
            self.resolve_seven(player)?;
        } else {
            self.state.distribute_resources(roll);
        }

        self.play_cards(player)?;
        if self.state.check_victory().is_none() {
            self.trade(player);
            self.build(player);
        }
        if self.state.check_victory().is_none() {
            self.state.end_turn();
        }
        Ok(())
    }

    fn resolve_seven(&mut self, player: usize) -> Result<(), ArenaError> {
        for seat in 0..self.state.num_players() {
            let total = self.state.players[seat].resources.total();
            if total > DISCARD_LIMIT {
                let discards = self.brains[seat].choose_discards(&self.state, total / 2);
                self.state.discard(seat, &discards)?;
                debug!(seat, %discards, "discarded");
            }
        }
        self.move_robber(player)
    }

    fn move_robber(&mut self, player: usize) -> Result<(), ArenaError> {
        let tile = self.brains[player].choose_robber_hex(&self.state);
        let mut victims: Vec<usize> = self
            .state
            .map
            .tile(tile)
            .map(|tile| {
                tile.node_ids()
                    .filter_map(|node| self.state.owner_at(node))
                    .collect()
            })
            .unwrap_or_default();
        victims.sort_unstable();
        victims.dedup();
        victims.retain(|&p| p != player && self.state.players[p].resources.total() > 0);
        let victim = self.brains[player].choose_robber_victim(&victims);
        let stolen = self.state.move_robber(player, tile, victim)?;
        debug!(player, tile, ?victim, ?stolen, "robber moved");
        Ok(())
    }

    fn play_knight(&mut self, player: usize) -> Result<(), ArenaError> {
        self.state.play_knight(player)?;
        self.move_robber(player)
    }

    /// At most one card per turn; a refused play is skipped.
    fn play_cards(&mut self, player: usize) -> Result<(), ArenaError> {
        if let Some(resource) = self.brains[player].wants_monopoly(&self.state) {
            let taken = self.state.play_monopoly(player, resource)?;
            debug!(player, %resource, taken, "monopoly");
        } else if self.brains[player].wants_discovery(&self.state) {
            let picks = self.brains[player].choose_free_resources(&self.state);
            if let Err(err) = self.state.play_year_of_plenty(player, &picks) {
                debug!(player, %picks, %err, "year of plenty refused");
            }
        } else if self.brains[player].wants_road_building(&self.state) {
            self.state.play_road_building(player)?;
            for _ in 0..2 {
                let Some(edge) = self.brains[player].choose_free_road(&mut self.state) else {
                    break;
                };
                match self.state.build_road(player, edge, true) {
                    Ok(()) => self.broadcast(player, PieceKey::Road(edge)),
                    Err(err) => {
                        debug!(player, ?edge, %err, "free road refused");
                        self.brains[player].on_piece_rejected(&self.state, PieceKey::Road(edge));
                    }
                }
            }
        } else if self.brains[player].wants_knight(&self.state) {
            self.play_knight(player)?;
        }
        Ok(())
    }

    fn trade(&mut self, player: usize) {
        for _ in 0..MAX_OFFERS_PER_TURN {
            let Some(offer) = self.brains[player].make_offer(&mut self.state) else {
                break;
            };
            if !self.negotiate(&offer) {
                break;
            }
        }
        for _ in 0..MAX_BANK_TRADES_PER_TURN {
            let Some(offer) = self.brains[player].offer_to_bank(&mut self.state) else {
                break;
            };
            let (Some(give), Some(get)) = (offer.give.kinds().next(), offer.get.kinds().next()) else {
                break;
            };
            if let Err(err) = self.state.maritime_trade(player, give, get) {
                debug!(player, %offer, %err, "bank trade refused");
                break;
            }
            trace!(player, %offer, "bank trade");
        }
    }

    /// Puts `offer` to its recipients in seat order; true once a trade goes through.
    fn negotiate(&mut self, offer: &TradeOffer) -> bool {
        let sender = offer.from;
        let recipients: Vec<usize> = offer.to.iter().copied().collect();
        for &receiver in &recipients {
            if offer.is_partial() {
                let (response, completed) = self.brains[receiver].handle_partial_offer(&mut self.state, offer);
                if let (OfferResponse::Complete, Some(completed)) = (response, completed) {
                    let inverse = TradeOffer::new(receiver, [sender], completed.get, completed.give);
                    if self.brains[sender].consider_offer(&mut self.state, &inverse) == OfferResponse::Accept
                        && self.execute(sender, receiver, &completed)
                    {
                        return true;
                    }
                }
                continue;
            }

            match self.brains[receiver].consider_offer(&mut self.state, offer) {
                OfferResponse::Accept => {
                    if self.execute(sender, receiver, offer) {
                        return true;
                    }
                }
                OfferResponse::Counter => {
                    let Some(counter) = self.brains[receiver].make_counter_offer(&mut self.state, offer) else {
                        self.brains[sender].on_offer_rejected(receiver, offer);
                        continue;
                    };
                    let accepted =
                        self.brains[sender].consider_offer(&mut self.state, &counter) == OfferResponse::Accept;
                    if accepted && self.execute(receiver, sender, &counter) {
                        return true;
                    }
                    self.brains[sender].on_offer_rejected(receiver, offer);
                }
                OfferResponse::Reject | OfferResponse::Complete => {
                    self.brains[sender].on_offer_rejected(receiver, offer);
                }
            }
        }
        if offer.is_partial() {
            self.brains[sender].on_offer_unanswered(offer);
        }
        false
    }

    fn execute(&mut self, from: usize, to: usize, offer: &TradeOffer) -> bool {
        match self.state.domestic_trade(from, to, &offer.give, &offer.get) {
            Ok(()) => {
                self.trades += 1;
                debug!(from, to, %offer, "trade done");
                true
            }
            Err(err) => {
                debug!(from, to, %offer, %err, "trade failed");
                false
            }
        }
    }

    fn build(&mut self, player: usize) {
        for _ in 0..MAX_BUILDS_PER_TURN {
            let Some(piece) = self.brains[player].next_build(&mut self.state) else {
                break;
            };
            let key = piece.key();
            let result = match key {
                Some(PieceKey::Road(edge)) => self.state.build_road(player, edge, false),
                Some(PieceKey::Settlement(node)) => self.state.build_settlement(player, node, false),
                Some(PieceKey::City(node)) => self.state.build_city(player, node),
                None => self.state.buy_development_card(player).map(|card| {
                    trace!(player, %card, "bought card");
                }),
            };
            match (result, key) {
                (Ok(()), Some(key)) => self.broadcast(player, key),
                (Ok(()), None) => {}
                (Err(err), Some(key)) => {
                    debug!(player, ?key, %err, "build refused");
                    self.brains[player].on_piece_rejected(&self.state, key);
                }
                (Err(err), None) => {
                    debug!(player, %err, "card purchase refused");
                    break;
                }
            }
            if self.state.check_victory().is_some() {
                break;
            }
        }
    }
}
