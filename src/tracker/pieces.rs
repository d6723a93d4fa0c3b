use std::collections::BTreeSet;

use serde::Serialize;
use smallvec::SmallVec;

use crate::board::{EdgeId, NodeId};
use crate::game::{PieceKey, ResourceSet, cost_of};
use crate::types::PieceType;

/// Roads that must be built first, at most two in practice.
pub type RoadChain = SmallVec<[EdgeId; 2]>;

/// Another player's possible piece that could take a spot first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Threat {
    Road { player: usize, edge: EdgeId },
    Settlement { player: usize, node: NodeId },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PossibleRoad {
    pub player: usize,
    pub edge: EdgeId,
    /// Roads one step closer to the network that lead here.
    pub necessary_roads: RoadChain,
    pub threats: BTreeSet<Threat>,
    pub score: f64,
}

impl PossibleRoad {
    pub fn new(player: usize, edge: EdgeId) -> Self {
        Self {
            player,
            edge,
            necessary_roads: RoadChain::new(),
            threats: BTreeSet::new(),
            score: 0.0,
        }
    }

    pub fn is_buildable_now(&self) -> bool {
        self.necessary_roads.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PossibleSettlement {
    pub player: usize,
    pub node: NodeId,
    /// Possible roads ending at this node.
    pub necessary_roads: RoadChain,
    /// Shortest road sequence to reach the node, first to build first.
    pub road_path: Vec<EdgeId>,
    /// Our own adjacent possible settlements; building one rules out the other.
    pub conflicts: BTreeSet<NodeId>,
    pub threats: BTreeSet<Threat>,
    /// Per piece type, rolls saved by owning this node.
    pub speedup: [i32; 4],
    pub eta: u32,
    pub score: f64,
}

impl PossibleSettlement {
    pub fn speedup_total(&self) -> i32 {
        self.speedup.iter().sum()
    }

    pub fn is_buildable_now(&self) -> bool {
        self.necessary_roads.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PossibleCity {
    pub player: usize,
    pub node: NodeId,
    pub speedup: [i32; 4],
    pub score: f64,
}

impl PossibleCity {
    pub fn speedup_total(&self) -> i32 {
        self.speedup.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PossibleCard {
    pub player: usize,
    pub eta: u32,
    pub score: f64,
}

/// Something a player might build or buy later.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PossiblePiece {
    Road(PossibleRoad),
    Settlement(PossibleSettlement),
    City(PossibleCity),
    Card(PossibleCard),
}

impl PossiblePiece {
    pub fn piece_type(&self) -> PieceType {
        match self {
            PossiblePiece::Road(_) => PieceType::Road,
            PossiblePiece::Settlement(_) => PieceType::Settlement,
            PossiblePiece::City(_) => PieceType::City,
            PossiblePiece::Card(_) => PieceType::Card,
        }
    }

    pub fn cost(&self) -> ResourceSet {
        cost_of(self.piece_type())
    }

    pub fn player(&self) -> usize {
        match self {
            PossiblePiece::Road(road) => road.player,
            PossiblePiece::Settlement(settlement) => settlement.player,
            PossiblePiece::City(city) => city.player,
            PossiblePiece::Card(card) => card.player,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            PossiblePiece::Road(road) => road.score,
            PossiblePiece::Settlement(settlement) => settlement.score,
            PossiblePiece::City(city) => city.score,
            PossiblePiece::Card(card) => card.score,
        }
    }

    /// Board location, `None` for a card.
    pub fn key(&self) -> Option<PieceKey> {
        match self {
            PossiblePiece::Road(road) => Some(PieceKey::Road(road.edge)),
            PossiblePiece::Settlement(settlement) => Some(PieceKey::Settlement(settlement.node)),
            PossiblePiece::City(city) => Some(PieceKey::City(city.node)),
            PossiblePiece::Card(_) => None,
        }
    }

    pub fn threats(&self) -> Option<&BTreeSet<Threat>> {
        match self {
            PossiblePiece::Road(road) => Some(&road.threats),
            PossiblePiece::Settlement(settlement) => Some(&settlement.threats),
            PossiblePiece::City(_) | PossiblePiece::Card(_) => None,
        }
    }

    /// Whether `other`, planned by its owner, would take this piece's spot or race it.
    pub fn races(&self, other: &PossiblePiece) -> bool {
        let threatened = match (self.threats(), other) {
            (Some(threats), PossiblePiece::Road(road)) => threats.contains(&Threat::Road {
                player: road.player,
                edge: road.edge,
            }),
            (Some(threats), PossiblePiece::Settlement(settlement)) => {
                threats.contains(&Threat::Settlement {
                    player: settlement.player,
                    node: settlement.node,
                })
            }
            _ => false,
        };
        if threatened {
            return true;
        }
        match (self, other) {
            (PossiblePiece::Settlement(ours), PossiblePiece::Settlement(theirs)) => {
                ours.conflicts.contains(&theirs.node)
            }
            _ => false,
        }
    }
}
