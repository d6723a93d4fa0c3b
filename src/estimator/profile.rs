use serde::{Deserialize, Serialize};

use crate::board::{CatanMap, NodeId, PortKind, TileId, dice_weight};
use crate::game::GameState;
use crate::types::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductionEntry {
    pub number: u8,
    pub resource: Resource,
    pub tile: TileId,
}

/// Which dice numbers pay out which resources for one player.
///
/// A settlement contributes each adjacent producing hex once and a city twice, so
/// the same entry may appear more than once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionProfile {
    entries: Vec<ProductionEntry>,
}

impl ProductionProfile {
    pub fn for_player(state: &GameState, player: usize) -> Self {
        let mut profile = Self::default();
        let owner = &state.players[player];
        for &node in &owner.settlements {
            profile.add_node(&state.map, node);
        }
        for &node in &owner.cities {
            profile.add_node(&state.map, node);
            profile.add_node(&state.map, node);
        }
        profile
    }

    pub fn from_entries(entries: Vec<ProductionEntry>) -> Self {
        Self { entries }
    }

    pub fn add_node(&mut self, map: &CatanMap, node: NodeId) {
        for tile in map.tiles_of(node) {
            if let (Some(resource), Some(number)) = (tile.resource, tile.number) {
                self.entries.push(ProductionEntry {
                    number,
                    resource,
                    tile: tile.id,
                });
            }
        }
    }

    pub fn push(&mut self, entry: ProductionEntry) {
        self.entries.push(entry);
    }

    pub fn with_node(&self, map: &CatanMap, node: NodeId) -> Self {
        let mut profile = self.clone();
        profile.add_node(map, node);
        profile
    }

    pub fn entries(&self) -> &[ProductionEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn produces(&self, resource: Resource) -> bool {
        self.entries.iter().any(|e| e.resource == resource)
    }

    pub fn has_number(&self, number: u8) -> bool {
        self.entries.iter().any(|e| e.number == number)
    }

    /// Sum of dice weights (in 36ths) per resource, skipping the robber's hex.
    pub fn roll_weights(&self, robber: Option<TileId>) -> [u32; 5] {
        let mut weights = [0u32; 5];
        for entry in &self.entries {
            if Some(entry.tile) == robber {
                continue;
            }
            weights[entry.resource.index()] += dice_weight(entry.number);
        }
        weights
    }
}

/// Harbor access: one flag per resource's 2:1 port plus the generic 3:1 port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortFlags {
    specific: [bool; 5],
    misc: bool,
}

impl PortFlags {
    pub const NONE: PortFlags = PortFlags {
        specific: [false; 5],
        misc: false,
    };

    pub fn for_player(state: &GameState, player: usize) -> Self {
        let mut flags = Self::NONE;
        for kind in state.player_ports(player) {
            flags.add(kind);
        }
        flags
    }

    pub fn add(&mut self, kind: PortKind) {
        match kind {
            Some(resource) => self.specific[resource.index()] = true,
            None => self.misc = true,
        }
    }

    pub fn with(mut self, kind: Option<PortKind>) -> Self {
        if let Some(kind) = kind {
            self.add(kind);
        }
        self
    }

    pub fn has_misc(&self) -> bool {
        self.misc
    }

    pub fn has(&self, resource: Resource) -> bool {
        self.specific[resource.index()]
    }

    /// Bank trade ratio for giving away `resource`.
    pub fn ratio(&self, resource: Resource) -> u32 {
        if self.has(resource) {
            2
        } else if self.misc {
            3
        } else {
            4
        }
    }
}
