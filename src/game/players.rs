use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::board::{EdgeId, NodeId};
use crate::game::resources::{ResourceError, ResourceSet};
use crate::types::{Color, DevelopmentCard};

pub const MAX_ROADS: usize = 15;
pub const MAX_SETTLEMENTS: usize = 5;
pub const MAX_CITIES: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub color: Color,
    pub resources: ResourceSet,
    /// Cards bought before this turn; playable.
    pub dev_cards: Vec<DevelopmentCard>,
    /// Cards bought this turn.
    pub fresh_dev_cards: Vec<DevelopmentCard>,
    pub roads: BTreeSet<EdgeId>,
    pub settlements: BTreeSet<NodeId>,
    pub cities: BTreeSet<NodeId>,
    pub victory_cards: u8,
    pub knights_played: u8,
    pub longest_road_length: u8,
    pub has_longest_road: bool,
    pub has_largest_army: bool,
    pub has_played_dev_card_this_turn: bool,
}

impl PlayerState {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            resources: ResourceSet::EMPTY,
            dev_cards: Vec::new(),
            fresh_dev_cards: Vec::new(),
            roads: BTreeSet::new(),
            settlements: BTreeSet::new(),
            cities: BTreeSet::new(),
            victory_cards: 0,
            knights_played: 0,
            longest_road_length: 0,
            has_longest_road: false,
            has_largest_army: false,
            has_played_dev_card_this_turn: false,
        }
    }

    pub fn reset_for_new_turn(&mut self) {
        self.dev_cards.append(&mut self.fresh_dev_cards);
        self.has_played_dev_card_this_turn = false;
    }

    pub fn add_resources(&mut self, set: &ResourceSet) {
        self.resources.add_set(set);
    }

    pub fn remove_resources(&mut self, set: &ResourceSet) -> Result<(), ResourceError> {
        self.resources.subtract_set(set)
    }

    pub fn add_dev_card(&mut self, card: DevelopmentCard) {
        if matches!(card, DevelopmentCard::VictoryPoint) {
            self.victory_cards += 1;
        } else {
            self.fresh_dev_cards.push(card);
        }
    }

    pub fn old_card_count(&self, card: DevelopmentCard) -> usize {
        self.dev_cards.iter().filter(|c| **c == card).count()
    }

    pub fn new_card_count(&self, card: DevelopmentCard) -> usize {
        self.fresh_dev_cards.iter().filter(|c| **c == card).count()
    }

    pub fn can_play_dev_card(&self, card: DevelopmentCard) -> bool {
        !self.has_played_dev_card_this_turn && self.old_card_count(card) > 0
    }

    /// Removes one old copy of `card` and records the play.
    pub fn consume_dev_card(&mut self, card: DevelopmentCard) -> bool {
        if !self.can_play_dev_card(card) {
            return false;
        }
        let Some(pos) = self.dev_cards.iter().position(|c| *c == card) else {
            return false;
        };
        self.dev_cards.remove(pos);
        if matches!(card, DevelopmentCard::Knight) {
            self.knights_played += 1;
        }
        self.has_played_dev_card_this_turn = true;
        true
    }

    pub fn roads_left(&self) -> usize {
        MAX_ROADS.saturating_sub(self.roads.len())
    }

    pub fn settlements_left(&self) -> usize {
        MAX_SETTLEMENTS.saturating_sub(self.settlements.len())
    }

    pub fn cities_left(&self) -> usize {
        MAX_CITIES.saturating_sub(self.cities.len())
    }

    pub fn owns_building_at(&self, node: NodeId) -> bool {
        self.settlements.contains(&node) || self.cities.contains(&node)
    }

    pub fn buildings(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.settlements.iter().chain(self.cities.iter()).copied()
    }

    pub fn total_points(&self) -> u8 {
        self.public_points() + self.victory_cards
    }

    pub fn public_points(&self) -> u8 {
        let settlement_points = self.settlements.len() as u8;
        let city_points = (self.cities.len() as u8) * 2;
        settlement_points + city_points + self.bonus_points()
    }

    pub fn bonus_points(&self) -> u8 {
        let mut bonus = 0;
        if self.has_longest_road {
            bonus += 2;
        }
        if self.has_largest_army {
            bonus += 2;
        }
        bonus
    }
}
