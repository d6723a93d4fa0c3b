use rand::seq::SliceRandom;

use crate::game::resources::{ResourceError, ResourceSet};
use crate::types::{DevelopmentCard, Resource};

#[derive(Debug, Clone, PartialEq)]
pub struct Bank {
    resources: ResourceSet,
    development_deck: Vec<DevelopmentCard>,
}

impl Bank {
    pub fn standard(rng: &mut impl rand::Rng) -> Self {
        let mut deck = build_development_deck();
        deck.shuffle(rng);
        Self {
            resources: ResourceSet::from_counts([19, 19, 19, 19, 19]),
            development_deck: deck,
        }
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    pub fn receive(&mut self, set: &ResourceSet) {
        self.resources.add_set(set);
    }

    pub fn dispense(&mut self, set: &ResourceSet) -> Result<(), ResourceError> {
        self.resources.subtract_set(set)
    }

    pub fn draw_development_card(&mut self) -> Option<DevelopmentCard> {
        self.development_deck.pop()
    }

    pub fn available(&self, resource: Resource) -> u8 {
        self.resources.get(resource)
    }

    pub fn development_deck_len(&self) -> usize {
        self.development_deck.len()
    }
}

fn build_development_deck() -> Vec<DevelopmentCard> {
    use DevelopmentCard::*;
    const DISTRIBUTION: &[(DevelopmentCard, usize)] = &[
        (Knight, 14),
        (VictoryPoint, 5),
        (RoadBuilding, 2),
        (YearOfPlenty, 2),
        (Monopoly, 2),
    ];

    let mut deck = Vec::with_capacity(25);
    for (card, count) in DISTRIBUTION {
        deck.extend(std::iter::repeat(*card).take(*count));
    }
    deck
}
