use crate::decision::BuildPlan;
use crate::game::{GameState, ResourceSet};
use crate::tracker::PossiblePiece;
use crate::types::Resource;

use super::TradeOffer;

/// What we have learned about the other seats from trading this turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Beliefs {
    is_selling: Vec<[bool; 5]>,
    wants_another_offer: Vec<[bool; 5]>,
    offers_made: Vec<TradeOffer>,
    standing_offers: Vec<Option<TradeOffer>>,
    target_pieces: Vec<Option<PossiblePiece>>,
}

impl Beliefs {
    pub fn new(num_players: usize) -> Self {
        Self {
            is_selling: vec![[true; 5]; num_players],
            wants_another_offer: vec![[true; 5]; num_players],
            offers_made: Vec::new(),
            standing_offers: vec![None; num_players],
            target_pieces: vec![None; num_players],
        }
    }

    pub fn is_selling(&self, player: usize, resource: Resource) -> bool {
        self.is_selling[player][resource.index()]
    }

    /// Anyone other than `except` might sell `resource`.
    pub fn someone_selling(&self, except: usize, resource: Resource) -> bool {
        self.is_selling
            .iter()
            .enumerate()
            .any(|(player, selling)| player != except && selling[resource.index()])
    }

    pub fn mark_as_selling(&mut self, player: usize, resource: Resource) {
        self.is_selling[player][resource.index()] = true;
    }

    pub fn mark_as_not_selling(&mut self, player: usize, resource: Resource) {
        self.is_selling[player][resource.index()] = false;
    }

    /// Whoever holds a resource may be willing to part with it again.
    pub fn reset_is_selling(&mut self, state: &GameState) {
        for (player, owner) in state.players.iter().enumerate() {
            for resource in owner.resources.kinds() {
                self.mark_as_selling(player, resource);
            }
        }
    }

    pub fn wants_another_offer(&self, player: usize, resource: Resource) -> bool {
        self.wants_another_offer[player][resource.index()]
    }

    pub fn mark_as_wanting_another_offer(&mut self, player: usize, resource: Resource) {
        self.wants_another_offer[player][resource.index()] = true;
    }

    pub fn mark_as_not_wanting_another_offer(&mut self, player: usize, resource: Resource) {
        self.wants_another_offer[player][resource.index()] = false;
    }

    pub fn reset_wants_another_offer(&mut self) {
        for flags in &mut self.wants_another_offer {
            *flags = [false; 5];
        }
    }

    /// An observed offer: the sender parts with what it gives and holds on to what it asks for.
    pub fn record_resources_from_offer(&mut self, offer: &TradeOffer) {
        for resource in offer.give.kinds() {
            self.mark_as_wanting_another_offer(offer.from, resource);
        }
        for resource in offer.get.kinds() {
            self.mark_as_not_selling(offer.from, resource);
        }
        if let Some(slot) = self.standing_offers.get_mut(offer.from) {
            *slot = Some(offer.clone());
        }
    }

    /// `rejector` turned `offer` down.
    pub fn record_resources_from_reject(&mut self, rejector: usize, offer: &TradeOffer) {
        if !offer.to.contains(&rejector) {
            return;
        }
        for resource in offer.get.kinds() {
            if !self.wants_another_offer(rejector, resource) {
                self.mark_as_not_selling(rejector, resource);
            }
        }
    }

    /// Nobody answered `offer`; treat every recipient as a silent no.
    pub fn record_resources_from_no_response(&mut self, offer: &TradeOffer) {
        for resource in offer.get.kinds() {
            for &player in &offer.to {
                self.mark_as_not_selling(player, resource);
                self.mark_as_not_wanting_another_offer(player, resource);
            }
        }
    }

    pub fn offers_made(&self) -> &[TradeOffer] {
        &self.offers_made
    }

    pub fn reset_offers_made(&mut self) {
        self.offers_made.clear();
        self.standing_offers.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn add_to_offers_made(&mut self, offer: TradeOffer) {
        if !self.already_offered(&offer.give, &offer.get) {
            self.offers_made.push(offer);
        }
    }

    pub fn already_offered(&self, give: &ResourceSet, get: &ResourceSet) -> bool {
        self.offers_made.iter().any(|offer| offer.same_terms(give, get))
    }

    /// Somebody else already stands behind the mirror image of these terms.
    pub fn mirrors_standing_offer(&self, us: usize, give: &ResourceSet, get: &ResourceSet) -> bool {
        self.standing_offers
            .iter()
            .enumerate()
            .filter(|(player, _)| *player != us)
            .filter_map(|(_, offer)| offer.as_ref())
            .any(|offer| offer.get == *give && offer.give == *get)
    }

    pub fn withdraw_standing_offer(&mut self, player: usize) {
        if let Some(slot) = self.standing_offers.get_mut(player) {
            *slot = None;
        }
    }

    pub fn target_piece(&self, player: usize) -> Option<&PossiblePiece> {
        self.target_pieces.get(player).and_then(Option::as_ref)
    }

    pub fn set_target_piece(&mut self, player: usize, plan: &BuildPlan) {
        if let Some(slot) = self.target_pieces.get_mut(player) {
            *slot = plan.current().cloned();
        }
    }

    pub(crate) fn remember_target(&mut self, player: usize, piece: PossiblePiece) {
        if let Some(slot) = self.target_pieces.get_mut(player) {
            *slot = Some(piece);
        }
    }

    pub fn reset_target_pieces(&mut self) {
        self.target_pieces.iter_mut().for_each(|slot| *slot = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(from: usize, to: &[usize], give: [u8; 5], get: [u8; 5]) -> TradeOffer {
        TradeOffer::new(
            from,
            to.iter().copied(),
            ResourceSet::from_counts(give),
            ResourceSet::from_counts(get),
        )
    }

    #[test]
    fn observed_offers_update_selling_flags() {
        let mut beliefs = Beliefs::new(4);
        beliefs.reset_wants_another_offer();
        beliefs.record_resources_from_offer(&offer(2, &[0], [1, 0, 0, 0, 0], [0, 0, 0, 0, 1]));
        assert!(beliefs.wants_another_offer(2, Resource::Wood));
        assert!(!beliefs.is_selling(2, Resource::Ore));
        assert!(beliefs.is_selling(2, Resource::Wood));
        assert!(beliefs.mirrors_standing_offer(0, &ResourceSet::from_counts([0, 0, 0, 0, 1]), &ResourceSet::from_counts([1, 0, 0, 0, 0])));
        assert!(!beliefs.mirrors_standing_offer(2, &ResourceSet::from_counts([0, 0, 0, 0, 1]), &ResourceSet::from_counts([1, 0, 0, 0, 0])));
    }

    #[test]
    fn rejection_only_counts_for_recipients_not_wanting_more() {
        let mut beliefs = Beliefs::new(4);
        let ours = offer(0, &[1, 2], [1, 0, 0, 0, 0], [0, 1, 0, 0, 0]);
        beliefs.mark_as_wanting_another_offer(1, Resource::Brick);
        beliefs.mark_as_not_wanting_another_offer(2, Resource::Brick);
        beliefs.record_resources_from_reject(1, &ours);
        beliefs.record_resources_from_reject(2, &ours);
        beliefs.record_resources_from_reject(3, &ours);
        assert!(beliefs.is_selling(1, Resource::Brick));
        assert!(!beliefs.is_selling(2, Resource::Brick));
        assert!(beliefs.is_selling(3, Resource::Brick));
    }

    #[test]
    fn silence_marks_every_recipient() {
        let mut beliefs = Beliefs::new(4);
        beliefs.record_resources_from_no_response(&offer(0, &[1, 3], [1, 0, 0, 0, 0], [0, 0, 1, 0, 0]));
        for player in [1, 3] {
            assert!(!beliefs.is_selling(player, Resource::Sheep));
            assert!(!beliefs.wants_another_offer(player, Resource::Sheep));
        }
        assert!(beliefs.is_selling(2, Resource::Sheep));
        assert!(beliefs.someone_selling(0, Resource::Sheep));
    }

    #[test]
    fn offers_made_reset_each_turn() {
        let mut beliefs = Beliefs::new(4);
        let made = offer(0, &[1], [1, 0, 0, 0, 0], [0, 1, 0, 0, 0]);
        beliefs.add_to_offers_made(made.clone());
        beliefs.add_to_offers_made(made.clone());
        assert_eq!(beliefs.offers_made().len(), 1);
        assert!(beliefs.already_offered(&made.give, &made.get));
        beliefs.reset_offers_made();
        assert!(beliefs.offers_made().is_empty());
    }
}
