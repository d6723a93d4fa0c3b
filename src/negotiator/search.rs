//! Valuing trades and listing the ones worth proposing, in the order they are tried.

use itertools::Itertools;
use smallvec::SmallVec;

use crate::estimator::{BuildingSpeedEstimator, FastEstimator, PortFlags};
use crate::game::{GameState, ResourceSet};
use crate::tracker::TrackerSet;
use crate::types::Resource;

use super::TradeOffer;

/// Roll count standing in for "not within reach" when comparing trades.
pub const ETA_CUTOFF: u32 = 1000;

/// Needed and spare resource kinds, each most frequently rolled first.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResourceOrder {
    pub needed: SmallVec<[Resource; 5]>,
    pub not_needed: SmallVec<[Resource; 5]>,
}

impl ResourceOrder {
    pub fn new(target: &ResourceSet, rolls: &[u32; 5]) -> Self {
        let (mut needed, mut not_needed): (SmallVec<[Resource; 5]>, SmallVec<[Resource; 5]>) =
            Resource::ALL.into_iter().partition(|resource| target.has(*resource));
        needed.sort_by_key(|resource| rolls[resource.index()]);
        not_needed.sort_by_key(|resource| rolls[resource.index()]);
        Self { needed, not_needed }
    }

    /// The rarest needed kind we are short of and may ask for.
    pub fn scarcest_short(
        &self,
        target: &ResourceSet,
        hand: &ResourceSet,
        allowed: impl Fn(Resource) -> bool,
    ) -> Option<Resource> {
        self.needed
            .iter()
            .rev()
            .copied()
            .find(|resource| hand.get(*resource) < target.get(*resource) && allowed(*resource))
    }
}

/// One player's view of what a trade is worth.
pub(crate) struct Appraiser<'a> {
    player: usize,
    hand: ResourceSet,
    estimator: &'a FastEstimator,
    ports: &'a PortFlags,
}

impl<'a> Appraiser<'a> {
    pub fn new(state: &GameState, trackers: &'a TrackerSet, player: usize) -> Self {
        let tracker = trackers.get(player);
        Self {
            player,
            hand: state.players[player].resources,
            estimator: tracker.estimator(),
            ports: tracker.ports(),
        }
    }

    pub fn hand(&self) -> &ResourceSet {
        &self.hand
    }

    pub fn rolls(&self) -> [u32; 5] {
        self.estimator.rolls_per_resource()
    }

    /// Rolls until the hand covers `target` after handing over `give` and receiving `get`.
    pub fn eta(&self, target: &ResourceSet, give: &ResourceSet, get: &ResourceSet) -> u32 {
        let mut hand = self.hand.minus_clamped(give);
        hand.add_set(get);
        self.estimator
            .rolls_or(&hand, target, ETA_CUTOFF, self.ports, ETA_CUTOFF)
    }

    /// A single harbor or bank trade bringing `hand` closer to `target`.
    ///
    /// Spare kinds are given first; a needed kind only goes if it is rolled at
    /// least as rarely as what we get and enough is left over.
    pub fn bank_offer(&self, target: &ResourceSet, hand: &ResourceSet) -> Option<TradeOffer> {
        if hand.contains(target) {
            return None;
        }
        let rolls = self.rolls();
        let order = ResourceOrder::new(target, &rolls);
        let get = order.scarcest_short(target, hand, |_| true)?;
        let ratio = |resource: Resource| self.ports.ratio(resource).min(u32::from(u8::MAX)) as u8;
        let trade = |give: Resource| {
            TradeOffer::to_bank(
                self.player,
                ResourceSet::single(give, ratio(give)),
                ResourceSet::single(get, 1),
            )
        };

        if let Some(&give) = order
            .not_needed
            .iter()
            .find(|resource| hand.get(**resource) >= ratio(**resource))
        {
            return Some(trade(give));
        }
        order
            .needed
            .iter()
            .copied()
            .find(|&give| {
                if rolls[give.index()] >= rolls[get.index()] {
                    hand.get(give).saturating_sub(target.get(give)) >= ratio(give)
                } else {
                    hand.get(give) >= ratio(give)
                }
            })
            .map(trade)
    }
}

/// The best we can do without another player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Batna {
    pub eta: u32,
    pub give_total: Option<u32>,
}

impl Batna {
    pub fn of(appraiser: &Appraiser<'_>, target: &ResourceSet) -> Self {
        match appraiser.bank_offer(target, appraiser.hand()) {
            Some(offer) => Self {
                eta: appraiser.eta(target, &offer.give, &offer.get),
                give_total: Some(offer.give.total()),
            },
            None => Self {
                eta: appraiser.eta(target, &ResourceSet::EMPTY, &ResourceSet::EMPTY),
                give_total: None,
            },
        }
    }

    /// Strictly faster, or as fast for fewer cards than the bank wants.
    pub fn beaten_by(&self, eta: u32, give: &ResourceSet) -> bool {
        eta < self.eta || (eta == self.eta && self.give_total.is_some_and(|total| give.total() < total))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub give: ResourceSet,
    pub get: ResourceSet,
    /// The kind recipients must be willing to sell.
    pub wanted: Resource,
}

fn pair(first: Resource, second: Resource) -> ResourceSet {
    let mut set = ResourceSet::single(first, 1);
    set.add(second, 1);
    set
}

/// Every trade toward `target` that beats the bank, simplest first.
///
/// One card for the rarest short kind, then two for one, then spare kinds
/// in `bank_assisted` amounts that would let a harbor trade finish the job.
/// `asked` says which kinds we may ask for.
pub(crate) fn candidates(
    appraiser: &Appraiser<'_>,
    target: &ResourceSet,
    asked: impl Fn(Resource) -> bool,
    bank_assisted: &[u8],
) -> Vec<Candidate> {
    let hand = *appraiser.hand();
    let order = ResourceOrder::new(target, &appraiser.rolls());
    let batna = Batna::of(appraiser, target);
    let leftovers = hand.minus_clamped(target);
    let mut found = Vec::new();
    let mut consider = |give: ResourceSet, get: ResourceSet, wanted: Resource| {
        let eta = appraiser.eta(target, &give, &get);
        if batna.beaten_by(eta, &give) {
            found.push(Candidate { give, get, wanted });
        }
    };

    if let Some(wanted) = order.scarcest_short(target, &hand, &asked) {
        let get = ResourceSet::single(wanted, 1);
        for &give in &order.not_needed {
            if hand.has(give) {
                consider(ResourceSet::single(give, 1), get, wanted);
            }
        }
        for &give in &order.needed {
            if give != wanted && hand.get(give) > target.get(give) {
                consider(ResourceSet::single(give, 1), get, wanted);
            }
        }
        for &first in &order.not_needed {
            if !hand.has(first) {
                continue;
            }
            for &second in &order.not_needed {
                let give = pair(first, second);
                if hand.contains(&give) {
                    consider(give, get, wanted);
                }
            }
            for &second in order.needed.iter().filter(|r| **r != wanted) {
                let give = pair(first, second);
                if leftovers.contains(&give) {
                    consider(give, get, wanted);
                }
            }
        }
        for &first in order.needed.iter().filter(|r| **r != wanted) {
            if !leftovers.has(first) {
                continue;
            }
            let seconds = order
                .not_needed
                .iter()
                .chain(order.needed.iter().filter(|r| **r != wanted));
            for &second in seconds {
                let give = pair(first, second);
                if leftovers.contains(&give) {
                    consider(give, get, wanted);
                }
            }
        }
    }

    for &amount in bank_assisted {
        for &wanted in order.not_needed.iter().rev() {
            if !asked(wanted) {
                continue;
            }
            let get = ResourceSet::single(wanted, amount);
            let mut pool = leftovers;
            pool.add(wanted, amount);
            let gives = order
                .not_needed
                .iter()
                .filter(|r| **r != wanted)
                .chain(order.needed.iter());
            for &give in gives {
                if !pool.has(give) {
                    continue;
                }
                let mut after = pool;
                if after.subtract(give, 1).is_ok() && appraiser.bank_offer(target, &after).is_some() {
                    consider(ResourceSet::single(give, 1), get, wanted);
                }
            }
        }
    }

    found
        .into_iter()
        .unique_by(|candidate| (candidate.give, candidate.get))
        .collect()
}
