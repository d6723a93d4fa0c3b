//! Roll-count estimates for collecting a set of resources.
//!
//! The fast estimator replays production deterministically: a resource that comes
//! up on average every `n` rolls is credited on every `n`th roll. Bank and port
//! trades are folded in greedily after each roll.

mod profile;

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::board::TileId;
use crate::game::{GameState, ResourceSet, cost_of};
use crate::types::{PieceType, Resource};

pub use profile::{PortFlags, ProductionEntry, ProductionProfile};

/// Default limit for estimates of single pieces.
pub const DEFAULT_ROLL_LIMIT: u32 = 40;
/// Rolls-per-resource for a resource the player does not produce.
pub const NO_PRODUCTION: u32 = 55555;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("target not reachable within {cutoff} rolls")]
pub struct CutoffExceeded {
    pub cutoff: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollEstimate {
    pub rolls: u32,
    /// Hand after collecting and trading.
    pub resources: ResourceSet,
}

/// Roll estimates for each of the four purchasable things.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PieceEstimates([u32; 4]);

impl PieceEstimates {
    pub fn uniform(value: u32) -> Self {
        Self([value; 4])
    }

    pub fn set(&mut self, piece: PieceType, rolls: u32) {
        self.0[piece.index()] = rolls;
    }

    pub fn sum(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Per-piece `self - other`.
    pub fn minus(&self, other: &PieceEstimates) -> [i32; 4] {
        let mut diff = [0i32; 4];
        for (idx, value) in diff.iter_mut().enumerate() {
            *value = self.0[idx] as i32 - other.0[idx] as i32;
        }
        diff
    }
}

impl Index<PieceType> for PieceEstimates {
    type Output = u32;

    fn index(&self, piece: PieceType) -> &u32 {
        &self.0[piece.index()]
    }
}

pub trait BuildingSpeedEstimator {
    /// Average rolls between two cards of each resource.
    fn rolls_per_resource(&self) -> [u32; 5];

    /// Rolls needed to turn `start` into a hand containing `target`.
    fn estimate_rolls(
        &self,
        start: &ResourceSet,
        target: &ResourceSet,
        cutoff: u32,
        ports: &PortFlags,
    ) -> Result<RollEstimate, CutoffExceeded>;

    /// Like [`estimate_rolls`](Self::estimate_rolls) but maps a cutoff to `sentinel`.
    fn rolls_or(
        &self,
        start: &ResourceSet,
        target: &ResourceSet,
        cutoff: u32,
        ports: &PortFlags,
        sentinel: u32,
    ) -> u32 {
        self.estimate_rolls(start, target, cutoff, ports)
            .map_or(sentinel, |estimate| estimate.rolls)
    }

    /// Estimates for every piece starting from an empty hand.
    ///
    /// A piece that cannot be reached within `limit` reports `limit`.
    fn estimates_from_nothing(&self, ports: &PortFlags, limit: u32) -> PieceEstimates {
        let mut estimates = PieceEstimates::uniform(limit);
        for piece in PieceType::ALL {
            let rolls = self.rolls_or(&ResourceSet::EMPTY, &cost_of(piece), limit, ports, limit);
            estimates.set(piece, rolls);
        }
        estimates
    }

    fn estimates_from_now(&self, resources: &ResourceSet, ports: &PortFlags) -> PieceEstimates {
        let mut estimates = PieceEstimates::uniform(DEFAULT_ROLL_LIMIT);
        for piece in PieceType::ALL {
            let rolls = self.rolls_or(
                resources,
                &cost_of(piece),
                DEFAULT_ROLL_LIMIT,
                ports,
                DEFAULT_ROLL_LIMIT,
            );
            estimates.set(piece, rolls);
        }
        estimates
    }
}

/// Deterministic production replay with greedy trading.
#[derive(Debug, Clone, PartialEq)]
pub struct FastEstimator {
    profile: ProductionProfile,
    robber: Option<TileId>,
    rolls_per_resource: [u32; 5],
}

impl FastEstimator {
    pub fn new(profile: ProductionProfile) -> Self {
        Self::with_robber(profile, None)
    }

    /// Production on `robber` is ignored.
    pub fn with_robber(profile: ProductionProfile, robber: Option<TileId>) -> Self {
        let rolls_per_resource = rolls_per_resource(&profile, robber);
        Self {
            profile,
            robber,
            rolls_per_resource,
        }
    }

    pub fn for_player(state: &GameState, player: usize) -> Self {
        Self::new(ProductionProfile::for_player(state, player))
    }

    pub fn profile(&self) -> &ProductionProfile {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: ProductionProfile) {
        self.rolls_per_resource = rolls_per_resource(&profile, self.robber);
        self.profile = profile;
    }

    fn trade_toward(&self, have: &mut [u32; 5], need: &[u32; 5], ports: &PortFlags) {
        for give in Resource::TIE_ORDER {
            if contains(have, need) {
                return;
            }
            let g = give.index();
            if have[g] <= need[g] {
                continue;
            }
            let ratio = ports.ratio(give);
            let trades = (have[g] - need[g]) / ratio;
            for _ in 0..trades {
                let Some(get) = self.most_needed(have, need) else {
                    return;
                };
                if have[g] >= ratio {
                    have[g] -= ratio;
                    have[get] += 1;
                }
                if contains(have, need) {
                    return;
                }
            }
        }
    }

    /// The short resource that takes longest to roll, earliest in tie order on equal rolls.
    fn most_needed(&self, have: &[u32; 5], need: &[u32; 5]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for idx in Resource::TIE_ORDER.map(Resource::index) {
            if have[idx] >= need[idx] {
                continue;
            }
            match best {
                Some(b) if self.rolls_per_resource[idx] <= self.rolls_per_resource[b] => {}
                _ => best = Some(idx),
            }
        }
        best
    }
}

impl BuildingSpeedEstimator for FastEstimator {
    fn rolls_per_resource(&self) -> [u32; 5] {
        self.rolls_per_resource
    }

    fn estimate_rolls(
        &self,
        start: &ResourceSet,
        target: &ResourceSet,
        cutoff: u32,
        ports: &PortFlags,
    ) -> Result<RollEstimate, CutoffExceeded> {
        let mut have = start.counts().map(u32::from);
        let need = target.counts().map(u32::from);
        let mut rolls = 0;

        if !contains(&have, &need) {
            self.trade_toward(&mut have, &need, ports);
        }
        while !contains(&have, &need) {
            rolls += 1;
            if rolls > cutoff {
                return Err(CutoffExceeded { cutoff });
            }
            for (idx, every) in self.rolls_per_resource.iter().enumerate() {
                if *every == 0 || rolls % every == 0 {
                    have[idx] += 1;
                }
            }
            if !contains(&have, &need) {
                self.trade_toward(&mut have, &need, ports);
            }
        }

        Ok(RollEstimate {
            rolls,
            resources: ResourceSet::from_counts(have.map(|v| v.min(u8::MAX as u32) as u8)),
        })
    }
}

fn rolls_per_resource(profile: &ProductionProfile, robber: Option<TileId>) -> [u32; 5] {
    profile.roll_weights(robber).map(|weight| {
        if weight == 0 {
            NO_PRODUCTION
        } else {
            (36.0 / weight as f64).round() as u32
        }
    })
}

fn contains(have: &[u32; 5], need: &[u32; 5]) -> bool {
    have.iter().zip(need).all(|(h, n)| h >= n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{COST_CITY, COST_ROAD, COST_SETTLEMENT};

    fn entry(number: u8, resource: Resource, tile: TileId) -> ProductionEntry {
        ProductionEntry {
            number,
            resource,
            tile,
        }
    }

    /// Brick on 6, 5 and 10: 12/36, one brick every three rolls.
    fn brick_every_three() -> FastEstimator {
        FastEstimator::new(ProductionProfile::from_entries(vec![
            entry(6, Resource::Brick, 0),
            entry(5, Resource::Brick, 1),
            entry(10, Resource::Brick, 2),
        ]))
    }

    fn balanced() -> FastEstimator {
        FastEstimator::new(ProductionProfile::from_entries(vec![
            entry(6, Resource::Wood, 0),
            entry(8, Resource::Brick, 1),
            entry(9, Resource::Sheep, 2),
            entry(5, Resource::Wheat, 3),
            entry(10, Resource::Ore, 4),
            entry(4, Resource::Wheat, 5),
        ]))
    }

    #[test]
    fn rolls_per_resource_rounds_the_reciprocal() {
        let rpr = brick_every_three().rolls_per_resource();
        assert_eq!(rpr[Resource::Brick.index()], 3);
        assert_eq!(rpr[Resource::Wood.index()], NO_PRODUCTION);
        let rpr = balanced().rolls_per_resource();
        assert_eq!(rpr[Resource::Wood.index()], 7);
        assert_eq!(rpr[Resource::Ore.index()], 12);
        assert_eq!(rpr[Resource::Wheat.index()], 5);
    }

    #[test]
    fn robber_hex_is_ignored() {
        let profile = brick_every_three().profile().clone();
        let blocked = FastEstimator::with_robber(profile, Some(0));
        assert_eq!(blocked.rolls_per_resource()[Resource::Brick.index()], 5);
    }

    #[test]
    fn two_bricks_at_one_every_three_rolls_take_six() {
        let target = ResourceSet::single(Resource::Brick, 2);
        let estimate = brick_every_three()
            .estimate_rolls(&ResourceSet::EMPTY, &target, 40, &PortFlags::NONE)
            .expect("reachable");
        assert_eq!(estimate.rolls, 6);
        assert_eq!(estimate.resources.get(Resource::Brick), 2);
    }

    #[test]
    fn equal_resources_break_ties_in_tie_order() {
        let estimator = FastEstimator::new(ProductionProfile::default());
        let need = [1, 0, 0, 0, 1];
        assert_eq!(estimator.most_needed(&[0; 5], &need), Some(Resource::Ore.index()));

        let mut ports = PortFlags::NONE;
        ports.add(None);
        let hand = ResourceSet::from_counts([4, 0, 0, 0, 4]);
        let estimate = estimator
            .estimate_rolls(&hand, &ResourceSet::single(Resource::Brick, 1), 40, &ports)
            .expect("trade covers it");
        assert_eq!(estimate.rolls, 0);
        assert_eq!(estimate.resources.get(Resource::Ore), 1);
        assert_eq!(estimate.resources.get(Resource::Wood), 4);
    }

    #[test]
    fn port_trade_finishes_without_rolling() {
        let mut ports = PortFlags::NONE;
        ports.add(None);
        let hand = ResourceSet::single(Resource::Wood, 3);
        let target = ResourceSet::single(Resource::Brick, 1);
        let estimate = FastEstimator::new(ProductionProfile::default())
            .estimate_rolls(&hand, &target, 40, &ports)
            .expect("trade covers it");
        assert_eq!(estimate.rolls, 0);
        assert_eq!(estimate.resources.get(Resource::Brick), 1);
        assert_eq!(estimate.resources.get(Resource::Wood), 0);
    }

    #[test]
    fn settlement_short_one_card_uses_the_port() {
        let mut ports = PortFlags::NONE;
        ports.add(None);
        let hand = ResourceSet::from_counts([4, 0, 1, 1, 0]);
        let estimate = balanced()
            .estimate_rolls(&hand, &COST_SETTLEMENT, 40, &ports)
            .expect("reachable");
        assert_eq!(estimate.rolls, 0);
    }

    #[test]
    fn unproduced_resource_without_ports_exceeds_cutoff() {
        let result = brick_every_three().estimate_rolls(
            &ResourceSet::EMPTY,
            &COST_CITY,
            100,
            &PortFlags::NONE,
        );
        assert_eq!(result, Err(CutoffExceeded { cutoff: 100 }));
    }

    #[test]
    fn more_cards_never_cost_more_rolls() {
        let estimator = balanced();
        let mut ports = PortFlags::NONE;
        ports.add(Some(Resource::Wood));
        for target in [COST_ROAD, COST_SETTLEMENT, COST_CITY] {
            let mut hand = ResourceSet::EMPTY;
            let mut previous = estimator.rolls_or(&hand, &target, 200, &ports, 200);
            for resource in [
                Resource::Wood,
                Resource::Wood,
                Resource::Ore,
                Resource::Sheep,
                Resource::Wood,
                Resource::Wheat,
                Resource::Brick,
            ] {
                hand.add(resource, 1);
                let rolls = estimator.rolls_or(&hand, &target, 200, &ports, 200);
                assert!(rolls <= previous, "{hand} took {rolls} > {previous}");
                previous = rolls;
            }
        }
    }

    #[test]
    fn estimates_from_nothing_cap_each_piece_at_the_limit() {
        let estimates = brick_every_three().estimates_from_nothing(&PortFlags::NONE, 40);
        assert_eq!(estimates[PieceType::Road], 40);
        assert_eq!(estimates[PieceType::City], 40);
        let estimates = balanced().estimates_from_nothing(&PortFlags::NONE, 40);
        assert!(estimates[PieceType::Road] < 40);
        assert!(estimates[PieceType::Settlement] >= estimates[PieceType::Road]);
    }

    #[test]
    fn estimates_from_now_credit_the_hand() {
        let estimator = balanced();
        let hand = ResourceSet::from_counts([1, 1, 0, 0, 0]);
        let now = estimator.estimates_from_now(&hand, &PortFlags::NONE);
        assert_eq!(now[PieceType::Road], 0);
        let nothing = estimator.estimates_from_nothing(&PortFlags::NONE, DEFAULT_ROLL_LIMIT);
        assert!(now[PieceType::Settlement] <= nothing[PieceType::Settlement]);
    }
}
