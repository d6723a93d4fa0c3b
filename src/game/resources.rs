use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{PieceType, Resource};

/// A multiset over the five resource kinds plus cards of unknown kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    counts: [u8; Resource::ALL.len()],
    unknown: u8,
}

impl ResourceSet {
    pub const EMPTY: ResourceSet = ResourceSet::from_counts([0; 5]);

    pub const fn from_counts(counts: [u8; 5]) -> Self {
        Self { counts, unknown: 0 }
    }

    pub fn single(resource: Resource, amount: u8) -> Self {
        let mut set = Self::EMPTY;
        set.add(resource, amount);
        set
    }

    pub fn with_unknown(mut self, unknown: u8) -> Self {
        self.unknown = unknown;
        self
    }

    /// Known and unknown cards together.
    pub fn total(&self) -> u32 {
        self.known_total() + self.unknown as u32
    }

    pub fn known_total(&self) -> u32 {
        self.counts.iter().map(|&v| v as u32).sum()
    }

    pub fn unknown(&self) -> u8 {
        self.unknown
    }

    pub fn add(&mut self, resource: Resource, amount: u8) {
        let idx = resource.index();
        self.counts[idx] = self.counts[idx].saturating_add(amount);
    }

    pub fn add_set(&mut self, other: &ResourceSet) {
        for (idx, value) in other.counts.iter().enumerate() {
            self.counts[idx] = self.counts[idx].saturating_add(*value);
        }
        self.unknown = self.unknown.saturating_add(other.unknown);
    }

    pub fn subtract(&mut self, resource: Resource, amount: u8) -> Result<(), ResourceError> {
        let idx = resource.index();
        if self.counts[idx] < amount {
            return Err(ResourceError::InsufficientResource {
                resource,
                available: self.counts[idx],
                requested: amount,
            });
        }
        self.counts[idx] -= amount;
        Ok(())
    }

    pub fn subtract_set(&mut self, other: &ResourceSet) -> Result<(), ResourceError> {
        if !self.contains(other) || self.unknown < other.unknown {
            return Err(ResourceError::InsufficientSet);
        }
        for (idx, value) in other.counts.iter().enumerate() {
            self.counts[idx] -= *value;
        }
        self.unknown -= other.unknown;
        Ok(())
    }

    /// `self - other` with every count floored at zero.
    pub fn minus_clamped(&self, other: &ResourceSet) -> ResourceSet {
        let mut counts = self.counts;
        for (idx, value) in other.counts.iter().enumerate() {
            counts[idx] = counts[idx].saturating_sub(*value);
        }
        ResourceSet {
            counts,
            unknown: self.unknown.saturating_sub(other.unknown),
        }
    }

    /// Multiset inclusion over the known kinds.
    pub fn contains(&self, other: &ResourceSet) -> bool {
        self.counts
            .iter()
            .zip(other.counts.iter())
            .all(|(have, need)| have >= need)
    }

    pub fn has(&self, resource: Resource) -> bool {
        self.get(resource) > 0
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, u8)> + '_ {
        Resource::ALL.into_iter().zip(self.counts.iter().copied())
    }

    /// Kinds present with a non-zero count.
    pub fn kinds(&self) -> impl Iterator<Item = Resource> + '_ {
        self.iter().filter(|(_, n)| *n > 0).map(|(r, _)| r)
    }

    pub fn counts(&self) -> [u8; Resource::ALL.len()] {
        self.counts
    }

    pub fn get(&self, resource: Resource) -> u8 {
        self.counts[resource.index()]
    }

    pub fn set(&mut self, resource: Resource, amount: u8) {
        self.counts[resource.index()] = amount;
    }

    pub fn clear(&mut self) {
        *self = Self::EMPTY;
    }
}

impl fmt::Display for ResourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![];
        for (resource, amount) in self.iter() {
            if amount > 0 {
                parts.push(format!("{amount}x{resource}"));
            }
        }
        if self.unknown > 0 {
            parts.push(format!("{}xUNKNOWN", self.unknown));
        }
        if parts.is_empty() {
            return write!(f, "nothing");
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("insufficient {resource:?}: have {available}, need {requested}")]
    InsufficientResource {
        resource: Resource,
        available: u8,
        requested: u8,
    },
    #[error("insufficient resources to cover set")]
    InsufficientSet,
}

pub const COST_ROAD: ResourceSet = ResourceSet::from_counts([1, 1, 0, 0, 0]);
pub const COST_SETTLEMENT: ResourceSet = ResourceSet::from_counts([1, 1, 1, 1, 0]);
pub const COST_CITY: ResourceSet = ResourceSet::from_counts([0, 0, 0, 2, 3]);
pub const COST_DEVELOPMENT: ResourceSet = ResourceSet::from_counts([0, 0, 1, 1, 1]);

pub const fn cost_of(piece: PieceType) -> ResourceSet {
    match piece {
        PieceType::Road => COST_ROAD,
        PieceType::Settlement => COST_SETTLEMENT,
        PieceType::City => COST_CITY,
        PieceType::Card => COST_DEVELOPMENT,
    }
}

/// `n` copies of a cost vector.
pub fn cost_times(cost: &ResourceSet, n: u32) -> ResourceSet {
    let mut counts = cost.counts;
    for value in counts.iter_mut() {
        *value = (*value as u32 * n).min(u8::MAX as u32) as u8;
    }
    ResourceSet::from_counts(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_multiset_inclusion() {
        let hand = ResourceSet::from_counts([2, 1, 0, 1, 0]);
        assert!(hand.contains(&COST_ROAD));
        assert!(!hand.contains(&COST_SETTLEMENT));
        assert!(hand.contains(&ResourceSet::EMPTY));
    }

    #[test]
    fn subtract_refuses_underflow() {
        let mut hand = ResourceSet::from_counts([1, 0, 0, 0, 0]);
        assert!(hand.subtract(Resource::Brick, 1).is_err());
        assert!(hand.subtract_set(&COST_ROAD).is_err());
        assert_eq!(hand.get(Resource::Wood), 1);
    }

    #[test]
    fn clamped_difference_floors_at_zero() {
        let hand = ResourceSet::from_counts([3, 0, 1, 0, 0]);
        let left = hand.minus_clamped(&COST_SETTLEMENT);
        assert_eq!(left.counts(), [2, 0, 0, 0, 0]);
    }

    #[test]
    fn unknown_cards_count_toward_total_only() {
        let hand = ResourceSet::from_counts([1, 0, 0, 0, 0]).with_unknown(2);
        assert_eq!(hand.total(), 3);
        assert_eq!(hand.known_total(), 1);
        assert!(!hand.contains(&COST_ROAD));
    }

    #[test]
    fn cost_times_scales_every_kind() {
        assert_eq!(cost_times(&COST_ROAD, 3).counts(), [3, 3, 0, 0, 0]);
        assert_eq!(cost_times(&COST_DEVELOPMENT, 0), ResourceSet::EMPTY);
    }
}
