use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::game::ResourceSet;
use crate::types::Resource;

/// A proposed exchange: `from` hands over `give` and receives `get`.
///
/// An empty `to` means the bank or a harbor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeOffer {
    pub from: usize,
    pub to: BTreeSet<usize>,
    pub give: ResourceSet,
    pub get: ResourceSet,
}

impl TradeOffer {
    pub fn new(from: usize, to: impl IntoIterator<Item = usize>, give: ResourceSet, get: ResourceSet) -> Self {
        Self {
            from,
            to: to.into_iter().collect(),
            give,
            get,
        }
    }

    pub fn to_bank(from: usize, give: ResourceSet, get: ResourceSet) -> Self {
        Self::new(from, [], give, get)
    }

    pub fn is_bank_trade(&self) -> bool {
        self.to.is_empty()
    }

    /// One side left blank for the counterparty to fill in.
    pub fn is_partial(&self) -> bool {
        self.give.is_empty() || self.get.is_empty()
    }

    pub fn same_terms(&self, give: &ResourceSet, get: &ResourceSet) -> bool {
        self.give == *give && self.get == *get
    }
}

impl fmt::Display for TradeOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} gives {} for {}", self.from, self.give, self.get)?;
        if !self.is_bank_trade() {
            write!(f, " to {:?}", self.to)?;
        }
        Ok(())
    }
}

/// How a receiver answers an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OfferResponse {
    Reject = 0,
    Accept = 1,
    Counter = 2,
    Complete = 3,
}

/// What a partial offer might be completed with: five doubles, ten mixed pairs, five singles.
pub static PARTIAL_COMPLETIONS: Lazy<Vec<ResourceSet>> = Lazy::new(|| {
    let mut catalog = Vec::with_capacity(20);
    for resource in Resource::ALL {
        catalog.push(ResourceSet::single(resource, 2));
    }
    for (idx, first) in Resource::ALL.into_iter().enumerate() {
        for second in Resource::ALL.into_iter().skip(idx + 1) {
            let mut pair = ResourceSet::single(first, 1);
            pair.add(second, 1);
            catalog.push(pair);
        }
    }
    for resource in Resource::ALL {
        catalog.push(ResourceSet::single(resource, 1));
    }
    catalog
});
