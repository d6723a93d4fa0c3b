//! Robber, development card and discard choices.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::board::TileId;
use crate::estimator::{
    BuildingSpeedEstimator, DEFAULT_ROLL_LIMIT, FastEstimator, PortFlags, ProductionProfile,
};
use crate::game::{GameState, ResourceSet};
use crate::tracker::TrackerSet;
use crate::types::{DevelopmentCard, Resource};

use super::BuildPlan;

const RANDOM_HEX_TRIES: usize = 30;
const MONOPOLY_MINIMUM: u32 = 2;

/// The opponent closest to winning.
pub fn select_player_to_thwart(trackers: &TrackerSet) -> Option<usize> {
    let ours = trackers.our_player();
    trackers
        .iter()
        .filter(|tracker| tracker.player() != ours)
        .min_by_key(|tracker| (tracker.win_game_eta(), tracker.player()))
        .map(|tracker| tracker.player())
}

fn touches(state: &GameState, tile: TileId, player: usize) -> bool {
    state
        .map
        .tile(tile)
        .is_some_and(|tile| tile.node_ids().any(|node| state.owner_at(node) == Some(player)))
}

/// The land hex that slows `victim` down the most without touching us.
pub fn select_robber_hex(state: &GameState, player: usize, victim: usize, rng: &mut impl Rng) -> TileId {
    let profile = ProductionProfile::for_player(state, victim);
    let ports = PortFlags::for_player(state, victim);
    let mut best = state.robber_tile;
    let mut worst_speed = 0;

    for &tile in state.map.land_tiles.keys() {
        if tile == state.robber_tile || touches(state, tile, player) {
            continue;
        }
        let estimator = FastEstimator::with_robber(profile.clone(), Some(tile));
        let speed = estimator
            .estimates_from_nothing(&ports, DEFAULT_ROLL_LIMIT)
            .sum();
        if speed > worst_speed {
            best = tile;
            worst_speed = speed;
        }
    }

    if best == state.robber_tile {
        let tiles: Vec<TileId> = state
            .map
            .land_tiles
            .keys()
            .copied()
            .filter(|tile| *tile != state.robber_tile)
            .collect();
        for attempt in 0..=RANDOM_HEX_TRIES {
            let Some(&pick) = tiles.choose(rng) else {
                break;
            };
            best = pick;
            if attempt == RANDOM_HEX_TRIES || !touches(state, pick, player) {
                break;
            }
        }
    }
    debug!(player, victim, tile = best, "robber hex");
    best
}

/// The candidate with the lowest win-game ETA.
pub fn choose_robber_victim(trackers: &TrackerSet, choices: &[usize]) -> Option<usize> {
    choices
        .iter()
        .copied()
        .min_by_key(|player| (trackers.get(*player).win_game_eta(), *player))
}

/// The resource a monopoly nets the most trades' worth of, if more than two.
pub fn choose_monopoly(state: &GameState, player: usize) -> Option<Resource> {
    let ports = PortFlags::for_player(state, player);
    let mut best: Option<(Resource, u32)> = None;
    for resource in Resource::ALL {
        let held: u32 = state
            .players
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != player)
            .map(|(_, other)| u32::from(other.resources.get(resource)))
            .sum();
        let worth = held / ports.ratio(resource);
        if best.is_none_or(|(_, b)| worth > b) {
            best = Some((resource, worth));
        }
    }
    best.filter(|(_, worth)| *worth > MONOPOLY_MINIMUM)
        .map(|(resource, _)| resource)
}

/// Two picks toward `target`, the slowest-to-roll missing resource each time.
pub fn choose_free_resources(
    state: &GameState,
    trackers: &TrackerSet,
    player: usize,
    target: &ResourceSet,
) -> ResourceSet {
    let rolls = trackers.get(player).estimator().rolls_per_resource();
    let mut hand = state.players[player].resources;
    let mut picks = ResourceSet::EMPTY;
    for _ in 0..2 {
        let short = slowest(
            Resource::TIE_ORDER
                .into_iter()
                .filter(|resource| hand.get(*resource) < target.get(*resource)),
            &rolls,
        );
        let pick = short
            .or_else(|| slowest(Resource::TIE_ORDER.into_iter(), &rolls))
            .unwrap_or(Resource::Ore);
        picks.add(pick, 1);
        hand.add(pick, 1);
    }
    picks
}

/// Highest rolls-per-resource; the first one seen wins a tie.
fn slowest(resources: impl Iterator<Item = Resource>, rolls: &[u32; 5]) -> Option<Resource> {
    resources.fold(None, |best, resource| match best {
        Some(kept) if rolls[kept.index()] >= rolls[resource.index()] => Some(kept),
        _ => Some(resource),
    })
}

/// Whether playing our knights takes Largest Army.
pub fn should_play_knight_for_la(state: &GameState, player: usize) -> bool {
    let holder = state.largest_army_holder();
    if holder == Some(player) {
        return false;
    }
    let army_size = holder.map_or(3, |holder| usize::from(state.players[holder].knights_played) + 1);
    let owner = &state.players[player];
    let knights = usize::from(owner.knights_played)
        + owner.old_card_count(DevelopmentCard::Knight)
        + owner.new_card_count(DevelopmentCard::Knight);
    knights >= army_size
}

/// The robber sits on one of our hexes.
pub fn should_play_knight(state: &GameState, player: usize) -> bool {
    state.robber_touches(player)
}

pub fn should_play_road_building(state: &GameState, player: usize) -> bool {
    state.players[player].roads_left() > 0
        && state
            .map
            .land_edges
            .iter()
            .any(|edge| state.is_legal_road(player, *edge))
}

/// Exactly two cards short of the lead piece.
pub fn should_play_discovery(state: &GameState, player: usize, plan: &BuildPlan) -> bool {
    let Some(lead) = plan.current() else {
        return false;
    };
    let missing = lead.cost().minus_clamped(&state.players[player].resources);
    missing.total() == 2
}

/// Keeps the lead piece's cost if possible; hard-to-roll resources go first.
pub fn choose_discards(
    state: &GameState,
    trackers: &TrackerSet,
    player: usize,
    plan: &BuildPlan,
    count: u32,
    rng: &mut impl Rng,
) -> ResourceSet {
    let hand = state.players[player].resources;
    let count = count.min(hand.total());
    let mut discards = ResourceSet::EMPTY;

    let Some(lead) = plan.current() else {
        let mut bag: Vec<Resource> = hand
            .iter()
            .flat_map(|(resource, n)| std::iter::repeat_n(resource, usize::from(n)))
            .collect();
        bag.shuffle(rng);
        for resource in bag.into_iter().take(count as usize) {
            discards.add(resource, 1);
        }
        return discards;
    };

    let target = lead.cost();
    let mut leftovers = hand.minus_clamped(&target);
    let mut needed = hand.minus_clamped(&leftovers);
    let rolls = trackers.get(player).estimator().rolls_per_resource();
    let mut order = Resource::ALL;
    order.sort_by_key(|resource| std::cmp::Reverse(rolls[resource.index()]));

    for pool in [&mut leftovers, &mut needed] {
        for resource in order {
            while discards.total() < count && pool.get(resource) > 0 {
                discards.add(resource, 1);
                let _ = pool.subtract(resource, 1);
            }
        }
    }
    debug!(player, %discards, "discarding");
    discards
}
