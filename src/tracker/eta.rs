use crate::board::{NodeId, PortKind};
use crate::estimator::{BuildingSpeedEstimator, FastEstimator, PortFlags, ProductionProfile};
use crate::game::{
    COST_CITY, COST_DEVELOPMENT, COST_ROAD, COST_SETTLEMENT, ResourceSet, cost_times,
};

use super::{PlayerTracker, STEP_CUTOFF};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    City(NodeId),
    Settlement(usize),
    LargestArmy,
    LongestRoad,
}

struct SpotOption {
    node: NodeId,
    roads: u32,
    port: Option<PortKind>,
    conflicts: Vec<NodeId>,
}

/// Greedy rollout of the cheapest points per roll until the player wins.
///
/// The hand is ignored; every step starts from nothing. A step whose cost cannot
/// be collected within the step cutoff is not an option.
pub(super) fn win_game_eta(tracker: &PlayerTracker, max_game_length: u32) -> u32 {
    let mut points = u32::from(tracker.points);
    let target = u32::from(tracker.vps_to_win);
    if points >= target {
        return 0;
    }

    let mut ports = tracker.ports;
    let mut estimator = tracker.estimator.clone();
    let mut profile = estimator.profile().clone();
    let mut settlements_left = tracker.settlements_left as u32;
    let mut cities_left = tracker.cities_left as u32;
    let mut roads_left = tracker.roads_left as u32;
    let mut cities: Vec<_> = tracker.cities.values().collect();
    cities.sort_by_key(|city| std::cmp::Reverse(city.speedup_total()));
    let mut city_spots: Vec<NodeId> = cities.iter().map(|city| city.node).collect();
    let mut spots: Vec<SpotOption> = tracker
        .settlements
        .values()
        .map(|settlement| SpotOption {
            node: settlement.node,
            roads: settlement.road_path.len() as u32,
            port: settlement_port(tracker, settlement.node),
            conflicts: settlement.conflicts.iter().copied().collect(),
        })
        .collect();
    let mut la_knights = if tracker.has_largest_army {
        None
    } else {
        tracker.knights_to_buy
    };
    let mut lr_roads = if tracker.has_longest_road {
        None
    } else {
        tracker.lr_path.as_ref().map(|path| path.len() as u32)
    };

    let mut total = 0u32;
    while points < target {
        let mut best: Option<(f64, u32, Step)> = None;
        let mut consider = |rolls: Option<u32>, value: f64, step: Step| {
            if let Some(rolls) = rolls {
                let per_point = f64::from(rolls) / value;
                if best.is_none_or(|(b, _, _)| per_point < b) {
                    best = Some((per_point, rolls, step));
                }
            }
        };

        if cities_left > 0 {
            if let Some(&node) = city_spots.first() {
                consider(rolls(&estimator, &COST_CITY, &ports), 1.0, Step::City(node));
            }
        }
        if settlements_left > 0 {
            for (idx, spot) in spots.iter().enumerate() {
                if spot.roads > roads_left {
                    continue;
                }
                let mut cost = COST_SETTLEMENT;
                cost.add_set(&cost_times(&COST_ROAD, spot.roads));
                consider(rolls(&estimator, &cost, &ports), 1.0, Step::Settlement(idx));
            }
        }
        if let Some(knights) = la_knights {
            let cost = cost_times(&COST_DEVELOPMENT, knights);
            consider(rolls(&estimator, &cost, &ports), 2.0, Step::LargestArmy);
        }
        if let Some(roads) = lr_roads.filter(|roads| *roads <= roads_left) {
            let cost = cost_times(&COST_ROAD, roads);
            consider(rolls(&estimator, &cost, &ports), 2.0, Step::LongestRoad);
        }

        let Some((_, step_rolls, step)) = best else {
            return max_game_length;
        };
        total += step_rolls;
        if total >= max_game_length {
            return max_game_length;
        }

        match step {
            Step::City(node) => {
                city_spots.retain(|spot| *spot != node);
                cities_left -= 1;
                settlements_left += 1;
                points += 1;
                profile = profile_with(&profile, tracker, node);
            }
            Step::Settlement(idx) => {
                let spot = spots.swap_remove(idx);
                spots.retain(|other| !spot.conflicts.contains(&other.node));
                settlements_left -= 1;
                roads_left -= spot.roads;
                points += 1;
                if let Some(kind) = spot.port {
                    ports.add(kind);
                }
                city_spots.push(spot.node);
                profile = profile_with(&profile, tracker, spot.node);
            }
            Step::LargestArmy => {
                la_knights = None;
                points += 2;
            }
            Step::LongestRoad => {
                roads_left -= lr_roads.unwrap_or(0);
                lr_roads = None;
                points += 2;
            }
        }
        estimator.set_profile(profile.clone());
    }
    total
}

fn rolls(estimator: &FastEstimator, cost: &ResourceSet, ports: &PortFlags) -> Option<u32> {
    estimator
        .estimate_rolls(&ResourceSet::EMPTY, cost, STEP_CUTOFF, ports)
        .ok()
        .map(|estimate| estimate.rolls)
}

fn settlement_port(tracker: &PlayerTracker, node: NodeId) -> Option<PortKind> {
    tracker.node_ports.get(&node).copied()
}

fn profile_with(profile: &ProductionProfile, tracker: &PlayerTracker, node: NodeId) -> ProductionProfile {
    let mut next = profile.clone();
    if let Some(entries) = tracker.node_production.get(&node) {
        for entry in entries {
            next.push(*entry);
        }
    }
    next
}
