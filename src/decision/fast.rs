use tracing::debug;

use crate::board::EdgeId;
use crate::estimator::{BuildingSpeedEstimator, PieceEstimates};
use crate::game::{COST_DEVELOPMENT, COST_ROAD, COST_SETTLEMENT, GameState, cost_times};
use crate::tracker::{
    INFEASIBLE_ETA, PossibleCard, PossibleCity, PossiblePiece, PossibleRoad, PossibleSettlement,
    STEP_CUTOFF, TrackerSet,
};
use crate::types::PieceType;

use super::{BuildPlan, DecisionMaker, DecisionStrategy};

/// Ranks pieces by production speedup and time to build.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastStrategy;

#[derive(Debug, Clone, PartialEq)]
enum Choice {
    LargestArmy(u32),
    LongestRoad(Vec<EdgeId>),
    City,
    Settlement,
}

impl DecisionStrategy for FastStrategy {
    fn name(&self) -> &'static str {
        "fast"
    }

    fn plan(
        &self,
        dm: &mut DecisionMaker,
        state: &mut GameState,
        trackers: &mut TrackerSet,
        plan: &mut BuildPlan,
    ) {
        let player = dm.player;
        let owner = &state.players[player];
        let ours = trackers.get(player);
        let etas = ours
            .estimator()
            .estimates_from_now(&owner.resources, ours.ports());
        let settlements = score_settlements(dm, state, trackers, &etas);

        if owner.total_points() < 5 {
            let mut best_eta = INFEASIBLE_ETA;
            if owner.cities_left() > 0 {
                if let Some(city) = best_city(ours.possible_cities().values()) {
                    best_eta = etas[PieceType::City];
                    dm.favorite_city = Some(city.clone());
                }
            }
            pick_settlement(dm, &settlements, &mut best_eta, usize::MAX);
            if let Some(settlement) = dm.favorite_settlement.clone() {
                push_settlement(plan, trackers, settlement);
            } else if let Some(city) = dm.favorite_city.clone() {
                plan.push(PossiblePiece::City(city));
            } else if state.dev_deck_len() > 0 {
                plan.push(PossiblePiece::Card(PossibleCard {
                    player,
                    eta: etas[PieceType::Card],
                    score: 0.0,
                }));
            }
            return;
        }

        let largest_army = ours
            .knights_to_buy()
            .filter(|knights| *knights > 0 && state.dev_deck_len() >= *knights as usize)
            .map(|knights| {
                let eta = ours.estimator().rolls_or(
                    &owner.resources,
                    &cost_times(&COST_DEVELOPMENT, knights),
                    STEP_CUTOFF,
                    ours.ports(),
                    STEP_CUTOFF,
                );
                (knights, eta)
            });
        let longest_road = ours.longest_road_path().map(|path| {
            let eta = ours.estimator().rolls_or(
                &owner.resources,
                &cost_times(&COST_ROAD, path.len() as u32),
                STEP_CUTOFF,
                ours.ports(),
                STEP_CUTOFF,
            );
            (path.to_vec(), eta)
        });
        let city = if owner.cities_left() > 0 {
            best_city(ours.possible_cities().values()).cloned()
        } else {
            None
        };

        let (mut choice, mut best_eta) = late_game_choice(LateOptions {
            largest_army,
            longest_road,
            city_eta: city.as_ref().map(|_| etas[PieceType::City]),
        });
        if choice == Some(Choice::City) {
            dm.favorite_city = city;
        }
        if owner.settlements_left() > 0
            && pick_settlement(dm, &settlements, &mut best_eta, owner.roads_left())
        {
            choice = Some(Choice::Settlement);
        }

        debug!(player, ?choice, best_eta, "fast strategy pick");
        if let Some(choice) = choice {
            push_choice(dm, plan, trackers, choice);
        }
    }
}

/// What a player at five points or more can aim for, with ETAs from the current hand.
#[derive(Debug, Default)]
struct LateOptions {
    /// Knights still to buy and the rolls to afford them.
    largest_army: Option<(u32, u32)>,
    /// Roads to build, in build order, and the rolls to afford them.
    longest_road: Option<(Vec<EdgeId>, u32)>,
    city_eta: Option<u32>,
}

/// Cheapest of Largest Army, Longest Road and a city. The city also wins a tie.
fn late_game_choice(options: LateOptions) -> (Option<Choice>, u32) {
    let mut best_eta = INFEASIBLE_ETA;
    let mut choice = None;
    if let Some((knights, eta)) = options.largest_army {
        if eta < best_eta {
            best_eta = eta;
            choice = Some(Choice::LargestArmy(knights));
        }
    }
    if let Some((path, eta)) = options.longest_road {
        if eta < best_eta {
            best_eta = eta;
            choice = Some(Choice::LongestRoad(path));
        }
    }
    if let Some(eta) = options.city_eta.filter(|eta| *eta <= best_eta) {
        best_eta = eta;
        choice = Some(Choice::City);
    }
    (choice, best_eta)
}

fn push_choice(dm: &DecisionMaker, plan: &mut BuildPlan, trackers: &TrackerSet, choice: Choice) {
    let player = dm.player;
    match choice {
        Choice::LargestArmy(knights) => {
            for _ in 0..knights {
                plan.push(PossiblePiece::Card(PossibleCard {
                    player,
                    eta: 1,
                    score: 0.0,
                }));
            }
        }
        Choice::LongestRoad(path) => {
            for edge in path.into_iter().rev() {
                plan.push(PossiblePiece::Road(PossibleRoad::new(player, edge)));
            }
        }
        Choice::City => {
            if let Some(city) = dm.favorite_city.clone() {
                plan.push(PossiblePiece::City(city));
            }
        }
        Choice::Settlement => {
            if let Some(settlement) = dm.favorite_settlement.clone() {
                push_settlement(plan, trackers, settlement);
            }
        }
    }
}

/// Our possible settlements with their ETA from the current hand, roads included.
fn score_settlements(
    dm: &DecisionMaker,
    state: &GameState,
    trackers: &TrackerSet,
    etas: &PieceEstimates,
) -> Vec<PossibleSettlement> {
    let ours = trackers.get(dm.player);
    let hand = &state.players[dm.player].resources;
    ours.possible_settlements()
        .values()
        .map(|settlement| {
            let mut settlement = settlement.clone();
            settlement.eta = if settlement.road_path.is_empty() {
                etas[PieceType::Settlement]
            } else {
                let mut cost = COST_SETTLEMENT;
                cost.add_set(&cost_times(&COST_ROAD, settlement.road_path.len() as u32));
                ours.estimator()
                    .rolls_or(hand, &cost, STEP_CUTOFF, ours.ports(), STEP_CUTOFF)
            };
            settlement
        })
        .collect()
}

/// Lower ETA wins; on equal ETA the larger speedup wins. Returns whether a settlement was picked.
fn pick_settlement(
    dm: &mut DecisionMaker,
    settlements: &[PossibleSettlement],
    best_eta: &mut u32,
    roads_left: usize,
) -> bool {
    let mut picked = false;
    for settlement in settlements {
        if settlement.road_path.len() > roads_left {
            continue;
        }
        if settlement.eta < *best_eta {
            *best_eta = settlement.eta;
            dm.favorite_settlement = Some(settlement.clone());
            picked = true;
        } else if settlement.eta == *best_eta {
            let better = match (&dm.favorite_settlement, &dm.favorite_city) {
                (Some(current), _) => settlement.speedup_total() > current.speedup_total(),
                (None, Some(city)) => settlement.speedup_total() > city.speedup_total(),
                (None, None) => true,
            };
            if better {
                dm.favorite_settlement = Some(settlement.clone());
                picked = true;
            }
        }
    }
    picked
}

fn best_city<'a>(cities: impl Iterator<Item = &'a PossibleCity>) -> Option<&'a PossibleCity> {
    let mut best: Option<&PossibleCity> = None;
    for city in cities {
        if best.is_none_or(|b| city.speedup_total() > b.speedup_total()) {
            best = Some(city);
        }
    }
    best
}

/// Pushes the settlement and then its roads so the first road is current.
fn push_settlement(plan: &mut BuildPlan, trackers: &TrackerSet, settlement: PossibleSettlement) {
    let player = settlement.player;
    let roads = settlement.road_path.clone();
    plan.push(PossiblePiece::Settlement(settlement));
    for edge in roads.into_iter().rev() {
        let road = trackers
            .get(player)
            .possible_roads()
            .get(&edge)
            .cloned()
            .unwrap_or_else(|| PossibleRoad::new(player, edge));
        plan.push(PossiblePiece::Road(road));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RobotParameters;
    use crate::game::ResourceSet;
    use crate::testing::{new_state, trail, trail_nodes};

    #[test]
    fn early_game_heads_for_a_settlement_road_first() {
        let mut state = new_state(11);
        let edges = trail(&state, 3);
        let nodes = trail_nodes(&edges);
        state.build_settlement(0, nodes[0], true).expect("settlement");
        state.build_road(0, edges[0], true).expect("road");
        state.start_play();
        state.players[0].resources = ResourceSet::from_counts([2, 2, 1, 1, 0]);
        let mut trackers = TrackerSet::new(&state, 0, 300);
        let mut dm = DecisionMaker::new(0, RobotParameters::fast());
        let mut plan = BuildPlan::new();
        dm.plan_stuff(&mut state, &mut trackers, &mut plan);

        let Some(PossiblePiece::Road(road)) = plan.current() else {
            panic!("plan does not start with a road: {plan:?}");
        };
        let settlement = plan
            .iter()
            .find_map(|piece| match piece {
                PossiblePiece::Settlement(settlement) => Some(settlement),
                _ => None,
            })
            .expect("settlement behind the road");
        assert_eq!(settlement.road_path.first(), Some(&road.edge));
        assert!(state.is_legal_road(0, road.edge));
    }

    #[test]
    fn affordable_city_is_planned_when_nothing_else_is_reachable() {
        let mut state = new_state(11);
        let node = *state.map.land_nodes.iter().next().expect("node");
        state.build_settlement(0, node, true).expect("settlement");
        state.start_play();
        state.players[0].resources = ResourceSet::from_counts([0, 0, 0, 2, 3]);
        let mut trackers = TrackerSet::new(&state, 0, 300);
        let mut dm = DecisionMaker::new(0, RobotParameters::fast());
        let mut plan = BuildPlan::new();
        dm.plan_stuff(&mut state, &mut trackers, &mut plan);
        assert!(matches!(plan.current(), Some(PossiblePiece::City(city)) if city.node == node));
    }

    #[test]
    fn late_game_takes_an_affordable_city() {
        let mut state = new_state(11);
        let node = *state.map.land_nodes.iter().next().expect("node");
        state.build_settlement(0, node, true).expect("settlement");
        state.start_play();
        state.players[0].victory_cards = 4;
        assert_eq!(state.players[0].total_points(), 5);
        state.players[0].resources = ResourceSet::from_counts([0, 0, 0, 2, 3]);
        let mut trackers = TrackerSet::new(&state, 0, 300);
        let mut dm = DecisionMaker::new(0, RobotParameters::fast());
        let mut plan = BuildPlan::new();
        dm.plan_stuff(&mut state, &mut trackers, &mut plan);
        assert!(matches!(plan.current(), Some(PossiblePiece::City(city)) if city.node == node));
    }

    #[test]
    fn cheapest_army_is_bought_as_knights() {
        let state = new_state(11);
        let path = trail(&state, 2);
        let (choice, eta) = late_game_choice(LateOptions {
            largest_army: Some((2, 3)),
            longest_road: Some((path, 5)),
            city_eta: Some(6),
        });
        assert_eq!(choice, Some(Choice::LargestArmy(2)));
        assert_eq!(eta, 3);

        let trackers = TrackerSet::new(&state, 0, 300);
        let dm = DecisionMaker::new(0, RobotParameters::fast());
        let mut plan = BuildPlan::new();
        push_choice(&dm, &mut plan, &trackers, Choice::LargestArmy(2));
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|piece| matches!(piece, PossiblePiece::Card(_))));
    }

    #[test]
    fn cheapest_longest_road_is_planned_in_path_order() {
        let state = new_state(11);
        let path = trail(&state, 3);
        let (choice, _) = late_game_choice(LateOptions {
            largest_army: Some((3, 4)),
            longest_road: Some((path.clone(), 2)),
            city_eta: Some(9),
        });
        assert_eq!(choice, Some(Choice::LongestRoad(path.clone())));

        let trackers = TrackerSet::new(&state, 0, 300);
        let dm = DecisionMaker::new(0, RobotParameters::fast());
        let mut plan = BuildPlan::new();
        push_choice(&dm, &mut plan, &trackers, Choice::LongestRoad(path.clone()));
        let planned: Vec<EdgeId> = plan
            .iter()
            .map(|piece| match piece {
                PossiblePiece::Road(road) => road.edge,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(planned, path);
    }

    #[test]
    fn city_wins_a_tie() {
        let state = new_state(11);
        let path = trail(&state, 2);
        let (choice, eta) = late_game_choice(LateOptions {
            largest_army: Some((2, 4)),
            longest_road: Some((path, 4)),
            city_eta: Some(4),
        });
        assert_eq!(choice, Some(Choice::City));
        assert_eq!(eta, 4);

        let (choice, _) = late_game_choice(LateOptions {
            largest_army: Some((2, 4)),
            city_eta: Some(5),
            ..LateOptions::default()
        });
        assert_eq!(choice, Some(Choice::LargestArmy(2)));
    }

    #[test]
    fn settlement_needing_more_roads_than_left_is_skipped() {
        let state = new_state(11);
        let edges = trail(&state, 2);
        let nodes = trail_nodes(&edges);
        let settlement = |node, road_path: Vec<EdgeId>, eta| PossibleSettlement {
            player: 0,
            node,
            necessary_roads: Default::default(),
            road_path,
            conflicts: Default::default(),
            threats: Default::default(),
            speedup: [0; 4],
            eta,
            score: 0.0,
        };
        let far = settlement(nodes[2], edges.clone(), 1);
        let near = settlement(nodes[0], Vec::new(), 3);
        let candidates = vec![far, near];

        let mut dm = DecisionMaker::new(0, RobotParameters::fast());
        let mut best_eta = INFEASIBLE_ETA;
        assert!(pick_settlement(&mut dm, &candidates, &mut best_eta, 1));
        assert_eq!(best_eta, 3);
        assert_eq!(dm.favorite_settlement.as_ref().map(|s| s.node), Some(nodes[0]));

        let mut dm = DecisionMaker::new(0, RobotParameters::fast());
        let mut best_eta = INFEASIBLE_ETA;
        assert!(pick_settlement(&mut dm, &candidates, &mut best_eta, 2));
        assert_eq!(dm.favorite_settlement.as_ref().map(|s| s.node), Some(nodes[2]));
    }
}
