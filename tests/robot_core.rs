use std::collections::HashSet;

use soc_robot_core::arena::{Match, TURNS_LIMIT, parse_roster};
use soc_robot_core::estimator::{BuildingSpeedEstimator, FastEstimator, PortFlags};
use soc_robot_core::game::{COST_CITY, COST_SETTLEMENT, GameConfig, GameState, PieceKey, ResourceSet};
use soc_robot_core::tracker::TrackerSet;
use soc_robot_core::{RobotBrain, RobotParameters};

fn config(seed: u64) -> GameConfig {
    GameConfig {
        seed,
        ..GameConfig::default()
    }
}

/// Every seat placed by its own brain, play started.
fn opened(seed: u64, params: RobotParameters) -> (GameState, Vec<RobotBrain>) {
    let mut state = GameState::new(config(seed)).expect("state");
    let mut brains: Vec<RobotBrain> = (0..state.num_players())
        .map(|player| RobotBrain::new(&state, player, params.clone(), seed))
        .collect();
    let n = state.num_players();
    for (player, second) in (0..n).map(|p| (p, false)).chain((0..n).rev().map(|p| (p, true))) {
        let node = brains[player].choose_initial_settlement(&state).expect("settlement spot");
        state.build_settlement(player, node, true).expect("legal settlement");
        if second {
            state.give_starting_resources(player, node);
        }
        let edge = brains[player].choose_initial_road(&state, node).expect("road");
        state.build_road(player, edge, true).expect("legal road");
        for brain in &mut brains {
            brain.on_piece_placed(&state, player, PieceKey::Settlement(node));
            brain.on_piece_placed(&state, player, PieceKey::Road(edge));
        }
    }
    state.start_play();
    for brain in &mut brains {
        brain.on_turn_start(&state);
    }
    (state, brains)
}

#[test]
fn mixed_table_plays_a_full_game() {
    let seats = parse_roster("S,F,S:notrade,F", &RobotParameters::default()).expect("roster");
    let params: Vec<RobotParameters> = seats.into_iter().map(|seat| seat.params).collect();
    let mut game = Match::new(config(21), &params).expect("match");
    let outcome = game.play().expect("game completes");
    assert!(outcome.turns <= TURNS_LIMIT);
    assert_eq!(outcome.points.len(), 4);
    for player in &game.state.players {
        assert!(player.settlements.len() + player.cities.len() >= 2);
    }
    match outcome.winner {
        Some(winner) => assert!(outcome.points[winner] >= 10),
        None => assert_eq!(outcome.turns, TURNS_LIMIT),
    }
}

#[test]
fn opening_placement_is_legal_for_every_seat() {
    let (state, _) = opened(4, RobotParameters::default());
    for player in &state.players {
        assert_eq!(player.settlements.len(), 2);
        assert_eq!(player.roads.len(), 2);
    }
    let occupied: Vec<_> = state.node_occupancy.keys().copied().collect();
    for node in &occupied {
        assert!(state.map.neighbors(*node).all(|n| !state.node_occupancy.contains_key(&n)));
    }
}

#[test]
fn more_cards_never_mean_more_rolls_on_a_real_board() {
    let (state, _) = opened(6, RobotParameters::default());
    for player in 0..state.num_players() {
        let estimator = FastEstimator::for_player(&state, player);
        let ports = PortFlags::for_player(&state, player);
        let mut hand = ResourceSet::EMPTY;
        let mut last = estimator.rolls_or(&hand, &COST_CITY, 400, &ports, 400);
        for resource in [
            soc_robot_core::Resource::Ore,
            soc_robot_core::Resource::Wheat,
            soc_robot_core::Resource::Ore,
            soc_robot_core::Resource::Wood,
        ] {
            hand.add(resource, 1);
            let rolls = estimator.rolls_or(&hand, &COST_CITY, 400, &ports, 400);
            assert!(rolls <= last, "player {player}: {rolls} > {last} with {hand}");
            last = rolls;
        }
    }
}

#[test]
fn speculation_leaves_trackers_as_they_were() {
    let (mut state, _) = opened(8, RobotParameters::default());
    let trackers = TrackerSet::new(&state, 0, 300);
    let spots: Vec<_> = trackers.get(0).possible_settlements().keys().copied().collect();
    assert!(!spots.is_empty());
    for node in spots {
        let speculation = trackers
            .try_put_piece(&mut state, 0, PieceKey::Settlement(node))
            .expect("open spot");
        trackers.undo_try_put_piece(&mut state, speculation);
        assert_eq!(TrackerSet::new(&state, 0, 300), trackers);
    }
}

#[test]
fn affordable_pieces_always_produce_a_plan() {
    for seed in 0..4 {
        let (mut state, mut brains) = opened(seed, RobotParameters::fast());
        state.players[0].resources = COST_SETTLEMENT;
        state.players[0].resources.add_set(&COST_CITY);
        assert!(!brains[0].plan_stuff(&mut state).is_empty(), "seed {seed}");
    }
}

#[test]
fn a_turn_of_offers_never_repeats_terms() {
    let params = RobotParameters {
        partial_offer_probability: 0.5,
        ..RobotParameters::default()
    };
    let (mut state, mut brains) = opened(10, params);
    state.players[0].resources = ResourceSet::from_counts([3, 0, 2, 0, 1]);
    for other in 1..state.num_players() {
        state.players[other].resources = ResourceSet::from_counts([0, 2, 0, 2, 1]);
    }
    brains[0].on_turn_start(&state);
    let mut seen = HashSet::new();
    for _ in 0..12 {
        let Some(offer) = brains[0].make_offer(&mut state) else {
            break;
        };
        assert!(seen.insert((offer.give, offer.get)), "repeated {offer}");
        assert!(state.players[0].resources.contains(&offer.give));
    }
}
