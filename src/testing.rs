//! Shared fixtures for unit tests.

use std::collections::HashSet;

use crate::board::{EdgeId, NodeId, other_end};
use crate::game::{GameConfig, GameState};

pub fn new_state(seed: u64) -> GameState {
    GameState::new(GameConfig {
        seed,
        ..GameConfig::default()
    })
    .expect("state builds")
}

/// A simple path of `len` land edges, in walking order.
pub fn trail(state: &GameState, len: usize) -> Vec<EdgeId> {
    for &start in &state.map.land_nodes {
        let mut path = Vec::new();
        let mut node = start;
        let mut visited = HashSet::from([start]);
        while path.len() < len {
            let next = state
                .map
                .edges_of(node)
                .iter()
                .find(|e| !visited.contains(&other_end(**e, node)));
            let Some(edge) = next else { break };
            node = other_end(*edge, node);
            visited.insert(node);
            path.push(*edge);
        }
        if path.len() == len {
            return path;
        }
    }
    panic!("no trail of length {len}");
}

/// The `len + 1` nodes visited by a trail.
pub fn trail_nodes(edges: &[EdgeId]) -> Vec<NodeId> {
    let first = edges[0];
    let start = match edges.get(1) {
        Some(next) if next.0 == first.0 || next.1 == first.0 => first.1,
        _ => first.0,
    };
    let mut nodes = vec![start];
    let mut node = start;
    for edge in edges {
        node = other_end(*edge, node);
        nodes.push(node);
    }
    nodes
}
