use crate::board::{EdgeId, NodeId, other_end};
use crate::game::{GameState, RoadPath};

/// Length a player must beat to take Longest Road.
pub fn length_to_beat(state: &GameState, player: usize) -> u8 {
    match state.longest_road_holder() {
        Some(holder) => state.players[holder].longest_road_length,
        None => state.player_longest_road(player).max(4),
    }
}

struct SearchNode {
    node: NodeId,
    length: u32,
    new_roads: Vec<EdgeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    length: u32,
    roads: Vec<EdgeId>,
}

impl Candidate {
    /// Fewer new roads first, then the longer trail.
    fn beats(&self, other: &Candidate) -> bool {
        self.roads.len() < other.roads.len()
            || (self.roads.len() == other.roads.len() && self.length > other.length)
    }
}

/// Shortest sequence of new roads, in build order, that gives `player` a trail
/// longer than the current Longest Road. `None` when no such sequence fits in the
/// player's remaining roads.
pub fn roads_to_longest_road(state: &GameState, player: usize) -> Option<Vec<EdgeId>> {
    let to_beat = u32::from(length_to_beat(state, player));
    let roads_left = state.players[player].roads_left() as u32;
    let paths = state.road_paths(player);
    let mut best: Option<Candidate> = None;

    for (idx, path) in paths.iter().enumerate() {
        let depth = (to_beat + 1)
            .saturating_sub(u32::from(path.length))
            .min(roads_left);
        if depth == 0 {
            continue;
        }
        for start in [path.start, path.end] {
            for candidate in extend_from(state, player, &paths, idx, start, depth) {
                if candidate.length <= to_beat {
                    continue;
                }
                if best.as_ref().is_none_or(|b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }
    }
    best.map(|candidate| candidate.roads)
}

/// Depth-first extension from one trail endpoint. Every dead end is a candidate.
fn extend_from(
    state: &GameState,
    player: usize,
    paths: &[RoadPath],
    origin: usize,
    start: NodeId,
    depth: u32,
) -> Vec<Candidate> {
    let mut finished = Vec::new();
    let mut stack = vec![SearchNode {
        node: start,
        length: u32::from(paths[origin].length),
        new_roads: Vec::new(),
    }];

    while let Some(current) = stack.pop() {
        if state.is_opponent_building(player, current.node) {
            finished.push(Candidate {
                length: current.length,
                roads: current.new_roads,
            });
            continue;
        }
        if !current.new_roads.is_empty() {
            let joined = paths
                .iter()
                .enumerate()
                .find(|(idx, other)| *idx != origin && other.has_endpoint(current.node));
            if let Some((_, other)) = joined {
                finished.push(Candidate {
                    length: current.length + u32::from(other.length),
                    roads: current.new_roads,
                });
                continue;
            }
        }
        if current.new_roads.len() as u32 >= depth {
            finished.push(Candidate {
                length: current.length,
                roads: current.new_roads,
            });
            continue;
        }

        let mut extended = false;
        for edge in state.map.edges_of(current.node) {
            if !state.is_open_edge(*edge) || current.new_roads.contains(edge) {
                continue;
            }
            let mut new_roads = current.new_roads.clone();
            new_roads.push(*edge);
            stack.push(SearchNode {
                node: other_end(*edge, current.node),
                length: current.length + 1,
                new_roads,
            });
            extended = true;
        }
        if !extended {
            finished.push(Candidate {
                length: current.length,
                roads: current.new_roads,
            });
        }
    }
    finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_state, trail, trail_nodes};

    #[test]
    fn three_roads_need_two_more_to_reach_five() {
        let mut state = new_state(13);
        let edges = trail(&state, 6);
        let nodes = trail_nodes(&edges);
        state.build_settlement(0, nodes[0], true).expect("settlement");
        for edge in &edges[..3] {
            state.build_road(0, *edge, true).expect("road");
        }
        let roads = roads_to_longest_road(&state, 0).expect("reachable");
        assert_eq!(roads.len(), 2);
        for road in &roads {
            assert!(state.is_open_edge(*road));
        }
    }

    #[test]
    fn holder_length_raises_the_bar() {
        let mut state = new_state(13);
        let edges = trail(&state, 6);
        let nodes = trail_nodes(&edges);
        state.build_settlement(1, nodes[0], true).expect("settlement");
        for edge in &edges {
            state.build_road(1, *edge, true).expect("road");
        }
        assert_eq!(state.longest_road_holder(), Some(1));
        assert_eq!(length_to_beat(&state, 0), 6);
    }

    #[test]
    fn no_roads_means_no_path() {
        let state = new_state(3);
        assert_eq!(roads_to_longest_road(&state, 0), None);
    }

    #[test]
    fn opponent_building_blocks_the_extension() {
        let mut state = new_state(13);
        let edges = trail(&state, 6);
        let nodes = trail_nodes(&edges);
        state.build_settlement(0, nodes[0], true).expect("settlement");
        for edge in &edges[..3] {
            state.build_road(0, *edge, true).expect("road");
        }
        state.build_settlement(1, nodes[3], true).expect("blocker");
        if let Some(roads) = roads_to_longest_road(&state, 0) {
            assert!(roads.iter().all(|road| !road_touches(*road, nodes[3])));
        }
    }

    fn road_touches(edge: EdgeId, node: NodeId) -> bool {
        edge.0 == node || edge.1 == node
    }
}
