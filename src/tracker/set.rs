use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::board::{EdgeId, NodeId};
use crate::game::{GameError, GameState, PieceKey, TempPlacement};

use super::{PlayerTracker, Threat};

/// One tracker per seat, seen from `our_player`'s side of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSet {
    our_player: usize,
    max_game_length: u32,
    trackers: Vec<PlayerTracker>,
}

/// A piece held on the board for what-if scoring, with trackers refreshed around it.
#[derive(Debug)]
#[must_use = "the piece stays on the board until undo_try_put_piece"]
pub struct Speculation {
    token: TempPlacement,
    pub trackers: TrackerSet,
}

impl TrackerSet {
    pub fn new(state: &GameState, our_player: usize, max_game_length: u32) -> Self {
        let trackers = (0..state.num_players())
            .map(|player| PlayerTracker::new(state, player, player == our_player))
            .collect();
        let mut set = Self {
            our_player,
            max_game_length,
            trackers,
        };
        set.recompute_threats(state);
        set.update_win_game_etas();
        set
    }

    pub fn our_player(&self) -> usize {
        self.our_player
    }

    pub fn max_game_length(&self) -> u32 {
        self.max_game_length
    }

    pub fn num_players(&self) -> usize {
        self.trackers.len()
    }

    /// Panics for an unseated player: that is a desynchronised caller.
    pub fn get(&self, player: usize) -> &PlayerTracker {
        &self.trackers[player]
    }

    pub fn ours(&self) -> &PlayerTracker {
        &self.trackers[self.our_player]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerTracker> + '_ {
        self.trackers.iter()
    }

    /// Rebuilds every tracker and all cross-player threats.
    pub fn refresh_all(&mut self, state: &GameState) {
        let our_player = self.our_player;
        for tracker in &mut self.trackers {
            let ours = tracker.player() == our_player;
            tracker.refresh(state, ours);
        }
        self.recompute_threats(state);
    }

    pub fn add_new_road(&mut self, state: &GameState, player: usize, edge: EdgeId) {
        let pending = self.trackers[player].pending_initial_settlement();
        if pending.is_some_and(|node| edge.0 == node || edge.1 == node) {
            self.trackers[player].set_pending_initial_settlement(None);
        }
        self.refresh_all(state);
    }

    pub fn add_new_settlement(&mut self, state: &GameState, player: usize, node: NodeId) {
        if state.is_initial_placement() {
            self.trackers[player].set_pending_initial_settlement(Some(node));
        }
        self.refresh_all(state);
    }

    pub fn add_new_city(&mut self, state: &GameState, _player: usize, _node: NodeId) {
        self.refresh_all(state);
    }

    /// The rules engine refused our road; `state` no longer holds it.
    pub fn cancel_wrong_road(&mut self, state: &GameState, _player: usize, _edge: EdgeId) {
        self.refresh_all(state);
    }

    pub fn cancel_wrong_settlement(&mut self, state: &GameState, player: usize, node: NodeId) {
        if self.trackers[player].pending_initial_settlement() == Some(node) {
            self.trackers[player].set_pending_initial_settlement(None);
        }
        self.refresh_all(state);
    }

    pub fn cancel_wrong_city(&mut self, state: &GameState, _player: usize, _node: NodeId) {
        self.refresh_all(state);
    }

    /// Recomputes every tracker's win-game ETA in one pass.
    ///
    /// Each rollout sees only its own player's options. A spot one player's
    /// rollout builds on stays open in the others' rollouts.
    pub fn update_win_game_etas(&mut self) {
        let max_game_length = self.max_game_length;
        for tracker in &mut self.trackers {
            tracker.recalc_win_game_eta(max_game_length);
        }
        trace!(
            etas = ?self.trackers.iter().map(PlayerTracker::win_game_eta).collect::<Vec<_>>(),
            "win game etas"
        );
    }

    pub fn leader_eta(&self) -> u32 {
        self.trackers
            .iter()
            .map(PlayerTracker::win_game_eta)
            .min()
            .unwrap_or(self.max_game_length)
    }

    /// Players tied for the lowest win-game ETA.
    pub fn leaders(&self) -> Vec<usize> {
        let best = self.leader_eta();
        self.trackers
            .iter()
            .filter(|tracker| tracker.win_game_eta() == best)
            .map(PlayerTracker::player)
            .collect()
    }

    /// Places `piece` temporarily and returns refreshed copies of the trackers.
    pub fn try_put_piece(
        &self,
        state: &mut GameState,
        player: usize,
        piece: PieceKey,
    ) -> Result<Speculation, GameError> {
        let token = state.put_temp_piece(player, piece)?;
        let mut trackers = self.clone();
        trackers.refresh_all(state);
        Ok(Speculation { token, trackers })
    }

    pub fn undo_try_put_piece(&self, state: &mut GameState, speculation: Speculation) {
        state.undo_temp_piece(speculation.token);
    }

    /// Runs `f` against a temporary `piece` and always takes it back off.
    ///
    /// A piece that cannot be placed yields `None`; only that piece's scoring is lost.
    pub fn speculate<R>(
        &self,
        state: &mut GameState,
        player: usize,
        piece: PieceKey,
        f: impl FnOnce(&mut GameState, &mut TrackerSet) -> R,
    ) -> Option<R> {
        let mut speculation = match self.try_put_piece(state, player, piece) {
            Ok(speculation) => speculation,
            Err(err) => {
                debug!(player, ?piece, %err, "speculative placement skipped");
                return None;
            }
        };
        let result = f(state, &mut speculation.trackers);
        self.undo_try_put_piece(state, speculation);
        Some(result)
    }

    fn recompute_threats(&mut self, state: &GameState) {
        for tracker in &mut self.trackers {
            tracker.clear_threats();
        }
        let roads: Vec<(usize, EdgeId, usize)> = self
            .trackers
            .iter()
            .flat_map(|tracker| {
                tracker
                    .possible_roads()
                    .values()
                    .map(|road| (road.player, road.edge, road.necessary_roads.len().min(1)))
            })
            .collect();
        let settlements: Vec<(usize, NodeId, usize)> = self
            .trackers
            .iter()
            .flat_map(|tracker| {
                tracker
                    .possible_settlements()
                    .values()
                    .map(|settlement| (settlement.player, settlement.node, settlement.road_path.len()))
            })
            .collect();

        for tracker in &mut self.trackers {
            let player = tracker.player();
            for settlement in tracker.settlements.values_mut() {
                let needed = settlement.road_path.len();
                settlement.threats = settlements
                    .iter()
                    .filter(|(owner, node, other_needed)| {
                        *owner != player
                            && *other_needed <= needed
                            && (*node == settlement.node
                                || state.map.are_adjacent(*node, settlement.node))
                    })
                    .map(|(owner, node, _)| Threat::Settlement {
                        player: *owner,
                        node: *node,
                    })
                    .collect::<BTreeSet<_>>();
            }
            for road in tracker.roads.values_mut() {
                let needed = road.necessary_roads.len().min(1);
                let mut threats: BTreeSet<Threat> = roads
                    .iter()
                    .filter(|(owner, edge, other_needed)| {
                        *owner != player && *edge == road.edge && *other_needed <= needed
                    })
                    .map(|(owner, edge, _)| Threat::Road {
                        player: *owner,
                        edge: *edge,
                    })
                    .collect();
                threats.extend(
                    settlements
                        .iter()
                        .filter(|(owner, node, _)| {
                            *owner != player && (*node == road.edge.0 || *node == road.edge.1)
                        })
                        .map(|(owner, node, _)| Threat::Settlement {
                            player: *owner,
                            node: *node,
                        }),
                );
                road.threats = threats;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_state, trail, trail_nodes};
    use crate::tracker::INFEASIBLE_ETA;

    /// Player 0 and player 1 each one road away from the same free node.
    fn contested_spot() -> (GameState, Vec<EdgeId>, Vec<NodeId>) {
        let mut state = new_state(17);
        let edges = trail(&state, 4);
        let nodes = trail_nodes(&edges);
        state.build_settlement(0, nodes[0], true).expect("settlement");
        state.build_road(0, edges[0], true).expect("road");
        state.build_settlement(1, nodes[4], true).expect("settlement");
        state.build_road(1, edges[3], true).expect("road");
        (state, edges, nodes)
    }

    #[test]
    fn try_then_undo_leaves_trackers_unchanged() {
        let (mut state, edges, nodes) = contested_spot();
        let before = TrackerSet::new(&state, 0, 300);
        let occupancy = state.node_occupancy.clone();
        let roads = state.road_occupancy.clone();

        for piece in [
            PieceKey::Road(edges[1]),
            PieceKey::Settlement(nodes[2]),
            PieceKey::City(nodes[0]),
        ] {
            let speculation = before.try_put_piece(&mut state, 0, piece).expect("placed");
            before.undo_try_put_piece(&mut state, speculation);
            assert_eq!(state.node_occupancy, occupancy);
            assert_eq!(state.road_occupancy, roads);
            assert_eq!(TrackerSet::new(&state, 0, 300), before);
        }
    }

    #[test]
    fn contested_spot_leaves_the_other_tracker_while_held() {
        let (mut state, edges, nodes) = contested_spot();
        let trackers = TrackerSet::new(&state, 0, 300);
        let spot = nodes[2];
        assert!(trackers.get(0).possible_settlements().contains_key(&spot));
        assert!(trackers.get(1).possible_settlements().contains_key(&spot));
        let threats = &trackers.get(0).possible_settlements()[&spot].threats;
        assert!(threats.contains(&Threat::Settlement { player: 1, node: spot }));

        let held = trackers
            .speculate(&mut state, 0, PieceKey::Settlement(spot), |_, copy| {
                copy.get(1).possible_settlements().contains_key(&spot)
            })
            .expect("speculation runs");
        assert!(!held);

        let restored = TrackerSet::new(&state, 0, 300);
        assert!(restored.get(1).possible_settlements().contains_key(&spot));
        assert!(restored.get(1).possible_roads().contains_key(&edges[2]));
    }

    #[test]
    fn occupied_node_aborts_only_that_speculation() {
        let (mut state, _, nodes) = contested_spot();
        let trackers = TrackerSet::new(&state, 0, 300);
        let result = trackers.speculate(&mut state, 0, PieceKey::Settlement(nodes[4]), |_, _| ());
        assert!(result.is_none());
        assert_eq!(state.owner_at(nodes[4]), Some(1));
    }

    #[test]
    fn pending_initial_settlement_clears_with_its_road() {
        let mut state = new_state(6);
        let edges = trail(&state, 1);
        let nodes = trail_nodes(&edges);
        let mut trackers = TrackerSet::new(&state, 0, 300);
        state.build_settlement(0, nodes[0], true).expect("settlement");
        trackers.add_new_settlement(&state, 0, nodes[0]);
        assert_eq!(trackers.get(0).pending_initial_settlement(), Some(nodes[0]));
        state.build_road(0, edges[0], true).expect("road");
        trackers.add_new_road(&state, 0, edges[0]);
        assert_eq!(trackers.get(0).pending_initial_settlement(), None);
        assert!(trackers.get(0).possible_cities().contains_key(&nodes[0]));
    }

    #[test]
    fn win_game_etas_are_bounded_by_game_length() {
        let (state, _, _) = contested_spot();
        let trackers = TrackerSet::new(&state, 0, 300);
        for tracker in trackers.iter() {
            assert!(tracker.win_game_eta() > 0);
            assert!(tracker.win_game_eta() <= 300);
            assert!(tracker.lr_eta() <= INFEASIBLE_ETA);
        }
        assert!(trackers.leaders().contains(&0) || trackers.leaders().contains(&1));
    }

    #[test]
    fn contested_spot_counts_for_both_rollouts() {
        let (state, _, nodes) = contested_spot();
        let mut trackers = TrackerSet::new(&state, 0, 300);
        trackers.update_win_game_etas();
        assert!(trackers.get(0).possible_settlements().contains_key(&nodes[2]));
        assert!(trackers.get(1).possible_settlements().contains_key(&nodes[2]));
        for player in 0..trackers.num_players() {
            let mut alone = trackers.get(player).clone();
            alone.recalc_win_game_eta(300);
            assert_eq!(alone.win_game_eta(), trackers.get(player).win_game_eta());
        }
    }
}
