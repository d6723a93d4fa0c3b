use std::collections::VecDeque;

use crate::tracker::PossiblePiece;

/// Pieces to pursue, next-to-build first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildPlan {
    pieces: VecDeque<PossiblePiece>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&PossiblePiece> {
        self.pieces.front()
    }

    /// Drops the current piece, usually after it was built.
    pub fn advance(&mut self) -> Option<PossiblePiece> {
        self.pieces.pop_front()
    }

    pub fn reset(&mut self) {
        self.pieces.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PossiblePiece> + '_ {
        self.pieces.iter()
    }

    /// Makes `piece` the current one; whatever was current comes right after it.
    pub(crate) fn push(&mut self, piece: PossiblePiece) {
        self.pieces.push_front(piece);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{PossibleCard, PossibleRoad};

    #[test]
    fn pushed_pieces_come_out_first() {
        let mut plan = BuildPlan::new();
        plan.push(PossiblePiece::Road(PossibleRoad::new(0, (1, 2))));
        plan.push(PossiblePiece::Card(PossibleCard {
            player: 0,
            eta: 3,
            score: 0.0,
        }));
        assert_eq!(plan.len(), 2);
        assert!(matches!(plan.current(), Some(PossiblePiece::Card(_))));
        plan.advance();
        assert!(matches!(plan.current(), Some(PossiblePiece::Road(_))));
        plan.reset();
        assert!(plan.is_empty());
    }
}
