use crate::config::RobotParameters;
use crate::tracker::TrackerSet;

/// Win-game ETAs of every seat before a hypothetical move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtaSnapshot {
    pub etas: Vec<u32>,
    pub leaders: Vec<usize>,
}

impl EtaSnapshot {
    pub fn of(trackers: &TrackerSet) -> Self {
        Self {
            etas: trackers.iter().map(|t| t.win_game_eta()).collect(),
            leaders: trackers.leaders(),
        }
    }

    pub fn best(&self) -> u32 {
        self.etas.iter().copied().min().unwrap_or(0)
    }
}

/// Discounts `bonus` by how far in the future the piece is.
pub fn eta_bonus(params: &RobotParameters, eta: u32, bonus: f64) -> f64 {
    bonus / (1.0 + params.eta_bonus_factor).powi(eta as i32)
}

/// Scores the change from `before` to the ETAs in `after` for `player`.
///
/// Our own progress counts positively, the progress of other players negatively;
/// the leaders are weighted by the leader factor and everyone else by the
/// adversarial factor. Reaching an ETA of zero earns a flat `100 / players`.
pub fn wgeta_bonus(
    params: &RobotParameters,
    player: usize,
    before: &EtaSnapshot,
    after: &TrackerSet,
) -> f64 {
    let players = before.etas.len();
    let share = 100.0 / players as f64;
    let best = f64::from(before.best());
    let original: Vec<f64> = before.etas.iter().map(|eta| f64::from(*eta)).collect();
    let diffs: Vec<f64> = after
        .iter()
        .map(|tracker| original[tracker.player()] - f64::from(tracker.win_game_eta()))
        .collect();

    let mut bonus = 0.0;
    if after.get(player).win_game_eta() == 0 {
        bonus += share;
    }
    if original[player] > 0.0 && bonus == 0.0 {
        bonus += share * (diffs[player] / original[player]);
    }

    for pn in 0..players {
        for &leader in &before.leaders {
            if pn == player || pn == leader {
                continue;
            }
            if original[pn] > 0.0 {
                bonus -= share * params.adversarial_factor * (diffs[pn] / original[pn]) * (best / original[pn]);
            } else if diffs[pn] < 0.0 {
                bonus += share * params.adversarial_factor;
            }
        }
    }

    for &leader in &before.leaders {
        if leader == player {
            continue;
        }
        if original[leader] > 0.0 {
            bonus -= share * params.leader_adversarial_factor * (diffs[leader] / original[leader]);
        } else if diffs[leader] < 0.0 {
            bonus += share * params.leader_adversarial_factor;
        }
    }
    bonus
}
