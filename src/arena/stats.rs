use std::time::Duration;

use serde::Serialize;

use crate::types::Color;

use super::{MatchOutcome, SeatSpec};

/// Running totals over many games, indexed by seat.
#[derive(Debug, Default, Clone)]
pub struct GameStats {
    pub games: u32,
    pub wins: Vec<u32>,
    pub points_by_seat: Vec<Vec<u8>>,
    pub unfinished: u32,
    pub total_turns: u64,
    pub total_trades: u64,
    pub total_duration: Duration,
}

impl GameStats {
    pub fn new(seats: usize) -> Self {
        Self {
            wins: vec![0; seats],
            points_by_seat: vec![Vec::new(); seats],
            ..Self::default()
        }
    }

    pub fn record_game(&mut self, outcome: &MatchOutcome) {
        self.games += 1;
        self.total_turns += u64::from(outcome.turns);
        self.total_trades += u64::from(outcome.trades);
        self.total_duration += outcome.duration;
        match outcome.winner {
            Some(winner) if winner < self.wins.len() => self.wins[winner] += 1,
            _ => self.unfinished += 1,
        }
        for (seat, points) in outcome.points.iter().enumerate() {
            if let Some(history) = self.points_by_seat.get_mut(seat) {
                history.push(*points);
            }
        }
    }

    /// Folds another worker's totals into these.
    pub fn merge(&mut self, other: GameStats) {
        self.games += other.games;
        self.unfinished += other.unfinished;
        self.total_turns += other.total_turns;
        self.total_trades += other.total_trades;
        self.total_duration += other.total_duration;
        for (mine, theirs) in self.wins.iter_mut().zip(other.wins) {
            *mine += theirs;
        }
        for (mine, theirs) in self.points_by_seat.iter_mut().zip(other.points_by_seat) {
            mine.extend(theirs);
        }
    }

    pub fn win_rate(&self, seat: usize) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        f64::from(self.wins.get(seat).copied().unwrap_or(0)) / f64::from(self.games)
    }

    pub fn avg_points(&self, seat: usize) -> f64 {
        match self.points_by_seat.get(seat) {
            Some(points) if !points.is_empty() => {
                points.iter().map(|p| f64::from(*p)).sum::<f64>() / points.len() as f64
            }
            _ => 0.0,
        }
    }

    pub fn avg_turns(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        self.total_turns as f64 / f64::from(self.games)
    }

    pub fn avg_duration(&self) -> Duration {
        if self.games == 0 {
            return Duration::ZERO;
        }
        self.total_duration / self.games
    }

    pub fn summary(&self, seats: &[SeatSpec]) -> Summary {
        Summary {
            games: self.games,
            unfinished: self.unfinished,
            avg_turns: self.avg_turns(),
            avg_trades: if self.games == 0 {
                0.0
            } else {
                self.total_trades as f64 / f64::from(self.games)
            },
            avg_duration_ms: self.avg_duration().as_secs_f64() * 1000.0,
            seats: seats
                .iter()
                .enumerate()
                .map(|(seat, roster_seat)| SeatSummary {
                    seat,
                    code: roster_seat.code.clone(),
                    color: Color::ORDERED[seat % Color::ORDERED.len()],
                    wins: self.wins.get(seat).copied().unwrap_or(0),
                    win_rate: self.win_rate(seat),
                    avg_points: self.avg_points(seat),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatSummary {
    pub seat: usize,
    pub code: String,
    pub color: Color,
    pub wins: u32,
    pub win_rate: f64,
    pub avg_points: f64,
}

/// What the simulator reports, as a table or as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub games: u32,
    pub unfinished: u32,
    pub avg_turns: f64,
    pub avg_trades: f64,
    pub avg_duration_ms: f64,
    pub seats: Vec<SeatSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn outcome(winner: Option<usize>, points: Vec<u8>, turns: u32) -> MatchOutcome {
        MatchOutcome {
            id: Uuid::new_v4(),
            seed: 0,
            winner,
            winner_color: winner.map(|w| Color::ORDERED[w]),
            turns,
            points,
            trades: 2,
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn rates_and_averages() {
        let mut stats = GameStats::new(2);
        stats.record_game(&outcome(Some(0), vec![10, 6], 80));
        stats.record_game(&outcome(None, vec![7, 8], 120));
        assert_eq!(stats.games, 2);
        assert_eq!(stats.unfinished, 1);
        assert!((stats.win_rate(0) - 0.5).abs() < 1e-9);
        assert!((stats.avg_points(1) - 7.0).abs() < 1e-9);
        assert!((stats.avg_turns() - 100.0).abs() < 1e-9);

        let mut other = GameStats::new(2);
        other.record_game(&outcome(Some(1), vec![5, 10], 60));
        stats.merge(other);
        assert_eq!(stats.games, 3);
        assert_eq!(stats.wins, vec![1, 1]);
        assert_eq!(stats.points_by_seat[1], vec![6, 8, 10]);
    }

    #[test]
    fn summary_serializes() {
        let mut stats = GameStats::new(2);
        stats.record_game(&outcome(Some(1), vec![4, 10], 50));
        let seats = vec![
            SeatSpec {
                code: "S".into(),
                params: Default::default(),
            },
            SeatSpec {
                code: "F".into(),
                params: Default::default(),
            },
        ];
        let json = serde_json::to_value(stats.summary(&seats)).expect("json");
        assert_eq!(json["seats"][1]["wins"], 1);
        assert_eq!(json["seats"][0]["color"], "Red");
    }
}
