use std::path::PathBuf;
use std::str::FromStr;
use std::thread;

use clap::Parser;
use soc_robot_core::MapType;
use soc_robot_core::arena::{GameStats, Match, MatchOutcome, SeatSpec, Summary, parse_roster, print_robot_help};
use soc_robot_core::config::RobotParameters;
use soc_robot_core::game::GameConfig;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser, Clone)]
#[command(name = "robot-sim")]
#[command(about = "Plays complete Settlers games between robot brains and reports how each seat did")]
struct Args {
    /// Number of games to play
    #[arg(short = 'n', long, default_value_t = 5)]
    num: u32,

    /// Comma-separated seat codes (e.g. S,S,F,F or S,F:notrade)
    #[arg(long, default_value = "S,S,F,F")]
    players: String,

    /// Seed of the first game; game i uses seed + i
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Map type: BASE, MINI, or TOURNAMENT
    #[arg(long, default_value = "BASE")]
    map: String,

    /// Victory points needed to win
    #[arg(long, default_value_t = 10)]
    vps_to_win: u8,

    /// JSON file of robot parameters applied to every seat before its code
    #[arg(long)]
    params: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines (filter with RUST_LOG)
    #[arg(long)]
    log_json: bool,

    /// Show robot codes and exit
    #[arg(long)]
    help_players: bool,

    /// Only print the summary
    #[arg(long)]
    quiet: bool,

    /// Number of worker threads, one game at a time each
    #[arg(long, default_value_t = 1)]
    workers: usize,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();
    init_tracing(args.log_json);

    if args.help_players {
        print_robot_help();
        return;
    }

    let base = match &args.params {
        Some(path) => RobotParameters::load(path).unwrap_or_else(|err| fail(err)),
        None => RobotParameters::default(),
    };
    let seats = parse_roster(&args.players, &base).unwrap_or_else(|err| fail(err));
    let map_type = MapType::from_str(&args.map).unwrap_or_else(|err| fail(err));

    let mut stats = GameStats::new(seats.len());
    if args.workers > 1 {
        run_parallel(&args, &seats, map_type, &mut stats);
    } else {
        for game_idx in 0..args.num {
            if let Some(outcome) = play_one(&args, &seats, map_type, game_idx) {
                stats.record_game(&outcome);
            }
        }
    }

    let summary = stats.summary(&seats);
    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{text}"),
            Err(err) => fail(err),
        }
    } else {
        print_summary(&summary);
    }
}

fn play_one(args: &Args, seats: &[SeatSpec], map_type: MapType, game_idx: u32) -> Option<MatchOutcome> {
    let config = GameConfig {
        num_players: seats.len(),
        map_type,
        vps_to_win: args.vps_to_win,
        seed: args.seed + u64::from(game_idx),
    };
    let params: Vec<RobotParameters> = seats.iter().map(|seat| seat.params.clone()).collect();
    let outcome = Match::new(config, &params).and_then(|mut game| game.play());
    match outcome {
        Ok(outcome) => {
            if !args.quiet && !args.json {
                let winner = outcome
                    .winner
                    .zip(outcome.winner_color)
                    .map(|(seat, color)| format!("{} ({color:?})", seats[seat].code))
                    .unwrap_or_else(|| "None".to_string());
                println!(
                    "Game {:>4}: Id={}, Winner={}, Turns={:>4}, Trades={:>3}, Duration={:?}",
                    game_idx + 1,
                    outcome.id,
                    winner,
                    outcome.turns,
                    outcome.trades,
                    outcome.duration
                );
            }
            Some(outcome)
        }
        Err(err) => {
            warn!(game = game_idx + 1, %err, "game aborted");
            None
        }
    }
}

fn run_parallel(args: &Args, seats: &[SeatSpec], map_type: MapType, stats: &mut GameStats) {
    let workers = args.workers.max(1);
    let games_per_worker = args.num as usize / workers;
    let remainder = args.num as usize % workers;

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let num_games = games_per_worker + usize::from(worker_id < remainder);
                let start_idx = worker_id * games_per_worker + worker_id.min(remainder);
                scope.spawn(move || {
                    let mut local = GameStats::new(seats.len());
                    for game_idx in start_idx..start_idx + num_games {
                        if let Some(outcome) = play_one(args, seats, map_type, game_idx as u32) {
                            local.record_game(&outcome);
                        }
                    }
                    local
                })
            })
            .collect();
        for handle in handles {
            match handle.join() {
                Ok(local) => stats.merge(local),
                Err(_) => warn!("worker panicked; its games are left out"),
            }
        }
    });
}

fn print_summary(summary: &Summary) {
    println!("\n{}", "=".repeat(80));
    println!("SIMULATION SUMMARY");
    println!("{}", "=".repeat(80));

    println!("\nSeat Summary:");
    println!("{:<20} {:<10} {:<12} {:<12}", "Seat", "Wins", "Win Rate", "Avg VP");
    println!("{}", "-".repeat(56));
    for seat in &summary.seats {
        println!(
            "{:<20} {:<10} {:<11.1}% {:<12.2}",
            format!("{} ({:?})", seat.code, seat.color),
            seat.wins,
            seat.win_rate * 100.0,
            seat.avg_points
        );
    }

    println!("\nGame Summary:");
    println!("  Total Games: {}", summary.games);
    println!("  Unfinished: {}", summary.unfinished);
    println!("  Avg Turns: {:.2}", summary.avg_turns);
    println!("  Avg Trades: {:.2}", summary.avg_trades);
    println!("  Avg Duration: {:.2}ms", summary.avg_duration_ms);
}
