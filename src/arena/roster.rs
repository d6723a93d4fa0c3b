use serde::Serialize;

use crate::config::{ConfigError, RobotParameters, Strategy};

pub struct RobotKind {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const ROBOT_KINDS: &[RobotKind] = &[
    RobotKind {
        code: "S",
        name: "SmartRobot",
        description: "Scores every candidate piece by speculatively placing it and comparing everybody's win-game ETA.",
    },
    RobotKind {
        code: "F",
        name: "FastRobot",
        description: "Ranks pieces by production speedup and rolls to build, without speculation.",
    },
];

/// A seat as given on the command line, e.g. `S` or `F:notrade`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeatSpec {
    pub code: String,
    pub params: RobotParameters,
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("unknown robot code {0:?}; see --help-players")]
    UnknownCode(String),
    #[error("games need 2 to 4 seats, got {0}")]
    SeatCount(usize),
    #[error(transparent)]
    Flag(#[from] ConfigError),
}

/// One seat code on top of `base`; suffixes after `:` are parameter flags.
pub fn parse_seat(code: &str, base: &RobotParameters) -> Result<SeatSpec, RosterError> {
    let mut parts = code.trim().split(':');
    let kind = parts.next().unwrap_or_default();
    let mut params = base.clone();
    params.strategy = match kind.to_ascii_uppercase().as_str() {
        "S" => Strategy::Smart,
        "F" => Strategy::Fast,
        _ => return Err(RosterError::UnknownCode(kind.to_string())),
    };
    for flag in parts.filter(|flag| !flag.is_empty()) {
        params.apply_flag(flag)?;
    }
    Ok(SeatSpec {
        code: code.trim().to_string(),
        params,
    })
}

/// A comma-separated seat list such as `S,S,F,F:notrade`.
pub fn parse_roster(list: &str, base: &RobotParameters) -> Result<Vec<SeatSpec>, RosterError> {
    let seats = list
        .split(',')
        .map(|code| parse_seat(code, base))
        .collect::<Result<Vec<_>, _>>()?;
    if !(2..=4).contains(&seats.len()) {
        return Err(RosterError::SeatCount(seats.len()));
    }
    Ok(seats)
}

pub fn print_robot_help() {
    println!("Robot codes:");
    for kind in ROBOT_KINDS {
        println!("  {}  {:<12} {}", kind.code, kind.name, kind.description);
    }
    println!();
    println!("Append flags with ':' (e.g. F:notrade). Flags: notrade, trade, smart, fast.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_flags() {
        let base = RobotParameters::default();
        let seats = parse_roster("S, F:notrade ,s", &base).expect("roster");
        assert_eq!(seats.len(), 3);
        assert_eq!(seats[0].params.strategy, Strategy::Smart);
        assert_eq!(seats[1].params.strategy, Strategy::Fast);
        assert!(!seats[1].params.trading);
        assert_eq!(seats[1].code, "F:notrade");
        assert!(seats[2].params.trading);
    }

    #[test]
    fn bad_rosters_are_refused() {
        let base = RobotParameters::default();
        assert!(matches!(parse_roster("S", &base), Err(RosterError::SeatCount(1))));
        assert!(matches!(parse_roster("S,X", &base), Err(RosterError::UnknownCode(code)) if code == "X"));
        assert!(matches!(parse_roster("S,F:warp", &base), Err(RosterError::Flag(_))));
        assert!(parse_roster("S,S,S,S,S", &base).is_err());
    }
}
