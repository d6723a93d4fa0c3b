use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    East,
    SouthEast,
    SouthWest,
    West,
    NorthWest,
    NorthEast,
}

impl Direction {
    pub const fn unit_vector(self) -> CubeCoord {
        match self {
            Direction::NorthEast => CubeCoord { x: 1, y: 0, z: -1 },
            Direction::SouthWest => CubeCoord { x: -1, y: 0, z: 1 },
            Direction::NorthWest => CubeCoord { x: 0, y: 1, z: -1 },
            Direction::SouthEast => CubeCoord { x: 0, y: -1, z: 1 },
            Direction::East => CubeCoord { x: 1, y: -1, z: 0 },
            Direction::West => CubeCoord { x: -1, y: 1, z: 0 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CubeCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        debug_assert!(x + y + z == 0, "cube coordinates must sum to zero");
        Self { x, y, z }
    }

    pub fn add(self, other: CubeCoord) -> Self {
        CubeCoord::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn neighbor(self, direction: Direction) -> Self {
        self.add(direction.unit_vector())
    }
}

impl Default for CubeCoord {
    fn default() -> Self {
        CubeCoord::new(0, 0, 0)
    }
}
