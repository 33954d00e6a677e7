use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Facing {
    pub const HORIZONTAL: [Facing; 4] = [Facing::North, Facing::East, Facing::South, Facing::West];

    pub fn name(self) -> &'static str {
        match self {
            Facing::Down => "down",
            Facing::Up => "up",
            Facing::North => "north",
            Facing::South => "south",
            Facing::West => "west",
            Facing::East => "east",
        }
    }

    pub fn from_name(name: &str) -> Option<Facing> {
        match name {
            "down" => Some(Facing::Down),
            "up" => Some(Facing::Up),
            "north" => Some(Facing::North),
            "south" => Some(Facing::South),
            "west" => Some(Facing::West),
            "east" => Some(Facing::East),
            _ => None,
        }
    }

    pub fn opposite(self) -> Facing {
        match self {
            Facing::Down => Facing::Up,
            Facing::Up => Facing::Down,
            Facing::North => Facing::South,
            Facing::South => Facing::North,
            Facing::West => Facing::East,
            Facing::East => Facing::West,
        }
    }

    /// Clockwise rotation seen from above. Vertical facings are unchanged.
    pub fn clockwise(self) -> Facing {
        match self {
            Facing::North => Facing::East,
            Facing::East => Facing::South,
            Facing::South => Facing::West,
            Facing::West => Facing::North,
            other => other,
        }
    }

    pub fn counter_clockwise(self) -> Facing {
        self.clockwise().opposite()
    }

    pub fn is_horizontal(self) -> bool {
        !matches!(self, Facing::Up | Facing::Down)
    }

    /// Unit offset (dx, dy, dz). North is -z, east is +x.
    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            Facing::Down => (0, -1, 0),
            Facing::Up => (0, 1, 0),
            Facing::North => (0, 0, -1),
            Facing::South => (0, 0, 1),
            Facing::West => (-1, 0, 0),
            Facing::East => (1, 0, 0),
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Facing::Down | Facing::Up => Axis::Y,
            Facing::North | Facing::South => Axis::Z,
            Facing::West | Facing::East => Axis::X,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    pub fn from_name(name: &str) -> Option<Axis> {
        match name {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Upper or lower half. Doors and tall plants call these `upper`/`lower`,
/// stairs and trapdoors call them `top`/`bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Half {
    Top,
    Bottom,
}

impl Half {
    pub fn from_name(name: &str) -> Option<Half> {
        match name {
            "top" | "upper" => Some(Half::Top),
            "bottom" | "lower" => Some(Half::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlabType {
    Top,
    Bottom,
    Double,
}

impl SlabType {
    pub fn from_name(name: &str) -> Option<SlabType> {
        match name {
            "top" => Some(SlabType::Top),
            "bottom" => Some(SlabType::Bottom),
            "double" => Some(SlabType::Double),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StairShape {
    Straight,
    InnerLeft,
    InnerRight,
    OuterLeft,
    OuterRight,
}

impl StairShape {
    pub fn name(self) -> &'static str {
        match self {
            StairShape::Straight => "straight",
            StairShape::InnerLeft => "inner_left",
            StairShape::InnerRight => "inner_right",
            StairShape::OuterLeft => "outer_left",
            StairShape::OuterRight => "outer_right",
        }
    }

    pub fn from_name(name: &str) -> Option<StairShape> {
        match name {
            "straight" => Some(StairShape::Straight),
            "inner_left" => Some(StairShape::InnerLeft),
            "inner_right" => Some(StairShape::InnerRight),
            "outer_left" => Some(StairShape::OuterLeft),
            "outer_right" => Some(StairShape::OuterRight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hinge {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChestType {
    Single,
    Left,
    Right,
}

impl ChestType {
    pub fn name(self) -> &'static str {
        match self {
            ChestType::Single => "single",
            ChestType::Left => "left",
            ChestType::Right => "right",
        }
    }
}

/// One horizontal side of a redstone wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireSide {
    None,
    Side,
    Up,
}

impl WireSide {
    pub fn name(self) -> &'static str {
        match self {
            WireSide::None => "none",
            WireSide::Side => "side",
            WireSide::Up => "up",
        }
    }

    pub fn from_name(name: &str) -> WireSide {
        match name {
            "side" => WireSide::Side,
            "up" => WireSide::Up,
            _ => WireSide::None,
        }
    }
}

/// Horizontal connection flags of fences, panes and walls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sides {
    pub north: bool,
    pub east: bool,
    pub south: bool,
    pub west: bool,
}

impl Sides {
    pub fn get(&self, facing: Facing) -> bool {
        match facing {
            Facing::North => self.north,
            Facing::East => self.east,
            Facing::South => self.south,
            Facing::West => self.west,
            _ => false,
        }
    }

    pub fn set(&mut self, facing: Facing, value: bool) {
        match facing {
            Facing::North => self.north = value,
            Facing::East => self.east = value,
            Facing::South => self.south = value,
            Facing::West => self.west = value,
            _ => {}
        }
    }

    pub fn any(&self) -> bool {
        self.north || self.east || self.south || self.west
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_rotation() {
        for facing in Facing::HORIZONTAL {
            assert_eq!(facing.clockwise().clockwise(), facing.opposite());
            assert_eq!(facing.clockwise().counter_clockwise(), facing);
        }
        assert_eq!(Facing::North.clockwise(), Facing::East);
        assert_eq!(Facing::Up.clockwise(), Facing::Up);
    }

    #[test]
    fn test_facing_offsets_cancel() {
        for name in ["down", "up", "north", "south", "west", "east"] {
            let facing = Facing::from_name(name).unwrap();
            let (x, y, z) = facing.offset();
            let (ox, oy, oz) = facing.opposite().offset();
            assert_eq!((x + ox, y + oy, z + oz), (0, 0, 0));
            assert_eq!(facing.name(), name);
        }
    }
}
