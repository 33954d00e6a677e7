//! Bit layouts of the legacy data nibble, one function per block family.
//!
//! Each family encodes orientation differently. The two facing orders
//! (`FACING_6` and `FACING_4`) are not interchangeable.

use crate::block::Facing;
use crate::block_spec::BlockState;

pub const FACING_6: [&str; 6] = ["down", "up", "north", "south", "west", "east"];
pub const FACING_4: [&str; 4] = ["south", "west", "north", "east"];

pub const COLORS: [&str; 16] = [
    "white",
    "orange",
    "magenta",
    "light_blue",
    "yellow",
    "lime",
    "pink",
    "gray",
    "light_gray",
    "cyan",
    "purple",
    "blue",
    "brown",
    "green",
    "red",
    "black",
];

pub const WOOD_TYPES: [&str; 6] = ["oak", "spruce", "birch", "jungle", "acacia", "dark_oak"];

/// Double plant kinds by the lower half's data value.
pub const DOUBLE_PLANTS: [&str; 6] = ["sunflower", "lilac", "tall_grass", "large_fern", "rose_bush", "peony"];

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Six-way facing as used by dispensers, pistons, droppers, hoppers.
pub fn facing(state: BlockState, direction: u8) -> BlockState {
    state.with_property("facing", FACING_6[direction as usize % 6])
}

/// Four-way facing as used by pumpkins, beds, cocoa, glazed terracotta.
pub fn facing4(state: BlockState, data: u8) -> BlockState {
    state.with_property("facing", FACING_4[data as usize % 4])
}

pub fn slab(state: BlockState, double: bool, top: bool) -> BlockState {
    let kind = if double {
        "double"
    } else if top {
        "top"
    } else {
        "bottom"
    };
    state.with_property("type", kind)
}

pub fn lit(state: BlockState, lit: bool) -> BlockState {
    state.with_property("lit", bool_str(lit))
}

pub fn powered(state: BlockState, powered: bool) -> BlockState {
    state.with_property("powered", bool_str(powered))
}

pub fn flag(state: BlockState, key: &str, value: bool) -> BlockState {
    state.with_property(key, bool_str(value))
}

/// Standing torch for data 5, wall torch otherwise.
pub fn torch(data: u8) -> BlockState {
    if data == 5 {
        return BlockState::minecraft("torch");
    }
    let facing = match data {
        2 => "west",
        3 => "south",
        4 => "north",
        _ => "east",
    };
    BlockState::minecraft("wall_torch").with_property("facing", facing)
}

pub fn redstone_torch(data: u8, on: bool) -> BlockState {
    let facing = match data % 6 {
        1 => "east",
        2 => "west",
        3 => "south",
        4 => "north",
        _ => return lit(BlockState::minecraft("redstone_torch"), on),
    };
    lit(
        BlockState::minecraft("redstone_wall_torch").with_property("facing", facing),
        on,
    )
}

/// Repeaters keep their own rotation order: 0 north, 1 east, 2 south,
/// 3 west. Bits 2-3 are the delay bucket.
pub fn repeater(state: BlockState, data: u8, on: bool) -> BlockState {
    const ROTATION: [&str; 4] = ["north", "east", "south", "west"];
    let delay = (data >> 2) & 3;
    powered(
        state
            .with_property("facing", ROTATION[(data & 3) as usize])
            .with_property("delay", delay.to_string()),
        on,
    )
}

pub fn comparator(state: BlockState, data: u8, on: bool) -> BlockState {
    let mode = if data & 4 != 0 { "subtract" } else { "compare" };
    powered(facing4(state, data & 3), on || data & 8 != 0).with_property("mode", mode)
}

pub fn trapdoor(state: BlockState, data: u8) -> BlockState {
    let facing = match data & 0b0011 {
        1 => "south",
        2 => "west",
        3 => "east",
        _ => "north",
    };
    flag(state, "open", data & 0b0100 != 0)
        .with_property("half", if data & 0b1000 != 0 { "top" } else { "bottom" })
        .with_property("facing", facing)
}

/// Fence gates: bits 0-1 facing in `FACING_4` order, bit 2 open.
pub fn fence_gate(state: BlockState, data: u8) -> BlockState {
    facing4(flag(state, "open", data & 0b0100 != 0), data & 0b0011)
}

/// Stairs rotation: 0 east, 1 west, 2 south, 3 north.
pub fn stairs_facing(rotation: u8) -> Facing {
    [Facing::East, Facing::West, Facing::South, Facing::North][(rotation & 0b11) as usize]
}

/// Inverse of `stairs_facing`. Non-horizontal facings read as north.
pub fn stairs_rotation(facing: Facing) -> u8 {
    match facing {
        Facing::East => 0,
        Facing::West => 1,
        Facing::South => 2,
        _ => 3,
    }
}

pub fn stairs(state: BlockState, data: u8) -> BlockState {
    state
        .with_property("half", if data & 0b0100 == 0 { "bottom" } else { "top" })
        .with_property("facing", stairs_facing(data).name())
}

pub fn command_block(state: BlockState, data: u8) -> BlockState {
    facing(flag(state, "conditional", data >> 3 != 0), data & 7)
}

pub fn piston(state: BlockState, data: u8) -> BlockState {
    facing(flag(state, "extended", data & 8 != 0), data & 7)
}

pub fn piston_head(data: u8) -> BlockState {
    facing(BlockState::minecraft("piston_head"), data & 7)
        .with_property("type", if data & 8 != 0 { "sticky" } else { "normal" })
}

pub fn log(state: BlockState, data: u8) -> BlockState {
    let axis = match data >> 2 {
        1 => "x",
        2 => "z",
        _ => "y",
    };
    state.with_property("axis", axis)
}

/// Chests, furnaces, ladders, ender chests and wall signs: 2 north,
/// 3 south, 4 west, 5 east. Anything else reads as north.
pub fn attached_facing(state: BlockState, data: u8) -> BlockState {
    let facing = match data {
        3 => "south",
        4 => "west",
        5 => "east",
        _ => "north",
    };
    state.with_property("facing", facing)
}

pub fn button(state: BlockState, data: u8) -> BlockState {
    let (facing, face) = match data & 7 {
        0 => ("north", "ceiling"),
        1 => ("east", "wall"),
        2 => ("west", "wall"),
        3 => ("south", "wall"),
        4 => ("north", "wall"),
        _ => ("north", "floor"),
    };
    powered(state, data & 0b1000 != 0)
        .with_property("facing", facing)
        .with_property("face", face)
}

/// Lever orientations. Floor and ceiling levers pick their facing from the
/// axis they were placed along, not from the player.
pub fn lever(data: u8) -> BlockState {
    let (face, facing) = match data & 7 {
        1 => ("wall", "east"),
        2 => ("wall", "west"),
        3 => ("wall", "south"),
        4 => ("wall", "north"),
        5 => ("floor", "south"),
        6 => ("floor", "east"),
        7 => ("ceiling", "south"),
        _ => ("ceiling", "east"),
    };
    powered(BlockState::minecraft("lever"), data & 8 != 0)
        .with_property("face", face)
        .with_property("facing", facing)
}

const RAIL_SHAPES: [&str; 10] = [
    "north_south",
    "east_west",
    "ascending_east",
    "ascending_west",
    "ascending_north",
    "ascending_south",
    "south_east",
    "south_west",
    "north_west",
    "north_east",
];

pub fn rail(data: u8) -> BlockState {
    let shape = RAIL_SHAPES.get(data as usize).copied().unwrap_or(RAIL_SHAPES[0]);
    BlockState::minecraft("rail").with_property("shape", shape)
}

/// Powered, detector and activator rails: no curves, bit 3 is power.
pub fn utility_rail(state: BlockState, data: u8) -> BlockState {
    let shape = match data & 7 {
        s @ 0..=5 => RAIL_SHAPES[s as usize],
        _ => RAIL_SHAPES[0],
    };
    powered(state, data & 8 != 0).with_property("shape", shape)
}

/// Vines store one bit per attached side. A vine with no sides hangs from
/// the block above.
pub fn vine(state: BlockState, data: u8, force_up: bool) -> BlockState {
    let state = flag(state, "up", data == 0 || force_up);
    let state = flag(state, "north", data & 0b0100 != 0);
    let state = flag(state, "east", data & 0b1000 != 0);
    let state = flag(state, "south", data & 0b0001 != 0);
    flag(state, "west", data & 0b0010 != 0)
}

/// Huge mushroom blocks. 10 is the stem, 15 the all-sides stem, 11 to 14
/// are undefined and render as cap on every side.
pub fn mushroom(data: u8, red: bool) -> BlockState {
    // up, down, north, south, east, west
    let (faces, stem) = match data {
        0 => ([false, false, false, false, false, false], false),
        1 => ([true, false, true, false, false, true], false),
        2 => ([true, false, true, false, false, false], false),
        3 => ([true, false, true, false, true, false], false),
        4 => ([true, false, false, false, false, true], false),
        5 => ([true, false, false, false, false, false], false),
        6 => ([true, false, false, false, true, false], false),
        7 => ([true, false, false, true, false, true], false),
        8 => ([true, false, false, true, false, false], false),
        9 => ([true, false, false, true, true, false], false),
        10 => ([false, false, true, true, true, true], true),
        15 => ([true; 6], true),
        _ => ([true; 6], false),
    };
    let name = if stem {
        "mushroom_stem"
    } else if red {
        "red_mushroom_block"
    } else {
        "brown_mushroom_block"
    };
    let mut state = BlockState::minecraft(name);
    for (key, value) in ["up", "down", "north", "south", "east", "west"]
        .iter()
        .zip(faces)
    {
        state.set_property(*key, bool_str(value));
    }
    state
}

pub fn bed(data: u8) -> BlockState {
    facing4(BlockState::minecraft("red_bed"), data & 3)
        .with_property("part", if data & 8 != 0 { "head" } else { "foot" })
}

pub fn end_portal_frame(data: u8) -> BlockState {
    facing4(
        flag(BlockState::minecraft("end_portal_frame"), "eye", data & 4 != 0),
        data & 3,
    )
}

pub fn tripwire_hook(data: u8) -> BlockState {
    let state = facing4(BlockState::minecraft("tripwire_hook"), data & 0b0011);
    let state = flag(state, "attached", data & 0b0100 != 0);
    flag(state, "powered", data & 0b1000 != 0)
}

pub fn cocoa(data: u8) -> BlockState {
    facing4(BlockState::minecraft("cocoa"), data & 0b11)
        .with_property("age", ((data & 0b1100) >> 2).to_string())
}

pub fn anvil(data: u8) -> BlockState {
    const FACING: [&str; 4] = ["north", "east", "south", "west"];
    let name = match data {
        4..=7 => "chipped_anvil",
        8..=11 => "damaged_anvil",
        _ => "anvil",
    };
    let facing = if data < 12 { FACING[(data & 3) as usize] } else { "north" };
    BlockState::minecraft(name).with_property("facing", facing)
}

pub fn structure_block(data: u8) -> BlockState {
    let mode = match data {
        1 => "save",
        2 => "load",
        3 => "corner",
        _ => "data",
    };
    BlockState::minecraft("structure_block").with_property("mode", mode)
}

/// Integer property helper for age, level, power and similar counters.
pub fn int(state: BlockState, key: &str, value: u8) -> BlockState {
    state.with_property(key, value.to_string())
}
