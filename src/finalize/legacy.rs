//! Neighbor-dependent rules for pending legacy blocks.
//!
//! Every rule returns the resolved state, or `None` when the block should
//! fall back to the incomplete state the translator stored for it.

use super::FinalizationState;
use crate::block::{Block, BlockKind, ChestType, Facing, Half, Hinge, StairShape, WireSide};
use crate::block_spec::BlockState;
use crate::legacy::families::{
    attached_facing, flag, int, stairs_facing, stairs_rotation, COLORS, DOUBLE_PLANTS, WOOD_TYPES,
};
use crate::nbt::{scalar_string, CompoundExt};

pub(super) fn finalize(state: &mut FinalizationState<'_>, block: &Block) {
    let (id, data) = match block.kind {
        BlockKind::Unfinalized { id, data } => (id, data),
        _ => return,
    };
    let resolved = match id {
        2 | 3 | 110 => Some(snowy(state, block)),
        26 => bed(state, block),
        51 => Some(fire(state, block, data)),
        53 | 67 | 108 | 109 | 114 | 128 | 134..=136 | 156 | 163 | 164 | 180 | 203 => {
            Some(stairs(state, block, data))
        }
        54 | 146 => Some(chest(state, block)),
        55 => Some(redstone_wire(state, block)),
        64 | 71 | 193..=197 => Some(door(state, block, data)),
        85 | 188..=192 => fence(state, block, false),
        113 => fence(state, block, true),
        90 => Some(portal(state, block)),
        101 | 102 | 160 => Some(pane(state, block)),
        104 => stem(state, data, "attached_pumpkin_stem", &["pumpkin", "carved_pumpkin"]),
        105 => stem(state, data, "attached_melon_stem", &["melon"]),
        106 => Some(vine(state, block)),
        107 | 183..=187 => Some(fence_gate(state, block)),
        132 => Some(tripwire(state, block, data)),
        139 => Some(wall(state, block)),
        140 => flower_pot(state),
        144 => skull(state, data),
        175 => Some(tall_plant(state, block, data)),
        176 | 177 => banner(state, id == 177, data),
        199 => Some(chorus_plant(state, block)),
        _ => None,
    };
    state.replace_current_block(resolved.unwrap_or_else(|| block.state.clone()));
}

/// Same properties under a different name.
fn renamed(state: &BlockState, short_name: &str) -> BlockState {
    BlockState {
        name: BlockState::minecraft(short_name).name,
        properties: state.properties.clone(),
    }
}

fn neighbor(state: &mut FinalizationState<'_>, facing: Facing) -> std::sync::Arc<Block> {
    let (dx, dy, dz) = facing.offset();
    state.get_material_at(dx, dy, dz)
}

fn snowy(state: &mut FinalizationState<'_>, block: &Block) -> BlockState {
    let above = state.get_material_at(0, 1, 0);
    let snowy = matches!(above.short_name(), "snow" | "snow_block");
    flag(block.state.clone(), "snowy", snowy)
}

// Stairs

struct StairsRule {
    behind: (i32, i32),
    front: (i32, i32),
    outer: [(u8, (i32, i32), StairShape); 2],
    inner: [(u8, (i32, i32), StairShape); 2],
}

/// Indexed by rotation: 0 east, 1 west, 2 south, 3 north.
const STAIRS_RULES: [StairsRule; 4] = [
    StairsRule {
        behind: (1, 0),
        front: (-1, 0),
        outer: [(2, (0, -1), StairShape::OuterRight), (3, (0, 1), StairShape::OuterLeft)],
        inner: [(2, (0, 1), StairShape::InnerRight), (3, (0, -1), StairShape::InnerLeft)],
    },
    StairsRule {
        behind: (-1, 0),
        front: (1, 0),
        outer: [(2, (0, -1), StairShape::OuterLeft), (3, (0, 1), StairShape::OuterRight)],
        inner: [(2, (0, 1), StairShape::InnerRight), (3, (0, -1), StairShape::InnerLeft)],
    },
    StairsRule {
        behind: (0, 1),
        front: (0, -1),
        outer: [(0, (-1, 0), StairShape::OuterLeft), (1, (1, 0), StairShape::OuterRight)],
        inner: [(0, (1, 0), StairShape::InnerLeft), (1, (-1, 0), StairShape::InnerRight)],
    },
    StairsRule {
        behind: (0, -1),
        front: (0, 1),
        outer: [(0, (-1, 0), StairShape::OuterRight), (1, (1, 0), StairShape::OuterLeft)],
        inner: [(0, (1, 0), StairShape::InnerLeft), (1, (-1, 0), StairShape::InnerRight)],
    },
];

/// Rotation of a neighbor; anything that is not stairs reads as 3.
fn stairs_orientation(block: &Block) -> u8 {
    if block.is_stairs() {
        block.facing().map(stairs_rotation).unwrap_or(3)
    } else {
        3
    }
}

fn is_top(block: &Block) -> bool {
    block.half() == Some(Half::Top)
}

fn same_stairs(state: &mut FinalizationState<'_>, (dx, dz): (i32, i32), rotation: u8, top: bool) -> bool {
    let other = state.get_material_at(dx, 0, dz);
    other.is_stairs() && stairs_orientation(&other) == rotation && is_top(&other) == top
}

fn corner(
    state: &mut FinalizationState<'_>,
    candidates: &[(u8, (i32, i32), StairShape); 2],
    orientation: u8,
    rotation: u8,
    top: bool,
) -> Option<StairShape> {
    candidates
        .iter()
        .find(|(o, side, _)| *o == orientation && !same_stairs(state, *side, rotation, top))
        .map(|(_, _, shape)| *shape)
}

fn stairs(state: &mut FinalizationState<'_>, block: &Block, data: u8) -> BlockState {
    let rotation = data & 0b11;
    let top = data & 0b100 != 0;
    let rule = &STAIRS_RULES[rotation as usize];

    let behind = state.get_material_at(rule.behind.0, 0, rule.behind.1);
    let shape = if behind.is_stairs() && is_top(&behind) == top {
        corner(state, &rule.outer, stairs_orientation(&behind), rotation, top)
    } else {
        let front = state.get_material_at(rule.front.0, 0, rule.front.1);
        if front.is_stairs() && is_top(&front) == top {
            corner(state, &rule.inner, stairs_orientation(&front), rotation, top)
        } else {
            None
        }
    };

    BlockState::new(block.state.name.clone())
        .with_property("half", if top { "top" } else { "bottom" })
        .with_property("shape", shape.unwrap_or(StairShape::Straight).name())
        .with_property("facing", stairs_facing(rotation).name())
}

// Fences, panes and walls

fn is_pane_name(name: &str) -> bool {
    name == "glass_pane" || name == "iron_bars" || name.ends_with("stained_glass_pane")
}

fn is_wall_name(name: &str) -> bool {
    name.ends_with("_wall")
}

fn is_glass_name(name: &str) -> bool {
    name == "glass" || name.ends_with("_stained_glass")
}

/// Gate rotated across the connection direction.
fn perpendicular_gate(block: &Block, direction: Facing) -> bool {
    block.is_fence_gate()
        && block
            .facing()
            .map(|f| f.axis() != direction.axis())
            .unwrap_or(false)
}

fn fence_connects(other: &Block, direction: Facing, nether: bool) -> bool {
    let name = other.short_name();
    if nether && name == "nether_brick_fence" {
        return true;
    }
    let foreign_fence = if nether {
        name.ends_with("_fence")
    } else {
        name == "nether_brick_fence"
    };
    if foreign_fence
        || is_wall_name(name)
        || is_glass_name(name)
        || is_pane_name(name)
        || name.ends_with("_leaves")
    {
        return false;
    }
    if other.is_stairs() {
        return other.facing().map(|f| f.opposite() == direction).unwrap_or(false);
    }
    if other.is_fence_gate() {
        return perpendicular_gate(other, direction);
    }
    other.solid || (!nether && name.ends_with("_fence"))
}

fn fence(state: &mut FinalizationState<'_>, block: &Block, nether: bool) -> Option<BlockState> {
    let mut connected = [false; 4];
    for (i, direction) in Facing::HORIZONTAL.iter().enumerate() {
        connected[i] = fence_connects(&neighbor(state, *direction), *direction, nether);
    }
    if !connected.iter().any(|c| *c) {
        return None;
    }
    Some(with_sides(block.state.clone(), connected))
}

fn with_sides(mut result: BlockState, connected: [bool; 4]) -> BlockState {
    for (direction, value) in Facing::HORIZONTAL.iter().zip(connected) {
        result = flag(result, direction.name(), value);
    }
    result
}

fn pane(state: &mut FinalizationState<'_>, block: &Block) -> BlockState {
    let mut connected = [false; 4];
    for (i, direction) in Facing::HORIZONTAL.iter().enumerate() {
        let other = neighbor(state, *direction);
        let name = other.short_name();
        connected[i] = other.solid || is_pane_name(name) || is_glass_name(name) || is_wall_name(name);
    }
    with_sides(block.state.clone(), connected)
}

fn wall(state: &mut FinalizationState<'_>, block: &Block) -> BlockState {
    let mut connected = [false; 4];
    for (i, direction) in Facing::HORIZONTAL.iter().enumerate() {
        let other = neighbor(state, *direction);
        let name = other.short_name();
        connected[i] = other.solid
            || is_wall_name(name)
            || is_pane_name(name)
            || perpendicular_gate(&other, *direction);
    }
    // north, east, south, west
    let straight = matches!(connected, [true, false, true, false] | [false, true, false, true]);
    let above = state.get_material_at(0, 1, 0);
    flag(with_sides(block.state.clone(), connected), "up", !straight || !above.is_air())
}

fn fence_gate(state: &mut FinalizationState<'_>, block: &Block) -> BlockState {
    let facing = block.facing().unwrap_or(Facing::North);
    let in_wall = is_wall_name(neighbor(state, facing.clockwise()).short_name())
        || is_wall_name(neighbor(state, facing.counter_clockwise()).short_name());
    flag(block.state.clone(), "in_wall", in_wall)
}

// Doors

fn is_door_id(id: u8) -> bool {
    matches!(id, 64 | 71 | 193..=197)
}

/// Facing and open flag stored in a lower half.
fn door_lower(data: u8) -> (Facing, bool) {
    let facing = [Facing::East, Facing::South, Facing::West, Facing::North][(data & 0b11) as usize];
    (facing, data & 0b100 != 0)
}

/// Hinge and powered flag stored in an upper half.
fn door_upper(data: u8) -> (Hinge, bool) {
    let hinge = if data & 0b1 != 0 { Hinge::Right } else { Hinge::Left };
    (hinge, data & 0b10 != 0)
}

fn door(state: &mut FinalizationState<'_>, block: &Block, data: u8) -> BlockState {
    let upper = data & 0b1000 != 0;
    let other = state.get_material_at(0, if upper { -1 } else { 1 }, 0);

    let (facing, open, hinge, powered) = if upper {
        let (hinge, powered) = door_upper(data);
        let (facing, open) = match other.kind {
            BlockKind::Unfinalized { id, data } if is_door_id(id) && data & 0b1000 == 0 => {
                door_lower(data)
            }
            BlockKind::Door { facing, open, .. } => (facing, open),
            _ => (Facing::East, false),
        };
        (facing, open, hinge, powered)
    } else {
        let (facing, open) = door_lower(data);
        let (hinge, powered) = match other.kind {
            BlockKind::Unfinalized { id, data } if is_door_id(id) && data & 0b1000 != 0 => {
                door_upper(data)
            }
            BlockKind::Door { hinge, powered, .. } => (hinge, powered),
            _ => (Hinge::Left, false),
        };
        (facing, open, hinge, powered)
    };

    let result = BlockState::new(block.state.name.clone())
        .with_property("facing", facing.name())
        .with_property("half", if upper { "upper" } else { "lower" })
        .with_property("hinge", if hinge == Hinge::Right { "right" } else { "left" });
    flag(flag(result, "open", open), "powered", powered)
}

fn chest(state: &mut FinalizationState<'_>, block: &Block) -> BlockState {
    let facing = block.facing().unwrap_or(Facing::North);
    let name = block.short_name();
    let mut partner = |direction: Facing| {
        let other = neighbor(state, direction);
        other.short_name() == name && other.facing() == Some(facing)
    };
    let kind = if partner(facing.clockwise()) {
        ChestType::Left
    } else if partner(facing.counter_clockwise()) {
        ChestType::Right
    } else {
        ChestType::Single
    };
    block.state.clone().with_property("type", kind.name())
}

// Redstone

fn wire_connects(other: &Block, direction: Facing) -> bool {
    let name = other.short_name();
    match name {
        "redstone_wire" | "redstone_torch" | "redstone_wall_torch" | "redstone_block" | "lever"
        | "daylight_detector" | "comparator" | "detector_rail" | "trapped_chest" | "tripwire_hook" => {
            true
        }
        "repeater" => other
            .facing()
            .map(|f| f.axis() == direction.axis())
            .unwrap_or(false),
        "observer" => other.facing() == Some(direction),
        _ => name.ends_with("_button") || name.ends_with("_pressure_plate"),
    }
}

fn redstone_wire(state: &mut FinalizationState<'_>, block: &Block) -> BlockState {
    let above_solid = state.get_material_at(0, 1, 0).solid;
    let mut sides = [WireSide::None; 4];
    for (i, direction) in Facing::HORIZONTAL.iter().enumerate() {
        let (dx, _, dz) = direction.offset();
        let other = state.get_material_at(dx, 0, dz);
        sides[i] = if wire_connects(&other, *direction) {
            WireSide::Side
        } else if other.solid
            && !above_solid
            && state.get_material_at(dx, 1, dz).short_name() == "redstone_wire"
        {
            WireSide::Up
        } else if !other.solid && state.get_material_at(dx, -1, dz).short_name() == "redstone_wire" {
            WireSide::Side
        } else {
            WireSide::None
        };
    }

    // A wire with a single connection runs straight through its block.
    let connected: Vec<usize> = (0..4).filter(|i| sides[*i] != WireSide::None).collect();
    if let [only] = connected[..] {
        sides[(only + 2) % 4] = WireSide::Side;
    }

    let mut result = block.state.clone();
    for (direction, side) in Facing::HORIZONTAL.iter().zip(sides) {
        result.set_property(direction.name(), side.name());
    }
    result
}

fn tripwire(state: &mut FinalizationState<'_>, block: &Block, data: u8) -> BlockState {
    let mut connected = [false; 4];
    for (i, direction) in Facing::HORIZONTAL.iter().enumerate() {
        let other = neighbor(state, *direction);
        connected[i] = match other.short_name() {
            "tripwire" => true,
            "tripwire_hook" => other.facing() == Some(direction.opposite()),
            _ => false,
        };
    }
    let result = flag(block.state.clone(), "powered", data & 0b0001 != 0);
    let result = flag(result, "attached", data & 0b0100 != 0);
    let result = flag(result, "disarmed", data & 0b1000 != 0);
    with_sides(result, connected)
}

// Plants

fn stem(state: &mut FinalizationState<'_>, data: u8, attached: &str, fruits: &[&str]) -> Option<BlockState> {
    if data & 0b111 != 7 {
        return None;
    }
    Facing::HORIZONTAL
        .iter()
        .find(|direction| fruits.contains(&neighbor(state, **direction).short_name()))
        .map(|direction| BlockState::minecraft(attached).with_property("facing", direction.name()))
}

fn vine(state: &mut FinalizationState<'_>, block: &Block) -> BlockState {
    let up = block.state.is_true("up") || state.get_material_at(0, 1, 0).solid;
    flag(block.state.clone(), "up", up)
}

fn tall_plant(state: &mut FinalizationState<'_>, block: &Block, data: u8) -> BlockState {
    if data & 0b1000 == 0 {
        return block.state.clone().with_property("half", "lower");
    }
    let below = state.get_material_at(0, -1, 0);
    let kind = match below.kind {
        BlockKind::Unfinalized { id: 175, data } if data & 0b1000 == 0 => {
            DOUBLE_PLANTS.get((data & 0b111) as usize).copied()
        }
        _ => DOUBLE_PLANTS.iter().copied().find(|name| *name == below.short_name()),
    };
    match kind {
        Some(kind) => BlockState::minecraft(kind).with_property("half", "upper"),
        None => block.state.clone().with_property("half", "upper"),
    }
}

fn flammable(block: &Block) -> bool {
    const SUFFIXES: [&str; 8] = [
        "_planks", "_log", "_wood", "_leaves", "_wool", "_fence", "_fence_gate", "_carpet",
    ];
    let name = block.short_name();
    SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        || matches!(name, "bookshelf" | "tnt" | "hay_block" | "vine" | "coal_block" | "dead_bush")
}

fn fire(state: &mut FinalizationState<'_>, block: &Block, data: u8) -> BlockState {
    let below = state.get_material_at(0, -1, 0);
    let floating = !below.solid && !flammable(&below);
    let mut connected = [false; 4];
    if floating {
        for (i, direction) in Facing::HORIZONTAL.iter().enumerate() {
            connected[i] = flammable(&neighbor(state, *direction));
        }
    }
    let up = floating && flammable(&state.get_material_at(0, 1, 0));
    let result = int(block.state.clone(), "age", data & 0xF);
    flag(with_sides(result, connected), "up", up)
}

fn chorus_plant(state: &mut FinalizationState<'_>, block: &Block) -> BlockState {
    const FACES: [(&str, (i32, i32, i32)); 6] = [
        ("north", (0, 0, -1)),
        ("east", (1, 0, 0)),
        ("south", (0, 0, 1)),
        ("west", (-1, 0, 0)),
        ("up", (0, 1, 0)),
        ("down", (0, -1, 0)),
    ];
    let mut result = block.state.clone();
    for (face, (dx, dy, dz)) in FACES {
        let other = state.get_material_at(dx, dy, dz);
        let name = other.short_name();
        let connected = matches!(name, "chorus_plant" | "chorus_flower") || (face == "down" && name == "end_stone");
        result = flag(result, face, connected);
    }
    result
}

fn portal(state: &mut FinalizationState<'_>, block: &Block) -> BlockState {
    let frames_x = [-1, 1].iter().any(|dx| {
        matches!(
            state.get_material_at(*dx, 0, 0).short_name(),
            "obsidian" | "nether_portal"
        )
    });
    block.state.clone().with_property("axis", if frames_x { "x" } else { "z" })
}

// Tile entity driven

fn bed(state: &mut FinalizationState<'_>, block: &Block) -> Option<BlockState> {
    let color = state.tile_entity()?.int_or("color", 14);
    Some(renamed(&block.state, &format!("{}_bed", COLORS[(color & 0xF) as usize])))
}

const SKULLS: [(&str, &str); 6] = [
    ("skeleton_skull", "skeleton_wall_skull"),
    ("wither_skeleton_skull", "wither_skeleton_wall_skull"),
    ("zombie_head", "zombie_wall_head"),
    ("player_head", "player_wall_head"),
    ("creeper_head", "creeper_wall_head"),
    ("dragon_head", "dragon_wall_head"),
];

fn skull(state: &mut FinalizationState<'_>, data: u8) -> Option<BlockState> {
    let (kind, rotation) = match state.tile_entity() {
        Some(tag) => (tag.int_or("SkullType", 0), tag.int_or("Rot", 0)),
        None => (0, 0),
    };
    let (floor, wall) = SKULLS.get(kind as usize).copied().unwrap_or(SKULLS[0]);
    let result = match data & 0b111 {
        2..=5 => attached_facing(BlockState::minecraft(wall), data & 0b111),
        _ => BlockState::minecraft(floor).with_property("rotation", (rotation & 0xF).to_string()),
    };
    Some(result)
}

fn banner(state: &mut FinalizationState<'_>, wall: bool, data: u8) -> Option<BlockState> {
    let color = match state.tile_entity() {
        // Base is stored in dye order, which runs opposite to wool colors.
        Some(tag) => COLORS[(15 - (tag.int_or("Base", 0) & 0xF)) as usize],
        None => COLORS[0],
    };
    let result = if wall {
        attached_facing(BlockState::minecraft(&format!("{}_wall_banner", color)), data)
    } else {
        int(BlockState::minecraft(&format!("{}_banner", color)), "rotation", data & 0xF)
    };
    Some(result)
}

const RED_FLOWERS: [&str; 9] = [
    "poppy",
    "blue_orchid",
    "allium",
    "azure_bluet",
    "red_tulip",
    "orange_tulip",
    "white_tulip",
    "pink_tulip",
    "oxeye_daisy",
];

/// Potted form of a flower pot item. Items are a namespaced name since 1.8
/// and a numeric id before.
fn potted_plant(item: &str, data: usize) -> Option<String> {
    let item = item.strip_prefix("minecraft:").unwrap_or(item);
    let plant = match item {
        "red_flower" | "38" => RED_FLOWERS.get(data).copied()?.to_string(),
        "yellow_flower" | "37" => "dandelion".to_string(),
        "sapling" | "6" => format!("{}_sapling", WOOD_TYPES.get(data).copied()?),
        "brown_mushroom" | "39" => "brown_mushroom".to_string(),
        "red_mushroom" | "40" => "red_mushroom".to_string(),
        "cactus" | "81" => "cactus".to_string(),
        "deadbush" | "32" => "dead_bush".to_string(),
        "tallgrass" | "31" if data == 2 => "fern".to_string(),
        _ => return None,
    };
    Some(format!("potted_{}", plant))
}

fn flower_pot(state: &mut FinalizationState<'_>) -> Option<BlockState> {
    let tag = state.tile_entity()?;
    let item = tag.tag("Item").and_then(scalar_string)?;
    let data = tag.int_or("Data", 0).max(0) as usize;
    potted_plant(&item, data).map(|name| BlockState::minecraft(&name))
}

#[cfg(test)]
mod tests {
    use super::super::{finalize_block, BlockAccess};
    use super::*;
    use crate::block_spec::BlockSpec;
    use crate::legacy;
    use crate::palette::{BlockId, BlockPalette, AIR_ID};
    use quartz_nbt::NbtCompound;
    use rustc_hash::FxHashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct TestWorld {
        blocks: FxHashMap<(i32, i32, i32), BlockId>,
        tiles: Vec<NbtCompound>,
    }

    impl BlockAccess for TestWorld {
        fn block_id(&self, x: i32, y: i32, z: i32) -> BlockId {
            self.blocks.get(&(x, y, z)).copied().unwrap_or(AIR_ID)
        }

        fn set_block_id(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
            self.blocks.insert((x, y, z), id);
        }

        fn tile_entity(&self, x: i32, y: i32, z: i32) -> Option<&NbtCompound> {
            super::super::find_tile_entity(&self.tiles, x, y, z)
        }
    }

    impl TestWorld {
        fn legacy(&mut self, palette: &BlockPalette, pos: (i32, i32, i32), id: u8, data: u8) {
            self.blocks.insert(pos, palette.put(legacy::translate_spec(id, data)));
        }

        fn named(&mut self, palette: &BlockPalette, pos: (i32, i32, i32), name: &str) {
            self.blocks
                .insert(pos, palette.put(&BlockSpec::State(BlockState::minecraft(name))));
        }

        fn finalize(&mut self, palette: &BlockPalette, (x, y, z): (i32, i32, i32)) -> Arc<Block> {
            {
                let mut state = FinalizationState::new(self, palette);
                state.set_position(x, y, z);
                finalize_block(&mut state);
            }
            palette.get(self.block_id(x, y, z))
        }
    }

    fn tile(x: i32, y: i32, z: i32) -> NbtCompound {
        let mut tag = NbtCompound::new();
        tag.insert("x", x);
        tag.insert("y", y);
        tag.insert("z", z);
        tag
    }

    #[test]
    fn test_lone_stairs_are_straight() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 53, 0);
        let block = world.finalize(&palette, (0, 0, 0));
        assert_eq!(block.short_name(), "oak_stairs");
        assert_eq!(block.state.get_property("shape"), Some("straight"));
        assert_eq!(block.state.get_property("facing"), Some("east"));
        assert_eq!(block.state.get_property("half"), Some("bottom"));
    }

    #[test]
    fn test_stairs_outer_corner() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 53, 0);
        // Behind an east-facing stair, a south-facing one.
        world.legacy(&palette, (1, 0, 0), 53, 2);
        let block = world.finalize(&palette, (0, 0, 0));
        assert_eq!(block.state.get_property("shape"), Some("outer_right"));
    }

    #[test]
    fn test_stairs_inner_corner() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 53, 0);
        world.legacy(&palette, (-1, 0, 0), 53, 3);
        let block = world.finalize(&palette, (0, 0, 0));
        assert_eq!(block.state.get_property("shape"), Some("inner_left"));
    }

    #[test]
    fn test_stairs_ignore_other_half() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 53, 0);
        world.legacy(&palette, (1, 0, 0), 53, 2 | 4);
        let block = world.finalize(&palette, (0, 0, 0));
        assert_eq!(block.state.get_property("shape"), Some("straight"));
    }

    #[test]
    fn test_fence_connections() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 85, 0);
        world.named(&palette, (1, 0, 0), "stone");
        world.legacy(&palette, (0, 0, 1), 85, 0);
        world.named(&palette, (-1, 0, 0), "glass");
        world.legacy(&palette, (0, 0, -1), 113, 0);
        let block = world.finalize(&palette, (0, 0, 0));
        assert_eq!(block.short_name(), "oak_fence");
        assert_eq!(block.state.get_property("east"), Some("true"));
        assert_eq!(block.state.get_property("south"), Some("true"));
        assert_eq!(block.state.get_property("west"), Some("false"));
        assert_eq!(block.state.get_property("north"), Some("false"));
    }

    #[test]
    fn test_isolated_fence_keeps_plain_state() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 85, 0);
        let block = world.finalize(&palette, (0, 0, 0));
        assert!(!block.is_unfinalized());
        assert_eq!(block.state, BlockState::minecraft("oak_fence"));
    }

    #[test]
    fn test_nether_fence_only_joins_its_own_kind() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 113, 0);
        world.legacy(&palette, (1, 0, 0), 85, 0);
        world.legacy(&palette, (-1, 0, 0), 113, 0);
        let block = world.finalize(&palette, (0, 0, 0));
        assert_eq!(block.state.get_property("east"), Some("false"));
        assert_eq!(block.state.get_property("west"), Some("true"));
    }

    #[test]
    fn test_door_halves_share_properties() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        // Lower: facing south, open. Upper: right hinge.
        world.legacy(&palette, (0, 0, 0), 64, 0b0101);
        world.legacy(&palette, (0, 1, 0), 64, 0b1001);

        let lower = world.finalize(&palette, (0, 0, 0));
        assert_eq!(lower.short_name(), "oak_door");
        assert_eq!(lower.state.get_property("half"), Some("lower"));
        assert_eq!(lower.state.get_property("facing"), Some("south"));
        assert_eq!(lower.state.get_property("hinge"), Some("right"));
        assert_eq!(lower.state.get_property("open"), Some("true"));

        let upper = world.finalize(&palette, (0, 1, 0));
        assert_eq!(upper.state.get_property("half"), Some("upper"));
        assert_eq!(upper.state.get_property("facing"), Some("south"));
        assert_eq!(upper.state.get_property("hinge"), Some("right"));
        assert_eq!(upper.state.get_property("open"), Some("true"));
    }

    #[test]
    fn test_snowy_grass() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 2, 0);
        world.legacy(&palette, (0, 1, 0), 78, 0);
        let block = world.finalize(&palette, (0, 0, 0));
        assert_eq!(block.short_name(), "grass_block");
        assert_eq!(block.state.get_property("snowy"), Some("true"));
    }

    #[test]
    fn test_tall_plant_upper_copies_kind() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 175, 4);
        world.legacy(&palette, (0, 1, 0), 175, 8);
        let upper = world.finalize(&palette, (0, 1, 0));
        assert_eq!(upper.short_name(), "rose_bush");
        assert_eq!(upper.state.get_property("half"), Some("upper"));
        let lower = world.finalize(&palette, (0, 0, 0));
        assert_eq!(lower.short_name(), "rose_bush");
        assert_eq!(lower.state.get_property("half"), Some("lower"));
    }

    #[test]
    fn test_chest_pair() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 54, 2);
        world.legacy(&palette, (1, 0, 0), 54, 2);
        world.legacy(&palette, (5, 0, 0), 54, 2);
        assert_eq!(world.finalize(&palette, (0, 0, 0)).state.get_property("type"), Some("left"));
        assert_eq!(world.finalize(&palette, (1, 0, 0)).state.get_property("type"), Some("right"));
        assert_eq!(world.finalize(&palette, (5, 0, 0)).state.get_property("type"), Some("single"));
    }

    #[test]
    fn test_redstone_line() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 55, 3);
        world.legacy(&palette, (1, 0, 0), 55, 0);
        let block = world.finalize(&palette, (0, 0, 0));
        assert_eq!(block.state.get_property("power"), Some("3"));
        assert_eq!(block.state.get_property("east"), Some("side"));
        // A single connection also points the opposite way.
        assert_eq!(block.state.get_property("west"), Some("side"));
        assert_eq!(block.state.get_property("north"), Some("none"));
    }

    #[test]
    fn test_flower_pot_from_tile_entity() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (2, 64, 3), 140, 0);
        let mut tag = tile(2, 64, 3);
        tag.insert("Item", "minecraft:red_flower".to_string());
        tag.insert("Data", 2i32);
        world.tiles.push(tag);
        assert_eq!(world.finalize(&palette, (2, 64, 3)).short_name(), "potted_allium");
    }

    #[test]
    fn test_empty_flower_pot() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 140, 0);
        assert_eq!(world.finalize(&palette, (0, 0, 0)).short_name(), "flower_pot");
    }

    #[test]
    fn test_bed_color_and_skull_kind() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 26, 8);
        let mut bed = tile(0, 0, 0);
        bed.insert("color", 11i32);
        world.tiles.push(bed);
        let block = world.finalize(&palette, (0, 0, 0));
        assert_eq!(block.short_name(), "blue_bed");
        assert_eq!(block.state.get_property("part"), Some("head"));

        world.legacy(&palette, (4, 0, 0), 144, 3);
        let mut skull = tile(4, 0, 0);
        skull.insert("SkullType", 4i8);
        world.tiles.push(skull);
        let block = world.finalize(&palette, (4, 0, 0));
        assert_eq!(block.short_name(), "creeper_wall_head");
        assert_eq!(block.state.get_property("facing"), Some("south"));
    }

    #[test]
    fn test_old_portal_axis_follows_frame() {
        let palette = BlockPalette::new();
        let mut world = TestWorld::default();
        world.legacy(&palette, (0, 0, 0), 90, 0);
        world.named(&palette, (1, 0, 0), "obsidian");
        let block = world.finalize(&palette, (0, 0, 0));
        assert_eq!(block.state.get_property("axis"), Some("x"));
    }
}
