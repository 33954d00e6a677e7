//! Concrete block values built from block specs.
//!
//! A block is a closed set of tagged variants. `Block::from_spec` is a pure
//! dispatch on the block name; names it does not recognise become
//! `BlockKind::Unknown` instead of failing.

pub mod properties;

pub use properties::{Axis, ChestType, Facing, Half, Hinge, Sides, SlabType, StairShape, WireSide};

use crate::block_spec::{BlockSpec, BlockState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Air,
    /// Opaque full cube.
    Cube,
    /// Full cube that light passes through (glass, leaves, ice).
    Translucent,
    /// Cross-shaped plant sprite.
    Sprite,
    Water { level: u8 },
    Lava { level: u8 },
    Slab(SlabType),
    Stairs {
        facing: Facing,
        half: Half,
        shape: StairShape,
    },
    Fence(Sides),
    Pane(Sides),
    Wall(Sides),
    FenceGate {
        facing: Facing,
        open: bool,
        in_wall: bool,
    },
    Door {
        facing: Facing,
        half: Half,
        hinge: Hinge,
        open: bool,
        powered: bool,
    },
    Trapdoor {
        facing: Facing,
        half: Half,
        open: bool,
    },
    Log(Axis),
    Torch,
    WallTorch(Facing),
    /// Anything else oriented by a `facing` property.
    Directional(Facing),
    /// Grass block, mycelium and podzol.
    Snowy { snowy: bool },
    Snow { layers: u8 },
    Portal(Axis),
    Bed { facing: Facing, head: bool },
    Chest { facing: Facing, kind: ChestType },
    RedstoneWire { power: u8, sides: [WireSide; 4] },
    Stem { age: u8 },
    AttachedStem(Facing),
    Vine { up: bool, sides: Sides },
    TallPlant { half: Half },
    Head { wall: bool },
    Banner { wall: bool },
    FlowerPot,
    /// Legacy block still waiting for neighbor context.
    Unfinalized { id: u8, data: u8 },
    Unknown,
}

/// A realized block: its resolved state plus the parameters derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub state: BlockState,
    pub kind: BlockKind,
    /// Full opaque cube; fences and panes connect to these.
    pub solid: bool,
    pub waterlogged: bool,
}

impl Block {
    pub fn air() -> Block {
        Block::from_state(&BlockState::air())
    }

    pub fn from_spec(spec: &BlockSpec) -> Block {
        match spec {
            BlockSpec::State(state) => Block::from_state(state),
            BlockSpec::Legacy(legacy) => Block {
                kind: BlockKind::Unfinalized {
                    id: legacy.id,
                    data: legacy.data,
                },
                // Neighbors see the best-effort block until it is resolved.
                ..Block::from_state(&legacy.block)
            },
        }
    }

    pub fn from_state(state: &BlockState) -> Block {
        let kind = if state.is_minecraft() {
            classify(state.short_name(), state)
        } else {
            BlockKind::Unknown
        };
        let solid = match &kind {
            BlockKind::Cube | BlockKind::Log(_) | BlockKind::Snowy { .. } => true,
            BlockKind::Slab(SlabType::Double) => true,
            BlockKind::Directional(_) => is_full_directional(state.short_name()),
            _ => false,
        };
        Block {
            state: state.clone(),
            kind,
            solid,
            waterlogged: state.is_true("waterlogged"),
        }
    }

    pub fn name(&self) -> &str {
        self.state.name.as_str()
    }

    pub fn short_name(&self) -> &str {
        self.state.short_name()
    }

    pub fn is_air(&self) -> bool {
        matches!(self.kind, BlockKind::Air)
    }

    pub fn is_unfinalized(&self) -> bool {
        matches!(self.kind, BlockKind::Unfinalized { .. })
    }

    pub fn is_stairs(&self) -> bool {
        self.short_name().ends_with("_stairs")
    }

    pub fn is_fence_gate(&self) -> bool {
        self.short_name().ends_with("_fence_gate")
    }

    /// Facing read from the state; works for pending legacy blocks too since
    /// the translator writes facing into the incomplete state.
    pub fn facing(&self) -> Option<Facing> {
        self.state.get_property("facing").and_then(Facing::from_name)
    }

    pub fn half(&self) -> Option<Half> {
        self.state.get_property("half").and_then(Half::from_name)
    }
}

fn facing_of(state: &BlockState, default: Facing) -> Facing {
    state
        .get_property("facing")
        .and_then(Facing::from_name)
        .unwrap_or(default)
}

fn half_of(state: &BlockState, default: Half) -> Half {
    state
        .get_property("half")
        .and_then(Half::from_name)
        .unwrap_or(default)
}

fn number_of(state: &BlockState, key: &str) -> u8 {
    state
        .get_property(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn sides_of(state: &BlockState) -> Sides {
    // Walls use none/low/tall in newer versions, true/false before.
    let connected = |key| matches!(state.get_property(key), Some("true" | "low" | "tall"));
    Sides {
        north: connected("north"),
        east: connected("east"),
        south: connected("south"),
        west: connected("west"),
    }
}

fn classify(name: &str, state: &BlockState) -> BlockKind {
    match name {
        "air" | "cave_air" | "void_air" => return BlockKind::Air,
        "water" | "bubble_column" => {
            return BlockKind::Water {
                level: number_of(state, "level"),
            }
        }
        "lava" => {
            return BlockKind::Lava {
                level: number_of(state, "level"),
            }
        }
        "grass_block" | "mycelium" | "podzol" => {
            return BlockKind::Snowy {
                snowy: state.is_true("snowy"),
            }
        }
        "snow" => {
            return BlockKind::Snow {
                layers: number_of(state, "layers").max(1),
            }
        }
        "torch" | "redstone_torch" | "soul_torch" => return BlockKind::Torch,
        "wall_torch" | "redstone_wall_torch" | "soul_wall_torch" => {
            return BlockKind::WallTorch(facing_of(state, Facing::North))
        }
        "nether_portal" => {
            return BlockKind::Portal(
                state
                    .get_property("axis")
                    .and_then(Axis::from_name)
                    .unwrap_or(Axis::X),
            )
        }
        "chest" | "trapped_chest" => {
            let kind = match state.get_property("type") {
                Some("left") => ChestType::Left,
                Some("right") => ChestType::Right,
                _ => ChestType::Single,
            };
            return BlockKind::Chest {
                facing: facing_of(state, Facing::North),
                kind,
            };
        }
        "redstone_wire" => {
            let side = |key| WireSide::from_name(state.property_or(key, "none"));
            return BlockKind::RedstoneWire {
                power: number_of(state, "power"),
                sides: [side("north"), side("east"), side("south"), side("west")],
            };
        }
        "pumpkin_stem" | "melon_stem" => {
            return BlockKind::Stem {
                age: number_of(state, "age"),
            }
        }
        "attached_pumpkin_stem" | "attached_melon_stem" => {
            return BlockKind::AttachedStem(facing_of(state, Facing::North))
        }
        "vine" => {
            return BlockKind::Vine {
                up: state.is_true("up"),
                sides: sides_of(state),
            }
        }
        "sunflower" | "lilac" | "tall_grass" | "large_fern" | "rose_bush" | "peony"
        | "tall_seagrass" => {
            return BlockKind::TallPlant {
                half: half_of(state, Half::Bottom),
            }
        }
        "glass_pane" | "iron_bars" => return BlockKind::Pane(sides_of(state)),
        "nether_brick_fence" => return BlockKind::Fence(sides_of(state)),
        "flower_pot" => return BlockKind::FlowerPot,
        "glass" | "ice" | "slime_block" | "honey_block" | "tinted_glass" | "frosted_ice"
        | "barrier" | "spawner" | "beacon" => return BlockKind::Translucent,
        _ => {}
    }

    if let Some(kind) = classify_by_suffix(name, state) {
        return kind;
    }
    if is_sprite(name) {
        return BlockKind::Sprite;
    }
    if is_cube(name) {
        return BlockKind::Cube;
    }
    if let Some(facing) = state.get_property("facing").and_then(Facing::from_name) {
        return BlockKind::Directional(facing);
    }
    BlockKind::Unknown
}

fn classify_by_suffix(name: &str, state: &BlockState) -> Option<BlockKind> {
    if name.starts_with("potted_") {
        return Some(BlockKind::FlowerPot);
    }
    if name.ends_with("_wall_torch") {
        return Some(BlockKind::WallTorch(facing_of(state, Facing::North)));
    }
    if name.ends_with("_wall_banner") {
        return Some(BlockKind::Banner { wall: true });
    }
    if name.ends_with("_banner") {
        return Some(BlockKind::Banner { wall: false });
    }
    if name.ends_with("_wall_head") || name.ends_with("_wall_skull") {
        return Some(BlockKind::Head { wall: true });
    }
    if name.ends_with("_head") || name.ends_with("_skull") {
        return Some(BlockKind::Head { wall: false });
    }
    if name.ends_with("_wall_sign") || name.ends_with("_wall_fan") {
        return Some(BlockKind::Directional(facing_of(state, Facing::North)));
    }
    if name.ends_with("_wall") {
        return Some(BlockKind::Wall(sides_of(state)));
    }
    if name.ends_with("_stairs") {
        return Some(BlockKind::Stairs {
            facing: facing_of(state, Facing::North),
            half: half_of(state, Half::Bottom),
            shape: state
                .get_property("shape")
                .and_then(StairShape::from_name)
                .unwrap_or(StairShape::Straight),
        });
    }
    if name.ends_with("_slab") {
        return Some(BlockKind::Slab(
            state
                .get_property("type")
                .and_then(SlabType::from_name)
                .unwrap_or(SlabType::Bottom),
        ));
    }
    if name.ends_with("_fence_gate") {
        return Some(BlockKind::FenceGate {
            facing: facing_of(state, Facing::North),
            open: state.is_true("open"),
            in_wall: state.is_true("in_wall"),
        });
    }
    if name.ends_with("_fence") {
        return Some(BlockKind::Fence(sides_of(state)));
    }
    if name.ends_with("_stained_glass_pane") {
        return Some(BlockKind::Pane(sides_of(state)));
    }
    if name.ends_with("_stained_glass") || name.ends_with("_leaves") {
        return Some(BlockKind::Translucent);
    }
    if name.ends_with("_trapdoor") {
        return Some(BlockKind::Trapdoor {
            facing: facing_of(state, Facing::North),
            half: half_of(state, Half::Bottom),
            open: state.is_true("open"),
        });
    }
    if name.ends_with("_door") {
        let hinge = match state.get_property("hinge") {
            Some("right") => Hinge::Right,
            _ => Hinge::Left,
        };
        return Some(BlockKind::Door {
            facing: facing_of(state, Facing::North),
            half: half_of(state, Half::Bottom),
            hinge,
            open: state.is_true("open"),
            powered: state.is_true("powered"),
        });
    }
    if name.ends_with("_bed") {
        return Some(BlockKind::Bed {
            facing: facing_of(state, Facing::North),
            head: state.get_property("part") == Some("head"),
        });
    }
    let axis_block = name.ends_with("_log")
        || name.ends_with("_wood")
        || name.ends_with("_stem")
        || name.ends_with("_hyphae")
        || name.ends_with("_pillar")
        || matches!(name, "hay_block" | "bone_block" | "basalt" | "polished_basalt");
    if axis_block {
        return Some(BlockKind::Log(
            state
                .get_property("axis")
                .and_then(Axis::from_name)
                .unwrap_or(Axis::Y),
        ));
    }
    None
}

fn is_sprite(name: &str) -> bool {
    matches!(
        name,
        "grass"
            | "short_grass"
            | "fern"
            | "dead_bush"
            | "dandelion"
            | "poppy"
            | "blue_orchid"
            | "allium"
            | "azure_bluet"
            | "oxeye_daisy"
            | "cornflower"
            | "lily_of_the_valley"
            | "wither_rose"
            | "brown_mushroom"
            | "red_mushroom"
            | "wheat"
            | "carrots"
            | "potatoes"
            | "beetroots"
            | "sugar_cane"
            | "cobweb"
            | "nether_wart"
            | "seagrass"
            | "sweet_berry_bush"
            | "rail"
            | "powered_rail"
            | "detector_rail"
            | "activator_rail"
            | "ladder"
            | "lever"
            | "tripwire"
            | "tripwire_hook"
            | "fire"
            | "soul_fire"
            | "lily_pad"
            | "cocoa"
            | "chorus_flower"
            | "chorus_plant"
    ) || name.ends_with("_sapling")
        || name.ends_with("_tulip")
        || name.ends_with("_button")
        || name.ends_with("_pressure_plate")
        || name.ends_with("_carpet")
        || name.ends_with("_sign")
}

fn is_cube(name: &str) -> bool {
    const SUFFIXES: [&str; 10] = [
        "_planks",
        "_wool",
        "_concrete",
        "_concrete_powder",
        "_terracotta",
        "_ore",
        "_bricks",
        "_sandstone",
        "_shulker_box",
        "_glazed_terracotta",
    ];
    if SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return true;
    }
    matches!(
        name,
        "stone"
            | "granite"
            | "polished_granite"
            | "diorite"
            | "polished_diorite"
            | "andesite"
            | "polished_andesite"
            | "dirt"
            | "coarse_dirt"
            | "cobblestone"
            | "mossy_cobblestone"
            | "bedrock"
            | "sand"
            | "red_sand"
            | "gravel"
            | "sandstone"
            | "sponge"
            | "wet_sponge"
            | "bricks"
            | "bookshelf"
            | "obsidian"
            | "netherrack"
            | "soul_sand"
            | "glowstone"
            | "clay"
            | "terracotta"
            | "shulker_box"
            | "end_stone"
            | "prismarine"
            | "dark_prismarine"
            | "sea_lantern"
            | "magma_block"
            | "note_block"
            | "coal_block"
            | "iron_block"
            | "gold_block"
            | "diamond_block"
            | "emerald_block"
            | "lapis_block"
            | "redstone_block"
            | "netherite_block"
            | "copper_block"
            | "raw_iron_block"
            | "raw_gold_block"
            | "raw_copper_block"
            | "amethyst_block"
            | "quartz_block"
            | "chiseled_quartz_block"
            | "smooth_quartz"
            | "purpur_block"
            | "snow_block"
            | "hay_block"
            | "bone_block"
            | "dried_kelp_block"
            | "honeycomb_block"
            | "nether_wart_block"
            | "warped_wart_block"
            | "red_mushroom_block"
            | "brown_mushroom_block"
            | "tnt"
            | "crafting_table"
            | "farmland"
            | "dirt_path"
            | "grass_path"
            | "pumpkin"
            | "melon"
            | "jukebox"
            | "infested_stone"
            | "infested_cobblestone"
            | "infested_stone_bricks"
            | "infested_mossy_stone_bricks"
            | "infested_cracked_stone_bricks"
            | "infested_chiseled_stone_bricks"
            | "packed_ice"
            | "blue_ice"
            | "structure_block"
            | "command_block"
            | "chain_command_block"
            | "repeating_command_block"
            | "deepslate"
            | "tuff"
            | "calcite"
            | "mud"
    )
}

/// Oriented blocks that still fill the whole cube.
fn is_full_directional(name: &str) -> bool {
    matches!(
        name,
        "furnace"
            | "dispenser"
            | "dropper"
            | "observer"
            | "carved_pumpkin"
            | "jack_o_lantern"
            | "command_block"
            | "chain_command_block"
            | "repeating_command_block"
    ) || name.ends_with("_glazed_terracotta")
}
