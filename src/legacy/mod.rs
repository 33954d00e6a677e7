//! Translation of pre-flattening numeric block ids into named block states.
//!
//! `translate(id, data)` covers the whole 256 x 16 key space through a table
//! built once on first use. Blocks whose final state depends on their
//! neighbors come back as `BlockSpec::Legacy` envelopes; the finalization pass
//! resolves those later. Ids with no mapping become `minecraft:unknown`.

pub mod families;

use crate::block_spec::{BlockSpec, BlockState, LegacySpec};
use families::*;
use quartz_nbt::NbtCompound;
use std::sync::OnceLock;

const TABLE_SIZE: usize = 256 * 16;

struct LegacyEntry {
    spec: BlockSpec,
    tag: NbtCompound,
}

static TABLE: OnceLock<Vec<LegacyEntry>> = OnceLock::new();

fn table() -> &'static [LegacyEntry] {
    TABLE.get_or_init(|| {
        (0..TABLE_SIZE)
            .map(|key| {
                let spec = translate_uncached((key >> 4) as u8, (key & 0xF) as u8);
                let tag = spec.to_nbt();
                LegacyEntry { spec, tag }
            })
            .collect()
    })
}

fn key(id: u8, data: u8) -> usize {
    ((id as usize) << 4) | (data as usize & 0xF)
}

/// Tag for a legacy id/data pair. Only the low four bits of `data` are used.
pub fn translate(id: u8, data: u8) -> &'static NbtCompound {
    &table()[key(id, data)].tag
}

/// Same as `translate`, already parsed into a palette key.
pub fn translate_spec(id: u8, data: u8) -> &'static BlockSpec {
    &table()[key(id, data)].spec
}

/// Read the block at `offset` of a legacy section, where `blocks` holds one
/// id per block and `data` packs two nibbles per byte, low nibble first.
pub fn legacy_tag(offset: usize, blocks: &[i8], data: &[i8]) -> &'static NbtCompound {
    let (id, nibble) = section_entry(offset, blocks, data);
    translate(id, nibble)
}

/// Id and data nibble at `offset`. Missing bytes read as zero.
pub fn section_entry(offset: usize, blocks: &[i8], data: &[i8]) -> (u8, u8) {
    let id = blocks.get(offset).map(|b| *b as u8).unwrap_or(0);
    let packed = data.get(offset / 2).map(|b| *b as u8).unwrap_or(0);
    let nibble = (packed >> ((offset % 2) * 4)) & 0xF;
    (id, nibble)
}

fn mc(name: &str) -> BlockState {
    BlockState::minecraft(name)
}

fn done(state: BlockState) -> BlockSpec {
    BlockSpec::State(state)
}

fn pending(id: u8, data: u8, block: BlockState) -> BlockSpec {
    BlockSpec::Legacy(LegacySpec { id, data, block })
}

/// Pick a variant by data value; out of range values take the first one.
fn variant(names: &[&str], data: u8) -> BlockState {
    mc(names.get(data as usize).copied().unwrap_or(names[0]))
}

fn colored(suffix: &str, color: u8) -> BlockState {
    mc(&format!("{}_{}", COLORS[(color & 0xF) as usize], suffix))
}

const STONE_SLABS: [&str; 8] = [
    "smooth_stone_slab",
    "sandstone_slab",
    "oak_slab",
    "cobblestone_slab",
    "brick_slab",
    "stone_brick_slab",
    "nether_brick_slab",
    "quartz_slab",
];

fn translate_uncached(id: u8, data: u8) -> BlockSpec {
    match id {
        0 => done(mc("air")),
        1 => done(variant(
            &[
                "stone",
                "granite",
                "polished_granite",
                "diorite",
                "polished_diorite",
                "andesite",
                "polished_andesite",
            ],
            data,
        )),
        2 => pending(id, data, mc("grass_block")),
        3 => match data {
            1 => done(mc("coarse_dirt")),
            2 => pending(id, data, mc("podzol")),
            _ => done(mc("dirt")),
        },
        4 => done(mc("cobblestone")),
        5 => done(mc(&format!("{}_planks", WOOD_TYPES.get(data as usize).unwrap_or(&"oak")))),
        6 => done(mc(&format!("{}_sapling", WOOD_TYPES.get(data as usize).unwrap_or(&"oak")))),
        7 => done(mc("bedrock")),
        8 | 9 => done(int(mc("water"), "level", data & 0b111)),
        10 | 11 => done(int(mc("lava"), "level", data & 0b111)),
        12 => done(variant(&["sand", "red_sand"], data)),
        13 => done(mc("gravel")),
        14 => done(mc("gold_ore")),
        15 => done(mc("iron_ore")),
        16 => done(mc("coal_ore")),
        17 => done(log(mc(&format!("{}_log", WOOD_TYPES[(data & 3) as usize])), data)),
        18 => done(mc(&format!("{}_leaves", WOOD_TYPES[(data & 3) as usize]))),
        19 => done(variant(&["sponge", "wet_sponge"], data)),
        20 => done(mc("glass")),
        21 => done(mc("lapis_ore")),
        22 => done(mc("lapis_block")),
        23 => done(facing(mc("dispenser"), data)),
        24 => done(variant(&["sandstone", "chiseled_sandstone", "smooth_sandstone"], data)),
        25 => done(mc("note_block")),
        26 => pending(id, data, bed(data)),
        27 => done(utility_rail(mc("powered_rail"), data)),
        28 => done(utility_rail(mc("detector_rail"), data)),
        29 => done(piston(mc("sticky_piston"), data)),
        30 => done(mc("cobweb")),
        31 => done(match data {
            0 => mc("dead_bush"),
            2 => mc("fern"),
            _ => mc("grass"),
        }),
        32 => done(mc("dead_bush")),
        33 => done(piston(mc("piston"), data)),
        34 => done(piston_head(data)),
        35 => done(colored("wool", data)),
        37 => done(mc("dandelion")),
        38 => done(variant(
            &[
                "poppy",
                "blue_orchid",
                "allium",
                "azure_bluet",
                "red_tulip",
                "orange_tulip",
                "white_tulip",
                "pink_tulip",
                "oxeye_daisy",
            ],
            data,
        )),
        39 => done(mc("brown_mushroom")),
        40 => done(mc("red_mushroom")),
        41 => done(mc("gold_block")),
        42 => done(mc("iron_block")),
        43 | 44 => done(slab(mc(STONE_SLABS[(data & 7) as usize]), id == 43, data & 8 != 0)),
        45 => done(mc("bricks")),
        46 => done(mc("tnt")),
        47 => done(mc("bookshelf")),
        48 => done(mc("mossy_cobblestone")),
        49 => done(mc("obsidian")),
        50 => done(torch(data)),
        51 => pending(id, data, mc("fire")),
        52 => done(mc("spawner")),
        53 => pending(id, data, stairs(mc("oak_stairs"), data)),
        54 => pending(id, data, attached_facing(mc("chest"), data)),
        55 => pending(id, data, int(mc("redstone_wire"), "power", data)),
        56 => done(mc("diamond_ore")),
        57 => done(mc("diamond_block")),
        58 => done(mc("crafting_table")),
        59 => done(int(mc("wheat"), "age", data & 7)),
        60 => done(int(mc("farmland"), "moisture", data & 7)),
        61 => done(lit(facing(mc("furnace"), data), false)),
        62 => done(lit(facing(mc("furnace"), data), true)),
        63 => done(int(mc("oak_sign"), "rotation", data)),
        64 => pending(id, data, mc("oak_door")),
        65 => done(attached_facing(mc("ladder"), data)),
        66 => done(rail(data)),
        67 => pending(id, data, stairs(mc("cobblestone_stairs"), data)),
        68 => done(attached_facing(mc("oak_wall_sign"), data)),
        69 => done(lever(data)),
        70 => done(mc("stone_pressure_plate")),
        71 => pending(id, data, mc("iron_door")),
        72 => done(mc("oak_pressure_plate")),
        73 => done(lit(mc("redstone_ore"), false)),
        74 => done(lit(mc("redstone_ore"), true)),
        75 => done(redstone_torch(data, false)),
        76 => done(redstone_torch(data, true)),
        77 => done(button(mc("stone_button"), data)),
        78 => done(int(mc("snow"), "layers", (data & 7) + 1)),
        79 => done(mc("ice")),
        80 => done(mc("snow_block")),
        81 => done(mc("cactus")),
        82 => done(mc("clay")),
        83 => done(mc("sugar_cane")),
        84 => done(mc("jukebox")),
        85 => pending(id, data, mc("oak_fence")),
        86 => done(facing4(mc("carved_pumpkin"), data)),
        87 => done(mc("netherrack")),
        88 => done(mc("soul_sand")),
        89 => done(mc("glowstone")),
        90 => match data & 0b11 {
            1 => done(mc("nether_portal").with_property("axis", "x")),
            2 => done(mc("nether_portal").with_property("axis", "z")),
            // 1.6.4 and older: the axis follows the surrounding obsidian.
            _ => pending(id, data, mc("nether_portal")),
        },
        91 => done(facing4(mc("jack_o_lantern"), data)),
        92 => done(int(mc("cake"), "bites", data % 7)),
        93 => done(repeater(mc("repeater"), data, false)),
        94 => done(repeater(mc("repeater"), data, true)),
        95 => done(colored("stained_glass", data)),
        96 => done(trapdoor(mc("oak_trapdoor"), data)),
        97 => done(variant(
            &[
                "infested_stone",
                "infested_cobblestone",
                "infested_stone_bricks",
                "infested_mossy_stone_bricks",
                "infested_cracked_stone_bricks",
                "infested_chiseled_stone_bricks",
            ],
            data,
        )),
        98 => done(variant(
            &[
                "stone_bricks",
                "mossy_stone_bricks",
                "cracked_stone_bricks",
                "chiseled_stone_bricks",
            ],
            data,
        )),
        99 => done(mushroom(data, false)),
        100 => done(mushroom(data, true)),
        101 => pending(id, data, mc("iron_bars")),
        102 => pending(id, data, mc("glass_pane")),
        103 => done(mc("melon")),
        104 => pending(id, data, int(mc("pumpkin_stem"), "age", data & 7)),
        105 => pending(id, data, int(mc("melon_stem"), "age", data & 7)),
        106 => pending(id, data, vine(mc("vine"), data, false)),
        107 => pending(id, data, fence_gate(mc("oak_fence_gate"), data)),
        108 => pending(id, data, stairs(mc("brick_stairs"), data)),
        109 => pending(id, data, stairs(mc("stone_brick_stairs"), data)),
        110 => pending(id, data, mc("mycelium")),
        111 => done(mc("lily_pad")),
        112 => done(mc("nether_bricks")),
        113 => pending(id, data, mc("nether_brick_fence")),
        114 => pending(id, data, stairs(mc("nether_brick_stairs"), data)),
        115 => done(int(mc("nether_wart"), "age", data & 0b11)),
        116 => done(mc("enchanting_table")),
        117 => done(mc("brewing_stand")),
        118 => done(int(mc("cauldron"), "level", data & 3)),
        119 => done(mc("end_portal")),
        120 => done(end_portal_frame(data)),
        121 => done(mc("end_stone")),
        122 => done(mc("dragon_egg")),
        123 => done(lit(mc("redstone_lamp"), false)),
        124 => done(lit(mc("redstone_lamp"), true)),
        125 | 126 => done(slab(
            mc(&format!("{}_slab", WOOD_TYPES.get(data as usize & 7).unwrap_or(&"oak"))),
            id == 125,
            data & 8 != 0,
        )),
        127 => done(cocoa(data)),
        128 => pending(id, data, stairs(mc("sandstone_stairs"), data)),
        129 => done(mc("emerald_ore")),
        130 => done(attached_facing(mc("ender_chest"), data)),
        131 => done(tripwire_hook(data)),
        132 => pending(id, data, mc("tripwire")),
        133 => done(mc("emerald_block")),
        134 => pending(id, data, stairs(mc("spruce_stairs"), data)),
        135 => pending(id, data, stairs(mc("birch_stairs"), data)),
        136 => pending(id, data, stairs(mc("jungle_stairs"), data)),
        137 => done(command_block(mc("command_block"), data)),
        138 => done(mc("beacon")),
        139 => match data {
            1 => pending(id, data, mc("mossy_cobblestone_wall")),
            _ => pending(id, data, mc("cobblestone_wall")),
        },
        140 => match data {
            1..=13 => done(variant(
                &[
                    "flower_pot",
                    "potted_poppy",
                    "potted_dandelion",
                    "potted_oak_sapling",
                    "potted_spruce_sapling",
                    "potted_birch_sapling",
                    "potted_jungle_sapling",
                    "potted_red_mushroom",
                    "potted_brown_mushroom",
                    "potted_cactus",
                    "potted_dead_bush",
                    "potted_fern",
                    "potted_acacia_sapling",
                    "potted_dark_oak_sapling",
                ],
                data,
            )),
            // 1.7.2 and newer keep the plant in a tile entity.
            _ => pending(id, data, mc("flower_pot")),
        },
        141 => done(int(mc("carrots"), "age", data & 7)),
        142 => done(int(mc("potatoes"), "age", data & 7)),
        143 => done(button(mc("oak_button"), data)),
        144 => pending(id, data, mc("skull")),
        145 => done(anvil(data)),
        146 => pending(id, data, attached_facing(mc("trapped_chest"), data)),
        147 => done(mc("light_weighted_pressure_plate")),
        148 => done(mc("heavy_weighted_pressure_plate")),
        149 => done(comparator(mc("comparator"), data, false)),
        150 => done(comparator(mc("comparator"), data, true)),
        151 => done(flag(mc("daylight_detector"), "inverted", false)),
        152 => done(mc("redstone_block")),
        153 => done(mc("nether_quartz_ore")),
        154 => done(facing(mc("hopper"), data & 7)),
        155 => done(variant(&["quartz_block", "chiseled_quartz_block", "quartz_pillar"], data)),
        156 => pending(id, data, stairs(mc("quartz_stairs"), data)),
        157 => done(utility_rail(mc("activator_rail"), data)),
        158 => done(facing(mc("dropper"), data & 7)),
        159 => done(colored("terracotta", data)),
        160 => pending(id, data, colored("stained_glass_pane", data)),
        161 => done(mc(if data & 1 == 0 { "acacia_leaves" } else { "dark_oak_leaves" })),
        162 => done(log(
            mc(if data & 1 == 0 { "acacia_log" } else { "dark_oak_log" }),
            data,
        )),
        163 => pending(id, data, stairs(mc("acacia_stairs"), data)),
        164 => pending(id, data, stairs(mc("dark_oak_stairs"), data)),
        165 => done(mc("slime_block")),
        166 => done(mc("barrier")),
        167 => done(trapdoor(mc("iron_trapdoor"), data)),
        168 => done(variant(&["prismarine", "prismarine_bricks", "dark_prismarine"], data)),
        169 => done(mc("sea_lantern")),
        170 => done(log(mc("hay_block"), data)),
        171 => done(colored("carpet", data)),
        172 => done(mc("terracotta")),
        173 => done(mc("coal_block")),
        174 => done(mc("packed_ice")),
        175 => pending(
            id,
            data,
            // Upper halves carry no kind; the finalizer copies it from below.
            variant(&DOUBLE_PLANTS, data & 0b111),
        ),
        176 => pending(id, data, mc("banner")),
        177 => pending(id, data, mc("wall_banner")),
        178 => done(flag(mc("daylight_detector"), "inverted", true)),
        179 => done(variant(
            &["red_sandstone", "chiseled_red_sandstone", "smooth_red_sandstone"],
            data,
        )),
        180 => pending(id, data, stairs(mc("red_sandstone_stairs"), data)),
        181 => done(slab(mc("red_sandstone_slab"), true, false)),
        182 => done(slab(mc("red_sandstone_slab"), false, data & 8 != 0)),
        183 => pending(id, data, fence_gate(mc("spruce_fence_gate"), data)),
        184 => pending(id, data, fence_gate(mc("birch_fence_gate"), data)),
        185 => pending(id, data, fence_gate(mc("jungle_fence_gate"), data)),
        186 => pending(id, data, fence_gate(mc("dark_oak_fence_gate"), data)),
        187 => pending(id, data, fence_gate(mc("acacia_fence_gate"), data)),
        188 => pending(id, data, mc("spruce_fence")),
        189 => pending(id, data, mc("birch_fence")),
        190 => pending(id, data, mc("jungle_fence")),
        191 => pending(id, data, mc("dark_oak_fence")),
        192 => pending(id, data, mc("acacia_fence")),
        193 => pending(id, data, mc("spruce_door")),
        194 => pending(id, data, mc("birch_door")),
        195 => pending(id, data, mc("jungle_door")),
        196 => pending(id, data, mc("acacia_door")),
        197 => pending(id, data, mc("dark_oak_door")),
        198 => done(facing(mc("end_rod"), data)),
        199 => pending(id, data, mc("chorus_plant")),
        200 => done(mc("chorus_flower")),
        201 => done(mc("purpur_block")),
        202 => done(mc("purpur_pillar")),
        203 => pending(id, data, stairs(mc("purpur_stairs"), data)),
        204 => done(slab(mc("purpur_slab"), true, false)),
        205 => done(slab(mc("purpur_slab"), false, data & 8 != 0)),
        206 => done(mc("end_stone_bricks")),
        207 => done(int(mc("beetroots"), "age", data & 0b11)),
        208 => done(mc("grass_path")),
        209 => done(mc("end_gateway")),
        210 => done(command_block(mc("repeating_command_block"), data)),
        211 => done(command_block(mc("chain_command_block"), data)),
        212 => done(int(mc("frosted_ice"), "age", data & 3)),
        213 => done(mc("magma_block")),
        214 => done(mc("nether_wart_block")),
        215 => done(mc("red_nether_bricks")),
        216 => done(log(mc("bone_block"), data)),
        217 => done(mc("structure_void")),
        218 => done(powered(facing(mc("observer"), data & 7), data & 8 != 0)),
        219..=234 => done(facing(colored("shulker_box", id - 219), data)),
        235..=250 => done(facing4(colored("glazed_terracotta", id - 235), data)),
        251 => done(colored("concrete", data)),
        252 => done(colored("concrete_powder", data)),
        255 => done(structure_block(data)),
        _ => done(mc("unknown")),
    }
}
