//! Decoding of chunk tag documents into `ChunkData`.
//!
//! Three document generations are understood:
//! - pre-flattening sections with `Blocks`/`Data`/`Add` byte arrays,
//! - 1.13 to 1.17 sections with `Palette` and packed `BlockStates`,
//! - 1.18+ root-level `sections` with `block_states` and `biomes` compounds.

use super::biome::legacy_biome_name;
use super::ChunkData;
use crate::block_spec::{BlockSpec, BlockState};
use crate::legacy;
use crate::nbt::{self, CompoundExt};
use crate::palette::{BiomePalette, BlockId, BlockPalette, AIR_ID};
use quartz_nbt::{NbtCompound, NbtTag};

/// First data version that stops packed entries spanning two longs (20w17a).
pub const ALIGNED_PACKING_VERSION: i32 = 2529;
/// First data version with entities in their own region files (20w45a).
pub const ENTITY_FILES_VERSION: i32 = 2681;
/// First data version with named block states (17w47a).
pub const FLATTENING_VERSION: i32 = 1451;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ChunkVersion {
    PreFlattening,
    PostFlattening,
    Unknown,
}

/// The compound holding the chunk's sections: `Level` before 1.18, the root
/// afterwards.
fn level(tag: &NbtCompound) -> &NbtCompound {
    tag.compound_at("Level").unwrap_or(tag)
}

fn section_list(tag: &NbtCompound) -> Option<&quartz_nbt::NbtList> {
    nbt::list(tag.first_of(&[
        &["Level", "Sections"],
        &["Level", "sections"],
        &["Sections"],
        &["sections"],
    ]))
}

/// Whether a tag looks like a chunk at all: it either lists sections or
/// carries a data version.
pub fn is_chunk_document(tag: &NbtCompound) -> bool {
    section_list(tag).is_some() || tag.tag("DataVersion").is_some()
}

pub fn data_version(tag: &NbtCompound) -> i32 {
    tag.int_or("DataVersion", 0)
}

pub fn chunk_version(tag: &NbtCompound) -> ChunkVersion {
    if let Some(sections) = section_list(tag) {
        for section in nbt::compounds(sections) {
            if section.tag("Palette").is_some() || section.is_compound("block_states") {
                return ChunkVersion::PostFlattening;
            }
            if section.tag("Blocks").is_some() {
                return ChunkVersion::PreFlattening;
            }
        }
    }
    match tag.tag("DataVersion").and_then(nbt::int_value) {
        Some(v) if v >= FLATTENING_VERSION as i64 => ChunkVersion::PostFlattening,
        Some(_) => ChunkVersion::PreFlattening,
        None => ChunkVersion::Unknown,
    }
}

/// Inclusive block Y range covered by the chunk's sections.
pub fn chunk_bounds(tag: &NbtCompound) -> Option<(i32, i32)> {
    let sections = section_list(tag)?;
    let mut range: Option<(i32, i32)> = None;
    for section in nbt::compounds(sections) {
        let y = match section.tag("Y").and_then(nbt::int_value) {
            Some(y) => y as i32,
            None => continue,
        };
        range = Some(match range {
            Some((lo, hi)) => (lo.min(y), hi.max(y)),
            None => (y, y),
        });
    }
    range.map(|(lo, hi)| (lo << 4, (hi << 4) + 15))
}

/// Fill `chunk` from a chunk document. Block and biome names are interned
/// into the shared palettes.
pub fn load_chunk_data(
    tag: &NbtCompound,
    chunk: &mut dyn ChunkData,
    blocks: &BlockPalette,
    biomes: &BiomePalette,
) -> ChunkVersion {
    let version = chunk_version(tag);
    let aligned = data_version(tag) >= ALIGNED_PACKING_VERSION;

    if let Some(sections) = section_list(tag) {
        for section in nbt::compounds(sections) {
            let section_y = match section.tag("Y").and_then(nbt::int_value) {
                Some(y) => y as i32,
                None => continue,
            };
            match version {
                ChunkVersion::PreFlattening => {
                    load_legacy_section(section, section_y, chunk, blocks)
                }
                _ => {
                    load_palette_section(section, section_y, aligned, chunk, blocks);
                    load_section_biomes(section, section_y, chunk, biomes);
                }
            }
        }
    }

    load_column_biomes(level(tag), chunk, biomes);
    load_entities(tag, chunk);
    version
}

/// Fill one 16-block cube of a cubic-chunks column. A cube holds a single
/// pre-flattening section under `Level.Sections` plus its entities.
pub fn load_cube_data(
    tag: &NbtCompound,
    cube_y: i32,
    chunk: &mut dyn ChunkData,
    blocks: &BlockPalette,
) {
    if let Some(section) = level(tag)
        .list_at("Sections")
        .and_then(|sections| nbt::compounds(sections).next())
    {
        load_legacy_section(section, cube_y, chunk, blocks);
    }
    load_entities(tag, chunk);
}

/// Write a whole 16x16x16 section given one palette id per block, YZX order.
fn write_section(chunk: &mut dyn ChunkData, section_y: i32, ids: impl Iterator<Item = BlockId>) {
    let base = section_y << 4;
    for (i, id) in ids.enumerate().take(4096) {
        if id == AIR_ID {
            continue;
        }
        let i = i as i32;
        chunk.set_block_at(i & 15, base + (i >> 8), (i >> 4) & 15, id);
    }
}

fn load_legacy_section(
    section: &NbtCompound,
    section_y: i32,
    chunk: &mut dyn ChunkData,
    palette: &BlockPalette,
) {
    let blocks = match nbt::byte_array(section.tag("Blocks")) {
        Some(blocks) => blocks,
        None => return,
    };
    let data = nbt::byte_array(section.tag("Data")).unwrap_or(&[]);
    let add = nbt::byte_array(section.tag("Add"));

    // Ids per (id, data) key, interned on first use within this section.
    let mut cache = vec![u32::MAX; 256 * 16];
    let unknown = palette.put(&BlockSpec::State(BlockState::minecraft("unknown")));
    let ids: Vec<BlockId> = (0..4096usize)
        .map(|offset| {
            let (id, nibble) = legacy::section_entry(offset, blocks, data);
            let extra = add
                .map(|add| legacy::section_entry(offset, &[], add).1)
                .unwrap_or(0);
            if extra != 0 {
                // Ids above 255 only exist in modded worlds.
                return unknown;
            }
            let key = ((id as usize) << 4) | nibble as usize;
            if cache[key] == u32::MAX {
                cache[key] = palette.put(legacy::translate_spec(id, nibble));
            }
            cache[key]
        })
        .collect();
    write_section(chunk, section_y, ids.into_iter());
}

fn load_palette_section(
    section: &NbtCompound,
    section_y: i32,
    aligned: bool,
    chunk: &mut dyn ChunkData,
    palette: &BlockPalette,
) {
    let (palette_tags, packed) = match section.compound_at("block_states") {
        Some(states) => (
            nbt::list(states.tag("palette")),
            nbt::long_array(states.tag("data")),
        ),
        None => (
            nbt::list(section.tag("Palette")),
            nbt::long_array(section.tag("BlockStates")),
        ),
    };
    let palette_tags = match palette_tags {
        Some(list) => list,
        None => return,
    };
    let ids: Vec<BlockId> = nbt::compounds(palette_tags)
        .map(|tag| palette.put_tag(tag))
        .collect();

    match (ids.len(), packed) {
        (0, _) => {}
        (1, _) | (_, None) => {
            // A single-entry palette fills the section.
            if ids[0] != AIR_ID {
                write_section(chunk, section_y, std::iter::repeat(ids[0]));
            }
        }
        (len, Some(packed)) => {
            let bits = bits_for(len).max(4);
            let indices = unpack_indices(packed, bits, 4096, aligned);
            write_section(
                chunk,
                section_y,
                indices
                    .into_iter()
                    .map(|i| ids.get(i as usize).copied().unwrap_or(AIR_ID)),
            );
        }
    }
}

/// Per-section biomes (1.18+): 4x4x4 cells, each a palette index.
fn load_section_biomes(
    section: &NbtCompound,
    section_y: i32,
    chunk: &mut dyn ChunkData,
    biomes: &BiomePalette,
) {
    let biome_tag = match section.compound_at("biomes") {
        Some(tag) => tag,
        None => return,
    };
    let names: Vec<u32> = match nbt::list(biome_tag.tag("palette")) {
        Some(list) => list
            .iter()
            .filter_map(|t| match t {
                NbtTag::String(s) => Some(biomes.put(s)),
                _ => None,
            })
            .collect(),
        None => return,
    };
    if names.is_empty() {
        return;
    }
    let cells: Vec<u32> = match nbt::long_array(biome_tag.tag("data")) {
        Some(packed) if names.len() > 1 => unpack_indices(packed, bits_for(names.len()), 64, true)
            .into_iter()
            .map(|i| names.get(i as usize).copied().unwrap_or(0))
            .collect(),
        _ => vec![names[0]; 64],
    };
    for (i, biome) in cells.into_iter().enumerate() {
        let i = i as i32;
        let (cx, cy, cz) = (i & 3, (i >> 4) & 3, (i >> 2) & 3);
        fill_biome_cell(chunk, cx * 4, (section_y << 4) + cy * 4, cz * 4, biome);
    }
}

/// Column biomes stored on the level compound: a 256-entry 2D byte or int
/// array, or the 1.15+ 3D int array of 4x4x4 cells.
fn load_column_biomes(level: &NbtCompound, chunk: &mut dyn ChunkData, biomes: &BiomePalette) {
    let mut cache: Vec<(i32, u32)> = Vec::new();
    let mut intern = |id: i32| -> u32 {
        if let Some((_, b)) = cache.iter().find(|(k, _)| *k == id) {
            return *b;
        }
        let b = biomes.put(&legacy_biome_name(id));
        cache.push((id, b));
        b
    };

    let values: Vec<i32> = match level.tag("Biomes") {
        Some(NbtTag::ByteArray(v)) => v.iter().map(|b| *b as u8 as i32).collect(),
        Some(NbtTag::IntArray(v)) => v.clone(),
        _ => return,
    };
    let (min_y, max_y) = (chunk.min_y(), chunk.max_y());

    if values.len() == 256 {
        for (i, id) in values.iter().enumerate() {
            let biome = intern(*id);
            let (x, z) = ((i & 15) as i32, (i >> 4) as i32);
            let mut y = min_y;
            while y <= max_y {
                chunk.set_biome_at(x, y, z, biome);
                y += 4;
            }
        }
    } else if values.len() >= 1024 && values.len() % 16 == 0 {
        // Worlds with extended height store extra layers from y = -64.
        let base_y = if values.len() > 1024 { -64 } else { 0 };
        for (i, id) in values.iter().enumerate() {
            let biome = intern(*id);
            let i = i as i32;
            let (cx, cz, cy) = (i & 3, (i >> 2) & 3, i >> 4);
            fill_biome_cell(chunk, cx * 4, base_y + cy * 4, cz * 4, biome);
        }
    }
}

fn fill_biome_cell(chunk: &mut dyn ChunkData, x: i32, y: i32, z: i32, biome: u32) {
    for dz in 0..4 {
        for dx in 0..4 {
            chunk.set_biome_at(x + dx, y, z + dz, biome);
        }
    }
}

fn load_entities(tag: &NbtCompound, chunk: &mut dyn ChunkData) {
    let level = level(tag);
    for name in ["TileEntities", "block_entities"] {
        if let Some(list) = level.list_at(name).or_else(|| tag.list_at(name)) {
            for entity in nbt::compounds(list) {
                chunk.add_tile_entity(entity.clone());
            }
        }
    }
    if let Some(list) = level.list_at("Entities").or_else(|| tag.list_at("Entities")) {
        for entity in nbt::compounds(list) {
            chunk.add_entity(entity.clone());
        }
    }
}

/// Append the entities of a chunk from an entity region file (20w45a+).
pub fn load_entity_chunk(tag: &NbtCompound, chunk: &mut dyn ChunkData) {
    if let Some(list) = tag.list_at("Entities") {
        for entity in nbt::compounds(list) {
            chunk.add_entity(entity.clone());
        }
    }
}

/// Bits needed to index a palette of `len` entries.
pub fn bits_for(len: usize) -> u32 {
    if len <= 1 {
        0
    } else {
        usize::BITS - (len - 1).leading_zeros()
    }
}

/// Unpack `count` indices of `bits` bits each.
///
/// With `aligned` packing each long holds `64 / bits` entries and leftover
/// high bits are padding. Otherwise entries are a continuous bit stream and
/// may span two longs.
pub fn unpack_indices(packed: &[i64], bits: u32, count: usize, aligned: bool) -> Vec<u16> {
    let mut result = Vec::with_capacity(count);
    if bits == 0 || bits > 16 {
        result.resize(count, 0);
        return result;
    }
    let mask = (1u64 << bits) - 1;

    if aligned {
        let per_long = (64 / bits) as usize;
        for &long_val in packed {
            let long_val = long_val as u64;
            for j in 0..per_long {
                if result.len() >= count {
                    break;
                }
                result.push(((long_val >> (j as u32 * bits)) & mask) as u16);
            }
        }
    } else {
        for i in 0..count {
            let bit = i * bits as usize;
            let (word, offset) = (bit / 64, (bit % 64) as u32);
            let low = match packed.get(word) {
                Some(v) => *v as u64,
                None => break,
            };
            let mut value = low >> offset;
            if offset + bits > 64 {
                let high = packed.get(word + 1).map(|v| *v as u64).unwrap_or(0);
                value |= high << (64 - offset);
            }
            result.push((value & mask) as u16);
        }
    }

    result.resize(count, 0);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{section_index, DenseChunkData, SectionedChunkData};
    use quartz_nbt::NbtList;

    fn pack_aligned(indices: &[u16], bits: u32) -> Vec<i64> {
        let per_long = (64 / bits) as usize;
        let mut packed = vec![0i64; (indices.len() + per_long - 1) / per_long];
        for (i, &v) in indices.iter().enumerate() {
            packed[i / per_long] |= ((v as u64) << ((i % per_long) as u32 * bits)) as i64;
        }
        packed
    }

    fn pack_spanning(indices: &[u16], bits: u32) -> Vec<i64> {
        let total_bits = indices.len() * bits as usize;
        let mut packed = vec![0u64; (total_bits + 63) / 64];
        for (i, &v) in indices.iter().enumerate() {
            let bit = i * bits as usize;
            let (word, offset) = (bit / 64, bit % 64);
            packed[word] |= (v as u64) << offset;
            if offset + bits as usize > 64 {
                packed[word + 1] |= (v as u64) >> (64 - offset);
            }
        }
        packed.into_iter().map(|v| v as i64).collect()
    }

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(1), 0);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(16), 4);
        assert_eq!(bits_for(17), 5);
        assert_eq!(bits_for(4096), 12);
    }

    #[test]
    fn test_unpack_aligned_5bit() {
        let indices: Vec<u16> = (0..4096).map(|i| (i % 20) as u16).collect();
        let packed = pack_aligned(&indices, 5);
        // 12 entries per long, 4 padding bits.
        assert_eq!(packed.len(), 342);
        assert_eq!(unpack_indices(&packed, 5, 4096, true), indices);
    }

    #[test]
    fn test_unpack_spanning_5bit() {
        let indices: Vec<u16> = (0..4096).map(|i| (i * 7 % 31) as u16).collect();
        let packed = pack_spanning(&indices, 5);
        assert_eq!(packed.len(), 320);
        assert_eq!(unpack_indices(&packed, 5, 4096, false), indices);
    }

    #[test]
    fn test_short_data_pads_with_zero() {
        let out = unpack_indices(&[0x1], 4, 4096, true);
        assert_eq!(out.len(), 4096);
        assert_eq!(out[0], 1);
        assert!(out[1..].iter().all(|v| *v == 0));
    }

    fn state_tag(name: &str) -> NbtTag {
        let mut tag = NbtCompound::new();
        tag.insert("Name", name.to_string());
        NbtTag::Compound(tag)
    }

    fn modern_chunk(sections: Vec<NbtTag>) -> NbtCompound {
        let mut root = NbtCompound::new();
        root.insert("DataVersion", NbtTag::Int(3700));
        root.insert("sections", NbtList::from(sections));
        root
    }

    #[test]
    fn test_modern_section_decoding() {
        let indices: Vec<u16> = (0..4096).map(|i| if i < 256 { 1 } else { 0 }).collect();
        let mut states = NbtCompound::new();
        states.insert(
            "palette",
            NbtList::from(vec![state_tag("minecraft:air"), state_tag("minecraft:dirt")]),
        );
        states.insert("data", NbtTag::LongArray(pack_aligned(&indices, 4)));

        let mut biome_tag = NbtCompound::new();
        biome_tag.insert(
            "palette",
            NbtList::from(vec![NbtTag::String("minecraft:desert".to_string())]),
        );

        let mut section = NbtCompound::new();
        section.insert("Y", NbtTag::Byte(-1));
        section.insert("block_states", states);
        section.insert("biomes", biome_tag);

        let root = modern_chunk(vec![NbtTag::Compound(section)]);
        assert_eq!(chunk_version(&root), ChunkVersion::PostFlattening);
        assert_eq!(chunk_bounds(&root), Some((-16, -1)));

        let palette = BlockPalette::new();
        let biomes = BiomePalette::new();
        let mut chunk = SectionedChunkData::new();
        load_chunk_data(&root, &mut chunk, &palette, &biomes);

        let dirt = palette.put_tag(&match state_tag("minecraft:dirt") {
            NbtTag::Compound(c) => c,
            _ => unreachable!(),
        });
        assert_eq!(chunk.block_at(0, -16, 0), dirt);
        assert_eq!(chunk.block_at(15, -16, 15), dirt);
        assert_eq!(chunk.block_at(0, -15, 0), AIR_ID);
        assert_eq!(biomes.name(chunk.biome_at(5, -10, 5)), "minecraft:desert");
    }

    #[test]
    fn test_single_entry_palette_fills_unless_air() {
        let mut air = NbtCompound::new();
        air.insert("palette", NbtList::from(vec![state_tag("minecraft:air")]));
        let mut air_section = NbtCompound::new();
        air_section.insert("Y", NbtTag::Byte(0));
        air_section.insert("block_states", air);

        let mut stone = NbtCompound::new();
        stone.insert("palette", NbtList::from(vec![state_tag("minecraft:stone")]));
        let mut stone_section = NbtCompound::new();
        stone_section.insert("Y", NbtTag::Byte(1));
        stone_section.insert("block_states", stone);

        let root = modern_chunk(vec![
            NbtTag::Compound(air_section),
            NbtTag::Compound(stone_section),
        ]);
        let palette = BlockPalette::new();
        let mut chunk = SectionedChunkData::new();
        load_chunk_data(&root, &mut chunk, &palette, &BiomePalette::new());

        assert_eq!(chunk.section_count(), 1);
        assert_eq!(chunk.block_at(8, 20, 8), crate::palette::STONE_ID);
    }

    #[test]
    fn test_legacy_section_decoding() {
        let mut blocks = vec![0i8; 4096];
        let mut data = vec![0i8; 2048];
        // (x=1, y=2, z=3) -> YZX offset.
        let offset = section_index(1, 2, 3);
        blocks[offset] = 35;
        data[offset / 2] = if offset % 2 == 0 { 0x0E } else { 0xE0u8 as i8 };
        blocks[0] = 64;

        let mut section = NbtCompound::new();
        section.insert("Y", NbtTag::Byte(4));
        section.insert("Blocks", NbtTag::ByteArray(blocks));
        section.insert("Data", NbtTag::ByteArray(data));

        let mut level = NbtCompound::new();
        level.insert("Sections", NbtList::from(vec![NbtTag::Compound(section)]));
        level.insert("Biomes", NbtTag::ByteArray(vec![2; 256]));
        let mut root = NbtCompound::new();
        root.insert("Level", level);

        assert_eq!(chunk_version(&root), ChunkVersion::PreFlattening);
        assert_eq!(chunk_bounds(&root), Some((64, 79)));

        let palette = BlockPalette::new();
        let biomes = BiomePalette::new();
        let mut chunk = DenseChunkData::new();
        load_chunk_data(&root, &mut chunk, &palette, &biomes);

        let wool = palette.get(chunk.block_at(1, 66, 3));
        assert_eq!(wool.short_name(), "red_wool");
        assert!(palette.get(chunk.block_at(0, 64, 0)).is_unfinalized());
        assert_eq!(biomes.name(chunk.biome_at(9, 100, 9)), "minecraft:desert");
    }

    #[test]
    fn test_entities_are_collected() {
        let mut entity = NbtCompound::new();
        entity.insert("id", "minecraft:pig".to_string());
        let mut tile = NbtCompound::new();
        tile.insert("id", "minecraft:chest".to_string());

        let mut root = modern_chunk(Vec::new());
        root.insert("block_entities", NbtList::from(vec![NbtTag::Compound(tile)]));
        root.insert("Entities", NbtList::from(vec![NbtTag::Compound(entity)]));

        let mut chunk = SectionedChunkData::new();
        load_chunk_data(&root, &mut chunk, &BlockPalette::new(), &BiomePalette::new());
        assert_eq!(chunk.tile_entities().len(), 1);
        assert_eq!(chunk.entities().len(), 1);
        assert_eq!(chunk_version(&root), ChunkVersion::PostFlattening);
    }

    #[test]
    fn test_cube_lands_at_its_y() {
        let mut blocks = vec![0i8; 4096];
        blocks[section_index(0, 0, 0)] = 1;
        let mut section = NbtCompound::new();
        section.insert("Blocks", NbtTag::ByteArray(blocks));
        section.insert("Data", NbtTag::ByteArray(vec![0; 2048]));
        let mut level = NbtCompound::new();
        level.insert("Sections", NbtList::from(vec![NbtTag::Compound(section)]));
        level.insert("Entities", NbtList::from(vec![NbtTag::Compound(NbtCompound::new())]));
        let mut cube = NbtCompound::new();
        cube.insert("Level", level);

        let palette = BlockPalette::new();
        let mut chunk = SectionedChunkData::new();
        load_cube_data(&cube, -3, &mut chunk, &palette);
        assert_eq!(palette.get(chunk.block_at(0, -48, 0)).short_name(), "stone");
        assert_eq!(chunk.min_y(), -48);
        assert_eq!(chunk.entities().len(), 1);
    }
}
