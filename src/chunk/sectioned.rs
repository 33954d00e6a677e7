use super::{biome_column_index, section_index, ChunkData, SECTION_HEIGHT};
use crate::palette::{BiomeId, BlockId, AIR_ID};
use quartz_nbt::NbtCompound;
use std::collections::BTreeMap;

struct Section {
    blocks: Box<[BlockId; 4096]>,
    /// 16x16 columns, four layers of four blocks each.
    biomes: Box<[BiomeId; 1024]>,
}

impl Section {
    fn new() -> Self {
        Section {
            blocks: Box::new([AIR_ID; 4096]),
            biomes: Box::new([0; 1024]),
        }
    }
}

fn biome_index(x: i32, y: i32, z: i32) -> usize {
    ((((y & 15) >> 2) as usize) << 8) | biome_column_index(x, z)
}

/// Unbounded-height storage made of lazily allocated 16-block-tall
/// sections. Reads of missing sections return defaults without allocating.
#[derive(Default)]
pub struct SectionedChunkData {
    sections: BTreeMap<i32, Section>,
    tile_entities: Vec<NbtCompound>,
    entities: Vec<NbtCompound>,
}

impl SectionedChunkData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn section_mut(&mut self, y: i32) -> &mut Section {
        self.sections
            .entry(y.div_euclid(SECTION_HEIGHT))
            .or_insert_with(Section::new)
    }

    fn section(&self, y: i32) -> Option<&Section> {
        self.sections.get(&y.div_euclid(SECTION_HEIGHT))
    }
}

impl ChunkData for SectionedChunkData {
    /// Bottom of the lowest allocated section, 0 when nothing is allocated.
    fn min_y(&self) -> i32 {
        self.sections
            .keys()
            .next()
            .map(|s| s * SECTION_HEIGHT)
            .unwrap_or(0)
    }

    /// Top of the highest allocated section, -1 when nothing is allocated.
    fn max_y(&self) -> i32 {
        self.sections
            .keys()
            .next_back()
            .map(|s| s * SECTION_HEIGHT + SECTION_HEIGHT - 1)
            .unwrap_or(-1)
    }

    fn block_at(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.section(y)
            .map(|s| s.blocks[section_index(x, y, z)])
            .unwrap_or(AIR_ID)
    }

    fn set_block_at(&mut self, x: i32, y: i32, z: i32, block: BlockId) {
        if block == AIR_ID && self.section(y).is_none() {
            return;
        }
        self.section_mut(y).blocks[section_index(x, y, z)] = block;
    }

    fn biome_at(&self, x: i32, y: i32, z: i32) -> BiomeId {
        self.section(y)
            .map(|s| s.biomes[biome_index(x, y, z)])
            .unwrap_or(0)
    }

    fn set_biome_at(&mut self, x: i32, y: i32, z: i32, biome: BiomeId) {
        if biome == 0 && self.section(y).is_none() {
            return;
        }
        self.section_mut(y).biomes[biome_index(x, y, z)] = biome;
    }

    fn tile_entities(&self) -> &[NbtCompound] {
        &self.tile_entities
    }

    fn entities(&self) -> &[NbtCompound] {
        &self.entities
    }

    fn add_tile_entity(&mut self, tag: NbtCompound) {
        self.tile_entities.push(tag);
    }

    fn add_entity(&mut self, tag: NbtCompound) {
        self.entities.push(tag);
    }

    fn clear(&mut self) {
        self.sections.clear();
        self.tile_entities.clear();
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_do_not_allocate() {
        let chunk = SectionedChunkData::new();
        assert_eq!(chunk.block_at(4, -2000, 4), AIR_ID);
        assert_eq!(chunk.biome_at(4, 2000, 4), 0);
        assert_eq!(chunk.section_count(), 0);
    }

    #[test]
    fn test_write_allocates_covering_section() {
        let mut chunk = SectionedChunkData::new();
        chunk.set_block_at(2, -17, 3, 9);
        assert_eq!(chunk.section_count(), 1);
        assert_eq!(chunk.block_at(2, -17, 3), 9);
        assert_eq!(chunk.block_at(2, -16, 3), AIR_ID);
        assert_eq!(chunk.min_y(), -32);
        assert_eq!(chunk.max_y(), -17);

        chunk.set_block_at(0, 300, 0, 4);
        assert_eq!(chunk.min_y(), -32);
        assert_eq!(chunk.max_y(), 303);
    }

    #[test]
    fn test_writing_air_to_missing_section_is_a_no_op() {
        let mut chunk = SectionedChunkData::new();
        chunk.set_block_at(0, 64, 0, AIR_ID);
        chunk.set_biome_at(0, 64, 0, 0);
        assert_eq!(chunk.section_count(), 0);
    }
}
