use super::{biome_column_index, ChunkData, DENSE_MAX_Y, DENSE_MIN_Y};
use crate::palette::{BiomeId, BlockId, AIR_ID};
use quartz_nbt::NbtCompound;

const HEIGHT: i32 = DENSE_MAX_Y - DENSE_MIN_Y + 1;
const BLOCK_COUNT: usize = (16 * 16 * HEIGHT) as usize;
const BIOME_COUNT: usize = (16 * 16 * (HEIGHT / 4)) as usize;

/// Flat storage for the classic 0..=255 height range.
///
/// Writes outside that range are dropped.
#[derive(Clone)]
pub struct DenseChunkData {
    blocks: Vec<BlockId>,
    biomes: Vec<BiomeId>,
    tile_entities: Vec<NbtCompound>,
    entities: Vec<NbtCompound>,
}

impl Default for DenseChunkData {
    fn default() -> Self {
        Self::new()
    }
}

impl DenseChunkData {
    pub fn new() -> Self {
        DenseChunkData {
            blocks: vec![AIR_ID; BLOCK_COUNT],
            biomes: vec![0; BIOME_COUNT],
            tile_entities: Vec::new(),
            entities: Vec::new(),
        }
    }

    fn block_index(x: i32, y: i32, z: i32) -> Option<usize> {
        if !(DENSE_MIN_Y..=DENSE_MAX_Y).contains(&y) {
            return None;
        }
        Some((((y - DENSE_MIN_Y) << 8) | ((z & 15) << 4) | (x & 15)) as usize)
    }

    fn biome_index(x: i32, y: i32, z: i32) -> Option<usize> {
        if !(DENSE_MIN_Y..=DENSE_MAX_Y).contains(&y) {
            return None;
        }
        Some((((y - DENSE_MIN_Y) >> 2) << 8) as usize | biome_column_index(x, z))
    }
}

impl ChunkData for DenseChunkData {
    fn min_y(&self) -> i32 {
        DENSE_MIN_Y
    }

    fn max_y(&self) -> i32 {
        DENSE_MAX_Y
    }

    fn block_at(&self, x: i32, y: i32, z: i32) -> BlockId {
        Self::block_index(x, y, z)
            .map(|i| self.blocks[i])
            .unwrap_or(AIR_ID)
    }

    fn set_block_at(&mut self, x: i32, y: i32, z: i32, block: BlockId) {
        if let Some(i) = Self::block_index(x, y, z) {
            self.blocks[i] = block;
        }
    }

    fn biome_at(&self, x: i32, y: i32, z: i32) -> BiomeId {
        Self::biome_index(x, y, z)
            .map(|i| self.biomes[i])
            .unwrap_or(0)
    }

    fn set_biome_at(&mut self, x: i32, y: i32, z: i32, biome: BiomeId) {
        if let Some(i) = Self::biome_index(x, y, z) {
            self.biomes[i] = biome;
        }
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
        self.blocks.fill(AIR_ID);
        self.biomes.fill(0);
        self.tile_entities.clear();
        self.entities.clear();
    }
}
