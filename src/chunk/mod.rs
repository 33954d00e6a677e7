//! Per-chunk block, biome and entity storage.
//!
//! `ChunkData` is the one contract shared by both storage strategies:
//! `DenseChunkData` for the classic fixed 0..=255 height range and
//! `SectionedChunkData` for unbounded worlds. Never-written cells read as
//! `AIR_ID` and biome 0.

pub mod biome;
pub mod decode;
mod dense;
mod sectioned;

pub use decode::{chunk_bounds, chunk_version, load_chunk_data, load_cube_data, ChunkVersion};
pub use dense::DenseChunkData;
pub use sectioned::SectionedChunkData;

use crate::palette::{BiomeId, BlockId};
use crate::region::RegionPosition;
use quartz_nbt::NbtCompound;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CHUNK_WIDTH: i32 = 16;
pub const SECTION_HEIGHT: i32 = 16;
/// Height range of the classic format.
pub const DENSE_MIN_Y: i32 = 0;
pub const DENSE_MAX_Y: i32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub x: i32,
    pub z: i32,
}

impl ChunkPosition {
    pub fn new(x: i32, z: i32) -> Self {
        ChunkPosition { x, z }
    }

    pub fn from_block(block_x: i32, block_z: i32) -> Self {
        ChunkPosition::new(block_x >> 4, block_z >> 4)
    }

    pub fn region(&self) -> RegionPosition {
        RegionPosition::new(self.x >> 5, self.z >> 5)
    }

    /// Slot of this chunk inside its region's 32x32 tables.
    pub fn region_index(&self) -> usize {
        ((self.x & 31) + (self.z & 31) * 32) as usize
    }

    pub fn block_x(&self) -> i32 {
        self.x << 4
    }

    pub fn block_z(&self) -> i32 {
        self.z << 4
    }

    pub fn offset(&self, dx: i32, dz: i32) -> ChunkPosition {
        ChunkPosition::new(self.x + dx, self.z + dz)
    }
}

impl fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Storage for one chunk column.
///
/// `x` and `z` are chunk-local and masked to 0..16; `y` is absolute.
pub trait ChunkData: Send + Sync {
    fn min_y(&self) -> i32;

    fn max_y(&self) -> i32;

    fn block_at(&self, x: i32, y: i32, z: i32) -> BlockId;

    fn set_block_at(&mut self, x: i32, y: i32, z: i32, block: BlockId);

    fn biome_at(&self, x: i32, y: i32, z: i32) -> BiomeId;

    fn set_biome_at(&mut self, x: i32, y: i32, z: i32, biome: BiomeId);

    fn tile_entities(&self) -> &[NbtCompound];

    fn entities(&self) -> &[NbtCompound];

    fn add_tile_entity(&mut self, tag: NbtCompound);

    fn add_entity(&mut self, tag: NbtCompound);

    fn clear(&mut self);

    /// True for positions on the chunk's horizontal border or its top and
    /// bottom layers. Those need neighbors from other chunks to finalize.
    fn is_block_on_edge(&self, x: i32, y: i32, z: i32) -> bool {
        x == 0
            || x == CHUNK_WIDTH - 1
            || z == 0
            || z == CHUNK_WIDTH - 1
            || y == self.min_y()
            || y == self.max_y()
    }
}

/// Pick the storage strategy for a chunk whose sections span `bounds`.
/// Chunks inside the classic height range get dense storage.
pub fn chunk_data_for(bounds: Option<(i32, i32)>, force_sectioned: bool) -> Box<dyn ChunkData> {
    match bounds {
        Some((min, max)) if !force_sectioned && min >= DENSE_MIN_Y && max <= DENSE_MAX_Y => {
            Box::new(DenseChunkData::new())
        }
        None if !force_sectioned => Box::new(DenseChunkData::new()),
        _ => Box::new(SectionedChunkData::new()),
    }
}

/// Index of block (x, y, z) in a 16x16x16 section, YZX order.
pub(crate) fn section_index(x: i32, y: i32, z: i32) -> usize {
    (((y & 15) << 8) | ((z & 15) << 4) | (x & 15)) as usize
}

/// Index of a biome cell. Biomes keep full horizontal resolution and one
/// layer per four blocks of height.
pub(crate) fn biome_column_index(x: i32, z: i32) -> usize {
    (((z & 15) << 4) | (x & 15)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::AIR_ID;

    #[test]
    fn test_chunk_index_formula() {
        assert_eq!(ChunkPosition::new(0, 0).region_index(), 0);
        assert_eq!(ChunkPosition::new(31, 0).region_index(), 31);
        assert_eq!(ChunkPosition::new(0, 1).region_index(), 32);
        assert_eq!(ChunkPosition::new(-1, -1).region_index(), 1023);
        assert_eq!(ChunkPosition::new(33, -33).region(), RegionPosition::new(1, -2));
    }

    #[test]
    fn test_fresh_chunks_read_air_and_biome_zero() {
        let stores: Vec<Box<dyn ChunkData>> = vec![
            Box::new(DenseChunkData::new()),
            Box::new(SectionedChunkData::new()),
        ];
        for store in stores {
            for (x, y, z) in [(0, 0, 0), (15, 255, 15), (7, -60, 3), (3, 1000, 9)] {
                assert_eq!(store.block_at(x, y, z), AIR_ID);
                assert_eq!(store.biome_at(x, y, z), 0);
            }
            assert!(store.tile_entities().is_empty());
            assert!(store.entities().is_empty());
        }
    }

    #[test]
    fn test_storage_choice_follows_bounds() {
        let dense = chunk_data_for(Some((0, 255)), false);
        assert_eq!((dense.min_y(), dense.max_y()), (DENSE_MIN_Y, DENSE_MAX_Y));

        let mut tall = chunk_data_for(Some((-64, 319)), false);
        tall.set_block_at(0, -64, 0, 5);
        assert_eq!(tall.block_at(0, -64, 0), 5);

        let mut cubic = chunk_data_for(Some((0, 15)), true);
        cubic.set_block_at(0, 4000, 0, 5);
        assert_eq!(cubic.block_at(0, 4000, 0), 5);
    }
}
