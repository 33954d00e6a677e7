//! Second pass over loaded chunks that resolves pending legacy blocks.
//!
//! The legacy translator cannot finish blocks whose state depends on their
//! neighbors (fence connections, stair corners, door halves and so on). Those
//! are stored as unfinalized palette entries; this pass visits them with a
//! `FinalizationState` and replaces each with a resolved block.
//!
//! Interior blocks of a chunk only need that chunk and are finalized right
//! after it loads. Edge blocks need the surrounding chunks and are finalized
//! once those are available.

mod legacy;

use crate::block::Block;
use crate::block_spec::{BlockSpec, BlockState};
use crate::chunk::{ChunkData, ChunkPosition, CHUNK_WIDTH};
use crate::nbt::CompoundExt;
use crate::palette::{BlockId, BlockPalette, AIR_ID};
use quartz_nbt::NbtCompound;
use std::sync::Arc;

/// World-coordinate block access for the finalization pass.
pub trait BlockAccess {
    fn block_id(&self, x: i32, y: i32, z: i32) -> BlockId;

    fn set_block_id(&mut self, x: i32, y: i32, z: i32, id: BlockId);

    /// Tile entity stored for the block at (x, y, z), if any.
    fn tile_entity(&self, x: i32, y: i32, z: i32) -> Option<&NbtCompound>;
}

/// Which positions of a chunk a pass visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeScope {
    /// Positions whose neighbors all lie inside the chunk.
    Interior,
    /// The outer shell: horizontal borders plus the top and bottom layers.
    Edges,
    All,
}

/// Offsets reachable through the cache, one slot per cell of the 3x3x3
/// neighborhood.
const CACHE_SIZE: usize = 27;

fn cache_slot(dx: i32, dy: i32, dz: i32) -> Option<usize> {
    if dx.abs() > 1 || dy.abs() > 1 || dz.abs() > 1 {
        return None;
    }
    Some(((dx + 1) * 9 + (dy + 1) * 3 + (dz + 1)) as usize)
}

/// Cursor over one block position plus a memo of its neighbors.
///
/// Repeated queries for the same offset return the same block for the
/// lifetime of the cursor position, even if a neighbor is replaced in the
/// meantime.
pub struct FinalizationState<'a> {
    access: &'a mut dyn BlockAccess,
    palette: &'a BlockPalette,
    x: i32,
    y: i32,
    z: i32,
    cache: [Option<BlockId>; CACHE_SIZE],
}

impl<'a> FinalizationState<'a> {
    pub fn new(access: &'a mut dyn BlockAccess, palette: &'a BlockPalette) -> Self {
        FinalizationState {
            access,
            palette,
            x: 0,
            y: 0,
            z: 0,
            cache: [None; CACHE_SIZE],
        }
    }

    pub fn set_position(&mut self, x: i32, y: i32, z: i32) {
        self.x = x;
        self.y = y;
        self.z = z;
        self.cache = [None; CACHE_SIZE];
    }

    pub fn position(&self) -> (i32, i32, i32) {
        (self.x, self.y, self.z)
    }

    pub fn palette(&self) -> &BlockPalette {
        self.palette
    }

    fn id_at(&mut self, dx: i32, dy: i32, dz: i32) -> BlockId {
        let (x, y, z) = (self.x + dx, self.y + dy, self.z + dz);
        let slot = match cache_slot(dx, dy, dz) {
            Some(slot) => slot,
            None => return self.access.block_id(x, y, z),
        };
        if let Some(id) = self.cache[slot] {
            return id;
        }
        let id = self.access.block_id(x, y, z);
        self.cache[slot] = Some(id);
        id
    }

    /// Block at the cursor.
    pub fn get_material(&mut self) -> Arc<Block> {
        self.get_material_at(0, 0, 0)
    }

    /// Block at a relative offset from the cursor.
    pub fn get_material_at(&mut self, dx: i32, dy: i32, dz: i32) -> Arc<Block> {
        let id = self.id_at(dx, dy, dz);
        self.palette.get(id)
    }

    pub fn tile_entity(&self) -> Option<&NbtCompound> {
        self.access.tile_entity(self.x, self.y, self.z)
    }

    /// Replace the block at the cursor with an already interned id.
    pub fn replace_current_block_id(&mut self, id: BlockId) {
        self.access.set_block_id(self.x, self.y, self.z, id);
        self.cache[13] = Some(id);
    }

    pub fn replace_current_block(&mut self, state: BlockState) {
        let id = self.palette.put(&BlockSpec::State(state));
        self.replace_current_block_id(id);
    }
}

/// Resolve the pending block at the cursor. Ordinary blocks are untouched.
/// Returns true if the block was replaced.
pub fn finalize_block(state: &mut FinalizationState<'_>) -> bool {
    let block = state.get_material();
    if !block.is_unfinalized() {
        return false;
    }
    legacy::finalize(state, &block);
    true
}

/// Finalize the pending blocks of one chunk column in `min_y..=max_y`.
/// Returns how many blocks were replaced.
pub fn finalize_chunk(
    access: &mut dyn BlockAccess,
    palette: &BlockPalette,
    position: ChunkPosition,
    min_y: i32,
    max_y: i32,
    scope: FinalizeScope,
) -> usize {
    let pending = palette.unfinalized_ids();
    if pending.is_empty() || min_y > max_y {
        return 0;
    }
    let mut state = FinalizationState::new(access, palette);
    let mut replaced = 0;
    for y in min_y..=max_y {
        for cz in 0..CHUNK_WIDTH {
            for cx in 0..CHUNK_WIDTH {
                let edge = y == min_y
                    || y == max_y
                    || cx == 0
                    || cx == CHUNK_WIDTH - 1
                    || cz == 0
                    || cz == CHUNK_WIDTH - 1;
                let visit = match scope {
                    FinalizeScope::Interior => !edge,
                    FinalizeScope::Edges => edge,
                    FinalizeScope::All => true,
                };
                if !visit {
                    continue;
                }
                let (x, z) = (position.block_x() + cx, position.block_z() + cz);
                if !pending.contains(&state.access.block_id(x, y, z)) {
                    continue;
                }
                state.set_position(x, y, z);
                if finalize_block(&mut state) {
                    replaced += 1;
                }
            }
        }
    }
    if replaced > 0 {
        tracing::trace!("Finalized {} blocks in chunk {} ({:?})", replaced, position, scope);
    }
    replaced
}

/// `BlockAccess` over a single chunk. Positions outside the chunk read as
/// air and ignore writes.
pub struct ChunkAccess<'a> {
    position: ChunkPosition,
    chunk: &'a mut dyn ChunkData,
}

impl<'a> ChunkAccess<'a> {
    pub fn new(position: ChunkPosition, chunk: &'a mut dyn ChunkData) -> Self {
        ChunkAccess { position, chunk }
    }

    fn local(&self, x: i32, z: i32) -> Option<(i32, i32)> {
        let (lx, lz) = (x - self.position.block_x(), z - self.position.block_z());
        if (0..CHUNK_WIDTH).contains(&lx) && (0..CHUNK_WIDTH).contains(&lz) {
            Some((lx, lz))
        } else {
            None
        }
    }
}

impl BlockAccess for ChunkAccess<'_> {
    fn block_id(&self, x: i32, y: i32, z: i32) -> BlockId {
        match self.local(x, z) {
            Some((lx, lz)) => self.chunk.block_at(lx, y, lz),
            None => AIR_ID,
        }
    }

    fn set_block_id(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        if let Some((lx, lz)) = self.local(x, z) {
            self.chunk.set_block_at(lx, y, lz, id);
        }
    }

    fn tile_entity(&self, x: i32, y: i32, z: i32) -> Option<&NbtCompound> {
        find_tile_entity(self.chunk.tile_entities(), x, y, z)
    }
}

/// Tile entity whose `x`/`y`/`z` fields match the given world position.
pub fn find_tile_entity(entities: &[NbtCompound], x: i32, y: i32, z: i32) -> Option<&NbtCompound> {
    entities.iter().find(|tag| {
        tag.int_or("x", i32::MIN) == x
            && tag.int_or("y", i32::MIN) == y
            && tag.int_or("z", i32::MIN) == z
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::DenseChunkData;
    use crate::legacy;

    #[test]
    fn test_cache_slots_cover_neighborhood() {
        let mut seen = [false; CACHE_SIZE];
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let slot = cache_slot(dx, dy, dz).unwrap();
                    assert!(!seen[slot]);
                    seen[slot] = true;
                }
            }
        }
        assert_eq!(cache_slot(0, 0, 0), Some(13));
        assert_eq!(cache_slot(2, 0, 0), None);
    }

    #[test]
    fn test_cached_neighbor_is_stable() {
        let palette = BlockPalette::new();
        let mut chunk = DenseChunkData::new();
        let dirt = palette.put(&BlockSpec::State(BlockState::minecraft("dirt")));
        chunk.set_block_at(5, 10, 5, dirt);
        let position = ChunkPosition::new(0, 0);
        let mut access = ChunkAccess::new(position, &mut chunk);
        let mut state = FinalizationState::new(&mut access, &palette);
        state.set_position(4, 10, 5);
        assert_eq!(state.get_material_at(1, 0, 0).short_name(), "dirt");
        state.access.set_block_id(5, 10, 5, AIR_ID);
        assert_eq!(state.get_material_at(1, 0, 0).short_name(), "dirt");
        state.set_position(4, 10, 5);
        assert!(state.get_material_at(1, 0, 0).is_air());
    }

    #[test]
    fn test_scope_and_idempotence() {
        let palette = BlockPalette::new();
        let grass = palette.put(legacy::translate_spec(2, 0));
        let mut chunk = DenseChunkData::new();
        chunk.set_block_at(0, 64, 0, grass);
        chunk.set_block_at(7, 64, 7, grass);
        let position = ChunkPosition::new(0, 0);

        let mut access = ChunkAccess::new(position, &mut chunk);
        assert_eq!(finalize_chunk(&mut access, &palette, position, 0, 255, FinalizeScope::Interior), 1);
        assert!(palette.get(access.block_id(0, 64, 0)).is_unfinalized());
        assert!(!palette.get(access.block_id(7, 64, 7)).is_unfinalized());

        assert_eq!(finalize_chunk(&mut access, &palette, position, 0, 255, FinalizeScope::Edges), 1);
        assert_eq!(finalize_chunk(&mut access, &palette, position, 0, 255, FinalizeScope::All), 0);
        let block = palette.get(access.block_id(0, 64, 0));
        assert_eq!(block.short_name(), "grass_block");
        assert_eq!(block.state.get_property("snowy"), Some("false"));
    }

    #[test]
    fn test_tile_entity_lookup() {
        let mut tag = NbtCompound::new();
        tag.insert("x", 3i32);
        tag.insert("y", 70i32);
        tag.insert("z", -2i32);
        let entities = vec![NbtCompound::new(), tag];
        assert!(find_tile_entity(&entities, 3, 70, -2).is_some());
        assert!(find_tile_entity(&entities, 3, 71, -2).is_none());
    }
}
