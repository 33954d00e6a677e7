//! Deduplicating block and biome palettes.

use crate::block::Block;
use crate::block_spec::BlockSpec;
use parking_lot::RwLock;
use quartz_nbt::NbtCompound;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use std::sync::Arc;

pub type BlockId = u32;
pub type BiomeId = u32;

pub const AIR_ID: BlockId = 0;
/// Filler block for unpopulated storage.
pub const STONE_ID: BlockId = 1;

#[derive(Default)]
struct PaletteInner {
    index: FxHashMap<BlockSpec, BlockId>,
    specs: Vec<BlockSpec>,
    blocks: Vec<Arc<Block>>,
}

/// Interns block specs into compact ids and holds the realized blocks.
///
/// Safe to share between loader threads: lookups of known specs take a read
/// lock, and only the first `put` of a new spec takes the write lock.
pub struct BlockPalette {
    inner: RwLock<PaletteInner>,
}

impl Default for BlockPalette {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockPalette {
    pub fn new() -> Self {
        let palette = BlockPalette {
            inner: RwLock::new(PaletteInner::default()),
        };
        palette.put(&BlockSpec::air());
        palette.put(&BlockSpec::stone());
        palette
    }

    /// Id for `spec`, interning it on first sight. Equal specs always get the
    /// same id.
    pub fn put(&self, spec: &BlockSpec) -> BlockId {
        if let Some(id) = self.inner.read().index.get(spec) {
            return *id;
        }
        let mut inner = self.inner.write();
        // Another thread may have interned it between the two locks.
        if let Some(id) = inner.index.get(spec) {
            return *id;
        }
        let id = inner.blocks.len() as BlockId;
        inner.blocks.push(Arc::new(Block::from_spec(spec)));
        inner.specs.push(spec.clone());
        inner.index.insert(spec.clone(), id);
        id
    }

    pub fn put_tag(&self, tag: &NbtCompound) -> BlockId {
        self.put(&BlockSpec::from_nbt(tag))
    }

    /// Block for an id returned by `put`. Any other id reads as stone.
    pub fn get(&self, id: BlockId) -> Arc<Block> {
        let inner = self.inner.read();
        inner
            .blocks
            .get(id as usize)
            .unwrap_or(&inner.blocks[STONE_ID as usize])
            .clone()
    }

    /// Ids of every block still waiting for neighbor context.
    pub fn unfinalized_ids(&self) -> FxHashSet<BlockId> {
        self.inner
            .read()
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| block.is_unfinalized())
            .map(|(id, _)| id as BlockId)
            .collect()
    }

    pub fn spec(&self, id: BlockId) -> Option<BlockSpec> {
        self.inner.read().specs.get(id as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interns biome names. Id 0 is always plains so never-written biome cells
/// read as plains.
pub struct BiomePalette {
    inner: RwLock<(FxHashMap<SmolStr, BiomeId>, Vec<SmolStr>)>,
}

pub const DEFAULT_BIOME: &str = "minecraft:plains";

impl Default for BiomePalette {
    fn default() -> Self {
        Self::new()
    }
}

impl BiomePalette {
    pub fn new() -> Self {
        let palette = BiomePalette {
            inner: RwLock::new((FxHashMap::default(), Vec::new())),
        };
        palette.put(DEFAULT_BIOME);
        palette
    }

    pub fn put(&self, name: &str) -> BiomeId {
        if let Some(id) = self.inner.read().0.get(name) {
            return *id;
        }
        let mut inner = self.inner.write();
        if let Some(id) = inner.0.get(name) {
            return *id;
        }
        let id = inner.1.len() as BiomeId;
        let name = SmolStr::new(name);
        inner.1.push(name.clone());
        inner.0.insert(name, id);
        id
    }

    pub fn name(&self, id: BiomeId) -> SmolStr {
        let inner = self.inner.read();
        inner
            .1
            .get(id as usize)
            .cloned()
            .unwrap_or_else(|| SmolStr::new(DEFAULT_BIOME))
    }

    pub fn len(&self) -> usize {
        self.inner.read().1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
