//! A world save directory: format detection, the region cache, listener
//! fan-out and chunk loading.

use crate::chunk::decode::{
    data_version, is_chunk_document, load_entity_chunk, ENTITY_FILES_VERSION,
};
use crate::chunk::{
    chunk_bounds, chunk_data_for, load_chunk_data, load_cube_data, ChunkData, ChunkPosition,
    ChunkVersion, CHUNK_WIDTH,
};
use crate::error::{ChunkLoadError, Result, WorldError};
use crate::finalize::{self, BlockAccess, ChunkAccess, FinalizeScope};
use crate::palette::{BiomePalette, BlockId, BlockPalette, AIR_ID};
use crate::region::{
    AnvilRegion, Chunk, ChunkSource, ChunkStatus, CubicRegion, Region, RegionFile, RegionPosition,
    RegionUpdate,
};
use parking_lot::RwLock;
use quartz_nbt::NbtCompound;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldFormat {
    /// `region/r.<x>.<z>.mca` files.
    Anvil,
    /// `region3d/<x>.<y>.<z>.3dr` cubic-chunks files.
    Cubic,
}

/// Receives region and chunk events. Every method has an empty default.
pub trait WorldListener: Send + Sync {
    fn chunks_discovered(&self, _region: RegionPosition, _chunks: &[ChunkPosition]) {}

    fn chunks_deleted(&self, _chunks: &[ChunkPosition]) {}

    /// A chunk finished loading, successfully or not.
    fn chunk_loaded(&self, _chunk: ChunkPosition, _status: &ChunkStatus) {}
}

/// Decoded contents of one chunk column.
pub struct LoadedChunk {
    pub position: ChunkPosition,
    pub data: Box<dyn ChunkData>,
    pub version: ChunkVersion,
    pub timestamp: i32,
}

pub struct World {
    directory: PathBuf,
    format: WorldFormat,
    region_dir: PathBuf,
    regions: RwLock<FxHashMap<RegionPosition, Arc<dyn Region>>>,
    listeners: RwLock<Vec<Arc<dyn WorldListener>>>,
    blocks: Arc<BlockPalette>,
    biomes: Arc<BiomePalette>,
}

impl World {
    /// Open a world directory. Cubic-chunks worlds are recognized by their
    /// `region3d` directory.
    pub fn open(directory: impl Into<PathBuf>) -> Result<World> {
        let directory = directory.into();
        let (format, region_dir) = if directory.join("region3d").is_dir() {
            (WorldFormat::Cubic, directory.join("region3d"))
        } else if directory.join("region").is_dir() {
            (WorldFormat::Anvil, directory.join("region"))
        } else {
            return Err(WorldError::NotAWorld(directory));
        };
        tracing::info!("Opened {:?} world at {}", format, directory.display());
        Ok(World {
            directory,
            format,
            region_dir,
            regions: RwLock::new(FxHashMap::default()),
            listeners: RwLock::new(Vec::new()),
            blocks: Arc::new(BlockPalette::new()),
            biomes: Arc::new(BiomePalette::new()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn format(&self) -> WorldFormat {
        self.format
    }

    pub fn region_directory(&self) -> &Path {
        &self.region_dir
    }

    pub fn palette(&self) -> &Arc<BlockPalette> {
        &self.blocks
    }

    pub fn biomes(&self) -> &Arc<BiomePalette> {
        &self.biomes
    }

    pub fn add_listener(&self, listener: Arc<dyn WorldListener>) {
        self.listeners.write().push(listener);
    }

    fn notify(&self, event: impl Fn(&dyn WorldListener)) {
        for listener in self.listeners.read().iter() {
            event(listener.as_ref());
        }
    }

    /// The cached region at `position`, created on first access. Creating a
    /// region does not touch the disk.
    pub fn region(&self, position: RegionPosition) -> Arc<dyn Region> {
        if let Some(region) = self.regions.read().get(&position) {
            return region.clone();
        }
        let mut regions = self.regions.write();
        regions
            .entry(position)
            .or_insert_with(|| self.create_region(position))
            .clone()
    }

    fn create_region(&self, position: RegionPosition) -> Arc<dyn Region> {
        match self.format {
            WorldFormat::Anvil => Arc::new(AnvilRegion::new(&self.region_dir, position)),
            WorldFormat::Cubic => Arc::new(CubicRegion::new(&self.region_dir, position)),
        }
    }

    pub fn cached_region(&self, position: RegionPosition) -> Option<Arc<dyn Region>> {
        self.regions.read().get(&position).cloned()
    }

    /// Regions that have at least one file on disk.
    pub fn available_regions(&self) -> Result<Vec<RegionPosition>> {
        let mut found = BTreeSet::new();
        for entry in std::fs::read_dir(&self.region_dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let position = match self.format {
                WorldFormat::Anvil => RegionPosition::from_file_name(&name),
                WorldFormat::Cubic => cubic_region_of(&name),
            };
            if let Some(position) = position {
                found.insert(position);
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Parse a region and report discovered and deleted chunks to listeners.
    pub fn parse_region(&self, position: RegionPosition, min_y: i32, max_y: i32) -> RegionUpdate {
        let region = self.region(position);
        let update = region.parse(min_y, max_y);
        if !update.discovered.is_empty() {
            self.notify(|l| l.chunks_discovered(position, &update.discovered));
        }
        if !update.deleted.is_empty() {
            self.notify(|l| l.chunks_deleted(&update.deleted));
        }
        update
    }

    pub fn chunk(&self, position: ChunkPosition) -> Option<Arc<Chunk>> {
        self.cached_region(position.region())?.chunk(position)
    }

    /// Read and decode one chunk column, then finalize its interior.
    ///
    /// Cubic columns only read cubes between `min_y` and `max_y`. A failed
    /// read marks the chunk corrupt and is returned to the caller; sibling
    /// chunks are unaffected.
    pub fn load_chunk(
        &self,
        position: ChunkPosition,
        min_y: i32,
        max_y: i32,
    ) -> std::result::Result<Option<LoadedChunk>, ChunkLoadError> {
        let region = self.region(position.region());
        let source = match region.read_chunk(position) {
            Ok(Some(source)) => source,
            Ok(None) => return Ok(None),
            Err(e) => return Err(self.fail(&region, position, e)),
        };

        let timestamp = source.timestamp();
        let (mut data, version) = match source {
            ChunkSource::Column { tag, .. } => {
                if !is_chunk_document(&tag) {
                    let error = ChunkLoadError::Malformed {
                        position,
                        reason: "no sections and no data version".to_string(),
                    };
                    return Err(self.fail(&region, position, error));
                }
                let mut data = chunk_data_for(chunk_bounds(&tag), false);
                let version = load_chunk_data(&tag, data.as_mut(), &self.blocks, &self.biomes);
                if data_version(&tag) >= ENTITY_FILES_VERSION {
                    self.load_entities(position, data.as_mut());
                }
                (data, version)
            }
            ChunkSource::Cubes { cubes, .. } => {
                let mut data = chunk_data_for(None, true);
                if min_y <= max_y {
                    for (cube_y, tag) in cubes.range((min_y >> 4)..=(max_y >> 4)) {
                        load_cube_data(tag, *cube_y, data.as_mut(), &self.blocks);
                    }
                }
                (data, ChunkVersion::PreFlattening)
            }
        };

        let (lo, hi) = (data.min_y(), data.max_y());
        let mut access = ChunkAccess::new(position, data.as_mut());
        finalize::finalize_chunk(&mut access, &self.blocks, position, lo, hi, FinalizeScope::Interior);

        if let Some(chunk) = region.chunk(position) {
            chunk.set_loaded_timestamp(timestamp);
        }
        self.mark(region.chunk(position), position, ChunkStatus::Loaded(version));
        Ok(Some(LoadedChunk {
            position,
            data,
            version,
            timestamp,
        }))
    }

    /// Log a failed load and mark the chunk corrupt.
    fn fail(
        &self,
        region: &Arc<dyn Region>,
        position: ChunkPosition,
        error: ChunkLoadError,
    ) -> ChunkLoadError {
        tracing::warn!("{}", error);
        self.mark(region.chunk(position), position, ChunkStatus::Corrupt(error.to_string()));
        error
    }

    fn mark(&self, chunk: Option<Arc<Chunk>>, position: ChunkPosition, status: ChunkStatus) {
        if let Some(chunk) = chunk {
            chunk.set_status(status.clone());
        }
        self.notify(|l| l.chunk_loaded(position, &status));
    }

    /// Entities stored beside the region files since 20w45a.
    fn load_entities(&self, position: ChunkPosition, data: &mut dyn ChunkData) {
        let file = RegionFile::new(
            self.directory
                .join("entities")
                .join(position.region().file_name()),
        );
        match file.read_chunk_tag(position) {
            Ok(Some((tag, _))) => load_entity_chunk(&tag, data),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to read entities of chunk {}: {}", position, e),
        }
    }

    fn region_exists(&self, position: RegionPosition) -> Result<bool> {
        match self.format {
            WorldFormat::Anvil => Ok(self.region_dir.join(position.file_name()).is_file()),
            WorldFormat::Cubic => Ok(self.available_regions()?.contains(&position)),
        }
    }

    /// Delete a chunk from its region file and tell listeners.
    pub fn delete_chunk(&self, position: ChunkPosition) -> Result<()> {
        if !self.region_exists(position.region())? {
            return Err(WorldError::MissingRegion(position.region()));
        }
        let region = self.region(position.region());
        region.delete_chunk(position)?;
        self.notify(|l| l.chunks_deleted(&[position]));
        Ok(())
    }

    /// Drop every cached region.
    pub fn unload(&self) {
        self.regions.write().clear();
    }
}

/// Region covering a cubic-chunks file name: each classic region spans two
/// sub-regions on both horizontal axes.
fn cubic_region_of(name: &str) -> Option<RegionPosition> {
    let mut parts = name.strip_suffix(".3dr")?.split('.');
    let x: i32 = parts.next()?.parse().ok()?;
    let _y: i32 = parts.next()?.parse().ok()?;
    let z: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(RegionPosition::new(x >> 1, z >> 1))
}

/// Loaded chunk columns addressed in world coordinates.
///
/// Edge blocks of a chunk are finalized once every neighboring chunk that
/// exists on disk is loaded too.
#[derive(Default)]
pub struct ChunkGrid {
    chunks: FxHashMap<ChunkPosition, Box<dyn ChunkData>>,
    timestamps: FxHashMap<ChunkPosition, i32>,
    edges_pending: FxHashSet<ChunkPosition>,
}

impl ChunkGrid {
    pub fn new() -> Self {
        ChunkGrid::default()
    }

    pub fn insert(&mut self, chunk: LoadedChunk) {
        self.timestamps.insert(chunk.position, chunk.timestamp);
        self.chunks.insert(chunk.position, chunk.data);
        self.edges_pending.insert(chunk.position);
    }

    pub fn remove(&mut self, position: ChunkPosition) -> Option<Box<dyn ChunkData>> {
        self.timestamps.remove(&position);
        self.edges_pending.remove(&position);
        self.chunks.remove(&position)
    }

    pub fn get(&self, position: ChunkPosition) -> Option<&dyn ChunkData> {
        self.chunks.get(&position).map(|c| c.as_ref())
    }

    pub fn contains(&self, position: ChunkPosition) -> bool {
        self.chunks.contains_key(&position)
    }

    /// Timestamp the chunk had when it was loaded.
    pub fn timestamp(&self, position: ChunkPosition) -> Option<i32> {
        self.timestamps.get(&position).copied()
    }

    pub fn positions(&self) -> impl Iterator<Item = ChunkPosition> + '_ {
        self.chunks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn retain(&mut self, keep: impl Fn(ChunkPosition) -> bool) {
        self.chunks.retain(|position, _| keep(*position));
        self.timestamps.retain(|position, _| keep(*position));
        self.edges_pending.retain(|position| keep(*position));
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.timestamps.clear();
        self.edges_pending.clear();
    }

    /// Finalize the interior of every loaded chunk, in parallel.
    pub fn finalize_interiors(&mut self, palette: &BlockPalette) -> usize {
        self.chunks
            .par_iter_mut()
            .map(|(position, data)| {
                let (lo, hi) = (data.min_y(), data.max_y());
                let mut access = ChunkAccess::new(*position, data.as_mut());
                finalize::finalize_chunk(&mut access, palette, *position, lo, hi, FinalizeScope::Interior)
            })
            .sum()
    }

    /// Finalize the edges of pending chunks whose neighbors are all loaded.
    /// `exists` tells whether a missing neighbor is still expected to load.
    pub fn finalize_ready_edges(
        &mut self,
        palette: &BlockPalette,
        exists: impl Fn(ChunkPosition) -> bool,
    ) -> usize {
        let ready: Vec<ChunkPosition> = self
            .edges_pending
            .iter()
            .copied()
            .filter(|position| {
                (-1..=1).all(|dx| {
                    (-1..=1).all(|dz| {
                        let neighbor = position.offset(dx, dz);
                        self.chunks.contains_key(&neighbor) || !exists(neighbor)
                    })
                })
            })
            .collect();
        let mut replaced = 0;
        for position in ready {
            replaced += self.finalize_edges(palette, position);
        }
        replaced
    }

    /// Finalize the edges of one chunk with whatever neighbors are loaded.
    pub fn finalize_edges(&mut self, palette: &BlockPalette, position: ChunkPosition) -> usize {
        self.edges_pending.remove(&position);
        let (lo, hi) = match self.chunks.get(&position) {
            Some(data) => (data.min_y(), data.max_y()),
            None => return 0,
        };
        finalize::finalize_chunk(self, palette, position, lo, hi, FinalizeScope::Edges)
    }
}

impl BlockAccess for ChunkGrid {
    fn block_id(&self, x: i32, y: i32, z: i32) -> BlockId {
        match self.chunks.get(&ChunkPosition::from_block(x, z)) {
            Some(chunk) => chunk.block_at(x & (CHUNK_WIDTH - 1), y, z & (CHUNK_WIDTH - 1)),
            None => AIR_ID,
        }
    }

    fn set_block_id(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        if let Some(chunk) = self.chunks.get_mut(&ChunkPosition::from_block(x, z)) {
            chunk.set_block_at(x & (CHUNK_WIDTH - 1), y, z & (CHUNK_WIDTH - 1), id);
        }
    }

    fn tile_entity(&self, x: i32, y: i32, z: i32) -> Option<&NbtCompound> {
        let chunk = self.chunks.get(&ChunkPosition::from_block(x, z))?;
        finalize::find_tile_entity(chunk.tile_entities(), x, y, z)
    }
}
