//! Region files and the regions built on top of them.
//!
//! A region exposes up to 32x32 chunk columns. `AnvilRegion` is backed by one
//! classic `r.<x>.<z>.mca` file. `CubicRegion` stands in for the 2x2 grid of
//! cubic-chunks `.3dr` files per vertical band that cover the same columns.

pub mod anvil;
pub mod cubic;
pub mod file;

pub use anvil::AnvilRegion;
pub use cubic::CubicRegion;
pub use file::{ChunkPayload, Compression, RegionFile, RegionHeader};

use crate::chunk::{ChunkPosition, ChunkVersion};
use crate::error::ChunkLoadError;
use parking_lot::RwLock;
use quartz_nbt::NbtCompound;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

pub const REGION_CHUNKS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionPosition {
    pub x: i32,
    pub z: i32,
}

impl RegionPosition {
    pub fn new(x: i32, z: i32) -> Self {
        RegionPosition { x, z }
    }

    /// Chunk at a local (0..32) offset in this region.
    pub fn chunk(&self, local_x: i32, local_z: i32) -> ChunkPosition {
        ChunkPosition::new((self.x << 5) + (local_x & 31), (self.z << 5) + (local_z & 31))
    }

    /// Chunk for a slot index of the region tables.
    pub fn chunk_at_index(&self, index: usize) -> ChunkPosition {
        self.chunk((index % 32) as i32, (index / 32) as i32)
    }

    pub fn file_name(&self) -> String {
        format!("r.{}.{}.mca", self.x, self.z)
    }

    /// Parse a classic `r.<x>.<z>.mca` file name.
    pub fn from_file_name(name: &str) -> Option<RegionPosition> {
        let mut parts = name.strip_prefix("r.")?.strip_suffix(".mca")?.split('.');
        let x = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(RegionPosition::new(x, z))
    }
}

impl fmt::Display for RegionPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Load state of a discovered chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    NotLoaded,
    Loaded(ChunkVersion),
    /// The chunk could not be read; the reason is shown to the user.
    Corrupt(String),
}

/// A chunk column known to exist in a region file.
#[derive(Debug)]
pub struct Chunk {
    position: ChunkPosition,
    status: RwLock<ChunkStatus>,
    /// Region timestamp of the data last loaded into memory.
    loaded_timestamp: RwLock<Option<i32>>,
}

impl Chunk {
    pub fn new(position: ChunkPosition) -> Self {
        Chunk {
            position,
            status: RwLock::new(ChunkStatus::NotLoaded),
            loaded_timestamp: RwLock::new(None),
        }
    }

    pub fn position(&self) -> ChunkPosition {
        self.position
    }

    pub fn status(&self) -> ChunkStatus {
        self.status.read().clone()
    }

    pub fn set_status(&self, status: ChunkStatus) {
        *self.status.write() = status;
    }

    pub fn loaded_timestamp(&self) -> Option<i32> {
        *self.loaded_timestamp.read()
    }

    pub fn set_loaded_timestamp(&self, timestamp: i32) {
        *self.loaded_timestamp.write() = Some(timestamp);
    }
}

/// Result of a region parse.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegionUpdate {
    /// False when the backing files were unchanged and nothing was read.
    pub changed: bool,
    pub discovered: Vec<ChunkPosition>,
    pub deleted: Vec<ChunkPosition>,
}

/// Raw tag data for one chunk column.
pub enum ChunkSource {
    Column {
        tag: NbtCompound,
        timestamp: i32,
    },
    /// Cubic-chunks cubes keyed by global cube Y.
    Cubes {
        cubes: BTreeMap<i32, NbtCompound>,
        timestamp: i32,
    },
}

impl ChunkSource {
    pub fn timestamp(&self) -> i32 {
        match self {
            ChunkSource::Column { timestamp, .. } | ChunkSource::Cubes { timestamp, .. } => {
                *timestamp
            }
        }
    }
}

pub trait Region: Send + Sync {
    fn position(&self) -> RegionPosition;

    fn chunk(&self, position: ChunkPosition) -> Option<Arc<Chunk>>;

    /// Every chunk currently present, in slot order.
    fn chunks(&self) -> Vec<Arc<Chunk>>;

    fn is_empty(&self) -> bool {
        self.chunks().is_empty()
    }

    /// Re-read the headers if the backing files changed. Only one thread
    /// parses a given region at a time; concurrent callers wait.
    fn parse(&self, min_y: i32, max_y: i32) -> RegionUpdate;

    /// True when a backing file's modification time differs from the one
    /// seen by the last parse.
    fn has_changed(&self) -> bool;

    fn chunk_timestamp(&self, position: ChunkPosition) -> i32;

    fn chunk_changed_since(&self, position: ChunkPosition, timestamp: i32) -> bool {
        timestamp != self.chunk_timestamp(position)
    }

    /// Read and decompress a chunk. `Ok(None)` means the chunk has no data.
    fn read_chunk(&self, position: ChunkPosition) -> Result<Option<ChunkSource>, ChunkLoadError>;

    fn delete_chunk(&self, position: ChunkPosition) -> io::Result<()>;
}

/// Chunk slots shared by both region kinds. A re-parse replaces slot entries
/// one at a time; existing `Arc<Chunk>` values are never mutated in place.
pub(crate) struct ChunkSlots {
    region: RegionPosition,
    slots: RwLock<Vec<Option<Arc<Chunk>>>>,
}

impl ChunkSlots {
    pub(crate) fn new(region: RegionPosition) -> Self {
        ChunkSlots {
            region,
            slots: RwLock::new(vec![None; REGION_CHUNKS]),
        }
    }

    pub(crate) fn get(&self, position: ChunkPosition) -> Option<Arc<Chunk>> {
        if position.region() != self.region {
            return None;
        }
        self.slots.read()[position.region_index()].clone()
    }

    pub(crate) fn all(&self) -> Vec<Arc<Chunk>> {
        self.slots.read().iter().flatten().cloned().collect()
    }

    pub(crate) fn clear(&self, position: ChunkPosition) {
        if position.region() == self.region {
            self.slots.write()[position.region_index()] = None;
        }
    }

    /// Create chunks for newly present slots and drop vanished ones.
    pub(crate) fn apply(&self, present: &[bool], update: &mut RegionUpdate) {
        let mut slots = self.slots.write();
        for (index, (slot, exists)) in slots.iter_mut().zip(present).enumerate() {
            match (slot.is_some(), *exists) {
                (false, true) => {
                    let position = self.region.chunk_at_index(index);
                    *slot = Some(Arc::new(Chunk::new(position)));
                    update.discovered.push(position);
                }
                (true, false) => {
                    *slot = None;
                    update.deleted.push(self.region.chunk_at_index(index));
                }
                _ => {}
            }
        }
    }
}

/// Modification time in milliseconds, or `None` when the file is missing.
pub fn modified_millis(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    })
}
