//! Cubic-chunks worlds (`region3d/<x>.<y>.<z>.3dr`).
//!
//! Each `.3dr` file holds 16x16x16 cubes of 16x16x16 blocks. Its header is a
//! table of 4096 big-endian `u32` locations indexed `x << 8 | y << 4 | z`,
//! with 512-byte sectors. A cube payload is a `u32` length followed by
//! gzip-compressed tag data.
//!
//! `CubicRegion` presents the 2x2 cubic regions of every vertical band that
//! cover one classic 32x32 region as if they were a single region.

use super::file::Compression;
use super::{
    modified_millis, Chunk, ChunkPayload, ChunkSlots, ChunkSource, Region, RegionPosition,
    RegionUpdate, REGION_CHUNKS,
};
use crate::chunk::ChunkPosition;
use crate::error::ChunkLoadError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::write::GzEncoder;
use parking_lot::Mutex;
use quartz_nbt::io::Flavor;
use quartz_nbt::NbtCompound;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CUBES_PER_AXIS: i32 = 16;
pub const CUBE_COUNT: usize = 4096;
pub const CUBE_SECTOR_SIZE: u64 = 512;
pub const CUBE_HEADER_SIZE: u64 = 4 * CUBE_COUNT as u64;
/// Cubic regions per classic region along each horizontal axis.
const SUB_REGIONS: i32 = 2;

/// Slot of a cube in a `.3dr` location table.
pub fn cube_index(x: i32, y: i32, z: i32) -> usize {
    (((x & 15) << 8) | ((y & 15) << 4) | (z & 15)) as usize
}

pub fn cubic_file_name(x: i32, y: i32, z: i32) -> String {
    format!("{}.{}.{}.3dr", x, y, z)
}

/// One `.3dr` file.
#[derive(Debug, Clone)]
pub struct CubicRegionFile {
    path: PathBuf,
}

impl CubicRegionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CubicRegionFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Which cube slots have a location entry. `Ok(None)` when the file is
    /// shorter than its header.
    pub fn read_presence(&self) -> io::Result<Option<Vec<bool>>> {
        let mut file = File::open(&self.path)?;
        if file.metadata()?.len() < CUBE_HEADER_SIZE {
            return Ok(None);
        }
        let mut locations = vec![0u32; CUBE_COUNT];
        file.read_u32_into::<BigEndian>(&mut locations)?;
        Ok(Some(locations.into_iter().map(|loc| loc != 0).collect()))
    }

    /// Read the cubes of one column, keyed by local cube Y. Cubes that fail
    /// to read are logged and skipped.
    pub fn read_column(&self, local_x: i32, local_z: i32) -> io::Result<BTreeMap<i32, NbtCompound>> {
        let mut cubes = BTreeMap::new();
        let mut file = File::open(&self.path)?;
        let length = file.metadata()?.len();
        if length < CUBE_HEADER_SIZE {
            tracing::warn!("Missing header in region file {}", self.path.display());
            return Ok(cubes);
        }
        for local_y in 0..CUBES_PER_AXIS {
            match read_cube(&mut file, length, cube_index(local_x, local_y, local_z)) {
                Ok(Some(tag)) => {
                    cubes.insert(local_y, tag);
                }
                Ok(None) => {}
                Err(reason) => tracing::warn!(
                    "Failed to read cube ({}, {}, {}) in {}: {}",
                    local_x,
                    local_y,
                    local_z,
                    self.path.display(),
                    reason
                ),
            }
        }
        Ok(cubes)
    }

    /// Zero the location entries of every cube in one column.
    pub fn delete_column(&self, local_x: i32, local_z: i32) -> io::Result<()> {
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        if file.metadata()?.len() < CUBE_HEADER_SIZE {
            tracing::warn!("Missing header in region file {}", self.path.display());
            return Ok(());
        }
        for local_y in 0..CUBES_PER_AXIS {
            file.seek(SeekFrom::Start(4 * cube_index(local_x, local_y, local_z) as u64))?;
            file.write_u32::<BigEndian>(0)?;
        }
        Ok(())
    }

    /// Append a gzip-compressed cube and point its location entry at it.
    pub fn write_cube(&self, local_x: i32, local_y: i32, local_z: i32, tag: &NbtCompound) -> io::Result<()> {
        let mut nbt_bytes = Vec::new();
        quartz_nbt::io::write_nbt(&mut nbt_bytes, None, tag, Flavor::Uncompressed)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&nbt_bytes)?;
        let compressed = encoder.finish()?;

        let total = compressed.len() as u64 + 4;
        let sectors = total.div_ceil(CUBE_SECTOR_SIZE);
        if sectors > 255 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "cube too large"));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        let length = file.metadata()?.len();
        if length < CUBE_HEADER_SIZE {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&vec![0u8; CUBE_HEADER_SIZE as usize])?;
        }
        let offset = length
            .max(CUBE_HEADER_SIZE)
            .div_ceil(CUBE_SECTOR_SIZE);

        file.seek(SeekFrom::Start(offset * CUBE_SECTOR_SIZE))?;
        file.write_u32::<BigEndian>(compressed.len() as u32)?;
        file.write_all(&compressed)?;
        file.write_all(&vec![0u8; (sectors * CUBE_SECTOR_SIZE - total) as usize])?;

        file.seek(SeekFrom::Start(4 * cube_index(local_x, local_y, local_z) as u64))?;
        file.write_u32::<BigEndian>(((offset as u32) << 8) | sectors as u32)?;
        Ok(())
    }
}

fn read_cube(file: &mut File, length: u64, index: usize) -> Result<Option<NbtCompound>, String> {
    let io_err = |e: io::Error| e.to_string();
    file.seek(SeekFrom::Start(4 * index as u64)).map_err(io_err)?;
    let location = file.read_u32::<BigEndian>().map_err(io_err)?;
    let (offset, count) = ((location >> 8) as u64, (location & 0xFF) as u64);
    if location == 0 || offset == 0 || count == 0 {
        return Ok(None);
    }
    let start = offset * CUBE_SECTOR_SIZE;
    if length < start + 4 {
        return Err(format!(
            "outside of region file: expected data at offset {} but file length is {}",
            start, length
        ));
    }
    file.seek(SeekFrom::Start(start)).map_err(io_err)?;
    let size = file.read_u32::<BigEndian>().map_err(io_err)? as u64;
    if size > count * CUBE_SECTOR_SIZE {
        return Err(format!(
            "expected data size max {} but found {}",
            count * CUBE_SECTOR_SIZE,
            size
        ));
    }
    if length < start + 4 + size {
        return Err(format!(
            "outside of region file: expected {} bytes at offset {} but file length is {}",
            size, start, length
        ));
    }
    let mut data = vec![0u8; size as usize];
    file.read_exact(&mut data).map_err(io_err)?;
    let payload = ChunkPayload {
        compression: Compression::Gzip,
        data,
        timestamp: 0,
    };
    let decompressed = payload.decompress().map_err(io_err)?;
    let (tag, _) = quartz_nbt::io::read_nbt(&mut io::Cursor::new(&decompressed), Flavor::Uncompressed)
        .map_err(|e| e.to_string())?;
    Ok(Some(tag))
}

struct SubRegion {
    file: CubicRegionFile,
    region_y: i32,
    /// Modification time seen by the last parse, in milliseconds.
    modified: Option<i64>,
    present: Vec<bool>,
}

impl SubRegion {
    fn new(path: PathBuf, region_y: i32) -> Self {
        SubRegion {
            file: CubicRegionFile::new(path),
            region_y,
            modified: None,
            present: vec![false; CUBE_COUNT],
        }
    }

    /// Re-read the header if the file changed. Returns true when it did.
    fn parse(&mut self) -> bool {
        let modified = modified_millis(self.file.path());
        if modified == self.modified {
            return false;
        }
        self.modified = modified;
        match self.file.read_presence() {
            Ok(Some(present)) => self.present = present,
            Ok(None) => {
                tracing::warn!("Missing header in region file {}", self.file.path().display())
            }
            Err(e) => tracing::warn!(
                "Failed to read region {}: {}",
                self.file.path().display(),
                e
            ),
        }
        true
    }
}

type Layer = [Option<SubRegion>; 4];

struct CubicState {
    /// Layers keyed by cubic region Y (block Y >> 8).
    layers: BTreeMap<i32, Layer>,
    min_region_y: i32,
    max_region_y: i32,
    average_timestamp: [i32; 4],
    any_updated: [bool; 4],
}

impl CubicState {
    /// Timestamp shared by every column of one 16x16 sub-area: the mean
    /// modification time of the sub-region files across layers.
    fn average_timestamp(&mut self, index: usize) -> i32 {
        if !self.any_updated[index] {
            return self.average_timestamp[index];
        }
        let layers = self.layers.len() as i64;
        let sum: i64 = self
            .layers
            .values()
            .filter_map(|layer| layer[index].as_ref())
            .map(|sub| sub.modified.unwrap_or(0))
            .sum();
        self.average_timestamp[index] = if layers == 0 { 0 } else { (sum / layers) as i32 };
        self.any_updated[index] = false;
        self.average_timestamp[index]
    }
}

/// Sub-region slot for a column: `(regionX & 1) + (regionZ & 1) * 2` with
/// regionX = chunk x >> 4.
fn sub_index(position: ChunkPosition) -> usize {
    (((position.x >> 4) & 1) + ((position.z >> 4) & 1) * SUB_REGIONS) as usize
}

/// A classic-sized region assembled from cubic-chunks files.
pub struct CubicRegion {
    position: RegionPosition,
    region_dir: PathBuf,
    slots: ChunkSlots,
    state: Mutex<CubicState>,
}

impl CubicRegion {
    pub fn new(region_dir: &Path, position: RegionPosition) -> Self {
        CubicRegion {
            position,
            region_dir: region_dir.to_path_buf(),
            slots: ChunkSlots::new(position),
            state: Mutex::new(CubicState {
                layers: BTreeMap::new(),
                min_region_y: i32::MAX,
                max_region_y: i32::MIN,
                average_timestamp: [0; 4],
                any_updated: [false; 4],
            }),
        }
    }

    /// Path of the sub-region file at local offset (lx, lz) of band `ry`.
    fn sub_path(&self, lx: i32, ry: i32, lz: i32) -> PathBuf {
        let (min_x, min_z) = (self.position.x * SUB_REGIONS, self.position.z * SUB_REGIONS);
        self.region_dir
            .join(cubic_file_name(min_x + lx, ry, min_z + lz))
    }

    fn range_changed(&self, state: &CubicState) -> bool {
        for ry in state.min_region_y..=state.max_region_y {
            for (index, (lx, lz)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
                let known = state.layers.get(&ry).and_then(|layer| layer[index].as_ref());
                match known {
                    Some(sub) => {
                        if modified_millis(sub.file.path()) != sub.modified {
                            return true;
                        }
                    }
                    None => {
                        if self.sub_path(lx, ry, lz).is_file() {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}

impl Region for CubicRegion {
    fn position(&self) -> RegionPosition {
        self.position
    }

    fn chunk(&self, position: ChunkPosition) -> Option<Arc<Chunk>> {
        self.slots.get(position)
    }

    fn chunks(&self) -> Vec<Arc<Chunk>> {
        self.slots.all()
    }

    fn parse(&self, min_y: i32, max_y: i32) -> RegionUpdate {
        let mut state = self.state.lock();
        let mut update = RegionUpdate::default();

        // The range only grows so a map view still loading cannot shrink
        // what a scene load asked for.
        state.min_region_y = state.min_region_y.min(min_y >> 8);
        state.max_region_y = state.max_region_y.max(max_y >> 8);
        let (lo, hi) = (state.min_region_y, state.max_region_y);
        state.layers.retain(|ry, _| (lo..=hi).contains(ry));

        if !self.range_changed(&state) {
            return update;
        }
        update.changed = true;

        for ry in lo..=hi {
            let paths: Vec<PathBuf> = [(0, 0), (1, 0), (0, 1), (1, 1)]
                .into_iter()
                .map(|(lx, lz)| self.sub_path(lx, ry, lz))
                .collect();
            let layer = state.layers.entry(ry).or_default();
            for (slot, path) in layer.iter_mut().zip(paths) {
                if path.is_file() {
                    if slot.is_none() {
                        *slot = Some(SubRegion::new(path, ry));
                    }
                } else {
                    *slot = None;
                }
            }
        }

        let mut present = vec![false; REGION_CHUNKS];
        let mut updated = [false; 4];
        for layer in state.layers.values_mut() {
            for (index, slot) in layer.iter_mut().enumerate() {
                let sub = match slot {
                    Some(sub) => sub,
                    None => continue,
                };
                updated[index] |= sub.parse();
                let (rlx, rlz) = (index as i32 % SUB_REGIONS, index as i32 / SUB_REGIONS);
                for (cube, _) in sub.present.iter().enumerate().filter(|(_, p)| **p) {
                    let (cube_x, cube_z) = ((cube >> 8) as i32, (cube & 15) as i32);
                    let chunk = (rlx * CUBES_PER_AXIS + cube_x)
                        + (rlz * CUBES_PER_AXIS + cube_z) * 32;
                    present[chunk as usize] = true;
                }
            }
        }
        for (flag, was_updated) in state.any_updated.iter_mut().zip(updated) {
            *flag |= was_updated;
        }
        // Layers with no files left are dropped so they do not dilute the
        // averaged timestamps.
        state
            .layers
            .retain(|_, layer| layer.iter().any(|sub| sub.is_some()));

        self.slots.apply(&present, &mut update);
        tracing::debug!(
            "Parsed cubic region {} (bands {}..={}): {} discovered, {} deleted",
            self.position,
            lo,
            hi,
            update.discovered.len(),
            update.deleted.len()
        );
        update
    }

    fn has_changed(&self) -> bool {
        let state = self.state.lock();
        state
            .layers
            .values()
            .flat_map(|layer| layer.iter().flatten())
            .any(|sub| modified_millis(sub.file.path()) != sub.modified)
    }

    fn chunk_timestamp(&self, position: ChunkPosition) -> i32 {
        self.state.lock().average_timestamp(sub_index(position))
    }

    fn read_chunk(&self, position: ChunkPosition) -> Result<Option<ChunkSource>, ChunkLoadError> {
        let mut state = self.state.lock();
        let index = sub_index(position);
        let mut cubes = BTreeMap::new();
        for layer in state.layers.values() {
            let sub = match &layer[index] {
                Some(sub) => sub,
                None => continue,
            };
            match sub.file.read_column(position.x & 15, position.z & 15) {
                Ok(column) => {
                    for (local_y, tag) in column {
                        cubes.insert((sub.region_y << 4) + local_y, tag);
                    }
                }
                Err(e) => tracing::warn!(
                    "Failed to read region {}: {}",
                    sub.file.path().display(),
                    e
                ),
            }
        }
        let timestamp = state.average_timestamp(index);
        if cubes.is_empty() {
            return Ok(None);
        }
        Ok(Some(ChunkSource::Cubes { cubes, timestamp }))
    }

    fn delete_chunk(&self, position: ChunkPosition) -> io::Result<()> {
        let state = self.state.lock();
        let index = sub_index(position);
        for sub in state.layers.values().filter_map(|layer| layer[index].as_ref()) {
            sub.file.delete_column(position.x & 15, position.z & 15)?;
        }
        self.slots.clear(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_tag(marker: i32) -> NbtCompound {
        let mut tag = NbtCompound::new();
        tag.insert("Marker", marker);
        tag
    }

    #[test]
    fn test_cube_index() {
        assert_eq!(cube_index(0, 0, 0), 0);
        assert_eq!(cube_index(1, 0, 0), 256);
        assert_eq!(cube_index(0, 1, 0), 16);
        assert_eq!(cube_index(0, 0, 1), 1);
        assert_eq!(cube_index(-1, -1, -1), 4095);
    }

    #[test]
    fn test_column_read_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let file = CubicRegionFile::new(dir.path().join(cubic_file_name(0, 0, 0)));
        file.write_cube(3, 2, 5, &cube_tag(2)).unwrap();
        file.write_cube(3, 7, 5, &cube_tag(7)).unwrap();
        file.write_cube(4, 7, 5, &cube_tag(99)).unwrap();

        let column = file.read_column(3, 5).unwrap();
        assert_eq!(column.keys().copied().collect::<Vec<_>>(), vec![2, 7]);
        assert_eq!(column[&7].get::<_, i32>("Marker").unwrap(), 7);

        file.delete_column(3, 5).unwrap();
        assert!(file.read_column(3, 5).unwrap().is_empty());
        assert_eq!(file.read_column(4, 5).unwrap().len(), 1);
    }

    fn layer_with(index: usize, sub: SubRegion) -> Layer {
        let mut layer: Layer = Default::default();
        layer[index] = Some(sub);
        layer
    }

    fn sub_modified_at(dir: &Path, region_y: i32, modified: i64) -> SubRegion {
        let mut sub = SubRegion::new(dir.join(cubic_file_name(0, region_y, 0)), region_y);
        sub.modified = Some(modified);
        sub
    }

    #[test]
    fn test_column_timestamp_is_truncated_layer_mean() {
        let dir = tempfile::tempdir().unwrap();
        let region = CubicRegion::new(dir.path(), RegionPosition::new(0, 0));
        // No layers at all.
        region.state.lock().any_updated = [true; 4];
        assert_eq!(region.chunk_timestamp(ChunkPosition::new(0, 0)), 0);

        {
            let mut state = region.state.lock();
            state.layers.insert(0, layer_with(0, sub_modified_at(dir.path(), 0, 1000)));
            state.layers.insert(1, layer_with(0, sub_modified_at(dir.path(), 1, 1003)));
            state.layers.insert(2, layer_with(1, sub_modified_at(dir.path(), 2, 50)));
            state.any_updated = [true; 4];
        }
        // Every layer counts, including ones without a file for the column.
        assert_eq!(region.chunk_timestamp(ChunkPosition::new(0, 0)), 667);
        assert_eq!(region.chunk_timestamp(ChunkPosition::new(16, 0)), 16);
        assert_eq!(region.chunk_timestamp(ChunkPosition::new(0, 16)), 0);

        // Without a re-parse the cached value is kept.
        region.state.lock().layers.remove(&2);
        assert_eq!(region.chunk_timestamp(ChunkPosition::new(0, 0)), 667);
        region.state.lock().any_updated[0] = true;
        assert_eq!(region.chunk_timestamp(ChunkPosition::new(0, 0)), 1001);
    }

    #[test]
    fn test_imposter_region_maps_columns() {
        let dir = tempfile::tempdir().unwrap();
        // Region (0, 0) covers cubic regions x 0..2, z 0..2.
        CubicRegionFile::new(dir.path().join(cubic_file_name(1, 0, 0)))
            .write_cube(2, 4, 3, &cube_tag(4))
            .unwrap();
        CubicRegionFile::new(dir.path().join(cubic_file_name(1, -1, 0)))
            .write_cube(2, 15, 3, &cube_tag(-1))
            .unwrap();

        let region = CubicRegion::new(dir.path(), RegionPosition::new(0, 0));
        let update = region.parse(-256, 255);
        assert!(update.changed);
        assert_eq!(update.discovered, vec![ChunkPosition::new(18, 3)]);

        match region.read_chunk(ChunkPosition::new(18, 3)).unwrap() {
            Some(ChunkSource::Cubes { cubes, .. }) => {
                assert_eq!(cubes.keys().copied().collect::<Vec<_>>(), vec![-1, 4]);
            }
            _ => panic!("expected cubes"),
        }
        assert!(!region.parse(-256, 255).changed);
        assert!(!region.has_changed());
    }
}
