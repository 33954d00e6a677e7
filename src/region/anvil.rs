use super::file::RegionFile;
use super::{Chunk, ChunkSlots, ChunkSource, Region, RegionPosition, RegionUpdate, REGION_CHUNKS};
use crate::chunk::ChunkPosition;
use crate::error::ChunkLoadError;
use parking_lot::{Mutex, RwLock};
use std::io;
use std::path::Path;
use std::sync::Arc;

/// A region backed by a single classic `r.<x>.<z>.mca` file.
pub struct AnvilRegion {
    position: RegionPosition,
    file: RegionFile,
    slots: ChunkSlots,
    timestamps: RwLock<Vec<i32>>,
    /// Modification time seen by the last parse, in milliseconds.
    last_modified: Mutex<Option<i64>>,
    parse_lock: Mutex<()>,
}

impl AnvilRegion {
    pub fn new(region_dir: &Path, position: RegionPosition) -> Self {
        AnvilRegion {
            position,
            file: RegionFile::new(region_dir.join(position.file_name())),
            slots: ChunkSlots::new(position),
            timestamps: RwLock::new(vec![0; REGION_CHUNKS]),
            last_modified: Mutex::new(None),
            parse_lock: Mutex::new(()),
        }
    }

    pub fn file(&self) -> &RegionFile {
        &self.file
    }
}

impl Region for AnvilRegion {
    fn position(&self) -> RegionPosition {
        self.position
    }

    fn chunk(&self, position: ChunkPosition) -> Option<Arc<Chunk>> {
        self.slots.get(position)
    }

    fn chunks(&self) -> Vec<Arc<Chunk>> {
        self.slots.all()
    }

    fn parse(&self, _min_y: i32, _max_y: i32) -> RegionUpdate {
        let _guard = self.parse_lock.lock();
        let mut update = RegionUpdate::default();

        let modified = match self.file.modified() {
            Some(modified) => modified,
            None => return update,
        };
        {
            let mut last = self.last_modified.lock();
            if *last == Some(modified) {
                return update;
            }
            *last = Some(modified);
        }
        update.changed = true;

        let header = match self.file.read_header() {
            Ok(Some(header)) => header,
            Ok(None) => {
                tracing::warn!("Missing header in region file {}", self.position);
                return update;
            }
            Err(e) => {
                tracing::warn!("Failed to read region {}: {}", self.position, e);
                return update;
            }
        };

        let present: Vec<bool> = (0..REGION_CHUNKS).map(|i| header.is_present(i)).collect();
        self.slots.apply(&present, &mut update);
        *self.timestamps.write() = header.timestamps;

        tracing::debug!(
            "Parsed region {}: {} discovered, {} deleted",
            self.position,
            update.discovered.len(),
            update.deleted.len()
        );
        update
    }

    fn has_changed(&self) -> bool {
        *self.last_modified.lock() != self.file.modified()
    }

    fn chunk_timestamp(&self, position: ChunkPosition) -> i32 {
        self.timestamps.read()[position.region_index()]
    }

    fn read_chunk(&self, position: ChunkPosition) -> Result<Option<ChunkSource>, ChunkLoadError> {
        let payload = match self.file.read_chunk(position)? {
            Some(payload) => payload,
            None => return Ok(None),
        };
        self.timestamps.write()[position.region_index()] = payload.timestamp;
        let tag = payload.to_tag(position)?;
        Ok(Some(ChunkSource::Column {
            tag,
            timestamp: payload.timestamp,
        }))
    }

    fn delete_chunk(&self, position: ChunkPosition) -> io::Result<()> {
        self.file.delete_chunk(position)?;
        self.slots.clear(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartz_nbt::NbtCompound;

    #[test]
    fn test_parse_discovers_and_skips_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let position = RegionPosition::new(0, 0);
        let region = AnvilRegion::new(dir.path(), position);

        // No file yet.
        assert!(!region.parse(0, 255).changed);

        let mut tag = NbtCompound::new();
        tag.insert("DataVersion", 3700i32);
        region.file().write_chunk(ChunkPosition::new(3, 4), &tag, 42).unwrap();

        let update = region.parse(0, 255);
        assert!(update.changed);
        assert_eq!(update.discovered, vec![ChunkPosition::new(3, 4)]);
        assert_eq!(region.chunk_timestamp(ChunkPosition::new(3, 4)), 42);
        assert!(!region.chunk_changed_since(ChunkPosition::new(3, 4), 42));
        assert!(region.chunk_changed_since(ChunkPosition::new(3, 4), 41));

        let again = region.parse(0, 255);
        assert!(!again.changed);
        assert!(again.discovered.is_empty());
        assert!(!region.has_changed());

        match region.read_chunk(ChunkPosition::new(3, 4)).unwrap() {
            Some(ChunkSource::Column { tag, timestamp }) => {
                assert_eq!(timestamp, 42);
                assert_eq!(tag.get::<_, i32>("DataVersion").unwrap(), 3700);
            }
            _ => panic!("expected a column"),
        }
        assert!(region.read_chunk(ChunkPosition::new(0, 0)).unwrap().is_none());

        region.delete_chunk(ChunkPosition::new(3, 4)).unwrap();
        assert!(region.chunk(ChunkPosition::new(3, 4)).is_none());
        assert!(region.read_chunk(ChunkPosition::new(3, 4)).unwrap().is_none());
    }
}
