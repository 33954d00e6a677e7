//! Background loading of the regions inside a map view.
//!
//! `WorldMapLoader` owns a `RegionQueue`, one or more parser threads that
//! drain it and a watcher thread that rechecks the regions in view on a
//! fixed interval. Loaded chunks land in a shared `ChunkGrid`.

mod parser;
mod queue;
mod watcher;

pub use queue::RegionQueue;

use crate::chunk::ChunkPosition;
use crate::config::LoaderConfig;
use crate::region::RegionPosition;
use crate::world::{ChunkGrid, World, WorldListener};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

/// Rectangle of chunks plus a vertical range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapView {
    pub min_chunk_x: i32,
    pub min_chunk_z: i32,
    pub max_chunk_x: i32,
    pub max_chunk_z: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl MapView {
    /// View of the chunks within `radius` of a center chunk.
    pub fn around(center: ChunkPosition, radius: i32, min_y: i32, max_y: i32) -> Self {
        MapView {
            min_chunk_x: center.x - radius,
            min_chunk_z: center.z - radius,
            max_chunk_x: center.x + radius,
            max_chunk_z: center.z + radius,
            min_y,
            max_y,
        }
    }

    /// A view covering nothing.
    pub fn empty() -> Self {
        MapView {
            min_chunk_x: 0,
            min_chunk_z: 0,
            max_chunk_x: -1,
            max_chunk_z: -1,
            min_y: 0,
            max_y: -1,
        }
    }

    pub fn contains_chunk(&self, chunk: ChunkPosition) -> bool {
        (self.min_chunk_x..=self.max_chunk_x).contains(&chunk.x)
            && (self.min_chunk_z..=self.max_chunk_z).contains(&chunk.z)
    }

    pub fn contains_region(&self, region: RegionPosition) -> bool {
        let (x0, z0) = (region.x << 5, region.z << 5);
        x0 <= self.max_chunk_x
            && x0 + 31 >= self.min_chunk_x
            && z0 <= self.max_chunk_z
            && z0 + 31 >= self.min_chunk_z
    }

    /// Every region overlapping the view.
    pub fn regions(&self) -> Vec<RegionPosition> {
        if self.min_chunk_x > self.max_chunk_x || self.min_chunk_z > self.max_chunk_z {
            return Vec::new();
        }
        let mut regions = Vec::new();
        for rz in (self.min_chunk_z >> 5)..=(self.max_chunk_z >> 5) {
            for rx in (self.min_chunk_x >> 5)..=(self.max_chunk_x >> 5) {
                regions.push(RegionPosition::new(rx, rz));
            }
        }
        regions
    }
}

/// State shared by the loader threads.
pub(crate) struct LoaderShared {
    pub(crate) world: Arc<World>,
    pub(crate) config: LoaderConfig,
    pub(crate) queue: RegionQueue,
    pub(crate) view: RwLock<MapView>,
    pub(crate) grid: Mutex<ChunkGrid>,
    stopped: Mutex<bool>,
    stop_signal: Condvar,
}

impl LoaderShared {
    pub(crate) fn view(&self) -> MapView {
        *self.view.read()
    }

    /// Sleep for the watch interval. Returns false once the loader stops.
    pub(crate) fn sleep_interval(&self) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.stop_signal
                .wait_for(&mut stopped, self.config.watch_interval());
        }
        !*stopped
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.stop_signal.notify_all();
        self.queue.close();
    }
}

/// Drops chunks from the grid when the world reports them deleted, whether
/// a re-parse found them gone or they were deleted through `World`.
struct GridEviction(Weak<LoaderShared>);

impl WorldListener for GridEviction {
    fn chunks_deleted(&self, chunks: &[ChunkPosition]) {
        if let Some(shared) = self.0.upgrade() {
            let mut grid = shared.grid.lock();
            for position in chunks {
                grid.remove(*position);
            }
        }
    }
}

pub struct WorldMapLoader {
    shared: Arc<LoaderShared>,
    threads: Vec<JoinHandle<()>>,
}

impl WorldMapLoader {
    pub fn new(world: Arc<World>, config: LoaderConfig) -> Self {
        let view = MapView {
            min_y: config.min_y,
            max_y: config.max_y,
            ..MapView::empty()
        };
        let shared = Arc::new(LoaderShared {
            world,
            config,
            queue: RegionQueue::new(),
            view: RwLock::new(view),
            grid: Mutex::new(ChunkGrid::new()),
            stopped: Mutex::new(false),
            stop_signal: Condvar::new(),
        });
        shared
            .world
            .add_listener(Arc::new(GridEviction(Arc::downgrade(&shared))));
        WorldMapLoader {
            shared,
            threads: Vec::new(),
        }
    }

    /// Spawn the parser and watcher threads.
    pub fn start(&mut self) -> io::Result<()> {
        if !self.threads.is_empty() {
            return Ok(());
        }
        for i in 0..self.shared.config.parser_threads.max(1) {
            let shared = self.shared.clone();
            self.threads.push(
                thread::Builder::new()
                    .name(format!("region-parser-{}", i))
                    .spawn(move || parser::run(&shared))?,
            );
        }
        let shared = self.shared.clone();
        self.threads.push(
            thread::Builder::new()
                .name("region-watcher".to_string())
                .spawn(move || watcher::run(&shared))?,
        );
        tracing::debug!("Started map loader with {} threads", self.threads.len());
        Ok(())
    }

    pub fn world(&self) -> &Arc<World> {
        &self.shared.world
    }

    pub fn queue(&self) -> &RegionQueue {
        &self.shared.queue
    }

    pub fn view(&self) -> MapView {
        self.shared.view()
    }

    /// Move the view and queue every region it overlaps. Chunks that left
    /// the view are dropped from the grid.
    pub fn set_view(&self, view: MapView) {
        *self.shared.view.write() = view;
        self.shared
            .grid
            .lock()
            .retain(|position| view.contains_chunk(position));
        for region in view.regions() {
            self.shared.queue.push(region);
        }
    }

    /// Run `f` with the loaded chunks.
    pub fn with_grid<R>(&self, f: impl FnOnce(&ChunkGrid) -> R) -> R {
        f(&self.shared.grid.lock())
    }

    /// Parse and load one region on the calling thread.
    pub fn load_region_now(&self, region: RegionPosition) {
        parser::process(&self.shared, region);
    }

    /// Stop every thread and wait for them to exit.
    pub fn shutdown(&mut self) {
        self.shared.stop();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Map loader thread panicked");
            }
        }
    }
}

impl Drop for WorldMapLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_regions() {
        let view = MapView::around(ChunkPosition::new(0, 0), 2, 0, 255);
        assert_eq!(
            view.regions(),
            vec![
                RegionPosition::new(-1, -1),
                RegionPosition::new(0, -1),
                RegionPosition::new(-1, 0),
                RegionPosition::new(0, 0),
            ]
        );
        assert!(view.contains_region(RegionPosition::new(-1, 0)));
        assert!(!view.contains_region(RegionPosition::new(1, 0)));
        assert!(view.contains_chunk(ChunkPosition::new(-2, 2)));
        assert!(!view.contains_chunk(ChunkPosition::new(3, 0)));
        assert!(MapView::empty().regions().is_empty());
    }
}
