use super::LoaderShared;
use crate::chunk::ChunkPosition;
use crate::region::{ChunkStatus, RegionPosition};

/// Parser thread body: drain the queue until it is closed.
pub(super) fn run(shared: &LoaderShared) {
    while let Some(region) = shared.queue.take() {
        process(shared, region);
    }
    tracing::debug!("Region parser stopped");
}

/// Parse one region if it is still in view, then load its visible chunks
/// that are new or changed since they were last loaded.
pub(super) fn process(shared: &LoaderShared, position: RegionPosition) {
    let view = shared.view();
    if !view.contains_region(position) {
        return;
    }
    let world = &shared.world;
    // Deleted chunks leave the grid through the world's listeners.
    world.parse_region(position, view.min_y, view.max_y);
    if !shared.config.preload_chunks {
        return;
    }

    let region = world.region(position);
    let mut loaded = 0;
    for chunk in region.chunks() {
        if shared.queue.is_closed() {
            return;
        }
        let chunk_pos = chunk.position();
        if !view.contains_chunk(chunk_pos) {
            continue;
        }
        let previous = shared.grid.lock().timestamp(chunk_pos);
        if let Some(timestamp) = previous {
            if !region.chunk_changed_since(chunk_pos, timestamp) {
                continue;
            }
        }
        // Failures are logged and marked on the chunk by the world.
        if let Ok(Some(data)) = world.load_chunk(chunk_pos, view.min_y, view.max_y) {
            shared.grid.lock().insert(data);
            loaded += 1;
        }
    }

    let finalized = shared
        .grid
        .lock()
        .finalize_ready_edges(world.palette(), |p| expected(shared, p));
    if loaded > 0 {
        tracing::debug!(
            "Loaded {} chunks of region {} ({} edge blocks finalized)",
            loaded,
            position,
            finalized
        );
    }
}

/// Whether a chunk not yet in the grid may still arrive.
fn expected(shared: &LoaderShared, position: ChunkPosition) -> bool {
    if !shared.view().contains_chunk(position) {
        return false;
    }
    match shared.world.cached_region(position.region()) {
        Some(region) => region
            .chunk(position)
            .map(|chunk| !matches!(chunk.status(), ChunkStatus::Corrupt(_)))
            .unwrap_or(false),
        // Not parsed yet.
        None => true,
    }
}
