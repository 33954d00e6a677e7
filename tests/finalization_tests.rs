use strata::finalize::{finalize_chunk, ChunkAccess};
use strata::legacy::translate_spec;
use strata::{
    BlockAccess, BlockPalette, ChunkData, ChunkGrid, ChunkPosition, ChunkVersion, DenseChunkData,
    FinalizeScope, LoadedChunk,
};

fn loaded(position: ChunkPosition, data: DenseChunkData) -> LoadedChunk {
    LoadedChunk {
        position,
        data: Box::new(data),
        version: ChunkVersion::PreFlattening,
        timestamp: 1,
    }
}

#[test]
fn test_fence_connects_across_chunk_border() {
    let palette = BlockPalette::new();
    let fence = palette.put(translate_spec(85, 0));
    let mut west = DenseChunkData::new();
    west.set_block_at(15, 64, 0, fence);
    let mut east = DenseChunkData::new();
    east.set_block_at(0, 64, 0, fence);

    let mut grid = ChunkGrid::new();
    grid.insert(loaded(ChunkPosition::new(0, 0), west));
    grid.insert(loaded(ChunkPosition::new(1, 0), east));

    // Both fences sit on a chunk border.
    assert_eq!(grid.finalize_interiors(&palette), 0);

    let on_disk = |p: ChunkPosition| p == ChunkPosition::new(0, 0) || p == ChunkPosition::new(1, 0);
    assert_eq!(grid.finalize_ready_edges(&palette, on_disk), 2);

    for x in [15, 16] {
        let block = palette.get(grid.block_id(x, 64, 0));
        assert!(!block.is_unfinalized());
        assert_eq!(block.short_name(), "oak_fence");
        assert_eq!(block.state.get_property("east"), Some("true"));
        assert_eq!(block.state.get_property("west"), Some("true"));
        assert_eq!(block.state.get_property("north"), Some("false"));
    }

    // Nothing is left pending.
    assert_eq!(grid.finalize_ready_edges(&palette, on_disk), 0);
    assert_eq!(grid.finalize_edges(&palette, ChunkPosition::new(0, 0)), 0);
}

#[test]
fn test_whole_chunk_pass_is_idempotent() {
    let palette = BlockPalette::new();
    let mut chunk = DenseChunkData::new();
    let position = ChunkPosition::new(0, 0);

    // A staircase row, a fence post with stone beside it and a two-block plant.
    let stairs = palette.put(translate_spec(53, 0));
    for x in 4..8 {
        chunk.set_block_at(x, 70, 4, stairs);
    }
    chunk.set_block_at(10, 70, 10, palette.put(translate_spec(85, 0)));
    chunk.set_block_at(11, 70, 10, palette.put(translate_spec(1, 0)));
    chunk.set_block_at(2, 80, 2, palette.put(translate_spec(175, 2)));
    chunk.set_block_at(2, 81, 2, palette.put(translate_spec(175, 8)));

    let mut access = ChunkAccess::new(position, &mut chunk);
    let first = finalize_chunk(&mut access, &palette, position, 0, 255, FinalizeScope::All);
    assert_eq!(first, 7);

    let snapshot: Vec<u32> = (0..16)
        .flat_map(|x| (60..90).map(move |y| (x, y)))
        .flat_map(|(x, y)| (0..16).map(move |z| (x, y, z)))
        .map(|(x, y, z)| access.block_id(x, y, z))
        .collect();
    let second = finalize_chunk(&mut access, &palette, position, 0, 255, FinalizeScope::All);
    assert_eq!(second, 0);
    let again: Vec<u32> = (0..16)
        .flat_map(|x| (60..90).map(move |y| (x, y)))
        .flat_map(|(x, y)| (0..16).map(move |z| (x, y, z)))
        .map(|(x, y, z)| access.block_id(x, y, z))
        .collect();
    assert_eq!(snapshot, again);

    let fence = palette.get(access.block_id(10, 70, 10));
    assert_eq!(fence.state.get_property("east"), Some("true"));
    assert_eq!(fence.state.get_property("west"), Some("false"));

    let upper = palette.get(access.block_id(2, 81, 2));
    assert_eq!(upper.short_name(), "tall_grass");
    assert_eq!(upper.state.get_property("half"), Some("upper"));
    let lower = palette.get(access.block_id(2, 80, 2));
    assert_eq!(lower.state.get_property("half"), Some("lower"));

    for x in 4..8 {
        let step = palette.get(access.block_id(x, 70, 4));
        assert_eq!(step.state.get_property("shape"), Some("straight"));
    }
}

#[test]
fn test_pending_blocks_are_found_only_in_requested_scope() {
    let palette = BlockPalette::new();
    let mut chunk = DenseChunkData::new();
    let position = ChunkPosition::new(-1, 3);
    let mycelium = palette.put(translate_spec(110, 0));
    chunk.set_block_at(0, 100, 5, mycelium);
    chunk.set_block_at(5, 100, 5, mycelium);
    chunk.set_block_at(5, 101, 5, palette.put(translate_spec(78, 0)));

    let mut access = ChunkAccess::new(position, &mut chunk);
    let (bx, bz) = (position.block_x(), position.block_z());
    assert_eq!(finalize_chunk(&mut access, &palette, position, 0, 255, FinalizeScope::Interior), 1);
    let covered = palette.get(access.block_id(bx + 5, 100, bz + 5));
    assert_eq!(covered.state.get_property("snowy"), Some("true"));
    assert!(palette.get(access.block_id(bx, 100, bz + 5)).is_unfinalized());

    assert_eq!(finalize_chunk(&mut access, &palette, position, 0, 255, FinalizeScope::Edges), 1);
    let bare = palette.get(access.block_id(bx, 100, bz + 5));
    assert_eq!(bare.state.get_property("snowy"), Some("false"));
}
