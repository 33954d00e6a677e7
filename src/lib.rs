//! Storage and compatibility layer for voxel world saves.
//!
//! Reads region files (classic and cubic chunks), decodes chunk documents
//! into a shared block palette, translates pre-flattening block ids and
//! resolves neighbor-dependent blocks in a finalization pass.

pub mod block;
pub mod block_spec;
pub mod chunk;
pub mod config;
pub mod error;
pub mod finalize;
pub mod legacy;
pub mod loader;
pub mod nbt;
pub mod palette;
pub mod region;
pub mod world;

pub use block::{Block, BlockKind};
pub use block_spec::{BlockSpec, BlockState, LegacySpec};
pub use chunk::{ChunkData, ChunkPosition, ChunkVersion, DenseChunkData, SectionedChunkData};
pub use config::LoaderConfig;
pub use error::{ChunkLoadError, ChunkReadError, ReadFailure, WorldError};
pub use finalize::{BlockAccess, FinalizationState, FinalizeScope};
pub use loader::{MapView, RegionQueue, WorldMapLoader};
pub use palette::{BiomePalette, BlockId, BlockPalette, AIR_ID, STONE_ID};
pub use region::{Region, RegionFile, RegionPosition};
pub use world::{ChunkGrid, LoadedChunk, World, WorldFormat, WorldListener};

/// Install a `tracing` subscriber filtered by `RUST_LOG`. Safe to call more
/// than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
