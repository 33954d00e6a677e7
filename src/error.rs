use crate::chunk::ChunkPosition;
use crate::region::RegionPosition;
use std::io;
use std::path::PathBuf;

/// The ways a single chunk read from a region file can fail.
///
/// None of these are fatal for the region: siblings of a failing chunk keep
/// loading.
#[derive(Debug, thiserror::Error)]
pub enum ReadFailure {
    #[error("Missing header in region file")]
    MissingHeader,
    #[error(
        "Chunk is outside of region file: expected {expected} bytes at offset {offset} but file length is {file_length}"
    )]
    OutOfBounds {
        offset: u64,
        expected: u64,
        file_length: u64,
    },
    #[error("Chunk length {size} does not fit in {capacity} allocated bytes")]
    Oversized { size: i32, capacity: u64 },
    #[error("Invalid chunk size: {0}")]
    InvalidSize(i32),
    #[error("Unknown chunk data compression method: {0}")]
    UnknownCompression(u8),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A failed chunk read, tagged with the chunk it was meant for.
#[derive(Debug, thiserror::Error)]
#[error("Failed to read chunk {position}: {kind}")]
pub struct ChunkReadError {
    pub position: ChunkPosition,
    pub kind: ReadFailure,
}

impl ChunkReadError {
    pub fn new(position: ChunkPosition, kind: ReadFailure) -> Self {
        ChunkReadError { position, kind }
    }
}

/// Errors raised while turning raw chunk bytes into chunk data.
#[derive(Debug, thiserror::Error)]
pub enum ChunkLoadError {
    #[error(transparent)]
    Read(#[from] ChunkReadError),
    #[error("Failed to decompress chunk {position}: {source}")]
    Decompress {
        position: ChunkPosition,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse chunk {position}: {source}")]
    Nbt {
        position: ChunkPosition,
        #[source]
        source: quartz_nbt::io::NbtIoError,
    },
    #[error("Malformed chunk {position}: {reason}")]
    Malformed {
        position: ChunkPosition,
        reason: String,
    },
}

impl ChunkLoadError {
    pub fn position(&self) -> ChunkPosition {
        match self {
            ChunkLoadError::Read(e) => e.position,
            ChunkLoadError::Decompress { position, .. }
            | ChunkLoadError::Nbt { position, .. }
            | ChunkLoadError::Malformed { position, .. } => *position,
        }
    }
}

/// Errors for whole-world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Not a world directory: {0}")]
    NotAWorld(PathBuf),
    #[error("Region {0} has no backing file")]
    MissingRegion(RegionPosition),
    #[error("Invalid loader configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, WorldError>;
