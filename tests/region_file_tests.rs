use quartz_nbt::NbtCompound;
use strata::nbt::{byte_array, CompoundExt};
use strata::region::file::{HEADER_SIZE, SECTOR_SIZE};
use strata::{ChunkPosition, ReadFailure, RegionFile};

fn chunk_tag(marker: i32) -> NbtCompound {
    let mut tag = NbtCompound::new();
    tag.insert("DataVersion", 3700i32);
    tag.insert("Marker", marker);
    tag
}

fn big_chunk_tag(bytes: usize) -> NbtCompound {
    let mut tag = chunk_tag(0);
    // Pseudo-random bytes so zlib cannot shrink them much.
    let mut seed = 12345u32;
    let data: Vec<i8> = (0..bytes)
        .map(|_| {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            (seed >> 16) as i8
        })
        .collect();
    tag.insert("Blob", quartz_nbt::NbtTag::ByteArray(data));
    tag
}

#[test]
fn test_location_past_eof_is_out_of_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("r.0.0.mca");
    let mut bytes = vec![0u8; HEADER_SIZE as usize];
    // Chunk 3 claims sector 10 of a two-sector file.
    bytes[12..16].copy_from_slice(&((10u32 << 8) | 1).to_be_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let file = RegionFile::new(&path);
    let err = file.read_chunk(ChunkPosition::new(3, 0)).unwrap_err();
    assert_eq!(err.position, ChunkPosition::new(3, 0));
    assert!(matches!(err.kind, ReadFailure::OutOfBounds { .. }));
    assert!(file.read_chunk(ChunkPosition::new(4, 0)).unwrap().is_none());
}

#[test]
fn test_single_sector_file_has_missing_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("r.0.0.mca");
    std::fs::write(&path, vec![0u8; SECTOR_SIZE as usize]).unwrap();

    let file = RegionFile::new(&path);
    for (x, z) in [(0, 0), (31, 31), (5, 17)] {
        let err = file.read_chunk(ChunkPosition::new(x, z)).unwrap_err();
        assert!(matches!(err.kind, ReadFailure::MissingHeader));
    }
    assert!(file.read_header().unwrap().is_none());
}

#[test]
fn test_missing_file_reads_as_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let file = RegionFile::new(dir.path().join("r.9.9.mca"));
    assert!(!file.exists());
    assert!(file.read_chunk(ChunkPosition::new(288, 288)).unwrap().is_none());
}

#[test]
fn test_delete_zeroes_only_its_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("r.0.0.mca");
    let file = RegionFile::new(&path);
    for x in 0..4 {
        file.write_chunk(ChunkPosition::new(x, 0), &chunk_tag(x), 100 + x).unwrap();
    }
    let before = std::fs::read(&path).unwrap();

    file.delete_chunk(ChunkPosition::new(2, 0)).unwrap();
    let after = std::fs::read(&path).unwrap();

    assert_eq!(before.len(), after.len());
    assert_eq!(&after[8..12], &[0, 0, 0, 0]);
    assert_ne!(&before[8..12], &[0, 0, 0, 0]);
    assert_eq!(&before[..8], &after[..8]);
    assert_eq!(&before[12..], &after[12..]);

    assert!(file.read_chunk(ChunkPosition::new(2, 0)).unwrap().is_none());
    let (tag, timestamp) = file.read_chunk_tag(ChunkPosition::new(3, 0)).unwrap().unwrap();
    assert_eq!(tag.get::<_, i32>("Marker").unwrap(), 3);
    assert_eq!(timestamp, 103);
}

#[test]
fn test_rewrite_reuses_or_appends_sectors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("r.0.0.mca");
    let file = RegionFile::new(&path);
    let pos = ChunkPosition::new(0, 0);

    file.write_chunk(pos, &chunk_tag(1), 1).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 3 * SECTOR_SIZE);
    let header = file.read_header().unwrap().unwrap();
    assert_eq!(header.sector_offset(0), 2);
    assert_eq!(header.sector_count(0), 1);

    // Still fits in one sector.
    file.write_chunk(pos, &chunk_tag(2), 2).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 3 * SECTOR_SIZE);

    // Needs more sectors than it has, so it moves to the end.
    file.write_chunk(pos, &big_chunk_tag(10_000), 3).unwrap();
    let header = file.read_header().unwrap().unwrap();
    assert_eq!(header.sector_offset(0), 3);
    assert!(header.sector_count(0) >= 3);
    assert_eq!(header.timestamps[0], 3);

    let (tag, _) = file.read_chunk_tag(pos).unwrap().unwrap();
    assert_eq!(byte_array(tag.tag("Blob")).unwrap().len(), 10_000);
}

#[test]
fn test_compacted_copy_keeps_selected_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let source = RegionFile::new(dir.path().join("r.0.0.mca"));
    for x in 0..3 {
        source.write_chunk(ChunkPosition::new(x, 0), &chunk_tag(x), 50 + x).unwrap();
    }
    source.write_chunk(ChunkPosition::new(0, 0), &big_chunk_tag(10_000), 60).unwrap();

    let dest_path = dir.path().join("compact.mca");
    source.write_compacted(&dest_path, |index| index != 1).unwrap();
    let dest = RegionFile::new(&dest_path);

    let header = dest.read_header().unwrap().unwrap();
    assert!(!header.is_present(1));
    assert_eq!(header.timestamps[1], 51);
    assert_eq!(header.sector_offset(0), 2);
    assert_eq!(header.sector_offset(2), 2 + header.sector_count(0));

    let expected_len = (2 + header.sector_count(0) + header.sector_count(2)) * SECTOR_SIZE;
    assert_eq!(std::fs::metadata(&dest_path).unwrap().len(), expected_len);

    let (tag, ts) = dest.read_chunk_tag(ChunkPosition::new(2, 0)).unwrap().unwrap();
    assert_eq!(tag.get::<_, i32>("Marker").unwrap(), 2);
    assert_eq!(ts, 52);
    assert!(dest.read_chunk(ChunkPosition::new(1, 0)).unwrap().is_none());
}
