//! Byte-level access to `.mca` region files.
//!
//! Layout: a 4096-byte location table (one big-endian `u32` per chunk, the
//! sector offset in the high 24 bits and the sector count in the low 8), a
//! 4096-byte timestamp table, then chunk payloads aligned to 4096-byte
//! sectors. A payload is a `u32` length, a compression byte and `length - 1`
//! bytes of compressed tag data.
//!
//! Every operation opens and closes the file itself, so the game may rewrite
//! it between calls.

use super::modified_millis;
use crate::chunk::ChunkPosition;
use crate::error::{ChunkLoadError, ChunkReadError, ReadFailure};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use quartz_nbt::io::Flavor;
use quartz_nbt::NbtCompound;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const SECTOR_SIZE: u64 = 4096;
pub const HEADER_SIZE: u64 = 2 * SECTOR_SIZE;
pub const CHUNK_COUNT: usize = 1024;
/// The sector count of a location entry is a single byte.
pub const MAX_CHUNK_SECTORS: u64 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip = 1,
    Zlib = 2,
}

impl Compression {
    pub fn from_byte(b: u8) -> Result<Self, ReadFailure> {
        match b {
            1 => Ok(Compression::Gzip),
            2 => Ok(Compression::Zlib),
            other => Err(ReadFailure::UnknownCompression(other)),
        }
    }
}

/// The two header tables of a region file.
#[derive(Debug, Clone)]
pub struct RegionHeader {
    pub locations: Vec<u32>,
    pub timestamps: Vec<i32>,
}

impl RegionHeader {
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut locations = vec![0u32; CHUNK_COUNT];
        reader.read_u32_into::<BigEndian>(&mut locations)?;
        let mut timestamps = vec![0i32; CHUNK_COUNT];
        reader.read_i32_into::<BigEndian>(&mut timestamps)?;
        Ok(RegionHeader {
            locations,
            timestamps,
        })
    }

    pub fn is_present(&self, index: usize) -> bool {
        self.locations[index] != 0
    }

    pub fn sector_offset(&self, index: usize) -> u64 {
        (self.locations[index] >> 8) as u64
    }

    pub fn sector_count(&self, index: usize) -> u64 {
        (self.locations[index] & 0xFF) as u64
    }
}

/// Compressed chunk bytes as stored in the region file.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub compression: Compression,
    pub data: Vec<u8>,
    pub timestamp: i32,
}

impl ChunkPayload {
    pub fn decompress(&self) -> io::Result<Vec<u8>> {
        let mut decompressed = Vec::new();
        match self.compression {
            Compression::Gzip => GzDecoder::new(&self.data[..]).read_to_end(&mut decompressed)?,
            Compression::Zlib => {
                ZlibDecoder::new(&self.data[..]).read_to_end(&mut decompressed)?
            }
        };
        Ok(decompressed)
    }

    /// Decompress and parse the payload into a tag document.
    pub fn to_tag(&self, position: ChunkPosition) -> Result<NbtCompound, ChunkLoadError> {
        let decompressed = self
            .decompress()
            .map_err(|source| ChunkLoadError::Decompress { position, source })?;
        let (tag, _) =
            quartz_nbt::io::read_nbt(&mut Cursor::new(&decompressed), Flavor::Uncompressed)
                .map_err(|source| ChunkLoadError::Nbt { position, source })?;
        Ok(tag)
    }
}

#[derive(Debug, Clone)]
pub struct RegionFile {
    path: PathBuf,
}

impl RegionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RegionFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Modification time in milliseconds, `None` if the file is missing.
    pub fn modified(&self) -> Option<i64> {
        modified_millis(&self.path)
    }

    /// Read both header tables. `Ok(None)` when the file is shorter than the
    /// header.
    pub fn read_header(&self) -> io::Result<Option<RegionHeader>> {
        let mut file = File::open(&self.path)?;
        if file.metadata()?.len() < HEADER_SIZE {
            return Ok(None);
        }
        RegionHeader::read(&mut file).map(Some)
    }

    /// Read the compressed payload of one chunk.
    ///
    /// Returns `Ok(None)` when the chunk has no location entry or the file
    /// disappeared before it could be opened.
    pub fn read_chunk(
        &self,
        position: ChunkPosition,
    ) -> Result<Option<ChunkPayload>, ChunkReadError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ChunkReadError::new(position, e.into())),
        };
        read_payload(&mut file, position.region_index())
            .map_err(|kind| ChunkReadError::new(position, kind))
    }

    /// Read and parse one chunk, returning the tag and its timestamp.
    pub fn read_chunk_tag(
        &self,
        position: ChunkPosition,
    ) -> Result<Option<(NbtCompound, i32)>, ChunkLoadError> {
        match self.read_chunk(position)? {
            Some(payload) => Ok(Some((payload.to_tag(position)?, payload.timestamp))),
            None => Ok(None),
        }
    }

    /// Zero the chunk's location entry. The sectors are left in place.
    pub fn delete_chunk(&self, position: ChunkPosition) -> io::Result<()> {
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        if file.metadata()?.len() < HEADER_SIZE {
            tracing::warn!("Missing header in region file {}", self.path.display());
            return Ok(());
        }
        file.seek(SeekFrom::Start(4 * position.region_index() as u64))?;
        file.write_u32::<BigEndian>(0)?;
        Ok(())
    }

    /// Store a chunk, zlib-compressed. The chunk's current sectors are reused
    /// when the new payload fits; otherwise it is appended at the end of the
    /// file. Creates the file with an empty header if needed.
    pub fn write_chunk(
        &self,
        position: ChunkPosition,
        tag: &NbtCompound,
        timestamp: i32,
    ) -> io::Result<()> {
        let mut nbt_bytes = Vec::new();
        quartz_nbt::io::write_nbt(&mut nbt_bytes, None, tag, Flavor::Uncompressed)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&nbt_bytes)?;
        let compressed = encoder.finish()?;

        // Length prefix and compression byte.
        let total = compressed.len() as u64 + 5;
        let sectors = total.div_ceil(SECTOR_SIZE);
        if sectors > MAX_CHUNK_SECTORS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("chunk {} needs {} sectors", position, sectors),
            ));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        let length = file.metadata()?.len();
        if length < HEADER_SIZE {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&[0u8; HEADER_SIZE as usize])?;
        }
        let length = length.max(HEADER_SIZE);

        let index = position.region_index() as u64;
        file.seek(SeekFrom::Start(4 * index))?;
        let location = file.read_u32::<BigEndian>()?;
        let (old_offset, old_count) = ((location >> 8) as u64, (location & 0xFF) as u64);
        let offset = if location != 0 && old_offset >= 2 && sectors <= old_count {
            old_offset
        } else {
            length.div_ceil(SECTOR_SIZE).max(2)
        };

        file.seek(SeekFrom::Start(offset * SECTOR_SIZE))?;
        file.write_u32::<BigEndian>(compressed.len() as u32 + 1)?;
        file.write_u8(Compression::Zlib as u8)?;
        file.write_all(&compressed)?;
        let padding = sectors * SECTOR_SIZE - total;
        file.write_all(&vec![0u8; padding as usize])?;

        file.seek(SeekFrom::Start(4 * index))?;
        file.write_u32::<BigEndian>(((offset as u32) << 8) | sectors as u32)?;
        file.seek(SeekFrom::Start(SECTOR_SIZE + 4 * index))?;
        file.write_i32::<BigEndian>(timestamp)?;
        Ok(())
    }

    /// Write a copy of this region to `dest` holding only the chunks whose
    /// slot index passes `keep`, packed from sector 2 with no gaps.
    /// Timestamps are copied unchanged.
    pub fn write_compacted(&self, dest: &Path, keep: impl Fn(usize) -> bool) -> io::Result<()> {
        let mut source = File::open(&self.path)?;
        let length = source.metadata()?.len();
        if length < HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("missing header in region file {}", self.path.display()),
            ));
        }
        let header = RegionHeader::read(&mut source)?;

        let mut locations = vec![0u32; CHUNK_COUNT];
        let mut next_free: u64 = 2;
        for (index, location) in locations.iter_mut().enumerate() {
            if !header.is_present(index) || !keep(index) {
                continue;
            }
            let (offset, count) = (header.sector_offset(index), header.sector_count(index));
            if (offset + count) * SECTOR_SIZE > length {
                tracing::warn!(
                    "Skipping chunk slot {} of {}: sectors past end of file",
                    index,
                    self.path.display()
                );
                continue;
            }
            *location = ((next_free as u32) << 8) | count as u32;
            next_free += count;
        }

        let mut out = io::BufWriter::new(File::create(dest)?);
        for location in &locations {
            out.write_u32::<BigEndian>(*location)?;
        }
        for timestamp in &header.timestamps {
            out.write_i32::<BigEndian>(*timestamp)?;
        }
        let mut buffer = vec![0u8; SECTOR_SIZE as usize];
        for (index, location) in locations.iter().enumerate() {
            if *location == 0 {
                continue;
            }
            source.seek(SeekFrom::Start(header.sector_offset(index) * SECTOR_SIZE))?;
            for _ in 0..header.sector_count(index) {
                source.read_exact(&mut buffer)?;
                out.write_all(&buffer)?;
            }
        }
        out.flush()
    }
}

fn read_payload<F: Read + Seek>(
    file: &mut F,
    index: usize,
) -> Result<Option<ChunkPayload>, ReadFailure> {
    let length = file.seek(SeekFrom::End(0))?;
    if length < HEADER_SIZE {
        return Err(ReadFailure::MissingHeader);
    }

    file.seek(SeekFrom::Start(4 * index as u64))?;
    let location = file.read_u32::<BigEndian>()?;
    if location == 0 {
        return Ok(None);
    }
    let sector_count = (location & 0xFF) as u64;
    let file_offset = (location >> 8) as u64 * SECTOR_SIZE;

    file.seek(SeekFrom::Start(SECTOR_SIZE + 4 * index as u64))?;
    let timestamp = file.read_i32::<BigEndian>()?;

    if file_offset + 4 >= length {
        return Err(ReadFailure::OutOfBounds {
            offset: file_offset,
            expected: 4,
            file_length: length,
        });
    }
    file.seek(SeekFrom::Start(file_offset))?;
    let size = file.read_i32::<BigEndian>()?;

    let capacity = sector_count * SECTOR_SIZE;
    if size as i64 > capacity as i64 {
        return Err(ReadFailure::Oversized { size, capacity });
    }
    if (length as i64) < file_offset as i64 + 4 + size as i64 {
        return Err(ReadFailure::OutOfBounds {
            offset: file_offset,
            expected: size as u64,
            file_length: length,
        });
    }
    if size <= 0 {
        return Err(ReadFailure::InvalidSize(size));
    }

    let compression = Compression::from_byte(file.read_u8()?)?;
    let mut data = vec![0u8; size as usize - 1];
    file.read_exact(&mut data)?;
    Ok(Some(ChunkPayload {
        compression,
        data,
        timestamp,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(index: usize, location: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_SIZE as usize];
        bytes[index * 4..index * 4 + 4].copy_from_slice(&location.to_be_bytes());
        bytes
    }

    #[test]
    fn test_short_file_has_no_header() {
        let mut cursor = Cursor::new(vec![0u8; 100]);
        assert!(matches!(
            read_payload(&mut cursor, 0),
            Err(ReadFailure::MissingHeader)
        ));
    }

    #[test]
    fn test_empty_location_is_absent() {
        let mut cursor = Cursor::new(vec![0u8; HEADER_SIZE as usize]);
        assert!(read_payload(&mut cursor, 7).unwrap().is_none());
    }

    #[test]
    fn test_location_past_end() {
        let mut cursor = Cursor::new(header_with(0, (5 << 8) | 1));
        match read_payload(&mut cursor, 0) {
            Err(ReadFailure::OutOfBounds {
                offset,
                expected,
                file_length,
            }) => {
                assert_eq!(offset, 5 * SECTOR_SIZE);
                assert_eq!(expected, 4);
                assert_eq!(file_length, HEADER_SIZE);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_size_checks() {
        let mut bytes = header_with(0, (2 << 8) | 1);
        bytes.extend_from_slice(&[0u8; SECTOR_SIZE as usize]);
        let at = HEADER_SIZE as usize;

        bytes[at..at + 4].copy_from_slice(&5000i32.to_be_bytes());
        assert!(matches!(
            read_payload(&mut Cursor::new(bytes.clone()), 0),
            Err(ReadFailure::Oversized { size: 5000, capacity: 4096 })
        ));

        bytes[at..at + 4].copy_from_slice(&0i32.to_be_bytes());
        assert!(matches!(
            read_payload(&mut Cursor::new(bytes.clone()), 0),
            Err(ReadFailure::InvalidSize(0))
        ));

        bytes[at..at + 4].copy_from_slice(&3i32.to_be_bytes());
        bytes[at + 4] = 9;
        assert!(matches!(
            read_payload(&mut Cursor::new(bytes.clone()), 0),
            Err(ReadFailure::UnknownCompression(9))
        ));

        bytes[at + 4] = 2;
        bytes[at + 5] = 0xAB;
        bytes[at + 6] = 0xCD;
        bytes[SECTOR_SIZE as usize..SECTOR_SIZE as usize + 4]
            .copy_from_slice(&77i32.to_be_bytes());
        let payload = read_payload(&mut Cursor::new(bytes), 0).unwrap().unwrap();
        assert_eq!(payload.compression, Compression::Zlib);
        assert_eq!(payload.data, vec![0xAB, 0xCD]);
        assert_eq!(payload.timestamp, 77);
    }
}
