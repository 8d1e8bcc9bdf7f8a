use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use impact_core::Endian;

use crate::persisted::StorageError;

pub const HEADER_LEN: usize = 64;

const MAGIC: [u8; 8] = *b"IMPACTDB";
const HEADER_VERSION: u16 = 1;
const VERSION_FIELD_LEN: usize = 12;

/// The running version as it fits into the header's version field.
pub(crate) fn stored_version() -> String {
    let version = impact_core::IMPACT_VERSION;
    let mut end = version.len().min(VERSION_FIELD_LEN);
    while !version.is_char_boundary(end) {
        end -= 1;
    }
    version[..end].to_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A sorted key/value table holding one store partition.
    Partition,
    /// The store manifest; written last, so its presence marks a committed store.
    StoreManifest,
}

impl ArtifactKind {
    fn as_u16(self) -> u16 {
        match self {
            ArtifactKind::Partition => 1,
            ArtifactKind::StoreManifest => 2,
        }
    }

    fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(ArtifactKind::Partition),
            2 => Some(ArtifactKind::StoreManifest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Zstd,
}

impl Compression {
    fn as_u8(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Zstd => 1,
        }
    }

    fn from_u8(value: u8) -> Result<Self, StorageError> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Zstd),
            other => Err(StorageError::UnsupportedCompression(other)),
        }
    }
}

/// Fixed-size little-endian header preceding every persisted artifact.
///
/// Layout:
/// ```text
///  0..8   magic "IMPACTDB"
///  8..10  header version
/// 10..12  artifact kind
/// 12..16  schema version
/// 16..28  impact version (NUL padded)
/// 28      endian
/// 29      pointer width
/// 30      compression
/// 31      reserved
/// 32..40  payload offset
/// 40..48  payload length (as stored)
/// 48..56  uncompressed payload length
/// 56..64  content hash (first 8 bytes of blake3, little-endian)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHeader {
    pub kind: ArtifactKind,
    pub schema_version: u32,
    pub impact_version: String,
    pub endian: Endian,
    pub pointer_width: u8,
    pub compression: Compression,
    pub payload_offset: u64,
    pub payload_len: u64,
    pub uncompressed_len: u64,
    pub content_hash: u64,
}

impl StorageHeader {
    pub fn new(
        kind: ArtifactKind,
        schema_version: u32,
        compression: Compression,
        payload_len: u64,
        uncompressed_len: u64,
        content_hash: u64,
    ) -> Self {
        Self {
            kind,
            schema_version,
            impact_version: stored_version(),
            endian: impact_core::target_endian(),
            pointer_width: impact_core::target_pointer_width(),
            compression,
            payload_offset: HEADER_LEN as u64,
            payload_len,
            uncompressed_len,
            content_hash,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..8].copy_from_slice(&MAGIC);
        out[8..10].copy_from_slice(&HEADER_VERSION.to_le_bytes());
        out[10..12].copy_from_slice(&self.kind.as_u16().to_le_bytes());
        out[12..16].copy_from_slice(&self.schema_version.to_le_bytes());

        let version = self.impact_version.as_bytes();
        let len = version.len().min(VERSION_FIELD_LEN);
        out[16..16 + len].copy_from_slice(&version[..len]);

        out[28] = self.endian.as_u8();
        out[29] = self.pointer_width;
        out[30] = self.compression.as_u8();

        LittleEndian::write_u64_into(
            &[
                self.payload_offset,
                self.payload_len,
                self.uncompressed_len,
                self.content_hash,
            ],
            &mut out[32..HEADER_LEN],
        );
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < HEADER_LEN {
            return Err(StorageError::Truncated {
                expected: HEADER_LEN,
                found: bytes.len(),
            });
        }
        if bytes[0..8] != MAGIC {
            return Err(StorageError::InvalidHeader("bad magic"));
        }

        let mut cursor = Cursor::new(&bytes[8..16]);
        let header_version = cursor.read_u16::<LittleEndian>()?;
        if header_version != HEADER_VERSION {
            return Err(StorageError::InvalidHeader("unsupported header version"));
        }
        let kind = ArtifactKind::from_u16(cursor.read_u16::<LittleEndian>()?)
            .ok_or(StorageError::InvalidHeader("unknown artifact kind"))?;
        let schema_version = cursor.read_u32::<LittleEndian>()?;

        let version_field = &bytes[16..16 + VERSION_FIELD_LEN];
        let version_len = version_field
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(VERSION_FIELD_LEN);
        let impact_version = std::str::from_utf8(&version_field[..version_len])
            .map_err(|_| StorageError::InvalidHeader("version is not UTF-8"))?
            .to_owned();

        let endian =
            Endian::from_u8(bytes[28]).ok_or(StorageError::InvalidHeader("unknown endian tag"))?;
        let pointer_width = bytes[29];
        let compression = Compression::from_u8(bytes[30])?;

        let mut tail = Cursor::new(&bytes[32..HEADER_LEN]);
        let payload_offset = tail.read_u64::<LittleEndian>()?;
        let payload_len = tail.read_u64::<LittleEndian>()?;
        let uncompressed_len = tail.read_u64::<LittleEndian>()?;
        let content_hash = tail.read_u64::<LittleEndian>()?;

        Ok(Self {
            kind,
            schema_version,
            impact_version,
            endian,
            pointer_width,
            compression,
            payload_offset,
            payload_len,
            uncompressed_len,
            content_hash,
        })
    }
}
