use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use impact_core::Endian;
use memmap2::{Mmap, MmapOptions};
use thiserror::Error;

use crate::header::{stored_version, ArtifactKind, Compression, StorageHeader, HEADER_LEN};

/// Trait alias for archived roots that can be validated with `rkyv`.
pub trait CheckableArchived:
    for<'a> rkyv::bytecheck::CheckBytes<rkyv::validation::validators::DefaultValidator<'a>>
{
}

impl<T> CheckableArchived for T where
    T: for<'a> rkyv::bytecheck::CheckBytes<rkyv::validation::validators::DefaultValidator<'a>>
{
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),
    #[error("incompatible artifact kind: expected {expected:?}, found {found:?}")]
    WrongArtifact {
        expected: ArtifactKind,
        found: ArtifactKind,
    },
    #[error("incompatible schema version: expected {expected}, found {found}")]
    WrongSchema { expected: u32, found: u32 },
    #[error("incompatible impact version: expected {expected}, found {found}")]
    WrongImpactVersion { expected: String, found: String },
    #[error("incompatible target endian: expected {expected:?}, found {found:?}")]
    WrongEndian { expected: Endian, found: Endian },
    #[error("incompatible pointer width: expected {expected}, found {found}")]
    WrongPointerWidth { expected: u8, found: u8 },
    #[error("truncated file: expected at least {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("invalid payload alignment: required {required} bytes, got {got}")]
    Misaligned { required: usize, got: usize },
    #[error("archive validation failed: {0}")]
    Validation(String),
    #[error("decompression failed: {0}")]
    Decompression(String),
    #[error("unsupported compression tag {0}")]
    UnsupportedCompression(u8),
    #[error("payload size {payload_len} does not fit into addressable memory")]
    OversizedPayload { payload_len: u64 },
    #[error("payload hash mismatch: expected {expected}, found {found}")]
    HashMismatch { expected: u64, found: u64 },
    #[error("unknown partition `{0}`")]
    UnknownPartition(String),
    #[error("{} holds files that do not belong to an impact store, refusing to overwrite it", .0.display())]
    NotAStore(PathBuf),
    #[error("no committed store at {} (run a build first)", .0.display())]
    MissingStore(PathBuf),
}

enum Backing {
    Mmap {
        mmap: Mmap,
        payload_offset: usize,
        payload_len: usize,
    },
    Owned(rkyv::util::AlignedVec),
}

impl Backing {
    fn payload(&self) -> &[u8] {
        match self {
            Backing::Mmap {
                mmap,
                payload_offset,
                payload_len,
            } => &mmap[*payload_offset..*payload_offset + *payload_len],
            Backing::Owned(bytes) => bytes.as_slice(),
        }
    }
}

/// A validated, read-only `rkyv` archive loaded from disk.
///
/// Uncompressed payloads are served straight from an mmap; zstd payloads are
/// decompressed once into an aligned buffer.
pub struct PersistedArchive<T>
where
    T: rkyv::Archive,
{
    header: StorageHeader,
    backing: Backing,
    archived: NonNull<rkyv::Archived<T>>,
    _marker: PhantomData<T>,
}

impl<T> std::fmt::Debug for PersistedArchive<T>
where
    T: rkyv::Archive,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedArchive")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl<T> PersistedArchive<T>
where
    T: rkyv::Archive,
    rkyv::Archived<T>: CheckableArchived,
{
    pub fn header(&self) -> &StorageHeader {
        &self.header
    }

    pub fn archived(&self) -> &rkyv::Archived<T> {
        // Safety: `archived` was produced by `rkyv::check_archived_root` over
        // `backing`, which lives as long as `self` and is never mutated.
        unsafe { self.archived.as_ref() }
    }

    pub fn open(
        path: &Path,
        expected_kind: ArtifactKind,
        expected_schema: u32,
    ) -> Result<Self, StorageError> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len() as usize;
        if file_len < HEADER_LEN {
            return Err(StorageError::Truncated {
                expected: HEADER_LEN,
                found: file_len,
            });
        }

        // mmap is the fast path. If it fails, fall back to reading the file.
        let (header, backing) = match unsafe { MmapOptions::new().map(&file) } {
            Ok(mmap) => {
                let header = checked_header(&mmap, expected_kind, expected_schema)?;
                let offset = header.payload_offset as usize;
                let len = header.payload_len as usize;
                let backing = match header.compression {
                    Compression::None => Backing::Mmap {
                        mmap,
                        payload_offset: offset,
                        payload_len: len,
                    },
                    Compression::Zstd => Backing::Owned(aligned_bytes(&decompress(
                        &mmap[offset..offset + len],
                        header.uncompressed_len,
                    )?)),
                };
                (header, backing)
            }
            Err(err) => {
                tracing::debug!(
                    target: "impact.storage",
                    path = %path.display(),
                    error = %err,
                    "mmap failed; reading file into memory"
                );
                let bytes = std::fs::read(path)?;
                let header = checked_header(&bytes, expected_kind, expected_schema)?;
                let offset = header.payload_offset as usize;
                let payload = &bytes[offset..offset + header.payload_len as usize];
                let backing = match header.compression {
                    Compression::None => Backing::Owned(aligned_bytes(payload)),
                    Compression::Zstd => Backing::Owned(aligned_bytes(&decompress(
                        payload,
                        header.uncompressed_len,
                    )?)),
                };
                (header, backing)
            }
        };

        Self::from_backing(header, backing)
    }

    fn from_backing(header: StorageHeader, backing: Backing) -> Result<Self, StorageError> {
        let payload = backing.payload();

        let required = std::mem::align_of::<rkyv::Archived<T>>();
        let got = payload.as_ptr() as usize;
        if got % required != 0 {
            return Err(StorageError::Misaligned { required, got });
        }

        let found = content_hash(payload);
        if found != header.content_hash {
            return Err(StorageError::HashMismatch {
                expected: header.content_hash,
                found,
            });
        }

        let archived = rkyv::check_archived_root::<T>(payload)
            .map_err(|e| StorageError::Validation(e.to_string()))?;
        let archived = NonNull::from(archived);

        Ok(Self {
            header,
            backing,
            archived,
            _marker: PhantomData,
        })
    }
}

// Safety: `PersistedArchive` only hands out shared references into an
// immutable mmap or buffer owned by `self`.
unsafe impl<T> Send for PersistedArchive<T>
where
    T: rkyv::Archive,
    rkyv::Archived<T>: Sync,
{
}

unsafe impl<T> Sync for PersistedArchive<T>
where
    T: rkyv::Archive,
    rkyv::Archived<T>: Sync,
{
}

/// Decodes the header of `file` and checks it against what the caller expects
/// and against the running target, then checks the payload fits in the file.
fn checked_header(
    file: &[u8],
    expected_kind: ArtifactKind,
    expected_schema: u32,
) -> Result<StorageHeader, StorageError> {
    let header = StorageHeader::decode(file)?;

    if header.kind != expected_kind {
        return Err(StorageError::WrongArtifact {
            expected: expected_kind,
            found: header.kind,
        });
    }
    if header.schema_version != expected_schema {
        return Err(StorageError::WrongSchema {
            expected: expected_schema,
            found: header.schema_version,
        });
    }
    let expected_version = stored_version();
    if header.impact_version != expected_version {
        return Err(StorageError::WrongImpactVersion {
            expected: expected_version,
            found: header.impact_version,
        });
    }
    let expected_endian = impact_core::target_endian();
    if header.endian != expected_endian {
        return Err(StorageError::WrongEndian {
            expected: expected_endian,
            found: header.endian,
        });
    }
    let expected_pointer_width = impact_core::target_pointer_width();
    if header.pointer_width != expected_pointer_width {
        return Err(StorageError::WrongPointerWidth {
            expected: expected_pointer_width,
            found: header.pointer_width,
        });
    }
    if header.payload_offset as usize != HEADER_LEN {
        return Err(StorageError::InvalidHeader("unexpected payload offset"));
    }

    let end = (HEADER_LEN as u64)
        .checked_add(header.payload_len)
        .ok_or(StorageError::InvalidHeader("payload length overflow"))?;
    if (file.len() as u64) < end {
        return Err(StorageError::Truncated {
            expected: end as usize,
            found: file.len(),
        });
    }

    Ok(header)
}

fn decompress(payload: &[u8], uncompressed_len: u64) -> Result<Vec<u8>, StorageError> {
    let len: usize = uncompressed_len
        .try_into()
        .map_err(|_| StorageError::OversizedPayload {
            payload_len: uncompressed_len,
        })?;
    zstd::bulk::decompress(payload, len).map_err(|e| StorageError::Decompression(e.to_string()))
}

fn aligned_bytes(bytes: &[u8]) -> rkyv::util::AlignedVec {
    let mut aligned = rkyv::util::AlignedVec::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    aligned
}

pub(crate) fn content_hash(payload: &[u8]) -> u64 {
    let hash_bytes = blake3::hash(payload);
    let mut first = [0u8; 8];
    first.copy_from_slice(&hash_bytes.as_bytes()[..8]);
    u64::from_le_bytes(first)
}
