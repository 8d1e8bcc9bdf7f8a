//! Memory-mapped, zero-copy storage for the impact index.
//!
//! ## Format
//! Every file in a store is a persisted artifact:
//! - a fixed-size header (64 bytes, little-endian)
//! - a payload containing an `rkyv` archived root object
//!
//! The header embeds the schema version, the writing impact version,
//! endianness and pointer-width compatibility checks, a compression flag
//! (whole-payload zstd or none) and a content hash of the payload.
//!
//! A store directory holds one sorted table per partition (`<name>.part`) and
//! a `manifest.bin` that is written last; a directory without a manifest is
//! not a committed store.
//!
//! ## Compatibility limitations
//! `rkyv` archives are not portable across endianness or pointer width, since
//! container lengths are archived as `usize`. Such stores are rejected as
//! incompatible and must be rebuilt.

mod header;
mod persisted;
mod store;
mod write;

pub use header::{ArtifactKind, Compression, StorageHeader, HEADER_LEN};
pub use persisted::{CheckableArchived, PersistedArchive, StorageError};
pub use store::{
    OrderedKv, PartitionEntry, PartitionInfo, PartitionTable, StoreManifest, StoreOptions,
    StoreReader, StoreWriter,
};
pub use write::{write_archive_atomic, WriteArchiveOptions, WriteCompression};
