use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use crate::header::ArtifactKind;
use crate::persisted::{PersistedArchive, StorageError};
use crate::write::{write_archive_atomic, WriteArchiveOptions, WriteCompression};

const MANIFEST_FILE: &str = "manifest.bin";
const PARTITION_EXTENSION: &str = "part";

/// One key/value pair of a persisted partition.
#[derive(Debug, Clone, PartialEq, Eq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[archive(check_bytes)]
pub struct PartitionEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// A partition persisted as a single table with entries sorted by key.
#[derive(Debug, Clone, PartialEq, Eq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[archive(check_bytes)]
pub struct PartitionTable {
    pub entries: Vec<PartitionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[archive(check_bytes)]
pub struct PartitionInfo {
    pub name: String,
    pub entries: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[archive(check_bytes)]
pub struct StoreManifest {
    pub schema_version: u32,
    pub partitions: Vec<PartitionInfo>,
}

/// Ordered prefix lookups over named partitions.
///
/// Implemented by both the in-memory [`StoreWriter`] and the persisted
/// [`StoreReader`], so callers can query whichever one they hold.
pub trait OrderedKv {
    /// Returns every `(key, value)` in `partition` whose key starts with
    /// `prefix`, in ascending byte order of the key.
    fn scan<'a>(
        &'a self,
        partition: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = (&'a [u8], &'a [u8])> + 'a>, StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreOptions {
    pub compression: WriteCompression,
    /// `fsync` each file as it is committed.
    pub sync: bool,
}

/// Buffers a fresh store in memory and persists it on [`StoreWriter::commit`].
///
/// The target directory must be missing or hold nothing but store files:
/// a committed store, or the remains of an interrupted commit or discard.
/// Those are deleted as soon as the writer is created. A directory holding
/// any other entry is refused so a misconfigured path never clobbers
/// unrelated files.
#[derive(Debug)]
pub struct StoreWriter {
    dir: PathBuf,
    schema_version: u32,
    options: StoreOptions,
    partitions: BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl StoreWriter {
    pub fn create(
        dir: &Path,
        schema_version: u32,
        partitions: &[&str],
        options: StoreOptions,
    ) -> Result<Self, StorageError> {
        if dir.exists() {
            discard_store(dir)?;
        } else {
            fs::create_dir_all(dir)?;
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            schema_version,
            options,
            partitions: partitions
                .iter()
                .map(|name| ((*name).to_owned(), BTreeMap::new()))
                .collect(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Inserts `key` into `partition`. Re-inserting an existing key replaces
    /// its value.
    pub fn put(&mut self, partition: &str, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError> {
        let table = self
            .partitions
            .get_mut(partition)
            .ok_or_else(|| StorageError::UnknownPartition(partition.to_owned()))?;
        table.insert(key, value);
        Ok(())
    }

    pub fn len(&self, partition: &str) -> Result<usize, StorageError> {
        self.partitions
            .get(partition)
            .map(BTreeMap::len)
            .ok_or_else(|| StorageError::UnknownPartition(partition.to_owned()))
    }

    /// Writes every partition and then the manifest. Returns the number of
    /// bytes written.
    pub fn commit(self) -> Result<u64, StorageError> {
        let manifest_path = self.dir.join(MANIFEST_FILE);
        let write_options = WriteArchiveOptions {
            compression: self.options.compression,
            validate_after_write: false,
            sync: self.options.sync,
        };

        let mut written = 0u64;
        let mut infos = Vec::with_capacity(self.partitions.len());
        for (name, entries) in self.partitions {
            let table = PartitionTable {
                entries: entries
                    .into_iter()
                    .map(|(key, value)| PartitionEntry { key, value })
                    .collect(),
            };
            let path = partition_path(&self.dir, &name);
            written += write_archive_atomic(
                &path,
                ArtifactKind::Partition,
                self.schema_version,
                &table,
                write_options,
            )?;
            tracing::debug!(
                target: "impact.storage",
                partition = %name,
                entries = table.entries.len(),
                "wrote partition"
            );
            infos.push(PartitionInfo {
                name,
                entries: table.entries.len() as u64,
            });
        }

        let manifest = StoreManifest {
            schema_version: self.schema_version,
            partitions: infos,
        };
        written += write_archive_atomic(
            &manifest_path,
            ArtifactKind::StoreManifest,
            self.schema_version,
            &manifest,
            write_options,
        )?;
        tracing::debug!(
            target: "impact.storage",
            dir = %self.dir.display(),
            bytes = written,
            "committed store"
        );
        Ok(written)
    }
}

impl OrderedKv for StoreWriter {
    fn scan<'a>(
        &'a self,
        partition: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = (&'a [u8], &'a [u8])> + 'a>, StorageError> {
        let table = self
            .partitions
            .get(partition)
            .ok_or_else(|| StorageError::UnknownPartition(partition.to_owned()))?;
        let range = table.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded));
        let prefix = prefix.to_vec();
        let iter = range
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| (key.as_slice(), value.as_slice()));
        Ok(Box::new(iter))
    }
}

/// A committed store opened for reading. Partitions are memory mapped.
pub struct StoreReader {
    dir: PathBuf,
    partitions: BTreeMap<String, PersistedArchive<PartitionTable>>,
}

impl std::fmt::Debug for StoreReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreReader")
            .field("dir", &self.dir)
            .field("partitions", &self.partitions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StoreReader {
    pub fn open(dir: &Path, schema_version: u32) -> Result<Self, StorageError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(StorageError::MissingStore(dir.to_path_buf()));
        }
        let manifest = PersistedArchive::<StoreManifest>::open(
            &manifest_path,
            ArtifactKind::StoreManifest,
            schema_version,
        )?;

        let mut partitions = BTreeMap::new();
        for info in manifest.archived().partitions.iter() {
            let name = info.name.as_str();
            let table = PersistedArchive::<PartitionTable>::open(
                &partition_path(dir, name),
                ArtifactKind::Partition,
                schema_version,
            )?;
            let expected = u64::from(info.entries);
            if table.archived().entries.len() as u64 != expected {
                return Err(StorageError::Validation(format!(
                    "partition `{name}` holds {} entries, manifest says {expected}",
                    table.archived().entries.len()
                )));
            }
            partitions.insert(name.to_owned(), table);
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            partitions,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }

    pub fn len(&self, partition: &str) -> Result<usize, StorageError> {
        Ok(self.table(partition)?.entries.len())
    }

    fn table(&self, partition: &str) -> Result<&ArchivedPartitionTable, StorageError> {
        self.partitions
            .get(partition)
            .map(PersistedArchive::archived)
            .ok_or_else(|| StorageError::UnknownPartition(partition.to_owned()))
    }
}

impl OrderedKv for StoreReader {
    fn scan<'a>(
        &'a self,
        partition: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = (&'a [u8], &'a [u8])> + 'a>, StorageError> {
        let entries = self.table(partition)?.entries.as_slice();
        let start = entries.partition_point(|entry| entry.key.as_slice() < prefix);
        let prefix = prefix.to_vec();
        let iter = entries[start..]
            .iter()
            .take_while(move |entry| entry.key.as_slice().starts_with(&prefix))
            .map(|entry| (entry.key.as_slice(), entry.value.as_slice()));
        Ok(Box::new(iter))
    }
}

/// Removes every store file in `dir`, the manifest first.
///
/// A store that is only partly removed is never mistaken for a committed one.
/// Nothing is removed if `dir` holds an entry that is not a store file.
fn discard_store(dir: &Path) -> Result<(), StorageError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_store_file = entry.file_type()?.is_file()
            && entry.file_name().to_str().is_some_and(is_store_file_name);
        if !is_store_file {
            return Err(StorageError::NotAStore(dir.to_path_buf()));
        }
        files.push(entry.path());
    }
    if files.is_empty() {
        return Ok(());
    }

    let manifest = dir.join(MANIFEST_FILE);
    if manifest.is_file() {
        fs::remove_file(&manifest)?;
    }
    for path in files.iter().filter(|path| **path != manifest) {
        fs::remove_file(path)?;
    }
    tracing::debug!(
        target: "impact.storage",
        dir = %dir.display(),
        files = files.len(),
        "discarded previous store"
    );
    Ok(())
}

/// `manifest.bin`, `<name>.part`, and the temp files an interrupted atomic
/// write leaves next to either of them.
fn is_store_file_name(name: &str) -> bool {
    let committed = match name.find(".tmp.") {
        Some(at) => &name[..at],
        None => name,
    };
    committed == MANIFEST_FILE
        || committed
            .strip_suffix(PARTITION_EXTENSION)
            .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
}

fn partition_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{PARTITION_EXTENSION}"))
}
