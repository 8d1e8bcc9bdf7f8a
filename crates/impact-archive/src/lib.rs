//! Archive discovery and reading.
//!
//! [`discover_archives`] walks a directory tree for JAR-like files, and
//! [`Archive`] yields the raw bytes of every `.class` entry inside one of them
//! without interpreting the contents.

mod discover;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

pub use discover::{discover_archives, DiscoverOptions};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read zip {}: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("failed to read {entry} from {}: {source}", path.display())]
    Entry {
        path: PathBuf,
        entry: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a directory", root.display())]
    NotADirectory { root: PathBuf },
}

/// One `.class` entry of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// An opened JAR (any zip container of class files).
pub struct Archive {
    path: PathBuf,
    zip: ZipArchive<File>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("entries", &self.zip.len())
            .finish()
    }
}

impl Archive {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| ArchiveError::Open {
            path: path.clone(),
            source,
        })?;
        let zip = ZipArchive::new(file).map_err(|source| ArchiveError::Zip {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, zip })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of zip entries, including directories and resources.
    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Iterates over every regular `.class` entry in archive order.
    pub fn class_entries(&mut self) -> ClassEntries<'_> {
        ClassEntries {
            archive: self,
            next: 0,
        }
    }
}

pub struct ClassEntries<'a> {
    archive: &'a mut Archive,
    next: usize,
}

impl Iterator for ClassEntries<'_> {
    type Item = Result<ClassEntry, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.archive.zip.len() {
            let index = self.next;
            self.next += 1;

            let path = &self.archive.path;
            let mut file = match self.archive.zip.by_index(index) {
                Ok(file) => file,
                Err(source) => {
                    return Some(Err(ArchiveError::Zip {
                        path: path.clone(),
                        source,
                    }))
                }
            };
            if !file.is_file() || !file.name().ends_with(".class") {
                continue;
            }

            let name = file.name().to_owned();
            let mut bytes = Vec::new();
            if let Err(source) = file.read_to_end(&mut bytes) {
                return Some(Err(ArchiveError::Entry {
                    path: path.clone(),
                    entry: name,
                    source,
                }));
            }
            return Some(Ok(ClassEntry { name, bytes }));
        }
        None
    }
}
