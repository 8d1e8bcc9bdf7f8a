use std::path::PathBuf;

use impact_archive::ArchiveError;
use impact_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot discover archives under {}: {source}", root.display())]
    Discover {
        root: PathBuf,
        #[source]
        source: ArchiveError,
    },
    #[error("failed to read archive {}: {source}", archive.display())]
    ArchiveRead {
        archive: PathBuf,
        #[source]
        source: ArchiveError,
    },
    #[error("malformed class file {entry} in {}: {source}", archive.display())]
    MalformedDescriptor {
        archive: PathBuf,
        entry: String,
        #[source]
        source: impact_classfile::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("corrupt key in `{partition}` partition: {reason}")]
    CorruptKey {
        partition: &'static str,
        reason: &'static str,
    },
    #[error("corrupt value in `{partition}` partition: {reason}")]
    CorruptValue {
        partition: &'static str,
        reason: &'static str,
    },
}

impl IndexError {
    /// The archive this error is attributed to, if any.
    pub fn archive(&self) -> Option<&std::path::Path> {
        match self {
            IndexError::ArchiveRead { archive, .. }
            | IndexError::MalformedDescriptor { archive, .. } => Some(archive),
            _ => None,
        }
    }
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
