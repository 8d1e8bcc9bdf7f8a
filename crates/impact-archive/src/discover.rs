use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::ArchiveError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverOptions {
    /// File extensions (without the dot, compared case-insensitively) that mark
    /// a file as an archive.
    pub extensions: Vec<String>,
    pub follow_links: bool,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["jar".to_owned()],
            follow_links: false,
        }
    }
}

impl DiscoverOptions {
    fn matches(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(ext))
    }
}

/// Recursively collects every regular archive file under `root`.
///
/// Paths are canonicalized, deduplicated and returned sorted so repeated runs
/// over the same tree visit archives in the same order. Unreadable directory
/// entries are skipped with a warning.
pub fn discover_archives(
    root: &Path,
    options: &DiscoverOptions,
) -> Result<Vec<PathBuf>, ArchiveError> {
    if !root.is_dir() {
        return Err(ArchiveError::NotADirectory {
            root: root.to_path_buf(),
        });
    }

    let mut found = BTreeSet::new();
    for entry in walkdir::WalkDir::new(root).follow_links(options.follow_links) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(
                    target: "impact.archive",
                    error = %err,
                    "skipping unreadable directory entry"
                );
                continue;
            }
        };
        if !entry.file_type().is_file() || !options.matches(entry.path()) {
            continue;
        }
        let path = impact_core::canonicalize_if_possible(entry.path()).map_err(|source| {
            ArchiveError::Open {
                path: entry.path().to_path_buf(),
                source,
            }
        })?;
        found.insert(path);
    }

    Ok(found.into_iter().collect())
}
