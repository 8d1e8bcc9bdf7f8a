use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use impact_archive::{discover_archives, DiscoverOptions};
use impact_config::{FailurePolicy, ImpactConfig, StoreCompression};
use impact_storage::{StoreOptions, StoreWriter, WriteCompression};
use serde::Serialize;

use crate::error::{IndexError, Result};
use crate::extract::{index_archive, ArchiveRecords};
use crate::schema::{Partition, SCHEMA_VERSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub store_dir: PathBuf,
    pub on_error: FailurePolicy,
    pub discover: DiscoverOptions,
    pub store: StoreOptions,
}

impl BuildOptions {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            on_error: FailurePolicy::default(),
            discover: DiscoverOptions::default(),
            store: StoreOptions::default(),
        }
    }

    pub fn from_config(config: &ImpactConfig) -> Self {
        let compression = match config.store.compression {
            StoreCompression::None => WriteCompression::None,
            StoreCompression::Zstd => WriteCompression::Zstd { level: 3 },
        };
        Self {
            store_dir: config.store.path(),
            on_error: config.build.on_error,
            discover: DiscoverOptions {
                extensions: config.build.archive_extensions.clone(),
                follow_links: config.build.follow_links,
            },
            store: StoreOptions {
                compression,
                sync: config.store.fsync,
            },
        }
    }
}

/// The result of processing a single archive.
#[derive(Debug)]
pub enum ArchiveOutcome {
    Indexed(ArchiveRecords),
    Failed(IndexError),
}

impl ArchiveOutcome {
    pub fn of(path: &Path) -> Self {
        match index_archive(path) {
            Ok(records) => ArchiveOutcome::Indexed(records),
            Err(err) => ArchiveOutcome::Failed(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveFailure {
    pub archive: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    /// Archives indexed successfully.
    pub archives: usize,
    pub classes: usize,
    /// Call-site records extracted, before duplicates collapse in the store.
    pub method_refs: usize,
    pub failures: Vec<ArchiveFailure>,
    pub store_bytes: u64,
    #[serde(rename = "elapsed_ms", serialize_with = "crate::serialize_millis")]
    pub elapsed: Duration,
}

/// Rebuilds the store at `options.store_dir` from every archive under `root`.
///
/// Any previous store is discarded before the first archive is read. Records
/// of an archive reach the store only once the whole archive has been
/// decoded, so under [`FailurePolicy::Skip`] a failing archive contributes
/// nothing. Under [`FailurePolicy::Abort`] the first failure is returned and
/// no store is committed.
pub fn build_index(root: &Path, options: &BuildOptions) -> Result<BuildSummary> {
    let started = Instant::now();

    let archives =
        discover_archives(root, &options.discover).map_err(|source| IndexError::Discover {
            root: root.to_path_buf(),
            source,
        })?;
    tracing::info!(
        target: "impact.build",
        root = %root.display(),
        archives = archives.len(),
        store = %options.store_dir.display(),
        "building index"
    );

    let partitions = Partition::ALL.map(Partition::name);
    let mut writer =
        StoreWriter::create(&options.store_dir, SCHEMA_VERSION, &partitions, options.store)?;

    let mut summary = BuildSummary::default();
    for path in &archives {
        match ArchiveOutcome::of(path) {
            ArchiveOutcome::Indexed(records) => {
                records.write_to(&mut writer)?;
                tracing::debug!(
                    target: "impact.build",
                    archive = %path.display(),
                    classes = records.classes.len(),
                    method_refs = records.method_ref_count(),
                    "indexed archive"
                );
                summary.archives += 1;
                summary.classes += records.classes.len();
                summary.method_refs += records.method_ref_count();
            }
            ArchiveOutcome::Failed(err) => match options.on_error {
                FailurePolicy::Abort => {
                    tracing::error!(target: "impact.build", error = %err, "aborting build");
                    return Err(err);
                }
                FailurePolicy::Skip => {
                    tracing::warn!(target: "impact.build", error = %err, "skipping archive");
                    summary.failures.push(ArchiveFailure {
                        archive: err.archive().unwrap_or(path).to_path_buf(),
                        error: err.to_string(),
                    });
                }
            },
        }
    }

    summary.store_bytes = writer.commit()?;
    summary.elapsed = started.elapsed();
    tracing::info!(
        target: "impact.build",
        archives = summary.archives,
        classes = summary.classes,
        method_refs = summary.method_refs,
        failures = summary.failures.len(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "index committed"
    );
    Ok(summary)
}
