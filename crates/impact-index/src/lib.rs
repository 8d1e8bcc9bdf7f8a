//! Virtual-dispatch impact index over compiled JVM archives.
//!
//! Building an index ([`build_index`]) records, for every class in every
//! archive, its direct supertypes (the `hierarchy` partition) and every method
//! it references (the `methodrefs` partition). A query ([`QueryEngine::query`])
//! then lists the call sites of a method name whose static target type is a
//! given class or one of its descendants: exactly the call sites that could
//! dispatch to an override placed in that class.

mod build;
mod error;
mod extract;
mod query;
mod schema;

use std::path::Path;
use std::time::Duration;

use impact_storage::StoreReader;

pub use build::{build_index, ArchiveFailure, ArchiveOutcome, BuildOptions, BuildSummary};
pub use error::{IndexError, Result};
pub use extract::{archive_path_string, extract, index_archive, ArchiveRecords, ExtractedClass};
pub use query::{
    CallSites, QueryEngine, QueryOptions, QuerySummary, Resolution, SubtypeResolver,
};
pub use schema::{
    encode_field, field_prefix, HierarchyRecord, MethodRefRecord, Partition, SCHEMA_VERSION,
};

/// Opens the committed store in `dir` for querying.
pub fn open_store(dir: &Path) -> Result<StoreReader> {
    Ok(StoreReader::open(dir, SCHEMA_VERSION)?)
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
