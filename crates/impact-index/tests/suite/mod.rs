use std::path::{Path, PathBuf};

use impact_index::{
    build_index, open_store, BuildOptions, BuildSummary, MethodRefRecord, QueryEngine,
    QueryOptions,
};
use impact_storage::{OrderedKv, StoreReader};
use impact_test_utils::Corpus;
use tempfile::TempDir;

mod end_to_end;
mod failure_policy;
mod prefix;
mod rebuild;

/// A scratch store directory that lives as long as the test.
pub(crate) struct Store {
    _tmp: TempDir,
    dir: PathBuf,
}

impl Store {
    pub(crate) fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("index");
        Self { _tmp: tmp, dir }
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn build(&self, corpus: &Corpus) -> BuildSummary {
        build_index(corpus.root(), &BuildOptions::new(&self.dir)).expect("build should succeed")
    }

    pub(crate) fn open(&self) -> StoreReader {
        open_store(&self.dir).expect("store should open")
    }
}

pub(crate) fn query(reader: &StoreReader, class: &str, method: &str) -> Vec<MethodRefRecord> {
    QueryEngine::new(reader, QueryOptions::default())
        .query(class, method)
        .expect("query should start")
        .collect::<Result<_, _>>()
        .expect("query should succeed")
}

pub(crate) fn rendered(records: &[MethodRefRecord]) -> Vec<String> {
    records.iter().map(ToString::to_string).collect()
}

pub(crate) fn dump(reader: &StoreReader, partition: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
    reader
        .scan(partition, &[])
        .expect("scan")
        .map(|(k, v)| (k.to_vec(), v.to_vec()))
        .collect()
}
