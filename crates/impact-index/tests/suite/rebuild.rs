use impact_index::{build_index, BuildOptions, IndexError, Partition};
use impact_storage::StorageError;
use impact_test_utils::{ClassFileBuilder, Corpus, JarBuilder};

use super::{dump, query, Store};

fn corpus() -> Corpus {
    let corpus = Corpus::new().unwrap();
    corpus
        .add_jar(
            "a.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("A").extends("B").implements("I"))
                .class(ClassFileBuilder::new("M").calls("A", "x").calls_interface("I", "y")),
        )
        .unwrap();
    corpus
        .add_jar(
            "nested/b.jar",
            &JarBuilder::new().class(ClassFileBuilder::new("B").calls("A", "x")),
        )
        .unwrap();
    corpus
}

#[test]
fn rebuilding_unchanged_input_yields_identical_partitions() {
    let corpus = corpus();
    let store = Store::new();

    store.build(&corpus);
    let first: Vec<_> = Partition::ALL
        .iter()
        .map(|p| dump(&store.open(), p.name()))
        .collect();

    store.build(&corpus);
    let second: Vec<_> = Partition::ALL
        .iter()
        .map(|p| dump(&store.open(), p.name()))
        .collect();

    assert_eq!(first, second);
    assert_eq!(first[0].len(), 3);
    assert_eq!(first[1].len(), 3);
}

#[test]
fn rebuild_drops_records_of_removed_archives() {
    let corpus = corpus();
    let store = Store::new();
    store.build(&corpus);
    assert_eq!(query(&store.open(), "A", "x").len(), 2);

    std::fs::remove_file(corpus.root().join("nested/b.jar")).unwrap();
    store.build(&corpus);
    assert_eq!(query(&store.open(), "A", "x").len(), 1);
}

#[test]
fn missing_root_is_a_discovery_error() {
    let store = Store::new();
    let err = build_index(
        &store.dir().join("does-not-exist"),
        &BuildOptions::new(store.dir()),
    )
    .unwrap_err();
    assert!(matches!(err, IndexError::Discover { .. }), "{err:?}");
}

#[test]
fn foreign_store_directory_is_left_alone() {
    let corpus = corpus();
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join("precious.txt"), b"data").unwrap();

    let err = build_index(corpus.root(), &BuildOptions::new(tmp.path())).unwrap_err();
    assert!(
        matches!(err, IndexError::Storage(StorageError::NotAStore(_))),
        "{err:?}"
    );
    assert!(tmp.path().join("precious.txt").exists());
}

#[test]
fn build_recovers_from_an_interrupted_commit() {
    let corpus = corpus();
    let store = Store::new();
    store.build(&corpus);

    std::fs::remove_file(store.dir().join("manifest.bin")).unwrap();
    std::fs::write(store.dir().join("hierarchy.part.tmp.4242.0"), b"partial").unwrap();
    assert!(matches!(
        impact_index::open_store(store.dir()),
        Err(IndexError::Storage(StorageError::MissingStore(_)))
    ));

    store.build(&corpus);
    assert_eq!(query(&store.open(), "A", "x").len(), 2);
    assert!(!store.dir().join("hierarchy.part.tmp.4242.0").exists());
}

#[test]
fn build_into_directory_with_only_temp_leftovers() {
    let corpus = corpus();
    let store = Store::new();
    std::fs::create_dir_all(store.dir()).unwrap();
    std::fs::write(store.dir().join("hierarchy.part.tmp.4242.0"), b"partial").unwrap();

    let summary = store.build(&corpus);
    assert_eq!(summary.archives, 2);
    assert_eq!(query(&store.open(), "B", "x").len(), 2);
}

#[test]
fn querying_before_any_build_reports_missing_store() {
    let store = Store::new();
    let err = impact_index::open_store(store.dir()).unwrap_err();
    assert!(
        matches!(err, IndexError::Storage(StorageError::MissingStore(_))),
        "{err:?}"
    );
}

#[test]
fn truncated_partition_is_rejected_on_open() {
    let corpus = corpus();
    let store = Store::new();
    store.build(&corpus);

    let path = store.dir().join("hierarchy.part");
    let len = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len / 2).unwrap();

    let err = impact_index::open_store(store.dir()).unwrap_err();
    assert!(
        matches!(err, IndexError::Storage(StorageError::Truncated { .. })),
        "{err:?}"
    );
}
