use impact_config::FailurePolicy;
use impact_index::{build_index, open_store, BuildOptions, IndexError};
use impact_storage::StorageError;
use impact_test_utils::{ClassFileBuilder, Corpus, JarBuilder};

use super::{query, Store};

fn corpus_with_broken_class() -> (Corpus, std::path::PathBuf) {
    let corpus = Corpus::new().unwrap();
    corpus
        .add_jar(
            "good.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("Good"))
                .class(ClassFileBuilder::new("Caller").calls("Good", "work")),
        )
        .unwrap();
    let bad = corpus
        .add_jar(
            "bad.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("Fine").calls("Good", "work"))
                .entry("Broken.class", b"\xCA\xFE\xBA\xBE\x00".to_vec()),
        )
        .unwrap();
    (corpus, bad)
}

fn options(store: &Store, on_error: FailurePolicy) -> BuildOptions {
    BuildOptions {
        on_error,
        ..BuildOptions::new(store.dir())
    }
}

#[test]
fn abort_fails_the_build_and_commits_nothing() {
    let (corpus, bad) = corpus_with_broken_class();
    let store = Store::new();

    let err = build_index(corpus.root(), &options(&store, FailurePolicy::Abort)).unwrap_err();
    match &err {
        IndexError::MalformedDescriptor { archive, entry, .. } => {
            assert_eq!(archive, &bad);
            assert_eq!(entry, "Broken.class");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(
        open_store(store.dir()),
        Err(IndexError::Storage(StorageError::MissingStore(_)))
    ));
}

#[test]
fn abort_discards_a_previous_store() {
    let (corpus, _) = corpus_with_broken_class();
    let store = Store::new();
    build_index(corpus.root(), &options(&store, FailurePolicy::Skip)).unwrap();
    assert!(open_store(store.dir()).is_ok());

    build_index(corpus.root(), &options(&store, FailurePolicy::Abort)).unwrap_err();
    assert!(open_store(store.dir()).is_err());
}

#[test]
fn skip_reports_the_archive_and_indexes_the_rest() {
    let (corpus, bad) = corpus_with_broken_class();
    let store = Store::new();

    let summary = build_index(corpus.root(), &options(&store, FailurePolicy::Skip)).unwrap();
    assert_eq!(summary.archives, 1);
    assert_eq!(summary.classes, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].archive, bad);
    assert!(summary.failures[0].error.contains("Broken.class"));

    // Nothing from the failing archive is written, not even its valid classes.
    let callers: Vec<String> = query(&store.open(), "Good", "work")
        .into_iter()
        .map(|r| r.caller_class)
        .collect();
    assert_eq!(callers, vec!["Caller"]);
}

#[test]
fn unreadable_archive_is_an_archive_read_failure() {
    let corpus = Corpus::new().unwrap();
    let broken = corpus.add_file("broken.jar", b"not a zip at all").unwrap();
    let store = Store::new();

    let err = build_index(corpus.root(), &options(&store, FailurePolicy::Abort)).unwrap_err();
    assert!(
        matches!(&err, IndexError::ArchiveRead { archive, .. } if archive == &broken),
        "{err:?}"
    );

    let summary = build_index(corpus.root(), &options(&store, FailurePolicy::Skip)).unwrap();
    assert_eq!(summary.archives, 0);
    assert_eq!(summary.failures.len(), 1);
}
