use impact_index::{QueryEngine, QueryOptions, Resolution};
use impact_test_utils::{ClassFileBuilder, Corpus, JarBuilder};

use super::{query, rendered, Store};

fn base_derived_caller() -> (Corpus, String) {
    let corpus = Corpus::new().unwrap();
    let jar = corpus
        .add_jar(
            "app/app.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("com/example/Base"))
                .class(ClassFileBuilder::new("com/example/Derived").extends("com/example/Base"))
                .class(
                    ClassFileBuilder::new("com/example/Caller").calls("com/example/Derived", "run"),
                ),
        )
        .unwrap();
    (corpus, jar.to_string_lossy().into_owned())
}

#[test]
fn build_summary_counts_archives_classes_and_refs() {
    let (corpus, _) = base_derived_caller();
    let store = Store::new();
    let summary = store.build(&corpus);
    assert_eq!(summary.archives, 1);
    assert_eq!(summary.classes, 3);
    assert_eq!(summary.method_refs, 1);
    assert!(summary.failures.is_empty());
    assert!(summary.store_bytes > 0);
}

#[test]
fn hierarchy_records_direct_superclass_per_archive() {
    let (corpus, jar) = base_derived_caller();
    let store = Store::new();
    store.build(&corpus);
    let reader = store.open();
    let engine = QueryEngine::new(&reader, QueryOptions::default());

    let derived = engine.find_class("com.example.Derived").unwrap();
    assert_eq!(derived.len(), 1);
    assert_eq!(derived[0].archive_path, jar);
    assert_eq!(derived[0].super_class.as_deref(), Some("com.example.Base"));
    assert!(derived[0].interfaces.is_empty());

    // Direct subclasses of Object carry no superclass.
    let base = engine.find_class("com/example/Base").unwrap();
    assert_eq!(base[0].super_class, None);

    assert!(engine.find_class("com.example.Missing").unwrap().is_empty());
}

#[test]
fn call_site_is_found_through_target_and_its_ancestors_only() {
    let (corpus, jar) = base_derived_caller();
    let store = Store::new();
    store.build(&corpus);
    let reader = store.open();

    let expected = vec![format!("run|com.example.Derived|com.example.Caller|{jar}")];
    assert_eq!(rendered(&query(&reader, "com.example.Base", "run")), expected);
    assert_eq!(rendered(&query(&reader, "com.example.Derived", "run")), expected);
    assert_eq!(rendered(&query(&reader, "com/example/Derived", "run")), expected);
    assert!(query(&reader, "com.example.Caller", "run").is_empty());
    assert!(query(&reader, "com.example.Base", "walk").is_empty());
}

#[test]
fn multi_level_hierarchy_spans_archives() {
    let corpus = Corpus::new().unwrap();
    corpus
        .add_jar(
            "lib.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("C"))
                .class(ClassFileBuilder::new("B").extends("C")),
        )
        .unwrap();
    corpus
        .add_jar(
            "app.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("A").extends("B"))
                .class(ClassFileBuilder::new("Unrelated"))
                .class(ClassFileBuilder::new("Main").calls("A", "run").calls("B", "run")),
        )
        .unwrap();

    let store = Store::new();
    store.build(&corpus);
    let reader = store.open();

    let targets = |class: &str| -> Vec<String> {
        query(&reader, class, "run")
            .into_iter()
            .map(|r| r.target_class)
            .collect()
    };
    assert_eq!(targets("C"), vec!["A", "B"]);
    assert_eq!(targets("B"), vec!["A", "B"]);
    assert_eq!(targets("A"), vec!["A"]);
    assert!(targets("Unrelated").is_empty());
}

#[test]
fn interface_call_sites_resolve_through_implemented_interfaces() {
    let corpus = Corpus::new().unwrap();
    corpus
        .add_jar(
            "api.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("api/Closeable").without_super())
                .class(ClassFileBuilder::new("api/Resource").implements("api/Closeable"))
                .class(
                    ClassFileBuilder::new("api/User").calls_interface("api/Resource", "close"),
                ),
        )
        .unwrap();

    let store = Store::new();
    store.build(&corpus);
    let reader = store.open();
    let found = query(&reader, "api.Closeable", "close");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].caller_class, "api.User");
}

#[test]
fn cyclic_hierarchy_terminates() {
    let corpus = Corpus::new().unwrap();
    corpus
        .add_jar(
            "weird.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("X").extends("Y"))
                .class(ClassFileBuilder::new("Y").extends("X"))
                .class(ClassFileBuilder::new("Self").extends("Self"))
                .class(ClassFileBuilder::new("Main").calls("X", "go").calls("Self", "go")),
        )
        .unwrap();

    let store = Store::new();
    store.build(&corpus);
    let reader = store.open();

    assert!(query(&reader, "Z", "go").is_empty());
    assert_eq!(query(&reader, "Y", "go").len(), 1);
    assert_eq!(query(&reader, "Self", "go").len(), 1);

    let resolver = QueryEngine::new(&reader, QueryOptions::default()).resolver();
    assert_eq!(resolver.resolve("Z", "Self").unwrap(), Resolution::Unrelated);
}

#[test]
fn descriptor_only_classes_are_not_indexed() {
    let corpus = Corpus::new().unwrap();
    corpus
        .add_jar(
            "mod.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("module-info").without_super())
                .class(ClassFileBuilder::new("com/example/package-info").without_super())
                .class(ClassFileBuilder::new("com/example/Real")),
        )
        .unwrap();

    let store = Store::new();
    let summary = store.build(&corpus);
    assert_eq!(summary.classes, 1);
}

#[test]
fn query_summary_tracks_scanned_and_matched() {
    let (corpus, _) = base_derived_caller();
    let store = Store::new();
    store.build(&corpus);
    let reader = store.open();

    let engine = QueryEngine::new(&reader, QueryOptions::default());
    let mut sites = engine.query("com.example.Caller", "run").unwrap();
    assert!(sites.next().is_none());
    let summary = sites.summary();
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.matched, 0);
    assert_eq!(summary.budget_exhausted, 0);

    let json = serde_json::to_value(&summary).unwrap();
    assert!(json.get("elapsed_ms").is_some());
}
