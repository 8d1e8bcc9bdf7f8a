use impact_test_utils::{ClassFileBuilder, Corpus, JarBuilder};

use super::{query, Store};

#[test]
fn method_prefix_matches_whole_names_only() {
    let corpus = Corpus::new().unwrap();
    corpus
        .add_jar(
            "p.jar",
            &JarBuilder::new().class(
                ClassFileBuilder::new("Caller")
                    .calls("T", "foo")
                    .calls("T", "foobar")
                    .calls("T", "xfoo")
                    .calls("T", "fo"),
            ),
        )
        .unwrap();

    let store = Store::new();
    store.build(&corpus);
    let reader = store.open();

    let names: Vec<String> = query(&reader, "T", "foo")
        .into_iter()
        .map(|r| r.method_name)
        .collect();
    assert_eq!(names, vec!["foo"]);
    assert_eq!(query(&reader, "T", "foobar").len(), 1);
    assert!(query(&reader, "T", "oo").is_empty());
}

#[test]
fn class_prefix_matches_whole_names_only() {
    let corpus = Corpus::new().unwrap();
    corpus
        .add_jar(
            "p.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("Base"))
                .class(ClassFileBuilder::new("BaseImpl"))
                .class(ClassFileBuilder::new("Child").extends("BaseImpl"))
                .class(ClassFileBuilder::new("Caller").calls("Child", "run")),
        )
        .unwrap();

    let store = Store::new();
    store.build(&corpus);
    let reader = store.open();
    assert!(query(&reader, "Base", "run").is_empty());
    assert_eq!(query(&reader, "BaseImpl", "run").len(), 1);
}

#[test]
fn duplicate_call_sites_collapse() {
    let corpus = Corpus::new().unwrap();
    corpus
        .add_jar(
            "d.jar",
            &JarBuilder::new()
                .class(ClassFileBuilder::new("Caller").calls("T", "go").calls("T", "go")),
        )
        .unwrap();

    let store = Store::new();
    let summary = store.build(&corpus);
    assert_eq!(summary.method_refs, 2);
    assert_eq!(query(&store.open(), "T", "go").len(), 1);
}
