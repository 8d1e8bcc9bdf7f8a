use std::io::Write;

use impact_config::{
    ConfigError, FailurePolicy, ImpactConfig, StoreCompression,
};
use tempfile::NamedTempFile;

#[test]
fn loads_every_section() {
    let mut file = NamedTempFile::new().expect("tempfile");
    write!(
        file,
        r#"
[store]
path = "/srv/impact"
compression = "none"
fsync = true

[build]
on_error = "skip"
archive_extensions = ["jar", "war"]
follow_links = true

[query]
max_depth = 16
max_visited_classes = 2000

[logging]
level = "debug"
json = true
"#
    )
    .unwrap();

    let config = ImpactConfig::load_from_path(file.path()).expect("config should load");
    assert_eq!(config.store.path(), std::path::PathBuf::from("/srv/impact"));
    assert_eq!(config.store.compression, StoreCompression::None);
    assert!(config.store.fsync);
    assert_eq!(config.build.on_error, FailurePolicy::Skip);
    assert_eq!(config.build.archive_extensions, vec!["jar", "war"]);
    assert!(config.build.follow_links);
    assert_eq!(config.query.max_depth, 16);
    assert_eq!(config.query.max_visited_classes, 2000);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);
    assert!(config.logging.stderr);
}

#[test]
fn reports_unknown_keys_with_full_paths() {
    let text = r#"
typo = 1

[query]
max_dept = 3
"#;
    let (config, unknown) =
        ImpactConfig::load_from_str_with_diagnostics(text).expect("config should parse");
    assert_eq!(unknown, vec!["query.max_dept", "typo"]);
    assert_eq!(config.query.max_depth, 512);
}

#[test]
fn unknown_failure_policy_is_a_parse_error() {
    let err = ImpactConfig::load_from_str_with_diagnostics("[build]\non_error = \"retry\"\n")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)), "{err:?}");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ImpactConfig::load_from_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn empty_extension_list_is_rejected() {
    let err = ImpactConfig::load_from_str_with_diagnostics("[build]\narchive_extensions = []\n")
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            key: "build.archive_extensions",
            ..
        }
    ));
}
