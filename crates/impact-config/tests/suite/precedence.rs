use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use impact_config::{ImpactConfig, CONFIG_ENV, STORE_DIR_ENV};

fn env_of(pairs: &[(&str, &Path)]) -> impl Fn(&str) -> Option<OsString> {
    let map: HashMap<String, OsString> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.as_os_str().to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

fn config_file(dir: &Path, store: &str) -> PathBuf {
    let path = dir.join("impact.toml");
    std::fs::write(&path, format!("[store]\npath = \"{store}\"\n")).unwrap();
    path
}

#[test]
fn no_inputs_means_defaults() {
    let (config, unknown) = ImpactConfig::resolve_with_env(None, None, env_of(&[])).unwrap();
    assert_eq!(config, ImpactConfig::default());
    assert!(unknown.is_empty());
}

#[test]
fn config_env_is_used_without_flag() {
    let dir = tempfile::tempdir().unwrap();
    let file = config_file(dir.path(), "/from/env-file");
    let (config, _) =
        ImpactConfig::resolve_with_env(None, None, env_of(&[(CONFIG_ENV, file.as_path())])).unwrap();
    assert_eq!(config.store.path(), PathBuf::from("/from/env-file"));
}

#[test]
fn flag_file_beats_config_env() {
    let dir = tempfile::tempdir().unwrap();
    let flagged = config_file(dir.path(), "/from/flag-file");
    let missing = dir.path().join("missing.toml");
    let (config, _) = ImpactConfig::resolve_with_env(
        Some(&flagged),
        None,
        env_of(&[(CONFIG_ENV, missing.as_path())]),
    )
    .unwrap();
    assert_eq!(config.store.path(), PathBuf::from("/from/flag-file"));
}

#[test]
fn store_env_beats_file_and_store_flag_beats_env() {
    let dir = tempfile::tempdir().unwrap();
    let file = config_file(dir.path(), "/from/file");
    let env = [(STORE_DIR_ENV, Path::new("/from/store-env"))];

    let (config, _) = ImpactConfig::resolve_with_env(Some(&file), None, env_of(&env)).unwrap();
    assert_eq!(config.store.path(), PathBuf::from("/from/store-env"));

    let (config, _) = ImpactConfig::resolve_with_env(
        Some(&file),
        Some(Path::new("/from/flag")),
        env_of(&env),
    )
    .unwrap();
    assert_eq!(config.store.path(), PathBuf::from("/from/flag"));
}
