//! Configuration for the impact tools, plus `tracing` setup.
//!
//! Settings are layered: built-in defaults, then a TOML file (from `--config`
//! or `IMPACT_CONFIG`), then `IMPACT_STORE_DIR`, then an explicit store
//! directory passed on the command line. See [`ImpactConfig::resolve`].

mod logging;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use logging::{init_tracing, LoggingConfig};

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "IMPACT_CONFIG";
/// Environment variable overriding `[store].path`.
pub const STORE_DIR_ENV: &str = "IMPACT_STORE_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreCompression {
    None,
    #[default]
    Zstd,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store directory. Defaults to `<temp dir>/impact-index`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub compression: StoreCompression,

    /// `fsync` partition files when the build commits.
    #[serde(default)]
    pub fsync: bool,
}

impl StoreConfig {
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("impact-index"))
    }
}

/// What a build does when one archive cannot be read or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the build; nothing is committed.
    #[default]
    Abort,
    /// Report the archive in the build summary and keep going.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub on_error: FailurePolicy,

    /// File extensions (without the dot) treated as archives.
    #[serde(default = "BuildConfig::default_archive_extensions")]
    pub archive_extensions: Vec<String>,

    #[serde(default)]
    pub follow_links: bool,
}

impl BuildConfig {
    fn default_archive_extensions() -> Vec<String> {
        vec!["jar".to_owned()]
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            on_error: FailurePolicy::default(),
            archive_extensions: Self::default_archive_extensions(),
            follow_links: false,
        }
    }
}

/// Work limits for a single subtype resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum depth of the ancestor search stack.
    #[serde(default = "QueryConfig::default_max_depth")]
    pub max_depth: usize,

    /// Maximum number of hierarchy lookups per resolution.
    #[serde(default = "QueryConfig::default_max_visited_classes")]
    pub max_visited_classes: usize,
}

impl QueryConfig {
    fn default_max_depth() -> usize {
        512
    }

    fn default_max_visited_classes() -> usize {
        100_000
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::default_max_depth(),
            max_visited_classes: Self::default_max_visited_classes(),
        }
    }
}

/// Top-level configuration.
///
/// ```toml
/// [store]
/// path = "/var/cache/impact"
/// compression = "zstd"
/// fsync = false
///
/// [build]
/// on_error = "skip"
/// archive_extensions = ["jar", "war"]
///
/// [query]
/// max_depth = 512
/// max_visited_classes = 100000
///
/// [logging]
/// level = "impact.build=debug,info"
/// json = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImpactConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid config value `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` includes a snippet of the input; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl ImpactConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_from_path_with_diagnostics(path).map(|(config, _)| config)
    }

    /// Like [`ImpactConfig::load_from_path`], also returning the dotted paths
    /// of keys that were not recognised.
    pub fn load_from_path_with_diagnostics(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<String>), ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str_with_diagnostics(&text)
    }

    pub fn load_from_str_with_diagnostics(text: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut unknown_keys = Vec::new();
        let deserializer = toml::de::Deserializer::new(text);
        let config: ImpactConfig = serde_ignored::deserialize(deserializer, |path| {
            // Root-level paths render with a leading `.`.
            unknown_keys.push(path.to_string().trim_start_matches('.').to_owned());
        })?;
        config.validate()?;
        unknown_keys.sort();
        Ok((config, unknown_keys))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.max_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "query.max_depth",
                message: "must be at least 1".to_owned(),
            });
        }
        if self.query.max_visited_classes == 0 {
            return Err(ConfigError::Invalid {
                key: "query.max_visited_classes",
                message: "must be at least 1".to_owned(),
            });
        }
        if self.build.archive_extensions.is_empty() {
            return Err(ConfigError::Invalid {
                key: "build.archive_extensions",
                message: "must name at least one extension".to_owned(),
            });
        }
        Ok(())
    }

    /// Builds the effective configuration from the process environment.
    ///
    /// `config_path` (usually `--config`) takes precedence over
    /// `IMPACT_CONFIG`; `store_override` (usually `--store`) takes precedence
    /// over `IMPACT_STORE_DIR` and the file's `[store].path`.
    pub fn resolve(
        config_path: Option<&Path>,
        store_override: Option<&Path>,
    ) -> Result<(Self, Vec<String>), ConfigError> {
        Self::resolve_with_env(config_path, store_override, |key| std::env::var_os(key))
    }

    pub fn resolve_with_env(
        config_path: Option<&Path>,
        store_override: Option<&Path>,
        env: impl Fn(&str) -> Option<std::ffi::OsString>,
    ) -> Result<(Self, Vec<String>), ConfigError> {
        let file = config_path
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_ENV).filter(|v| !v.is_empty()).map(PathBuf::from));

        let (mut config, unknown_keys) = match file {
            Some(path) => Self::load_from_path_with_diagnostics(&path)?,
            None => (Self::default(), Vec::new()),
        };

        if let Some(dir) = env(STORE_DIR_ENV).filter(|v| !v.is_empty()) {
            config.store.path = Some(PathBuf::from(dir));
        }
        if let Some(dir) = store_override {
            config.store.path = Some(dir.to_path_buf());
        }
        Ok((config, unknown_keys))
    }
}
