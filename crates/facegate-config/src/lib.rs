use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/facegate/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/facegate/config.toml";
pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MAX_ENCODINGS_PER_IDENTITY: usize = 5;
pub const DEFAULT_ENCODING_DIMENSION: usize = 128;
pub const DEFAULT_STORE_DIR: &str = "/var/lib/facegate/encodings";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    pub accept_threshold: Option<f64>,
    pub max_encodings_per_identity: Option<usize>,
    pub encoding_dimension: Option<usize>,
    pub store_dir: Option<PathBuf>,
    /// Base64 AES-256 key; plaintext store files when absent.
    pub store_key: Option<String>,
    pub token_secret: Option<String>,
    pub token_ttl_minutes: Option<i64>,
}

/// Settings with defaults applied. Range checks happen when the engine
/// configuration is built from these values.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub accept_threshold: f64,
    pub max_encodings_per_identity: usize,
    pub encoding_dimension: usize,
    pub store_dir: PathBuf,
    pub store_key: Option<String>,
    pub token_secret: Option<String>,
    pub token_ttl_minutes: i64,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            accept_threshold: raw.accept_threshold.unwrap_or(DEFAULT_ACCEPT_THRESHOLD),
            max_encodings_per_identity: raw
                .max_encodings_per_identity
                .unwrap_or(DEFAULT_MAX_ENCODINGS_PER_IDENTITY),
            encoding_dimension: raw
                .encoding_dimension
                .unwrap_or(DEFAULT_ENCODING_DIMENSION),
            store_dir: raw
                .store_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
            store_key: raw.store_key.filter(|key| !key.trim().is_empty()),
            token_secret: raw.token_secret.filter(|secret| !secret.is_empty()),
            token_ttl_minutes: raw
                .token_ttl_minutes
                .unwrap_or(DEFAULT_TOKEN_TTL_MINUTES)
                .max(1),
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub fn default_paths() -> [PathBuf; 2] {
    [
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

/// Loads `explicit` when given (it must exist), otherwise the first
/// existing default path.
pub fn load_resolved_config(explicit: Option<&Path>) -> Result<ResolvedConfigWithSource, ConfigError> {
    match explicit {
        Some(path) => {
            let loaded = load_file(path)?;
            Ok(ResolvedConfigWithSource {
                resolved: ResolvedConfig::from_raw(loaded.contents),
                source: Some(loaded.source),
            })
        }
        None => load_resolved_from_paths(&default_paths()),
    }
}

pub fn load_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(path, &contents)
}

pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => return parse(path, &contents).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::from_raw(entry.contents),
            source: Some(entry.source),
        }),
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}

fn parse(path: &Path, contents: &str) -> Result<LoadedConfig, ConfigError> {
    let parsed = toml::from_str::<ConfigFile>(contents).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(LoadedConfig::new(parsed, path.to_path_buf()))
}
