use std::fs;
use std::path::{Path, PathBuf};

use facegate_config::{load_resolved_config, ConfigError, ResolvedConfig, ResolvedConfigWithSource};
use facegate_core::auth::Hs256Validator;
use facegate_core::config::EngineConfig;
use facegate_core::errors::{AppError, AppResult};
use facegate_core::faces::{
    EngineStats, EncodingStore, EnrollmentEngine, FilesystemPersistence, StoreKey, SummaryEncoder,
};
use serde::Serialize;
use tracing::{debug, warn};

pub type CliEngine = EnrollmentEngine<SummaryEncoder, Hs256Validator>;

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub config_source: Option<PathBuf>,
    pub store_dir: PathBuf,
    pub store_encrypted: bool,
    pub token_auth_configured: bool,
    pub token_ttl_minutes: i64,
    #[serde(flatten)]
    pub stats: EngineStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub subject: String,
    pub role: Option<String>,
    pub expires_in_minutes: i64,
    pub token: String,
}

pub fn load_settings(explicit: Option<&Path>) -> AppResult<ResolvedConfigWithSource> {
    let loaded = load_resolved_config(explicit).map_err(map_config_error)?;
    match &loaded.source {
        Some(path) => debug!(path = %path.display(), "loaded configuration"),
        None => debug!("no configuration file found; using defaults"),
    }
    Ok(loaded)
}

pub fn engine_config(settings: &ResolvedConfig) -> AppResult<EngineConfig> {
    EngineConfig::new(
        settings.accept_threshold,
        settings.max_encodings_per_identity,
        settings.encoding_dimension,
    )
}

pub fn store_key(settings: &ResolvedConfig) -> AppResult<Option<StoreKey>> {
    settings
        .store_key
        .as_deref()
        .map(StoreKey::from_base64)
        .transpose()
}

pub fn token_validator(settings: &ResolvedConfig) -> Hs256Validator {
    let secret = settings.token_secret.clone().unwrap_or_default();
    if secret.is_empty() {
        warn!("token_secret is not configured; every bearer token will be rejected");
    }
    Hs256Validator::new(secret).with_ttl_minutes(settings.token_ttl_minutes)
}

pub fn open_engine(explicit: Option<&Path>) -> AppResult<CliEngine> {
    let settings = load_settings(explicit)?.resolved;
    build_engine(&settings)
}

pub fn build_engine(settings: &ResolvedConfig) -> AppResult<CliEngine> {
    let config = engine_config(settings)?;
    let persistence = FilesystemPersistence::new(&settings.store_dir, store_key(settings)?);
    let store = EncodingStore::open(&config, persistence)?;
    Ok(EnrollmentEngine::new(
        config,
        store,
        SummaryEncoder,
        token_validator(settings),
    ))
}

pub fn read_features(path: &Path) -> AppResult<Vec<u8>> {
    fs::read(path).map_err(|source| AppError::FeatureRead {
        path: path.to_path_buf(),
        source,
    })
}

pub fn collect_status(explicit: Option<&Path>) -> AppResult<StatusReport> {
    let loaded = load_settings(explicit)?;
    let settings = loaded.resolved;
    let engine = build_engine(&settings)?;
    Ok(StatusReport {
        config_source: loaded.source,
        store_dir: settings.store_dir.clone(),
        store_encrypted: settings.store_key.is_some(),
        token_auth_configured: settings.token_secret.is_some(),
        token_ttl_minutes: settings.token_ttl_minutes,
        stats: engine.stats(),
    })
}

pub fn issue_token(
    explicit: Option<&Path>,
    subject: &str,
    email: Option<&str>,
    role: Option<&str>,
) -> AppResult<IssuedToken> {
    let settings = load_settings(explicit)?.resolved;
    let validator = token_validator(&settings);
    let token = validator.issue(subject, email, role)?;
    Ok(IssuedToken {
        subject: subject.to_string(),
        role: role.map(str::to_string),
        expires_in_minutes: validator.ttl_minutes(),
        token,
    })
}

fn map_config_error(err: ConfigError) -> AppError {
    match err {
        ConfigError::Read { path, source } => AppError::ConfigRead { path, source },
        ConfigError::Parse { path, message } => AppError::ConfigParse { path, message },
    }
}
