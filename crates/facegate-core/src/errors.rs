use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required: {reason}")]
    Unauthenticated { reason: String },

    #[error("principal {principal} may not {action} identity {target}")]
    Forbidden {
        principal: String,
        action: &'static str,
        target: String,
    },

    #[error("encoding vector has {found} values; expected {expected}")]
    InvalidVector { expected: usize, found: usize },

    #[error("encoding vector contains a non-finite value at index {index}")]
    NonFiniteVector { index: usize },

    #[error("no face detected in the image; take a clear photo of your face")]
    NoSubjectDetected,

    #[error("{count} faces detected; make sure you are alone in the image")]
    MultipleSubjectsDetected { count: usize },

    #[error("a face was located but could not be encoded; retry with a better photo")]
    EncodingFailed,

    #[error("no enrollment found for identity {identity}")]
    NotFound { identity: String },

    #[error("invalid identity '{identity}': {message}")]
    InvalidIdentity { identity: String, message: String },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read feature file {path}: {source}")]
    FeatureRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("feature payload is invalid: {message}")]
    InvalidFeaturePayload { message: String },

    #[error("failed to read encoding store {path}: {source}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write encoding store {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("encoding store {path} is invalid: {message}")]
    InvalidStoreFile { path: PathBuf, message: String },

    #[error("persisted enrollment for {identity} is invalid: {message}")]
    InvalidEnrollment { identity: String, message: String },

    #[error("encoding store {path} is encrypted and requires a store key")]
    EncryptedStoreRequiresKey { path: PathBuf },

    #[error("encoding store encryption error: {0}")]
    Encryption(String),

    #[error("failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("token signing is not configured: {0}")]
    TokenSigning(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::Unauthenticated { .. } => ExitCode::from(3),
            AppError::Forbidden { .. } => ExitCode::from(3),
            AppError::NotFound { .. } => ExitCode::from(4),
            AppError::InvalidVector { .. } => ExitCode::from(1),
            AppError::NonFiniteVector { .. } => ExitCode::from(1),
            AppError::NoSubjectDetected => ExitCode::from(2),
            AppError::MultipleSubjectsDetected { .. } => ExitCode::from(2),
            AppError::EncodingFailed => ExitCode::from(2),
            AppError::InvalidIdentity { .. } => ExitCode::from(2),
            AppError::InvalidConfig(_) => ExitCode::from(2),
            AppError::InvalidFeaturePayload { .. } => ExitCode::from(2),
            AppError::FeatureRead { .. } => ExitCode::from(2),
            AppError::InvalidStoreFile { .. } => ExitCode::from(2),
            AppError::InvalidEnrollment { .. } => ExitCode::from(2),
            AppError::EncryptedStoreRequiresKey { .. } => ExitCode::from(2),
            AppError::Encryption(_) => ExitCode::from(2),
            AppError::ConfigRead { .. } => ExitCode::from(2),
            AppError::ConfigParse { .. } => ExitCode::from(2),
            AppError::TokenSigning(_) => ExitCode::from(2),
            _ => ExitCode::from(1),
        }
    }

    /// Conditions the caller can correct; never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Unauthenticated { .. }
                | AppError::Forbidden { .. }
                | AppError::NoSubjectDetected
                | AppError::MultipleSubjectsDetected { .. }
                | AppError::EncodingFailed
                | AppError::NotFound { .. }
                | AppError::InvalidIdentity { .. }
                | AppError::InvalidFeaturePayload { .. }
                | AppError::FeatureRead { .. }
        )
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;
