use crate::errors::{AppError, AppResult};

pub use facegate_config::{
    DEFAULT_ACCEPT_THRESHOLD, DEFAULT_ENCODING_DIMENSION, DEFAULT_MAX_ENCODINGS_PER_IDENTITY,
};

pub const MAX_ENCODINGS_LIMIT: usize = 20;

/// Validated engine settings, built once at startup and handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    accept_threshold: f64,
    max_encodings_per_identity: usize,
    encoding_dimension: usize,
}

impl EngineConfig {
    pub fn new(
        accept_threshold: f64,
        max_encodings_per_identity: usize,
        encoding_dimension: usize,
    ) -> AppResult<Self> {
        if !accept_threshold.is_finite() || !(0.0..=1.0).contains(&accept_threshold) {
            return Err(AppError::InvalidConfig(format!(
                "accept_threshold must be within [0, 1], found {accept_threshold}"
            )));
        }
        if !(1..=MAX_ENCODINGS_LIMIT).contains(&max_encodings_per_identity) {
            return Err(AppError::InvalidConfig(format!(
                "max_encodings_per_identity must be within [1, {MAX_ENCODINGS_LIMIT}], found {max_encodings_per_identity}"
            )));
        }
        if encoding_dimension == 0 {
            return Err(AppError::InvalidConfig(
                "encoding_dimension must be at least 1".into(),
            ));
        }

        Ok(Self {
            accept_threshold,
            max_encodings_per_identity,
            encoding_dimension,
        })
    }

    pub fn accept_threshold(&self) -> f64 {
        self.accept_threshold
    }

    pub fn max_encodings_per_identity(&self) -> usize {
        self.max_encodings_per_identity
    }

    pub fn encoding_dimension(&self) -> usize {
        self.encoding_dimension
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            max_encodings_per_identity: DEFAULT_MAX_ENCODINGS_PER_IDENTITY,
            encoding_dimension: DEFAULT_ENCODING_DIMENSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.accept_threshold(), 0.6);
        assert_eq!(config.max_encodings_per_identity(), 5);
        assert_eq!(config.encoding_dimension(), 128);
    }

    #[test]
    fn defaults_agree_with_resolved_file_config() {
        let resolved = facegate_config::ResolvedConfig::default();
        let built = EngineConfig::new(
            resolved.accept_threshold,
            resolved.max_encodings_per_identity,
            resolved.encoding_dimension,
        )
        .unwrap();
        assert_eq!(built, EngineConfig::default());
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        assert!(matches!(
            EngineConfig::new(1.5, 5, 128),
            Err(AppError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::new(f64::NAN, 5, 128),
            Err(AppError::InvalidConfig(_))
        ));
    }

    #[test]
    fn capacity_bounds_are_enforced() {
        assert!(EngineConfig::new(0.6, 0, 128).is_err());
        assert!(EngineConfig::new(0.6, 21, 128).is_err());
        assert!(EngineConfig::new(0.6, 20, 128).is_ok());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(EngineConfig::new(0.6, 5, 0).is_err());
    }
}
