use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Fixed-length numeric representation of one biometric sample.
///
/// The values are never mutated after construction; the store only clones
/// or drops whole vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingVector(Vec<f64>);

impl EncodingVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Checks the collaborator contract: exact dimensionality, finite values.
    pub fn ensure_dimension(&self, expected: usize) -> AppResult<()> {
        if self.0.len() != expected {
            return Err(AppError::InvalidVector {
                expected,
                found: self.0.len(),
            });
        }
        if let Some(index) = self.0.iter().position(|value| !value.is_finite()) {
            return Err(AppError::NonFiniteVector { index });
        }
        Ok(())
    }
}

impl From<Vec<f64>> for EncodingVector {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl Deref for EncodingVector {
    type Target = [f64];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub fn euclidean_distance(lhs: &[f64], rhs: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (l, r) in lhs.iter().zip(rhs.iter()) {
        let diff = l - r;
        sum += diff * diff;
    }
    sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let v = vec![0.25, -0.5, 0.125];
        assert_eq!(euclidean_distance(&v, &v), 0.0);
    }

    #[test]
    fn distance_matches_pythagoras() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
    }

    #[test]
    fn ensure_dimension_rejects_wrong_length() {
        let vector = EncodingVector::new(vec![0.1, 0.2, 0.3]);
        let err = vector.ensure_dimension(128).unwrap_err();
        match err {
            AppError::InvalidVector { expected, found } => {
                assert_eq!(expected, 128);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn ensure_dimension_rejects_nan() {
        let vector = EncodingVector::new(vec![0.1, f64::NAN]);
        let err = vector.ensure_dimension(2).unwrap_err();
        assert!(matches!(err, AppError::NonFiniteVector { index: 1 }));
    }

    #[test]
    fn serializes_as_plain_array() {
        let vector = EncodingVector::new(vec![0.5, 1.0]);
        assert_eq!(serde_json::to_string(&vector).unwrap(), "[0.5,1.0]");
    }
}
