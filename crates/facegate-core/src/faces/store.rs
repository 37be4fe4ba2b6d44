use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::errors::{AppError, AppResult};
use crate::faces::persistence::{EncodingPersistence, MemoryPersistence};
use crate::faces::vector::EncodingVector;

/// Point-in-time copy of every identity's encodings, oldest first.
///
/// Iteration is lexicographic by identity, which fixes the tie-break order
/// used by the matcher.
pub type EnrollmentSnapshot = BTreeMap<String, Vec<EncodingVector>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrolledEncoding {
    pub id: String,
    pub encoding: EncodingVector,
    pub created_at: String,
}

impl EnrolledEncoding {
    pub fn new(encoding: EncodingVector) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            encoding,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Enrollment index guarded by a single reader/writer lock.
///
/// Writers are serialized by `writer`, compute the next sequence for an
/// identity, hand it to the persistence backend, and only then publish it
/// under a short write lock. Readers never wait on persistence and never
/// observe a half-evicted identity.
pub struct EncodingStore {
    dimension: usize,
    capacity: usize,
    writer: Mutex<()>,
    index: RwLock<BTreeMap<String, Vec<EnrolledEncoding>>>,
    persistence: Box<dyn EncodingPersistence>,
}

impl EncodingStore {
    pub fn in_memory(config: &EngineConfig) -> Self {
        Self {
            dimension: config.encoding_dimension(),
            capacity: config.max_encodings_per_identity(),
            writer: Mutex::new(()),
            index: RwLock::new(BTreeMap::new()),
            persistence: Box::new(MemoryPersistence),
        }
    }

    pub fn open<P>(config: &EngineConfig, persistence: P) -> AppResult<Self>
    where
        P: EncodingPersistence + 'static,
    {
        let dimension = config.encoding_dimension();
        let capacity = config.max_encodings_per_identity();

        let mut index = BTreeMap::new();
        for (identity, mut encodings) in persistence.load_all()? {
            for record in &encodings {
                record
                    .encoding
                    .ensure_dimension(dimension)
                    .map_err(|err| AppError::InvalidEnrollment {
                        identity: identity.clone(),
                        message: err.to_string(),
                    })?;
            }
            if encodings.is_empty() {
                continue;
            }
            if encodings.len() > capacity {
                let excess = encodings.len() - capacity;
                warn!(
                    identity = %identity,
                    excess,
                    "persisted enrollment exceeds capacity; dropping oldest entries"
                );
                encodings.drain(..excess);
            }
            index.insert(identity, encodings);
        }
        debug!(identities = index.len(), "encoding store opened");

        Ok(Self {
            dimension,
            capacity,
            writer: Mutex::new(()),
            index: RwLock::new(index),
            persistence: Box::new(persistence),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `vector` and evicts the oldest entries beyond capacity, as one step.
    pub fn insert(&self, identity: &str, vector: EncodingVector) -> AppResult<usize> {
        vector.ensure_dimension(self.dimension)?;

        let _writer = self.writer.lock();
        let mut next = self.index.read().get(identity).cloned().unwrap_or_default();
        next.push(EnrolledEncoding::new(vector));
        if next.len() > self.capacity {
            let excess = next.len() - self.capacity;
            next.drain(..excess);
            debug!(identity, evicted = excess, "evicted oldest encodings");
        }

        self.persistence.replace(identity, &next)?;
        let count = next.len();
        self.index.write().insert(identity.to_string(), next);
        Ok(count)
    }

    pub fn get(&self, identity: &str) -> Vec<EncodingVector> {
        self.index
            .read()
            .get(identity)
            .map(|records| records.iter().map(|r| r.encoding.clone()).collect())
            .unwrap_or_default()
    }

    pub fn all(&self) -> EnrollmentSnapshot {
        self.index
            .read()
            .iter()
            .map(|(identity, records)| {
                (
                    identity.clone(),
                    records.iter().map(|r| r.encoding.clone()).collect(),
                )
            })
            .collect()
    }

    pub fn delete(&self, identity: &str) -> AppResult<bool> {
        let _writer = self.writer.lock();
        if !self.index.read().contains_key(identity) {
            return Ok(false);
        }
        self.persistence.remove(identity)?;
        self.index.write().remove(identity);
        Ok(true)
    }

    pub fn list_identities(&self) -> Vec<String> {
        self.index.read().keys().cloned().collect()
    }

    pub fn count(&self, identity: &str) -> usize {
        self.index.read().get(identity).map_or(0, Vec::len)
    }

    pub fn identity_count(&self) -> usize {
        self.index.read().len()
    }

    pub fn total_encodings(&self) -> usize {
        self.index.read().values().map(Vec::len).sum()
    }
}

pub fn validate_identity_id(identity: &str) -> AppResult<()> {
    if identity.is_empty() {
        return Err(AppError::InvalidIdentity {
            identity: identity.to_string(),
            message: "identity id cannot be empty".into(),
        });
    }

    if !identity
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(AppError::InvalidIdentity {
            identity: identity.to_string(),
            message: "use ASCII letters, numbers, '-' or '_' only".into(),
        });
    }

    Ok(())
}
