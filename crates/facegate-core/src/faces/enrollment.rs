use serde::Serialize;
use tracing::{debug, info};

use crate::auth::{AccessGate, TokenValidator};
use crate::config::EngineConfig;
use crate::errors::{AppError, AppResult};
use crate::faces::extractor::{EncoderOutput, FaceEncoder};
use crate::faces::matcher::{find_best_match, MatchResult, NO_MATCH_DISTANCE};
use crate::faces::store::{validate_identity_id, EncodingStore};
use crate::faces::vector::EncodingVector;

pub const NO_FACE_MESSAGE: &str = "No face detected in the image.";
pub const MULTIPLE_FACES_MESSAGE: &str = "Several faces detected; a single face is required.";
pub const ENCODING_FAILED_MESSAGE: &str = "The face could not be encoded.";
pub const NOT_RECOGNIZED_MESSAGE: &str = "Face not recognized; enroll first.";

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOutcome {
    pub identity: String,
    /// Encodings held for the identity after this enrollment.
    pub face_count: usize,
    #[serde(skip)]
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub accepted: bool,
    pub identity_id: Option<String>,
    pub confidence: f64,
    pub distance: f64,
    pub message: String,
    #[serde(skip)]
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrolledIdentities {
    pub identities: Vec<String>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletionOutcome {
    pub identity: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineStats {
    pub identities: usize,
    pub encodings: usize,
    pub max_encodings_per_identity: usize,
    pub accept_threshold: f64,
    pub encoding_dimension: usize,
}

/// Single-subject encoding extracted from an encoder report.
enum Detection {
    Subject(EncodingVector),
    Rejected(AppError),
}

/// Composes the access gate, encoding store and matcher into the
/// enroll/verify/list/delete operations.
///
/// The encoder and token validator are always consulted before the store's
/// lock is taken.
pub struct EnrollmentEngine<E, V> {
    config: EngineConfig,
    gate: AccessGate<V>,
    store: EncodingStore,
    encoder: E,
}

impl<E, V> EnrollmentEngine<E, V>
where
    E: FaceEncoder,
    V: TokenValidator,
{
    pub fn new(config: EngineConfig, store: EncodingStore, encoder: E, validator: V) -> Self {
        Self {
            config,
            gate: AccessGate::new(validator),
            store,
            encoder,
        }
    }

    pub fn in_memory(config: EngineConfig, encoder: E, validator: V) -> Self {
        let store = EncodingStore::in_memory(&config);
        Self::new(config, store, encoder, validator)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &EncodingStore {
        &self.store
    }

    pub fn gate(&self) -> &AccessGate<V> {
        &self.gate
    }

    pub fn enroll(&self, authorization: Option<&str>, image: &[u8]) -> AppResult<EnrollmentOutcome> {
        let principal = self.gate.authorize(authorization)?;
        validate_identity_id(&principal.id)?;

        let mut logs = vec![format!("Authenticated as {}", principal.id)];
        let output = self.encoder.encode(image)?;
        logs.push(format!("Detected {} face(s)", output.faces_detected));

        let vector = match detect_single_subject(output) {
            Detection::Subject(vector) => vector,
            Detection::Rejected(err) => {
                debug!(identity = %principal.id, error = %err, "enrollment rejected");
                return Err(err);
            }
        };

        let face_count = self.store.insert(&principal.id, vector)?;
        info!(identity = %principal.id, face_count, "face enrolled");
        logs.push(format!(
            "Stored encoding for {} ({face_count} of {} kept)",
            principal.id,
            self.store.capacity()
        ));

        Ok(EnrollmentOutcome {
            identity: principal.id,
            face_count,
            logs,
        })
    }

    /// Matches the submitted face against every enrollment.
    ///
    /// The caller does not need to be authenticated. Zero or several faces,
    /// or a face that could not be encoded, produce a rejected outcome rather
    /// than an error.
    pub fn verify(
        &self,
        authorization: Option<&str>,
        image: &[u8],
    ) -> AppResult<VerificationOutcome> {
        let mut logs = Vec::new();
        match self.gate.authorize_optional(authorization) {
            Some(principal) => logs.push(format!("Verification requested by {}", principal.id)),
            None => logs.push("Verification requested anonymously".to_string()),
        }

        let output = self.encoder.encode(image)?;
        logs.push(format!("Detected {} face(s)", output.faces_detected));

        let query = match detect_single_subject(output) {
            Detection::Subject(vector) => vector,
            Detection::Rejected(err) => {
                let message = match &err {
                    AppError::NoSubjectDetected => NO_FACE_MESSAGE,
                    AppError::MultipleSubjectsDetected { .. } => MULTIPLE_FACES_MESSAGE,
                    _ => ENCODING_FAILED_MESSAGE,
                };
                debug!(reason = %err, "verification rejected before matching");
                return Ok(VerificationOutcome::rejected(
                    MatchResult::rejected(NO_MATCH_DISTANCE),
                    message,
                    logs,
                ));
            }
        };
        query.ensure_dimension(self.config.encoding_dimension())?;

        let snapshot = self.store.all();
        logs.push(format!(
            "Comparing against {} enrolled identit{}",
            snapshot.len(),
            if snapshot.len() == 1 { "y" } else { "ies" }
        ));
        let result = find_best_match(&query, &snapshot, self.config.accept_threshold());

        if result.accepted {
            info!(
                identity = result.identity_id.as_deref().unwrap_or_default(),
                confidence = result.confidence,
                distance = result.distance,
                "face verified"
            );
            let message = format!(
                "Identity verified with {}% confidence",
                (result.confidence * 100.0).round()
            );
            Ok(VerificationOutcome::from_match(result, message, logs))
        } else {
            info!(distance = result.distance, "face not recognized");
            Ok(VerificationOutcome::from_match(
                result,
                NOT_RECOGNIZED_MESSAGE.to_string(),
                logs,
            ))
        }
    }

    pub fn list_enrolled(&self, authorization: Option<&str>) -> AppResult<EnrolledIdentities> {
        let principal = self.gate.authorize(authorization)?;
        let identities = self.store.list_identities();
        debug!(principal = %principal.id, total = identities.len(), "listed enrollments");
        Ok(EnrolledIdentities {
            total_count: identities.len(),
            identities,
        })
    }

    pub fn delete(&self, authorization: Option<&str>, target: &str) -> AppResult<DeletionOutcome> {
        let principal = self.gate.authorize(authorization)?;
        self.gate.ensure_can_delete(&principal, target)?;

        let not_found = || AppError::NotFound {
            identity: target.to_string(),
        };
        if validate_identity_id(target).is_err() {
            return Err(not_found());
        }
        if !self.store.delete(target)? {
            return Err(not_found());
        }

        info!(principal = %principal.id, identity = target, "enrollment deleted");
        Ok(DeletionOutcome {
            identity: target.to_string(),
            message: format!("Face data for {target} deleted"),
        })
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            identities: self.store.identity_count(),
            encodings: self.store.total_encodings(),
            max_encodings_per_identity: self.store.capacity(),
            accept_threshold: self.config.accept_threshold(),
            encoding_dimension: self.store.dimension(),
        }
    }
}

impl VerificationOutcome {
    fn from_match(result: MatchResult, message: String, logs: Vec<String>) -> Self {
        Self {
            accepted: result.accepted,
            identity_id: result.identity_id,
            confidence: result.confidence,
            distance: result.distance,
            message,
            logs,
        }
    }

    fn rejected(result: MatchResult, message: &str, logs: Vec<String>) -> Self {
        Self::from_match(result, message.to_string(), logs)
    }
}

// Detection count is checked before encoding derivation.
fn detect_single_subject(output: EncoderOutput) -> Detection {
    let EncoderOutput {
        faces_detected,
        mut encodings,
    } = output;

    if faces_detected == 0 && encodings.is_empty() {
        return Detection::Rejected(AppError::NoSubjectDetected);
    }
    let count = faces_detected.max(encodings.len());
    if count > 1 {
        return Detection::Rejected(AppError::MultipleSubjectsDetected { count });
    }
    match encodings.pop() {
        Some(vector) => Detection::Subject(vector),
        None => Detection::Rejected(AppError::EncodingFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Principal, TokenRejection, ADMIN_ROLE};

    struct StubEncoder(EncoderOutput);

    impl StubEncoder {
        fn faces(encodings: Vec<Vec<f64>>) -> Self {
            Self(EncoderOutput {
                faces_detected: encodings.len(),
                encodings: encodings.into_iter().map(EncodingVector::new).collect(),
            })
        }

        fn located_without_encoding() -> Self {
            Self(EncoderOutput {
                faces_detected: 1,
                encodings: Vec::new(),
            })
        }
    }

    impl FaceEncoder for StubEncoder {
        fn encode(&self, _image: &[u8]) -> AppResult<EncoderOutput> {
            Ok(self.0.clone())
        }
    }

    struct TokenIsSubject;

    impl TokenValidator for TokenIsSubject {
        fn validate(&self, token: &str) -> Result<Principal, TokenRejection> {
            match token.split_once(':') {
                Some((id, role)) => Ok(Principal::new(id).with_role(role)),
                None if token.is_empty() => Err(TokenRejection::MissingSubject),
                None => Ok(Principal::new(token)),
            }
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::new(0.6, 5, 2).unwrap()
    }

    fn engine_with(encoder: StubEncoder) -> EnrollmentEngine<StubEncoder, TokenIsSubject> {
        EnrollmentEngine::in_memory(config(), encoder, TokenIsSubject)
    }

    #[test]
    fn enroll_stores_under_principal_id() {
        let engine = engine_with(StubEncoder::faces(vec![vec![0.1, 0.2]]));
        let outcome = engine.enroll(Some("Bearer alice"), b"img").unwrap();
        assert_eq!(outcome.identity, "alice");
        assert_eq!(outcome.face_count, 1);
        assert!(!outcome.logs.is_empty());
        assert_eq!(engine.store().count("alice"), 1);
    }

    #[test]
    fn enroll_requires_authentication() {
        let engine = engine_with(StubEncoder::faces(vec![vec![0.1, 0.2]]));
        let err = engine.enroll(None, b"img").unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated { .. }));
        assert_eq!(engine.stats().identities, 0);
    }

    #[test]
    fn enroll_reports_detection_failures_in_order() {
        let cases = [
            (StubEncoder::faces(vec![]), "none"),
            (StubEncoder::faces(vec![vec![0.1, 0.2], vec![0.3, 0.4]]), "many"),
            (StubEncoder::located_without_encoding(), "unencodable"),
        ];
        for (encoder, label) in cases {
            let engine = engine_with(encoder);
            let err = engine.enroll(Some("alice"), b"img").unwrap_err();
            match (label, &err) {
                ("none", AppError::NoSubjectDetected) => {}
                ("many", AppError::MultipleSubjectsDetected { count: 2 }) => {}
                ("unencodable", AppError::EncodingFailed) => {}
                _ => panic!("unexpected error for {label}: {err:?}"),
            }
            assert_eq!(engine.stats().encodings, 0);
        }
    }

    #[test]
    fn multiple_detected_faces_beat_missing_encodings() {
        let engine = engine_with(StubEncoder(EncoderOutput {
            faces_detected: 3,
            encodings: Vec::new(),
        }));
        let err = engine.enroll(Some("alice"), b"img").unwrap_err();
        assert!(matches!(err, AppError::MultipleSubjectsDetected { count: 3 }));
    }

    #[test]
    fn enroll_rejects_ids_unusable_as_store_keys() {
        let engine = engine_with(StubEncoder::faces(vec![vec![0.1, 0.2]]));
        let err = engine.enroll(Some("../etc"), b"img").unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentity { .. }));
    }

    #[test]
    fn verify_without_faces_is_a_rejection_not_an_error() {
        let engine = engine_with(StubEncoder::faces(vec![]));
        let outcome = engine.verify(None, b"img").unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.identity_id, None);
        assert_eq!(outcome.confidence, 0.0);
        assert_eq!(outcome.message, NO_FACE_MESSAGE);

        let engine = engine_with(StubEncoder::faces(vec![vec![0.0, 0.0], vec![1.0, 1.0]]));
        assert_eq!(
            engine.verify(None, b"img").unwrap().message,
            MULTIPLE_FACES_MESSAGE
        );
    }

    #[test]
    fn verify_matches_enrolled_face() {
        let engine = engine_with(StubEncoder::faces(vec![vec![0.1, 0.2]]));
        engine.enroll(Some("alice"), b"img").unwrap();

        let outcome = engine.verify(Some("not a valid assertion at all"), b"img").unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.identity_id.as_deref(), Some("alice"));
        assert_eq!(outcome.confidence, 1.0);
        assert_eq!(outcome.message, "Identity verified with 100% confidence");
    }

    #[test]
    fn verify_query_with_wrong_dimension_is_a_contract_error() {
        let engine = engine_with(StubEncoder::faces(vec![vec![0.1, 0.2, 0.3]]));
        let err = engine.verify(None, b"img").unwrap_err();
        assert!(matches!(err, AppError::InvalidVector { expected: 2, found: 3 }));
    }

    #[test]
    fn list_requires_any_principal() {
        let engine = engine_with(StubEncoder::faces(vec![vec![0.1, 0.2]]));
        engine.enroll(Some("bob"), b"img").unwrap();
        engine.enroll(Some("alice"), b"img").unwrap();

        assert!(engine.list_enrolled(None).is_err());
        let listed = engine.list_enrolled(Some("carol")).unwrap();
        assert_eq!(listed.identities, vec!["alice", "bob"]);
        assert_eq!(listed.total_count, 2);
    }

    #[test]
    fn delete_enforces_self_or_admin() {
        let engine = engine_with(StubEncoder::faces(vec![vec![0.1, 0.2]]));
        engine.enroll(Some("u1"), b"img").unwrap();
        engine.enroll(Some("u2"), b"img").unwrap();

        let err = engine.delete(Some("u1:user"), "u2").unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        assert_eq!(engine.store().count("u2"), 1);

        engine.delete(Some("u1:user"), "u1").unwrap();
        let admin = format!("ops:{ADMIN_ROLE}");
        engine.delete(Some(&admin), "u2").unwrap();
        assert_eq!(engine.stats().identities, 0);
    }

    #[test]
    fn delete_of_unknown_identity_is_not_found() {
        let engine = engine_with(StubEncoder::faces(vec![vec![0.1, 0.2]]));
        let admin = format!("ops:{ADMIN_ROLE}");
        for target in ["ghost", "../ghost"] {
            let err = engine.delete(Some(&admin), target).unwrap_err();
            assert!(matches!(err, AppError::NotFound { .. }), "{target}: {err:?}");
        }
    }

    #[test]
    fn stats_reflect_configuration_and_contents() {
        let engine = engine_with(StubEncoder::faces(vec![vec![0.1, 0.2]]));
        engine.enroll(Some("alice"), b"img").unwrap();
        engine.enroll(Some("alice"), b"img").unwrap();

        let stats = engine.stats();
        assert_eq!(stats.identities, 1);
        assert_eq!(stats.encodings, 2);
        assert_eq!(stats.max_encodings_per_identity, 5);
        assert_eq!(stats.accept_threshold, 0.6);
        assert_eq!(stats.encoding_dimension, 2);
    }
}
