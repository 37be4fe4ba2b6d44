pub mod enrollment;
pub mod extractor;
pub mod matcher;
pub mod persistence;
pub mod store;
pub mod vector;

pub use enrollment::{
    DeletionOutcome, EngineStats, EnrolledIdentities, EnrollmentEngine, EnrollmentOutcome,
    VerificationOutcome, ENCODING_FAILED_MESSAGE, MULTIPLE_FACES_MESSAGE, NOT_RECOGNIZED_MESSAGE,
    NO_FACE_MESSAGE,
};

pub use extractor::{
    summarize, BoundingBox, EncoderOutput, FaceEmbeddingRecord, FaceEncoder,
    FaceExtractionSummary, SummaryEncoder,
};

pub use matcher::{find_best_match, round_to_hundredths, MatchResult, NO_MATCH_DISTANCE};

pub use persistence::{
    read_identity_file, write_identity_file, EncodingPersistence, FilesystemPersistence,
    MemoryPersistence, StoreKey, STORE_KEY_BYTES,
};

pub use store::{
    validate_identity_id, EncodingStore, EnrolledEncoding, EnrollmentSnapshot,
};

pub use vector::{euclidean_distance, EncodingVector};
