use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::faces::vector::EncodingVector;

/// What the upstream detector/encoder reports for one image.
///
/// `faces_detected` counts located faces; `encodings` holds the vectors that
/// could actually be derived, so one face with no encoding is distinguishable
/// from no face at all.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncoderOutput {
    pub faces_detected: usize,
    pub encodings: Vec<EncodingVector>,
}

pub trait FaceEncoder: Send + Sync {
    fn encode(&self, image: &[u8]) -> AppResult<EncoderOutput>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaceEmbeddingRecord {
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub embedding: Vec<f64>,
}

/// Feature document written by an external face extraction step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceExtractionSummary {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub image_path: String,
    pub num_faces: usize,
    #[serde(default)]
    pub faces: Vec<FaceEmbeddingRecord>,
    #[serde(default)]
    pub encoder_model: String,
}

/// Reads a [`FaceExtractionSummary`] JSON document in place of raw image bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryEncoder;

impl FaceEncoder for SummaryEncoder {
    fn encode(&self, image: &[u8]) -> AppResult<EncoderOutput> {
        let summary: FaceExtractionSummary =
            serde_json::from_slice(image).map_err(|err| AppError::InvalidFeaturePayload {
                message: err.to_string(),
            })?;
        Ok(summarize(summary))
    }
}

pub fn summarize(summary: FaceExtractionSummary) -> EncoderOutput {
    let faces_detected = summary.num_faces.max(summary.faces.len());
    let encodings: Vec<EncodingVector> = summary
        .faces
        .into_iter()
        .filter(|face| !face.embedding.is_empty())
        .map(|face| EncodingVector::new(face.embedding))
        .collect();
    debug!(
        faces_detected,
        encodings = encodings.len(),
        "decoded face extraction summary"
    );

    EncoderOutput {
        faces_detected,
        encodings,
    }
}
