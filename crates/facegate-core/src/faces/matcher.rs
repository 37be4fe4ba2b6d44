use serde::Serialize;

use crate::faces::store::EnrollmentSnapshot;
use crate::faces::vector::euclidean_distance;

/// Distance reported when there is nothing to compare against.
pub const NO_MATCH_DISTANCE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub accepted: bool,
    pub identity_id: Option<String>,
    pub confidence: f64,
    pub distance: f64,
}

impl MatchResult {
    pub fn rejected(distance: f64) -> Self {
        Self {
            accepted: false,
            identity_id: None,
            confidence: 0.0,
            distance,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    identity: &'a str,
    distance: f64,
}

/// Linear scan over every stored encoding.
///
/// Ties keep the first candidate seen; the snapshot iterates identities
/// lexicographically and each identity's encodings oldest first.
pub fn find_best_match(query: &[f64], snapshot: &EnrollmentSnapshot, threshold: f64) -> MatchResult {
    let Some(best) = nearest_candidate(query, snapshot) else {
        return MatchResult::rejected(NO_MATCH_DISTANCE);
    };

    if best.distance < threshold {
        MatchResult {
            accepted: true,
            identity_id: Some(best.identity.to_string()),
            confidence: round_to_hundredths(1.0 - best.distance),
            distance: best.distance,
        }
    } else {
        MatchResult::rejected(best.distance)
    }
}

fn nearest_candidate<'a>(query: &[f64], snapshot: &'a EnrollmentSnapshot) -> Option<Candidate<'a>> {
    let mut best: Option<Candidate<'a>> = None;

    for (identity, encodings) in snapshot {
        for stored in encodings {
            let distance = euclidean_distance(query, stored);
            if best.map_or(true, |current| distance < current.distance) {
                best = Some(Candidate {
                    identity: identity.as_str(),
                    distance,
                });
            }
        }
    }

    best
}

pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
