use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::auth::Principal;
use crate::errors::{AppError, AppResult};

pub use facegate_config::DEFAULT_TOKEN_TTL_MINUTES;

type HmacSha256 = Hmac<Sha256>;

const JWT_ALGORITHM: &str = "HS256";
const JWT_TYPE: &str = "JWT";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token algorithm '{0}' is not accepted")]
    UnsupportedAlgorithm(String),
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token carries no subject")]
    MissingSubject,
}

/// Turns a raw bearer token into a principal, or says why it cannot.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<Principal, TokenRejection>;
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

/// Compact JWTs signed with HMAC-SHA256 under a shared secret.
#[derive(Clone)]
pub struct Hs256Validator {
    secret: Vec<u8>,
    ttl: Duration,
}

impl Hs256Validator {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        }
    }

    pub fn with_ttl_minutes(mut self, minutes: i64) -> Self {
        self.ttl = Duration::minutes(minutes);
        self
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl.num_minutes()
    }

    pub fn has_secret(&self) -> bool {
        !self.secret.is_empty()
    }

    pub fn issue(
        &self,
        subject: &str,
        email: Option<&str>,
        role: Option<&str>,
    ) -> AppResult<String> {
        self.issue_at(subject, email, role, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        email: Option<&str>,
        role: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<String> {
        if self.secret.is_empty() {
            return Err(AppError::TokenSigning("token secret is empty".into()));
        }
        if subject.is_empty() {
            return Err(AppError::TokenSigning("token subject is empty".into()));
        }

        let header = JwtHeader {
            alg: JWT_ALGORITHM.to_string(),
            typ: Some(JWT_TYPE.to_string()),
        };
        let claims = JwtClaims {
            sub: Some(subject.to_string()),
            email: email.map(str::to_string),
            role: role.map(str::to_string),
            exp: Some((now + self.ttl).timestamp()),
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = self.sign(signing_input.as_bytes())?;
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, TokenRejection> {
        // An empty HMAC key would accept tokens anyone can mint.
        if self.secret.is_empty() {
            return Err(TokenRejection::BadSignature);
        }

        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenRejection::Malformed(
                "expected three dot-separated segments".into(),
            ));
        };

        let header: JwtHeader = decode_segment(header_b64, "header")?;
        if header.alg != JWT_ALGORITHM {
            return Err(TokenRejection::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|err| TokenRejection::Malformed(format!("signature: {err}")))?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenRejection::BadSignature)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenRejection::BadSignature)?;

        let claims: JwtClaims = decode_segment(claims_b64, "claims")?;
        if let Some(exp) = claims.exp {
            if exp <= now.timestamp() {
                return Err(TokenRejection::Expired);
            }
        }
        let subject = claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or(TokenRejection::MissingSubject)?;

        Ok(Principal {
            id: subject,
            email: claims.email,
            role: claims.role,
        })
    }

    fn sign(&self, input: &[u8]) -> AppResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|err| AppError::TokenSigning(err.to_string()))?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl TokenValidator for Hs256Validator {
    fn validate(&self, token: &str) -> Result<Principal, TokenRejection> {
        self.validate_at(token, Utc::now())
    }
}

impl std::fmt::Debug for Hs256Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hs256Validator")
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish_non_exhaustive()
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(
    segment: &str,
    label: &str,
) -> Result<T, TokenRejection> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|err| TokenRejection::Malformed(format!("{label}: {err}")))?;
    serde_json::from_slice(&bytes).map_err(|err| TokenRejection::Malformed(format!("{label}: {err}")))
}
