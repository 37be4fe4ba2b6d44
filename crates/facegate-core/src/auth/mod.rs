pub mod token;

use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

pub use token::{Hs256Validator, TokenRejection, TokenValidator, DEFAULT_TOKEN_TTL_MINUTES};

pub const ADMIN_ROLE: &str = "admin";
const BEARER_SCHEME: &str = "bearer";

/// Caller identity derived from a validated token; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            role: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// Maps authorization assertions to principals and applies per-operation rules.
///
/// An assertion is either a bare token or an `Authorization` header value of
/// the form `Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AccessGate<V> {
    validator: V,
}

impl<V: TokenValidator> AccessGate<V> {
    pub fn new(validator: V) -> Self {
        Self { validator }
    }

    pub fn authorize(&self, assertion: Option<&str>) -> AppResult<Principal> {
        let Some(assertion) = assertion.map(str::trim).filter(|raw| !raw.is_empty()) else {
            warn!("request rejected: no bearer token supplied");
            return Err(AppError::Unauthenticated {
                reason: "missing bearer token".into(),
            });
        };

        let token = extract_token(assertion).map_err(|reason| {
            warn!(%reason, "request rejected: malformed authorization assertion");
            AppError::Unauthenticated {
                reason: reason.to_string(),
            }
        })?;

        self.validator.validate(token).map_err(|rejection| {
            warn!(%rejection, "request rejected: token validation failed");
            AppError::Unauthenticated {
                reason: rejection.to_string(),
            }
        })
    }

    /// Like [`authorize`](Self::authorize) but absence or invalidity yields `None`.
    pub fn authorize_optional(&self, assertion: Option<&str>) -> Option<Principal> {
        let assertion = assertion.map(str::trim).filter(|raw| !raw.is_empty())?;
        let token = extract_token(assertion).ok()?;
        match self.validator.validate(token) {
            Ok(principal) => Some(principal),
            Err(rejection) => {
                debug!(%rejection, "optional authorization ignored invalid token");
                None
            }
        }
    }

    pub fn ensure_can_delete(&self, principal: &Principal, target: &str) -> AppResult<()> {
        if principal.id == target || principal.is_admin() {
            return Ok(());
        }
        warn!(
            principal = %principal.id,
            target,
            "delete refused: principal is neither owner nor admin"
        );
        Err(AppError::Forbidden {
            principal: principal.id.clone(),
            action: "delete",
            target: target.to_string(),
        })
    }
}

fn extract_token(assertion: &str) -> Result<&str, TokenRejection> {
    let mut parts = assertion.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(token), None, None) => Ok(token),
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => {
            Ok(token)
        }
        _ => Err(TokenRejection::Malformed(
            "expected 'Bearer <token>' authorization".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticValidator;

    impl TokenValidator for StaticValidator {
        fn validate(&self, token: &str) -> Result<Principal, TokenRejection> {
            match token {
                "alice-token" => Ok(Principal::new("alice").with_email("alice@example.com")),
                "root-token" => Ok(Principal::new("root").with_role(ADMIN_ROLE)),
                "stale-token" => Err(TokenRejection::Expired),
                _ => Err(TokenRejection::BadSignature),
            }
        }
    }

    fn gate() -> AccessGate<StaticValidator> {
        AccessGate::new(StaticValidator)
    }

    #[test]
    fn bearer_header_and_bare_token_both_authorize() {
        let gate = gate();
        assert_eq!(gate.authorize(Some("Bearer alice-token")).unwrap().id, "alice");
        assert_eq!(gate.authorize(Some("bearer alice-token")).unwrap().id, "alice");
        assert_eq!(gate.authorize(Some("alice-token")).unwrap().id, "alice");
    }

    #[test]
    fn missing_or_invalid_assertion_is_unauthenticated() {
        let gate = gate();
        for assertion in [None, Some(""), Some("Basic abc"), Some("Bearer stale-token")] {
            let err = gate.authorize(assertion).unwrap_err();
            assert!(
                matches!(err, AppError::Unauthenticated { .. }),
                "unexpected error for {assertion:?}: {err:?}"
            );
        }
    }

    #[test]
    fn optional_authorization_swallows_failures() {
        let gate = gate();
        assert!(gate.authorize_optional(None).is_none());
        assert!(gate.authorize_optional(Some("Bearer stale-token")).is_none());
        assert!(gate.authorize_optional(Some("Token a b")).is_none());
        assert_eq!(
            gate.authorize_optional(Some("Bearer root-token")).unwrap().id,
            "root"
        );
    }

    #[test]
    fn delete_rule_is_self_or_admin() {
        let gate = gate();
        let user = Principal::new("u1").with_role("user");
        let admin = Principal::new("ops").with_role(ADMIN_ROLE);

        assert!(gate.ensure_can_delete(&user, "u1").is_ok());
        assert!(matches!(
            gate.ensure_can_delete(&user, "u2"),
            Err(AppError::Forbidden { .. })
        ));
        assert!(gate.ensure_can_delete(&admin, "u2").is_ok());
    }
}
