// src/validator.rs

use crate::config::ValidationDetails;
use crate::error::NilaRpError;
use crate::jwt::{self, Jwt};
use crate::keys::KeyResolver;
use crate::model::DiscoveryMetadata;
use jsonwebtoken::Algorithm;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error, instrument};

/// Why an ID Token was rejected. Only ever logged; callers see a boolean.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("ID Token has invalid nonce. Expected nonce: {expected}, nonce from token is: {actual:?}")]
    NonceMismatch { expected: String, actual: Option<String> },

    #[error("ID Token has invalid audience. Expected audience: {expected}, audience from token is: {actual:?}")]
    AudienceMismatch { expected: String, actual: Option<Value> },

    #[error("ID Token has no 'exp' claim")]
    MissingExpiry,

    #[error("ID Token is expired (exp {exp}, now {now})")]
    Expired { exp: u64, now: u64 },

    #[error("ID Token issuer is invalid. Token issuer: {actual:?}, discovery issuer: {expected}")]
    IssuerMismatch { expected: String, actual: Option<String> },

    #[error("ID Token algorithm {0:?} is not allowed")]
    AlgorithmNotAllowed(Option<String>),

    #[error("The JWT header is missing the 'kid' (Key ID) field")]
    MissingKeyId,

    #[error("ID Token signature is invalid")]
    SignatureMismatch,

    #[error(transparent)]
    Key(#[from] NilaRpError),
}

/// Current time in whole seconds since the epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Decides whether an ID Token is acceptable for a client.
///
/// The validator holds no per-request state; it can be shared or rebuilt
/// per command at no cost beyond cloning the key resolver.
#[derive(Clone)]
pub struct IdTokenValidator {
    keys: KeyResolver,
    validation: ValidationDetails,
}

impl IdTokenValidator {
    pub fn new(keys: KeyResolver, validation: ValidationDetails) -> Self {
        Self { keys, validation }
    }

    /// Validates an OIDC ID Token.
    ///
    /// Every failure, including network errors while fetching keys, yields
    /// `false`. The reason is logged and never returned.
    pub async fn is_valid(
        &self,
        jwt: &Jwt,
        discovery: &DiscoveryMetadata,
        expected_nonce: &str,
        expected_client_id: &str,
    ) -> bool {
        match self.validate(jwt, discovery, expected_nonce, expected_client_id).await {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// Checks only the signature, against the OP's published keys.
    pub async fn is_signature_valid(&self, jwt: &Jwt, discovery: &DiscoveryMetadata) -> bool {
        match self.check_signature(jwt, discovery).await {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// Runs the checks in order and stops at the first failure:
    ///
    /// 1. the `nonce` claim equals `expected_nonce` exactly;
    /// 2. `aud` equals `expected_client_id`, ignoring case;
    /// 3. the token has an `exp` and now is strictly before it (plus leeway);
    /// 4. `iss` equals the discovered issuer exactly;
    /// 5. the signature verifies with the JWKS key named by `kid`.
    #[instrument(skip_all, fields(client_id = %expected_client_id))]
    pub async fn validate(
        &self,
        jwt: &Jwt,
        discovery: &DiscoveryMetadata,
        expected_nonce: &str,
        expected_client_id: &str,
    ) -> Result<(), ValidationError> {
        let nonce = jwt.claim_str("nonce");
        if nonce != Some(expected_nonce) {
            return Err(ValidationError::NonceMismatch {
                expected: expected_nonce.to_string(),
                actual: nonce.map(str::to_string),
            });
        }

        if !audience_matches(jwt.claim("aud"), expected_client_id) {
            return Err(ValidationError::AudienceMismatch {
                expected: expected_client_id.to_string(),
                actual: jwt.claim("aud").cloned(),
            });
        }

        let exp = jwt.claim_timestamp("exp").ok_or(ValidationError::MissingExpiry)?;
        let now = unix_now();
        if now >= exp.saturating_add(self.validation.leeway.as_secs()) {
            return Err(ValidationError::Expired { exp, now });
        }

        let issuer = jwt.claim_str("iss");
        if issuer != Some(discovery.issuer.as_str()) {
            return Err(ValidationError::IssuerMismatch {
                expected: discovery.issuer.clone(),
                actual: issuer.map(str::to_string),
            });
        }

        self.check_signature(jwt, discovery).await
    }

    async fn check_signature(&self, jwt: &Jwt, discovery: &DiscoveryMetadata) -> Result<(), ValidationError> {
        let alg = jwt
            .algorithm()
            .filter(|alg| self.is_allowed(alg))
            .ok_or_else(|| ValidationError::AlgorithmNotAllowed(jwt.algorithm().map(str::to_string)))?;
        let kid = jwt.key_id().ok_or(ValidationError::MissingKeyId)?;

        let key = self.keys.resolve(&discovery.jwks_uri, kid).await?;
        if !jwt::verify_signature(jwt, alg, &key)? {
            return Err(ValidationError::SignatureMismatch);
        }
        debug!("ID Token signature verified with kid {}", kid);
        Ok(())
    }

    fn is_allowed(&self, alg: &str) -> bool {
        alg.parse::<Algorithm>()
            .map(|alg| self.validation.algorithms.contains(&alg))
            .unwrap_or(false)
    }
}

/// `aud` may be a string or, per OIDC Core, an array; an array must hold the
/// client id as its only member.
fn audience_matches(aud: Option<&Value>, client_id: &str) -> bool {
    match aud {
        Some(Value::String(aud)) => aud.eq_ignore_ascii_case(client_id),
        Some(Value::Array(values)) => match values.as_slice() {
            [Value::String(aud)] => aud.eq_ignore_ascii_case(client_id),
            _ => false,
        },
        _ => false,
    }
}
