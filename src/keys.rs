// src/keys.rs

use crate::error::NilaRpError;
use crate::http::{HttpClient, HttpRequest};
use crate::model::JsonWebKeySet;
use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::DecodingKey;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// An RSA public key taken from a JWKS entry.
#[derive(Clone)]
pub struct RsaPublicKey {
    key_id: String,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
    decoding_key: DecodingKey,
}

impl RsaPublicKey {
    /// Builds a key from the base64url `n` and `e` members of a JWK.
    pub fn from_components(key_id: &str, n: &str, e: &str) -> Result<Self, NilaRpError> {
        let decode = |value: &str, name: &str| -> Result<Vec<u8>, NilaRpError> {
            let bytes = URL_SAFE_NO_PAD
                .decode(value.trim_end_matches('='))
                .map_err(|err| NilaRpError::InvalidKeyFormat(format!("'{}' is not valid base64url: {}", name, err)))?;
            if bytes.iter().all(|b| *b == 0) {
                return Err(NilaRpError::InvalidKeyFormat(format!("'{}' is empty or zero", name)));
            }
            Ok(bytes)
        };
        let modulus = decode(n, "n")?;
        let exponent = decode(e, "e")?;
        let decoding_key = DecodingKey::from_rsa_raw_components(&modulus, &exponent);

        Ok(Self {
            key_id: key_id.to_string(),
            modulus,
            exponent,
            decoding_key,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Big-endian modulus bytes.
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Big-endian public exponent bytes.
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for RsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPublicKey")
            .field("key_id", &self.key_id)
            .field("bits", &(self.modulus.len() * 8))
            .finish()
    }
}

/// Fetches a JSON Web Key Set and picks the RSA key for a `kid`.
///
/// Nothing is cached and nothing is retried here: every call is one request,
/// and retry policy belongs to the caller.
#[derive(Clone)]
pub struct KeyResolver {
    http: Arc<dyn HttpClient>,
}

impl KeyResolver {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// Resolves the signing key `key_id` from the JWKS at `jwks_uri`.
    ///
    /// # Errors
    ///
    /// * `KeyFetch` if the document cannot be fetched or parsed.
    /// * `KeyNotFound` if no signing key carries `key_id`.
    /// * `UnsupportedKeyType` if the matching key is not an RSA key.
    /// * `InvalidKeyFormat` if the RSA components are missing or malformed.
    #[instrument(skip(self), err)]
    pub async fn resolve(&self, jwks_uri: &str, key_id: &str) -> Result<RsaPublicKey, NilaRpError> {
        let request = HttpRequest::get(jwks_uri)
            .map_err(|e| NilaRpError::KeyFetch(e.to_string()))?
            .header("Accept", "application/json");
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| NilaRpError::KeyFetch(e.to_string()))?;

        if response.status != 200 {
            return Err(NilaRpError::KeyFetch(format!(
                "JWKS endpoint responded with status {}",
                response.status
            )));
        }

        let jwks: JsonWebKeySet = response
            .json()
            .map_err(|e| NilaRpError::KeyFetch(format!("invalid JWKS document: {}", e)))?;
        debug!("Fetched {} keys from {}", jwks.keys.len(), jwks_uri);

        // Encryption keys never sign, so a kid shared with one is not a match.
        let jwk = jwks
            .keys
            .into_iter()
            .find(|jwk| jwk.kid.as_deref() == Some(key_id) && jwk.use_purpose.as_deref() != Some("enc"))
            .ok_or_else(|| NilaRpError::KeyNotFound(key_id.to_string()))?;

        if jwk.kty != "RSA" {
            return Err(NilaRpError::UnsupportedKeyType {
                kid: key_id.to_string(),
                kty: jwk.kty,
            });
        }

        let n = jwk
            .n
            .as_deref()
            .ok_or_else(|| NilaRpError::InvalidKeyFormat("RSA key missing 'n' component".to_string()))?;
        let e = jwk
            .e
            .as_deref()
            .ok_or_else(|| NilaRpError::InvalidKeyFormat("RSA key missing 'e' component".to_string()))?;

        RsaPublicKey::from_components(key_id, n, e)
    }
}
