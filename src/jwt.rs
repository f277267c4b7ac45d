// src/jwt.rs

use crate::error::NilaRpError;
use crate::keys::RsaPublicKey;
use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256, Sha384, Sha512};

/// A compact-serialized JWT split into its parts.
///
/// Parsing does not verify anything; see [`verify_signature`] and
/// [`crate::validator::IdTokenValidator`].
#[derive(Debug, Clone)]
pub struct Jwt {
    header: Map<String, Value>,
    claims: Map<String, Value>,
    signing_input: String,
    signature: Vec<u8>,
    encoded_signature: String,
}

impl Jwt {
    /// Parses `header.payload.signature`.
    ///
    /// # Errors
    ///
    /// `MalformedToken` on a wrong segment count, invalid base64url, or a
    /// header/payload that is not a JSON object.
    pub fn parse(token: &str) -> Result<Jwt, NilaRpError> {
        let mut segments = token.trim().split('.');
        let (header, payload, signature) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => {
                    return Err(NilaRpError::MalformedToken(
                        "expected three dot-separated segments".to_string(),
                    ))
                }
            };

        let header_map = decode_object(header, "header")?;
        let claims = decode_object(payload, "payload")?;
        let signature_bytes = decode_segment(signature, "signature")?;

        Ok(Jwt {
            header: header_map,
            claims,
            signing_input: format!("{}.{}", header, payload),
            signature: signature_bytes,
            encoded_signature: signature.trim_end_matches('=').to_string(),
        })
    }

    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    /// A header parameter as a string, if present and a string.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header.get(name).and_then(Value::as_str)
    }

    /// The `alg` header.
    pub fn algorithm(&self) -> Option<&str> {
        self.header_str("alg")
    }

    /// The `kid` header.
    pub fn key_id(&self) -> Option<&str> {
        self.header_str("kid")
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// A NumericDate claim (`exp`, `iat`, ...) in whole seconds. Fractional
    /// values are truncated; negative or non-numeric values count as absent.
    pub fn claim_timestamp(&self, name: &str) -> Option<u64> {
        let value = self.claims.get(name)?;
        value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(|secs| secs as u64)
        })
    }

    /// `base64url(header) || '.' || base64url(payload)`, exactly as received.
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>, NilaRpError> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| NilaRpError::MalformedToken(format!("{} is not valid base64url: {}", what, e)))
}

fn decode_object(segment: &str, what: &str) -> Result<Map<String, Value>, NilaRpError> {
    let bytes = decode_segment(segment, what)?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(NilaRpError::MalformedToken(format!("{} is not a JSON object", what))),
        Err(e) => Err(NilaRpError::MalformedToken(format!("{} is not valid JSON: {}", what, e))),
    }
}

/// The JWS algorithms accepted for ID Tokens: RSASSA-PKCS1-v1_5 and
/// RSASSA-PSS with SHA-2 (RFC 7518 §3.3 and §3.5).
pub const RSA_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

pub fn is_rsa_algorithm(alg: Algorithm) -> bool {
    RSA_ALGORITHMS.contains(&alg)
}

/// Looks up an `alg` header value, failing for anything outside
/// [`RSA_ALGORITHMS`].
pub fn rsa_algorithm(alg: &str) -> Result<Algorithm, NilaRpError> {
    alg.parse::<Algorithm>()
        .ok()
        .filter(|parsed| is_rsa_algorithm(*parsed))
        .ok_or_else(|| NilaRpError::UnsupportedAlgorithm(alg.to_string()))
}

/// Checks the token's signature segment against its signing input with
/// `alg` and `key`.
///
/// # Errors
///
/// `UnsupportedAlgorithm` for anything but RS256/384/512 and PS256/384/512,
/// including `none` and HMAC algorithms.
pub fn verify_signature(jwt: &Jwt, alg: &str, key: &RsaPublicKey) -> Result<bool, NilaRpError> {
    let algorithm = rsa_algorithm(alg)?;
    if jwt.signature().is_empty() {
        return Ok(false);
    }
    let verified = jsonwebtoken::crypto::verify(
        &jwt.encoded_signature,
        jwt.signing_input(),
        key.decoding_key(),
        algorithm,
    )
    .map_err(Box::new)?;
    Ok(verified)
}

/// OIDC token hash (`at_hash`, `c_hash`): the left-most half of the digest of
/// `value` under the hash function of `alg`, base64url-encoded.
pub fn token_hash(alg: &str, value: &str) -> Result<String, NilaRpError> {
    let digest = match rsa_algorithm(alg)? {
        Algorithm::RS384 | Algorithm::PS384 => Sha384::digest(value.as_bytes()).to_vec(),
        Algorithm::RS512 | Algorithm::PS512 => Sha512::digest(value.as_bytes()).to_vec(),
        _ => Sha256::digest(value.as_bytes()).to_vec(),
    };
    Ok(URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2]))
}
