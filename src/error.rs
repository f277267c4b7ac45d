// src/error.rs

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failure, as reported to the calling application.
///
/// Every [`NilaRpError`] belongs to exactly one kind. None of them is fatal to
/// the process: a failure is always scoped to the single command being handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid input parameters. Not retried.
    BadRequest,
    /// The OP answered with success but left out a required field.
    ProtocolViolation,
    /// A state or nonce failed its single-use check.
    ReplayRejected,
    /// The ID Token did not validate. The underlying cause is only logged.
    TokenInvalid,
    /// Network or parse failure talking to the OP (discovery, token endpoint, JWKS).
    TransportError,
    /// The command discriminator is not recognized.
    UnsupportedCommand,
    /// A collaborator (site store, configuration) misbehaved.
    Internal,
}

/// The primary error type for the `nila-rp` library.
#[derive(Debug, Error)]
pub enum NilaRpError {
    /// The compact token is structurally invalid (segments, encoding, JSON).
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The signing algorithm is not one of the supported RSA schemes.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The JWKS document could not be fetched or parsed.
    #[error("Failed to fetch JWKS: {0}")]
    KeyFetch(String),

    /// A key with the specified 'kid' was not found in the JSON Web Key Set.
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),

    /// The matched JWK is not an RSA key.
    #[error("Unsupported key type '{kty}' for kid: {kid}")]
    UnsupportedKeyType { kid: String, kty: String },

    /// A cryptographic key (JWK components) is malformed.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// An error from the underlying `jsonwebtoken` library.
    #[error("JWT processing error: {0}")]
    JwtError(#[from] Box<jsonwebtoken::errors::Error>),

    /// OP metadata could not be resolved.
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// An error occurred during an HTTP request.
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A required configuration field is missing.
    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("The 'code' parameter is empty")]
    NoCode,

    #[error("The 'state' parameter is empty")]
    NoState,

    /// The state is unknown, expired or already consumed.
    #[error("The 'state' parameter is not valid")]
    StateNotValid,

    #[error("No site is registered under oxd_id: {0}")]
    InvalidOxdId(String),

    /// A required command parameter is missing or empty.
    #[error("The '{0}' parameter is missing or empty")]
    MissingParameter(&'static str),

    /// The command parameters could not be deserialized or are inconsistent.
    #[error("Invalid command parameters: {0}")]
    InvalidParams(String),

    /// The token endpoint answered with a non-success, non-redirect status.
    #[error("Tokens were not obtained, token endpoint responded with status {status}")]
    TokensNotObtained { status: u16 },

    /// The OP answered with a body that could not be parsed.
    #[error("Invalid response from the OP: {0}")]
    InvalidOpResponse(String),

    /// Usually the `openid` scope was not requested.
    #[error("id_token is not returned")]
    NoIdTokenReturned,

    #[error("access_token is not returned")]
    NoAccessTokenReturned,

    /// The nonce in the returned ID Token is unknown, expired or already consumed.
    #[error("Nonce is not valid")]
    InvalidNonce,

    /// Deliberately carries no detail; the validator logs the cause.
    #[error("ID Token is not valid")]
    InvalidIdToken,

    /// The discovery document does not advertise an endpoint the command needs.
    #[error("The OP does not advertise an endpoint: {0}")]
    MissingEndpoint(&'static str),

    /// The userinfo endpoint answered with a non-success status.
    #[error("User info request failed with status {status}")]
    UserInfoNotObtained { status: u16 },

    /// The authorization endpoint answered without redirecting.
    #[error("Authorization code was not obtained, authorization endpoint responded with status {status}")]
    AuthorizationCodeNotObtained { status: u16 },

    /// The authorization redirect carries no `code`, e.g. because the OP
    /// rejected the end-user credentials.
    #[error("authorization code is not returned")]
    NoAuthorizationCode,

    /// `rs_protect` would replace resources already registered for the site.
    #[error("Resources are already protected for site {0}, set 'overwrite' to replace them")]
    ResourcesAlreadyProtected(String),

    /// `rs_check_access` asked about a path no resource registers.
    #[error("Path is not protected: {0}")]
    PathNotProtected(String),

    /// The introspection endpoint answered with a non-success status.
    #[error("Token introspection failed with status {status}")]
    IntrospectionFailed { status: u16 },

    /// The command discriminator is not recognized.
    #[error("Command is not supported: {0}")]
    UnsupportedCommand(String),

    /// The site store rejected an operation.
    #[error("Site store error: {0}")]
    SiteStore(String),

    /// An update tried to change `client_id` or `client_secret` of a registered site.
    #[error("Client credentials of site {0} cannot be changed")]
    ImmutableClientCredentials(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NilaRpError {
    /// Returns the classification reported to the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NilaRpError::NoCode
            | NilaRpError::NoState
            | NilaRpError::InvalidOxdId(_)
            | NilaRpError::MissingParameter(_)
            | NilaRpError::InvalidParams(_)
            | NilaRpError::MalformedToken(_)
            | NilaRpError::InvalidUrl(_)
            | NilaRpError::ResourcesAlreadyProtected(_)
            | NilaRpError::PathNotProtected(_) => ErrorKind::BadRequest,

            NilaRpError::StateNotValid | NilaRpError::InvalidNonce => ErrorKind::ReplayRejected,

            NilaRpError::NoIdTokenReturned
            | NilaRpError::NoAccessTokenReturned
            | NilaRpError::NoAuthorizationCode
            | NilaRpError::MissingEndpoint(_) => ErrorKind::ProtocolViolation,

            NilaRpError::InvalidIdToken
            | NilaRpError::UnsupportedAlgorithm(_)
            | NilaRpError::KeyNotFound(_)
            | NilaRpError::UnsupportedKeyType { .. }
            | NilaRpError::InvalidKeyFormat(_)
            | NilaRpError::JwtError(_) => ErrorKind::TokenInvalid,

            NilaRpError::KeyFetch(_)
            | NilaRpError::Discovery(_)
            | NilaRpError::HttpError(_)
            | NilaRpError::TokensNotObtained { .. }
            | NilaRpError::InvalidOpResponse(_)
            | NilaRpError::UserInfoNotObtained { .. }
            | NilaRpError::AuthorizationCodeNotObtained { .. }
            | NilaRpError::IntrospectionFailed { .. } => ErrorKind::TransportError,

            NilaRpError::UnsupportedCommand(_) => ErrorKind::UnsupportedCommand,

            NilaRpError::MissingConfiguration(_)
            | NilaRpError::InvalidConfiguration(_)
            | NilaRpError::SiteStore(_)
            | NilaRpError::ImmutableClientCredentials(_)
            | NilaRpError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Machine-readable error code placed in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            NilaRpError::NoCode => "bad_request_no_code",
            NilaRpError::NoState => "bad_request_no_state",
            NilaRpError::StateNotValid => "bad_request_state_not_valid",
            NilaRpError::InvalidOxdId(_) => "bad_request_invalid_oxd_id",
            NilaRpError::MissingParameter(_) | NilaRpError::InvalidParams(_) => "bad_request",
            NilaRpError::MalformedToken(_) => "bad_request_malformed_token",
            NilaRpError::InvalidUrl(_) => "bad_request_invalid_url",
            NilaRpError::NoIdTokenReturned => "no_id_token_returned",
            NilaRpError::NoAccessTokenReturned => "no_access_token_returned",
            NilaRpError::MissingEndpoint(_) => "missing_op_endpoint",
            NilaRpError::InvalidNonce => "invalid_nonce",
            NilaRpError::InvalidIdToken
            | NilaRpError::UnsupportedAlgorithm(_)
            | NilaRpError::KeyNotFound(_)
            | NilaRpError::UnsupportedKeyType { .. }
            | NilaRpError::InvalidKeyFormat(_)
            | NilaRpError::JwtError(_) => "invalid_id_token",
            NilaRpError::TokensNotObtained { .. } => "tokens_not_obtained",
            NilaRpError::InvalidOpResponse(_) => "invalid_op_response",
            NilaRpError::UserInfoNotObtained { .. } => "user_info_not_obtained",
            NilaRpError::AuthorizationCodeNotObtained { .. } => "authorization_code_not_obtained",
            NilaRpError::NoAuthorizationCode => "no_authorization_code_returned",
            NilaRpError::ResourcesAlreadyProtected(_) => "bad_request_resources_already_protected",
            NilaRpError::PathNotProtected(_) => "bad_request_path_not_protected",
            NilaRpError::IntrospectionFailed { .. } => "introspection_failed",
            NilaRpError::KeyFetch(_) | NilaRpError::Discovery(_) | NilaRpError::HttpError(_) => {
                "op_unreachable"
            }
            NilaRpError::UnsupportedCommand(_) => "unsupported_command",
            NilaRpError::MissingConfiguration(_)
            | NilaRpError::InvalidConfiguration(_)
            | NilaRpError::SiteStore(_)
            | NilaRpError::ImmutableClientCredentials(_)
            | NilaRpError::Internal(_) => "internal_error",
        }
    }

    /// Human-readable message for the response envelope.
    ///
    /// Token validation failures all read the same so a caller cannot tell a
    /// key fetch problem from a signature mismatch.
    pub fn description(&self) -> String {
        match self.kind() {
            ErrorKind::TokenInvalid => NilaRpError::InvalidIdToken.to_string(),
            _ => self.to_string(),
        }
    }
}
