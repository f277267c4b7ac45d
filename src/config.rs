// src/config.rs

use crate::error::NilaRpError;
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Contains the validation settings for an OIDC ID Token.
///
/// This struct is used to configure the specific checks that will be performed
/// on the token's claims, such as allowed algorithms and clock skew tolerance.
#[derive(Clone, Debug)]
pub struct ValidationDetails {
    /// The signing algorithms that are permitted for the ID Token.
    /// Tokens signed with any other algorithm will be rejected.
    pub algorithms: Vec<Algorithm>,
    /// Tolerance added to `exp` before a token counts as expired.
    /// Defaults to zero: a token is valid only strictly before `exp`.
    pub leeway: Duration,
}

impl Default for ValidationDetails {
    fn default() -> Self {
        Self {
            algorithms: crate::jwt::RSA_ALGORITHMS.to_vec(),
            leeway: Duration::ZERO,
        }
    }
}

/// The main configuration for the relying party.
///
/// It should be constructed using the `ConfigBuilder` or loaded from YAML
/// with [`Config::from_yaml_file`].
#[derive(Clone, Debug)]
pub struct Config {
    /// The ID Token validation parameters.
    pub validation: ValidationDetails,
    /// How long resolved discovery documents are cached when the OP sends no
    /// `Cache-Control: max-age`.
    pub discovery_cache_ttl: Duration,
    /// Lifetime of issued state and nonce values.
    pub state_ttl: Duration,
    /// Request timeout of the default HTTP client.
    pub http_timeout: Duration,
    /// Scopes requested when a command does not name any.
    pub default_scopes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validation: ValidationDetails::default(),
            discovery_cache_ttl: Duration::from_secs(24 * 60 * 60),
            state_ttl: Duration::from_secs(5 * 60),
            http_timeout: Duration::from_secs(10),
            default_scopes: vec!["openid".to_string(), "profile".to_string()],
        }
    }
}

/// On-disk shape of the configuration. Every field is optional and falls back
/// to the builder defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    algorithms: Option<Vec<String>>,
    leeway_seconds: Option<u64>,
    discovery_cache_ttl_seconds: Option<u64>,
    state_ttl_seconds: Option<u64>,
    http_timeout_seconds: Option<u64>,
    default_scopes: Option<Vec<String>>,
}

impl Config {
    /// Parses a YAML document into a `Config`.
    pub fn from_yaml_str(yaml: &str) -> Result<Config, NilaRpError> {
        let file: FileConfig = serde_yaml::from_str(yaml)
            .map_err(|e| NilaRpError::InvalidConfiguration(e.to_string()))?;

        let mut builder = ConfigBuilder::new();
        if let Some(names) = file.algorithms {
            let algorithms = names
                .iter()
                .map(|name| {
                    name.parse::<Algorithm>()
                        .map_err(|_| NilaRpError::InvalidConfiguration(format!("unknown algorithm '{}'", name)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.algorithms(algorithms);
        }
        if let Some(secs) = file.leeway_seconds {
            builder = builder.leeway(Duration::from_secs(secs));
        }
        if let Some(secs) = file.discovery_cache_ttl_seconds {
            builder = builder.discovery_cache_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = file.state_ttl_seconds {
            builder = builder.state_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = file.http_timeout_seconds {
            builder = builder.http_timeout(Duration::from_secs(secs));
        }
        if let Some(scopes) = file.default_scopes {
            builder = builder.default_scopes(scopes);
        }
        builder.build()
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Config, NilaRpError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            NilaRpError::InvalidConfiguration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_yaml_str(&yaml)
    }
}

/// A builder for creating a `Config` instance.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the allowed signing algorithms.
    pub fn algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.config.validation.algorithms = algorithms;
        self
    }

    /// Sets the clock skew tolerance applied to `exp`.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.config.validation.leeway = leeway;
        self
    }

    /// Sets the fallback cache TTL for discovery documents.
    pub fn discovery_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.discovery_cache_ttl = ttl;
        self
    }

    /// Sets the lifetime of issued state and nonce values.
    pub fn state_ttl(mut self, ttl: Duration) -> Self {
        self.config.state_ttl = ttl;
        self
    }

    /// Sets the timeout of the default HTTP client.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    /// Sets the scopes requested when a command names none.
    pub fn default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.config.default_scopes = scopes;
        self
    }

    /// Consumes the builder and returns a `Config` object.
    ///
    /// # Errors
    ///
    /// Returns an error if no algorithm is allowed, if a non-RSA algorithm is
    /// allowed, or if a TTL is zero.
    pub fn build(self) -> Result<Config, NilaRpError> {
        let config = self.config;
        if config.validation.algorithms.is_empty() {
            return Err(NilaRpError::MissingConfiguration("algorithms".to_string()));
        }
        if let Some(alg) = config
            .validation
            .algorithms
            .iter()
            .find(|alg| !crate::jwt::is_rsa_algorithm(**alg))
        {
            return Err(NilaRpError::InvalidConfiguration(format!(
                "algorithm {:?} is not an RSA signature algorithm",
                alg
            )));
        }
        if config.state_ttl.is_zero() || config.discovery_cache_ttl.is_zero() {
            return Err(NilaRpError::InvalidConfiguration("TTLs must be greater than zero".to_string()));
        }
        Ok(config)
    }
}
