// src/discovery.rs

use crate::error::NilaRpError;
use crate::http::{HttpClient, HttpRequest};
use crate::model::DiscoveryMetadata;
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Resolves OP metadata (issuer, JWKS and token endpoints) for an OP host.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn resolve(&self, op_host: &str) -> Result<DiscoveryMetadata, NilaRpError>;
}

/// A cached entry and the TTL it was stored with.
#[derive(Clone)]
struct CachedMetadata {
    metadata: Arc<DiscoveryMetadata>,
    ttl: Duration,
}

struct MetadataExpiry;

impl Expiry<String, CachedMetadata> for MetadataExpiry {
    fn expire_after_create(&self, _key: &String, value: &CachedMetadata, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// [`Discovery`] that reads `{op_host}/.well-known/openid-configuration` and
/// caches the result per host.
#[derive(Clone)]
pub struct HttpDiscovery {
    // The client is internally ref-counted to allow for cheap cloning.
    inner: Arc<Inner>,
}

struct Inner {
    http: Arc<dyn HttpClient>,
    default_cache_ttl: Duration,
    cache: Cache<String, CachedMetadata>,
}

impl HttpDiscovery {
    /// Creates a discovery client. `default_cache_ttl` applies when the OP
    /// sends no `Cache-Control: max-age`.
    pub fn new(http: Arc<dyn HttpClient>, default_cache_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(100)
            .expire_after(MetadataExpiry)
            .build();
        Self {
            inner: Arc::new(Inner {
                http,
                default_cache_ttl,
                cache,
            }),
        }
    }

    async fn fetch(&self, op_host: &str) -> Result<(DiscoveryMetadata, Duration), NilaRpError> {
        let discovery_url = format!("{}/.well-known/openid-configuration", op_host);
        debug!("Performing OIDC discovery at: {}", discovery_url);

        let request = HttpRequest::get(&discovery_url)
            .map_err(|e| NilaRpError::Discovery(e.to_string()))?
            .header("Accept", "application/json");
        let response = self
            .inner
            .http
            .execute(request)
            .await
            .map_err(|e| NilaRpError::Discovery(e.to_string()))?;

        if !response.is_success() {
            return Err(NilaRpError::Discovery(format!(
                "discovery request to {} failed with status {}",
                discovery_url, response.status
            )));
        }

        let metadata: DiscoveryMetadata = response
            .json()
            .map_err(|e| NilaRpError::Discovery(format!("invalid discovery document: {}", e)))?;

        for (name, value) in [
            ("issuer", &metadata.issuer),
            ("jwks_uri", &metadata.jwks_uri),
            ("token_endpoint", &metadata.token_endpoint),
        ] {
            if value.is_empty() {
                return Err(NilaRpError::Discovery(format!("discovery document has an empty '{}'", name)));
            }
        }

        let ttl = response.cache_max_age().unwrap_or(self.inner.default_cache_ttl);
        Ok((metadata, ttl))
    }
}

#[async_trait]
impl Discovery for HttpDiscovery {
    #[instrument(skip(self), err)]
    async fn resolve(&self, op_host: &str) -> Result<DiscoveryMetadata, NilaRpError> {
        let key = op_host.trim_end_matches('/').to_string();
        if key.is_empty() {
            return Err(NilaRpError::Discovery("op_host is empty".to_string()));
        }

        if let Some(cached) = self.inner.cache.get(&key).await {
            debug!("Discovery cache hit for {}", key);
            return Ok((*cached.metadata).clone());
        }

        let (metadata, ttl) = self.fetch(&key).await?;
        info!("Discovered OP metadata for {} (issuer {}), caching for {:?}", key, metadata.issuer, ttl);

        let metadata = Arc::new(metadata);
        self.inner
            .cache
            .insert(
                key,
                CachedMetadata {
                    metadata: metadata.clone(),
                    ttl,
                },
            )
            .await;
        Ok((*metadata).clone())
    }
}
