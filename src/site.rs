// src/site.rs

use crate::error::NilaRpError;
use crate::model::ProtectedResource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use tracing::debug;

/// A registered client application ("site") and the tokens last obtained for it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfiguration {
    pub oxd_id: String,
    pub op_host: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorization_redirect_uri: String,
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Resource-server paths registered with `rs_protect`.
    #[serde(default)]
    pub resources: Vec<ProtectedResource>,
}

// Secrets and tokens stay out of logs.
impl fmt::Debug for SiteConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteConfiguration")
            .field("oxd_id", &self.oxd_id)
            .field("op_host", &self.op_host)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorization_redirect_uri", &self.authorization_redirect_uri)
            .field("post_logout_redirect_uri", &self.post_logout_redirect_uri)
            .field("scope", &self.scope)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("resources", &self.resources)
            .finish()
    }
}

/// Persistence of site registrations.
///
/// Each call is atomic on its own; nothing is assumed across calls.
#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn get(&self, oxd_id: &str) -> Result<Option<SiteConfiguration>, NilaRpError>;

    /// Stores a new site. Fails if `oxd_id` is taken.
    async fn create(&self, site: SiteConfiguration) -> Result<(), NilaRpError>;

    /// Replaces a stored site. `client_id` and `client_secret` must not change.
    async fn update(&self, site: SiteConfiguration) -> Result<(), NilaRpError>;
}

/// [`SiteStore`] kept in process memory.
#[derive(Default)]
pub struct InMemorySiteStore {
    sites: RwLock<HashMap<String, SiteConfiguration>>,
}

impl InMemorySiteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SiteStore for InMemorySiteStore {
    async fn get(&self, oxd_id: &str) -> Result<Option<SiteConfiguration>, NilaRpError> {
        Ok(self.sites.read().await.get(oxd_id).cloned())
    }

    async fn create(&self, site: SiteConfiguration) -> Result<(), NilaRpError> {
        let mut sites = self.sites.write().await;
        if sites.contains_key(&site.oxd_id) {
            return Err(NilaRpError::SiteStore(format!("site {} already exists", site.oxd_id)));
        }
        debug!("Creating site {}", site.oxd_id);
        sites.insert(site.oxd_id.clone(), site);
        Ok(())
    }

    async fn update(&self, site: SiteConfiguration) -> Result<(), NilaRpError> {
        let mut sites = self.sites.write().await;
        let stored = sites
            .get_mut(&site.oxd_id)
            .ok_or_else(|| NilaRpError::SiteStore(format!("site {} does not exist", site.oxd_id)))?;
        if stored.client_id != site.client_id || stored.client_secret != site.client_secret {
            return Err(NilaRpError::ImmutableClientCredentials(site.oxd_id));
        }
        debug!("Updating site {}", site.oxd_id);
        *stored = site;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteConfiguration {
        SiteConfiguration {
            oxd_id: "site-1".to_string(),
            op_host: "https://op.example".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            authorization_redirect_uri: "https://rp.example/cb".to_string(),
            post_logout_redirect_uri: None,
            scope: vec!["openid".to_string()],
            id_token: None,
            access_token: None,
            resources: Vec::new(),
        }
    }

    #[tokio::test]
    async fn update_replaces_tokens_but_not_credentials() {
        let store = InMemorySiteStore::new();
        store.create(site()).await.unwrap();
        assert!(matches!(store.create(site()).await, Err(NilaRpError::SiteStore(_))));

        let mut with_tokens = site();
        with_tokens.id_token = Some("id".to_string());
        with_tokens.access_token = Some("at".to_string());
        store.update(with_tokens.clone()).await.unwrap();
        assert_eq!(store.get("site-1").await.unwrap(), Some(with_tokens));

        let mut new_secret = site();
        new_secret.client_secret = "other".to_string();
        assert!(matches!(
            store.update(new_secret).await,
            Err(NilaRpError::ImmutableClientCredentials(_))
        ));
        assert_eq!(store.get("site-1").await.unwrap().unwrap().client_secret, "secret");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut s = site();
        s.access_token = Some("very-secret-token".to_string());
        let printed = format!("{:?}", s);
        assert!(!printed.contains("\"secret\""));
        assert!(!printed.contains("very-secret-token"));
    }
}
