// src/state.rs

use crate::error::NilaRpError;
use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Tracks the `state` values of pending authorization requests.
///
/// Implementations synchronize internally and enforce their own expiry: an
/// expired state must read as invalid.
#[async_trait]
pub trait StateRegistry: Send + Sync {
    /// Issues a fresh state value.
    async fn generate_state(&self) -> String;

    async fn is_state_valid(&self, state: &str) -> bool;

    /// Consumes `state`. Afterwards `is_state_valid(state)` is false.
    async fn invalidate_state(&self, state: &str) -> Result<(), NilaRpError>;
}

/// Tracks the `nonce` values of pending authorization requests.
#[async_trait]
pub trait NonceRegistry: Send + Sync {
    /// Issues a fresh nonce value.
    async fn generate_nonce(&self) -> String;

    async fn is_nonce_valid(&self, nonce: &str) -> bool;

    /// Consumes `nonce`. Afterwards `is_nonce_valid(nonce)` is false.
    async fn invalidate_nonce(&self, nonce: &str) -> Result<(), NilaRpError>;
}

/// In-process state and nonce registry.
///
/// Values live in two moka caches whose `time_to_live` is the configured
/// state lifetime, so unused values disappear on their own. There is no
/// size bound: a pending value is only ever dropped by expiry or use.
#[derive(Clone)]
pub struct InMemoryStateRegistry {
    states: Cache<String, ()>,
    nonces: Cache<String, ()>,
}

impl InMemoryStateRegistry {
    pub fn new(ttl: Duration) -> Self {
        let build = || -> Cache<String, ()> { Cache::builder().time_to_live(ttl).build() };
        Self {
            states: build(),
            nonces: build(),
        }
    }

    /// Registers an externally created state value.
    pub async fn insert_state(&self, state: impl Into<String>) {
        self.states.insert(state.into(), ()).await;
    }

    /// Registers an externally created nonce value.
    pub async fn insert_nonce(&self, nonce: impl Into<String>) {
        self.nonces.insert(nonce.into(), ()).await;
    }
}

#[async_trait]
impl StateRegistry for InMemoryStateRegistry {
    async fn generate_state(&self) -> String {
        let state = Uuid::new_v4().to_string();
        self.states.insert(state.clone(), ()).await;
        state
    }

    async fn is_state_valid(&self, state: &str) -> bool {
        !state.is_empty() && self.states.get(state).await.is_some()
    }

    async fn invalidate_state(&self, state: &str) -> Result<(), NilaRpError> {
        self.states.invalidate(state).await;
        debug!("State invalidated");
        Ok(())
    }
}

#[async_trait]
impl NonceRegistry for InMemoryStateRegistry {
    async fn generate_nonce(&self) -> String {
        let nonce = Uuid::new_v4().to_string();
        self.nonces.insert(nonce.clone(), ()).await;
        nonce
    }

    async fn is_nonce_valid(&self, nonce: &str) -> bool {
        !nonce.is_empty() && self.nonces.get(nonce).await.is_some()
    }

    async fn invalidate_nonce(&self, nonce: &str) -> Result<(), NilaRpError> {
        self.nonces.invalidate(nonce).await;
        debug!("Nonce invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generated_values_are_valid_until_invalidated() {
        let registry = InMemoryStateRegistry::new(Duration::from_secs(60));

        let state = registry.generate_state().await;
        let nonce = registry.generate_nonce().await;
        assert_ne!(state, nonce);
        assert!(registry.is_state_valid(&state).await);
        assert!(registry.is_nonce_valid(&nonce).await);

        registry.invalidate_state(&state).await.unwrap();
        assert!(!registry.is_state_valid(&state).await);
        assert!(registry.is_nonce_valid(&nonce).await);

        registry.invalidate_nonce(&nonce).await.unwrap();
        assert!(!registry.is_nonce_valid(&nonce).await);
    }

    #[tokio::test]
    async fn states_and_nonces_are_separate_namespaces() {
        let registry = InMemoryStateRegistry::new(Duration::from_secs(60));
        registry.insert_state("s1").await;

        assert!(registry.is_state_valid("s1").await);
        assert!(!registry.is_nonce_valid("s1").await);
        assert!(!registry.is_state_valid("").await);
        assert!(!registry.is_state_valid("unknown").await);
    }

    #[tokio::test]
    async fn pending_values_are_not_evicted_under_load() {
        let registry = InMemoryStateRegistry::new(Duration::from_secs(60));
        let first = registry.generate_state().await;
        for i in 0..100_050 {
            registry.insert_state(format!("s-{}", i)).await;
        }
        registry.states.run_pending_tasks().await;

        assert_eq!(registry.states.entry_count(), 100_051);
        assert!(registry.is_state_valid(&first).await);
        assert!(registry.is_state_valid("s-0").await);
        assert!(registry.is_state_valid("s-100049").await);
    }

    #[tokio::test]
    async fn values_expire_after_ttl() {
        let registry = InMemoryStateRegistry::new(Duration::from_millis(50));
        registry.insert_state("short-lived").await;
        assert!(registry.is_state_valid("short-lived").await);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!registry.is_state_valid("short-lived").await);
    }
}
