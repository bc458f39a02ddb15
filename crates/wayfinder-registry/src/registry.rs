//! Registry handle and backend factory
//!
//! `Registry` is the cloneable entry point used by the transport layer. It
//! forwards every call to the configured backend and applies the optional
//! per-request deadline.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use wayfinder_common::{BACKEND_MEMORY, BACKEND_REDIS, RegistryError, Result};

use crate::config::RegistryConfig;
use crate::memory::MemoryStorage;
use crate::model::{HealthStatus, ServiceInstance, ServiceSummary};
use crate::redis::RedisStorage;
use crate::storage::Storage;

/// Build the backend named by `config.backend`
///
/// The durable backend is connected and pinged before it is returned.
pub async fn create_storage(config: &RegistryConfig) -> Result<Arc<dyn Storage>> {
    match config.backend.to_lowercase().as_str() {
        BACKEND_MEMORY => {
            info!("Using in-memory registry backend");
            Ok(Arc::new(MemoryStorage::new()))
        }
        BACKEND_REDIS => {
            let storage = RedisStorage::connect(&config.redis).await.map_err(|e| {
                warn!(error = %e, "Failed to connect redis registry backend");
                e
            })?;
            info!(prefix = %config.redis.key_prefix, "Using redis registry backend");
            Ok(Arc::new(storage))
        }
        other => Err(RegistryError::Misconfiguration(format!(
            "unsupported registry backend '{}'",
            other
        ))),
    }
}

/// Shared handle over one storage backend
#[derive(Clone)]
pub struct Registry {
    storage: Arc<dyn Storage>,
    deadline: Option<Duration>,
}

impl Registry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            deadline: None,
        }
    }

    /// Fail calls that take longer than `deadline` with `BackendUnavailable`
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn from_config(config: &RegistryConfig) -> Result<Self> {
        let storage = create_storage(config).await?;
        Ok(Self::new(storage).with_deadline(config.request_timeout()))
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    pub fn backend(&self) -> &'static str {
        self.storage.kind()
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, call).await.unwrap_or_else(|_| {
                Err(RegistryError::BackendUnavailable(format!(
                    "deadline of {}ms exceeded",
                    deadline.as_millis()
                )))
            }),
            None => call.await,
        }
    }

    pub async fn register(&self, instance: ServiceInstance) -> Result<()> {
        self.bounded(self.storage.register(instance)).await
    }

    pub async fn deregister(&self, id: &str) -> Result<()> {
        self.bounded(self.storage.deregister(id)).await
    }

    pub async fn get(&self, id: &str) -> Result<ServiceInstance> {
        self.bounded(self.storage.get(id)).await
    }

    pub async fn list_by_name(&self, name: &str) -> Result<Vec<ServiceInstance>> {
        self.bounded(self.storage.list_by_name(name)).await
    }

    pub async fn list_by_name_and_tags(
        &self,
        name: &str,
        tags: &[String],
    ) -> Result<Vec<ServiceInstance>> {
        self.bounded(self.storage.list_by_name_and_tags(name, tags))
            .await
    }

    pub async fn list_all(&self) -> Result<HashMap<String, Vec<ServiceInstance>>> {
        self.bounded(self.storage.list_all()).await
    }

    pub async fn get_healthy(&self, name: &str) -> Result<Vec<ServiceInstance>> {
        self.bounded(self.storage.get_healthy(name)).await
    }

    pub async fn get_healthy_by_tags(
        &self,
        name: &str,
        tags: &[String],
    ) -> Result<Vec<ServiceInstance>> {
        self.bounded(self.storage.get_healthy_by_tags(name, tags))
            .await
    }

    pub async fn update_health(&self, id: &str, health: HealthStatus) -> Result<()> {
        self.bounded(self.storage.update_health(id, health)).await
    }

    pub async fn refresh_ttl(&self, id: &str, ttl: i64) -> Result<()> {
        self.bounded(self.storage.refresh_ttl(id, ttl)).await
    }

    pub async fn sweep_expired(&self) -> Result<usize> {
        self.bounded(self.storage.sweep_expired()).await
    }

    /// Pick the listing call matching the query shape
    pub async fn discover(
        &self,
        name: &str,
        tags: &[String],
        healthy_only: bool,
    ) -> Result<Vec<ServiceInstance>> {
        match (tags.is_empty(), healthy_only) {
            (true, false) => self.list_by_name(name).await,
            (true, true) => self.get_healthy(name).await,
            (false, false) => self.list_by_name_and_tags(name, tags).await,
            (false, true) => self.get_healthy_by_tags(name, tags).await,
        }
    }

    /// Instance counts per service, ordered by service name
    pub async fn summary(&self) -> Result<Vec<ServiceSummary>> {
        let mut summaries: Vec<ServiceSummary> = self
            .list_all()
            .await?
            .into_iter()
            .map(|(name, instances)| ServiceSummary {
                instance_count: instances.len(),
                healthy_instance_count: instances.iter().filter(|i| i.is_healthy()).count(),
                name,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// Close the backend; later calls fail with `BackendUnavailable`
    pub async fn close(&self) -> Result<()> {
        self.storage.close().await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::model::HealthState;

    /// Backend that never answers
    struct Stalled;

    #[async_trait]
    impl Storage for Stalled {
        fn kind(&self) -> &'static str {
            "stalled"
        }

        async fn register(&self, _instance: ServiceInstance) -> Result<()> {
            futures::future::pending().await
        }

        async fn deregister(&self, _id: &str) -> Result<()> {
            futures::future::pending().await
        }

        async fn get(&self, _id: &str) -> Result<ServiceInstance> {
            futures::future::pending().await
        }

        async fn list_by_name(&self, _name: &str) -> Result<Vec<ServiceInstance>> {
            futures::future::pending().await
        }

        async fn list_by_name_and_tags(
            &self,
            _name: &str,
            _tags: &[String],
        ) -> Result<Vec<ServiceInstance>> {
            futures::future::pending().await
        }

        async fn list_all(&self) -> Result<HashMap<String, Vec<ServiceInstance>>> {
            futures::future::pending().await
        }

        async fn update_health(&self, _id: &str, _health: HealthStatus) -> Result<()> {
            futures::future::pending().await
        }

        async fn refresh_ttl(&self, _id: &str, _ttl: i64) -> Result<()> {
            futures::future::pending().await
        }

        async fn sweep_expired(&self) -> Result<usize> {
            futures::future::pending().await
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn memory_registry() -> Registry {
        Registry::new(Arc::new(MemoryStorage::new()))
    }

    fn instance(id: &str, name: &str, tags: &[&str]) -> ServiceInstance {
        ServiceInstance::new(id, name, "10.0.0.1", 8080).with_tags(tags.iter().copied())
    }

    #[tokio::test]
    async fn test_create_storage_memory() {
        let storage = create_storage(&RegistryConfig::default()).await.unwrap();
        assert_eq!(storage.kind(), "memory");
    }

    #[tokio::test]
    async fn test_create_storage_unknown_backend() {
        let config = RegistryConfig {
            backend: "etcd".to_string(),
            ..Default::default()
        };
        let err = create_storage(&config).await.err().unwrap();
        assert!(matches!(err, RegistryError::Misconfiguration(_)));
    }

    #[tokio::test]
    async fn test_create_storage_backend_name_is_case_insensitive() {
        let config = RegistryConfig {
            backend: "MEMORY".to_string(),
            ..Default::default()
        };
        assert!(create_storage(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_discover_selects_listing() {
        let registry = memory_registry();
        registry.register(instance("a", "web", &["v1"])).await.unwrap();
        registry.register(instance("b", "web", &["v2"])).await.unwrap();
        registry
            .update_health("b", HealthStatus::new(HealthState::Critical, "down"))
            .await
            .unwrap();

        let v1 = vec!["v1".to_string()];
        assert_eq!(registry.discover("web", &[], false).await.unwrap().len(), 2);
        assert_eq!(registry.discover("web", &[], true).await.unwrap().len(), 1);
        assert_eq!(registry.discover("web", &v1, false).await.unwrap().len(), 1);

        let v2 = vec!["v2".to_string()];
        assert!(registry.discover("web", &v2, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_counts_per_service() {
        let registry = memory_registry();
        registry.register(instance("a", "web", &[])).await.unwrap();
        registry.register(instance("b", "web", &[])).await.unwrap();
        registry.register(instance("c", "db", &[])).await.unwrap();
        registry
            .update_health("a", HealthStatus::new(HealthState::Warning, "slow"))
            .await
            .unwrap();

        let summary = registry.summary().await.unwrap();
        assert_eq!(
            summary,
            vec![
                ServiceSummary {
                    name: "db".to_string(),
                    instance_count: 1,
                    healthy_instance_count: 1,
                },
                ServiceSummary {
                    name: "web".to_string(),
                    instance_count: 2,
                    healthy_instance_count: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_deadline_maps_to_backend_unavailable() {
        let registry =
            Registry::new(Arc::new(Stalled)).with_deadline(Some(Duration::from_millis(20)));

        let err = registry.get("anything").await.unwrap_err();
        assert!(matches!(err, RegistryError::BackendUnavailable(_)));

        let err = registry.discover("web", &[], true).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_closed_registry_is_unavailable() {
        let registry = memory_registry();
        registry.register(instance("a", "web", &[])).await.unwrap();
        registry.close().await.unwrap();
        registry.close().await.unwrap();

        let err = registry.list_by_name("web").await.unwrap_err();
        assert!(matches!(err, RegistryError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_clones_share_backend() {
        let registry = memory_registry();
        let clone = registry.clone();
        clone.register(instance("a", "web", &[])).await.unwrap();

        assert_eq!(registry.get("a").await.unwrap().name, "web");
        assert_eq!(registry.backend(), "memory");
    }
}
