//! Storage contract shared by every registry backend
//!
//! Backends implement the listing and mutation primitives; the healthy-only
//! discovery calls are provided once here so both backends filter identically.

use std::collections::HashMap;

use async_trait::async_trait;
use wayfinder_common::Result;

use crate::model::{HealthStatus, ServiceInstance};

/// Registry storage backend
///
/// Every read returns owned copies; callers never hold references into
/// backend state.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend identifier used in logs
    fn kind(&self) -> &'static str;

    /// Insert or replace the instance keyed by `id`, stamping `last_seen`
    async fn register(&self, instance: ServiceInstance) -> Result<()>;

    /// Remove the instance from every index; `NotFound` if absent
    async fn deregister(&self, id: &str) -> Result<()>;

    async fn get(&self, id: &str) -> Result<ServiceInstance>;

    /// All instances registered under `name`; empty when the name is unknown
    async fn list_by_name(&self, name: &str) -> Result<Vec<ServiceInstance>>;

    /// Instances carrying every tag in `tags`, restricted to `name` unless it is empty
    async fn list_by_name_and_tags(
        &self,
        name: &str,
        tags: &[String],
    ) -> Result<Vec<ServiceInstance>>;

    async fn list_all(&self) -> Result<HashMap<String, Vec<ServiceInstance>>>;

    /// Replace the health of an instance; `NotFound` if absent
    async fn update_health(&self, id: &str, health: HealthStatus) -> Result<()>;

    /// Replace `ttl` and stamp `last_seen`; `NotFound` if absent
    async fn refresh_ttl(&self, id: &str, ttl: i64) -> Result<()>;

    /// Drop expired entries and return how many were removed
    async fn sweep_expired(&self) -> Result<usize>;

    /// Release backend resources; calling it again is a no-op
    async fn close(&self) -> Result<()>;

    async fn get_healthy(&self, name: &str) -> Result<Vec<ServiceInstance>> {
        Ok(retain_healthy(self.list_by_name(name).await?))
    }

    async fn get_healthy_by_tags(
        &self,
        name: &str,
        tags: &[String],
    ) -> Result<Vec<ServiceInstance>> {
        Ok(retain_healthy(self.list_by_name_and_tags(name, tags).await?))
    }
}

/// Keep only instances whose last reported status is passing
pub fn retain_healthy(mut instances: Vec<ServiceInstance>) -> Vec<ServiceInstance> {
    instances.retain(ServiceInstance::is_healthy);
    instances
}

/// Keep only instances carrying every tag in `tags` and, if `name` is set, that name
pub fn retain_matching(
    mut instances: Vec<ServiceInstance>,
    name: &str,
    tags: &[String],
) -> Vec<ServiceInstance> {
    instances.retain(|i| (name.is_empty() || i.name == name) && i.has_all_tags(tags));
    instances
}

/// Stable output order for list results
pub(crate) fn sort_by_id(instances: &mut [ServiceInstance]) {
    instances.sort_by(|a, b| a.id.cmp(&b.id));
}
