//! In-memory registry backend
//!
//! Three coordinated indexes live behind one reader/writer lock:
//! - `by_id`: id -> instance (authoritative)
//! - `by_name`: service name -> ids
//! - `by_tag`: tag -> ids
//!
//! Every mutation takes the write lock for its whole duration, reads take the
//! shared lock, and no lock is held across an await point.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};
use wayfinder_common::{RegistryError, Result};

use crate::model::{HealthStatus, ServiceInstance};
use crate::storage::{Storage, sort_by_id};

#[derive(Default)]
struct Indexes {
    by_id: HashMap<String, ServiceInstance>,
    by_name: HashMap<String, HashSet<String>>,
    by_tag: HashMap<String, HashSet<String>>,
}

impl Indexes {
    fn insert(&mut self, instance: ServiceInstance) {
        // Stale memberships of the previous version go first
        if let Some(previous) = self.by_id.get(&instance.id) {
            let stale_tags: Vec<String> = previous.tags.iter().cloned().collect();
            let previous_name = previous.name.clone();
            for tag in &stale_tags {
                unlink(&mut self.by_tag, tag, &instance.id);
            }
            if previous_name != instance.name {
                unlink(&mut self.by_name, &previous_name, &instance.id);
            }
        }

        self.by_name
            .entry(instance.name.clone())
            .or_default()
            .insert(instance.id.clone());
        for tag in &instance.tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(instance.id.clone());
        }
        self.by_id.insert(instance.id.clone(), instance);
    }

    fn remove(&mut self, id: &str) -> Option<ServiceInstance> {
        let instance = self.by_id.remove(id)?;
        unlink(&mut self.by_name, &instance.name, id);
        for tag in &instance.tags {
            unlink(&mut self.by_tag, tag, id);
        }
        Some(instance)
    }

    fn copies<'a>(&self, ids: impl IntoIterator<Item = &'a String>) -> Vec<ServiceInstance> {
        let mut list: Vec<ServiceInstance> = ids
            .into_iter()
            .filter_map(|id| self.by_id.get(id))
            .cloned()
            .collect();
        sort_by_id(&mut list);
        list
    }

    /// Ids carrying every tag, narrowed bucket by bucket
    fn intersect_tags(&self, tags: &[String]) -> HashSet<String> {
        let Some((first, rest)) = tags.split_first() else {
            return HashSet::new();
        };
        let Some(seed) = self.by_tag.get(first) else {
            return HashSet::new();
        };

        let mut candidates = seed.clone();
        for tag in rest {
            let Some(bucket) = self.by_tag.get(tag) else {
                return HashSet::new();
            };
            candidates.retain(|id| bucket.contains(id));
            if candidates.is_empty() {
                break;
            }
        }
        candidates
    }
}

/// Remove `id` from the bucket at `key`, dropping the bucket once empty
fn unlink(index: &mut HashMap<String, HashSet<String>>, key: &str, id: &str) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.remove(id);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

/// Process-local registry backend
#[derive(Default)]
pub struct MemoryStorage {
    indexes: RwLock<Indexes>,
    closed: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RegistryError::BackendUnavailable(
                "memory registry is closed".to_string(),
            ));
        }
        Ok(())
    }

    /// Remove every instance that expired before `now`
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        self.ensure_open()?;
        let mut indexes = self.indexes.write();

        let expired: Vec<String> = indexes
            .by_id
            .values()
            .filter(|i| i.is_expired_at(now))
            .map(|i| i.id.clone())
            .collect();

        for id in &expired {
            if let Some(instance) = indexes.remove(id) {
                debug!(
                    id = %instance.id,
                    name = %instance.name,
                    ttl = instance.ttl,
                    "Expired instance removed"
                );
            }
        }
        if !expired.is_empty() {
            info!(evicted = expired.len(), "Swept expired instances");
        }

        Ok(expired.len())
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.indexes.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn bucket_counts(&self) -> (usize, usize) {
        let indexes = self.indexes.read();
        (indexes.by_name.len(), indexes.by_tag.len())
    }

    #[cfg(test)]
    fn ids_tagged(&self, tag: &str) -> HashSet<String> {
        self.indexes
            .read()
            .by_tag
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn kind(&self) -> &'static str {
        wayfinder_common::BACKEND_MEMORY
    }

    async fn register(&self, mut instance: ServiceInstance) -> Result<()> {
        self.ensure_open()?;
        instance.last_seen = Utc::now();
        debug!(id = %instance.id, name = %instance.name, "Registering instance");
        self.indexes.write().insert(instance);
        Ok(())
    }

    async fn deregister(&self, id: &str) -> Result<()> {
        self.ensure_open()?;
        let removed = self.indexes.write().remove(id);
        match removed {
            Some(instance) => {
                info!(id = %id, name = %instance.name, "Instance deregistered");
                Ok(())
            }
            None => Err(RegistryError::not_found(id)),
        }
    }

    async fn get(&self, id: &str) -> Result<ServiceInstance> {
        self.ensure_open()?;
        self.indexes
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(id))
    }

    async fn list_by_name(&self, name: &str) -> Result<Vec<ServiceInstance>> {
        self.ensure_open()?;
        let indexes = self.indexes.read();
        Ok(indexes
            .by_name
            .get(name)
            .map(|ids| indexes.copies(ids))
            .unwrap_or_default())
    }

    async fn list_by_name_and_tags(
        &self,
        name: &str,
        tags: &[String],
    ) -> Result<Vec<ServiceInstance>> {
        if tags.is_empty() {
            return self.list_by_name(name).await;
        }
        self.ensure_open()?;

        let indexes = self.indexes.read();
        let candidates = indexes.intersect_tags(tags);
        let mut list = indexes.copies(&candidates);
        if !name.is_empty() {
            list.retain(|i| i.name == name);
        }
        Ok(list)
    }

    async fn list_all(&self) -> Result<HashMap<String, Vec<ServiceInstance>>> {
        self.ensure_open()?;
        let indexes = self.indexes.read();
        Ok(indexes
            .by_name
            .iter()
            .map(|(name, ids)| (name.clone(), indexes.copies(ids)))
            .collect())
    }

    async fn update_health(&self, id: &str, health: HealthStatus) -> Result<()> {
        self.ensure_open()?;
        let mut indexes = self.indexes.write();
        let instance = indexes
            .by_id
            .get_mut(id)
            .ok_or_else(|| RegistryError::not_found(id))?;
        debug!(id = %id, status = %health.status, "Health updated");
        instance.health = health;
        Ok(())
    }

    async fn refresh_ttl(&self, id: &str, ttl: i64) -> Result<()> {
        self.ensure_open()?;
        let mut indexes = self.indexes.write();
        let instance = indexes
            .by_id
            .get_mut(id)
            .ok_or_else(|| RegistryError::not_found(id))?;
        instance.ttl = ttl;
        instance.last_seen = Utc::now();
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<usize> {
        self.sweep_expired_at(Utc::now())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut indexes = self.indexes.write();
        let dropped = indexes.by_id.len();
        *indexes = Indexes::default();
        info!(dropped, "Memory registry closed");
        Ok(())
    }
}
