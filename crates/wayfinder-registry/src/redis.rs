//! Redis-backed durable registry backend
//!
//! Layout, relative to the configured key prefix:
//! - `instance:{len(name)}:{name}:{id}` holds the JSON record and carries the
//!   instance TTL; the byte length keeps names and ids containing `:` apart
//! - `members:{name}` is a set of the ids registered under `name`
//!
//! Expiry of records is left to Redis. Membership sets do not expire with
//! their records, so every listing drops ids whose record has vanished and
//! `sweep_expired` does the same for all sets at once. Eviction re-checks the
//! record inside a script, so a concurrent re-registration is never unlinked.
//! Other multi-key writes are not atomic; the record is always written first.

use std::collections::HashMap;
use std::future::Future;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::{AsyncCommands, RedisResult, Script};
use tracing::{debug, info, warn};
use wayfinder_common::{RegistryError, Result};

use crate::config::RedisConfig;
use crate::model::{HealthStatus, ServiceInstance};
use crate::storage::{Storage, retain_matching, sort_by_id};

const SCAN_BATCH: usize = 500;

/// KEYS[1] is the membership set, KEYS[i + 1] the record of ARGV[i]
static EVICT_STALE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local removed = 0
        for i, id in ipairs(ARGV) do
            if redis.call('EXISTS', KEYS[i + 1]) == 0 then
                removed = removed + redis.call('SREM', KEYS[1], id)
            end
        end
        return removed
        ",
    )
});

/// Durable registry backend on Redis/Valkey
pub struct RedisStorage {
    pool: Pool,
    prefix: String,
    command_timeout: Duration,
    closed: AtomicBool,
}

impl RedisStorage {
    /// Connect and verify the store answers `PING`
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let pool = Config::from_url(config.connection_url()?)
            .builder()
            .map_err(|e| RegistryError::Misconfiguration(e.to_string()))?
            .max_size(config.pool_size.max(1))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RegistryError::Misconfiguration(e.to_string()))?;

        let storage = Self {
            pool,
            prefix: config.key_prefix.clone(),
            command_timeout: config.command_timeout(),
            closed: AtomicBool::new(false),
        };

        let mut conn = storage.connection().await?;
        let pong: String = storage
            .run(redis::cmd("PING").query_async(&mut conn))
            .await?;
        debug!(reply = %pong, prefix = %storage.prefix, "Connected to redis registry store");

        Ok(storage)
    }

    fn instance_key(&self, name: &str, id: &str) -> String {
        instance_key(&self.prefix, name, id)
    }

    fn members_key(&self, name: &str) -> String {
        members_key(&self.prefix, name)
    }

    async fn connection(&self) -> Result<Connection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RegistryError::BackendUnavailable(
                "redis registry is closed".to_string(),
            ));
        }
        match tokio::time::timeout(self.command_timeout, self.pool.get()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(RegistryError::unavailable(e)),
            Err(_) => Err(RegistryError::BackendUnavailable(
                "timed out acquiring connection".to_string(),
            )),
        }
    }

    /// Bound one round trip by the command timeout
    async fn run<T>(&self, call: impl Future<Output = RedisResult<T>>) -> Result<T> {
        match tokio::time::timeout(self.command_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RegistryError::unavailable(e)),
            Err(_) => Err(RegistryError::BackendUnavailable(
                "operation timed out".to_string(),
            )),
        }
    }

    async fn write_record(&self, conn: &mut Connection, instance: &ServiceInstance) -> Result<()> {
        let key = self.instance_key(&instance.name, &instance.id);
        let payload = encode(instance)?;

        if instance.expires() {
            self.run(conn.set_ex::<_, _, ()>(&key, payload, instance.ttl as u64))
                .await
        } else {
            // Plain SET also clears any TTL left by an earlier registration
            self.run(conn.set::<_, _, ()>(&key, payload)).await
        }
    }

    async fn read_record(&self, conn: &mut Connection, key: &str) -> Result<Option<ServiceInstance>> {
        let raw: Option<String> = self.run(conn.get(key)).await?;
        raw.map(|json| decode(&json)).transpose()
    }

    /// Find the record for `id` regardless of the service name it lives under
    async fn locate(&self, conn: &mut Connection, id: &str) -> Result<Option<ServiceInstance>> {
        let pattern = format!(
            "{}instance:*:{}",
            glob_escape(&self.prefix),
            glob_escape(id)
        );

        for key in self.scan(conn, &pattern).await? {
            if let Some(instance) = self.read_record(conn, &key).await?
                && instance.id == id
            {
                return Ok(Some(instance));
            }
        }
        Ok(None)
    }

    async fn require(&self, conn: &mut Connection, id: &str) -> Result<ServiceInstance> {
        self.locate(conn, id)
            .await?
            .ok_or_else(|| RegistryError::not_found(id))
    }

    async fn scan(&self, conn: &mut Connection, pattern: &str) -> Result<Vec<String>> {
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = self
                .run(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(conn),
                )
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn service_names(&self, conn: &mut Connection) -> Result<Vec<String>> {
        let pattern = format!("{}members:*", glob_escape(&self.prefix));
        Ok(self
            .scan(conn, &pattern)
            .await?
            .iter()
            .filter_map(|key| name_from_members_key(&self.prefix, key))
            .map(str::to_string)
            .collect())
    }

    /// Unlink ids whose record is still missing when the script runs
    async fn evict_members(&self, conn: &mut Connection, name: &str, stale: &[String]) -> Result<usize> {
        if stale.is_empty() {
            return Ok(0);
        }
        let mut invocation = EVICT_STALE.prepare_invoke();
        invocation.key(self.members_key(name));
        for id in stale {
            invocation.key(self.instance_key(name, id)).arg(id);
        }
        let removed: usize = self.run(invocation.invoke_async(conn)).await?;
        if removed > 0 {
            debug!(name = %name, evicted = removed, "Dropped stale membership entries");
        }
        Ok(removed)
    }

    async fn list_name(&self, conn: &mut Connection, name: &str) -> Result<Vec<ServiceInstance>> {
        let ids: Vec<String> = self.run(conn.smembers(self.members_key(name))).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.instance_key(name, id)).collect();
        let records: Vec<Option<String>> = self
            .run(redis::cmd("MGET").arg(&keys).query_async(conn))
            .await?;

        let (live, stale) = partition_members(ids, records);
        self.evict_members(conn, name, &stale).await?;

        let mut instances = live
            .iter()
            .map(|json| decode(json))
            .collect::<Result<Vec<_>>>()?;
        sort_by_id(&mut instances);
        Ok(instances)
    }

    async fn list_everything(
        &self,
        conn: &mut Connection,
    ) -> Result<HashMap<String, Vec<ServiceInstance>>> {
        let mut all = HashMap::new();
        for name in self.service_names(conn).await? {
            let instances = self.list_name(conn, &name).await?;
            if !instances.is_empty() {
                all.insert(name, instances);
            }
        }
        Ok(all)
    }
}

#[async_trait]
impl Storage for RedisStorage {
    fn kind(&self) -> &'static str {
        wayfinder_common::BACKEND_REDIS
    }

    async fn register(&self, mut instance: ServiceInstance) -> Result<()> {
        let mut conn = self.connection().await?;
        instance.last_seen = Utc::now();

        // A record under another name means the instance was renamed.
        // First-time ids pay a full keyspace SCAN here to find it.
        let same_key = self.instance_key(&instance.name, &instance.id);
        let known: bool = self.run(conn.exists(&same_key)).await?;
        let previous = if known {
            None
        } else {
            self.locate(&mut conn, &instance.id).await?
        };

        self.write_record(&mut conn, &instance).await?;

        if let Some(previous) = previous
            && previous.name != instance.name
        {
            let old_key = self.instance_key(&previous.name, &previous.id);
            self.run(conn.del::<_, ()>(&old_key)).await?;
            self.run(conn.srem::<_, _, ()>(self.members_key(&previous.name), &previous.id))
                .await?;
        }

        self.run(conn.sadd::<_, _, ()>(self.members_key(&instance.name), &instance.id))
            .await?;
        debug!(id = %instance.id, name = %instance.name, ttl = instance.ttl, "Registered instance");
        Ok(())
    }

    async fn deregister(&self, id: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let instance = self.require(&mut conn, id).await?;

        self.run(conn.del::<_, ()>(self.instance_key(&instance.name, id)))
            .await?;
        self.run(conn.srem::<_, _, ()>(self.members_key(&instance.name), id))
            .await?;
        info!(id = %id, name = %instance.name, "Instance deregistered");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<ServiceInstance> {
        let mut conn = self.connection().await?;
        self.require(&mut conn, id).await
    }

    async fn list_by_name(&self, name: &str) -> Result<Vec<ServiceInstance>> {
        let mut conn = self.connection().await?;
        self.list_name(&mut conn, name).await
    }

    async fn list_by_name_and_tags(
        &self,
        name: &str,
        tags: &[String],
    ) -> Result<Vec<ServiceInstance>> {
        if tags.is_empty() {
            return self.list_by_name(name).await;
        }

        let mut conn = self.connection().await?;
        let candidates = if name.is_empty() {
            let mut flat: Vec<ServiceInstance> = self
                .list_everything(&mut conn)
                .await?
                .into_values()
                .flatten()
                .collect();
            sort_by_id(&mut flat);
            flat
        } else {
            self.list_name(&mut conn, name).await?
        };
        Ok(retain_matching(candidates, name, tags))
    }

    async fn list_all(&self) -> Result<HashMap<String, Vec<ServiceInstance>>> {
        let mut conn = self.connection().await?;
        self.list_everything(&mut conn).await
    }

    async fn update_health(&self, id: &str, health: HealthStatus) -> Result<()> {
        let mut conn = self.connection().await?;
        let mut instance = self.require(&mut conn, id).await?;

        instance.health = health;
        instance.last_seen = Utc::now();
        self.write_record(&mut conn, &instance).await
    }

    async fn refresh_ttl(&self, id: &str, ttl: i64) -> Result<()> {
        let mut conn = self.connection().await?;
        let mut instance = self.require(&mut conn, id).await?;

        instance.ttl = ttl;
        instance.last_seen = Utc::now();
        self.write_record(&mut conn, &instance).await
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let mut conn = self.connection().await?;
        let mut evicted = 0;

        for name in self.service_names(&mut conn).await? {
            let ids: Vec<String> = self.run(conn.smembers(self.members_key(&name))).await?;
            if ids.is_empty() {
                continue;
            }

            let mut pipe = redis::pipe();
            for id in &ids {
                pipe.exists(self.instance_key(&name, id));
            }
            let present: Vec<bool> = self.run(pipe.query_async(&mut conn)).await?;

            let stale: Vec<String> = ids
                .into_iter()
                .zip(present)
                .filter_map(|(id, exists)| (!exists).then_some(id))
                .collect();
            evicted += self.evict_members(&mut conn, &name, &stale).await?;
        }

        if evicted > 0 {
            info!(evicted, "Swept stale registry memberships");
        }
        Ok(evicted)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.pool.close();
        info!("Redis registry connection pool closed");
        Ok(())
    }
}

fn instance_key(prefix: &str, name: &str, id: &str) -> String {
    format!("{}instance:{}:{}:{}", prefix, name.len(), name, id)
}

fn members_key(prefix: &str, name: &str) -> String {
    format!("{}members:{}", prefix, name)
}

fn name_from_members_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix)?.strip_prefix("members:")
}

/// Escape glob metacharacters for SCAN MATCH
fn glob_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\' | '^' | '-') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Split membership ids into live records and ids whose record is gone
fn partition_members(ids: Vec<String>, records: Vec<Option<String>>) -> (Vec<String>, Vec<String>) {
    let mut live = Vec::with_capacity(ids.len());
    let mut stale = Vec::new();
    for (id, record) in ids.into_iter().zip(records) {
        match record {
            Some(json) => live.push(json),
            None => stale.push(id),
        }
    }
    (live, stale)
}

fn encode(instance: &ServiceInstance) -> Result<String> {
    serde_json::to_string(instance).map_err(|e| RegistryError::Serialization(e.to_string()))
}

fn decode(json: &str) -> Result<ServiceInstance> {
    serde_json::from_str(json).map_err(|e| {
        warn!(error = %e, "Undecodable registry record");
        RegistryError::Serialization(e.to_string())
    })
}
