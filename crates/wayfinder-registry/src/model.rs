//! Registry data models
//!
//! This module defines core data structures for service discovery:
//! - Service instance information
//! - Health status
//! - Per-service summaries

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Reported health state of an instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Passing,
    Warning,
    Critical,
}

impl HealthState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Passing => "passing",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HealthState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passing" => Ok(Self::Passing),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown health status '{}'", other)),
        }
    }
}

/// Last reported health of an instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: HealthState,
    #[serde(default)]
    pub output: String,
    #[serde(default = "Utc::now")]
    pub last_checked: DateTime<Utc>,
}

impl HealthStatus {
    pub fn new(status: HealthState, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
            last_checked: Utc::now(),
        }
    }

    pub fn passing() -> Self {
        Self::new(HealthState::Passing, "")
    }

    pub fn is_passing(&self) -> bool {
        self.status == HealthState::Passing
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::passing()
    }
}

/// One registered network endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub meta: HashMap<String, String>,
    #[serde(default)]
    pub health: HealthStatus,
    /// Seconds of idleness before the instance expires; `<= 0` never expires
    #[serde(default)]
    pub ttl: i64,
    #[serde(default = "Utc::now")]
    pub last_seen: DateTime<Utc>,
}

impl ServiceInstance {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            port,
            tags: BTreeSet::new(),
            meta: HashMap::new(),
            health: HealthStatus::default(),
            ttl: 0,
            last_seen: Utc::now(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = health;
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_passing()
    }

    pub fn expires(&self) -> bool {
        self.ttl > 0
    }

    /// True when `last_seen + ttl` lies strictly before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if !self.expires() {
            return false;
        }
        Duration::try_seconds(self.ttl)
            .and_then(|ttl| self.last_seen.checked_add_signed(ttl))
            .is_some_and(|deadline| deadline < now)
    }

    pub fn has_all_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|t| self.tags.contains(t))
    }

    /// `address:port` of the endpoint
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Instance counts of one service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub name: String,
    pub instance_count: usize,
    pub healthy_instance_count: usize,
}
