//! Request bodies and query parameters of the registry API

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use wayfinder_common::is_valid;
use wayfinder_registry::{HealthState, HealthStatus, ServiceInstance};

use crate::error::RequestError;

/// Body of `POST /services`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub id: String,
    pub name: String,
    pub address: String,
    /// Wider than `u16` so out-of-range ports are reported instead of rejected as malformed
    pub port: i64,
    pub tags: Vec<String>,
    pub meta: HashMap<String, String>,
    pub ttl: i64,
    pub health: Option<HealthStatus>,
}

impl RegisterRequest {
    pub fn into_instance(self) -> Result<ServiceInstance, RequestError> {
        let id = self.id.trim();
        let name = self.name.trim();

        if id.is_empty() {
            return Err(RequestError::ParameterMissing("id".to_string()));
        }
        if name.is_empty() {
            return Err(RequestError::ParameterMissing("name".to_string()));
        }
        if !is_valid(id) {
            return Err(RequestError::IllegalArgument(format!(
                "instance id '{}' contains illegal characters",
                id
            )));
        }
        if !is_valid(name) {
            return Err(RequestError::IllegalArgument(format!(
                "service name '{}' contains illegal characters",
                name
            )));
        }
        let port = u16::try_from(self.port)
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| {
                RequestError::IllegalArgument(format!(
                    "port {} is outside 1..=65535",
                    self.port
                ))
            })?;

        let mut instance = ServiceInstance::new(id, name, self.address, port)
            .with_tags(self.tags.into_iter().filter(|t| !t.is_empty()))
            .with_ttl(self.ttl);
        instance.meta = self.meta;
        if let Some(health) = self.health {
            instance.health = health;
        }
        Ok(instance)
    }
}

/// Body of `PUT /services/{id}/health`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthRequest {
    pub status: HealthState,
    #[serde(default)]
    pub output: String,
}

impl From<HealthRequest> for HealthStatus {
    fn from(request: HealthRequest) -> Self {
        HealthStatus::new(request.status, request.output)
    }
}

/// Body of `PUT /services/{id}/ttl`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TtlRequest {
    pub ttl: i64,
}

/// Query string of the listing endpoints
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub name: String,
    /// Comma separated tag list
    pub tags: String,
}

impl ListQuery {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Name and tags; at least one must be present
    pub fn criteria(&self) -> Result<(&str, Vec<String>), RequestError> {
        let name = self.name.trim();
        let tags = self.tag_list();
        if name.is_empty() && tags.is_empty() {
            return Err(RequestError::ParameterMissing("name".to_string()));
        }
        Ok((name, tags))
    }
}
