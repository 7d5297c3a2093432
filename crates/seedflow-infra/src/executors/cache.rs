//! Managed in-memory cache cluster

use crate::action::ResourceKind;
use crate::error::{InfraError, Result};
use crate::lifecycle::Provisioner;
use crate::outputs::Outputs;
use crate::state_key::StateScope;
use serde::{Deserialize, Serialize};

pub const NODES_OUTPUT: &str = "cache_nodes_details";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfigs {
    pub identifier: String,
    pub name: String,
    pub instance_type: String,
    pub engine: String,
    pub engine_version: String,
    pub parameter_group: String,
    pub number_of_nodes: u32,
    pub port: u16,
    pub allowed_security_groups_ids: Vec<String>,
    pub snapshot_retention_limit_days: u32,
    pub apply_immediately: bool,
}

impl CacheConfigs {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            instance_type: "cache.t2.small".into(),
            engine: "redis".into(),
            engine_version: "5.0.6".into(),
            parameter_group: "default.redis5.0".into(),
            number_of_nodes: 1,
            port: 6379,
            allowed_security_groups_ids: Vec::new(),
            snapshot_retention_limit_days: 0,
            apply_immediately: true,
        }
    }

    /// Sets the instance type along with the retention it supports
    pub fn with_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = instance_type.into();
        self.snapshot_retention_limit_days = snapshot_retention_days(&self.instance_type);
        self
    }
}

/// t1/t2 cache nodes do not support snapshots
pub fn snapshot_retention_days(instance_type: &str) -> u32 {
    if instance_type.starts_with("cache.t1.") || instance_type.starts_with("cache.t2.") {
        0
    } else {
        1
    }
}

/// Address of the first cache node
pub fn primary_node_address(outputs: &Outputs) -> Result<String> {
    outputs
        .value(NODES_OUTPUT)
        .and_then(|nodes| nodes.get(0))
        .and_then(|node| node.get("address"))
        .and_then(|address| address.as_str())
        .map(str::to_string)
        .ok_or_else(|| InfraError::MissingOutput(format!("{}[0].address", NODES_OUTPUT)))
}

pub async fn create_cache(
    p: &Provisioner,
    resource_slug: &str,
    configs: &CacheConfigs,
) -> Result<Outputs> {
    tracing::info!(identifier = %configs.identifier, engine = %configs.engine, "Applying cache");
    p.apply(
        ResourceKind::ElastiCache,
        &StateScope::Resource(resource_slug.to_string()),
        Some(configs),
    )
    .await
}

pub async fn destroy_cache(p: &Provisioner, resource_slug: &str, configs: &CacheConfigs) -> Result<()> {
    tracing::info!(identifier = %configs.identifier, "Destroying cache");
    p.destroy(
        ResourceKind::ElastiCache,
        &StateScope::Resource(resource_slug.to_string()),
        Some(configs),
    )
    .await
}
