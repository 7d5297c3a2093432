//! Managed relational database

use crate::action::ResourceKind;
use crate::error::{InfraError, Result};
use crate::lifecycle::Provisioner;
use crate::outputs::Outputs;
use crate::state_key::StateScope;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_OUTPUT: &str = "master_instance_endpoint";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfigs {
    pub identifier: String,
    pub name: String,
    pub username: String,
    pub password: String,
    pub instance_type: String,
    pub allocated_storage: u32,
    pub engine: String,
    pub engine_version: String,
    pub port: u16,
    pub allowed_security_groups_ids: Vec<String>,
}

impl DbConfigs {
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            username: username.into(),
            password: password.into(),
            instance_type: "db.t2.large".into(),
            allocated_storage: 100,
            engine: "postgres".into(),
            engine_version: "11.5".into(),
            port: 5432,
            allowed_security_groups_ids: Vec::new(),
        }
    }
}

/// Host part of a `host:port` endpoint
pub fn endpoint_address(outputs: &Outputs) -> Result<String> {
    let endpoint = outputs.require_str(ENDPOINT_OUTPUT)?;
    let host = endpoint.split(':').next().unwrap_or_default();
    if host.is_empty() {
        return Err(InfraError::MissingOutput(ENDPOINT_OUTPUT.to_string()));
    }
    Ok(host.to_string())
}

pub async fn create_database(
    p: &Provisioner,
    resource_slug: &str,
    configs: &DbConfigs,
) -> Result<Outputs> {
    tracing::info!(identifier = %configs.identifier, class = %configs.instance_type, "Applying database");
    p.apply(
        ResourceKind::Postgres,
        &StateScope::Resource(resource_slug.to_string()),
        Some(configs),
    )
    .await
}

pub async fn destroy_database(
    p: &Provisioner,
    resource_slug: &str,
    configs: &DbConfigs,
) -> Result<()> {
    tracing::info!(identifier = %configs.identifier, "Destroying database");
    p.destroy(
        ResourceKind::Postgres,
        &StateScope::Resource(resource_slug.to_string()),
        Some(configs),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_address_strips_port() {
        let mut outputs = Outputs::new();
        outputs.insert(ENDPOINT_OUTPUT, json!("db-1.abc.us-east-1.rds.amazonaws.com:5432"));
        assert_eq!(
            endpoint_address(&outputs).unwrap(),
            "db-1.abc.us-east-1.rds.amazonaws.com"
        );
    }

    #[test]
    fn test_defaults() {
        let configs = DbConfigs::new("prod-main-ab12", "main", "app", "pw");
        assert_eq!(configs.instance_type, "db.t2.large");
        assert_eq!(configs.allocated_storage, 100);
    }
}
