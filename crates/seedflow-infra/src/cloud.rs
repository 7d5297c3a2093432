//! Direct cloud provider API
//!
//! Operations the declarative tool does not cover well: AMI lookup, key
//! pairs, instance status waits, container service rollouts and secret
//! parameters.

use crate::compose::Credentials;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A freshly created SSH key pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub name: String,
    pub fingerprint: String,
    /// PEM-encoded private key
    pub material: String,
}

/// Secret injected into a container from the parameter store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
    pub value_from: String,
}

/// Stored parameter, without its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub arn: String,
}

impl Parameter {
    /// Exposes the parameter to a container under its last path segment
    pub fn to_secret(&self) -> SecretRef {
        let name = self.name.rsplit('/').next().unwrap_or(&self.name);
        SecretRef {
            name: name.to_string(),
            value_from: self.arn.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionSpec {
    pub family: String,
    pub execution_role_arn: String,
    pub container_name: String,
    pub image: String,
    pub cpu: String,
    pub memory: String,
    pub container_port: i32,
    pub log_group: String,
    pub log_region: String,
    pub log_stream_prefix: String,
    pub secrets: Vec<SecretRef>,
    pub tags: Vec<(String, String)>,
}

/// New container service bound to a load balancer target group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub cluster: String,
    pub service_name: String,
    pub task_definition_arn: String,
    pub desired_count: i32,
    pub target_group_arn: String,
    pub container_name: String,
    pub container_port: i32,
}

/// In-place update of an existing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUpdate {
    pub cluster: String,
    pub service_name: String,
    pub task_definition_arn: Option<String>,
    pub desired_count: i32,
    pub force_new_deployment: bool,
}

/// One rollout of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollout {
    pub task_definition: String,
    pub status: String,
    pub desired_count: i32,
    pub running_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    /// `ACTIVE`, `DRAINING` or `INACTIVE`
    pub status: String,
    pub desired_count: i32,
    pub running_count: i32,
    pub deployments: Vec<Rollout>,
}

impl ServiceDescription {
    /// Deleted services keep being described as `INACTIVE` for a while
    pub fn is_active(&self) -> bool {
        self.status != "INACTIVE"
    }

    /// Running count of the rollout for `task_definition`, or the
    /// service-wide count without one. A rollout that is not listed yet has
    /// nothing running.
    pub fn running_for(&self, task_definition: Option<&str>) -> i32 {
        match task_definition {
            Some(arn) => self
                .deployments
                .iter()
                .find(|d| d.task_definition == arn)
                .map_or(0, |d| d.running_count),
            None => self.running_count,
        }
    }
}

/// Cloud provider API scoped to one set of credentials
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Recommended container-optimized image for cluster instances
    async fn recommended_cluster_ami(&self) -> Result<String>;

    /// Fails with `InfraError::AlreadyExists` when the name is taken
    async fn create_key_pair(&self, name: &str) -> Result<KeyPair>;

    async fn wait_for_instance_ok(
        &self,
        instance_id: &str,
        delay: Duration,
        max_attempts: u32,
    ) -> Result<()>;

    /// Returns the new revision ARN
    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<String>;

    /// Revision ARNs of a family, newest first
    async fn list_task_definitions(&self, family: &str) -> Result<Vec<String>>;

    async fn deregister_task_definition(&self, arn: &str) -> Result<()>;

    /// `None` when the cluster has never known the service
    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> Result<Option<ServiceDescription>>;

    /// Fails with `InfraError::AlreadyExists` when an active service exists
    async fn create_service(&self, spec: &ServiceSpec) -> Result<()>;

    async fn update_service(&self, update: &ServiceUpdate) -> Result<()>;

    async fn delete_service(&self, cluster: &str, service_name: &str) -> Result<()>;

    async fn list_parameters(&self, path: &str) -> Result<Vec<Parameter>>;

    async fn put_parameter(&self, name: &str, value: &str, secure: bool) -> Result<()>;

    async fn delete_parameter(&self, name: &str) -> Result<()>;
}

/// Builds API clients for an environment's credentials
#[async_trait]
pub trait CloudApiFactory: Send + Sync {
    async fn connect(&self, creds: &Credentials) -> Result<Arc<dyn CloudApi>>;
}
