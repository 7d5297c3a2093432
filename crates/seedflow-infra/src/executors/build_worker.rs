//! Ephemeral spot instance that builds and pushes a service image

use crate::action::ResourceKind;
use crate::cloud::CloudApi;
use crate::error::Result;
use crate::lifecycle::Provisioner;
use crate::outputs::Outputs;
use crate::state_key::StateScope;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const INSTANCE_ID_OUTPUT: &str = "instance_id";
pub const PUBLIC_IP_OUTPUT: &str = "instance_public_ip";

pub const DEFAULT_WORKER_AMI: &str = "ami-0cef0a0c24a179fb3";
pub const DEFAULT_SPOT_MAX_PRICE: &str = "0.1";

const STATUS_POLL_DELAY: Duration = Duration::from_secs(15);
const STATUS_POLL_ATTEMPTS: u32 = 20;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildWorkerConfigs {
    pub ssh_key_name: String,
    pub aws_access_key_id: String,
    pub aws_access_key_secret: String,
    pub env_name: String,
    pub code_version: String,
    pub service_name: String,
    pub ecr_url: String,
    /// RFC 3339 instant after which the worker stops accepting builds
    pub valid_until: String,
    pub dockerfile: String,
    pub dockerfile_target: String,
    pub worker_ami: String,
    pub spot_max_price: String,
}

impl std::fmt::Debug for BuildWorkerConfigs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildWorkerConfigs")
            .field("ssh_key_name", &self.ssh_key_name)
            .field("env_name", &self.env_name)
            .field("code_version", &self.code_version)
            .field("service_name", &self.service_name)
            .field("ecr_url", &self.ecr_url)
            .field("valid_until", &self.valid_until)
            .finish_non_exhaustive()
    }
}

/// Launches the worker and waits until the instance passes status checks
pub async fn launch_build_worker(
    p: &Provisioner,
    cloud: &dyn CloudApi,
    service_slug: &str,
    configs: &BuildWorkerConfigs,
) -> Result<Outputs> {
    tracing::info!(
        service = %configs.service_name,
        version = %configs.code_version,
        "Launching build worker"
    );
    let outputs = p
        .apply(
            ResourceKind::BuildWorker,
            &StateScope::Service(service_slug.to_string()),
            Some(configs),
        )
        .await?;

    let instance_id = outputs.require_str(INSTANCE_ID_OUTPUT)?;
    tracing::info!(instance_id, "Waiting for build worker status checks");
    cloud
        .wait_for_instance_ok(instance_id, STATUS_POLL_DELAY, STATUS_POLL_ATTEMPTS)
        .await?;
    Ok(outputs)
}

pub async fn destroy_build_worker(
    p: &Provisioner,
    service_slug: &str,
    configs: &BuildWorkerConfigs,
) -> Result<()> {
    tracing::info!(service = %configs.service_name, "Removing build worker");
    p.destroy(
        ResourceKind::BuildWorker,
        &StateScope::Service(service_slug.to_string()),
        Some(configs),
    )
    .await
}
