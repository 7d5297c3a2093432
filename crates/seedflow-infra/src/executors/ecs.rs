//! Project container cluster with its auto-scaling instance group

use crate::action::ResourceKind;
use crate::cloud::CloudApi;
use crate::error::{InfraError, Result};
use crate::lifecycle::Provisioner;
use crate::outputs::Outputs;
use crate::state_key::StateScope;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcsConfigs {
    pub cluster: String,
    pub instance_group_name: String,
    pub cloudwatch_prefix: String,
    /// Looked up from the provider when empty
    pub ecs_aws_ami: String,
    /// Generated and cached under the keys directory when empty
    pub ssh_key_name: String,
    pub instance_type: String,
    pub max_size: u32,
    pub min_size: u32,
    pub desired_capacity: u32,
    pub alb_security_group_id: String,
}

impl EcsConfigs {
    /// Cluster, instance group and log prefix all share one name
    pub fn named(name: impl Into<String>, alb_security_group_id: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            cluster: name.clone(),
            instance_group_name: name.clone(),
            cloudwatch_prefix: name,
            ecs_aws_ami: String::new(),
            ssh_key_name: String::new(),
            instance_type: "t2.micro".into(),
            max_size: 1,
            min_size: 1,
            desired_capacity: 1,
            alb_security_group_id: alb_security_group_id.into(),
        }
    }
}

/// Name of the SSH key generated for a project's cluster instances
pub fn cluster_key_name(project_name: &str, env_name: &str, env_slug: &str) -> String {
    format!("{}_{}_{}", project_name, env_name, env_slug)
}

/// Makes sure an SSH key pair named `name` exists, caching it on disk.
///
/// Skips the provider call when `{keys_dir}/{name}.pem` is already present.
pub async fn ensure_ssh_key(cloud: &dyn CloudApi, keys_dir: &Path, name: &str) -> Result<String> {
    let pem_path = keys_dir.join(format!("{}.pem", name));
    if fs::try_exists(&pem_path).await? {
        tracing::info!(key = name, "SSH key already on disk");
        return Ok(name.to_string());
    }

    let key_pair = match cloud.create_key_pair(name).await {
        Ok(key_pair) => key_pair,
        Err(InfraError::AlreadyExists(_)) => {
            return Err(InfraError::InvalidConfig(format!(
                "key pair {} exists in the provider but {} is missing",
                name,
                pem_path.display()
            )));
        }
        Err(e) => return Err(e),
    };

    fs::create_dir_all(keys_dir).await?;
    fs::write(
        keys_dir.join(format!("{}_fingerprint.txt", key_pair.name)),
        &key_pair.fingerprint,
    )
    .await?;
    write_private_key(&pem_path, &key_pair.material).await?;

    tracing::info!(key = %key_pair.name, "Created SSH key pair");
    Ok(key_pair.name)
}

/// Owner-only from the moment the file exists
async fn write_private_key(path: &Path, material: &str) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(material.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Fills in the AMI and SSH key when they were left empty
pub async fn resolve_cluster_inputs(
    p: &Provisioner,
    cloud: &dyn CloudApi,
    mut configs: EcsConfigs,
) -> Result<EcsConfigs> {
    if configs.ssh_key_name.is_empty() {
        let common = p.common();
        let name = cluster_key_name(&common.project_name, &common.env_name, &common.env_slug);
        configs.ssh_key_name = ensure_ssh_key(cloud, &p.settings().keys_dir, &name).await?;
    }
    if configs.ecs_aws_ami.is_empty() {
        configs.ecs_aws_ami = cloud.recommended_cluster_ami().await?;
        tracing::info!(ami = %configs.ecs_aws_ami, "Resolved cluster AMI");
    }
    Ok(configs)
}

pub async fn create_ecs(p: &Provisioner, cloud: &dyn CloudApi, configs: EcsConfigs) -> Result<Outputs> {
    let configs = resolve_cluster_inputs(p, cloud, configs).await?;
    tracing::info!(cluster = %configs.cluster, "Applying container cluster");
    p.apply(ResourceKind::Ecs, &StateScope::Project, Some(&configs))
        .await
}

pub async fn ecs_details(p: &Provisioner) -> Result<Outputs> {
    p.outputs(ResourceKind::Ecs, &StateScope::Project).await
}

pub async fn destroy_ecs(p: &Provisioner, configs: &EcsConfigs) -> Result<()> {
    tracing::info!(cluster = %configs.cluster, "Destroying container cluster");
    p.destroy(ResourceKind::Ecs, &StateScope::Project, Some(configs))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCloud;
    use tempfile::tempdir;

    #[test]
    fn test_named_defaults() {
        let configs = EcsConfigs::named("api-a1b2", "sg-1");
        assert_eq!(configs.cluster, "api-a1b2");
        assert_eq!(configs.instance_group_name, "api-a1b2");
        assert_eq!(configs.cloudwatch_prefix, "api-a1b2");
        assert_eq!(configs.instance_type, "t2.micro");
        assert_eq!(
            (configs.min_size, configs.max_size, configs.desired_capacity),
            (1, 1, 1)
        );
    }

    #[tokio::test]
    async fn test_ssh_key_is_created_once() {
        let dir = tempdir().unwrap();
        let cloud = FakeCloud::new();

        let name = ensure_ssh_key(&cloud, dir.path(), "api_prod_ab12").await.unwrap();
        assert_eq!(name, "api_prod_ab12");
        assert!(dir.path().join("api_prod_ab12.pem").exists());
        let fingerprint =
            std::fs::read_to_string(dir.path().join("api_prod_ab12_fingerprint.txt")).unwrap();
        assert!(!fingerprint.is_empty());

        ensure_ssh_key(&cloud, dir.path(), "api_prod_ab12").await.unwrap();
        assert_eq!(cloud.calls_named("create_key_pair"), 1);
    }

    #[tokio::test]
    async fn test_provider_key_without_local_pem_is_an_error() {
        let dir = tempdir().unwrap();
        let cloud = FakeCloud::new();
        ensure_ssh_key(&cloud, dir.path(), "k").await.unwrap();
        std::fs::remove_file(dir.path().join("k.pem")).unwrap();

        let result = ensure_ssh_key(&cloud, dir.path(), "k").await;
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pem_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let cloud = FakeCloud::new();
        ensure_ssh_key(&cloud, dir.path(), "api_prod_ab12").await.unwrap();

        let pem = dir.path().join("api_prod_ab12.pem");
        let mode = std::fs::metadata(&pem).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!std::fs::read_to_string(&pem).unwrap().is_empty());
    }
}
