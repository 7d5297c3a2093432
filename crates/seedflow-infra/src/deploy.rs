//! Container service rollouts
//!
//! ```text
//! register task definition ──► service absent?  ──► create (rolling policy)
//!                                  │ present
//!                                  └──────────────► update (force redeploy)
//!                              ──► poll describe until running == desired
//! ```

use crate::cloud::{CloudApi, SecretRef, ServiceSpec, ServiceUpdate, TaskDefinitionSpec};
use crate::error::{InfraError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);

const TASK_CPU: &str = "128";
const TASK_MEMORY: &str = "100";

/// Everything needed to roll one version of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConf {
    pub env_name: String,
    pub project_name: String,
    pub region: String,
    pub cluster: String,
    pub execution_role_arn: String,
    pub service_name: String,
    pub repo_url: String,
    pub version: String,
    pub container_port: i32,
    pub target_group_arn: String,
    pub secrets: Vec<SecretRef>,
}

impl DeploymentConf {
    pub fn image(&self) -> String {
        format!("{}:{}", self.repo_url, self.version)
    }

    pub fn log_group(&self) -> String {
        format!("{}/{}", self.env_name, self.project_name)
    }

    fn task_definition(&self) -> TaskDefinitionSpec {
        TaskDefinitionSpec {
            family: self.service_name.clone(),
            execution_role_arn: self.execution_role_arn.clone(),
            container_name: self.service_name.clone(),
            image: self.image(),
            cpu: TASK_CPU.into(),
            memory: TASK_MEMORY.into(),
            container_port: self.container_port,
            log_group: self.log_group(),
            log_region: self.region.clone(),
            log_stream_prefix: self.service_name.clone(),
            secrets: self.secrets.clone(),
            tags: vec![("Environment".into(), self.env_name.clone())],
        }
    }
}

/// Registers, launches and waits on container services
pub struct DeploymentOrchestrator {
    api: Arc<dyn CloudApi>,
    poll_interval: Duration,
    timeout: Duration,
}

impl DeploymentOrchestrator {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn register_task_definition(&self, conf: &DeploymentConf) -> Result<String> {
        let arn = self
            .api
            .register_task_definition(&conf.task_definition())
            .await?;
        tracing::info!(service = %conf.service_name, image = %conf.image(), %arn, "Registered task definition");
        Ok(arn)
    }

    /// Creates the service, or updates it in place with a forced redeploy
    pub async fn launch_task_in_cluster(
        &self,
        conf: &DeploymentConf,
        task_definition_arn: &str,
    ) -> Result<()> {
        let existing = self
            .api
            .describe_service(&conf.cluster, &conf.service_name)
            .await?;

        if existing.as_ref().is_some_and(|s| s.is_active()) {
            return self.update(conf, task_definition_arn).await;
        }

        let spec = ServiceSpec {
            cluster: conf.cluster.clone(),
            service_name: conf.service_name.clone(),
            task_definition_arn: task_definition_arn.to_string(),
            desired_count: 1,
            target_group_arn: conf.target_group_arn.clone(),
            container_name: conf.service_name.clone(),
            container_port: conf.container_port,
        };
        match self.api.create_service(&spec).await {
            Ok(()) => {
                tracing::info!(service = %conf.service_name, cluster = %conf.cluster, "Created service");
                Ok(())
            }
            Err(InfraError::AlreadyExists(_)) => {
                tracing::warn!(service = %conf.service_name, "Service appeared concurrently, updating instead");
                self.update(conf, task_definition_arn).await
            }
            Err(e) => Err(e),
        }
    }

    async fn update(&self, conf: &DeploymentConf, task_definition_arn: &str) -> Result<()> {
        self.api
            .update_service(&ServiceUpdate {
                cluster: conf.cluster.clone(),
                service_name: conf.service_name.clone(),
                task_definition_arn: Some(task_definition_arn.to_string()),
                desired_count: 1,
                force_new_deployment: true,
            })
            .await?;
        tracing::info!(service = %conf.service_name, cluster = %conf.cluster, "Updated service");
        Ok(())
    }

    /// Polls until the running count equals `desired`.
    ///
    /// With `task_definition_arn` set, only the matching rollout is counted.
    pub async fn wait_for_service_scale(
        &self,
        cluster: &str,
        service_name: &str,
        desired: i32,
        task_definition_arn: Option<&str>,
    ) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let description = self
                .api
                .describe_service(cluster, service_name)
                .await?
                .ok_or_else(|| {
                    InfraError::NotFound(format!("service {} in {}", service_name, cluster))
                })?;

            let running = description.running_for(task_definition_arn);
            tracing::debug!(service = service_name, running, desired, "Waiting for scale");
            if running == desired {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(InfraError::Timeout(format!(
                    "service {} did not reach {} running tasks within {}s (running: {})",
                    service_name,
                    desired,
                    self.timeout.as_secs(),
                    running
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Register → launch → wait for one running task. Returns the task
    /// definition ARN.
    pub async fn deploy(&self, conf: &DeploymentConf) -> Result<String> {
        let arn = self.register_task_definition(conf).await?;
        self.launch_task_in_cluster(conf, &arn).await?;
        self.wait_for_service_scale(&conf.cluster, &conf.service_name, 1, Some(&arn))
            .await?;
        tracing::info!(service = %conf.service_name, version = %conf.version, "Deployment finished");
        Ok(arn)
    }

    /// Scale to zero, wait, delete, then deregister every revision
    pub async fn remove(&self, cluster: &str, service_name: &str) -> Result<()> {
        let revisions = self.api.list_task_definitions(service_name).await?;

        let existing = self.api.describe_service(cluster, service_name).await?;
        if existing.as_ref().is_some_and(|s| s.is_active()) {
            self.api
                .update_service(&ServiceUpdate {
                    cluster: cluster.to_string(),
                    service_name: service_name.to_string(),
                    task_definition_arn: None,
                    desired_count: 0,
                    force_new_deployment: false,
                })
                .await?;
            self.wait_for_service_scale(cluster, service_name, 0, None)
                .await?;
            self.api.delete_service(cluster, service_name).await?;
            tracing::info!(service = service_name, cluster, "Deleted service");
        } else {
            tracing::info!(service = service_name, "Service not running, skipping scale down");
        }

        for arn in &revisions {
            self.api.deregister_task_definition(arn).await?;
        }
        tracing::info!(
            service = service_name,
            revisions = revisions.len(),
            "Deregistered task definitions"
        );
        Ok(())
    }
}
