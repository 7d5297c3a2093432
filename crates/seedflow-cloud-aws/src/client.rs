//! SDK clients bound to one environment's credentials

use crate::error::AwsError;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ecs::config::Credentials as SdkCredentials;
use seedflow_infra::{
    CloudApi, CloudApiFactory, Credentials, InfraError, KeyPair, Parameter, ServiceDescription,
    ServiceSpec, ServiceUpdate, TaskDefinitionSpec,
};
use std::sync::Arc;
use std::time::Duration;

/// ECS, EC2 and SSM clients sharing one credential set and region
#[derive(Clone)]
pub struct AwsCloud {
    pub(crate) ecs: aws_sdk_ecs::Client,
    pub(crate) ec2: aws_sdk_ec2::Client,
    pub(crate) ssm: aws_sdk_ssm::Client,
}

impl AwsCloud {
    /// Builds clients from static credentials; no ambient provider chain
    /// is consulted
    pub async fn connect(creds: &Credentials) -> Self {
        let provider = SdkCredentials::new(
            creds.access_key.clone(),
            creds.secret_key.clone(),
            creds.session_token.clone().filter(|t| !t.is_empty()),
            None,
            "seedflow-environment",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(creds.region.clone()))
            .credentials_provider(provider)
            .load()
            .await;

        tracing::debug!(region = %creds.region, "Connected AWS clients");
        Self {
            ecs: aws_sdk_ecs::Client::new(&shared),
            ec2: aws_sdk_ec2::Client::new(&shared),
            ssm: aws_sdk_ssm::Client::new(&shared),
        }
    }
}

#[async_trait]
impl CloudApi for AwsCloud {
    async fn recommended_cluster_ami(&self) -> seedflow_infra::Result<String> {
        Ok(self.recommended_ami().await?)
    }

    async fn create_key_pair(&self, name: &str) -> seedflow_infra::Result<KeyPair> {
        Ok(self.new_key_pair(name).await?)
    }

    async fn wait_for_instance_ok(
        &self,
        instance_id: &str,
        delay: Duration,
        max_attempts: u32,
    ) -> seedflow_infra::Result<()> {
        Ok(self
            .poll_instance_status(instance_id, delay, max_attempts)
            .await?)
    }

    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> seedflow_infra::Result<String> {
        Ok(self.register_revision(spec).await?)
    }

    async fn list_task_definitions(&self, family: &str) -> seedflow_infra::Result<Vec<String>> {
        Ok(self.family_revisions(family).await?)
    }

    async fn deregister_task_definition(&self, arn: &str) -> seedflow_infra::Result<()> {
        Ok(self.deregister_revision(arn).await?)
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> seedflow_infra::Result<Option<ServiceDescription>> {
        Ok(self.describe(cluster, service_name).await?)
    }

    async fn create_service(&self, spec: &ServiceSpec) -> seedflow_infra::Result<()> {
        Ok(self.create(spec).await?)
    }

    async fn update_service(&self, update: &ServiceUpdate) -> seedflow_infra::Result<()> {
        Ok(self.update(update).await?)
    }

    async fn delete_service(&self, cluster: &str, service_name: &str) -> seedflow_infra::Result<()> {
        Ok(self.delete(cluster, service_name).await?)
    }

    async fn list_parameters(&self, path: &str) -> seedflow_infra::Result<Vec<Parameter>> {
        Ok(self.parameters_by_path(path).await?)
    }

    async fn put_parameter(
        &self,
        name: &str,
        value: &str,
        secure: bool,
    ) -> seedflow_infra::Result<()> {
        Ok(self.store_parameter(name, value, secure).await?)
    }

    async fn delete_parameter(&self, name: &str) -> seedflow_infra::Result<()> {
        Ok(self.remove_parameter(name).await?)
    }
}

/// Connects a fresh [`AwsCloud`] per environment
#[derive(Debug, Clone, Default)]
pub struct AwsCloudFactory;

impl AwsCloudFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CloudApiFactory for AwsCloudFactory {
    async fn connect(&self, creds: &Credentials) -> seedflow_infra::Result<Arc<dyn CloudApi>> {
        if creds.access_key.is_empty() || creds.secret_key.is_empty() {
            return Err(InfraError::InvalidConfig(
                "environment has no AWS credentials".into(),
            ));
        }
        Ok(Arc::new(AwsCloud::connect(creds).await))
    }
}

impl AwsCloud {
    pub(crate) fn missing(operation: &'static str, field: &'static str) -> AwsError {
        AwsError::MissingField { operation, field }
    }
}
