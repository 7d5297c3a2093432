use crate::client::AwsCloud;
use crate::error::{AwsError, Result};
use aws_sdk_ecs::types::{
    ContainerDefinition, DeploymentConfiguration, LaunchType, LoadBalancer, LogConfiguration,
    LogDriver, PortMapping, SchedulingStrategy, Secret, SortOrder, Tag, TransportProtocol,
};
use seedflow_infra::{Rollout, ServiceDescription, ServiceSpec, ServiceUpdate, TaskDefinitionSpec};

impl AwsCloud {
    pub(crate) async fn register_revision(&self, spec: &TaskDefinitionSpec) -> Result<String> {
        const OP: &str = "RegisterTaskDefinition";

        let logging = LogConfiguration::builder()
            .log_driver(LogDriver::Awslogs)
            .options("awslogs-group", &spec.log_group)
            .options("awslogs-create-group", "true")
            .options("awslogs-region", &spec.log_region)
            .options("awslogs-stream-prefix", &spec.log_stream_prefix)
            .build()
            .map_err(|e| AwsError::build(OP, e))?;

        let secrets = spec
            .secrets
            .iter()
            .map(|s| {
                Secret::builder()
                    .name(&s.name)
                    .value_from(&s.value_from)
                    .build()
                    .map_err(|e| AwsError::build(OP, e))
            })
            .collect::<Result<Vec<_>>>()?;

        let container = ContainerDefinition::builder()
            .name(&spec.container_name)
            .image(&spec.image)
            .essential(true)
            .port_mappings(
                PortMapping::builder()
                    .container_port(spec.container_port)
                    .protocol(TransportProtocol::Tcp)
                    .build(),
            )
            .log_configuration(logging)
            .set_secrets(Some(secrets))
            .build();

        let tags = spec
            .tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect::<Vec<_>>();

        let out = self
            .ecs
            .register_task_definition()
            .family(&spec.family)
            .execution_role_arn(&spec.execution_role_arn)
            .container_definitions(container)
            .cpu(&spec.cpu)
            .memory(&spec.memory)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| AwsError::sdk(OP, e))?;

        let arn = out
            .task_definition()
            .and_then(|td| td.task_definition_arn())
            .ok_or_else(|| Self::missing(OP, "TaskDefinition.TaskDefinitionArn"))?
            .to_string();
        tracing::info!(family = %spec.family, arn = %arn, "Registered task definition");
        Ok(arn)
    }

    /// Only revisions of exactly `family`; the API matches by prefix
    pub(crate) async fn family_revisions(&self, family: &str) -> Result<Vec<String>> {
        let marker = format!("task-definition/{family}:");
        let mut arns = Vec::new();
        let mut next_token = None;
        loop {
            let out = self
                .ecs
                .list_task_definitions()
                .family_prefix(family)
                .sort(SortOrder::Desc)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| AwsError::sdk("ListTaskDefinitions", e))?;

            arns.extend(
                out.task_definition_arns()
                    .iter()
                    .filter(|arn| arn.contains(&marker))
                    .cloned(),
            );

            next_token = out.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(arns)
    }

    pub(crate) async fn deregister_revision(&self, arn: &str) -> Result<()> {
        self.ecs
            .deregister_task_definition()
            .task_definition(arn)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DeregisterTaskDefinition", e))?;
        tracing::debug!(arn, "Deregistered task definition");
        Ok(())
    }

    pub(crate) async fn describe(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> Result<Option<ServiceDescription>> {
        let out = self
            .ecs
            .describe_services()
            .cluster(cluster)
            .services(service_name)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DescribeServices", e))?;

        let Some(service) = out.services().first() else {
            return Ok(None);
        };

        Ok(Some(ServiceDescription {
            status: service.status().unwrap_or_default().to_string(),
            desired_count: service.desired_count(),
            running_count: service.running_count(),
            deployments: service
                .deployments()
                .iter()
                .map(|d| Rollout {
                    task_definition: d.task_definition().unwrap_or_default().to_string(),
                    status: d.status().unwrap_or_default().to_string(),
                    desired_count: d.desired_count(),
                    running_count: d.running_count(),
                })
                .collect(),
        }))
    }

    pub(crate) async fn create(&self, spec: &ServiceSpec) -> Result<()> {
        self.ecs
            .create_service()
            .cluster(&spec.cluster)
            .service_name(&spec.service_name)
            .task_definition(&spec.task_definition_arn)
            .desired_count(spec.desired_count)
            .launch_type(LaunchType::Ec2)
            .scheduling_strategy(SchedulingStrategy::Replica)
            .deployment_configuration(
                DeploymentConfiguration::builder()
                    .maximum_percent(200)
                    .minimum_healthy_percent(100)
                    .build(),
            )
            .load_balancers(
                LoadBalancer::builder()
                    .target_group_arn(&spec.target_group_arn)
                    .container_name(&spec.container_name)
                    .container_port(spec.container_port)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| AwsError::sdk("CreateService", e))?;
        tracing::info!(cluster = %spec.cluster, service = %spec.service_name, "Created service");
        Ok(())
    }

    pub(crate) async fn update(&self, update: &ServiceUpdate) -> Result<()> {
        self.ecs
            .update_service()
            .cluster(&update.cluster)
            .service(&update.service_name)
            .set_task_definition(update.task_definition_arn.clone())
            .desired_count(update.desired_count)
            .force_new_deployment(update.force_new_deployment)
            .send()
            .await
            .map_err(|e| AwsError::sdk("UpdateService", e))?;
        tracing::info!(
            cluster = %update.cluster,
            service = %update.service_name,
            desired = update.desired_count,
            "Updated service"
        );
        Ok(())
    }

    pub(crate) async fn delete(&self, cluster: &str, service_name: &str) -> Result<()> {
        self.ecs
            .delete_service()
            .cluster(cluster)
            .service(service_name)
            .force(true)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DeleteService", e))?;
        tracing::info!(cluster, service = service_name, "Deleted service");
        Ok(())
    }
}
