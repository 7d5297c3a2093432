//! Version rollouts onto a service's container cluster

use super::Workflows;
use crate::dispatch::Job;
use crate::error::{ControlPlaneError, Result};
use crate::model::{
    Environment, EnvironmentConf, Project, ProjectConf, Service, ServiceConf, ServiceDeployment,
};
use crate::validation::ensure_ready;
use seedflow_infra::{DeploymentConf, Parameter};

pub(crate) async fn deploy(wf: &Workflows, job: &Job) -> Result<()> {
    let mut rollout = wf.repo.get::<ServiceDeployment>(job.entity_id).await?;
    let (env, project, service) = wf.repo.service_lineage(rollout.service_id).await?;
    ensure_ready(&service, "service")?;

    let task_definition = roll_out(wf, &env, &project, &service, &rollout.version).await?;
    tracing::info!(%task_definition, version = %rollout.version, "Version deployed");

    rollout.finish(true);
    wf.repo.save(&rollout).await
}

/// Registers the version and waits for it to run. Returns the task
/// definition ARN.
pub(crate) async fn roll_out(
    wf: &Workflows,
    env: &Environment,
    project: &Project,
    service: &Service,
    version: &str,
) -> Result<String> {
    let env_conf: EnvironmentConf = wf.open(&env.conf)?;
    let project_conf: ProjectConf = wf.open(&project.conf)?;
    let service_conf: ServiceConf = wf.open(&service.conf)?;
    if service_conf.ecr_repo_url.is_empty() {
        return Err(ControlPlaneError::Validation(format!(
            "service {} has no image repository",
            service.name
        )));
    }

    let cloud = wf.cloud(env, &env_conf).await?;
    let secrets = cloud
        .list_parameters(&service.parameter_prefix(&env.name, &project.name))
        .await?
        .iter()
        .map(Parameter::to_secret)
        .collect();

    let conf = DeploymentConf {
        env_name: env.name.clone(),
        project_name: project.name.clone(),
        region: env.region.clone(),
        cluster: project_conf.ecs_cluster,
        execution_role_arn: project_conf.ecs_executor_role_arn,
        service_name: service.name.clone(),
        repo_url: service_conf.ecr_repo_url,
        version: version.to_string(),
        container_port: i32::from(service.container_port),
        target_group_arn: service_conf.target_group_arn,
        secrets,
    };
    Ok(wf.orchestrator(cloud).deploy(&conf).await?)
}
