//! Service certificate, routing and image registry
//!
//! Creation runs certificate → load balancer → DNS → registry. Removal
//! stops the running container service first, then unwinds in reverse.

use super::{Workflows, deployment, environment, project};
use crate::dispatch::Job;
use crate::error::{ControlPlaneError, Result};
use crate::model::{
    Environment, EnvironmentConf, HEALTH_CHECK_PROTOCOL, Project, ProjectConf, Service,
    ServiceConf, ServiceDeployment,
};
use crate::validation::ensure_ready;
use seedflow_infra::executors::acm::{self, AcmConfigs, CERTIFICATE_ARN_OUTPUT};
use seedflow_infra::executors::ecr::{self, EcrConfigs, REPOSITORY_URLS_OUTPUT};
use uuid::Uuid;

const TARGET_GROUPS_OUTPUT: &str = "target_groups_arn";

fn acm_configs(env: &Environment, env_conf: &EnvironmentConf, service: &Service) -> AcmConfigs {
    AcmConfigs {
        domain_name: format!("{}.{}", service.subdomain, env.domain),
        zone_id: env_conf.zone_id.clone(),
    }
}

fn ecr_configs(project: &Project, service: &Service) -> EcrConfigs {
    EcrConfigs {
        repositories: vec![service.repo_name(&project.name)],
    }
}

pub(crate) async fn create(wf: &Workflows, job: &Job) -> Result<()> {
    let (env, project, service) = wf.repo.service_lineage(job.entity_id).await?;
    ensure_ready(&project, "project")?;
    provision(wf, &env, &project, service, job.log_id).await?;
    Ok(())
}

pub(crate) async fn remove(wf: &Workflows, job: &Job) -> Result<()> {
    let (env, project, service) = wf.repo.service_lineage(job.entity_id).await?;
    teardown(wf, &env, &project, service, job.log_id).await
}

/// Replaces a service: tear down the previous one, provision the new one,
/// then roll the previous service's last good version onto it.
///
/// Nothing is compensated if provisioning fails after the teardown; the
/// previous service stays removed and the run can be repeated.
pub(crate) async fn update(wf: &Workflows, job: &Job) -> Result<()> {
    let previous_id = wf
        .log_params(job.log_id)
        .await?
        .previous_service_id
        .ok_or_else(|| {
            ControlPlaneError::Validation("update run does not name the replaced service".into())
        })?;

    let (env, project, service) = wf.repo.service_lineage(job.entity_id).await?;
    ensure_ready(&project, "project")?;

    let previous = wf.repo.get::<Service>(previous_id).await?;
    let version = last_good_version(wf, previous_id).await?;
    tracing::info!(
        previous = %previous.meta.slug,
        version = version.as_deref().unwrap_or("-"),
        "Replacing service"
    );

    teardown(wf, &env, &project, previous, job.log_id).await?;
    let service = provision(wf, &env, &project, service, job.log_id).await?;

    if let Some(version) = version {
        let mut rollout = ServiceDeployment::new(service.meta.id, version);
        wf.repo.save(&rollout).await?;
        let outcome = deployment::roll_out(wf, &env, &project, &service, &rollout.version).await;
        rollout.finish(outcome.is_ok());
        wf.repo.save(&rollout).await?;
        outcome?;
    }
    Ok(())
}

async fn last_good_version(wf: &Workflows, service_id: Uuid) -> Result<Option<String>> {
    Ok(wf
        .repo
        .all::<ServiceDeployment>()
        .await?
        .into_iter()
        .filter(|d| d.service_id == service_id && d.is_success == Some(true))
        .next_back()
        .map(|d| d.version))
}

/// Brings a service's infrastructure up and marks it ready
pub(crate) async fn provision(
    wf: &Workflows,
    env: &Environment,
    project: &Project,
    mut service: Service,
    log_id: Uuid,
) -> Result<Service> {
    if !service.has_web_interface {
        tracing::info!(service = %service.name, "No web interface, nothing to provision");
        wf.mark_ready(&mut service).await?;
        return Ok(service);
    }

    let env_conf: EnvironmentConf = wf.open(&env.conf)?;
    let project_conf: ProjectConf = wf.open(&project.conf)?;
    let p = wf.provisioner(env, &env_conf, Some(project), log_id).await?;
    let mut conf: ServiceConf = wf.open(&service.conf)?;

    let certificate = acm::create_acm(&p, &service.meta.slug, &acm_configs(env, &env_conf, &service)).await?;
    conf.acm_arn = certificate.require_str(CERTIFICATE_ARN_OUTPUT)?.to_string();
    conf.health_check_protocol = HEALTH_CHECK_PROTOCOL.into();
    conf.ecr_repo_name = service.repo_name(&project.name);
    // the load balancer only picks up services that hold a certificate
    service.conf = wf.seal(&conf)?;
    wf.repo.save(&service).await?;

    let lb = project::converge_load_balancer(wf, &p, project, &project_conf.alb_name).await?;
    conf.target_group_arn = lb.find_in_list(TARGET_GROUPS_OUTPUT, &service.name)?;

    environment::converge_dns(wf, &p, env).await?;

    let registry = ecr::create_ecr(&p, &service.meta.slug, &ecr_configs(project, &service)).await?;
    conf.ecr_repo_url = registry.find_in_list(REPOSITORY_URLS_OUTPUT, &conf.ecr_repo_name)?;

    tracing::info!(
        service = %service.name,
        repo = %conf.ecr_repo_url,
        "Service provisioned"
    );
    service.conf = wf.seal(&conf)?;
    wf.mark_ready(&mut service).await?;
    Ok(service)
}

/// Removes the running container service, marks the service deleted and
/// unwinds its infrastructure
pub(crate) async fn teardown(
    wf: &Workflows,
    env: &Environment,
    project: &Project,
    mut service: Service,
    log_id: Uuid,
) -> Result<()> {
    let env_conf: EnvironmentConf = wf.open(&env.conf)?;
    let project_conf: ProjectConf = wf.open(&project.conf)?;

    if wf.repo.latest_deployment(service.meta.id).await?.is_some() {
        let cloud = wf.cloud(env, &env_conf).await?;
        wf.orchestrator(cloud)
            .remove(&project_conf.ecs_cluster, &service.name)
            .await?;
    }

    if service.meta.is_live() {
        service.meta.soft_delete();
        wf.repo.save(&service).await?;
    }

    if service.has_web_interface {
        let p = wf.provisioner(env, &env_conf, Some(project), log_id).await?;
        ecr::destroy_ecr(&p, &service.meta.slug, &ecr_configs(project, &service)).await?;
        project::converge_load_balancer(wf, &p, project, &project_conf.alb_name).await?;
        environment::converge_dns(wf, &p, env).await?;
        acm::destroy_acm(&p, &service.meta.slug, &acm_configs(env, &env_conf, &service)).await?;
    }

    tracing::info!(service = %service.name, "Service removed");
    Ok(())
}
