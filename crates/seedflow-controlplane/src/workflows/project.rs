//! Project load balancer and container cluster

use super::Workflows;
use crate::dispatch::Job;
use crate::error::{ControlPlaneError, Result};
use crate::model::{
    Environment, EnvironmentConf, HEALTH_CHECK_PROTOCOL, Project, ProjectConf, ServiceConf,
};
use crate::validation::ensure_ready;
use seedflow_infra::executors::alb::{self, AlbConfigs, AlbPort};
use seedflow_infra::executors::ecs::{self, EcsConfigs};
use seedflow_infra::{Outputs, Provisioner};

const ALB_PUBLIC_DNS_OUTPUT: &str = "public_dns";
const ALB_SECURITY_GROUP_OUTPUT: &str = "alb_security_group_id";
const CLUSTER_OUTPUT: &str = "cluster";
const EXECUTOR_ROLE_OUTPUT: &str = "ecs_executor_role_arn";

/// Load balancer and cluster share `{project}-{env_slug}`
pub(crate) fn infra_name(project: &Project, env: &Environment) -> String {
    format!("{}-{}", project.name, env.meta.slug)
}

pub(crate) async fn create(wf: &Workflows, job: &Job) -> Result<()> {
    let (env, mut project) = wf.repo.project_with_environment(job.entity_id).await?;
    ensure_ready(&env, "environment")?;

    let env_conf: EnvironmentConf = wf.open(&env.conf)?;
    let p = wf.provisioner(&env, &env_conf, Some(&project), job.log_id).await?;
    let cloud = wf.cloud(&env, &env_conf).await?;
    let name = infra_name(&project, &env);

    let lb = converge_load_balancer(wf, &p, &project, &name).await?;
    let cluster = ecs::create_ecs(
        &p,
        cloud.as_ref(),
        EcsConfigs::named(&name, lb.require_str(ALB_SECURITY_GROUP_OUTPUT)?),
    )
    .await?;

    let conf = ProjectConf {
        alb_name: name,
        alb_public_dns: lb.require_str(ALB_PUBLIC_DNS_OUTPUT)?.to_string(),
        ecs_cluster: cluster.require_str(CLUSTER_OUTPUT)?.to_string(),
        ecs_executor_role_arn: cluster.require_str(EXECUTOR_ROLE_OUTPUT)?.to_string(),
    };
    tracing::info!(alb = %conf.alb_name, cluster = %conf.ecs_cluster, "Project provisioned");
    project.conf = wf.seal(&conf)?;
    wf.mark_ready(&mut project).await
}

pub(crate) async fn remove(wf: &Workflows, job: &Job) -> Result<()> {
    let (env, project) = wf.repo.project_with_environment(job.entity_id).await?;
    if !wf.repo.live_services(project.meta.id).await?.is_empty() {
        return Err(ControlPlaneError::Validation(format!(
            "project {} still has live services",
            project.name
        )));
    }

    let env_conf: EnvironmentConf = wf.open(&env.conf)?;
    let conf: ProjectConf = wf.open(&project.conf)?;
    let p = wf.provisioner(&env, &env_conf, Some(&project), job.log_id).await?;
    let name = infra_name(&project, &env);
    let cluster = if conf.ecs_cluster.is_empty() { &name } else { &conf.ecs_cluster };
    let lb_name = if conf.alb_name.is_empty() { &name } else { &conf.alb_name };

    ecs::destroy_ecs(&p, &EcsConfigs::named(cluster, "")).await?;
    alb::destroy_alb(&p, &AlbConfigs::new(lb_name)).await?;

    wf.repo.soft_delete::<Project>(project.meta.id).await?;
    tracing::info!(project = %project.name, "Project removed");
    Ok(())
}

/// Re-applies the project load balancer with a listener pair for every
/// live web service that already holds a certificate
pub(crate) async fn converge_load_balancer(
    wf: &Workflows,
    p: &Provisioner,
    project: &Project,
    alb_name: &str,
) -> Result<Outputs> {
    let mut ports = Vec::new();
    for service in wf.repo.live_services(project.meta.id).await? {
        if !service.has_web_interface {
            continue;
        }
        let conf: ServiceConf = wf.open(&service.conf)?;
        if conf.acm_arn.is_empty() {
            tracing::warn!(service = %service.name, "Service has no certificate yet, leaving it off the load balancer");
            continue;
        }
        let protocol = if conf.health_check_protocol.is_empty() {
            HEALTH_CHECK_PROTOCOL.to_string()
        } else {
            conf.health_check_protocol
        };
        ports.push(AlbPort {
            name: service.name,
            container_port: service.container_port,
            alb_port_http: service.alb_port_http,
            alb_port_https: service.alb_port_https,
            health_check_endpoint: service.health_check_endpoint,
            health_check_protocol: protocol,
            ssl_certificate_arn: conf.acm_arn,
        });
    }
    Ok(alb::create_alb(p, &AlbConfigs::new(alb_name).with_ports(ports)).await?)
}
