//! Environment network and DNS zone

use super::Workflows;
use crate::dispatch::Job;
use crate::error::{ControlPlaneError, Result};
use crate::model::{Environment, EnvironmentConf, ProjectConf};
use seedflow_infra::executors::route53::{self, CnameRecord, Route53Configs};
use seedflow_infra::executors::network;
use seedflow_infra::{Outputs, Provisioner};

const VPC_ID_OUTPUT: &str = "vpc_id";
const ZONE_ID_OUTPUT: &str = "primary_zone_id";

pub(crate) async fn create(wf: &Workflows, job: &Job) -> Result<()> {
    let mut env = wf.repo.get::<Environment>(job.entity_id).await?;
    let mut conf: EnvironmentConf = wf.open(&env.conf)?;
    let p = wf.provisioner(&env, &conf, None, job.log_id).await?;

    let vpc = network::create_network(&p).await?;
    conf.vpc_id = vpc.require_str(VPC_ID_OUTPUT)?.to_string();

    let zone = converge_dns(wf, &p, &env).await?;
    conf.zone_id = zone.require_str(ZONE_ID_OUTPUT)?.to_string();

    tracing::info!(vpc_id = %conf.vpc_id, zone_id = %conf.zone_id, "Environment provisioned");
    env.conf = wf.seal(&conf)?;
    wf.mark_ready(&mut env).await
}

pub(crate) async fn remove(wf: &Workflows, job: &Job) -> Result<()> {
    let env = wf.repo.get::<Environment>(job.entity_id).await?;
    if !wf.repo.live_projects(env.meta.id).await?.is_empty() {
        return Err(ControlPlaneError::Validation(format!(
            "environment {} still has live projects",
            env.name
        )));
    }

    let conf: EnvironmentConf = wf.open(&env.conf)?;
    let p = wf.provisioner(&env, &conf, None, job.log_id).await?;
    route53::destroy_route53(&p, &Route53Configs::new(&env.domain)).await?;
    network::destroy_network(&p).await?;

    wf.repo.soft_delete::<Environment>(env.meta.id).await?;
    tracing::info!(env = %env.name, "Environment removed");
    Ok(())
}

/// Re-applies the zone with one CNAME per live web service of the
/// environment, each pointing at its project's load balancer
pub(crate) async fn converge_dns(
    wf: &Workflows,
    p: &Provisioner,
    env: &Environment,
) -> Result<Outputs> {
    let mut configs = Route53Configs::new(&env.domain);
    for (project, service) in wf.repo.live_services_in_environment(env.meta.id).await? {
        if !service.has_web_interface {
            continue;
        }
        let project_conf: ProjectConf = wf.open(&project.conf)?;
        if project_conf.alb_public_dns.is_empty() {
            tracing::warn!(project = %project.name, service = %service.name, "Project has no load balancer yet, skipping record");
            continue;
        }
        configs.cname_subdomains.push(CnameRecord {
            subdomain: service.subdomain.clone(),
            route_to: project_conf.alb_public_dns,
        });
    }
    Ok(route53::create_route53(p, &configs).await?)
}
