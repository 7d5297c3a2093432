//! Ephemeral image build workers

use super::Workflows;
use crate::dispatch::Job;
use crate::error::{ControlPlaneError, Result};
use crate::model::{BuildWorker, Environment, EnvironmentConf, Project, Service, ServiceConf};
use crate::validation::ensure_ready;
use chrono::Utc;
use seedflow_infra::executors::build_worker::{
    self, BuildWorkerConfigs, INSTANCE_ID_OUTPUT, PUBLIC_IP_OUTPUT,
};
use seedflow_infra::executors::ecs::cluster_key_name;

fn worker_configs(
    wf: &Workflows,
    env: &Environment,
    env_conf: &EnvironmentConf,
    project: &Project,
    service: &Service,
    ecr_url: String,
    code_version: String,
) -> BuildWorkerConfigs {
    let defaults = &wf.build_worker;
    BuildWorkerConfigs {
        ssh_key_name: cluster_key_name(&project.name, &env.name, &env.meta.slug),
        aws_access_key_id: env_conf.access_key.clone(),
        aws_access_key_secret: env_conf.secret_key.clone(),
        env_name: env.name.clone(),
        code_version,
        service_name: service.name.clone(),
        ecr_url,
        valid_until: (Utc::now() + defaults.valid_for).to_rfc3339(),
        dockerfile: service.dockerfile.clone(),
        dockerfile_target: service.dockerfile_target.clone(),
        worker_ami: defaults.ami.clone(),
        spot_max_price: defaults.spot_max_price.clone(),
    }
}

pub(crate) async fn launch(wf: &Workflows, job: &Job) -> Result<()> {
    let mut worker = wf.repo.get::<BuildWorker>(job.entity_id).await?;
    let (env, project, service) = wf.repo.service_lineage(worker.service_id).await?;
    ensure_ready(&service, "service")?;

    let version = wf.log_params(job.log_id).await?.version;
    if version.is_empty() {
        return Err(ControlPlaneError::Validation(
            "build run does not name a version".into(),
        ));
    }
    let service_conf: ServiceConf = wf.open(&service.conf)?;
    let env_conf: EnvironmentConf = wf.open(&env.conf)?;
    let configs = worker_configs(
        wf,
        &env,
        &env_conf,
        &project,
        &service,
        service_conf.ecr_repo_url,
        version,
    );

    let p = wf.provisioner(&env, &env_conf, Some(&project), job.log_id).await?;
    let cloud = wf.cloud(&env, &env_conf).await?;
    let outputs =
        build_worker::launch_build_worker(&p, cloud.as_ref(), &service.meta.slug, &configs).await?;

    worker.launched_at = Some(Utc::now());
    worker.instance_id = outputs.require_str(INSTANCE_ID_OUTPUT)?.to_string();
    worker.public_ip = outputs.require_str(PUBLIC_IP_OUTPUT)?.to_string();
    worker.ssh_key_name = configs.ssh_key_name;
    worker.meta.touch();
    wf.repo.save(&worker).await?;

    tracing::info!(
        instance_id = %worker.instance_id,
        public_ip = %worker.public_ip,
        "Build worker ready"
    );
    Ok(())
}

pub(crate) async fn remove(wf: &Workflows, job: &Job) -> Result<()> {
    let worker = wf.repo.get::<BuildWorker>(job.entity_id).await?;
    let (env, project, service) = wf.repo.service_lineage(worker.service_id).await?;
    let env_conf: EnvironmentConf = wf.open(&env.conf)?;
    let service_conf: ServiceConf = wf.open(&service.conf)?;
    let configs = worker_configs(
        wf,
        &env,
        &env_conf,
        &project,
        &service,
        service_conf.ecr_repo_url,
        String::new(),
    );

    let p = wf.provisioner(&env, &env_conf, Some(&project), job.log_id).await?;
    build_worker::destroy_build_worker(&p, &service.meta.slug, &configs).await?;

    wf.repo.soft_delete::<BuildWorker>(worker.meta.id).await?;
    tracing::info!(instance_id = %worker.instance_id, "Build worker removed");
    Ok(())
}
