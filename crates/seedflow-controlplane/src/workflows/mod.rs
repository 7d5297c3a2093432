//! Job workflows
//!
//! Each workflow is one infrastructure change driven to a definitive
//! outcome:
//!
//! ```text
//! load entity + ancestors ─► ancestors ready? ─► executors in fixed order
//!                                                  │ ok         │ err
//!                                           persist outputs   status error
//!                                           status ready      log failed
//!                                           log succeeded
//! ```
//!
//! Destroy workflows skip the readiness check. Nothing is retried here;
//! re-running a job targets the same state keys and identifiers.

mod build_worker;
mod deployment;
mod environment;
mod project;
mod resource;
mod service;

use crate::crypto::ConfCipher;
use crate::dispatch::{Job, JobHandler, Workflow};
use crate::error::Result;
use crate::model::{
    Environment, EnvironmentConf, ExecutionLog, InfraStatus, LogParams, Project, Resource,
    SealedConf, Service, ServiceDeployment, Tenant,
};
use crate::repository::Repository;
use async_trait::async_trait;
use seedflow_infra::deploy::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use seedflow_infra::executors::build_worker::{DEFAULT_SPOT_MAX_PRICE, DEFAULT_WORKER_AMI};
use seedflow_infra::{
    CloudApi, CloudApiFactory, CommandRunner, CommonContext, DeploymentOrchestrator,
    ExecutorSettings, Provisioner, StateKeyBuilder,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Scale-wait tuning for rollouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWorkerDefaults {
    pub ami: String,
    pub spot_max_price: String,
    /// How long a launched worker accepts builds
    pub valid_for: chrono::Duration,
}

impl Default for BuildWorkerDefaults {
    fn default() -> Self {
        Self {
            ami: DEFAULT_WORKER_AMI.into(),
            spot_max_price: DEFAULT_SPOT_MAX_PRICE.into(),
            valid_for: chrono::Duration::minutes(5),
        }
    }
}

/// Everything workflows need, shared by all jobs
pub struct Workflows {
    repo: Repository,
    cipher: ConfCipher,
    runner: Arc<dyn CommandRunner>,
    settings: Arc<ExecutorSettings>,
    clouds: Arc<dyn CloudApiFactory>,
    deploy: DeployOptions,
    build_worker: BuildWorkerDefaults,
}

impl Workflows {
    pub fn new(
        repo: Repository,
        cipher: ConfCipher,
        runner: Arc<dyn CommandRunner>,
        settings: Arc<ExecutorSettings>,
        clouds: Arc<dyn CloudApiFactory>,
    ) -> Self {
        Self {
            repo,
            cipher,
            runner,
            settings,
            clouds,
            deploy: DeployOptions::default(),
            build_worker: BuildWorkerDefaults::default(),
        }
    }

    pub fn with_deploy_options(mut self, options: DeployOptions) -> Self {
        self.deploy = options;
        self
    }

    pub fn with_build_worker_defaults(mut self, defaults: BuildWorkerDefaults) -> Self {
        self.build_worker = defaults;
        self
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub(crate) fn cipher(&self) -> &ConfCipher {
        &self.cipher
    }

    pub(crate) fn clouds(&self) -> Arc<dyn CloudApiFactory> {
        self.clouds.clone()
    }

    /// Runs one job without recording its outcome
    pub async fn execute(&self, job: &Job) -> Result<()> {
        match job.workflow {
            Workflow::CreateEnvironment => environment::create(self, job).await,
            Workflow::RemoveEnvironment => environment::remove(self, job).await,
            Workflow::CreateProject => project::create(self, job).await,
            Workflow::RemoveProject => project::remove(self, job).await,
            Workflow::CreateService => service::create(self, job).await,
            Workflow::RemoveService => service::remove(self, job).await,
            Workflow::UpdateService => service::update(self, job).await,
            Workflow::CreateResource => resource::create(self, job).await,
            Workflow::RemoveResource => resource::remove(self, job).await,
            Workflow::LaunchBuildWorker => build_worker::launch(self, job).await,
            Workflow::RemoveBuildWorker => build_worker::remove(self, job).await,
            Workflow::DeployVersion => deployment::deploy(self, job).await,
        }
    }

    /// Marks the job's entity as failed. Errors here are only logged so the
    /// execution log still gets its outcome.
    async fn record_failure(&self, job: &Job) {
        let id = job.entity_id;
        let marked = match job.workflow {
            Workflow::CreateEnvironment | Workflow::RemoveEnvironment => self
                .repo
                .set_status::<Environment>(id, InfraStatus::Error)
                .await
                .map(|_| ()),
            Workflow::CreateProject | Workflow::RemoveProject => self
                .repo
                .set_status::<Project>(id, InfraStatus::Error)
                .await
                .map(|_| ()),
            Workflow::CreateService | Workflow::RemoveService | Workflow::UpdateService => self
                .repo
                .set_status::<Service>(id, InfraStatus::Error)
                .await
                .map(|_| ()),
            Workflow::CreateResource | Workflow::RemoveResource => self
                .repo
                .set_status::<Resource>(id, InfraStatus::Error)
                .await
                .map(|_| ()),
            Workflow::DeployVersion => self.fail_deployment(id).await,
            Workflow::LaunchBuildWorker | Workflow::RemoveBuildWorker => Ok(()),
        };
        if let Err(e) = marked {
            tracing::warn!("Could not record failure on entity: {}", e);
        }
    }

    async fn fail_deployment(&self, id: Uuid) -> Result<()> {
        let mut deployment = self.repo.get::<ServiceDeployment>(id).await?;
        if deployment.is_success.is_none() {
            deployment.finish(false);
            self.repo.save(&deployment).await?;
        }
        Ok(())
    }

    pub(crate) fn open<C: DeserializeOwned + Default>(&self, sealed: &SealedConf) -> Result<C> {
        sealed.open(&self.cipher)
    }

    pub(crate) fn seal<C: Serialize>(&self, conf: &C) -> Result<SealedConf> {
        SealedConf::seal(conf, &self.cipher)
    }

    pub(crate) async fn log_params(&self, log_id: Uuid) -> Result<LogParams> {
        let log = self.repo.get::<ExecutionLog>(log_id).await?;
        self.open(&log.params)
    }

    /// Tool context for one run, scoped to the environment and optionally
    /// a project
    pub(crate) async fn provisioner(
        &self,
        env: &Environment,
        env_conf: &EnvironmentConf,
        project: Option<&Project>,
        log_id: Uuid,
    ) -> Result<Provisioner> {
        let tenant = self.repo.get::<Tenant>(env.tenant_id).await?;
        let common = CommonContext {
            organization_id: tenant.meta.id.to_string(),
            env_id: env.meta.id.to_string(),
            env_name: env.name.clone(),
            env_slug: env.meta.slug.clone(),
            project_id: project.map(|p| p.meta.id.to_string()).unwrap_or_default(),
            project_name: project.map(|p| p.name.clone()).unwrap_or_default(),
            run_id: log_id.to_string(),
            vpc_id: env_conf.vpc_id.clone(),
        };
        let mut keys = StateKeyBuilder::new(tenant.slug(), &env.name);
        if let Some(project) = project {
            keys = keys.with_project(&project.name);
        }
        Ok(Provisioner::new(
            self.runner.clone(),
            self.settings.clone(),
            env_conf.credentials(&env.region),
            common,
            keys,
        ))
    }

    pub(crate) async fn cloud(
        &self,
        env: &Environment,
        env_conf: &EnvironmentConf,
    ) -> Result<Arc<dyn CloudApi>> {
        Ok(self.clouds.connect(&env_conf.credentials(&env.region)).await?)
    }

    pub(crate) fn orchestrator(&self, cloud: Arc<dyn CloudApi>) -> DeploymentOrchestrator {
        DeploymentOrchestrator::new(cloud)
            .with_poll_interval(self.deploy.poll_interval)
            .with_timeout(self.deploy.timeout)
    }

    /// Appends `ready` and persists the entity
    pub(crate) async fn mark_ready<E: crate::model::Provisioned>(&self, entity: &mut E) -> Result<()> {
        entity.status_mut().push(InfraStatus::Ready);
        entity.meta_mut().touch();
        self.repo.save(entity).await
    }
}

#[async_trait]
impl JobHandler for Workflows {
    async fn handle(&self, job: Job) {
        let span = tracing::info_span!(
            "workflow",
            workflow = %job.workflow,
            entity_id = %job.entity_id,
            log_id = %job.log_id
        );
        async {
            tracing::info!("Workflow started");
            let success = match self.execute(&job).await {
                Ok(()) => {
                    tracing::info!("Workflow succeeded");
                    true
                }
                Err(e) => {
                    tracing::error!(retryable = e.is_retryable(), "Workflow failed: {}", e);
                    self.record_failure(&job).await;
                    false
                }
            };
            if let Err(e) = self.repo.finish_log(job.log_id, success).await {
                tracing::error!("Could not finalize execution log: {}", e);
            }
        }
        .instrument(span)
        .await
    }
}
