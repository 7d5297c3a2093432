//! Caller-facing operations
//!
//! Every `submit_*` validates synchronously, persists the entity with a
//! `changes_pending` status, writes a pending [`ExecutionLog`] and hands
//! the job to the dispatcher. Rejections happen before anything is
//! dispatched. The returned [`Submission`] carries the log slug to poll.

use crate::crypto::ConfCipher;
use crate::dispatch::{Job, JobDispatcher, Workflow};
use crate::error::{ControlPlaneError, Result};
use crate::model::{
    BuildWorker, ComponentRef, Entity, Environment, EnvironmentConf, ExecutionLog, ExecutionState,
    InfraStatus, LogParams, Project, Provisioned, Resource, ResourceConf, ResourceRequest,
    ResourceType, SealedConf, Service, ServiceDeployment, ServiceRequest, Tenant,
};
use crate::repository::Repository;
use crate::validation::{
    check_service_collision, ensure_ready, validate_name, validate_resource_request,
    validate_service_request,
};
use seedflow_infra::{Action, CloudApi, CloudApiFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Provider credentials an environment is created with
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCredentials {
    pub access_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub session_token: String,
}

impl std::fmt::Debug for EnvironmentCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentCredentials")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

/// Handle on an accepted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub entity_id: Uuid,
    pub entity_slug: String,
    pub log_id: Uuid,
    pub log_slug: String,
    /// False when an existing run was returned instead
    pub dispatched: bool,
}

#[derive(Clone)]
pub struct Commands {
    repo: Repository,
    cipher: ConfCipher,
    dispatcher: Arc<dyn JobDispatcher>,
    clouds: Arc<dyn CloudApiFactory>,
}

impl Commands {
    pub fn new(
        repo: Repository,
        cipher: ConfCipher,
        dispatcher: Arc<dyn JobDispatcher>,
        clouds: Arc<dyn CloudApiFactory>,
    ) -> Self {
        Self {
            repo,
            cipher,
            dispatcher,
            clouds,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub async fn create_tenant(&self, name: &str, slug: &str) -> Result<Tenant> {
        validate_name("tenant slug", slug)?;
        if self.repo.tenant_by_slug(slug).await?.is_some() {
            return Err(ControlPlaneError::Validation(format!(
                "tenant slug {} is taken",
                slug
            )));
        }
        let tenant = Tenant::new(name, slug);
        self.repo.save(&tenant).await?;
        tracing::info!(tenant = slug, "Created tenant");
        Ok(tenant)
    }

    pub async fn submit_create_environment(
        &self,
        tenant_id: Uuid,
        name: &str,
        domain: &str,
        region: &str,
        credentials: EnvironmentCredentials,
    ) -> Result<Submission> {
        validate_name("environment name", name)?;
        if domain.is_empty() || region.is_empty() {
            return Err(ControlPlaneError::Validation(
                "environment needs a domain and a region".into(),
            ));
        }
        let tenant = self.repo.get::<Tenant>(tenant_id).await?;
        let taken = self
            .repo
            .all::<Environment>()
            .await?
            .iter()
            .any(|e| e.tenant_id == tenant.meta.id && e.name == name && e.meta.is_live());
        if taken {
            return Err(ControlPlaneError::Validation(format!(
                "environment {} already exists",
                name
            )));
        }

        let mut env = Environment::new(tenant.meta.id, name, domain, region);
        env.conf = SealedConf::seal(
            &EnvironmentConf {
                access_key: credentials.access_key,
                secret_key: credentials.secret_key,
                session_token: credentials.session_token,
                ..Default::default()
            },
            &self.cipher,
        )?;
        self.start(
            env,
            Action::Create,
            ComponentRef::Environment,
            Workflow::CreateEnvironment,
            LogParams::default(),
        )
        .await
    }

    pub async fn submit_remove_environment(&self, env_id: Uuid) -> Result<Submission> {
        let env = self.repo.get::<Environment>(env_id).await?;
        if !self.repo.live_projects(env_id).await?.is_empty() {
            return Err(ControlPlaneError::Validation(
                "Remove the environment's projects first".into(),
            ));
        }
        self.start(
            env,
            Action::Destroy,
            ComponentRef::Environment,
            Workflow::RemoveEnvironment,
            LogParams::default(),
        )
        .await
    }

    pub async fn submit_create_project(&self, env_id: Uuid, name: &str) -> Result<Submission> {
        validate_name("project name", name)?;
        let env = self.repo.get::<Environment>(env_id).await?;
        ensure_ready(&env, "environment")?;
        let taken = self
            .repo
            .live_projects(env_id)
            .await?
            .iter()
            .any(|p| p.name == name);
        if taken {
            return Err(ControlPlaneError::Validation(format!(
                "project {} already exists",
                name
            )));
        }

        self.start(
            Project::new(env_id, name),
            Action::Create,
            ComponentRef::Project,
            Workflow::CreateProject,
            LogParams::default(),
        )
        .await
    }

    pub async fn submit_remove_project(&self, project_id: Uuid) -> Result<Submission> {
        let project = self.repo.get::<Project>(project_id).await?;
        if !self.repo.live_services(project_id).await?.is_empty() {
            return Err(ControlPlaneError::Validation(
                "Remove the project's services first".into(),
            ));
        }
        self.start(
            project,
            Action::Destroy,
            ComponentRef::Project,
            Workflow::RemoveProject,
            LogParams::default(),
        )
        .await
    }

    pub async fn submit_create_service(
        &self,
        project_id: Uuid,
        request: ServiceRequest,
    ) -> Result<Submission> {
        let project = self.repo.get::<Project>(project_id).await?;
        ensure_ready(&project, "project")?;
        validate_service_request(&request)?;
        let siblings = self.repo.live_services(project_id).await?;
        check_service_collision(&request, &siblings, None)?;

        self.start(
            Service::new(project_id, request),
            Action::Create,
            ComponentRef::Service,
            Workflow::CreateService,
            LogParams::default(),
        )
        .await
    }

    /// Replaces a service with one built from `request`. The returned
    /// submission refers to the new service.
    pub async fn submit_update_service(
        &self,
        service_id: Uuid,
        request: ServiceRequest,
    ) -> Result<Submission> {
        let previous = self.repo.get::<Service>(service_id).await?;
        if !previous.meta.is_live() {
            return Err(ControlPlaneError::not_found("service", &previous.meta.slug));
        }
        let project = self.repo.get::<Project>(previous.project_id).await?;
        ensure_ready(&project, "project")?;
        validate_service_request(&request)?;
        let siblings = self.repo.live_services(project.meta.id).await?;
        check_service_collision(&request, &siblings, Some(previous.meta.id))?;
        self.ensure_idle(&previous, ComponentRef::Service(previous.meta.id), Action::Destroy)
            .await?;

        self.start(
            Service::new(project.meta.id, request),
            Action::Update,
            ComponentRef::Service,
            Workflow::UpdateService,
            LogParams {
                previous_service_id: Some(previous.meta.id),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn submit_remove_service(&self, service_id: Uuid) -> Result<Submission> {
        let service = self.repo.get::<Service>(service_id).await?;
        self.start(
            service,
            Action::Destroy,
            ComponentRef::Service,
            Workflow::RemoveService,
            LogParams::default(),
        )
        .await
    }

    /// Creates a resource, or returns the latest create run of an
    /// identical live one without dispatching
    pub async fn submit_create_resource(
        &self,
        env_id: Uuid,
        request: ResourceRequest,
    ) -> Result<Submission> {
        validate_resource_request(&request)?;
        let env = self.repo.get::<Environment>(env_id).await?;
        ensure_ready(&env, "environment")?;
        if let Some(project_id) = request.project_id {
            let project = self.repo.get::<Project>(project_id).await?;
            if project.environment_id != env_id {
                return Err(ControlPlaneError::Validation(
                    "project belongs to another environment".into(),
                ));
            }
            ensure_ready(&project, "project")?;
        }
        if let Some(service_id) = request.service_id {
            let service = self.repo.get::<Service>(service_id).await?;
            if Some(service.project_id) != request.project_id {
                return Err(ControlPlaneError::Validation(
                    "service belongs to another project".into(),
                ));
            }
        }

        if let Some(existing) = self.repo.find_live_resource(env_id, &request).await? {
            if let Some(log) = self
                .repo
                .latest_log(ComponentRef::Resource(existing.meta.id), Action::Create)
                .await?
            {
                tracing::info!(resource = %existing.meta.slug, "Resource already exists, returning its run");
                return Ok(Submission {
                    entity_id: existing.meta.id,
                    entity_slug: existing.meta.slug,
                    log_id: log.meta.id,
                    log_slug: log.meta.slug,
                    dispatched: false,
                });
            }
        }

        let mut resource = Resource::new(env_id, &env.name, &request);
        if resource.kind != ResourceType::Bucket {
            resource.conf = SealedConf::seal(
                &ResourceConf {
                    username: request.username.clone(),
                    ..Default::default()
                },
                &self.cipher,
            )?;
        }
        self.start(
            resource,
            Action::Create,
            ComponentRef::Resource,
            Workflow::CreateResource,
            LogParams::default(),
        )
        .await
    }

    pub async fn submit_remove_resource(&self, resource_id: Uuid) -> Result<Submission> {
        let resource = self.repo.get::<Resource>(resource_id).await?;
        self.start(
            resource,
            Action::Destroy,
            ComponentRef::Resource,
            Workflow::RemoveResource,
            LogParams::default(),
        )
        .await
    }

    /// Launches a worker building `version`, retiring the service's
    /// previous worker
    pub async fn submit_build_worker(&self, service_id: Uuid, version: &str) -> Result<Submission> {
        let service = self.repo.get::<Service>(service_id).await?;
        ensure_ready(&service, "service")?;
        if version.is_empty() {
            return Err(ControlPlaneError::Validation("version must be set".into()));
        }

        if let Some(previous) = self.repo.live_build_worker(service_id).await? {
            let launch = self
                .repo
                .latest_log(ComponentRef::BuildWorker(previous.meta.id), Action::Create)
                .await?;
            if launch.is_some_and(|log| log.is_pending()) {
                return Err(ControlPlaneError::Busy {
                    what: "service",
                    slug: service.meta.slug,
                    action: "build".into(),
                });
            }
            self.repo.soft_delete::<BuildWorker>(previous.meta.id).await?;
            tracing::info!(worker = %previous.meta.slug, "Retired previous build worker");
        }

        let worker = BuildWorker::new(service_id);
        self.repo.save(&worker).await?;
        self.record_and_dispatch(
            &worker,
            Action::Create,
            ComponentRef::BuildWorker(worker.meta.id),
            Workflow::LaunchBuildWorker,
            LogParams {
                version: version.to_string(),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn submit_remove_build_worker(&self, worker_id: Uuid) -> Result<Submission> {
        let worker = self.repo.get::<BuildWorker>(worker_id).await?;
        self.ensure_idle(&worker, ComponentRef::BuildWorker(worker_id), Action::Destroy)
            .await?;
        self.record_and_dispatch(
            &worker,
            Action::Destroy,
            ComponentRef::BuildWorker(worker_id),
            Workflow::RemoveBuildWorker,
            LogParams::default(),
        )
        .await
    }

    pub async fn submit_deploy(&self, service_id: Uuid, version: &str) -> Result<Submission> {
        let service = self.repo.get::<Service>(service_id).await?;
        ensure_ready(&service, "service")?;
        if version.is_empty() {
            return Err(ControlPlaneError::Validation("version must be set".into()));
        }
        if let Some(running) = self.repo.latest_deployment(service_id).await? {
            if running.is_success.is_none() {
                return Err(ControlPlaneError::Busy {
                    what: "service",
                    slug: service.meta.slug,
                    action: "deploy".into(),
                });
            }
        }

        let rollout = ServiceDeployment::new(service_id, version);
        self.repo.save(&rollout).await?;
        self.record_and_dispatch(
            &rollout,
            Action::Create,
            ComponentRef::ServiceDeployment(rollout.meta.id),
            Workflow::DeployVersion,
            LogParams {
                version: version.to_string(),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn execution_state(&self, log_slug: &str) -> Result<ExecutionState> {
        Ok(self.repo.log_by_slug(log_slug).await?.state())
    }

    /// Dispatches a job against an already recorded execution log, e.g. to
    /// re-run a failed one. `previous_service_id` is written into the log
    /// params for service updates.
    pub async fn redispatch(&self, job: Job, previous_service_id: Option<Uuid>) -> Result<()> {
        let mut log = self.repo.get::<ExecutionLog>(job.log_id).await?;
        let mut params: LogParams = log.params.open(&self.cipher)?;
        if previous_service_id.is_some() {
            params.previous_service_id = previous_service_id;
        }
        if job.workflow == Workflow::UpdateService && params.previous_service_id.is_none() {
            return Err(ControlPlaneError::Validation(
                "update_service needs the replaced service".into(),
            ));
        }
        log.params = SealedConf::seal(&params, &self.cipher)?;
        log.is_success = None;
        log.ended_at = None;
        self.repo.save(&log).await?;

        self.dispatcher.dispatch(job).await
    }

    /// Stores a service environment variable, encrypted unless `secure`
    /// is false
    pub async fn put_env_var(
        &self,
        service_id: Uuid,
        name: &str,
        value: &str,
        secure: bool,
    ) -> Result<()> {
        validate_name("variable name", name)?;
        let (cloud, prefix) = self.parameter_scope(service_id).await?;
        cloud
            .put_parameter(&format!("{}{}", prefix, name), value, secure)
            .await?;
        Ok(())
    }

    pub async fn delete_env_var(&self, service_id: Uuid, name: &str) -> Result<()> {
        validate_name("variable name", name)?;
        let (cloud, prefix) = self.parameter_scope(service_id).await?;
        cloud.delete_parameter(&format!("{}{}", prefix, name)).await?;
        Ok(())
    }

    /// Variable names, without the service prefix
    pub async fn list_env_vars(&self, service_id: Uuid) -> Result<Vec<String>> {
        let (cloud, prefix) = self.parameter_scope(service_id).await?;
        let mut names: Vec<String> = cloud
            .list_parameters(&prefix)
            .await?
            .into_iter()
            .map(|p| p.to_secret().name)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn parameter_scope(&self, service_id: Uuid) -> Result<(Arc<dyn CloudApi>, String)> {
        let (env, project, service) = self.repo.service_lineage(service_id).await?;
        let env_conf: EnvironmentConf = env.conf.open(&self.cipher)?;
        let cloud = self
            .clouds
            .connect(&env_conf.credentials(&env.region))
            .await?;
        Ok((cloud, service.parameter_prefix(&env.name, &project.name)))
    }

    /// Rejects a run while the component's latest run of the same action
    /// is still pending
    async fn ensure_idle<E: Entity>(
        &self,
        entity: &E,
        component: ComponentRef,
        action: Action,
    ) -> Result<()> {
        if let Some(log) = self.repo.latest_log(component, action).await? {
            if log.is_pending() {
                return Err(ControlPlaneError::Busy {
                    what: component.kind(),
                    slug: entity.meta().slug.clone(),
                    action: action.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Marks a provisioned entity `changes_pending`, then records and
    /// dispatches its run
    async fn start<E: Provisioned>(
        &self,
        mut entity: E,
        action: Action,
        component: fn(Uuid) -> ComponentRef,
        workflow: Workflow,
        params: LogParams,
    ) -> Result<Submission> {
        let component = component(entity.meta().id);
        self.ensure_idle(&entity, component, action).await?;

        entity.status_mut().push(InfraStatus::ChangesPending);
        entity.meta_mut().touch();
        self.repo.save(&entity).await?;

        self.record_and_dispatch(&entity, action, component, workflow, params)
            .await
    }

    async fn record_and_dispatch<E: Entity>(
        &self,
        entity: &E,
        action: Action,
        component: ComponentRef,
        workflow: Workflow,
        params: LogParams,
    ) -> Result<Submission> {
        let log = ExecutionLog::new(action, component, SealedConf::seal(&params, &self.cipher)?);
        self.repo.save(&log).await?;

        let job = Job::new(workflow, entity.meta().id, log.meta.id);
        if let Err(e) = self.dispatcher.dispatch(job).await {
            tracing::error!(log_id = %log.meta.id, "Dispatch failed: {}", e);
            self.repo.finish_log(log.meta.id, false).await?;
            return Err(e);
        }

        Ok(Submission {
            entity_id: entity.meta().id,
            entity_slug: entity.meta().slug.clone(),
            log_id: log.meta.id,
            log_slug: log.meta.slug,
            dispatched: true,
        })
    }
}
