//! Typed access to persisted entities

use crate::error::{ControlPlaneError, Result};
use crate::model::{
    BuildWorker, ComponentRef, Entity, Environment, ExecutionLog, InfraStatus, Project,
    Provisioned, Resource, ResourceRequest, Service, ServiceDeployment, Tenant,
};
use crate::store::Store;
use seedflow_infra::Action;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn find<E: Entity>(&self, id: Uuid) -> Result<Option<E>> {
        match self.store.load(E::TABLE, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn get<E: Entity>(&self, id: Uuid) -> Result<E> {
        self.find(id)
            .await?
            .ok_or_else(|| ControlPlaneError::not_found(E::TABLE.entity_name(), id))
    }

    pub async fn save<E: Entity>(&self, entity: &E) -> Result<()> {
        let value = serde_json::to_value(entity)?;
        self.store.save(E::TABLE, entity.meta().id, value).await
    }

    /// Every record of the table, oldest first, ties broken by id
    pub async fn all<E: Entity>(&self) -> Result<Vec<E>> {
        let mut records = self
            .store
            .scan(E::TABLE)
            .await?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<E>, _>>()?;
        records.sort_by_key(|e| (e.meta().created_at, e.meta().id));
        Ok(records)
    }

    async fn filter<E: Entity>(&self, keep: impl Fn(&E) -> bool) -> Result<Vec<E>> {
        Ok(self.all::<E>().await?.into_iter().filter(keep).collect())
    }

    pub async fn find_by_slug<E: Entity>(&self, slug: &str) -> Result<Option<E>> {
        Ok(self
            .filter::<E>(|e| e.meta().slug == slug)
            .await?
            .into_iter()
            .next())
    }

    /// Appends a status row and persists the entity
    pub async fn set_status<E: Provisioned>(&self, id: Uuid, status: InfraStatus) -> Result<E> {
        let mut entity = self.get::<E>(id).await?;
        entity.status_mut().push(status);
        entity.meta_mut().touch();
        self.save(&entity).await?;
        tracing::debug!(table = %E::TABLE, %id, %status, "Status changed");
        Ok(entity)
    }

    pub async fn soft_delete<E: Entity>(&self, id: Uuid) -> Result<E> {
        let mut entity = self.get::<E>(id).await?;
        entity.meta_mut().soft_delete();
        self.save(&entity).await?;
        Ok(entity)
    }

    pub async fn tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        self.find_by_slug(slug).await
    }

    pub async fn live_projects(&self, environment_id: Uuid) -> Result<Vec<Project>> {
        self.filter(|p: &Project| p.environment_id == environment_id && p.meta.is_live())
            .await
    }

    pub async fn live_services(&self, project_id: Uuid) -> Result<Vec<Service>> {
        self.filter(|s: &Service| s.project_id == project_id && s.meta.is_live())
            .await
    }

    /// Live services of every live project in the environment, with their
    /// project
    pub async fn live_services_in_environment(
        &self,
        environment_id: Uuid,
    ) -> Result<Vec<(Project, Service)>> {
        let mut pairs = Vec::new();
        for project in self.live_projects(environment_id).await? {
            for service in self.live_services(project.meta.id).await? {
                pairs.push((project.clone(), service));
            }
        }
        Ok(pairs)
    }

    /// Live resource with the same owner, name and type as `request`
    pub async fn find_live_resource(
        &self,
        environment_id: Uuid,
        request: &ResourceRequest,
    ) -> Result<Option<Resource>> {
        Ok(self
            .filter(|r: &Resource| r.meta.is_live() && r.matches(environment_id, request))
            .await?
            .into_iter()
            .next())
    }

    /// Newest log for the component and action
    pub async fn latest_log(
        &self,
        component: ComponentRef,
        action: Action,
    ) -> Result<Option<ExecutionLog>> {
        Ok(self
            .filter(|l: &ExecutionLog| l.component == component && l.action == action)
            .await?
            .pop())
    }

    pub async fn log_by_slug(&self, slug: &str) -> Result<ExecutionLog> {
        self.find_by_slug(slug)
            .await?
            .ok_or_else(|| ControlPlaneError::not_found("execution log", slug))
    }

    pub async fn finish_log(&self, log_id: Uuid, success: bool) -> Result<ExecutionLog> {
        let mut log = self.get::<ExecutionLog>(log_id).await?;
        log.finish(success);
        self.save(&log).await?;
        Ok(log)
    }

    pub async fn live_build_worker(&self, service_id: Uuid) -> Result<Option<BuildWorker>> {
        Ok(self
            .filter(|w: &BuildWorker| w.service_id == service_id && w.meta.is_live())
            .await?
            .pop())
    }

    pub async fn latest_deployment(&self, service_id: Uuid) -> Result<Option<ServiceDeployment>> {
        Ok(self
            .filter(|d: &ServiceDeployment| d.service_id == service_id)
            .await?
            .pop())
    }

    /// Environment of a project, loaded together
    pub async fn project_with_environment(&self, project_id: Uuid) -> Result<(Environment, Project)> {
        let project = self.get::<Project>(project_id).await?;
        let environment = self.get::<Environment>(project.environment_id).await?;
        Ok((environment, project))
    }

    /// Full ancestry of a service
    pub async fn service_lineage(&self, service_id: Uuid) -> Result<(Environment, Project, Service)> {
        let service = self.get::<Service>(service_id).await?;
        let (environment, project) = self.project_with_environment(service.project_id).await?;
        Ok((environment, project, service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionState, SealedConf, ServiceRequest};
    use crate::store::MemoryStore;

    fn repo() -> Repository {
        Repository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let err = repo().get::<Project>(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::NotFound { what: "project", .. }));
    }

    #[tokio::test]
    async fn test_live_services_skip_deleted() {
        let repo = repo();
        let project = Project::new(Uuid::new_v4(), "api");
        repo.save(&project).await.unwrap();

        let web = Service::new(project.meta.id, ServiceRequest::web("web", "app", 8000));
        let mut old = Service::new(project.meta.id, ServiceRequest::web("old", "old", 8001));
        old.meta.soft_delete();
        repo.save(&web).await.unwrap();
        repo.save(&old).await.unwrap();

        let live = repo.live_services(project.meta.id).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].name, "web");
    }

    #[tokio::test]
    async fn test_latest_log_and_slug_lookup() {
        let repo = repo();
        let env_id = Uuid::new_v4();
        let first = ExecutionLog::new(
            Action::Create,
            ComponentRef::Environment(env_id),
            SealedConf::default(),
        );
        repo.save(&first).await.unwrap();
        let mut second = ExecutionLog::new(
            Action::Create,
            ComponentRef::Environment(env_id),
            SealedConf::default(),
        );
        second.meta.created_at = first.meta.created_at + chrono::Duration::seconds(1);
        repo.save(&second).await.unwrap();

        let latest = repo
            .latest_log(ComponentRef::Environment(env_id), Action::Create)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.meta.id, second.meta.id);
        assert!(
            repo.latest_log(ComponentRef::Environment(env_id), Action::Destroy)
                .await
                .unwrap()
                .is_none()
        );

        repo.finish_log(first.meta.id, true).await.unwrap();
        let by_slug = repo.log_by_slug(&first.meta.slug).await.unwrap();
        assert_eq!(by_slug.state(), ExecutionState::Succeeded);
    }

    #[tokio::test]
    async fn test_latest_log_is_stable_for_equal_timestamps() {
        let repo = repo();
        let env_id = Uuid::new_v4();
        let created_at = chrono::Utc::now();
        let mut ids = Vec::new();
        for _ in 0..8 {
            let mut log = ExecutionLog::new(
                Action::Create,
                ComponentRef::Environment(env_id),
                SealedConf::default(),
            );
            log.meta.created_at = created_at;
            ids.push(log.meta.id);
            repo.save(&log).await.unwrap();
        }
        let expected = ids.into_iter().max().unwrap();

        for _ in 0..5 {
            let latest = repo
                .latest_log(ComponentRef::Environment(env_id), Action::Create)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(latest.meta.id, expected);
        }
    }

    #[tokio::test]
    async fn test_set_status_appends_history() {
        let repo = repo();
        let env = Environment::new(Uuid::new_v4(), "prod", "acme.com", "us-east-1");
        repo.save(&env).await.unwrap();

        repo.set_status::<Environment>(env.meta.id, InfraStatus::ChangesPending)
            .await
            .unwrap();
        let env: Environment = repo
            .set_status(env.meta.id, InfraStatus::Ready)
            .await
            .unwrap();
        assert!(env.status.is_ready());
        assert_eq!(env.status.entries().len(), 2);
    }
}
