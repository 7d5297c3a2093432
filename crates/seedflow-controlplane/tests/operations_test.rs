//! Deployments, updates, resources, build workers and teardown

use seedflow_controlplane::model::{
    BuildWorker, Engine, Environment, Preset, Project, Resource, ResourceConf,
    ResourceRequest, Service, ServiceDeployment, ServiceRequest,
};
use seedflow_controlplane::testing::{Harness, scripted_runner};
use seedflow_infra::testing::FakeCloud;

async fn ready_stack(h: &Harness) -> (Environment, Project, Service) {
    let env = h.ready_environment().await;
    let project = h.ready_project(&env).await;
    let service = h.ready_service(&project).await;
    (env, project, service)
}

async fn deployments_of(h: &Harness, service: &Service) -> Vec<ServiceDeployment> {
    h.repo()
        .all::<ServiceDeployment>()
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.service_id == service.meta.id)
        .collect()
}

#[tokio::test]
async fn test_deploy_runs_version_with_secrets() {
    let h = Harness::start().await;
    let (_, _, service) = ready_stack(&h).await;

    h.commands()
        .put_env_var(service.meta.id, "DATABASE_URL", "postgres://db", true)
        .await
        .unwrap();
    assert_eq!(
        h.commands().list_env_vars(service.meta.id).await.unwrap(),
        vec!["DATABASE_URL"]
    );
    assert_eq!(
        h.cloud.parameter("/prod/api/web/DATABASE_URL").as_deref(),
        Some("postgres://db")
    );

    let submission = h.commands().submit_deploy(service.meta.id, "v1").await.unwrap();
    assert_eq!(h.wait(&submission).await.is_success, Some(true));

    let running = h.cloud.service("api-cluster", "web").unwrap();
    assert_eq!(running.running_count, 1);
    assert_eq!(h.cloud.task_definitions("web").len(), 1);

    let rollout: ServiceDeployment = h.repo().get(submission.entity_id).await.unwrap();
    assert_eq!(rollout.version, "v1");
    assert_eq!(rollout.is_success, Some(true));

    h.shutdown().await;
}

#[tokio::test]
async fn test_stalled_rollout_fails_deployment() {
    let h = Harness::with_parts(scripted_runner(), FakeCloud::new().stalled()).await;
    let (_, _, service) = ready_stack(&h).await;

    let submission = h.commands().submit_deploy(service.meta.id, "v1").await.unwrap();
    assert_eq!(h.wait(&submission).await.is_success, Some(false));

    let rollout: ServiceDeployment = h.repo().get(submission.entity_id).await.unwrap();
    assert_eq!(rollout.is_success, Some(false));

    // the failed rollout no longer blocks a new one
    let retry = h.commands().submit_deploy(service.meta.id, "v1").await;
    assert!(retry.is_ok());

    h.shutdown().await;
}

#[tokio::test]
async fn test_update_replaces_service_and_redeploys() {
    let h = Harness::start().await;
    let (_, project, previous) = ready_stack(&h).await;

    let first = h.commands().submit_deploy(previous.meta.id, "v1").await.unwrap();
    assert_eq!(h.wait(&first).await.is_success, Some(true));

    let mut request = ServiceRequest::web("web", "app", 8000);
    request.health_check_endpoint = "/health".into();
    let submission = h
        .commands()
        .submit_update_service(previous.meta.id, request)
        .await
        .unwrap();
    assert_ne!(submission.entity_id, previous.meta.id);
    assert_eq!(h.wait(&submission).await.is_success, Some(true));

    let old: Service = h.repo().get(previous.meta.id).await.unwrap();
    assert!(!old.meta.is_live());

    let live = h.repo().live_services(project.meta.id).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].meta.id, submission.entity_id);
    assert_eq!(live[0].health_check_endpoint, "/health");
    assert!(live[0].status.is_ready());

    let redeployed = deployments_of(&h, &live[0]).await;
    assert_eq!(redeployed.len(), 1);
    assert_eq!(redeployed[0].version, "v1");
    assert_eq!(redeployed[0].is_success, Some(true));
    assert_eq!(h.cloud.service("api-cluster", "web").unwrap().running_count, 1);

    h.shutdown().await;
}

#[tokio::test]
async fn test_database_is_created_once() {
    let h = Harness::start().await;
    let env = h.ready_environment().await;
    let project = h.ready_project(&env).await;

    let request = ResourceRequest {
        name: "main".into(),
        engine: Engine::Postgres,
        preset: Preset::Dev,
        project_id: Some(project.meta.id),
        service_id: None,
        username: "app".into(),
    };
    let submission = h
        .commands()
        .submit_create_resource(env.meta.id, request.clone())
        .await
        .unwrap();
    assert!(submission.dispatched);
    assert_eq!(h.wait(&submission).await.is_success, Some(true));

    let db: Resource = h.repo().get(submission.entity_id).await.unwrap();
    assert!(db.status.is_ready());
    assert!(db.identifier.starts_with("prod-main-"));
    let conf: ResourceConf = db.conf.open(&h.cipher).unwrap();
    assert_eq!(conf.address, "db-1.abc.us-east-1.rds.amazonaws.com");
    assert_eq!(conf.username, "app");
    assert_eq!(conf.password.len(), 40);
    assert_eq!(conf.instance_type, "db.t2.micro");
    assert_eq!(conf.port, 5432);

    let again = h
        .commands()
        .submit_create_resource(env.meta.id, request)
        .await
        .unwrap();
    assert!(!again.dispatched);
    assert_eq!(again.entity_id, submission.entity_id);
    assert_eq!(again.log_slug, submission.log_slug);
    assert_eq!(h.runner.verbs("postgres").iter().filter(|v| *v == "apply").count(), 1);

    h.shutdown().await;
}

#[tokio::test]
async fn test_bucket_and_cache_resources() {
    let h = Harness::start().await;
    let env = h.ready_environment().await;

    let bucket = h
        .commands()
        .submit_create_resource(
            env.meta.id,
            ResourceRequest {
                name: "statics".into(),
                engine: Engine::S3,
                preset: Preset::Statics,
                project_id: None,
                service_id: None,
                username: String::new(),
            },
        )
        .await
        .unwrap();
    assert_eq!(h.wait(&bucket).await.is_success, Some(true));

    let cache = h
        .commands()
        .submit_create_resource(
            env.meta.id,
            ResourceRequest {
                name: "sessions".into(),
                engine: Engine::Redis,
                preset: Preset::Dev,
                project_id: None,
                service_id: None,
                username: String::new(),
            },
        )
        .await
        .unwrap();
    assert_eq!(h.wait(&cache).await.is_success, Some(true));

    let cache: Resource = h.repo().get(cache.entity_id).await.unwrap();
    let conf: ResourceConf = cache.conf.open(&h.cipher).unwrap();
    assert_eq!(conf.address, "cache-1.abc.cache.amazonaws.com");
    assert_eq!(conf.password.len(), 30);

    let removal = h.commands().submit_remove_resource(cache.meta.id).await.unwrap();
    assert_eq!(h.wait(&removal).await.is_success, Some(true));
    let cache: Resource = h.repo().get(cache.meta.id).await.unwrap();
    assert!(!cache.meta.is_live());
    assert_eq!(h.runner.verbs("elasticache").last().map(String::as_str), Some("destroy"));

    h.shutdown().await;
}

#[tokio::test]
async fn test_build_worker_launch_retires_previous() {
    let h = Harness::start().await;
    let (_, _, service) = ready_stack(&h).await;

    let first = h.commands().submit_build_worker(service.meta.id, "v1").await.unwrap();
    assert_eq!(h.wait(&first).await.is_success, Some(true));
    let worker: BuildWorker = h.repo().get(first.entity_id).await.unwrap();
    assert_eq!(worker.instance_id, "i-0build");
    assert_eq!(worker.public_ip, "203.0.113.7");
    assert!(worker.launched_at.is_some());
    assert!(worker.ssh_key_name.starts_with("api_prod_"));

    let second = h.commands().submit_build_worker(service.meta.id, "v2").await.unwrap();
    assert_eq!(h.wait(&second).await.is_success, Some(true));

    let retired: BuildWorker = h.repo().get(first.entity_id).await.unwrap();
    assert!(!retired.meta.is_live());
    let live = h.repo().live_build_worker(service.meta.id).await.unwrap().unwrap();
    assert_eq!(live.meta.id, second.entity_id);

    let removal = h
        .commands()
        .submit_remove_build_worker(second.entity_id)
        .await
        .unwrap();
    assert_eq!(h.wait(&removal).await.is_success, Some(true));
    assert!(h.repo().live_build_worker(service.meta.id).await.unwrap().is_none());

    h.shutdown().await;
}

#[tokio::test]
async fn test_teardown_in_order() {
    let h = Harness::start().await;
    let (env, project, service) = ready_stack(&h).await;
    let deployed = h.commands().submit_deploy(service.meta.id, "v1").await.unwrap();
    assert_eq!(h.wait(&deployed).await.is_success, Some(true));

    // parents refuse while children are live
    assert!(h.commands().submit_remove_project(project.meta.id).await.is_err());
    assert!(h.commands().submit_remove_environment(env.meta.id).await.is_err());

    let removal = h.commands().submit_remove_service(service.meta.id).await.unwrap();
    assert_eq!(h.wait(&removal).await.is_success, Some(true));
    assert_eq!(
        h.cloud.service("api-cluster", "web").unwrap().status,
        "INACTIVE"
    );
    assert!(h.cloud.task_definitions("web").is_empty());
    assert_eq!(h.runner.verbs("ecr").last().map(String::as_str), Some("destroy"));
    assert_eq!(h.runner.verbs("acm").last().map(String::as_str), Some("destroy"));

    let removal = h.commands().submit_remove_project(project.meta.id).await.unwrap();
    assert_eq!(h.wait(&removal).await.is_success, Some(true));
    let removal = h.commands().submit_remove_environment(env.meta.id).await.unwrap();
    assert_eq!(h.wait(&removal).await.is_success, Some(true));

    let env: Environment = h.repo().get(env.meta.id).await.unwrap();
    assert!(!env.meta.is_live());
    assert_eq!(h.runner.verbs("network").last().map(String::as_str), Some("destroy"));

    h.shutdown().await;
}
