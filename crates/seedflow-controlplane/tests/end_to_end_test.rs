//! Environment → project → service against the scripted tool and fake cloud

use seedflow_controlplane::ControlPlaneError;
use seedflow_controlplane::model::{
    Environment, EnvironmentConf, ExecutionLog, ExecutionState, InfraStatus, Project, ProjectConf,
    Service, ServiceConf, ServiceRequest,
};
use seedflow_controlplane::testing::{Harness, scripted_runner};
use seedflow_controlplane::validation::{NAME_COLLISION, PORT_COLLISION};

async fn log_count(h: &Harness) -> usize {
    h.repo().all::<ExecutionLog>().await.unwrap().len()
}

#[tokio::test]
async fn test_environment_project_service_flow() {
    let h = Harness::start().await;

    // 1. environment
    let env = h.ready_environment().await;
    assert!(env.status.is_ready());
    let env_conf: EnvironmentConf = env.conf.open(&h.cipher).unwrap();
    assert_eq!(env_conf.vpc_id, "vpc-0a1b2c");
    assert_eq!(env_conf.zone_id, "Z0ACME");
    assert_eq!(env_conf.access_key, "AKIATEST");

    // 2. project
    let project = h.ready_project(&env).await;
    let project_conf: ProjectConf = project.conf.open(&h.cipher).unwrap();
    assert_eq!(project_conf.alb_name, format!("api-{}", env.meta.slug));
    assert_eq!(
        project_conf.alb_public_dns,
        "api-alb-123.us-east-1.elb.amazonaws.com"
    );
    assert_eq!(project_conf.ecs_cluster, "api-cluster");

    // 3. service
    let service = h.ready_service(&project).await;
    let service_conf: ServiceConf = service.conf.open(&h.cipher).unwrap();
    assert_eq!(
        service_conf.acm_arn,
        "arn:aws:acm:us-east-1:123:certificate/web"
    );
    assert_eq!(
        service_conf.ecr_repo_url,
        "123.dkr.ecr.us-east-1.amazonaws.com/api/web"
    );
    assert_eq!(
        service_conf.target_group_arn,
        "arn:aws:elasticloadbalancing:us-east-1:123:targetgroup/api-web/1"
    );
    assert_eq!(
        h.runner.applied_order(),
        vec!["network", "route53", "alb", "ecs", "acm", "alb", "route53", "ecr"]
    );

    // 4. same subdomain is rejected before anything is dispatched
    let logs_before = log_count(&h).await;
    let err = h
        .commands()
        .submit_create_service(
            project.meta.id,
            ServiceRequest::web("admin", "app", 9000).with_alb_ports(8080, 8443),
        )
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), NAME_COLLISION);
    assert_eq!(log_count(&h).await, logs_before);
    assert_eq!(h.repo().live_services(project.meta.id).await.unwrap().len(), 1);

    h.shutdown().await;
}

#[tokio::test]
async fn test_plan_error_marks_environment_failed() {
    let h = Harness::with_runner(scripted_runner().with_plan_exit("network", 1)).await;

    let submission = h.submit_environment().await.unwrap();
    let log = h.wait(&submission).await;
    assert_eq!(log.is_success, Some(false));
    assert!(log.ended_at.is_some());

    let env: Environment = h.repo().get(submission.entity_id).await.unwrap();
    assert_eq!(env.status.last(), Some(InfraStatus::Error));
    assert_eq!(
        h.commands().execution_state(&submission.log_slug).await.unwrap(),
        ExecutionState::Failed
    );
    assert!(!h.runner.verbs("network").contains(&"apply".to_string()));

    h.shutdown().await;
}

#[tokio::test]
async fn test_project_requires_ready_environment() {
    let h = Harness::with_runner(scripted_runner().with_exit("route53", "apply", 1)).await;

    let submission = h.submit_environment().await.unwrap();
    assert_eq!(h.wait(&submission).await.is_success, Some(false));

    let logs_before = log_count(&h).await;
    let err = h
        .commands()
        .submit_create_project(submission.entity_id, "api")
        .await
        .unwrap_err();
    assert!(matches!(err, ControlPlaneError::NotReady { what: "environment" }));
    assert_eq!(log_count(&h).await, logs_before);

    h.shutdown().await;
}

#[tokio::test]
async fn test_service_requires_ready_project() {
    let h = Harness::with_runner(scripted_runner().with_plan_exit("ecs", 1)).await;
    let env = h.ready_environment().await;

    let submission = h
        .commands()
        .submit_create_project(env.meta.id, "api")
        .await
        .unwrap();
    assert_eq!(h.wait(&submission).await.is_success, Some(false));
    let project: Project = h.repo().get(submission.entity_id).await.unwrap();
    assert_eq!(project.status.last(), Some(InfraStatus::Error));

    let logs_before = log_count(&h).await;
    let err = h
        .commands()
        .submit_create_service(project.meta.id, ServiceRequest::web("web", "app", 8000))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Project is not in ready state");
    assert_eq!(log_count(&h).await, logs_before);
    assert!(h.repo().all::<Service>().await.unwrap().is_empty());

    h.shutdown().await;
}

#[tokio::test]
async fn test_port_collision_is_rejected() {
    let h = Harness::start().await;
    let env = h.ready_environment().await;
    let project = h.ready_project(&env).await;
    h.ready_service(&project).await;

    let err = h
        .commands()
        .submit_create_service(project.meta.id, ServiceRequest::web("admin", "admin", 8000))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), PORT_COLLISION);

    h.shutdown().await;
}

#[tokio::test]
async fn test_non_web_service_skips_infrastructure() {
    let h = Harness::start().await;
    let env = h.ready_environment().await;
    let project = h.ready_project(&env).await;
    let applied_before = h.runner.applied_order().len();

    let mut request = ServiceRequest::web("worker", "worker", 9000).with_alb_ports(8080, 8443);
    request.has_web_interface = false;
    let submission = h
        .commands()
        .submit_create_service(project.meta.id, request)
        .await
        .unwrap();
    assert_eq!(h.wait(&submission).await.is_success, Some(true));

    let service: Service = h.repo().get(submission.entity_id).await.unwrap();
    assert!(service.status.is_ready());
    assert_eq!(h.runner.applied_order().len(), applied_before);

    h.shutdown().await;
}
