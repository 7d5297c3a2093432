//! In-process control plane over the scripted tool runner and fake cloud
//!
//! Enabled for this crate's own tests and, through the `test-utils`
//! feature, for integration tests and dependent crates.

use crate::app::ControlPlane;
use crate::commands::{Commands, EnvironmentCredentials, Submission};
use crate::crypto::ConfCipher;
use crate::error::Result;
use crate::model::{Environment, ExecutionLog, Project, Service, ServiceRequest, Tenant};
use crate::repository::Repository;
use crate::store::MemoryStore;
use crate::workflows::{DeployOptions, Workflows};
use seedflow_infra::ExecutorSettings;
use seedflow_infra::testing::{FakeCloud, FakeCloudFactory, ScriptedRunner};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const WAIT_STEP: Duration = Duration::from_millis(10);
const WAIT_LIMIT: Duration = Duration::from_secs(30);

/// Runner whose modules report the outputs workflows read
pub fn scripted_runner() -> ScriptedRunner {
    ScriptedRunner::new()
        .with_outputs("network", json!({"vpc_id": "vpc-0a1b2c"}))
        .with_outputs("route53", json!({"primary_zone_id": "Z0ACME"}))
        .with_outputs(
            "alb",
            json!({
                "alb_name": "api-alb",
                "public_dns": "api-alb-123.us-east-1.elb.amazonaws.com",
                "alb_arn": "arn:aws:elasticloadbalancing:us-east-1:123:loadbalancer/app/api-alb/1",
                "alb_security_group_id": "sg-alb",
                "target_groups_arn": [
                    "arn:aws:elasticloadbalancing:us-east-1:123:targetgroup/api-web/1"
                ]
            }),
        )
        .with_outputs(
            "ecs",
            json!({
                "cluster": "api-cluster",
                "ecs_executor_role_arn": "arn:aws:iam::123:role/api-executor",
                "security_group_id": "sg-cluster"
            }),
        )
        .with_outputs(
            "acm",
            json!({"this_acm_certificate_arn": "arn:aws:acm:us-east-1:123:certificate/web"}),
        )
        .with_outputs(
            "ecr",
            json!({"repositories_urls": ["123.dkr.ecr.us-east-1.amazonaws.com/api/web"]}),
        )
        .with_outputs(
            "postgres",
            json!({"master_instance_endpoint": "db-1.abc.us-east-1.rds.amazonaws.com:5432"}),
        )
        .with_outputs(
            "elasticache",
            json!({"cache_nodes_details": [{"address": "cache-1.abc.cache.amazonaws.com", "port": 6379}]}),
        )
        .with_outputs(
            "s3_bucket",
            json!({
                "bucket": "prod-statics",
                "arn": "arn:aws:s3:::prod-statics",
                "bucket_domain_name": "prod-statics.s3.amazonaws.com",
                "bucket_regional_domain_name": "prod-statics.s3.us-east-1.amazonaws.com",
                "r53_zone_id": "Z3AQBSTGFYJSTF",
                "region": "us-east-1"
            }),
        )
        .with_outputs(
            "build_worker",
            json!({"instance_id": "i-0build", "instance_public_ip": "203.0.113.7"}),
        )
}

pub fn credentials() -> EnvironmentCredentials {
    EnvironmentCredentials {
        access_key: "AKIATEST".into(),
        secret_key: "secret".into(),
        session_token: String::new(),
    }
}

/// A started control plane with one tenant
pub struct Harness {
    pub plane: ControlPlane,
    pub runner: Arc<ScriptedRunner>,
    pub cloud: Arc<FakeCloud>,
    pub tenant: Tenant,
    pub cipher: ConfCipher,
    root: TempDir,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_runner(scripted_runner()).await
    }

    pub async fn with_runner(runner: ScriptedRunner) -> Self {
        Self::with_parts(runner, FakeCloud::new()).await
    }

    pub async fn with_parts(runner: ScriptedRunner, cloud: FakeCloud) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(runner);
        let cloud = Arc::new(cloud);
        let repo = Repository::new(Arc::new(MemoryStore::new()));
        let cipher = ConfCipher::new([42u8; 32]);

        let workflows = Workflows::new(
            repo,
            cipher.clone(),
            runner.clone(),
            Arc::new(ExecutorSettings::rooted(root.path())),
            Arc::new(FakeCloudFactory::new(cloud.clone())),
        )
        .with_deploy_options(DeployOptions {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_secs(2),
        });
        let plane = ControlPlane::start(workflows);
        let tenant = plane
            .commands()
            .create_tenant("Acme", "acme")
            .await
            .expect("tenant");

        Self {
            plane,
            runner,
            cloud,
            tenant,
            cipher,
            root,
        }
    }

    pub fn commands(&self) -> &Commands {
        self.plane.commands()
    }

    pub fn repo(&self) -> &Repository {
        self.plane.repository()
    }

    pub fn root(&self) -> &std::path::Path {
        self.root.path()
    }

    /// Polls until the submission's run has an outcome
    pub async fn wait(&self, submission: &Submission) -> ExecutionLog {
        let poll = async {
            loop {
                let log = self
                    .repo()
                    .get::<ExecutionLog>(submission.log_id)
                    .await
                    .expect("execution log");
                if !log.is_pending() {
                    return log;
                }
                tokio::time::sleep(WAIT_STEP).await;
            }
        };
        tokio::time::timeout(WAIT_LIMIT, poll)
            .await
            .expect("run did not finish")
    }

    pub async fn submit_environment(&self) -> Result<Submission> {
        self.commands()
            .submit_create_environment(
                self.tenant.meta.id,
                "prod",
                "acme.com",
                "us-east-1",
                credentials(),
            )
            .await
    }

    pub async fn ready_environment(&self) -> Environment {
        let submission = self.submit_environment().await.expect("submit environment");
        assert_eq!(self.wait(&submission).await.is_success, Some(true));
        self.repo().get(submission.entity_id).await.expect("environment")
    }

    pub async fn ready_project(&self, env: &Environment) -> Project {
        let submission = self
            .commands()
            .submit_create_project(env.meta.id, "api")
            .await
            .expect("submit project");
        assert_eq!(self.wait(&submission).await.is_success, Some(true));
        self.repo().get(submission.entity_id).await.expect("project")
    }

    pub async fn ready_service(&self, project: &Project) -> Service {
        let submission = self
            .commands()
            .submit_create_service(project.meta.id, ServiceRequest::web("web", "app", 8000))
            .await
            .expect("submit service");
        assert_eq!(self.wait(&submission).await.is_success, Some(true));
        self.repo().get(submission.entity_id).await.expect("service")
    }

    pub async fn shutdown(&self) {
        self.plane.shutdown().await;
    }
}
