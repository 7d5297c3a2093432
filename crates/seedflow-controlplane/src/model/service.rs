use super::common::EntityMeta;
use super::conf::SealedConf;
use super::status::StatusHistory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const HEALTH_CHECK_PROTOCOL: &str = "HTTP";

/// Caller input for a new service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub name: String,
    pub subdomain: String,
    pub container_port: u16,
    pub alb_port_http: u16,
    pub alb_port_https: u16,
    #[serde(default = "default_health_check")]
    pub health_check_endpoint: String,
    #[serde(default = "default_true")]
    pub has_web_interface: bool,
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
    #[serde(default)]
    pub dockerfile_target: String,
}

fn default_health_check() -> String {
    "/".into()
}

fn default_true() -> bool {
    true
}

fn default_dockerfile() -> String {
    "Dockerfile".into()
}

impl ServiceRequest {
    pub fn web(name: impl Into<String>, subdomain: impl Into<String>, container_port: u16) -> Self {
        Self {
            name: name.into(),
            subdomain: subdomain.into(),
            container_port,
            alb_port_http: 80,
            alb_port_https: 443,
            health_check_endpoint: default_health_check(),
            has_web_interface: true,
            dockerfile: default_dockerfile(),
            dockerfile_target: String::new(),
        }
    }

    pub fn with_alb_ports(mut self, http: u16, https: u16) -> Self {
        self.alb_port_http = http;
        self.alb_port_https = https;
        self
    }
}

/// One deployable unit of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub meta: EntityMeta,
    pub project_id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub container_port: u16,
    pub alb_port_http: u16,
    pub alb_port_https: u16,
    pub health_check_endpoint: String,
    pub has_web_interface: bool,
    pub dockerfile: String,
    pub dockerfile_target: String,
    pub conf: SealedConf,
    pub status: StatusHistory,
}

impl Service {
    pub fn new(project_id: Uuid, request: ServiceRequest) -> Self {
        Self {
            meta: EntityMeta::new(),
            project_id,
            name: request.name,
            subdomain: request.subdomain,
            container_port: request.container_port,
            alb_port_http: request.alb_port_http,
            alb_port_https: request.alb_port_https,
            health_check_endpoint: request.health_check_endpoint,
            has_web_interface: request.has_web_interface,
            dockerfile: request.dockerfile,
            dockerfile_target: request.dockerfile_target,
            conf: SealedConf::default(),
            status: StatusHistory::default(),
        }
    }

    /// Registry repository holding this service's images
    pub fn repo_name(&self, project_name: &str) -> String {
        format!("{}/{}", project_name, self.name)
    }

    /// Parameter store prefix for the service's environment variables
    pub fn parameter_prefix(&self, env_name: &str, project_name: &str) -> String {
        format!("/{}/{}/{}/", env_name, project_name, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConf {
    pub acm_arn: String,
    pub health_check_protocol: String,
    pub ecr_repo_name: String,
    pub ecr_repo_url: String,
    pub target_group_arn: String,
}

/// One version rolled out to a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDeployment {
    pub meta: EntityMeta,
    pub service_id: Uuid,
    pub version: String,
    pub is_success: Option<bool>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ServiceDeployment {
    pub fn new(service_id: Uuid, version: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::new(),
            service_id,
            version: version.into(),
            is_success: None,
            ended_at: None,
        }
    }

    pub fn finish(&mut self, success: bool) {
        self.is_success = Some(success);
        self.ended_at = Some(Utc::now());
    }
}

/// Ephemeral instance building images for one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildWorker {
    pub meta: EntityMeta,
    pub service_id: Uuid,
    pub launched_at: Option<DateTime<Utc>>,
    pub instance_id: String,
    pub ssh_key_name: String,
    pub public_ip: String,
}

impl BuildWorker {
    pub fn new(service_id: Uuid) -> Self {
        Self {
            meta: EntityMeta::new(),
            service_id,
            launched_at: None,
            instance_id: String::new(),
            ssh_key_name: String::new(),
            public_ip: String::new(),
        }
    }
}
