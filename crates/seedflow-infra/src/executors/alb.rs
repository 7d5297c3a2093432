//! Project load balancer with one listener pair per web service

use crate::action::ResourceKind;
use crate::error::Result;
use crate::lifecycle::Provisioner;
use crate::outputs::Outputs;
use crate::state_key::StateScope;
use serde::{Deserialize, Serialize};

/// Routing for one service behind the load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbPort {
    pub name: String,
    pub container_port: u16,
    pub alb_port_http: u16,
    pub alb_port_https: u16,
    pub health_check_endpoint: String,
    pub health_check_protocol: String,
    #[serde(default)]
    pub ssl_certificate_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbConfigs {
    pub alb_name: String,
    pub open_ports: Vec<AlbPort>,
}

impl AlbConfigs {
    pub fn new(alb_name: impl Into<String>) -> Self {
        Self {
            alb_name: alb_name.into(),
            open_ports: Vec::new(),
        }
    }

    pub fn with_ports(mut self, ports: Vec<AlbPort>) -> Self {
        self.open_ports = ports;
        self
    }
}

pub async fn create_alb(p: &Provisioner, configs: &AlbConfigs) -> Result<Outputs> {
    tracing::info!(alb = %configs.alb_name, ports = configs.open_ports.len(), "Applying load balancer");
    p.apply(ResourceKind::Alb, &StateScope::Project, Some(configs))
        .await
}

pub async fn alb_details(p: &Provisioner) -> Result<Outputs> {
    p.outputs(ResourceKind::Alb, &StateScope::Project).await
}

pub async fn destroy_alb(p: &Provisioner, configs: &AlbConfigs) -> Result<()> {
    tracing::info!(alb = %configs.alb_name, "Destroying load balancer");
    p.destroy(ResourceKind::Alb, &StateScope::Project, Some(configs))
        .await
}
