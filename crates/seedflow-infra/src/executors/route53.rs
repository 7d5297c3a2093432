//! Environment DNS zone and service CNAMEs

use crate::action::ResourceKind;
use crate::error::Result;
use crate::lifecycle::Provisioner;
use crate::outputs::Outputs;
use crate::state_key::StateScope;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CnameRecord {
    pub subdomain: String,
    /// Load balancer DNS name the record points at
    pub route_to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route53Configs {
    pub domain: String,
    pub cname_subdomains: Vec<CnameRecord>,
}

impl Route53Configs {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            cname_subdomains: Vec::new(),
        }
    }
}

/// Creates the zone, or converges its records on re-apply
pub async fn create_route53(p: &Provisioner, configs: &Route53Configs) -> Result<Outputs> {
    tracing::info!(
        domain = %configs.domain,
        records = configs.cname_subdomains.len(),
        "Applying DNS zone"
    );
    p.apply(ResourceKind::Route53, &StateScope::Environment, Some(configs))
        .await
}

pub async fn route53_details(p: &Provisioner) -> Result<Outputs> {
    p.outputs(ResourceKind::Route53, &StateScope::Environment)
        .await
}

pub async fn destroy_route53(p: &Provisioner, configs: &Route53Configs) -> Result<()> {
    tracing::info!(domain = %configs.domain, "Destroying DNS zone");
    p.destroy(ResourceKind::Route53, &StateScope::Environment, Some(configs))
        .await
}
