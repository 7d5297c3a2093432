//! Container image repositories of a service

use crate::action::ResourceKind;
use crate::error::Result;
use crate::lifecycle::Provisioner;
use crate::outputs::Outputs;
use crate::state_key::StateScope;
use serde::{Deserialize, Serialize};

pub const REPOSITORY_URLS_OUTPUT: &str = "repositories_urls";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcrConfigs {
    pub repositories: Vec<String>,
}

pub async fn create_ecr(p: &Provisioner, service_slug: &str, configs: &EcrConfigs) -> Result<Outputs> {
    tracing::info!(repositories = ?configs.repositories, "Applying registry");
    p.apply(
        ResourceKind::Ecr,
        &StateScope::Service(service_slug.to_string()),
        Some(configs),
    )
    .await
}

pub async fn destroy_ecr(p: &Provisioner, service_slug: &str, configs: &EcrConfigs) -> Result<()> {
    tracing::info!(repositories = ?configs.repositories, "Destroying registry");
    p.destroy(
        ResourceKind::Ecr,
        &StateScope::Service(service_slug.to_string()),
        Some(configs),
    )
    .await
}
