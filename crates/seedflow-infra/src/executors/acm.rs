//! Per-service TLS certificate validated through the environment zone

use crate::action::ResourceKind;
use crate::error::Result;
use crate::lifecycle::Provisioner;
use crate::outputs::Outputs;
use crate::state_key::StateScope;
use serde::{Deserialize, Serialize};

pub const CERTIFICATE_ARN_OUTPUT: &str = "this_acm_certificate_arn";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcmConfigs {
    /// Fully qualified domain, e.g. `app.acme.com`
    pub domain_name: String,
    pub zone_id: String,
}

pub async fn create_acm(
    p: &Provisioner,
    service_slug: &str,
    configs: &AcmConfigs,
) -> Result<Outputs> {
    tracing::info!(domain = %configs.domain_name, "Requesting certificate");
    p.apply(
        ResourceKind::Acm,
        &StateScope::Service(service_slug.to_string()),
        Some(configs),
    )
    .await
}

pub async fn destroy_acm(p: &Provisioner, service_slug: &str, configs: &AcmConfigs) -> Result<()> {
    tracing::info!(domain = %configs.domain_name, "Destroying certificate");
    p.destroy(
        ResourceKind::Acm,
        &StateScope::Service(service_slug.to_string()),
        Some(configs),
    )
    .await
}
