//! Environment network (VPC, subnets, gateways)

use crate::action::ResourceKind;
use crate::error::Result;
use crate::lifecycle::{NO_PARAMS, Provisioner};
use crate::outputs::Outputs;
use crate::state_key::StateScope;

/// Creates the network unless its state already has outputs
pub async fn create_network(p: &Provisioner) -> Result<Outputs> {
    let existing = network_details(p).await?;
    if !existing.is_empty() {
        tracing::info!(env = %p.common().env_name, "Network already exists");
        return Ok(existing);
    }

    tracing::info!(env = %p.common().env_name, "Creating network");
    p.apply(ResourceKind::Network, &StateScope::Environment, NO_PARAMS)
        .await
}

pub async fn network_details(p: &Provisioner) -> Result<Outputs> {
    p.outputs(ResourceKind::Network, &StateScope::Environment)
        .await
}

pub async fn destroy_network(p: &Provisioner) -> Result<()> {
    tracing::info!(env = %p.common().env_name, "Destroying network");
    p.destroy(ResourceKind::Network, &StateScope::Environment, NO_PARAMS)
        .await
}
