//! Object storage bucket

use crate::action::ResourceKind;
use crate::error::Result;
use crate::lifecycle::Provisioner;
use crate::outputs::Outputs;
use crate::state_key::StateScope;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfigs {
    pub bucket_name: String,
    pub acl: String,
}

impl BucketConfigs {
    /// Publicly readable bucket for static assets
    pub fn statics(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            acl: "public-read".into(),
        }
    }
}

pub async fn create_bucket(
    p: &Provisioner,
    resource_slug: &str,
    configs: &BucketConfigs,
) -> Result<Outputs> {
    tracing::info!(bucket = %configs.bucket_name, "Applying bucket");
    p.apply(
        ResourceKind::S3Bucket,
        &StateScope::Resource(resource_slug.to_string()),
        Some(configs),
    )
    .await
}

pub async fn destroy_bucket(
    p: &Provisioner,
    resource_slug: &str,
    configs: &BucketConfigs,
) -> Result<()> {
    tracing::info!(bucket = %configs.bucket_name, "Destroying bucket");
    p.destroy(
        ResourceKind::S3Bucket,
        &StateScope::Resource(resource_slug.to_string()),
        Some(configs),
    )
    .await
}
