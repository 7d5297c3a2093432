use super::common::EntityMeta;
use serde::{Deserialize, Serialize};

/// Organization owning environments.
///
/// Unlike other entities the slug is chosen by the caller; it is the first
/// segment of every state key the tenant owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub meta: EntityMeta,
    pub name: String,
}

impl Tenant {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::with_slug(slug),
            name: name.into(),
        }
    }

    pub fn slug(&self) -> &str {
        &self.meta.slug
    }
}
