use crate::crypto::random_hex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slugs are 20 hex characters
const SLUG_BYTES: usize = 10;

/// Identity and lifecycle fields shared by every entity.
///
/// The id stays internal; callers only ever see the slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: Uuid,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl EntityMeta {
    pub fn new() -> Self {
        Self::with_slug(random_hex(SLUG_BYTES))
    }

    pub fn with_slug(slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn soft_delete(&mut self) {
        let now = Utc::now();
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}

impl Default for EntityMeta {
    fn default() -> Self {
        Self::new()
    }
}
