//! Managed databases, caches and buckets

use super::common::EntityMeta;
use super::conf::SealedConf;
use super::status::StatusHistory;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Database,
    Cache,
    Bucket,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Database => write!(f, "database"),
            ResourceType::Cache => write!(f, "cache"),
            ResourceType::Bucket => write!(f, "bucket"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Postgres,
    Redis,
    S3,
}

impl Engine {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Engine::Postgres => ResourceType::Database,
            Engine::Redis => ResourceType::Cache,
            Engine::S3 => ResourceType::Bucket,
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Engine::Postgres => "11.5",
            Engine::Redis => "5.0.6",
            Engine::S3 => "",
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Engine::Postgres => 5432,
            Engine::Redis => 6379,
            Engine::S3 => 0,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Postgres => write!(f, "postgres"),
            Engine::Redis => write!(f, "redis"),
            Engine::S3 => write!(f, "s3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Dev,
    Prod,
    /// Public-read bucket for static assets
    Statics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbPreset {
    pub instance_type: &'static str,
    pub allocated_storage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePreset {
    pub instance_type: &'static str,
    pub number_of_nodes: u32,
}

impl Preset {
    pub fn database(&self) -> Option<DbPreset> {
        match self {
            Preset::Dev => Some(DbPreset {
                instance_type: "db.t2.micro",
                allocated_storage: 20,
            }),
            Preset::Prod => Some(DbPreset {
                instance_type: "db.t2.large",
                allocated_storage: 100,
            }),
            Preset::Statics => None,
        }
    }

    pub fn cache(&self) -> Option<CachePreset> {
        match self {
            Preset::Dev => Some(CachePreset {
                instance_type: "cache.t2.small",
                number_of_nodes: 1,
            }),
            Preset::Prod => Some(CachePreset {
                instance_type: "cache.m5.large",
                number_of_nodes: 2,
            }),
            Preset::Statics => None,
        }
    }

    pub fn fits(&self, kind: ResourceType) -> bool {
        match kind {
            ResourceType::Database => self.database().is_some(),
            ResourceType::Cache => self.cache().is_some(),
            ResourceType::Bucket => *self == Preset::Statics,
        }
    }
}

/// Caller input for a new resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub name: String,
    pub engine: Engine,
    pub preset: Preset,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    /// Master user; databases only
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub meta: EntityMeta,
    pub environment_id: Uuid,
    pub project_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub name: String,
    pub kind: ResourceType,
    pub engine: Engine,
    pub preset: Preset,
    /// Provider-side name, fixed at creation
    pub identifier: String,
    pub conf: SealedConf,
    pub status: StatusHistory,
}

impl Resource {
    pub fn new(environment_id: Uuid, env_name: &str, request: &ResourceRequest) -> Self {
        let meta = EntityMeta::new();
        let identifier = resource_identifier(env_name, &request.name, &meta.slug);
        Self {
            meta,
            environment_id,
            project_id: request.project_id,
            service_id: request.service_id,
            name: request.name.clone(),
            kind: request.engine.resource_type(),
            engine: request.engine,
            preset: request.preset,
            identifier,
            conf: SealedConf::default(),
            status: StatusHistory::default(),
        }
    }

    /// Same owner, name and type: a repeated create for this resource
    pub fn matches(&self, environment_id: Uuid, request: &ResourceRequest) -> bool {
        self.environment_id == environment_id
            && self.project_id == request.project_id
            && self.service_id == request.service_id
            && self.name == request.name
            && self.kind == request.engine.resource_type()
    }
}

/// `{env}-{name}-{slug8}`, lowercased, with anything but ASCII
/// alphanumerics mapped to `-`
pub fn resource_identifier(env_name: &str, name: &str, slug: &str) -> String {
    let short: String = slug.chars().take(8).collect();
    format!("{}-{}-{}", env_name, name, short)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Database and cache configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConf {
    pub instance_type: String,
    pub allocated_storage: u32,
    pub number_of_nodes: u32,
    pub username: String,
    pub password: String,
    pub address: String,
    pub port: u16,
    pub engine: String,
    pub engine_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConf {
    pub bucket: String,
    pub arn: String,
    pub bucket_domain_name: String,
    pub bucket_regional_domain_name: String,
    pub r53_zone_id: String,
    pub region: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ConfCipher;

    #[test]
    fn test_identifier_is_sanitized() {
        assert_eq!(
            resource_identifier("Prod", "main_db", "a1b2c3d4e5f6a7b8c9d0"),
            "prod-main-db-a1b2c3d4"
        );
        assert_eq!(resource_identifier("dev", "cache", "ab"), "dev-cache-ab");
    }

    #[test]
    fn test_presets() {
        assert_eq!(Preset::Dev.database().unwrap().instance_type, "db.t2.micro");
        assert_eq!(Preset::Prod.database().unwrap().allocated_storage, 100);
        assert_eq!(Preset::Prod.cache().unwrap().number_of_nodes, 2);
        assert!(Preset::Statics.fits(ResourceType::Bucket));
        assert!(!Preset::Statics.fits(ResourceType::Database));
        assert!(!Preset::Dev.fits(ResourceType::Bucket));
    }

    #[test]
    fn test_engine_defaults() {
        assert_eq!(Engine::Postgres.version(), "11.5");
        assert_eq!(Engine::Redis.port(), 6379);
        assert_eq!(Engine::S3.resource_type(), ResourceType::Bucket);
    }

    #[test]
    fn test_resource_conf_roundtrips_through_seal() {
        let cipher = ConfCipher::new([9u8; 32]);
        let conf = ResourceConf {
            instance_type: "db.t2.micro".into(),
            allocated_storage: 20,
            number_of_nodes: 0,
            username: "app".into(),
            password: "0f".repeat(20),
            address: "db-1.abc.us-east-1.rds.amazonaws.com".into(),
            port: 5432,
            engine: "postgres".into(),
            engine_version: "11.5".into(),
        };
        let sealed = SealedConf::seal(&conf, &cipher).unwrap();
        let opened: ResourceConf = sealed.open(&cipher).unwrap();
        assert_eq!(opened, conf);
    }

    #[test]
    fn test_identifier_fixed_at_creation() {
        let request = ResourceRequest {
            name: "main".into(),
            engine: Engine::Postgres,
            preset: Preset::Dev,
            project_id: None,
            service_id: None,
            username: "app".into(),
        };
        let env_id = Uuid::new_v4();
        let resource = Resource::new(env_id, "prod", &request);
        assert!(resource.identifier.starts_with("prod-main-"));
        assert!(resource.identifier.ends_with(&resource.meta.slug[..8]));
        assert!(resource.matches(env_id, &request));
        assert!(!resource.matches(Uuid::new_v4(), &request));
    }
}
