//! Domain entities
//!
//! Tenant → Environment → Project → Service, with Resources hanging off an
//! environment and BuildWorkers and ServiceDeployments off a service. Every
//! infrastructure change is recorded as an [`ExecutionLog`].

pub mod common;
pub mod conf;
pub mod environment;
pub mod execution_log;
pub mod project;
pub mod resource;
pub mod service;
pub mod status;
pub mod tenant;

pub use common::EntityMeta;
pub use conf::{CONF_VERSION, SealedConf};
pub use environment::{Environment, EnvironmentConf};
pub use execution_log::{ComponentRef, ExecutionLog, ExecutionState, LogParams};
pub use project::{Project, ProjectConf};
pub use resource::{
    BucketConf, Engine, Preset, Resource, ResourceConf, ResourceRequest, ResourceType,
    resource_identifier,
};
pub use service::{
    BuildWorker, HEALTH_CHECK_PROTOCOL, Service, ServiceConf, ServiceDeployment, ServiceRequest,
};
pub use status::{InfraStatus, StatusEntry, StatusHistory};
pub use tenant::Tenant;

use crate::store::Table;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A record persisted in its own table
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;

    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;
}

macro_rules! entity {
    ($ty:ty, $table:expr) => {
        impl Entity for $ty {
            const TABLE: Table = $table;

            fn meta(&self) -> &EntityMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut EntityMeta {
                &mut self.meta
            }
        }
    };
}

entity!(Tenant, Table::Tenants);
entity!(Environment, Table::Environments);
entity!(Project, Table::Projects);
entity!(Service, Table::Services);
entity!(Resource, Table::Resources);
entity!(BuildWorker, Table::BuildWorkers);
entity!(ServiceDeployment, Table::ServiceDeployments);
entity!(ExecutionLog, Table::ExecutionLogs);

/// Entities that carry an infrastructure status history
pub trait Provisioned: Entity {
    fn status(&self) -> &StatusHistory;
    fn status_mut(&mut self) -> &mut StatusHistory;
}

macro_rules! provisioned {
    ($ty:ty) => {
        impl Provisioned for $ty {
            fn status(&self) -> &StatusHistory {
                &self.status
            }

            fn status_mut(&mut self) -> &mut StatusHistory {
                &mut self.status
            }
        }
    };
}

provisioned!(Environment);
provisioned!(Project);
provisioned!(Service);
provisioned!(Resource);
