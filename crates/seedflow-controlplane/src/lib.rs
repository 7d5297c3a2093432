//! seedflow control plane
//!
//! Owns the domain state (tenants, environments, projects, services,
//! resources, build workers, deployments) and turns caller requests into
//! job workflows driving the provisioning engine.
//!
//! ```text
//! Commands::submit_*  ──validate──► entity (changes_pending)
//!        │                          ExecutionLog (pending)
//!        ▼
//! QueueDispatcher ──► Workflows ──► seedflow-infra executors
//!                         │
//!                         └──► entity ready | error, ExecutionLog true | false
//! ```
//!
//! Callers poll the execution log by slug for the outcome.

pub mod app;
pub mod commands;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod repository;
pub mod store;
pub mod validation;
pub mod workflows;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use app::ControlPlane;
pub use commands::{Commands, EnvironmentCredentials, Submission};
pub use crypto::ConfCipher;
pub use dispatch::{Job, JobDispatcher, JobHandler, QueueDispatcher, Workflow};
pub use error::{ControlPlaneError, Result};
pub use repository::Repository;
pub use store::{JsonFileStore, MemoryStore, Store, Table};
pub use workflows::{BuildWorkerDefaults, DeployOptions, Workflows};
