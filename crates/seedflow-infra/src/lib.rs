//! seedflow provisioning engine
//!
//! Drives an external declarative infrastructure tool (init/plan/apply/
//! destroy/output) against isolated per-resource state, and talks to the
//! cloud provider API directly where the tool is not a good fit
//! (AMI lookup, key pairs, container service rollouts).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │             seedflow-controlplane               │
//! │               (job workflows)                   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                seedflow-infra                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  executors::{network, alb, ecs, ...}     │   │
//! │  └──────────────────┬───────────────────────┘   │
//! │  ┌──────────────────▼───────────────────────┐   │
//! │  │  LifecycleExecutor                       │   │
//! │  │  (compose + state_key + runner)          │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌─────────────────────────┐  │
//! │  │ trait        │  │ DeploymentOrchestrator  │  │
//! │  │ CloudApi     │◄─┤ (register/launch/wait)  │  │
//! │  └──────┬───────┘  └─────────────────────────┘  │
//! └─────────┼───────────────────────────────────────┘
//!           │
//! ┌─────────▼───────┐
//! │ seedflow-cloud- │
//! │ aws (SDK impl)  │
//! └─────────────────┘
//! ```

pub mod action;
pub mod cloud;
pub mod compose;
pub mod deploy;
pub mod error;
pub mod executors;
pub mod lifecycle;
pub mod outputs;
pub mod runner;
pub mod state_key;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use action::{Action, PlanOutcome, ResourceKind};
pub use cloud::{
    CloudApi, CloudApiFactory, KeyPair, Parameter, Rollout, SecretRef, ServiceDescription,
    ServiceSpec, ServiceUpdate, TaskDefinitionSpec,
};
pub use compose::{CommonContext, Credentials};
pub use deploy::{DeploymentConf, DeploymentOrchestrator};
pub use error::{InfraError, Result};
pub use lifecycle::{ExecutorConfig, ExecutorSettings, LifecycleExecutor, NO_PARAMS, Provisioner};
pub use outputs::{OutputValue, Outputs};
pub use runner::{CommandOutput, CommandRunner, ShellCommand, ShellRunner};
pub use state_key::{StateKeyBuilder, StateScope};
