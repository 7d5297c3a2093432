//! AWS cloud API for seedflow
//!
//! Implements [`seedflow_infra::CloudApi`] on top of the official SDK:
//!
//! - **ECS**: task definitions and container services
//! - **EC2**: key pairs and instance status checks
//! - **SSM**: recommended AMI lookup and per-service secret parameters

pub mod client;
pub mod error;

mod ec2;
mod ecs;
mod ssm;

pub use client::{AwsCloud, AwsCloudFactory};
pub use error::{AwsError, Result};
