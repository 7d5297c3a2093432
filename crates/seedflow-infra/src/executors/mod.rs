//! Resource executors
//!
//! One module per infrastructure kind. Each exposes `create_*`,
//! `destroy_*` and, where later workflows need prior outputs, `*_details`,
//! built on [`Provisioner`](crate::lifecycle::Provisioner) with a typed
//! configuration. Executors never retry and never swallow errors.

pub mod acm;
pub mod alb;
pub mod build_worker;
pub mod bucket;
pub mod cache;
pub mod database;
pub mod ecr;
pub mod ecs;
pub mod network;
pub mod route53;

pub use acm::AcmConfigs;
pub use alb::{AlbConfigs, AlbPort};
pub use build_worker::BuildWorkerConfigs;
pub use bucket::BucketConfigs;
pub use cache::CacheConfigs;
pub use database::DbConfigs;
pub use ecr::EcrConfigs;
pub use ecs::EcsConfigs;
pub use route53::{CnameRecord, Route53Configs};
