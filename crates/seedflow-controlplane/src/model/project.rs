use super::common::EntityMeta;
use super::conf::SealedConf;
use super::status::StatusHistory;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub meta: EntityMeta,
    pub environment_id: Uuid,
    pub name: String,
    pub conf: SealedConf,
    pub status: StatusHistory,
}

impl Project {
    pub fn new(environment_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::new(),
            environment_id,
            name: name.into(),
            conf: SealedConf::default(),
            status: StatusHistory::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConf {
    pub alb_name: String,
    pub alb_public_dns: String,
    pub ecs_cluster: String,
    pub ecs_executor_role_arn: String,
}
