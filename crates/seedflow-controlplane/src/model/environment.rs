use super::common::EntityMeta;
use super::conf::SealedConf;
use super::status::StatusHistory;
use seedflow_infra::Credentials;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub meta: EntityMeta,
    pub tenant_id: Uuid,
    pub name: String,
    pub domain: String,
    pub region: String,
    pub conf: SealedConf,
    pub status: StatusHistory,
}

impl Environment {
    pub fn new(
        tenant_id: Uuid,
        name: impl Into<String>,
        domain: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            meta: EntityMeta::new(),
            tenant_id,
            name: name.into(),
            domain: domain.into(),
            region: region.into(),
            conf: SealedConf::default(),
            status: StatusHistory::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConf {
    pub vpc_id: String,
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
    pub zone_id: String,
}

impl EnvironmentConf {
    pub fn credentials(&self, region: &str) -> Credentials {
        Credentials {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            session_token: (!self.session_token.is_empty()).then(|| self.session_token.clone()),
            region: region.to_string(),
        }
    }
}
