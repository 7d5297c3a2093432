//! Audit trail of workflow runs
//!
//! A log row is written before dispatch and finalized by the workflow. Its
//! `is_success` flag is the only "still running" signal callers see.

use super::common::EntityMeta;
use super::conf::SealedConf;
use chrono::{DateTime, Utc};
use seedflow_infra::Action;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Entity a run targets, resolved once when the log is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ComponentRef {
    Environment(Uuid),
    Project(Uuid),
    Service(Uuid),
    Resource(Uuid),
    BuildWorker(Uuid),
    ServiceDeployment(Uuid),
}

impl ComponentRef {
    pub fn id(&self) -> Uuid {
        match *self {
            ComponentRef::Environment(id)
            | ComponentRef::Project(id)
            | ComponentRef::Service(id)
            | ComponentRef::Resource(id)
            | ComponentRef::BuildWorker(id)
            | ComponentRef::ServiceDeployment(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ComponentRef::Environment(_) => "environment",
            ComponentRef::Project(_) => "project",
            ComponentRef::Service(_) => "service",
            ComponentRef::Resource(_) => "resource",
            ComponentRef::BuildWorker(_) => "build_worker",
            ComponentRef::ServiceDeployment(_) => "service_deployment",
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Terminal or running state of one log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::Pending => write!(f, "pending"),
            ExecutionState::Succeeded => write!(f, "succeeded"),
            ExecutionState::Failed => write!(f, "failed"),
        }
    }
}

/// Inputs a run needs beyond its target entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogParams {
    /// Image tag to build or deploy
    pub version: String,
    /// Service replaced by an update run
    pub previous_service_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub meta: EntityMeta,
    pub action: Action,
    pub component: ComponentRef,
    /// Sealed [`LogParams`]
    pub params: SealedConf,
    pub is_success: Option<bool>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ExecutionLog {
    pub fn new(action: Action, component: ComponentRef, params: SealedConf) -> Self {
        Self {
            meta: EntityMeta::new(),
            action,
            component,
            params,
            is_success: None,
            ended_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.is_success.is_none()
    }

    pub fn state(&self) -> ExecutionState {
        match self.is_success {
            None => ExecutionState::Pending,
            Some(true) => ExecutionState::Succeeded,
            Some(false) => ExecutionState::Failed,
        }
    }

    pub fn finish(&mut self, success: bool) {
        self.is_success = Some(success);
        self.ended_at = Some(Utc::now());
        self.meta.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_ref_is_tagged() {
        let id = Uuid::new_v4();
        let value = serde_json::to_value(ComponentRef::Service(id)).unwrap();
        assert_eq!(value["kind"], "service");
        assert_eq!(value["id"], id.to_string());

        let back: ComponentRef = serde_json::from_value(value).unwrap();
        assert_eq!(back, ComponentRef::Service(id));
        assert_eq!(back.id(), id);
    }

    #[test]
    fn test_log_state_transitions() {
        let mut log = ExecutionLog::new(
            Action::Create,
            ComponentRef::Environment(Uuid::new_v4()),
            SealedConf::default(),
        );
        assert!(log.is_pending());
        assert_eq!(log.state(), ExecutionState::Pending);

        log.finish(false);
        assert_eq!(log.state(), ExecutionState::Failed);
        assert!(log.ended_at.is_some());
    }
}
