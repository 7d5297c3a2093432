//! Lifecycle actions, plan outcomes and resource kinds

use serde::{Deserialize, Serialize};

/// Action performed against one resource's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create or converge a resource
    Create,
    /// Tear a resource down
    Destroy,
    /// Re-apply with changed inputs
    Update,
    /// Read outputs only
    Outputs,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Destroy => write!(f, "destroy"),
            Action::Update => write!(f, "update"),
            Action::Outputs => write!(f, "outputs"),
        }
    }
}

/// Result of a successful plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Real infrastructure already matches the configuration
    NoChanges,
    /// The saved plan file holds changes to apply
    ChangesPending,
}

impl PlanOutcome {
    /// Interprets a `plan -detailed-exitcode` exit status.
    ///
    /// Returns `None` for 1 (error) and for negative codes (killed by signal).
    pub fn from_exit_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(PlanOutcome::NoChanges),
            2 => Some(PlanOutcome::ChangesPending),
            _ => None,
        }
    }

    pub fn has_changes(&self) -> bool {
        matches!(self, PlanOutcome::ChangesPending)
    }
}

/// Infrastructure module kinds known to the engine.
///
/// The component name doubles as the module directory under the modules
/// root and as the last segment of the state key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Route53,
    Alb,
    Ecs,
    Ecr,
    Acm,
    Postgres,
    ElastiCache,
    S3Bucket,
    BuildWorker,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::Network,
        ResourceKind::Route53,
        ResourceKind::Alb,
        ResourceKind::Ecs,
        ResourceKind::Ecr,
        ResourceKind::Acm,
        ResourceKind::Postgres,
        ResourceKind::ElastiCache,
        ResourceKind::S3Bucket,
        ResourceKind::BuildWorker,
    ];

    pub fn component(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::Route53 => "route53",
            ResourceKind::Alb => "alb",
            ResourceKind::Ecs => "ecs",
            ResourceKind::Ecr => "ecr",
            ResourceKind::Acm => "acm",
            ResourceKind::Postgres => "postgres",
            ResourceKind::ElastiCache => "elasticache",
            ResourceKind::S3Bucket => "s3_bucket",
            ResourceKind::BuildWorker => "build_worker",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.component())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_exit_codes() {
        assert_eq!(PlanOutcome::from_exit_code(0), Some(PlanOutcome::NoChanges));
        assert_eq!(
            PlanOutcome::from_exit_code(2),
            Some(PlanOutcome::ChangesPending)
        );
        assert_eq!(PlanOutcome::from_exit_code(1), None);
        assert_eq!(PlanOutcome::from_exit_code(-9), None);
    }

    #[test]
    fn test_component_names_are_distinct() {
        let mut names: Vec<_> = ResourceKind::ALL.iter().map(|k| k.component()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ResourceKind::ALL.len());
    }
}
