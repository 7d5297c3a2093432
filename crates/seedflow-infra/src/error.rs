//! Provisioning error types

use thiserror::Error;

/// Errors raised by the tool lifecycle, the resource executors and the
/// cloud API layer
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{component}: init failed with exit code {code}")]
    ToolInit { component: String, code: i32 },

    #[error("{component}: plan failed with exit code {code}")]
    Plan { component: String, code: i32 },

    #[error("{component}: apply failed with exit code {code}")]
    Apply { component: String, code: i32 },

    #[error("{component}: destroy failed with exit code {code}")]
    Destroy { component: String, code: i32 },

    #[error("{component}: could not read outputs: {reason}")]
    Outputs { component: String, reason: String },

    #[error("Output `{0}` is missing or has an unexpected shape")]
    MissingOutput(String),

    #[error("Cloud API error: {0}")]
    CloudApi(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InfraError {
    /// Whether re-running the same workflow may succeed.
    ///
    /// Tool and provider failures are often transient (throttling, eventual
    /// consistency) and state keys are deterministic, so a re-run picks up
    /// where the failed one stopped. Malformed configuration or outputs
    /// fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InfraError::ToolInit { .. }
                | InfraError::Plan { .. }
                | InfraError::Apply { .. }
                | InfraError::Destroy { .. }
                | InfraError::CloudApi(_)
                | InfraError::Timeout(_)
                | InfraError::CommandFailed(_)
                | InfraError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, InfraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(InfraError::Timeout("ecs".into()).is_retryable());
        assert!(
            InfraError::Plan {
                component: "alb".into(),
                code: 1
            }
            .is_retryable()
        );
        assert!(!InfraError::InvalidConfig("bad".into()).is_retryable());
        assert!(!InfraError::MissingOutput("vpc_id".into()).is_retryable());
    }
}
