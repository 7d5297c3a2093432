//! Control plane error types

use seedflow_infra::InfraError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{what} is not ready")]
    NotReady { what: &'static str },

    /// Message is shown to callers verbatim
    #[error("{0}")]
    Collision(String),

    #[error("{what} {slug} already has a pending {action} run")]
    Busy {
        what: &'static str,
        slug: String,
        action: String,
    },

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("configuration blob error: {0}")]
    Conf(String),

    #[error("dispatcher is shut down")]
    DispatcherClosed,

    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlPlaneError {
    pub fn not_found(what: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            what,
            key: key.to_string(),
        }
    }

    /// Whether re-running the same workflow may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ControlPlaneError::Infra(e) => e.is_retryable(),
            ControlPlaneError::Busy { .. }
            | ControlPlaneError::Store(_)
            | ControlPlaneError::Io(_) => true,
            _ => false,
        }
    }

    /// Caller-facing rendering; internal details stay in the logs
    pub fn user_message(&self) -> String {
        match self {
            ControlPlaneError::Validation(msg) | ControlPlaneError::Collision(msg) => msg.clone(),
            ControlPlaneError::NotReady { what } => format!("{} is not in ready state", capitalize(what)),
            ControlPlaneError::Busy { what, .. } => {
                format!("{} has an operation in progress", capitalize(what))
            }
            ControlPlaneError::NotFound { what, .. } => format!("{} not found", capitalize(what)),
            ControlPlaneError::Infra(_) => "Infrastructure operation failed".to_string(),
            _ => "Internal error".to_string(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, ControlPlaneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ControlPlaneError::NotReady { what: "project" }.user_message(),
            "Project is not in ready state"
        );
        assert_eq!(
            ControlPlaneError::Collision("Service with this name/subdomain already exists.".into())
                .user_message(),
            "Service with this name/subdomain already exists."
        );
        assert_eq!(
            ControlPlaneError::Store("disk full".into()).user_message(),
            "Internal error"
        );
    }

    #[test]
    fn test_retryable_follows_infra_classification() {
        let timeout = ControlPlaneError::Infra(InfraError::Timeout("scale".into()));
        assert!(timeout.is_retryable());

        let config = ControlPlaneError::Infra(InfraError::InvalidConfig("bad".into()));
        assert!(!config.is_retryable());
        assert!(!ControlPlaneError::Validation("x".into()).is_retryable());
    }
}
