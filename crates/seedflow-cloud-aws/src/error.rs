//! AWS provider error types

use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use seedflow_infra::InfraError;
use thiserror::Error;

/// Error codes meaning "the thing you are creating is already there"
const DUPLICATE_CODES: [&str; 2] = ["InvalidKeyPair.Duplicate", "ParameterAlreadyExists"];

/// Error codes meaning "the thing you are addressing is gone"
const NOT_FOUND_CODES: [&str; 4] = [
    "ParameterNotFound",
    "ServiceNotFoundException",
    "ClusterNotFoundException",
    "InvalidInstanceID.NotFound",
];

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("{operation} failed ({code}): {message}")]
    Sdk {
        operation: &'static str,
        code: String,
        message: String,
    },

    #[error("{operation}: response is missing `{field}`")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[error("invalid request for {operation}: {message}")]
    Build {
        operation: &'static str,
        message: String,
    },

    #[error("instance {instance_id} did not pass status checks after {attempts} attempts")]
    InstanceNotReady { instance_id: String, attempts: u32 },
}

impl AwsError {
    pub fn sdk<E, R>(operation: &'static str, err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        let code = err.code().unwrap_or("Unknown").to_string();
        Self::Sdk {
            operation,
            code,
            message: DisplayErrorContext(&err).to_string(),
        }
    }

    pub fn build(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Build {
            operation,
            message: err.to_string(),
        }
    }
}

impl From<AwsError> for InfraError {
    fn from(err: AwsError) -> Self {
        match &err {
            AwsError::Sdk { code, message, .. } => {
                if DUPLICATE_CODES.contains(&code.as_str())
                    || message.contains("not idempotent")
                {
                    InfraError::AlreadyExists(err.to_string())
                } else if NOT_FOUND_CODES.contains(&code.as_str()) {
                    InfraError::NotFound(err.to_string())
                } else {
                    InfraError::CloudApi(err.to_string())
                }
            }
            AwsError::InstanceNotReady { .. } => InfraError::Timeout(err.to_string()),
            AwsError::MissingField { .. } | AwsError::Build { .. } => {
                InfraError::CloudApi(err.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sdk(code: &str, message: &str) -> AwsError {
        AwsError::Sdk {
            operation: "test",
            code: code.into(),
            message: message.into(),
        }
    }

    #[test]
    fn test_maps_duplicates_to_already_exists() {
        let err: InfraError = sdk("InvalidKeyPair.Duplicate", "exists").into();
        assert!(matches!(err, InfraError::AlreadyExists(_)));

        let err: InfraError = sdk(
            "InvalidParameterException",
            "Creation of service was not idempotent.",
        )
        .into();
        assert!(matches!(err, InfraError::AlreadyExists(_)));
    }

    #[test]
    fn test_maps_missing_to_not_found() {
        let err: InfraError = sdk("ParameterNotFound", "gone").into();
        assert!(matches!(err, InfraError::NotFound(_)));
    }

    #[test]
    fn test_other_codes_are_api_errors() {
        let err: InfraError = sdk("ThrottlingException", "slow down").into();
        assert!(matches!(err, InfraError::CloudApi(_)));
        assert!(err.is_retryable());

        let err: InfraError = AwsError::InstanceNotReady {
            instance_id: "i-1".into(),
            attempts: 20,
        }
        .into();
        assert!(matches!(err, InfraError::Timeout(_)));
    }
}
