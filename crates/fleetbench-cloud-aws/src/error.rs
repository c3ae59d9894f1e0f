//! AWS binding error types

use aws_sdk_cloudformation::error::DisplayErrorContext;
use fleetbench_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("AWS {operation} failed: {message}")]
    Sdk {
        operation: &'static str,
        message: String,
    },

    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Auto Scaling group not found: {0}")]
    GroupNotFound(String),

    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("Missing field in AWS response: {0}")]
    MissingField(&'static str),
}

impl AwsError {
    /// Wrap an SDK error, keeping its full source chain in the message
    pub fn sdk<E>(operation: &'static str, err: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        AwsError::Sdk {
            operation,
            message: DisplayErrorContext(err).to_string(),
        }
    }
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::StackNotFound(_)
            | AwsError::GroupNotFound(_)
            | AwsError::ParameterNotFound(_) => CloudError::NotFound(err.to_string()),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_resources_map_to_not_found() {
        for err in [
            AwsError::StackNotFound("Run-1".into()),
            AwsError::GroupNotFound("asg-1".into()),
            AwsError::ParameterNotFound("i-1".into()),
        ] {
            assert!(CloudError::from(err).is_not_found());
        }
    }

    #[test]
    fn test_other_errors_map_to_api_error() {
        let err = CloudError::from(AwsError::Sdk {
            operation: "DeleteStack",
            message: "Throttling: Rate exceeded".into(),
        });
        match err {
            CloudError::ApiError(message) => {
                assert_eq!(message, "AWS DeleteStack failed: Throttling: Rate exceeded")
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }
}
