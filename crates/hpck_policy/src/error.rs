//! Error types for the policy module.

use hpck_config::ConfigError;
use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur while validating a blueprint.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("validation failed due to the issues listed above: {}", .failed.join(", "))]
    ValidationFailed { failed: Vec<String> },

    #[error("Invalid validation level: {0}")]
    InvalidValidationLevel(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
