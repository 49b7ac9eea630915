//! Error types for the deploy module.

use std::path::PathBuf;

use hpck_config::{ConfigError, Errors};
use thiserror::Error;

/// Result type alias for deploy operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Hint attached to failures that `--force` bypasses.
pub const FORCE_HINT: &str =
    "Use `--force` to overwrite the deployment anyway. Proceed at your own risk.";

/// Errors that can occur while preparing a deployment directory.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("folder {0:?} already exists, and it is not a valid deployment folder")]
    NotADeployment(PathBuf),

    #[error("expanded blueprint file {0:?} is missing, this could be a result of changing hpck version between consecutive deployments")]
    MissingArtifact(PathBuf),

    #[error("previous expanded blueprint {path:?} could not be read: {error}")]
    UnreadableArtifact { path: PathBuf, error: ConfigError },

    #[error("toolkit_version has changed from {previous:?} to {current:?}, using different versions of hpck to update a live deployment is not officially supported")]
    VersionChanged { previous: String, current: String },

    #[error("deployment folder {0:?} already exists, use -w to overwrite")]
    AlreadyExists(PathBuf),

    #[error("you are attempting to remove a deployment group {0:?}, which is not supported")]
    RemovedGroup(String),

    #[error("{0}")]
    Blueprint(#[from] Errors),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// Suggested fix, when forcing the overwrite would get past the error.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NotADeployment(_)
            | Self::MissingArtifact(_)
            | Self::UnreadableArtifact { .. }
            | Self::VersionChanged { .. }
            | Self::RemovedGroup(_) => Some(FORCE_HINT),
            Self::AlreadyExists(_) | Self::Blueprint(_) | Self::Config(_) | Self::Io(_) => None,
        }
    }
}
