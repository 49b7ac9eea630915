//! # hpck_deploy
//!
//! Deployment directory layout and overwrite safety checks for hpck.
//!
//! A deployment directory is named after the blueprint's `deployment_name`
//! and holds a hidden `.hpck` directory with the expanded blueprint of the
//! last successful `create`. Before a new blueprint is written into an
//! existing directory, [`check_overwrite_allowed`] compares it with that
//! artifact.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hpck_deploy::{check_overwrite_allowed, deployment_dir, write_deployment_metadata};
//!
//! let depl_dir = deployment_dir(Path::new("."), &bp)?;
//! check_overwrite_allowed(&depl_dir, &bp, overwrite, force)?;
//! write_deployment_metadata(&bp, &depl_dir)?;
//! ```

pub mod error;
pub mod layout;
pub mod safety;

pub use error::{DeployError, DeployResult, FORCE_HINT};
pub use layout::{
    artifacts_dir, deployment_dir, expanded_blueprint_path, hidden_dir,
    write_deployment_metadata, ARTIFACTS_DIR, EXPANDED_BLUEPRINT_NAME, HIDDEN_DIR,
};
pub use safety::check_overwrite_allowed;
