//! Checks before writing into an existing deployment directory.

use std::collections::HashSet;
use std::path::Path;

use hpck_config::{Blueprint, BlueprintReader};
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};
use crate::layout::{expanded_blueprint_path, hidden_dir};

/// Decide whether `bp` may be written to `depl_dir`.
///
/// A missing directory or `force` always allows the write. Otherwise the
/// directory must be a previous deployment of the same hpck version, the
/// caller must ask to overwrite, and no previously deployed group may
/// disappear.
pub fn check_overwrite_allowed(
    depl_dir: &Path,
    bp: &Blueprint,
    overwrite: bool,
    force: bool,
) -> DeployResult<()> {
    if !depl_dir.exists() {
        debug!("No previous deployment at {:?}", depl_dir);
        return Ok(());
    }
    if force {
        info!("Forcing overwrite of {:?}", depl_dir);
        return Ok(());
    }

    if !hidden_dir(depl_dir).exists() {
        return Err(DeployError::NotADeployment(depl_dir.to_path_buf()));
    }

    let exp_path = expanded_blueprint_path(depl_dir);
    if !exp_path.exists() {
        return Err(DeployError::MissingArtifact(exp_path));
    }
    let prev = BlueprintReader::read_blueprint(&exp_path).map_err(|error| {
        DeployError::UnreadableArtifact {
            path: exp_path.clone(),
            error,
        }
    })?;

    if prev.toolkit_version != bp.toolkit_version {
        return Err(DeployError::VersionChanged {
            previous: prev.toolkit_version,
            current: bp.toolkit_version.clone(),
        });
    }

    if !overwrite {
        return Err(DeployError::AlreadyExists(depl_dir.to_path_buf()));
    }

    let new_groups: HashSet<&str> = bp
        .deployment_groups
        .iter()
        .map(|g| g.group.as_str())
        .collect();
    if let Some(removed) = prev
        .deployment_groups
        .iter()
        .find(|g| !new_groups.contains(g.group.as_str()))
    {
        return Err(DeployError::RemovedGroup(removed.group.to_string()));
    }

    info!("Overwriting deployment at {:?}", depl_dir);
    Ok(())
}
