//! Deployment directory layout and the deployment metadata writer.
//!
//! ```text
//! <output_dir>/<deployment_name>/
//! └── .hpck/
//!     └── artifacts/
//!         └── expanded_blueprint.yaml
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use hpck_config::{Blueprint, BlueprintWriter};
use tracing::info;

use crate::error::DeployResult;

/// Hidden directory that marks a folder as an hpck deployment.
pub const HIDDEN_DIR: &str = ".hpck";
pub const ARTIFACTS_DIR: &str = "artifacts";
pub const EXPANDED_BLUEPRINT_NAME: &str = "expanded_blueprint.yaml";

pub fn hidden_dir(depl_dir: &Path) -> PathBuf {
    depl_dir.join(HIDDEN_DIR)
}

pub fn artifacts_dir(depl_dir: &Path) -> PathBuf {
    hidden_dir(depl_dir).join(ARTIFACTS_DIR)
}

pub fn expanded_blueprint_path(depl_dir: &Path) -> PathBuf {
    artifacts_dir(depl_dir).join(EXPANDED_BLUEPRINT_NAME)
}

/// The deployment directory for `bp` below `output_dir`, named after its
/// `deployment_name` variable.
pub fn deployment_dir(output_dir: &Path, bp: &Blueprint) -> DeployResult<PathBuf> {
    Ok(output_dir.join(bp.deployment_name()?))
}

/// Write the deployment metadata for an expanded blueprint.
///
/// Creates the hidden directory and stores the expanded blueprint as an
/// artifact. Returns the artifact path.
pub fn write_deployment_metadata(bp: &Blueprint, depl_dir: &Path) -> DeployResult<PathBuf> {
    info!("Writing deployment metadata to {:?}", depl_dir);

    fs::create_dir_all(artifacts_dir(depl_dir))?;
    let path = expanded_blueprint_path(depl_dir);
    BlueprintWriter::write_blueprint(bp, &path)?;

    info!("Expanded blueprint written to {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpck_config::{BlueprintReader, Value};
    use tempfile::tempdir;

    fn blueprint(name: &str) -> Blueprint {
        let mut bp = Blueprint::new("bp");
        bp.vars.insert("deployment_name".into(), Value::string(name));
        bp
    }

    #[test]
    fn test_layout_paths() {
        let dir = Path::new("out/golden");
        assert_eq!(hidden_dir(dir), Path::new("out/golden/.hpck"));
        assert_eq!(
            expanded_blueprint_path(dir),
            Path::new("out/golden/.hpck/artifacts/expanded_blueprint.yaml")
        );
    }

    #[test]
    fn test_deployment_dir_from_name() {
        let out = Path::new("out");
        assert_eq!(deployment_dir(out, &blueprint("golden")).unwrap(), out.join("golden"));
        assert!(deployment_dir(out, &blueprint("Not Valid")).is_err());
        assert!(deployment_dir(out, &Blueprint::new("bp")).is_err());
    }

    #[test]
    fn test_write_deployment_metadata() {
        let dir = tempdir().unwrap();
        let depl = dir.path().join("golden");
        let bp = blueprint("golden");

        let path = write_deployment_metadata(&bp, &depl).unwrap();
        assert!(hidden_dir(&depl).is_dir());
        assert_eq!(path, expanded_blueprint_path(&depl));
        assert_eq!(BlueprintReader::read_blueprint(&path).unwrap(), bp);
    }
}
