//! Blueprint and deployment settings reading.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::blueprint::Blueprint;
use crate::error::ConfigResult;
use crate::settings::DeploymentSettings;

/// Reader for blueprint documents.
pub struct BlueprintReader;

impl BlueprintReader {
    /// Read a blueprint from a YAML file.
    pub fn read_blueprint(path: impl AsRef<Path>) -> ConfigResult<Blueprint> {
        let path = path.as_ref();
        debug!("Reading blueprint from {:?}", path);

        let content = fs::read_to_string(path)?;
        Self::parse_blueprint(&content)
    }

    /// Parse a blueprint from YAML text.
    pub fn parse_blueprint(content: &str) -> ConfigResult<Blueprint> {
        let bp: Blueprint = serde_yaml::from_str(content)?;
        Ok(bp)
    }

    /// Read a deployment settings file.
    pub fn read_deployment_settings(path: impl AsRef<Path>) -> ConfigResult<DeploymentSettings> {
        let path = path.as_ref();
        debug!("Reading deployment settings from {:?}", path);

        let content = fs::read_to_string(path)?;
        let settings: DeploymentSettings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{ModuleKind, ValidationLevel};
    use crate::error::ConfigError;
    use crate::value::Value;
    use tempfile::tempdir;

    const BLUEPRINT: &str = r#"
blueprint_name: hpc-slurm
validation_level: WARNING
vars:
  project_id: my-project
  deployment_name: golden
  region: us-central1
deployment_groups:
- group: primary
  modules:
  - id: network1
    source: modules/network/vpc
  - id: compute
    source: modules/compute/vm
    kind: terraform
    use: [network1]
    settings:
      machine_type: c2-standard-60
      instance_count: 4
"#;

    #[test]
    fn test_parse_blueprint() {
        let bp = BlueprintReader::parse_blueprint(BLUEPRINT).unwrap();
        assert_eq!(bp.blueprint_name, "hpc-slurm");
        assert_eq!(bp.validation_level, ValidationLevel::Warning);
        assert_eq!(bp.vars.keys().collect::<Vec<_>>(), vec!["project_id", "deployment_name", "region"]);

        let group = &bp.deployment_groups[0];
        assert_eq!(group.modules.len(), 2);
        assert_eq!(group.modules[0].kind, ModuleKind::Unset);
        assert_eq!(group.modules[1].uses[0].as_str(), "network1");
        assert_eq!(group.modules[1].settings["instance_count"], Value::int(4));
    }

    #[test]
    fn test_read_files() {
        let dir = tempdir().unwrap();
        let bp_path = dir.path().join("bp.yaml");
        fs::write(&bp_path, BLUEPRINT).unwrap();
        let ds_path = dir.path().join("ds.yaml");
        fs::write(&ds_path, "vars:\n  region: europe-west4\nterraform_backend_defaults:\n  type: gcs\n  configuration:\n    bucket: state\n").unwrap();

        let bp = BlueprintReader::read_blueprint(&bp_path).unwrap();
        assert_eq!(bp.deployment_groups.len(), 1);

        let ds = BlueprintReader::read_deployment_settings(&ds_path).unwrap();
        assert_eq!(ds.terraform_backend_defaults.backend_type, "gcs");
        assert_eq!(ds.vars["region"], Value::string("europe-west4"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = BlueprintReader::read_blueprint(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = BlueprintReader::parse_blueprint("blueprint_name: [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
