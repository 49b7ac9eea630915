//! Blueprint writing.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::blueprint::Blueprint;
use crate::error::ConfigResult;

/// Writer for blueprint documents.
pub struct BlueprintWriter;

impl BlueprintWriter {
    /// Render a blueprint as YAML. Provenance marks are not written.
    pub fn to_yaml(bp: &Blueprint) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(bp)?)
    }

    /// Write a blueprint to a YAML file, creating parent directories.
    pub fn write_blueprint(bp: &Blueprint, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        debug!("Writing blueprint to {:?}", path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, Self::to_yaml(bp)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{DeploymentGroup, Module};
    use crate::reader::BlueprintReader;
    use crate::usemark::mark;
    use crate::value::Value;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let mut bp = Blueprint::new("hpc");
        bp.vars.insert("deployment_name".into(), Value::string("golden"));
        let mut g = DeploymentGroup::new("primary");
        let mut m = Module::new("vm", "modules/compute/vm");
        m.settings.insert(
            "network".into(),
            mark(Value::string("$(net.network_name)"), ["net".into()]),
        );
        g.modules.push(m);
        bp.deployment_groups.push(g);

        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("expanded.yaml");
        BlueprintWriter::write_blueprint(&bp, &path).unwrap();
        let back = BlueprintReader::read_blueprint(&path).unwrap();

        let mut unmarked = bp.clone();
        let setting = unmarked.deployment_groups[0].modules[0].settings.get_mut("network").unwrap();
        *setting = setting.strip_marks();
        assert_eq!(back, unmarked);
    }

    #[test]
    fn test_defaults_are_omitted() {
        let yaml = BlueprintWriter::to_yaml(&Blueprint::new("hpc")).unwrap();
        assert!(!yaml.contains("validation_level"));
        assert!(!yaml.contains("terraform_backend_defaults"));
        assert!(!yaml.contains("validators"));
    }
}
