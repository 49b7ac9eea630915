//! Blueprint loading shared by `expand` and `create`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use hpck_config::{
    merge_deployment_settings, set_backend_config, set_cli_variables, Blueprint,
    BlueprintReader, ModuleCatalog,
};
use hpck_policy::{apply_validation_level, parse_validation_level, ValidationContext, ValidatorRunner};

#[derive(Args)]
pub struct BlueprintArgs {
    /// Blueprint file to expand
    pub blueprint: PathBuf,

    /// Deployment settings file overriding vars and the default backend
    #[arg(short = 'd', long = "deployment-file")]
    pub deployment_file: Option<PathBuf>,

    /// Variables to set, as name=value (comma separated, repeatable)
    #[arg(long, value_delimiter = ',')]
    pub vars: Vec<String>,

    /// Default backend configuration, as key=value (comma separated, repeatable)
    #[arg(long = "backend-config", value_delimiter = ',')]
    pub backend_config: Vec<String>,

    /// Validation level: ERROR, WARNING or IGNORE
    #[arg(short = 'l', long = "validation-level", default_value = "WARNING")]
    pub validation_level: String,

    /// Validators to skip
    #[arg(long = "skip-validators", value_delimiter = ',')]
    pub skip_validators: Vec<String>,

    /// Directory holding module metadata (module.yaml files)
    #[arg(long = "modules-dir", default_value = ".")]
    pub modules_dir: PathBuf,
}

/// Read, configure, expand and validate a blueprint.
pub fn load_and_expand(args: &BlueprintArgs) -> Result<Blueprint> {
    let mut bp = BlueprintReader::read_blueprint(&args.blueprint)
        .with_context(|| format!("Failed to read blueprint {:?}", args.blueprint))?;

    if let Some(path) = &args.deployment_file {
        let ds = BlueprintReader::read_deployment_settings(path)
            .with_context(|| format!("Failed to read deployment settings {:?}", path))?;
        merge_deployment_settings(&mut bp, ds);
    }
    set_cli_variables(&mut bp, &args.vars).context("Failed to set the variables at CLI")?;
    set_backend_config(&mut bp, &args.backend_config)
        .context("Failed to set the backend config at CLI")?;

    bp.validation_level = parse_validation_level(&args.validation_level)?;
    for name in &args.skip_validators {
        bp.skip_validator(name);
    }

    if !bp.toolkit_version.is_empty() {
        info!("toolkit_version setting is ignored.");
    }
    bp.toolkit_version = env!("CARGO_PKG_VERSION").to_string();

    let catalog = ModuleCatalog::load_dir(&args.modules_dir)
        .with_context(|| format!("Failed to load modules from {:?}", args.modules_dir))?;

    let source = bp.clone();
    bp.expand(&catalog).context("Blueprint expansion failed")?;

    let report = ValidatorRunner::default().execute(&ValidationContext::new(&source, &bp));
    apply_validation_level(bp.validation_level, &report)?;

    Ok(bp)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    pub(crate) const BLUEPRINT: &str = r#"
blueprint_name: hpc-cluster
vars:
  project_id: my-project
  deployment_name: golden
  region: us-central1
deployment_groups:
- group: primary
  modules:
  - id: network1
    source: modules/network/vpc
"#;

    /// Write a blueprint and its module metadata below `dir`.
    pub(crate) fn fixture(dir: &Path) -> BlueprintArgs {
        let vpc = dir.join("modules").join("network").join("vpc");
        fs::create_dir_all(&vpc).unwrap();
        fs::write(
            vpc.join("module.yaml"),
            "inputs:\n  - name: project_id\n    type: string\n    required: true\n  - name: region\n    type: string\noutputs:\n  - network_name\n",
        )
        .unwrap();
        let blueprint = dir.join("hpc-cluster.yaml");
        fs::write(&blueprint, BLUEPRINT).unwrap();

        BlueprintArgs {
            blueprint,
            deployment_file: None,
            vars: Vec::new(),
            backend_config: Vec::new(),
            validation_level: "ERROR".to_string(),
            skip_validators: Vec::new(),
            modules_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_load_and_expand() {
        let dir = tempfile::tempdir().unwrap();
        let args = fixture(dir.path());
        let bp = load_and_expand(&args).unwrap();
        assert_eq!(bp.toolkit_version, env!("CARGO_PKG_VERSION"));
        let net = &bp.deployment_groups[0].modules[0];
        assert_eq!(net.settings["project_id"].as_str(), Some("my-project"));
    }

    #[test]
    fn test_overrides_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = fixture(dir.path());
        let settings = dir.path().join("settings.yaml");
        fs::write(&settings, "vars:\n  region: europe-west4\n  project_id: other\n").unwrap();
        args.deployment_file = Some(settings);
        args.vars = vec!["project_id=cli-project".to_string()];
        args.backend_config = vec!["bucket=tf-state".to_string()];

        let bp = load_and_expand(&args).unwrap();
        let net = &bp.deployment_groups[0].modules[0];
        assert_eq!(net.settings["project_id"].as_str(), Some("cli-project"));
        assert_eq!(net.settings["region"].as_str(), Some("europe-west4"));
        assert_eq!(bp.deployment_groups[0].terraform_backend.backend_type, "gcs");
    }

    #[test]
    fn test_validation_failure_at_error_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = fixture(dir.path());
        args.vars = vec!["unused=1".to_string()];
        assert!(load_and_expand(&args).is_err());

        args.skip_validators = vec!["test_deployment_variable_not_used".to_string()];
        assert!(load_and_expand(&args).is_ok());
    }

    #[test]
    fn test_invalid_validation_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = fixture(dir.path());
        args.validation_level = "LOUD".to_string();
        let err = load_and_expand(&args).unwrap_err();
        assert!(err.to_string().contains("Invalid validation level"));
    }
}
