//! Integration tests for validators run against expanded blueprints.

use hpck_config::{BlueprintReader, ModuleCatalog, ModuleInfo, ValidationLevel, VarInfo};
use hpck_policy::{
    apply_validation_level, GateOutcome, PolicyError, ValidationContext, ValidatorRunner,
    TEST_DEPLOYMENT_VARIABLE_NOT_USED, TEST_MODULE_NOT_USED,
};

const BLUEPRINT: &str = r#"
blueprint_name: hpc-cluster
validation_level: WARNING
vars:
  project_id: my-project
  deployment_name: golden
  region: us-central1
  unused_zone: us-central1-c
deployment_groups:
- group: primary
  modules:
  - id: network1
    source: modules/network/vpc
  - id: homefs
    source: modules/file-system/filestore
    use: [network1]
  - id: compute
    source: modules/compute/vm
    use: [network1, homefs]
    settings:
      network_name: default
"#;

fn catalog() -> ModuleCatalog {
    ModuleCatalog::new()
        .with_module(
            "modules/network/vpc",
            ModuleInfo::default()
                .with_input(VarInfo::new("project_id", "string").required())
                .with_input(VarInfo::new("region", "string"))
                .with_output("network_name"),
        )
        .with_module(
            "modules/file-system/filestore",
            ModuleInfo::default()
                .with_input(VarInfo::new("network_name", "string"))
                .with_output("network_storage"),
        )
        .with_module(
            "modules/compute/vm",
            ModuleInfo::default()
                .with_input(VarInfo::new("network_name", "string"))
                .with_input(VarInfo::new("network_storage", "list(object)")),
        )
}

#[test]
fn test_validators_after_expansion() {
    let source = BlueprintReader::parse_blueprint(BLUEPRINT).unwrap();
    let mut expanded = source.clone();
    expanded.expand(&catalog()).unwrap();

    let report = ValidatorRunner::default().execute(&ValidationContext::new(&source, &expanded));
    assert_eq!(report.results.len(), 2);

    let module_check = report
        .results
        .iter()
        .find(|r| r.validator == TEST_MODULE_NOT_USED)
        .unwrap();
    let unused: Vec<&str> = module_check.failures().map(|d| d.check.as_str()).collect();
    assert_eq!(unused, vec!["compute"]);
    assert_eq!(
        module_check.recommendations,
        vec!["remove \"network1\" from the use list of \"compute\"".to_string()]
    );

    // project_id and region are used through global defaulting
    let var_check = report
        .results
        .iter()
        .find(|r| r.validator == TEST_DEPLOYMENT_VARIABLE_NOT_USED)
        .unwrap();
    let unused: Vec<&str> = var_check.failures().map(|d| d.check.as_str()).collect();
    assert_eq!(unused, vec!["unused_zone"]);

    assert_eq!(
        apply_validation_level(expanded.validation_level, &report).unwrap(),
        GateOutcome::Warned
    );
}

#[test]
fn test_error_level_blocks_and_skip_clears() {
    let mut source = BlueprintReader::parse_blueprint(BLUEPRINT).unwrap();
    source.validation_level = ValidationLevel::Error;
    let mut expanded = source.clone();
    expanded.expand(&catalog()).unwrap();

    let report = ValidatorRunner::default().execute(&ValidationContext::new(&source, &expanded));
    let err = apply_validation_level(expanded.validation_level, &report).unwrap_err();
    assert!(matches!(err, PolicyError::ValidationFailed { ref failed } if failed.len() == 2));

    expanded.skip_validator(TEST_MODULE_NOT_USED);
    expanded.skip_validator(TEST_DEPLOYMENT_VARIABLE_NOT_USED);
    let report = ValidatorRunner::default().execute(&ValidationContext::new(&source, &expanded));
    assert!(report.results.is_empty());
    assert_eq!(
        apply_validation_level(expanded.validation_level, &report).unwrap(),
        GateOutcome::Passed
    );
}
