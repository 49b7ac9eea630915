//! Integration tests for blueprint expansion.

use std::fs;

use hpck_config::{
    is_valid_label_value, unmark, vars_topological_order, BlueprintReader, BlueprintWriter,
    ConfigError, Dict, ErrorKind, ModuleCatalog, ModuleId, ModuleInfo, ReferenceKind, Value,
    VarInfo,
};
use proptest::prelude::*;
use tempfile::tempdir;

const BLUEPRINT: &str = r#"
blueprint_name: hpc-cluster
vars:
  project_id: my-project
  deployment_name: golden
  region: us-central1
  zone: $(vars.region)-a
terraform_backend_defaults:
  type: gcs
  configuration:
    bucket: tf-state
deployment_groups:
- group: primary
  modules:
  - id: network1
    source: modules/network/vpc
  - id: homefs
    source: modules/file-system/filestore
    use: [network1]
    settings:
      local_mount: /home
- group: cluster
  modules:
  - id: compute
    source: modules/compute/vm
    use: [network1, homefs]
    settings:
      instance_count: $(2 * 2)
      name: $(vars.deployment_name)-$(vars.zone)
"#;

fn catalog() -> ModuleCatalog {
    ModuleCatalog::new()
        .with_module(
            "modules/network/vpc",
            ModuleInfo::default()
                .with_input(VarInfo::new("project_id", "string").required())
                .with_input(VarInfo::new("region", "string"))
                .with_output("network_name")
                .with_output("subnetwork_self_link"),
        )
        .with_module(
            "modules/file-system/filestore",
            ModuleInfo::default()
                .with_input(VarInfo::new("network_name", "string"))
                .with_input(VarInfo::new("zone", "string"))
                .with_input(VarInfo::new("local_mount", "string"))
                .with_output("network_storage"),
        )
        .with_module(
            "modules/compute/vm",
            ModuleInfo::default()
                .with_input(VarInfo::new("network_name", "string"))
                .with_input(VarInfo::new("subnetwork_self_link", "string"))
                .with_input(VarInfo::new("network_storage", "list(object)"))
                .with_input(VarInfo::new("instance_count", "number"))
                .with_input(VarInfo::new("name", "string")),
        )
}

#[test]
fn test_expand_blueprint_from_yaml() {
    let mut bp = BlueprintReader::parse_blueprint(BLUEPRINT).unwrap();
    bp.expand(&catalog()).unwrap();

    assert_eq!(bp.vars["zone"], Value::string("us-central1-a"));
    for group in &bp.deployment_groups {
        assert_eq!(group.terraform_backend.backend_type, "gcs");
        assert_eq!(
            group.terraform_backend.configuration["bucket"],
            Value::string("tf-state")
        );
    }

    let homefs = bp.module(&"homefs".into()).unwrap();
    assert_eq!(homefs.settings["zone"], Value::string("us-central1-a"));
    assert_eq!(
        homefs.settings["network_name"].as_str(),
        Some("$(network1.network_name)")
    );

    let compute = bp.module(&"compute".into()).unwrap();
    assert_eq!(compute.settings["instance_count"], Value::int(4));
    assert_eq!(compute.settings["name"], Value::string("golden-us-central1-a"));
    assert_eq!(
        unmark(&compute.settings["subnetwork_self_link"]),
        vec![ModuleId::from("network1")]
    );
    assert!(compute.list_unused_modules().is_empty());
}

#[test]
fn test_expansion_is_idempotent() {
    let mut bp = BlueprintReader::parse_blueprint(BLUEPRINT).unwrap();
    bp.expand(&catalog()).unwrap();
    let first = BlueprintWriter::to_yaml(&bp).unwrap();

    let mut again = BlueprintReader::parse_blueprint(&first).unwrap();
    again.expand(&catalog()).unwrap();
    let second = BlueprintWriter::to_yaml(&again).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_escaped_literal_survives_reexpansion() {
    let yaml = BLUEPRINT.replace("local_mount: /home", "local_mount: echo \\$(hostname)");
    let mut bp = BlueprintReader::parse_blueprint(&yaml).unwrap();
    bp.expand(&catalog()).unwrap();
    let first = BlueprintWriter::to_yaml(&bp).unwrap();

    let mut again = BlueprintReader::parse_blueprint(&first).unwrap();
    again.expand(&catalog()).unwrap();
    let second = BlueprintWriter::to_yaml(&again).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        again.module(&"homefs".into()).unwrap().settings["local_mount"],
        Value::string("echo \\$(hostname)")
    );
}

#[test]
fn test_expanded_blueprint_written_to_disk() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("golden").join("expanded.yaml");

    let mut bp = BlueprintReader::parse_blueprint(BLUEPRINT).unwrap();
    bp.expand(&catalog()).unwrap();
    BlueprintWriter::write_blueprint(&bp, &out).unwrap();

    let content = fs::read_to_string(&out).unwrap();
    assert!(content.contains("blueprint_name: hpc-cluster"));
    assert!(content.contains("kind: terraform"));

    let reread = BlueprintReader::read_blueprint(&out).unwrap();
    assert_eq!(reread.vars["zone"], Value::string("us-central1-a"));
}

#[test]
fn test_unused_use_is_reported() {
    let mut bp = BlueprintReader::parse_blueprint(BLUEPRINT).unwrap();
    let compute = bp.module_mut(&"compute".into()).unwrap();
    compute
        .settings
        .insert("network_storage".into(), Value::List(Vec::new()));
    bp.expand(&catalog()).unwrap();

    let compute = bp.module(&"compute".into()).unwrap();
    assert_eq!(compute.list_unused_modules(), vec![ModuleId::from("homefs")]);
}

#[test]
fn test_structural_errors_are_aggregated() {
    let yaml = r#"
blueprint_name: broken
vars:
  deployment_name: golden
deployment_groups:
- group: primary
  modules:
  - id: network1
    source: modules/network/vpc
- group: primary
  modules:
  - id: network1
    source: modules/network/vpc
- group: empty
  modules: []
"#;
    let mut bp = BlueprintReader::parse_blueprint(yaml).unwrap();
    let errors = bp.expand(&catalog()).unwrap_err();

    assert_eq!(errors.len(), 3);
    let paths: Vec<String> = errors.iter().map(|e| e.path.to_string()).collect();
    assert!(paths.contains(&"deployment_groups[1].group".to_string()));
    assert!(paths.contains(&"deployment_groups[1].modules[0].id".to_string()));
    assert!(paths.contains(&"deployment_groups[2].modules".to_string()));
    assert_eq!(
        errors.iter().filter(|e| e.kind() == ErrorKind::Duplicate).count(),
        2
    );
}

#[test]
fn test_variable_cycle_fails_expansion() {
    let yaml = BLUEPRINT.replace("region: us-central1", "region: $(vars.zone)");
    let mut bp = BlueprintReader::parse_blueprint(&yaml).unwrap();
    let errors = bp.expand(&catalog()).unwrap_err();

    let first = errors.first().unwrap();
    assert_eq!(first.kind(), ErrorKind::Cycle);
    assert!(first.path.to_string().starts_with("vars."));
}

#[test]
fn test_misspelled_module_hint() {
    let yaml = BLUEPRINT.replace("use: [network1, homefs]", "use: [netwrk1, homefs]");
    let mut bp = BlueprintReader::parse_blueprint(&yaml).unwrap();
    let errors = bp.expand(&catalog()).unwrap_err();

    let first = errors.first().unwrap();
    assert_eq!(first.path.to_string(), "deployment_groups[1].modules[0].use[0]");
    assert_eq!(first.kind(), ErrorKind::Reference(ReferenceKind::NotFound));
    assert_eq!(first.hint(), Some("did you mean \"network1\"?"));
    assert!(first.to_string().contains("did you mean \"network1\"?"));
}

#[test]
fn test_use_of_later_group_rejected() {
    let yaml = BLUEPRINT.replace("use: [network1]", "use: [network1, compute]");
    let mut bp = BlueprintReader::parse_blueprint(&yaml).unwrap();
    let errors = bp.expand(&catalog()).unwrap_err();
    assert!(matches!(
        errors.first().unwrap().error,
        ConfigError::LaterGroup { .. }
    ));
}

#[test]
fn test_module_catalog_from_directory() {
    let dir = tempdir().unwrap();
    let vpc = dir.path().join("modules").join("network").join("vpc");
    fs::create_dir_all(&vpc).unwrap();
    fs::write(
        vpc.join("module.yaml"),
        "inputs:\n  - name: project_id\n    type: string\n    required: true\noutputs:\n  - network_name\n",
    )
    .unwrap();

    let catalog = ModuleCatalog::load_dir(dir.path()).unwrap();
    let mut bp = BlueprintReader::parse_blueprint(
        "blueprint_name: net\nvars:\n  project_id: p\n  deployment_name: d\ndeployment_groups:\n- group: primary\n  modules:\n  - id: network1\n    source: ./modules/network/vpc\n",
    )
    .unwrap();
    bp.expand(&catalog).unwrap();
    assert_eq!(
        bp.module(&"network1".into()).unwrap().settings["project_id"],
        Value::string("p")
    );
}

fn dependency_vars(deps: &[Vec<prop::sample::Index>]) -> Dict {
    // declare in reverse so dependencies usually appear after their users
    let mut vars = Dict::new();
    for i in (0..deps.len()).rev() {
        let refs: Vec<String> = if i == 0 {
            Vec::new()
        } else {
            deps[i]
                .iter()
                .map(|idx| format!("$(vars.v{})", idx.index(i)))
                .collect()
        };
        let value = if refs.is_empty() {
            "x".to_string()
        } else {
            refs.join("-")
        };
        vars.insert(format!("v{}", i), Value::string(value));
    }
    vars
}

/// Variables `v0..vN` where the last `ring` of them reference each other in a
/// loop. The others only reference lower-numbered variables outside the loop,
/// so the loop is the only cycle. Declaration order is shuffled.
fn cyclic_vars() -> impl Strategy<Value = (Dict, Vec<String>)> {
    (0usize..6, 1usize..6)
        .prop_flat_map(|(plain, ring)| {
            let n = plain + ring;
            (
                Just(plain),
                Just(ring),
                prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..3), n),
                Just((0..n).collect::<Vec<usize>>()).prop_shuffle(),
            )
        })
        .prop_map(|(plain, ring, deps, order)| {
            let targets = |i: usize| -> Vec<usize> {
                let bound = if i < plain { i } else { plain };
                let mut out: Vec<usize> = if bound == 0 {
                    Vec::new()
                } else {
                    deps[i].iter().map(|d| d.index(bound)).collect()
                };
                if i >= plain {
                    out.push(plain + (i - plain + 1) % ring);
                }
                out
            };

            let mut vars = Dict::new();
            for &i in &order {
                let refs: Vec<String> = targets(i)
                    .into_iter()
                    .map(|j| format!("$(vars.v{})", j))
                    .collect();
                let value = if refs.is_empty() {
                    "x".to_string()
                } else {
                    refs.join("-")
                };
                vars.insert(format!("v{}", i), Value::string(value));
            }
            let members = (plain..plain + ring).map(|i| format!("v{}", i)).collect();
            (vars, members)
        })
}

proptest! {
    #[test]
    fn prop_variable_cycles_are_reported((vars, ring) in cyclic_vars()) {
        let errors = vars_topological_order(&vars).unwrap_err();
        let first = errors.first().unwrap();
        prop_assert_eq!(first.kind(), ErrorKind::Cycle);
        match &first.error {
            ConfigError::CyclicDependency { from, to } => {
                prop_assert!(ring.contains(from), "{} is not in {:?}", from, ring);
                prop_assert!(ring.contains(to), "{} is not in {:?}", to, ring);
            }
            other => prop_assert!(false, "expected a cycle error, got {}", other),
        }
    }

    #[test]
    fn prop_topological_order_respects_dependencies(
        deps in prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..3), 1..10)
    ) {
        let vars = dependency_vars(&deps);
        let order = vars_topological_order(&vars).unwrap();
        prop_assert_eq!(order.len(), vars.len());

        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        for i in 1..deps.len() {
            for idx in &deps[i] {
                let dep = format!("v{}", idx.index(i));
                let dependent = format!("v{}", i);
                prop_assert!(position(&dep) < position(&dependent));
            }
        }
    }

    #[test]
    fn prop_lowercase_labels_are_valid(label in "[a-z][a-z0-9_-]{0,62}") {
        prop_assert!(is_valid_label_value(&label));
    }

    #[test]
    fn prop_uppercase_or_digit_start_is_invalid(label in "[A-Z0-9][a-z0-9]{0,10}") {
        prop_assert!(!is_valid_label_value(&label));
    }

    #[test]
    fn prop_overlong_labels_are_invalid(label in "[a-z]{64,80}") {
        prop_assert!(!is_valid_label_value(&label));
    }
}
