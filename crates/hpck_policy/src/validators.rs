//! Built-in blueprint validators and the runner that executes them.
//!
//! Validators see both the blueprint as the user wrote it and the expanded
//! blueprint. The expanded blueprint still carries `use` provenance marks;
//! the source blueprint still carries the `$(vars.*)` references that
//! expansion inlines.

use hpck_config::hint::closest;
use hpck_config::{Blueprint, Dict, Validator, Value};
use tracing::{debug, info};

use crate::gate::{GateDetail, GateResult, ValidationReport};

pub const TEST_MODULE_NOT_USED: &str = "test_module_not_used";
pub const TEST_DEPLOYMENT_VARIABLE_NOT_USED: &str = "test_deployment_variable_not_used";

/// Validators added to every blueprint that does not already list them.
pub const DEFAULT_VALIDATORS: [&str; 2] = [TEST_MODULE_NOT_USED, TEST_DEPLOYMENT_VARIABLE_NOT_USED];

/// The blueprints a validator inspects.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub source: &'a Blueprint,
    pub expanded: &'a Blueprint,
}

impl<'a> ValidationContext<'a> {
    pub fn new(source: &'a Blueprint, expanded: &'a Blueprint) -> Self {
        Self { source, expanded }
    }
}

/// A validator implementation. Findings are reported as failed details.
pub type ValidatorFn = fn(&ValidationContext<'_>, &Dict) -> GateResult;

/// Named validator implementations.
pub struct ValidatorRegistry {
    validators: Vec<(&'static str, ValidatorFn)>,
}

impl ValidatorRegistry {
    pub fn empty() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Registry holding the built-in validators.
    pub fn builtin() -> Self {
        Self::empty()
            .with_validator(TEST_MODULE_NOT_USED, test_module_not_used)
            .with_validator(TEST_DEPLOYMENT_VARIABLE_NOT_USED, test_deployment_variable_not_used)
    }

    pub fn with_validator(mut self, name: &'static str, f: ValidatorFn) -> Self {
        self.validators.push((name, f));
        self
    }

    pub fn get(&self, name: &str) -> Option<ValidatorFn> {
        self.validators
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.validators.iter().map(|(n, _)| *n)
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The validators to run for a blueprint: its declared validators followed
/// by every default validator it does not mention.
pub fn validators_to_run(bp: &Blueprint) -> Vec<Validator> {
    let mut list = bp.validators.clone();
    for name in DEFAULT_VALIDATORS {
        if !list.iter().any(|v| v.validator == name) {
            list.push(Validator::new(name));
        }
    }
    list
}

/// Runs declared and default validators against a blueprint.
pub struct ValidatorRunner {
    registry: ValidatorRegistry,
}

impl ValidatorRunner {
    pub fn new(registry: ValidatorRegistry) -> Self {
        Self { registry }
    }

    /// Run every validator that is not skipped.
    ///
    /// An unknown validator name is reported as a failed result with a
    /// spelling hint, so it is gated like any other failure.
    pub fn execute(&self, ctx: &ValidationContext<'_>) -> ValidationReport {
        let mut report = ValidationReport::default();
        for validator in validators_to_run(ctx.expanded) {
            if validator.skip {
                debug!("Skipping validator {}", validator.validator);
                continue;
            }
            let result = match self.registry.get(&validator.validator) {
                Some(f) => f(ctx, &validator.inputs),
                None => self.unknown_validator(&validator.validator),
            };
            info!(
                validator = %result.validator,
                passed = result.passed,
                "Validator finished"
            );
            report.add_result(result);
        }
        report
    }

    fn unknown_validator(&self, name: &str) -> GateResult {
        let names: Vec<&str> = self.registry.names().collect();
        let result = GateResult::fail(name).with_detail(GateDetail::failed(
            name,
            format!("{:?} is not an implemented validator", name),
        ));
        match closest(name, &names) {
            Some(candidate) => result.with_recommendation(format!("did you mean {:?}?", candidate)),
            None => result,
        }
    }
}

impl Default for ValidatorRunner {
    fn default() -> Self {
        Self::new(ValidatorRegistry::builtin())
    }
}

fn reject_inputs(name: &str, inputs: &Dict) -> Option<GateResult> {
    if inputs.is_empty() {
        return None;
    }
    let keys: Vec<&str> = inputs.keys().map(String::as_str).collect();
    Some(GateResult::fail(name).with_detail(GateDetail::failed(
        "inputs",
        format!("validator takes no inputs, got: {}", keys.join(", ")),
    )))
}

/// Every module in a `use` list must have at least one of its outputs
/// consumed.
pub fn test_module_not_used(ctx: &ValidationContext<'_>, inputs: &Dict) -> GateResult {
    if let Some(rejected) = reject_inputs(TEST_MODULE_NOT_USED, inputs) {
        return rejected;
    }

    let mut result = GateResult::pass(TEST_MODULE_NOT_USED);
    let modules = ctx.expanded.deployment_groups.iter().flat_map(|g| &g.modules);
    for module in modules {
        for unused in module.list_unused_modules() {
            result = result
                .with_detail(GateDetail::failed(
                    module.id.as_str(),
                    format!(
                        "module {:?} uses module {:?}, but matching setting and outputs were not found; the value may be set explicitly or by a prior used module",
                        module.id.as_str(),
                        unused.as_str()
                    ),
                ))
                .with_recommendation(format!(
                    "remove {:?} from the use list of {:?}",
                    unused.as_str(),
                    module.id.as_str()
                ));
        }
    }
    result
}

/// Every declared variable must be referenced somewhere in the blueprint.
///
/// A variable is also used when expansion set a module input of the same
/// name from it.
pub fn test_deployment_variable_not_used(ctx: &ValidationContext<'_>, inputs: &Dict) -> GateResult {
    if let Some(rejected) = reject_inputs(TEST_DEPLOYMENT_VARIABLE_NOT_USED, inputs) {
        return rejected;
    }

    let mut result = GateResult::pass(TEST_DEPLOYMENT_VARIABLE_NOT_USED);
    for name in ctx.source.list_unused_variables() {
        if set_from_global(ctx, &name) {
            continue;
        }
        result = result
            .with_detail(GateDetail::failed(
                name.as_str(),
                format!("the variable {:?} was not used", name),
            ))
            .with_recommendation(format!("remove {:?} from vars", name));
    }
    result
}

/// True when some module input named `name` was left unset by the user and
/// filled by expansion from the global variable rather than by `use`.
fn set_from_global(ctx: &ValidationContext<'_>, name: &str) -> bool {
    ctx.expanded
        .deployment_groups
        .iter()
        .flat_map(|g| &g.modules)
        .any(|module| {
            let filled = module
                .settings
                .get(name)
                .map_or(false, |v| !matches!(v, Value::Marked(_)));
            let user_set = ctx
                .source
                .module(&module.id)
                .map_or(false, |m| m.settings.contains_key(name));
            filled && !user_set
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpck_config::{DeploymentGroup, Module, ModuleId};

    fn blueprint() -> Blueprint {
        let mut bp = Blueprint::new("bp");
        bp.vars.insert("deployment_name".into(), Value::string("golden"));
        bp.vars.insert("region".into(), Value::string("us-central1"));
        bp.vars.insert("zone".into(), Value::string("us-central1-a"));
        let mut g = DeploymentGroup::new("primary");
        let mut net = Module::new("network1", "modules/network/vpc");
        net.settings.insert("region".into(), Value::string("$(vars.region)"));
        g.modules.push(net);
        bp.deployment_groups.push(g);
        bp
    }

    #[test]
    fn test_defaults_added_after_declared() {
        let mut bp = blueprint();
        bp.validators.push(Validator::new("custom"));
        bp.skip_validator(TEST_MODULE_NOT_USED);
        let names: Vec<String> = validators_to_run(&bp).into_iter().map(|v| v.validator).collect();
        assert_eq!(
            names,
            vec!["custom", TEST_MODULE_NOT_USED, TEST_DEPLOYMENT_VARIABLE_NOT_USED]
        );
    }

    #[test]
    fn test_unused_variable_reported() {
        let bp = blueprint();
        let ctx = ValidationContext::new(&bp, &bp);
        let result = test_deployment_variable_not_used(&ctx, &Dict::new());
        assert!(!result.passed);
        let checks: Vec<&str> = result.failures().map(|d| d.check.as_str()).collect();
        assert_eq!(checks, vec!["zone"]);
    }

    #[test]
    fn test_variable_used_by_global_default() {
        let source = blueprint();
        let mut expanded = source.clone();
        expanded.deployment_groups[0].modules[0]
            .settings
            .insert("zone".into(), Value::string("us-central1-a"));
        let ctx = ValidationContext::new(&source, &expanded);
        assert!(test_deployment_variable_not_used(&ctx, &Dict::new()).passed);
    }

    #[test]
    fn test_module_not_used_reports_each_pair() {
        let mut bp = blueprint();
        let mut vm = Module::new("vm", "modules/compute/vm");
        vm.uses = vec![ModuleId::from("network1")];
        bp.deployment_groups[0].modules.push(vm);

        let ctx = ValidationContext::new(&bp, &bp);
        let result = test_module_not_used(&ctx, &Dict::new());
        assert!(!result.passed);
        assert_eq!(result.failures().count(), 1);
        assert_eq!(
            result.recommendations,
            vec!["remove \"network1\" from the use list of \"vm\"".to_string()]
        );
    }

    #[test]
    fn test_validator_inputs_rejected() {
        let bp = blueprint();
        let ctx = ValidationContext::new(&bp, &bp);
        let mut inputs = Dict::new();
        inputs.insert("foo".into(), Value::Bool(true));
        let result = test_module_not_used(&ctx, &inputs);
        assert!(!result.passed);
        assert_eq!(result.details[0].check, "inputs");
    }

    #[test]
    fn test_runner_skips_and_hints() {
        let mut bp = blueprint();
        bp.validators.push(Validator::new("test_module_not_usd"));
        bp.skip_validator(TEST_DEPLOYMENT_VARIABLE_NOT_USED);

        let report = ValidatorRunner::default().execute(&ValidationContext::new(&bp, &bp));
        let ran: Vec<&str> = report.results.iter().map(|r| r.validator.as_str()).collect();
        assert_eq!(ran, vec!["test_module_not_usd", TEST_MODULE_NOT_USED]);

        let unknown = &report.results[0];
        assert!(!unknown.passed);
        assert_eq!(
            unknown.recommendations,
            vec![format!("did you mean {:?}?", TEST_MODULE_NOT_USED)]
        );
        assert!(report.results[1].passed);
    }
}
