//! The blueprint expansion pipeline.
//!
//! Expansion runs four stages in order and stops at the first failing one:
//!
//! 1. **NameCheck**: the blueprint name is a valid label value.
//! 2. **BackendCheck**: backend types are concrete; groups without a backend
//!    inherit the default backend.
//! 3. **VarsExpansion**: global variables are evaluated in dependency order
//!    and `deployment_name` is checked.
//! 4. **GroupsExpansion**: structural checks, then every module in
//!    group-then-module order has its kind defaulted, `use` relations and
//!    global variables applied, its settings checked against the module's
//!    inputs and finally evaluated. A last structural pass runs afterwards.

use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::blueprint::{Blueprint, Module, ModuleId, ModuleKind};
use crate::error::{BpError, BpResult, ConfigError, Errors};
use crate::eval::{settle, EvalContext};
use crate::functions::FunctionTable;
use crate::hint::hint_spelling;
use crate::modules::{ModuleInfo, ModuleResolver};
use crate::path::BpPath;
use crate::reference::{value_references, Reference};
use crate::usemark::mark;
use crate::validate::{
    check_backend, check_blueprint_name, check_modules_and_groups, validate_setting_reference,
};
use crate::value::{Dict, Value};
use crate::vars::eval_vars;

/// Stages of blueprint expansion, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionStage {
    NameCheck,
    BackendCheck,
    VarsExpansion,
    GroupsExpansion,
}

impl ExpansionStage {
    pub const ALL: [ExpansionStage; 4] = [
        ExpansionStage::NameCheck,
        ExpansionStage::BackendCheck,
        ExpansionStage::VarsExpansion,
        ExpansionStage::GroupsExpansion,
    ];
}

impl fmt::Display for ExpansionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpansionStage::NameCheck => "name check",
            ExpansionStage::BackendCheck => "backend check",
            ExpansionStage::VarsExpansion => "vars expansion",
            ExpansionStage::GroupsExpansion => "groups expansion",
        };
        f.write_str(name)
    }
}

/// Expands blueprints in place.
pub struct Expander<'a> {
    resolver: &'a dyn ModuleResolver,
    functions: &'a FunctionTable,
}

impl<'a> Expander<'a> {
    pub fn new(resolver: &'a dyn ModuleResolver) -> Self {
        Self {
            resolver,
            functions: FunctionTable::builtin(),
        }
    }

    /// Use a different function table for expressions.
    pub fn with_functions(mut self, functions: &'a FunctionTable) -> Self {
        self.functions = functions;
        self
    }

    /// Run every stage on `bp`.
    pub fn expand(&self, bp: &mut Blueprint) -> BpResult<()> {
        for stage in ExpansionStage::ALL {
            info!(blueprint = %bp.blueprint_name, %stage, "Running expansion stage");
            self.run_stage(stage, bp)?;
        }
        Ok(())
    }

    /// Run a single stage.
    pub fn run_stage(&self, stage: ExpansionStage, bp: &mut Blueprint) -> BpResult<()> {
        match stage {
            ExpansionStage::NameCheck => check_blueprint_name(&bp.blueprint_name),
            ExpansionStage::BackendCheck => expand_backends(bp),
            ExpansionStage::VarsExpansion => {
                bp.vars = eval_vars(&bp.vars, self.functions)?;
                bp.deployment_name().map(|_| ())
            }
            ExpansionStage::GroupsExpansion => self.expand_groups(bp),
        }
    }

    fn expand_groups(&self, bp: &mut Blueprint) -> BpResult<()> {
        check_modules_and_groups(bp)?;
        let infos = self.resolve_modules(bp)?;
        let ctx = module_context(bp, &infos, self.functions);

        for gi in 0..bp.deployment_groups.len() {
            for mi in 0..bp.deployment_groups[gi].modules.len() {
                let path = BpPath::module(gi, mi);
                let mut module = bp.deployment_groups[gi].modules[mi].clone();
                debug!(module = %module.id, group = %bp.deployment_groups[gi].group, "Expanding module");
                expand_module(bp, &infos, &ctx, &path, &mut module)?;
                bp.deployment_groups[gi].modules[mi] = module;
            }
        }

        check_modules_and_groups(bp)
    }

    /// Resolve metadata for every module, stopping at the first failure.
    fn resolve_modules(&self, bp: &Blueprint) -> BpResult<IndexMap<ModuleId, ModuleInfo>> {
        let mut infos = IndexMap::new();
        for (gi, group) in bp.deployment_groups.iter().enumerate() {
            for (mi, module) in group.modules.iter().enumerate() {
                let info = self
                    .resolver
                    .module_info(&module.source, module.kind.effective())
                    .map_err(|e| BpError::new(BpPath::module(gi, mi).dot("source"), e))?;
                infos.insert(module.id.clone(), info);
            }
        }
        Ok(infos)
    }
}

impl Blueprint {
    /// Expand the blueprint in place with the built-in function table.
    pub fn expand(&mut self, resolver: &dyn ModuleResolver) -> BpResult<()> {
        Expander::new(resolver).expand(self)
    }
}

fn expand_backends(bp: &mut Blueprint) -> BpResult<()> {
    let mut errs = Errors::new();
    errs.at(
        &BpPath::backend_defaults().dot("type"),
        check_backend(&bp.terraform_backend_defaults),
    );
    for (i, group) in bp.deployment_groups.iter().enumerate() {
        errs.at(
            &BpPath::group(i).dot("terraform_backend").dot("type"),
            check_backend(&group.terraform_backend),
        );
    }
    errs.into_result()?;

    let defaults = &bp.terraform_backend_defaults;
    if defaults.backend_type.is_empty() {
        return Ok(());
    }
    for group in bp
        .deployment_groups
        .iter_mut()
        .filter(|g| g.terraform_backend.backend_type.is_empty())
    {
        debug!(group = %group.group, "Inheriting default terraform backend");
        group.terraform_backend = defaults.clone();
    }
    Ok(())
}

/// Namespace for module settings: the expanded vars plus one object per
/// module, with every declared output unknown.
fn module_context<'f>(
    bp: &Blueprint,
    infos: &IndexMap<ModuleId, ModuleInfo>,
    functions: &'f FunctionTable,
) -> EvalContext<'f> {
    let mut ctx = EvalContext::new(functions).with_vars(bp.vars.clone());
    for (id, info) in infos {
        let outputs: Dict = info
            .outputs
            .iter()
            .map(|o| (o.name.clone(), Value::Unknown))
            .collect();
        ctx.bind(id.as_str(), Value::Object(outputs));
    }
    ctx
}

fn expand_module(
    bp: &Blueprint,
    infos: &IndexMap<ModuleId, ModuleInfo>,
    ctx: &EvalContext<'_>,
    path: &BpPath,
    module: &mut Module,
) -> BpResult<()> {
    if module.kind.is_unset() {
        module.kind = ModuleKind::Terraform;
    }
    let empty = ModuleInfo::default();
    let info = infos.get(&module.id).unwrap_or(&empty);

    apply_use(module, info, infos);
    apply_global_vars(module, info, &bp.vars);
    check_settings(bp, infos, module, info, path)?;

    let settings_path = path.dot("settings");
    for (key, value) in module.settings.iter_mut() {
        let evaluated = ctx
            .eval(value)
            .map_err(|e| BpError::new(settings_path.dot(key.as_str()), e))?;
        *value = settle(value, evaluated);
    }
    Ok(())
}

/// Fill inputs from the outputs of used modules.
///
/// Only inputs the user has not set explicitly are touched. A scalar input
/// takes the first used module providing it; a list input combines all of
/// them. Every filled value is marked with its contributors.
fn apply_use(module: &mut Module, info: &ModuleInfo, infos: &IndexMap<ModuleId, ModuleInfo>) {
    let mut contributions: IndexMap<String, Vec<ModuleId>> = IndexMap::new();
    for used in &module.uses {
        let Some(used_info) = infos.get(used) else {
            continue;
        };
        for output in &used_info.outputs {
            if info.input(&output.name).is_none() {
                continue;
            }
            let explicit = module
                .settings
                .get(&output.name)
                .map_or(false, |v| !matches!(v, Value::Marked(_)));
            if explicit {
                continue;
            }
            let ids = contributions.entry(output.name.clone()).or_default();
            if !ids.contains(used) {
                ids.push(used.clone());
            }
        }
    }

    for (input, ids) in contributions {
        let is_list = info.input(&input).map_or(false, |i| i.is_list());
        let value = if is_list {
            let refs: Vec<String> = ids
                .iter()
                .map(|id| Reference::module(id.clone(), input.as_str()).to_string())
                .collect();
            mark(
                Value::string(format!("$(flatten([{}]))", refs.join(", "))),
                ids,
            )
        } else {
            let first = ids[0].clone();
            mark(
                Value::string(Reference::module(first.clone(), input.as_str()).to_expression()),
                [first],
            )
        };
        debug!(module = %module.id, setting = %input, "Setting input from used module");
        module.settings.insert(input, value);
    }
}

/// Set unset inputs that share a name with a global variable to that variable.
fn apply_global_vars(module: &mut Module, info: &ModuleInfo, vars: &Dict) {
    for input in &info.inputs {
        if !module.settings.contains_key(&input.name) && vars.contains_key(&input.name) {
            module.settings.insert(
                input.name.clone(),
                Value::string(Reference::global(input.name.as_str()).to_expression()),
            );
        }
    }
}

/// Settings must be inputs of the module, required inputs must be set and
/// every reference must resolve.
fn check_settings(
    bp: &Blueprint,
    infos: &IndexMap<ModuleId, ModuleInfo>,
    module: &Module,
    info: &ModuleInfo,
    path: &BpPath,
) -> BpResult<()> {
    let mut errs = Errors::new();
    let settings_path = path.dot("settings");
    let input_names = info.input_names();

    for (key, value) in &module.settings {
        let key_path = settings_path.dot(key.as_str());
        if info.input(key).is_none() {
            errs.at(
                &key_path,
                Err(hint_spelling(
                    key,
                    &input_names,
                    ConfigError::UnknownSetting {
                        module: module.id.to_string(),
                        setting: key.clone(),
                    },
                )),
            );
            continue;
        }
        match value_references(value) {
            Ok(refs) => {
                for (reference, rel) in refs {
                    errs.at(
                        &key_path.join(&rel),
                        validate_setting_reference(bp, infos, &module.id, &reference),
                    );
                }
            }
            Err(e) => {
                errs.push(BpError::new(key_path.join(&e.path), e.error));
            }
        }
    }

    for input in info.inputs.iter().filter(|i| i.required) {
        if !module.settings.contains_key(&input.name) {
            errs.at(
                &settings_path,
                Err(ConfigError::MissingSetting {
                    module: module.id.to_string(),
                    setting: input.name.clone(),
                }),
            );
        }
    }

    errs.into_result()
}
