//! Structural validation of blueprints.
//!
//! Checks in this module collect every finding into an [`Errors`] value
//! instead of stopping at the first one.

use std::collections::HashSet;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::blueprint::{Blueprint, ModuleId, ModuleKind, TerraformBackend};
use crate::error::{BpResult, ConfigError, ConfigResult, Errors};
use crate::expression::has_expression;
use crate::hint::hint_spelling;
use crate::modules::{normalize_source, ModuleInfo};
use crate::path::BpPath;
use crate::reference::{Reference, Scope};

/// Module sources that have been renamed, and their replacements.
const MOVED_MODULES: &[(&str, &str)] = &[
    (
        "community/modules/scheduler/cloud-batch-job",
        "modules/scheduler/batch-job-template",
    ),
    (
        "community/modules/scheduler/cloud-batch-login-node",
        "modules/scheduler/batch-login-node",
    ),
    (
        "community/modules/scheduler/htcondor-configure",
        "community/modules/scheduler/htcondor-setup",
    ),
    (
        "community/modules/scripts/spack-install",
        "community/modules/scripts/spack-setup",
    ),
];

fn label_value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\p{Ll}\p{Lo}][\p{Ll}\p{Lo}\p{N}_-]{0,62}$").expect("valid label regex")
    })
}

fn group_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?-u:\w)(-*(?-u:\w))*$").expect("valid group name regex"))
}

fn module_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("valid module id regex"))
}

/// True for a lowercase label value of at most 63 characters starting with a
/// lowercase letter.
pub fn is_valid_label_value(value: &str) -> bool {
    label_value_regex().is_match(value)
}

pub fn is_valid_group_name(name: &str) -> bool {
    group_name_regex().is_match(name)
}

/// The blueprint name must be a non-empty label value.
pub fn check_blueprint_name(name: &str) -> BpResult<()> {
    let cause = if name.is_empty() {
        "value is an empty string"
    } else if !is_valid_label_value(name) {
        "value can only contain lowercase letters, numbers, '_' and '-', must start with a lowercase letter and be at most 63 characters long"
    } else {
        return Ok(());
    };
    let mut errs = Errors::new();
    errs.at(
        &BpPath::blueprint_name(),
        Err(ConfigError::InputValue {
            input_key: "blueprint_name".to_string(),
            cause: cause.to_string(),
        }),
    );
    errs.into_result()
}

pub fn validate_group_name(name: &str) -> ConfigResult<()> {
    if name.is_empty() {
        return Err(ConfigError::EmptyGroupName);
    }
    if !is_valid_group_name(name) {
        return Err(ConfigError::InvalidGroupName(name.to_string()));
    }
    Ok(())
}

pub fn validate_module_id(id: &ModuleId) -> ConfigResult<()> {
    if id.as_str() == "vars" {
        return Err(ConfigError::ReservedModuleId(id.to_string()));
    }
    if !module_id_regex().is_match(id.as_str()) {
        return Err(ConfigError::InvalidModuleId(id.to_string()));
    }
    Ok(())
}

/// Fails if `source` names a module that has been renamed.
pub fn check_moved_module(source: &str) -> ConfigResult<()> {
    let key = normalize_source(source);
    match MOVED_MODULES.iter().find(|(old, _)| *old == key) {
        Some((_, replacement)) => Err(ConfigError::MovedModule {
            module_source: source.to_string(),
            replacement: replacement.to_string(),
        }),
        None => Ok(()),
    }
}

/// Backend types must be concrete strings.
pub fn check_backend(backend: &TerraformBackend) -> ConfigResult<()> {
    if has_expression(&backend.backend_type) {
        return Err(ConfigError::BackendTypeExpression);
    }
    Ok(())
}

/// Rules for one module using or referencing another.
///
/// The target must exist, must not be a packer module, must not be the
/// module itself and must live in the same group or an earlier one.
pub fn validate_module_reference(bp: &Blueprint, from: &ModuleId, to: &ModuleId) -> ConfigResult<()> {
    if from == to {
        return Err(ConfigError::SelfReference(to.to_string()));
    }
    let Some((to_group, to_index)) = bp.module_location(to) else {
        return Err(hint_spelling(
            to.as_str(),
            &bp.module_ids(),
            ConfigError::UnknownModule(to.to_string()),
        ));
    };
    if bp.deployment_groups[to_group].modules[to_index].kind == ModuleKind::Packer {
        return Err(ConfigError::PackerReference(to.to_string()));
    }
    let (from_group, _) = bp
        .module_location(from)
        .ok_or_else(|| ConfigError::UnknownModule(from.to_string()))?;
    if to_group > from_group {
        return Err(ConfigError::LaterGroup {
            from: from.to_string(),
            target: to.to_string(),
        });
    }
    Ok(())
}

/// Check a reference found in the settings of module `from`.
///
/// `infos` holds the resolved metadata of every module, used to check that
/// referenced outputs exist.
pub fn validate_setting_reference(
    bp: &Blueprint,
    infos: &IndexMap<ModuleId, ModuleInfo>,
    from: &ModuleId,
    reference: &Reference,
) -> ConfigResult<()> {
    let (group, module) = match &reference.scope {
        Scope::Global => {
            if bp.vars.contains_key(&reference.name) {
                return Ok(());
            }
            return Err(hint_spelling(
                &reference.name,
                bp.vars.keys(),
                ConfigError::UnknownVariable(reference.name.clone()),
            ));
        }
        Scope::Module { group, module } => (group, module),
    };

    validate_module_reference(bp, from, module)?;

    if let Some(group) = group {
        let actual = bp.module_group(module)?;
        if &actual.group != group {
            return Err(ConfigError::WrongGroup {
                module: module.to_string(),
                group: group.to_string(),
            }
            .with_hint(format!("module {:?} is in group {:?}", module.as_str(), actual.group.as_str())));
        }
    }

    if let Some(info) = infos.get(module) {
        if info.output(&reference.name).is_none() {
            return Err(hint_spelling(
                &reference.name,
                &info.output_names(),
                ConfigError::UnknownOutput {
                    module: module.to_string(),
                    output: reference.name.clone(),
                },
            ));
        }
    }
    Ok(())
}

/// Aggregated structural checks over groups and modules.
pub fn check_modules_and_groups(bp: &Blueprint) -> BpResult<()> {
    let mut errs = Errors::new();
    let mut seen_groups = HashSet::new();
    let mut seen_modules = HashSet::new();

    errs.at(
        &BpPath::backend_defaults().dot("type"),
        check_backend(&bp.terraform_backend_defaults),
    );

    for (gi, group) in bp.deployment_groups.iter().enumerate() {
        let gp = BpPath::group(gi);
        let name_path = gp.dot("group");

        errs.at(&name_path, validate_group_name(group.group.as_str()));
        if !seen_groups.insert(&group.group) {
            errs.at(&name_path, Err(ConfigError::DuplicateGroup(group.group.to_string())));
        }
        errs.at(
            &gp.dot("terraform_backend").dot("type"),
            check_backend(&group.terraform_backend),
        );

        if group.modules.is_empty() {
            errs.at(&gp.dot("modules"), Err(ConfigError::EmptyGroup));
            continue;
        }

        for (mi, module) in group.modules.iter().enumerate() {
            let mp = BpPath::module(gi, mi);
            errs.at(&mp.dot("id"), validate_module_id(&module.id));
            if !seen_modules.insert(&module.id) {
                errs.at(&mp.dot("id"), Err(ConfigError::DuplicateModule(module.id.to_string())));
            }
            errs.at(&mp.dot("source"), check_moved_module(&module.source));
            for (ui, used) in module.uses.iter().enumerate() {
                errs.at(
                    &mp.dot("use").at(ui),
                    validate_module_reference(bp, &module.id, used),
                );
            }
        }

        match group.kind() {
            None => {
                errs.at(&gp.dot("modules"), Err(ConfigError::MixedKinds));
            }
            Some(ModuleKind::Packer) if group.modules.len() != 1 => {
                errs.at(
                    &gp.dot("modules"),
                    Err(ConfigError::PackerGroupSize(group.group.to_string())),
                );
            }
            Some(_) => {}
        }
    }

    errs.into_result()
}
