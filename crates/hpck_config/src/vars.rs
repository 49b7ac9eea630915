//! Global variable ordering and evaluation.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{BpError, BpResult, ConfigError};
use crate::eval::EvalContext;
use crate::functions::FunctionTable;
use crate::hint::hint_spelling;
use crate::path::BpPath;
use crate::reference::value_references;
use crate::value::Dict;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnStack,
    Done,
}

/// Order global variables so that each comes after the variables it references.
///
/// Variables are visited depth first in declared order; each appears exactly
/// once. References to module outputs, undeclared variables and cycles are
/// errors located at the referencing variable.
pub fn vars_topological_order(vars: &Dict) -> BpResult<Vec<String>> {
    let mut state: HashMap<&str, Visit> = HashMap::new();
    let mut order = Vec::with_capacity(vars.len());
    for name in vars.keys() {
        if !state.contains_key(name.as_str()) {
            visit(vars, name, &mut state, &mut order)?;
        }
    }
    Ok(order)
}

fn visit<'a>(
    vars: &'a Dict,
    name: &'a str,
    state: &mut HashMap<&'a str, Visit>,
    order: &mut Vec<String>,
) -> Result<(), BpError> {
    state.insert(name, Visit::OnStack);
    let base = BpPath::var(name);
    let value = match vars.get(name) {
        Some(v) => v,
        None => return Err(BpError::new(base, ConfigError::UnknownVariable(name.to_string()))),
    };
    let refs = value_references(value).map_err(|e| BpError::new(base.join(&e.path), e.error))?;

    for (reference, rel) in refs {
        let path = base.join(&rel);
        if !reference.is_global() {
            return Err(BpError::new(
                path,
                ConfigError::NonGlobalReference(reference.to_string()),
            ));
        }
        let Some((dep, _)) = vars.get_key_value(reference.name.as_str()) else {
            return Err(BpError::new(
                path,
                hint_spelling(
                    &reference.name,
                    vars.keys(),
                    ConfigError::UnknownVariable(reference.name.clone()),
                ),
            ));
        };
        match state.get(dep.as_str()) {
            Some(Visit::OnStack) => {
                return Err(BpError::new(
                    path,
                    ConfigError::CyclicDependency {
                        from: name.to_string(),
                        to: dep.clone(),
                    },
                ))
            }
            Some(Visit::Done) => {}
            None => visit(vars, dep, state, order)?,
        }
    }

    state.insert(name, Visit::Done);
    order.push(name.to_string());
    Ok(())
}

/// Evaluate global variables in dependency order.
///
/// The result keeps the declared key order.
pub fn eval_vars(vars: &Dict, functions: &FunctionTable) -> BpResult<Dict> {
    let order = vars_topological_order(vars)?;
    debug!(?order, "Evaluating global variables");

    let mut evaluated = Dict::with_capacity(vars.len());
    for name in order {
        let ctx = EvalContext::new(functions).with_vars(evaluated.clone());
        let value = ctx
            .eval(&vars[name.as_str()])
            .map_err(|e| BpError::new(BpPath::var(&name), e))?;
        evaluated.insert(name, value);
    }

    Ok(vars
        .keys()
        .filter_map(|k| evaluated.shift_remove_entry(k.as_str()))
        .collect())
}
