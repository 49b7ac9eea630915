//! References from expressions to global variables and module outputs.

use std::fmt;

use crate::blueprint::{GroupName, ModuleId};
use crate::error::{BpError, ConfigError, ConfigResult};
use crate::expression::{parse_template, Segment};
use crate::path::BpPath;
use crate::value::Value;

/// Where a reference points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// `vars.NAME`
    Global,
    /// `MODULE.OUTPUT` or `GROUP.MODULE.OUTPUT`
    Module {
        group: Option<GroupName>,
        module: ModuleId,
    },
}

/// A resolved reference: a scope plus the variable or output name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub scope: Scope,
    pub name: String,
}

impl Reference {
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            scope: Scope::Global,
            name: name.into(),
        }
    }

    pub fn module(module: impl Into<ModuleId>, name: impl Into<String>) -> Self {
        Self {
            scope: Scope::Module {
                group: None,
                module: module.into(),
            },
            name: name.into(),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self.scope, Scope::Global)
    }

    /// Build a reference from a dotted name.
    ///
    /// Returns the reference and the number of leading parts it consumed; any
    /// remaining parts are attribute accesses on the referenced value.
    pub fn from_traversal(parts: &[String]) -> ConfigResult<(Reference, usize)> {
        let token = || format!("$({})", parts.join("."));
        match parts {
            [] => Err(ConfigError::InvalidReference {
                token: token(),
                message: "empty reference".to_string(),
            }),
            [only] if only == "vars" => Err(ConfigError::InvalidReference {
                token: token(),
                message: "missing variable name".to_string(),
            }),
            [only] => Err(ConfigError::InvalidReference {
                token: token(),
                message: format!("{:?} is neither a variable nor a module output", only),
            }),
            [root, name, ..] if root == "vars" => Ok((Reference::global(name.as_str()), 2)),
            [module, output] => Ok((Reference::module(module.as_str(), output.as_str()), 2)),
            [group, module, output, ..] => Ok((
                Reference {
                    scope: Scope::Module {
                        group: Some(GroupName::from(group.as_str())),
                        module: ModuleId::from(module.as_str()),
                    },
                    name: output.clone(),
                },
                3,
            )),
        }
    }

    /// The reference as a standalone expression, e.g. `$(vars.region)`.
    pub fn to_expression(&self) -> String {
        format!("$({})", self)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Global => write!(f, "vars.{}", self.name),
            Scope::Module {
                group: Some(group),
                module,
            } => write!(f, "{}.{}.{}", group, module, self.name),
            Scope::Module { group: None, module } => write!(f, "{}.{}", module, self.name),
        }
    }
}

/// References in every string of `value`, with paths relative to `value`.
///
/// The first malformed token aborts the scan; the returned error carries the
/// relative path of the string that contained it.
pub fn value_references(value: &Value) -> Result<Vec<(Reference, BpPath)>, BpError> {
    let mut refs = Vec::new();
    let mut failure = None;
    value.walk(&mut |path, v| {
        if failure.is_some() {
            return;
        }
        let Value::String(s) = v else {
            return;
        };
        match string_references(s) {
            Ok(found) => refs.extend(found.into_iter().map(|r| (r, path.clone()))),
            Err(e) => failure = Some(BpError::new(path.clone(), e)),
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(refs),
    }
}

/// References in a single string, in source order.
pub fn string_references(s: &str) -> ConfigResult<Vec<Reference>> {
    let mut refs = Vec::new();
    for segment in parse_template(s)? {
        if let Segment::Expression { expr, .. } = segment {
            for parts in expr.traversals() {
                refs.push(Reference::from_traversal(parts)?.0);
            }
        }
    }
    Ok(refs)
}

/// Names of global variables referenced anywhere in `value`.
///
/// Malformed tokens are skipped.
pub fn global_references(value: &Value) -> Vec<String> {
    let mut names = Vec::new();
    value.walk(&mut |_, v| {
        if let Value::String(s) = v {
            if let Ok(refs) = string_references(s) {
                names.extend(refs.into_iter().filter(Reference::is_global).map(|r| r.name));
            }
        }
    });
    names
}
