//! Blueprint data model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{BpError, BpResult, ConfigError, ConfigResult};
use crate::hint::hint_spelling;
use crate::modules::OutputInfo;
use crate::path::BpPath;
use crate::reference::global_references;
use crate::validate::is_valid_label_value;
use crate::value::{Dict, Value};

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }
    };
}

name_type!(
    /// Module identifier, unique across the whole blueprint.
    ModuleId
);
name_type!(
    /// Deployment group name.
    GroupName
);

/// Kind of a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    #[default]
    #[serde(rename = "")]
    Unset,
    Terraform,
    Packer,
}

impl ModuleKind {
    pub fn is_unset(&self) -> bool {
        matches!(self, ModuleKind::Unset)
    }

    /// The kind used during expansion; unset modules are terraform modules.
    pub fn effective(self) -> ModuleKind {
        match self {
            ModuleKind::Unset => ModuleKind::Terraform,
            k => k,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Unset => f.write_str(""),
            ModuleKind::Terraform => f.write_str("terraform"),
            ModuleKind::Packer => f.write_str("packer"),
        }
    }
}

/// How strictly validator failures are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ValidationLevel {
    #[default]
    Error,
    Warning,
    Ignore,
}

impl ValidationLevel {
    pub fn is_default(&self) -> bool {
        *self == ValidationLevel::Error
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Error => "ERROR",
            ValidationLevel::Warning => "WARNING",
            ValidationLevel::Ignore => "IGNORE",
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ERROR" => Ok(ValidationLevel::Error),
            "WARNING" => Ok(ValidationLevel::Warning),
            "IGNORE" => Ok(ValidationLevel::Ignore),
            other => Err(ConfigError::InputValue {
                input_key: "validation_level".to_string(),
                cause: format!("invalid validation level {:?} (\"ERROR\", \"WARNING\", \"IGNORE\")", other),
            }),
        }
    }
}

impl Serialize for ValidationLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ValidationLevel {
    /// Unrecognised levels fall back to `ERROR`.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        Ok(match raw {
            serde_yaml::Value::String(s) => s.parse().unwrap_or_default(),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(1) => ValidationLevel::Warning,
                Some(2) => ValidationLevel::Ignore,
                _ => ValidationLevel::Error,
            },
            _ => ValidationLevel::Error,
        })
    }
}

/// A validator declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    pub validator: String,
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub inputs: Dict,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,
}

impl Validator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            validator: name.into(),
            ..Default::default()
        }
    }
}

/// Terraform state backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerraformBackend {
    #[serde(rename = "type", default)]
    pub backend_type: String,
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub configuration: Dict,
}

impl TerraformBackend {
    pub fn is_empty(&self) -> bool {
        self.backend_type.is_empty() && self.configuration.is_empty()
    }
}

/// A module instance within a deployment group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub source: String,
    #[serde(default, skip_serializing_if = "ModuleKind::is_unset")]
    pub kind: ModuleKind,
    pub id: ModuleId,
    #[serde(rename = "use", default, skip_serializing_if = "Vec::is_empty")]
    pub uses: Vec<ModuleId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputInfo>,
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub settings: Dict,
}

impl Module {
    pub fn new(id: impl Into<ModuleId>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            ..Default::default()
        }
    }
}

/// An ordered group of modules deployed together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentGroup {
    pub group: GroupName,
    #[serde(default, skip_serializing_if = "TerraformBackend::is_empty")]
    pub terraform_backend: TerraformBackend,
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl DeploymentGroup {
    pub fn new(name: impl Into<GroupName>) -> Self {
        Self {
            group: name.into(),
            ..Default::default()
        }
    }

    /// Common kind of all modules; `None` if the group is empty or mixed.
    pub fn kind(&self) -> Option<ModuleKind> {
        let first = self.modules.first()?.kind.effective();
        self.modules
            .iter()
            .all(|m| m.kind.effective() == first)
            .then_some(first)
    }
}

/// A deployment blueprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub blueprint_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub toolkit_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    #[serde(default, skip_serializing_if = "ValidationLevel::is_default")]
    pub validation_level: ValidationLevel,
    #[serde(default)]
    pub vars: Dict,
    #[serde(default)]
    pub deployment_groups: Vec<DeploymentGroup>,
    #[serde(default, skip_serializing_if = "TerraformBackend::is_empty")]
    pub terraform_backend_defaults: TerraformBackend,
}

impl Blueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            blueprint_name: name.into(),
            ..Default::default()
        }
    }

    /// Group and module index of a module, by ID.
    pub fn module_location(&self, id: &ModuleId) -> Option<(usize, usize)> {
        self.deployment_groups.iter().enumerate().find_map(|(gi, g)| {
            g.modules
                .iter()
                .position(|m| &m.id == id)
                .map(|mi| (gi, mi))
        })
    }

    pub fn module(&self, id: &ModuleId) -> ConfigResult<&Module> {
        match self.module_location(id) {
            Some((gi, mi)) => Ok(&self.deployment_groups[gi].modules[mi]),
            None => Err(self.unknown_module(id)),
        }
    }

    pub fn module_mut(&mut self, id: &ModuleId) -> ConfigResult<&mut Module> {
        match self.module_location(id) {
            Some((gi, mi)) => Ok(&mut self.deployment_groups[gi].modules[mi]),
            None => Err(self.unknown_module(id)),
        }
    }

    /// The group containing the module.
    pub fn module_group(&self, id: &ModuleId) -> ConfigResult<&DeploymentGroup> {
        match self.module_location(id) {
            Some((gi, _)) => Ok(&self.deployment_groups[gi]),
            None => Err(self.unknown_module(id)),
        }
    }

    pub fn module_ids(&self) -> Vec<ModuleId> {
        let mut ids = Vec::new();
        self.walk_modules(|_, m| ids.push(m.id.clone()));
        ids
    }

    /// Visit every module in group-then-module order.
    pub fn walk_modules<F>(&self, mut f: F)
    where
        F: FnMut(BpPath, &Module),
    {
        for (gi, g) in self.deployment_groups.iter().enumerate() {
            for (mi, m) in g.modules.iter().enumerate() {
                f(BpPath::module(gi, mi), m);
            }
        }
    }

    /// Flag validators with the given name as skipped, adding a skipped
    /// entry when none is declared.
    pub fn skip_validator(&mut self, name: &str) {
        let mut skipped = false;
        for v in self.validators.iter_mut().filter(|v| v.validator == name) {
            v.skip = true;
            skipped = true;
        }
        if !skipped {
            self.validators.push(Validator {
                validator: name.to_string(),
                skip: true,
                ..Default::default()
            });
        }
    }

    /// The `deployment_name` variable, which names the deployment directory.
    pub fn deployment_name(&self) -> BpResult<String> {
        let name = self.string_var("deployment_name")?;
        if name.is_empty() {
            return Err(Self::var_error("deployment_name", "value is an empty string"));
        }
        if !is_valid_label_value(&name) {
            return Err(Self::var_error(
                "deployment_name",
                "value can only contain lowercase letters, numbers, '_' and '-', must start with a lowercase letter and be at most 63 characters long",
            ));
        }
        Ok(name)
    }

    /// The `project_id` variable.
    pub fn project_id(&self) -> BpResult<String> {
        self.string_var("project_id")
    }

    /// Names of vars never referenced by vars, module settings or validator
    /// inputs. `labels` and `deployment_name` always count as used.
    pub fn list_unused_variables(&self) -> Vec<String> {
        let mut used: Vec<String> = vec!["labels".to_string(), "deployment_name".to_string()];
        let values = self
            .vars
            .values()
            .chain(self.deployment_groups.iter().flat_map(|g| {
                g.modules.iter().flat_map(|m| m.settings.values())
            }))
            .chain(self.validators.iter().flat_map(|v| v.inputs.values()));
        for value in values {
            used.extend(global_references(value));
        }

        self.vars
            .keys()
            .filter(|k| !used.contains(k))
            .cloned()
            .collect()
    }

    fn string_var(&self, name: &str) -> BpResult<String> {
        match self.vars.get(name).map(Value::unmarked) {
            None => Err(Self::var_error(name, "could not find source of variable")),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(Self::var_error(name, "value was not of type string")),
        }
    }

    fn var_error(name: &str, cause: &str) -> crate::error::Errors {
        BpError::new(
            BpPath::var(name),
            ConfigError::InputValue {
                input_key: name.to_string(),
                cause: cause.to_string(),
            },
        )
        .into()
    }

    fn unknown_module(&self, id: &ModuleId) -> ConfigError {
        hint_spelling(
            id.as_str(),
            &self.module_ids(),
            ConfigError::UnknownModule(id.to_string()),
        )
    }
}
