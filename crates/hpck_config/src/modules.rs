//! Module metadata and module-source resolution.
//!
//! Expansion needs to know each module's inputs and outputs. A
//! [`ModuleResolver`] maps a module source to that metadata; the
//! [`ModuleCatalog`] is an in-memory resolver that can be filled in code or
//! loaded from a directory tree of `module.yaml` files.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::blueprint::ModuleKind;
use crate::error::{ConfigError, ConfigResult};
use crate::hint::hint_spelling;
use crate::value::Value;

/// Metadata file name looked up by [`ModuleCatalog::load_dir`].
pub const MODULE_METADATA_FILE: &str = "module.yaml";

/// A module input variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VarInfo {
    pub name: String,
    #[serde(rename = "type", default)]
    pub var_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

impl VarInfo {
    pub fn new(name: impl Into<String>, var_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            var_type: var_type.into(),
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// True for list-like input types, whose `use` values are merged.
    pub fn is_list(&self) -> bool {
        let t = self.var_type.trim();
        ["list", "set", "tuple"].iter().any(|p| t.starts_with(p))
    }
}

/// A module output.
///
/// Written either as a bare name or as a mapping with `name`,
/// `description` and `sensitive`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "OutputRepr", into = "OutputRepr")]
pub struct OutputInfo {
    pub name: String,
    pub description: String,
    pub sensitive: bool,
}

impl OutputInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OutputRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        description: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        sensitive: bool,
    },
}

impl From<OutputRepr> for OutputInfo {
    fn from(repr: OutputRepr) -> Self {
        match repr {
            OutputRepr::Name(name) => OutputInfo::new(name),
            OutputRepr::Full {
                name,
                description,
                sensitive,
            } => OutputInfo {
                name,
                description,
                sensitive,
            },
        }
    }
}

impl From<OutputInfo> for OutputRepr {
    fn from(info: OutputInfo) -> Self {
        if info.description.is_empty() && !info.sensitive {
            OutputRepr::Name(info.name)
        } else {
            OutputRepr::Full {
                name: info.name,
                description: info.description,
                sensitive: info.sensitive,
            }
        }
    }
}

/// Inputs and outputs of a module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    #[serde(default)]
    pub inputs: Vec<VarInfo>,
    #[serde(default)]
    pub outputs: Vec<OutputInfo>,
}

impl ModuleInfo {
    pub fn with_input(mut self, input: VarInfo) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(OutputInfo::new(name));
        self
    }

    pub fn input(&self, name: &str) -> Option<&VarInfo> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputInfo> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|o| o.name.as_str()).collect()
    }
}

/// Resolves a module source to its metadata.
///
/// Failures are fatal to expansion.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleResolver {
    fn module_info(&self, source: &str, kind: ModuleKind) -> ConfigResult<ModuleInfo>;
}

/// Strip leading and trailing `.` and `/` from a module source.
pub fn normalize_source(source: &str) -> &str {
    source.trim_matches(|c| c == '.' || c == '/')
}

/// In-memory module resolver keyed by normalized source.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: IndexMap<String, ModuleInfo>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, source: &str, info: ModuleInfo) -> Self {
        self.insert(source, info);
        self
    }

    pub fn insert(&mut self, source: &str, info: ModuleInfo) {
        self.modules.insert(normalize_source(source).to_string(), info);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Load every `module.yaml` below `root`.
    ///
    /// A module's source is the path of its directory relative to `root`,
    /// with `/` separators.
    pub fn load_dir(root: impl AsRef<Path>) -> ConfigResult<Self> {
        let root = root.as_ref();
        let mut catalog = Self::new();

        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() || path.file_name().map_or(true, |n| n != MODULE_METADATA_FILE) {
                continue;
            }
            let Some(dir) = path.parent().and_then(|p| p.strip_prefix(root).ok()) else {
                continue;
            };
            let source = dir
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            debug!("Loading module metadata from {:?}", path);
            let content = fs::read_to_string(path).map_err(|e| ConfigError::ModuleSource {
                path: source.clone(),
                message: e.to_string(),
            })?;
            let info: ModuleInfo =
                serde_yaml::from_str(&content).map_err(|e| ConfigError::ModuleSource {
                    path: source.clone(),
                    message: e.to_string(),
                })?;
            catalog.insert(&source, info);
        }

        info!("Loaded {} module(s) from {:?}", catalog.len(), root);
        Ok(catalog)
    }
}

impl ModuleResolver for ModuleCatalog {
    fn module_info(&self, source: &str, kind: ModuleKind) -> ConfigResult<ModuleInfo> {
        let key = normalize_source(source);
        debug!(source = key, kind = %kind, "Resolving module");
        self.modules.get(key).cloned().ok_or_else(|| {
            hint_spelling(
                key,
                self.modules.keys(),
                ConfigError::ModuleSource {
                    path: source.to_string(),
                    message: "no such module".to_string(),
                },
            )
        })
    }
}
