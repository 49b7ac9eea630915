//! Error types for blueprint configuration.

use std::fmt;

use thiserror::Error;

use crate::path::BpPath;

/// Accepted reference formats, quoted in malformed-reference errors.
pub const EXPECTED_VAR_FORMAT: &str = "$(vars.var_name) or $(module_id.output_name)";

/// Result type alias for leaf configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for operations reporting located, aggregated errors.
pub type BpResult<T> = Result<T, Errors>;

/// Coarse classification of every configuration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed name or format.
    Shape,
    /// Name or ID collision.
    Duplicate,
    /// Variable dependency cycle.
    Cycle,
    /// Unresolvable or malformed reference.
    Reference(ReferenceKind),
    /// Value has the wrong dynamic type.
    Type,
    /// The module-source resolver failed.
    ModuleSource,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    NotFound,
    WrongScope,
    MovedModule,
    Malformed,
}

/// Errors that can occur while loading, validating or expanding a blueprint.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{input_key} input error, cause: {cause}")]
    InputValue { input_key: String, cause: String },

    #[error("deployment group name cannot be empty")]
    EmptyGroupName,

    #[error("invalid character(s) found in group name {0:?}. Allowed : alphanumeric, '_', and '-'; can not start/end with '-'")]
    InvalidGroupName(String),

    #[error("invalid module ID {0:?}: must start with a letter or '_' and contain only alphanumerics, '_' and '-'")]
    InvalidModuleId(String),

    #[error("module ID {0:?} is reserved")]
    ReservedModuleId(String),

    #[error("deployment group must have at least one module")]
    EmptyGroup,

    #[error("mixing modules of differing kinds in a deployment group is not supported")]
    MixedKinds,

    #[error("packer group {0:?} has more than 1 module")]
    PackerGroupSize(String),

    #[error("group names must be unique, {0:?} used more than once")]
    DuplicateGroup(String),

    #[error("module IDs must be unique, {0:?} used more than once")]
    DuplicateModule(String),

    #[error("cyclic dependency detected: {from:?} -> {to:?}")]
    CyclicDependency { from: String, to: String },

    #[error("non-global variable {0:?} referenced in expression")]
    NonGlobalReference(String),

    #[error("invalid reference {token:?}: {message}, expected {}", EXPECTED_VAR_FORMAT)]
    InvalidReference { token: String, message: String },

    #[error("unknown global variable {0:?}")]
    UnknownVariable(String),

    #[error("module {0:?} was not found")]
    UnknownModule(String),

    #[error("module {module:?} has no output {output:?}")]
    UnknownOutput { module: String, output: String },

    #[error("module {module:?} is not in group {group:?}")]
    WrongGroup { module: String, group: String },

    #[error("module {target:?} is in a later group than {from:?}, only modules in the same or earlier groups can be referenced")]
    LaterGroup { from: String, target: String },

    #[error("module {0:?} is a packer module and can not be used or referenced")]
    PackerReference(String),

    #[error("module {0:?} can not reference itself")]
    SelfReference(String),

    #[error("setting {setting:?} is not an input of module {module:?}")]
    UnknownSetting { module: String, setting: String },

    #[error("module {module:?} is missing required setting {setting:?}")]
    MissingSetting { module: String, setting: String },

    #[error("a module has moved. {module_source} has been replaced with {replacement}. Please update the source in your blueprint and try again")]
    MovedModule {
        module_source: String,
        replacement: String,
    },

    #[error("can not use expression as a terraform_backend type")]
    BackendTypeExpression,

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    #[error("call to {function}: {message}")]
    FunctionCall { function: String, message: String },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("invalid index {index} into {target}")]
    InvalidIndex { index: String, target: String },

    #[error("object has no attribute {0:?}")]
    UnknownAttribute(String),

    #[error("module source {path:?} could not be resolved: {message}")]
    ModuleSource { path: String, message: String },

    #[error("{error}")]
    Hint {
        hint: String,
        error: Box<ConfigError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        Self::Hint {
            hint: hint.into(),
            error: Box::new(self),
        }
    }

    /// The hint attached to this error, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Hint { hint, .. } => Some(hint),
            _ => None,
        }
    }

    /// The error with any hint wrapper removed.
    pub fn inner(&self) -> &ConfigError {
        match self {
            Self::Hint { error, .. } => error.inner(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        use ReferenceKind::*;
        match self {
            Self::InputValue { .. }
            | Self::EmptyGroupName
            | Self::InvalidGroupName(_)
            | Self::InvalidModuleId(_)
            | Self::ReservedModuleId(_)
            | Self::EmptyGroup
            | Self::MixedKinds
            | Self::PackerGroupSize(_)
            | Self::MissingSetting { .. }
            | Self::BackendTypeExpression => ErrorKind::Shape,
            Self::DuplicateGroup(_) | Self::DuplicateModule(_) => ErrorKind::Duplicate,
            Self::CyclicDependency { .. } => ErrorKind::Cycle,
            Self::InvalidReference { .. } => ErrorKind::Reference(Malformed),
            Self::UnknownVariable(_)
            | Self::UnknownModule(_)
            | Self::UnknownOutput { .. }
            | Self::UnknownSetting { .. }
            | Self::UnknownFunction(_)
            | Self::UnknownAttribute(_) => ErrorKind::Reference(NotFound),
            Self::NonGlobalReference(_)
            | Self::WrongGroup { .. }
            | Self::LaterGroup { .. }
            | Self::PackerReference(_)
            | Self::SelfReference(_) => ErrorKind::Reference(WrongScope),
            Self::MovedModule { .. } => ErrorKind::Reference(MovedModule),
            Self::FunctionCall { .. } | Self::TypeMismatch { .. } | Self::InvalidIndex { .. } => {
                ErrorKind::Type
            }
            Self::ModuleSource { .. } => ErrorKind::ModuleSource,
            Self::Hint { error, .. } => error.kind(),
            Self::Io(_) | Self::Yaml(_) => ErrorKind::Io,
        }
    }
}

/// An error located at a path within the blueprint.
#[derive(Debug)]
pub struct BpError {
    pub path: BpPath,
    pub error: ConfigError,
}

impl BpError {
    pub fn new(path: BpPath, error: ConfigError) -> Self {
        Self { path, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn hint(&self) -> Option<&str> {
        self.error.hint()
    }
}

impl fmt::Display for BpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}", self.error)?;
        } else {
            write!(f, "{}: {}", self.path, self.error)?;
        }
        if let Some(hint) = self.error.hint() {
            write!(f, "\nHint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for BpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A collection of located errors, reported together.
#[derive(Debug, Default)]
pub struct Errors {
    errors: Vec<BpError>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `result` at `path` if it is an error.
    pub fn at(&mut self, path: &BpPath, result: ConfigResult<()>) -> &mut Self {
        if let Err(error) = result {
            self.errors.push(BpError::new(path.clone(), error));
        }
        self
    }

    pub fn push(&mut self, error: BpError) -> &mut Self {
        self.errors.push(error);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BpError> {
        self.errors.iter()
    }

    pub fn first(&self) -> Option<&BpError> {
        self.errors.first()
    }

    pub fn into_result(self) -> BpResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "{}", self.errors[0]),
            n => {
                write!(f, "{} errors:", n)?;
                for e in &self.errors {
                    write!(f, "\n- {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Errors {}

impl From<BpError> for Errors {
    fn from(error: BpError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl IntoIterator for Errors {
    type Item = BpError;
    type IntoIter = std::vec::IntoIter<BpError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a BpError;
    type IntoIter = std::slice::Iter<'a, BpError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_aggregate() {
        let mut errs = Errors::new();
        errs.at(&BpPath::group(0), Ok(()));
        errs.at(&BpPath::group(1), Err(ConfigError::EmptyGroup));
        errs.at(&BpPath::group(2), Err(ConfigError::MixedKinds));

        assert_eq!(errs.len(), 2);
        let err = errs.into_result().unwrap_err();
        assert!(err.to_string().contains("deployment_groups[1]"));
        assert!(err.to_string().contains("2 errors"));
    }

    #[test]
    fn test_hint_is_transparent_for_kind() {
        let err = ConfigError::UnknownModule("netwrk".into()).with_hint("did you mean \"network\"?");
        assert_eq!(err.kind(), ErrorKind::Reference(ReferenceKind::NotFound));
        assert_eq!(err.hint(), Some("did you mean \"network\"?"));
        assert!(matches!(err.inner(), ConfigError::UnknownModule(_)));
        assert_eq!(err.to_string(), "module \"netwrk\" was not found");
    }

    #[test]
    fn test_located_display_includes_hint() {
        let err = BpError::new(
            BpPath::module(0, 0).dot("use").at(0),
            ConfigError::UnknownModule("netwrk".into()).with_hint("did you mean \"network\"?"),
        );
        let text = err.to_string();
        assert!(text.starts_with("deployment_groups[0].modules[0].use[0]: module"));
        assert!(text.ends_with("Hint: did you mean \"network\"?"));
    }
}
