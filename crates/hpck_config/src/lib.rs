//! # hpck_config
//!
//! Blueprint model, expression evaluation and expansion for hpck.
//!
//! A blueprint describes an HPC deployment as ordered deployment groups of
//! modules. Expansion turns a user-authored blueprint into a fully resolved
//! one: variables are evaluated, `use` relations become explicit settings and
//! every reference is checked.
//!
//! ## Features
//!
//! - **Blueprint model**: groups, modules, validators and backends with YAML I/O
//! - **Expressions**: `$(...)` templates with references, operators and functions
//! - **Expansion**: staged pipeline that stops at the first failing stage
//! - **Diagnostics**: every error carries its blueprint path and, where a
//!   near miss exists, a spelling hint
//!
//! ## Example
//!
//! ```rust,ignore
//! use hpck_config::{BlueprintReader, BlueprintWriter, ModuleCatalog};
//!
//! let catalog = ModuleCatalog::load_dir("./modules")?;
//! let mut bp = BlueprintReader::read_blueprint("hpc-cluster.yaml")?;
//!
//! if let Err(errors) = bp.expand(&catalog) {
//!     for error in &errors {
//!         eprintln!("{}", error);
//!     }
//! }
//!
//! BlueprintWriter::write_blueprint(&bp, "deployment/.hpck/expanded_blueprint.yaml")?;
//! ```

pub mod blueprint;
pub mod error;
pub mod eval;
pub mod expand;
pub mod expression;
pub mod functions;
pub mod hint;
pub mod modules;
pub mod path;
pub mod reader;
pub mod reference;
pub mod settings;
pub mod usemark;
pub mod validate;
pub mod value;
pub mod vars;
pub mod writer;

pub use blueprint::{
    Blueprint, DeploymentGroup, GroupName, Module, ModuleId, ModuleKind, TerraformBackend,
    ValidationLevel, Validator,
};
pub use error::{
    BpError, BpResult, ConfigError, ConfigResult, ErrorKind, Errors, ReferenceKind,
    EXPECTED_VAR_FORMAT,
};
pub use eval::{settle, EvalContext};
pub use expand::{Expander, ExpansionStage};
pub use expression::{has_expression, parse_expression, parse_template, Expr, Segment};
pub use functions::FunctionTable;
pub use modules::{ModuleCatalog, ModuleInfo, ModuleResolver, OutputInfo, VarInfo};
pub use path::BpPath;
pub use reader::BlueprintReader;
pub use reference::{Reference, Scope};
pub use settings::{
    merge_deployment_settings, set_backend_config, set_cli_variables, DeploymentSettings,
};
pub use usemark::{mark, unmark, UseMark};
pub use validate::{check_modules_and_groups, is_valid_group_name, is_valid_label_value};
pub use value::{Dict, Value};
pub use vars::{eval_vars, vars_topological_order};
pub use writer::BlueprintWriter;
