//! # hpck_policy
//!
//! Blueprint validators and validation-level gating for hpck.
//!
//! This crate provides:
//! - **Built-in validators**: `test_module_not_used` and
//!   `test_deployment_variable_not_used`, added by default
//! - **Validator runner**: honours `skip` flags and reports unknown
//!   validators with a spelling hint
//! - **Validation gate**: `ERROR` fails, `WARNING` reports and continues,
//!   `IGNORE` suppresses
//!
//! ## Example
//!
//! ```rust,ignore
//! use hpck_policy::{apply_validation_level, ValidationContext, ValidatorRunner};
//!
//! let source = bp.clone();
//! bp.expand(&catalog)?;
//!
//! let report = ValidatorRunner::default().execute(&ValidationContext::new(&source, &bp));
//! apply_validation_level(bp.validation_level, &report)?;
//! ```

pub mod error;
pub mod gate;
pub mod validators;

pub use error::{PolicyError, PolicyResult};
pub use gate::{
    apply_validation_level, parse_validation_level, GateDetail, GateOutcome, GateResult,
    ValidationReport,
};
pub use validators::{
    validators_to_run, ValidationContext, ValidatorFn, ValidatorRegistry, ValidatorRunner,
    DEFAULT_VALIDATORS, TEST_DEPLOYMENT_VARIABLE_NOT_USED, TEST_MODULE_NOT_USED,
};
