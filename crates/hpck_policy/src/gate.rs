//! Validator results and validation-level gating.

use hpck_config::ValidationLevel;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{PolicyError, PolicyResult};

/// Result of running one validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub validator: String,
    pub passed: bool,
    pub details: Vec<GateDetail>,
    pub recommendations: Vec<String>,
}

impl GateResult {
    pub fn pass(validator: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            passed: true,
            details: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn fail(validator: impl Into<String>) -> Self {
        Self {
            passed: false,
            ..Self::pass(validator)
        }
    }

    /// Add a detail; a failed detail fails the whole result.
    pub fn with_detail(mut self, detail: GateDetail) -> Self {
        if !detail.passed {
            self.passed = false;
        }
        self.details.push(detail);
        self
    }

    pub fn with_recommendation(mut self, rec: impl Into<String>) -> Self {
        self.recommendations.push(rec.into());
        self
    }

    /// Details that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &GateDetail> {
        self.details.iter().filter(|d| !d.passed)
    }
}

/// Detail about a single finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDetail {
    pub check: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl GateDetail {
    pub fn passed(check: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            passed: true,
            message: None,
        }
    }

    pub fn failed(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// Results of every validator run against a blueprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub results: Vec<GateResult>,
}

impl ValidationReport {
    pub fn add_result(&mut self, result: GateResult) {
        self.results.push(result);
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failed(&self) -> Vec<&GateResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }

    /// Human-readable summary of the failed validators.
    pub fn report(&self) -> String {
        let mut report = String::new();
        for result in self.failed() {
            report.push_str(&format!("validator {:?} failed:\n", result.validator));
            for detail in result.failures() {
                report.push_str(&format!(
                    "  - {}: {}\n",
                    detail.check,
                    detail.message.as_deref().unwrap_or("check failed")
                ));
            }
            for rec in &result.recommendations {
                report.push_str(&format!("    {}\n", rec));
            }
        }
        report.push_str(&format!(
            "{}/{} validators passed",
            self.results.len() - self.failed().len(),
            self.results.len()
        ));
        report
    }
}

/// Parse a command-line validation level.
pub fn parse_validation_level(s: &str) -> PolicyResult<ValidationLevel> {
    s.parse().map_err(|_| {
        PolicyError::InvalidValidationLevel(format!(
            "{:?}, expected one of (\"ERROR\", \"WARNING\", \"IGNORE\")",
            s
        ))
    })
}

/// What the gate decided for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Passed,
    /// Failures were reported and creation continues.
    Warned,
    /// Failures were not reported.
    Suppressed,
}

/// Apply a validation level to a report.
///
/// `ERROR` turns any failure into an error, `WARNING` logs failures and
/// continues, `IGNORE` drops them.
pub fn apply_validation_level(
    level: ValidationLevel,
    report: &ValidationReport,
) -> PolicyResult<GateOutcome> {
    if report.passed() {
        debug!("All {} validator(s) passed", report.results.len());
        return Ok(GateOutcome::Passed);
    }

    match level {
        ValidationLevel::Ignore => {
            debug!(
                "Ignoring {} failed validator(s) at validation level {}",
                report.failed().len(),
                level
            );
            Ok(GateOutcome::Suppressed)
        }
        ValidationLevel::Warning => {
            warn!("One or more blueprint validators has failed:\n{}", report.report());
            warn!("Validation failures were treated as a warning, continuing to create blueprint.");
            Ok(GateOutcome::Warned)
        }
        ValidationLevel::Error => {
            error!("One or more blueprint validators has failed:\n{}", report.report());
            Err(PolicyError::ValidationFailed {
                failed: report
                    .failed()
                    .into_iter()
                    .map(|r| r.validator.clone())
                    .collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_report() -> ValidationReport {
        let mut report = ValidationReport::default();
        report.add_result(GateResult::pass("test_deployment_variable_not_used"));
        report.add_result(
            GateResult::pass("test_module_not_used")
                .with_detail(GateDetail::failed("workstation", "uses homefs without using it"))
                .with_recommendation("remove \"homefs\" from the use list of \"workstation\""),
        );
        report
    }

    #[test]
    fn test_failed_detail_fails_result() {
        let result = GateResult::pass("v").with_detail(GateDetail::passed("ok"));
        assert!(result.passed);
        let result = result.with_detail(GateDetail::failed("bad", "broken"));
        assert!(!result.passed);
        assert_eq!(result.failures().count(), 1);
    }

    #[test]
    fn test_report_lists_failures() {
        let report = failing_report();
        let text = report.report();
        assert!(text.contains("validator \"test_module_not_used\" failed"));
        assert!(text.contains("workstation: uses homefs without using it"));
        assert!(text.ends_with("1/2 validators passed"));
    }

    #[test]
    fn test_error_level_is_fatal() {
        let err = apply_validation_level(ValidationLevel::Error, &failing_report()).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::ValidationFailed { ref failed } if failed == &vec!["test_module_not_used".to_string()]
        ));
    }

    #[test]
    fn test_warning_and_ignore_continue() {
        let report = failing_report();
        assert_eq!(
            apply_validation_level(ValidationLevel::Warning, &report).unwrap(),
            GateOutcome::Warned
        );
        assert_eq!(
            apply_validation_level(ValidationLevel::Ignore, &report).unwrap(),
            GateOutcome::Suppressed
        );
    }

    #[test]
    fn test_passing_report_passes_at_every_level() {
        let mut report = ValidationReport::default();
        report.add_result(GateResult::pass("test_module_not_used"));
        for level in [ValidationLevel::Error, ValidationLevel::Warning, ValidationLevel::Ignore] {
            assert_eq!(apply_validation_level(level, &report).unwrap(), GateOutcome::Passed);
        }
    }

    #[test]
    fn test_parse_validation_level() {
        assert_eq!(parse_validation_level("WARNING").unwrap(), ValidationLevel::Warning);
        assert_eq!(parse_validation_level("IGNORE").unwrap(), ValidationLevel::Ignore);
        let err = parse_validation_level("warn").unwrap_err();
        assert!(err.to_string().contains("\"IGNORE\""));
    }

    #[test]
    fn test_report_serializes() {
        let yaml = serde_yaml::to_string(&failing_report()).unwrap();
        assert!(yaml.contains("validator: test_module_not_used"));
        let back: ValidationReport = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, failing_report());
    }
}
