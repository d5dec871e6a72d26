//! Checks run against each submit request action.
//!
//! Every check implements [`ActionCheck`]. The gate never calls a check
//! directly; it goes through [`evaluate_with_severity`], which applies the
//! configured enforce/warn/skip policy uniformly to all checks.

pub mod completeness;
pub mod generator;
pub mod regeneration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CheckSeverity;
use crate::error::Result;
use crate::source::{Action, PackageSource};

/// Name of the file-set completeness check.
pub const COMPLETENESS_CHECK: &str = "check_package_is_complete";

/// Name of the spec/yaml regeneration check.
pub const REGENERATION_CHECK: &str = "check_yaml_matches_spec";

/// Result of one check on one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub passed: bool,
    /// Diagnostic for the report; always set on failure.
    pub message: Option<String>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// A check over the files of one action.
///
/// `Err` is reserved for conditions that must abort the whole invocation
/// (package source failures, workspace I/O). Content problems are reported
/// as a failed [`CheckOutcome`].
#[async_trait]
pub trait ActionCheck: Send + Sync {
    /// Stable name used for severity lookup and logging.
    fn name(&self) -> &'static str;

    async fn check(&self, source: &dyn PackageSource, action: &Action) -> Result<CheckOutcome>;
}

/// Run `check` under `severity` and return the outcome as it should count
/// towards the gate.
///
/// - `Skip`: the check is not evaluated and passes silently.
/// - `Warn`: a failure is returned as passed, message prefixed `WARNING: `.
/// - `Enforce`: the outcome is returned unchanged.
pub async fn evaluate_with_severity(
    check: &dyn ActionCheck,
    severity: CheckSeverity,
    source: &dyn PackageSource,
    action: &Action,
) -> Result<CheckOutcome> {
    if severity == CheckSeverity::Skip {
        tracing::debug!(check = check.name(), action = %action, "check skipped by policy");
        return Ok(CheckOutcome::pass());
    }

    let outcome = check.check(source, action).await?;
    crate::obs::emit_action_checked(
        check.name(),
        &action.source_project,
        &action.source_package,
        severity,
        outcome.passed,
    );

    match (severity, outcome.passed) {
        (CheckSeverity::Warn, false) => Ok(CheckOutcome {
            passed: true,
            message: outcome.message.map(|m| format!("WARNING: {m}")),
        }),
        _ => Ok(outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fakes::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysFails {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ActionCheck for AlwaysFails {
        fn name(&self) -> &'static str {
            "always_fails"
        }

        async fn check(&self, _source: &dyn PackageSource, _action: &Action) -> Result<CheckOutcome> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(CheckOutcome::fail("broken"))
        }
    }

    fn fixture() -> (AlwaysFails, MemorySource, Action) {
        (
            AlwaysFails {
                calls: AtomicUsize::new(0),
            },
            MemorySource::new(),
            Action::new("prj", "pkg", "1"),
        )
    }

    #[tokio::test]
    async fn test_enforce_keeps_failure() {
        let (check, source, action) = fixture();
        let outcome = evaluate_with_severity(&check, CheckSeverity::Enforce, &source, &action)
            .await
            .unwrap();
        assert_eq!(outcome, CheckOutcome::fail("broken"));
    }

    #[tokio::test]
    async fn test_warn_reports_but_passes() {
        let (check, source, action) = fixture();
        let outcome = evaluate_with_severity(&check, CheckSeverity::Warn, &source, &action)
            .await
            .unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.message.as_deref(), Some("WARNING: broken"));
    }

    #[tokio::test]
    async fn test_skip_never_evaluates() {
        let (check, source, action) = fixture();
        let outcome = evaluate_with_severity(&check, CheckSeverity::Skip, &source, &action)
            .await
            .unwrap();
        assert_eq!(outcome, CheckOutcome::pass());
        assert_eq!(check.calls.load(Ordering::Relaxed), 0);
    }
}
