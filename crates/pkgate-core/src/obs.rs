//! Structured observability hooks for gate invocations.
//!
//! - Namespace-scoped tracing span for one gate invocation ([`gate_span`])
//! - Emission functions for invocation start, per-check outcome, generator
//!   runs and the final verdict

use tracing::info;

use crate::config::CheckSeverity;

/// Span covering one gate invocation. Attach with `tracing::Instrument`.
pub fn gate_span(namespace: &str) -> tracing::Span {
    tracing::info_span!("pkgate.gate", namespace = %namespace)
}

/// Emit event: a gate invocation started.
pub fn emit_gate_started(namespace: &str, actions: usize) {
    info!(event = "gate.started", namespace = %namespace, actions = actions);
}

/// Emit event: one check finished for one action.
pub fn emit_action_checked(
    check: &str,
    project: &str,
    package: &str,
    severity: CheckSeverity,
    passed: bool,
) {
    info!(
        event = "action.checked",
        check = %check,
        project = %project,
        package = %package,
        severity = ?severity,
        passed = passed,
    );
}

/// Emit event: the regeneration tool exited.
pub fn emit_generator_finished(program: &str, exit_code: i32, duration_ms: u64) {
    info!(
        event = "generator.finished",
        program = %program,
        exit_code = exit_code,
        duration_ms = duration_ms,
    );
}

/// Emit event: the gate produced its verdict.
pub fn emit_gate_evaluated(namespace: &str, passed: bool, messages: usize) {
    info!(
        event = "gate.evaluated",
        namespace = %namespace,
        passed = passed,
        messages = messages,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_span_create() {
        let _entered = gate_span("obs.example.org").entered();
        emit_gate_started("obs.example.org", 0);
    }
}
