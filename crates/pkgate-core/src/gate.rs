//! Gate aggregation over a submit request.
//!
//! [`QualityGate::run`] walks the request's actions in order, runs every
//! enabled check on each through the severity policy, and folds the outcomes
//! into a [`GateReport`]: the result is the AND of all counted outcomes and
//! messages accumulate in action order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::rules::completeness::CompletenessRule;
use crate::rules::regeneration::RegenerationRule;
use crate::rules::{evaluate_with_severity, ActionCheck, COMPLETENESS_CHECK, REGENERATION_CHECK};
use crate::source::{Action, PackageSource, SourceConnector};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One batch of actions delivered by the workflow host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRequest {
    /// Build-service alias the actions refer to.
    pub namespace: String,
    pub actions: Vec<Action>,
    /// Messages already attached to the work item; kept ahead of new ones.
    #[serde(default)]
    pub messages: Vec<String>,
}

impl GateRequest {
    pub fn new(namespace: &str, actions: Vec<Action>) -> Self {
        Self {
            namespace: namespace.to_string(),
            actions,
            messages: Vec::new(),
        }
    }

    /// Parse the host payload `{"ev": {"actions": [...], "namespace": ".."}, "msg": [..]}`.
    ///
    /// A missing `ev`, a non-list `ev.actions`, a non-string `ev.namespace`
    /// or a malformed action is an [`GateError::InvalidRequest`]. A `msg`
    /// that is not a list is treated as empty.
    pub fn from_value(payload: &Value) -> Result<Self> {
        let ev = match payload.get("ev") {
            Some(ev) if !ev.is_null() => ev,
            _ => return Err(invalid("missing mandatory field 'ev'")),
        };

        let raw_actions = ev
            .get("actions")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("mandatory field ev.actions not a list"))?;

        let namespace = ev
            .get("namespace")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("mandatory field ev.namespace not a string"))?;

        let actions = raw_actions
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                serde_json::from_value::<Action>(raw.clone())
                    .map_err(|e| GateError::InvalidRequest(format!("ev.actions[{i}]: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let messages = payload
            .get("msg")
            .and_then(Value::as_array)
            .map(|msgs| {
                msgs.iter()
                    .map(|m| match m {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            namespace: namespace.to_string(),
            actions,
            messages,
        })
    }

    /// Parse the host payload from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(text)
            .map_err(|e| GateError::InvalidRequest(format!("payload is not JSON: {e}")))?;
        Self::from_value(&payload)
    }
}

fn invalid(reason: &str) -> GateError {
    GateError::InvalidRequest(reason.to_string())
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Verdict of one gate invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    /// False iff an enforced check failed on some action.
    pub result: bool,
    /// Diagnostics in action order, prior messages first.
    pub messages: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Quality gate bound to one configuration and one source connector.
pub struct QualityGate {
    config: GateConfig,
    connector: Arc<dyn SourceConnector>,
    checks: Vec<Box<dyn ActionCheck>>,
    cached: Option<(String, Arc<dyn PackageSource>)>,
}

impl QualityGate {
    /// Gate running the checks listed in `config.enabled_checks`.
    pub fn new(config: GateConfig, connector: Arc<dyn SourceConnector>) -> Self {
        let checks = config
            .enabled_checks
            .iter()
            .filter_map(|name| build_check(name, &config))
            .collect();
        Self::with_checks(config, connector, checks)
    }

    /// Gate running an explicit list of checks.
    pub fn with_checks(
        config: GateConfig,
        connector: Arc<dyn SourceConnector>,
        checks: Vec<Box<dyn ActionCheck>>,
    ) -> Self {
        Self {
            config,
            connector,
            checks,
            cached: None,
        }
    }

    /// Names of the checks this gate runs, in order.
    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Evaluate every action of `request`.
    ///
    /// Package source failures abort the invocation; check failures do not.
    pub async fn run(&mut self, request: &GateRequest) -> Result<GateReport> {
        let span = crate::obs::gate_span(&request.namespace);
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(&mut self, request: &GateRequest) -> Result<GateReport> {
        crate::obs::emit_gate_started(&request.namespace, request.actions.len());
        let source = self.source_for(&request.namespace).await?;

        let mut result = true;
        let mut messages = request.messages.clone();

        for action in &request.actions {
            for check in &self.checks {
                let severity = self.config.severity(check.name());
                let outcome =
                    evaluate_with_severity(check.as_ref(), severity, source.as_ref(), action)
                        .await?;
                if let Some(message) = outcome.message {
                    messages.push(message);
                }
                result = result && outcome.passed;
            }
        }

        crate::obs::emit_gate_evaluated(&request.namespace, result, messages.len());
        Ok(GateReport {
            result,
            messages,
            evaluated_at: Utc::now(),
        })
    }

    /// Package source for `namespace`, reusing the previous connection when
    /// the namespace has not changed.
    async fn source_for(&mut self, namespace: &str) -> Result<Arc<dyn PackageSource>> {
        if let Some((cached_ns, source)) = &self.cached {
            if cached_ns == namespace {
                return Ok(source.clone());
            }
        }

        let source = self.connector.connect(namespace).await?;
        self.cached = Some((namespace.to_string(), source.clone()));
        Ok(source)
    }
}

fn build_check(name: &str, config: &GateConfig) -> Option<Box<dyn ActionCheck>> {
    match name {
        COMPLETENESS_CHECK => Some(Box::new(CompletenessRule)),
        REGENERATION_CHECK => Some(Box::new(RegenerationRule::from_config(config))),
        other => {
            tracing::warn!(check = %other, "ignoring unknown check");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fakes::{MemoryConnector, MemorySource};
    use serde_json::json;

    fn complete_source() -> Arc<MemorySource> {
        Arc::new(
            MemorySource::new()
                .with_file("prj", "pkg", "1", "pkg-1.0.tar.gz", "tar")
                .with_file("prj", "pkg", "1", "pkg.spec", "Name: pkg\n")
                .with_file("prj", "pkg", "1", "pkg.changes", "* entry\n"),
        )
    }

    fn completeness_gate(connector: Arc<MemoryConnector>) -> QualityGate {
        let config = GateConfig::new("/tmp/oscrc")
            .unwrap()
            .with_checks(&[COMPLETENESS_CHECK]);
        QualityGate::new(config, connector)
    }

    #[test]
    fn test_request_from_payload() {
        let payload = json!({
            "ev": {
                "namespace": "obs",
                "actions": [
                    {"sourceproject": "prj", "sourcepackage": "pkg", "sourcerevision": "1"}
                ]
            },
            "msg": ["earlier note"]
        });
        let request = GateRequest::from_value(&payload).unwrap();
        assert_eq!(request.namespace, "obs");
        assert_eq!(request.actions, vec![Action::new("prj", "pkg", "1")]);
        assert_eq!(request.messages, vec!["earlier note"]);
    }

    #[test]
    fn test_request_missing_ev() {
        let err = GateRequest::from_value(&json!({"msg": []})).unwrap_err();
        assert!(err.to_string().contains("'ev'"));
        let err = GateRequest::from_value(&json!({"ev": null})).unwrap_err();
        assert!(matches!(err, GateError::InvalidRequest(_)));
    }

    #[test]
    fn test_request_actions_not_list() {
        let err = GateRequest::from_value(&json!({"ev": {"actions": "prj/pkg", "namespace": "obs"}}))
            .unwrap_err();
        assert!(err.to_string().contains("ev.actions not a list"));
    }

    #[test]
    fn test_request_namespace_not_string() {
        let err = GateRequest::from_value(&json!({"ev": {"actions": [], "namespace": 3}}))
            .unwrap_err();
        assert!(err.to_string().contains("ev.namespace not a string"));
    }

    #[test]
    fn test_request_malformed_action() {
        let err = GateRequest::from_value(&json!({
            "ev": {"namespace": "obs", "actions": [{"sourceproject": "prj"}]}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("ev.actions[0]"));
    }

    #[test]
    fn test_request_non_list_msg_is_reset() {
        let request = GateRequest::from_value(&json!({
            "ev": {"namespace": "obs", "actions": []},
            "msg": "not a list"
        }))
        .unwrap();
        assert!(request.messages.is_empty());
    }

    #[test]
    fn test_request_from_json_rejects_garbage() {
        assert!(matches!(
            GateRequest::from_json("{not json"),
            Err(GateError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_default_checks_from_config() {
        let connector = Arc::new(MemoryConnector::new());
        let gate = QualityGate::new(GateConfig::new("/tmp/oscrc").unwrap(), connector);
        assert_eq!(gate.check_names(), vec![COMPLETENESS_CHECK, REGENERATION_CHECK]);
    }

    #[tokio::test]
    async fn test_empty_batch_passes() {
        let connector = Arc::new(MemoryConnector::new().with_namespace("obs", complete_source()));
        let mut gate = completeness_gate(connector);
        let report = gate.run(&GateRequest::new("obs", vec![])).await.unwrap();
        assert!(report.result);
        assert!(report.messages.is_empty());
    }

    #[tokio::test]
    async fn test_source_is_memoized_per_namespace() {
        let source = complete_source();
        let connector = Arc::new(
            MemoryConnector::new()
                .with_namespace("obs", source.clone())
                .with_namespace("obs-staging", source),
        );
        let mut gate = completeness_gate(connector.clone());
        let request = GateRequest::new("obs", vec![Action::new("prj", "pkg", "1")]);

        gate.run(&request).await.unwrap();
        gate.run(&request).await.unwrap();
        assert_eq!(connector.connect_count(), 1);

        let staging = GateRequest::new("obs-staging", vec![Action::new("prj", "pkg", "1")]);
        gate.run(&staging).await.unwrap();
        assert_eq!(connector.connect_count(), 2);

        gate.run(&request).await.unwrap();
        assert_eq!(connector.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_fatal() {
        let connector = Arc::new(MemoryConnector::new());
        let mut gate = completeness_gate(connector);
        let result = gate
            .run(&GateRequest::new("nowhere", vec![Action::new("prj", "pkg", "1")]))
            .await;
        assert!(matches!(result, Err(GateError::Source(_))));
    }
}
