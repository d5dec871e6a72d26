//! Spec/yaml coherence for spectacle-managed packages.
//!
//! If a package's `.spec` claims to be generated (provenance marker match),
//! its `.yaml` must be present and re-running the generator over the staged
//! package must not change the spec beyond comments and blank lines.

use async_trait::async_trait;
use regex::Regex;

use super::generator::GeneratorCommand;
use super::{ActionCheck, CheckOutcome, REGENERATION_CHECK};
use crate::config::{GateConfig, GeneratorConfig};
use crate::diff::filter::effective_changes;
use crate::error::Result;
use crate::source::{Action, PackageSource};
use crate::workspace::Workspace;

const DESCRIPTOR_SUFFIX: &str = ".spec";
const GENERATOR_INPUT_SUFFIX: &str = ".yaml";

/// Regeneration-consistency check.
#[derive(Debug, Clone)]
pub struct RegenerationRule {
    spec_pattern: Regex,
    generator: GeneratorCommand,
    workspace_prefix: String,
}

impl RegenerationRule {
    pub fn new(spec_pattern: Regex, generator: GeneratorConfig) -> Self {
        let workspace_prefix = generator.workspace_prefix.clone();
        Self {
            spec_pattern,
            generator: GeneratorCommand::new(generator),
            workspace_prefix,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.spec_pattern.clone(), config.generator.clone())
    }

    /// Evaluate one package revision. The workspace is removed before this
    /// returns, on every path.
    pub async fn evaluate(
        &self,
        source: &dyn PackageSource,
        project: &str,
        package: &str,
        revision: &str,
    ) -> Result<CheckOutcome> {
        let mut workspace = Workspace::new(&self.workspace_prefix)?;
        let outcome = self
            .evaluate_in(&mut workspace, source, project, package, revision)
            .await;
        if let Err(e) = workspace.close() {
            tracing::warn!(error = %e, "failed to remove workspace");
        }
        outcome
    }

    async fn evaluate_in(
        &self,
        workspace: &mut Workspace,
        source: &dyn PackageSource,
        project: &str,
        package: &str,
        revision: &str,
    ) -> Result<CheckOutcome> {
        let files = source.list_files(project, package, revision).await?;

        let mut spec = None;
        let mut yaml = None;
        for name in &files {
            if name.ends_with(DESCRIPTOR_SUFFIX) {
                let content = source.get_file(project, package, name, revision).await?;
                workspace.store(name, &content)?;
                spec = Some(name.as_str());
            } else if name.ends_with(GENERATOR_INPUT_SUFFIX) {
                let content = source.get_file(project, package, name, revision).await?;
                workspace.store(name, &content)?;
                yaml = Some(name.as_str());
            }
        }

        let generated = match spec {
            Some(spec) => self.spec_pattern.is_match(&workspace.read_to_string(spec)?),
            None => false,
        };
        let Some(spec) = spec.filter(|_| generated) else {
            tracing::debug!(project, package, "no generated spec file, nothing to verify");
            return Ok(CheckOutcome::pass());
        };
        let Some(yaml) = yaml else {
            return Ok(CheckOutcome::fail(
                "SPEC file generated with spectacle, but yaml not present",
            ));
        };

        let snapshot = workspace.take_snapshot(spec)?;

        // The generator may read sibling files (patches, sources).
        for name in &files {
            if !workspace.contains(name) {
                let content = source.get_file(project, package, name, revision).await?;
                workspace.store(name, &content)?;
            }
        }

        let input = workspace.real_path(yaml)?;
        let tool = self.generator.display_name();
        match self.generator.run(&input, workspace.root()).await {
            Ok(out) if out.passed() => {}
            Ok(out) => {
                return Ok(CheckOutcome::fail(format!(
                    "Running {tool} failed:\n{}",
                    out.output
                )));
            }
            Err(e) => {
                tracing::warn!(error = %e, project, package, "generator did not complete");
                return Ok(CheckOutcome::fail(format!("Running {tool} failed:\n{e}")));
            }
        }

        if workspace.is_unchanged(spec, snapshot)? {
            return Ok(CheckOutcome::pass());
        }

        let effective = effective_changes(&workspace.diff(spec, snapshot)?);
        if effective.is_empty() {
            return Ok(CheckOutcome::pass());
        }

        let lines: Vec<String> = effective.iter().map(|l| l.to_string()).collect();
        Ok(CheckOutcome::fail(format!(
            "Spec file changed by {tool}:\n{}",
            lines.join("\n")
        )))
    }
}

#[async_trait]
impl ActionCheck for RegenerationRule {
    fn name(&self) -> &'static str {
        REGENERATION_CHECK
    }

    async fn check(&self, source: &dyn PackageSource, action: &Action) -> Result<CheckOutcome> {
        self.evaluate(
            source,
            &action.source_project,
            &action.source_package,
            &action.source_revision,
        )
        .await
    }
}
