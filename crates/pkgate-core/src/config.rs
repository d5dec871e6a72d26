//! Gate configuration, loaded once at start-up.
//!
//! The on-disk format is TOML with the sections the build-service
//! participants have always used (`[obs]`, `[check_yaml]`, `[checks]`) plus
//! `[generator]` and `[source]` for the subprocess and the local mirror.
//! [`GateConfig`] is the validated, immutable form handed to
//! [`crate::QualityGate::new`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::rules::{COMPLETENESS_CHECK, REGENERATION_CHECK};

/// Provenance marker used when `[check_yaml] spec_pattern` is not set.
pub const DEFAULT_SPEC_PATTERN: &str = "Generated by: spectacle";

/// Per-check policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum CheckSeverity {
    /// A failure fails the gate.
    #[default]
    Enforce,
    /// A failure is reported but never fails the gate.
    Warn,
    /// The check is not evaluated.
    Skip,
}

impl FromStr for CheckSeverity {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" => Ok(Self::Enforce),
            "warn" => Ok(Self::Warn),
            "skip" => Ok(Self::Skip),
            other => Err(GateError::Config(format!(
                "unknown check severity '{other}' (expected enforce, warn or skip)"
            ))),
        }
    }
}

impl TryFrom<String> for CheckSeverity {
    type Error = GateError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// How the regeneration tool is launched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Executable name or path.
    pub program: String,

    /// Arguments placed before the input file.
    pub args: Vec<String>,

    /// Extra environment for the child. `PATH` is always passed through.
    pub env: BTreeMap<String, String>,

    /// Wall-clock limit in seconds (0 = wait for exit without a bound).
    pub timeout_secs: u64,

    /// Prefix for the per-evaluation temporary directory.
    pub workspace_prefix: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("ANSI_COLORS_DISABLED".to_string(), "1".to_string());
        Self {
            program: "specify".to_string(),
            args: vec!["-n".to_string(), "-N".to_string()],
            env,
            timeout_secs: 0,
            workspace_prefix: "check_yaml_spec_".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ObsSection {
    oscrc: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct CheckYamlSection {
    spec_pattern: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SourceSection {
    root: Option<PathBuf>,
    enabled_checks: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    obs: ObsSection,
    #[serde(default)]
    check_yaml: CheckYamlSection,
    #[serde(default)]
    checks: HashMap<String, CheckSeverity>,
    #[serde(default)]
    generator: GeneratorConfig,
    #[serde(default)]
    source: SourceSection,
}

/// Validated gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Credentials file for the package source.
    pub oscrc: PathBuf,

    /// Provenance marker searched for in `.spec` files.
    pub spec_pattern: Regex,

    /// Severity overrides keyed by check name.
    pub severities: HashMap<String, CheckSeverity>,

    /// Regeneration tool settings.
    pub generator: GeneratorConfig,

    /// Root of the directory-backed package source, if used.
    pub source_root: Option<PathBuf>,

    /// Checks run for every action, in order.
    pub enabled_checks: Vec<String>,
}

impl GateConfig {
    /// Configuration with defaults for everything except the credentials file.
    pub fn new(oscrc: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            oscrc: oscrc.into(),
            spec_pattern: Regex::new(DEFAULT_SPEC_PATTERN)?,
            severities: HashMap::new(),
            generator: GeneratorConfig::default(),
            source_root: None,
            enabled_checks: default_checks(),
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(s)?;

        let oscrc = raw
            .obs
            .oscrc
            .ok_or_else(|| GateError::Config("config missing [obs] oscrc option".to_string()))?;

        let pattern = raw
            .check_yaml
            .spec_pattern
            .unwrap_or_else(|| DEFAULT_SPEC_PATTERN.to_string());
        let spec_pattern = Regex::new(&pattern)?;

        for name in raw.checks.keys() {
            if !is_known_check(name) {
                return Err(GateError::Config(format!(
                    "[checks] names unknown check '{name}'"
                )));
            }
        }

        let enabled_checks = raw.source.enabled_checks.unwrap_or_else(default_checks);
        for name in &enabled_checks {
            if !is_known_check(name) {
                return Err(GateError::Config(format!("unknown check '{name}'")));
            }
        }

        if raw.generator.program.is_empty() {
            return Err(GateError::Config(
                "[generator] program must not be empty".to_string(),
            ));
        }

        tracing::info!(
            oscrc = %oscrc.display(),
            spec_pattern = %pattern,
            checks = ?enabled_checks,
            "gate configuration loaded"
        );

        Ok(Self {
            oscrc,
            spec_pattern,
            severities: raw.checks,
            generator: raw.generator,
            source_root: raw.source.root,
            enabled_checks,
        })
    }

    /// Read and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Severity for a check; checks without an override are enforced.
    pub fn severity(&self, check: &str) -> CheckSeverity {
        self.severities.get(check).copied().unwrap_or_default()
    }

    /// Override one check's severity.
    pub fn with_severity(mut self, check: &str, severity: CheckSeverity) -> Self {
        self.severities.insert(check.to_string(), severity);
        self
    }

    /// Replace the provenance marker.
    pub fn with_spec_pattern(mut self, pattern: &str) -> Result<Self> {
        self.spec_pattern = Regex::new(pattern)?;
        Ok(self)
    }

    /// Replace the generator settings.
    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    /// Restrict the gate to the named checks.
    pub fn with_checks(mut self, checks: &[&str]) -> Self {
        self.enabled_checks = checks.iter().map(|c| c.to_string()).collect();
        self
    }
}

fn default_checks() -> Vec<String> {
    vec![COMPLETENESS_CHECK.to_string(), REGENERATION_CHECK.to_string()]
}

fn is_known_check(name: &str) -> bool {
    name == COMPLETENESS_CHECK || name == REGENERATION_CHECK
}
