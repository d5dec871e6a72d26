//! pkgate core - quality gates for package submissions
//!
//! Provides a gate engine that:
//! - Checks a submitted package carries a source tarball, `.spec` and `.changes`
//! - Regenerates spectacle-managed `.spec` files from their `.yaml` and
//!   rejects submissions whose spec drifted from the generator output
//! - Folds per-action outcomes into one verdict under enforce/warn/skip policy

pub mod config;
pub mod diff;
pub mod error;
pub mod gate;
pub mod obs;
pub mod rules;
pub mod source;
pub mod telemetry;
pub mod workspace;

// Re-export key types
pub use config::{CheckSeverity, GateConfig, GeneratorConfig, DEFAULT_SPEC_PATTERN};
pub use diff::filter::effective_changes;
pub use diff::{line_diff, DiffLine, DiffOrigin};
pub use error::{GateError, Result};
pub use gate::{GateReport, GateRequest, QualityGate};
pub use rules::completeness::CompletenessRule;
pub use rules::generator::{GeneratorCommand, GeneratorOutput};
pub use rules::regeneration::RegenerationRule;
pub use rules::{ActionCheck, CheckOutcome};
pub use source::fakes::{MemoryConnector, MemorySource};
pub use source::fs::{DirectoryConnector, DirectorySource};
pub use source::{Action, PackageSource, SourceConnector, SourceError};
pub use telemetry::init_tracing;
pub use workspace::{SnapshotId, Workspace, WorkspaceError};

/// pkgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
