//! Package source abstractions.
//!
//! - [`PackageSource`]: lists and fetches the files of one package revision
//! - [`SourceConnector`]: resolves a build-service namespace (API alias) to a
//!   [`PackageSource`]
//!
//! Both traits are async and backend-agnostic. A directory-backed mirror
//! lives in [`fs`]; in-memory fakes for tests live in [`fakes`].

pub mod fakes;
pub mod fs;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from package source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("invalid path component: {0:?}")]
    InvalidComponent(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for package source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// One proposed change from a submit request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "sourceproject")]
    pub source_project: String,
    #[serde(rename = "sourcepackage")]
    pub source_package: String,
    #[serde(rename = "sourcerevision")]
    pub source_revision: String,
}

impl Action {
    pub fn new(project: &str, package: &str, revision: &str) -> Self {
        Self {
            source_project: project.to_string(),
            source_package: package.to_string(),
            source_revision: revision.to_string(),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.source_project, self.source_package, self.source_revision
        )
    }
}

/// Read access to package sources at a given revision.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// File names of `project/package` at `revision`, in listing order.
    async fn list_files(
        &self,
        project: &str,
        package: &str,
        revision: &str,
    ) -> SourceResult<Vec<String>>;

    /// Content of one file of `project/package` at `revision`.
    async fn get_file(
        &self,
        project: &str,
        package: &str,
        filename: &str,
        revision: &str,
    ) -> SourceResult<Vec<u8>>;
}

/// Resolves a namespace to a package source.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn connect(&self, namespace: &str) -> SourceResult<Arc<dyn PackageSource>>;
}

/// Reject components that could address anything outside their parent.
pub(crate) fn check_component(component: &str) -> SourceResult<()> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains('/')
        || component.contains('\\')
        || component.contains('\0')
    {
        return Err(SourceError::InvalidComponent(component.to_string()));
    }
    Ok(())
}
