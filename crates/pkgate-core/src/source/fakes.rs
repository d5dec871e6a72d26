//! In-memory fakes for the package source traits (testing only)
//!
//! Provides `MemorySource` and `MemoryConnector`, which satisfy the trait
//! contracts without a build service or a mirror directory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{PackageSource, SourceConnector, SourceError, SourceResult};

type RevisionKey = (String, String, String);

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// In-memory package source keyed by `(project, package, revision)`.
///
/// Files are listed in insertion order. Every `get_file` is recorded so tests
/// can assert which files a check fetched.
#[derive(Debug, Default)]
pub struct MemorySource {
    revisions: HashMap<RevisionKey, Vec<(String, Vec<u8>)>>,
    fetched: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to `project/package@revision`.
    pub fn with_file(
        mut self,
        project: &str,
        package: &str,
        revision: &str,
        name: &str,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        self.revisions
            .entry(key(project, package, revision))
            .or_default()
            .push((name.to_string(), content.into()));
        self
    }

    /// Names passed to `get_file` so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

fn key(project: &str, package: &str, revision: &str) -> RevisionKey {
    (
        project.to_string(),
        package.to_string(),
        revision.to_string(),
    )
}

#[async_trait]
impl PackageSource for MemorySource {
    async fn list_files(
        &self,
        project: &str,
        package: &str,
        revision: &str,
    ) -> SourceResult<Vec<String>> {
        self.revisions
            .get(&key(project, package, revision))
            .map(|files| files.iter().map(|(name, _)| name.clone()).collect())
            .ok_or_else(|| SourceError::NotFound {
                what: format!("{project}/{package}@{revision}"),
            })
    }

    async fn get_file(
        &self,
        project: &str,
        package: &str,
        filename: &str,
        revision: &str,
    ) -> SourceResult<Vec<u8>> {
        self.fetched.lock().unwrap().push(filename.to_string());
        self.revisions
            .get(&key(project, package, revision))
            .and_then(|files| files.iter().find(|(name, _)| name == filename))
            .map(|(_, content)| content.clone())
            .ok_or_else(|| SourceError::NotFound {
                what: format!("{project}/{package}/{filename}@{revision}"),
            })
    }
}

// ---------------------------------------------------------------------------
// MemoryConnector
// ---------------------------------------------------------------------------

/// Connector over a fixed set of in-memory namespaces that counts how often
/// it is asked to connect.
#[derive(Default)]
pub struct MemoryConnector {
    namespaces: HashMap<String, Arc<MemorySource>>,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: &str, source: Arc<MemorySource>) -> Self {
        self.namespaces.insert(namespace.to_string(), source);
        self
    }

    /// Number of `connect` calls served so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SourceConnector for MemoryConnector {
    async fn connect(&self, namespace: &str) -> SourceResult<Arc<dyn PackageSource>> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        let source = self
            .namespaces
            .get(namespace)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable(format!("unknown namespace '{namespace}'")))?;
        Ok(source as Arc<dyn PackageSource>)
    }
}
