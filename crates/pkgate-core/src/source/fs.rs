//! Directory-backed package source.
//!
//! Layout: `<root>/<namespace>/<project>/<package>/<revision>/<file>`. Used
//! by `pkgated` against a local mirror of the build service.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{check_component, PackageSource, SourceConnector, SourceError, SourceResult};

/// Package source reading one namespace of a mirror directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn revision_dir(&self, project: &str, package: &str, revision: &str) -> SourceResult<PathBuf> {
        for component in [project, package, revision] {
            check_component(component)?;
        }
        Ok(self.root.join(project).join(package).join(revision))
    }
}

fn not_found(err: std::io::Error, what: String) -> SourceError {
    if err.kind() == ErrorKind::NotFound {
        SourceError::NotFound { what }
    } else {
        SourceError::Io(err)
    }
}

#[async_trait]
impl PackageSource for DirectorySource {
    async fn list_files(
        &self,
        project: &str,
        package: &str,
        revision: &str,
    ) -> SourceResult<Vec<String>> {
        let dir = self.revision_dir(project, package, revision)?;
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| not_found(e, format!("{project}/{package}@{revision}")))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(files)
    }

    async fn get_file(
        &self,
        project: &str,
        package: &str,
        filename: &str,
        revision: &str,
    ) -> SourceResult<Vec<u8>> {
        check_component(filename)?;
        let path = self.revision_dir(project, package, revision)?.join(filename);
        tokio::fs::read(&path)
            .await
            .map_err(|e| not_found(e, format!("{project}/{package}/{filename}@{revision}")))
    }
}

/// Connector mapping each namespace to a subdirectory of the mirror root.
#[derive(Debug, Clone)]
pub struct DirectoryConnector {
    root: PathBuf,
}

impl DirectoryConnector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceConnector for DirectoryConnector {
    async fn connect(&self, namespace: &str) -> SourceResult<Arc<dyn PackageSource>> {
        check_component(namespace)?;
        let root = self.root.join(namespace);
        if !tokio::fs::try_exists(&root).await? {
            return Err(SourceError::Unavailable(format!(
                "no mirror for namespace '{namespace}' under {}",
                self.root.display()
            )));
        }
        tracing::debug!(namespace = %namespace, root = %root.display(), "connected to directory source");
        Ok(Arc::new(DirectorySource::new(root)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_mirror() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let rev = dir.path().join("obs").join("home:alice").join("pkg").join("2");
        std::fs::create_dir_all(&rev).unwrap();
        std::fs::write(rev.join("pkg.spec"), b"Name: pkg\n").unwrap();
        std::fs::write(rev.join("pkg.changes"), b"* entry\n").unwrap();
        std::fs::write(rev.join("pkg-1.0.tar.gz"), b"\x1f\x8b").unwrap();
        std::fs::create_dir(rev.join("subdir")).unwrap();
        dir
    }

    #[tokio::test]
    async fn lists_files_sorted_without_directories() {
        let mirror = make_mirror();
        let source = DirectoryConnector::new(mirror.path())
            .connect("obs")
            .await
            .unwrap();
        let files = source.list_files("home:alice", "pkg", "2").await.unwrap();
        assert_eq!(files, vec!["pkg-1.0.tar.gz", "pkg.changes", "pkg.spec"]);
    }

    #[tokio::test]
    async fn fetches_file_content() {
        let mirror = make_mirror();
        let source = DirectorySource::new(mirror.path().join("obs"));
        let content = source
            .get_file("home:alice", "pkg", "pkg.spec", "2")
            .await
            .unwrap();
        assert_eq!(content, b"Name: pkg\n");
    }

    #[tokio::test]
    async fn missing_revision_is_not_found() {
        let mirror = make_mirror();
        let source = DirectorySource::new(mirror.path().join("obs"));
        let err = source.list_files("home:alice", "pkg", "9").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
        let err = source
            .get_file("home:alice", "pkg", "nope.yaml", "2")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let mirror = make_mirror();
        let source = DirectorySource::new(mirror.path().join("obs"));
        let err = source
            .get_file("home:alice", "pkg", "../../../etc/passwd", "2")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidComponent(_)));
    }

    #[tokio::test]
    async fn unknown_namespace_is_unavailable() {
        let mirror = make_mirror();
        let err = DirectoryConnector::new(mirror.path())
            .connect("other")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
