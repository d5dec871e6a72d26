//! Disposable staging area for one rule evaluation.
//!
//! Layout: `<tmp>/<prefix><random>/<file>` for stored files and
//! `<tmp>/<prefix><random>/.snapshots/<id>/<file>` for snapshots. The whole
//! tree is removed when the [`Workspace`] is dropped, whatever path the
//! evaluation took out of its scope.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::diff::{line_diff, DiffLine, DiffOrigin};

const SNAPSHOT_DIR: &str = ".snapshots";

/// Errors from workspace operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    #[error("file not stored in workspace: {0}")]
    NotStored(String),

    #[error("unknown snapshot: {0}")]
    UnknownSnapshot(SnapshotId),

    #[error("snapshot {snapshot} holds {held}, not {requested}")]
    SnapshotMismatch {
        snapshot: SnapshotId,
        held: String,
        requested: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for workspace operations.
pub type WorkspaceResult<T> = std::result::Result<T, WorkspaceError>;

/// Handle to a snapshot taken with [`Workspace::take_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(usize);

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Snapshot {
    name: String,
    path: PathBuf,
    digest: String,
}

/// Ephemeral, uniquely named directory holding fetched package files.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    stored: BTreeSet<String>,
    snapshots: Vec<Snapshot>,
}

impl Workspace {
    /// Create a fresh workspace under the system temp dir.
    pub fn new(prefix: &str) -> WorkspaceResult<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        tracing::debug!(path = %dir.path().display(), "workspace created");
        Ok(Self {
            dir,
            stored: BTreeSet::new(),
            snapshots: Vec::new(),
        })
    }

    /// Root directory; the generator runs here.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` under `name`, replacing any earlier content.
    pub fn store(&mut self, name: &str, content: &[u8]) -> WorkspaceResult<PathBuf> {
        validate_name(name)?;
        let path = self.dir.path().join(name);
        fs::write(&path, content)?;
        self.stored.insert(name.to_string());
        Ok(path)
    }

    /// Whether `name` has been stored.
    pub fn contains(&self, name: &str) -> bool {
        self.stored.contains(name)
    }

    /// Absolute on-disk path of a stored file.
    pub fn real_path(&self, name: &str) -> WorkspaceResult<PathBuf> {
        if !self.contains(name) {
            return Err(WorkspaceError::NotStored(name.to_string()));
        }
        Ok(self.dir.path().join(name))
    }

    /// Current bytes of a stored file (as left on disk by any tool run).
    pub fn read(&self, name: &str) -> WorkspaceResult<Vec<u8>> {
        Ok(fs::read(self.real_path(name)?)?)
    }

    /// Current content of a stored file, lossily decoded as UTF-8.
    pub fn read_to_string(&self, name: &str) -> WorkspaceResult<String> {
        Ok(String::from_utf8_lossy(&self.read(name)?).into_owned())
    }

    /// Copy the current content of `name` aside for a later [`Workspace::diff`].
    pub fn take_snapshot(&mut self, name: &str) -> WorkspaceResult<SnapshotId> {
        let content = self.read(name)?;
        let id = SnapshotId(self.snapshots.len());

        let snap_dir = self
            .dir
            .path()
            .join(SNAPSHOT_DIR)
            .join(id.0.to_string());
        fs::create_dir_all(&snap_dir)?;
        let path = snap_dir.join(name);
        fs::write(&path, &content)?;

        self.snapshots.push(Snapshot {
            name: name.to_string(),
            path,
            digest: content_digest(&content),
        });
        tracing::debug!(file = %name, snapshot = %id, "snapshot taken");
        Ok(id)
    }

    /// Whether `name` still has exactly the bytes captured in `snapshot`.
    pub fn is_unchanged(&self, name: &str, snapshot: SnapshotId) -> WorkspaceResult<bool> {
        let snap = self.snapshot(name, snapshot)?;
        Ok(content_digest(&self.read(name)?) == snap.digest)
    }

    /// Changed lines from the snapshot (old side) to the live file (new
    /// side): removals, additions and their hint lines. Unchanged lines are
    /// not reported.
    pub fn diff(&self, name: &str, snapshot: SnapshotId) -> WorkspaceResult<Vec<DiffLine>> {
        let snap = self.snapshot(name, snapshot)?;
        let old = String::from_utf8_lossy(&fs::read(&snap.path)?).into_owned();
        let new = self.read_to_string(name)?;
        Ok(line_diff(&old, &new)
            .into_iter()
            .filter(|line| line.origin != DiffOrigin::Context)
            .collect())
    }

    /// Remove the workspace now, reporting any cleanup failure.
    pub fn close(self) -> WorkspaceResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(path = %path.display(), "workspace removed");
        Ok(())
    }

    fn snapshot(&self, name: &str, id: SnapshotId) -> WorkspaceResult<&Snapshot> {
        let snap = self
            .snapshots
            .get(id.0)
            .ok_or(WorkspaceError::UnknownSnapshot(id))?;
        if snap.name != name {
            return Err(WorkspaceError::SnapshotMismatch {
                snapshot: id,
                held: snap.name.clone(),
                requested: name.to_string(),
            });
        }
        Ok(snap)
    }
}

/// Package file names are flat; anything that could escape the root is refused.
fn validate_name(name: &str) -> WorkspaceResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name == SNAPSHOT_DIR
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(WorkspaceError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn content_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
