//! File-set completeness: a submission must carry a compressed source
//! tarball, a `.spec` and a `.changes` file.

use async_trait::async_trait;

use super::{ActionCheck, CheckOutcome, COMPLETENESS_CHECK};
use crate::error::Result;
use crate::source::{Action, PackageSource};

/// Suffixes accepted as a compressed source archive.
pub const ARCHIVE_SUFFIXES: &[&str] = &[".tar.bz2", ".tar.gz", ".tgz", ".tar.xz"];

const CHANGELOG_SUFFIX: &str = ".changes";
const DESCRIPTOR_SUFFIX: &str = ".spec";

/// Which required file categories were seen. Flags only ever go from
/// `false` to `true` during a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSetFlags {
    pub source_archive: bool,
    pub changelog: bool,
    pub descriptor: bool,
}

impl FileSetFlags {
    pub fn scan<S: AsRef<str>>(files: &[S]) -> Self {
        files.iter().fold(Self::default(), |mut flags, name| {
            let name = name.as_ref();
            flags.source_archive |= ARCHIVE_SUFFIXES.iter().any(|s| name.ends_with(s));
            flags.changelog |= name.ends_with(CHANGELOG_SUFFIX);
            flags.descriptor |= name.ends_with(DESCRIPTOR_SUFFIX);
            flags
        })
    }

    pub fn is_complete(&self) -> bool {
        self.source_archive && self.changelog && self.descriptor
    }

    /// Human-readable names of the categories not seen.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.source_archive {
            missing.push("compressed source tarball");
        }
        if !self.descriptor {
            missing.push(".spec");
        }
        if !self.changelog {
            missing.push(".changes");
        }
        missing
    }
}

/// Package file completeness check.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessRule;

impl CompletenessRule {
    /// True iff `files` contains an archive, a `.changes` and a `.spec`.
    pub fn evaluate<S: AsRef<str>>(files: &[S]) -> bool {
        FileSetFlags::scan(files).is_complete()
    }

    /// Required categories absent from `files`.
    pub fn missing<S: AsRef<str>>(files: &[S]) -> Vec<&'static str> {
        FileSetFlags::scan(files).missing()
    }
}

#[async_trait]
impl ActionCheck for CompletenessRule {
    fn name(&self) -> &'static str {
        COMPLETENESS_CHECK
    }

    async fn check(&self, source: &dyn PackageSource, action: &Action) -> Result<CheckOutcome> {
        let files = source
            .list_files(
                &action.source_project,
                &action.source_package,
                &action.source_revision,
            )
            .await?;

        let flags = FileSetFlags::scan(&files);
        if flags.is_complete() {
            return Ok(CheckOutcome::pass());
        }

        Ok(CheckOutcome::fail(format!(
            "Package {} in project {} missing files. At least compressed source tarball, \
             .spec and .changes files should be present (missing: {})",
            action.source_package,
            action.source_project,
            flags.missing().join(", ")
        )))
    }
}
