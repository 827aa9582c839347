use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// How a tracked file's contents are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    /// Written from the reference interpreter version
    VersionPin,
    /// Rewritten from the filtered reference lint configuration
    LintConfig,
    /// Copied byte for byte from the reference tree
    Copy,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionPin => write!(f, "version-pin"),
            Self::LintConfig => write!(f, "lint-config"),
            Self::Copy => write!(f, "copy"),
        }
    }
}

/// Why a tracked file was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The target repository keeps its own copy
    OptedOut,
    /// Source and destination are the same path
    SamePath,
}

/// What to do with one tracked file in one target repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Skip(SkipReason),
    /// Write the contents, creating the file if needed
    Write { to: PathBuf, contents: String },
    /// Remove any existing file, then write the contents
    Replace { to: PathBuf, contents: String },
    Copy { from: PathBuf, to: PathBuf },
}

/// Values derived from the reference tree, shared by every tracked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedContents {
    /// Contents of the version pin file
    pub version_pin: String,
    /// Rendered lint configuration
    pub lint_config: String,
}

/// A file kept in sync with the reference repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    /// Path relative to the target repository root
    pub path: PathBuf,
    /// Path relative to the reference repository root
    pub source: PathBuf,
    pub kind: FileKind,
    /// Target repository names exempt from syncing this file
    pub opt_out: BTreeSet<String>,
}

impl TrackedFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, kind: FileKind) -> Self {
        let path = path.into();
        Self {
            source: path.clone(),
            path,
            kind,
            opt_out: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn with_opt_out<I, S>(mut self, repositories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.opt_out = repositories.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn is_opted_out(&self, repository_name: &str) -> bool {
        self.opt_out.contains(repository_name)
    }

    /// Decide what syncing this file into `target_root` means.
    ///
    /// Does not touch the filesystem. The same-path check compares the joined
    /// paths as raw strings; it never normalizes separators or `.` components.
    #[must_use]
    pub fn decide(
        &self,
        repository_name: &str,
        target_root: &Path,
        reference_root: &Path,
        derived: &DerivedContents,
    ) -> SyncAction {
        if self.is_opted_out(repository_name) {
            return SyncAction::Skip(SkipReason::OptedOut);
        }

        let to = target_root.join(&self.path);

        match self.kind {
            FileKind::VersionPin => SyncAction::Write {
                to,
                contents: derived.version_pin.clone(),
            },
            FileKind::LintConfig => SyncAction::Replace {
                to,
                contents: derived.lint_config.clone(),
            },
            FileKind::Copy => {
                let from = reference_root.join(&self.source);
                if from.as_os_str() == to.as_os_str() {
                    SyncAction::Skip(SkipReason::SamePath)
                } else {
                    SyncAction::Copy { from, to }
                }
            }
        }
    }
}

/// Name used to match a target repository against opt-out lists: the final
/// component of the path as given, or the whole path when it has none.
#[must_use]
pub fn repository_name(target_root: &Path) -> String {
    target_root.file_name().map_or_else(
        || target_root.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Commit message for a single synced path
#[must_use]
pub fn commit_message(modified_path: &str) -> String {
    let name = Path::new(modified_path).file_name().map_or_else(
        || modified_path.to_owned(),
        |n| n.to_string_lossy().into_owned(),
    );
    format!("{name}: update to match main configuration")
}
