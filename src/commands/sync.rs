use log::{debug, info};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::TrackedFiles;
use crate::domain::{
    DerivedContents, FileKind, LintConfigError, SkipReason, SyncAction, commit_message,
};
use crate::infrastructure::{Git, GitError, SyncTrees, TreeError};

/// Errors that can occur while syncing a target repository
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    LintConfig(#[from] LintConfigError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("failed to create directory: {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy {} to {}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The target work tree was clean after syncing
    NoChanges,
    /// One commit was created per listed path
    Committed(Vec<String>),
}

/// Derive the generated file contents from the reference tree.
///
/// Runs before any file is written, so a bad reference leaves the target untouched.
///
/// # Errors
///
/// Returns [`SyncError::Tree`] if a reference source cannot be read or parsed.
/// Returns [`SyncError::LintConfig`] if the lint configuration cannot be rendered.
pub fn derive_contents(
    trees: &SyncTrees,
    tracked_files: &TrackedFiles,
) -> Result<DerivedContents, SyncError> {
    let mut derived = DerivedContents {
        version_pin: String::new(),
        lint_config: String::new(),
    };

    for file in tracked_files.iter() {
        match file.kind {
            FileKind::VersionPin => {
                let version = trees.interpreter_version(file)?;
                debug!("Reference interpreter version: {version}");
                derived.version_pin = version.to_file_contents();
            }
            FileKind::LintConfig => {
                let config = trees.lint_config(file)?;
                debug!(
                    "Reference lint configuration: {} keys kept",
                    config.mapping().len()
                );
                derived.lint_config = config.render()?;
            }
            FileKind::Copy => {}
        }
    }

    Ok(derived)
}

/// Create the parent directory of `path` if it is missing.
fn create_parent(path: &Path) -> Result<(), SyncError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(parent).map_err(|source| SyncError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })
}

/// Write `contents` to `path`.
fn write(path: &Path, contents: &str) -> Result<(), SyncError> {
    fs::write(path, contents).map_err(|source| SyncError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Carry out a single sync decision on the filesystem.
///
/// # Errors
///
/// Returns [`SyncError::Write`] or [`SyncError::Copy`] if the target cannot be updated.
pub fn apply(action: &SyncAction) -> Result<(), SyncError> {
    match action {
        SyncAction::Skip(_) => Ok(()),
        SyncAction::Write { to, contents } => write(to, contents),
        SyncAction::Replace { to, contents } => {
            match fs::remove_file(to) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(SyncError::Write {
                        path: to.clone(),
                        source,
                    });
                }
            }
            write(to, contents)
        }
        SyncAction::Copy { from, to } => {
            fs::copy(from, to)
                .map(|_| ())
                .map_err(|source| SyncError::Copy {
                    from: from.clone(),
                    to: to.clone(),
                    source,
                })
        }
    }
}

/// Write every tracked file into the target tree, in table order.
///
/// Files written before a failure stay written.
///
/// # Errors
///
/// Returns [`SyncError`] on the first file that cannot be updated.
pub fn sync_files(
    trees: &SyncTrees,
    tracked_files: &TrackedFiles,
    derived: &DerivedContents,
) -> Result<(), SyncError> {
    for file in tracked_files.iter() {
        create_parent(&trees.target().join(&file.path))?;

        let action = file.decide(
            trees.repository_name(),
            trees.target(),
            trees.reference(),
            derived,
        );

        match &action {
            SyncAction::Skip(SkipReason::OptedOut) => debug!(
                "Skipping {}: {} keeps its own copy",
                file.path.display(),
                trees.repository_name()
            ),
            SyncAction::Skip(SkipReason::SamePath) => {
                debug!("Skipping {}: already in place", file.path.display());
            }
            SyncAction::Write { .. } | SyncAction::Replace { .. } | SyncAction::Copy { .. } => {
                debug!("Updating {} ({})", file.path.display(), file.kind);
            }
        }

        apply(&action)?;
    }

    Ok(())
}

/// Commit each changed path in the target tree separately.
///
/// # Errors
///
/// Returns [`SyncError::Git`] if any git invocation fails; earlier commits are kept.
pub fn commit_changes(git: &Git) -> Result<SyncOutcome, SyncError> {
    if !git.has_changes()? {
        info!("No changes detected.");
        return Ok(SyncOutcome::NoChanges);
    }

    git.add_all()?;

    let modified_paths = git.staged_paths()?;
    for modified_path in &modified_paths {
        info!("Detected changes to {modified_path}.");
        git.commit_path(modified_path, &commit_message(modified_path))?;
    }

    Ok(SyncOutcome::Committed(modified_paths))
}

/// Sync the tracked files from the reference tree into the target tree and
/// commit the result.
///
/// # Errors
///
/// Returns [`SyncError`] if the reference cannot be read, a file cannot be
/// written or git fails.
pub fn run(trees: &SyncTrees, tracked_files: &TrackedFiles) -> Result<SyncOutcome, SyncError> {
    let derived = derive_contents(trees, tracked_files)?;

    info!("Detecting changes…");
    sync_files(trees, tracked_files, &derived)?;

    commit_changes(&Git::new(trees.target()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn replace_overwrites_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let to = temp_dir.path().join(".rubocop.yml");
        fs::write(&to, "old: true\nwith: more lines\n").unwrap();

        apply(&SyncAction::Replace {
            to: to.clone(),
            contents: "new: true\n".to_owned(),
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&to).unwrap(), "new: true\n");
    }

    #[test]
    fn replace_creates_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let to = temp_dir.path().join(".rubocop.yml");

        apply(&SyncAction::Replace {
            to: to.clone(),
            contents: "new: true\n".to_owned(),
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&to).unwrap(), "new: true\n");
    }

    #[test]
    fn copy_is_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("from.yml");
        let to = temp_dir.path().join("to.yml");
        let bytes = b"version: 2\r\nupdates: []\n\xff";
        fs::write(&from, bytes).unwrap();

        apply(&SyncAction::Copy {
            from,
            to: to.clone(),
        })
        .unwrap();

        assert_eq!(fs::read(&to).unwrap(), bytes);
    }

    #[test]
    fn copy_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = apply(&SyncAction::Copy {
            from: temp_dir.path().join("missing.yml"),
            to: temp_dir.path().join("to.yml"),
        });

        assert!(matches!(result, Err(SyncError::Copy { .. })));
    }

    #[test]
    fn skip_touches_nothing() {
        apply(&SyncAction::Skip(SkipReason::OptedOut)).unwrap();
        apply(&SyncAction::Skip(SkipReason::SamePath)).unwrap();
    }
}
