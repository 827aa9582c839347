use std::path::Path;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::infrastructure::{CiError, SyncTrees, TreeError, signal_pull_request};

use super::sync::{SyncError, SyncOutcome};

/// Errors that can occur during command orchestration
#[derive(Debug, Error)]
pub enum AppError {
    /// The tracked file table is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The arguments do not name two directories.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Syncing or committing failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The CI runner could not be notified.
    #[error(transparent)]
    Ci(#[from] CiError),
}

impl AppError {
    /// Process exit code for this error: git's own exit code when git failed, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Sync(SyncError::Git(e)) => e
                .exit_code()
                .and_then(|code| u8::try_from(code).ok())
                .filter(|code| *code != 0)
                .unwrap_or(1),
            Self::Config(_) | Self::Tree(_) | Self::Sync(_) | Self::Ci(_) => 1,
        }
    }

    /// Whether this error is a usage error.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Tree(TreeError::Usage))
    }
}

/// Run the sync command against the built-in tracked file table.
///
/// # Errors
///
/// Returns [`AppError::Tree`] if either path is not a directory.
/// Returns [`AppError::Config`] if the tracked file table is invalid.
/// Returns [`AppError::Sync`] if syncing or committing fails.
/// Returns [`AppError::Ci`] if the CI output cannot be written.
pub fn sync(target: &Path, reference: &Path) -> Result<SyncOutcome, AppError> {
    let trees = SyncTrees::resolve(target, reference)?;
    let config = Config::load()?;
    run(&trees, &config)
}

/// Run the sync command with an explicit configuration.
///
/// # Errors
///
/// Returns [`AppError::Sync`] if syncing or committing fails.
/// Returns [`AppError::Ci`] if the CI output cannot be written.
pub fn run(trees: &SyncTrees, config: &Config) -> Result<SyncOutcome, AppError> {
    let outcome = super::sync::run(trees, &config.tracked_files)?;

    if let SyncOutcome::Committed(_) = outcome {
        signal_pull_request(&config.settings)?;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn usage_error_for_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let err = sync(temp_dir.path(), &missing).unwrap_err();
        assert!(err.is_usage());
        assert_eq!(err.exit_code(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn git_failure_keeps_git_exit_code() {
        use crate::infrastructure::GitError;
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        let err = AppError::Sync(SyncError::Git(GitError::Exited {
            command: "commit".to_owned(),
            status: ExitStatus::from_raw(128 << 8),
        }));
        assert_eq!(err.exit_code(), 128);
        assert!(!err.is_usage());
    }
}
