//! Git command wrappers using [`std::process::Command`].
//!
//! Every function shells out to the system `git` binary with `-C <work tree>`.
//! Queries capture their output; commands that change the repository inherit
//! stdio so git's own messages reach the user.

use log::debug;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

/// Errors that can occur when running git
#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to spawn git {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("git {command} failed ({status})")]
    Exited { command: String, status: ExitStatus },
}

impl GitError {
    /// Exit code of the failed git process, if it exited normally.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Spawn { .. } => None,
            Self::Failed { status, .. } | Self::Exited { status, .. } => status.code(),
        }
    }
}

/// Git operations on one work tree
#[derive(Debug, Clone)]
pub struct Git {
    /// Directory passed to `git -C`
    work_tree: PathBuf,
}

impl Git {
    #[must_use]
    pub fn new(work_tree: &Path) -> Self {
        Self {
            work_tree: work_tree.to_path_buf(),
        }
    }

    /// Build `git -C <work tree> <args>`.
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.work_tree).args(args);
        cmd.stdin(Stdio::null());
        debug!("git -C {} {}", self.work_tree.display(), args.join(" "));
        cmd
    }

    /// Run a query and return its stdout.
    fn capture(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self
            .command(args)
            .output()
            .map_err(|source| GitError::Spawn {
                command: args.join(" "),
                source,
            })?;

        if !output.status.success() {
            return Err(GitError::Failed {
                command: args.join(" "),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a command with inherited stdout and stderr.
    fn run(&self, args: &[&str]) -> Result<(), GitError> {
        let status = self
            .command(args)
            .status()
            .map_err(|source| GitError::Spawn {
                command: args.join(" "),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(GitError::Exited {
                command: args.join(" "),
                status,
            })
        }
    }

    /// Porcelain status of the work tree, ignoring dirty submodules.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if git cannot be run or exits unsuccessfully.
    pub fn status(&self) -> Result<String, GitError> {
        self.capture(&["status", "--porcelain", "--ignore-submodules=dirty"])
    }

    /// Whether the work tree has any change git reports.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the status query fails.
    pub fn has_changes(&self) -> Result<bool, GitError> {
        Ok(!self.status()?.trim_end().is_empty())
    }

    /// Stage every change in the work tree.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if `git add` fails.
    pub fn add_all(&self) -> Result<(), GitError> {
        self.run(&["add", "--all"])
    }

    /// Paths with staged changes, one per line of `git diff --name-only --staged`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the diff query fails.
    pub fn staged_paths(&self) -> Result<Vec<String>, GitError> {
        let out = self.capture(&["diff", "--name-only", "--staged"])?;
        Ok(out
            .lines()
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    /// Commit the staged changes of a single path.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if `git commit` fails.
    pub fn commit_path(&self, path: &str, message: &str) -> Result<(), GitError> {
        self.run(&["commit", "--message", message, "--quiet", "--", path])
    }
}
