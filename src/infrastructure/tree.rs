use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{
    InterpreterVersion, LintConfig, LintConfigError, TrackedFile, repository_name,
};

/// Errors that can occur when resolving or reading the two repository trees
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Usage: shared-config <target_directory_path> <reference_directory_path>")]
    Usage,

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid version in {}", path.display())]
    Version {
        path: PathBuf,
        #[source]
        source: regex::Error,
    },

    #[error("invalid lint configuration in {}", path.display())]
    LintConfig {
        path: PathBuf,
        #[source]
        source: LintConfigError,
    },
}

/// The target and reference checkouts a sync runs between
#[derive(Debug, Clone)]
pub struct SyncTrees {
    /// Checkout being updated
    target: PathBuf,
    /// Checkout holding the main configuration
    reference: PathBuf,
    /// Basename of `target`
    repository_name: String,
}

impl SyncTrees {
    /// Validate that both paths are existing directories.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Usage`] if either path is not a directory.
    pub fn resolve(target: &Path, reference: &Path) -> Result<Self, TreeError> {
        if !target.is_dir() || !reference.is_dir() {
            return Err(TreeError::Usage);
        }

        Ok(Self {
            target: target.to_path_buf(),
            reference: reference.to_path_buf(),
            repository_name: repository_name(target),
        })
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    #[must_use]
    pub fn reference(&self) -> &Path {
        &self.reference
    }

    /// Name matched against opt-out lists.
    #[must_use]
    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    /// Read a tracked file's source from the reference tree.
    fn read_source(&self, file: &TrackedFile) -> Result<(PathBuf, String), TreeError> {
        let path = self.reference.join(&file.source);
        debug!("Reading {}", path.display());
        let content = fs::read_to_string(&path).map_err(|source| TreeError::Read {
            path: path.clone(),
            source,
        })?;
        Ok((path, content))
    }

    /// Read the pinned interpreter version from the reference tree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Read`] if the version file cannot be read.
    pub fn interpreter_version(
        &self,
        file: &TrackedFile,
    ) -> Result<InterpreterVersion, TreeError> {
        let (path, content) = self.read_source(file)?;
        InterpreterVersion::parse(&content).map_err(|source| TreeError::Version { path, source })
    }

    /// Read the reference lint configuration with reference-only keys removed.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Read`] if the file cannot be read.
    /// Returns [`TreeError::LintConfig`] if it is not a plain YAML mapping.
    pub fn lint_config(&self, file: &TrackedFile) -> Result<LintConfig, TreeError> {
        let (path, content) = self.read_source(file)?;
        LintConfig::parse(&content)
            .and_then(LintConfig::without_excluded_keys)
            .map_err(|source| TreeError::LintConfig { path, source })
    }
}
