use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{FileKind, TrackedFile};

/// Tracked file table compiled into the binary.
const TRACKED_FILES: &str = include_str!("tracked_files.toml");

/// Errors that can occur when loading the tracked file table
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse tracked file table")]
    Parse(#[source] Box<toml::de::Error>),

    #[error("invalid tracked file table: {0}")]
    Validation(String),
}

/// Runtime settings loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Whether the process runs under GitHub Actions
    pub github_actions: bool,
    /// File receiving step outputs when running under GitHub Actions
    pub github_output: Option<PathBuf>,
}

impl Settings {
    /// Load settings from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            github_actions: env::var_os("GITHUB_ACTIONS").is_some(),
            github_output: env::var_os("GITHUB_OUTPUT").map(PathBuf::from),
        }
    }
}

// ---- TOML wire types ----

/// One `[[file]]` entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTrackedFile {
    /// Path in the target repository
    path: PathBuf,
    /// Path in the reference repository, defaults to `path`
    #[serde(default)]
    source: Option<PathBuf>,
    /// How the contents are produced
    kind: FileKind,
    /// Repository names exempt from this file
    #[serde(default)]
    opt_out: Vec<String>,
}

/// The whole tracked file table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TrackedFilesData {
    /// Entries in sync order
    #[serde(default, rename = "file")]
    files: Vec<TomlTrackedFile>,
}

/// Ordered list of files synced into target repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFiles(Vec<TrackedFile>);

impl TrackedFiles {
    /// The table compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded table is invalid.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::parse(TRACKED_FILES)
    }

    /// Parse a tracked file table from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is invalid.
    /// Returns [`ConfigError::Validation`] if the table is empty, lists a path twice,
    /// names an absolute path or tracks more than one file of a derived kind.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let data: TrackedFilesData =
            toml::from_str(content).map_err(|source| ConfigError::Parse(Box::new(source)))?;

        if data.files.is_empty() {
            return Err(ConfigError::Validation("no tracked files".to_owned()));
        }

        let mut seen = HashSet::new();
        let mut derived_kinds = HashSet::new();
        let mut files = Vec::with_capacity(data.files.len());
        for entry in data.files {
            let absolute_source = entry.source.as_ref().is_some_and(|s| s.is_absolute());
            if entry.path.is_absolute() || absolute_source {
                return Err(ConfigError::Validation(format!(
                    "\"{}\" must be relative to the repository root",
                    entry.path.display()
                )));
            }
            if !seen.insert(entry.path.clone()) {
                return Err(ConfigError::Validation(format!(
                    "\"{}\" is listed more than once",
                    entry.path.display()
                )));
            }

            if entry.kind != FileKind::Copy && !derived_kinds.insert(entry.kind) {
                return Err(ConfigError::Validation(format!(
                    "only one {} file can be tracked",
                    entry.kind
                )));
            }

            let mut file = TrackedFile::new(entry.path, entry.kind).with_opt_out(entry.opt_out);
            if let Some(source) = entry.source {
                file = file.with_source(source);
            }
            files.push(file);
        }

        Ok(Self(files))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedFile> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// All application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub tracked_files: TrackedFiles,
}

impl Config {
    /// Load settings from the environment and the built-in tracked file table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the tracked file table is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            settings: Settings::from_env(),
            tracked_files: TrackedFiles::builtin()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn settings_default_is_not_ci() {
        let settings = Settings::default();
        assert!(!settings.github_actions);
        assert!(settings.github_output.is_none());
    }

    #[test]
    fn builtin_table_lists_files_in_order() {
        let files = TrackedFiles::builtin().unwrap();
        let paths: Vec<&Path> = files.iter().map(|f| f.path.as_path()).collect();
        assert_eq!(
            paths,
            vec![
                Path::new(".ruby-version"),
                Path::new(".rubocop.yml"),
                Path::new(".github/dependabot.yml"),
                Path::new(".github/workflows/lock-threads.yml"),
                Path::new(".github/workflows/stale-issues.yml"),
            ]
        );
    }

    #[test]
    fn builtin_table_kinds_and_sources() {
        let files: Vec<TrackedFile> = TrackedFiles::builtin().unwrap().iter().cloned().collect();

        assert_eq!(files[0].kind, FileKind::VersionPin);
        assert_eq!(
            files[0].source,
            Path::new("Library/Homebrew/vendor/portable-ruby-version")
        );
        assert_eq!(files[1].kind, FileKind::LintConfig);
        assert_eq!(files[1].source, Path::new("Library/.rubocop.yml"));
        for file in &files[2..] {
            assert_eq!(file.kind, FileKind::Copy);
            assert_eq!(file.source, file.path);
        }
    }

    #[test]
    fn builtin_table_opt_out_lists() {
        let files: Vec<TrackedFile> = TrackedFiles::builtin().unwrap().iter().cloned().collect();

        assert!(files[0].is_opted_out("mass-bottling-tracker-private"));
        assert_eq!(files[0].opt_out.len(), 1);

        for repo in [
            "ci-orchestrator",
            "mass-bottling-tracker-private",
            "orka_api_client",
            "ruby-macho",
        ] {
            assert!(files[1].is_opted_out(repo), "{repo}");
        }
        assert_eq!(files[1].opt_out.len(), 4);

        for repo in ["brew", "brew-pip-audit", "ci-orchestrator"] {
            assert!(files[2].is_opted_out(repo), "{repo}");
        }
        assert_eq!(files[2].opt_out.len(), 3);

        assert!(files[3].opt_out.is_empty());
        assert!(files[4].opt_out.is_empty());
    }

    #[test]
    fn parse_rejects_duplicate_paths() {
        let content = r#"
[[file]]
path = ".ruby-version"
kind = "version-pin"

[[file]]
path = ".ruby-version"
kind = "copy"
"#;
        let result = TrackedFiles::parse(content);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn parse_rejects_second_derived_file() {
        let content = r#"
[[file]]
path = ".rubocop.yml"
kind = "lint-config"

[[file]]
path = "Library/.rubocop.yml"
kind = "lint-config"
"#;
        let result = TrackedFiles::parse(content);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn parse_rejects_unknown_kind() {
        let content = r#"
[[file]]
path = ".ruby-version"
kind = "symlink"
"#;
        let result = TrackedFiles::parse(content);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn parse_rejects_empty_table() {
        let result = TrackedFiles::parse("");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn parse_rejects_absolute_paths() {
        let content = r#"
[[file]]
path = "/etc/passwd"
kind = "copy"
"#;
        let result = TrackedFiles::parse(content);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
