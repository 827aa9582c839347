use log::debug;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Settings;

/// Step output announcing that commits were created.
pub const PULL_REQUEST_OUTPUT: &str = "pull_request=true";

/// Errors that can occur when reporting to the CI runner
#[derive(Debug, Error)]
pub enum CiError {
    #[error("GITHUB_OUTPUT must be set when GITHUB_ACTIONS is set")]
    MissingOutput,

    #[error("failed to write CI output: {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tell the CI runner a pull request should be opened.
///
/// Appends [`PULL_REQUEST_OUTPUT`] to the step output file. Does nothing
/// outside GitHub Actions. Returns whether the output was written.
///
/// # Errors
///
/// Returns [`CiError::MissingOutput`] if the output file variable is unset.
/// Returns [`CiError::Write`] if the output file cannot be appended to.
pub fn signal_pull_request(settings: &Settings) -> Result<bool, CiError> {
    if !settings.github_actions {
        return Ok(false);
    }

    let path = settings
        .github_output
        .as_ref()
        .ok_or(CiError::MissingOutput)?;

    debug!("Appending {PULL_REQUEST_OUTPUT} to {}", path.display());
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{PULL_REQUEST_OUTPUT}"))
        .map_err(|source| CiError::Write {
            path: path.clone(),
            source,
        })?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn no_op_outside_ci() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("output");
        let settings = Settings {
            github_actions: false,
            github_output: Some(output.clone()),
        };

        assert!(!signal_pull_request(&settings).unwrap());
        assert!(!output.exists());
    }

    #[test]
    fn appends_to_existing_output() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("output");
        fs::write(&output, "other=1\n").unwrap();
        let settings = Settings {
            github_actions: true,
            github_output: Some(output.clone()),
        };

        assert!(signal_pull_request(&settings).unwrap());
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "other=1\npull_request=true\n"
        );
    }

    #[test]
    fn requires_output_path_in_ci() {
        let settings = Settings {
            github_actions: true,
            github_output: None,
        };

        assert!(matches!(
            signal_pull_request(&settings),
            Err(CiError::MissingOutput)
        ));
    }
}
