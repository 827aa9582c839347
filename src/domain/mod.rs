pub mod lint_config;
pub mod tracked_file;
pub mod version;

pub use lint_config::{LintConfig, LintConfigError, LintMapping, LintValue};
pub use tracked_file::{
    DerivedContents, FileKind, SkipReason, SyncAction, TrackedFile, commit_message,
    repository_name,
};
pub use version::InterpreterVersion;
