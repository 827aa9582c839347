use regex::Regex;
use std::fmt;

/// Trailing build number appended to portable interpreter versions, e.g. `3.4.8_1`.
const BUILD_SUFFIX: &str = r"_\d+$";

/// Interpreter version pinned by the reference repository, without its build suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterVersion(String);

impl InterpreterVersion {
    /// Parse the raw contents of a version file.
    ///
    /// Trailing whitespace is trimmed and a single `_<digits>` suffix is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the suffix pattern fails to compile.
    pub fn parse(raw: &str) -> Result<Self, regex::Error> {
        let trimmed = raw.trim_end();
        let re = Regex::new(BUILD_SUFFIX)?;
        Ok(Self(re.replace(trimmed, "").into_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Contents of a version pin file: the version followed by a newline.
    #[must_use]
    pub fn to_file_contents(&self) -> String {
        format!("{}\n", self.0)
    }
}

impl fmt::Display for InterpreterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_build_suffix() {
        let version = InterpreterVersion::parse("3.4.8_1\n").unwrap();
        assert_eq!(version.as_str(), "3.4.8");
    }

    #[test]
    fn keeps_version_without_suffix() {
        let version = InterpreterVersion::parse("3.3.6\n").unwrap();
        assert_eq!(version.as_str(), "3.3.6");
    }

    #[test]
    fn trims_trailing_whitespace_before_stripping() {
        let version = InterpreterVersion::parse("3.4.8_12  \r\n").unwrap();
        assert_eq!(version.as_str(), "3.4.8");
    }

    #[test]
    fn only_strips_numeric_suffix() {
        let version = InterpreterVersion::parse("3.4.8_rc\n").unwrap();
        assert_eq!(version.as_str(), "3.4.8_rc");
    }

    #[test]
    fn only_strips_one_suffix() {
        let version = InterpreterVersion::parse("3.4.8_1_2").unwrap();
        assert_eq!(version.as_str(), "3.4.8_1");
    }

    #[test]
    fn file_contents_end_with_single_newline() {
        let version = InterpreterVersion::parse("3.4.8_1\n\n").unwrap();
        assert_eq!(version.to_file_contents(), "3.4.8\n");
    }
}
