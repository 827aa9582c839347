#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub const PORTABLE_RUBY_VERSION: &str = "3.4.8_1\n";

pub const RUBOCOP_YML: &str = "\
inherit_from: ./.rubocop_todo.yml
require:
  - ./Homebrew/rubocops.rb
AllCops:
  TargetRubyVersion: 3.4
  NewCops: enable
Cask/Desc:
  Enabled: true
FormulaAudit/Homepage:
  Enabled: true
Homebrew/CompactBlocks:
  Enabled: true
Layout/LineLength:
  Max: 118
  AllowedPatterns:
    - !ruby/regexp /\\A\\s*#/
Performance/Caller:
  Enabled: false
RSpec/ExampleLength:
  Max: 50
Sorbet/StrictSigil:
  Enabled: true
Style/ClassAndModuleChildren:
  EnforcedStyle: :compact
Style/Documentation:
  Enabled: false
";

pub const DEPENDABOT_YML: &str = "\
version: 2
updates:
  - package-ecosystem: github-actions
    directory: /
";

pub const LOCK_THREADS_YML: &str = "\
name: Lock closed issues
on:
  schedule:
    - cron: 0 0 * * *
";

pub const STALE_ISSUES_YML: &str = "\
name: Manage stale issues
on:
  schedule:
    - cron: 0 0 * * *
";

/// Scratch reference and target checkouts.
pub struct Fixture {
    _temp_dir: TempDir,
    pub reference: PathBuf,
    pub target: PathBuf,
}

impl Fixture {
    /// Create a reference tree and an empty target git repository named `target_name`.
    pub fn new(target_name: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let reference = temp_dir.path().join("reference");
        let target = temp_dir.path().join(target_name);

        write_file(
            &reference,
            "Library/Homebrew/vendor/portable-ruby-version",
            PORTABLE_RUBY_VERSION,
        );
        write_file(&reference, "Library/.rubocop.yml", RUBOCOP_YML);
        write_file(&reference, ".github/dependabot.yml", DEPENDABOT_YML);
        write_file(
            &reference,
            ".github/workflows/lock-threads.yml",
            LOCK_THREADS_YML,
        );
        write_file(
            &reference,
            ".github/workflows/stale-issues.yml",
            STALE_ISSUES_YML,
        );

        fs::create_dir_all(&target).unwrap();
        git(&target, &["init", "--quiet"]);
        git(&target, &["config", "user.name", "Test"]);
        git(&target, &["config", "user.email", "test@example.com"]);
        git(&target, &["config", "commit.gpgsign", "false"]);
        write_file(&target, "README.md", "# test\n");
        git(&target, &["add", "README.md"]);
        git(&target, &["commit", "--quiet", "--message", "Initial commit"]);

        Self {
            _temp_dir: temp_dir,
            reference,
            target,
        }
    }

    /// Commit a file in the target repository outside the sync.
    pub fn commit_target_file(&self, relative: &str, contents: &str) {
        write_file(&self.target, relative, contents);
        git(&self.target, &["add", relative]);
        git(
            &self.target,
            &["commit", "--quiet", "--message", "Add local file"],
        );
    }

    pub fn read_target(&self, relative: &str) -> String {
        fs::read_to_string(self.target.join(relative)).unwrap()
    }

    pub fn commit_count(&self) -> usize {
        git(&self.target, &["rev-list", "--count", "HEAD"])
            .trim()
            .parse()
            .unwrap()
    }

    /// Subject lines of the `n` most recent commits, newest first.
    pub fn recent_subjects(&self, n: usize) -> Vec<String> {
        git(
            &self.target,
            &["log", &format!("-{n}"), "--format=%s"],
        )
        .lines()
        .map(ToOwned::to_owned)
        .collect()
    }

    /// Paths touched by a commit.
    pub fn files_in_commit(&self, rev: &str) -> Vec<String> {
        git(
            &self.target,
            &["show", "--name-only", "--format=", rev],
        )
        .lines()
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
    }

    pub fn is_clean(&self) -> bool {
        git(&self.target, &["status", "--porcelain"]).trim().is_empty()
    }
}

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Run git in `dir`, panicking on failure, and return stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}
