//! Git backend for forksync.
//!
//! Repository discovery, configuration and remotes go through `git2`.
//! Fetch, diff, merge, checkout and status run the `git` CLI so that
//! credential helpers, merge drivers and `.gitattributes` behave exactly as
//! they do for the user.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use git2::{ErrorCode, Repository};
use tracing::{debug, info, instrument, warn};

use crate::backend::{CheckoutRequest, MergeRequest, VersionControl};
use crate::errors::BackendError;

/// High-level Git client wrapping a `git2::Repository` and the `git` binary.
pub struct GitClient {
    repo: Repository,
    workdir: PathBuf,
}

impl GitClient {
    /// Open the working copy containing `path`.
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening git working copy");
        let repo = Repository::discover(path)
            .map_err(|_| BackendError::RepositoryNotFound(path.display().to_string()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| BackendError::RepositoryNotFound(path.display().to_string()))?
            .to_path_buf();
        Ok(Self { repo, workdir })
    }

    /// Root of the working copy.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Check that the `git` binary is runnable and return its version line.
    pub fn preflight() -> Result<String, BackendError> {
        let output = Command::new("git")
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BackendError::BinaryNotFound("git".into())
                } else {
                    BackendError::IoError(e)
                }
            })?;
        if !output.status.success() {
            return Err(BackendError::CommandFailed {
                command: "git --version".into(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(%version, "git preflight passed");
        Ok(version)
    }

    fn run_git(&self, args: &[&str]) -> Result<String, BackendError> {
        let command = format!("git {}", args.join(" "));
        debug!(cmd = %command, "running git command");

        let output = Command::new("git")
            .current_dir(&self.workdir)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BackendError::BinaryNotFound("git".into())
                } else {
                    BackendError::IoError(e)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // Merge conflicts are reported on stdout.
            let stderr = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            warn!(exit_code, %stderr, cmd = %command, "git command failed");
            return Err(BackendError::CommandFailed {
                command,
                exit_code,
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Split NUL-separated `-z` output into paths.
fn split_nul(output: &str) -> Vec<String> {
    output
        .split('\0')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

impl VersionControl for GitClient {
    #[instrument(skip(self))]
    fn fetch(&self, remote: &str) -> Result<(), BackendError> {
        info!(remote, "fetching");
        self.run_git(&["fetch", remote])?;
        debug!("fetch completed");
        Ok(())
    }

    fn latest_commit(&self, reference: &str) -> Result<Option<String>, BackendError> {
        let line = self.run_git(&["log", "-1", "--oneline", reference])?;
        let line = line.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }

    #[instrument(skip(self))]
    fn diff_paths(&self, from: &str, to: &str) -> Result<Vec<String>, BackendError> {
        let range = format!("{}..{}", from, to);
        let paths = split_nul(&self.run_git(&["diff", "--name-only", "-z", &range])?);
        debug!(count = paths.len(), "collected differing paths");
        Ok(paths)
    }

    fn diff_text(&self, from: &str, to: &str, path: &str) -> Result<String, BackendError> {
        let range = format!("{}..{}", from, to);
        self.run_git(&["diff", "--no-color", &range, "--", path])
    }

    #[instrument(skip(self))]
    fn merge(&self, request: &MergeRequest<'_>) -> Result<(), BackendError> {
        let mut args = vec!["merge"];
        if request.no_commit {
            args.push("--no-commit");
        }
        if request.no_fast_forward {
            args.push("--no-ff");
        }
        args.push(request.reference);
        self.run_git(&args)?;
        info!(reference = request.reference, "merge staged");
        Ok(())
    }

    #[instrument(skip(self))]
    fn checkout(&self, request: &CheckoutRequest<'_>) -> Result<(), BackendError> {
        let mut args = vec!["checkout", request.reference, "--"];
        args.extend_from_slice(request.paths);
        self.run_git(&args)?;
        debug!(count = request.paths.len(), "paths checked out");
        Ok(())
    }

    fn path_exists(&self, reference: &str, path: &str) -> Result<bool, BackendError> {
        let tree = self.repo.revparse_single(reference)?.peel_to_tree()?;
        match tree.get_path(Path::new(path)) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    fn remove(&self, paths: &[&str]) -> Result<(), BackendError> {
        let mut args = vec!["rm", "-q", "-f", "--ignore-unmatch", "--"];
        args.extend_from_slice(paths);
        self.run_git(&args)?;
        debug!(count = paths.len(), "paths removed");
        Ok(())
    }

    fn list_unmerged(&self) -> Result<Vec<String>, BackendError> {
        Ok(split_nul(&self.run_git(&[
            "diff",
            "--name-only",
            "--diff-filter=U",
            "-z",
        ])?))
    }

    fn status(&self) -> Result<String, BackendError> {
        self.run_git(&["status"])
    }

    fn config_value(&self, key: &str) -> Result<Option<String>, BackendError> {
        let config = self.repo.config()?;
        match config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    fn configure(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut config = self.repo.config()?;
        config.set_str(key, value)?;
        info!(key, value, "git config updated");
        Ok(())
    }

    fn remote_url(&self, name: &str) -> Result<Option<String>, BackendError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    fn add_remote(&self, name: &str, url: &str) -> Result<(), BackendError> {
        self.repo.remote(name, url)?;
        info!(name, url, "added remote");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        GitClient::preflight().is_ok()
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .current_dir(dir)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .expect("failed to run git");
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-q", "-b", "main"]);
        git(dir, &["config", "user.name", "Test"]);
        git(dir, &["config", "user.email", "test@test.com"]);
    }

    #[test]
    fn test_split_nul() {
        assert_eq!(split_nul("a.txt\0dir/b c.txt\0"), vec!["a.txt", "dir/b c.txt"]);
        assert!(split_nul("").is_empty());
    }

    #[test]
    fn test_repo_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            GitClient::discover(dir.path()),
            Err(BackendError::RepositoryNotFound(_))
        ));
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        std::fs::create_dir_all(dir.path().join("src/deep")).unwrap();
        let client = GitClient::discover(dir.path().join("src/deep")).unwrap();
        assert_eq!(
            client.workdir().canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let client = GitClient::discover(dir.path()).unwrap();
        assert_eq!(client.config_value("merge.ours.driver").unwrap(), None);
        client.configure("merge.ours.driver", "true").unwrap();
        assert_eq!(
            client.config_value("merge.ours.driver").unwrap().as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_remote_lookup_and_add() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let client = GitClient::discover(dir.path()).unwrap();
        assert_eq!(client.remote_url("upstream").unwrap(), None);
        client
            .add_remote("upstream", "https://example.com/upstream.git")
            .unwrap();
        assert_eq!(
            client.remote_url("upstream").unwrap().as_deref(),
            Some("https://example.com/upstream.git")
        );
    }

    #[test]
    fn test_diff_paths_and_unmerged() {
        if !git_available() {
            eprintln!("git not installed; skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "init"]);
        git(dir.path(), &["branch", "other"]);
        git(dir.path(), &["checkout", "-q", "other"]);
        std::fs::write(dir.path().join("a.txt"), "two\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "new\n").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "change"]);
        git(dir.path(), &["checkout", "-q", "main"]);

        let client = GitClient::discover(dir.path()).unwrap();
        assert_eq!(client.diff_paths("HEAD", "other").unwrap(), vec!["a.txt", "b.txt"]);
        let patch = client.diff_text("HEAD", "other", "a.txt").unwrap();
        assert!(patch.contains("+two"));
        assert!(client.list_unmerged().unwrap().is_empty());
        assert!(client.latest_commit("other").unwrap().unwrap().contains("change"));

        client
            .checkout(&CheckoutRequest {
                reference: "other",
                paths: &["b.txt"],
            })
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "new\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one\n");

        assert!(client.path_exists("other", "b.txt").unwrap());
        assert!(!client.path_exists("HEAD", "b.txt").unwrap());
        client.remove(&["b.txt"]).unwrap();
        assert!(!dir.path().join("b.txt").exists());
    }

    #[test]
    fn test_failed_command_reports_exit_code() {
        if !git_available() {
            eprintln!("git not installed; skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let client = GitClient::discover(dir.path()).unwrap();
        let err = client.fetch("nonexistent-remote").unwrap_err();
        assert!(matches!(err, BackendError::CommandFailed { exit_code, .. } if exit_code != 0));
    }
}
