//! The version-control backend seam.
//!
//! The synchronization engine never shells out on its own. Everything it
//! needs from the repository goes through [`VersionControl`], which
//! [`crate::git::GitClient`] implements for real working copies and the test
//! suite implements with in-memory fakes.

use crate::errors::BackendError;

/// Arguments for [`VersionControl::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRequest<'a> {
    /// Ref to merge into the current branch.
    pub reference: &'a str,
    /// Stage the result without creating a merge commit.
    pub no_commit: bool,
    /// Always create a merge, even when a fast-forward is possible.
    pub no_fast_forward: bool,
}

impl<'a> MergeRequest<'a> {
    /// A staged, non-fast-forward merge of `reference`.
    pub fn staged(reference: &'a str) -> Self {
        Self {
            reference,
            no_commit: true,
            no_fast_forward: true,
        }
    }
}

/// Arguments for [`VersionControl::checkout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutRequest<'a> {
    /// Ref to read the paths from.
    pub reference: &'a str,
    /// Paths or pathspecs to restore into the working copy.
    pub paths: &'a [&'a str],
}

/// Operations the synchronization engine consumes from the backend.
///
/// Every call is blocking; exit status and captured output are the only
/// signals.
pub trait VersionControl {
    /// Fetch from a named remote.
    fn fetch(&self, remote: &str) -> Result<(), BackendError>;

    /// One-line summary of the commit `reference` points at.
    fn latest_commit(&self, reference: &str) -> Result<Option<String>, BackendError>;

    /// Paths that differ between two refs, in backend order.
    fn diff_paths(&self, from: &str, to: &str) -> Result<Vec<String>, BackendError>;

    /// Textual patch for one path. Empty for binary or unchanged files.
    fn diff_text(&self, from: &str, to: &str, path: &str) -> Result<String, BackendError>;

    /// Merge a ref into the working copy. Conflicts surface as an error.
    fn merge(&self, request: &MergeRequest<'_>) -> Result<(), BackendError>;

    /// Restore paths from a ref into the working copy.
    fn checkout(&self, request: &CheckoutRequest<'_>) -> Result<(), BackendError>;

    /// Whether `path` is tracked in the tree `reference` points at.
    fn path_exists(&self, reference: &str, path: &str) -> Result<bool, BackendError>;

    /// Drop paths from the index and the working copy.
    fn remove(&self, paths: &[&str]) -> Result<(), BackendError>;

    /// Paths currently in an unresolved merge state.
    fn list_unmerged(&self) -> Result<Vec<String>, BackendError>;

    /// Human-readable working-copy state.
    fn status(&self) -> Result<String, BackendError>;

    /// Current value of a backend-global setting.
    fn config_value(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Persist a backend-global setting.
    fn configure(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// URL of a remote, or `None` if it is not configured.
    fn remote_url(&self, name: &str) -> Result<Option<String>, BackendError>;

    /// Register a new remote.
    fn add_remote(&self, name: &str, url: &str) -> Result<(), BackendError>;
}
