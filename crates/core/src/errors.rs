//! Error types for the forksync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// Errors from the version-control backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The `git` binary was not found on `$PATH`.
    #[error("{0} binary not found")]
    BinaryNotFound(String),

    /// The path is not inside a working copy.
    #[error("no git working copy found at '{0}'")]
    RepositoryNotFound(String),

    /// A backend command exited with a non-zero status.
    #[error("`{command}` failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Generic I/O wrapper.
    #[error("backend I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Rule errors
// ---------------------------------------------------------------------------

/// Errors raised while building the exclusion rule set.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule with no path in it.
    #[error("exclusion rule #{index} is empty")]
    EmptyPattern { index: usize },

    /// A rule using regex features beyond anchored literals.
    #[error("unsupported exclusion rule '{pattern}': {detail}")]
    UnsupportedPattern { pattern: String, detail: String },

    /// An anchored rule that is neither a directory nor an exact file.
    #[error("ambiguous exclusion rule '{0}': end it with '/' for a directory or '$' for a file")]
    AmbiguousPattern(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Workflow errors
// ---------------------------------------------------------------------------

/// Errors from the interactive synchronization workflow.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A state-machine transition was invalid.
    #[error("invalid sync state transition from {from} on {event}")]
    InvalidStateTransition { from: String, event: String },

    /// Reading operator input failed.
    #[error("operator input error: {0}")]
    Input(#[from] std::io::Error),

    /// Underlying backend error the workflow could not recover from.
    #[error("sync backend error: {0}")]
    Backend(#[from] BackendError),
}
