//! forksync core library.
//!
//! This crate provides the selective synchronization engine for keeping a
//! fork in step with its upstream: exclusion rules, merge protection,
//! change-set resolution, the version-control backend seam, and the
//! interactive sync workflow.

pub mod backend;
pub mod changeset;
pub mod config;
pub mod errors;
pub mod git;
pub mod protection;
pub mod rules;
pub mod workflow;

#[cfg(test)]
mod testing;

// Re-exports for convenience.
pub use backend::VersionControl;
pub use changeset::{ChangeSet, ChangeSetResolver};
pub use config::SyncConfig;
pub use git::GitClient;
pub use protection::MergeProtector;
pub use rules::ExclusionRuleSet;
pub use workflow::{Outcome, SyncWorkflow};
