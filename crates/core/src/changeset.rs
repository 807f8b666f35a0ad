//! Eligible change sets.
//!
//! [`ChangeSetResolver`] asks the backend which paths differ between the fork
//! and upstream and drops every path an exclusion rule protects. The result,
//! a [`ChangeSet`], is recomputed after every fetch and never cached.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::backend::VersionControl;
use crate::errors::BackendError;
use crate::rules::ExclusionRuleSet;

/// Group key for files at the repository root.
pub const ROOT_GROUP: &str = "(root)";

/// Extension bucket for files without one.
pub const NO_EXTENSION: &str = "(no extension)";

/// Ordered list of paths eligible for synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    files: Vec<String>,
}

impl ChangeSet {
    pub fn new(files: Vec<String>) -> Self {
        Self { files }
    }

    /// Paths in backend order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths grouped by first path component, both levels sorted.
    pub fn groups(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for file in &self.files {
            let group = match file.split_once('/') {
                Some((first, _)) => first.to_string(),
                None => ROOT_GROUP.to_string(),
            };
            groups.entry(group).or_default().push(file.clone());
        }
        for files in groups.values_mut() {
            files.sort();
        }
        groups
    }

    /// File count per extension (e.g. `.rs`).
    pub fn extension_summary(&self) -> BTreeMap<String, usize> {
        let mut summary = BTreeMap::new();
        for file in &self.files {
            let name = file.rsplit('/').next().unwrap_or(file);
            let ext = match name.rfind('.') {
                Some(idx) if idx > 0 => name[idx..].to_string(),
                _ => NO_EXTENSION.to_string(),
            };
            *summary.entry(ext).or_insert(0) += 1;
        }
        summary
    }
}

/// Line counts of a textual patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
}

/// Count added and removed lines, ignoring `+++`/`---` file headers.
pub fn diff_stats(patch: &str) -> DiffStats {
    let mut stats = DiffStats::default();
    for line in patch.lines() {
        if line.starts_with('+') && !line.starts_with("+++") {
            stats.added += 1;
        } else if line.starts_with('-') && !line.starts_with("---") {
            stats.removed += 1;
        }
    }
    stats
}

/// Computes the eligible [`ChangeSet`] between two refs.
#[derive(Debug, Clone, Copy)]
pub struct ChangeSetResolver<'a> {
    rules: &'a ExclusionRuleSet,
}

impl<'a> ChangeSetResolver<'a> {
    pub fn new(rules: &'a ExclusionRuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &'a ExclusionRuleSet {
        self.rules
    }

    /// Diff `local_ref` against `upstream_ref` and drop excluded paths.
    pub fn resolve<B: VersionControl>(
        &self,
        backend: &B,
        local_ref: &str,
        upstream_ref: &str,
    ) -> Result<ChangeSet, BackendError> {
        let raw = backend.diff_paths(local_ref, upstream_ref)?;
        let total = raw.len();
        let files: Vec<String> = raw
            .into_iter()
            .filter(|path| {
                let excluded = self.rules.is_excluded(path);
                if excluded {
                    debug!(path = path.as_str(), "excluded from change set");
                }
                !excluded
            })
            .collect();
        info!(total, eligible = files.len(), "change set resolved");
        Ok(ChangeSet::new(files))
    }
}
