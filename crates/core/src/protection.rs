//! Merge protection for excluded paths.
//!
//! The [`MergeProtector`] projects every exclusion rule into a
//! `<pattern> merge=<driver>` line of the attributes file and registers the
//! driver as a no-op (`merge.<driver>.driver = true`), so a three-way merge
//! keeps the fork's side of every protected path.
//!
//! Both pieces are written only when absent. An existing attributes file is
//! the user's policy: it is audited, never rewritten.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::backend::VersionControl;
use crate::errors::BackendError;
use crate::rules::ExclusionRuleSet;

/// First line of a generated attributes file.
pub const ATTRIBUTES_HEADER: &str = "# forksync merge protection";

/// What [`MergeProtector::ensure_protection`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectionReport {
    /// The attributes file did not exist and was written.
    pub created_attributes: bool,
    /// The merge driver was not configured and was registered.
    pub registered_driver: bool,
    /// Rules an existing attributes file leaves unprotected.
    pub uncovered: Vec<String>,
}

/// Installs "keep ours" merge directives for every exclusion rule.
#[derive(Debug, Clone)]
pub struct MergeProtector<'a> {
    rules: &'a ExclusionRuleSet,
    attributes_path: PathBuf,
    driver: String,
}

impl<'a> MergeProtector<'a> {
    pub fn new(
        rules: &'a ExclusionRuleSet,
        attributes_path: impl Into<PathBuf>,
        driver: impl Into<String>,
    ) -> Self {
        Self {
            rules,
            attributes_path: attributes_path.into(),
            driver: driver.into(),
        }
    }

    pub fn rules(&self) -> &'a ExclusionRuleSet {
        self.rules
    }

    pub fn attributes_path(&self) -> &Path {
        &self.attributes_path
    }

    /// Config key registering the driver, e.g. `merge.ours.driver`.
    pub fn driver_key(&self) -> String {
        format!("merge.{}.driver", self.driver)
    }

    /// Attributes file content for the current rule set.
    pub fn render_attributes(&self) -> String {
        let mut content = format!("{}\n", ATTRIBUTES_HEADER);
        for rule in self.rules.rules() {
            content.push_str(&format!("{} merge={}\n", rule.attribute_pattern(), self.driver));
        }
        content
    }

    /// Write the attributes file and register the driver, each only if absent.
    pub fn ensure_protection<B: VersionControl>(
        &self,
        backend: &B,
    ) -> Result<ProtectionReport, BackendError> {
        let mut report = ProtectionReport::default();

        if self.attributes_path.exists() {
            let existing = std::fs::read_to_string(&self.attributes_path)?;
            report.uncovered = self.uncovered_rules(&existing);
            for pattern in &report.uncovered {
                warn!(
                    pattern = pattern.as_str(),
                    path = %self.attributes_path.display(),
                    "existing attributes file does not protect this rule"
                );
            }
            debug!("attributes file already present; left untouched");
        } else {
            if let Some(parent) = self.attributes_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&self.attributes_path, self.render_attributes())?;
            report.created_attributes = true;
            info!(
                path = %self.attributes_path.display(),
                rules = self.rules.len(),
                "created merge protection attributes"
            );
        }

        let key = self.driver_key();
        if backend.config_value(&key)?.is_none() {
            backend.configure(&key, "true")?;
            report.registered_driver = true;
        } else {
            debug!(key = key.as_str(), "merge driver already configured");
        }

        Ok(report)
    }

    /// Rules with no `merge=<driver>` line covering their probe path.
    fn uncovered_rules(&self, attributes: &str) -> Vec<String> {
        let needle = format!("merge={}", self.driver);
        let patterns: Vec<&str> = attributes
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let pattern = fields.next()?;
                fields.any(|attr| attr == needle).then_some(pattern)
            })
            .collect();

        self.rules
            .rules()
            .iter()
            .filter(|rule| {
                let probe = rule.probe_path();
                !patterns
                    .iter()
                    .any(|pattern| glob_match::glob_match(pattern.trim_start_matches('/'), &probe))
            })
            .map(|rule| rule.pattern())
            .collect()
    }
}
