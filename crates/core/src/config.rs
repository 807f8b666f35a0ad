//! Configuration for forksync.
//!
//! Every field has a default, so a missing configuration file is not an
//! error: the tool then runs with the built-in upstream address and
//! exclusion list.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::rules::ExclusionRuleSet;

/// Upstream address offered when the remote is missing and no other URL is
/// configured.
pub const DEFAULT_UPSTREAM_URL: &str = "https://github.com/Shasnow/StarRailAssistant.git";

/// Environment variable overriding `upstream.url`.
pub const UPSTREAM_URL_ENV: &str = "FORKSYNC_UPSTREAM_URL";

/// Environment variable overriding `editor.command`.
pub const EDITOR_ENV: &str = "FORKSYNC_EDITOR";

/// File name looked up at the working-copy root.
pub const REPO_CONFIG_FILE: &str = ".forksync.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level forksync configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub local: LocalConfig,

    #[serde(default)]
    pub protection: ProtectionConfig,

    #[serde(default)]
    pub editor: EditorConfig,
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// Where upstream changes come from.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Remote name (default `upstream`).
    #[serde(default = "default_remote")]
    pub remote: String,

    /// URL offered when the remote does not exist yet.
    #[serde(default = "default_upstream_url")]
    pub url: String,

    /// Upstream branch to track (default `main`).
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl UpstreamConfig {
    /// Remote-tracking ref, e.g. `upstream/main`.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            url: default_upstream_url(),
            branch: default_branch(),
        }
    }
}

fn default_remote() -> String {
    "upstream".into()
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.into()
}

fn default_branch() -> String {
    "main".into()
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

/// The fork side of the comparison.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    /// Ref compared against upstream and restored after merges (default `HEAD`).
    #[serde(default = "default_local_reference")]
    pub reference: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            reference: default_local_reference(),
        }
    }
}

fn default_local_reference() -> String {
    "HEAD".into()
}

// ---------------------------------------------------------------------------
// Protection
// ---------------------------------------------------------------------------

/// Paths the fork owns and how merges are told to keep them.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectionConfig {
    /// Exclusion rules, literal (`setup/`) or anchored (`^README\.md$`).
    #[serde(default = "default_excluded")]
    pub excluded: Vec<String>,

    /// Name of the "keep ours" merge driver.
    #[serde(default = "default_merge_driver")]
    pub merge_driver: String,

    /// Attributes file, relative to the working-copy root.
    #[serde(default = "default_attributes_file")]
    pub attributes_file: PathBuf,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            excluded: default_excluded(),
            merge_driver: default_merge_driver(),
            attributes_file: default_attributes_file(),
        }
    }
}

fn default_excluded() -> Vec<String> {
    [
        ".github/",
        "SRAFrontend/",
        "setup/",
        "README.md",
        "package.py",
        ".gitignore",
        ".gitattributes",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_merge_driver() -> String {
    "ours".into()
}

fn default_attributes_file() -> PathBuf {
    PathBuf::from(".gitattributes")
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

/// Editor used to open conflicted files.
#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_editor")]
    pub command: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command: default_editor(),
        }
    }
}

fn default_editor() -> String {
    "code".into()
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Load a [`SyncConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: SyncConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Apply environment overrides on top of the file values.
    pub fn resolve_env_vars(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(UPSTREAM_URL_ENV) {
            debug!(env = UPSTREAM_URL_ENV, "upstream url overridden from environment");
            self.upstream.url = url;
        }
        if let Some(editor) = non_empty(EDITOR_ENV) {
            debug!(env = EDITOR_ENV, "editor overridden from environment");
            self.editor.command = editor;
        }
    }

    /// Validate that all fields are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let remote = &self.upstream.remote;
        if remote.is_empty() || remote.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                field: "upstream.remote".into(),
                detail: "remote name must be non-empty and contain no whitespace".into(),
            });
        }
        if self.upstream.branch.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "upstream.branch".into(),
                detail: "upstream branch must not be empty".into(),
            });
        }
        if self.local.reference.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "local.reference".into(),
                detail: "local reference must not be empty".into(),
            });
        }
        let driver = &self.protection.merge_driver;
        if driver.is_empty()
            || !driver
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidValue {
                field: "protection.merge_driver".into(),
                detail: "driver name may only contain letters, digits, '-' and '_'".into(),
            });
        }
        let attributes = &self.protection.attributes_file;
        if attributes.as_os_str().is_empty() || attributes.is_absolute() {
            return Err(ConfigError::InvalidValue {
                field: "protection.attributes_file".into(),
                detail: "attributes file must be a path relative to the working copy".into(),
            });
        }
        self.rule_set()?;
        Ok(())
    }

    /// Build the exclusion rule set described by `protection.excluded`.
    pub fn rule_set(&self) -> Result<ExclusionRuleSet, ConfigError> {
        ExclusionRuleSet::new(&self.protection.excluded).map_err(|e| ConfigError::InvalidValue {
            field: "protection.excluded".into(),
            detail: e.to_string(),
        })
    }

    /// Load `path` if given, otherwise fall back to defaults; then resolve
    /// environment overrides and validate.
    pub fn load_and_resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                info!("no configuration file; using defaults");
                Self::default()
            }
        };
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# forksync configuration
# Place at the working-copy root as .forksync.toml.

[upstream]
remote = "upstream"
url = "https://github.com/Shasnow/StarRailAssistant.git"  # or FORKSYNC_UPSTREAM_URL
branch = "main"

[local]
reference = "HEAD"

[protection]
# Trailing '/' protects a whole directory; anything else is an exact file.
excluded = [
    ".github/",
    "SRAFrontend/",
    "setup/",
    "README.md",
    "package.py",
    ".gitignore",
    ".gitattributes",
]
merge_driver = "ours"
attributes_file = ".gitattributes"

[editor]
command = "code"  # or FORKSYNC_EDITOR
"#
    }
}
