//! Exclusion rules for fork-owned paths.
//!
//! An [`ExclusionRuleSet`] holds the ordered list of [`PathRule`]s that name
//! files and directories upstream synchronization must never overwrite.
//!
//! # Pattern grammar
//!
//! | Spelling | Example | Kind |
//! |----------|---------|------|
//! | literal, trailing `/` | `setup/` | directory |
//! | literal | `README.md` | exact file |
//! | anchored regex, trailing `/` | `^\.github/` | directory |
//! | anchored regex, trailing `$` | `^README\.md$` | exact file |
//!
//! A directory rule excludes every path below it and nothing else:
//! `setup/` excludes `setup/install.sh` but not `setup2/x.txt`.

use regex_lite::Regex;
use tracing::debug;

use crate::errors::RuleError;

/// Characters that would turn an anchored rule into a real regex.
const REGEX_METACHARS: &[char] = &['*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '^', '$'];

/// Characters that `.gitattributes` would read as a glob.
const GLOB_METACHARS: &[char] = &['*', '?', '['];

// ---------------------------------------------------------------------------
// PathRule
// ---------------------------------------------------------------------------

/// What a rule protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Everything below a directory prefix.
    Directory,
    /// Exactly one path.
    File,
}

/// A single exclusion rule.
#[derive(Debug, Clone)]
pub struct PathRule {
    /// Normalized path, without the trailing `/` for directories.
    path: String,
    kind: RuleKind,
    matcher: Regex,
}

impl PathRule {
    /// Parse one rule in either the literal or the anchored-regex spelling.
    pub fn parse(pattern: &str) -> Result<Self, RuleError> {
        let raw = pattern.trim();

        let (literal, kind) = match raw.strip_prefix('^') {
            Some(anchored) => parse_anchored(raw, anchored)?,
            None => {
                if let Some(c) = raw.chars().find(|c| GLOB_METACHARS.contains(c)) {
                    return Err(RuleError::UnsupportedPattern {
                        pattern: pattern.to_string(),
                        detail: format!("glob character '{}' is not supported", c),
                    });
                }
                let literal = normalize(raw);
                match literal.strip_suffix('/') {
                    Some(dir) => (dir.to_string(), RuleKind::Directory),
                    None => (literal, RuleKind::File),
                }
            }
        };

        let path = literal.trim_end_matches('/').to_string();
        if path.is_empty() {
            return Err(RuleError::UnsupportedPattern {
                pattern: pattern.to_string(),
                detail: "rule does not name any path".into(),
            });
        }

        let expr = match kind {
            RuleKind::Directory => format!("^{}/", regex_lite::escape(&path)),
            RuleKind::File => format!("^{}$", regex_lite::escape(&path)),
        };
        let matcher = Regex::new(&expr).map_err(|e| RuleError::UnsupportedPattern {
            pattern: pattern.to_string(),
            detail: e.to_string(),
        })?;

        Ok(Self { path, kind, matcher })
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Test a relative, forward-slash path against this rule.
    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// Canonical display form: `setup/` or `README.md`.
    pub fn pattern(&self) -> String {
        match self.kind {
            RuleKind::Directory => format!("{}/", self.path),
            RuleKind::File => self.path.clone(),
        }
    }

    /// The `.gitattributes` pattern covering the same paths.
    pub fn attribute_pattern(&self) -> String {
        match self.kind {
            RuleKind::Directory => format!("{}/**", self.path),
            RuleKind::File => self.path.clone(),
        }
    }

    /// The pathspec used to restore this rule's paths via checkout.
    pub fn pathspec(&self) -> &str {
        &self.path
    }

    /// A representative path this rule must exclude.
    pub fn probe_path(&self) -> String {
        match self.kind {
            RuleKind::Directory => format!("{}/forksync-probe", self.path),
            RuleKind::File => self.path.clone(),
        }
    }
}

impl std::fmt::Display for PathRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern())
    }
}

/// Unescape an anchored rule such as `^README\.md$` into its literal path.
fn parse_anchored(pattern: &str, anchored: &str) -> Result<(String, RuleKind), RuleError> {
    let (body, exact) = match anchored.strip_suffix('$') {
        Some(body) => (body, true),
        None => (anchored, false),
    };

    let mut literal = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => literal.push(escaped),
                None => {
                    return Err(RuleError::UnsupportedPattern {
                        pattern: pattern.to_string(),
                        detail: "trailing backslash".into(),
                    })
                }
            },
            c if REGEX_METACHARS.contains(&c) => {
                return Err(RuleError::UnsupportedPattern {
                    pattern: pattern.to_string(),
                    detail: format!("regex metacharacter '{}' is not supported", c),
                });
            }
            '.' => {
                return Err(RuleError::UnsupportedPattern {
                    pattern: pattern.to_string(),
                    detail: "unescaped '.' matches any character; write '\\.'".into(),
                });
            }
            c => literal.push(c),
        }
    }

    let literal = normalize(&literal);
    if exact {
        Ok((literal, RuleKind::File))
    } else if literal.ends_with('/') {
        Ok((literal, RuleKind::Directory))
    } else {
        Err(RuleError::AmbiguousPattern(pattern.to_string()))
    }
}

/// Forward slashes, no leading `/`.
fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

// ---------------------------------------------------------------------------
// ExclusionRuleSet
// ---------------------------------------------------------------------------

/// The fixed, ordered set of exclusion rules for a session.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRuleSet {
    rules: Vec<PathRule>,
}

impl ExclusionRuleSet {
    /// Build a rule set. Fails on the first empty or malformed pattern.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, RuleError> {
        let mut rules = Vec::with_capacity(patterns.len());
        for (index, pattern) in patterns.iter().enumerate() {
            let pattern = pattern.as_ref();
            if pattern.trim().is_empty() {
                return Err(RuleError::EmptyPattern { index });
            }
            rules.push(PathRule::parse(pattern)?);
        }
        debug!(count = rules.len(), "exclusion rules loaded");
        Ok(Self { rules })
    }

    /// `true` if any rule matches `path`.
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = path.replace('\\', "/");
        self.matching_rule(&path).is_some()
    }

    /// The first rule matching an already-normalized `path`.
    pub fn matching_rule(&self, path: &str) -> Option<&PathRule> {
        self.rules.iter().find(|rule| rule.is_match(path))
    }

    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
