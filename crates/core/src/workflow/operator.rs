//! The seam between the workflow and the human driving it.
//!
//! The workflow never prints or reads a terminal directly. It emits
//! [`Report`]s, asks [`Prompt`]s and [`Question`]s, and lets the
//! [`Operator`] decide how they look.

use std::io;

use crate::changeset::{ChangeSet, DiffStats};
use crate::errors::BackendError;
use crate::rules::ExclusionRuleSet;

use super::selection::SelectionError;

/// Fixed remediation sequence shown when unmerged paths exist.
pub const REMEDIATION_STEPS: [&str; 4] = [
    "Inspect the differences: git diff",
    "Edit each conflicted file and remove the conflict markers",
    "Stage the resolved files: git add <file>",
    "Commit the merge: git commit",
];

/// Something the workflow wants the operator to see.
#[derive(Debug)]
pub enum Report<'a> {
    /// Start of a fetch cycle.
    Banner { remote: &'a str, reference: &'a str },
    RemoteMissing { remote: &'a str },
    RemoteAdded { remote: &'a str, url: &'a str },
    RemoteDeclined { remote: &'a str },
    FetchStarted { remote: &'a str },
    FetchSucceeded { latest_commit: Option<&'a str> },
    FetchFailed { error: &'a BackendError },
    UpToDate { rules: &'a ExclusionRuleSet },
    Summary { changes: &'a ChangeSet },
    Menu,
    InvalidChoice { input: &'a str },
    /// A file-dependent action was chosen with an empty change set.
    NothingToApply,
    FileGroups { changes: &'a ChangeSet },
    FileDiff {
        index: usize,
        total: usize,
        path: &'a str,
        patch: &'a str,
        stats: DiffStats,
    },
    ApplyPlan { changes: &'a ChangeSet },
    Cancelled,
    ProtectionUnavailable { error: &'a BackendError },
    ProtectionIncomplete { uncovered: &'a [String] },
    MergeStarted { reference: &'a str },
    MergeFailed { error: &'a BackendError },
    MergeStaged { reference: &'a str },
    RestoreFailed { pathspec: &'a str, error: &'a BackendError },
    SelectionList { changes: &'a ChangeSet },
    InvalidSelection { error: &'a SelectionError },
    FileUpdated { path: &'a str },
    FileUpdateFailed { path: &'a str, error: &'a BackendError },
    SelectionApplied { applied: usize, selected: usize },
    ConflictsFound {
        paths: &'a [String],
        steps: &'a [&'static str],
    },
    NoConflicts { ready_to_commit: bool },
    EditorFailed { error: &'a io::Error },
    Status { text: &'a str },
    NextSteps,
    Farewell,
}

impl Report<'_> {
    /// Stable name of the variant.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Banner { .. } => "banner",
            Self::RemoteMissing { .. } => "remote_missing",
            Self::RemoteAdded { .. } => "remote_added",
            Self::RemoteDeclined { .. } => "remote_declined",
            Self::FetchStarted { .. } => "fetch_started",
            Self::FetchSucceeded { .. } => "fetch_succeeded",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::UpToDate { .. } => "up_to_date",
            Self::Summary { .. } => "summary",
            Self::Menu => "menu",
            Self::InvalidChoice { .. } => "invalid_choice",
            Self::NothingToApply => "nothing_to_apply",
            Self::FileGroups { .. } => "file_groups",
            Self::FileDiff { .. } => "file_diff",
            Self::ApplyPlan { .. } => "apply_plan",
            Self::Cancelled => "cancelled",
            Self::ProtectionUnavailable { .. } => "protection_unavailable",
            Self::ProtectionIncomplete { .. } => "protection_incomplete",
            Self::MergeStarted { .. } => "merge_started",
            Self::MergeFailed { .. } => "merge_failed",
            Self::MergeStaged { .. } => "merge_staged",
            Self::RestoreFailed { .. } => "restore_failed",
            Self::SelectionList { .. } => "selection_list",
            Self::InvalidSelection { .. } => "invalid_selection",
            Self::FileUpdated { .. } => "file_updated",
            Self::FileUpdateFailed { .. } => "file_update_failed",
            Self::SelectionApplied { .. } => "selection_applied",
            Self::ConflictsFound { .. } => "conflicts_found",
            Self::NoConflicts { .. } => "no_conflicts",
            Self::EditorFailed { .. } => "editor_failed",
            Self::Status { .. } => "status",
            Self::NextSteps => "next_steps",
            Self::Farewell => "farewell",
        }
    }
}

/// Free-text input requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    MenuChoice,
    /// Comma-separated indices, `a` or `q`.
    FileSelection { count: usize },
    /// Enter for the next diff, `q` to stop.
    NextFile,
    /// Enter for the menu, `0` to exit.
    ReturnToMenu,
}

impl Prompt {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MenuChoice => "menu_choice",
            Self::FileSelection { .. } => "file_selection",
            Self::NextFile => "next_file",
            Self::ReturnToMenu => "return_to_menu",
        }
    }
}

/// Yes/no questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Question<'a> {
    AddRemote { remote: &'a str, url: &'a str },
    ViewDiffs,
    ApplyAll { count: usize },
    OpenEditor,
}

impl Question<'_> {
    /// Answer assumed when the operator just presses enter.
    pub fn default_answer(&self) -> bool {
        matches!(self, Self::AddRemote { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AddRemote { .. } => "add_remote",
            Self::ViewDiffs => "view_diffs",
            Self::ApplyAll { .. } => "apply_all",
            Self::OpenEditor => "open_editor",
        }
    }
}

/// The human side of the workflow.
///
/// An [`io::ErrorKind::Interrupted`] or [`io::ErrorKind::UnexpectedEof`]
/// error from any input method is treated as a request to exit.
pub trait Operator {
    fn report(&mut self, report: Report<'_>);

    fn ask(&mut self, prompt: Prompt) -> io::Result<String>;

    fn confirm(&mut self, question: Question<'_>) -> io::Result<bool>;

    /// Open working-copy paths in the configured editor.
    fn open_in_editor(&mut self, paths: &[String]) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_answers() {
        assert!(Question::AddRemote {
            remote: "upstream",
            url: "https://example.com/x.git"
        }
        .default_answer());
        assert!(!Question::ViewDiffs.default_answer());
        assert!(!Question::ApplyAll { count: 3 }.default_answer());
        assert!(!Question::OpenEditor.default_answer());
    }

    #[test]
    fn test_remediation_steps_are_fixed() {
        assert_eq!(REMEDIATION_STEPS.len(), 4);
        assert!(REMEDIATION_STEPS[0].contains("git diff"));
        assert!(REMEDIATION_STEPS[3].contains("git commit"));
    }
}
