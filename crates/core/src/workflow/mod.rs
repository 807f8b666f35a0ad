//! The interactive synchronization workflow.
//!
//! [`SyncWorkflow`] drives the loop fetch → resolve → menu → action →
//! menu. State changes go through the pure [`transition`] function. All
//! backend access goes through [`VersionControl`] and all human interaction
//! through [`Operator`], so the whole loop runs against test doubles.

pub mod menu;
pub mod operator;
pub mod selection;
pub mod state;

use std::io;

use tracing::{debug, info, warn};

use crate::backend::{CheckoutRequest, MergeRequest, VersionControl};
use crate::changeset::{diff_stats, ChangeSet, ChangeSetResolver};
use crate::config::SyncConfig;
use crate::errors::{BackendError, SyncError};
use crate::protection::MergeProtector;

pub use menu::MenuChoice;
pub use operator::{Operator, Prompt, Question, Report, REMEDIATION_STEPS};
pub use selection::{parse_selection, Selection, SelectionError};
pub use state::{transition, WorkflowEvent, WorkflowState};

/// Backend status text once every conflict has been staged.
const ALL_CONFLICTS_FIXED: &str = "All conflicts fixed";

/// Why a run ended in [`WorkflowState::Aborted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    RemoteDeclined,
    FetchFailed,
}

/// How [`SyncWorkflow::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Exited,
    Aborted(AbortReason),
}

/// Drives one interactive session against a working copy.
pub struct SyncWorkflow<'a, B: VersionControl, O: Operator> {
    backend: &'a B,
    operator: &'a mut O,
    config: &'a SyncConfig,
    protector: MergeProtector<'a>,
    upstream_ref: String,
    state: WorkflowState,
    changes: ChangeSet,
    abort: Option<AbortReason>,
}

impl<'a, B: VersionControl, O: Operator> SyncWorkflow<'a, B, O> {
    pub fn new(
        backend: &'a B,
        operator: &'a mut O,
        config: &'a SyncConfig,
        protector: MergeProtector<'a>,
    ) -> Self {
        Self {
            backend,
            operator,
            config,
            protector,
            upstream_ref: config.upstream.reference(),
            state: WorkflowState::Idle,
            changes: ChangeSet::default(),
            abort: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Eligible changes from the most recent fetch.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Run until the operator exits or the session aborts.
    pub fn run(&mut self) -> Result<Outcome, SyncError> {
        loop {
            let step = match self.state {
                WorkflowState::Idle => self.ensure_remote(),
                WorkflowState::Fetching => self.fetch(),
                WorkflowState::Resolved => self.choose(),
                WorkflowState::Previewing => self.preview(),
                WorkflowState::ApplyingAll => self.apply_all(),
                WorkflowState::ApplyingSelected => self.apply_selected(),
                WorkflowState::CheckingConflicts => self.check_conflicts(),
                WorkflowState::ShowingStatus => self.show_status(),
                WorkflowState::Aborted => {
                    let reason = self.abort.unwrap_or(AbortReason::FetchFailed);
                    info!(?reason, "workflow aborted");
                    return Ok(Outcome::Aborted(reason));
                }
                WorkflowState::Exited => {
                    self.operator.report(Report::Farewell);
                    info!("workflow exited");
                    return Ok(Outcome::Exited);
                }
            };

            let event = match step {
                Ok(event) => event,
                Err(SyncError::Input(e)) if is_exit_request(&e) => {
                    debug!(error = %e, "input closed; exiting");
                    WorkflowEvent::ExitRequested
                }
                Err(e) => return Err(e),
            };
            self.advance(event)?;
        }
    }

    fn advance(&mut self, event: WorkflowEvent) -> Result<(), SyncError> {
        let next = transition(self.state, event)?;
        debug!(from = %self.state, %event, to = %next, "workflow transition");
        self.state = next;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Idle / Fetching / Resolved
    // -----------------------------------------------------------------------

    fn ensure_remote(&mut self) -> Result<WorkflowEvent, SyncError> {
        let remote = self.config.upstream.remote.as_str();
        if self.backend.remote_url(remote)?.is_some() {
            return Ok(WorkflowEvent::Begin);
        }

        let url = self.config.upstream.url.as_str();
        self.operator.report(Report::RemoteMissing { remote });
        if self.operator.confirm(Question::AddRemote { remote, url })? {
            self.backend.add_remote(remote, url)?;
            self.operator.report(Report::RemoteAdded { remote, url });
            Ok(WorkflowEvent::Begin)
        } else {
            self.operator.report(Report::RemoteDeclined { remote });
            self.abort = Some(AbortReason::RemoteDeclined);
            Ok(WorkflowEvent::RemoteDeclined)
        }
    }

    fn fetch(&mut self) -> Result<WorkflowEvent, SyncError> {
        let remote = self.config.upstream.remote.as_str();
        self.changes = ChangeSet::default();
        self.operator.report(Report::Banner {
            remote,
            reference: &self.upstream_ref,
        });
        self.operator.report(Report::FetchStarted { remote });

        if let Err(error) = self.backend.fetch(remote) {
            self.operator.report(Report::FetchFailed { error: &error });
            self.abort = Some(AbortReason::FetchFailed);
            return Ok(WorkflowEvent::FetchFailed);
        }

        let latest = self
            .backend
            .latest_commit(&self.upstream_ref)
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not read latest upstream commit");
                None
            });
        self.operator.report(Report::FetchSucceeded {
            latest_commit: latest.as_deref(),
        });

        let resolver = ChangeSetResolver::new(self.protector.rules());
        self.changes = resolver.resolve(
            self.backend,
            &self.config.local.reference,
            &self.upstream_ref,
        )?;

        if self.changes.is_empty() {
            self.operator.report(Report::UpToDate {
                rules: self.protector.rules(),
            });
        } else {
            self.operator.report(Report::Summary {
                changes: &self.changes,
            });
        }
        Ok(WorkflowEvent::FetchSucceeded)
    }

    fn choose(&mut self) -> Result<WorkflowEvent, SyncError> {
        loop {
            self.operator.report(Report::Menu);
            let input = self.operator.ask(Prompt::MenuChoice)?;
            match MenuChoice::parse(&input) {
                Some(choice) => return Ok(WorkflowEvent::Chose(choice)),
                None => self.operator.report(Report::InvalidChoice {
                    input: input.trim(),
                }),
            }
        }
    }

    /// Pause after an action: enter returns to the menu, `0` exits.
    fn finish_action(&mut self) -> Result<WorkflowEvent, SyncError> {
        let input = self.operator.ask(Prompt::ReturnToMenu)?;
        if input.trim() == "0" {
            Ok(WorkflowEvent::ExitRequested)
        } else {
            Ok(WorkflowEvent::Completed)
        }
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    fn preview(&mut self) -> Result<WorkflowEvent, SyncError> {
        if self.changes.is_empty() {
            self.operator.report(Report::NothingToApply);
            return self.finish_action();
        }

        self.operator.report(Report::FileGroups {
            changes: &self.changes,
        });
        if self.operator.confirm(Question::ViewDiffs)? {
            let total = self.changes.len();
            for (index, path) in self.changes.files().iter().enumerate() {
                let patch =
                    self.backend
                        .diff_text(&self.config.local.reference, &self.upstream_ref, path)?;
                self.operator.report(Report::FileDiff {
                    index: index + 1,
                    total,
                    path,
                    patch: &patch,
                    stats: diff_stats(&patch),
                });
                if index + 1 < total {
                    let input = self.operator.ask(Prompt::NextFile)?;
                    if input.trim().eq_ignore_ascii_case("q") {
                        debug!(shown = index + 1, total, "preview stopped early");
                        break;
                    }
                }
            }
        }
        self.finish_action()
    }

    /// Install protection, retrying once on entry to an apply action.
    /// Returns `false` if the apply must be refused.
    fn protection_ready(&mut self) -> bool {
        match self.protector.ensure_protection(self.backend) {
            Ok(report) => {
                if !report.uncovered.is_empty() {
                    self.operator.report(Report::ProtectionIncomplete {
                        uncovered: &report.uncovered,
                    });
                }
                true
            }
            Err(error) => {
                warn!(error = %error, "merge protection unavailable; refusing to apply");
                self.operator
                    .report(Report::ProtectionUnavailable { error: &error });
                false
            }
        }
    }

    fn apply_all(&mut self) -> Result<WorkflowEvent, SyncError> {
        if self.changes.is_empty() {
            self.operator.report(Report::NothingToApply);
            return self.finish_action();
        }

        self.operator.report(Report::ApplyPlan {
            changes: &self.changes,
        });
        let count = self.changes.len();
        if !self.operator.confirm(Question::ApplyAll { count })? {
            self.operator.report(Report::Cancelled);
            return self.finish_action();
        }
        if !self.protection_ready() {
            return self.finish_action();
        }

        let local_ref = self.config.local.reference.as_str();
        // Protected paths the upstream side adds, changes or deletes.
        let protected: Vec<String> = {
            let rules = self.protector.rules();
            let mut raw = self.backend.diff_paths(local_ref, &self.upstream_ref)?;
            raw.retain(|path| rules.is_excluded(path));
            raw
        };

        self.operator.report(Report::MergeStarted {
            reference: &self.upstream_ref,
        });
        if let Err(error) = self
            .backend
            .merge(&MergeRequest::staged(&self.upstream_ref))
        {
            warn!(error = %error, "merge did not complete");
            self.operator.report(Report::MergeFailed { error: &error });
            return Ok(WorkflowEvent::MergeConflicted);
        }

        for path in &protected {
            if let Err(error) = self.restore_protected(local_ref, path) {
                warn!(path = path.as_str(), error = %error, "could not restore protected path");
                self.operator.report(Report::RestoreFailed {
                    pathspec: path,
                    error: &error,
                });
            }
        }

        info!(files = count, "merge staged");
        self.operator.report(Report::MergeStaged {
            reference: &self.upstream_ref,
        });
        let status = self.backend.status()?;
        self.operator.report(Report::Status { text: &status });
        self.operator.report(Report::NextSteps);
        self.finish_action()
    }

    /// Put a protected path back the way the local side has it. Paths the
    /// local side never had are unstaged and deleted.
    fn restore_protected(&self, local_ref: &str, path: &str) -> Result<(), BackendError> {
        if self.backend.path_exists(local_ref, path)? {
            self.backend.checkout(&CheckoutRequest {
                reference: local_ref,
                paths: &[path],
            })?;
            debug!(path, "protected path restored");
        } else {
            self.backend.remove(&[path])?;
            debug!(path, "protected path added upstream dropped");
        }
        Ok(())
    }

    fn apply_selected(&mut self) -> Result<WorkflowEvent, SyncError> {
        if self.changes.is_empty() {
            self.operator.report(Report::NothingToApply);
            return self.finish_action();
        }

        self.operator.report(Report::SelectionList {
            changes: &self.changes,
        });
        let count = self.changes.len();
        let selection = loop {
            let input = self.operator.ask(Prompt::FileSelection { count })?;
            match parse_selection(&input, count) {
                Ok(selection) => break selection,
                Err(error) => self
                    .operator
                    .report(Report::InvalidSelection { error: &error }),
            }
        };
        if selection == Selection::Abort {
            self.operator.report(Report::Cancelled);
            return self.finish_action();
        }
        if !self.protection_ready() {
            return self.finish_action();
        }

        let indices = selection.indices(count);
        let mut applied = 0;
        for &index in &indices {
            let path = self.changes.files()[index].as_str();
            let request = CheckoutRequest {
                reference: &self.upstream_ref,
                paths: &[path],
            };
            match self.backend.checkout(&request) {
                Ok(()) => {
                    applied += 1;
                    self.operator.report(Report::FileUpdated { path });
                }
                Err(error) => {
                    warn!(path, error = %error, "could not update file");
                    self.operator
                        .report(Report::FileUpdateFailed { path, error: &error });
                }
            }
        }

        info!(applied, selected = indices.len(), "selected files applied");
        self.operator.report(Report::SelectionApplied {
            applied,
            selected: indices.len(),
        });
        let status = self.backend.status()?;
        self.operator.report(Report::Status { text: &status });
        self.operator.report(Report::NextSteps);
        self.finish_action()
    }

    fn check_conflicts(&mut self) -> Result<WorkflowEvent, SyncError> {
        let unmerged = self.backend.list_unmerged()?;
        if unmerged.is_empty() {
            let status = self.backend.status()?;
            self.operator.report(Report::NoConflicts {
                ready_to_commit: status.contains(ALL_CONFLICTS_FIXED),
            });
            return self.finish_action();
        }

        info!(count = unmerged.len(), "unmerged paths found");
        self.operator.report(Report::ConflictsFound {
            paths: &unmerged,
            steps: &REMEDIATION_STEPS,
        });
        if self.operator.confirm(Question::OpenEditor)? {
            if let Err(error) = self.operator.open_in_editor(&unmerged) {
                if is_exit_request(&error) {
                    return Err(error.into());
                }
                warn!(error = %error, "could not launch editor");
                self.operator.report(Report::EditorFailed { error: &error });
            }
        }
        self.finish_action()
    }

    fn show_status(&mut self) -> Result<WorkflowEvent, SyncError> {
        let status = self.backend.status()?;
        self.operator.report(Report::Status { text: &status });
        self.finish_action()
    }
}

fn is_exit_request(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::UnexpectedEof
    )
}
