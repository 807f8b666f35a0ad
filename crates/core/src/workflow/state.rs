//! Workflow states and the pure transition function.

use crate::errors::SyncError;

use super::menu::MenuChoice;

/// States of the interactive sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Fetching,
    Resolved,
    Previewing,
    ApplyingAll,
    ApplyingSelected,
    CheckingConflicts,
    ShowingStatus,
    Aborted,
    Exited,
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Resolved => write!(f, "resolved"),
            Self::Previewing => write!(f, "previewing"),
            Self::ApplyingAll => write!(f, "applying_all"),
            Self::ApplyingSelected => write!(f, "applying_selected"),
            Self::CheckingConflicts => write!(f, "checking_conflicts"),
            Self::ShowingStatus => write!(f, "showing_status"),
            Self::Aborted => write!(f, "aborted"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Inputs to [`transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// The upstream remote is in place; start fetching.
    Begin,
    /// The operator declined to create the missing upstream remote.
    RemoteDeclined,
    FetchSucceeded,
    FetchFailed,
    Chose(MenuChoice),
    /// A staged merge stopped on conflicts.
    MergeConflicted,
    /// The current action finished.
    Completed,
    /// Explicit exit, or the input stream closed.
    ExitRequested,
}

impl std::fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::RemoteDeclined => write!(f, "remote_declined"),
            Self::FetchSucceeded => write!(f, "fetch_succeeded"),
            Self::FetchFailed => write!(f, "fetch_failed"),
            Self::Chose(choice) => write!(f, "chose({})", choice),
            Self::MergeConflicted => write!(f, "merge_conflicted"),
            Self::Completed => write!(f, "completed"),
            Self::ExitRequested => write!(f, "exit_requested"),
        }
    }
}

/// Compute the next state. Performs no I/O.
pub fn transition(state: WorkflowState, event: WorkflowEvent) -> Result<WorkflowState, SyncError> {
    use self::WorkflowEvent as E;
    use self::WorkflowState as S;

    let next = match (state, event) {
        (S::Aborted | S::Exited, _) => None,
        (_, E::ExitRequested) => Some(S::Exited),

        (S::Idle, E::Begin) => Some(S::Fetching),
        (S::Idle, E::RemoteDeclined) => Some(S::Aborted),

        (S::Fetching, E::FetchSucceeded) => Some(S::Resolved),
        (S::Fetching, E::FetchFailed) => Some(S::Aborted),

        (S::Resolved, E::Chose(choice)) => Some(match choice {
            MenuChoice::Exit => S::Exited,
            MenuChoice::Preview => S::Previewing,
            MenuChoice::ApplyAll => S::ApplyingAll,
            MenuChoice::ApplySelected => S::ApplyingSelected,
            MenuChoice::CheckConflicts => S::CheckingConflicts,
            MenuChoice::Status => S::ShowingStatus,
            MenuChoice::Refetch => S::Fetching,
        }),

        (S::ApplyingAll, E::MergeConflicted) => Some(S::CheckingConflicts),

        (
            S::Previewing
            | S::ApplyingAll
            | S::ApplyingSelected
            | S::CheckingConflicts
            | S::ShowingStatus,
            E::Completed,
        ) => Some(S::Resolved),

        _ => None,
    };

    next.ok_or_else(|| SyncError::InvalidStateTransition {
        from: state.to_string(),
        event: event.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIONS: [WorkflowState; 5] = [
        WorkflowState::Previewing,
        WorkflowState::ApplyingAll,
        WorkflowState::ApplyingSelected,
        WorkflowState::CheckingConflicts,
        WorkflowState::ShowingStatus,
    ];

    #[test]
    fn test_happy_path() {
        let mut state = WorkflowState::Idle;
        for event in [
            WorkflowEvent::Begin,
            WorkflowEvent::FetchSucceeded,
            WorkflowEvent::Chose(MenuChoice::Preview),
            WorkflowEvent::Completed,
            WorkflowEvent::Chose(MenuChoice::Refetch),
            WorkflowEvent::FetchSucceeded,
            WorkflowEvent::Chose(MenuChoice::Exit),
        ] {
            state = transition(state, event).unwrap();
        }
        assert_eq!(state, WorkflowState::Exited);
    }

    #[test]
    fn test_menu_dispatch() {
        let cases = [
            (MenuChoice::Preview, WorkflowState::Previewing),
            (MenuChoice::ApplyAll, WorkflowState::ApplyingAll),
            (MenuChoice::ApplySelected, WorkflowState::ApplyingSelected),
            (MenuChoice::CheckConflicts, WorkflowState::CheckingConflicts),
            (MenuChoice::Status, WorkflowState::ShowingStatus),
            (MenuChoice::Refetch, WorkflowState::Fetching),
            (MenuChoice::Exit, WorkflowState::Exited),
        ];
        for (choice, expected) in cases {
            assert_eq!(
                transition(WorkflowState::Resolved, WorkflowEvent::Chose(choice)).unwrap(),
                expected
            );
        }
    }

    #[test]
    fn test_actions_return_to_resolved() {
        for state in ACTIONS {
            assert_eq!(
                transition(state, WorkflowEvent::Completed).unwrap(),
                WorkflowState::Resolved
            );
        }
    }

    #[test]
    fn test_merge_conflict_redirects() {
        assert_eq!(
            transition(WorkflowState::ApplyingAll, WorkflowEvent::MergeConflicted).unwrap(),
            WorkflowState::CheckingConflicts
        );
        assert!(transition(WorkflowState::ApplyingSelected, WorkflowEvent::MergeConflicted).is_err());
    }

    #[test]
    fn test_failures_abort() {
        assert_eq!(
            transition(WorkflowState::Fetching, WorkflowEvent::FetchFailed).unwrap(),
            WorkflowState::Aborted
        );
        assert_eq!(
            transition(WorkflowState::Idle, WorkflowEvent::RemoteDeclined).unwrap(),
            WorkflowState::Aborted
        );
    }

    #[test]
    fn test_exit_from_any_live_state() {
        let live = [
            WorkflowState::Idle,
            WorkflowState::Fetching,
            WorkflowState::Resolved,
        ]
        .into_iter()
        .chain(ACTIONS);
        for state in live {
            assert_eq!(
                transition(state, WorkflowEvent::ExitRequested).unwrap(),
                WorkflowState::Exited
            );
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for state in [WorkflowState::Aborted, WorkflowState::Exited] {
            for event in [
                WorkflowEvent::Begin,
                WorkflowEvent::ExitRequested,
                WorkflowEvent::Completed,
            ] {
                assert!(transition(state, event).is_err());
            }
        }
    }

    #[test]
    fn test_invalid_transition_names_both_sides() {
        let err = transition(WorkflowState::Idle, WorkflowEvent::Completed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid sync state transition from idle on completed"
        );
        assert!(transition(WorkflowState::Resolved, WorkflowEvent::FetchSucceeded).is_err());
        assert!(transition(
            WorkflowState::Previewing,
            WorkflowEvent::Chose(MenuChoice::ApplyAll)
        )
        .is_err());
    }
}
