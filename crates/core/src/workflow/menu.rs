//! Main menu choices.

/// One entry of the action menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Exit,
    Preview,
    ApplyAll,
    ApplySelected,
    CheckConflicts,
    Status,
    Refetch,
}

impl MenuChoice {
    /// Every choice in menu order.
    pub const ALL: [MenuChoice; 7] = [
        Self::Preview,
        Self::ApplyAll,
        Self::ApplySelected,
        Self::CheckConflicts,
        Self::Status,
        Self::Refetch,
        Self::Exit,
    ];

    /// Parse operator input. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "0" => Some(Self::Exit),
            "1" => Some(Self::Preview),
            "2" => Some(Self::ApplyAll),
            "3" => Some(Self::ApplySelected),
            "4" => Some(Self::CheckConflicts),
            "5" => Some(Self::Status),
            "6" => Some(Self::Refetch),
            _ => None,
        }
    }

    /// The digit the operator types.
    pub fn key(self) -> char {
        match self {
            Self::Exit => '0',
            Self::Preview => '1',
            Self::ApplyAll => '2',
            Self::ApplySelected => '3',
            Self::CheckConflicts => '4',
            Self::Status => '5',
            Self::Refetch => '6',
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Exit => "Exit",
            Self::Preview => "Preview changes",
            Self::ApplyAll => "Apply all changes",
            Self::ApplySelected => "Select files to apply",
            Self::CheckConflicts => "Check conflicts",
            Self::Status => "Show status",
            Self::Refetch => "Fetch again",
        }
    }
}

impl std::fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exit => write!(f, "exit"),
            Self::Preview => write!(f, "preview"),
            Self::ApplyAll => write!(f, "apply_all"),
            Self::ApplySelected => write!(f, "apply_selected"),
            Self::CheckConflicts => write!(f, "check_conflicts"),
            Self::Status => write!(f, "status"),
            Self::Refetch => write!(f, "refetch"),
        }
    }
}
