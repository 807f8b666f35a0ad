//! File selection grammar for the apply-selected action.
//!
//! `q` aborts, `a` selects everything, anything else is a comma-separated
//! list of 1-based indices into the change set.

use thiserror::Error;

/// A parsed selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Abort,
    All,
    /// Zero-based indices, deduplicated, in first-occurrence order.
    Indices(Vec<usize>),
}

impl Selection {
    /// Resolve to zero-based indices into a list of `len` items.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        match self {
            Self::Abort => Vec::new(),
            Self::All => (0..len).collect(),
            Self::Indices(indices) => indices.clone(),
        }
    }
}

/// Why a selection was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no files selected")]
    Empty,

    #[error("'{0}' is not a file number")]
    NotANumber(String),

    #[error("file number {index} is out of range (1-{len})")]
    OutOfRange { index: usize, len: usize },
}

/// Parse operator input against a list of `len` files.
pub fn parse_selection(input: &str, len: usize) -> Result<Selection, SelectionError> {
    let input = input.trim();
    match input {
        "" => return Err(SelectionError::Empty),
        "q" | "Q" => return Ok(Selection::Abort),
        "a" | "A" => return Ok(Selection::All),
        _ => {}
    }

    let mut indices = Vec::new();
    for entry in input.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let index: usize = entry
            .parse()
            .map_err(|_| SelectionError::NotANumber(entry.to_string()))?;
        if index == 0 || index > len {
            return Err(SelectionError::OutOfRange { index, len });
        }
        if !indices.contains(&(index - 1)) {
            indices.push(index - 1);
        }
    }

    if indices.is_empty() {
        return Err(SelectionError::Empty);
    }
    Ok(Selection::Indices(indices))
}
