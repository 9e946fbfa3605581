//! Note lifecycle and classification.

use common::WarehouseId;
use serde::{Deserialize, Serialize};

/// The state of a note in its lifecycle.
///
/// State transitions:
/// ```text
/// Draft ──┬──► Committed
///         └──► Deleted (row removed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NoteState {
    /// Lines can be added, changed and removed.
    #[default]
    Draft,

    /// Counted in stock; the note and its lines are immutable (terminal state).
    Committed,
}

impl NoteState {
    /// Maps the stored `committed` flag.
    pub fn from_committed(committed: bool) -> Self {
        if committed {
            NoteState::Committed
        } else {
            NoteState::Draft
        }
    }

    /// Returns true if the note or its lines can be modified in this state.
    pub fn can_modify(&self) -> bool {
        matches!(self, NoteState::Draft)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NoteState::Committed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteState::Draft => "Draft",
            NoteState::Committed => "Committed",
        }
    }
}

impl std::fmt::Display for NoteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a note does to stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Bound to a warehouse; adds stock.
    Inbound,

    /// Not bound to a warehouse; removes stock.
    Outbound,

    /// Produced by reconciliation; adds stock.
    Reconciliation,
}

impl NoteKind {
    /// Derives the kind from the stored columns.
    pub fn classify(warehouse_id: Option<WarehouseId>, is_reconciliation_note: bool) -> Self {
        if is_reconciliation_note {
            NoteKind::Reconciliation
        } else if warehouse_id.is_some() {
            NoteKind::Inbound
        } else {
            NoteKind::Outbound
        }
    }

    /// Returns true if committed lines of this kind add to stock.
    pub fn adds_stock(&self) -> bool {
        matches!(self, NoteKind::Inbound | NoteKind::Reconciliation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteKind::Inbound => "inbound",
            NoteKind::Outbound => "outbound",
            NoteKind::Reconciliation => "reconciliation",
        }
    }
}

impl std::fmt::Display for NoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_draft() {
        assert_eq!(NoteState::default(), NoteState::Draft);
    }

    #[test]
    fn test_only_drafts_can_be_modified() {
        assert!(NoteState::Draft.can_modify());
        assert!(!NoteState::Committed.can_modify());
        assert!(NoteState::Committed.is_terminal());
    }

    #[test]
    fn test_state_from_flag() {
        assert_eq!(NoteState::from_committed(true), NoteState::Committed);
        assert_eq!(NoteState::from_committed(false), NoteState::Draft);
    }

    #[test]
    fn test_classification() {
        let wh = Some(WarehouseId::new(1));
        assert_eq!(NoteKind::classify(wh, false), NoteKind::Inbound);
        assert_eq!(NoteKind::classify(None, false), NoteKind::Outbound);
        assert_eq!(NoteKind::classify(None, true), NoteKind::Reconciliation);
        assert_eq!(NoteKind::classify(wh, true), NoteKind::Reconciliation);
    }

    #[test]
    fn test_reconciliation_counts_as_inbound() {
        assert!(NoteKind::Inbound.adds_stock());
        assert!(NoteKind::Reconciliation.adds_stock());
        assert!(!NoteKind::Outbound.adds_stock());
    }

    #[test]
    fn test_display() {
        assert_eq!(NoteState::Committed.to_string(), "Committed");
        assert_eq!(NoteKind::Outbound.to_string(), "outbound");
    }
}
