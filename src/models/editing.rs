use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::itinerary::Activity;

/// Positional address of a single activity.
///
/// Indices are array positions, not stable ids: any structural edit that
/// changes array lengths between creating an identifier and using it makes
/// the identifier stale. Callers must re-derive identifiers after every
/// structural mutation.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ActivityIdentifier {
    pub section_idx: usize,
    pub day_idx: usize,
    pub activity_idx: usize,
}

/// Positional address of a day plan. Same staleness caveat as
/// [`ActivityIdentifier`].
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct DayIdentifier {
    pub section_idx: usize,
    pub day_idx: usize,
}

/// One reversible document mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoRecord {
    Edit {
        target: ActivityIdentifier,
        previous: Activity,
        /// Full pre-edit order of the day, captured when the edit triggered
        /// a time resort so undo can restore the exact prior arrangement.
        day_before_sort: Option<Vec<Activity>>,
    },
    Delete {
        target: ActivityIdentifier,
        previous: Activity,
    },
    Move {
        /// Where the activity landed.
        target: ActivityIdentifier,
        previous: Activity,
        /// Where it came from.
        source: ActivityIdentifier,
    },
    DayTitle {
        target: DayIdentifier,
        previous: String,
    },
    ReplaceDay {
        target: DayIdentifier,
        previous: Vec<Activity>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub record: UndoRecord,
    pub recorded_at: DateTime<Utc>,
}

/// Unbounded stack of reversible edits, one per editing session.
///
/// There is deliberately no depth cap: the ledger is the complete edit
/// history back to the generated document, so a user can always roll all
/// the way back. Entries are consumed exactly once by undo; there is no
/// redo stack.
#[derive(Debug, Default)]
pub struct UndoLedger {
    entries: Vec<UndoEntry>,
}

impl UndoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: UndoRecord) {
        self.entries.push(UndoEntry {
            record,
            recorded_at: Utc::now(),
        });
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationStatus {
    Idle,
    Loading,
    Preview,
    Error,
}

/// In-flight AI rewrite of a single activity. At most one exists per
/// session; starting a new one discards any unaccepted predecessor.
#[derive(Debug, Clone)]
pub struct AiModification {
    pub target: ActivityIdentifier,
    pub prompt: String,
    pub status: ModificationStatus,
    pub preview: Option<Activity>,
    pub error: Option<String>,
    pub epoch: u64,
}

/// Day-level variant of [`AiModification`], previewing a whole activity
/// list.
#[derive(Debug, Clone)]
pub struct AiDayModification {
    pub target: DayIdentifier,
    pub prompt: String,
    pub status: ModificationStatus,
    pub preview: Option<Vec<Activity>>,
    pub error: Option<String>,
    pub epoch: u64,
}

/// Proof that a submit belongs to a specific request slot generation.
/// A completion carrying a ticket from an overwritten slot is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModificationTicket {
    pub(crate) epoch: u64,
}
