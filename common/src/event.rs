//! # Lifecycle Events
//!
//! The host delivers one [`LifecycleEvent`] per record-level operation and
//! phase. Events are built once and never reshaped: the record batch can be
//! edited in place during the before phase, but records are never added or
//! removed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::{Record, RecordMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Undelete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Undelete => "undelete",
        };
        f.write_str(name)
    }
}

/// Stage of an operation relative to persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Pre-persistence, the batch is still mutable.
    Before,
    /// Post-persistence, the batch is read-only.
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => f.write_str("before"),
            Phase::After => f.write_str("after"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    operation: OperationKind,
    phase: Phase,
    #[serde(default)]
    new_records: Vec<Record>,
    #[serde(default)]
    old_records: RecordMap,
}

impl LifecycleEvent {
    pub fn new(
        operation: OperationKind,
        phase: Phase,
        new_records: Vec<Record>,
        old_records: RecordMap,
    ) -> Self {
        Self {
            operation,
            phase,
            new_records,
            old_records,
        }
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn new_records(&self) -> &[Record] {
        &self.new_records
    }

    pub fn old_records(&self) -> &RecordMap {
        &self.old_records
    }

    /// Number of records the event carries, whichever side holds them.
    pub fn len(&self) -> usize {
        self.new_records.len().max(self.old_records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split borrow handed to before-phase hooks.
    ///
    /// The slice allows editing records in place but not resizing the batch.
    pub fn batch_mut(&mut self) -> (&mut [Record], &RecordMap) {
        (&mut self.new_records, &self.old_records)
    }

    pub fn into_new_records(self) -> Vec<Record> {
        self.new_records
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} ({} records)", self.phase, self.operation, self.len())
    }
}
