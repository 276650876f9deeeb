use serde::{Deserialize, Serialize};

use crate::error::BulkMutationError;
use crate::event::OperationKind;
use crate::record::RecordId;

/// How a bulk mutation reacts to individual record failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationMode {
    /// The first failing record fails the whole call and nothing is persisted.
    #[default]
    AllOrNone,
    /// Failing records are reported, the rest are persisted.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed(String),
    /// Valid on its own, but discarded because another record failed an all-or-none call.
    RolledBack,
}

/// Result for one input record, at the same position as the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub index: usize,
    pub id: Option<RecordId>,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl RecordOutcome {
    pub fn succeeded(index: usize, id: Option<RecordId>) -> Self {
        Self {
            index,
            id,
            status: OutcomeStatus::Succeeded,
        }
    }

    pub fn failed(index: usize, id: Option<RecordId>, reason: impl Into<String>) -> Self {
        Self {
            index,
            id,
            status: OutcomeStatus::Failed(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded)
    }
}

/// Outcome of one bulk call, one entry per input record in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub operation: OperationKind,
    pub outcomes: Vec<RecordOutcome>,
}

impl BulkOutcome {
    pub fn new(operation: OperationKind, outcomes: Vec<RecordOutcome>) -> Self {
        Self {
            operation,
            outcomes,
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Ids of the records that were persisted, in input order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .filter_map(|o| o.id.clone())
            .collect()
    }

    /// Converts a partially failed outcome into an error carrying every entry.
    pub fn into_result(self) -> Result<Vec<RecordId>, BulkMutationError> {
        if self.is_success() {
            return Ok(self.ids());
        }
        Err(BulkMutationError {
            operation: self.operation,
            outcomes: self.outcomes,
        })
    }
}
