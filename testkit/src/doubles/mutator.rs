use std::cell::RefCell;

use dispatchr_common::error::{BulkMutationError, MutationError};
use dispatchr_common::event::OperationKind;
use dispatchr_common::mutation::{BulkOutcome, MutationMode, OutcomeStatus, RecordOutcome};
use dispatchr_common::record::{Record, RecordId};
use dispatchr_core::ports::mutator::Mutator;

#[derive(Debug, Clone, PartialEq)]
pub struct MutatorCall {
    pub operation: OperationKind,
    pub records: Vec<Record>,
    pub mode: MutationMode,
}

/// Accepts every write without storing it, or rejects every write with a
/// fixed reason.
#[derive(Default)]
pub struct RecordingMutator {
    calls: RefCell<Vec<MutatorCall>>,
    failure: Option<String>,
}

impl RecordingMutator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails: all-or-none calls return an error, partial calls
    /// report each record as failed.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            calls: RefCell::default(),
            failure: Some(reason.into()),
        }
    }

    pub fn calls(&self) -> Vec<MutatorCall> {
        self.calls.borrow().clone()
    }

    pub fn records_for(&self, operation: OperationKind) -> Vec<Record> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.operation == operation)
            .flat_map(|call| call.records.iter().cloned())
            .collect()
    }

    fn record(
        &self,
        operation: OperationKind,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        let ids: Vec<Option<RecordId>> = records
            .iter()
            .map(|record| match operation {
                OperationKind::Insert => Some(RecordId::generate()),
                _ => record.id.clone(),
            })
            .collect();
        self.calls.borrow_mut().push(MutatorCall {
            operation,
            records,
            mode,
        });

        let outcomes: Vec<RecordOutcome> = ids
            .into_iter()
            .enumerate()
            .map(|(index, id)| match &self.failure {
                Some(reason) => RecordOutcome::failed(index, id, reason.clone()),
                None => RecordOutcome::succeeded(index, id),
            })
            .collect();

        if self.failure.is_some() && mode == MutationMode::AllOrNone {
            let outcomes = outcomes
                .into_iter()
                .map(|mut outcome| {
                    if outcome.index > 0 {
                        outcome.status = OutcomeStatus::RolledBack;
                    }
                    outcome
                })
                .collect();
            return Err(BulkMutationError {
                operation,
                outcomes,
            }
            .into());
        }
        Ok(BulkOutcome::new(operation, outcomes))
    }
}

impl Mutator for RecordingMutator {
    fn insert_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        self.record(OperationKind::Insert, records, mode)
    }

    fn update_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        self.record(OperationKind::Update, records, mode)
    }

    fn delete_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        self.record(OperationKind::Delete, records, mode)
    }

    fn undelete_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        self.record(OperationKind::Undelete, records, mode)
    }
}
