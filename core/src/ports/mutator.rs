use dispatchr_common::error::MutationError;
use dispatchr_common::mutation::{BulkOutcome, MutationMode};
use dispatchr_common::record::Record;

/// Bulk writes. Each call is a single DML statement over the whole batch,
/// never one statement per record.
///
/// In [`MutationMode::Partial`] a call returns `Ok` with one outcome per
/// record; in [`MutationMode::AllOrNone`] the first failing record fails the
/// call and nothing is written.
pub trait Mutator {
    fn insert_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError>;

    fn update_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError>;

    fn delete_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError>;

    fn undelete_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError>;
}
