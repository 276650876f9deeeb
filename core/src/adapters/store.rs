use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use dispatchr_common::error::{MutationError, PortError};
use dispatchr_common::event::OperationKind;
use dispatchr_common::mutation::{BulkOutcome, MutationMode};
use dispatchr_common::record::{Record, RecordId, RecordMap};

use crate::context::ExecutionContext;
use crate::platform::Platform;
use crate::ports::mutator::Mutator;
use crate::ports::selector::Selector;

fn upgrade(scope: &Weak<ExecutionContext>) -> Result<Rc<ExecutionContext>, PortError> {
    scope.upgrade().ok_or(PortError::ContextClosed)
}

pub struct StoreSelector {
    platform: Platform,
    scope: Weak<ExecutionContext>,
}

impl StoreSelector {
    pub fn new(platform: Platform, scope: Weak<ExecutionContext>) -> Self {
        Self { platform, scope }
    }
}

impl Selector for StoreSelector {
    fn query_ids(&self, ids: &BTreeSet<RecordId>) -> Result<RecordMap, PortError> {
        let ctx = upgrade(&self.scope)?;
        self.platform.select(&ctx, ids)
    }
}

/// Issues DML against the platform inside the owning context, so triggers
/// fired by these writes share its registry and recursion guard.
pub struct StoreMutator {
    platform: Platform,
    scope: Weak<ExecutionContext>,
}

impl StoreMutator {
    pub fn new(platform: Platform, scope: Weak<ExecutionContext>) -> Self {
        Self { platform, scope }
    }

    fn execute(
        &self,
        operation: OperationKind,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        let ctx = upgrade(&self.scope)?;
        self.platform.execute(&ctx, operation, records, mode)
    }
}

impl Mutator for StoreMutator {
    fn insert_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        self.execute(OperationKind::Insert, records, mode)
    }

    fn update_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        self.execute(OperationKind::Update, records, mode)
    }

    fn delete_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        self.execute(OperationKind::Delete, records, mode)
    }

    fn undelete_all(
        &self,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        self.execute(OperationKind::Undelete, records, mode)
    }
}
