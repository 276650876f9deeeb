use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

use dispatchr_common::error::PortError;
use dispatchr_common::record::{Record, RecordId, RecordMap, index_by_id};
use dispatchr_core::ports::selector::Selector;

/// Serves a fixed set of records and remembers every lookup.
#[derive(Default)]
pub struct StaticSelector {
    records: RecordMap,
    calls: Cell<u32>,
    requests: RefCell<Vec<BTreeSet<RecordId>>>,
}

impl StaticSelector {
    pub fn new(records: RecordMap) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        Self::new(index_by_id(records))
    }

    /// Number of backing lookups, empty id sets excluded.
    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    pub fn requests(&self) -> Vec<BTreeSet<RecordId>> {
        self.requests.borrow().clone()
    }
}

impl Selector for StaticSelector {
    fn query_ids(&self, ids: &BTreeSet<RecordId>) -> Result<RecordMap, PortError> {
        self.calls.set(self.calls.get() + 1);
        self.requests.borrow_mut().push(ids.clone());

        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }
}
