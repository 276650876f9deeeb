use std::collections::BTreeSet;

use dispatchr_common::error::PortError;
use dispatchr_common::record::{RecordId, RecordMap};

/// Reads records by id in one round-trip.
pub trait Selector {
    /// Fetches every record in `ids` that exists. Ids without a record are
    /// absent from the result.
    ///
    /// An empty id set short-circuits to an empty map without touching the
    /// backing store.
    fn fetch_by_ids(&self, ids: &BTreeSet<RecordId>) -> Result<RecordMap, PortError> {
        if ids.is_empty() {
            return Ok(RecordMap::new());
        }
        self.query_ids(ids)
    }

    /// Backing lookup, only called with a non-empty id set.
    fn query_ids(&self, ids: &BTreeSet<RecordId>) -> Result<RecordMap, PortError>;
}
