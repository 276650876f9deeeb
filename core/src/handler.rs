//! # Trigger Handlers
//!
//! Every domain handler implements [`TriggerHandler`], overriding only the
//! hooks it cares about. Each hook receives the whole batch of one lifecycle
//! event and must be bulk-safe: one call may carry any number of records,
//! including none.
//!
//! * **Before** hooks get the new records as a mutable slice. Edits are
//!   persisted by the platform, the batch itself cannot grow or shrink.
//! * **After** hooks get read-only records, further changes go through the
//!   [`Mutator`](crate::ports::mutator::Mutator) port.
//!
//! Dependencies are resolved from the context (`ctx.resolve::<dyn Selector>()`),
//! never constructed by the handler.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use dispatchr_common::error::HandlerError;
use dispatchr_common::record::{Record, RecordMap};

use crate::context::ExecutionContext;

/// Identifies a concrete handler type for recursion tracking.
#[derive(Clone, Copy)]
pub struct HandlerTag {
    id: TypeId,
    name: &'static str,
}

impl HandlerTag {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for HandlerTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for HandlerTag {}

impl Hash for HandlerTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for HandlerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub type HookResult = Result<(), HandlerError>;

#[allow(unused_variables)]
pub trait TriggerHandler: 'static {
    /// Tag of the implementing type, used as the recursion guard key.
    fn tag(&self) -> HandlerTag {
        HandlerTag::of::<Self>()
    }

    fn before_insert(
        &self,
        ctx: &ExecutionContext,
        new: &mut [Record],
        old: &RecordMap,
    ) -> HookResult {
        Ok(())
    }

    fn before_update(
        &self,
        ctx: &ExecutionContext,
        new: &mut [Record],
        old: &RecordMap,
    ) -> HookResult {
        Ok(())
    }

    fn before_delete(
        &self,
        ctx: &ExecutionContext,
        new: &mut [Record],
        old: &RecordMap,
    ) -> HookResult {
        Ok(())
    }

    fn after_insert(
        &self,
        ctx: &ExecutionContext,
        new: &[Record],
        old: &RecordMap,
    ) -> HookResult {
        Ok(())
    }

    fn after_update(
        &self,
        ctx: &ExecutionContext,
        new: &[Record],
        old: &RecordMap,
    ) -> HookResult {
        Ok(())
    }

    fn after_delete(
        &self,
        ctx: &ExecutionContext,
        new: &[Record],
        old: &RecordMap,
    ) -> HookResult {
        Ok(())
    }

    fn after_undelete(
        &self,
        ctx: &ExecutionContext,
        new: &[Record],
        old: &RecordMap,
    ) -> HookResult {
        Ok(())
    }
}
