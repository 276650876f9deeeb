//! # Lifecycle Event Router
//!
//! Routes one host-delivered [`LifecycleEvent`] to exactly one hook of a
//! [`TriggerHandler`]:
//!
//! 1. Look the hook up in the fixed (phase, operation) table. Combinations
//!    outside the table are a no-op.
//! 2. Ask the context's recursion guard whether the handler type may run.
//!    A rejected re-entry is skipped, not reported as an error.
//! 3. Invoke the hook once with the full batch and release the guard on every
//!    exit path. Hook errors are returned unchanged.

use dispatchr_common::error::HandlerError;
use dispatchr_common::event::{LifecycleEvent, OperationKind, Phase};
use tracing::{debug, debug_span, trace};

use crate::context::ExecutionContext;
use crate::handler::{HookResult, TriggerHandler};

/// A routable (phase, operation) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    BeforeInsert,
    BeforeUpdate,
    BeforeDelete,
    AfterInsert,
    AfterUpdate,
    AfterDelete,
    AfterUndelete,
}

/// The seven routable combinations. `(Before, Undelete)` is not among them.
pub const ROUTES: [(Phase, OperationKind, Hook); 7] = [
    (Phase::Before, OperationKind::Insert, Hook::BeforeInsert),
    (Phase::Before, OperationKind::Update, Hook::BeforeUpdate),
    (Phase::Before, OperationKind::Delete, Hook::BeforeDelete),
    (Phase::After, OperationKind::Insert, Hook::AfterInsert),
    (Phase::After, OperationKind::Update, Hook::AfterUpdate),
    (Phase::After, OperationKind::Delete, Hook::AfterDelete),
    (Phase::After, OperationKind::Undelete, Hook::AfterUndelete),
];

impl Hook {
    pub fn route(phase: Phase, operation: OperationKind) -> Option<Hook> {
        ROUTES
            .iter()
            .find(|(p, o, _)| *p == phase && *o == operation)
            .map(|(_, _, hook)| *hook)
    }

    fn invoke(
        self,
        handler: &dyn TriggerHandler,
        ctx: &ExecutionContext,
        event: &mut LifecycleEvent,
    ) -> HookResult {
        let (new, old) = event.batch_mut();
        match self {
            Hook::BeforeInsert => handler.before_insert(ctx, new, old),
            Hook::BeforeUpdate => handler.before_update(ctx, new, old),
            Hook::BeforeDelete => handler.before_delete(ctx, new, old),
            Hook::AfterInsert => handler.after_insert(ctx, new, old),
            Hook::AfterUpdate => handler.after_update(ctx, new, old),
            Hook::AfterDelete => handler.after_delete(ctx, new, old),
            Hook::AfterUndelete => handler.after_undelete(ctx, new, old),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The hook ran once with the whole batch.
    Handled(Hook),
    /// The handler type was already running in this context.
    Skipped,
    /// No hook exists for the event's (phase, operation).
    Unrouted,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LifecycleEventRouter;

impl LifecycleEventRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn dispatch(
        &self,
        ctx: &ExecutionContext,
        event: &mut LifecycleEvent,
        handler: &dyn TriggerHandler,
    ) -> Result<DispatchOutcome, HandlerError> {
        let Some(hook) = Hook::route(event.phase(), event.operation()) else {
            trace!(%event, "no hook for event");
            return Ok(DispatchOutcome::Unrouted);
        };

        let tag = handler.tag();
        let Some(_ticket) = ctx.guard().enter(tag) else {
            debug!(handler = tag.name(), %event, "recursive dispatch skipped");
            return Ok(DispatchOutcome::Skipped);
        };

        let span = debug_span!("dispatch", context = %ctx.id(), handler = tag.name(), ?hook);
        let _enter = span.enter();
        trace!(records = event.len(), "invoking hook");

        ctx.usage()
            .measure_cpu(|| hook.invoke(handler, ctx, event))
            .map(|()| DispatchOutcome::Handled(hook))
    }
}
