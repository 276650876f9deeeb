//! Re-entrancy guard for trigger handlers.
//!
//! A handler whose after-phase logic issues DML against its own object makes
//! the platform fire the same trigger again. Each handler type moves through
//! `Idle -> Entered -> Idle` per execution context and re-entry from
//! `Entered` is rejected unless nesting was explicitly allowed for that type.
//!
//! The guard lives inside an [`ExecutionContext`](crate::ExecutionContext),
//! so its state is keyed by (handler type, context) without storing the
//! context id.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::handler::HandlerTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    /// Entered `depth` times; depth is only above one when nesting is allowed.
    Entered { depth: u32 },
}

#[derive(Default)]
pub struct RecursionGuard {
    states: RefCell<HashMap<HandlerTag, u32>>,
    nested: RefCell<HashSet<HandlerTag>>,
}

impl RecursionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `tag` to `Entered`. Returns false when it is already entered
    /// and nesting is not allowed for it.
    pub fn try_enter(&self, tag: HandlerTag) -> bool {
        let mut states = self.states.borrow_mut();
        let depth = states.entry(tag).or_insert(0);

        if *depth > 0 && !self.nested.borrow().contains(&tag) {
            trace!(handler = tag.name(), depth = *depth, "re-entry rejected");
            return false;
        }
        *depth += 1;
        true
    }

    /// Leaves one level; `tag` is `Idle` again once the outermost entry exits.
    pub fn exit(&self, tag: HandlerTag) {
        let mut states = self.states.borrow_mut();
        if let Some(depth) = states.get_mut(&tag) {
            *depth = depth.saturating_sub(1);
            if *depth == 0 {
                states.remove(&tag);
            }
        }
    }

    /// Enters `tag` and returns a ticket that exits when dropped, on every path.
    pub fn enter(&self, tag: HandlerTag) -> Option<GuardTicket<'_>> {
        self.try_enter(tag).then_some(GuardTicket { guard: self, tag })
    }

    pub fn state(&self, tag: HandlerTag) -> GuardState {
        match self.states.borrow().get(&tag) {
            Some(&depth) if depth > 0 => GuardState::Entered { depth },
            _ => GuardState::Idle,
        }
    }

    pub fn allow_nested(&self, tag: HandlerTag) {
        self.nested.borrow_mut().insert(tag);
    }

    pub fn disallow_nested(&self, tag: HandlerTag) {
        self.nested.borrow_mut().remove(&tag);
    }

    /// Returns every handler type to `Idle` and forgets nesting overrides.
    pub fn reset(&self) {
        self.states.borrow_mut().clear();
        self.nested.borrow_mut().clear();
    }
}

#[must_use = "the guard is released as soon as the ticket is dropped"]
pub struct GuardTicket<'a> {
    guard: &'a RecursionGuard,
    tag: HandlerTag,
}

impl Drop for GuardTicket<'_> {
    fn drop(&mut self) {
        self.guard.exit(self.tag);
    }
}
