//! # Dispatchr Testkit
//!
//! Test-only surface for handler code:
//!
//! * **[`overrides`]**: [`TestOverrideRegistry`], a context whose bindings can
//!   be swapped for doubles and whose resource usage is checked against a budget.
//! * **[`doubles`]**: In-memory implementations of every port.

pub mod doubles;
pub mod overrides;

use std::rc::Rc;
use std::sync::Arc;

use dispatchr_core::{CompositionRoot, ExecutionContext, ServiceRegistry};

pub use overrides::{BudgetViolation, TestOverrideRegistry};

/// A root that binds nothing. Every contract a test needs must be mocked.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRoot;

impl CompositionRoot for NoopRoot {
    fn register_all(&self, _registry: &ServiceRegistry) {}
}

/// A fresh context with no bindings and default limits.
pub fn test_context() -> Rc<ExecutionContext> {
    ExecutionContext::open(Arc::new(NoopRoot))
}
