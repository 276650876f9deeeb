//! Binding overrides and the resource budget guard.

use std::rc::Rc;
use std::sync::Arc;

use dispatchr_common::config::Limits;
use dispatchr_common::error::Resource;
use dispatchr_core::limits::UsageSnapshot;
use dispatchr_core::{CompositionRoot, ExecutionContext};
use thiserror::Error;
use tracing::debug;

use crate::NoopRoot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{resource} budget exceeded: used {actual}, configured {budget}")]
pub struct BudgetViolation {
    pub resource: Resource,
    pub actual: u64,
    pub budget: u64,
}

/// One test case's execution context plus the budget it must stay within.
///
/// Doubles registered with [`register_mock`](Self::register_mock) never
/// charge usage, only the production adapters do. A budget of zero queries
/// therefore asserts that a handler never reached the real store.
pub struct TestOverrideRegistry {
    ctx: Rc<ExecutionContext>,
    budget: Limits,
}

impl TestOverrideRegistry {
    pub fn new(root: Arc<dyn CompositionRoot>) -> Self {
        Self {
            ctx: ExecutionContext::open(root),
            budget: Limits::default(),
        }
    }

    /// A registry with nothing bound until mocks are registered.
    pub fn isolated() -> Self {
        Self::new(Arc::new(NoopRoot))
    }

    pub fn with_budget(mut self, budget: Limits) -> Self {
        self.budget = budget;
        self
    }

    pub fn context(&self) -> &Rc<ExecutionContext> {
        &self.ctx
    }

    /// Binds `mock` to contract `T` in this test's context, replacing whatever
    /// the composition root installed.
    pub fn register_mock<T: ?Sized + 'static>(&self, mock: Rc<T>) -> &Self {
        self.ctx.registry().register::<T>(mock);
        self
    }

    /// Drops every override and clears guard state and usage. The next
    /// resolve sees production bindings again.
    pub fn reset(&self) {
        self.ctx.registry().reset();
        self.ctx.guard().reset();
        self.ctx.usage().reset();
        debug!(context = %self.ctx.id(), "test overrides reset");
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.ctx.usage().snapshot()
    }

    pub fn budget(&self) -> Limits {
        self.budget
    }

    pub fn check_budget(&self) -> Result<(), BudgetViolation> {
        let usage = self.usage();
        let checks = [
            (
                Resource::Queries,
                u64::from(usage.queries),
                u64::from(self.budget.max_queries),
            ),
            (
                Resource::Dml,
                u64::from(usage.dml),
                u64::from(self.budget.max_dml),
            ),
            (Resource::CpuTime, usage.cpu_ms(), self.budget.max_cpu_ms),
        ];

        match checks.into_iter().find(|(_, actual, budget)| actual > budget) {
            Some((resource, actual, budget)) => Err(BudgetViolation {
                resource,
                actual,
                budget,
            }),
            None => Ok(()),
        }
    }

    /// Fails the current test when usage exceeds the budget.
    #[track_caller]
    pub fn assert_within_budget(&self) {
        if let Err(violation) = self.check_budget() {
            panic!("{violation}");
        }
    }
}
