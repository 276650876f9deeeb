//! # Execution Context
//!
//! One platform transaction, one async job or one test case. The context owns
//! every piece of per-scope state: the service registry, the recursion guard
//! and resource usage. It is created when the scope starts and dropped when it
//! ends; nothing in it is shared with other contexts.
//!
//! Contexts are reference counted (`Rc`) and deliberately `!Send`, so two
//! contexts can never touch each other's state from different threads.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use dispatchr_common::config::Limits;
use dispatchr_common::error::RegistryError;
use tracing::debug;
use uuid::Uuid;

use crate::composition::CompositionRoot;
use crate::guard::RecursionGuard;
use crate::limits::Usage;
use crate::registry::ServiceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

pub struct ExecutionContext {
    id: ContextId,
    registry: ServiceRegistry,
    guard: RecursionGuard,
    usage: Usage,
}

impl ExecutionContext {
    pub fn open(root: Arc<dyn CompositionRoot>) -> Rc<Self> {
        Self::open_with_limits(root, Limits::default())
    }

    pub fn open_with_limits(root: Arc<dyn CompositionRoot>, limits: Limits) -> Rc<Self> {
        let id = ContextId::new();
        debug!(context = %id, "execution context opened");

        Rc::new_cyclic(|scope| Self {
            id,
            registry: ServiceRegistry::scoped(root, scope.clone()),
            guard: RecursionGuard::new(),
            usage: Usage::new(limits),
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn guard(&self) -> &RecursionGuard {
        &self.guard
    }

    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Shorthand for `self.registry().resolve::<T>()`.
    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<Rc<T>, RegistryError> {
        self.registry.resolve::<T>()
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        debug!(context = %self.id, "execution context closed");
    }
}
