//! Contract-to-implementation bindings for one execution context.
//!
//! Contracts are usually trait objects (`dyn Selector`), bindings are shared
//! `Rc` handles so every resolver in the context sees the same instance. The
//! registry bootstraps itself lazily from its [`CompositionRoot`] the first
//! time it is touched, and again after every [`ServiceRegistry::reset`].

use std::any::{Any, TypeId, type_name};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use dispatchr_common::error::RegistryError;
use tracing::debug;

use crate::composition::CompositionRoot;
use crate::context::ExecutionContext;

/// Identifies a contract by type.
#[derive(Clone, Copy)]
pub struct ContractTag {
    id: TypeId,
    name: &'static str,
}

impl ContractTag {
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

impl PartialEq for ContractTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ContractTag {}

impl Hash for ContractTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ContractTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

struct Binding {
    tag: ContractTag,
    /// Always an `Rc<T>` where `T` is the contract named by `tag`.
    instance: Box<dyn Any>,
}

pub struct ServiceRegistry {
    bindings: RefCell<HashMap<ContractTag, Binding>>,
    bootstrapped: Cell<bool>,
    root: Arc<dyn CompositionRoot>,
    scope: Weak<ExecutionContext>,
}

impl ServiceRegistry {
    /// Creates a registry that is not attached to any execution context.
    pub fn new(root: Arc<dyn CompositionRoot>) -> Self {
        Self::scoped(root, Weak::new())
    }

    pub(crate) fn scoped(root: Arc<dyn CompositionRoot>, scope: Weak<ExecutionContext>) -> Self {
        Self {
            bindings: RefCell::new(HashMap::new()),
            bootstrapped: Cell::new(false),
            root,
            scope,
        }
    }

    /// Binds `implementation` to contract `T`, replacing any previous binding.
    ///
    /// Registering on a registry that has not bootstrapped yet installs the
    /// production bindings first, so the explicit binding always wins.
    pub fn register<T: ?Sized + 'static>(&self, implementation: Rc<T>) {
        self.bootstrap();

        let tag = ContractTag::of::<T>();
        let binding = Binding {
            tag,
            instance: Box::new(implementation),
        };
        let previous = self.bindings.borrow_mut().insert(tag, binding);

        if previous.is_some() {
            debug!(contract = tag.name(), "binding replaced");
        } else {
            debug!(contract = tag.name(), "binding registered");
        }
    }

    /// Returns the implementation bound to contract `T`.
    ///
    /// # Errors
    /// [`RegistryError::UnresolvedDependency`] when nothing is bound to `T`
    /// after bootstrapping.
    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<Rc<T>, RegistryError> {
        self.bootstrap();

        let tag = ContractTag::of::<T>();
        self.bindings
            .borrow()
            .get(&tag)
            .and_then(|binding| binding.instance.downcast_ref::<Rc<T>>())
            .cloned()
            .ok_or(RegistryError::UnresolvedDependency(tag.name()))
    }

    /// Runs the composition root unless it already ran since the last reset.
    pub fn bootstrap(&self) {
        if self.bootstrapped.replace(true) {
            return;
        }
        debug!("bootstrapping service registry");
        self.root.register_all(self);
    }

    /// Drops every binding. The next access bootstraps again.
    pub fn reset(&self) {
        self.bindings.borrow_mut().clear();
        self.bootstrapped.set(false);
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.get()
    }

    /// Whether `T` is bound right now. Does not bootstrap.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.bindings.borrow().contains_key(&ContractTag::of::<T>())
    }

    /// Names of the bound contracts, sorted.
    pub fn contracts(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .bindings
            .borrow()
            .values()
            .map(|binding| binding.tag.name())
            .collect();
        names.sort_unstable();
        names
    }

    /// Handle to the owning context, for adapters that call back into the host.
    pub fn scope(&self) -> Weak<ExecutionContext> {
        self.scope.clone()
    }

    pub fn root(&self) -> Arc<dyn CompositionRoot> {
        Arc::clone(&self.root)
    }
}
