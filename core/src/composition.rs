//! # Composition Root
//!
//! The one place production implementations are constructed. A registry
//! runs its root on first use and after every reset, so every context (and
//! every test that clears its overrides) starts from the same bindings.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use dispatchr_common::config::{Config, Limits};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::debug;

use crate::adapters::clock::SystemClock;
use crate::adapters::enqueuer::RuntimeEnqueuer;
use crate::adapters::event_bus::BroadcastBus;
use crate::adapters::http::ReqwestClient;
use crate::adapters::store::{StoreMutator, StoreSelector};
use crate::context::ExecutionContext;
use crate::platform::Platform;
use crate::ports::clock::Clock;
use crate::ports::enqueuer::AsyncEnqueuer;
use crate::ports::event_bus::{EventBus, PlatformEvent};
use crate::ports::http::HttpClient;
use crate::ports::mutator::Mutator;
use crate::ports::selector::Selector;
use crate::registry::ServiceRegistry;

/// Installs the default binding for every contract into `registry`.
///
/// Implementations must be idempotent: the same root runs once per context and
/// again after each reset.
pub trait CompositionRoot: Send + Sync {
    fn register_all(&self, registry: &ServiceRegistry);
}

impl<F> CompositionRoot for F
where
    F: Fn(&ServiceRegistry) + Send + Sync,
{
    fn register_all(&self, registry: &ServiceRegistry) {
        self(registry)
    }
}

/// Binds every port to the in-process platform and the real outside world.
pub struct ProductionRoot {
    platform: Platform,
    bus: broadcast::Sender<PlatformEvent>,
    runtime: Option<Handle>,
    http_connect_timeout: Duration,
    http_timeout: Duration,
    limits: Limits,
}

impl ProductionRoot {
    /// Picks up the current tokio runtime, if any, for deferred jobs.
    pub fn new(platform: Platform, config: &Config) -> Self {
        let (bus, _) = broadcast::channel(config.bus_capacity.max(1));
        Self {
            platform,
            bus,
            runtime: Handle::try_current().ok(),
            http_connect_timeout: config.http_connect_timeout,
            http_timeout: config.http_timeout,
            limits: config.limits,
        }
    }

    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.bus.subscribe()
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Opens a context bootstrapped from this root with its configured limits.
    pub fn open_context(self: &Arc<Self>) -> Rc<ExecutionContext> {
        let root: Arc<dyn CompositionRoot> = Arc::clone(self) as Arc<dyn CompositionRoot>;
        ExecutionContext::open_with_limits(root, self.limits)
    }
}

impl CompositionRoot for ProductionRoot {
    fn register_all(&self, registry: &ServiceRegistry) {
        let scope = registry.scope();

        registry.register::<dyn Selector>(Rc::new(StoreSelector::new(
            self.platform.clone(),
            scope.clone(),
        )));
        registry.register::<dyn Mutator>(Rc::new(StoreMutator::new(self.platform.clone(), scope)));
        registry.register::<dyn HttpClient>(Rc::new(ReqwestClient::new(
            self.http_connect_timeout,
            self.http_timeout,
        )));
        registry.register::<dyn AsyncEnqueuer>(Rc::new(RuntimeEnqueuer::new(
            self.runtime.clone(),
            registry.root(),
            self.limits,
        )));
        registry.register::<dyn EventBus>(Rc::new(BroadcastBus::new(self.bus.clone())));
        registry.register::<dyn Clock>(Rc::new(SystemClock));

        debug!(contracts = registry.contracts().len(), "production bindings installed");
    }
}
