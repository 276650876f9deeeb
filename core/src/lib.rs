//! # Dispatchr Core
//!
//! Runtime infrastructure for record-lifecycle triggers, laid out as a small
//! hexagon:
//!
//! * **[`context`]**: One execution context (platform transaction or test case)
//!   owning its registry, recursion guard and resource usage.
//! * **[`registry`]** / **[`composition`]**: Contract-to-implementation bindings
//!   and the single place production implementations are built.
//! * **[`router`]** / **[`handler`]** / **[`guard`]**: Routing lifecycle events to
//!   exactly one handler hook, once per batch, without re-entrant recursion.
//! * **[`ports`]**: The narrow contracts handlers depend on.
//! * **[`adapters`]**: Production implementations of the ports.
//! * **[`platform`]**: In-process host that persists records and fires triggers.
//! * **[`limits`]**: Per-context resource accounting.

pub mod adapters;
pub mod composition;
pub mod context;
pub mod guard;
pub mod handler;
pub mod limits;
pub mod platform;
pub mod ports;
pub mod registry;
pub mod router;

pub use composition::{CompositionRoot, ProductionRoot};
pub use context::{ContextId, ExecutionContext};
pub use handler::{HandlerTag, TriggerHandler};
pub use registry::{ContractTag, ServiceRegistry};
pub use router::{DispatchOutcome, LifecycleEventRouter};
