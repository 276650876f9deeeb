//! # Adapters (Production Implementations)
//!
//! Concrete implementations of the [`crate::ports`], wired up exclusively by
//! [`ProductionRoot`](crate::composition::ProductionRoot).
//!
//! * **[`store`]**: Selector / Mutator backed by the in-process [`Platform`](crate::platform::Platform).
//! * **[`http`]**: Blocking `reqwest` client.
//! * **[`enqueuer`]**: Deferred jobs on the tokio blocking pool.
//! * **[`event_bus`]**: `tokio::sync::broadcast` publisher.
//! * **[`clock`]**: Wall clock.
//!
//! ## Rules
//! * Adapters **MUST** only be instantiated by the composition root.
//! * Adapters that charge resource usage hold a weak handle to their context
//!   and fail with `PortError::ContextClosed` once it is gone.

pub mod clock;
pub mod enqueuer;
pub mod event_bus;
pub mod http;
pub mod store;
