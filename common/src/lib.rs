//! # Dispatchr Common
//!
//! Shared vocabulary used by every other crate in the workspace.
//!
//! * **[`record`]**: The platform record model (`Record`, `RecordId`, `RecordMap`).
//! * **[`event`]**: Lifecycle events delivered by the host (`LifecycleEvent`, `Phase`, `OperationKind`).
//! * **[`error`]**: Error types raised by ports, handlers and the registry.
//! * **[`mutation`]**: Bulk mutation modes and per-record outcomes.
//! * **[`config`]**: Runtime configuration and platform limits.
//!
//! Nothing in here performs IO.

pub mod config;
pub mod error;
pub mod event;
pub mod mutation;
pub mod record;
