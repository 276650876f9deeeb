//! # Ports (Driven Contracts)
//!
//! The narrow contracts trigger handlers use to reach the outside world.
//!
//! ## What belongs here?
//! * **Data access**: [`selector::Selector`] reads, [`mutator::Mutator`] bulk writes.
//! * **Gateways**: [`http::HttpClient`] outbound calls, [`event_bus::EventBus`] notifications.
//! * **Scheduling**: [`enqueuer::AsyncEnqueuer`] deferred work.
//! * **Time**: [`clock::Clock`].
//!
//! ## Rules
//! 1. All items here must be `traits` or the plain data they exchange.
//! 2. No concrete implementations allowed; production ones live in [`crate::adapters`].
//! 3. Business logic resolves ports through the context's registry and never
//!    constructs an implementation itself.

pub mod clock;
pub mod enqueuer;
pub mod event_bus;
pub mod http;
pub mod mutator;
pub mod selector;
