//! In-memory port implementations.
//!
//! None of these charge [`Usage`](dispatchr_core::limits::Usage), so a test
//! that only talks to doubles reports zero queries and zero DML.

mod clock;
mod enqueuer;
mod event_bus;
mod http;
mod mutator;
mod selector;

pub use clock::FixedClock;
pub use enqueuer::QueuedEnqueuer;
pub use event_bus::RecordingEventBus;
pub use http::StubHttpClient;
pub use mutator::{MutatorCall, RecordingMutator};
pub use selector::StaticSelector;
