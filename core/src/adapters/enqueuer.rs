use std::sync::Arc;

use dispatchr_common::config::Limits;
use dispatchr_common::error::PortError;
use tokio::runtime::Handle;
use tracing::{debug, error, info_span};

use crate::composition::CompositionRoot;
use crate::context::ExecutionContext;
use crate::ports::enqueuer::{AsyncEnqueuer, JobHandle, UnitOfWork};

/// Hands work to the tokio blocking pool. Each job opens its own execution
/// context from the same composition root, so it never sees the enqueuing
/// context's bindings or guard state.
pub struct RuntimeEnqueuer {
    runtime: Option<Handle>,
    root: Arc<dyn CompositionRoot>,
    limits: Limits,
}

impl RuntimeEnqueuer {
    pub fn new(runtime: Option<Handle>, root: Arc<dyn CompositionRoot>, limits: Limits) -> Self {
        Self {
            runtime,
            root,
            limits,
        }
    }
}

impl AsyncEnqueuer for RuntimeEnqueuer {
    fn enqueue(&self, work: Box<dyn UnitOfWork>) -> Result<JobHandle, PortError> {
        let name = work.name().to_owned();
        let Some(runtime) = &self.runtime else {
            return Err(PortError::Enqueue {
                job: name,
                message: "no async runtime available".into(),
            });
        };

        let handle = JobHandle::new();
        let root = Arc::clone(&self.root);
        let limits = self.limits;
        debug!(job = %handle, %name, "job enqueued");

        runtime.spawn_blocking(move || {
            let span = info_span!("job", job = %handle, %name);
            let _enter = span.enter();

            let ctx = ExecutionContext::open_with_limits(root, limits);
            match work.run(&ctx) {
                Ok(()) => debug!("job finished"),
                Err(err) => error!(error = %err, "job failed"),
            }
        });
        Ok(handle)
    }
}
