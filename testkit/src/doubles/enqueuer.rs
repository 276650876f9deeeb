use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

use dispatchr_common::config::Limits;
use dispatchr_common::error::{HandlerError, PortError};
use dispatchr_core::ports::enqueuer::{AsyncEnqueuer, JobHandle, UnitOfWork};
use dispatchr_core::{CompositionRoot, ExecutionContext};
use tracing::debug;

/// Holds enqueued work until the test decides to run it.
#[derive(Default)]
pub struct QueuedEnqueuer {
    queue: RefCell<VecDeque<(JobHandle, Box<dyn UnitOfWork>)>>,
}

impl QueuedEnqueuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.queue
            .borrow()
            .iter()
            .map(|(_, work)| work.name().to_owned())
            .collect()
    }

    /// Runs every queued job, including jobs enqueued while draining, each in
    /// a fresh context bootstrapped from `root` and held to `limits`. Stops at
    /// the first failure.
    pub fn drain(
        &self,
        root: Arc<dyn CompositionRoot>,
        limits: Limits,
    ) -> Result<usize, HandlerError> {
        let mut ran = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some((handle, work)) = next else {
                return Ok(ran);
            };

            debug!(job = %handle, name = work.name(), "running queued job");
            let ctx = ExecutionContext::open_with_limits(Arc::clone(&root), limits);
            work.run(&ctx)?;
            ran += 1;
        }
    }
}

impl AsyncEnqueuer for QueuedEnqueuer {
    fn enqueue(&self, work: Box<dyn UnitOfWork>) -> Result<JobHandle, PortError> {
        let handle = JobHandle::new();
        self.queue.borrow_mut().push_back((handle, work));
        Ok(handle)
    }
}
