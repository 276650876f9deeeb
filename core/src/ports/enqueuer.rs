//! Deferred work.
//!
//! A unit of work handed to [`AsyncEnqueuer::enqueue`] runs later, in a fresh
//! execution context of its own, with no ordering guarantee relative to the
//! code that enqueued it. The enqueuing context may be gone by then, which is
//! why a unit of work must own everything it needs (`Send + 'static`).

use std::fmt;

use dispatchr_common::error::{HandlerError, PortError};
use uuid::Uuid;

use crate::context::ExecutionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(Uuid);

impl JobHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0.simple())
    }
}

pub trait UnitOfWork: Send + 'static {
    fn name(&self) -> &str;

    /// Runs the work inside `ctx`, the context opened for this job.
    fn run(self: Box<Self>, ctx: &ExecutionContext) -> Result<(), HandlerError>;
}

pub trait AsyncEnqueuer {
    fn enqueue(&self, work: Box<dyn UnitOfWork>) -> Result<JobHandle, PortError>;
}

/// Unit of work backed by a closure.
pub struct FnJob<F> {
    name: String,
    body: F,
}

impl<F> UnitOfWork for FnJob<F>
where
    F: FnOnce(&ExecutionContext) -> Result<(), HandlerError> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, ctx: &ExecutionContext) -> Result<(), HandlerError> {
        let FnJob { body, .. } = *self;
        body(ctx)
    }
}

/// Wraps a closure as a boxed unit of work.
pub fn job<F>(name: impl Into<String>, body: F) -> Box<dyn UnitOfWork>
where
    F: FnOnce(&ExecutionContext) -> Result<(), HandlerError> + Send + 'static,
{
    Box::new(FnJob {
        name: name.into(),
        body,
    })
}
