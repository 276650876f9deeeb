//! # Errors
//!
//! Every failure the core can surface, grouped by who raises it:
//!
//! * [`RegistryError`]: the service registry could not satisfy a lookup.
//! * [`PortError`]: a port implementation failed (backing store, network, queue, limits).
//! * [`MutationError`] / [`BulkMutationError`]: a bulk DML call failed.
//! * [`HandlerError`]: a trigger hook failed and the enclosing operation must abort.

use std::fmt;

use thiserror::Error;

use crate::event::OperationKind;
use crate::mutation::{OutcomeStatus, RecordOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Nothing is bound to the contract, even after bootstrapping.
    #[error("no implementation registered for contract `{0}`")]
    UnresolvedDependency(&'static str),
}

/// Platform resource that can run out within one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Queries,
    Dml,
    CpuTime,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Queries => f.write_str("queries"),
            Resource::Dml => f.write_str("DML statements"),
            Resource::CpuTime => f.write_str("CPU time (ms)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("too many {resource}: {limit}")]
    LimitExceeded { resource: Resource, limit: u64 },

    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("failed to enqueue `{job}`: {message}")]
    Enqueue { job: String, message: String },

    /// The execution context a port was bound to has already ended.
    #[error("execution context closed")]
    ContextClosed,
}

/// A bulk call with at least one failed record.
///
/// Carries one outcome per input record, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct BulkMutationError {
    pub operation: OperationKind,
    pub outcomes: Vec<RecordOutcome>,
}

impl BulkMutationError {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed(_)))
    }
}

impl fmt::Display for BulkMutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bulk {} failed for {} of {} records",
            self.operation,
            self.failed_count(),
            self.outcomes.len()
        )?;
        let first = self.failures().find_map(|o| match &o.status {
            OutcomeStatus::Failed(reason) => Some((o.index, reason)),
            _ => None,
        });
        if let Some((index, reason)) = first {
            write!(f, " (record {index}: {reason})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    /// All-or-none call rejected because a record failed validation.
    #[error(transparent)]
    Bulk(#[from] BulkMutationError),

    /// A trigger hook failed, the whole call was rolled back.
    #[error("trigger aborted bulk {operation}")]
    Trigger {
        operation: OperationKind,
        #[source]
        source: Box<HandlerError>,
    },

    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Debug, Error)]
pub enum HandlerError {
    /// Business rule violation raised by a handler.
    #[error("{0}")]
    Domain(String),

    #[error(transparent)]
    Unresolved(#[from] RegistryError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl HandlerError {
    pub fn domain(message: impl Into<String>) -> Self {
        HandlerError::Domain(message.into())
    }
}

impl From<BulkMutationError> for HandlerError {
    fn from(err: BulkMutationError) -> Self {
        HandlerError::Mutation(MutationError::Bulk(err))
    }
}
