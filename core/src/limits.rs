//! Resource accounting for one execution context.
//!
//! Production adapters charge every real query and DML statement here and
//! fail once the configured [`Limits`] are exhausted. Test doubles never
//! charge, which is what lets a test assert that no real data access happened.

use std::cell::Cell;
use std::time::{Duration, Instant};

use dispatchr_common::config::Limits;
use dispatchr_common::error::{PortError, Resource};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageSnapshot {
    pub queries: u32,
    pub dml: u32,
    pub cpu: Duration,
}

impl UsageSnapshot {
    pub fn cpu_ms(&self) -> u64 {
        u64::try_from(self.cpu.as_millis()).unwrap_or(u64::MAX)
    }
}

pub struct Usage {
    limits: Limits,
    queries: Cell<u32>,
    dml: Cell<u32>,
    cpu: Cell<Duration>,
    cpu_depth: Cell<u32>,
}

impl Usage {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            queries: Cell::new(0),
            dml: Cell::new(0),
            cpu: Cell::new(Duration::ZERO),
            cpu_depth: Cell::new(0),
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn charge_query(&self) -> Result<(), PortError> {
        charge(&self.queries, self.limits.max_queries, Resource::Queries)
    }

    pub fn charge_dml(&self) -> Result<(), PortError> {
        charge(&self.dml, self.limits.max_dml, Resource::Dml)
    }

    /// Runs `f` and charges its duration as CPU time.
    ///
    /// Only the outermost measurement counts, nested calls are already
    /// covered by the enclosing one.
    pub fn measure_cpu<R>(&self, f: impl FnOnce() -> R) -> R {
        let outermost = self.cpu_depth.get() == 0;
        let _depth = DepthGuard::enter(&self.cpu_depth);
        let started = Instant::now();

        let result = f();

        if outermost {
            self.cpu.set(self.cpu.get() + started.elapsed());
        }
        result
    }

    pub fn check_cpu(&self) -> Result<(), PortError> {
        let spent = self.snapshot().cpu_ms();
        if spent > self.limits.max_cpu_ms {
            warn!(spent, limit = self.limits.max_cpu_ms, "CPU time limit exceeded");
            return Err(PortError::LimitExceeded {
                resource: Resource::CpuTime,
                limit: self.limits.max_cpu_ms,
            });
        }
        Ok(())
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            queries: self.queries.get(),
            dml: self.dml.get(),
            cpu: self.cpu.get(),
        }
    }

    pub fn reset(&self) {
        self.queries.set(0);
        self.dml.set(0);
        self.cpu.set(Duration::ZERO);
    }
}

fn charge(counter: &Cell<u32>, limit: u32, resource: Resource) -> Result<(), PortError> {
    let next = counter.get().saturating_add(1);
    if next > limit {
        warn!(%resource, limit, "platform limit exceeded");
        return Err(PortError::LimitExceeded {
            resource,
            limit: u64::from(limit),
        });
    }
    counter.set(next);
    Ok(())
}

struct DepthGuard<'a>(&'a Cell<u32>);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}
