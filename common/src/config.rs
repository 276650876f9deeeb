use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_QUERIES: u32 = 100;
pub const DEFAULT_MAX_DML: u32 = 150;
pub const DEFAULT_MAX_CPU_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Per-context resource ceilings enforced by the platform adapters.
    pub limits: Limits,
    /// Connect timeout of the production HTTP client.
    pub http_connect_timeout: Duration,
    /// Overall request timeout of the production HTTP client.
    pub http_timeout: Duration,
    /// Number of events the broadcast bus buffers before lagging subscribers drop them.
    pub bus_capacity: usize,
    /// Suppresses headers and summaries, 0 means everything is printed.
    pub quiet: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            http_connect_timeout: Duration::from_secs(15),
            http_timeout: Duration::from_secs(60),
            bus_capacity: 256,
            quiet: 0,
        }
    }
}

/// Resource ceilings for a single execution context.
///
/// The same shape is used for the platform's own enforcement and for the
/// budgets tests assert against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_queries: u32,
    pub max_dml: u32,
    pub max_cpu_ms: u64,
}

impl Limits {
    /// Limits that are never reached.
    pub fn unlimited() -> Self {
        Self {
            max_queries: u32::MAX,
            max_dml: u32::MAX,
            max_cpu_ms: u64::MAX,
        }
    }

    pub fn with_queries(mut self, max_queries: u32) -> Self {
        self.max_queries = max_queries;
        self
    }

    pub fn with_dml(mut self, max_dml: u32) -> Self {
        self.max_dml = max_dml;
        self
    }

    pub fn with_cpu_ms(mut self, max_cpu_ms: u64) -> Self {
        self.max_cpu_ms = max_cpu_ms;
        self
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_queries: DEFAULT_MAX_QUERIES,
            max_dml: DEFAULT_MAX_DML,
            max_cpu_ms: DEFAULT_MAX_CPU_MS,
        }
    }
}
