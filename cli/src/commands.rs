pub mod bindings;
pub mod replay;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use dispatchr_common::config::{Config, Limits};

#[derive(Parser)]
#[command(name = "dispatchr")]
#[command(about = "Record-lifecycle trigger dispatch on an in-process platform.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less decoration (-q drops headers, -qq drops per-record lines)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(flatten)]
    pub limits: LimitFlags,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the contracts the production composition root binds
    #[command(alias = "b")]
    Bindings,
    /// Run a JSON script of bulk mutations through the platform
    #[command(alias = "r")]
    Replay { file: PathBuf },
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct LimitFlags {
    /// Query limit per execution context
    #[arg(long, global = true)]
    pub max_queries: Option<u32>,

    /// DML statement limit per execution context
    #[arg(long, global = true)]
    pub max_dml: Option<u32>,

    /// CPU time limit per execution context, in milliseconds
    #[arg(long, global = true)]
    pub max_cpu_ms: Option<u64>,
}

impl LimitFlags {
    /// Flags given on the command line win over `base`.
    pub fn apply(&self, base: Limits) -> Limits {
        Limits {
            max_queries: self.max_queries.unwrap_or(base.max_queries),
            max_dml: self.max_dml.unwrap_or(base.max_dml),
            max_cpu_ms: self.max_cpu_ms.unwrap_or(base.max_cpu_ms),
        }
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn config(&self) -> Config {
        Config {
            limits: self.limits.apply(Limits::default()),
            quiet: self.quiet,
            ..Config::default()
        }
    }
}
