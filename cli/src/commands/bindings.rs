use std::sync::Arc;

use colored::*;
use dispatchr_common::config::Config;
use dispatchr_core::ProductionRoot;
use dispatchr_core::platform::Platform;

use crate::terminal::{colors, print};

pub fn bindings(cfg: &Config) -> anyhow::Result<()> {
    let root = Arc::new(ProductionRoot::new(Platform::new(), cfg));
    let ctx = root.open_context();
    ctx.registry().bootstrap();

    let contracts = ctx.registry().contracts();
    for contract in &contracts {
        print::aligned_line(short_name(contract), contract.to_string());
    }

    print::header("limits", cfg.quiet);
    let limits = ctx.usage().limits();
    print::aligned_line("queries", limits.max_queries.to_string());
    print::aligned_line("dml", limits.max_dml.to_string());
    print::aligned_line("cpu (ms)", limits.max_cpu_ms.to_string());

    if cfg.quiet == 0 {
        print::fat_separator();
        print::centerln(&format!("{} contracts bound in context {}", contracts.len(), ctx.id()));
    } else {
        print::blank();
        print::print_status(
            format!("{} contracts bound", contracts.len())
                .color(colors::SUCCESS)
                .to_string(),
        );
    }
    Ok(())
}

/// `dyn dispatchr_core::ports::clock::Clock` -> `Clock`
fn short_name(contract: &str) -> &str {
    contract.rsplit("::").next().unwrap_or(contract)
}
