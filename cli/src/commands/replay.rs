//! Replays a JSON script of bulk mutations through the in-process platform.
//!
//! ```json
//! {
//!   "limits": { "max_dml": 20 },
//!   "seed": [{ "id": "acc-1", "object": "Account", "fields": { "Name": "Acme" } }],
//!   "steps": [
//!     { "operation": "update", "records": [{ "id": "acc-1", "fields": { "Rating": "Hot" } }] },
//!     { "operation": "insert", "mode": "partial", "records": [{ "object": "Contact" }] }
//!   ]
//! }
//! ```
//!
//! Every object named in the script gets an [`AuditHandler`] trigger.

use std::collections::BTreeSet;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use colored::*;
use dispatchr_common::config::{Config, Limits};
use dispatchr_common::error::MutationError;
use dispatchr_common::event::OperationKind;
use dispatchr_common::mutation::{BulkOutcome, MutationMode, OutcomeStatus, RecordOutcome};
use dispatchr_common::record::{Record, RecordMap};
use dispatchr_core::handler::HookResult;
use dispatchr_core::limits::UsageSnapshot;
use dispatchr_core::platform::Platform;
use dispatchr_core::ports::clock::Clock;
use dispatchr_core::ports::event_bus::{EventBus, PlatformEvent};
use dispatchr_core::{ExecutionContext, ProductionRoot, TriggerHandler};
use serde::Deserialize;
use serde_json::json;
use tracing::info_span;

use crate::commands::LimitFlags;
use crate::terminal::{colors, print};

pub const AUDIT_CHANNEL: &str = "audit";
pub const MODIFIED_FIELD: &str = "LastModifiedAt";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default)]
    pub limits: Option<Limits>,
    #[serde(default)]
    pub seed: Vec<Record>,
    pub steps: Vec<Step>,
}

impl Script {
    /// Objects named anywhere in the script, sorted.
    pub fn objects(&self) -> BTreeSet<String> {
        self.seed
            .iter()
            .chain(self.steps.iter().flat_map(|step| step.records.iter()))
            .filter(|record| !record.object.is_empty())
            .map(|record| record.object.clone())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub operation: OperationKind,
    #[serde(default)]
    pub mode: MutationMode,
    pub records: Vec<Record>,
}

/// Stamps a modification time on records about to be written and publishes
/// one audit notice per written batch.
pub struct AuditHandler;

impl AuditHandler {
    fn stamp(ctx: &ExecutionContext, records: &mut [Record]) -> HookResult {
        let now = ctx.resolve::<dyn Clock>()?.now().to_rfc3339();
        for record in records {
            record.set(MODIFIED_FIELD, now.clone());
        }
        Ok(())
    }

    fn publish<'a>(
        ctx: &ExecutionContext,
        operation: OperationKind,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> HookResult {
        let records: Vec<&Record> = records.into_iter().collect();
        let object = records.first().map(|r| r.object.as_str()).unwrap_or_default();
        let ids: Vec<String> = records
            .iter()
            .filter_map(|r| r.id.as_ref().map(ToString::to_string))
            .collect();

        let clock = ctx.resolve::<dyn Clock>()?;
        let bus = ctx.resolve::<dyn EventBus>()?;
        bus.publish(PlatformEvent::new(
            AUDIT_CHANNEL,
            json!({
                "operation": operation,
                "object": object,
                "count": records.len(),
                "ids": ids,
            }),
            clock.now(),
        ));
        Ok(())
    }
}

impl TriggerHandler for AuditHandler {
    fn before_insert(
        &self,
        ctx: &ExecutionContext,
        new: &mut [Record],
        _old: &RecordMap,
    ) -> HookResult {
        Self::stamp(ctx, new)
    }

    fn before_update(
        &self,
        ctx: &ExecutionContext,
        new: &mut [Record],
        _old: &RecordMap,
    ) -> HookResult {
        Self::stamp(ctx, new)
    }

    fn after_insert(&self, ctx: &ExecutionContext, new: &[Record], _old: &RecordMap) -> HookResult {
        Self::publish(ctx, OperationKind::Insert, new)
    }

    fn after_update(&self, ctx: &ExecutionContext, new: &[Record], _old: &RecordMap) -> HookResult {
        Self::publish(ctx, OperationKind::Update, new)
    }

    fn after_delete(&self, ctx: &ExecutionContext, _new: &[Record], old: &RecordMap) -> HookResult {
        Self::publish(ctx, OperationKind::Delete, old.values())
    }

    fn after_undelete(
        &self,
        ctx: &ExecutionContext,
        new: &[Record],
        _old: &RecordMap,
    ) -> HookResult {
        Self::publish(ctx, OperationKind::Undelete, new)
    }
}

pub struct StepReport {
    pub operation: OperationKind,
    pub mode: MutationMode,
    pub result: Result<BulkOutcome, MutationError>,
}

pub struct Report {
    pub steps: Vec<StepReport>,
    pub usage: UsageSnapshot,
}

pub async fn replay(file: &Path, cfg: Config, flags: LimitFlags) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read script {}", file.display()))?;
    let script: Script = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse script {}", file.display()))?;

    let cfg = Config {
        limits: flags.apply(script.limits.unwrap_or_default()),
        ..cfg
    };
    let root = Arc::new(ProductionRoot::new(prepare(&script), &cfg));
    let mut notices = root.subscribe();

    let start_time: Instant = Instant::now();
    let worker_root = Arc::clone(&root);
    let report = tokio::task::spawn_blocking(move || run_script(&worker_root, script.steps))
        .await
        .context("replay worker panicked")?;

    let mut published = Vec::new();
    while let Ok(event) = notices.try_recv() {
        published.push(event);
    }

    print_steps(&report, &cfg);
    print_notices(&published, &cfg);
    print_usage(report.usage, cfg.limits, &cfg);
    print_summary(&report, start_time.elapsed(), &cfg);
    Ok(())
}

/// Seeds a platform with the script's records and audits every object it names.
pub fn prepare(script: &Script) -> Platform {
    let platform = Platform::new();
    for object in script.objects() {
        platform.register_trigger(object, || AuditHandler);
    }
    platform.seed(script.seed.iter().cloned());
    platform
}

/// Runs every step inside one execution context, one DML statement per step.
pub fn run_script(root: &Arc<ProductionRoot>, steps: Vec<Step>) -> Report {
    let ctx = root.open_context();
    let span = info_span!("replay", context = %ctx.id());
    let _enter = span.enter();

    let steps = steps
        .into_iter()
        .map(|step| StepReport {
            operation: step.operation,
            mode: step.mode,
            result: root
                .platform()
                .execute(&ctx, step.operation, step.records, step.mode),
        })
        .collect();

    Report {
        steps,
        usage: ctx.usage().snapshot(),
    }
}

fn mode_label(mode: MutationMode) -> &'static str {
    match mode {
        MutationMode::AllOrNone => "all-or-none",
        MutationMode::Partial => "partial",
    }
}

fn outcome_detail(outcome: &RecordOutcome) -> (String, ColoredString) {
    let key = format!("#{}", outcome.index);
    let value = match &outcome.status {
        OutcomeStatus::Succeeded => outcome
            .id
            .as_ref()
            .map_or_else(|| "ok".to_string(), ToString::to_string)
            .color(colors::SUCCESS),
        OutcomeStatus::Failed(reason) => format!("failed: {reason}").color(colors::FAILURE),
        OutcomeStatus::RolledBack => "rolled back".color(colors::MUTED),
    };
    (key, value)
}

fn print_steps(report: &Report, cfg: &Config) {
    print::header("steps", cfg.quiet);
    for (idx, step) in report.steps.iter().enumerate() {
        print::tree_head(idx, &format!("{} ({})", step.operation, mode_label(step.mode)));
        if cfg.quiet > 1 {
            continue;
        }

        let details: Vec<(String, ColoredString)> = match &step.result {
            Ok(outcome) => outcome.outcomes.iter().map(outcome_detail).collect(),
            Err(MutationError::Bulk(bulk)) => bulk.outcomes.iter().map(outcome_detail).collect(),
            Err(err) => vec![("error".to_string(), error_chain(err).color(colors::FAILURE))],
        };
        print::as_tree_one_level(&details);
    }
}

/// `outer: inner: root cause`
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    message
}

fn print_notices(published: &[PlatformEvent], cfg: &Config) {
    if published.is_empty() {
        return;
    }
    print::header("notices", cfg.quiet);
    for event in published {
        print::print_status(format!(
            "{} {}",
            event.channel.color(colors::ACCENT),
            event.payload
        ));
    }
}

fn print_usage(usage: UsageSnapshot, limits: Limits, cfg: &Config) {
    print::header("usage", cfg.quiet);
    print::aligned_line("queries", format!("{}/{}", usage.queries, limits.max_queries));
    print::aligned_line("dml", format!("{}/{}", usage.dml, limits.max_dml));
    print::aligned_line("cpu (ms)", format!("{}/{}", usage.cpu_ms(), limits.max_cpu_ms));
}

fn print_summary(report: &Report, total_time: Duration, cfg: &Config) {
    let applied = report.steps.iter().filter(|s| s.result.is_ok()).count();
    let output = format!(
        "Replay complete: {applied} of {} steps applied in {:.2}s",
        report.steps.len(),
        total_time.as_secs_f64()
    );

    match cfg.quiet {
        0 => {
            print::fat_separator();
            print::centerln(&output);
        }
        _ => {
            print::blank();
            print::print_status(output);
        }
    }
}
