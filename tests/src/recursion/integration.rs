#![cfg(test)]
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dispatchr_common::config::Config;
use dispatchr_common::event::OperationKind;
use dispatchr_common::mutation::MutationMode;
use dispatchr_common::record::{Record, RecordMap};
use dispatchr_core::guard::GuardState;
use dispatchr_core::handler::{HandlerTag, HookResult};
use dispatchr_core::platform::Platform;
use dispatchr_core::ports::mutator::Mutator;
use dispatchr_core::{ExecutionContext, ProductionRoot, TriggerHandler};

/// Inserts one follow-up task for every batch of new tasks.
struct FollowUp {
    runs: Arc<AtomicUsize>,
}

impl TriggerHandler for FollowUp {
    fn after_insert(&self, ctx: &ExecutionContext, new: &[Record], _: &RecordMap) -> HookResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let subject = format!("follow up {}", new.len());
        let follow_up = Record::new("Task").with_field("Subject", subject);
        ctx.resolve::<dyn Mutator>()?
            .insert_all(vec![follow_up], MutationMode::AllOrNone)?;
        Ok(())
    }
}

fn production(platform: &Platform) -> Arc<ProductionRoot> {
    Arc::new(ProductionRoot::new(platform.clone(), &Config::default()))
}

fn counted<H, F>(platform: &Platform, object: &str, build: F) -> Arc<AtomicUsize>
where
    H: TriggerHandler,
    F: Fn(Arc<AtomicUsize>) -> H + Send + Sync + 'static,
{
    let runs = Arc::new(AtomicUsize::new(0));
    let shared = Arc::clone(&runs);
    platform.register_trigger(object, move || build(Arc::clone(&shared)));
    runs
}

#[test]
fn reentrant_insert_runs_handler_once_per_top_level_call() {
    let platform = Platform::new();
    let runs = counted(&platform, "Task", |runs| FollowUp { runs });
    let root = production(&platform);
    let ctx = root.open_context();

    platform
        .execute(
            &ctx,
            OperationKind::Insert,
            vec![Record::new("Task"), Record::new("Task")],
            MutationMode::AllOrNone,
        )
        .unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(platform.records("Task").len(), 3);
    assert_eq!(ctx.usage().snapshot().dml, 2);
    assert_eq!(ctx.guard().state(HandlerTag::of::<FollowUp>()), GuardState::Idle);
}

#[test]
fn guard_is_idle_again_for_the_next_context() {
    let platform = Platform::new();
    let runs = counted(&platform, "Task", |runs| FollowUp { runs });
    let root = production(&platform);

    for _ in 0..2 {
        let ctx = root.open_context();
        let tasks = vec![Record::new("Task")];
        platform
            .execute(&ctx, OperationKind::Insert, tasks, MutationMode::AllOrNone)
            .unwrap();
    }

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(platform.records("Task").len(), 4);
}

/// Touches the records it was handed, which retriggers every update handler.
fn touch(ctx: &ExecutionContext, records: &[Record], field: &str) -> HookResult {
    let touched = records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            record.set(field, true);
            record
        })
        .collect();
    ctx.resolve::<dyn Mutator>()?
        .update_all(touched, MutationMode::AllOrNone)?;
    Ok(())
}

struct Scorer {
    runs: Arc<AtomicUsize>,
}

impl TriggerHandler for Scorer {
    fn after_update(&self, ctx: &ExecutionContext, new: &[Record], _: &RecordMap) -> HookResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        touch(ctx, new, "Scored")
    }
}

struct Router {
    runs: Arc<AtomicUsize>,
}

impl TriggerHandler for Router {
    fn after_update(&self, ctx: &ExecutionContext, new: &[Record], _: &RecordMap) -> HookResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        touch(ctx, new, "Routed")
    }
}

/// The guard is keyed by handler type, not by the records being mutated:
/// two handler types that both retrigger on the same records each get to run
/// again once the other one re-enters after they have finished.
#[test]
fn guard_is_scoped_per_handler_type_not_per_record_set() {
    let platform = Platform::new();
    let scorer = counted(&platform, "Lead", |runs| Scorer { runs });
    let router = counted(&platform, "Lead", |runs| Router { runs });
    platform.seed([Record::new("Lead").with_id("lead-1")]);
    let root = production(&platform);
    let ctx = root.open_context();

    platform
        .execute(
            &ctx,
            OperationKind::Update,
            vec![Record::new("Lead").with_id("lead-1").with_field("Status", "Open")],
            MutationMode::AllOrNone,
        )
        .unwrap();

    assert_eq!(scorer.load(Ordering::SeqCst), 2);
    assert_eq!(router.load(Ordering::SeqCst), 2);
    assert_eq!(ctx.usage().snapshot().dml, 5);

    let lead = platform.get(&"lead-1".into()).unwrap();
    assert_eq!(lead.text("Status"), Some("Open"));
    assert_eq!(lead.get("Scored"), Some(&serde_json::Value::Bool(true)));
    assert_eq!(lead.get("Routed"), Some(&serde_json::Value::Bool(true)));
}
