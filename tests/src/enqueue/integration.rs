#![cfg(test)]
use std::rc::Rc;
use std::sync::Arc;

use dispatchr_common::config::Config;
use dispatchr_common::event::OperationKind;
use dispatchr_common::mutation::MutationMode;
use dispatchr_common::record::{Record, RecordMap};
use dispatchr_core::handler::HookResult;
use dispatchr_core::platform::Platform;
use dispatchr_core::ports::enqueuer::{AsyncEnqueuer, job};
use dispatchr_core::ports::mutator::Mutator;
use dispatchr_core::{CompositionRoot, ExecutionContext, ProductionRoot, TriggerHandler};
use dispatchr_testkit::TestOverrideRegistry;
use dispatchr_testkit::doubles::QueuedEnqueuer;

/// Defers creating a welcome task for every new customer.
struct Welcome;

impl TriggerHandler for Welcome {
    fn after_insert(&self, ctx: &ExecutionContext, new: &[Record], _: &RecordMap) -> HookResult {
        let count = new.len();
        ctx.resolve::<dyn AsyncEnqueuer>()?.enqueue(job("welcome", move |ctx| {
            let tasks = (0..count).map(|_| Record::new("Task")).collect();
            ctx.resolve::<dyn Mutator>()?
                .insert_all(tasks, MutationMode::AllOrNone)?;
            Ok(())
        }))?;
        Ok(())
    }
}

fn customers(n: usize) -> Vec<Record> {
    (0..n).map(|_| Record::new("Customer")).collect()
}

#[test]
fn queued_jobs_run_only_when_drained() {
    let platform = Platform::new();
    platform.register_trigger("Customer", || Welcome);
    let root: Arc<dyn CompositionRoot> =
        Arc::new(ProductionRoot::new(platform.clone(), &Config::default()));
    let overrides = TestOverrideRegistry::new(Arc::clone(&root));
    let queue = Rc::new(QueuedEnqueuer::new());
    overrides.register_mock::<dyn AsyncEnqueuer>(queue.clone());

    platform
        .execute(
            overrides.context(),
            OperationKind::Insert,
            customers(3),
            MutationMode::AllOrNone,
        )
        .unwrap();

    assert_eq!(queue.names(), vec!["welcome".to_string()]);
    assert!(platform.records("Task").is_empty());

    assert_eq!(queue.drain(root, overrides.budget()).unwrap(), 1);
    assert_eq!(platform.records("Task").len(), 3);
    assert_eq!(overrides.usage().dml, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runtime_enqueuer_runs_job_in_its_own_context() {
    let platform = Platform::new();
    let root = Arc::new(ProductionRoot::new(platform.clone(), &Config::default()));
    let (done, finished) = tokio::sync::oneshot::channel();

    {
        let ctx = root.open_context();
        ctx.resolve::<dyn AsyncEnqueuer>()
            .unwrap()
            .enqueue(job("seed-notes", move |ctx| {
                let outcome = ctx
                    .resolve::<dyn Mutator>()?
                    .insert_all(vec![Record::new("Note")], MutationMode::AllOrNone);
                let _ = done.send(ctx.usage().snapshot().dml);
                outcome.map(|_| ()).map_err(Into::into)
            }))
            .unwrap();
        assert_eq!(ctx.usage().snapshot().dml, 0);
    }

    let job_dml = finished.await.unwrap();
    assert_eq!(job_dml, 1);
    assert_eq!(platform.records("Note").len(), 1);
}
