#![cfg(test)]
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use dispatchr_common::config::Limits;
use dispatchr_common::event::{LifecycleEvent, OperationKind, Phase};
use dispatchr_common::mutation::MutationMode;
use dispatchr_common::record::{Record, RecordId, RecordMap};
use dispatchr_core::handler::HookResult;
use dispatchr_core::platform::Platform;
use dispatchr_core::ports::selector::Selector;
use dispatchr_core::{DispatchOutcome, ExecutionContext, LifecycleEventRouter, TriggerHandler};
use dispatchr_testkit::TestOverrideRegistry;
use dispatchr_testkit::doubles::StaticSelector;

/// Looks up every inserted record again through the Selector port.
#[derive(Default)]
struct EchoLookup {
    seen: RefCell<Vec<RecordMap>>,
}

impl TriggerHandler for EchoLookup {
    fn after_insert(&self, ctx: &ExecutionContext, new: &[Record], _: &RecordMap) -> HookResult {
        let ids: BTreeSet<RecordId> = new.iter().filter_map(|r| r.id.clone()).collect();
        let found = ctx.resolve::<dyn Selector>()?.fetch_by_ids(&ids)?;
        self.seen.borrow_mut().push(found);
        Ok(())
    }
}

#[test]
fn mocked_selector_serves_handler_without_real_queries() {
    let record_a = Record::new("Account").with_id("id1").with_field("Name", "Acme");
    let overrides = TestOverrideRegistry::isolated()
        .with_budget(Limits::default().with_queries(0).with_dml(0));
    let selector = Rc::new(StaticSelector::from_records([&record_a]));
    overrides.register_mock::<dyn Selector>(selector.clone());

    let handler = EchoLookup::default();
    let mut event = LifecycleEvent::new(
        OperationKind::Insert,
        Phase::After,
        vec![record_a.clone()],
        RecordMap::new(),
    );
    let outcome = LifecycleEventRouter::new()
        .dispatch(overrides.context(), &mut event, &handler)
        .unwrap();

    assert!(matches!(outcome, DispatchOutcome::Handled(_)));
    let seen = handler.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], RecordMap::from([(RecordId::from("id1"), record_a)]));
    assert_eq!(selector.calls(), 1);
    assert_eq!(overrides.usage().queries, 0);
    overrides.assert_within_budget();
}

#[derive(Default)]
struct BatchCounter {
    batches: Arc<Mutex<Vec<usize>>>,
}

impl BatchCounter {
    fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

impl TriggerHandler for BatchCounter {
    fn before_insert(
        &self,
        _: &ExecutionContext,
        new: &mut [Record],
        _: &RecordMap,
    ) -> HookResult {
        for record in new.iter_mut() {
            record.set("Source", "trigger");
        }
        Ok(())
    }

    fn after_insert(&self, _: &ExecutionContext, new: &[Record], _: &RecordMap) -> HookResult {
        self.batches.lock().unwrap().push(new.len());
        Ok(())
    }
}

#[test]
fn platform_delivers_bulk_insert_as_one_batch() {
    let platform = Platform::new();
    let counter = BatchCounter::default();
    let batches = Arc::clone(&counter.batches);
    platform.register_trigger("Lead", move || BatchCounter {
        batches: Arc::clone(&batches),
    });
    let ctx = dispatchr_testkit::test_context();

    let outcome = platform
        .execute(
            &ctx,
            OperationKind::Insert,
            (0..200).map(|_| Record::new("Lead")).collect(),
            MutationMode::AllOrNone,
        )
        .unwrap();

    assert_eq!(counter.batches(), vec![200]);
    assert_eq!(outcome.len(), 200);
    assert_eq!(platform.len(), 200);
    assert_eq!(ctx.usage().snapshot().dml, 1);
}

#[test]
fn before_hook_edits_are_persisted() {
    let platform = Platform::new();
    platform.register_trigger("Lead", BatchCounter::default);
    let ctx = dispatchr_testkit::test_context();

    let outcome = platform
        .execute(
            &ctx,
            OperationKind::Insert,
            vec![Record::new("Lead"), Record::new("Lead")],
            MutationMode::AllOrNone,
        )
        .unwrap();

    for id in outcome.ids() {
        let stored = platform.get(&id).unwrap();
        assert_eq!(stored.text("Source"), Some("trigger"));
    }
}

#[test]
fn empty_batch_dispatches_once() {
    let ctx = dispatchr_testkit::test_context();
    let handler = BatchCounter::default();
    let mut event =
        LifecycleEvent::new(OperationKind::Insert, Phase::After, Vec::new(), RecordMap::new());

    LifecycleEventRouter::new().dispatch(&ctx, &mut event, &handler).unwrap();

    assert_eq!(handler.batches(), vec![0]);
}

#[test]
fn empty_id_set_never_reaches_the_store() {
    let overrides = TestOverrideRegistry::isolated();
    let selector = Rc::new(StaticSelector::default());
    overrides.register_mock::<dyn Selector>(selector.clone());

    let found = overrides
        .context()
        .resolve::<dyn Selector>()
        .unwrap()
        .fetch_by_ids(&BTreeSet::new())
        .unwrap();

    assert!(found.is_empty());
    assert_eq!(selector.calls(), 0);
}
