#![cfg(test)]
use std::sync::{Arc, Barrier};
use std::thread;

use dispatchr_common::config::{Config, Limits};
use dispatchr_common::error::{HandlerError, MutationError, PortError, RegistryError, Resource};
use dispatchr_common::event::OperationKind;
use dispatchr_common::mutation::{MutationMode, OutcomeStatus};
use dispatchr_common::record::{Record, RecordMap};
use dispatchr_core::handler::HookResult;
use dispatchr_core::platform::Platform;
use dispatchr_core::ports::mutator::Mutator;
use dispatchr_core::{ExecutionContext, ProductionRoot, TriggerHandler};

fn seeded() -> Platform {
    let platform = Platform::new();
    platform.seed([
        Record::new("Contact").with_id("c1").with_field("Email", "a@example.com"),
        Record::new("Contact").with_id("c2").with_field("Email", "b@example.com"),
    ]);
    platform
}

fn production(platform: &Platform) -> Arc<ProductionRoot> {
    Arc::new(ProductionRoot::new(platform.clone(), &Config::default()))
}

fn batch() -> Vec<Record> {
    vec![
        Record::new("Contact").with_id("c1").with_field("Email", "new-a@example.com"),
        Record::new("Contact").with_id("missing"),
        Record::new("Contact").with_id("c2").with_field("Email", "new-b@example.com"),
    ]
}

#[test]
fn partial_mode_reports_every_record_in_input_order() {
    let platform = seeded();
    let root = production(&platform);
    let ctx = root.open_context();
    let mutator = ctx.resolve::<dyn Mutator>().unwrap();

    let outcome = mutator.update_all(batch(), MutationMode::Partial).unwrap();

    assert_eq!(outcome.len(), 3);
    let indices: Vec<usize> = outcome.outcomes.iter().map(|o| o.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(outcome.outcomes[0].is_success());
    assert!(matches!(
        outcome.outcomes[1].status,
        OutcomeStatus::Failed(ref reason) if reason.contains("not found")
    ));
    assert!(outcome.outcomes[2].is_success());

    let contact = platform.get(&"c2".into()).unwrap();
    assert_eq!(contact.text("Email"), Some("new-b@example.com"));

    let err = outcome.into_result().unwrap_err();
    assert_eq!(err.outcomes.len(), 3);
    assert_eq!(err.failed_count(), 1);
}

#[test]
fn all_or_none_rejects_the_whole_batch() {
    let platform = seeded();
    let root = production(&platform);
    let ctx = root.open_context();
    let mutator = ctx.resolve::<dyn Mutator>().unwrap();

    let err = mutator.update_all(batch(), MutationMode::AllOrNone).unwrap_err();

    let MutationError::Bulk(bulk) = err else {
        panic!("expected a bulk error, got {err:?}");
    };
    assert_eq!(bulk.outcomes.len(), 3);
    assert_eq!(bulk.failures().count(), 1);
    assert_eq!(bulk.outcomes[0].status, OutcomeStatus::RolledBack);
    assert_eq!(bulk.outcomes[2].status, OutcomeStatus::RolledBack);

    let contact = platform.get(&"c1".into()).unwrap();
    assert_eq!(contact.text("Email"), Some("a@example.com"));
}

/// Logs every new order, then refuses orders without an amount.
struct OrderCheck;

impl TriggerHandler for OrderCheck {
    fn after_insert(&self, ctx: &ExecutionContext, new: &[Record], _: &RecordMap) -> HookResult {
        let log = Record::new("AuditLog").with_field("Count", new.len());
        ctx.resolve::<dyn Mutator>()?
            .insert_all(vec![log], MutationMode::AllOrNone)?;

        if new.iter().any(|order| order.get("Amount").is_none()) {
            return Err(HandlerError::domain("amount is required"));
        }
        Ok(())
    }
}

#[test]
fn trigger_error_rolls_back_nested_writes() {
    let platform = Platform::new();
    platform.register_trigger("Order", || OrderCheck);
    let root = production(&platform);
    let ctx = root.open_context();

    let err = platform
        .execute(
            &ctx,
            OperationKind::Insert,
            vec![Record::new("Order").with_field("Amount", 10), Record::new("Order")],
            MutationMode::Partial,
        )
        .unwrap_err();

    let MutationError::Trigger { operation, source } = err else {
        panic!("expected a trigger error, got {err:?}");
    };
    assert_eq!(operation, OperationKind::Insert);
    assert!(matches!(*source, HandlerError::Domain(ref m) if m == "amount is required"));
    assert!(platform.is_empty());
}

#[test]
fn valid_orders_commit_with_their_audit_log() -> anyhow::Result<()> {
    let platform = Platform::new();
    platform.register_trigger("Order", || OrderCheck);
    let root = production(&platform);
    let ctx = root.open_context();

    platform.execute(
        &ctx,
        OperationKind::Insert,
        vec![Record::new("Order").with_field("Amount", 10)],
        MutationMode::AllOrNone,
    )?;

    assert_eq!(platform.records("Order").len(), 1);
    assert_eq!(platform.records("AuditLog").len(), 1);
    Ok(())
}

#[test]
fn unbound_port_fails_the_dispatch() {
    let platform = Platform::new();
    platform.register_trigger("Order", || OrderCheck);
    let ctx = dispatchr_testkit::test_context();

    let err = platform
        .execute(
            &ctx,
            OperationKind::Insert,
            vec![Record::new("Order").with_field("Amount", 1)],
            MutationMode::AllOrNone,
        )
        .unwrap_err();

    let MutationError::Trigger { source, .. } = err else {
        panic!("expected a trigger error, got {err:?}");
    };
    let HandlerError::Unresolved(RegistryError::UnresolvedDependency(contract)) = *source else {
        panic!("expected an unresolved dependency, got {source:?}");
    };
    assert!(contract.contains("Mutator"));
    assert!(platform.is_empty());
}

#[test]
fn dml_limit_is_enforced_per_context() {
    let platform = Platform::new();
    let ctx = ExecutionContext::open_with_limits(
        Arc::new(dispatchr_testkit::NoopRoot),
        Limits::default().with_dml(1),
    );
    let insert = || vec![Record::new("Note")];

    platform
        .execute(&ctx, OperationKind::Insert, insert(), MutationMode::AllOrNone)
        .unwrap();
    let err = platform
        .execute(&ctx, OperationKind::Insert, insert(), MutationMode::AllOrNone)
        .unwrap_err();

    assert!(matches!(
        err,
        MutationError::Port(PortError::LimitExceeded {
            resource: Resource::Dml,
            limit: 1,
        })
    ));
    assert_eq!(platform.len(), 1);
}

#[test]
fn deleted_records_can_only_be_undeleted() {
    let platform = seeded();
    let ctx = dispatchr_testkit::test_context();
    let c1 = || vec![Record::new("Contact").with_id("c1")];

    platform
        .execute(&ctx, OperationKind::Delete, c1(), MutationMode::AllOrNone)
        .unwrap();
    assert!(platform.is_deleted(&"c1".into()));

    let outcome = platform
        .execute(&ctx, OperationKind::Update, c1(), MutationMode::Partial)
        .unwrap();
    assert!(matches!(
        outcome.outcomes[0].status,
        OutcomeStatus::Failed(ref reason) if reason == "entity is deleted"
    ));

    platform
        .execute(&ctx, OperationKind::Undelete, c1(), MutationMode::AllOrNone)
        .unwrap();
    let restored = platform.get(&"c1".into()).unwrap();
    assert_eq!(restored.text("Email"), Some("a@example.com"));
    assert!(!platform.is_deleted(&"c1".into()));
}

/// Deletes the other contact, then rejects the update.
struct RejectAfterDelete;

impl TriggerHandler for RejectAfterDelete {
    fn after_update(&self, ctx: &ExecutionContext, _: &[Record], _: &RecordMap) -> HookResult {
        ctx.resolve::<dyn Mutator>()?
            .delete_all(vec![Record::new("Contact").with_id("c2")], MutationMode::AllOrNone)?;
        Err(HandlerError::domain("contacts are frozen"))
    }
}

#[test]
fn rollback_restores_updated_and_deleted_records() {
    let platform = seeded();
    platform.register_trigger("Contact", || RejectAfterDelete);
    let root = production(&platform);
    let ctx = root.open_context();

    let err = platform
        .execute(
            &ctx,
            OperationKind::Update,
            vec![Record::new("Contact").with_id("c1").with_field("Email", "x@example.com")],
            MutationMode::AllOrNone,
        )
        .unwrap_err();

    assert!(matches!(err, MutationError::Trigger { .. }));
    let c1 = platform.get(&"c1".into()).unwrap();
    assert_eq!(c1.text("Email"), Some("a@example.com"));
    assert!(platform.get(&"c2".into()).is_some());
    assert!(!platform.is_deleted(&"c2".into()));
}

/// Holds the order call open until the test lets it fail.
struct HoldThenReject(Arc<Barrier>);

impl TriggerHandler for HoldThenReject {
    fn after_insert(&self, _: &ExecutionContext, _: &[Record], _: &RecordMap) -> HookResult {
        self.0.wait();
        self.0.wait();
        Err(HandlerError::domain("order rejected"))
    }
}

#[test]
fn rollback_keeps_writes_committed_by_another_context() {
    let platform = Platform::new();
    let gate = Arc::new(Barrier::new(2));
    let trigger_gate = Arc::clone(&gate);
    platform.register_trigger("Order", move || HoldThenReject(Arc::clone(&trigger_gate)));
    let root = production(&platform);

    let order_root = Arc::clone(&root);
    let orders = thread::spawn(move || {
        let ctx = order_root.open_context();
        ctx.resolve::<dyn Mutator>()
            .unwrap()
            .insert_all(vec![Record::new("Order")], MutationMode::AllOrNone)
            .is_err()
    });

    gate.wait();
    assert_eq!(platform.records("Order").len(), 1);

    let ctx = root.open_context();
    let note = ctx
        .resolve::<dyn Mutator>()
        .unwrap()
        .insert_all(vec![Record::new("Note")], MutationMode::AllOrNone)
        .unwrap();
    gate.wait();

    assert!(orders.join().unwrap());
    assert!(platform.records("Order").is_empty());
    let notes = platform.records("Note");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, note.outcomes[0].id);
}
