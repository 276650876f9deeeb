#![cfg(test)]
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dispatchr_common::config::Config;
use dispatchr_common::error::RegistryError;
use dispatchr_core::platform::Platform;
use dispatchr_core::ports::clock::Clock;
use dispatchr_core::ports::http::{HttpClient, HttpRequest, HttpResponse};
use dispatchr_core::ports::mutator::Mutator;
use dispatchr_core::{CompositionRoot, ExecutionContext, ProductionRoot, ServiceRegistry};
use dispatchr_testkit::TestOverrideRegistry;
use dispatchr_testkit::doubles::{FixedClock, StubHttpClient};

fn production() -> Arc<dyn CompositionRoot> {
    Arc::new(ProductionRoot::new(Platform::new(), &Config::default()))
}

fn y2k() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(946_684_800, 0).unwrap()
}

#[test]
fn registered_mock_is_resolved_by_identity() {
    let overrides = TestOverrideRegistry::new(production());
    let http = Rc::new(StubHttpClient::new(HttpResponse::new(202, "queued")));

    overrides.register_mock::<dyn HttpClient>(http.clone());
    let resolved = overrides.context().resolve::<dyn HttpClient>().unwrap();

    let response = resolved.send(HttpRequest::post("https://erp.example/orders", "{}")).unwrap();
    assert_eq!(response.status, 202);
    assert_eq!(http.requests().len(), 1);
}

#[test]
fn mock_registered_before_bootstrap_is_not_clobbered() {
    let overrides = TestOverrideRegistry::new(production());

    overrides.register_mock::<dyn Clock>(Rc::new(FixedClock::at(y2k())));

    let ctx = overrides.context();
    assert!(ctx.resolve::<dyn Mutator>().is_ok());
    assert_eq!(ctx.resolve::<dyn Clock>().unwrap().now(), y2k());
}

#[test]
fn reset_brings_back_production_bindings() {
    let overrides = TestOverrideRegistry::new(production());
    overrides.register_mock::<dyn Clock>(Rc::new(FixedClock::at(y2k())));

    overrides.reset();

    let now = overrides.context().resolve::<dyn Clock>().unwrap().now();
    assert!(now > y2k());
    assert_eq!(overrides.context().registry().contracts().len(), 6);
}

#[test]
fn reset_rebootstraps_once_even_for_unbound_contracts() {
    trait Ledger {}

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let root: Arc<dyn CompositionRoot> = Arc::new(move |_: &ServiceRegistry| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let ctx = ExecutionContext::open(root);
    ctx.registry().bootstrap();

    ctx.registry().reset();
    let first = ctx.resolve::<dyn Ledger>();
    let second = ctx.resolve::<dyn Ledger>();

    assert!(matches!(first, Err(RegistryError::UnresolvedDependency(_))));
    assert!(second.is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn contexts_from_one_root_share_nothing() {
    let root = production();
    let a = ExecutionContext::open(Arc::clone(&root));
    let b = ExecutionContext::open(root);

    a.registry().register::<dyn Clock>(Rc::new(FixedClock::at(y2k())));

    let mutator_a = a.resolve::<dyn Mutator>().unwrap();
    let mutator_b = b.resolve::<dyn Mutator>().unwrap();
    assert!(!Rc::ptr_eq(&mutator_a, &mutator_b));
    assert_ne!(b.resolve::<dyn Clock>().unwrap().now(), y2k());
}
