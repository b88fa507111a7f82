//! Resolution through forwarded capabilities.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wasla_container::prelude::*;

trait Service: Send + Sync {
    fn name(&self) -> &'static str;
}

trait Forwarded: Send + Sync {
    fn name(&self) -> &'static str;
}

type Object = dyn Any + Send + Sync;

struct ServiceImp1;
struct ServiceImp2;

impl Service for ServiceImp1 {
    fn name(&self) -> &'static str {
        "imp1"
    }
}

impl Forwarded for ServiceImp1 {
    fn name(&self) -> &'static str {
        "imp1"
    }
}

impl Service for ServiceImp2 {
    fn name(&self) -> &'static str {
        "imp2"
    }
}

impl Forwarded for ServiceImp2 {
    fn name(&self) -> &'static str {
        "imp2"
    }
}

trait Dependency: Send + Sync {}
struct DependencyImpl;
struct DependencyRefImpl;
impl Dependency for DependencyImpl {}
impl Dependency for DependencyRefImpl {}

struct DependencyClient {
    dep: Arc<dyn Dependency>,
}

struct OptionalDependencyClient {
    dep: Option<Arc<dyn Dependency>>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("wasla_container=trace")
        .try_init();
}

fn same<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn imp1(container: &Container, scope: Scope) -> DefinitionHandle<'_, ServiceImp1> {
    container.register::<ServiceImp1>(scope, |_| Ok(Arc::new(ServiceImp1)))
}

fn imp2(container: &Container, scope: Scope) -> DefinitionHandle<'_, ServiceImp2> {
    container.register::<ServiceImp2>(scope, |_| Ok(Arc::new(ServiceImp2)))
}

#[test]
fn resolves_instance_by_type_forwarding() {
    init_tracing();
    let container = Container::new();
    imp1(&container, Scope::Shared)
        .implements::<dyn Service>(|s| s as Arc<dyn Service>)
        .implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>)
        .implements::<Object>(|s| s as Arc<Object>);

    let forwarded: Arc<dyn Forwarded> = container.resolve().unwrap();
    assert_eq!(forwarded.name(), "imp1");

    let object: Arc<Object> = container.resolve().unwrap();
    assert!(object.downcast::<ServiceImp1>().is_ok());

    let untyped = container.resolve_key(&DefinitionKey::of::<dyn Forwarded>()).unwrap();
    assert_eq!(untyped.downcast::<dyn Forwarded>().unwrap().name(), "imp1");
}

#[test]
fn reuses_instance_resolved_by_type_forwarding() {
    init_tracing();
    let container = Container::new();
    let callbacks = Arc::new(AtomicUsize::new(0));

    imp1(&container, Scope::Shared)
        .on_resolved({
            let callbacks = callbacks.clone();
            move |resolution, resolved| {
                callbacks.fetch_add(1, Ordering::SeqCst);

                let forwarded: Arc<dyn Forwarded> = resolution.resolve()?;
                let object: Arc<Object> = resolution.resolve()?;
                let service: Arc<dyn Service> = resolution.resolve()?;
                let concrete: Arc<ServiceImp1> = resolution.resolve()?;

                assert!(same(&forwarded, resolved));
                assert!(same(&object, resolved));
                assert!(same(&service, resolved));
                assert!(Arc::ptr_eq(&concrete, resolved));
                Ok(())
            }
        })
        .implements::<dyn Service>(|s| s as Arc<dyn Service>)
        .implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>)
        .implements::<Object>(|s| s as Arc<Object>);

    let _: Arc<dyn Service> = container.resolve().unwrap();
    let _: Arc<dyn Forwarded> = container.resolve().unwrap();
    assert_eq!(callbacks.load(Ordering::SeqCst), 2);
}

#[test]
fn does_not_resolve_by_forwarding_registered_for_another_tag() {
    let container = Container::new();
    let definition = container
        .register_tagged::<ServiceImp1>("tag", Scope::Shared, |_| Ok(Arc::new(ServiceImp1)))
        .implements_tagged::<dyn Forwarded>("otherTag", |s| s as Arc<dyn Forwarded>);

    match container.resolve_tagged::<dyn Forwarded>("tag").err() {
        Some(WaslaError::NotRegistered(e)) => {
            assert_eq!(e.requested, DefinitionKey::tagged::<dyn Forwarded>("tag"));
        }
        other => panic!("Expected NotRegistered, got: {other:?}"),
    }

    definition.implements_tagged::<dyn Forwarded>("tag", |s| s as Arc<dyn Forwarded>);
    assert_eq!(container.resolve_tagged::<dyn Forwarded>("tag").unwrap().name(), "imp1");
}

#[test]
fn does_not_reuse_instance_resolved_by_forwarding_registered_for_another_tag() {
    let container = Container::new();
    let already_called = Arc::new(AtomicBool::new(false));
    let checked = Arc::new(AtomicBool::new(false));

    imp1(&container, Scope::Shared)
        .on_resolved({
            let already_called = already_called.clone();
            let checked = checked.clone();
            move |resolution, service| {
                if already_called.swap(true, Ordering::SeqCst) {
                    return Ok(());
                }

                let forwarded: Arc<dyn Forwarded> = resolution.resolve_tagged("tag")?;
                let object: Arc<Object> = resolution.resolve()?;

                assert!(!same(&forwarded, service));
                assert!(same(&object, service));
                checked.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .implements::<dyn Service>(|s| s as Arc<dyn Service>)
        .implements_tagged::<dyn Forwarded>("tag", |s| s as Arc<dyn Forwarded>)
        .implements::<Object>(|s| s as Arc<Object>);

    let _: Arc<dyn Service> = container.resolve().unwrap();
    assert!(checked.load(Ordering::SeqCst));
}

#[test]
fn calls_both_callbacks_when_resolving_by_type_forwarding() {
    let container = Container::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    imp1(&container, Scope::Shared)
        .on_resolved({
            let calls = calls.clone();
            move |_, _| {
                calls.lock().unwrap().push("primary");
                Ok(())
            }
        })
        .implements_with::<dyn Service, _>(None, |s| s as Arc<dyn Service>, {
            let calls = calls.clone();
            move |_, service| {
                assert_eq!(service.name(), "imp1");
                calls.lock().unwrap().push("forwarded");
                Ok(())
            }
        });

    let _: Arc<dyn Service> = container.resolve().unwrap();
    assert_eq!(*calls.lock().unwrap(), vec!["primary", "forwarded"]);

    calls.lock().unwrap().clear();
    let _: Arc<dyn Service> = container.resolve().unwrap();
    assert_eq!(*calls.lock().unwrap(), vec!["primary", "forwarded"]);

    calls.lock().unwrap().clear();
    let _: Arc<ServiceImp1> = container.resolve().unwrap();
    assert_eq!(*calls.lock().unwrap(), vec!["primary"]);
}

#[test]
fn calls_callback_provided_after_registration() {
    let container = Container::new();
    let primary = Arc::new(AtomicUsize::new(0));
    let forwarded = Arc::new(AtomicUsize::new(0));

    let definition = imp1(&container, Scope::Shared).implements_with::<dyn Service, _>(
        None,
        |s| s as Arc<dyn Service>,
        {
            let forwarded = forwarded.clone();
            move |_, _| {
                forwarded.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        },
    );

    definition.on_resolved({
        let primary = primary.clone();
        move |_, _| {
            primary.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let _: Arc<dyn Service> = container.resolve().unwrap();
    let _: Arc<dyn Service> = container.resolve().unwrap();
    assert_eq!(primary.load(Ordering::SeqCst), 2);
    assert_eq!(forwarded.load(Ordering::SeqCst), 2);
}

#[test]
fn callbacks_skipped_on_cache_hit() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));

    imp1(&container, Scope::Singleton)
        .on_resolved({
            let calls = calls.clone();
            move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .implements::<dyn Service>(|s| s as Arc<dyn Service>);

    let a: Arc<dyn Service> = container.resolve().unwrap();
    let b: Arc<ServiceImp1> = container.resolve().unwrap();
    assert!(same(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn falls_back_to_untagged_forwarding() {
    let container = Container::new();
    imp1(&container, Scope::Shared).implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>);

    let forwarded: Arc<dyn Forwarded> = container.resolve_tagged("tag").unwrap();
    assert_eq!(forwarded.name(), "imp1");
}

#[test]
fn resolves_optional() {
    let container = Container::new();
    imp1(&container, Scope::Shared)
        .implements::<dyn Service>(|s| s as Arc<dyn Service>)
        .implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>)
        .implements::<Object>(|s| s as Arc<Object>);

    let service = container.resolve_optional::<dyn Service>().unwrap();
    assert_eq!(service.map(|s| s.name()), Some("imp1"));

    let forwarded = container.resolve_optional::<dyn Forwarded>().unwrap();
    assert_eq!(forwarded.map(|s| s.name()), Some("imp1"));

    let object = container.resolve_optional::<Object>().unwrap().unwrap();
    assert!(object.downcast::<ServiceImp1>().is_ok());

    assert!(container.resolve_optional::<ServiceImp2>().unwrap().is_none());
}

#[test]
fn reuses_instances_resolved_for_optional_type() {
    let container = Container::new();
    let constructed = Arc::new(AtomicUsize::new(0));

    container.register::<dyn Dependency>(Scope::Singleton, {
        let constructed = constructed.clone();
        move |_| {
            constructed.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(DependencyImpl) as Arc<dyn Dependency>)
        }
    });
    container.register::<DependencyClient>(Scope::Shared, |resolution| {
        Ok(Arc::new(DependencyClient {
            dep: resolution.resolve()?,
        }))
    });
    container.register::<OptionalDependencyClient>(Scope::Shared, |resolution| {
        Ok(Arc::new(OptionalDependencyClient {
            dep: resolution.resolve_optional()?,
        }))
    });

    let _: Arc<OptionalDependencyClient> = container.resolve().unwrap();
    let _: Arc<DependencyClient> = container.resolve().unwrap();
    let _: Arc<DependencyClient> = container.resolve().unwrap();
    let _: Arc<OptionalDependencyClient> = container.resolve().unwrap();
    assert_eq!(constructed.load(Ordering::SeqCst), 1);

    container.register::<dyn Dependency>(Scope::Singleton, {
        let constructed = constructed.clone();
        move |_| {
            constructed.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(DependencyRefImpl) as Arc<dyn Dependency>)
        }
    });

    let client1: Arc<DependencyClient> = container.resolve().unwrap();
    let client2: Arc<OptionalDependencyClient> = container.resolve().unwrap();
    let dep2 = client2.dep.as_ref().unwrap();
    assert!(Arc::ptr_eq(&client1.dep, dep2));
    assert_eq!(constructed.load(Ordering::SeqCst), 2);
}

#[test]
fn first_uses_tagged_definition_when_resolving_optional() {
    let container = Container::new();
    container
        .register_tagged::<dyn Service>("tag", Scope::Shared, |_| {
            Ok(Arc::new(ServiceImp1) as Arc<dyn Service>)
        })
        .on_resolved(|resolution, _| {
            assert_eq!(resolution.tag(), Some(&Tag::from("tag")));
            Ok(())
        });
    container.register::<dyn Service>(Scope::Shared, |_| Ok(Arc::new(ServiceImp2) as Arc<dyn Service>));

    let service = container.resolve_optional_tagged::<dyn Service>("tag").unwrap();
    assert_eq!(service.map(|s| s.name()), Some("imp1"));

    let untagged = container.resolve_optional::<dyn Service>().unwrap();
    assert_eq!(untagged.map(|s| s.name()), Some("imp2"));
}

#[test]
fn rejects_forwarding_of_not_implemented_type() {
    let container = Container::new();
    imp1(&container, Scope::Shared).implements_downcast::<ServiceImp2>(None);

    let expected = DefinitionKey::of::<ServiceImp2>();
    match container.resolve::<ServiceImp2>().err() {
        Some(WaslaError::InvalidType(e)) => {
            assert_eq!(e.key, expected);
            assert!(e.produced.contains("ServiceImp1"));
        }
        other => panic!("Expected InvalidType, got: {other:?}"),
    }
    match container.resolve_key(&expected) {
        Err(WaslaError::InvalidType(e)) => assert_eq!(e.key, expected),
        other => panic!("Expected InvalidType, got: {other:?}"),
    }
}

#[test]
fn optional_keeps_invalid_type_and_factory_errors() {
    let container = Container::new();
    imp1(&container, Scope::Shared).implements_downcast::<ServiceImp2>(None);
    container.register::<String>(Scope::Unique, |_| Err(WaslaError::custom("disk full")));

    match container.resolve_optional::<ServiceImp2>().err() {
        Some(WaslaError::InvalidType(e)) => {
            assert_eq!(e.key, DefinitionKey::of::<ServiceImp2>());
            assert!(e.produced.contains("ServiceImp1"));
        }
        other => panic!("Expected InvalidType, got: {other:?}"),
    }

    match container.resolve_optional::<String>().err() {
        Some(WaslaError::FactoryFailed { key, source }) => {
            assert_eq!(key, DefinitionKey::of::<String>());
            assert_eq!(source.to_string(), "disk full");
        }
        other => panic!("Expected FactoryFailed, got: {other:?}"),
    }
}

#[test]
fn downcast_forwarding_of_same_type_succeeds() {
    let container = Container::new();
    container
        .register_tagged::<ServiceImp1>("primary", Scope::Singleton, |_| Ok(Arc::new(ServiceImp1)))
        .implements_downcast::<ServiceImp1>(Some(Tag::from("alias")));

    let primary: Arc<ServiceImp1> = container.resolve_tagged("primary").unwrap();
    let alias: Arc<ServiceImp1> = container.resolve_tagged("alias").unwrap();
    assert!(Arc::ptr_eq(&primary, &alias));
}

#[test]
fn overrides_if_several_definitions_with_same_tag_forward_same_type() {
    let container = Container::new();
    let def1 = imp1(&container, Scope::Shared);
    let def2 = imp2(&container, Scope::Shared);

    def1.clone().implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>);
    assert_eq!(container.resolve::<dyn Forwarded>().unwrap().name(), "imp1");

    def2.clone().implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>);
    assert_eq!(container.resolve::<dyn Forwarded>().unwrap().name(), "imp2");

    def1.clone().implements_tagged::<dyn Forwarded>("tag", |s| s as Arc<dyn Forwarded>);
    assert_eq!(container.resolve_tagged::<dyn Forwarded>("tag").unwrap().name(), "imp1");

    def2.clone().implements_tagged::<dyn Forwarded>("tag", |s| s as Arc<dyn Forwarded>);
    assert_eq!(container.resolve_tagged::<dyn Forwarded>("tag").unwrap().name(), "imp2");

    assert!(def1.forwarded().is_empty());
    assert_eq!(def2.forwarded().len(), 2);
}

#[test]
fn does_not_override_if_definition_forwards_same_type_with_different_tag() {
    let container = Container::new();
    imp1(&container, Scope::Shared).implements_tagged::<dyn Forwarded>("tag", |s| s as Arc<dyn Forwarded>);
    imp2(&container, Scope::Shared)
        .implements_tagged::<dyn Forwarded>("anotherTag", |s| s as Arc<dyn Forwarded>);

    assert_eq!(container.resolve_tagged::<dyn Forwarded>("tag").unwrap().name(), "imp1");
    assert_eq!(container.resolve_tagged::<dyn Forwarded>("anotherTag").unwrap().name(), "imp2");
}

#[test]
fn direct_definition_beats_forwarding() {
    let container = Container::new();
    imp1(&container, Scope::Shared)
        .implements::<dyn Service>(|s| s as Arc<dyn Service>)
        .implements_tagged::<dyn Service>("tag", |s| s as Arc<dyn Service>);
    container.register::<dyn Service>(Scope::Shared, |_| Ok(Arc::new(ServiceImp2) as Arc<dyn Service>));
    container.register_tagged::<dyn Service>("tag", Scope::Shared, |_| {
        Ok(Arc::new(ServiceImp2) as Arc<dyn Service>)
    });

    assert_eq!(container.resolve::<dyn Service>().unwrap().name(), "imp2");
    assert_eq!(container.resolve_tagged::<dyn Service>("tag").unwrap().name(), "imp2");
}

#[test]
fn tagged_forwarding_beats_untagged_definition() {
    let container = Container::new();
    container.register::<dyn Service>(Scope::Shared, |_| Ok(Arc::new(ServiceImp2) as Arc<dyn Service>));
    imp1(&container, Scope::Shared).implements_tagged::<dyn Service>("tag", |s| s as Arc<dyn Service>);

    assert_eq!(container.resolve_tagged::<dyn Service>("tag").unwrap().name(), "imp1");
    assert_eq!(container.resolve_tagged::<dyn Service>("other").unwrap().name(), "imp2");
}

#[test]
fn forwarding_carries_runtime_arguments() {
    let container = Container::new();
    container
        .register_with::<ServiceImp1, u8, _>(None, Scope::Unique, |_, n| {
            assert_eq!(n, 3);
            Ok(Arc::new(ServiceImp1))
        })
        .implements::<dyn Service>(|s| s as Arc<dyn Service>);

    let service = container.resolve_with::<dyn Service, u8>(None, 3).unwrap();
    assert_eq!(service.name(), "imp1");
    assert!(container.resolve::<dyn Service>().is_err());
}

#[test]
fn replacing_definition_drops_its_forwarding() {
    let container = Container::new();
    let stale = imp1(&container, Scope::Shared).implements::<dyn Service>(|s| s as Arc<dyn Service>);
    assert!(container.resolve::<dyn Service>().is_ok());

    imp1(&container, Scope::Shared);
    assert!(container.resolve::<dyn Service>().is_err());

    stale.implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>);
    assert!(container.resolve::<dyn Forwarded>().is_err());
}

#[test]
fn reset_clears_forwarding() {
    let container = Container::new();
    imp1(&container, Scope::Singleton).implements::<dyn Service>(|s| s as Arc<dyn Service>);
    assert!(container.resolve::<dyn Service>().is_ok());

    container.reset();
    assert!(container.resolve_optional::<dyn Service>().unwrap().is_none());
}
