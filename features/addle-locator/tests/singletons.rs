use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::{Duration, Instant},
};

use addle_locator::{implements, service, Locator, LocatorError, TypeKey};

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

trait Shape: Send + Sync {
    fn id(&self) -> usize;
}
service!(dyn Shape);

struct Circle {
    id: usize,
}
impl Shape for Circle {
    fn id(&self) -> usize {
        self.id
    }
}

#[derive(Default)]
struct Square;
impl Shape for Square {
    fn id(&self) -> usize {
        0
    }
}
implements!(Square => dyn Shape);

/// Registers a circle factory numbering the circles it makes
fn numbered_circles(locator: &Locator) -> Arc<AtomicUsize> {
    let made = Arc::new(AtomicUsize::new(0));
    let counter = made.clone();
    locator
        .register_fn::<dyn Shape, _>(move |_: &Locator| -> Result<Box<dyn Shape>, LocatorError> {
            let id = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Box::new(Circle { id }))
        })
        .unwrap();
    made
}

#[test]
fn get_returns_the_same_instance() {
    init_logging();
    let locator = Locator::default();
    let made = numbered_circles(&locator);

    let a = locator.get::<dyn Shape>().unwrap();
    let b = locator.get::<dyn Shape>().unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(made.load(Ordering::SeqCst), 1);
    assert_eq!(locator.service_count(), 1);
}

#[test]
fn make_returns_new_instances() {
    init_logging();
    let locator = Locator::default();
    let made = numbered_circles(&locator);

    let singleton = locator.get::<dyn Shape>().unwrap();
    let a = locator.make::<dyn Shape>().unwrap();
    let b = locator.make::<dyn Shape>().unwrap();

    assert_ne!(a.id(), b.id());
    assert_ne!(a.id(), singleton.id());
    assert_ne!(b.id(), singleton.id());
    assert_eq!(made.load(Ordering::SeqCst), 3);
    assert_eq!(locator.service_count(), 1);
}

trait Logger: Send + Sync {}
service!(dyn Logger);

struct SlowLogger;
impl Logger for SlowLogger {}

#[test]
fn concurrent_get_constructs_once() {
    init_logging();
    let locator = Locator::default();
    let made = Arc::new(AtomicUsize::new(0));
    let counter = made.clone();
    locator
        .register_fn::<dyn Logger, _>(move |_: &Locator| -> Result<Box<dyn Logger>, LocatorError> {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Ok(Box::new(SlowLogger))
        })
        .unwrap();

    let barrier = Barrier::new(2);
    let timed_get = || {
        barrier.wait();
        let start = Instant::now();
        let logger = locator.get::<dyn Logger>();
        (logger, start.elapsed())
    };
    let ((a, a_took), (b, b_took)) = thread::scope(|s| {
        let a = s.spawn(timed_get);
        let b = s.spawn(timed_get);
        (a.join().unwrap(), b.join().unwrap())
    });

    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(made.load(Ordering::SeqCst), 1);
    // One 50ms construction, the waiter is woken on publication
    assert!(a_took < Duration::from_millis(150), "first get took {a_took:?}");
    assert!(b_took < Duration::from_millis(150), "second get took {b_took:?}");
}

#[test]
fn many_threads_share_one_instance() {
    init_logging();
    let locator = Locator::default();
    let made = numbered_circles(&locator);

    let shapes: Vec<_> = thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| s.spawn(|| locator.get::<dyn Shape>().unwrap()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert!(shapes.iter().all(|shape| Arc::ptr_eq(shape, &shapes[0])));
    assert_eq!(made.load(Ordering::SeqCst), 1);
}

trait Recursive: Send + Sync {}
service!(dyn Recursive);

struct Ouroboros;
impl Recursive for Ouroboros {}

#[test]
fn self_dependency_fails_fast() {
    init_logging();
    let locator = Locator::default();
    locator
        .register_fn::<dyn Recursive, _>(|locator: &Locator| -> Result<Box<dyn Recursive>, LocatorError> {
            locator.get::<dyn Recursive>()?;
            Ok(Box::new(Ouroboros))
        })
        .unwrap();

    let err = locator.get::<dyn Recursive>().err().unwrap();
    match err {
        LocatorError::CyclicDependency { capability, chain } => {
            assert_eq!(capability, TypeKey::of::<dyn Recursive>());
            assert_eq!(chain.first(), Some(&TypeKey::of::<dyn Recursive>()));
        }
        other => panic!("expected a cyclic dependency, got {other:?}"),
    }

    // The failed construction left nothing behind
    assert_eq!(locator.service_count(), 0);
    assert!(matches!(
        locator.get::<dyn Recursive>(),
        Err(LocatorError::CyclicDependency { .. })
    ));
}

trait Alpha: Send + Sync {}
service!(dyn Alpha);
trait Beta: Send + Sync {}
service!(dyn Beta);

struct First;
impl Alpha for First {}
struct Second;
impl Beta for Second {}

#[test]
fn cross_thread_cycle_fails_on_both_threads() {
    init_logging();
    let locator = Locator::default();
    let barrier = Arc::new(Barrier::new(2));

    // Each factory waits for the other construction to be under way, once
    let alpha_first = Arc::new(AtomicBool::new(true));
    let rendezvous = barrier.clone();
    locator
        .register_fn::<dyn Alpha, _>(move |locator: &Locator| -> Result<Box<dyn Alpha>, LocatorError> {
            if alpha_first.swap(false, Ordering::SeqCst) {
                rendezvous.wait();
            }
            locator.get::<dyn Beta>()?;
            Ok(Box::new(First))
        })
        .unwrap();
    let beta_first = Arc::new(AtomicBool::new(true));
    let rendezvous = barrier.clone();
    locator
        .register_fn::<dyn Beta, _>(move |locator: &Locator| -> Result<Box<dyn Beta>, LocatorError> {
            if beta_first.swap(false, Ordering::SeqCst) {
                rendezvous.wait();
            }
            locator.get::<dyn Alpha>()?;
            Ok(Box::new(Second))
        })
        .unwrap();

    let (alpha, beta) = thread::scope(|s| {
        let alpha = s.spawn(|| locator.get::<dyn Alpha>());
        let beta = s.spawn(|| locator.get::<dyn Beta>());
        (alpha.join().unwrap(), beta.join().unwrap())
    });

    assert!(matches!(alpha, Err(LocatorError::CyclicDependency { .. })));
    assert!(matches!(beta, Err(LocatorError::CyclicDependency { .. })));
    assert_eq!(locator.service_count(), 0);
}

trait Missing: Send + Sync {}
service!(dyn Missing);

#[derive(Default)]
struct Found;
impl Missing for Found {}
implements!(Found => dyn Missing);

#[test]
fn failed_lookup_does_not_poison() {
    init_logging();
    let locator = Locator::default();

    let err = locator.get::<dyn Missing>().err().unwrap();
    assert!(matches!(
        err,
        LocatorError::ServiceNotFound { capability, services: 0, factories: 0 } if capability == TypeKey::of::<dyn Missing>()
    ));
    assert!(matches!(
        locator.make::<dyn Missing>(),
        Err(LocatorError::FactoryNotFound { .. })
    ));
    assert_eq!(locator.service_count(), 0);

    locator.register_type::<dyn Missing, Found>().unwrap();
    locator.get::<dyn Missing>().unwrap();
    assert_eq!(locator.service_count(), 1);
}

trait Flaky: Send + Sync {}
service!(dyn Flaky);

struct Recovered;
impl Flaky for Recovered {}

#[test]
fn waiters_retry_after_failed_construction() {
    init_logging();
    let locator = Locator::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    locator
        .register_fn::<dyn Flaky, _>(move |_: &Locator| -> Result<Box<dyn Flaky>, LocatorError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                thread::sleep(Duration::from_millis(50));
                return Err(LocatorError::factory_failed::<dyn Flaky>("first attempt"));
            }
            Ok(Box::new(Recovered))
        })
        .unwrap();

    let barrier = Barrier::new(2);
    let results = thread::scope(|s| {
        let workers: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    locator.get::<dyn Flaky>()
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .collect::<Vec<_>>()
    });

    let failures = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(failures, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(LocatorError::FactoryFailed { .. }))));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(locator.is_published::<dyn Flaky>());
}

#[test]
fn panicking_factory_releases_the_service() {
    init_logging();
    let locator = Locator::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    locator
        .register_fn::<dyn Flaky, _>(move |_: &Locator| -> Result<Box<dyn Flaky>, LocatorError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("factory exploded");
            }
            Ok(Box::new(Recovered))
        })
        .unwrap();

    let panicked = thread::scope(|s| s.spawn(|| locator.get::<dyn Flaky>()).join().is_err());
    assert!(panicked);

    locator.get::<dyn Flaky>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn published_service_survives_overwrite() {
    init_logging();
    let locator = Locator::default();
    numbered_circles(&locator);
    let before = locator.get::<dyn Shape>().unwrap();

    locator.register_type::<dyn Shape, Square>().unwrap();

    assert!(Arc::ptr_eq(&before, &locator.get::<dyn Shape>().unwrap()));
    assert_eq!(locator.make::<dyn Shape>().unwrap().id(), 0);
}
