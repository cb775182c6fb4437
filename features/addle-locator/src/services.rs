use std::{
    cell::RefCell,
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
    thread::{self, ThreadId},
};

use futures_channel::oneshot;

use crate::{
    errors::LocatorError,
    initialize::{sealed::RunOnMake, InitOnMake},
    locator::Locator,
    locks::{lock, read, write},
    registry::FactoryRegistry,
    types::{Instance, Service, TypeKey},
};

thread_local! {
    /// Services this thread is constructing right now, outermost first
    static CONSTRUCTION_STACK: RefCell<Vec<TypeKey>> = const { RefCell::new(Vec::new()) };
}

/// Singleton memoization on top of the [`FactoryRegistry`]
///
/// Every service is constructed at most once. While a service is being constructed a
/// [`ConstructionLock`] for it exists; other threads asking for it park on the lock
/// until the instance is published or the construction failed.
pub(crate) struct ServiceRegistry {
    services: RwLock<HashMap<TypeKey, Instance>>,
    /// Lock order: `in_flight` before `services`
    in_flight: Mutex<InFlight>,
}

#[derive(Default)]
struct InFlight {
    locks: HashMap<TypeKey, ConstructionLock>,
    /// Which service each parked thread is waiting for
    waiting: HashMap<ThreadId, TypeKey>,
}

/// Exists only while a service is under first-time construction
struct ConstructionLock {
    owner: ThreadId,
    waiters: Vec<Waiter>,
}

struct Waiter {
    thread: ThreadId,
    released: oneshot::Sender<()>,
}

/// Outcome of trying to claim a service
enum Claim<'a> {
    /// Already published
    Ready(Instance),
    /// Another thread is constructing it, released once it is done
    Wait(oneshot::Receiver<()>),
    /// This thread has to construct it
    Construct(ConstructionGuard<'a>),
}

impl ServiceRegistry {
    pub(crate) fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        read(&self.services).len()
    }

    pub(crate) fn contains(&self, key: &TypeKey) -> bool {
        read(&self.services).contains_key(key)
    }

    /// Publishes a prebuilt instance, returns false if one was already published
    pub(crate) fn insert(&self, instance: Instance) -> bool {
        let _in_flight = lock(&self.in_flight);
        let mut services = write(&self.services);
        if services.contains_key(&instance.info) {
            return false;
        }
        tracing::debug!("Published prebuilt service {}", instance.info);
        services.insert(instance.info, instance);
        true
    }

    /// Returns the singleton of `C`, constructing it on first use
    pub(crate) fn get<C>(&self, locator: &Locator) -> Result<Arc<C>, LocatorError>
    where
        C: Service + ?Sized,
        C::Init: InitOnMake<C>,
    {
        let key = TypeKey::of::<C>();
        loop {
            match self.claim(key, locator.factories())? {
                Claim::Ready(instance) => {
                    return instance.downcast::<C>().map_err(|produced| {
                        LocatorError::InvalidFactoryProduct {
                            requested: key,
                            produced,
                        }
                    });
                }
                Claim::Wait(released) => {
                    tracing::debug!("Waiting for {key} to be constructed by another thread");
                    // Cancelled means the constructor gave up, the next claim decides what's next
                    let _ = futures::executor::block_on(released);
                }
                Claim::Construct(guard) => return self.construct::<C>(locator, guard),
            }
        }
    }

    /// Checks for a published instance or a running construction, installing a
    /// construction lock if neither exists
    ///
    /// Runs under the `in_flight` mutex, so two threads can never both become constructor.
    fn claim(&self, key: TypeKey, factories: &FactoryRegistry) -> Result<Claim<'_>, LocatorError> {
        // Fast path
        if let Some(instance) = read(&self.services).get(&key) {
            return Ok(Claim::Ready(instance.clone()));
        }

        let mut in_flight = lock(&self.in_flight);

        // Double check - it might have been published while we waited for the lock
        if let Some(instance) = read(&self.services).get(&key) {
            return Ok(Claim::Ready(instance.clone()));
        }

        let current = thread::current().id();
        if in_flight.locks.contains_key(&key) {
            if let Some(chain) = in_flight.wait_chain(current, key) {
                let chain = with_construction_stack(chain);
                tracing::error!("Cyclic dependency on {key} through {chain:?}");
                return Err(LocatorError::CyclicDependency {
                    capability: key,
                    chain,
                });
            }

            let (tx, rx) = oneshot::channel();
            if let Some(construction) = in_flight.locks.get_mut(&key) {
                construction.waiters.push(Waiter {
                    thread: current,
                    released: tx,
                });
            }
            in_flight.waiting.insert(current, key);
            return Ok(Claim::Wait(rx));
        }

        if !factories.contains(&key) {
            let services = read(&self.services).len();
            tracing::error!("Tried to get an unregistered service: {key}");
            return Err(LocatorError::ServiceNotFound {
                capability: key,
                services,
                factories: factories.len(),
            });
        }

        in_flight.locks.insert(
            key,
            ConstructionLock {
                owner: current,
                waiters: Vec::new(),
            },
        );
        Ok(Claim::Construct(ConstructionGuard::new(self, key)))
    }

    fn construct<C>(&self, locator: &Locator, guard: ConstructionGuard<'_>) -> Result<Arc<C>, LocatorError>
    where
        C: Service + ?Sized,
        C::Init: InitOnMake<C>,
    {
        let key = guard.key;
        tracing::debug!("Constructing service {key}");

        let mut service = locator.factories().construct::<C>(locator)?;
        <C::Init as RunOnMake<C>>::run(&mut *service)?;

        let service: Arc<C> = Arc::from(service);
        guard.publish(Instance::new(service.clone()));
        tracing::debug!("Published service {key}");

        Ok(service)
    }
}

impl InFlight {
    /// Removes the construction lock of `key`, returning the channels of its waiters
    fn release(&mut self, key: &TypeKey) -> Vec<oneshot::Sender<()>> {
        let Some(construction) = self.locks.remove(key) else {
            return Vec::new();
        };

        construction
            .waiters
            .into_iter()
            .map(|waiter| {
                self.waiting.remove(&waiter.thread);
                waiter.released
            })
            .collect()
    }

    /// Follows lock owners and the services they wait for, starting at `key`
    ///
    /// Returns the chain if it leads back to `thread`, i.e. waiting would never end.
    fn wait_chain(&self, thread: ThreadId, key: TypeKey) -> Option<Vec<TypeKey>> {
        let mut chain = vec![key];
        let mut owner = self.locks.get(&key)?.owner;

        while owner != thread {
            let next = *self.waiting.get(&owner)?;
            chain.push(next);
            // Every parked thread waits on exactly one lock, so a longer chain can't close
            if chain.len() > self.locks.len() + 1 {
                return None;
            }
            owner = self.locks.get(&next)?.owner;
        }

        Some(chain)
    }
}

/// Prefixes a wait chain with the constructions this thread has open since the
/// service closing the cycle
fn with_construction_stack(wait_chain: Vec<TypeKey>) -> Vec<TypeKey> {
    let Some(closing) = wait_chain.last().copied() else {
        return wait_chain;
    };

    CONSTRUCTION_STACK.with(|stack| {
        let stack = stack.borrow();
        let start = stack.iter().position(|key| *key == closing).unwrap_or(stack.len());
        stack[start..].iter().copied().chain(wait_chain).collect()
    })
}

/// Held by the constructing thread, releases the [`ConstructionLock`] when dropped
///
/// If the instance was not published by then the construction failed (by error or
/// panic) and the waiters are released to try again.
struct ConstructionGuard<'a> {
    registry: &'a ServiceRegistry,
    key: TypeKey,
    published: bool,
}

impl<'a> ConstructionGuard<'a> {
    fn new(registry: &'a ServiceRegistry, key: TypeKey) -> Self {
        CONSTRUCTION_STACK.with(|stack| stack.borrow_mut().push(key));
        Self {
            registry,
            key,
            published: false,
        }
    }

    fn publish(mut self, instance: Instance) {
        let waiters = {
            let mut in_flight = lock(&self.registry.in_flight);
            write(&self.registry.services).insert(self.key, instance);
            in_flight.release(&self.key)
        };
        self.published = true;

        // The instance is visible before anyone is woken
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        CONSTRUCTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        if self.published {
            return;
        }

        tracing::warn!("Construction of {} failed, releasing waiting threads", self.key);
        let waiters = lock(&self.registry.in_flight).release(&self.key);
        // Dropping the senders wakes every waiter
        drop(waiters);
    }
}
