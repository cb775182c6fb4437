use std::sync::Arc;

use crate::{
    config::{DuplicatePolicy, LocatorConfig},
    errors::LocatorError,
    factories::{DefaultFactory, DynFactory, Factory, FnFactory},
    locator::Locator,
    types::{Implements, Instance, Makeable, Service},
};

//////////////////////////////////////////////////////////////////////
///
/// The locator is set up in two steps.
/// 1. The LocatorBuilder where one registers all factories and instances
/// 2. build, which hands out the ready Locator
///
pub struct LocatorBuilder {
    config: LocatorConfig,
    /// Registered factories which can make instances, in registration order
    pub(crate) registered_factories: Vec<Arc<dyn DynFactory>>,
    /// Registered already created services
    pub(crate) registered_instances: Vec<Instance>,
}
impl Default for LocatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LocatorBuilder {
    pub fn new() -> Self {
        LocatorBuilder {
            config: LocatorConfig::default(),
            registered_factories: Vec::new(),
            registered_instances: Vec::new(),
        }
    }

    pub fn config(mut self, config: LocatorConfig) -> Self {
        self.config = config;
        self
    }
}
impl LocatorBuilder {
    /// Publishes an existing instance as the service `C`
    pub fn add_instance<C: Service + ?Sized>(mut self, instance: Arc<C>) -> Self {
        self.registered_instances.push(Instance::new(instance));
        self
    }

    pub fn add_factory<F: Factory>(mut self, factory: F) -> Self {
        self.registered_factories.push(Arc::new(factory));
        self
    }

    pub fn add_fn<C, F>(self, make: F) -> Self
    where
        C: Makeable + ?Sized,
        F: Fn(&Locator) -> Result<Box<C>, LocatorError> + Send + Sync + 'static,
    {
        self.add_factory(FnFactory::<C, F>::new(make))
    }

    pub fn add_type<C, P>(self) -> Self
    where
        C: Makeable + ?Sized,
        P: Default + Implements<C> + 'static,
    {
        self.add_factory(DefaultFactory::<C, P>::new())
    }

    /// Registers everything with a new locator
    ///
    /// Fails on duplicates only when they are rejected by the [`DuplicatePolicy`].
    pub fn build(self) -> Result<Locator, LocatorError> {
        let LocatorBuilder {
            config,
            registered_factories,
            registered_instances,
        } = self;

        tracing::debug!(
            "Building locator with {} factories and {} instances",
            registered_factories.len(),
            registered_instances.len()
        );

        let reject = config.duplicates == DuplicatePolicy::Reject;
        let locator = Locator::new(config);
        for factory in registered_factories {
            locator.factories().register(factory)?;
        }
        for instance in registered_instances {
            let key = instance.info;
            if !locator.services().insert(instance) {
                if reject {
                    tracing::error!("Rejected a second instance of {key}");
                    return Err(LocatorError::DuplicateRegistration(key));
                }
                tracing::warn!("Ignoring a second instance of {key}");
            }
        }

        Ok(locator)
    }
}
