use std::{
    fmt::Debug,
    sync::{Arc, OnceLock},
};

use crate::{
    builder::LocatorBuilder,
    config::LocatorConfig,
    errors::LocatorError,
    factories::{DefaultFactory, Factory, FnFactory},
    initialize::{sealed::RunOnMake, ExpectsInitialize, InitOnMake, Initialize, Uninitialized},
    registry::FactoryRegistry,
    services::ServiceRegistry,
    types::{Implements, Makeable, Service, TypeKey},
};

static GLOBAL: OnceLock<Locator> = OnceLock::new();

/// The composition root handing out services and freshly made objects
///
/// Usually built once at startup with [`Locator::builder`] and then either passed
/// around or installed as the process-wide locator with [`Locator::install`].
pub struct Locator {
    config: LocatorConfig,
    factories: FactoryRegistry,
    services: ServiceRegistry,
}

impl Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("config", &self.config)
            .field("factories", &self.factories)
            .field("services", &self.services.len())
            .finish()
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(LocatorConfig::default())
    }
}

impl Locator {
    pub fn new(config: LocatorConfig) -> Self {
        Locator {
            factories: FactoryRegistry::new(config.duplicates),
            services: ServiceRegistry::new(),
            config,
        }
    }

    pub fn builder() -> LocatorBuilder {
        LocatorBuilder::new()
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    pub(crate) fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Number of published singletons
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Whether the singleton of `C` has been published
    pub fn is_published<C: Service + ?Sized>(&self) -> bool {
        self.services.contains(&TypeKey::of::<C>())
    }
}

// Registration
impl Locator {
    /// Registers `factory` for the capability it supplies
    ///
    /// Registering while other threads already use the locator is safe, but a singleton
    /// published before is never replaced.
    pub fn register<F: Factory>(&self, factory: F) -> Result<(), LocatorError> {
        self.factories.register(Arc::new(factory))
    }

    pub fn register_fn<C, F>(&self, make: F) -> Result<(), LocatorError>
    where
        C: Makeable + ?Sized,
        F: Fn(&Locator) -> Result<Box<C>, LocatorError> + Send + Sync + 'static,
    {
        self.register(FnFactory::<C, F>::new(make))
    }

    /// Registers the default-constructed `P` as the implementation of `C`
    pub fn register_type<C, P>(&self) -> Result<(), LocatorError>
    where
        C: Makeable + ?Sized,
        P: Default + Implements<C> + 'static,
    {
        self.register(DefaultFactory::<C, P>::new())
    }
}

// Use
impl Locator {
    /// Returns the one instance of the service `C`, constructing and initializing it on first use
    ///
    /// Blocks while another thread constructs the same service.
    pub fn get<C>(&self) -> Result<Arc<C>, LocatorError>
    where
        C: Service + ?Sized,
        C::Init: InitOnMake<C>,
    {
        self.services.get::<C>(self)
    }

    /// Makes a new instance of `C` owned by the caller
    ///
    /// Runs the zero-argument initialization unless auto initialization is disabled.
    pub fn make<C>(&self) -> Result<Box<C>, LocatorError>
    where
        C: Makeable + ?Sized,
        C::Init: InitOnMake<C>,
    {
        let mut made = self.factories.construct::<C>(self)?;
        if self.config.auto_initialize {
            <C::Init as RunOnMake<C>>::run(&mut *made)?;
        }
        Ok(made)
    }

    /// Makes a new instance of `C` and initializes it with `args`
    pub fn make_with<C>(&self, args: <C as Initialize>::Args) -> Result<Box<C>, LocatorError>
    where
        C: Makeable + Initialize + ?Sized,
        C::Init: ExpectsInitialize,
    {
        self.make_uninitialized::<C>()?.initialize(args)
    }

    /// Makes a new instance of `C` without initializing it
    pub fn make_uninitialized<C>(&self) -> Result<Uninitialized<C>, LocatorError>
    where
        C: Makeable + Initialize + ?Sized,
        C::Init: ExpectsInitialize,
    {
        self.factories.construct::<C>(self).map(Uninitialized::new)
    }

    /// Like [`make`](Locator::make), for callers sharing the new instance
    pub fn make_shared<C>(&self) -> Result<Arc<C>, LocatorError>
    where
        C: Makeable + ?Sized,
        C::Init: InitOnMake<C>,
    {
        self.make::<C>().map(Arc::from)
    }
}

// Process-wide locator
impl Locator {
    /// Installs this locator as the process-wide one
    ///
    /// Can only succeed once per process.
    pub fn install(self) -> Result<&'static Locator, LocatorError> {
        if GLOBAL.set(self).is_err() {
            tracing::error!("Tried to install a second process-wide locator");
            return Err(LocatorError::AlreadyConfigured);
        }
        tracing::debug!("Installed process-wide locator");
        Self::global()
    }

    pub fn global() -> Result<&'static Locator, LocatorError> {
        GLOBAL.get().ok_or(LocatorError::NotConfigured)
    }
}

/// [`Locator::get`] on the process-wide locator
pub fn get<C>() -> Result<Arc<C>, LocatorError>
where
    C: Service + ?Sized,
    C::Init: InitOnMake<C>,
{
    Locator::global()?.get::<C>()
}

/// [`Locator::make`] on the process-wide locator
pub fn make<C>() -> Result<Box<C>, LocatorError>
where
    C: Makeable + ?Sized,
    C::Init: InitOnMake<C>,
{
    Locator::global()?.make::<C>()
}

/// [`Locator::make_with`] on the process-wide locator
pub fn make_with<C>(args: <C as Initialize>::Args) -> Result<Box<C>, LocatorError>
where
    C: Makeable + Initialize + ?Sized,
    C::Init: ExpectsInitialize,
{
    Locator::global()?.make_with::<C>(args)
}

/// [`Locator::make_uninitialized`] on the process-wide locator
pub fn make_uninitialized<C>() -> Result<Uninitialized<C>, LocatorError>
where
    C: Makeable + Initialize + ?Sized,
    C::Init: ExpectsInitialize,
{
    Locator::global()?.make_uninitialized::<C>()
}

/// [`Locator::make_shared`] on the process-wide locator
pub fn make_shared<C>() -> Result<Arc<C>, LocatorError>
where
    C: Makeable + ?Sized,
    C::Init: InitOnMake<C>,
{
    Locator::global()?.make_shared::<C>()
}
