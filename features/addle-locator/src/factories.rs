use std::{any::type_name, marker::PhantomData};

use crate::{
    errors::LocatorError,
    locator::Locator,
    types::{Implements, Makeable, Product, TypeKey},
};

/// A Factory providing new instances of a capability
pub trait Factory: Send + Sync + 'static {
    type Capability: Makeable + ?Sized;

    /// Returns the key of the capability this factory supplies
    fn supplies() -> TypeKey
    where
        Self: Sized,
    {
        TypeKey::of::<Self::Capability>()
    }

    /// Name of what this factory makes, for diagnostics
    fn product_name(&self) -> &'static str {
        type_name::<Self::Capability>()
    }

    /// Makes a new instance of the capability
    ///
    /// The locator is handed in so the factory can require its own dependencies.
    /// Every call must return a new, independent instance.
    fn make(&self, locator: &Locator) -> Result<Box<Self::Capability>, LocatorError>;
}

/// Wrapper Trait for factories, producing type-erased products
pub(crate) trait DynFactory: Send + Sync {
    fn supplies(&self) -> TypeKey;

    fn product_name(&self) -> &'static str;

    fn construct(&self, locator: &Locator) -> Result<Product, LocatorError>;
}
// Impl DynFactory for any Factory
impl<SpecificFactory: Factory> DynFactory for SpecificFactory {
    fn supplies(&self) -> TypeKey {
        <SpecificFactory as Factory>::supplies()
    }

    fn product_name(&self) -> &'static str {
        Factory::product_name(self)
    }

    fn construct(&self, locator: &Locator) -> Result<Product, LocatorError> {
        self.make(locator).map(Product::new)
    }
}

/// Factory calling a closure
pub struct FnFactory<C: ?Sized, F> {
    make: F,
    _capability: PhantomData<fn() -> Box<C>>,
}
impl<C: ?Sized, F> FnFactory<C, F> {
    pub fn new(make: F) -> Self {
        FnFactory {
            make,
            _capability: PhantomData,
        }
    }
}
impl<C, F> Factory for FnFactory<C, F>
where
    C: Makeable + ?Sized,
    F: Fn(&Locator) -> Result<Box<C>, LocatorError> + Send + Sync + 'static,
{
    type Capability = C;

    fn make(&self, locator: &Locator) -> Result<Box<C>, LocatorError> {
        (self.make)(locator)
    }
}

/// Factory default-constructing the product `P` as capability `C`
pub struct DefaultFactory<C: ?Sized, P> {
    _marker: PhantomData<fn() -> (Box<C>, P)>,
}
impl<C: ?Sized, P> DefaultFactory<C, P> {
    pub fn new() -> Self {
        DefaultFactory {
            _marker: PhantomData,
        }
    }
}
impl<C: ?Sized, P> Default for DefaultFactory<C, P> {
    fn default() -> Self {
        Self::new()
    }
}
impl<C, P> Factory for DefaultFactory<C, P>
where
    C: Makeable + ?Sized,
    P: Default + Implements<C> + 'static,
{
    type Capability = C;

    fn product_name(&self) -> &'static str {
        type_name::<P>()
    }

    fn make(&self, _: &Locator) -> Result<Box<C>, LocatorError> {
        Ok(<P as Implements<C>>::upcast(Box::new(P::default())))
    }
}
