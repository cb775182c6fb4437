use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, RwLock},
};

use crate::{
    config::DuplicatePolicy,
    errors::LocatorError,
    factories::DynFactory,
    locator::Locator,
    locks::{read, write},
    types::{Makeable, TypeKey},
};

/// Maps every capability to the one factory making it
///
/// The registry never caches, every [`construct`](FactoryRegistry::construct) makes a new instance.
pub struct FactoryRegistry {
    factories: RwLock<HashMap<TypeKey, Arc<dyn DynFactory>>>,
    duplicates: DuplicatePolicy,
}
impl Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let factories = read(&self.factories);
        let mut map = f.debug_map();
        for (key, factory) in factories.iter() {
            map.entry(&key.type_name, &factory.product_name());
        }
        map.finish()
    }
}

impl FactoryRegistry {
    pub(crate) fn new(duplicates: DuplicatePolicy) -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            duplicates,
        }
    }

    /// Stores `factory` under the capability it supplies
    ///
    /// An existing factory for the same capability is replaced or kept according to
    /// the [`DuplicatePolicy`]; only [`DuplicatePolicy::Reject`] can fail.
    pub(crate) fn register(&self, factory: Arc<dyn DynFactory>) -> Result<(), LocatorError> {
        let key = factory.supplies();
        let mut factories = write(&self.factories);

        match (factories.contains_key(&key), self.duplicates) {
            (true, DuplicatePolicy::Reject) => {
                tracing::error!("Rejected a second factory for {key}");
                return Err(LocatorError::DuplicateRegistration(key));
            }
            (true, DuplicatePolicy::Overwrite) => {
                tracing::warn!(
                    "Replacing factory for {key} with one making {}",
                    factory.product_name()
                );
            }
            (false, _) => {
                tracing::debug!(
                    "Registered factory for {key} making {}",
                    factory.product_name()
                );
            }
        }

        factories.insert(key, factory);
        Ok(())
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        read(&self.factories).contains_key(key)
    }

    pub fn len(&self) -> usize {
        read(&self.factories).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.factories).is_empty()
    }

    /// Makes a new instance of `C` with its registered factory
    ///
    /// The factory runs without any lock held, so it may use the locator freely.
    pub(crate) fn construct<C: Makeable + ?Sized>(
        &self,
        locator: &Locator,
    ) -> Result<Box<C>, LocatorError> {
        let key = TypeKey::of::<C>();
        let factory = {
            let factories = read(&self.factories);
            match factories.get(&key) {
                Some(factory) => factory.clone(),
                None => {
                    tracing::error!("Tried to make an unregistered capability: {key}");
                    return Err(LocatorError::FactoryNotFound {
                        capability: key,
                        factories: factories.len(),
                    });
                }
            }
        };

        let product = factory.construct(locator)?;
        tracing::trace!("Factory for {key} made {}", factory.product_name());

        product
            .downcast::<C>()
            .map_err(|produced| LocatorError::InvalidFactoryProduct {
                requested: key,
                produced,
            })
    }
}
