use std::sync::Arc;

use thiserror::Error;

use crate::types::{DynError, TypeKey};

/// Errors of the locator
///
/// Every one of these is a programming or configuration error, none is worth retrying.
#[derive(Error, Debug, Clone)]
pub enum LocatorError {
    /// No process-wide locator has been installed
    #[error("The service locator was used before it was configured")]
    NotConfigured,
    /// A process-wide locator has already been installed
    #[error("The service locator has already been configured")]
    AlreadyConfigured,
    /// Nothing was ever registered for the capability
    #[error("No factory for '{capability}' is registered ({factories} factories known)")]
    FactoryNotFound {
        capability: TypeKey,
        factories: usize,
    },
    /// The registered factory made something which is not the requested capability
    #[error("Factory for '{requested}' produced '{produced}', which does not satisfy it")]
    InvalidFactoryProduct {
        requested: TypeKey,
        produced: &'static str,
    },
    /// The capability can not be provided as a service
    #[error("The service '{capability}' is not known ({services} services constructed, {factories} factories known)")]
    ServiceNotFound {
        capability: TypeKey,
        services: usize,
        factories: usize,
    },
    /// Registering a second factory while duplicates are rejected
    #[error("A factory for '{0}' is already registered")]
    DuplicateRegistration(TypeKey),
    /// Initialize was called a second time
    #[error("'{0}' has already been initialized")]
    AlreadyInitialized(&'static str),
    /// State was accessed before its guarding checkpoint
    #[error("'{object}' was accessed before reaching '{checkpoint}'")]
    NotInitialized {
        object: &'static str,
        checkpoint: &'static str,
    },
    /// Constructing the service requires the service itself
    #[error("A cyclic dependency exists while constructing '{capability}' through {chain:?}")]
    CyclicDependency {
        capability: TypeKey,
        chain: Vec<TypeKey>,
    },
    /// A factory failed to build
    #[error("Factory for '{product}' failed - error: {error}")]
    FactoryFailed {
        product: TypeKey,
        error: Arc<DynError>,
    },
    /// An initialize implementation failed
    #[error("Initialization of '{object}' failed - error: {error}")]
    InitializationFailed {
        object: &'static str,
        error: Arc<DynError>,
    },
}

impl LocatorError {
    /// Wraps an error raised while making `C`
    pub fn factory_failed<C: ?Sized + 'static>(error: impl Into<DynError>) -> Self {
        Self::FactoryFailed {
            product: TypeKey::of::<C>(),
            error: Arc::new(error.into()),
        }
    }

    /// Wraps an error raised while initializing `T`
    pub fn initialization_failed<T: ?Sized>(error: impl Into<DynError>) -> Self {
        Self::InitializationFailed {
            object: std::any::type_name::<T>(),
            error: Arc::new(error.into()),
        }
    }
}
