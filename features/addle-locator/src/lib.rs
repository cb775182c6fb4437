//! Addle Locator maps capabilities (usually trait objects) to the factories making them,
//! and keeps exactly one instance of every service.
//!
//! Addle Locator is split into three major parts:
//! 1. LocatorBuilder: Used once at startup to register all factories and prebuilt instances
//! 2. Locator: Hands out services with `get` and new objects with `make`
//! 3. InitializeHelper: Guards objects which need to be initialized after construction
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use addle_locator::{implements, makeable, service, Locator};
//!
//! trait Shape: Send + Sync {
//!     fn area(&self) -> f64;
//! }
//! makeable!(dyn Shape);
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, line: &str);
//! }
//! service!(dyn Logger);
//!
//! #[derive(Default)]
//! struct Circle;
//! impl Shape for Circle {
//!     fn area(&self) -> f64 {
//!         std::f64::consts::PI
//!     }
//! }
//! implements!(Circle => dyn Shape);
//!
//! #[derive(Default)]
//! struct StdoutLogger;
//! impl Logger for StdoutLogger {
//!     fn log(&self, line: &str) {
//!         println!("{line}");
//!     }
//! }
//! implements!(StdoutLogger => dyn Logger);
//!
//! let locator = Locator::builder()
//!     .add_type::<dyn Shape, Circle>()
//!     .add_type::<dyn Logger, StdoutLogger>()
//!     .build()
//!     .unwrap();
//!
//! // Services are constructed once
//! let a = locator.get::<dyn Logger>().unwrap();
//! let b = locator.get::<dyn Logger>().unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//!
//! // Everything else is made anew on every call
//! let shape = locator.make::<dyn Shape>().unwrap();
//! a.log(&format!("area: {}", shape.area()));
//! ```
//!
//! Addle Locator consists of the following components:
//!
//! 1. Types - capability traits and type keys
//! 2. Factories - for making instances of a capability
//! 3. Registry - the factory per capability
//! 4. Services - singleton construction shared between threads
//! 5. Initialize - the initialization protocol
//! 6. Locator and Builder - the public surface
//! 7. Config and Errors

mod builder;
mod config;
mod errors;
mod factories;
mod initialize;
mod locator;
mod locks;
mod registry;
mod services;
mod types;

pub use builder::LocatorBuilder;
pub use config::{ConfigValueError, DuplicatePolicy, LocatorConfig, AUTO_INITIALIZE_VAR, DUPLICATES_VAR};
pub use errors::LocatorError;
pub use factories::{DefaultFactory, Factory, FnFactory};
pub use initialize::{
    ArgsInit, AutoInit, Checkpoint, ExpectsInitialize, InitKind, InitOnMake, Initialize, InitializeHelper,
    Initializer, NoInit, Ready, Uninitialized,
};
pub use locator::{get, make, make_shared, make_uninitialized, make_with, Locator};
pub use registry::FactoryRegistry;
pub use types::{DynError, Implements, Instance, Makeable, Product, Service, TypeKey};

/// Declares a capability which can be made through the locator
///
/// The second argument sets the [`Init`](Makeable::Init) kind of the capability:
/// - nothing: [`NoInit`], the capability has no [`Initialize`] step
/// - `initialize`: [`AutoInit`], the zero-argument [`Initialize`] runs right after construction
/// - `initialize(args)`: [`ArgsInit`], only [`Locator::make_with`] and
///   [`Locator::make_uninitialized`] hand it out
///
/// ```rust
/// use addle_locator::{makeable, Initialize};
///
/// trait Shape: Send + Sync {}
/// makeable!(dyn Shape);
///
/// trait Canvas: Initialize<Args = ()> + Send + Sync {}
/// makeable!(dyn Canvas, initialize);
///
/// trait Document: Initialize<Args = (u32, u32)> + Send + Sync {}
/// makeable!(dyn Document, initialize(args));
/// ```
///
/// Anything needing arguments cannot be made without them:
///
/// ```compile_fail
/// use addle_locator::{makeable, Initialize, Locator};
///
/// trait Document: Initialize<Args = (u32, u32)> + Send + Sync {}
/// makeable!(dyn Document, initialize(args));
///
/// fn open(locator: &Locator) {
///     let _ = locator.make::<dyn Document>();
/// }
/// ```
///
/// A capability with an [`Initialize`] step must say so:
///
/// ```compile_fail
/// use addle_locator::{makeable, Initialize};
///
/// trait Canvas: Initialize<Args = ()> + Send + Sync {}
/// makeable!(dyn Canvas);
/// ```
#[macro_export]
macro_rules! makeable {
    ($capability:ty, initialize(args)) => {
        impl $crate::Makeable for $capability {
            type Init = $crate::ArgsInit;
        }
        const _: fn() = || {
            fn expects_initialize<C: ?Sized + $crate::Initialize>() {}
            expects_initialize::<$capability>();
        };
    };
    ($capability:ty, initialize) => {
        impl $crate::Makeable for $capability {
            type Init = $crate::AutoInit;
        }
        const _: fn() = || {
            fn expects_zero_argument_initialize<C: ?Sized + $crate::Initialize<Args = ()>>() {}
            expects_zero_argument_initialize::<$capability>();
        };
    };
    ($capability:ty) => {
        impl $crate::Makeable for $capability {
            type Init = $crate::NoInit;
        }
        // Conflicts with an Initialize the capability already has
        impl $crate::Initialize for $capability {
            type Args = ();

            fn initialize(&mut self, _: ()) -> ::std::result::Result<(), $crate::LocatorError> {
                Ok(())
            }
        }
    };
}

/// Declares a capability of which the locator keeps one instance
///
/// Accepts the same arguments as [`makeable!`]. Services are published initialized,
/// so [`Locator::get`] refuses capabilities declared with `initialize(args)`:
///
/// ```compile_fail
/// use addle_locator::{service, Initialize, Locator};
///
/// trait Settings: Initialize<Args = String> + Send + Sync {}
/// service!(dyn Settings, initialize(args));
///
/// fn load(locator: &Locator) {
///     let _ = locator.get::<dyn Settings>();
/// }
/// ```
#[macro_export]
macro_rules! service {
    ($capability:ty $(, $($init:tt)+)?) => {
        $crate::makeable!($capability $(, $($init)+)?);
        impl $crate::Service for $capability {}
    };
}

/// Proves that a product satisfies one or more capabilities
///
/// ```ignore
/// implements!(Circle => dyn Shape, dyn Drawable);
/// ```
#[macro_export]
macro_rules! implements {
    ($product:ty => $($capability:ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$capability> for $product {
                fn upcast(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<$capability> {
                    self
                }
            }
        )+
    };
}
