use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::initialize::InitKind;

/// All errors must be Send + Sync so they can cross construction threads
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Identity of a capability
///
/// Derived from [`TypeId`], so no registration is needed to obtain one and two keys
/// for the same type always compare equal, whichever crate asked for them.
/// Equality and hashing only look at the [`TypeId`], the name is kept for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> TypeKey {
        TypeKey {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}
impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}
impl Eq for TypeKey {}
impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}
impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.type_name).finish()
    }
}
impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// A capability which can be constructed through the registry
///
/// Usually implemented for a trait object (`dyn Shape`) with [`makeable!`](crate::makeable),
/// which also picks the [`Init`](Makeable::Init) kind.
/// Anything shared between threads needs to be Send + Sync + 'static.
pub trait Makeable: Send + Sync + 'static {
    /// How a made instance becomes ready, one of [`NoInit`](crate::NoInit),
    /// [`AutoInit`](crate::AutoInit) or [`ArgsInit`](crate::ArgsInit)
    type Init: InitKind;
}

/// A capability of which the registry keeps exactly one instance
pub trait Service: Makeable {}

/// Compile time proof that `Self` satisfies the capability `C`
///
/// Implement it with [`implements!`](crate::implements).
pub trait Implements<C: ?Sized> {
    fn upcast(self: Box<Self>) -> Box<C>;
}
impl<C: ?Sized> Implements<C> for C {
    fn upcast(self: Box<Self>) -> Box<C> {
        self
    }
}

/// A freshly made instance on its way out of a factory
pub struct Product {
    pub info: TypeKey,
    instance: Box<dyn Any + Send>,
}

impl Product {
    pub(crate) fn new<C: ?Sized + Send + 'static>(instance: Box<C>) -> Self {
        Product {
            info: TypeKey::of::<C>(),
            instance: Box::new(instance),
        }
    }

    /// Returns the product as the requested capability, or the name of what was actually made
    pub fn downcast<C: ?Sized + 'static>(self) -> Result<Box<C>, &'static str> {
        match self.instance.downcast::<Box<C>>() {
            Ok(downcasted) => Ok(*downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }
}

/// A published singleton
#[derive(Clone)]
pub struct Instance {
    pub info: TypeKey,
    instance: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub(crate) fn new<C: ?Sized + Send + Sync + 'static>(instance: Arc<C>) -> Self {
        Instance {
            info: TypeKey::of::<C>(),
            instance: Arc::new(instance),
        }
    }

    pub fn downcast<C: ?Sized + 'static>(&self) -> Result<Arc<C>, &'static str> {
        self.instance
            .downcast_ref::<Arc<C>>()
            .cloned()
            .ok_or(self.info.type_name)
    }
}
