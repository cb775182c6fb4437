use std::{
    any::type_name,
    fmt::{self, Debug},
    marker::PhantomData,
    sync::atomic::{AtomicU32, AtomicU8, Ordering},
};

use crate::{errors::LocatorError, types::Makeable};

/// A capability expecting initialization after construction
///
/// `Args` is the declared parameter list, `()` for a zero-argument initialize.
/// Initialize may only be called once per instance.
pub trait Initialize {
    type Args;

    fn initialize(&mut self, args: Self::Args) -> Result<(), LocatorError>;
}

pub(crate) mod sealed {
    use crate::errors::LocatorError;

    pub trait Sealed {}

    /// Zero-argument step of an init kind, only reachable inside the crate
    pub trait RunOnMake<C: ?Sized> {
        fn run(made: &mut C) -> Result<(), LocatorError>;
    }
}

/// How a made capability becomes ready, see [`Makeable::Init`]
pub trait InitKind: sealed::Sealed + 'static {}

/// The capability needs no initialization
#[derive(Debug, Clone, Copy)]
pub enum NoInit {}

/// The capability has a zero-argument [`Initialize`], run by `make` and `get`
#[derive(Debug, Clone, Copy)]
pub enum AutoInit {}

/// The capability needs arguments to become ready
///
/// It can only be made with `make_with` or `make_uninitialized`, never by `make` or `get`.
#[derive(Debug, Clone, Copy)]
pub enum ArgsInit {}

impl sealed::Sealed for NoInit {}
impl sealed::Sealed for AutoInit {}
impl sealed::Sealed for ArgsInit {}
impl InitKind for NoInit {}
impl InitKind for AutoInit {}
impl InitKind for ArgsInit {}

/// Init kinds which `make` and `get` complete without help from the caller
pub trait InitOnMake<C: ?Sized>: InitKind + sealed::RunOnMake<C> {}
impl<C: ?Sized, K: InitKind + sealed::RunOnMake<C>> InitOnMake<C> for K {}

impl<C: ?Sized> sealed::RunOnMake<C> for NoInit {
    fn run(_: &mut C) -> Result<(), LocatorError> {
        Ok(())
    }
}

impl<C: Initialize<Args = ()> + ?Sized> sealed::RunOnMake<C> for AutoInit {
    fn run(made: &mut C) -> Result<(), LocatorError> {
        made.initialize(())
    }
}

/// Init kinds of capabilities taking part in the [`Initialize`] protocol
pub trait ExpectsInitialize: InitKind {}
impl ExpectsInitialize for AutoInit {}
impl ExpectsInitialize for ArgsInit {}

/// An intermediate, named point of an initialization
///
/// Checkpoints are reached in ascending [`ordinal`](Checkpoint::ordinal) order.
/// Declare them with [`checkpoints!`](crate::checkpoints).
pub trait Checkpoint: Copy + Send + Sync + 'static {
    fn ordinal(self) -> u32;

    fn name(self) -> &'static str;
}

/// Checkpoints of an initialization without intermediate steps
#[derive(Debug, Clone, Copy)]
pub enum Ready {}
impl Checkpoint for Ready {
    fn ordinal(self) -> u32 {
        match self {}
    }

    fn name(self) -> &'static str {
        match self {}
    }
}

const RAW: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;
const FAILED: u8 = 3;

/// Tracks the initialization state of one object
///
/// An object embeds a helper, opens an [`Initializer`] at the start of `initialize`
/// and gates its accessors with [`check`](InitializeHelper::check) or
/// [`check_reached`](InitializeHelper::check_reached).
///
/// ```ignore
/// struct Palette {
///     init: InitializeHelper,
///     colors: Vec<Color>,
/// }
/// impl Initialize for Palette {
///     type Args = Vec<Color>;
///
///     fn initialize(&mut self, colors: Vec<Color>) -> Result<(), LocatorError> {
///         let init = self.init.begin()?;
///         self.colors = colors;
///         init.finish();
///         Ok(())
///     }
/// }
/// impl Palette {
///     fn colors(&self) -> Result<&[Color], LocatorError> {
///         self.init.check()?;
///         Ok(&self.colors)
///     }
/// }
/// ```
pub struct InitializeHelper<C: Checkpoint = Ready> {
    owner: &'static str,
    phase: AtomicU8,
    /// Ordinal of the furthest checkpoint reached, plus one
    reached: AtomicU32,
    _checkpoints: PhantomData<fn() -> C>,
}

impl<C: Checkpoint> Debug for InitializeHelper<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.phase.load(Ordering::Acquire) {
            RAW => "raw",
            INITIALIZING => "initializing",
            READY => "ready",
            _ => "failed",
        };
        f.debug_struct("InitializeHelper")
            .field("owner", &self.owner)
            .field("phase", &phase)
            .field("reached", &self.reached.load(Ordering::Acquire))
            .finish()
    }
}

impl<C: Checkpoint> InitializeHelper<C> {
    /// A helper for an object of type `Owner`, named in errors
    pub fn new<Owner: ?Sized>() -> Self {
        Self {
            owner: type_name::<Owner>(),
            phase: AtomicU8::new(RAW),
            reached: AtomicU32::new(0),
            _checkpoints: PhantomData,
        }
    }

    /// Starts the one initialization of the owner
    ///
    /// Fails with [`LocatorError::AlreadyInitialized`] if initialization was started
    /// before, whether or not it succeeded.
    pub fn begin(&self) -> Result<Initializer<'_, C>, LocatorError> {
        match self
            .phase
            .compare_exchange(RAW, INITIALIZING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(Initializer {
                helper: self,
                finished: false,
            }),
            Err(_) => Err(LocatorError::AlreadyInitialized(self.owner)),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.phase.load(Ordering::Acquire) == READY
    }

    pub fn has_reached(&self, checkpoint: C) -> bool {
        self.is_initialized() || self.reached.load(Ordering::Acquire) > checkpoint.ordinal()
    }

    /// Fails unless initialization completed
    pub fn check(&self) -> Result<(), LocatorError> {
        if self.is_initialized() {
            return Ok(());
        }
        Err(LocatorError::NotInitialized {
            object: self.owner,
            checkpoint: "ready",
        })
    }

    /// Fails unless `checkpoint` was reached
    pub fn check_reached(&self, checkpoint: C) -> Result<(), LocatorError> {
        if self.has_reached(checkpoint) {
            return Ok(());
        }
        Err(LocatorError::NotInitialized {
            object: self.owner,
            checkpoint: checkpoint.name(),
        })
    }
}

/// An initialization in progress
///
/// Dropping it without calling [`finish`](Initializer::finish), e.g. by returning early
/// with an error, leaves the owner permanently uninitialized past the last checkpoint reached.
#[must_use = "initialization fails unless `finish` is called"]
pub struct Initializer<'a, C: Checkpoint = Ready> {
    helper: &'a InitializeHelper<C>,
    finished: bool,
}

impl<C: Checkpoint> Initializer<'_, C> {
    /// Marks `checkpoint` as reached, never moving backwards
    pub fn reach(&self, checkpoint: C) {
        let reached = checkpoint.ordinal() + 1;
        let previous = self.helper.reached.fetch_max(reached, Ordering::AcqRel);
        if previous >= reached {
            tracing::warn!(
                "{} reached checkpoint '{}' out of order",
                self.helper.owner,
                checkpoint.name()
            );
        }
    }

    pub fn finish(mut self) {
        self.helper.phase.store(READY, Ordering::Release);
        self.finished = true;
    }
}

impl<C: Checkpoint> Drop for Initializer<'_, C> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!("Initialization of {} did not complete", self.helper.owner);
        self.helper.phase.store(FAILED, Ordering::Release);
    }
}

/// Declares an ordered set of initialization checkpoints
///
/// ```ignore
/// checkpoints! {
///     pub enum EditorCheckpoint {
///         ViewPort,
///         Tools,
///     }
/// }
/// ```
#[macro_export]
macro_rules! checkpoints {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($checkpoint:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis enum $name {
            $($checkpoint),+
        }

        impl $crate::Checkpoint for $name {
            fn ordinal(self) -> u32 {
                self as u32
            }

            fn name(self) -> &'static str {
                match self {
                    $(Self::$checkpoint => stringify!($checkpoint)),+
                }
            }
        }
    };
}

/// A made object which was not initialized yet
///
/// Exposes none of the capability: the only ways out are
/// [`initialize`](Uninitialized::initialize) and the explicit [`into_raw`](Uninitialized::into_raw).
pub struct Uninitialized<C: ?Sized> {
    raw: Box<C>,
}

impl<C: Makeable + ?Sized> Uninitialized<C> {
    pub(crate) fn new(raw: Box<C>) -> Self {
        Self { raw }
    }

    /// Runs the initialization, handing out the object only if it succeeded
    pub fn initialize(mut self, args: <C as Initialize>::Args) -> Result<Box<C>, LocatorError>
    where
        C: Initialize,
    {
        self.raw.initialize(args)?;
        Ok(self.raw)
    }

    /// Hands out the raw object, the caller is responsible for initializing it
    pub fn into_raw(self) -> Box<C> {
        self.raw
    }
}

impl<C: ?Sized> Debug for Uninitialized<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Uninitialized").field(&type_name::<C>()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    checkpoints! {
        enum Stage {
            Children,
            Tools,
        }
    }

    struct Editor {
        init: InitializeHelper<Stage>,
        children: Vec<&'static str>,
    }
    impl Editor {
        fn new() -> Self {
            Self {
                init: InitializeHelper::new::<Editor>(),
                children: Vec::new(),
            }
        }

        fn children(&self) -> Result<&[&'static str], LocatorError> {
            self.init.check_reached(Stage::Children)?;
            Ok(&self.children)
        }
    }

    #[test]
    fn raw_object_rejects_access() {
        let editor = Editor::new();
        assert!(matches!(
            editor.children(),
            Err(LocatorError::NotInitialized { checkpoint: "Children", .. })
        ));
        assert!(matches!(
            editor.init.check(),
            Err(LocatorError::NotInitialized { checkpoint: "ready", .. })
        ));
    }

    #[test]
    fn checkpoints_open_access_progressively() {
        let mut editor = Editor::new();
        let init = editor.init.begin().unwrap();

        editor.children.push("viewport");
        init.reach(Stage::Children);
        assert_eq!(editor.children().unwrap(), ["viewport"]);
        assert!(!editor.init.has_reached(Stage::Tools));
        assert!(editor.init.check().is_err());

        init.reach(Stage::Tools);
        init.finish();
        assert!(editor.init.is_initialized());
        editor.init.check().unwrap();
    }

    #[test]
    fn second_begin_fails() {
        let helper = InitializeHelper::<Ready>::new::<Editor>();
        helper.begin().unwrap().finish();

        let err = helper.begin().err().unwrap();
        assert!(matches!(err, LocatorError::AlreadyInitialized(owner) if owner.ends_with("Editor")));
    }

    #[test]
    fn abandoned_initialization_stays_raw() {
        let editor = Editor::new();
        {
            let init = editor.init.begin().unwrap();
            init.reach(Stage::Children);
            // Dropped without finish, as if initialize returned an error
        }

        editor.children().unwrap();
        assert!(editor.init.check_reached(Stage::Tools).is_err());
        assert!(editor.init.check().is_err());
        assert!(matches!(
            editor.init.begin().err(),
            Some(LocatorError::AlreadyInitialized(_))
        ));
    }

    struct Lamp(InitializeHelper);
    impl Initialize for Lamp {
        type Args = ();

        fn initialize(&mut self, _: ()) -> Result<(), LocatorError> {
            self.0.begin()?.finish();
            Ok(())
        }
    }

    #[test]
    fn init_kinds_run_only_zero_argument_initialization() {
        let mut lamp = Lamp(InitializeHelper::new::<Lamp>());
        <NoInit as sealed::RunOnMake<Lamp>>::run(&mut lamp).unwrap();
        assert!(!lamp.0.is_initialized());

        <AutoInit as sealed::RunOnMake<Lamp>>::run(&mut lamp).unwrap();
        assert!(lamp.0.is_initialized());
        assert!(matches!(
            <AutoInit as sealed::RunOnMake<Lamp>>::run(&mut lamp),
            Err(LocatorError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn checkpoints_never_regress() {
        let helper = InitializeHelper::<Stage>::new::<Editor>();
        let init = helper.begin().unwrap();
        init.reach(Stage::Tools);
        init.reach(Stage::Children);

        assert!(helper.has_reached(Stage::Tools));
        drop(init);
    }
}
