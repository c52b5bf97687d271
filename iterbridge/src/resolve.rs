//! Iterator capability resolution.
//!
//! Duck typing ("does this value have a callable advance?") is resolved
//! exactly once, at transfer time: a [`Candidate`] carries one optional slot per
//! capability shape, [`resolve`] tries them in precedence order and
//! produces a [`Resolved`] handle tagged with its [`Origin`]. Nothing is
//! re-checked per call afterwards.
//!
//! Precedence (first match wins):
//!
//! 1. native asynchronous iterator
//! 2. native synchronous iterator
//! 3. asynchronous iterable factory
//! 4. synchronous iterable factory
//! 5. duck-typed advance operation (always classified asynchronous)
//!
//! Async-factory precedence over sync-factory mirrors the consumer side:
//! everything ends up asynchronous once bridged. Steps 3-5 run
//! user-supplied code; the caller nominated the value for transfer, so
//! that is accepted.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ResolveError;
use crate::wire::{IterStep, StepResult};

/// Canonical iteration operations of a synchronous iterator handle.
///
/// `ret` and `throw` are optional capabilities gated by the `has_*`
/// probes; adapters never call an operation whose probe reports `false`.
pub trait SyncIterHandle {
    /// Advance the iterator, optionally feeding it an input value.
    fn next(&mut self, input: Option<Value>) -> StepResult;

    /// Whether the handle supports early termination.
    fn has_return(&self) -> bool {
        false
    }

    /// Terminate the iterator early.
    fn ret(&mut self, input: Option<Value>) -> StepResult {
        Ok(IterStep::finished(input.unwrap_or(Value::Null)))
    }

    /// Whether the handle supports error injection.
    fn has_throw(&self) -> bool {
        false
    }

    /// Inject an error into the iterator.
    fn throw(&mut self, error: Value) -> StepResult {
        Err(error)
    }
}

/// Canonical iteration operations of an asynchronous iterator handle.
///
/// Same surface as [`SyncIterHandle`] with awaitable operations. An
/// operation that completes without suspending is treated exactly like an
/// already-resolved awaitable.
#[async_trait(?Send)]
pub trait AsyncIterHandle {
    /// Advance the iterator, optionally feeding it an input value.
    async fn next(&mut self, input: Option<Value>) -> StepResult;

    /// Whether the handle supports early termination.
    fn has_return(&self) -> bool {
        false
    }

    /// Terminate the iterator early.
    async fn ret(&mut self, input: Option<Value>) -> StepResult {
        Ok(IterStep::finished(input.unwrap_or(Value::Null)))
    }

    /// Whether the handle supports error injection.
    fn has_throw(&self) -> bool {
        false
    }

    /// Inject an error into the iterator.
    async fn throw(&mut self, error: Value) -> StepResult {
        Err(error)
    }
}

/// Adapter exposing any `Iterator<Item = Value>` as a [`SyncIterHandle`].
///
/// The wrapped iterator has no early-terminate or inject-error
/// capability.
pub struct ValueIter<I>(I);

impl<I: Iterator<Item = Value>> ValueIter<I> {
    /// Wrap a plain iterator of values.
    pub fn new(iter: I) -> Self {
        Self(iter)
    }
}

impl<I: Iterator<Item = Value>> SyncIterHandle for ValueIter<I> {
    fn next(&mut self, _input: Option<Value>) -> StepResult {
        match self.0.next() {
            Some(value) => Ok(IterStep::yielded(value)),
            None => Ok(IterStep::finished(Value::Null)),
        }
    }
}

/// Factory producing a synchronous iterator handle.
///
/// `None` models a factory whose product lacks a callable advance
/// operation.
pub type SyncFactory = Box<dyn FnOnce() -> Option<Box<dyn SyncIterHandle>>>;

/// Factory producing an asynchronous iterator handle.
///
/// `None` models a factory whose product lacks a callable advance
/// operation.
pub type AsyncFactory = Box<dyn FnOnce() -> Option<Box<dyn AsyncIterHandle>>>;

/// A value nominated for transfer, decomposed into the capability shapes
/// it exposes.
#[derive(Default)]
pub struct Candidate {
    native_async: Option<Box<dyn AsyncIterHandle>>,
    native_sync: Option<Box<dyn SyncIterHandle>>,
    async_factory: Option<AsyncFactory>,
    sync_factory: Option<SyncFactory>,
    duck_next: Option<Box<dyn AsyncIterHandle>>,
}

impl Candidate {
    /// A candidate exposing no capability at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// A candidate that already is a native asynchronous iterator.
    pub fn native_async(handle: Box<dyn AsyncIterHandle>) -> Self {
        Self::new().with_native_async(handle)
    }

    /// A candidate that already is a native synchronous iterator.
    pub fn native_sync(handle: Box<dyn SyncIterHandle>) -> Self {
        Self::new().with_native_sync(handle)
    }

    /// A candidate exposing only a bare callable advance operation.
    pub fn duck_typed(handle: Box<dyn AsyncIterHandle>) -> Self {
        Self::new().with_duck_next(handle)
    }

    /// A candidate wrapping a plain `Iterator` of values.
    pub fn from_iterator<I>(iter: I) -> Self
    where
        I: Iterator<Item = Value> + 'static,
    {
        Self::native_sync(Box::new(ValueIter::new(iter)))
    }

    /// Attach a native asynchronous iterator capability.
    pub fn with_native_async(mut self, handle: Box<dyn AsyncIterHandle>) -> Self {
        self.native_async = Some(handle);
        self
    }

    /// Attach a native synchronous iterator capability.
    pub fn with_native_sync(mut self, handle: Box<dyn SyncIterHandle>) -> Self {
        self.native_sync = Some(handle);
        self
    }

    /// Attach an asynchronous iterable factory.
    pub fn with_async_factory<F>(mut self, factory: F) -> Self
    where
        F: FnOnce() -> Option<Box<dyn AsyncIterHandle>> + 'static,
    {
        self.async_factory = Some(Box::new(factory));
        self
    }

    /// Attach a synchronous iterable factory.
    pub fn with_sync_factory<F>(mut self, factory: F) -> Self
    where
        F: FnOnce() -> Option<Box<dyn SyncIterHandle>> + 'static,
    {
        self.sync_factory = Some(Box::new(factory));
        self
    }

    /// Attach a bare duck-typed advance operation.
    pub fn with_duck_next(mut self, handle: Box<dyn AsyncIterHandle>) -> Self {
        self.duck_next = Some(handle);
        self
    }
}

/// Which capability shape the resolver matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Step 1: native asynchronous iterator.
    NativeAsync,
    /// Step 2: native synchronous iterator.
    NativeSync,
    /// Step 3: asynchronous iterable factory.
    FactoryAsync,
    /// Step 4: synchronous iterable factory.
    FactorySync,
    /// Step 5: bare callable advance operation.
    DuckTyped,
}

/// The handle selected by resolution, classified sync or async.
pub enum ResolvedHandle {
    /// A synchronous handle; bridged by the synchronous source adapter.
    Sync(Box<dyn SyncIterHandle>),
    /// An asynchronous handle; bridged by the queued source adapter.
    Async(Box<dyn AsyncIterHandle>),
}

/// Outcome of capability resolution.
pub struct Resolved {
    /// The iterator handle to bind to a source adapter.
    pub handle: ResolvedHandle,
    /// Which capability shape matched.
    pub origin: Origin,
}

impl Resolved {
    /// Whether the handle's operations are awaitable.
    pub fn is_async(&self) -> bool {
        matches!(self.handle, ResolvedHandle::Async(_))
    }
}

/// Produce the canonical iterator handle for a candidate.
///
/// # Errors
///
/// [`ResolveError::NotIterable`] if no capability shape matches;
/// [`ResolveError::ProtocolViolation`] if a matched factory produces
/// something without a callable advance operation.
pub fn resolve(candidate: Candidate) -> Result<Resolved, ResolveError> {
    if let Some(handle) = candidate.native_async {
        return Ok(Resolved {
            handle: ResolvedHandle::Async(handle),
            origin: Origin::NativeAsync,
        });
    }
    if let Some(handle) = candidate.native_sync {
        return Ok(Resolved {
            handle: ResolvedHandle::Sync(handle),
            origin: Origin::NativeSync,
        });
    }
    if let Some(factory) = candidate.async_factory {
        let handle = factory().ok_or_else(|| ResolveError::ProtocolViolation {
            message: "async iterable factory product lacks a callable advance operation"
                .to_string(),
        })?;
        return Ok(Resolved {
            handle: ResolvedHandle::Async(handle),
            origin: Origin::FactoryAsync,
        });
    }
    if let Some(factory) = candidate.sync_factory {
        let handle = factory().ok_or_else(|| ResolveError::ProtocolViolation {
            message: "sync iterable factory product lacks a callable advance operation"
                .to_string(),
        })?;
        return Ok(Resolved {
            handle: ResolvedHandle::Sync(handle),
            origin: Origin::FactorySync,
        });
    }
    if let Some(handle) = candidate.duck_next {
        return Ok(Resolved {
            handle: ResolvedHandle::Async(handle),
            origin: Origin::DuckTyped,
        });
    }
    Err(ResolveError::NotIterable)
}
