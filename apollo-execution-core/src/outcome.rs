use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use derivative::Derivative;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::future::Shared;
use futures::prelude::*;

use crate::error::ExecutionError;
use crate::error::FieldError;

/// A cloneable handle delivering the same value or failure to every continuation awaiting it.
pub type SharedPending<T> = Shared<BoxFuture<'static, Result<T, FieldError>>>;

/// A single-assignment handle to a result that is not known yet.
///
/// Resolves exactly once to either a value or a [`FieldError`]. Dropping the handle only detaches
/// this observer: work driven elsewhere (a spawned task, a [`Completer`]) keeps running.
#[derive(Derivative)]
#[derivative(Debug)]
#[must_use = "pending computations do nothing unless awaited"]
pub struct Pending<T> {
    #[derivative(Debug = "ignore")]
    inner: BoxFuture<'static, Result<T, FieldError>>,
}

impl<T> Pending<T>
where
    T: Send + 'static,
{
    /// Adapts a future to a pending computation.
    pub fn new<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<FieldError> + 'static,
    {
        Self {
            inner: future.map_err(Into::into).boxed(),
        }
    }

    /// An already resolved pending computation.
    pub fn ready(value: T) -> Self {
        Self {
            inner: future::ready(Ok(value)).boxed(),
        }
    }

    /// An already failed pending computation.
    pub fn failed(error: impl Into<FieldError>) -> Self {
        Self {
            inner: future::ready(Err(error.into())).boxed(),
        }
    }

    /// Creates a pending computation completed through the returned [`Completer`].
    pub fn channel() -> (Completer<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        let pending = Self::new(async move {
            match receiver.await {
                Ok(result) => result,
                Err(oneshot::Canceled) => Err(FieldError::from(ExecutionError::Abandoned)),
            }
        });
        (Completer { sender }, pending)
    }

    pub fn map<U, F>(self, f: F) -> Pending<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Pending {
            inner: self.inner.map_ok(f).boxed(),
        }
    }

    /// Chains another pending computation on the value of this one.
    pub fn and_then<U, F>(self, f: F) -> Pending<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Pending<U> + Send + 'static,
    {
        Pending {
            inner: self.inner.and_then(f).boxed(),
        }
    }

    /// Turns this computation into a handle that can be awaited by several continuations.
    pub fn shared(self) -> SharedPending<T>
    where
        T: Clone + Sync,
    {
        self.inner.shared()
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, FieldError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

/// The write side of a [`Pending::channel`].
///
/// Completing consumes the completer, a pending computation can only be assigned once.
#[derive(Debug)]
pub struct Completer<T> {
    sender: oneshot::Sender<Result<T, FieldError>>,
}

impl<T> Completer<T> {
    pub fn complete(self, value: T) {
        // the pending side may have been dropped, nobody is waiting for the value then
        let _ = self.sender.send(Ok(value));
    }

    pub fn fail(self, error: impl Into<FieldError>) {
        let _ = self.sender.send(Err(error.into()));
    }

    /// Whether the pending side was dropped.
    pub fn is_canceled(&self) -> bool {
        self.sender.is_canceled()
    }
}

/// Either a materialized value or a pending computation of one.
///
/// Every slot, step result and field value handled by this crate is an `Outcome`: values that
/// are known right away never go through a suspension point.
pub enum Outcome<T> {
    Ready(T),
    Pending(Pending<T>),
}

impl<T> Outcome<T>
where
    T: Send + 'static,
{
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending(_))
    }

    /// Returns the materialized value, if any.
    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(value) => Some(value),
            Outcome::Pending(_) => None,
        }
    }

    /// Applies `f` to the value. Materialized outcomes stay materialized.
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Outcome::Ready(value) => Outcome::Ready(f(value)),
            Outcome::Pending(pending) => Outcome::Pending(pending.map(f)),
        }
    }

    pub fn into_pending(self) -> Pending<T> {
        match self {
            Outcome::Ready(value) => Pending::ready(value),
            Outcome::Pending(pending) => pending,
        }
    }
}

impl<T> From<Pending<T>> for Outcome<T> {
    fn from(pending: Pending<T>) -> Self {
        Outcome::Pending(pending)
    }
}

impl<T> std::fmt::Debug for Outcome<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Outcome::Pending(_) => f.write_str("Pending"),
        }
    }
}
