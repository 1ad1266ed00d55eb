//! Normalization of producer outputs into [`Outcome`]s and [`Pending`] computations.
//!
//! Producers report failures either synchronously (an `Err` returned while producing) or
//! asynchronously (a failed pending computation). The helpers here fold both into the single
//! failure channel of [`Pending`].

use std::future::Future;

use crate::error::BoxError;
use crate::error::FieldError;
use crate::outcome::Outcome;
use crate::outcome::Pending;

/// Turns a value into a pending computation.
///
/// Pending computations are returned as they are, materialized values are wrapped in an already
/// resolved computation.
pub fn to_pending<T, V>(value: V) -> Pending<T>
where
    T: Send + 'static,
    V: Into<Outcome<T>>,
{
    value.into().into_pending()
}

/// Turns a value into an [`Outcome`], leaving materialized values alone.
pub fn to_outcome<T, V>(value: V) -> Outcome<T>
where
    V: Into<Outcome<T>>,
{
    value.into()
}

/// Adapts any asynchronous handle, such as a spawned task or a channel receiver, to a pending
/// computation.
pub fn from_future<T, E, F>(future: F) -> Pending<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    Pending::new(async move { future.await.map_err(|error| FieldError::from(error.into())) })
}

/// Invokes `supplier`, turning a synchronous failure into an already failed computation.
pub fn guard<T, E, F>(supplier: F) -> Pending<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<Pending<T>, E>,
    E: Into<BoxError>,
{
    match supplier() {
        Ok(pending) => pending,
        Err(error) => Pending::failed(FieldError::from(error.into())),
    }
}

/// An already failed pending computation.
pub fn failed<T>(error: impl Into<FieldError>) -> Pending<T>
where
    T: Send + 'static,
{
    Pending::failed(error)
}
