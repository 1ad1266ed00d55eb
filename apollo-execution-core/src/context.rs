//! Provide the [`ExecutionContext`] shared by every field of an execution.
//!
//! The context owns the error collector that independently completing fields append to, and the
//! [`Configuration`] of the execution.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::configuration::Configuration;
use crate::configuration::FieldErrorPolicy;
use crate::error::Error;
use crate::error::FieldError;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::outcome::Outcome;
use crate::outcome::Pending;

/// Collects the errors recorded by an execution.
///
/// Appends may come from any number of concurrently completing fields, in any order.
pub trait ErrorCollector: Send + Sync + Debug {
    fn add_error(&self, error: Error);

    /// The errors recorded so far.
    fn errors(&self) -> Vec<Error>;
}

/// An [`ErrorCollector`] backed by a shared vector.
#[derive(Clone, Debug, Default)]
pub struct SharedErrors {
    errors: Arc<Mutex<Vec<Error>>>,
}

impl ErrorCollector for SharedErrors {
    fn add_error(&self, error: Error) {
        self.errors.lock().push(error);
    }

    fn errors(&self) -> Vec<Error> {
        self.errors.lock().clone()
    }
}

/// State shared by all the fields of one execution.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    errors: Arc<dyn ErrorCollector>,
    configuration: Arc<Configuration>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Arc::new(Configuration::default()))
    }
}

impl ExecutionContext {
    pub fn new(configuration: Arc<Configuration>) -> Self {
        Self::with_collector(configuration, Arc::new(SharedErrors::default()))
    }

    pub fn with_collector(
        configuration: Arc<Configuration>,
        errors: Arc<dyn ErrorCollector>,
    ) -> Self {
        Self {
            errors,
            configuration,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn add_error(&self, error: Error) {
        self.errors.add_error(error);
    }

    pub fn errors(&self) -> Vec<Error> {
        self.errors.errors()
    }

    /// Applies the configured [`FieldErrorPolicy`] to the failure of the field at `path`.
    ///
    /// Returns `Ok(Value::Null)` when the failure was recorded, or the failure itself when it
    /// must fail the enclosing object.
    pub fn handle_field_error(&self, path: &Path, error: FieldError) -> Result<Value, FieldError> {
        match self.configuration.field_errors {
            FieldErrorPolicy::Null => {
                failfast_debug!("field {} failed: {}", path, error);
                self.add_error(error.to_graphql_error(Some(path.clone())));
                Ok(Value::Null)
            }
            FieldErrorPolicy::Propagate => {
                tracing::debug!(path = %path, %error, "propagating field error");
                Err(error)
            }
        }
    }

    /// Applies the field error policy to a failure delivered by the value of the field at `path`.
    pub fn guard_field_value(&self, path: &Path, value: Outcome<Value>) -> Outcome<Value> {
        match value {
            Outcome::Ready(value) => Outcome::Ready(value),
            Outcome::Pending(pending) => {
                let context = self.clone();
                let path = path.clone();
                Outcome::Pending(Pending::new(async move {
                    match pending.await {
                        Ok(value) => Ok(value),
                        Err(error) => context.handle_field_error(&path, error),
                    }
                }))
            }
        }
    }
}
