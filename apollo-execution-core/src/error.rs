//! Execution errors.
use std::fmt;
use std::sync::Arc;

use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::json_ext::Object;
use crate::json_ext::Path;

/// A type-erased error, as returned by field resolvers and step functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Trait providing the GraphQL error code of an error.
pub trait ErrorExtension
where
    Self: Sized,
{
    fn extension_code(&self) -> String;
}

/// The failure delivered by a [`Pending`](crate::Pending) computation.
///
/// A failure raised synchronously by a producer is captured at the combinator boundary and
/// marked as adapted. Adapting is done at most once: an adapted failure keeps its identity while
/// it travels through nested combinators.
#[derive(Clone)]
pub struct FieldError {
    source: Arc<dyn std::error::Error + Send + Sync>,
    adapted: bool,
}

impl FieldError {
    /// Wraps a producer error without marking it as adapted.
    ///
    /// A boxed [`FieldError`] is unwrapped and returned as it is, marker included.
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self::from(error.into())
    }

    /// Captures a synchronous producer failure.
    ///
    /// Failures which already carry the adapted marker are returned unchanged.
    pub fn capture(error: impl Into<BoxError>) -> Self {
        Self::from(error.into()).adapt()
    }

    pub(crate) fn adapt(self) -> Self {
        if self.adapted {
            return self;
        }
        Self {
            adapted: true,
            ..self
        }
    }

    /// Whether this failure was captured from a synchronous producer failure.
    pub fn is_adapted(&self) -> bool {
        self.adapted
    }

    /// The producer error wrapped by this failure.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.source
    }

    /// Convert the failure to a GraphQL error located at `path`.
    pub fn to_graphql_error(&self, path: Option<Path>) -> Error {
        let mut extensions = Object::new();
        extensions.insert("code", self.extension_code().into());
        Error {
            message: self.to_string(),
            locations: Default::default(),
            path,
            extensions,
        }
    }
}

impl From<BoxError> for FieldError {
    fn from(error: BoxError) -> Self {
        match error.downcast::<FieldError>() {
            Ok(field_error) => *field_error,
            Err(error) => Self {
                source: Arc::from(error),
                adapted: false,
            },
        }
    }
}

impl From<ExecutionError> for FieldError {
    fn from(error: ExecutionError) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldError")
            .field("source", &self.source)
            .field("adapted", &self.adapted)
            .finish()
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl std::error::Error for FieldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

impl ErrorExtension for FieldError {
    fn extension_code(&self) -> String {
        match self.source.downcast_ref::<ExecutionError>() {
            Some(error) => error.extension_code(),
            None => "FIELD_RESOLUTION_ERROR".to_string(),
        }
    }
}

/// Error types raised by the execution core itself.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum ExecutionError {
    /// pending computation was dropped before it was completed
    Abandoned,
}

impl ErrorExtension for ExecutionError {
    fn extension_code(&self) -> String {
        match self {
            ExecutionError::Abandoned => "EXECUTION_ABANDONED",
        }
        .to_string()
    }
}

/// Error types for configuration.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not parse configuration: {0}
    InvalidConfiguration(#[from] serde_yaml::Error),
}

/// A [GraphQL error](https://spec.graphql.org/October2021/#sec-Errors)
/// as may be found in the `errors` field of an [`ExecutionResult`](crate::ExecutionResult).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Error {
    /// The error message.
    pub message: String,

    /// The locations of the error in the GraphQL document of the originating request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// If this is a field error, the path to that field in the result data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,

    /// The optional GraphQL extensions for this error.
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

/// The error location
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// The line number
    pub line: u32,
    /// The column number
    pub column: u32,
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn capture_marks_once() {
        let error = FieldError::capture("boom");
        assert!(error.is_adapted());
        assert_eq!(error.to_string(), "boom");

        // capturing a boxed adapted failure neither nests nor re-wraps it
        let boxed: BoxError = Box::new(error.clone());
        let recaptured = FieldError::capture(boxed);
        assert!(recaptured.is_adapted());
        assert!(Arc::ptr_eq(&recaptured.source, &error.source));
    }

    #[test]
    fn new_is_not_adapted() {
        let error = FieldError::new("boom");
        assert!(!error.is_adapted());
        assert!(error.clone().adapt().is_adapted());
    }

    #[test]
    fn new_keeps_the_marker_of_a_boxed_failure() {
        let boxed: BoxError = Box::new(FieldError::capture("boom"));
        let error = FieldError::new(boxed);
        assert!(error.is_adapted());
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn boxed_field_error_is_unwrapped() {
        let error = FieldError::new("inner");
        let boxed: BoxError = Box::new(error.clone());
        let converted = FieldError::from(boxed);
        assert!(!converted.is_adapted());
        assert!(Arc::ptr_eq(&converted.source, &error.source));
    }

    #[test]
    fn graphql_error_conversion() {
        let error = FieldError::new("could not fetch name");
        let path = Path::empty().join("hero").join("name");
        let graphql_error = error.to_graphql_error(Some(path.clone()));
        assert_eq!(graphql_error.message, "could not fetch name");
        assert_eq!(graphql_error.path, Some(path));
        assert_eq!(
            graphql_error.extensions.get("code"),
            Some(&json!("FIELD_RESOLUTION_ERROR"))
        );

        let abandoned = FieldError::from(ExecutionError::Abandoned).to_graphql_error(None);
        assert_eq!(
            abandoned.extensions.get("code"),
            Some(&json!("EXECUTION_ABANDONED"))
        );
    }
}
