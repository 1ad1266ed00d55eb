//! Assembly of resolved field values into the final result.
use serde::Deserialize;
use serde::Serialize;
use typed_builder::TypedBuilder;

use crate::context::ExecutionContext;
use crate::error::Error;
use crate::error::FieldError;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::outcome::Outcome;
use crate::outcome::Pending;

/// The result of executing a set of fields: data keyed by response key, in declaration order,
/// along with the errors recorded while completing them.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(setter(into)))]
pub struct ExecutionResult {
    /// The result data.
    #[builder(default)]
    pub data: Object,

    /// The errors recorded by the execution.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    #[builder(default)]
    pub errors: Vec<Error>,
}

/// Pairs `values[i]` with `keys[i]`, keeping the first value of a repeated key.
///
/// # Panics
///
/// If there are not as many keys as values.
pub(crate) fn object_from(keys: Vec<String>, values: Vec<Value>) -> Object {
    assert_eq!(
        keys.len(),
        values.len(),
        "expected as many response keys as field values"
    );
    let mut object = Object::new();
    for (key, value) in keys.into_iter().zip(values) {
        object.entry(key).or_insert(value);
    }
    object
}

/// Builds the result of an object from its resolved field values.
///
/// A failure fails the whole object: nothing is assembled from the values resolved before it.
pub fn handle_results(
    context: &ExecutionContext,
    field_names: Vec<String>,
    results: Result<Vec<Value>, FieldError>,
) -> Result<ExecutionResult, FieldError> {
    match results {
        Ok(values) => Ok(ExecutionResult {
            data: object_from(field_names, values),
            errors: context.errors(),
        }),
        Err(error) => {
            tracing::debug!(%error, "field execution failed");
            Err(error)
        }
    }
}

/// Waits for the field values, then assembles them with [`handle_results`].
pub fn assemble(
    context: &ExecutionContext,
    field_names: Vec<String>,
    values: Outcome<Vec<Value>>,
) -> Pending<ExecutionResult> {
    match values {
        Outcome::Ready(values) => match handle_results(context, field_names, Ok(values)) {
            Ok(result) => Pending::ready(result),
            Err(error) => Pending::failed(error),
        },
        Outcome::Pending(values) => {
            let context = context.clone();
            Pending::new(async move { handle_results(&context, field_names, values.await) })
        }
    }
}
