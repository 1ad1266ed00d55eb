//! Execution of a set of sibling fields.
use std::convert::Infallible;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use tracing::Instrument;

use crate::configuration::OperationKind;
use crate::context::ExecutionContext;
use crate::error::BoxError;
use crate::error::FieldError;
use crate::field_value::FieldValueInfo;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::outcome::Outcome;
use crate::outcome::Pending;
use crate::parallel::each_polymorphic;
use crate::results::assemble;
use crate::results::handle_results;
use crate::results::ExecutionResult;
use crate::sequential::each_sequentially;

/// A field selected by an operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub alias: Option<String>,

    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub arguments: Object,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The key of the field in the result: its alias if it has one, its name otherwise.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Computes the value of a field.
///
/// A returned `Err` is a synchronous failure of the field; the returned [`FieldValueInfo`] may
/// also carry a pending value that fails later.
#[cfg_attr(test, mockall::automock)]
pub trait FieldResolver: Send + Sync {
    fn resolve(&self, field: &Field, path: &Path) -> Result<FieldValueInfo, BoxError>;
}

/// How sibling fields are evaluated.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Every field is resolved before any value is awaited.
    Parallel,
    /// A field is only resolved once the value of the previous one is complete.
    Serial,
}

impl ExecutionStrategy {
    /// Executes `fields` under `path`, keyed by response key in declaration order.
    pub fn execute(
        self,
        context: &ExecutionContext,
        resolver: Arc<dyn FieldResolver>,
        fields: Vec<Field>,
        path: &Path,
    ) -> Pending<ExecutionResult> {
        let keys: Vec<String> = fields
            .iter()
            .map(|field| field.response_key().to_string())
            .collect();

        match self {
            ExecutionStrategy::Parallel => {
                let span = tracing::info_span!(
                    "parallel",
                    "otel.kind" = "INTERNAL",
                    "graphql.path" = %path
                );
                let values = span.in_scope(|| {
                    each_polymorphic(fields, |field| {
                        Ok::<_, Infallible>(resolve_field(
                            context,
                            resolver.as_ref(),
                            &field,
                            path,
                        ))
                    })
                });
                Pending::new(assemble(context, keys, values).instrument(span))
            }
            ExecutionStrategy::Serial => {
                let span = tracing::info_span!(
                    "sequence",
                    "otel.kind" = "INTERNAL",
                    "graphql.path" = %path
                );
                let values = span.in_scope(|| {
                    let context = context.clone();
                    let path = path.clone();
                    each_sequentially(fields, move |field, _: &[Value]| {
                        Ok::<_, Infallible>(resolve_field(
                            &context,
                            resolver.as_ref(),
                            &field,
                            &path,
                        ))
                    })
                });
                let context = context.clone();
                Pending::new(
                    async move { handle_results(&context, keys, values.await) }.instrument(span),
                )
            }
        }
    }
}

/// Executes the root fields of an operation with the strategy configured for its kind.
pub fn execute_operation(
    context: &ExecutionContext,
    kind: OperationKind,
    resolver: Arc<dyn FieldResolver>,
    fields: Vec<Field>,
) -> Pending<ExecutionResult> {
    let strategy = context.configuration().strategy_for(kind);
    tracing::trace!(?kind, ?strategy, fields = fields.len(), "executing operation");
    strategy.execute(context, resolver, fields, &Path::empty())
}

fn resolve_field(
    context: &ExecutionContext,
    resolver: &dyn FieldResolver,
    field: &Field,
    parent: &Path,
) -> Outcome<Value> {
    let path = parent.join(field.response_key());
    match resolver.resolve(field, &path) {
        Ok(info) => context.guard_field_value(&path, info.into_field_value()),
        Err(error) => match context.handle_field_error(&path, FieldError::capture(error)) {
            Ok(value) => Outcome::Ready(value),
            Err(error) => Outcome::Pending(Pending::failed(error)),
        },
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;
    use parking_lot::Mutex;
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;
    use crate::configuration::Configuration;
    use crate::configuration::FieldErrorPolicy;
    use crate::field_value::CompleteValueType;
    use crate::outcome::Completer;

    fn scalar(value: Value) -> FieldValueInfo {
        FieldValueInfo::new(CompleteValueType::Scalar, Outcome::Ready(value))
    }

    fn propagating() -> ExecutionContext {
        ExecutionContext::new(Arc::new(Configuration {
            field_errors: FieldErrorPolicy::Propagate,
            ..Default::default()
        }))
    }

    #[test(tokio::test)]
    async fn parallel_nulls_failing_fields() {
        let mut resolver = MockFieldResolver::new();
        resolver
            .expect_resolve()
            .times(3)
            .returning(|field, _| match field.name.as_str() {
                "hero" => Ok(scalar(json!("R2-D2"))),
                "villain" => Err("no villain".into()),
                _ => Ok(FieldValueInfo::new(
                    CompleteValueType::Scalar,
                    Outcome::Pending(Pending::failed(FieldError::new("timed out"))),
                )),
            });

        let context = ExecutionContext::default();
        let result = ExecutionStrategy::Parallel
            .execute(
                &context,
                Arc::new(resolver),
                vec![Field::new("hero"), Field::new("villain"), Field::new("droid")],
                &Path::empty(),
            )
            .await
            .unwrap();

        insta::assert_json_snapshot!(result.data, @r###"
        {
          "hero": "R2-D2",
          "villain": null,
          "droid": null
        }
        "###);
        let mut paths: Vec<_> = result
            .errors
            .iter()
            .map(|error| error.path.as_ref().unwrap().to_string())
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["/droid", "/villain"]);
    }

    #[test(tokio::test)]
    async fn parallel_propagates_failures() {
        let mut resolver = MockFieldResolver::new();
        resolver
            .expect_resolve()
            .returning(|field, _| match field.name.as_str() {
                "villain" => Err("no villain".into()),
                _ => Ok(scalar(json!(true))),
            });

        let error = ExecutionStrategy::Parallel
            .execute(
                &propagating(),
                Arc::new(resolver),
                vec![Field::new("hero"), Field::new("villain")],
                &Path::empty(),
            )
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "no villain");
        assert!(error.is_adapted());
    }

    #[test]
    fn aliases_are_response_keys() {
        let mut resolver = MockFieldResolver::new();
        resolver.expect_resolve().returning(|field, path| {
            assert_eq!(path.to_string(), format!("/hero/{}", field.response_key()));
            Ok(scalar(json!(field.name.clone())))
        });

        let result = ExecutionStrategy::Parallel
            .execute(
                &ExecutionContext::default(),
                Arc::new(resolver),
                vec![
                    Field::new("name").with_alias("first"),
                    Field::new("name").with_alias("second"),
                ],
                &Path::empty().join("hero"),
            )
            .now_or_never()
            .expect("every field is materialized")
            .unwrap();
        assert_eq!(
            Value::Object(result.data),
            json!({ "first": "name", "second": "name" })
        );
    }

    /// Resolves every field to a value completed by the test, logging the resolutions.
    #[derive(Default)]
    struct Deferred {
        resolved: Mutex<Vec<String>>,
        completers: Mutex<Vec<Completer<Value>>>,
    }

    impl FieldResolver for Deferred {
        fn resolve(&self, field: &Field, _path: &Path) -> Result<FieldValueInfo, BoxError> {
            self.resolved.lock().push(field.name.clone());
            let (completer, pending) = Pending::channel();
            self.completers.lock().push(completer);
            Ok(FieldValueInfo::new(
                CompleteValueType::Scalar,
                Outcome::Pending(pending),
            ))
        }
    }

    impl Deferred {
        fn complete_last(&self, value: Value) {
            let completer = self.completers.lock().pop().unwrap();
            completer.complete(value);
        }
    }

    #[test(tokio::test)]
    async fn serial_waits_for_the_previous_field() {
        let resolver = Arc::new(Deferred::default());
        let result = ExecutionStrategy::Serial.execute(
            &ExecutionContext::default(),
            resolver.clone(),
            vec![Field::new("createReview"), Field::new("deleteReview")],
            &Path::empty(),
        );
        let result = tokio::spawn(result);

        tokio::task::yield_now().await;
        assert_eq!(*resolver.resolved.lock(), vec!["createReview"]);
        resolver.complete_last(json!(1));

        while resolver.resolved.lock().len() < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            *resolver.resolved.lock(),
            vec!["createReview", "deleteReview"]
        );
        resolver.complete_last(json!(2));

        let result = result.await.unwrap().unwrap();
        assert_eq!(
            Value::Object(result.data),
            json!({ "createReview": 1, "deleteReview": 2 })
        );
    }

    #[test(tokio::test)]
    async fn serial_stops_at_the_first_propagated_failure() {
        let mut resolver = MockFieldResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_, _| Err("rejected".into()));

        let error = ExecutionStrategy::Serial
            .execute(
                &propagating(),
                Arc::new(resolver),
                vec![Field::new("first"), Field::new("never")],
                &Path::empty(),
            )
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "rejected");
    }

    #[test(tokio::test)]
    async fn operation_kind_selects_the_strategy() {
        let mut sequence = mockall::Sequence::new();
        let mut resolver = MockFieldResolver::new();
        for (name, value) in [("first", 1), ("second", 2)] {
            resolver
                .expect_resolve()
                .withf(move |field, _| field.name == name)
                .times(1)
                .in_sequence(&mut sequence)
                .returning(move |_, _| {
                    Ok(FieldValueInfo::new(
                        CompleteValueType::Scalar,
                        Outcome::Pending(Pending::ready(json!(value))),
                    ))
                });
        }

        let result = execute_operation(
            &ExecutionContext::default(),
            OperationKind::Mutation,
            Arc::new(resolver),
            vec![Field::new("first"), Field::new("second")],
        )
        .await
        .unwrap();
        assert_eq!(
            Value::Object(result.data),
            json!({ "first": 1, "second": 2 })
        );
    }
}
