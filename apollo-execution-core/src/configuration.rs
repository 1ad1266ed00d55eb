//! Execution configuration.
//!
//! Read from YAML:
//!
//! ```yaml
//! field_errors: propagate
//! query: parallel
//! mutation: serial
//! ```
use std::str::FromStr;

use schemars::gen::SchemaSettings;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigurationError;
use crate::strategy::ExecutionStrategy;

/// What a failing field does to the object it belongs to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorPolicy {
    /// Record the error with the path of the field and complete the field as `null`.
    #[default]
    Null,
    /// Fail the enclosing object.
    Propagate,
}

/// The kind of operation being executed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// The execution configuration.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// How field failures are handled.
    pub field_errors: FieldErrorPolicy,

    /// Strategy for the root fields of queries.
    pub query: ExecutionStrategy,

    /// Strategy for the root fields of mutations.
    pub mutation: ExecutionStrategy,

    /// Strategy for the root fields of subscriptions.
    pub subscription: ExecutionStrategy,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            field_errors: FieldErrorPolicy::default(),
            query: ExecutionStrategy::Parallel,
            mutation: ExecutionStrategy::Serial,
            subscription: ExecutionStrategy::Parallel,
        }
    }
}

impl Configuration {
    /// The strategy used for the root fields of an operation.
    pub fn strategy_for(&self, kind: OperationKind) -> ExecutionStrategy {
        match kind {
            OperationKind::Query => self.query,
            OperationKind::Mutation => self.mutation,
            OperationKind::Subscription => self.subscription,
        }
    }

    /// The JSON schema of the configuration.
    pub fn json_schema() -> RootSchema {
        let settings = SchemaSettings::draft07().with(|s| {
            s.option_nullable = true;
            s.option_add_null_type = false;
            s.inline_subschemas = true;
        });
        settings.into_generator().into_root_schema_for::<Configuration>()
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let configuration: Configuration = serde_yaml::from_str(s)?;
        tracing::debug!(?configuration, "loaded execution configuration");
        Ok(configuration)
    }
}
