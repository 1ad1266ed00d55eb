use std::convert::Infallible;

use serde::Deserialize;
use serde::Serialize;

use crate::json_ext::Value;
use crate::outcome::Outcome;
use crate::outcome::Pending;
use crate::parallel::each_polymorphic;
use crate::results::object_from;

/// The shape of a completed field value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompleteValueType {
    Object,
    List,
    Null,
    Scalar,
    Enum,
}

impl CompleteValueType {
    /// Leaf shapes never have children.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            CompleteValueType::Null | CompleteValueType::Scalar | CompleteValueType::Enum
        )
    }
}

/// A node of the result tree: the completed value of one field, classified by shape.
///
/// Object and list nodes hold their children in declaration order (or list element order);
/// leaf nodes have none.
#[derive(Debug)]
pub struct FieldValueInfo {
    complete_value_type: CompleteValueType,
    field_value: Outcome<Value>,
    field_value_infos: Vec<FieldValueInfo>,
}

impl FieldValueInfo {
    pub fn new(complete_value_type: CompleteValueType, field_value: Outcome<Value>) -> Self {
        Self::with_field_value_infos(complete_value_type, field_value, Vec::new())
    }

    /// Creates a node with children.
    ///
    /// # Panics
    ///
    /// If a leaf shape is given children.
    pub fn with_field_value_infos(
        complete_value_type: CompleteValueType,
        field_value: Outcome<Value>,
        field_value_infos: Vec<FieldValueInfo>,
    ) -> Self {
        assert!(
            !complete_value_type.is_leaf() || field_value_infos.is_empty(),
            "a {complete_value_type:?} value can't have children"
        );
        Self {
            complete_value_type,
            field_value,
            field_value_infos,
        }
    }

    pub fn null() -> Self {
        Self::new(CompleteValueType::Null, Outcome::Ready(Value::Null))
    }

    /// A list node whose value is the ordered list of its items' values.
    ///
    /// Each item keeps its own handle on its value; the list value stays materialized when every
    /// item value is.
    pub fn list(items: Vec<FieldValueInfo>) -> Self {
        let mut children = Vec::with_capacity(items.len());
        let values = each_polymorphic(items, |item| {
            let (own, combined) = split(item.field_value);
            children.push(FieldValueInfo {
                field_value: own,
                ..item
            });
            Ok::<_, Infallible>(combined)
        });
        Self::with_field_value_infos(
            CompleteValueType::List,
            values.map(Value::Array),
            children,
        )
    }

    /// An object node whose value maps each response key to its field's value, in the order the
    /// fields are given.
    pub fn object(fields: Vec<(String, FieldValueInfo)>) -> Self {
        let (keys, fields): (Vec<String>, Vec<FieldValueInfo>) = fields.into_iter().unzip();
        let mut children = Vec::with_capacity(fields.len());
        let values = each_polymorphic(fields, |field| {
            let (own, combined) = split(field.field_value);
            children.push(FieldValueInfo {
                field_value: own,
                ..field
            });
            Ok::<_, Infallible>(combined)
        });
        Self::with_field_value_infos(
            CompleteValueType::Object,
            values.map(move |values| Value::Object(object_from(keys, values))),
            children,
        )
    }

    pub fn complete_value_type(&self) -> CompleteValueType {
        self.complete_value_type
    }

    pub fn field_value(&self) -> &Outcome<Value> {
        &self.field_value
    }

    pub fn field_value_infos(&self) -> &[FieldValueInfo] {
        &self.field_value_infos
    }

    pub fn into_field_value(self) -> Outcome<Value> {
        self.field_value
    }

    /// The value as a pending computation, whatever its representation.
    pub fn into_field_value_pending(self) -> Pending<Value> {
        self.field_value.into_pending()
    }

    pub fn into_parts(self) -> (Pending<Value>, Vec<FieldValueInfo>) {
        (self.field_value.into_pending(), self.field_value_infos)
    }
}

/// Combines the values of `field_value_infos`, in order.
pub fn resolve_field_values(field_value_infos: Vec<FieldValueInfo>) -> Outcome<Vec<Value>> {
    each_polymorphic(field_value_infos, |info| {
        Ok::<_, Infallible>(info.into_field_value())
    })
}

fn split(outcome: Outcome<Value>) -> (Outcome<Value>, Outcome<Value>) {
    match outcome {
        Outcome::Ready(value) => (Outcome::Ready(value.clone()), Outcome::Ready(value)),
        Outcome::Pending(pending) => {
            let shared = pending.shared();
            (
                Outcome::Pending(Pending::new(shared.clone())),
                Outcome::Pending(Pending::new(shared)),
            )
        }
    }
}
