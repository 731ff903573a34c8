//! Protobuf values to GraphQL values
//!
//! The output side of the translation: how a populated message looks once
//! serialized by the schema. Field names are camel-cased, only set fields are
//! emitted, enums appear by name, bytes as standard base64 and map fields as
//! lists of `{key, value}` entries sorted by key. The input converter accepts
//! exactly this shape back.

use crate::error::{Error, Result};
use crate::naming;
use async_graphql::indexmap::IndexMap;
use async_graphql::{Name, Number, Value};
use base64::Engine as _;
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MapKey};

/// Convert a message into its GraphQL output object.
pub fn message_to_value(message: &DynamicMessage) -> Result<Value> {
    let mut map = IndexMap::new();
    for (field, value) in message.fields() {
        let name = Name::new(naming::to_camel_case(field.name()));
        map.insert(name, field_to_value(&field, value)?);
    }
    Ok(Value::Object(map))
}

/// Convert the value of `field`, honouring its cardinality.
pub fn field_to_value(field: &FieldDescriptor, value: &prost_reflect::Value) -> Result<Value> {
    match value {
        prost_reflect::Value::Map(entries) => {
            let entry_descriptor = field
                .kind()
                .as_message()
                .cloned()
                .ok_or_else(|| Error::Schema(format!("map field '{}' without entry type", field.full_name())))?;
            let value_kind = entry_descriptor.map_entry_value_field().kind();

            let mut sorted: Vec<(&MapKey, &prost_reflect::Value)> = entries.iter().collect();
            sorted.sort_by_key(|(key, _)| map_key_to_string(key));

            let mut list = Vec::with_capacity(sorted.len());
            for (key, value) in sorted {
                let mut entry = IndexMap::new();
                entry.insert(Name::new("key"), map_key_to_value(key));
                entry.insert(Name::new("value"), prost_value_to_graphql(value, &value_kind)?);
                list.push(Value::Object(entry));
            }
            Ok(Value::List(list))
        }
        other => prost_value_to_graphql(other, &field.kind()),
    }
}

/// Convert a single value of the given kind (lists element-wise).
pub fn prost_value_to_graphql(value: &prost_reflect::Value, kind: &Kind) -> Result<Value> {
    Ok(match value {
        prost_reflect::Value::Bool(b) => Value::Boolean(*b),
        prost_reflect::Value::I32(n) => Value::Number(Number::from(*n)),
        prost_reflect::Value::I64(n) => Value::Number(Number::from(*n)),
        prost_reflect::Value::U32(n) => Value::Number(Number::from(*n)),
        prost_reflect::Value::U64(n) => Value::Number(Number::from(*n)),
        prost_reflect::Value::F32(n) => float_value(f64::from(*n)),
        prost_reflect::Value::F64(n) => float_value(*n),
        prost_reflect::Value::String(s) => Value::String(s.clone()),
        prost_reflect::Value::Bytes(b) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
        prost_reflect::Value::EnumNumber(number) => {
            let Kind::Enum(enum_descriptor) = kind else {
                return Err(Error::Schema(format!(
                    "enum number {} for non-enum kind {:?}",
                    number, kind
                )));
            };
            let enum_value = enum_descriptor.get_value(*number).ok_or_else(|| {
                Error::UnknownEnumValue {
                    enum_name: naming::enum_reference_name(enum_descriptor),
                    value: number.to_string(),
                }
            })?;
            Value::Enum(Name::new(enum_value.name()))
        }
        prost_reflect::Value::Message(message) => message_to_value(message)?,
        prost_reflect::Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| prost_value_to_graphql(item, kind))
                .collect::<Result<Vec<_>>>()?,
        ),
        prost_reflect::Value::Map(_) => {
            return Err(Error::Schema(
                "map values must be converted through their field".to_string(),
            ))
        }
    })
}

// NaN and infinities have no JSON representation
fn float_value(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

pub(crate) fn map_key_to_string(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::I32(n) => n.to_string(),
        MapKey::I64(n) => n.to_string(),
        MapKey::U32(n) => n.to_string(),
        MapKey::U64(n) => n.to_string(),
        MapKey::String(s) => s.clone(),
    }
}

fn map_key_to_value(key: &MapKey) -> Value {
    match key {
        MapKey::Bool(b) => Value::Boolean(*b),
        MapKey::I32(n) => Value::Number(Number::from(*n)),
        MapKey::I64(n) => Value::Number(Number::from(*n)),
        MapKey::U32(n) => Value::Number(Number::from(*n)),
        MapKey::U64(n) => Value::Number(Number::from(*n)),
        MapKey::String(s) => Value::String(s.clone()),
    }
}

/// Scalar rendering used for relay ids.
pub(crate) fn scalar_to_string(value: &prost_reflect::Value) -> Option<String> {
    match value {
        prost_reflect::Value::String(s) => Some(s.clone()),
        prost_reflect::Value::I32(n) => Some(n.to_string()),
        prost_reflect::Value::I64(n) => Some(n.to_string()),
        prost_reflect::Value::U32(n) => Some(n.to_string()),
        prost_reflect::Value::U64(n) => Some(n.to_string()),
        prost_reflect::Value::Bool(b) => Some(b.to_string()),
        prost_reflect::Value::Bytes(b) => {
            Some(base64::engine::general_purpose::STANDARD.encode(b))
        }
        _ => None,
    }
}
