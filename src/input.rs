//! GraphQL input values to protobuf messages
//!
//! [`InputConverter::input_type`] builds the input object mirroring a
//! message; [`create_message`] and [`fill_message`] turn an argument object of
//! that shape back into a [`DynamicMessage`].
//!
//! Conversion rules:
//! - integers accept GraphQL numbers or numeric strings (`Long` values often
//!   travel as strings), bytes accept standard base64 strings
//! - enums are looked up by name, case-sensitively
//! - repeated fields take a list; a single value is treated as a one-element
//!   list, matching GraphQL input coercion
//! - `null` leaves the field unset, absent fields keep their defaults
//! - keys that name no field of the message are rejected, except the
//!   placeholder `_` of empty messages

use crate::config::SchemaOptions;
use crate::error::{Error, Result};
use crate::naming::{self, PLACEHOLDER_FIELD};
use crate::translate::ScalarMapping;
use crate::types::{InputObjectType, InputValueDefinition, TypeExpr};
use async_graphql::indexmap::IndexMap;
use async_graphql::{Name, Value};
use base64::Engine as _;
use prost::bytes::Bytes;
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MapKey, MessageDescriptor, ReflectMessage};
use std::collections::HashMap;

/// Builds input object types from message descriptors
#[derive(Debug, Clone, Copy)]
pub struct InputConverter<'a> {
    options: &'a SchemaOptions,
}

impl<'a> InputConverter<'a> {
    pub fn new(options: &'a SchemaOptions) -> Self {
        Self { options }
    }

    /// Input object mirroring the object type of `descriptor`.
    pub fn input_type(&self, descriptor: &MessageDescriptor) -> InputObjectType {
        let mapping = ScalarMapping::new(self.options.use_proto_scalar_types);
        let mut fields: Vec<InputValueDefinition> = descriptor
            .fields()
            .map(|field| {
                let mut input = InputValueDefinition::new(
                    naming::to_camel_case(field.name()),
                    self.field_type(&field, &mapping),
                );
                if let Some(comment) = self.options.comments.get(field.full_name()) {
                    input = input.description(comment);
                }
                input
            })
            .collect();

        if fields.is_empty() {
            fields.push(
                InputValueDefinition::new(PLACEHOLDER_FIELD, TypeExpr::named("String"))
                    .default_value("")
                    .description("Placeholder for a message without fields"),
            );
        }

        InputObjectType {
            name: naming::input_reference_name(descriptor),
            description: self
                .options
                .comments
                .get(descriptor.full_name())
                .map(String::from),
            fields,
        }
    }

    fn field_type(&self, field: &FieldDescriptor, mapping: &ScalarMapping) -> TypeExpr {
        let element = match field.kind() {
            Kind::Message(message) => TypeExpr::named(naming::input_reference_name(&message)),
            kind => TypeExpr::named(mapping.type_name(&kind).into_owned()),
        };
        if field.is_list() || field.is_map() {
            TypeExpr::list(element)
        } else {
            element
        }
    }

    /// Argument of input type `descriptor`.
    pub fn argument(name: &str, descriptor: &MessageDescriptor) -> InputValueDefinition {
        InputValueDefinition::new(name, TypeExpr::named(naming::input_reference_name(descriptor)))
    }
}

/// Build a message of type `descriptor` from an input object.
pub fn create_message(
    descriptor: &MessageDescriptor,
    input: &IndexMap<Name, Value>,
) -> Result<DynamicMessage> {
    let mut message = DynamicMessage::new(descriptor.clone());
    fill_message(&mut message, input)?;
    Ok(message)
}

/// Set the fields of `message` named by `input`.
pub fn fill_message(message: &mut DynamicMessage, input: &IndexMap<Name, Value>) -> Result<()> {
    let descriptor = message.descriptor();
    let fields: HashMap<String, FieldDescriptor> = descriptor
        .fields()
        .map(|field| (naming::to_camel_case(field.name()), field))
        .collect();

    let unknown: Vec<&str> = input
        .keys()
        .map(Name::as_str)
        .filter(|key| *key != PLACEHOLDER_FIELD && !fields.contains_key(*key))
        .collect();
    if !unknown.is_empty() {
        return Err(Error::InvalidRequest(format!(
            "unknown fields [{}] for input '{}'",
            unknown.join(", "),
            naming::input_reference_name(&descriptor)
        )));
    }

    for field in descriptor.fields() {
        let key = naming::to_camel_case(field.name());
        let Some(value) = input.get(key.as_str()) else {
            continue;
        };
        if matches!(value, Value::Null) {
            continue;
        }
        let converted = convert_field(&field, value)?;
        message
            .try_set_field(&field, converted)
            .map_err(|e| Error::InvalidRequest(format!("field '{}': {}", key, e)))?;
    }
    Ok(())
}

fn convert_field(field: &FieldDescriptor, value: &Value) -> Result<prost_reflect::Value> {
    if field.is_map() {
        return convert_map(field, value);
    }
    if field.is_list() {
        let items: Vec<&Value> = match value {
            Value::List(items) => items.iter().collect(),
            single => vec![single],
        };
        let converted = items
            .into_iter()
            .map(|item| {
                if matches!(item, Value::Null) {
                    return Err(Error::InvalidRequest(format!(
                        "null element in list field '{}'",
                        field.name()
                    )));
                }
                convert_value(&field.kind(), item, field.name())
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(prost_reflect::Value::List(converted));
    }
    convert_value(&field.kind(), value, field.name())
}

fn convert_map(field: &FieldDescriptor, value: &Value) -> Result<prost_reflect::Value> {
    let Kind::Message(entry_descriptor) = field.kind() else {
        return Err(Error::Schema(format!(
            "map field '{}' without entry type",
            field.full_name()
        )));
    };
    let key_field = entry_descriptor.map_entry_key_field();
    let value_field = entry_descriptor.map_entry_value_field();

    let entries: Vec<&Value> = match value {
        Value::List(items) => items.iter().collect(),
        single => vec![single],
    };
    let mut map = HashMap::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(object) = entry else {
            return Err(Error::InvalidRequest(format!(
                "map field '{}' expects {{key, value}} objects",
                field.name()
            )));
        };
        let entry_message = create_message(&entry_descriptor, object)?;
        let key = to_map_key(entry_message.get_field(&key_field).into_owned()).ok_or_else(|| {
            Error::InvalidRequest(format!("invalid key for map field '{}'", field.name()))
        })?;
        map.insert(key, entry_message.get_field(&value_field).into_owned());
    }
    Ok(prost_reflect::Value::Map(map))
}

fn to_map_key(value: prost_reflect::Value) -> Option<MapKey> {
    match value {
        prost_reflect::Value::Bool(b) => Some(MapKey::Bool(b)),
        prost_reflect::Value::I32(n) => Some(MapKey::I32(n)),
        prost_reflect::Value::I64(n) => Some(MapKey::I64(n)),
        prost_reflect::Value::U32(n) => Some(MapKey::U32(n)),
        prost_reflect::Value::U64(n) => Some(MapKey::U64(n)),
        prost_reflect::Value::String(s) => Some(MapKey::String(s)),
        _ => None,
    }
}

/// Convert one (non-repeated) value of `kind`.
pub(crate) fn convert_value(kind: &Kind, value: &Value, field_name: &str) -> Result<prost_reflect::Value> {
    let mismatch = || {
        Error::InvalidRequest(format!(
            "invalid value {} for field '{}' of type {}",
            value,
            field_name,
            kind_name(kind)
        ))
    };

    Ok(match kind {
        Kind::Bool => match value {
            Value::Boolean(b) => prost_reflect::Value::Bool(*b),
            _ => return Err(mismatch()),
        },
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            let n = integer(value).ok_or_else(mismatch)?;
            prost_reflect::Value::I32(i32::try_from(n).map_err(|_| mismatch())?)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            prost_reflect::Value::I64(integer(value).ok_or_else(mismatch)?)
        }
        Kind::Uint32 | Kind::Fixed32 => {
            let n = unsigned(value).ok_or_else(mismatch)?;
            prost_reflect::Value::U32(u32::try_from(n).map_err(|_| mismatch())?)
        }
        Kind::Uint64 | Kind::Fixed64 => {
            prost_reflect::Value::U64(unsigned(value).ok_or_else(mismatch)?)
        }
        Kind::Float => prost_reflect::Value::F32(float(value).ok_or_else(mismatch)? as f32),
        Kind::Double => prost_reflect::Value::F64(float(value).ok_or_else(mismatch)?),
        Kind::String => match value {
            Value::String(s) => prost_reflect::Value::String(s.clone()),
            _ => return Err(mismatch()),
        },
        Kind::Bytes => match value {
            Value::String(s) => prost_reflect::Value::Bytes(Bytes::from(
                base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(|_| mismatch())?,
            )),
            Value::Binary(b) => prost_reflect::Value::Bytes(b.clone()),
            _ => return Err(mismatch()),
        },
        Kind::Enum(enumeration) => {
            let name = match value {
                Value::Enum(name) => name.as_str(),
                Value::String(s) => s.as_str(),
                _ => return Err(mismatch()),
            };
            let enum_value = enumeration.get_value_by_name(name).ok_or_else(|| {
                Error::UnknownEnumValue {
                    enum_name: naming::enum_reference_name(enumeration),
                    value: name.to_string(),
                }
            })?;
            prost_reflect::Value::EnumNumber(enum_value.number())
        }
        Kind::Message(message) => match value {
            Value::Object(object) => prost_reflect::Value::Message(create_message(message, object)?),
            _ => return Err(mismatch()),
        },
    })
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn unsigned(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn kind_name(kind: &Kind) -> String {
    match kind {
        Kind::Message(message) => message.full_name().to_string(),
        Kind::Enum(enumeration) => enumeration.full_name().to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}
