//! Descriptor to GraphQL type translation
//!
//! | protobuf | GraphQL | with proto scalars |
//! |---|---|---|
//! | bool | `Boolean` | `Boolean` |
//! | float, double | `Float` | `Float` |
//! | int32, sint32, sfixed32, uint32, fixed32 | `Int` | `Int`, `SInt32`, `SFixed32`, `UInt32`, `Fixed32` |
//! | int64, sint64, sfixed64, uint64, fixed64 | `Long` | `Int64`, `SInt64`, `SFixed64`, `UInt64`, `Fixed64` |
//! | string | `String` | `String` |
//! | bytes | `String` (base64) | `Bytes` |
//! | message, group | object reference | object reference |
//! | enum | enum reference | enum reference |

use crate::catalog::DescriptorCatalog;
use crate::config::SchemaOptions;
use crate::error::{Error, Result};
use crate::input::InputConverter;
use crate::naming::{self, PLACEHOLDER_FIELD};
use crate::registry::TypeRegistry;
use crate::relay::NODE_INTERFACE;
use crate::resolver::Resolver;
use crate::types::{
    EnumType, EnumValueDefinition, FieldDefinition, ObjectType, ScalarType, TranslatedType,
    TypeExpr, PROTO_DEPRECATION_REASON,
};
use prost_reflect::{EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor};
use std::borrow::Cow;
use tracing::debug;

/// Field name under which a descriptor field called `id` is exposed when the
/// type also gets the relay `id`.
pub const RAW_ID_FIELD: &str = "rawId";

/// Primitive kind -> scalar name table
#[derive(Debug, Clone, Copy)]
pub struct ScalarMapping {
    proto_scalars: bool,
}

impl ScalarMapping {
    pub fn new(proto_scalars: bool) -> Self {
        Self { proto_scalars }
    }

    /// Output type name of any kind: the canonical name for messages and
    /// enums, the scalar name otherwise.
    pub fn type_name(&self, kind: &Kind) -> Cow<'static, str> {
        let scalar = match (kind, self.proto_scalars) {
            (Kind::Message(message), _) => return Cow::Owned(naming::reference_name(message)),
            (Kind::Enum(enumeration), _) => {
                return Cow::Owned(naming::enum_reference_name(enumeration))
            }
            (Kind::Bool, _) => "Boolean",
            (Kind::Float | Kind::Double, _) => "Float",
            (Kind::String, _) => "String",
            (Kind::Int32, _) => "Int",
            (Kind::Sint32 | Kind::Sfixed32 | Kind::Uint32 | Kind::Fixed32, false) => "Int",
            (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 | Kind::Uint64 | Kind::Fixed64, false) => {
                "Long"
            }
            (Kind::Bytes, false) => "String",
            (Kind::Sint32, true) => "SInt32",
            (Kind::Sfixed32, true) => "SFixed32",
            (Kind::Uint32, true) => "UInt32",
            (Kind::Fixed32, true) => "Fixed32",
            (Kind::Int64, true) => "Int64",
            (Kind::Sint64, true) => "SInt64",
            (Kind::Sfixed64, true) => "SFixed64",
            (Kind::Uint64, true) => "UInt64",
            (Kind::Fixed64, true) => "Fixed64",
            (Kind::Bytes, true) => "Bytes",
        };
        Cow::Borrowed(scalar)
    }

    /// Scalar name of a primitive kind, `None` for messages and enums.
    pub fn scalar_name(&self, kind: &Kind) -> Option<&'static str> {
        match self.type_name(kind) {
            Cow::Borrowed(scalar) => Some(scalar),
            Cow::Owned(_) => None,
        }
    }

    /// Definition of a custom scalar, `None` for GraphQL built-ins.
    pub fn custom_scalar(name: &str) -> Option<ScalarType> {
        let description = match name {
            "Long" => "64-bit integer",
            "Int64" => "Signed 64-bit integer (int64)",
            "UInt64" => "Unsigned 64-bit integer (uint64)",
            "SInt64" => "Signed 64-bit integer (sint64)",
            "Fixed64" => "Unsigned 64-bit integer (fixed64)",
            "SFixed64" => "Signed 64-bit integer (sfixed64)",
            "UInt32" => "Unsigned 32-bit integer (uint32)",
            "SInt32" => "Signed 32-bit integer (sint32)",
            "Fixed32" => "Unsigned 32-bit integer (fixed32)",
            "SFixed32" => "Signed 32-bit integer (sfixed32)",
            "Bytes" => "Base64 encoded bytes",
            _ => return None,
        };
        Some(ScalarType::new(name, description))
    }
}

/// Translates catalog descriptors into the type graph
pub struct TypeTranslator<'a> {
    options: &'a SchemaOptions,
    scalars: ScalarMapping,
}

impl<'a> TypeTranslator<'a> {
    pub fn new(options: &'a SchemaOptions) -> Self {
        Self {
            options,
            scalars: ScalarMapping::new(options.use_proto_scalar_types),
        }
    }

    /// Type of one descriptor field.
    pub fn field_type(&self, field: &FieldDescriptor) -> TypeExpr {
        let element = TypeExpr::named(self.scalars.type_name(&field.kind()).into_owned());
        if field.is_list() || field.is_map() {
            TypeExpr::list(element)
        } else {
            element
        }
    }

    /// Full field definition, named in camel case.
    pub fn field_definition(&self, field: &FieldDescriptor) -> FieldDefinition {
        let mut definition = FieldDefinition::new(
            naming::to_camel_case(field.name()),
            self.field_type(field),
            Resolver::ProtoField(field.clone()),
        );
        if let Some(comment) = self.options.comments.get(field.full_name()) {
            definition = definition.description(comment);
        }
        if is_deprecated(field) {
            definition = definition.deprecation(PROTO_DEPRECATION_REASON);
        }
        definition
    }

    /// Object type of a message. Two fields exposed under the same name, for
    /// instance `raw_id` next to a relay type's renamed `id`, are a conflict.
    pub fn object_type(&self, descriptor: &MessageDescriptor) -> Result<ObjectType> {
        let name = naming::reference_name(descriptor);
        let relay_field = descriptor.fields().find(|f| self.is_relay_id(f));

        let mut fields: Vec<FieldDefinition> = Vec::new();
        let mut interfaces = Vec::new();
        if let Some(relay_field) = &relay_field {
            fields.push(
                FieldDefinition::new(
                    "id",
                    TypeExpr::named_nn("ID"),
                    Resolver::GlobalId {
                        type_name: name.clone(),
                        field: relay_field.clone(),
                    },
                )
                .description("Globally unique identifier"),
            );
            interfaces.push(NODE_INTERFACE.to_string());
        }

        for field in descriptor.fields() {
            let mut definition = self.field_definition(&field);
            if relay_field.is_some() && definition.name == "id" {
                definition.name = RAW_ID_FIELD.to_string();
            }
            if fields.iter().any(|existing| existing.name == definition.name) {
                return Err(Error::FieldConflict {
                    type_name: name,
                    field_name: definition.name,
                });
            }
            fields.push(definition);
        }

        if fields.is_empty() {
            fields.push(
                FieldDefinition::with_value(PLACEHOLDER_FIELD, TypeExpr::named("String"), "-")
                    .description("Placeholder for a message without fields"),
            );
        }

        Ok(ObjectType {
            description: self
                .options
                .comments
                .get(descriptor.full_name())
                .map(String::from),
            name,
            fields,
            interfaces,
        })
    }

    /// Enum type of an enum descriptor.
    pub fn enum_type(&self, descriptor: &EnumDescriptor) -> EnumType {
        let values = descriptor
            .values()
            .map(|value| EnumValueDefinition {
                name: value.name().to_string(),
                description: self.options.comments.get(value.full_name()).map(String::from),
                deprecation: option_flag(&value.options(), "deprecated")
                    .then(|| PROTO_DEPRECATION_REASON.to_string()),
            })
            .collect();

        EnumType {
            name: naming::enum_reference_name(descriptor),
            description: self
                .options
                .comments
                .get(descriptor.full_name())
                .map(String::from),
            values,
        }
    }

    /// Translate every catalog entry: object and input object per message,
    /// enum per enum, plus the custom scalars in use.
    pub fn translate(&self, catalog: &DescriptorCatalog) -> Result<TypeRegistry> {
        let inputs = InputConverter::new(self.options);
        let mut registry = TypeRegistry::new();

        for descriptor in catalog.messages() {
            let object = self.object_type(descriptor)?;
            debug!(type_name = %object.name, fields = object.fields.len(), "Translated message");
            registry.insert(TranslatedType::Object(object))?;
            registry.insert(TranslatedType::InputObject(inputs.input_type(descriptor)))?;
        }
        for descriptor in catalog.enums() {
            let enumeration = self.enum_type(descriptor);
            debug!(type_name = %enumeration.name, values = enumeration.values.len(), "Translated enum");
            registry.insert(TranslatedType::Enum(enumeration))?;
        }
        registry.register_custom_scalars();
        Ok(registry)
    }

    /// True if the field carries the configured relay id option.
    pub fn is_relay_id(&self, field: &FieldDescriptor) -> bool {
        let Some(extension) = field
            .parent_pool()
            .get_extension_by_name(&self.options.relay_id_extension)
        else {
            return false;
        };
        let options = field.options();
        options.has_extension(&extension) && options.get_extension(&extension).as_bool() == Some(true)
    }
}

fn is_deprecated(field: &FieldDescriptor) -> bool {
    option_flag(&field.options(), "deprecated")
}

fn option_flag(options: &prost_reflect::DynamicMessage, name: &str) -> bool {
    options
        .get_field_by_name(name)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}
