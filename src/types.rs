//! Translated GraphQL type graph
//!
//! Descriptors are first translated into these plain values. Modifications,
//! reference checks and pruning all operate on this graph; only the final
//! step turns it into async-graphql dynamic types.

use crate::resolver::Resolver;
use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, InputObject, InputValue, Interface, InterfaceField,
    Object, ResolverContext, Scalar, TypeRef,
};
use async_graphql::Value;

/// Built-in GraphQL scalars, never registered explicitly.
pub const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Reason attached to fields and enum values deprecated in the `.proto` file.
pub const PROTO_DEPRECATION_REASON: &str = "deprecated in proto";

/// Type expression used by fields and arguments. Named types are references
/// by name, so cycles between messages need no special handling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Named(String),
    List(Box<TypeExpr>),
    NonNull(Box<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into())
    }

    pub fn named_nn(name: impl Into<String>) -> Self {
        TypeExpr::NonNull(Box::new(Self::named(name)))
    }

    pub fn list(inner: TypeExpr) -> Self {
        TypeExpr::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeExpr) -> Self {
        match inner {
            TypeExpr::NonNull(_) => inner,
            other => TypeExpr::NonNull(Box::new(other)),
        }
    }

    /// Innermost named type.
    pub fn base_name(&self) -> &str {
        match self {
            TypeExpr::Named(name) => name,
            TypeExpr::List(inner) | TypeExpr::NonNull(inner) => inner.base_name(),
        }
    }

    pub fn is_list(&self) -> bool {
        match self {
            TypeExpr::List(_) => true,
            TypeExpr::NonNull(inner) => inner.is_list(),
            TypeExpr::Named(_) => false,
        }
    }

    pub fn to_type_ref(&self) -> TypeRef {
        match self {
            TypeExpr::Named(name) => TypeRef::named(name.clone()),
            TypeExpr::List(inner) => TypeRef::List(Box::new(inner.to_type_ref())),
            TypeExpr::NonNull(inner) => TypeRef::NonNull(Box::new(inner.to_type_ref())),
        }
    }
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeExpr::Named(name) => write!(f, "{}", name),
            TypeExpr::List(inner) => write!(f, "[{}]", inner),
            TypeExpr::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// Field argument or input object field
#[derive(Debug, Clone, PartialEq)]
pub struct InputValueDefinition {
    pub name: String,
    pub ty: TypeExpr,
    pub description: Option<String>,
    pub default_value: Option<Value>,
}

impl InputValueDefinition {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            description: None,
            default_value: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    fn to_dynamic(&self) -> InputValue {
        let mut input = InputValue::new(self.name.clone(), self.ty.to_type_ref());
        if let Some(description) = &self.description {
            input = input.description(description.clone());
        }
        if let Some(value) = &self.default_value {
            input = input.default_value(value.clone());
        }
        input
    }
}

/// Output field of an object type
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: TypeExpr,
    pub resolver: Resolver,
    pub arguments: Vec<InputValueDefinition>,
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, ty: TypeExpr, resolver: Resolver) -> Self {
        Self {
            name: name.into(),
            ty,
            resolver,
            arguments: Vec::new(),
            description: None,
            deprecation: None,
        }
    }

    /// Field that always resolves to `value`.
    pub fn with_value(name: impl Into<String>, ty: TypeExpr, value: impl Into<Value>) -> Self {
        Self::new(name, ty, Resolver::Static(value.into()))
    }

    /// Field backed by a raw async-graphql resolver function.
    pub fn with_resolver<F>(name: impl Into<String>, ty: TypeExpr, resolver_fn: F) -> Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        Self::new(name, ty, Resolver::custom(resolver_fn))
    }

    pub fn argument(mut self, argument: InputValueDefinition) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecation(mut self, reason: impl Into<String>) -> Self {
        self.deprecation = Some(reason.into());
        self
    }

    pub(crate) fn to_dynamic(&self) -> Field {
        let mut field = self.resolver.to_field(&self.name, self.ty.to_type_ref());
        for argument in &self.arguments {
            field = field.argument(argument.to_dynamic());
        }
        if let Some(description) = &self.description {
            field = field.description(description.clone());
        }
        if let Some(reason) = &self.deprecation {
            field = field.deprecation(Some(reason.as_str()));
        }
        field
    }
}

#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldDefinition>,
    pub interfaces: Vec<String>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }

    pub(crate) fn to_dynamic(&self) -> Object {
        let mut object = Object::new(self.name.clone());
        if let Some(description) = &self.description {
            object = object.description(description.clone());
        }
        for interface in &self.interfaces {
            object = object.implement(interface.clone());
        }
        for field in &self.fields {
            object = object.field(field.to_dynamic());
        }
        object
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDefinition {
    pub name: String,
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<EnumValueDefinition>,
}

impl EnumType {
    pub fn value(&self, name: &str) -> Option<&EnumValueDefinition> {
        self.values.iter().find(|v| v.name == name)
    }

    pub(crate) fn to_dynamic(&self) -> Enum {
        let mut enumeration = Enum::new(self.name.clone());
        if let Some(description) = &self.description {
            enumeration = enumeration.description(description.clone());
        }
        for value in &self.values {
            let mut item = EnumItem::new(value.name.clone());
            if let Some(description) = &value.description {
                item = item.description(description.clone());
            }
            if let Some(reason) = &value.deprecation {
                item = item.deprecation(Some(reason.as_str()));
            }
            enumeration = enumeration.item(item);
        }
        enumeration
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<InputValueDefinition>,
}

impl InputObjectType {
    pub fn field(&self, name: &str) -> Option<&InputValueDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn to_dynamic(&self) -> InputObject {
        let mut input = InputObject::new(self.name.clone());
        if let Some(description) = &self.description {
            input = input.description(description.clone());
        }
        for field in &self.fields {
            input = input.field(field.to_dynamic());
        }
        input
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarType {
    pub name: String,
    pub description: Option<String>,
}

impl ScalarType {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
        }
    }

    pub(crate) fn to_dynamic(&self) -> Scalar {
        let mut scalar = Scalar::new(self.name.clone());
        if let Some(description) = &self.description {
            scalar = scalar.description(description.clone());
        }
        scalar
    }
}

/// Interface with resolver-less fields; implementors resolve them.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceType {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<(String, TypeExpr)>,
}

impl InterfaceType {
    pub(crate) fn to_dynamic(&self) -> Interface {
        let mut interface = Interface::new(self.name.clone());
        if let Some(description) = &self.description {
            interface = interface.description(description.clone());
        }
        for (name, ty) in &self.fields {
            interface = interface.field(InterfaceField::new(name.clone(), ty.to_type_ref()));
        }
        interface
    }
}

/// A named type of the translated graph
#[derive(Debug, Clone)]
pub enum TranslatedType {
    Scalar(ScalarType),
    Object(ObjectType),
    Interface(InterfaceType),
    Enum(EnumType),
    InputObject(InputObjectType),
}

impl TranslatedType {
    pub fn name(&self) -> &str {
        match self {
            TranslatedType::Scalar(t) => &t.name,
            TranslatedType::Object(t) => &t.name,
            TranslatedType::Interface(t) => &t.name,
            TranslatedType::Enum(t) => &t.name,
            TranslatedType::InputObject(t) => &t.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TranslatedType::Scalar(_) => "scalar",
            TranslatedType::Object(_) => "object",
            TranslatedType::Interface(_) => "interface",
            TranslatedType::Enum(_) => "enum",
            TranslatedType::InputObject(_) => "input object",
        }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self {
            TranslatedType::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumType> {
        match self {
            TranslatedType::Enum(enumeration) => Some(enumeration),
            _ => None,
        }
    }

    pub fn as_input_object(&self) -> Option<&InputObjectType> {
        match self {
            TranslatedType::InputObject(input) => Some(input),
            _ => None,
        }
    }

    /// Every `(referencing site, referenced type name)` pair of this type.
    pub fn references(&self) -> Vec<(String, &str)> {
        match self {
            TranslatedType::Object(object) => object
                .fields
                .iter()
                .flat_map(|field| {
                    let site = format!("{}.{}", object.name, field.name);
                    std::iter::once((site.clone(), field.ty.base_name())).chain(
                        field.arguments.iter().map(move |arg| {
                            (format!("{}({})", site, arg.name), arg.ty.base_name())
                        }),
                    )
                })
                .chain(object.interfaces.iter().map(|i| (object.name.clone(), i.as_str())))
                .collect(),
            TranslatedType::InputObject(input) => input
                .fields
                .iter()
                .map(|field| (format!("{}.{}", input.name, field.name), field.ty.base_name()))
                .collect(),
            TranslatedType::Interface(interface) => interface
                .fields
                .iter()
                .map(|(name, ty)| (format!("{}.{}", interface.name, name), ty.base_name()))
                .collect(),
            TranslatedType::Scalar(_) | TranslatedType::Enum(_) => Vec::new(),
        }
    }
}
