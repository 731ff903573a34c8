//! Post-translation edits to object types
//!
//! Each [`TypeModification`] targets one object type by canonical name and is
//! applied after base translation, in declaration order. Applying a
//! modification never edits the input type; it returns a rebuilt copy.

use crate::error::{Error, Result};
use crate::naming;
use crate::types::{FieldDefinition, ObjectType};
use prost_reflect::MessageDescriptor;

#[derive(Debug, Clone)]
pub enum ModificationOp {
    /// Fails if the field exists
    AddField(FieldDefinition),
    AddFields(Vec<FieldDefinition>),
    /// No-op if the field is absent
    RemoveField(String),
    RemoveFields(Vec<String>),
    /// Remove then add
    ReplaceField(FieldDefinition),
}

#[derive(Debug, Clone)]
pub struct TypeModification {
    type_name: String,
    op: ModificationOp,
}

impl TypeModification {
    pub fn new(type_name: impl Into<String>, op: ModificationOp) -> Self {
        Self {
            type_name: type_name.into(),
            op,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn op(&self) -> &ModificationOp {
        &self.op
    }

    /// Apply to `object`, returning the rebuilt type.
    pub fn apply(&self, object: &ObjectType) -> Result<ObjectType> {
        let mut rebuilt = object.clone();
        match &self.op {
            ModificationOp::AddField(field) => add_field(&mut rebuilt, field)?,
            ModificationOp::AddFields(fields) => {
                for field in fields {
                    add_field(&mut rebuilt, field)?;
                }
            }
            ModificationOp::RemoveField(name) => remove_field(&mut rebuilt, name),
            ModificationOp::RemoveFields(names) => {
                for name in names {
                    remove_field(&mut rebuilt, name);
                }
            }
            ModificationOp::ReplaceField(field) => {
                remove_field(&mut rebuilt, &field.name);
                add_field(&mut rebuilt, field)?;
            }
        }
        Ok(rebuilt)
    }
}

fn add_field(object: &mut ObjectType, field: &FieldDefinition) -> Result<()> {
    if object.has_field(&field.name) {
        return Err(Error::FieldConflict {
            type_name: object.name.clone(),
            field_name: field.name.clone(),
        });
    }
    object.fields.push(field.clone());
    Ok(())
}

fn remove_field(object: &mut ObjectType, name: &str) {
    object.fields.retain(|f| f.name != name);
}

/// Entry point for building modifications of one type.
///
/// ```rust,no_run
/// use grpc_graphql_compose::{ModifiableType, FieldDefinition, TypeExpr};
///
/// let modification = ModifiableType::named("library_v1_Book")
///     .add_field(FieldDefinition::with_value("shelf", TypeExpr::named("String"), "A1"));
/// assert_eq!(modification.type_name(), "library_v1_Book");
/// ```
#[derive(Debug, Clone)]
pub struct ModifiableType {
    type_name: String,
}

impl ModifiableType {
    pub fn named(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }

    /// The object type translated from `descriptor`.
    pub fn of(descriptor: &MessageDescriptor) -> Self {
        Self::named(naming::reference_name(descriptor))
    }

    pub fn add_field(&self, field: FieldDefinition) -> TypeModification {
        self.modification(ModificationOp::AddField(field))
    }

    pub fn add_fields(&self, fields: Vec<FieldDefinition>) -> TypeModification {
        self.modification(ModificationOp::AddFields(fields))
    }

    pub fn remove_field(&self, name: impl Into<String>) -> TypeModification {
        self.modification(ModificationOp::RemoveField(name.into()))
    }

    pub fn remove_fields<I, S>(&self, names: I) -> TypeModification
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modification(ModificationOp::RemoveFields(
            names.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn replace_field(&self, field: FieldDefinition) -> TypeModification {
        self.modification(ModificationOp::ReplaceField(field))
    }

    fn modification(&self, op: ModificationOp) -> TypeModification {
        TypeModification::new(self.type_name.clone(), op)
    }
}
