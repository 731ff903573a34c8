//! Schema bundles
//!
//! A bundle is everything one or more modules contribute: root fields,
//! namespace groups, type modifications, descriptor files and node
//! resolvers. Bundles combine by union; the schema builder consumes the
//! combined bundle.

use crate::error::{Error, Result};
use crate::modification::TypeModification;
use crate::relay::{NodeRegistry, NodeResolver};
use crate::types::{FieldDefinition, ObjectType};
use async_graphql::indexmap::IndexMap;
use prost_reflect::FileDescriptor;

/// Prefix of the object type grouping a namespace's query fields.
pub const QUERY_GROUP_PREFIX: &str = "QueryGroup_";

/// Prefix of the object type grouping a namespace's mutation fields.
pub const MUTATION_GROUP_PREFIX: &str = "MutationGroup_";

#[derive(Debug, Clone, Default)]
pub struct SchemaBundle {
    pub(crate) query_fields: Vec<FieldDefinition>,
    pub(crate) mutation_fields: Vec<FieldDefinition>,
    pub(crate) query_groups: IndexMap<String, ObjectType>,
    pub(crate) mutation_groups: IndexMap<String, ObjectType>,
    pub(crate) modifications: Vec<TypeModification>,
    pub(crate) files: IndexMap<String, FileDescriptor>,
    pub(crate) node_resolvers: NodeRegistry,
}

impl SchemaBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union of `bundles`, in order.
    pub fn combine<I>(bundles: I) -> Result<Self>
    where
        I: IntoIterator<Item = SchemaBundle>,
    {
        let mut combined = SchemaBundle::new();
        for bundle in bundles {
            combined.merge(bundle)?;
        }
        Ok(combined)
    }

    /// Add everything from `other`. Groups of the same namespace merge their
    /// fields; a field name present in both is a conflict.
    pub fn merge(&mut self, other: SchemaBundle) -> Result<()> {
        self.query_fields.extend(other.query_fields);
        self.mutation_fields.extend(other.mutation_fields);
        merge_groups(&mut self.query_groups, other.query_groups)?;
        merge_groups(&mut self.mutation_groups, other.mutation_groups)?;
        self.modifications.extend(other.modifications);
        for (name, file) in other.files {
            self.files.entry(name).or_insert(file);
        }
        self.node_resolvers.extend(other.node_resolvers);
        Ok(())
    }

    pub fn add_query_field(&mut self, field: FieldDefinition) {
        self.query_fields.push(field);
    }

    pub fn add_mutation_field(&mut self, field: FieldDefinition) {
        self.mutation_fields.push(field);
    }

    /// Field under the query namespace `namespace`. A name already present in
    /// the group is a conflict.
    pub fn add_query_group_field(&mut self, namespace: &str, field: FieldDefinition) -> Result<()> {
        add_group_field(group(&mut self.query_groups, QUERY_GROUP_PREFIX, namespace), field)
    }

    pub fn add_mutation_group_field(&mut self, namespace: &str, field: FieldDefinition) -> Result<()> {
        add_group_field(
            group(&mut self.mutation_groups, MUTATION_GROUP_PREFIX, namespace),
            field,
        )
    }

    pub fn add_modification(&mut self, modification: TypeModification) {
        self.modifications.push(modification);
    }

    /// Register the types of `file` and its dependencies.
    pub fn add_file(&mut self, file: FileDescriptor) {
        self.files.entry(file.name().to_string()).or_insert(file);
    }

    pub fn add_node_resolver(&mut self, resolver: NodeResolver) {
        self.node_resolvers.insert(resolver);
    }

    pub fn query_fields(&self) -> &[FieldDefinition] {
        &self.query_fields
    }

    pub fn mutation_fields(&self) -> &[FieldDefinition] {
        &self.mutation_fields
    }

    /// Namespace -> group object type.
    pub fn query_groups(&self) -> &IndexMap<String, ObjectType> {
        &self.query_groups
    }

    pub fn mutation_groups(&self) -> &IndexMap<String, ObjectType> {
        &self.mutation_groups
    }

    pub fn modifications(&self) -> &[TypeModification] {
        &self.modifications
    }

    pub fn files(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.files.values()
    }

    pub fn node_resolvers(&self) -> &NodeRegistry {
        &self.node_resolvers
    }

    /// Query fields including those inside namespace groups.
    pub fn query_field_count(&self) -> usize {
        self.query_fields.len()
            + self
                .query_groups
                .values()
                .map(|group| group.fields.len())
                .sum::<usize>()
    }

    pub fn mutation_field_count(&self) -> usize {
        self.mutation_fields.len()
            + self
                .mutation_groups
                .values()
                .map(|group| group.fields.len())
                .sum::<usize>()
    }
}

fn group<'a>(groups: &'a mut IndexMap<String, ObjectType>, prefix: &str, namespace: &str) -> &'a mut ObjectType {
    groups
        .entry(namespace.to_string())
        .or_insert_with(|| ObjectType::new(format!("{}{}", prefix, namespace)))
}

fn add_group_field(group: &mut ObjectType, field: FieldDefinition) -> Result<()> {
    if group.has_field(&field.name) {
        return Err(Error::FieldConflict {
            type_name: group.name.clone(),
            field_name: field.name,
        });
    }
    group.fields.push(field);
    Ok(())
}

fn merge_groups(target: &mut IndexMap<String, ObjectType>, other: IndexMap<String, ObjectType>) -> Result<()> {
    for (namespace, group) in other {
        match target.get_mut(&namespace) {
            Some(existing) => {
                for field in group.fields {
                    add_group_field(existing, field)?;
                }
            }
            None => {
                target.insert(namespace, group);
            }
        }
    }
    Ok(())
}
