//! The translated type graph of one schema build
//!
//! Holds every named type by name, applies type modifications in order,
//! verifies that every reference resolves and optionally prunes types the
//! root operations cannot reach.

use crate::error::{Error, Result};
use crate::modification::TypeModification;
use crate::translate::ScalarMapping;
use crate::types::{ObjectType, TranslatedType, BUILTIN_SCALARS};
use async_graphql::indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, TranslatedType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type; a second type with the same name is a configuration error.
    pub fn insert(&mut self, ty: TranslatedType) -> Result<()> {
        if let Some(existing) = self.types.get(ty.name()) {
            return Err(Error::DuplicateTypeName {
                name: ty.name().to_string(),
                first: existing.kind().to_string(),
                second: ty.kind().to_string(),
            });
        }
        self.types.insert(ty.name().to_string(), ty);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TranslatedType> {
        self.types.get(name)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.get(name).and_then(TranslatedType::as_object)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TranslatedType> {
        self.types.values()
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.values().filter_map(TranslatedType::as_object)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Register definitions for the custom scalars referenced by any type.
    pub fn register_custom_scalars(&mut self) {
        let referenced: IndexSet<String> = self
            .types
            .values()
            .flat_map(|ty| ty.references())
            .map(|(_, name)| name.to_string())
            .collect();
        for name in referenced {
            if self.types.contains_key(&name) {
                continue;
            }
            if let Some(scalar) = ScalarMapping::custom_scalar(&name) {
                self.types.insert(name, TranslatedType::Scalar(scalar));
            }
        }
    }

    /// Apply modifications in order. Targets that are not object types are
    /// skipped with a warning.
    pub fn apply_modifications(&mut self, modifications: &[TypeModification]) -> Result<()> {
        for modification in modifications {
            let target = modification.type_name();
            match self.types.get(target) {
                Some(TranslatedType::Object(object)) => {
                    let rebuilt = modification.apply(object)?;
                    debug!(type_name = %target, fields = rebuilt.fields.len(), "Applied type modification");
                    self.types.insert(target.to_string(), TranslatedType::Object(rebuilt));
                }
                Some(other) => {
                    warn!(type_name = %target, kind = other.kind(), "Ignoring modification of non-object type");
                }
                None => {
                    warn!(type_name = %target, "Ignoring modification of unknown type");
                }
            }
        }
        Ok(())
    }

    /// Every referenced type must be a built-in scalar or a registered type.
    pub fn validate_references(&self) -> Result<()> {
        for ty in self.types.values() {
            for (site, name) in ty.references() {
                if !BUILTIN_SCALARS.contains(&name) && !self.types.contains_key(name) {
                    return Err(Error::UnresolvedType {
                        type_name: name.to_string(),
                        referenced_by: site,
                    });
                }
            }
        }
        Ok(())
    }

    /// Remove every type not reachable from `roots`. Objects implementing a
    /// reachable interface stay, they can be returned through it.
    pub fn prune_unreachable(&mut self, roots: &[&str]) {
        let mut reachable: IndexSet<String> = IndexSet::new();
        let mut queue: VecDeque<String> = roots.iter().map(|r| r.to_string()).collect();

        loop {
            while let Some(name) = queue.pop_front() {
                if !reachable.insert(name.clone()) {
                    continue;
                }
                if let Some(ty) = self.types.get(&name) {
                    queue.extend(ty.references().into_iter().map(|(_, n)| n.to_string()));
                }
            }
            let implementors: Vec<String> = self
                .objects()
                .filter(|object| !reachable.contains(&object.name))
                .filter(|object| object.interfaces.iter().any(|i| reachable.contains(i)))
                .map(|object| object.name.clone())
                .collect();
            if implementors.is_empty() {
                break;
            }
            queue.extend(implementors);
        }

        let before = self.types.len();
        self.types.retain(|name, _| reachable.contains(name));
        debug!(removed = before - self.types.len(), "Pruned unreachable types");
    }
}
