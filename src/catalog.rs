//! Descriptor catalog
//!
//! Collects every message and enum reachable from a set of root files,
//! messages and enums. File dependencies are followed breadth-first and
//! deduplicated by file name; nested types are enumerated recursively. The
//! catalog is built once per schema and only read afterwards.

use crate::error::{Error, Result};
use crate::naming;
use async_graphql::indexmap::IndexMap;
use prost_reflect::{DescriptorPool, EnumDescriptor, FileDescriptor, MessageDescriptor};
use std::collections::VecDeque;
use tracing::debug;

/// Canonical name -> descriptor registry
#[derive(Debug, Clone, Default)]
pub struct DescriptorCatalog {
    files: IndexMap<String, FileDescriptor>,
    messages: IndexMap<String, MessageDescriptor>,
    enums: IndexMap<String, EnumDescriptor>,
}

impl DescriptorCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn message(&self, canonical_name: &str) -> Option<&MessageDescriptor> {
        self.messages.get(canonical_name)
    }

    pub fn enumeration(&self, canonical_name: &str) -> Option<&EnumDescriptor> {
        self.enums.get(canonical_name)
    }

    pub fn contains(&self, canonical_name: &str) -> bool {
        self.messages.contains_key(canonical_name) || self.enums.contains_key(canonical_name)
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageDescriptor> {
        self.messages.values()
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumDescriptor> {
        self.enums.values()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.messages.len() + self.enums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.enums.is_empty()
    }

    fn insert_message(&mut self, descriptor: MessageDescriptor) -> Result<()> {
        let name = naming::reference_name(&descriptor);
        self.check_unique(&name, descriptor.full_name())?;
        for nested in descriptor.child_messages() {
            self.insert_message(nested)?;
        }
        for nested in descriptor.child_enums() {
            self.insert_enum(nested)?;
        }
        self.messages.insert(name, descriptor);
        Ok(())
    }

    fn insert_enum(&mut self, descriptor: EnumDescriptor) -> Result<()> {
        let name = naming::enum_reference_name(&descriptor);
        self.check_unique(&name, descriptor.full_name())?;
        self.enums.insert(name, descriptor);
        Ok(())
    }

    // Distinct full names flattening to the same canonical name
    fn check_unique(&self, name: &str, full_name: &str) -> Result<()> {
        let existing = self
            .messages
            .get(name)
            .map(|m| m.full_name().to_string())
            .or_else(|| self.enums.get(name).map(|e| e.full_name().to_string()));
        match existing {
            Some(first) if first != full_name => Err(Error::DuplicateTypeName {
                name: name.to_string(),
                first,
                second: full_name.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Collects catalog roots
#[derive(Debug, Clone, Default)]
pub struct CatalogBuilder {
    files: Vec<FileDescriptor>,
    messages: Vec<MessageDescriptor>,
    enums: Vec<EnumDescriptor>,
}

impl CatalogBuilder {
    pub fn add_file(mut self, file: FileDescriptor) -> Self {
        self.files.push(file);
        self
    }

    pub fn add_files<I>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = FileDescriptor>,
    {
        self.files.extend(files);
        self
    }

    /// Every file of a pool.
    pub fn add_pool(self, pool: &DescriptorPool) -> Self {
        self.add_files(pool.files())
    }

    /// A message and, through its file, everything the file depends on.
    pub fn add_message(mut self, descriptor: MessageDescriptor) -> Self {
        self.messages.push(descriptor);
        self
    }

    pub fn add_enum(mut self, descriptor: EnumDescriptor) -> Self {
        self.enums.push(descriptor);
        self
    }

    pub fn build(self) -> Result<DescriptorCatalog> {
        let roots = self
            .files
            .into_iter()
            .chain(self.messages.iter().map(|m| m.parent_file()))
            .chain(self.enums.iter().map(|e| e.parent_file()));

        let mut catalog = DescriptorCatalog::default();
        let mut queue: VecDeque<FileDescriptor> = roots.collect();
        while let Some(file) = queue.pop_front() {
            if catalog.files.contains_key(file.name()) {
                continue;
            }
            queue.extend(file.dependencies());
            catalog.files.insert(file.name().to_string(), file);
        }

        let files: Vec<FileDescriptor> = catalog.files.values().cloned().collect();
        for file in files {
            for message in file.messages() {
                catalog.insert_message(message)?;
            }
            for enumeration in file.enums() {
                catalog.insert_enum(enumeration)?;
            }
        }

        debug!(
            files = catalog.files.len(),
            messages = catalog.messages.len(),
            enums = catalog.enums.len(),
            "Built descriptor catalog"
        );
        Ok(catalog)
    }
}
