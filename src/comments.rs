//! Descriptions extracted from protobuf source comments
//!
//! `protoc --include_source_info` keeps the comments of every declaration in
//! `source_code_info`. [`CommentMap`] flattens them into a lookup keyed by the
//! full name of the commented message, field, enum or enum value, which the
//! translator uses for GraphQL descriptions.

use once_cell::sync::Lazy;
use prost_reflect::FileDescriptor;
use prost_types::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto};
use regex::Regex;
use std::collections::HashMap;

static LINE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    // Leading whitespace plus a block comment's `*` gutter
    Regex::new(r"(?m)^[ \t]*\*?[ \t]?").expect("valid regex")
});

// Field numbers inside descriptor.proto used by source location paths
const FILE_MESSAGE_TYPE: i32 = 4;
const FILE_ENUM_TYPE: i32 = 5;
const MESSAGE_FIELD: i32 = 2;
const MESSAGE_NESTED_TYPE: i32 = 3;
const MESSAGE_ENUM_TYPE: i32 = 4;
const ENUM_VALUE: i32 = 2;

/// Full descriptor name -> comment text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentMap {
    entries: HashMap<String, String>,
}

impl CommentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect comments from every file of a descriptor pool.
    pub fn from_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = FileDescriptor>,
    {
        let mut map = Self::new();
        for file in files {
            map.add_file_proto(file.file_descriptor_proto());
        }
        map
    }

    /// Collect comments from raw file descriptor protos.
    pub fn from_file_descriptor_protos<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = &'a FileDescriptorProto>,
    {
        let mut map = Self::new();
        for file in files {
            map.add_file_proto(file);
        }
        map
    }

    pub fn insert(&mut self, full_name: impl Into<String>, comment: impl Into<String>) {
        self.entries.insert(full_name.into(), comment.into());
    }

    pub fn get(&self, full_name: &str) -> Option<&str> {
        self.entries.get(full_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge another map in, entries of `other` win.
    pub fn extend(&mut self, other: CommentMap) {
        self.entries.extend(other.entries);
    }

    fn add_file_proto(&mut self, file: &FileDescriptorProto) {
        let Some(info) = file.source_code_info.as_ref() else {
            return;
        };
        let package = file.package.as_deref().unwrap_or_default();

        for location in &info.location {
            let comment = location
                .leading_comments
                .as_deref()
                .or(location.trailing_comments.as_deref())
                .map(clean_comment)
                .filter(|c| !c.is_empty());
            let Some(comment) = comment else {
                continue;
            };
            if let Some(name) = resolve_path(file, package, &location.path) {
                self.entries.insert(name, comment);
            }
        }
    }
}

fn clean_comment(raw: &str) -> String {
    LINE_PREFIX.replace_all(raw, "").trim().to_string()
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// Map a source location path to the full name of the declaration it points at.
fn resolve_path(file: &FileDescriptorProto, package: &str, path: &[i32]) -> Option<String> {
    match path {
        [FILE_MESSAGE_TYPE, index, rest @ ..] => {
            let message = file.message_type.get(usize::try_from(*index).ok()?)?;
            resolve_message_path(message, package, rest)
        }
        [FILE_ENUM_TYPE, index, rest @ ..] => {
            let enumeration = file.enum_type.get(usize::try_from(*index).ok()?)?;
            resolve_enum_path(enumeration, package, rest)
        }
        _ => None,
    }
}

fn resolve_message_path(message: &DescriptorProto, scope: &str, path: &[i32]) -> Option<String> {
    let full_name = qualify(scope, message.name());
    match path {
        [] => Some(full_name),
        [MESSAGE_FIELD, index] => {
            let field = message.field.get(usize::try_from(*index).ok()?)?;
            Some(qualify(&full_name, field.name()))
        }
        [MESSAGE_NESTED_TYPE, index, rest @ ..] => {
            let nested = message.nested_type.get(usize::try_from(*index).ok()?)?;
            resolve_message_path(nested, &full_name, rest)
        }
        [MESSAGE_ENUM_TYPE, index, rest @ ..] => {
            let enumeration = message.enum_type.get(usize::try_from(*index).ok()?)?;
            resolve_enum_path(enumeration, &full_name, rest)
        }
        _ => None,
    }
}

fn resolve_enum_path(enumeration: &EnumDescriptorProto, scope: &str, path: &[i32]) -> Option<String> {
    let full_name = qualify(scope, enumeration.name());
    match path {
        [] => Some(full_name),
        // Enum values live in the enclosing scope, like in protobuf itself
        [ENUM_VALUE, index] => {
            let value = enumeration.value.get(usize::try_from(*index).ok()?)?;
            Some(qualify(scope, value.name()))
        }
        _ => None,
    }
}
