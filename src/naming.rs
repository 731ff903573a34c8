//! Name transforms shared by the translator, the input converter and the
//! field-mask projector.
//!
//! GraphQL has a single flat namespace for every named type, so protobuf full
//! names are flattened (`library.v1.Book` becomes `library_v1_Book`) and input
//! objects carry the [`INPUT_PREFIX`] so they can never collide with the
//! object type of the same message.

use prost_reflect::{EnumDescriptor, FieldDescriptor, MessageDescriptor};

/// Prefix separating input object names from output names.
pub const INPUT_PREFIX: &str = "Input_";

/// Name of the synthetic field standing in for an empty field set.
pub const PLACEHOLDER_FIELD: &str = "_";

/// Flatten a protobuf full name into a GraphQL type name.
pub fn canonical_name(full_name: &str) -> String {
    full_name.replace('.', "_")
}

/// Canonical name of a message descriptor.
pub fn reference_name(descriptor: &MessageDescriptor) -> String {
    canonical_name(descriptor.full_name())
}

/// Canonical name of an enum descriptor.
pub fn enum_reference_name(descriptor: &EnumDescriptor) -> String {
    canonical_name(descriptor.full_name())
}

/// Name of the input object mirroring a message.
pub fn input_reference_name(descriptor: &MessageDescriptor) -> String {
    format!("{}{}", INPUT_PREFIX, reference_name(descriptor))
}

/// `author_name` -> `authorName`. Names without underscores are kept as-is.
pub fn to_camel_case(name: &str) -> String {
    if !name.contains('_') {
        return name.to_string();
    }
    let mut result = String::with_capacity(name.len());
    let mut upper_next = false;
    for (i, c) in name.chars().enumerate() {
        if c == '_' {
            upper_next = i > 0;
        } else if upper_next {
            result.extend(c.to_uppercase());
            upper_next = false;
        } else {
            result.extend(c.to_lowercase());
        }
    }
    result
}

/// Descriptor field exposed under the GraphQL name `name`.
///
/// Matches against the forward transform, since [`to_snake_case`] cannot
/// recover names such as `address_1` or `zipCode`.
pub fn find_field(descriptor: &MessageDescriptor, name: &str) -> Option<FieldDescriptor> {
    descriptor
        .fields()
        .find(|field| to_camel_case(field.name()) == name)
}

/// `authorName` -> `author_name`. Inverts [`to_camel_case`] for lower snake
/// case names whose segments start with a letter.
pub fn to_snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("library.v1.Book"), "library_v1_Book");
        assert_eq!(canonical_name("Book"), "Book");
        assert_eq!(canonical_name("a.b.Outer.Inner"), "a_b_Outer_Inner");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("author_name"), "authorName");
        assert_eq!(to_camel_case("page_count"), "pageCount");
        assert_eq!(to_camel_case("title"), "title");
        assert_eq!(to_camel_case("camelCaseName"), "camelCaseName");
        assert_eq!(to_camel_case("field1_value"), "field1Value");
        assert_eq!(to_camel_case("_private"), "private");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("authorName"), "author_name");
        assert_eq!(to_snake_case("title"), "title");
        assert_eq!(to_snake_case("rawId"), "raw_id");
        assert_eq!(to_snake_case("field1Value"), "field1_value");
    }

    #[test]
    fn test_find_field_by_exposed_name() {
        let address = crate::fixtures::edge_message("Address");
        assert_eq!(find_field(&address, "address1").unwrap().name(), "address_1");
        assert_eq!(find_field(&address, "zipCode").unwrap().name(), "zipCode");
        assert!(find_field(&address, "zip_code").is_none());
        assert!(find_field(&address, "address_1").is_none());
    }

    #[test]
    fn test_round_trip() {
        for name in ["author_name", "a_b_c", "published_at", "id"] {
            assert_eq!(to_snake_case(&to_camel_case(name)), name);
        }
    }
}
