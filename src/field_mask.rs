//! Selection-to-field-mask projection
//!
//! Backends that accept a `google.protobuf.FieldMask` can be asked for only
//! the fields a query selected. The projector walks a selection tree against
//! the response descriptor and emits dotted paths in descriptor field names:
//!
//! ```text
//! { title published { year } }   ->   ["title", "published.year"]
//! { published { era } }          ->   ["published.*"]
//! ```
//!
//! A nested selection with no matching descriptor field widens to the
//! enclosing message (`prefix.*`). Unknown fields directly on the root
//! message are skipped: they are fields contributed by schema modules or the
//! relay `id`, not backend fields.

use crate::error::{Error, Result};
use crate::naming;
use async_graphql::indexmap::IndexSet;
use async_graphql::parser::types::{self as ast, ExecutableDocument};
use async_graphql::SelectionField;
use prost_reflect::{Kind, MessageDescriptor};
use prost_types::FieldMask;
use std::collections::HashMap;

/// Owned selection tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Field {
        name: String,
        selections: Vec<Selection>,
    },
    FragmentSpread(String),
    InlineFragment(Vec<Selection>),
}

impl Selection {
    /// Leaf field.
    pub fn field(name: impl Into<String>) -> Self {
        Selection::Field {
            name: name.into(),
            selections: Vec::new(),
        }
    }

    /// Field with a sub-selection.
    pub fn object(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        Selection::Field {
            name: name.into(),
            selections,
        }
    }

    pub fn spread(fragment: impl Into<String>) -> Self {
        Selection::FragmentSpread(fragment.into())
    }

    pub fn inline(selections: Vec<Selection>) -> Self {
        Selection::InlineFragment(selections)
    }

    /// Convert a parsed selection set.
    pub fn from_selection_set(set: &ast::SelectionSet) -> Vec<Selection> {
        set.items
            .iter()
            .map(|item| match &item.node {
                ast::Selection::Field(field) => Selection::Field {
                    name: field.node.name.node.to_string(),
                    selections: Self::from_selection_set(&field.node.selection_set.node),
                },
                ast::Selection::FragmentSpread(spread) => {
                    Selection::FragmentSpread(spread.node.fragment_name.node.to_string())
                }
                ast::Selection::InlineFragment(fragment) => Selection::InlineFragment(
                    Self::from_selection_set(&fragment.node.selection_set.node),
                ),
            })
            .collect()
    }

    /// Snapshot the field a resolver is executing. Fragments are already
    /// flattened by the executor.
    pub fn from_selection_field(field: SelectionField<'_>) -> Selection {
        Selection::Field {
            name: field.name().to_string(),
            selections: field
                .selection_set()
                .map(Selection::from_selection_field)
                .collect(),
        }
    }
}

/// Fragment name -> fragment selection set
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    definitions: HashMap<String, Vec<Selection>>,
}

impl Fragments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, selections: Vec<Selection>) {
        self.definitions.insert(name.into(), selections);
    }

    pub fn get(&self, name: &str) -> Option<&[Selection]> {
        self.definitions.get(name).map(Vec::as_slice)
    }

    pub fn from_document(document: &ExecutableDocument) -> Self {
        let definitions = document
            .fragments
            .iter()
            .map(|(name, fragment)| {
                (
                    name.to_string(),
                    Selection::from_selection_set(&fragment.node.selection_set.node),
                )
            })
            .collect();
        Self { definitions }
    }
}

/// Builds field masks from selections
#[derive(Debug, Clone, Copy)]
pub struct FieldMaskBuilder<'a> {
    fragments: &'a Fragments,
}

impl<'a> FieldMaskBuilder<'a> {
    pub fn new(fragments: &'a Fragments) -> Self {
        Self { fragments }
    }

    /// Project `selections`, the sub-selection of a field returning
    /// `descriptor`.
    pub fn build(&self, selections: &[Selection], descriptor: &MessageDescriptor) -> Result<FieldMask> {
        let mut paths = IndexSet::new();
        self.walk(selections, descriptor, "", &mut paths)?;
        Ok(FieldMask {
            paths: paths.into_iter().collect(),
        })
    }

    /// Project the sub-selection of the field named `field_name` found in
    /// `selections`. Yields an empty mask if no such field was selected.
    pub fn build_starting_at(
        &self,
        selections: &[Selection],
        descriptor: &MessageDescriptor,
        field_name: &str,
    ) -> Result<FieldMask> {
        let mut paths = IndexSet::new();
        self.walk_starting_at(selections, descriptor, field_name, &mut paths)?;
        Ok(FieldMask {
            paths: paths.into_iter().collect(),
        })
    }

    fn walk_starting_at(
        &self,
        selections: &[Selection],
        descriptor: &MessageDescriptor,
        field_name: &str,
        paths: &mut IndexSet<String>,
    ) -> Result<()> {
        for selection in selections {
            match selection {
                Selection::Field { name, selections } if name == field_name => {
                    self.walk(selections, descriptor, "", paths)?;
                }
                Selection::Field { .. } => {}
                Selection::FragmentSpread(fragment) => {
                    let inlined = self.fragment(fragment)?;
                    self.walk_starting_at(inlined, descriptor, field_name, paths)?;
                }
                Selection::InlineFragment(inlined) => {
                    self.walk_starting_at(inlined, descriptor, field_name, paths)?;
                }
            }
        }
        Ok(())
    }

    fn walk(
        &self,
        selections: &[Selection],
        descriptor: &MessageDescriptor,
        prefix: &str,
        paths: &mut IndexSet<String>,
    ) -> Result<()> {
        for selection in selections {
            match selection {
                Selection::Field { name, selections } => {
                    if name.starts_with("__") {
                        continue;
                    }
                    let Some(field) = naming::find_field(descriptor, name) else {
                        if !prefix.is_empty() {
                            paths.insert(format!("{}*", prefix));
                        }
                        continue;
                    };
                    match (field.kind(), selections.is_empty()) {
                        (Kind::Message(nested), false) if !field.is_map() => {
                            let nested_prefix = format!("{}{}.", prefix, field.name());
                            self.walk(selections, &nested, &nested_prefix, paths)?;
                        }
                        _ => {
                            paths.insert(format!("{}{}", prefix, field.name()));
                        }
                    }
                }
                Selection::FragmentSpread(fragment) => {
                    let inlined = self.fragment(fragment)?;
                    self.walk(inlined, descriptor, prefix, paths)?;
                }
                Selection::InlineFragment(inlined) => {
                    self.walk(inlined, descriptor, prefix, paths)?;
                }
            }
        }
        Ok(())
    }

    fn fragment(&self, name: &str) -> Result<&'a [Selection]> {
        self.fragments
            .get(name)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown fragment '{}'", name)))
    }
}

/// Project a selection against `descriptor`.
pub fn build_field_mask(
    selections: &[Selection],
    fragments: &Fragments,
    descriptor: &MessageDescriptor,
) -> Result<FieldMask> {
    FieldMaskBuilder::new(fragments).build(selections, descriptor)
}

/// Project the sub-selection of `field_name` against `descriptor`.
pub fn build_field_mask_starting_at(
    selections: &[Selection],
    fragments: &Fragments,
    descriptor: &MessageDescriptor,
    field_name: &str,
) -> Result<FieldMask> {
    FieldMaskBuilder::new(fragments).build_starting_at(selections, descriptor, field_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use async_graphql::parser::parse_query;
    use async_graphql::parser::types::DocumentOperations;

    fn paths(mask: FieldMask) -> Vec<String> {
        mask.paths
    }

    fn operation_selections(document: &ExecutableDocument) -> Vec<Selection> {
        match &document.operations {
            DocumentOperations::Single(operation) => {
                Selection::from_selection_set(&operation.node.selection_set.node)
            }
            DocumentOperations::Multiple(_) => panic!("expected a single operation"),
        }
    }

    #[test]
    fn test_nested_leaf_path() {
        let selections = vec![Selection::object("published", vec![Selection::field("year")])];
        let mask = build_field_mask(&selections, &Fragments::new(), &fixtures::book()).unwrap();
        assert_eq!(paths(mask), vec!["published.year"]);
    }

    #[test]
    fn test_unknown_nested_field_widens() {
        let selections = vec![Selection::object("published", vec![Selection::field("era")])];
        let mask = build_field_mask(&selections, &Fragments::new(), &fixtures::book()).unwrap();
        assert_eq!(paths(mask), vec!["published.*"]);
    }

    #[test]
    fn test_unknown_root_field_skipped() {
        let selections = vec![Selection::field("reviews"), Selection::field("title")];
        let mask = build_field_mask(&selections, &Fragments::new(), &fixtures::book()).unwrap();
        assert_eq!(paths(mask), vec!["title"]);
    }

    #[test]
    fn test_camel_case_names_translated() {
        let selections = vec![
            Selection::field("authorName"),
            Selection::field("pageCount"),
            Selection::field("__typename"),
        ];
        let mask = build_field_mask(&selections, &Fragments::new(), &fixtures::book()).unwrap();
        assert_eq!(paths(mask), vec!["author_name", "page_count"]);
    }

    #[test]
    fn test_names_without_snake_case_inverse() {
        let selections = vec![
            Selection::field("address1"),
            Selection::field("zipCode"),
            Selection::object("geo", vec![Selection::field("lat2"), Selection::field("lngDeg")]),
        ];
        let address = fixtures::edge_message("Address");
        let mask = build_field_mask(&selections, &Fragments::new(), &address).unwrap();
        assert_eq!(
            paths(mask),
            vec!["address_1", "zipCode", "geo.lat_2", "geo.lngDeg"]
        );
    }

    #[test]
    fn test_snake_case_selection_is_not_a_field() {
        let selections = vec![Selection::object("geo", vec![Selection::field("lat_2")])];
        let address = fixtures::edge_message("Address");
        let mask = build_field_mask(&selections, &Fragments::new(), &address).unwrap();
        assert_eq!(paths(mask), vec!["geo.*"]);
    }

    #[test]
    fn test_fragment_spread_matches_inline_form() {
        let mut fragments = Fragments::new();
        fragments.insert("DateParts", vec![Selection::field("year")]);

        let with_spread = vec![Selection::object(
            "published",
            vec![Selection::spread("DateParts")],
        )];
        let inline = vec![Selection::object("published", vec![Selection::field("year")])];

        let spread_mask = build_field_mask(&with_spread, &fragments, &fixtures::book()).unwrap();
        let inline_mask = build_field_mask(&inline, &fragments, &fixtures::book()).unwrap();
        assert_eq!(spread_mask, inline_mask);
        assert_eq!(paths(spread_mask), vec!["published.year"]);
    }

    #[test]
    fn test_unknown_fragment_is_error() {
        let selections = vec![Selection::spread("Missing")];
        let err = build_field_mask(&selections, &Fragments::new(), &fixtures::book()).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_duplicates_collapsed() {
        let selections = vec![
            Selection::field("title"),
            Selection::inline(vec![Selection::field("title")]),
            Selection::object("editions", vec![Selection::field("year"), Selection::field("day")]),
        ];
        let mask = build_field_mask(&selections, &Fragments::new(), &fixtures::book()).unwrap();
        assert_eq!(paths(mask), vec!["title", "editions.year", "editions.day"]);
    }

    #[test]
    fn test_map_field_is_leaf() {
        let selections = vec![Selection::object(
            "stock",
            vec![Selection::field("key"), Selection::field("value")],
        )];
        let mask = build_field_mask(&selections, &Fragments::new(), &fixtures::book()).unwrap();
        assert_eq!(paths(mask), vec!["stock"]);
    }

    #[test]
    fn test_from_query_document() {
        let document = parse_query(
            r#"
            query {
                getBook(input: {id: "1"}) {
                    title
                    ...Dates
                    ... on library_v1_Book { genre }
                }
            }
            fragment Dates on library_v1_Book {
                published { month day }
            }
            "#,
        )
        .unwrap();
        let fragments = Fragments::from_document(&document);
        let selections = operation_selections(&document);

        let mask = build_field_mask_starting_at(&selections, &fragments, &fixtures::book(), "getBook")
            .unwrap();
        assert_eq!(
            paths(mask),
            vec!["title", "published.month", "published.day", "genre"]
        );
    }

    #[test]
    fn test_starting_at_missing_field() {
        let selections = vec![Selection::object("getShelf", vec![Selection::field("theme")])];
        let mask = build_field_mask_starting_at(
            &selections,
            &Fragments::new(),
            &fixtures::book(),
            "getBook",
        )
        .unwrap();
        assert!(mask.paths.is_empty());
    }
}
