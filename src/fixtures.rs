//! Descriptor fixtures for unit tests.
//!
//! The fixture files are encoded with private mirrors of the descriptor
//! messages so that custom field options (the relay id extension) survive the
//! round trip through [`DescriptorPool::decode`].

use once_cell::sync::Lazy;
use prost::Message;
use prost_reflect::{DescriptorPool, EnumDescriptor, MessageDescriptor};
use prost_types::descriptor_proto::ExtensionRange;
use prost_types::field_descriptor_proto::{Label, Type};

#[derive(Clone, PartialEq, Message)]
struct RawFileSet {
    #[prost(message, repeated, tag = "1")]
    file: Vec<RawFile>,
}

#[derive(Clone, PartialEq, Message)]
struct RawFile {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(string, optional, tag = "2")]
    package: Option<String>,
    #[prost(string, repeated, tag = "3")]
    dependency: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    message_type: Vec<RawMessage>,
    #[prost(message, repeated, tag = "5")]
    enum_type: Vec<RawEnum>,
    #[prost(message, repeated, tag = "6")]
    service: Vec<RawService>,
    #[prost(message, repeated, tag = "7")]
    extension: Vec<RawField>,
    #[prost(string, optional, tag = "12")]
    syntax: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
struct RawMessage {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    field: Vec<RawField>,
    #[prost(message, repeated, tag = "3")]
    nested_type: Vec<RawMessage>,
    #[prost(message, repeated, tag = "4")]
    enum_type: Vec<RawEnum>,
    #[prost(message, repeated, tag = "5")]
    extension_range: Vec<ExtensionRange>,
    #[prost(message, optional, tag = "7")]
    options: Option<RawMessageOptions>,
}

#[derive(Clone, PartialEq, Message)]
struct RawMessageOptions {
    #[prost(bool, optional, tag = "7")]
    map_entry: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
struct RawField {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(string, optional, tag = "2")]
    extendee: Option<String>,
    #[prost(int32, optional, tag = "3")]
    number: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    label: Option<i32>,
    #[prost(int32, optional, tag = "5")]
    r#type: Option<i32>,
    #[prost(string, optional, tag = "6")]
    type_name: Option<String>,
    #[prost(message, optional, tag = "8")]
    options: Option<RawFieldOptions>,
}

#[derive(Clone, PartialEq, Message)]
struct RawFieldOptions {
    #[prost(bool, optional, tag = "3")]
    deprecated: Option<bool>,
    #[prost(bool, optional, tag = "50001")]
    relay_id: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
struct RawService {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    method: Vec<RawMethod>,
}

#[derive(Clone, PartialEq, Message)]
struct RawMethod {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(string, optional, tag = "2")]
    input_type: Option<String>,
    #[prost(string, optional, tag = "3")]
    output_type: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
struct RawEnum {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    value: Vec<RawEnumValue>,
}

#[derive(Clone, PartialEq, Message)]
struct RawEnumValue {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(int32, optional, tag = "2")]
    number: Option<i32>,
    #[prost(message, optional, tag = "3")]
    options: Option<RawEnumValueOptions>,
}

#[derive(Clone, PartialEq, Message)]
struct RawEnumValueOptions {
    #[prost(bool, optional, tag = "1")]
    deprecated: Option<bool>,
}

fn field(name: &str, number: i32, ty: Type) -> RawField {
    RawField {
        name: Some(name.into()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn typed(name: &str, number: i32, ty: Type, type_name: &str) -> RawField {
    RawField {
        type_name: Some(type_name.into()),
        ..field(name, number, ty)
    }
}

fn repeated(mut raw: RawField) -> RawField {
    raw.label = Some(Label::Repeated as i32);
    raw
}

fn deprecated(mut raw: RawField) -> RawField {
    raw.options.get_or_insert_with(Default::default).deprecated = Some(true);
    raw
}

fn relay_id(mut raw: RawField) -> RawField {
    raw.options.get_or_insert_with(Default::default).relay_id = Some(true);
    raw
}

fn message(name: &str, fields: Vec<RawField>) -> RawMessage {
    RawMessage {
        name: Some(name.into()),
        field: fields,
        ..Default::default()
    }
}

fn enum_value(name: &str, number: i32) -> RawEnumValue {
    RawEnumValue {
        name: Some(name.into()),
        number: Some(number),
        options: None,
    }
}

fn rpc(name: &str, input: &str, output: &str) -> RawMethod {
    RawMethod {
        name: Some(name.into()),
        input_type: Some(format!(".library.v1.{}", input)),
        output_type: Some(format!(".library.v1.{}", output)),
    }
}

fn proto3(name: &str, package: &str, dependency: &[&str]) -> RawFile {
    RawFile {
        name: Some(name.into()),
        package: Some(package.into()),
        dependency: dependency.iter().map(|d| d.to_string()).collect(),
        syntax: Some("proto3".into()),
        ..Default::default()
    }
}

fn descriptor_file() -> RawFile {
    let mut field_options = message(
        "FieldOptions",
        vec![field("deprecated", 3, Type::Bool)],
    );
    field_options.extension_range = vec![ExtensionRange {
        start: Some(1000),
        end: Some(536_870_912),
        options: None,
    }];

    RawFile {
        name: Some("google/protobuf/descriptor.proto".into()),
        package: Some("google.protobuf".into()),
        message_type: vec![
            field_options,
            message(
                "MessageOptions",
                vec![
                    field("deprecated", 3, Type::Bool),
                    field("map_entry", 7, Type::Bool),
                ],
            ),
            message(
                "EnumValueOptions",
                vec![field("deprecated", 1, Type::Bool)],
            ),
        ],
        ..Default::default()
    }
}

fn relay_file() -> RawFile {
    RawFile {
        name: Some("graphql/relay.proto".into()),
        package: Some("graphql".into()),
        dependency: vec!["google/protobuf/descriptor.proto".into()],
        extension: vec![RawField {
            extendee: Some(".google.protobuf.FieldOptions".into()),
            ..field("relay_id", 50001, Type::Bool)
        }],
        syntax: Some("proto3".into()),
        ..Default::default()
    }
}

fn common_file() -> RawFile {
    let mut file = proto3("library/v1/common.proto", "library.v1", &[]);
    let mut history = enum_value("HISTORY", 2);
    history.options = Some(RawEnumValueOptions {
        deprecated: Some(true),
    });
    file.enum_type = vec![RawEnum {
        name: Some("Genre".into()),
        value: vec![
            enum_value("GENRE_UNSPECIFIED", 0),
            enum_value("FICTION", 1),
            history,
        ],
    }];
    file.message_type = vec![
        message(
            "Date",
            vec![
                field("year", 1, Type::Int32),
                field("month", 2, Type::Int32),
                field("day", 3, Type::Int32),
            ],
        ),
        message("Empty", vec![]),
    ];
    file
}

fn book_file() -> RawFile {
    let mut file = proto3(
        "library/v1/book.proto",
        "library.v1",
        &["library/v1/common.proto", "graphql/relay.proto"],
    );

    let mut book = message(
        "Book",
        vec![
            relay_id(field("id", 1, Type::String)),
            field("title", 2, Type::String),
            field("author_name", 3, Type::String),
            typed("genre", 4, Type::Enum, ".library.v1.Genre"),
            repeated(field("tags", 5, Type::String)),
            typed("published", 6, Type::Message, ".library.v1.Date"),
            field("page_count", 7, Type::Int64),
            field("available", 8, Type::Bool),
            field("rating", 9, Type::Double),
            field("cover", 10, Type::Bytes),
            deprecated(field("isbn", 11, Type::String)),
            repeated(typed(
                "stock",
                12,
                Type::Message,
                ".library.v1.Book.StockEntry",
            )),
            repeated(typed("editions", 13, Type::Message, ".library.v1.Date")),
        ],
    );
    let mut stock_entry = message(
        "StockEntry",
        vec![
            field("key", 1, Type::String),
            field("value", 2, Type::Int32),
        ],
    );
    stock_entry.options = Some(RawMessageOptions {
        map_entry: Some(true),
    });
    book.nested_type = vec![stock_entry];

    let mut shelf = message(
        "Shelf",
        vec![
            typed("location", 1, Type::Message, ".library.v1.Shelf.Location"),
            field("theme", 2, Type::String),
            repeated(typed("books", 3, Type::Message, ".library.v1.Book")),
        ],
    );
    shelf.nested_type = vec![message(
        "Location",
        vec![field("room", 1, Type::String), field("row", 2, Type::Int32)],
    )];

    file.message_type = vec![
        book,
        message("GetBookRequest", vec![field("id", 1, Type::String)]),
        message(
            "ListBooksRequest",
            vec![
                field("author_name", 1, Type::String),
                typed("genre", 2, Type::Enum, ".library.v1.Genre"),
                field("page_size", 3, Type::Int32),
            ],
        ),
        message(
            "ListBooksResponse",
            vec![repeated(typed("books", 1, Type::Message, ".library.v1.Book"))],
        ),
        shelf,
    ];
    file.service = vec![RawService {
        name: Some("LibraryService".into()),
        method: vec![
            rpc("GetBook", "GetBookRequest", "Book"),
            rpc("ListBooks", "ListBooksRequest", "ListBooksResponse"),
            rpc("DeleteBook", "GetBookRequest", "Empty"),
        ],
    }];
    file
}

fn review_file() -> RawFile {
    let mut file = proto3(
        "library/v1/review.proto",
        "library.v1",
        &["library/v1/book.proto", "graphql/relay.proto"],
    );
    file.message_type = vec![
        message(
            "Review",
            vec![
                field("book_id", 1, Type::String),
                field("stars", 2, Type::Int32),
                field("comment", 3, Type::String),
            ],
        ),
        message(
            "ListReviewsRequest",
            vec![field("book_id", 1, Type::String)],
        ),
        message(
            "Author",
            vec![
                relay_id(field("handle", 1, Type::String)),
                field("id", 2, Type::Int64),
                field("name", 3, Type::String),
            ],
        ),
    ];
    file
}

fn unrelated_file() -> RawFile {
    let mut file = proto3("misc/v1/misc.proto", "misc.v1", &[]);
    file.message_type = vec![message("Orphan", vec![field("note", 1, Type::String)])];
    file
}

/// Names that do not survive a naive camel/snake round trip, and a relay
/// type whose `rawId` collides with a descriptor field.
fn naming_file() -> RawFile {
    let mut file = proto3("edge/v1/edge.proto", "edge.v1", &["graphql/relay.proto"]);
    file.message_type = vec![
        message(
            "Address",
            vec![
                field("address_1", 1, Type::String),
                field("zipCode", 2, Type::String),
                typed("geo", 3, Type::Message, ".edge.v1.Geo"),
            ],
        ),
        message(
            "Geo",
            vec![field("lat_2", 1, Type::Double), field("lngDeg", 2, Type::Double)],
        ),
        message(
            "Member",
            vec![
                relay_id(field("handle", 1, Type::String)),
                field("id", 2, Type::Int64),
                field("raw_id", 3, Type::String),
            ],
        ),
    ];
    file
}

/// Pool of the naming edge cases, kept apart from the library fixtures.
pub(crate) fn edge_pool() -> DescriptorPool {
    let set = RawFileSet {
        file: vec![descriptor_file(), relay_file(), naming_file()],
    };
    DescriptorPool::decode(set.encode_to_vec().as_slice()).expect("edge descriptors are valid")
}

pub(crate) fn edge_message(name: &str) -> MessageDescriptor {
    edge_pool()
        .get_message_by_name(&format!("edge.v1.{}", name))
        .unwrap_or_else(|| panic!("edge message {} exists", name))
}

/// `library.v1.LibraryService`.
pub(crate) fn library_service() -> prost_reflect::ServiceDescriptor {
    pool()
        .get_service_by_name("library.v1.LibraryService")
        .expect("fixture service exists")
}

/// Encoded `FileDescriptorSet` of every fixture file, dependencies first.
pub(crate) fn library_descriptor_set() -> Vec<u8> {
    RawFileSet {
        file: vec![
            descriptor_file(),
            relay_file(),
            common_file(),
            book_file(),
            review_file(),
            unrelated_file(),
        ],
    }
    .encode_to_vec()
}

static POOL: Lazy<DescriptorPool> = Lazy::new(|| {
    DescriptorPool::decode(library_descriptor_set().as_slice())
        .expect("fixture descriptors are valid")
});

pub(crate) fn pool() -> DescriptorPool {
    POOL.clone()
}

/// Message `library.v1.<name>` (nested names use dots).
pub(crate) fn message_descriptor(name: &str) -> MessageDescriptor {
    pool()
        .get_message_by_name(&format!("library.v1.{}", name))
        .unwrap_or_else(|| panic!("fixture message {} exists", name))
}

pub(crate) fn genre() -> EnumDescriptor {
    pool()
        .get_enum_by_name("library.v1.Genre")
        .expect("fixture enum exists")
}

pub(crate) fn book() -> MessageDescriptor {
    message_descriptor("Book")
}
