//! # grpc-graphql-compose
//!
//! Compose a GraphQL schema from protobuf descriptors and schema modules.
//!
//! ## Features
//!
//! - **Descriptor translation**: every message becomes an object type and an
//!   `Input_` input type, every enum an enum type
//! - **Schema modules**: root queries and mutations, fields generated from
//!   service methods, fields added to existing types, static type
//!   modifications and namespaces
//! - **Relay**: `Node` interface, global ids and a root `node(id)` field
//! - **Field masks**: project a GraphQL selection onto protobuf field paths
//! - **Dynamic schema**: the result is an `async_graphql::dynamic::Schema`
//!
//! ## Main Components
//!
//! - [`SchemaBuilder`]: collects descriptors and modules and builds the schema.
//! - [`DeclaredModule`] / [`SchemaModule`]: what a module contributes.
//! - [`Method`]: return type, parameters and handler of a resolved field.
//! - [`FieldMaskBuilder`]: selection to `google.protobuf.FieldMask` projection.
//!
//! ## Example
//!
//! ```rust,no_run
//! use grpc_graphql_compose::{DeclaredModule, Method, Param, Resolved, ReturnType, SchemaBuilder};
//! use prost_reflect::{DescriptorPool, DynamicMessage};
//!
//! # async fn example(descriptor_set: Vec<u8>) -> grpc_graphql_compose::Result<()> {
//! let pool = DescriptorPool::decode(descriptor_set.as_slice())?;
//! let book = pool.get_message_by_name("library.v1.Book").unwrap();
//! let request = pool.get_message_by_name("library.v1.GetBookRequest").unwrap();
//!
//! let books = DeclaredModule::new("books").query(
//!     "getBook",
//!     Method::new(ReturnType::message(book.clone()), move |_args| {
//!         Ok(Resolved::message(DynamicMessage::new(book.clone())))
//!     })
//!     .param(Param::input(request)),
//! );
//!
//! let schema = SchemaBuilder::new()
//!     .with_descriptor_set_bytes(&descriptor_set)
//!     .add_module(books)
//!     .build()?;
//!
//! let response = schema.execute(r#"{ getBook(input: {id: "1"}) { title } }"#).await;
//! println!("{}", schema.sdl());
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod catalog;
pub mod comments;
pub mod config;
pub mod context;
pub mod error;
pub mod field_mask;
pub mod input;
pub mod modification;
pub mod module;
pub mod naming;
pub mod reader;
pub mod registry;
pub mod relay;
pub mod resolver;
pub mod schema;
pub mod translate;
pub mod types;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use bundle::SchemaBundle;
pub use catalog::{CatalogBuilder, DescriptorCatalog};
pub use comments::CommentMap;
pub use config::SchemaOptions;
pub use context::{RequestContext, RequestData};
pub use error::{Error, GraphQLError, Result};
pub use field_mask::{
    build_field_mask, build_field_mask_starting_at, FieldMaskBuilder, Fragments, Selection,
};
pub use input::{create_message, fill_message, InputConverter};
pub use modification::{ModifiableType, ModificationOp, TypeModification};
pub use module::{
    DeclaredModule, Definition, Method, MethodArgs, Operation, Param, ParamValue, Payload,
    Resolved, ReturnType, SchemaModule, ServiceFields,
};
pub use naming::{find_field, input_reference_name, reference_name, to_camel_case, to_snake_case};
pub use reader::ModuleReader;
pub use registry::TypeRegistry;
pub use relay::{decode_global_id, encode_global_id, NodeResolver};
pub use resolver::Resolver;
pub use schema::{DynamicSchema, SchemaBuilder};
pub use translate::{ScalarMapping, TypeTranslator};
pub use types::{
    EnumType, FieldDefinition, InputObjectType, InputValueDefinition, ObjectType, TranslatedType,
    TypeExpr,
};
pub use value::{message_to_value, prost_value_to_graphql};
