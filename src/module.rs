//! Declarative schema modules
//!
//! A schema module lists what it contributes to the composed schema as plain
//! [`Definition`] values: root query and mutation methods, fields added to
//! existing types, static type modifications, node lookups and extra
//! descriptor files. The [`crate::reader::ModuleReader`] turns those
//! definitions into a [`crate::SchemaBundle`].
//!
//! ```rust,no_run
//! use grpc_graphql_compose::{DeclaredModule, Method, Param, Resolved, ReturnType};
//! use prost_reflect::{DescriptorPool, DynamicMessage};
//!
//! # fn example(pool: DescriptorPool) -> grpc_graphql_compose::Result<()> {
//! let book = pool.get_message_by_name("library.v1.Book").unwrap();
//! let request = pool.get_message_by_name("library.v1.GetBookRequest").unwrap();
//!
//! let get_book = Method::new(ReturnType::message(book.clone()), move |args| {
//!     let request = args.message(0)?;
//!     let mut reply = DynamicMessage::new(book.clone());
//!     reply.set_field_by_name("id", request.get_field_by_name("id").unwrap().into_owned());
//!     Ok(Resolved::message(reply))
//! })
//! .param(Param::input(request));
//!
//! let module = DeclaredModule::new("books").query("getBook", get_book);
//! # Ok(())
//! # }
//! ```

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::modification::TypeModification;
use crate::types::FieldDefinition;
use async_graphql::Value;
use futures::future::BoxFuture;
use prost_reflect::{
    DynamicMessage, FileDescriptor, Kind, MessageDescriptor, MethodDescriptor, ReflectMessage,
    ServiceDescriptor,
};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

/// Handler invoked with the bound parameter values of one field resolution.
pub type Handler = Arc<dyn Fn(MethodArgs) -> Result<Resolved> + Send + Sync>;

/// Handler shared by every field generated from a service.
pub type ServiceHandler = Arc<dyn Fn(&MethodDescriptor, MethodArgs) -> Result<Resolved> + Send + Sync>;

/// Host collaborator lookup, called per invocation.
pub type Provider = Arc<dyn Fn(&RequestContext) -> Result<Arc<dyn Any + Send + Sync>> + Send + Sync>;

/// Declared return shape of a method
#[derive(Debug, Clone)]
pub enum ReturnType {
    Message(MessageDescriptor),
    List(Box<ReturnType>),
    Scalar(Kind),
    /// Resolved later by a future; the schema sees the inner type
    Deferred(Box<ReturnType>),
}

impl ReturnType {
    pub fn message(descriptor: MessageDescriptor) -> Self {
        ReturnType::Message(descriptor)
    }

    pub fn list_of(descriptor: MessageDescriptor) -> Self {
        ReturnType::List(Box::new(ReturnType::Message(descriptor)))
    }

    pub fn scalar(kind: Kind) -> Self {
        ReturnType::Scalar(kind)
    }

    pub fn deferred(self) -> Self {
        ReturnType::Deferred(Box::new(self))
    }

    /// The shape once deferred wrappers are removed.
    pub fn unwrapped(&self) -> &ReturnType {
        match self {
            ReturnType::Deferred(inner) => inner.unwrapped(),
            other => other,
        }
    }

    /// Message type produced by this shape, looking through lists.
    pub fn message_descriptor(&self) -> Option<&MessageDescriptor> {
        match self.unwrapped() {
            ReturnType::Message(descriptor) => Some(descriptor),
            ReturnType::List(inner) => inner.message_descriptor(),
            ReturnType::Scalar(_) | ReturnType::Deferred(_) => None,
        }
    }

    /// Check that a resolved payload has the declared shape.
    pub fn check(&self, payload: &Payload) -> Result<()> {
        match (self.unwrapped(), payload) {
            (_, Payload::Null) => Ok(()),
            (ReturnType::Message(expected), Payload::Message(message)) => {
                let actual = message.descriptor();
                if &actual == expected {
                    Ok(())
                } else {
                    Err(Error::Resolver(format!(
                        "resolved message '{}' does not match declared type '{}'",
                        actual.full_name(),
                        expected.full_name()
                    )))
                }
            }
            (ReturnType::List(inner), Payload::List(items)) => {
                for item in items {
                    if matches!(item, Payload::Null) {
                        return Err(Error::Resolver("list item resolved to null".to_string()));
                    }
                    inner.check(item)?;
                }
                Ok(())
            }
            (ReturnType::Scalar(_), Payload::Value(_)) => Ok(()),
            (expected, _) => Err(Error::Resolver(format!(
                "resolved value does not match declared {}",
                expected.describe()
            ))),
        }
    }

    fn describe(&self) -> String {
        match self {
            ReturnType::Message(d) => format!("message '{}'", d.full_name()),
            ReturnType::List(inner) => format!("list of {}", inner.describe()),
            ReturnType::Scalar(kind) => format!("scalar {:?}", kind),
            ReturnType::Deferred(inner) => format!("deferred {}", inner.describe()),
        }
    }
}

/// Declared method parameter
#[derive(Clone)]
pub enum Param {
    /// Message argument built from an input object. Inside [`Definition::Extend`]
    /// a parameter of the extended message binds to the parent value instead.
    Input {
        name: String,
        descriptor: MessageDescriptor,
    },
    /// Scalar or enum argument
    Argument { name: String, kind: Kind },
    /// The per-request [`RequestContext`]
    Context,
    /// Value supplied by the host
    Provided(Provider),
}

impl Param {
    /// Message parameter exposed as the `input` argument.
    pub fn input(descriptor: MessageDescriptor) -> Self {
        Self::named_input("input", descriptor)
    }

    pub fn named_input(name: impl Into<String>, descriptor: MessageDescriptor) -> Self {
        Param::Input {
            name: name.into(),
            descriptor,
        }
    }

    pub fn argument(name: impl Into<String>, kind: Kind) -> Self {
        Param::Argument {
            name: name.into(),
            kind,
        }
    }

    pub fn context() -> Self {
        Param::Context
    }

    pub fn provided<F, T>(factory: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<Arc<T>> + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        Param::Provided(Arc::new(move |ctx| {
            factory(ctx).map(|value| value as Arc<dyn Any + Send + Sync>)
        }))
    }
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Param::Input { name, descriptor } => f
                .debug_struct("Input")
                .field("name", name)
                .field("descriptor", &descriptor.full_name())
                .finish(),
            Param::Argument { name, kind } => f
                .debug_struct("Argument")
                .field("name", name)
                .field("kind", kind)
                .finish(),
            Param::Context => write!(f, "Context"),
            Param::Provided(_) => write!(f, "Provided"),
        }
    }
}

/// A resolvable method: return shape, parameters and handler
#[derive(Clone)]
pub struct Method {
    pub(crate) returns: ReturnType,
    pub(crate) params: Vec<Param>,
    pub(crate) handler: Handler,
    pub(crate) description: Option<String>,
    pub(crate) deprecation: Option<String>,
}

impl Method {
    pub fn new<F>(returns: ReturnType, handler: F) -> Self
    where
        F: Fn(MethodArgs) -> Result<Resolved> + Send + Sync + 'static,
    {
        Self {
            returns,
            params: Vec::new(),
            handler: Arc::new(handler),
            description: None,
            deprecation: None,
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
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

    pub fn returns(&self) -> &ReturnType {
        &self.returns
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("returns", &self.returns)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Result of a handler: available now, or produced by a future.
pub enum Resolved {
    Immediate(Payload),
    Deferred(BoxFuture<'static, Result<Payload>>),
}

impl Resolved {
    pub fn message(message: DynamicMessage) -> Self {
        Resolved::Immediate(Payload::Message(message))
    }

    pub fn messages<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = DynamicMessage>,
    {
        Resolved::Immediate(Payload::List(
            messages.into_iter().map(Payload::Message).collect(),
        ))
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Resolved::Immediate(Payload::Value(value.into()))
    }

    pub fn null() -> Self {
        Resolved::Immediate(Payload::Null)
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<Payload>> + Send + 'static,
    {
        Resolved::Deferred(Box::pin(future))
    }

    pub async fn into_payload(self) -> Result<Payload> {
        match self {
            Resolved::Immediate(payload) => Ok(payload),
            Resolved::Deferred(future) => future.await,
        }
    }
}

impl From<DynamicMessage> for Resolved {
    fn from(message: DynamicMessage) -> Self {
        Resolved::message(message)
    }
}

/// Resolved value in the shape of a [`ReturnType`]
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Null,
    Message(DynamicMessage),
    List(Vec<Payload>),
    Value(Value),
}

/// A bound parameter value
#[derive(Clone)]
pub enum ParamValue {
    /// Message built from an input argument
    Message(DynamicMessage),
    /// Parent message of an extended type
    Source(DynamicMessage),
    /// Scalar or enum argument, `None` when omitted
    Value(Option<prost_reflect::Value>),
    Context(RequestContext),
    Provided(Arc<dyn Any + Send + Sync>),
}

/// Parameter values in declaration order
#[derive(Clone, Default)]
pub struct MethodArgs {
    values: Vec<ParamValue>,
}

impl MethodArgs {
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&ParamValue> {
        self.values
            .get(index)
            .ok_or_else(|| Error::Resolver(format!("no parameter at position {}", index)))
    }

    /// Message of an input or source parameter.
    pub fn message(&self, index: usize) -> Result<&DynamicMessage> {
        match self.get(index)? {
            ParamValue::Message(message) | ParamValue::Source(message) => Ok(message),
            _ => Err(Error::Resolver(format!(
                "parameter {} is not a message",
                index
            ))),
        }
    }

    pub fn value(&self, index: usize) -> Result<Option<&prost_reflect::Value>> {
        match self.get(index)? {
            ParamValue::Value(value) => Ok(value.as_ref()),
            _ => Err(Error::Resolver(format!(
                "parameter {} is not an argument",
                index
            ))),
        }
    }

    pub fn context(&self, index: usize) -> Result<&RequestContext> {
        match self.get(index)? {
            ParamValue::Context(ctx) => Ok(ctx),
            _ => Err(Error::Resolver(format!(
                "parameter {} is not the request context",
                index
            ))),
        }
    }

    pub fn provided<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        match self.get(index)? {
            ParamValue::Provided(value) => value.clone().downcast::<T>().map_err(|_| {
                Error::Resolver(format!(
                    "parameter {} is not a {}",
                    index,
                    std::any::type_name::<T>()
                ))
            }),
            _ => Err(Error::Resolver(format!(
                "parameter {} is not a provided value",
                index
            ))),
        }
    }
}

/// One contribution of a module
#[derive(Clone, Debug)]
pub enum Definition {
    Query { name: String, method: Method },
    Mutation { name: String, method: Method },
    QueryField(FieldDefinition),
    MutationField(FieldDefinition),
    Modification(TypeModification),
    /// Adds field `field` to the object type of `on`, resolved by `method`
    Extend {
        on: MessageDescriptor,
        field: String,
        method: Method,
    },
    /// Looks up the method's output type by raw id
    Node(Method),
    /// Registers the types of a descriptor file without adding fields
    ExtraTypes(FileDescriptor),
    /// Root fields generated from whitelisted service methods
    Service(ServiceFields),
}

/// Root operation a generated field is added to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Query,
    Mutation,
}

/// Whitelisted unary methods of a service, each exposed as a root field
/// named after the method in lower camel case (`GetBook` -> `getBook`). The
/// field takes the request message as its `input` argument and returns the
/// response message.
#[derive(Clone)]
pub struct ServiceFields {
    pub(crate) service: ServiceDescriptor,
    pub(crate) methods: Vec<String>,
    pub(crate) operation: Operation,
    pub(crate) handler: ServiceHandler,
}

impl ServiceFields {
    /// `methods` may name a method as declared (`GetBook`) or by its field
    /// name (`getBook`).
    pub fn new<I, S, F>(service: ServiceDescriptor, methods: I, operation: Operation, handler: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&MethodDescriptor, MethodArgs) -> Result<Resolved> + Send + Sync + 'static,
    {
        Self {
            service,
            methods: methods.into_iter().map(Into::into).collect(),
            operation,
            handler: Arc::new(handler),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Field name and method for each whitelisted entry, in whitelist order.
    pub fn expand(&self) -> Result<Vec<(String, Method)>> {
        self.methods
            .iter()
            .map(|wanted| {
                let descriptor = self
                    .service
                    .methods()
                    .find(|m| m.name() == wanted || method_field_name(m.name()) == *wanted)
                    .ok_or_else(|| {
                        Error::Schema(format!(
                            "service '{}' has no method '{}'",
                            self.service.full_name(),
                            wanted
                        ))
                    })?;
                if descriptor.is_client_streaming() || descriptor.is_server_streaming() {
                    return Err(Error::UnsupportedReturnType(format!(
                        "streaming method '{}' cannot back a field",
                        descriptor.full_name()
                    )));
                }
                Ok((method_field_name(descriptor.name()), self.method(descriptor)))
            })
            .collect()
    }

    fn method(&self, descriptor: MethodDescriptor) -> Method {
        let handler = self.handler.clone();
        let request = descriptor.input();
        let response = descriptor.output();
        Method::new(ReturnType::message(response), move |args| handler(&descriptor, args))
            .param(Param::input(request))
    }
}

impl std::fmt::Debug for ServiceFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceFields")
            .field("service", &self.service.full_name())
            .field("methods", &self.methods)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// `ListBooks` -> `listBooks`.
fn method_field_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A unit contributing fields and modifications to the composed schema
pub trait SchemaModule: Send + Sync {
    fn name(&self) -> &str;

    /// Group this module's root fields under one field of this name.
    fn namespace(&self) -> Option<&str> {
        None
    }

    fn definitions(&self) -> Result<Vec<Definition>>;
}

/// A [`SchemaModule`] assembled from definitions at construction time
#[derive(Clone, Debug)]
pub struct DeclaredModule {
    name: String,
    namespace: Option<String>,
    definitions: Vec<Definition>,
}

impl DeclaredModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            definitions: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn define(mut self, definition: Definition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn query(self, name: impl Into<String>, method: Method) -> Self {
        self.define(Definition::Query {
            name: name.into(),
            method,
        })
    }

    pub fn mutation(self, name: impl Into<String>, method: Method) -> Self {
        self.define(Definition::Mutation {
            name: name.into(),
            method,
        })
    }

    pub fn query_field(self, field: FieldDefinition) -> Self {
        self.define(Definition::QueryField(field))
    }

    pub fn mutation_field(self, field: FieldDefinition) -> Self {
        self.define(Definition::MutationField(field))
    }

    pub fn modify(self, modification: TypeModification) -> Self {
        self.define(Definition::Modification(modification))
    }

    pub fn extend(self, on: MessageDescriptor, field: impl Into<String>, method: Method) -> Self {
        self.define(Definition::Extend {
            on,
            field: field.into(),
            method,
        })
    }

    pub fn node(self, method: Method) -> Self {
        self.define(Definition::Node(method))
    }

    pub fn extra_types(self, file: FileDescriptor) -> Self {
        self.define(Definition::ExtraTypes(file))
    }

    /// Query fields for the whitelisted methods of `service`.
    pub fn service_queries<I, S, F>(self, service: ServiceDescriptor, methods: I, handler: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&MethodDescriptor, MethodArgs) -> Result<Resolved> + Send + Sync + 'static,
    {
        self.define(Definition::Service(ServiceFields::new(
            service,
            methods,
            Operation::Query,
            handler,
        )))
    }

    /// Mutation fields for the whitelisted methods of `service`.
    pub fn service_mutations<I, S, F>(self, service: ServiceDescriptor, methods: I, handler: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&MethodDescriptor, MethodArgs) -> Result<Resolved> + Send + Sync + 'static,
    {
        self.define(Definition::Service(ServiceFields::new(
            service,
            methods,
            Operation::Mutation,
            handler,
        )))
    }
}

impl SchemaModule for DeclaredModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn definitions(&self) -> Result<Vec<Definition>> {
        Ok(self.definitions.clone())
    }
}
