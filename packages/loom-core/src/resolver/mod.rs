//! Operation descriptors and resolver containers
//!
//! A [`FieldDescriptor`] is one query, mutation, field or subscription with
//! its output and input descriptors, its resolve function and metadata. A
//! [`ResolverContainer`] groups descriptors by exposed name and may be scoped
//! to a parent object, whose fields the `field` entries extend.
//!
//! ```ignore
//! let users = resolver_of(Silk::new(user.clone()))
//!     .operation("posts", field(Silk::new(GraphQLType::list(post))).resolve(load_posts))
//!     .operation("user", query(Silk::new(user)).args([("id", id_silk)]).resolve(find_user))
//!     .build();
//! ```

mod executor;
mod input;
mod operation;

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_graphql::Value;
use futures_core::Stream;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{BoxStream, StreamExt};
use indexmap::IndexMap;

pub use executor::Executor;
pub use input::{InputParser, InputShape};
pub(crate) use operation::BoundOperation;

use crate::context::ResolverPayload;
use crate::error::ResolveResult;
use crate::middleware::Middleware;
use crate::silk::Silk;

/// Resolve function: parent (or subscription event), parsed input, payload
pub type ResolveFn = Arc<
    dyn Fn(Option<Arc<Value>>, Value, ResolverPayload) -> BoxFuture<'static, ResolveResult<Value>>
        + Send
        + Sync,
>;

/// Subscribe function: parsed input, payload
pub type SubscribeFn = Arc<
    dyn Fn(Value, ResolverPayload) -> BoxFuture<'static, ResolveResult<BoxStream<'static, ResolveResult<Value>>>>
        + Send
        + Sync,
>;

/// Kind of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
    /// A field of the container's parent object
    Field,
    Subscription,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Field => "field",
            Self::Subscription => "subscription",
        };
        f.write_str(name)
    }
}

// ==================== Descriptors ====================

/// One operation or field
pub struct FieldDescriptor {
    kind: OperationKind,
    output: Silk,
    input: InputShape,
    resolve: ResolveFn,
    subscribe: Option<SubscribeFn>,
    middlewares: Vec<Middleware>,
    description: Option<String>,
    deprecation: Option<String>,
    derived_from: Vec<String>,
    extensions: IndexMap<String, serde_json::Value>,
}

impl FieldDescriptor {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn output(&self) -> &Silk {
        &self.output
    }

    pub fn input(&self) -> &InputShape {
        &self.input
    }

    pub fn middlewares(&self) -> &[Middleware] {
        &self.middlewares
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecation.as_deref()
    }

    /// Raw fields of the parent this field is computed from
    pub fn derived_from(&self) -> &[String] {
        &self.derived_from
    }

    pub fn extensions(&self) -> &IndexMap<String, serde_json::Value> {
        &self.extensions
    }

    pub(crate) fn resolve_fn(&self) -> &ResolveFn {
        &self.resolve
    }

    pub(crate) fn subscribe_fn(&self) -> Option<&SubscribeFn> {
        self.subscribe.as_ref()
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("kind", &self.kind)
            .field("output", &self.output)
            .field("input", &self.input)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

/// Marker for query and mutation builders
pub struct RootOp;
/// Marker for field builders
pub struct FieldOp;
/// Marker for subscription builders
pub struct SubscriptionOp;

/// Builder shared by all descriptor kinds
pub struct OperationBuilder<K> {
    kind: OperationKind,
    output: Silk,
    input: InputShape,
    middlewares: Vec<Middleware>,
    description: Option<String>,
    deprecation: Option<String>,
    derived_from: Vec<String>,
    extensions: IndexMap<String, serde_json::Value>,
    _kind: PhantomData<K>,
}

fn builder<K>(kind: OperationKind, output: Silk) -> OperationBuilder<K> {
    OperationBuilder {
        kind,
        output,
        input: InputShape::None,
        middlewares: Vec::new(),
        description: None,
        deprecation: None,
        derived_from: Vec::new(),
        extensions: IndexMap::new(),
        _kind: PhantomData,
    }
}

/// Start a query returning `output`
pub fn query(output: impl Into<Silk>) -> OperationBuilder<RootOp> {
    builder(OperationKind::Query, output.into())
}

/// Start a mutation returning `output`
pub fn mutation(output: impl Into<Silk>) -> OperationBuilder<RootOp> {
    builder(OperationKind::Mutation, output.into())
}

/// Start a field of the container's parent returning `output`
pub fn field(output: impl Into<Silk>) -> OperationBuilder<FieldOp> {
    builder(OperationKind::Field, output.into())
}

/// Start a subscription emitting `output`
pub fn subscription(output: impl Into<Silk>) -> OperationBuilder<SubscriptionOp> {
    builder(OperationKind::Subscription, output.into())
}

impl<K> OperationBuilder<K> {
    /// Take the whole argument object through one descriptor
    pub fn input(mut self, input: impl Into<Silk>) -> Self {
        self.input = InputShape::Single(input.into());
        self
    }

    /// Take one argument per entry
    pub fn args<I, N, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<Silk>,
    {
        self.input = InputShape::Record(
            args.into_iter()
                .map(|(name, silk)| (name.into(), silk.into()))
                .collect(),
        );
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation = Some(reason.into());
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Declare the raw parent fields this field needs
    pub fn derived_from<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.derived_from = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Attach free-form metadata for adapters
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    fn finish(self, resolve: ResolveFn, subscribe: Option<SubscribeFn>) -> FieldDescriptor {
        FieldDescriptor {
            kind: self.kind,
            output: self.output,
            input: self.input,
            resolve,
            subscribe,
            middlewares: self.middlewares,
            description: self.description,
            deprecation: self.deprecation,
            derived_from: self.derived_from,
            extensions: self.extensions,
        }
    }
}

impl OperationBuilder<RootOp> {
    /// Finish with a resolve function taking the parsed input
    pub fn resolve<F, Fut>(self, resolve: F) -> FieldDescriptor
    where
        F: Fn(Value, ResolverPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolveResult<Value>> + Send + 'static,
    {
        let resolve: ResolveFn = Arc::new(
            move |_parent: Option<Arc<Value>>, input: Value, payload: ResolverPayload| {
                resolve(input, payload).boxed()
            },
        );
        self.finish(resolve, None)
    }
}

impl OperationBuilder<FieldOp> {
    /// Finish with a resolve function taking the parent value and parsed input
    pub fn resolve<F, Fut>(self, resolve: F) -> FieldDescriptor
    where
        F: Fn(Arc<Value>, Value, ResolverPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolveResult<Value>> + Send + 'static,
    {
        let resolve: ResolveFn = Arc::new(
            move |parent: Option<Arc<Value>>, input: Value, payload: ResolverPayload| {
                let parent = parent.unwrap_or_else(|| Arc::new(Value::Null));
                resolve(parent, input, payload).boxed()
            },
        );
        self.finish(resolve, None)
    }
}

impl OperationBuilder<SubscriptionOp> {
    /// Set the function creating the source stream
    pub fn subscribe<F, Fut, S>(self, subscribe: F) -> SubscriptionBuilder
    where
        F: Fn(Value, ResolverPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolveResult<S>> + Send + 'static,
        S: Stream<Item = ResolveResult<Value>> + Send + 'static,
    {
        let subscribe: SubscribeFn = Arc::new(move |input: Value, payload: ResolverPayload| {
            let source = subscribe(input, payload);
            async move { source.await.map(|stream| stream.boxed()) }.boxed()
        });
        SubscriptionBuilder {
            base: self,
            subscribe,
        }
    }
}

/// Subscription with its source stream set
pub struct SubscriptionBuilder {
    base: OperationBuilder<SubscriptionOp>,
    subscribe: SubscribeFn,
}

impl SubscriptionBuilder {
    /// Map every event through a resolve function taking the event and parsed input
    pub fn resolve<F, Fut>(self, resolve: F) -> FieldDescriptor
    where
        F: Fn(Value, Value, ResolverPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolveResult<Value>> + Send + 'static,
    {
        let resolve: ResolveFn = Arc::new(
            move |event: Option<Arc<Value>>, input: Value, payload: ResolverPayload| {
                let event = event.map(|event| (*event).clone()).unwrap_or(Value::Null);
                resolve(event, input, payload).boxed()
            },
        );
        self.base.finish(resolve, Some(self.subscribe))
    }

    /// Emit events as they are
    pub fn build(self) -> FieldDescriptor {
        let resolve: ResolveFn = Arc::new(|event: Option<Arc<Value>>, _: Value, _: ResolverPayload| {
            let event = event.map(|event| (*event).clone()).unwrap_or(Value::Null);
            futures_util::future::ready(Ok(event)).boxed()
        });
        self.base.finish(resolve, Some(self.subscribe))
    }
}

// ==================== Containers ====================

/// One named entry of a container
#[derive(Clone)]
pub enum FieldEntry {
    Operation(Arc<FieldDescriptor>),
    /// Hide a field of the parent object
    Hidden,
}

impl fmt::Debug for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(descriptor) => f
                .debug_tuple("Operation")
                .field(&descriptor.kind)
                .finish(),
            Self::Hidden => f.write_str("Hidden"),
        }
    }
}

/// Options shared by every entry of a container
#[derive(Clone, Default)]
pub struct ResolverOptions {
    pub middlewares: Vec<Middleware>,
    pub extensions: IndexMap<String, serde_json::Value>,
}

/// A group of descriptors, optionally scoped to a parent object
#[derive(Clone)]
pub struct ResolverContainer {
    parent: Option<Silk>,
    entries: IndexMap<String, FieldEntry>,
    options: ResolverOptions,
}

impl ResolverContainer {
    pub fn parent(&self) -> Option<&Silk> {
        self.parent.as_ref()
    }

    pub fn entries(&self) -> &IndexMap<String, FieldEntry> {
        &self.entries
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Descriptor registered under `name`
    pub fn operation(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        match self.entries.get(name)? {
            FieldEntry::Operation(descriptor) => Some(descriptor),
            FieldEntry::Hidden => None,
        }
    }

    /// Call operations directly, without a schema
    pub fn executor(&self) -> Executor<'_> {
        Executor::new(self)
    }
}

impl fmt::Debug for ResolverContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverContainer")
            .field("parent", &self.parent)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ResolverContainer`]
pub struct ResolverBuilder {
    parent: Option<Silk>,
    entries: IndexMap<String, FieldEntry>,
    options: ResolverOptions,
}

/// Start a container of root operations
pub fn resolver() -> ResolverBuilder {
    ResolverBuilder {
        parent: None,
        entries: IndexMap::new(),
        options: ResolverOptions::default(),
    }
}

/// Start a container whose fields extend `parent`
pub fn resolver_of(parent: impl Into<Silk>) -> ResolverBuilder {
    ResolverBuilder {
        parent: Some(parent.into()),
        ..resolver()
    }
}

impl ResolverBuilder {
    /// Expose a descriptor under `name`; a later entry with the same name replaces it
    pub fn operation(
        mut self,
        name: impl Into<String>,
        descriptor: impl Into<Arc<FieldDescriptor>>,
    ) -> Self {
        self.entries
            .insert(name.into(), FieldEntry::Operation(descriptor.into()));
        self
    }

    /// Hide a field of the parent object
    pub fn hidden(mut self, name: impl Into<String>) -> Self {
        self.entries.insert(name.into(), FieldEntry::Hidden);
        self
    }

    /// Add a middleware for every entry of the container
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.options.middlewares.push(middleware);
        self
    }

    pub fn extension(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.extensions.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ResolverContainer {
        ResolverContainer {
            parent: self.parent,
            entries: self.entries,
            options: self.options,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::types::{ObjectType, ScalarType};

    fn hello() -> FieldDescriptor {
        query(Silk::new(ScalarType::string()))
            .description("Say hello")
            .extension("cost", 2)
            .resolve(|_, _| async { Ok(Value::from("hello")) })
    }

    #[test]
    fn test_builder_metadata() {
        let descriptor = hello();
        assert_eq!(descriptor.kind(), OperationKind::Query);
        assert_eq!(descriptor.description(), Some("Say hello"));
        assert_eq!(descriptor.extensions().get("cost"), Some(&serde_json::json!(2)));
        assert_matches!(descriptor.input(), InputShape::None);
    }

    #[test]
    fn test_args_make_record_shape() {
        let descriptor = query(Silk::new(ScalarType::string()))
            .args([("id", Silk::new(ScalarType::id())), ("lang", Silk::new(ScalarType::string()))])
            .resolve(|_, _| async { Ok(Value::Null) });
        assert_matches!(descriptor.input(), InputShape::Record(args) if args.len() == 2);
    }

    #[test]
    fn test_container_keeps_entry_order() {
        let user = ObjectType::builder("User").field("id", ScalarType::id()).build();
        let container = resolver_of(Silk::new(user))
            .operation("b", field(Silk::new(ScalarType::int())).resolve(|_, _, _| async { Ok(Value::Null) }))
            .hidden("secret")
            .operation("a", hello())
            .build();

        let names: Vec<_> = container.entries().keys().cloned().collect();
        assert_eq!(names, vec!["b", "secret", "a"]);
        assert!(container.operation("secret").is_none());
        assert!(container.parent().is_some());
    }

    #[test]
    fn test_shared_descriptor_keeps_identity() {
        let shared = Arc::new(hello());
        let first = resolver().operation("hello", shared.clone()).build();
        let second = resolver().operation("hello", shared.clone()).build();
        let (a, b) = (first.operation("hello"), second.operation("hello"));
        assert!(a.zip(b).is_some_and(|(a, b)| Arc::ptr_eq(a, b)));
    }
}
