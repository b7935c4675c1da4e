//! Schema weaving core
//!
//! This crate assembles one async-graphql schema out of many independently
//! declared resolver containers:
//! - [`types`] and [`silk`]: the type descriptors adapters hand to the weaver
//! - [`weave`]: deduplication, auto-aliasing, field merging and emission
//! - [`resolver`]: operation descriptors and resolver containers
//! - [`middleware`]: the interceptor chain wrapped around every resolution
//! - [`context`]: request-scoped payload propagation and memoization
//! - [`selection`]: requested/derived field analysis for a single field

pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod resolver;
pub mod selection;
pub mod silk;
pub mod types;
pub mod weave;

// Re-export commonly used types
pub use config::{ConfigKey, ConfigStore, CoreSchemaConfig, CORE_SCHEMA_CONFIG};
pub use context::{
    current_scope, provide_memoization, provide_resolver_payload, sync_scope, use_context,
    use_memoization_map, use_resolver_payload, use_resolving_fields, with_memoization,
    AsyncMemoized, Injectable, MemoEntry, MemoKey, MemoizationMap, Memoized, RequestContext,
    RequestLoader, ResolveInfo, ResolverPayload, ScopeValue, ScopedStream,
};
pub use error::{mark_location, ResolveResult, WeaveError, WeaveResult};
pub use middleware::{
    apply_middlewares, filter_middlewares, Middleware, MiddlewareContext, MiddlewareOperation,
    MiddlewareOptions, Resolved,
};
pub use resolver::{
    field, mutation, query, resolver, resolver_of, subscription, Executor, FieldDescriptor,
    FieldEntry, InputParser, InputShape, OperationKind, ResolverContainer,
};
pub use selection::{
    get_deep_resolving_fields, get_resolving_fields, Depth, FieldSelection, OperationDocument,
    ResolvingFields, TypeEntry, TypeIndex,
};
pub use silk::{Issue, Silk};
pub use types::{
    EnumType, FieldDef, GraphQLType, InputFieldDef, InputObjectType, InterfaceType, ObjectType,
    ScalarType, TypeKey, UnionType,
};
pub use weave::{weave, LoomField, LoomObject, ObjectId, SchemaLoom, TypeSlot, WeaverContext};
