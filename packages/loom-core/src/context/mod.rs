//! Request-scoped execution context
//!
//! Every bound resolution runs inside a task-local scope holding the current
//! [`ResolverPayload`]. Anything awaited from inside that scope (middlewares,
//! resolve functions, input validators, nested helpers) can read the payload
//! through the `use_*` accessors without it being passed explicitly.
//!
//! The scope can also hold just a [`MemoizationMap`], for code that wants
//! per-scope memoization without a field being resolved (startup, tests).
//!
//! Sibling fields resolve as separate futures, each with its own scope, so
//! concurrent branches never see each other's payload.

mod loader;
mod memo;
mod stream;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use async_graphql::extensions::{Extension, ExtensionContext, ExtensionFactory, NextPrepareRequest};
use async_graphql::{Request, ServerResult, Value};
use indexmap::IndexMap;

pub use loader::RequestLoader;
pub use memo::{AsyncMemoized, Injectable, MemoEntry, MemoKey, MemoizationMap, Memoized};
pub use stream::ScopedStream;

use crate::resolver::FieldDescriptor;
use crate::selection::{
    get_resolving_fields, FieldSelection, OperationDocument, ResolvingFields, TypeIndex,
};

tokio::task_local! {
    static RESOLVER_SCOPE: ScopeValue;
}

/// What the current scope carries
#[derive(Clone)]
pub enum ScopeValue {
    /// A field is being resolved
    Payload(ResolverPayload),
    /// Only memoization is available
    Memoization(MemoizationMap),
}

// ==================== Payload ====================

/// Low-level metadata of one field resolution
#[derive(Clone, Debug, Default)]
pub struct ResolveInfo {
    pub field_name: String,
    pub parent_type: String,
    /// Name of the named type under the field's return type
    pub return_type: String,
    /// Response path, outermost first
    pub path: Vec<String>,
    /// Selection of this field in the current operation, absent outside a query
    pub selection: Option<FieldSelection>,
    /// Derived dependencies and field types of the schema's objects
    pub types: Arc<TypeIndex>,
}

struct PayloadInner {
    parent: Option<Arc<Value>>,
    args: IndexMap<String, Value>,
    context: RequestContext,
    info: ResolveInfo,
    field: Arc<FieldDescriptor>,
}

/// Everything known about one field resolution
#[derive(Clone)]
pub struct ResolverPayload {
    inner: Arc<PayloadInner>,
}

impl ResolverPayload {
    pub fn new(
        parent: Option<Arc<Value>>,
        args: IndexMap<String, Value>,
        context: RequestContext,
        info: ResolveInfo,
        field: Arc<FieldDescriptor>,
    ) -> Self {
        Self {
            inner: Arc::new(PayloadInner {
                parent,
                args,
                context,
                info,
                field,
            }),
        }
    }

    /// Value of the parent object, absent for root operations
    pub fn parent(&self) -> Option<&Arc<Value>> {
        self.inner.parent.as_ref()
    }

    /// Raw arguments as sent by the client
    pub fn args(&self) -> &IndexMap<String, Value> {
        &self.inner.args
    }

    pub fn context(&self) -> &RequestContext {
        &self.inner.context
    }

    pub fn info(&self) -> &ResolveInfo {
        &self.inner.info
    }

    /// Descriptor of the field being resolved
    pub fn field(&self) -> &Arc<FieldDescriptor> {
        &self.inner.field
    }
}

impl fmt::Debug for ResolverPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverPayload")
            .field("parent", &self.inner.parent)
            .field("args", &self.inner.args)
            .field("info", &self.inner.info)
            .finish_non_exhaustive()
    }
}

// ==================== Request context ====================

#[derive(Default)]
struct RequestContextInner {
    value: Option<Arc<dyn Any + Send + Sync>>,
    memoization: OnceLock<MemoizationMap>,
}

/// Caller-supplied context of one request
///
/// Attach it with `Request::data(RequestContext::new(value))`. Requests that
/// carry none get an empty one so memoization still works per request.
#[derive(Clone, Default)]
pub struct RequestContext {
    inner: Arc<RequestContextInner>,
}

impl RequestContext {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(RequestContextInner {
                value: Some(Arc::new(value)),
                memoization: OnceLock::new(),
            }),
        }
    }

    /// The external context, if present and of type `T`
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let value = self.inner.value.clone()?;
        value.downcast::<T>().ok()
    }

    /// Memoization map of this request, created on first use
    pub fn memoization(&self) -> MemoizationMap {
        self.inner
            .memoization
            .get_or_init(MemoizationMap::new)
            .clone()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("has_value", &self.inner.value.is_some())
            .finish_non_exhaustive()
    }
}

/// Per-request state installed by [`RequestScopeExtension`]
#[derive(Default)]
pub(crate) struct RequestScope {
    pub(crate) context: RequestContext,
    pub(crate) document: OnceLock<Arc<OperationDocument>>,
}

/// Gives every request a fresh [`RequestScope`]
pub(crate) struct RequestScopeExtension;

impl ExtensionFactory for RequestScopeExtension {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(RequestScopeExtension)
    }
}

#[async_trait::async_trait]
impl Extension for RequestScopeExtension {
    async fn prepare_request(
        &self,
        ctx: &ExtensionContext<'_>,
        request: Request,
        next: NextPrepareRequest<'_>,
    ) -> ServerResult<Request> {
        next.run(ctx, request.data(RequestScope::default())).await
    }
}

// ==================== Scopes ====================

/// Run a future with a resolver payload in scope
pub async fn provide_resolver_payload<F: Future>(payload: ResolverPayload, fut: F) -> F::Output {
    RESOLVER_SCOPE.scope(ScopeValue::Payload(payload), fut).await
}

/// Run a future with only a memoization map in scope
pub async fn provide_memoization<F: Future>(map: MemoizationMap, fut: F) -> F::Output {
    RESOLVER_SCOPE.scope(ScopeValue::Memoization(map), fut).await
}

/// Run a future with a fresh memoization map in scope
pub async fn with_memoization<F: Future>(fut: F) -> F::Output {
    provide_memoization(MemoizationMap::new(), fut).await
}

/// Run a closure with a scope value set
pub fn sync_scope<R>(value: ScopeValue, f: impl FnOnce() -> R) -> R {
    RESOLVER_SCOPE.sync_scope(value, f)
}

/// The scope value of the current task, if any
pub fn current_scope() -> Option<ScopeValue> {
    RESOLVER_SCOPE.try_with(Clone::clone).ok()
}

// ==================== Accessors ====================

/// Payload of the field being resolved
///
/// `None` outside a resolution or when only memoization is in scope.
pub fn use_resolver_payload() -> Option<ResolverPayload> {
    match current_scope()? {
        ScopeValue::Payload(payload) => Some(payload),
        ScopeValue::Memoization(_) => None,
    }
}

/// External context of the current request, if it is a `T`
pub fn use_context<T: Any + Send + Sync>() -> Option<Arc<T>> {
    use_resolver_payload()?.context().get::<T>()
}

/// Memoization map of the current scope
pub fn use_memoization_map() -> Option<MemoizationMap> {
    RESOLVER_SCOPE
        .try_with(|scope| match scope {
            ScopeValue::Payload(payload) => payload.context().memoization(),
            ScopeValue::Memoization(map) => map.clone(),
        })
        .ok()
}

/// Requested and selected fields of the field being resolved
pub fn use_resolving_fields() -> Option<ResolvingFields> {
    use_resolver_payload().map(|payload| get_resolving_fields(&payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::query;
    use crate::silk::Silk;
    use crate::types::ScalarType;

    fn payload_with(context: RequestContext) -> ResolverPayload {
        let descriptor = query(Silk::new(ScalarType::string())).resolve(|_, _| async { Ok(Value::Null) });
        ResolverPayload::new(
            None,
            IndexMap::new(),
            context,
            ResolveInfo {
                field_name: "hello".to_string(),
                ..Default::default()
            },
            Arc::new(descriptor),
        )
    }

    #[tokio::test]
    async fn test_payload_survives_await() {
        let payload = payload_with(RequestContext::new("ctx".to_string()));
        let name = provide_resolver_payload(payload, async {
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            use_resolver_payload().map(|p| p.info().field_name.clone())
        })
        .await;
        assert_eq!(name.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_no_scope_outside() {
        assert!(use_resolver_payload().is_none());
        assert!(use_memoization_map().is_none());
        assert!(use_context::<String>().is_none());
    }

    #[tokio::test]
    async fn test_use_context_downcasts() {
        let payload = payload_with(RequestContext::new(42u32));
        provide_resolver_payload(payload, async {
            assert_eq!(use_context::<u32>().as_deref(), Some(&42));
            assert!(use_context::<String>().is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn test_memoization_scope_has_no_payload() {
        with_memoization(async {
            assert!(use_resolver_payload().is_none());
            assert!(use_memoization_map().is_some());
        })
        .await;
    }

    #[tokio::test]
    async fn test_nested_scopes_restore_outer() {
        let outer = payload_with(RequestContext::default());
        provide_resolver_payload(outer, async {
            let inner = with_memoization(async { use_resolver_payload().is_none() }).await;
            assert!(inner);
            assert!(use_resolver_payload().is_some());
        })
        .await;
    }

    #[tokio::test]
    async fn test_scope_restored_after_error() {
        let outer = payload_with(RequestContext::default());
        provide_resolver_payload(outer, async {
            let failed: Result<(), &str> = with_memoization(async { Err("boom") }).await;
            assert!(failed.is_err());
            assert!(use_resolver_payload().is_some());
        })
        .await;
    }

    #[tokio::test]
    async fn test_interleaved_memoization_scopes_stay_apart() {
        let first = MemoizationMap::new();
        let second = MemoizationMap::new();

        let read_back = |map: MemoizationMap| async move {
            provide_memoization(map.clone(), async move {
                tokio::task::yield_now().await;
                let seen = use_memoization_map();
                tokio::task::yield_now().await;
                seen.is_some_and(|seen| seen.ptr_eq(&map))
                    && use_memoization_map().is_some_and(|again| again.ptr_eq(&map))
            })
            .await
        };

        let (a, b) = tokio::join!(read_back(first), read_back(second));
        assert!(a);
        assert!(b);
    }

    #[tokio::test]
    async fn test_interleaved_payload_scopes_stay_apart() {
        let read_back = |value: u32| async move {
            provide_resolver_payload(payload_with(RequestContext::new(value)), async {
                tokio::task::yield_now().await;
                let before = use_context::<u32>().map(|value| *value);
                tokio::task::yield_now().await;
                let after = use_context::<u32>().map(|value| *value);
                (before, after)
            })
            .await
        };

        let (a, b) = tokio::join!(read_back(1), read_back(2));
        assert_eq!(a, (Some(1), Some(1)));
        assert_eq!(b, (Some(2), Some(2)));
    }

    #[tokio::test]
    async fn test_request_memoization_is_shared() {
        let context = RequestContext::default();
        let first = context.memoization();
        let second = context.clone().memoization();
        assert!(first.ptr_eq(&second));
    }
}
