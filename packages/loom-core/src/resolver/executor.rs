use std::sync::Arc;

use async_graphql::Value;
use futures_util::stream::BoxStream;
use indexmap::IndexMap;
use tracing::debug;

use super::{BoundOperation, FieldDescriptor, OperationKind, ResolverContainer};
use crate::config::CoreSchemaConfig;
use crate::context::{RequestContext, ResolveInfo, ResolverPayload};
use crate::error::ResolveResult;

/// Calls a container's operations without building a schema
///
/// Inputs are validated and container middlewares run exactly as they would
/// inside a woven schema. There is no query document, so the payload carries
/// no selection.
pub struct Executor<'a> {
    container: &'a ResolverContainer,
    context: RequestContext,
}

impl<'a> Executor<'a> {
    pub(super) fn new(container: &'a ResolverContainer) -> Self {
        Self {
            container,
            context: RequestContext::default(),
        }
    }

    /// Use a caller-supplied request context for every call
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Call a query or mutation
    pub async fn call(&self, name: &str, args: Value) -> ResolveResult<Value> {
        let (operation, payload) = self.prepare(name, None, args)?;
        operation.resolve(payload).await
    }

    /// Call a field of the container's parent with a parent value
    pub async fn call_field(&self, name: &str, parent: Value, args: Value) -> ResolveResult<Value> {
        let (operation, payload) = self.prepare(name, Some(Arc::new(parent)), args)?;
        operation.resolve(payload).await
    }

    /// Start a subscription and return its event stream
    pub async fn subscribe(
        &self,
        name: &str,
        args: Value,
    ) -> ResolveResult<BoxStream<'static, ResolveResult<Value>>> {
        let (operation, payload) = self.prepare(name, None, args)?;
        operation.subscribe(payload).await
    }

    fn prepare(
        &self,
        name: &str,
        parent: Option<Arc<Value>>,
        args: Value,
    ) -> ResolveResult<(BoundOperation, ResolverPayload)> {
        let descriptor = self
            .container
            .operation(name)
            .cloned()
            .ok_or_else(|| format!("no operation named \"{name}\""))?;

        let args = match args {
            Value::Object(object) => object
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
            Value::Null => IndexMap::new(),
            _ => return Err("arguments must be an object".into()),
        };

        debug!(operation = name, kind = %descriptor.kind(), "executing operation directly");

        let info = self.info(name, &descriptor);
        let payload = ResolverPayload::new(parent, args, self.context.clone(), info, descriptor.clone());
        let operation = BoundOperation::new(descriptor, &[], &self.container.options().middlewares);
        Ok((operation, payload))
    }

    fn info(&self, name: &str, descriptor: &FieldDescriptor) -> ResolveInfo {
        let roots = CoreSchemaConfig::default();
        let parent_type = match descriptor.kind() {
            OperationKind::Query => roots.query_name,
            OperationKind::Mutation => roots.mutation_name,
            OperationKind::Subscription => roots.subscription_name,
            OperationKind::Field => self
                .container
                .parent()
                .and_then(|parent| parent.get_type().name().map(str::to_string))
                .unwrap_or_default(),
        };

        // no document to select from, so the type index is never consulted
        ResolveInfo {
            field_name: name.to_string(),
            parent_type,
            return_type: descriptor.output().get_type().name().unwrap_or_default().to_string(),
            path: vec![name.to_string()],
            selection: None,
            types: Arc::default(),
        }
    }
}
