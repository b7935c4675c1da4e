use std::sync::Arc;

use async_graphql::{Name, Value};
use futures_util::stream::{BoxStream, StreamExt};

use super::{FieldDescriptor, InputParser, OperationKind};
use crate::context::{provide_resolver_payload, ResolverPayload, ScopeValue, ScopedStream};
use crate::error::ResolveResult;
use crate::middleware::{
    apply_middlewares, filter_middlewares, Middleware, MiddlewareContext, MiddlewareOperation,
    Resolved,
};

/// A descriptor together with the middlewares that wrap it
#[derive(Debug, Clone)]
pub(crate) struct BoundOperation {
    descriptor: Arc<FieldDescriptor>,
    chain: Arc<[Middleware]>,
    event_chain: Arc<[Middleware]>,
}

impl BoundOperation {
    /// Bind with global and container middlewares; the descriptor's own run innermost
    pub(crate) fn new(
        descriptor: Arc<FieldDescriptor>,
        global: &[Middleware],
        container: &[Middleware],
    ) -> Self {
        let levels = [global, container, descriptor.middlewares()];
        let operation = match descriptor.kind() {
            OperationKind::Query => MiddlewareOperation::Query,
            OperationKind::Mutation => MiddlewareOperation::Mutation,
            OperationKind::Field => MiddlewareOperation::Field,
            OperationKind::Subscription => MiddlewareOperation::SubscriptionSubscribe,
        };
        let chain: Arc<[Middleware]> = filter_middlewares(operation, &levels).into();
        let event_chain: Arc<[Middleware]> = match descriptor.kind() {
            OperationKind::Subscription => {
                filter_middlewares(MiddlewareOperation::SubscriptionResolve, &levels).into()
            }
            _ => Arc::new([]),
        };

        Self {
            descriptor,
            chain,
            event_chain,
        }
    }

    pub(crate) fn descriptor(&self) -> &Arc<FieldDescriptor> {
        &self.descriptor
    }

    fn parser(&self, payload: &ResolverPayload) -> InputParser {
        let raw = Value::Object(
            payload
                .args()
                .iter()
                .map(|(name, value)| (Name::new(name), value.clone()))
                .collect(),
        );
        InputParser::new(self.descriptor.input().clone(), raw)
    }

    fn context(
        &self,
        operation: MiddlewareOperation,
        payload: &ResolverPayload,
        parser: &InputParser,
    ) -> MiddlewareContext {
        MiddlewareContext::new(operation)
            .payload(payload.clone())
            .parse_input(parser.clone())
            .output(self.descriptor.output().clone())
    }

    /// Resolve a query, mutation or field inside the payload's scope
    pub(crate) async fn resolve(&self, payload: ResolverPayload) -> ResolveResult<Value> {
        let operation = match self.descriptor.kind() {
            OperationKind::Query => MiddlewareOperation::Query,
            OperationKind::Mutation => MiddlewareOperation::Mutation,
            _ => MiddlewareOperation::Field,
        };
        let parser = self.parser(&payload);
        let context = self.context(operation, &payload, &parser);

        let descriptor = self.descriptor.clone();
        let scoped = payload.clone();
        let terminal = move || {
            let descriptor = descriptor.clone();
            let parser = parser.clone();
            let payload = scoped.clone();
            async move {
                let input = parser.value().await?;
                let parent = payload.parent().cloned();
                let value = (descriptor.resolve_fn())(parent, input, payload).await?;
                Ok(Resolved::Value(value))
            }
        };

        let chain = apply_middlewares(self.chain.clone(), terminal, context);
        provide_resolver_payload(payload, chain).await?.into_value()
    }

    /// Create a subscription's event stream
    ///
    /// The subscribe chain runs once; every event then runs through the
    /// resolve chain. The returned stream is polled inside the payload's scope.
    pub(crate) async fn subscribe(
        &self,
        payload: ResolverPayload,
    ) -> ResolveResult<BoxStream<'static, ResolveResult<Value>>> {
        let Some(subscribe) = self.descriptor.subscribe_fn().cloned() else {
            return Err("operation has no subscribe function".into());
        };

        let parser = self.parser(&payload);
        let context = self.context(MiddlewareOperation::SubscriptionSubscribe, &payload, &parser);

        let source = {
            let parser = parser.clone();
            let payload = payload.clone();
            move || {
                let subscribe = subscribe.clone();
                let parser = parser.clone();
                let payload = payload.clone();
                async move {
                    let input = parser.value().await?;
                    Ok(Resolved::Stream(subscribe(input, payload).await?))
                }
            }
        };
        let chain = apply_middlewares(self.chain.clone(), source, context);
        let source = provide_resolver_payload(payload.clone(), chain)
            .await?
            .into_stream()?;

        let this = self.clone();
        let scoped = payload.clone();
        let events = source.then(move |event| {
            let this = this.clone();
            let payload = scoped.clone();
            let parser = parser.clone();
            async move { this.resolve_event(event?, payload, parser).await }
        });

        Ok(ScopedStream::new(ScopeValue::Payload(payload), events).boxed())
    }

    async fn resolve_event(
        &self,
        event: Value,
        payload: ResolverPayload,
        parser: InputParser,
    ) -> ResolveResult<Value> {
        let context = self.context(MiddlewareOperation::SubscriptionResolve, &payload, &parser);
        let descriptor = self.descriptor.clone();
        let event = Arc::new(event);
        let terminal = move || {
            let descriptor = descriptor.clone();
            let parser = parser.clone();
            let payload = payload.clone();
            let event = event.clone();
            async move {
                let input = parser.value().await?;
                let value = (descriptor.resolve_fn())(Some(event), input, payload).await?;
                Ok(Resolved::Value(value))
            }
        };

        apply_middlewares(self.event_chain.clone(), terminal, context)
            .await?
            .into_value()
    }
}
