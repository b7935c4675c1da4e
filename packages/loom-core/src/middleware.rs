//! Interceptor chain wrapped around every resolution
//!
//! Middlewares compose as a right fold: the first one listed runs first and
//! finishes last, and the last one's `next()` calls the terminal resolver.
//! Each middleware may post-process what `next()` returned, skip `next()`
//! entirely, or call it again.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_graphql::Value;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::BoxStream;
use tracing::trace;

use crate::context::ResolverPayload;
use crate::error::ResolveResult;
use crate::resolver::{InputParser, InputShape};
use crate::silk::Silk;

/// Resolution event a middleware can opt into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiddlewareOperation {
    Query,
    Mutation,
    Field,
    /// Mapping one subscription event to its output value
    SubscriptionResolve,
    /// Creating the subscription's source stream
    SubscriptionSubscribe,
}

impl MiddlewareOperation {
    /// Events a middleware handles unless told otherwise
    pub const DEFAULT: [MiddlewareOperation; 4] = [
        Self::Query,
        Self::Mutation,
        Self::Field,
        Self::SubscriptionSubscribe,
    ];
}

impl fmt::Display for MiddlewareOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Field => "field",
            Self::SubscriptionResolve => "subscription.resolve",
            Self::SubscriptionSubscribe => "subscription.subscribe",
        };
        f.write_str(name)
    }
}

/// Outcome of a resolution step
pub enum Resolved {
    Value(Value),
    /// Source stream of a subscription
    Stream(BoxStream<'static, ResolveResult<Value>>),
}

impl Resolved {
    /// The value, or an error if this is a stream
    pub fn into_value(self) -> ResolveResult<Value> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Stream(_) => Err("expected a value but the resolver produced a stream".into()),
        }
    }

    /// The stream, or an error if this is a value
    pub fn into_stream(self) -> ResolveResult<BoxStream<'static, ResolveResult<Value>>> {
        match self {
            Self::Stream(stream) => Ok(stream),
            Self::Value(_) => Err("expected a stream but the resolver produced a value".into()),
        }
    }
}

impl From<Value> for Resolved {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

type Handler = Arc<dyn Fn(MiddlewareOptions) -> BoxFuture<'static, ResolveResult<Resolved>> + Send + Sync>;

/// Terminal step of a chain
pub type Terminal = Arc<dyn Fn() -> BoxFuture<'static, ResolveResult<Resolved>> + Send + Sync>;

/// One interceptor
#[derive(Clone)]
pub struct Middleware {
    handler: Handler,
    operations: Arc<[MiddlewareOperation]>,
}

impl Middleware {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(MiddlewareOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolveResult<Resolved>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |options: MiddlewareOptions| handler(options).boxed()),
            operations: Arc::new(MiddlewareOperation::DEFAULT),
        }
    }

    /// Restrict the events this middleware runs for
    pub fn operations<I>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = MiddlewareOperation>,
    {
        self.operations = operations.into_iter().collect();
        self
    }

    pub fn applies_to(&self, operation: MiddlewareOperation) -> bool {
        self.operations.contains(&operation)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

/// What every middleware in a chain is told about the resolution
#[derive(Clone)]
pub struct MiddlewareContext {
    pub operation: MiddlewareOperation,
    pub payload: Option<ResolverPayload>,
    pub parse_input: InputParser,
    pub output: Option<Silk>,
}

impl MiddlewareContext {
    pub fn new(operation: MiddlewareOperation) -> Self {
        Self {
            operation,
            payload: None,
            parse_input: InputParser::new(InputShape::None, Value::Null),
            output: None,
        }
    }

    pub fn payload(mut self, payload: ResolverPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn parse_input(mut self, parser: InputParser) -> Self {
        self.parse_input = parser;
        self
    }

    pub fn output(mut self, output: Silk) -> Self {
        self.output = Some(output);
        self
    }
}

struct Chain {
    middlewares: Arc<[Middleware]>,
    terminal: Terminal,
    context: MiddlewareContext,
}

#[derive(Clone)]
struct Next {
    index: usize,
    chain: Arc<Chain>,
}

impl Next {
    fn run(&self) -> BoxFuture<'static, ResolveResult<Resolved>> {
        match self.chain.middlewares.get(self.index) {
            Some(middleware) => {
                trace!(
                    operation = %self.chain.context.operation,
                    index = self.index,
                    "entering middleware"
                );
                let context = &self.chain.context;
                let options = MiddlewareOptions {
                    operation: context.operation,
                    payload: context.payload.clone(),
                    parse_input: context.parse_input.clone(),
                    output: context.output.clone(),
                    next: Next {
                        index: self.index + 1,
                        chain: self.chain.clone(),
                    },
                };
                (middleware.handler)(options)
            }
            None => (self.chain.terminal)(),
        }
    }
}

/// Arguments handed to a middleware
pub struct MiddlewareOptions {
    pub operation: MiddlewareOperation,
    pub payload: Option<ResolverPayload>,
    /// Lazily validated input of the field
    pub parse_input: InputParser,
    /// Descriptor of the field's output
    pub output: Option<Silk>,
    next: Next,
}

impl MiddlewareOptions {
    /// Run the rest of the chain; may be called more than once
    pub fn next(&self) -> BoxFuture<'static, ResolveResult<Resolved>> {
        self.next.run()
    }
}

impl fmt::Debug for MiddlewareOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareOptions")
            .field("operation", &self.operation)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Run `terminal` wrapped in `middlewares`, first one outermost
pub fn apply_middlewares<F, Fut>(
    middlewares: impl Into<Arc<[Middleware]>>,
    terminal: F,
    context: MiddlewareContext,
) -> BoxFuture<'static, ResolveResult<Resolved>>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResolveResult<Resolved>> + Send + 'static,
{
    let chain = Arc::new(Chain {
        middlewares: middlewares.into(),
        terminal: Arc::new(move || terminal().boxed()),
        context,
    });
    Next { index: 0, chain }.run()
}

/// Middlewares from all levels that opt into `operation`, in level order
pub fn filter_middlewares(
    operation: MiddlewareOperation,
    levels: &[&[Middleware]],
) -> Vec<Middleware> {
    levels
        .iter()
        .flat_map(|level| level.iter())
        .filter(|middleware| middleware.applies_to(operation))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use rstest::rstest;

    use super::*;

    fn recording(log: Arc<Mutex<Vec<String>>>, name: &'static str) -> Middleware {
        Middleware::new(move |options| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("{name}-enter"));
                let result = options.next().await;
                log.lock().unwrap().push(format!("{name}-exit"));
                result
            }
        })
    }

    fn adding(amount: i64) -> Middleware {
        Middleware::new(move |options| async move {
            let value = options.next().await?.into_value()?;
            let base = match value {
                Value::Number(n) => n.as_i64().unwrap_or_default(),
                _ => 0,
            };
            Ok(Value::from(base + amount).into())
        })
    }

    #[tokio::test]
    async fn test_entry_and_exit_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let middlewares = vec![
            recording(log.clone(), "A"),
            recording(log.clone(), "B"),
            recording(log.clone(), "C"),
        ];
        let terminal_log = log.clone();
        let terminal = move || {
            let log = terminal_log.clone();
            async move {
                log.lock().unwrap().push("T".to_string());
                Ok(Resolved::Value(Value::Null))
            }
        };

        apply_middlewares(middlewares, terminal, MiddlewareContext::new(MiddlewareOperation::Query))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["A-enter", "B-enter", "C-enter", "T", "C-exit", "B-exit", "A-exit"]
        );
    }

    #[tokio::test]
    async fn test_value_chain_sums() {
        let result = apply_middlewares(
            vec![adding(1), adding(2), adding(3)],
            || async { Ok(Resolved::Value(Value::from(0))) },
            MiddlewareContext::new(MiddlewareOperation::Field),
        )
        .await
        .unwrap();
        assert_eq!(result.into_value().unwrap(), Value::from(6));
    }

    #[tokio::test]
    async fn test_short_circuit_skips_terminal() {
        let cached = Middleware::new(|_| async { Ok(Resolved::Value(Value::from("cached"))) });
        let result = apply_middlewares(
            vec![cached],
            || async { Err("terminal must not run".into()) },
            MiddlewareContext::new(MiddlewareOperation::Query),
        )
        .await
        .unwrap();
        assert_eq!(result.into_value().unwrap(), Value::from("cached"));
    }

    #[tokio::test]
    async fn test_next_can_be_called_twice() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let retry = Middleware::new(|options| async move {
            match options.next().await {
                Ok(resolved) => Ok(resolved),
                Err(_) => options.next().await,
            }
        });
        let terminal = move || {
            let counter = counter.clone();
            async move {
                let mut calls = counter.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    Err("flaky".into())
                } else {
                    Ok(Resolved::Value(Value::from(*calls)))
                }
            }
        };

        let result = apply_middlewares(
            vec![retry],
            terminal,
            MiddlewareContext::new(MiddlewareOperation::Mutation),
        )
        .await
        .unwrap();
        assert_eq!(result.into_value().unwrap(), Value::from(2));
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let result = apply_middlewares(
            vec![adding(1)],
            || async { Err("boom".into()) },
            MiddlewareContext::new(MiddlewareOperation::Query),
        )
        .await;
        assert_matches!(result, Err(err) if err.message == "boom");
    }

    #[rstest]
    #[case(MiddlewareOperation::Query, true)]
    #[case(MiddlewareOperation::Mutation, true)]
    #[case(MiddlewareOperation::Field, true)]
    #[case(MiddlewareOperation::SubscriptionSubscribe, true)]
    #[case(MiddlewareOperation::SubscriptionResolve, false)]
    fn test_default_operations(#[case] operation: MiddlewareOperation, #[case] expected: bool) {
        let middleware = Middleware::new(|options| async move { options.next().await });
        assert_eq!(middleware.applies_to(operation), expected);
    }

    #[test]
    fn test_filter_keeps_level_order() {
        let global = Middleware::new(|options| async move { options.next().await });
        let container = Middleware::new(|options| async move { options.next().await })
            .operations([MiddlewareOperation::Field]);
        let field = Middleware::new(|options| async move { options.next().await })
            .operations([MiddlewareOperation::Query]);

        let filtered = filter_middlewares(
            MiddlewareOperation::Query,
            &[&[global.clone()], &[container], &[field.clone()]],
        );
        assert_eq!(filtered.len(), 2);
        assert!(Arc::ptr_eq(&filtered[0].handler, &global.handler));
        assert!(Arc::ptr_eq(&filtered[1].handler, &field.handler));
    }
}
