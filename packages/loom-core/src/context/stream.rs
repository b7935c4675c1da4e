use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use pin_project_lite::pin_project;

use super::{ScopeValue, RESOLVER_SCOPE};

pin_project! {
    /// Stream that polls its inner stream inside a fixed scope
    ///
    /// Subscription streams are pulled by the executor long after the
    /// subscribe call returned; every pull re-enters the scope so the
    /// stream's own code still sees the payload.
    pub struct ScopedStream<S> {
        scope: ScopeValue,
        #[pin]
        inner: S,
    }
}

impl<S> ScopedStream<S> {
    pub fn new(scope: ScopeValue, inner: S) -> Self {
        Self { scope, inner }
    }
}

impl<S: Stream> Stream for ScopedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let inner = this.inner;
        RESOLVER_SCOPE.sync_scope(this.scope.clone(), move || inner.poll_next(cx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
