use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::schema::Service;
use crate::{Error, Result};

pub(super) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Type-erased request handler for service `S`.
///
/// Wrapped in Arc for cheap cloning into per-request tasks.
pub(super) type BoxedHandler<S> = Arc<
    dyn Fn(<S as Service>::Request) -> BoxFuture<Result<<S as Service>::Response>> + Send + Sync,
>;

/// Wrap an async handler.
pub(super) fn wrap_async<S, F, Fut>(handler: F) -> BoxedHandler<S>
where
    S: Service,
    F: Fn(S::Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S::Response>> + Send + 'static,
{
    // ---
    Arc::new(move |request: S::Request| Box::pin(handler(request)) as BoxFuture<_>)
}

/// Wrap a synchronous handler so each invocation runs on the blocking pool.
pub(super) fn wrap_blocking<S, F>(handler: F) -> BoxedHandler<S>
where
    S: Service,
    F: Fn(S::Request) -> Result<S::Response> + Send + Sync + 'static,
{
    // ---
    let handler = Arc::new(handler);
    Arc::new(move |request: S::Request| {
        let handler = handler.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || (*handler)(request))
                .await
                .map_err(|err| Error::handler(format!("blocking handler did not complete: {err}")))?
        }) as BoxFuture<_>
    })
}
