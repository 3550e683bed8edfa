use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use futures::future::BoxFuture;

use crate::error::ApiError;
use crate::router::context::RequestContext;

/// Outcome of one step of the middleware or handler chain
pub enum Flow {
    /// Hand the request to the next step
    Continue,
    /// Stop the chain and answer with this response
    Respond(Response),
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Continue => f.write_str("Continue"),
            Flow::Respond(response) => f.debug_tuple("Respond").field(&response.status()).finish(),
        }
    }
}

/// `Err` is a deliberate business failure; the dispatcher renders it as a JSON error.
pub type HandlerResult = Result<Flow, ApiError>;

/// One step of request processing.
///
/// Global middleware and route handlers share this contract. Steps run
/// strictly one after another for a given request and may mutate the context
/// for the steps that follow.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult;

    /// Name used in logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub type BoxHandler = Arc<dyn Handler>;

/// Adapter turning a plain async function into a [`Handler`]
pub struct FnHandler<F> {
    f: F,
    name: &'static str,
}

/// Wrap `fn(&mut RequestContext) -> BoxFuture<'_, HandlerResult>` as a handler
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    FnHandler {
        f,
        name: std::any::type_name::<F>(),
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        (self.f)(ctx).await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Build an ordered handler chain: `chain![RequireUser, handler_fn(bots::get_bot)]`
#[macro_export]
macro_rules! chain {
    ($($handler:expr),* $(,)?) => {
        vec![$(::std::sync::Arc::new($handler) as $crate::router::BoxHandler),*]
    };
}
