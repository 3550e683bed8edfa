use std::sync::Arc;

use axum::http::Method;

use crate::router::dispatch::Dispatcher;
use crate::router::handler::{BoxHandler, Handler};
use crate::router::path;
use crate::services::AppState;

/// A registered route: method, template and its ordered handler chain
pub struct Route {
    pub method: Method,
    pub template: String,
    pub handlers: Vec<BoxHandler>,
}

/// Immutable middleware list and route list, built once at startup
pub struct RouteTable {
    middlewares: Vec<BoxHandler>,
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn middlewares(&self) -> &[BoxHandler] {
        &self.middlewares
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// First route, in registration order, whose method and template match
    pub fn find(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.method == *method && path::matches(&route.template, path))
    }
}

/// Route registration.
///
/// Registration order is match priority: lookup is first-match-wins with no
/// specificity ranking, so overlapping templates must be registered most
/// specific first.
#[derive(Default)]
pub struct Router {
    middlewares: Vec<BoxHandler>,
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a global middleware; middlewares run in registration order
    pub fn use_middleware(mut self, middleware: impl Handler + 'static) -> Self {
        tracing::debug!("Registered middleware '{}'", middleware.name());
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn add_route(mut self, method: Method, template: impl Into<String>, handlers: Vec<BoxHandler>) -> Self {
        let template = template.into();
        tracing::debug!("Registered route {} {} ({} handlers)", method, template, handlers.len());
        self.routes.push(Route {
            method,
            template,
            handlers,
        });
        self
    }

    pub fn get(self, template: impl Into<String>, handlers: Vec<BoxHandler>) -> Self {
        self.add_route(Method::GET, template, handlers)
    }

    pub fn post(self, template: impl Into<String>, handlers: Vec<BoxHandler>) -> Self {
        self.add_route(Method::POST, template, handlers)
    }

    pub fn put(self, template: impl Into<String>, handlers: Vec<BoxHandler>) -> Self {
        self.add_route(Method::PUT, template, handlers)
    }

    pub fn delete(self, template: impl Into<String>, handlers: Vec<BoxHandler>) -> Self {
        self.add_route(Method::DELETE, template, handlers)
    }

    /// Freeze the registrations into an immutable table
    pub fn build(self) -> RouteTable {
        RouteTable {
            middlewares: self.middlewares,
            routes: self.routes,
        }
    }

    pub fn into_dispatcher(self, state: Arc<AppState>) -> Dispatcher {
        Dispatcher::new(Arc::new(self.build()), state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain;
    use crate::router::handler::{Flow, HandlerResult};
    use crate::router::RequestContext;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Handler for Noop {
        async fn call(&self, _ctx: &mut RequestContext) -> HandlerResult {
            Ok(Flow::Continue)
        }
    }

    #[test]
    fn first_registered_match_wins() {
        let table = Router::new()
            .get("/api/bots/new", chain![Noop])
            .get("/api/bots/:botId", chain![Noop, Noop])
            .build();

        let route = table.find(&Method::GET, "/api/bots/new").unwrap();
        assert_eq!(route.template, "/api/bots/new");

        let route = table.find(&Method::GET, "/api/bots/42").unwrap();
        assert_eq!(route.template, "/api/bots/:botId");
        assert_eq!(route.handlers.len(), 2);
    }

    #[test]
    fn method_must_match() {
        let table = Router::new().post("/api/bots", chain![Noop]).build();
        assert!(table.find(&Method::GET, "/api/bots").is_none());
        assert!(table.find(&Method::POST, "/api/bots").is_some());
    }

    #[test]
    fn method_wrappers_delegate_to_add_route() {
        let table = Router::new()
            .get("/a", chain![Noop])
            .post("/a", chain![Noop])
            .put("/a", chain![Noop])
            .delete("/a", chain![Noop])
            .use_middleware(Noop)
            .build();

        let methods: Vec<Method> = table.routes().iter().map(|r| r.method.clone()).collect();
        assert_eq!(methods, vec![Method::GET, Method::POST, Method::PUT, Method::DELETE]);
        assert_eq!(table.middlewares().len(), 1);
    }
}
