//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. The router only
//! dispatches; a path with no route answers `404`, a path routed under a
//! different method answers `405`, both in the API's JSON error envelope.
//! `HEAD` without its own route runs the `GET` handler and drops the body.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::request::{Request, decode_component};
use crate::response::Response;
use crate::status::Status;

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
/// Registrations chain.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

pub(crate) enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    MethodNotAllowed,
    NotFound,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax and `req.param("name")` retrieves
    /// them:
    ///
    /// ```rust,no_run
    /// # use jokebook::{Method, Request, Response, Router};
    /// # async fn get_joke(_: Request) -> Response { Response::text("") }
    /// # async fn delete_joke(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::Get,    "/jokes/{id}", get_joke)
    ///     .on(Method::Delete, "/jokes/{id}", delete_joke);
    /// ```
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, path, handler)
    }

    pub(crate) fn lookup(&self, method: Method, path: &str) -> Lookup {
        if let Some(found) = self.find(method, path) {
            return found;
        }
        if method == Method::Head {
            if let Some(found) = self.find(Method::Get, path) {
                return found;
            }
        }

        let routed_elsewhere = self.routes.iter()
            .any(|(m, tree)| *m != method && tree.at(path).is_ok());
        if routed_elsewhere {
            Lookup::MethodNotAllowed
        } else {
            Lookup::NotFound
        }
    }

    fn find(&self, method: Method, path: &str) -> Option<Lookup> {
        let matched = self.routes.get(&method)?.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), decode_component(v)))
            .collect();
        Some(Lookup::Found(Arc::clone(matched.value), params))
    }

    /// Routes one request and produces one response.
    pub async fn handle(&self, req: Request) -> Response {
        let head = req.method == Method::Head;
        let mut res = self.route(req).await;
        if head {
            res.body.clear();
        }
        res
    }

    async fn route(&self, mut req: Request) -> Response {
        match self.lookup(req.method, &req.path) {
            Lookup::Found(handler, params) => {
                req.params = params;
                handler.call(req).await
            }
            Lookup::MethodNotAllowed => {
                debug!(method = %req.method, path = %req.path, "method not allowed");
                Response::error(
                    Status::MethodNotAllowed,
                    &format!("method {} not allowed on {}", req.method, req.path),
                )
            }
            Lookup::NotFound => {
                debug!(method = %req.method, path = %req.path, "no route");
                Response::error(Status::NotFound, &format!("no route for {}", req.path))
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
