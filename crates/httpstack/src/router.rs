// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Request dispatch with ordered before/after handler chains.
//!
//! The router keeps two tables, `before` and `after`, each keyed by HTTP
//! method and holding one entry per pattern. Dispatching a request runs:
//!
//! 1. every matching `before` entry, in registration order
//! 2. every matching `after` entry, most specific pattern first
//!
//! Within an entry, handlers run in the order they were registered.
//! Registering a pattern that already exists for the same method and phase
//! appends to its handler list. Method `ANY` registers for every method.
//!
//! # Failure semantics
//!
//! A failing handler stops the rest of its own list. A `before` failure is
//! logged and recorded in [`DispatchOutcome::before_errors`] and dispatch
//! continues, unless [`DispatchPolicy::abort_on_before_error`] is set. An
//! `after` failure is returned to the caller.
//!
//! ```rust
//! use httpstack::{Container, Handler, Request, Response, Route, Router};
//!
//! let mut router = Router::new();
//! router
//!     .register_after(Route::get("/user/{id}").handler(Handler::function(|_req, res, _c, caps| {
//!         res.set_body(format!("user {}", caps.name("id").unwrap_or("?")));
//!         Ok(())
//!     })))
//!     .unwrap();
//!
//! let mut res = Response::new();
//! router.dispatch(&Request::new("GET", "/user/7"), &mut res, &Container::new()).unwrap();
//! assert_eq!(res.body(), "user 7");
//! ```

use crate::container::Container;
use crate::error::{Error, Result};
use crate::pattern::{Captures, Matcher};
use crate::request::Request;
use crate::response::Response;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Method key that matches every request method.
pub const ANY_METHOD: &str = "ANY";

/// Which handler table a route belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Runs first, for every matching pattern (middleware).
    Before,
    /// Runs second, for every matching pattern (page handlers).
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => write!(f, "before"),
            Phase::After => write!(f, "after"),
        }
    }
}

/// A closure handler.
pub type HandlerFn =
    Arc<dyn Fn(&Request, &mut Response, &Container, &Captures) -> Result<()> + Send + Sync>;

/// A service that exposes named handler methods.
///
/// Controllers are registered in the [`Container`] as `Arc<dyn Controller>`
/// and addressed by [`Handler::Method`].
pub trait Controller: Send + Sync {
    /// Runs handler `method`.
    ///
    /// Unknown methods should fail with [`Error::NotFound`].
    fn call(
        &self,
        method: &str,
        request: &Request,
        response: &mut Response,
        container: &Container,
        captures: &Captures,
    ) -> Result<()>;
}

/// One step of a handler chain.
#[derive(Clone)]
pub enum Handler {
    /// A closure called directly.
    Function(HandlerFn),
    /// A method on a controller resolved from the container at call time.
    Method {
        /// Container name of the `Arc<dyn Controller>`.
        target: String,
        /// Method passed to [`Controller::call`].
        method: String,
    },
}

impl Handler {
    /// Wraps a closure.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Request, &mut Response, &Container, &Captures) -> Result<()> + Send + Sync + 'static,
    {
        Handler::Function(Arc::new(f))
    }

    /// Addresses `method` on the controller registered as `target`.
    pub fn method(target: impl Into<String>, method: impl Into<String>) -> Self {
        Handler::Method {
            target: target.into(),
            method: method.into(),
        }
    }

    /// Parses `"target@method"` (or `"target::method"`).
    pub fn parse(text: &str) -> Result<Self> {
        let (target, method) = text
            .split_once('@')
            .or_else(|| text.split_once("::"))
            .ok_or_else(|| Error::Handler(format!("'{}' is not of the form target@method", text)))?;
        let (target, method) = (target.trim(), method.trim());
        if target.is_empty() || method.is_empty() {
            return Err(Error::Handler(format!("'{}' has an empty target or method", text)));
        }
        Ok(Self::method(target, method))
    }

    /// Runs the handler.
    pub fn invoke(
        &self,
        request: &Request,
        response: &mut Response,
        container: &Container,
        captures: &Captures,
    ) -> Result<()> {
        match self {
            Handler::Function(f) => f(request, response, container, captures),
            Handler::Method { target, method } => {
                let controller: Arc<dyn Controller> = container.make(target)?;
                controller.call(method, request, response, container, captures)
            }
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Function(_) => write!(f, "Function(..)"),
            Handler::Method { target, method } => write!(f, "Method({}@{})", target, method),
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Function(_) => write!(f, "<closure>"),
            Handler::Method { target, method } => write!(f, "{}@{}", target, method),
        }
    }
}

/// A route to register.
#[derive(Debug, Clone)]
pub struct Route {
    /// HTTP method, or [`ANY_METHOD`].
    pub method: String,
    /// Path pattern (see [`crate::pattern`]).
    pub pattern: String,
    /// Table the route goes into.
    pub phase: Phase,
    /// Handlers, in call order.
    pub handlers: Vec<Handler>,
}

impl Route {
    /// A route with no handlers yet.
    pub fn new(method: &str, pattern: &str, phase: Phase) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            pattern: pattern.to_string(),
            phase,
            handlers: Vec::new(),
        }
    }

    /// A `GET` after-route.
    pub fn get(pattern: &str) -> Self {
        Self::new("GET", pattern, Phase::After)
    }

    /// A `POST` after-route.
    pub fn post(pattern: &str) -> Self {
        Self::new("POST", pattern, Phase::After)
    }

    /// A before-route.
    pub fn before(method: &str, pattern: &str) -> Self {
        Self::new(method, pattern, Phase::Before)
    }

    /// Appends a handler.
    pub fn handler(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }
}

#[derive(Debug)]
struct RouteEntry {
    matcher: Matcher,
    handlers: Vec<Handler>,
    seq: usize,
}

#[derive(Debug, Default)]
struct RouteTable {
    methods: HashMap<String, Vec<RouteEntry>>,
}

impl RouteTable {
    fn insert(&mut self, method: &str, matcher: Matcher, handlers: Vec<Handler>, seq: usize) {
        let entries = self.methods.entry(method.to_string()).or_default();
        match entries.iter_mut().find(|e| e.matcher.pattern() == matcher.pattern()) {
            Some(entry) => entry.handlers.extend(handlers),
            None => entries.push(RouteEntry {
                matcher,
                handlers,
                seq,
            }),
        }
    }

    /// Matching entries for `method` plus `ANY`, in registration order.
    fn matching<'a>(&'a self, method: &str, path: &str) -> Vec<(&'a RouteEntry, Captures)> {
        let keys = if method == ANY_METHOD {
            vec![ANY_METHOD]
        } else {
            vec![method, ANY_METHOD]
        };
        let mut found: Vec<(&RouteEntry, Captures)> = keys
            .iter()
            .filter_map(|m| self.methods.get(*m))
            .flatten()
            .filter_map(|e| e.matcher.matches(path).map(|c| (e, c)))
            .collect();
        found.sort_by_key(|(e, _)| e.seq);
        found
    }

    fn len(&self) -> usize {
        self.methods.values().map(Vec::len).sum()
    }
}

/// Dispatch behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Return a before-phase error immediately instead of recording it.
    pub abort_on_before_error: bool,
}

/// What a dispatch did.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Before entries whose pattern matched.
    pub before_matched: usize,
    /// After entries whose pattern matched.
    pub after_matched: usize,
    /// Handlers that ran to completion.
    pub handlers_run: usize,
    /// Errors raised by before handlers (only when not aborting).
    pub before_errors: Vec<Error>,
}

impl DispatchOutcome {
    /// True when no after entry matched the request.
    pub fn is_unrouted(&self) -> bool {
        self.after_matched == 0
    }
}

/// A registered route, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSummary {
    /// Before or after.
    pub phase: Phase,
    /// HTTP method.
    pub method: String,
    /// Path pattern.
    pub pattern: String,
    /// Handlers in call order, as `target@method` or `<closure>`.
    pub handlers: Vec<String>,
}

/// Two-phase request router.
#[derive(Debug, Default)]
pub struct Router {
    before: RouteTable,
    after: RouteTable,
    policy: DispatchPolicy,
    next_seq: usize,
}

impl Router {
    /// Creates an empty router with the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty router with `policy`.
    pub fn with_policy(policy: DispatchPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// The dispatch policy.
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Registers a route in the table named by its phase.
    ///
    /// Fails if the pattern does not compile.
    pub fn register(&mut self, route: Route) -> Result<()> {
        let matcher = Matcher::compile(&route.pattern)?;
        let method = route.method.to_ascii_uppercase();
        tracing::debug!(
            "Registering {} {} {} ({} handlers)",
            route.phase,
            method,
            route.pattern,
            route.handlers.len()
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        let table = match route.phase {
            Phase::Before => &mut self.before,
            Phase::After => &mut self.after,
        };
        table.insert(&method, matcher, route.handlers, seq);
        Ok(())
    }

    /// Registers `route` in the before table regardless of its phase field.
    pub fn register_before(&mut self, mut route: Route) -> Result<&mut Self> {
        route.phase = Phase::Before;
        self.register(route)?;
        Ok(self)
    }

    /// Registers `route` in the after table regardless of its phase field.
    pub fn register_after(&mut self, mut route: Route) -> Result<&mut Self> {
        route.phase = Phase::After;
        self.register(route)?;
        Ok(self)
    }

    /// Number of (method, pattern) entries across both tables.
    pub fn len(&self) -> usize {
        self.before.len() + self.after.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry, before table first, each in registration order.
    pub fn routes(&self) -> Vec<RouteSummary> {
        let mut out = Vec::new();
        for (phase, table) in [(Phase::Before, &self.before), (Phase::After, &self.after)] {
            let mut entries: Vec<(&String, &RouteEntry)> = table
                .methods
                .iter()
                .flat_map(|(m, es)| es.iter().map(move |e| (m, e)))
                .collect();
            entries.sort_by_key(|(_, e)| e.seq);
            out.extend(entries.into_iter().map(|(method, e)| RouteSummary {
                phase,
                method: method.clone(),
                pattern: e.matcher.pattern().to_string(),
                handlers: e.handlers.iter().map(|h| h.to_string()).collect(),
            }));
        }
        out
    }

    /// Runs the before chain, then the after chain, for `request`.
    pub fn dispatch(
        &self,
        request: &Request,
        response: &mut Response,
        container: &Container,
    ) -> Result<DispatchOutcome> {
        let mut outcome = DispatchOutcome::default();
        tracing::debug!("Dispatching {} {}", request.method, request.path);

        for (entry, captures) in self.before.matching(&request.method, &request.path) {
            outcome.before_matched += 1;
            if let Err(e) = run_chain(entry, request, response, container, &captures, &mut outcome) {
                if self.policy.abort_on_before_error {
                    return Err(e);
                }
                tracing::warn!(
                    "Before handler for '{}' failed: {}",
                    entry.matcher.pattern(),
                    e
                );
                outcome.before_errors.push(e);
            }
        }

        let mut after = self.after.matching(&request.method, &request.path);
        // Stable: equal specificity keeps registration order.
        after.sort_by_key(|(e, _)| Reverse(e.matcher.specificity()));
        for (entry, captures) in after {
            outcome.after_matched += 1;
            run_chain(entry, request, response, container, &captures, &mut outcome)?;
        }

        if outcome.is_unrouted() {
            tracing::debug!("No after route for {} {}", request.method, request.path);
        }
        Ok(outcome)
    }
}

fn run_chain(
    entry: &RouteEntry,
    request: &Request,
    response: &mut Response,
    container: &Container,
    captures: &Captures,
    outcome: &mut DispatchOutcome,
) -> Result<()> {
    for handler in &entry.handlers {
        handler.invoke(request, response, container, captures)?;
        outcome.handlers_run += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, label: &str) -> Handler {
        let log = Arc::clone(log);
        let label = label.to_string();
        Handler::function(move |req, _res, _c, caps| {
            let mut entry = format!("{}:{}", label, req.path);
            for value in caps.values() {
                entry.push_str(&format!(":{}", value));
            }
            log.lock().unwrap().push(entry);
            Ok(())
        })
    }

    fn failing(message: &str) -> Handler {
        let message = message.to_string();
        Handler::function(move |_, _, _, _| Err(Error::Handler(message.clone())))
    }

    fn run(router: &Router, method: &str, path: &str) -> Result<DispatchOutcome> {
        router.dispatch(&Request::new(method, path), &mut Response::new(), &Container::new())
    }

    #[test]
    fn test_same_key_registrations_accumulate_in_order() {
        let log = Log::default();
        let mut router = Router::new();
        router.register_after(Route::get("/home").handler(recorder(&log, "a"))).unwrap();
        router.register_after(Route::get("/home").handler(recorder(&log, "b"))).unwrap();
        assert_eq!(router.len(), 1);

        let outcome = run(&router, "GET", "/home").unwrap();
        assert_eq!(outcome.handlers_run, 2);
        assert_eq!(*log.lock().unwrap(), ["a:/home", "b:/home"]);
    }

    #[test]
    fn test_wildcard_before_fires_for_every_path() {
        let log = Log::default();
        let mut router = Router::new();
        router.register_before(Route::before("GET", "*").handler(recorder(&log, "mw"))).unwrap();
        for path in ["/", "/about", "/blog/2024/post"] {
            let outcome = run(&router, "GET", path).unwrap();
            assert_eq!(outcome.before_matched, 1);
            assert!(outcome.is_unrouted());
        }
        assert_eq!(log.lock().unwrap().len(), 3);
        assert!(run(&router, "POST", "/").unwrap().before_matched == 0);
    }

    #[test]
    fn test_before_runs_before_after_and_all_matches_fire() {
        let log = Log::default();
        let mut router = Router::new();
        router.register_after(Route::get("/blog/*").handler(recorder(&log, "wild"))).unwrap();
        router.register_after(Route::get("/blog/{slug}").handler(recorder(&log, "slug"))).unwrap();
        router.register_after(Route::get("/blog/hello").handler(recorder(&log, "exact"))).unwrap();
        router.register_before(Route::before("GET", "/blog/*").handler(recorder(&log, "b1"))).unwrap();
        router.register_before(Route::before("ANY", "*").handler(recorder(&log, "b2"))).unwrap();

        let outcome = run(&router, "GET", "/blog/hello").unwrap();
        assert_eq!((outcome.before_matched, outcome.after_matched), (2, 3));
        assert_eq!(
            *log.lock().unwrap(),
            [
                "b1:/blog/hello:hello",
                "b2:/blog/hello:/blog/hello",
                "exact:/blog/hello",
                "wild:/blog/hello:hello",
                "slug:/blog/hello:hello",
            ]
        );
    }

    #[test]
    fn test_before_error_is_recorded_and_after_still_runs() {
        let log = Log::default();
        let mut router = Router::new();
        router
            .register_before(
                Route::before("GET", "*")
                    .handler(failing("boom"))
                    .handler(recorder(&log, "skipped")),
            )
            .unwrap();
        router.register_before(Route::before("GET", "/x").handler(recorder(&log, "other"))).unwrap();
        router.register_after(Route::get("/x").handler(recorder(&log, "page"))).unwrap();

        let outcome = run(&router, "GET", "/x").unwrap();
        assert_eq!(outcome.before_errors.len(), 1);
        assert_eq!(*log.lock().unwrap(), ["other:/x", "page:/x"]);
    }

    #[test]
    fn test_abort_policy_propagates_before_error() {
        let log = Log::default();
        let mut router = Router::with_policy(DispatchPolicy {
            abort_on_before_error: true,
        });
        router.register_before(Route::before("GET", "*").handler(failing("denied"))).unwrap();
        router.register_after(Route::get("/x").handler(recorder(&log, "page"))).unwrap();

        assert!(matches!(run(&router, "GET", "/x"), Err(Error::Handler(m)) if m == "denied"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_after_error_propagates() {
        let mut router = Router::new();
        router.register_after(Route::get("/x").handler(failing("page failed"))).unwrap();
        assert!(run(&router, "GET", "/x").is_err());
    }

    struct Greeter;

    impl Controller for Greeter {
        fn call(
            &self,
            method: &str,
            _request: &Request,
            response: &mut Response,
            container: &Container,
            captures: &Captures,
        ) -> Result<()> {
            match method {
                "hello" => {
                    let greeting: String = container.make("greeting")?;
                    response.set_body(format!("{} {}", greeting, captures.name("name").unwrap_or("")));
                    Ok(())
                }
                other => Err(Error::NotFound(format!("method {}", other))),
            }
        }
    }

    #[test]
    fn test_method_handlers_resolve_through_container() {
        let container = Container::new();
        container.instance("greeting", String::from("hi"));
        container.singleton("greeter", |_| Ok(Arc::new(Greeter) as Arc<dyn Controller>));

        let mut router = Router::new();
        router
            .register_after(Route::get("/hello/{name}").handler(Handler::parse("greeter@hello").unwrap()))
            .unwrap();
        router
            .register_after(Route::get("/bye").handler(Handler::parse("greeter::bye").unwrap()))
            .unwrap();

        let mut res = Response::new();
        router.dispatch(&Request::new("GET", "/hello/ada"), &mut res, &container).unwrap();
        assert_eq!(res.body(), "hi ada");

        let err = router
            .dispatch(&Request::new("GET", "/bye"), &mut Response::new(), &container)
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(Handler::parse("nomethod").is_err());
    }

    #[test]
    fn test_routes_listing() {
        let mut router = Router::new();
        router.register_before(Route::before("get", "*").handler(Handler::method("template", "init"))).unwrap();
        router.register_after(Route::get("/").handler(Handler::method("page", "show"))).unwrap();
        assert!(router.register_after(Route::get("/{bad")).is_err());

        let routes = router.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].phase, Phase::Before);
        assert_eq!(routes[0].method, "GET");
        assert_eq!(routes[1].handlers, ["page@show"]);
    }
}
