use super::pattern::PathPattern;
use crate::error::RouteError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Maximum methods stored inline before a route's method set spills to the heap.
pub const MAX_INLINE_METHODS: usize = 4;

/// Sorted, deduplicated set of methods a route answers
pub type MethodSet = SmallVec<[RouteMethod; MAX_INLINE_METHODS]>;

static NEXT_ROUTE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a route.
///
/// Assigned from a process-wide sequence at construction, so ids also reflect
/// creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteId(u64);

impl RouteId {
    fn next() -> Self {
        Self(NEXT_ROUTE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route-{}", self.0)
    }
}

/// Operation a route is registered for.
///
/// Besides the HTTP verbs this includes the `Before` and `After` hooks that
/// transports run around the main handler. Hooks are never dispatched
/// asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteMethod {
    Before,
    Head,
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    After,
}

impl RouteMethod {
    /// Every operation, hooks included, in registration order.
    pub const ALL: [RouteMethod; 9] = [
        RouteMethod::Before,
        RouteMethod::Head,
        RouteMethod::Get,
        RouteMethod::Post,
        RouteMethod::Put,
        RouteMethod::Patch,
        RouteMethod::Delete,
        RouteMethod::Options,
        RouteMethod::After,
    ];

    /// `false` only for the `Before` and `After` hooks
    #[inline]
    #[must_use]
    pub fn is_http_method(self) -> bool {
        !matches!(self, RouteMethod::Before | RouteMethod::After)
    }

    /// The matching `http::Method`, or `None` for hooks
    #[must_use]
    pub fn as_http_method(self) -> Option<http::Method> {
        match self {
            RouteMethod::Head => Some(http::Method::HEAD),
            RouteMethod::Get => Some(http::Method::GET),
            RouteMethod::Post => Some(http::Method::POST),
            RouteMethod::Put => Some(http::Method::PUT),
            RouteMethod::Patch => Some(http::Method::PATCH),
            RouteMethod::Delete => Some(http::Method::DELETE),
            RouteMethod::Options => Some(http::Method::OPTIONS),
            RouteMethod::Before | RouteMethod::After => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RouteMethod::Before => "BEFORE",
            RouteMethod::Head => "HEAD",
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::After => "AFTER",
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteMethod {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RouteMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RouteError::UnknownMethod(s.to_string()))
    }
}

impl TryFrom<&http::Method> for RouteMethod {
    type Error = RouteError;

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

/// Immutable description of one routable endpoint.
///
/// Equality and hashing use the route's [`RouteId`] only: two routes built
/// from the same path and methods are different routes. Cloning is cheap and
/// keeps the identity.
///
/// The `context` payload is opaque to the dispatch layer and handed to
/// handler bodies untouched.
pub struct Route<C> {
    id: RouteId,
    pattern: Arc<PathPattern>,
    methods: MethodSet,
    asynchronous: bool,
    context: Arc<C>,
}

impl<C> Route<C> {
    /// Create a route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] when the path does not parse or no methods are given.
    pub fn new(
        path: &str,
        methods: impl IntoIterator<Item = RouteMethod>,
        asynchronous: bool,
        context: C,
    ) -> Result<Self, RouteError> {
        let pattern = PathPattern::parse(path)?;

        let mut methods: MethodSet = methods.into_iter().collect();
        methods.sort_unstable();
        methods.dedup();
        if methods.is_empty() {
            return Err(RouteError::NoMethods {
                path: path.to_string(),
            });
        }

        Ok(Self {
            id: RouteId::next(),
            pattern: Arc::new(pattern),
            methods,
            asynchronous,
            context: Arc::new(context),
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> RouteId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }

    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[RouteMethod] {
        &self.methods
    }

    #[must_use]
    pub fn answers(&self, method: RouteMethod) -> bool {
        self.methods.contains(&method)
    }

    /// Whether HTTP-method requests on this route run off the calling thread
    #[inline]
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.asynchronous
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Shared handle to the context payload
    #[must_use]
    pub fn context_arc(&self) -> Arc<C> {
        Arc::clone(&self.context)
    }
}

impl<C> Clone for Route<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            pattern: Arc::clone(&self.pattern),
            methods: self.methods.clone(),
            asynchronous: self.asynchronous,
            context: Arc::clone(&self.context),
        }
    }
}

impl<C> PartialEq for Route<C> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<C> Eq for Route<C> {}

impl<C> Hash for Route<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<C: fmt::Debug> fmt::Debug for Route<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("path", &self.path())
            .field("methods", &self.methods)
            .field("async", &self.asynchronous)
            .field("context", &self.context)
            .finish()
    }
}

/// Builder for [`Route`]
#[derive(Debug, Clone)]
pub struct RouteBuilder {
    path: String,
    methods: MethodSet,
    asynchronous: bool,
}

impl RouteBuilder {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: MethodSet::new(),
            asynchronous: false,
        }
    }

    #[must_use]
    pub fn method(mut self, method: RouteMethod) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = RouteMethod>) -> Self {
        self.methods.extend(methods);
        self
    }

    #[must_use]
    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    /// Finish the route with its context payload.
    ///
    /// # Errors
    ///
    /// See [`Route::new`].
    pub fn build<C>(self, context: C) -> Result<Route<C>, RouteError> {
        Route::new(&self.path, self.methods, self.asynchronous, context)
    }
}

/// Source of routes that can be registered in bulk.
///
/// Lets feature modules expose their endpoints without the caller collecting
/// them by hand.
pub trait Routes<C> {
    fn routes(&self) -> Vec<Route<C>>;
}

impl<C> Routes<C> for Vec<Route<C>> {
    fn routes(&self) -> Vec<Route<C>> {
        self.clone()
    }
}
