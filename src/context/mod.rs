//! The per-request context passed to handlers.

mod chain;
mod pool;
mod request;
mod response;

pub(crate) use pool::Pool;
pub use request::RemoteAddr;

use crate::config::Config;
use crate::error::Error;
use crate::http::{header, Body, Bytes, HeaderMap, HeaderValue, MultipartForm, Response, StatusCode};
use crate::path::detection_path;
use crate::router::{Bucket, Route, Tree};
use crate::state::{State, StateMap};

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Name of the cookie carrying flash messages between requests.
pub const FLASH_COOKIE: &str = "fennec_flash";

/// Everything a handler knows about the current request, and the
/// response being built for it.
///
/// Contexts are pooled: a `Context` is reset and reused once the
/// response has been sent. Handlers only ever see a `&mut Context`, so
/// nothing borrowed from it can outlive the handler chain. Values that
/// must be kept have to be copied out.
pub struct Context {
    config: Arc<Config>,
    tree: Arc<Tree>,
    state: Arc<StateMap>,

    request: ::http::Request<()>,
    body: Bytes,
    path: String,
    detection: String,
    method: Option<usize>,

    route: Option<Arc<Route>>,
    bucket: Bucket,
    index_route: usize,
    index_handler: usize,
    matched: bool,
    values: Vec<String>,
    error: Option<Error>,

    locals: HashMap<String, Box<dyn Any + Send + Sync>>,
    query: OnceCell<Vec<(String, String)>>,
    form: OnceCell<Vec<(String, String)>>,
    multipart: OnceCell<MultipartForm>,
    flash_received: bool,
    flash: Vec<(String, String)>,

    status: StatusCode,
    headers: HeaderMap,
    buffer: Vec<u8>,
    stream: Option<Body>,
}

impl Context {
    pub(crate) fn new(config: Arc<Config>, tree: Arc<Tree>) -> Self {
        Self {
            config,
            tree,
            state: Arc::default(),
            request: ::http::Request::new(()),
            body: Bytes::new(),
            path: String::from("/"),
            detection: String::from("/"),
            method: None,
            route: None,
            bucket: Vec::new().into(),
            index_route: 0,
            index_handler: 0,
            matched: false,
            values: Vec::with_capacity(crate::path::MAX_PARAMS),
            error: None,
            locals: HashMap::new(),
            query: OnceCell::new(),
            form: OnceCell::new(),
            multipart: OnceCell::new(),
            flash_received: false,
            flash: Vec::new(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            buffer: Vec::new(),
            stream: None,
        }
    }

    /// Prepare the context for a new request.
    pub(crate) fn reset(&mut self, request: ::http::Request<()>, tree: Arc<Tree>, state: Arc<StateMap>) {
        self.method = tree.methods.index(request.method());
        self.tree = tree;
        self.state = state;

        let path = request.uri().path();
        self.path = match self.config.unescape_path {
            true => urlencoding::decode(path)
                .map(Cow::into_owned)
                .unwrap_or_else(|_| path.to_owned()),
            false => path.to_owned(),
        };

        if self.path.is_empty() {
            self.path.push('/');
        }

        self.request = request;
        self.body = Bytes::new();

        self.route = None;
        self.index_route = 0;
        self.index_handler = 0;
        self.matched = false;
        self.values.clear();
        self.error = None;
        self.update_detection();

        self.locals.clear();
        self.query = OnceCell::new();
        self.form = OnceCell::new();
        self.multipart = OnceCell::new();
        self.flash_received = false;
        self.flash.clear();

        self.status = StatusCode::OK;
        self.headers.clear();
        self.buffer.clear();
        self.stream = None;
    }

    // Recompute the detection path and the route bucket after the path changed.
    fn update_detection(&mut self) {
        self.detection = detection_path(
            &self.path,
            self.config.case_sensitive,
            self.config.strict_routing,
        );

        self.bucket = match self.method {
            Some(method) => self.tree.bucket(method, &self.detection),
            None => Vec::new().into(),
        };
    }

    pub(crate) fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Move flash messages sent by the client into the locals.
    pub(crate) fn load_flash(&mut self) {
        let flash = match self.cookies(FLASH_COOKIE) {
            Some(value) => serde_urlencoded::from_str::<Vec<(String, String)>>(value)
                .unwrap_or_default(),
            None => return,
        };

        self.flash_received = true;
        self.locals.insert(FLASH_COOKIE.to_owned(), Box::new(flash));
    }

    /// Build the response, leaving the context ready to be released.
    pub(crate) fn take_response(&mut self) -> Response {
        if !self.flash.is_empty() {
            let value = serde_urlencoded::to_string(&self.flash).unwrap_or_default();
            self.cookie(crate::http::Cookie::new(FLASH_COOKIE, value).path("/").http_only(true));
        } else if self.flash_received {
            self.clear_cookie(&[FLASH_COOKIE]);
        }

        if let Some(ref server) = self.config.server_header {
            if let Ok(value) = HeaderValue::from_str(server) {
                self.headers.insert(header::SERVER, value);
            }
        }

        let body = match self.stream.take() {
            Some(stream) => stream,
            None => {
                if !self.buffer.is_empty() && !self.headers.contains_key(header::CONTENT_TYPE) {
                    self.headers.insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("text/plain; charset=utf-8"),
                    );
                }

                self.headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(self.buffer.len()));
                Body::once(std::mem::take(&mut self.buffer))
            }
        };

        let body = match self.request.method() == ::http::Method::HEAD {
            true => Body::empty(),
            false => body,
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        response
    }

    /// The configuration of the application.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Application state injected with [`App::inject`](crate::App::inject).
    pub fn state<T: State>(&self) -> Option<&T> {
        self.state.get::<T>()
    }

    /// A request-scoped value stored with [`set_local`](Self::set_local).
    pub fn locals<T: Any>(&self, key: &str) -> Option<&T> {
        self.locals.get(key)?.downcast_ref::<T>()
    }

    /// A mutable reference to a request-scoped value.
    pub fn locals_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.locals.get_mut(key)?.downcast_mut::<T>()
    }

    /// Store a request-scoped value, visible to the rest of the handler chain.
    pub fn set_local<T: State>(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        self.locals.insert(key.into(), Box::new(value));
        self
    }

    /// The route currently handling the request.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_deref()
    }

    /// A route parameter by name.
    ///
    /// Returns an empty string if the route has no such parameter, or if
    /// an optional parameter was absent. Names are compared case-insensitively
    /// unless the application is case sensitive.
    pub fn params(&self, key: &str) -> &str {
        let route = match self.route {
            Some(ref route) => route,
            None => return "",
        };

        let case_sensitive = self.config.case_sensitive;
        route
            .params()
            .iter()
            .position(|name| match case_sensitive {
                true => name == key,
                false => name.eq_ignore_ascii_case(key),
            })
            .and_then(|i| self.values.get(i))
            .map_or("", String::as_str)
    }

    /// A route parameter by position.
    pub fn param_at(&self, index: usize) -> &str {
        self.values.get(index).map_or("", String::as_str)
    }

    /// All parameters of the current route, as `(name, value)` pairs.
    pub fn all_params(&self) -> Vec<(&str, &str)> {
        match self.route {
            Some(ref route) => route
                .params()
                .iter()
                .zip(&self.values)
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Parse a route parameter.
    ///
    /// Fails with `400 Bad Request` if the value can't be parsed.
    pub fn params_parse<'a, T>(&'a self, key: &str) -> Result<T, Error>
    where
        T: crate::http::FromStr<'a>,
    {
        T::from_str(self.params(key)).map_err(|err| {
            Error::new(
                StatusCode::BAD_REQUEST,
                format!("invalid route parameter `{}`: {}", key, err),
            )
        })
    }

    /// The URL of a named route, with its parameters filled in.
    pub fn get_route_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, Error> {
        let route = self.tree.route_by_name(name).ok_or_else(|| {
            Error::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("no route named `{}`", name),
            )
        })?;

        let lookup = |key: &str| {
            params
                .iter()
                .find(|(name, _)| *name == key)
                .map_or("", |(_, value)| *value)
        };

        let mut url = String::new();
        for segment in route.path().split('/').skip(1) {
            let value = match segment {
                "*" | "+" => lookup(segment),
                _ => match segment.strip_prefix(':') {
                    Some(param) => {
                        let end = param
                            .find(|c: char| matches!(c, '?' | '(' | '*' | '+'))
                            .unwrap_or(param.len());
                        lookup(&param[..end])
                    }
                    None => {
                        url.push('/');
                        url.push_str(&segment.replace('\\', ""));
                        continue;
                    }
                },
            };

            if !value.is_empty() {
                url.push('/');
                url.push_str(value);
            }
        }

        if url.is_empty() {
            url.push('/');
        }

        Ok(url)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("path", &self.path)
            .field("route", &self.route.as_ref().map(|route| route.path()))
            .field("status", &self.status)
            .finish()
    }
}
