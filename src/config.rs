use crate::error::ErrorHandler;
use crate::http::Method;
use crate::views::Views;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

/// The default maximum size of a request body, 4 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Application settings.
///
/// `Config` can be deserialized with serde from any format; missing
/// fields take their default value. The error handler and view engine
/// are code, not data, and are set with [`Config::error_handler`] and
/// [`Config::views`].
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the application, used in logs.
    pub app_name: String,

    /// When enabled, `/Foo` and `/foo` are different routes.
    pub case_sensitive: bool,

    /// When enabled, `/foo` and `/foo/` are different routes.
    pub strict_routing: bool,

    /// Percent-decode the request path before routing.
    pub unescape_path: bool,

    /// Maximum request body size in bytes. Larger bodies are rejected
    /// with `413 Payload Too Large`.
    pub body_limit: usize,

    /// The HTTP methods the application accepts. Requests with any other
    /// method are answered with `501 Not Implemented`.
    pub request_methods: Vec<String>,

    /// Value of the `Server` response header, if any.
    pub server_header: Option<String>,

    /// Header carrying the client address when running behind a proxy,
    /// for example `X-Forwarded-For`.
    pub proxy_header: Option<String>,

    /// Only trust `proxy_header` and `X-Forwarded-*` headers when the
    /// peer is listed in `trusted_proxies`.
    pub enable_trusted_proxy_check: bool,

    /// Addresses of trusted proxies.
    pub trusted_proxies: Vec<String>,

    /// Number of dot-separated parts of the host to strip when computing
    /// [`Context::subdomains`](crate::Context::subdomains).
    pub subdomain_offset: usize,

    /// Maximum number of idle contexts kept for reuse.
    pub pool_capacity: usize,

    /// Turns errors returned by the handler chain into responses. Defaults
    /// to [`default_error_handler`](crate::default_error_handler).
    #[serde(skip)]
    pub error_handler: Option<ErrorHandler>,

    /// Template engine used by [`Context::render`](crate::Context::render).
    #[serde(skip)]
    pub views: Option<Arc<dyn Views>>,
}

impl Config {
    /// Set a custom error handler.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut crate::Context, crate::Error) -> Result<(), crate::Error> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Set the template engine used by [`Context::render`](crate::Context::render).
    pub fn views(mut self, views: impl Views + 'static) -> Self {
        self.views = Some(Arc::new(views));
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            case_sensitive: false,
            strict_routing: false,
            unescape_path: false,
            body_limit: DEFAULT_BODY_LIMIT,
            request_methods: DEFAULT_METHODS.iter().map(|m| m.to_string()).collect(),
            server_header: None,
            proxy_header: None,
            enable_trusted_proxy_check: false,
            trusted_proxies: Vec::new(),
            subdomain_offset: 2,
            pool_capacity: 1024,
            error_handler: None,
            views: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_name", &self.app_name)
            .field("case_sensitive", &self.case_sensitive)
            .field("strict_routing", &self.strict_routing)
            .field("unescape_path", &self.unescape_path)
            .field("body_limit", &self.body_limit)
            .field("request_methods", &self.request_methods)
            .field("server_header", &self.server_header)
            .field("proxy_header", &self.proxy_header)
            .field("enable_trusted_proxy_check", &self.enable_trusted_proxy_check)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("subdomain_offset", &self.subdomain_offset)
            .field("pool_capacity", &self.pool_capacity)
            .field("error_handler", &self.error_handler.is_some())
            .field("views", &self.views.is_some())
            .finish()
    }
}

const DEFAULT_METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH",
];

/// The table of recognized methods, mapping each method to the index
/// of its route bucket.
#[derive(Debug)]
pub(crate) struct Methods {
    list: Vec<Method>,
    index: HashMap<Method, usize>,
}

impl Methods {
    pub(crate) fn new(names: &[String]) -> Self {
        let mut list = Vec::with_capacity(names.len());
        let mut index = HashMap::with_capacity(names.len());

        for name in names {
            let method = Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
                .unwrap_or_else(|_| panic!("invalid request method `{}`", name));

            if index.contains_key(&method) {
                continue;
            }

            index.insert(method.clone(), list.len());
            list.push(method);
        }

        Self { list, index }
    }

    pub(crate) fn index(&self, method: &Method) -> Option<usize> {
        self.index.get(method).copied()
    }

    pub(crate) fn get(&self, index: usize) -> &Method {
        &self.list[index]
    }

    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Method> {
        self.list.iter()
    }
}
