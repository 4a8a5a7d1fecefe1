use crate::config::{Config, Methods};
use crate::context::{Context, Pool};
use crate::error::{default_error_handler, Error, ErrorHandler};
use crate::group::Group;
use crate::handler::{IntoHandlers, SharedHandler};
use crate::hooks::{self, Hooks};
use crate::http::{header, Method, Request, Response, StatusCode};
use crate::radix::RadixTree;
use crate::router::{GroupInfo, Kind, Registration, Registry, Route, Tree};
use crate::state::{State, StateMap};
use crate::static_files::{StaticConfig, StaticHandler};

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};

// Cached results of error handler lookups for mounted applications.
const MOUNT_CACHE: usize = 512;

/// An application: the route registry and everything needed to serve
/// requests with it.
///
/// `App` is a cheap handle; clones share the same routes. Routes can be
/// added at any time, requests already in flight keep the routes they
/// started with.
///
/// ```rust,ignore
/// let app = App::new();
///
/// app.use_(logger)
///     .get("/users/:id", user)
///     .name("user");
///
/// let api = app.group("/api");
/// api.post("/posts", create_post);
/// ```
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

struct AppInner {
    config: Arc<Config>,
    methods: Arc<Methods>,
    registry: RwLock<Registry>,
    // set whenever the registry changes, cleared when the tree is rebuilt
    refreshed: AtomicBool,
    rebuild: Mutex<()>,
    tree: ArcSwap<Tree>,
    state: ArcSwap<StateMap>,
    pool: Pool,
    hooks: RwLock<Hooks>,
    mounts: RadixTree<ErrorHandler>,
}

impl App {
    /// Create an application with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create an application.
    ///
    /// # Panics
    ///
    /// Panics if `config.request_methods` contains an invalid method.
    pub fn with_config(config: Config) -> Self {
        let methods = Arc::new(Methods::new(&config.request_methods));
        let config = Arc::new(config);

        let registry = Registry::new(methods.len(), config.case_sensitive, config.strict_routing);

        Self {
            inner: Arc::new(AppInner {
                registry: RwLock::new(registry),
                refreshed: AtomicBool::new(false),
                rebuild: Mutex::new(()),
                tree: ArcSwap::from_pointee(Tree::empty(methods.clone())),
                state: ArcSwap::default(),
                pool: Pool::new(config.clone()),
                hooks: RwLock::default(),
                mounts: RadixTree::with_cache(MOUNT_CACHE),
                methods,
                config,
            }),
        }
    }

    /// The configuration of the application.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Register an endpoint for a list of methods.
    ///
    /// # Panics
    ///
    /// Panics if a method is not one of the application's request methods,
    /// if the path is not a valid pattern, or if `handlers` is empty.
    pub fn add(&self, methods: &[Method], path: &str, handlers: impl IntoHandlers) -> &Self {
        let methods = self.method_indices(methods);
        self.register(methods, path, handlers.into_handlers(), None, Kind::Endpoint);
        self
    }

    /// Register an endpoint for every request method.
    pub fn all(&self, path: &str, handlers: impl IntoHandlers) -> &Self {
        self.register(self.all_methods(), path, handlers.into_handlers(), None, Kind::Endpoint);
        self
    }

    /// Register an endpoint for `GET`, also answering `HEAD` requests.
    pub fn get(&self, path: &str, handlers: impl IntoHandlers) -> &Self {
        let handlers = handlers.into_handlers();
        self.add_shared(&[Method::HEAD], path, handlers.clone(), None);
        self.add_shared(&[Method::GET], path, handlers, None);
        self
    }

    /// Register middleware for every path.
    pub fn use_(&self, handlers: impl IntoHandlers) -> &Self {
        self.use_at("/", handlers)
    }

    /// Register middleware for `path` and every path below it.
    pub fn use_at(&self, path: &str, handlers: impl IntoHandlers) -> &Self {
        self.register(self.all_methods(), path, handlers.into_handlers(), None, Kind::Use);
        self
    }

    /// Create a group of routes sharing a prefix.
    pub fn group(&self, prefix: &str) -> Group {
        self.group_with(prefix, crate::Handlers::new())
    }

    /// Create a group of routes sharing a prefix and middleware.
    ///
    /// The middleware runs before the handlers of every endpoint
    /// registered through the group.
    pub fn group_with(&self, prefix: &str, handlers: impl IntoHandlers) -> Group {
        let info = GroupInfo {
            prefix: crate::path::join("", prefix),
            name: String::new(),
        };

        let group = Group::new(self.clone(), info, handlers.into_handlers());
        self.run_group_hooks(&group);
        group
    }

    /// Attach another application under `prefix`.
    ///
    /// The routes registered on `sub` so far are copied, in order, and
    /// errors raised below the prefix are handled by the error handler of
    /// `sub`, if it has one. Routes added to `sub` later are not seen.
    ///
    /// # Panics
    ///
    /// Panics if `sub` is this application.
    pub fn mount(&self, prefix: &str, sub: &App) -> &Self {
        if Arc::ptr_eq(&self.inner, &sub.inner) {
            panic!("an application can't be mounted on itself");
        }

        let prefix = crate::path::join("", prefix);

        self.register(self.all_methods(), &prefix, Vec::new(), None, Kind::Mount);

        let imported = {
            let other = sub.inner.registry.read();
            self.inner
                .registry
                .write()
                .import(&self.inner.methods, &prefix, &other)
        };
        self.inner.refreshed.store(true, Ordering::Release);

        let base = self.mount_key(prefix.trim_end_matches('/'));
        if let Some(ref handler) = sub.inner.config.error_handler {
            self.inner.mounts.insert(format!("{}/", base), handler.clone());
        }

        for (key, handler) in sub.inner.mounts.entries() {
            self.inner.mounts.insert(format!("{}{}", base, key), handler);
        }

        tracing::debug!(prefix = %prefix, routes = imported.len(), "mounted application");

        let hooks = sub.inner.hooks.read().mount.clone();
        hooks::run("mount", &hooks, self);
        self
    }

    /// Serve files from the directory `root` under `prefix`.
    pub fn static_files(&self, prefix: &str, root: impl Into<PathBuf>, config: StaticConfig) -> &Self {
        let prefix = crate::path::join("", prefix);
        let handler = StaticHandler::new(root.into(), config);
        self.use_at(&prefix, handler)
    }

    /// Name the routes added by the last registration.
    ///
    /// Routes registered through a group are prefixed with the group name.
    pub fn name(&self, name: &str) -> &Self {
        let named = self.inner.registry.write().name_latest(name);
        self.inner.refreshed.store(true, Ordering::Release);

        let hooks = self.inner.hooks.read().name.clone();
        for route in &named {
            hooks::run("name", &hooks, route);
        }

        self
    }

    /// The route registered under `name`.
    pub fn get_route(&self, name: &str) -> Option<Route> {
        self.inner
            .registry
            .read()
            .routes()
            .into_iter()
            .find(|route| route.name() == name)
    }

    /// All routes, per request method.
    pub fn stack(&self) -> Vec<Vec<Route>> {
        self.inner.registry.read().stack.clone()
    }

    /// All routes in registration order.
    pub fn routes(&self) -> Vec<Route> {
        self.inner.registry.read().routes()
    }

    /// The number of handlers registered.
    pub fn handlers_count(&self) -> u32 {
        self.inner.registry.read().handlers_count
    }

    /// The number of registrations.
    pub fn routes_count(&self) -> u32 {
        self.inner.registry.read().routes_count
    }

    /// Inject application state, retrieved with [`Context::state`].
    ///
    /// State of the same type is replaced.
    pub fn inject<T: State>(&self, state: T) -> &Self {
        let state: Arc<dyn Any + Send + Sync> = Arc::new(state);
        self.inner.state.rcu(|map| {
            let mut map = StateMap::clone(map);
            map.insert(state.clone());
            map
        });
        self
    }

    /// Run `f` for every route added from now on.
    pub fn on_route<F>(&self, f: F) -> &Self
    where
        F: Fn(&Route) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.inner.hooks.write().route.push(Arc::new(f));
        self
    }

    /// Run `f` for every route named from now on.
    pub fn on_name<F>(&self, f: F) -> &Self
    where
        F: Fn(&Route) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.inner.hooks.write().name.push(Arc::new(f));
        self
    }

    /// Run `f` for every group created from now on.
    pub fn on_group<F>(&self, f: F) -> &Self
    where
        F: Fn(&Group) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.inner.hooks.write().group.push(Arc::new(f));
        self
    }

    /// Run `f` with the parent application when this application is mounted.
    pub fn on_mount<F>(&self, f: F) -> &Self
    where
        F: Fn(&App) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.inner.hooks.write().mount.push(Arc::new(f));
        self
    }

    /// Handle a request.
    pub async fn serve(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let request = ::http::Request::from_parts(parts, ());

        let tree = self.tree();
        let state = self.inner.state.load_full();
        let mut c = self.inner.pool.acquire(request, tree, state);

        if let Err(err) = self.dispatch(&mut c, body).await {
            self.handle_error(&mut c, err);
        }

        let response = c.take_response();
        self.inner.pool.release(c);
        response
    }

    async fn dispatch(&self, c: &mut Context, body: crate::http::Body) -> Result<(), Error> {
        if self.inner.methods.index(c.method()).is_none() {
            return Err(Error::from_status(StatusCode::NOT_IMPLEMENTED));
        }

        let body = match body.collect(self.inner.config.body_limit).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, path = %c.path(), "rejected request body");
                return Err(Error::with_status(err.status(), err));
            }
        };

        c.set_body(body);
        c.load_flash();
        c.next_route().await?;

        match c.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn handle_error(&self, c: &mut Context, err: Error) {
        let handler = self.error_handler(c.path());

        let result = match handler {
            Some(handler) => handler(c, err),
            None => default_error_handler(c, err),
        };

        if let Err(err) = result {
            tracing::error!(error = %err, path = %c.path(), "error handler failed");
            c.set(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .send_string("Internal Server Error");
        }
    }

    // The error handler of the innermost application mounted above `path`.
    fn error_handler(&self, path: &str) -> Option<ErrorHandler> {
        if !self.inner.mounts.is_empty() {
            let key = format!("{}/", self.mount_key(path.trim_end_matches('/')));
            if let Some(found) = self.inner.mounts.lookup(&key) {
                return Some(found.value);
            }
        }

        self.inner.config.error_handler.clone()
    }

    fn mount_key(&self, path: &str) -> String {
        match self.inner.config.case_sensitive {
            true => path.to_owned(),
            false => path.to_ascii_lowercase(),
        }
    }

    // The lookup tree, rebuilt if routes changed since it was built.
    fn tree(&self) -> Arc<Tree> {
        if self.inner.refreshed.load(Ordering::Acquire) {
            let _guard = self.inner.rebuild.lock();

            if self.inner.refreshed.swap(false, Ordering::AcqRel) {
                let tree = self.inner.registry.read().build_tree(self.inner.methods.clone());
                self.inner.tree.store(Arc::new(tree));
                tracing::debug!(app = %self.inner.config.app_name, "rebuilt route tree");
            }
        }

        self.inner.tree.load_full()
    }

    pub(crate) fn add_shared(
        &self,
        methods: &[Method],
        path: &str,
        handlers: Vec<SharedHandler>,
        group: Option<Arc<GroupInfo>>,
    ) {
        let methods = self.method_indices(methods);
        self.register(methods, path, handlers, group, Kind::Endpoint);
    }

    pub(crate) fn register(
        &self,
        methods: Vec<usize>,
        path: &str,
        handlers: Vec<SharedHandler>,
        group: Option<Arc<GroupInfo>>,
        kind: Kind,
    ) {
        let routes = self.inner.registry.write().register(
            &self.inner.methods,
            Registration {
                methods,
                path,
                handlers,
                group,
                kind,
            },
        );
        self.inner.refreshed.store(true, Ordering::Release);

        let hooks = self.inner.hooks.read().route.clone();
        for route in &routes {
            hooks::run("route", &hooks, route);
        }
    }

    pub(crate) fn all_methods(&self) -> Vec<usize> {
        (0..self.inner.methods.len()).collect()
    }

    pub(crate) fn run_group_hooks(&self, group: &Group) {
        let hooks = self.inner.hooks.read().group.clone();
        hooks::run("group", &hooks, group);
    }

    fn method_indices(&self, methods: &[Method]) -> Vec<usize> {
        methods
            .iter()
            .map(|method| match self.inner.methods.index(method) {
                Some(index) => index,
                None => panic!("unsupported request method `{}`", method),
            })
            .collect()
    }
}

macro_rules! insert_route {
    ($name:ident => Method::$method:ident) => {
        #[doc = concat!("Register an endpoint for the `", stringify!($method), "` method.")]
        pub fn $name(&self, path: &str, handlers: impl IntoHandlers) -> &Self {
            self.add(&[Method::$method], path, handlers)
        }
    };
}

impl App {
    insert_route!(head => Method::HEAD);
    insert_route!(post => Method::POST);
    insert_route!(put => Method::PUT);
    insert_route!(delete => Method::DELETE);
    insert_route!(connect => Method::CONNECT);
    insert_route!(options => Method::OPTIONS);
    insert_route!(trace => Method::TRACE);
    insert_route!(patch => Method::PATCH);
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.read();
        f.debug_struct("App")
            .field("config", &self.inner.config)
            .field("routes_count", &registry.routes_count)
            .field("handlers_count", &registry.handlers_count)
            .finish()
    }
}
