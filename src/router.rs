//! Route records and the lookup structures built from them.

use crate::config::Methods;
use crate::handler::SharedHandler;
use crate::http::Method;
use crate::path::{canonicalize, RouteParser};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A registered route.
#[derive(Clone)]
pub struct Route {
    pub(crate) pos: u32,
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) pretty: String,
    pub(crate) parser: RouteParser,
    pub(crate) handlers: Vec<SharedHandler>,
    pub(crate) group: Option<Arc<GroupInfo>>,
    pub(crate) name: String,
    pub(crate) use_: bool,
    pub(crate) mount: bool,
    pub(crate) star: bool,
    pub(crate) root: bool,
}

/// The group a route was registered through.
#[derive(Clone, Debug, Default)]
pub(crate) struct GroupInfo {
    pub(crate) prefix: String,
    pub(crate) name: String,
}

impl Route {
    /// The method of this route. Middleware is registered once per method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path pattern, as registered.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The canonical path pattern used to compare routes.
    pub fn pretty_path(&self) -> &str {
        &self.pretty
    }

    /// The name given with [`App::name`](crate::App::name), or an empty string.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter names of the pattern.
    pub fn params(&self) -> &[String] {
        self.parser.params()
    }

    /// Whether this route is middleware, matching any path it is a prefix of.
    pub fn is_use(&self) -> bool {
        self.use_
    }

    /// Whether this route marks the prefix of a mounted application.
    pub fn is_mount(&self) -> bool {
        self.mount
    }

    /// The number of handlers of this route.
    pub fn handlers_len(&self) -> usize {
        self.handlers.len()
    }

    /// The prefix of the group the route was registered through, if any.
    pub fn group_prefix(&self) -> Option<&str> {
        self.group.as_ref().map(|group| group.prefix.as_str())
    }

    pub(crate) fn matches(&self, detection: &str, original: &str, values: &mut Vec<String>) -> bool {
        if self.root && self.use_ {
            values.clear();
            return true;
        }

        if self.star {
            values.clear();
            values.push(original.get(1..detection.len()).unwrap_or_default().to_owned());
            return true;
        }

        if self.root {
            if detection != "/" {
                return false;
            }

            values.clear();
            return true;
        }

        self.parser.match_into(detection, original, self.use_, values)
    }

    // The first bytes of the constant prefix of the pattern. The separator
    // in front of a parameter is not part of the prefix, because optional
    // and `*` parameters also match without it.
    fn tree_key(&self) -> Option<TreeKey> {
        let prefix = match self.pretty.find(|c: char| matches!(c, ':' | '*' | '+' | '(')) {
            Some(end) => self.pretty[..end].trim_end_matches('/'),
            None => self.pretty.as_str(),
        };

        tree_key(prefix)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("params", &self.params())
            .field("handlers", &self.handlers.len())
            .field("use", &self.use_)
            .field("mount", &self.mount)
            .finish()
    }
}

/// The kind of registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Endpoint,
    Use,
    Mount,
}

pub(crate) struct Registration<'a> {
    pub(crate) methods: Vec<usize>,
    pub(crate) path: &'a str,
    pub(crate) handlers: Vec<SharedHandler>,
    pub(crate) group: Option<Arc<GroupInfo>>,
    pub(crate) kind: Kind,
}

/// All registered routes, per method.
pub(crate) struct Registry {
    pub(crate) stack: Vec<Vec<Route>>,
    pub(crate) handlers_count: u32,
    pub(crate) routes_count: u32,
    // (method, index) of the routes touched by the last registration
    latest: Vec<(usize, usize)>,
    case_sensitive: bool,
    strict_routing: bool,
}

impl Registry {
    pub(crate) fn new(methods: usize, case_sensitive: bool, strict_routing: bool) -> Self {
        Self {
            stack: vec![Vec::new(); methods],
            handlers_count: 0,
            routes_count: 0,
            latest: Vec::new(),
            case_sensitive,
            strict_routing,
        }
    }

    /// Add a route for each method, returning copies of the new or extended routes.
    pub(crate) fn register(&mut self, methods: &Methods, reg: Registration<'_>) -> Vec<Route> {
        let use_ = reg.kind != Kind::Endpoint;
        let mount = reg.kind == Kind::Mount;

        if reg.kind == Kind::Endpoint && reg.handlers.is_empty() {
            panic!("missing handler in route `{}`", reg.path);
        }

        let mut path = match reg.path {
            "" => String::from("/"),
            path if !path.starts_with('/') => format!("/{}", path),
            path => path.to_owned(),
        };

        if use_ {
            crate::path::trim_trailing_slashes(&mut path);
        }

        let pretty = canonicalize(&path, self.case_sensitive, self.strict_routing);
        let parser = RouteParser::parse(&path, self.case_sensitive, self.strict_routing)
            .unwrap_or_else(|err| panic!("failed to insert route: {}", err));

        self.routes_count += 1;
        self.handlers_count += reg.handlers.len() as u32;
        let pos = self.routes_count;

        self.latest.clear();
        let mut touched = Vec::with_capacity(reg.methods.len());

        for m in reg.methods {
            let routes = &mut self.stack[m];
            let len = routes.len();

            // consecutive registrations of the same path extend the previous route
            if let Some(last) = routes.last_mut() {
                if !mount && !last.mount && last.use_ == use_ && last.pretty == pretty {
                    last.handlers.extend(reg.handlers.iter().cloned());
                    touched.push(last.clone());
                    self.latest.push((m, len - 1));
                    continue;
                }
            }

            let route = Route {
                pos,
                method: methods.get(m).clone(),
                path: path.clone(),
                star: pretty == "/*",
                root: pretty == "/",
                pretty: pretty.clone(),
                parser: parser.clone(),
                handlers: reg.handlers.clone(),
                group: reg.group.clone(),
                name: String::new(),
                use_,
                mount,
            };

            routes.push(route.clone());
            self.latest.push((m, routes.len() - 1));
            touched.push(route);
        }

        touched
    }

    /// Copy the routes of a mounted registry under `prefix`.
    ///
    /// Imported routes keep their relative order and follow every route
    /// registered so far. Routes for methods this registry doesn't know
    /// are skipped.
    pub(crate) fn import(&mut self, methods: &Methods, prefix: &str, other: &Registry) -> Vec<Route> {
        let base = self.routes_count;
        let mut imported = Vec::new();

        for route in other.stack.iter().flatten() {
            let m = match methods.index(&route.method) {
                Some(m) => m,
                None => continue,
            };

            let path = crate::path::join(prefix, &route.path);
            let pretty = canonicalize(&path, self.case_sensitive, self.strict_routing);
            let parser = RouteParser::parse(&path, self.case_sensitive, self.strict_routing)
                .unwrap_or_else(|err| panic!("failed to mount route: {}", err));

            let route = Route {
                pos: base + route.pos,
                star: pretty == "/*",
                root: pretty == "/",
                path,
                pretty,
                parser,
                ..route.clone()
            };

            self.stack[m].push(route.clone());
            imported.push(route);
        }

        self.routes_count = base + other.routes_count;
        self.handlers_count += other.handlers_count;
        self.latest.clear();

        imported.sort_by_key(|route| route.pos);
        imported
    }

    /// Name the routes added by the last registration.
    pub(crate) fn name_latest(&mut self, name: &str) -> Vec<Route> {
        let mut named = Vec::with_capacity(self.latest.len());

        for &(m, i) in &self.latest {
            let route = &mut self.stack[m][i];
            route.name = match route.group {
                Some(ref group) => format!("{}{}", group.name, name),
                None => name.to_owned(),
            };
            named.push(route.clone());
        }

        named
    }

    /// All routes, in registration order.
    pub(crate) fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.stack.iter().flatten().cloned().collect();
        routes.sort_by_key(|route| route.pos);
        routes
    }

    pub(crate) fn build_tree(&self, methods: Arc<Methods>) -> Tree {
        let mut buckets = Vec::with_capacity(self.stack.len());
        let mut fallbacks = Vec::with_capacity(self.stack.len());
        let mut names = HashMap::new();

        for routes in &self.stack {
            let mut keyed: HashMap<TreeKey, Vec<Arc<Route>>> = HashMap::new();
            let mut fallback = Vec::new();

            for route in routes {
                let route = Arc::new(route.clone());

                if !route.name.is_empty() {
                    names.entry(route.name.clone()).or_insert_with(|| route.clone());
                }

                match route.tree_key() {
                    Some(key) => keyed.entry(key).or_default().push(route),
                    None => fallback.push(route),
                }
            }

            // keyed buckets still need the routes without a constant prefix
            let keyed = keyed
                .into_iter()
                .map(|(key, mut bucket)| {
                    bucket.extend(fallback.iter().cloned());
                    bucket.sort_by_key(|route| route.pos);
                    (key, Bucket::from(bucket))
                })
                .collect();

            fallback.sort_by_key(|route| route.pos);
            buckets.push(keyed);
            fallbacks.push(Bucket::from(fallback));
        }

        Tree {
            methods,
            buckets,
            fallbacks,
            names,
        }
    }
}

pub(crate) type TreeKey = [u8; 3];

/// Routes sharing a method and a tree key, ordered by position.
pub(crate) type Bucket = Arc<[Arc<Route>]>;

pub(crate) fn tree_key(path: &str) -> Option<TreeKey> {
    match path.as_bytes() {
        [a, b, c, ..] => Some([*a, *b, *c]),
        _ => None,
    }
}

/// The lookup structure built from the registry on the first request
/// after routes changed.
pub(crate) struct Tree {
    pub(crate) methods: Arc<Methods>,
    buckets: Vec<HashMap<TreeKey, Bucket>>,
    fallbacks: Vec<Bucket>,
    names: HashMap<String, Arc<Route>>,
}

impl Tree {
    pub(crate) fn empty(methods: Arc<Methods>) -> Self {
        let n = methods.len();
        Self {
            methods,
            buckets: vec![HashMap::new(); n],
            fallbacks: vec![Bucket::from(Vec::new()); n],
            names: HashMap::new(),
        }
    }

    /// The routes that may match a detection path under a method.
    pub(crate) fn bucket(&self, method: usize, detection: &str) -> Bucket {
        tree_key(detection)
            .and_then(|key| self.buckets[method].get(&key))
            .unwrap_or(&self.fallbacks[method])
            .clone()
    }

    pub(crate) fn route_by_name(&self, name: &str) -> Option<&Arc<Route>> {
        self.names.get(name)
    }
}
