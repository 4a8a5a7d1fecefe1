use crate::app::App;
use crate::handler::{IntoHandlers, SharedHandler};
use crate::http::Method;
use crate::router::{GroupInfo, Kind};

use std::fmt;
use std::sync::Arc;

/// Routes sharing a path prefix and middleware.
///
/// A group holds no routes of its own: endpoints registered through it
/// are added to the application with the prefix prepended to their path
/// and the group middleware prepended to their handlers.
#[derive(Clone)]
pub struct Group {
    app: App,
    info: Arc<GroupInfo>,
    handlers: Vec<SharedHandler>,
}

impl Group {
    pub(crate) fn new(app: App, info: GroupInfo, handlers: Vec<SharedHandler>) -> Self {
        Self {
            app,
            info: Arc::new(info),
            handlers,
        }
    }

    /// The path prefix of the group.
    pub fn prefix(&self) -> &str {
        &self.info.prefix
    }

    /// Prefix the names of routes registered through this group.
    ///
    /// Nested groups inherit the name of their parent.
    pub fn with_name(mut self, name: &str) -> Self {
        self.info = Arc::new(GroupInfo {
            prefix: self.info.prefix.clone(),
            name: format!("{}{}", self.info.name, name),
        });
        self
    }

    /// Register an endpoint for a list of methods.
    pub fn add(&self, methods: &[Method], path: &str, handlers: impl IntoHandlers) -> &Self {
        self.app
            .add_shared(methods, &self.path(path), self.chain(handlers), Some(self.info.clone()));
        self
    }

    /// Register an endpoint for every request method.
    pub fn all(&self, path: &str, handlers: impl IntoHandlers) -> &Self {
        self.app.register(
            self.app.all_methods(),
            &self.path(path),
            self.chain(handlers),
            Some(self.info.clone()),
            Kind::Endpoint,
        );
        self
    }

    /// Register an endpoint for `GET`, also answering `HEAD` requests.
    pub fn get(&self, path: &str, handlers: impl IntoHandlers) -> &Self {
        let path = self.path(path);
        let handlers = self.chain(handlers);
        self.app
            .add_shared(&[Method::HEAD], &path, handlers.clone(), Some(self.info.clone()));
        self.app
            .add_shared(&[Method::GET], &path, handlers, Some(self.info.clone()));
        self
    }

    /// Register middleware for every path below the group prefix.
    ///
    /// The group middleware is not prepended to `handlers`.
    pub fn use_(&self, handlers: impl IntoHandlers) -> &Self {
        self.use_at("/", handlers)
    }

    /// Register middleware for `path` below the group prefix.
    pub fn use_at(&self, path: &str, handlers: impl IntoHandlers) -> &Self {
        self.app.register(
            self.app.all_methods(),
            &self.path(path),
            handlers.into_handlers(),
            Some(self.info.clone()),
            Kind::Use,
        );
        self
    }

    /// Create a nested group.
    pub fn group(&self, prefix: &str) -> Group {
        self.group_with(prefix, crate::Handlers::new())
    }

    /// Create a nested group with additional middleware, which runs
    /// after the middleware of this group.
    pub fn group_with(&self, prefix: &str, handlers: impl IntoHandlers) -> Group {
        let info = GroupInfo {
            prefix: self.path(prefix),
            name: self.info.name.clone(),
        };

        let mut chain = self.handlers.clone();
        chain.extend(handlers.into_handlers());

        let group = Group::new(self.app.clone(), info, chain);
        self.app.run_group_hooks(&group);
        group
    }

    /// Name the routes added by the last registration, prefixed with
    /// the group name.
    pub fn name(&self, name: &str) -> &Self {
        self.app.name(name);
        self
    }

    fn path(&self, path: &str) -> String {
        crate::path::join(&self.info.prefix, path)
    }

    fn chain(&self, handlers: impl IntoHandlers) -> Vec<SharedHandler> {
        let mut chain = self.handlers.clone();
        chain.extend(handlers.into_handlers());
        chain
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

impl Group {
    insert_route!(head => Method::HEAD);
    insert_route!(post => Method::POST);
    insert_route!(put => Method::PUT);
    insert_route!(delete => Method::DELETE);
    insert_route!(connect => Method::CONNECT);
    insert_route!(options => Method::OPTIONS);
    insert_route!(trace => Method::TRACE);
    insert_route!(patch => Method::PATCH);
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("prefix", &self.info.prefix)
            .field("name", &self.info.name)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
