use super::Context;
use crate::config::Config;
use crate::router::Tree;
use crate::state::StateMap;

use std::sync::Arc;

use parking_lot::Mutex;

/// Idle contexts waiting to be reused.
pub(crate) struct Pool {
    idle: Mutex<Vec<Box<Context>>>,
    capacity: usize,
    config: Arc<Config>,
}

impl Pool {
    pub(crate) fn new(config: Arc<Config>) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            capacity: config.pool_capacity,
            config,
        }
    }

    /// Take an idle context, or create one, prepared for `request`.
    pub(crate) fn acquire(
        &self,
        request: ::http::Request<()>,
        tree: Arc<Tree>,
        state: Arc<StateMap>,
    ) -> Box<Context> {
        let idle = self.idle.lock().pop();

        let mut c = match idle {
            Some(c) => c,
            None => Box::new(Context::new(self.config.clone(), tree.clone())),
        };

        c.reset(request, tree, state);
        c
    }

    /// Return a context to the pool once its response was taken.
    pub(crate) fn release(&self, mut c: Box<Context>) {
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            // drop references to the request and the routes it matched
            c.request = ::http::Request::new(());
            c.route = None;
            c.bucket = Vec::new().into();
            c.locals.clear();
            idle.push(c);
        }
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Methods;

    fn pool(capacity: usize) -> (Pool, Arc<Tree>) {
        let config = Config {
            pool_capacity: capacity,
            ..Config::default()
        };

        let methods = Arc::new(Methods::new(&config.request_methods));
        (Pool::new(Arc::new(config)), Arc::new(Tree::empty(methods)))
    }

    fn request(uri: &str) -> ::http::Request<()> {
        ::http::Request::builder().uri(uri).body(()).unwrap()
    }

    #[test]
    fn reused_context_is_clean() {
        let (pool, tree) = pool(4);

        let mut c = pool.acquire(request("/first?a=1"), tree.clone(), Arc::default());
        c.set_local("user", 7_u32);
        c.status(crate::http::StatusCode::IM_A_TEAPOT);
        c.send_string("dirty");
        c.set(crate::http::header::ETAG, "\"x\"");
        assert_eq!(c.query("a"), Some("1"));
        pool.release(c);
        assert_eq!(pool.idle(), 1);

        let c = pool.acquire(request("/second"), tree, Arc::default());
        assert_eq!(pool.idle(), 0);
        assert_eq!(c.path(), "/second");
        assert_eq!(c.query("a"), None);
        assert!(c.locals::<u32>("user").is_none());
        assert_eq!(c.response_status(), crate::http::StatusCode::OK);
        assert!(c.response_body().is_empty());
        assert!(c.get_resp_header(crate::http::header::ETAG).is_none());
    }

    #[test]
    fn capacity_bounds_idle_contexts() {
        let (pool, tree) = pool(1);

        let a = pool.acquire(request("/"), tree.clone(), Arc::default());
        let b = pool.acquire(request("/"), tree, Arc::default());
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle(), 1);
    }
}
