use super::Context;
use crate::bounded::BoxFuture;
use crate::http::{header, Method, StatusCode};
use crate::{Error, Result};

impl Context {
    /// Call the next handler in the chain.
    ///
    /// The remaining handlers of the current route run first, then the
    /// following routes of the bucket that match the request. Calling
    /// `next` after the last matching handler results in a `404 Not Found`
    /// error, or `405 Method Not Allowed` if the path is routed under
    /// another method.
    pub fn next(&mut self) -> BoxFuture<'_, Result> {
        Box::pin(async move {
            self.index_handler += 1;

            let handler = self
                .route
                .as_ref()
                .and_then(|route| route.handlers.get(self.index_handler))
                .cloned();

            match handler {
                Some(handler) => handler.call(self).await,
                None => self.next_route().await,
            }
        })
    }

    /// Record an error and continue the chain.
    ///
    /// Later handlers can inspect the error with [`error`](Self::error)
    /// and recover from it with [`take_error`](Self::take_error). An error
    /// still recorded when the chain finishes is passed to the error handler.
    pub fn next_with_error(&mut self, err: Error) -> BoxFuture<'_, Result> {
        self.error = Some(err);
        self.next()
    }

    /// The error recorded by [`next_with_error`](Self::next_with_error).
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Remove the recorded error.
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// Route the request again from the first route, usually after
    /// changing the path with [`set_path`](Self::set_path).
    pub fn restart_routing(&mut self) -> BoxFuture<'_, Result> {
        self.route = None;
        self.index_route = 0;
        self.index_handler = 0;
        self.matched = false;
        self.update_detection();
        self.next_route()
    }

    /// Find the next matching route in the bucket and call its first handler.
    pub(crate) fn next_route(&mut self) -> BoxFuture<'_, Result> {
        Box::pin(async move {
            let method = match self.method {
                Some(method) => method,
                None => return Err(Error::from_status(StatusCode::NOT_IMPLEMENTED)),
            };

            let bucket = self.bucket.clone();

            while let Some(route) = bucket.get(self.index_route) {
                self.index_route += 1;

                // mount points only mark where a sub application was attached
                if route.mount || route.handlers.is_empty() {
                    continue;
                }

                if !route.matches(&self.detection, &self.path, &mut self.values) {
                    continue;
                }

                if !route.use_ {
                    self.matched = true;
                }

                self.route = Some(route.clone());
                self.index_handler = 0;

                let handler = route.handlers[0].clone();
                return handler.call(self).await;
            }

            if !self.matched {
                let allowed = self.allowed_methods(method);

                if !allowed.is_empty() {
                    let allow = allowed
                        .iter()
                        .map(Method::as_str)
                        .collect::<Vec<_>>()
                        .join(", ");

                    self.set(header::ALLOW, allow);
                    return Err(Error::from_status(StatusCode::METHOD_NOT_ALLOWED));
                }
            }

            tracing::trace!(method = %self.request.method(), path = %self.path, "no route matched");

            Err(Error::new(
                StatusCode::NOT_FOUND,
                format!("Cannot {} {}", self.request.method(), self.path),
            ))
        })
    }

    // Methods other than `current` with an endpoint matching the path.
    fn allowed_methods(&self, current: usize) -> Vec<Method> {
        let methods = &self.tree.methods;
        let mut scratch = Vec::new();

        (0..methods.len())
            .filter(|&m| m != current)
            .filter(|&m| {
                self.tree
                    .bucket(m, &self.detection)
                    .iter()
                    .filter(|route| !route.use_ && !route.mount)
                    .any(|route| route.matches(&self.detection, &self.path, &mut scratch))
            })
            .map(|m| methods.get(m).clone())
            .collect()
    }
}
