//! Callbacks invoked while routes are registered.
//!
//! Hooks run synchronously inside the registration call. A hook that
//! returns an error aborts the registration with a panic, like a
//! malformed route pattern does.

use crate::{App, Error, Group, Route};

use std::sync::Arc;

pub(crate) type RouteHook = Arc<dyn Fn(&Route) -> Result<(), Error> + Send + Sync>;
pub(crate) type GroupHook = Arc<dyn Fn(&Group) -> Result<(), Error> + Send + Sync>;
pub(crate) type MountHook = Arc<dyn Fn(&App) -> Result<(), Error> + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) route: Vec<RouteHook>,
    pub(crate) name: Vec<RouteHook>,
    pub(crate) group: Vec<GroupHook>,
    pub(crate) mount: Vec<MountHook>,
}

pub(crate) fn run<T: ?Sized>(
    event: &str,
    hooks: &[Arc<dyn Fn(&T) -> Result<(), Error> + Send + Sync>],
    value: &T,
) {
    for hook in hooks {
        if let Err(err) = hook(value) {
            panic!("{} hook failed: {}", event, err);
        }
    }
}
