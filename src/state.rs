use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Types that can be injected as application state.
pub trait State: Send + Sync + 'static {}
impl<T> State for T where T: Send + Sync + 'static {}

/// Application state, keyed by type.
///
/// A new map is published whenever state is injected, requests keep
/// the map that was current when they started.
#[derive(Clone, Default)]
pub(crate) struct StateMap(HashMap<TypeId, Arc<dyn Any + Send + Sync>>);

impl StateMap {
    pub(crate) fn get<T: State>(&self) -> Option<&T> {
        self.0.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }

    pub(crate) fn insert(&mut self, value: Arc<dyn Any + Send + Sync>) {
        self.0.insert((*value).type_id(), value);
    }
}
