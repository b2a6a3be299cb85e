//! Event type routing.

use std::collections::HashMap;

use crate::{ReactorError, Result};

/// Maps event type tags to a handler kind.
///
/// The table is built once, at start-up. `K` is normally a small `Copy`
/// enum that the handler `match`es on; tags with no entry route to nothing,
/// which lets one log carry events this reactor does not care about.
#[derive(Debug, Clone)]
pub struct Dispatcher<K> {
    routes: HashMap<String, K>,
}

impl<K: Copy> Dispatcher<K> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Adds a route. Each tag may be registered once.
    pub fn register(mut self, event_type: impl Into<String>, kind: K) -> Result<Self> {
        let event_type = event_type.into();
        if self.routes.contains_key(&event_type) {
            return Err(ReactorError::DuplicateRegistration(event_type));
        }
        self.routes.insert(event_type, kind);
        Ok(self)
    }

    /// Builds a dispatcher from a list of routes, rejecting repeated tags.
    pub fn from_routes<I, T>(routes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, K)>,
        T: Into<String>,
    {
        routes
            .into_iter()
            .try_fold(Self::new(), |dispatcher, (event_type, kind)| {
                dispatcher.register(event_type, kind)
            })
    }

    pub fn route(&self, event_type: &str) -> Option<K> {
        self.routes.get(event_type).copied()
    }

    /// Registered tags, sorted.
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<K: Copy> Default for Dispatcher<K> {
    fn default() -> Self {
        Self::new()
    }
}
