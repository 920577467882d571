//! Handler registry.
//!
//! # Responsibilities
//! - Hold handler definitions keyed by unique name
//! - Look up handlers by name or implementation class
//! - Hand out immutable snapshots for enumeration
//!
//! # Design Decisions
//! - Last registration wins; overwrites are logged at `warn`
//! - Snapshots are `Arc`s of the map: later registrations never show up in one

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::descriptor::types::{DescriptorError, DescriptorResult};

/// A deployable request handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerDefinition {
    /// Unique name referenced by mapping rules.
    pub name: String,

    /// Implementation identifier resolved by the host container.
    pub handler_class: String,

    /// Startup order hint; `None` means lazy.
    #[serde(default)]
    pub load_on_startup: Option<i32>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub init_params: BTreeMap<String, String>,
}

impl HandlerDefinition {
    pub fn new(name: impl Into<String>, handler_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler_class: handler_class.into(),
            load_on_startup: None,
            description: None,
            init_params: BTreeMap::new(),
        }
    }

    pub fn with_load_on_startup(mut self, order: i32) -> Self {
        self.load_on_startup = Some(order);
        self
    }

    pub fn with_init_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_params.insert(name.into(), value.into());
        self
    }
}

type HandlerMap = HashMap<String, Arc<HandlerDefinition>>;

/// Point-in-time view of the registry.
#[derive(Debug, Clone)]
pub struct HandlerSnapshot(Arc<HandlerMap>);

impl HandlerSnapshot {
    pub fn get(&self, name: &str) -> Option<&Arc<HandlerDefinition>> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<HandlerDefinition>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Handler names in lexical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Registry of handler definitions for one application.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: ArcSwap<HandlerMap>,
    write_lock: Mutex<()>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a handler. Returns the replaced definition, if any.
    pub fn register(&self, handler: HandlerDefinition) -> Option<Arc<HandlerDefinition>> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = HandlerMap::clone(&self.handlers.load());
        let name = handler.name.clone();
        let previous = next.insert(name.clone(), Arc::new(handler));
        self.handlers.store(Arc::new(next));

        if let Some(prev) = &previous {
            tracing::warn!(
                handler = %name,
                previous_class = %prev.handler_class,
                "Handler registered twice, replacing previous definition"
            );
        }
        previous
    }

    /// Register every handler given. Returns how many were registered.
    pub fn register_all(&self, handlers: impl IntoIterator<Item = HandlerDefinition>) -> usize {
        let mut count = 0;
        for handler in handlers {
            self.register(handler);
            count += 1;
        }
        count
    }

    pub fn lookup(&self, name: &str) -> DescriptorResult<Arc<HandlerDefinition>> {
        self.handlers
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| DescriptorError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.load().contains_key(name)
    }

    /// Handler implemented by `handler_class`.
    ///
    /// When several handlers share a class, the one with the lexically
    /// smallest name is returned.
    pub fn find_by_class(&self, handler_class: &str) -> Option<Arc<HandlerDefinition>> {
        self.handlers
            .load()
            .values()
            .filter(|h| h.handler_class == handler_class)
            .min_by(|a, b| a.name.cmp(&b.name))
            .cloned()
    }

    pub fn all(&self) -> HandlerSnapshot {
        HandlerSnapshot(self.handlers.load_full())
    }

    pub fn len(&self) -> usize {
        self.handlers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.load().is_empty()
    }
}
