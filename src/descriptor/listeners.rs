//! Ordered application listener registrations.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

/// Listener identifiers in notification order. Duplicates are allowed.
#[derive(Debug, Default)]
pub struct ListenerList {
    items: ArcSwap<Vec<String>>,
    write_lock: Mutex<()>,
}

impl ListenerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            items: ArcSwap::from_pointee(ids.into_iter().collect()),
            write_lock: Mutex::new(()),
        }
    }

    /// Append one occurrence.
    pub fn add(&self, id: impl Into<String>) {
        let id = id.into();
        self.update(|items| {
            items.push(id);
            true
        });
    }

    /// Remove the first occurrence. Returns `false` if absent.
    pub fn remove(&self, id: &str) -> bool {
        self.update(|items| match items.iter().position(|i| i == id) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        })
    }

    pub fn snapshot(&self) -> Arc<Vec<String>> {
        self.items.load_full()
    }

    pub fn len(&self) -> usize {
        self.items.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.load().is_empty()
    }

    fn update(&self, f: impl FnOnce(&mut Vec<String>) -> bool) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = Vec::clone(&self.items.load());
        let changed = f(&mut next);
        if changed {
            self.items.store(Arc::new(next));
        }
        changed
    }
}
