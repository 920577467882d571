//! Mapping table and request resolution.
//!
//! # Responsibilities
//! - Store mapping rules in insertion order
//! - Look up the first rule matching a request
//! - Return the matched handler or an explicit no-match
//! - Track main-handler mode and the default handler
//!
//! # Design Decisions
//! - `MappingTable` is an immutable snapshot; every mutation builds a new one
//! - `Router` publishes snapshots through `ArcSwap` (readers never lock)
//! - Writers are serialized by a mutex around load-modify-store
//! - Never re-sorted: first match in insertion order wins

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::routing::rule::MappingRule;
use crate::sip::SipRequest;

/// Whether handler selection still runs in main-handler mode.
///
/// `Main` until the first rule is added, then `Mapped` for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    Main,
    Mapped,
}

/// Outcome of walking the mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Rule at `index` matched.
    Matched { handler: String, index: usize },
    /// No rule matched; the caller decides whether a default applies.
    NoMatch,
}

impl Resolution {
    pub fn handler(&self) -> Option<&str> {
        match self {
            Resolution::Matched { handler, .. } => Some(handler),
            Resolution::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Resolution::Matched { .. })
    }
}

/// Immutable snapshot of the ordered mapping rules.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    rules: Vec<Arc<MappingRule>>,
    mode: SelectionMode,
    default_handler: Option<String>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> impl ExactSizeIterator<Item = &MappingRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn is_main_handler_mode(&self) -> bool {
        self.mode == SelectionMode::Main
    }

    pub fn default_handler(&self) -> Option<&str> {
        self.default_handler.as_deref()
    }

    /// New table with `rule` appended.
    ///
    /// The first rule ever added flips the table to `Mapped` and, when no
    /// default handler is set, makes its handler the default.
    pub fn with_rule(&self, rule: MappingRule) -> Self {
        let mut next = self.clone();
        if next.mode == SelectionMode::Main {
            next.mode = SelectionMode::Mapped;
            if next.default_handler.is_none() {
                next.default_handler = Some(rule.handler().to_string());
            }
        }
        next.rules.push(Arc::new(rule));
        next
    }

    /// New table without the first rule equal to `rule`, or `None` if absent.
    pub fn without_rule(&self, rule: &MappingRule) -> Option<Self> {
        let index = self.rules.iter().position(|r| r.as_ref() == rule)?;
        let mut next = self.clone();
        next.rules.remove(index);
        Some(next)
    }

    /// New table with the default handler replaced.
    pub fn with_default_handler(&self, handler: Option<String>) -> Self {
        let mut next = self.clone();
        next.default_handler = handler;
        next
    }

    /// Walk the rules in order and return the first match.
    pub fn resolve(&self, req: &SipRequest) -> Resolution {
        self.resolve_with(req, false)
    }

    /// Like [`resolve`](Self::resolve), logging each rule that did not match
    /// when `diagnostics` is set. Logging never changes the result.
    pub fn resolve_with(&self, req: &SipRequest, diagnostics: bool) -> Resolution {
        if diagnostics {
            tracing::debug!(
                method = %req.method,
                uri = %req.uri,
                rules = self.rules.len(),
                "Checking mapping rules for request"
            );
        }
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.matches(req) {
                return Resolution::Matched {
                    handler: rule.handler().to_string(),
                    index,
                };
            }
            if diagnostics {
                tracing::debug!(
                    handler = %rule.handler(),
                    expression = %rule.describe(),
                    "Mapping rule did not match"
                );
            }
        }
        Resolution::NoMatch
    }
}

/// Shared, concurrently readable mapping table.
#[derive(Debug)]
pub struct Router {
    table: ArcSwap<MappingTable>,
    write_lock: Mutex<()>,
    diagnostics: AtomicBool,
}

impl Router {
    pub fn new() -> Self {
        Self::from_table(MappingTable::new())
    }

    pub fn from_table(table: MappingTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
            write_lock: Mutex::new(()),
            diagnostics: AtomicBool::new(false),
        }
    }

    /// Build a router from rules in the given order.
    pub fn from_rules(rules: impl IntoIterator<Item = MappingRule>) -> Self {
        let table = rules
            .into_iter()
            .fold(MappingTable::new(), |table, rule| table.with_rule(rule));
        Self::from_table(table)
    }

    /// Current snapshot. Later mutations do not affect it.
    pub fn snapshot(&self) -> Arc<MappingTable> {
        self.table.load_full()
    }

    pub fn set_diagnostics(&self, enabled: bool) {
        self.diagnostics.store(enabled, Ordering::Relaxed);
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics.load(Ordering::Relaxed)
    }

    pub fn resolve(&self, req: &SipRequest) -> Resolution {
        self.table.load().resolve_with(req, self.diagnostics())
    }

    /// Append a rule. Returns `true` if this was the first rule (Main → Mapped).
    pub fn add_rule(&self, rule: MappingRule) -> bool {
        self.update(|table| Some(table.with_rule(rule)))
            .map(|(before, _)| before.is_main_handler_mode())
            .unwrap_or(false)
    }

    /// Remove the first equal rule. Returns `false` if none was present.
    pub fn remove_rule(&self, rule: &MappingRule) -> bool {
        self.update(|table| table.without_rule(rule)).is_some()
    }

    pub fn set_default_handler(&self, handler: Option<String>) {
        self.update(|table| Some(table.with_default_handler(handler)));
    }

    /// Serialized load-modify-store. `f` returning `None` leaves the table untouched.
    fn update<F>(&self, f: F) -> Option<(Arc<MappingTable>, Arc<MappingTable>)>
    where
        F: FnOnce(&MappingTable) -> Option<MappingTable>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.table.load_full();
        let next = Arc::new(f(&current)?);
        self.table.store(next.clone());
        Some((current, next))
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
