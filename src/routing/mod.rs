//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming SipRequest (method, uri, from, to, headers)
//!     → router.rs (load current MappingTable snapshot)
//!     → rule.rs / matcher.rs (evaluate each rule in order)
//!     → Return: Matched { handler, index } or NoMatch
//!
//! Administrative mutation:
//!     add_rule / remove_rule
//!     → clone snapshot, apply change
//!     → atomic swap of Arc<MappingTable>
//! ```
//!
//! # Design Decisions
//! - Rules evaluated in insertion order, never re-sorted
//! - Deterministic: same snapshot + request always gives the same handler
//! - Resolution is pure and lock-free for readers
//! - First match wins (no scoring, so no ties)

pub mod matcher;
pub mod router;
pub mod rule;

pub use matcher::{MatchExpression, Matcher, Variable};
pub use router::{MappingTable, Resolution, Router, SelectionMode};
pub use rule::MappingRule;
