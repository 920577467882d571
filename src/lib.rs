//! SIP application router library.
//!
//! Application descriptors, first-match mapping resolution and the
//! deployment container that hosts them.

pub mod admin;
pub mod config;
pub mod container;
pub mod descriptor;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod sip;

pub use config::RouterConfig;
pub use container::ApplicationContainer;
pub use descriptor::{ApplicationDescriptor, Dispatch};
pub use lifecycle::Shutdown;
pub use routing::{MappingRule, MatchExpression, Resolution};
pub use sip::SipRequest;
