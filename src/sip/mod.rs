//! Minimal SIP request model consumed by the routing subsystem.
//!
//! # Data Flow
//! ```text
//! Protocol stack (parsing/transport, external)
//!     → SipRequest { method, uri, from, to, headers }
//!     → routing::matcher (variable lookup + conditions)
//!     → routing::table (first match wins)
//! ```
//!
//! # Design Decisions
//! - Only the parts a mapping rule can inspect are modelled
//! - URIs and addresses travel as strings over serde
//! - Header names compare case-insensitively, values verbatim

pub mod method;
pub mod request;
pub mod uri;

pub use method::{Method, MethodParseError};
pub use request::{SipRequest, SipRequestBuilder};
pub use uri::{NameAddr, SipUri, UriParseError};
