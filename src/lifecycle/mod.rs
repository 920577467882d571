//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build descriptors → Deploy → Start admin API
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop admin API → Undeploy all → Drain events → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then applications, then listeners
//! - Nothing is deployed unless every application builds

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::deploy_all;
