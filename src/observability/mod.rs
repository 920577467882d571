//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured logs)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (application, handler, outcome) over formatted strings
//! - Metrics are cheap (atomic increments) and never affect routing results
//! - Without an installed recorder, metric calls are no-ops

pub mod logging;
pub mod metrics;
