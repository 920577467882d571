//! Application descriptor subsystem.
//!
//! # Data Flow
//! ```text
//! Deployment (config or code)
//!     → ApplicationDescriptorBuilder (metadata, handlers, mappings, listeners)
//!     → merge.rs (generic settings from the base descriptor)
//!     → build(): timeouts validated, snapshots created
//!     → ApplicationDescriptor (shared via Arc)
//!
//! Steady state:
//!     SipRequest → dispatch() → routing::Router → registry lookup
//!     → Matched / Default / Unroutable
//!
//! Administration:
//!     add/remove listener, add/remove mapping, concurrency mode
//!     → snapshot swap → ContainerEvent
//! ```
//!
//! # Design Decisions
//! - Readers never block; writers are serialized per structure
//! - `NoMatch` is a value, not an error
//! - Merge failures are recorded in a report, never returned as errors

pub mod application;
pub mod listeners;
pub mod merge;
pub mod registry;
pub mod types;

pub use application::{ApplicationDescriptor, ApplicationDescriptorBuilder, Dispatch};
pub use listeners::ListenerList;
pub use merge::{
    DeploymentInfo, DeploymentSettings, FieldKind, FieldSource, FieldValue, MergeFieldSkipped,
    MergeReport, SkipReason,
};
pub use registry::{HandlerDefinition, HandlerRegistry, HandlerSnapshot};
pub use types::{
    ApplicationKeyFn, ApplicationKeySource, ConcurrencyControlMode, DescriptorError,
    DescriptorResult, InMemorySessionManagerFactory, SessionManagerFactory,
    SharedSessionManagerFactory,
};
