//! Container-side deployment hooks.
//!
//! # Data Flow
//! ```text
//! Deployment tooling / startup
//!     → ApplicationContainer::deploy(descriptor)
//!     → Arc<ApplicationDescriptor> stored by name
//!     → ContainerEvent::Deployed
//!
//! Request path:
//!     (application, SipRequest) → container.dispatch → descriptor.dispatch
//!
//! Undeploy:
//!     remove by name → ContainerEvent::Undeployed → last Arc dropped
//! ```
//!
//! # Design Decisions
//! - Redeploy replaces the descriptor wholesale; no in-place reload
//! - Events are fire-and-forget over an unbounded channel

pub mod applications;
pub mod events;

pub use applications::{ApplicationContainer, ContainerError};
pub use events::{ContainerEvent, EventSink, EventStream};
