//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → build_descriptors() → ApplicationContainer::deploy
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; runtime changes go through the admin API
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AdminConfig, ApplicationConfig, ObservabilityConfig, RouterConfig};
pub use validation::{validate_config, ValidationError};
