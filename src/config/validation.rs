//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Unique, non-empty application and handler names
//! - Validate value ranges (timeouts >= 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Mappings naming unregistered handlers are accepted; deploy warns about them

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RouterConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("application #{index} has an empty name")]
    EmptyApplicationName { index: usize },

    #[error("application '{0}' is defined more than once")]
    DuplicateApplication(String),

    #[error("application '{application}': {field} must be >= 0, got {value}")]
    NegativeTimeout { application: String, field: &'static str, value: i64 },

    #[error("application '{application}': handler #{index} has an empty name")]
    EmptyHandlerName { application: String, index: usize },

    #[error("application '{application}': handler '{handler}' is defined more than once")]
    DuplicateHandler { application: String, handler: String },

    #[error("{field} is not a socket address: '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingApiKey,
}

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::MissingApiKey);
        }
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let mut seen = HashSet::new();
    for (index, app) in config.applications.iter().enumerate() {
        if app.name.is_empty() {
            errors.push(ValidationError::EmptyApplicationName { index });
        } else if !seen.insert(app.name.as_str()) {
            errors.push(ValidationError::DuplicateApplication(app.name.clone()));
        }

        for (field, value) in [
            ("proxy_timeout", app.proxy_timeout),
            ("application_session_timeout", app.application_session_timeout),
        ] {
            if value < 0 {
                errors.push(ValidationError::NegativeTimeout {
                    application: app.name.clone(),
                    field,
                    value,
                });
            }
        }

        let mut handlers = HashSet::new();
        for (index, handler) in app.handlers.iter().enumerate() {
            if handler.name.is_empty() {
                errors.push(ValidationError::EmptyHandlerName {
                    application: app.name.clone(),
                    index,
                });
            } else if !handlers.insert(handler.name.as_str()) {
                errors.push(ValidationError::DuplicateHandler {
                    application: app.name.clone(),
                    handler: handler.name.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress { field, value: value.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ApplicationConfig;
    use crate::descriptor::HandlerDefinition;

    fn app(name: &str) -> ApplicationConfig {
        ApplicationConfig { name: name.to_string(), ..Default::default() }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&RouterConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut dup = app("conference");
        dup.proxy_timeout = -3;
        dup.handlers = vec![
            HandlerDefinition::new("", "Anonymous"),
            HandlerDefinition::new("invite", "A"),
            HandlerDefinition::new("invite", "B"),
        ];

        let mut config = RouterConfig::default();
        config.applications = vec![app("conference"), app(""), dup];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyApplicationName { index: 1 },
                ValidationError::DuplicateApplication("conference".into()),
                ValidationError::NegativeTimeout {
                    application: "conference".into(),
                    field: "proxy_timeout",
                    value: -3,
                },
                ValidationError::EmptyHandlerName { application: "conference".into(), index: 0 },
                ValidationError::DuplicateHandler {
                    application: "conference".into(),
                    handler: "invite".into(),
                },
            ]
        );
    }

    #[test]
    fn test_admin_requires_key_and_address() {
        let mut config = RouterConfig::default();
        config.admin.enabled = true;
        config.admin.bind_address = "not-an-address".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&ValidationError::MissingApiKey));
    }

    #[test]
    fn test_zero_timeouts_are_valid() {
        let mut config = RouterConfig::default();
        config.applications = vec![app("echo")];
        assert!(validate_config(&config).is_ok());
    }
}
