//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::descriptor::{
    ApplicationDescriptor, ApplicationKeySource, ConcurrencyControlMode, DescriptorResult,
    HandlerDefinition,
};
use crate::routing::MappingRule;

/// Root configuration for the application router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Administrative HTTP surface.
    pub admin: AdminConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Applications deployed at startup.
    pub applications: Vec<ApplicationConfig>,
}

impl RouterConfig {
    /// Build one descriptor per configured application, in file order.
    ///
    /// Expects a config that passed validation; the first build error aborts.
    pub fn build_descriptors(&self) -> DescriptorResult<Vec<ApplicationDescriptor>> {
        self.applications.iter().map(ApplicationConfig::build_descriptor).collect()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// One deployable SIP application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub description: Option<String>,
    pub small_icon: Option<String>,
    pub large_icon: Option<String>,

    /// Seconds; 0 disables.
    pub proxy_timeout: i64,

    /// Seconds; 0 disables.
    pub application_session_timeout: i64,

    pub concurrency_control: ConcurrencyControlMode,

    /// Default handler when no mapping matches.
    pub main_handler: Option<String>,

    /// Log every rule that fails to match.
    pub diagnostics: bool,

    pub application_key: Option<ApplicationKeySource>,

    pub listeners: Vec<String>,

    /// Generic settings of the base deployment descriptor.
    pub deployment: toml::Table,

    pub handlers: Vec<HandlerDefinition>,

    /// Evaluated in file order; the first match wins.
    pub mappings: Vec<MappingRule>,
}

impl ApplicationConfig {
    pub fn build_descriptor(&self) -> DescriptorResult<ApplicationDescriptor> {
        let mut builder = ApplicationDescriptor::builder(&self.name)
            .icons(self.small_icon.clone(), self.large_icon.clone())
            .proxy_timeout(self.proxy_timeout)
            .application_session_timeout(self.application_session_timeout)
            .concurrency_control_mode(self.concurrency_control)
            .diagnostics(self.diagnostics)
            .handlers(self.handlers.iter().cloned())
            .mappings(self.mappings.iter().cloned());

        if let Some(description) = &self.description {
            builder = builder.description(description);
        }
        if let Some(main) = &self.main_handler {
            builder = builder.main_handler(main);
        }
        if let Some(key) = &self.application_key {
            builder = builder.application_key(key.clone());
        }
        for listener in &self.listeners {
            builder = builder.listener(listener);
        }

        let report = builder.merge_from(&self.deployment);
        tracing::debug!(
            application = %self.name,
            copied = report.copied.len(),
            skipped = report.skipped.len(),
            "Deployment settings merged"
        );

        builder.build()
    }
}
