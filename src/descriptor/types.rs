//! Descriptor-level types and error definitions.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sip::SipRequest;

/// Errors that can occur on descriptor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// A handler name has no entry in the handler registry.
    #[error("handler not found: {0}")]
    NotFound(String),

    /// A timeout was configured with a negative value.
    #[error("invalid {field}: {value} (must be >= 0, 0 disables)")]
    InvalidTimeout { field: &'static str, value: i64 },
}

pub type DescriptorResult<T> = Result<T, DescriptorError>;

/// Locking granularity requested by the application for downstream layers.
///
/// Only recorded here; the session layer applies it to sessions created after
/// the mode is set.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyControlMode {
    #[default]
    None = 0,
    Sas = 1,
    SipSession = 2,
    ApplicationSession = 3,
}

impl From<u8> for ConcurrencyControlMode {
    fn from(val: u8) -> Self {
        match val {
            1 => ConcurrencyControlMode::Sas,
            2 => ConcurrencyControlMode::SipSession,
            3 => ConcurrencyControlMode::ApplicationSession,
            _ => ConcurrencyControlMode::None,
        }
    }
}

impl fmt::Display for ConcurrencyControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConcurrencyControlMode::None => "none",
            ConcurrencyControlMode::Sas => "sas",
            ConcurrencyControlMode::SipSession => "sip_session",
            ConcurrencyControlMode::ApplicationSession => "application_session",
        })
    }
}

/// Derives an application-session correlation key from a request.
///
/// Must be a pure function of the request.
#[derive(Clone)]
pub struct ApplicationKeyFn(Arc<dyn Fn(&SipRequest) -> Option<String> + Send + Sync>);

impl ApplicationKeyFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&SipRequest) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn derive(&self, req: &SipRequest) -> Option<String> {
        (self.0)(req)
    }
}

impl fmt::Debug for ApplicationKeyFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApplicationKeyFn(..)")
    }
}

/// Built-in key derivations selectable from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationKeySource {
    /// Value of the named request header.
    Header(String),
    /// User part of the request URI.
    UriUser,
    /// Value of the named request-URI parameter.
    UriParam(String),
}

impl From<ApplicationKeySource> for ApplicationKeyFn {
    fn from(source: ApplicationKeySource) -> Self {
        match source {
            ApplicationKeySource::Header(name) => {
                ApplicationKeyFn::new(move |req| req.header(&name).map(str::to_string))
            }
            ApplicationKeySource::UriUser => {
                ApplicationKeyFn::new(|req| req.uri.user().map(str::to_string))
            }
            ApplicationKeySource::UriParam(name) => ApplicationKeyFn::new(move |req| {
                req.uri.param(&name).flatten().map(str::to_string)
            }),
        }
    }
}

/// Session storage capability handed to the session subsystem.
///
/// Opaque to this crate: it is stored, shared and reported, never called.
pub trait SessionManagerFactory: Send + Sync + fmt::Debug {
    /// Identifier for logs and status output.
    fn name(&self) -> &str;
}

pub type SharedSessionManagerFactory = Arc<dyn SessionManagerFactory>;

/// Factory installed when a deployment supplies none.
#[derive(Debug, Default)]
pub struct InMemorySessionManagerFactory;

impl SessionManagerFactory for InMemorySessionManagerFactory {
    fn name(&self) -> &str {
        "in-memory"
    }
}
