//! SIP and TEL URIs, plus name-addr wrappers for From/To.
//!
//! # Responsibilities
//! - Parse `sip:`, `sips:` and `tel:` URIs into their components
//! - Expose the parts a mapping rule may inspect (scheme, user, host, port, params)
//! - Render back to a canonical string for diagnostics
//!
//! # Design Decisions
//! - Scheme and host are normalized to lowercase; user part is kept verbatim
//! - Password and `?headers` components are accepted and discarded
//! - Parameter names compare case-insensitively

mod grammar;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing a URI or name-addr.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriParseError {
    #[error("missing scheme in {0:?}")]
    MissingScheme(String),

    #[error("unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host in {0:?}")]
    MissingHost(String),

    #[error("missing subscriber number in {0:?}")]
    MissingNumber(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("unterminated name-addr: {0:?}")]
    Unterminated(String),

    #[error("unexpected trailing input in {0:?}")]
    TrailingInput(String),
}

/// A parsed `sip:`/`sips:`/`tel:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SipUri {
    scheme: String,
    user: Option<String>,
    host: String,
    port: Option<u16>,
    params: Vec<(String, Option<String>)>,
}

impl SipUri {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// User part, or the subscriber number for `tel:` URIs.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Host part; empty for `tel:` URIs.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn is_tel(&self) -> bool {
        self.scheme == "tel"
    }

    /// Telephone number carried by the URI.
    ///
    /// For `tel:` URIs this is the subscriber number. For SIP URIs it is the
    /// user part when `user=phone` is present.
    pub fn telephone_number(&self) -> Option<&str> {
        if self.is_tel() {
            return self.user.as_deref();
        }
        match self.param("user") {
            Some(Some(v)) if v.eq_ignore_ascii_case("phone") => self.user.as_deref(),
            _ => None,
        }
    }

    /// Look up a URI parameter.
    ///
    /// Returns `Some(None)` for a flag parameter such as `;lr`.
    pub fn param(&self, name: &str) -> Option<Option<&str>> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref())
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }
}

impl FromStr for SipUri {
    type Err = UriParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        grammar::parse_uri(s.trim())
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if self.is_tel() {
            f.write_str(self.user.as_deref().unwrap_or_default())?;
        } else {
            if let Some(user) = &self.user {
                write!(f, "{}@", user)?;
            }
            f.write_str(&self.host)?;
            if let Some(port) = self.port {
                write!(f, ":{}", port)?;
            }
        }
        for (name, value) in &self.params {
            match value {
                Some(v) => write!(f, ";{}={}", name, v)?,
                None => write!(f, ";{}", name)?,
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for SipUri {
    type Error = UriParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SipUri> for String {
    fn from(uri: SipUri) -> Self {
        uri.to_string()
    }
}

/// A From/To style address: optional display name plus URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NameAddr {
    pub display_name: Option<String>,
    pub uri: SipUri,
}

impl NameAddr {
    pub fn new(uri: SipUri) -> Self {
        Self { display_name: None, uri }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

impl FromStr for NameAddr {
    type Err = UriParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        grammar::parse_name_addr(s.trim())
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "\"{}\" <{}>", name, self.uri),
            None => write!(f, "<{}>", self.uri),
        }
    }
}

impl TryFrom<String> for NameAddr {
    type Error = UriParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NameAddr> for String {
    fn from(addr: NameAddr) -> Self {
        addr.to_string()
    }
}
