//! The inbound request as seen by mapping rules.

use serde::{Deserialize, Serialize};

use crate::sip::method::Method;
use crate::sip::uri::{NameAddr, SipUri};

/// An inbound SIP request, reduced to what dispatch needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipRequest {
    pub method: Method,
    pub uri: SipUri,
    pub from: NameAddr,
    pub to: NameAddr,
    /// Ordered header list; repeated names are allowed.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl SipRequest {
    /// Start building a request. From and To default to the request URI.
    pub fn builder(method: Method, uri: SipUri) -> SipRequestBuilder {
        SipRequestBuilder {
            from: None,
            to: None,
            headers: Vec::new(),
            method,
            uri,
        }
    }

    /// First value of the named header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of the named header, in order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builder for [`SipRequest`].
#[derive(Debug, Clone)]
pub struct SipRequestBuilder {
    method: Method,
    uri: SipUri,
    from: Option<NameAddr>,
    to: Option<NameAddr>,
    headers: Vec<(String, String)>,
}

impl SipRequestBuilder {
    pub fn from(mut self, from: NameAddr) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: NameAddr) -> Self {
        self.to = Some(to);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> SipRequest {
        let from = self.from.unwrap_or_else(|| NameAddr::new(self.uri.clone()));
        let to = self.to.unwrap_or_else(|| NameAddr::new(self.uri.clone()));
        SipRequest {
            method: self.method,
            uri: self.uri,
            from,
            to,
            headers: self.headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = SipRequest::builder(Method::Invite, "sip:bob@biloxi.com".parse().unwrap())
            .header("Via", "SIP/2.0/UDP a")
            .header("via", "SIP/2.0/UDP b")
            .header("X-Conference-Id", "room-7")
            .build();

        assert_eq!(req.header("x-conference-id"), Some("room-7"));
        assert_eq!(req.header("VIA"), Some("SIP/2.0/UDP a"));
        assert_eq!(req.header_values("Via").count(), 2);
        assert_eq!(req.header("Contact"), None);
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{
            "method": "MESSAGE",
            "uri": "sip:chat@example.com",
            "from": "\"Alice\" <sip:alice@atlanta.com>",
            "to": "<sip:chat@example.com>",
            "headers": [["Content-Type", "text/plain"]]
        }"#;
        let req: SipRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, Method::Message);
        assert_eq!(req.from.display_name.as_deref(), Some("Alice"));
        assert_eq!(req.header("content-type"), Some("text/plain"));
    }
}
