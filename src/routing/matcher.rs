//! Mapping-rule match expressions.
//!
//! # Responsibilities
//! - Resolve request variables (`request.method`, `request.uri.host`, ...)
//! - Evaluate conditions (equal, contains, exists, subdomain-of)
//! - Combine conditions with AND / OR / NOT
//! - Render a stable description for diagnostics
//!
//! # Design Decisions
//! - Closed set of variants; no user-supplied predicate code
//! - Absent variable = condition false (`not` inverts that)
//! - Empty `and` always matches, empty `or` never matches
//! - No regex to guarantee O(n) matching

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sip::{Method, NameAddr, SipRequest, SipUri};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &SipRequest) -> bool;

    /// Human-readable form used in diagnostic logs.
    fn describe(&self) -> String;
}

/// Returned for an unrecognised variable path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown request variable: {0}")]
pub struct UnknownVariable(pub String);

/// Component of a URI that a variable can select.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UriPart {
    Whole,
    Scheme,
    User,
    Host,
    Port,
    Tel,
    Param(String),
}

/// Component of a From/To address that a variable can select.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressPart {
    Whole,
    DisplayName,
    Uri(UriPart),
}

/// A request variable, e.g. `request.from.uri.host`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Variable {
    Method,
    Uri(UriPart),
    From(AddressPart),
    To(AddressPart),
    /// First value of a header, name stored lowercase.
    Header(String),
}

impl Variable {
    /// Resolve this variable against a request.
    pub fn resolve<'r>(&self, req: &'r SipRequest) -> Option<Cow<'r, str>> {
        match self {
            Variable::Method => Some(Cow::Borrowed(req.method.as_str())),
            Variable::Uri(part) => uri_part(&req.uri, part),
            Variable::From(part) => address_part(&req.from, part),
            Variable::To(part) => address_part(&req.to, part),
            Variable::Header(name) => req.header(name).map(Cow::Borrowed),
        }
    }
}

fn uri_part<'r>(uri: &'r SipUri, part: &UriPart) -> Option<Cow<'r, str>> {
    match part {
        UriPart::Whole => Some(Cow::Owned(uri.to_string())),
        UriPart::Scheme => Some(Cow::Borrowed(uri.scheme())),
        UriPart::User => uri.user().map(Cow::Borrowed),
        UriPart::Host => (!uri.host().is_empty()).then(|| Cow::Borrowed(uri.host())),
        UriPart::Port => uri.port().map(|p| Cow::Owned(p.to_string())),
        UriPart::Tel => uri.telephone_number().map(Cow::Borrowed),
        // A flag parameter (`;lr`) exists with an empty value.
        UriPart::Param(name) => uri.param(name).map(|v| Cow::Borrowed(v.unwrap_or(""))),
    }
}

fn address_part<'r>(addr: &'r NameAddr, part: &AddressPart) -> Option<Cow<'r, str>> {
    match part {
        AddressPart::Whole => Some(Cow::Owned(addr.to_string())),
        AddressPart::DisplayName => addr.display_name.as_deref().map(Cow::Borrowed),
        AddressPart::Uri(part) => uri_part(&addr.uri, part),
    }
}

fn parse_uri_part(path: &[&str]) -> Option<UriPart> {
    Some(match path {
        [] => UriPart::Whole,
        ["scheme"] => UriPart::Scheme,
        ["user"] => UriPart::User,
        ["host"] => UriPart::Host,
        ["port"] => UriPart::Port,
        ["tel"] => UriPart::Tel,
        ["param", name] if !name.is_empty() => UriPart::Param(name.to_string()),
        _ => return None,
    })
}

fn parse_address_part(path: &[&str]) -> Option<AddressPart> {
    Some(match path {
        [] => AddressPart::Whole,
        ["display-name"] => AddressPart::DisplayName,
        ["uri", rest @ ..] => AddressPart::Uri(parse_uri_part(rest)?),
        _ => return None,
    })
}

impl FromStr for Variable {
    type Err = UnknownVariable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownVariable(s.to_string());
        let path: Vec<&str> = s.trim().split('.').collect();
        let var = match path.as_slice() {
            ["request", "method"] => Variable::Method,
            ["request", "uri", rest @ ..] => {
                Variable::Uri(parse_uri_part(rest).ok_or_else(unknown)?)
            }
            ["request", "from", rest @ ..] => {
                Variable::From(parse_address_part(rest).ok_or_else(unknown)?)
            }
            ["request", "to", rest @ ..] => {
                Variable::To(parse_address_part(rest).ok_or_else(unknown)?)
            }
            // Header names may themselves contain dots.
            ["request", "header", name @ ..] if !name.is_empty() && !name.contains(&"") => {
                Variable::Header(name.join(".").to_ascii_lowercase())
            }
            _ => return Err(unknown()),
        };
        Ok(var)
    }
}

fn fmt_uri_part(f: &mut fmt::Formatter<'_>, part: &UriPart) -> fmt::Result {
    match part {
        UriPart::Whole => Ok(()),
        UriPart::Scheme => f.write_str(".scheme"),
        UriPart::User => f.write_str(".user"),
        UriPart::Host => f.write_str(".host"),
        UriPart::Port => f.write_str(".port"),
        UriPart::Tel => f.write_str(".tel"),
        UriPart::Param(name) => write!(f, ".param.{}", name),
    }
}

fn fmt_address_part(f: &mut fmt::Formatter<'_>, part: &AddressPart) -> fmt::Result {
    match part {
        AddressPart::Whole => Ok(()),
        AddressPart::DisplayName => f.write_str(".display-name"),
        AddressPart::Uri(part) => {
            f.write_str(".uri")?;
            fmt_uri_part(f, part)
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Method => f.write_str("request.method"),
            Variable::Uri(part) => {
                f.write_str("request.uri")?;
                fmt_uri_part(f, part)
            }
            Variable::From(part) => {
                f.write_str("request.from")?;
                fmt_address_part(f, part)
            }
            Variable::To(part) => {
                f.write_str("request.to")?;
                fmt_address_part(f, part)
            }
            Variable::Header(name) => write!(f, "request.header.{}", name),
        }
    }
}

impl TryFrom<String> for Variable {
    type Error = UnknownVariable;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Variable> for String {
    fn from(var: Variable) -> Self {
        var.to_string()
    }
}

/// A mapping-rule condition.
///
/// Serialized externally tagged, e.g. in TOML:
/// `pattern = { equal = { var = "request.method", value = "INVITE" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchExpression {
    Equal {
        var: Variable,
        value: String,
        #[serde(default)]
        ignore_case: bool,
    },
    Contains {
        var: Variable,
        value: String,
        #[serde(default)]
        ignore_case: bool,
    },
    Exists {
        var: Variable,
    },
    SubdomainOf {
        var: Variable,
        value: String,
    },
    And(Vec<MatchExpression>),
    Or(Vec<MatchExpression>),
    Not(Box<MatchExpression>),
}

impl MatchExpression {
    /// Matches requests whose method is exactly `method`.
    pub fn method(method: Method) -> Self {
        Self::equal(Variable::Method, method.as_str())
    }

    pub fn equal(var: Variable, value: impl Into<String>) -> Self {
        Self::Equal { var, value: value.into(), ignore_case: false }
    }

    pub fn equal_ignore_case(var: Variable, value: impl Into<String>) -> Self {
        Self::Equal { var, value: value.into(), ignore_case: true }
    }

    pub fn contains(var: Variable, value: impl Into<String>) -> Self {
        Self::Contains { var, value: value.into(), ignore_case: false }
    }

    pub fn exists(var: Variable) -> Self {
        Self::Exists { var }
    }

    pub fn subdomain_of(var: Variable, domain: impl Into<String>) -> Self {
        Self::SubdomainOf { var, value: domain.into() }
    }

    pub fn and(exprs: Vec<MatchExpression>) -> Self {
        Self::And(exprs)
    }

    pub fn or(exprs: Vec<MatchExpression>) -> Self {
        Self::Or(exprs)
    }

    pub fn negate(expr: MatchExpression) -> Self {
        Self::Not(Box::new(expr))
    }

    /// Evaluate against a request. Pure; never mutates.
    pub fn evaluate(&self, req: &SipRequest) -> bool {
        match self {
            MatchExpression::Equal { var, value, ignore_case } => var
                .resolve(req)
                .map(|v| {
                    if *ignore_case {
                        v.eq_ignore_ascii_case(value)
                    } else {
                        v == value.as_str()
                    }
                })
                .unwrap_or(false),
            MatchExpression::Contains { var, value, ignore_case } => var
                .resolve(req)
                .map(|v| {
                    if *ignore_case {
                        v.to_lowercase().contains(&value.to_lowercase())
                    } else {
                        v.contains(value.as_str())
                    }
                })
                .unwrap_or(false),
            MatchExpression::Exists { var } => var.resolve(req).is_some(),
            MatchExpression::SubdomainOf { var, value } => var
                .resolve(req)
                .map(|host| is_subdomain_of(&host, value))
                .unwrap_or(false),
            MatchExpression::And(exprs) => exprs.iter().all(|e| e.evaluate(req)),
            MatchExpression::Or(exprs) => exprs.iter().any(|e| e.evaluate(req)),
            MatchExpression::Not(expr) => !expr.evaluate(req),
        }
    }
}

fn is_subdomain_of(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(&domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

impl Matcher for MatchExpression {
    fn matches(&self, req: &SipRequest) -> bool {
        self.evaluate(req)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

fn fmt_joined(f: &mut fmt::Formatter<'_>, exprs: &[MatchExpression], op: &str) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "({})", expr)?;
    }
    Ok(())
}

impl fmt::Display for MatchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchExpression::Equal { var, value, ignore_case } => {
                write!(f, "{} == {:?}", var, value)?;
                if *ignore_case {
                    f.write_str(" ignoring case")?;
                }
                Ok(())
            }
            MatchExpression::Contains { var, value, ignore_case } => {
                write!(f, "{} contains {:?}", var, value)?;
                if *ignore_case {
                    f.write_str(" ignoring case")?;
                }
                Ok(())
            }
            MatchExpression::Exists { var } => write!(f, "exists {}", var),
            MatchExpression::SubdomainOf { var, value } => {
                write!(f, "{} subdomain-of {:?}", var, value)
            }
            MatchExpression::And(exprs) if exprs.is_empty() => f.write_str("true"),
            MatchExpression::Or(exprs) if exprs.is_empty() => f.write_str("false"),
            MatchExpression::And(exprs) => fmt_joined(f, exprs, "and"),
            MatchExpression::Or(exprs) => fmt_joined(f, exprs, "or"),
            MatchExpression::Not(expr) => write!(f, "not ({})", expr),
        }
    }
}
