//! nom grammar for `sip:`/`sips:`/`tel:` URIs and name-addr values.
//!
//! Parsers here only split the input; semantic checks (supported scheme,
//! non-empty host, port range) happen in the `parse_*` entry points so each
//! failure maps to a specific [`UriParseError`].

use nom::{
    branch::alt,
    bytes::complete::{take_till, take_till1, take_while, take_while1},
    character::complete::{anychar, char, none_of, space0},
    combinator::{map, opt, recognize, rest},
    multi::{fold_many0, many0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::{NameAddr, SipUri, UriParseError};

type ParseResult<'a, O> = IResult<&'a str, O>;

type RawParam<'a> = (&'a str, Option<&'a str>);

fn is_user_char(c: char) -> bool {
    !matches!(c, '@' | ':' | ';' | '?' | '<' | '>') && !c.is_whitespace()
}

fn is_password_char(c: char) -> bool {
    !matches!(c, '@' | ';' | '?' | '<' | '>') && !c.is_whitespace()
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')
}

/// `scheme ":"`
fn scheme(input: &str) -> ParseResult<&str> {
    terminated(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic()),
            take_while(|c: char| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        )),
        char(':'),
    )(input)
}

/// `user [":" password] "@"`; the password is discarded by the caller.
fn user_info(input: &str) -> ParseResult<(&str, Option<&str>)> {
    terminated(
        pair(
            take_while(is_user_char),
            opt(preceded(char(':'), take_while(is_password_char))),
        ),
        char('@'),
    )(input)
}

/// `tel:` subscriber number, up to the first parameter.
fn subscriber_number(input: &str) -> ParseResult<&str> {
    take_till(|c| matches!(c, ';' | '?'))(input)
}

/// `"[" IPv6 "]"`, brackets included.
fn ipv6_reference(input: &str) -> ParseResult<&str> {
    recognize(delimited(char('['), take_till1(|c| c == ']'), char(']')))(input)
}

fn hostname(input: &str) -> ParseResult<&str> {
    take_while(is_host_char)(input)
}

/// `":" port`, unvalidated.
fn port(input: &str) -> ParseResult<&str> {
    preceded(char(':'), take_till(|c| matches!(c, ';' | '?' | '>')))(input)
}

fn hostport(input: &str) -> ParseResult<(Option<(&str, Option<&str>)>, &str, Option<&str>)> {
    tuple((opt(user_info), alt((ipv6_reference, hostname)), opt(port)))(input)
}

/// `*( ";" name [ "=" value ] )`
fn uri_params(input: &str) -> ParseResult<Vec<RawParam<'_>>> {
    many0(preceded(
        char(';'),
        pair(
            take_till(|c| matches!(c, '=' | ';' | '?')),
            opt(preceded(char('='), take_till(|c| matches!(c, ';' | '?')))),
        ),
    ))(input)
}

/// `"?" headers`; accepted and discarded.
fn uri_headers(input: &str) -> ParseResult<Option<&str>> {
    opt(preceded(char('?'), rest))(input)
}

fn quoted_string(input: &str) -> ParseResult<String> {
    delimited(
        char('"'),
        fold_many0(
            alt((preceded(char('\\'), anychar), none_of("\\\""))),
            String::new,
            |mut acc, c| {
                acc.push(c);
                acc
            },
        ),
        char('"'),
    )(input)
}

fn token_display_name(input: &str) -> ParseResult<String> {
    map(take_till1(|c| c == '<' || c == '"'), |s: &str| s.trim().to_string())(input)
}

/// `[display-name] LAQUOT`
fn name_addr_open(input: &str) -> ParseResult<Option<String>> {
    terminated(
        opt(alt((quoted_string, token_display_name))),
        pair(space0, char('<')),
    )(input)
}

/// `addr-spec RAQUOT`; anything after the closing bracket is header params.
fn name_addr_close(input: &str) -> ParseResult<&str> {
    terminated(take_till(|c| c == '>'), char('>'))(input)
}

pub(super) fn parse_uri(input: &str) -> Result<SipUri, UriParseError> {
    let (tail, scheme) =
        scheme(input).map_err(|_| UriParseError::MissingScheme(input.to_string()))?;
    let scheme = scheme.to_ascii_lowercase();

    let (tail, user, host, port) = match scheme.as_str() {
        "tel" => {
            let (tail, number) = subscriber_number(tail)
                .map_err(|_| UriParseError::MissingNumber(input.to_string()))?;
            if number.is_empty() {
                return Err(UriParseError::MissingNumber(input.to_string()));
            }
            (tail, Some(number), "", None)
        }
        "sip" | "sips" => {
            let (tail, (userinfo, host, port)) =
                hostport(tail).map_err(|_| UriParseError::MissingHost(input.to_string()))?;
            if host.is_empty() {
                return Err(if tail.starts_with('[') {
                    UriParseError::Unterminated(input.to_string())
                } else {
                    UriParseError::MissingHost(input.to_string())
                });
            }
            let port = port
                .map(|p| {
                    p.parse::<u16>()
                        .map_err(|_| UriParseError::InvalidPort(p.to_string()))
                })
                .transpose()?;
            let user = userinfo.map(|(user, _password)| user).filter(|u| !u.is_empty());
            (tail, user, host, port)
        }
        other => return Err(UriParseError::UnsupportedScheme(other.to_string())),
    };

    let trailing = || UriParseError::TrailingInput(input.to_string());
    let (tail, params) = uri_params(tail).map_err(|_| trailing())?;
    let (tail, _headers) = uri_headers(tail).map_err(|_| trailing())?;
    if !tail.is_empty() {
        return Err(trailing());
    }

    Ok(SipUri {
        host: host.to_ascii_lowercase(),
        user: user.map(str::to_string),
        port,
        params: params
            .into_iter()
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
            .collect(),
        scheme,
    })
}

pub(super) fn parse_name_addr(input: &str) -> Result<NameAddr, UriParseError> {
    match name_addr_open(input) {
        Ok((tail, display_name)) => {
            let (_params, addr_spec) = name_addr_close(tail)
                .map_err(|_| UriParseError::Unterminated(input.to_string()))?;
            Ok(NameAddr {
                display_name: display_name.filter(|name| !name.is_empty()),
                uri: parse_uri(addr_spec.trim())?,
            })
        }
        Err(_) if input.starts_with('"') => Err(UriParseError::Unterminated(input.to_string())),
        Err(_) => Ok(NameAddr::new(parse_uri(input)?)),
    }
}
