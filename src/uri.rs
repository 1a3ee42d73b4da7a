//! Minimal URI handling for deep links.
//!
//! This is deliberately not a full RFC 3986 parser: deep link patterns embed
//! `{placeholder}` segments that a strict parser would reject, so both
//! patterns and concrete links go through the same tolerant splitter.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("uri is empty")]
    Empty,
    #[error("invalid percent escape in {0:?}")]
    BadEscape(String),
}

/// A uri split into its components.
///
/// Path segments and query values are stored percent-decoded; `Display`
/// reproduces the original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    raw: String,
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
    query: Vec<(String, String)>,
    fragment: Option<String>,
}

impl Uri {
    pub fn parse(input: &str) -> Result<Uri, UriError> {
        if input.is_empty() {
            return Err(UriError::Empty);
        }
        let raw = input.to_string();
        let mut rest = input;

        let fragment = match rest.find('#') {
            Some(idx) => {
                let fragment = decode(&rest[idx + 1..])?;
                rest = &rest[..idx];
                Some(fragment)
            }
            None => None,
        };

        let query_str = match rest.find('?') {
            Some(idx) => {
                let q = &rest[idx + 1..];
                rest = &rest[..idx];
                Some(q)
            }
            None => None,
        };

        let (scheme, authority, path) = match rest.find("://") {
            Some(idx) => {
                let scheme = rest[..idx].to_string();
                let after = &rest[idx + 3..];
                match after.find('/') {
                    Some(slash) => (
                        Some(scheme),
                        Some(after[..slash].to_string()),
                        after[slash..].to_string(),
                    ),
                    None => (Some(scheme), Some(after.to_string()), String::new()),
                }
            }
            None => (None, None, rest.to_string()),
        };

        let mut query = Vec::new();
        if let Some(query_str) = query_str {
            for pair in query_str.split('&').filter(|p| !p.is_empty()) {
                match pair.find('=') {
                    Some(idx) => query.push((
                        decode(&pair[..idx])?,
                        decode(&pair[idx + 1..])?,
                    )),
                    None => query.push((decode(pair)?, String::new())),
                }
            }
        }

        Ok(Uri {
            raw,
            scheme,
            authority,
            path,
            query,
            fragment,
        })
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decoded path segments, without empty leading or trailing segments.
    pub fn path_segments(&self) -> Vec<String> {
        self.path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| decode(s).unwrap_or_else(|_| s.to_string()))
            .collect()
    }

    /// The first value for the given query key.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Uri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Uri, UriError> {
        Uri::parse(s)
    }
}

fn decode(input: &str) -> Result<String, UriError> {
    if !input.contains('%') {
        return Ok(input.to_string());
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .ok_or_else(|| UriError::BadEscape(input.to_string()))?;
            let value = u8::from_str_radix(hex, 16)
                .map_err(|_| UriError::BadEscape(input.to_string()))?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| UriError::BadEscape(input.to_string()))
}

#[test]
fn test_parse_full() {
    let uri = Uri::parse("https://example.com/users/42?tab=posts&raw#top").unwrap();
    assert_eq!(uri.scheme(), Some("https"));
    assert_eq!(uri.authority(), Some("example.com"));
    assert_eq!(uri.path(), "/users/42");
    assert_eq!(uri.path_segments(), vec!["users", "42"]);
    assert_eq!(uri.query_value("tab"), Some("posts"));
    assert_eq!(uri.query_value("raw"), Some(""));
    assert_eq!(uri.fragment(), Some("top"));
}

#[test]
fn test_parse_no_scheme() {
    let uri = Uri::parse("users/{userId}").unwrap();
    assert_eq!(uri.scheme(), None);
    assert_eq!(uri.authority(), None);
    assert_eq!(uri.path_segments(), vec!["users", "{userId}"]);
}

#[test]
fn test_percent_decoding() {
    let uri = Uri::parse("app://x/hello%20world?q=a%26b").unwrap();
    assert_eq!(uri.path_segments(), vec!["hello world"]);
    assert_eq!(uri.query_value("q"), Some("a&b"));
    // an invalid escape leaves the segment as-is rather than dropping it
    assert_eq!(Uri::parse("app://x/%zz").unwrap().path_segments(), vec!["%zz"]);
}

#[test]
fn test_display_round_trip() {
    let raw = "app://skua.nav/profile/3?tab=posts";
    assert_eq!(Uri::parse(raw).unwrap().to_string(), raw);
}
