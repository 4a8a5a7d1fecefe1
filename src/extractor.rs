//! Reading a value, such as a credential, from wherever a request carries it.
//!
//! ```rust,ignore
//! let token = Extractor::chain(vec![
//!     Extractor::from_auth_header("Bearer"),
//!     Extractor::from_cookie("session"),
//!     Extractor::from_query("token"),
//! ]);
//!
//! let (value, source) = token.extract_with_source(c)?;
//! ```

use crate::error::Error;
use crate::Context;

use std::fmt;
use std::sync::Arc;

/// Where an [`Extractor`] reads its value from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    Header,
    AuthHeader,
    Cookie,
    Query,
    Form,
    Param,
    Custom,
}

/// Error returned by [`Extractor::extract`].
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The value is missing or blank.
    #[error("value not found")]
    NotFound,
    /// A custom extractor failed.
    #[error("{0}")]
    Other(Error),
}

type CustomFn = dyn Fn(&Context) -> Result<String, ExtractError> + Send + Sync;

#[derive(Clone)]
enum Kind {
    Header,
    AuthHeader(String),
    Cookie,
    Query,
    Form,
    Param,
    Custom(Arc<CustomFn>),
    Chain(Arc<[Extractor]>),
}

/// A strategy for reading a value from a request.
#[derive(Clone)]
pub struct Extractor {
    source: Source,
    key: String,
    kind: Kind,
}

impl Extractor {
    fn new(source: Source, key: &str, kind: Kind) -> Self {
        Self {
            source,
            key: key.to_owned(),
            kind,
        }
    }

    /// Read a request header.
    pub fn from_header(name: &str) -> Self {
        Self::new(Source::Header, name, Kind::Header)
    }

    /// Read the credentials of the `Authorization` header.
    ///
    /// With a scheme such as `Bearer`, the header must start with the
    /// scheme, compared case-insensitively, followed by spaces or tabs,
    /// and the rest of the header is returned. An empty scheme returns
    /// the whole header.
    pub fn from_auth_header(scheme: &str) -> Self {
        Self::new(
            Source::AuthHeader,
            "Authorization",
            Kind::AuthHeader(scheme.to_owned()),
        )
    }

    /// Read a request cookie.
    pub fn from_cookie(name: &str) -> Self {
        Self::new(Source::Cookie, name, Kind::Cookie)
    }

    /// Read a query string parameter.
    pub fn from_query(name: &str) -> Self {
        Self::new(Source::Query, name, Kind::Query)
    }

    /// Read a form field.
    pub fn from_form(name: &str) -> Self {
        Self::new(Source::Form, name, Kind::Form)
    }

    /// Read a route parameter.
    pub fn from_param(name: &str) -> Self {
        Self::new(Source::Param, name, Kind::Param)
    }

    /// Read a value with a custom function.
    pub fn from_custom<F>(key: &str, f: F) -> Self
    where
        F: Fn(&Context) -> Result<String, ExtractError> + Send + Sync + 'static,
    {
        Self::new(Source::Custom, key, Kind::Custom(Arc::new(f)))
    }

    /// Try each extractor in order.
    ///
    /// The first non-empty value wins. If none is found, the last error
    /// is returned, or [`ExtractError::NotFound`] for an empty chain. The
    /// chain reports the source and key of its first extractor.
    pub fn chain(extractors: Vec<Extractor>) -> Self {
        let (source, key) = extractors
            .first()
            .map_or((Source::Custom, String::new()), |first| {
                (first.source, first.key.clone())
            });

        Self {
            source,
            key,
            kind: Kind::Chain(extractors.into()),
        }
    }

    /// The source this extractor reads from.
    pub fn source(&self) -> Source {
        self.source
    }

    /// The name of the value this extractor reads.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the value from a request.
    pub fn extract(&self, c: &Context) -> Result<String, ExtractError> {
        self.extract_with_source(c).map(|(value, _)| value)
    }

    /// Read the value from a request, along with the source it was found in.
    pub fn extract_with_source(&self, c: &Context) -> Result<(String, Source), ExtractError> {
        let value = match self.kind {
            Kind::Header => c.get(&self.key).map(|value| value.into_owned()),
            Kind::AuthHeader(ref scheme) => {
                c.get(&self.key).and_then(|header| credentials(&header, scheme))
            }
            Kind::Cookie => c.cookies(&self.key).map(str::to_owned),
            Kind::Query => c.query(&self.key).map(str::to_owned),
            Kind::Form => c.form_value(&self.key).map(str::to_owned),
            Kind::Param => Some(c.params(&self.key).to_owned()),
            Kind::Custom(ref f) => Some(f(c)?),
            Kind::Chain(ref extractors) => return chain(extractors, c),
        };

        match value {
            Some(value) if !value.trim().is_empty() => Ok((value.trim().to_owned(), self.source)),
            _ => Err(ExtractError::NotFound),
        }
    }
}

fn chain(extractors: &[Extractor], c: &Context) -> Result<(String, Source), ExtractError> {
    let mut last = None;

    for extractor in extractors {
        match extractor.extract_with_source(c) {
            Ok((value, source)) if !value.is_empty() => return Ok((value, source)),
            Ok(_) => {}
            Err(err) => last = Some(err),
        }
    }

    Err(last.unwrap_or(ExtractError::NotFound))
}

// The credentials following `scheme` in an `Authorization` header.
fn credentials(header: &str, scheme: &str) -> Option<String> {
    let header = header.trim();

    if scheme.is_empty() {
        return Some(header.to_owned());
    }

    let prefix = header.get(..scheme.len())?;
    if !prefix.eq_ignore_ascii_case(scheme) {
        return None;
    }

    let rest = &header[scheme.len()..];
    let token = rest.trim_start_matches(|c: char| c == ' ' || c == '\t');

    // the scheme must be followed by at least one space or tab
    if token.len() == rest.len() {
        return None;
    }

    Some(token.to_owned())
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Extractor");
        debug.field("source", &self.source).field("key", &self.key);

        if let Kind::Chain(ref extractors) = self.kind {
            debug.field("chain", extractors);
        }

        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::credentials;

    #[test]
    fn auth_scheme_rules() {
        assert_eq!(credentials("Bearer abc", "Bearer").as_deref(), Some("abc"));
        assert_eq!(credentials("bearer \t abc ", "Bearer").as_deref(), Some("abc"));
        assert_eq!(credentials("Bearerabc", "Bearer"), None);
        assert_eq!(credentials("Basic abc", "Bearer"), None);
        assert_eq!(credentials("  Basic abc  ", "").as_deref(), Some("Basic abc"));
    }
}
