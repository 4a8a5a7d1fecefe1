//! Route patterns.
//!
//! A pattern is a `/`-separated list of segments:
//!
//! | segment        | matches                                             |
//! |----------------|-----------------------------------------------------|
//! | `users`        | the literal segment                                 |
//! | `:id`          | any non-empty segment                               |
//! | `:id?`         | any segment, or nothing                             |
//! | `:id(\d+)`     | a segment matching the regular expression          |
//! | `:path+`       | the rest of the path, at least one byte             |
//! | `:path*`, `*`  | the rest of the path, possibly empty                |
//!
//! Parameter names are made of ASCII letters, digits and `_`.
//!
//! A backslash escapes the next character in a literal segment, so
//! `/v1\:list` matches the path `/v1:list`.

use std::borrow::Cow;
use std::fmt;

use regex::Regex;

/// The maximum number of parameters in a single route.
pub const MAX_PARAMS: usize = 30;

/// Error returned when a route pattern is malformed.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("duplicate parameter `{name}` in route `{pattern}`")]
    DuplicateParam { name: String, pattern: String },
    #[error("wildcard `{name}` must be the last segment of route `{pattern}`")]
    GreedyNotLast { name: String, pattern: String },
    #[error("route `{0}` declares more than {MAX_PARAMS} parameters")]
    TooManyParams(String),
    #[error("missing parameter name in route `{0}`")]
    MissingName(String),
    #[error("unterminated constraint in route `{0}`")]
    UnterminatedConstraint(String),
    #[error("unexpected `{rest}` after parameter `{name}` in route `{pattern}`")]
    TrailingCharacters {
        name: String,
        rest: String,
        pattern: String,
    },
    #[error("invalid constraint for parameter `{name}`: {source}")]
    Constraint {
        name: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Greedy {
    /// `*`, matches the empty string.
    Star,
    /// `+`, requires at least one byte.
    Plus,
}

#[derive(Clone)]
struct Param {
    name: String,
    index: usize,
    constraint: Option<Regex>,
    optional: bool,
    greedy: Option<Greedy>,
}

impl Param {
    fn accepts(&self, value: &str) -> bool {
        if value.is_empty() && self.greedy != Some(Greedy::Star) {
            return false;
        }

        match self.constraint {
            Some(ref re) => re.is_match(value),
            None => true,
        }
    }
}

#[derive(Clone)]
enum Segment {
    Const(String),
    Param(Param),
}

/// A parsed route pattern.
#[derive(Clone)]
pub struct RouteParser {
    segments: Vec<Segment>,
    params: Vec<String>,
    trailing_slash: bool,
}

impl RouteParser {
    /// Parse a route pattern.
    ///
    /// Literal segments are lowercased unless `case_sensitive` is set,
    /// and a trailing slash is only significant under `strict_routing`.
    pub fn parse(
        pattern: &str,
        case_sensitive: bool,
        strict_routing: bool,
    ) -> Result<Self, ParseError> {
        let mut body = pattern.strip_prefix('/').unwrap_or(pattern);

        let mut trailing_slash = false;
        if body.ends_with('/') && !body.ends_with("\\/") {
            body = body.trim_end_matches('/');
            trailing_slash = strict_routing;
        }

        let mut segments = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if !body.is_empty() {
            for raw in split(body, pattern)? {
                let segment = parse_segment(raw, pattern, params.len(), case_sensitive)?;

                if let Segment::Param(ref param) = segment {
                    if params.iter().any(|name| *name == param.name) {
                        return Err(ParseError::DuplicateParam {
                            name: param.name.clone(),
                            pattern: pattern.to_owned(),
                        });
                    }

                    params.push(param.name.clone());

                    if params.len() > MAX_PARAMS {
                        return Err(ParseError::TooManyParams(pattern.to_owned()));
                    }
                }

                segments.push(segment);
            }
        }

        // a greedy parameter swallows the rest of the path, so nothing can follow it
        for (i, segment) in segments.iter().enumerate() {
            if let Segment::Param(param) = segment {
                if param.greedy.is_some() && (i + 1 != segments.len() || trailing_slash) {
                    return Err(ParseError::GreedyNotLast {
                        name: param.name.clone(),
                        pattern: pattern.to_owned(),
                    });
                }
            }
        }

        Ok(Self {
            segments,
            params,
            trailing_slash,
        })
    }

    /// The parameter names of this pattern, in order of appearance.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Match a path against this pattern, returning the parameter values.
    ///
    /// `detection` is the normalized path (see [`detection_path`]) and
    /// `original` the path it was derived from, which is where parameter
    /// values are copied from. If `partial` is set, the pattern only needs
    /// to match a prefix of the path ending at a `/` boundary.
    pub fn matches(&self, detection: &str, original: &str, partial: bool) -> Option<Vec<String>> {
        let mut values = Vec::new();
        self.match_into(detection, original, partial, &mut values)
            .then(|| values)
    }

    pub(crate) fn match_into(
        &self,
        detection: &str,
        original: &str,
        partial: bool,
        values: &mut Vec<String>,
    ) -> bool {
        let mut spans = [None; MAX_PARAMS];
        let matcher = Matcher {
            segments: &self.segments,
            trailing_slash: self.trailing_slash,
            detection,
            partial,
        };

        if !matcher.at(0, 0, &mut spans) {
            return false;
        }

        values.clear();
        for span in spans.iter().take(self.params.len()) {
            values.push(match *span {
                Some((start, end)) => original.get(start..end).unwrap_or_default().to_owned(),
                None => String::new(),
            });
        }

        true
    }
}

impl fmt::Debug for RouteParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteParser")
            .field("params", &self.params)
            .field("trailing_slash", &self.trailing_slash)
            .finish()
    }
}

struct Matcher<'a> {
    segments: &'a [Segment],
    trailing_slash: bool,
    detection: &'a str,
    partial: bool,
}

impl Matcher<'_> {
    fn at(&self, i: usize, pos: usize, spans: &mut [Option<(usize, usize)>]) -> bool {
        let rest = &self.detection[pos..];

        let segment = match self.segments.get(i) {
            Some(segment) => segment,
            // every segment was optional and skipped, like the root pattern
            None if pos == 0 && rest == "/" => return true,
            None => {
                let rest = match self.trailing_slash {
                    true => match rest.strip_prefix('/') {
                        Some(rest) => rest,
                        None => return false,
                    },
                    false => rest,
                };

                return rest.is_empty() || (self.partial && rest.starts_with('/'));
            }
        };

        match segment {
            Segment::Const(literal) => {
                let end = pos + 1 + literal.len();
                let next = match rest.strip_prefix('/') {
                    Some(after) if after.starts_with(literal.as_str()) => &self.detection[end..],
                    _ => return false,
                };

                (next.is_empty() || next.starts_with('/')) && self.at(i + 1, end, spans)
            }
            Segment::Param(param) => {
                if rest.starts_with('/') {
                    let start = pos + 1;
                    let end = match param.greedy {
                        Some(_) => self.detection.len(),
                        None => self.detection[start..]
                            .find('/')
                            .map_or(self.detection.len(), |j| start + j),
                    };

                    if param.accepts(&self.detection[start..end]) {
                        spans[param.index] = Some((start, end));

                        if self.at(i + 1, end, spans) {
                            return true;
                        }
                    }

                    spans[param.index] = None;
                }

                param.optional && self.at(i + 1, pos, spans)
            }
        }
    }
}

// Split a pattern on `/`, ignoring separators that are escaped or inside a constraint.
fn split<'p>(body: &'p str, pattern: &str) -> Result<Vec<&'p str>, ParseError> {
    let bytes = body.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'/' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }

        i += 1;
    }

    if depth != 0 {
        return Err(ParseError::UnterminatedConstraint(pattern.to_owned()));
    }

    parts.push(&body[start.min(body.len())..]);
    Ok(parts)
}

fn parse_segment(
    raw: &str,
    pattern: &str,
    index: usize,
    case_sensitive: bool,
) -> Result<Segment, ParseError> {
    let wildcard = |name: &str, greedy| {
        Segment::Param(Param {
            name: name.to_owned(),
            index,
            constraint: None,
            optional: greedy == Greedy::Star,
            greedy: Some(greedy),
        })
    };

    let spec = match raw {
        "*" => return Ok(wildcard("*", Greedy::Star)),
        "+" => return Ok(wildcard("+", Greedy::Plus)),
        _ => match raw.strip_prefix(':') {
            Some(spec) => spec,
            None => {
                let literal = unescape(raw);
                return Ok(Segment::Const(match case_sensitive {
                    true => literal.into_owned(),
                    false => literal.to_ascii_lowercase(),
                }));
            }
        },
    };

    let name_end = spec
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(spec.len());
    let name = &spec[..name_end];

    if name.is_empty() {
        return Err(ParseError::MissingName(pattern.to_owned()));
    }

    let mut rest = &spec[name_end..];

    let mut constraint = None;
    if let Some(inner) = rest.strip_prefix('(') {
        let close = closing_paren(inner)
            .ok_or_else(|| ParseError::UnterminatedConstraint(pattern.to_owned()))?;

        let re = Regex::new(&format!("^(?:{})$", &inner[..close])).map_err(|source| {
            ParseError::Constraint {
                name: name.to_owned(),
                source,
            }
        })?;

        constraint = Some(re);
        rest = &inner[close + 1..];
    }

    let (optional, greedy) = match rest {
        "" => (false, None),
        "?" => (true, None),
        "*" => (true, Some(Greedy::Star)),
        "+" => (false, Some(Greedy::Plus)),
        _ => {
            return Err(ParseError::TrailingCharacters {
                name: name.to_owned(),
                rest: rest.to_owned(),
                pattern: pattern.to_owned(),
            })
        }
    };

    Ok(Segment::Param(Param {
        name: name.to_owned(),
        index,
        constraint,
        optional,
        greedy,
    }))
}

fn closing_paren(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 1;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }

        i += 1;
    }

    None
}

fn unescape(s: &str) -> Cow<'_, str> {
    if s.contains('\\') {
        Cow::Owned(s.replace('\\', ""))
    } else {
        Cow::Borrowed(s)
    }
}

/// Canonicalize a route pattern.
///
/// The canonical form always begins with `/`, has escape characters
/// removed, is lowercased unless `case_sensitive`, and has trailing
/// slashes removed unless `strict_routing`. The root `/` is preserved.
pub fn canonicalize(pattern: &str, case_sensitive: bool, strict_routing: bool) -> String {
    let mut pretty = unescape(pattern).into_owned();

    if !pretty.starts_with('/') {
        pretty.insert(0, '/');
    }

    if !case_sensitive {
        pretty.make_ascii_lowercase();
    }

    if !strict_routing {
        trim_trailing_slashes(&mut pretty);
    }

    pretty
}

/// Normalize a request path for matching.
///
/// The result has the same byte offsets as `path` for every byte it
/// keeps, so parameter values can be sliced from the original path.
pub fn detection_path(path: &str, case_sensitive: bool, strict_routing: bool) -> String {
    let mut detection = if path.is_empty() {
        String::from("/")
    } else {
        path.to_owned()
    };

    if !case_sensitive {
        detection.make_ascii_lowercase();
    }

    if !strict_routing {
        trim_trailing_slashes(&mut detection);
    }

    detection
}

/// Join a group or mount prefix and a route path with a single `/`.
///
/// The root path `/` resolves to the prefix itself.
pub(crate) fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');

    if path.is_empty() || path == "/" {
        return match prefix.is_empty() {
            true => String::from("/"),
            false => prefix.to_owned(),
        };
    }

    match path.starts_with('/') {
        true => format!("{}{}", prefix, path),
        false => format!("{}/{}", prefix, path),
    }
}

pub(crate) fn trim_trailing_slashes(path: &mut String) {
    let trimmed = path.trim_end_matches('/').len();
    path.truncate(trimmed.max(1));
}
