//! HTTP types and the protocol helpers used by [`Context`](crate::Context).

mod body;
mod cookie;
mod date;
mod from_str;
mod multipart;
mod negotiate;
mod range;

pub(crate) mod mime_types;

pub use body::{Body, BodyError};
pub use cookie::{Cookie, SameSite};
pub(crate) use cookie::pairs as cookie_pairs;
pub use from_str::FromStr;
pub use multipart::{FormFile, MultipartError, MultipartForm};
pub use range::{ByteRange, Range, RangeError};

pub(crate) use date::{format_http_date, parse_http_date};
pub(crate) use negotiate::{negotiate, Offer};

pub use bytes::Bytes;
pub use http::{header, Extensions, HeaderMap, HeaderValue, Method, StatusCode, Uri, Version};

/// An HTTP request.
pub type Request = http::Request<Body>;

/// An HTTP response.
pub type Response = http::Response<Body>;
