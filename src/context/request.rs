use super::{Context, FLASH_COOKIE};
use crate::error::Error;
use crate::http::{
    cookie_pairs, header, negotiate, parse_http_date, Bytes, FormFile, HeaderMap, Method,
    MultipartForm, Offer, Range, RangeError, StatusCode, Version,
};

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::de::DeserializeOwned;

/// The address of the peer that sent the request.
///
/// Servers insert this into the request extensions, see `fennec-hyper`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

impl Context {
    /// The request method.
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// The request path used for routing.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Override the path used for routing.
    ///
    /// This only affects routes visited after the call; use
    /// [`restart_routing`](Self::restart_routing) to route the request again.
    pub fn set_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path = path.into();
        if !self.path.starts_with('/') {
            self.path.insert(0, '/');
        }

        self.update_detection();
        self
    }

    /// The request target as received: path and query string.
    pub fn original_url(&self) -> &str {
        self.request
            .uri()
            .path_and_query()
            .map_or("/", |target| target.as_str())
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// The value of a request header.
    ///
    /// Repeated headers are joined with `", "`. Values that are not
    /// valid UTF-8 are skipped.
    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        let mut values = self
            .request
            .headers()
            .get_all(key)
            .iter()
            .filter_map(|value| value.to_str().ok());

        let first = values.next()?;
        match values.next() {
            None => Some(Cow::Borrowed(first)),
            Some(second) => {
                let mut joined = format!("{}, {}", first, second);
                for value in values {
                    joined.push_str(", ");
                    joined.push_str(value);
                }
                Some(Cow::Owned(joined))
            }
        }
    }

    fn header_str(&self, key: impl header::AsHeaderName) -> Option<&str> {
        self.request.headers().get(key)?.to_str().ok()
    }

    /// The HTTP version of the request.
    pub fn http_version(&self) -> Version {
        self.request.version()
    }

    /// `https` or `http`.
    ///
    /// `X-Forwarded-Proto` is honored when the peer is a trusted proxy.
    pub fn protocol(&self) -> &str {
        if let Some(scheme) = self.request.uri().scheme_str() {
            return scheme;
        }

        if self.is_proxy_trusted() {
            if let Some(proto) = self.header_str("x-forwarded-proto") {
                let proto = proto.split(',').next().unwrap_or_default().trim();
                if proto.eq_ignore_ascii_case("https") {
                    return "https";
                }
            }
        }

        "http"
    }

    /// Whether the request was made over TLS.
    pub fn secure(&self) -> bool {
        self.protocol() == "https"
    }

    /// The host name of the request, without the port.
    ///
    /// `X-Forwarded-Host` is honored when the peer is a trusted proxy.
    pub fn hostname(&self) -> &str {
        let forwarded = match self.is_proxy_trusted() {
            true => self.header_str("x-forwarded-host"),
            false => None,
        };

        let host = forwarded
            .map(|host| host.split(',').next().unwrap_or_default().trim())
            .or_else(|| self.header_str(header::HOST))
            .or_else(|| self.request.uri().host())
            .unwrap_or_default();

        strip_port(host)
    }

    /// The address of the peer, or of the client when a proxy header is
    /// configured and the peer is trusted.
    pub fn ip(&self) -> String {
        if let Some(ref proxy_header) = self.config.proxy_header {
            if self.is_proxy_trusted() {
                if let Some(ip) = self.header_str(proxy_header.as_str()) {
                    return ip.split(',').next().unwrap_or_default().trim().to_owned();
                }
            }
        }

        self.remote_ip().map(|ip| ip.to_string()).unwrap_or_default()
    }

    /// The client addresses listed in `X-Forwarded-For`, closest client first.
    pub fn ips(&self) -> Vec<&str> {
        self.header_str("x-forwarded-for")
            .map(|ips| {
                ips.split(',')
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remote_ip(&self) -> Option<IpAddr> {
        self.request
            .extensions()
            .get::<RemoteAddr>()
            .map(|addr| addr.0.ip())
    }

    /// Whether forwarding headers sent by the peer can be trusted.
    pub fn is_proxy_trusted(&self) -> bool {
        if !self.config.enable_trusted_proxy_check {
            return true;
        }

        match self.remote_ip() {
            Some(ip) => self
                .config
                .trusted_proxies
                .iter()
                .any(|proxy| proxy.parse::<IpAddr>().map_or(false, |proxy| proxy == ip)),
            None => false,
        }
    }

    /// The subdomains of the host name, most specific last.
    ///
    /// The last `subdomain_offset` parts of the host name are dropped,
    /// so `tobi.ferrets.example.com` gives `["ferrets", "tobi"]` by default.
    pub fn subdomains(&self) -> Vec<&str> {
        let host = self.hostname();
        if host.parse::<IpAddr>().is_ok() {
            return Vec::new();
        }

        let parts: Vec<&str> = host.split('.').collect();
        let keep = parts.len().saturating_sub(self.config.subdomain_offset);
        parts.into_iter().take(keep).rev().collect()
    }

    /// Whether the request was sent by a JavaScript `XMLHttpRequest`.
    pub fn is_xhr(&self) -> bool {
        self.header_str("x-requested-with")
            .map_or(false, |value| value.eq_ignore_ascii_case("xmlhttprequest"))
    }

    /// The raw request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    fn request_content_type(&self) -> &str {
        self.header_str(header::CONTENT_TYPE).unwrap_or_default()
    }

    fn content_type_is(&self, ty: &mime::Mime) -> bool {
        let content_type = self.request_content_type();
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        essence.eq_ignore_ascii_case(ty.essence_str())
    }

    /// Deserialize the request body according to its content type.
    ///
    /// JSON and URL encoded bodies are supported. Other content types
    /// fail with `422 Unprocessable Entity`, malformed bodies with
    /// `400 Bad Request`.
    pub fn body_parser<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if self.content_type_is(&mime::APPLICATION_JSON) {
            return serde_json::from_slice(&self.body)
                .map_err(|err| Error::with_status(StatusCode::BAD_REQUEST, err));
        }

        if self.content_type_is(&mime::APPLICATION_WWW_FORM_URLENCODED) {
            return serde_urlencoded::from_bytes(&self.body)
                .map_err(|err| Error::with_status(StatusCode::BAD_REQUEST, err));
        }

        Err(Error::from_status(StatusCode::UNPROCESSABLE_ENTITY))
    }

    /// The first value of a form field.
    ///
    /// URL encoded and multipart bodies are supported.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        if self.content_type_is(&mime::MULTIPART_FORM_DATA) {
            return self.multipart_form().ok()?.value(key);
        }

        if !self.content_type_is(&mime::APPLICATION_WWW_FORM_URLENCODED) {
            return None;
        }

        self.form
            .get_or_init(|| serde_urlencoded::from_bytes(&self.body).unwrap_or_default())
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// The parsed multipart form.
    ///
    /// Fails with `400 Bad Request` if the body is not a valid multipart form.
    pub fn multipart_form(&self) -> Result<&MultipartForm, Error> {
        self.multipart.get_or_try_init(|| {
            MultipartForm::parse(self.request_content_type(), &self.body)
                .map_err(|err| Error::with_status(StatusCode::BAD_REQUEST, err))
        })
    }

    /// The first file uploaded under a multipart form field.
    pub fn form_file(&self, key: &str) -> Result<&FormFile, Error> {
        self.multipart_form()?.file(key).ok_or_else(|| {
            Error::new(
                StatusCode::BAD_REQUEST,
                format!("no file uploaded as `{}`", key),
            )
        })
    }

    /// Write an uploaded file to disk.
    pub async fn save_file(&self, file: &FormFile, path: impl AsRef<Path>) -> Result<(), Error> {
        tokio::fs::write(path, &file.data).await?;
        Ok(())
    }

    /// All query string parameters, in order.
    pub fn queries(&self) -> &[(String, String)] {
        self.query.get_or_init(|| {
            let query = self.request.uri().query().unwrap_or_default();
            serde_urlencoded::from_str(query).unwrap_or_default()
        })
    }

    /// The first value of a query string parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.queries()
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Parse a query string parameter.
    ///
    /// Fails with `400 Bad Request` if the parameter is missing or invalid.
    pub fn query_parse<'a, T>(&'a self, key: &str) -> Result<T, Error>
    where
        T: crate::http::FromStr<'a>,
    {
        let value = self.query(key).ok_or_else(|| {
            Error::new(
                StatusCode::BAD_REQUEST,
                format!("missing query parameter `{}`", key),
            )
        })?;

        T::from_str(value).map_err(|err| {
            Error::new(
                StatusCode::BAD_REQUEST,
                format!("invalid query parameter `{}`: {}", key, err),
            )
        })
    }

    /// Deserialize the query string.
    pub fn bind_query<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let query = self.request.uri().query().unwrap_or_default();
        serde_urlencoded::from_str(query)
            .map_err(|err| Error::with_status(StatusCode::BAD_REQUEST, err))
    }

    /// The value of a request cookie.
    pub fn cookies(&self, key: &str) -> Option<&str> {
        self.request
            .headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(cookie_pairs)
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value)
    }

    /// The best of `offers` according to the `Accept` header.
    ///
    /// Offers can be media types (`text/html`) or extensions (`html`).
    pub fn accepts<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        negotiate(self.header_str(header::ACCEPT).unwrap_or_default(), offers, Offer::Type)
    }

    /// The best of `offers` according to the `Accept-Charset` header.
    pub fn accepts_charsets<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        negotiate(self.header_str(header::ACCEPT_CHARSET).unwrap_or_default(), offers, Offer::Token)
    }

    /// The best of `offers` according to the `Accept-Encoding` header.
    pub fn accepts_encodings<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        negotiate(self.header_str(header::ACCEPT_ENCODING).unwrap_or_default(), offers, Offer::Token)
    }

    /// The best of `offers` according to the `Accept-Language` header.
    pub fn accepts_languages<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        negotiate(self.header_str(header::ACCEPT_LANGUAGE).unwrap_or_default(), offers, Offer::Language)
    }

    /// Whether the client's cached copy of the response is still valid.
    ///
    /// Compares `If-None-Match` with the response `ETag`, and
    /// `If-Modified-Since` with the response `Last-Modified`. Only `GET`
    /// and `HEAD` requests answered with a 2xx or 304 status can be fresh.
    pub fn fresh(&self) -> bool {
        let method = self.request.method();
        if method != Method::GET && method != Method::HEAD {
            return false;
        }

        if !self.status.is_success() && self.status != StatusCode::NOT_MODIFIED {
            return false;
        }

        let none_match = self.header_str(header::IF_NONE_MATCH);
        let modified_since = self.header_str(header::IF_MODIFIED_SINCE);

        if none_match.is_none() && modified_since.is_none() {
            return false;
        }

        if let Some(cache_control) = self.header_str(header::CACHE_CONTROL) {
            if cache_control
                .split(',')
                .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"))
            {
                return false;
            }
        }

        if let Some(none_match) = none_match {
            if none_match.trim() != "*" {
                let etag = match self.get_resp_header(header::ETAG) {
                    Some(etag) => etag,
                    None => return false,
                };

                let strip = |tag: &str| tag.trim().trim_start_matches("W/").to_owned();
                let etag = strip(etag);
                if !none_match.split(',').any(|tag| strip(tag) == etag) {
                    return false;
                }
            }
        }

        if let Some(modified_since) = modified_since {
            let last_modified = self
                .get_resp_header(header::LAST_MODIFIED)
                .and_then(parse_http_date);

            match (last_modified, parse_http_date(modified_since)) {
                (Some(last_modified), Some(since)) if last_modified <= since => {}
                _ => return false,
            }
        }

        true
    }

    /// The opposite of [`fresh`](Self::fresh).
    pub fn stale(&self) -> bool {
        !self.fresh()
    }

    /// Parse the `Range` header for a resource of `size` bytes.
    ///
    /// Returns `Ok(None)` if the request has no `Range` header.
    pub fn range(&self, size: u64) -> Result<Option<Range>, RangeError> {
        match self.header_str(header::RANGE) {
            Some(range) => Range::parse(range, size).map(Some),
            None => Ok(None),
        }
    }

    /// A flash message sent with the previous response.
    pub fn flash_message(&self, key: &str) -> Option<&str> {
        self.flash_messages()
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// All flash messages sent with the previous response.
    pub fn flash_messages(&self) -> &[(String, String)] {
        self.locals::<Vec<(String, String)>>(FLASH_COOKIE)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn strip_port(host: &str) -> &str {
    // `[::1]:8080`
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }

    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) && !name.contains(':') => name,
        _ => host,
    }
}
