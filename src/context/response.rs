use super::Context;
use crate::error::Error;
use crate::http::{
    format_http_date, header, mime_types, Body, Cookie, HeaderValue, RangeError, StatusCode,
};

use std::convert::TryInto;
use std::io::SeekFrom;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

impl Context {
    /// Set the response status.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// The response status.
    pub fn response_status(&self) -> StatusCode {
        self.status
    }

    /// Set a response header, replacing any previous value.
    ///
    /// Invalid header names or values are logged and ignored.
    pub fn set<K>(&mut self, key: K, value: impl AsRef<str>) -> &mut Self
    where
        K: TryInto<header::HeaderName>,
    {
        let name = match key.try_into() {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!("ignoring response header with an invalid name");
                return self;
            }
        };

        match HeaderValue::from_str(value.as_ref()) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = %name, "ignoring invalid response header value"),
        }

        self
    }

    /// Append values to a response header, as a comma separated list.
    ///
    /// Values already present in the header are not repeated.
    pub fn append<K>(&mut self, key: K, values: &[&str]) -> &mut Self
    where
        K: TryInto<header::HeaderName>,
    {
        let name = match key.try_into() {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!("ignoring response header with an invalid name");
                return self;
            }
        };

        let mut current = self
            .headers
            .get(&name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        for value in values {
            let present = current
                .split(',')
                .any(|existing| existing.trim().eq_ignore_ascii_case(value));

            if present {
                continue;
            }

            if !current.is_empty() {
                current.push_str(", ");
            }
            current.push_str(value);
        }

        self.set(name, current)
    }

    /// The value of a response header.
    pub fn get_resp_header(&self, key: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(key)?.to_str().ok()
    }

    /// Add fields to the `Vary` header.
    pub fn vary(&mut self, fields: &[&str]) -> &mut Self {
        self.append(header::VARY, fields)
    }

    /// Set the `Location` header.
    pub fn location(&mut self, location: &str) -> &mut Self {
        self.set(header::LOCATION, location)
    }

    /// Set the `Content-Type` header from a media type or a file extension.
    ///
    /// Unknown extensions result in `application/octet-stream`.
    pub fn content_type(&mut self, ty: &str) -> &mut Self {
        let ty = match ty.contains('/') {
            true => ty,
            false => mime_types::from_extension(ty)
                .unwrap_or("application/octet-stream"),
        };

        self.set(header::CONTENT_TYPE, ty)
    }

    /// Add a `Set-Cookie` header.
    pub fn cookie(&mut self, cookie: Cookie) -> &mut Self {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                self.headers.append(header::SET_COOKIE, value);
            }
            Err(_) => tracing::warn!(cookie = %cookie.name, "ignoring invalid cookie"),
        }

        self
    }

    /// Expire cookies on the client.
    ///
    /// An empty list expires every cookie sent with the request.
    pub fn clear_cookie(&mut self, names: &[&str]) -> &mut Self {
        let names: Vec<String> = match names.is_empty() {
            true => self
                .request
                .headers()
                .get_all(header::COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .flat_map(crate::http::cookie_pairs)
                .map(|(name, _)| name.to_owned())
                .collect(),
            false => names.iter().map(|name| (*name).to_owned()).collect(),
        };

        let epoch = DateTime::<Utc>::from(std::time::UNIX_EPOCH);
        for name in names {
            self.cookie(Cookie::new(name, "").path("/").expires(epoch));
        }

        self
    }

    /// The cookies set on the response so far.
    pub fn response_cookies(&self) -> Vec<Cookie> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(Cookie::parse)
            .collect()
    }

    /// The response body written so far.
    ///
    /// Empty if the body is a stream.
    pub fn response_body(&self) -> &[u8] {
        &self.buffer
    }

    /// Append bytes to the response body.
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.stream = None;
        self.buffer.extend_from_slice(bytes.as_ref());
        self
    }

    /// Append a string to the response body.
    pub fn write_string(&mut self, s: impl AsRef<str>) -> &mut Self {
        self.write(s.as_ref().as_bytes())
    }

    /// Replace the response body.
    pub fn send(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.buffer.clear();
        self.write(bytes)
    }

    /// Replace the response body with a string.
    pub fn send_string(&mut self, s: impl AsRef<str>) -> &mut Self {
        self.send(s.as_ref().as_bytes())
    }

    /// Set the status, and use its reason phrase as the body if no
    /// body was written.
    pub fn send_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;

        if self.buffer.is_empty() && self.stream.is_none() {
            self.send_string(status.canonical_reason().unwrap_or_default());
        }

        self
    }

    /// Use a stream as the response body.
    pub fn send_stream(&mut self, body: impl Into<Body>) -> &mut Self {
        self.buffer.clear();
        self.stream = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON response body.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let body = serde_json::to_vec(value)?;
        self.set(header::CONTENT_TYPE, "application/json; charset=utf-8");
        self.send(body);
        Ok(())
    }

    /// Serialize `value` as JSON wrapped in a call to `callback`, or
    /// `callback` if none is given.
    pub fn jsonp<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
        callback: Option<&str>,
    ) -> Result<(), Error> {
        let json = serde_json::to_string(value)?;
        let body = format!("{}({});", callback.unwrap_or("callback"), json);
        self.set(header::CONTENT_TYPE, "text/javascript; charset=utf-8");
        self.send_string(body);
        Ok(())
    }

    /// Render a template with the configured [`Views`](crate::Views).
    ///
    /// Fails with `500 Internal Server Error` if no views are configured.
    pub fn render<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        bind: &T,
        layout: Option<&str>,
    ) -> Result<(), Error> {
        let views = self.config.views.clone().ok_or_else(|| {
            Error::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "no template engine configured",
            )
        })?;

        let bind = serde_json::to_value(bind)?;
        let mut out = Vec::new();
        views
            .render(&mut out, name, &bind, layout)
            .map_err(Error::from_boxed)?;

        self.set(header::CONTENT_TYPE, mime::TEXT_HTML_UTF_8.as_ref());
        self.send(out);
        Ok(())
    }

    /// Redirect to `location` with `302 Found`.
    pub fn redirect(&mut self, location: &str) -> &mut Self {
        self.redirect_with_status(location, StatusCode::FOUND)
    }

    /// Redirect to `location` with the given status.
    pub fn redirect_with_status(&mut self, location: &str, status: StatusCode) -> &mut Self {
        self.location(location);
        self.status(status)
    }

    /// Redirect to the `Referer` of the request, or to `fallback`.
    pub fn redirect_back(&mut self, fallback: &str) -> &mut Self {
        let location = self
            .request
            .headers()
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(fallback)
            .to_owned();

        self.redirect(&location)
    }

    /// Set `Content-Disposition: attachment`.
    ///
    /// With a file name, the content type is also set from its extension.
    pub fn attachment(&mut self, filename: Option<&str>) -> &mut Self {
        let filename = match filename {
            Some(filename) => filename,
            None => return self.set(header::CONTENT_DISPOSITION, "attachment"),
        };

        let base = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(filename);

        if let Some(ext) = Path::new(base).extension().and_then(|ext| ext.to_str()) {
            self.content_type(ext);
        }

        let disposition = format!(
            "attachment; filename=\"{}\"",
            urlencoding::encode(base)
        );
        self.set(header::CONTENT_DISPOSITION, disposition)
    }

    /// Send a file as the response body.
    ///
    /// `Content-Type` is picked from the file extension. `Range` requests
    /// are answered with `206 Partial Content`, and requests the client
    /// already has a fresh copy of with `304 Not Modified`. Fails with
    /// `404 Not Found` if the file does not exist.
    pub async fn send_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.serve_file(path.as_ref(), true).await
    }

    /// Send a file as an attachment, named `name` or after the file.
    pub async fn download(&mut self, path: impl AsRef<Path>, name: Option<&str>) -> Result<(), Error> {
        let path = path.as_ref();
        let name = match name {
            Some(name) => name.to_owned(),
            None => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        self.attachment(Some(&name));
        self.serve_file(path, true).await
    }

    pub(crate) async fn serve_file(&mut self, path: &Path, byte_range: bool) -> Result<(), Error> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(Error::from_status(StatusCode::NOT_FOUND)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::from_status(StatusCode::NOT_FOUND))
            }
            Err(err) => return Err(err.into()),
        };

        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.set(header::CONTENT_TYPE, mime_types::from_path(path));
        }

        if let Ok(modified) = metadata.modified() {
            self.set(
                header::LAST_MODIFIED,
                format_http_date(DateTime::<Utc>::from(modified)),
            );
        }

        if self.fresh() {
            self.buffer.clear();
            self.stream = None;
            self.status = StatusCode::NOT_MODIFIED;
            return Ok(());
        }

        let size = metadata.len();
        let range = match byte_range {
            true => {
                self.set(header::ACCEPT_RANGES, "bytes");
                self.range(size)
            }
            false => Ok(None),
        };

        let range = match range {
            Ok(range) => range.and_then(|range| range.ranges.first().copied()),
            Err(RangeError::Unsatisfiable) => {
                self.set(header::CONTENT_RANGE, format!("bytes */{}", size));
                return Err(Error::from_status(StatusCode::RANGE_NOT_SATISFIABLE));
            }
            // malformed ranges are ignored
            Err(RangeError::Malformed) => None,
        };

        let mut file = tokio::fs::File::open(path).await?;

        let len = match range {
            Some(range) => {
                let end = range.end.min(size.saturating_sub(1));
                file.seek(SeekFrom::Start(range.start)).await?;

                self.set(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", range.start, end, size),
                );
                self.status = StatusCode::PARTIAL_CONTENT;
                end + 1 - range.start
            }
            None => size,
        };

        self.set(header::CONTENT_LENGTH, len.to_string());
        self.send_stream(Body::reader(file.take(len)));

        Ok(())
    }

    /// Set a flash message, sent to the client as a cookie and readable
    /// during the next request with [`flash_message`](Self::flash_message).
    pub fn set_flash(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.flash.retain(|(name, _)| *name != key);
        self.flash.push((key, value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Methods};
    use crate::router::Tree;

    use std::sync::Arc;

    fn context() -> Context {
        let config = Config::default();
        let methods = Arc::new(Methods::new(&config.request_methods));
        Context::new(Arc::new(config), Arc::new(Tree::empty(methods)))
    }

    #[test]
    fn append_skips_present_values() {
        let mut c = context();
        c.vary(&["Origin"]).vary(&["origin", "Accept-Encoding"]);
        assert_eq!(c.get_resp_header(header::VARY), Some("Origin, Accept-Encoding"));
    }

    #[test]
    fn content_type_from_extension() {
        let mut c = context();
        c.content_type("json");
        assert_eq!(c.get_resp_header(header::CONTENT_TYPE), Some("application/json"));

        c.content_type(".unknown-ext");
        assert_eq!(
            c.get_resp_header(header::CONTENT_TYPE),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn send_status_keeps_written_body() {
        let mut c = context();
        c.send_status(StatusCode::IM_A_TEAPOT);
        assert_eq!(c.response_body(), b"I'm a teapot");

        c.send_string("brewing").send_status(StatusCode::ACCEPTED);
        assert_eq!(c.response_body(), b"brewing");
        assert_eq!(c.response_status(), StatusCode::ACCEPTED);
    }
}
