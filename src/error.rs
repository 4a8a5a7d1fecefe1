use crate::bounded::BoxError;
use crate::context::Context;
use crate::http::{header, StatusCode};

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// An error carrying an HTTP status code and a message.
///
/// This is the error produced by [`Error::new`], and by the
/// framework itself for routing failures (404, 405, 501, ...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    /// Create a new `HttpError`.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The status code of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The message of this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The error type returned by handlers.
///
/// Any type implementing [`std::error::Error`] can be converted into
/// an `Error` with the `?` operator. Errors created through
/// [`Error::new`] carry a status code, everything else is reported
/// as `500 Internal Server Error` by the default error handler.
pub struct Error {
    status: Option<StatusCode>,
    inner: BoxError,
}

impl Error {
    /// Create an error with a status code and a message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            inner: Box::new(HttpError::new(status, message)),
        }
    }

    /// Create an error with a status code, using the canonical reason
    /// phrase of the status as the message.
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or_default())
    }

    /// Wrap an error, reporting it with the given status code.
    pub fn with_status<E>(status: StatusCode, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            status: Some(status),
            inner: Box::new(err),
        }
    }

    /// Create an error from an already boxed error.
    pub fn from_boxed(err: BoxError) -> Self {
        let status = err.downcast_ref::<HttpError>().map(HttpError::status);
        Self { status, inner: err }
    }

    /// The status code this error should be reported with.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Whether this error carries an explicit status code.
    pub fn is_http(&self) -> bool {
        self.status.is_some()
    }

    /// The error message.
    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    /// Attempt to downcast the inner error to a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Returns the inner error.
    pub fn into_inner(self) -> BoxError {
        self.inner
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("status", &self.status())
            .field("inner", &self.inner)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

// We can't implement From<E> *for* Error and std::error::Error for Error at the same time,
// because the blanket impl would then cover Error itself. Being able to use `?` on any error
// inside a handler matters more, and the inner error is still reachable through `downcast_ref`.
impl<E> From<E> for Error
where
    E: StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::from_boxed(Box::new(err))
    }
}

/// A function that turns an error returned from the handler chain into a response.
///
/// Returning an error from the handler itself results in a bare
/// `500 Internal Server Error`.
pub type ErrorHandler = Arc<dyn Fn(&mut Context, Error) -> Result<(), Error> + Send + Sync>;

/// The error handler used when none is configured.
///
/// Writes the error message as a `text/plain` body, with the error's
/// status code, or 500 for errors without one.
pub fn default_error_handler(c: &mut Context, err: Error) -> Result<(), Error> {
    c.set(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref());
    c.status(err.status());
    c.send_string(err.message());
    Ok(())
}
