use crate::bounded::{BoxError, BoxStream};
use crate::http::StatusCode;

use std::error::Error as StdError;
use std::fmt;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use tokio::io::{AsyncRead, ReadBuf};

/// Represents the body of an HTTP message.
pub struct Body {
    kind: Kind,
}

enum Kind {
    Stream(BoxStream<'static, Result<Bytes, BoxError>>),
    Once(Bytes),
    Empty,
}

impl Body {
    /// Create a `Body` from a stream of bytes.
    pub fn stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
    {
        pin_project_lite::pin_project! {
            struct MapErr<S> {
                #[pin]
                inner: S,
            }
        }

        impl<S, E> Stream for MapErr<S>
        where
            S: Stream<Item = Result<Bytes, E>>,
            E: StdError + Send + Sync + 'static,
        {
            type Item = Result<Bytes, BoxError>;

            fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
                self.project()
                    .inner
                    .poll_next(cx)
                    .map(|item| item.map(|res| res.map_err(|err| Box::new(err) as BoxError)))
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                self.inner.size_hint()
            }
        }

        Body {
            kind: Kind::Stream(Box::pin(MapErr { inner: stream })),
        }
    }

    /// Create a body that reads `reader` to the end, in chunks.
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        const CHUNK: usize = 16 * 1024;

        pin_project_lite::pin_project! {
            struct ReadChunks<R> {
                #[pin]
                reader: R,
                buf: BytesMut,
                done: bool,
            }
        }

        impl<R: AsyncRead> Stream for ReadChunks<R> {
            type Item = io::Result<Bytes>;

            fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
                let this = self.project();
                if *this.done {
                    return Poll::Ready(None);
                }

                this.buf.resize(CHUNK, 0);
                let mut read = ReadBuf::new(&mut this.buf[..]);

                match this.reader.poll_read(cx, &mut read) {
                    Poll::Pending => Poll::Pending,
                    Poll::Ready(Err(err)) => {
                        *this.done = true;
                        Poll::Ready(Some(Err(err)))
                    }
                    Poll::Ready(Ok(())) => {
                        let n = read.filled().len();
                        if n == 0 {
                            *this.done = true;
                            return Poll::Ready(None);
                        }

                        Poll::Ready(Some(Ok(this.buf.split_to(n).freeze())))
                    }
                }
            }
        }

        Body::stream(ReadChunks {
            reader,
            buf: BytesMut::new(),
            done: false,
        })
    }

    /// Create a body directly from bytes.
    pub fn once(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Self::empty();
        }

        Body {
            kind: Kind::Once(bytes),
        }
    }

    /// Create an empty `Body`.
    pub fn empty() -> Self {
        Body { kind: Kind::Empty }
    }

    /// Returns the bytes of this body, if it is not a stream.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self.kind {
            Kind::Once(ref bytes) => Some(bytes),
            Kind::Empty => Some(&[]),
            Kind::Stream(_) => None,
        }
    }

    /// Whether this body is a stream.
    pub fn is_stream(&self) -> bool {
        matches!(self.kind, Kind::Stream(_))
    }

    /// Read the entire body into memory.
    ///
    /// `limit` is the maximum number of bytes that can be read
    /// before returning an error.
    pub async fn collect(mut self, limit: usize) -> Result<Bytes, BodyError> {
        let (lower, _) = self.size_hint();
        if lower > limit {
            return Err(BodyError::ExceededLimit(limit));
        }

        let first = match self.chunk().await {
            Some(chunk) => chunk.map_err(BodyError::Io)?,
            None => return Ok(Bytes::new()),
        };

        if first.len() > limit {
            return Err(BodyError::ExceededLimit(limit));
        }

        // avoid copying single-chunk bodies
        let second = match self.chunk().await {
            Some(chunk) => chunk.map_err(BodyError::Io)?,
            None => return Ok(first),
        };

        let mut bytes = BytesMut::with_capacity(first.len() + second.len() + self.size_hint().0);
        bytes.extend_from_slice(&first);

        let mut next = Some(second);
        while let Some(chunk) = next {
            if bytes.len() + chunk.len() > limit {
                return Err(BodyError::ExceededLimit(limit));
            }

            bytes.extend_from_slice(&chunk);
            next = self.chunk().await.transpose().map_err(BodyError::Io)?;
        }

        Ok(bytes.freeze())
    }

    async fn chunk(&mut self) -> Option<Result<Bytes, BoxError>> {
        poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }
}

impl Stream for Body {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.kind {
            Kind::Stream(ref mut stream) => stream.as_mut().poll_next(cx),
            Kind::Once(ref mut bytes) => {
                let bytes = std::mem::take(bytes);
                this.kind = Kind::Empty;
                Poll::Ready(Some(Ok(bytes)))
            }
            Kind::Empty => Poll::Ready(None),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.kind {
            Kind::Stream(ref stream) => stream.size_hint(),
            Kind::Once(ref bytes) => (bytes.len(), Some(bytes.len())),
            Kind::Empty => (0, Some(0)),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            Kind::Stream(_) => "Stream",
            Kind::Once(_) => "Once",
            Kind::Empty => "Empty",
        };

        f.debug_struct("Body").field("kind", &kind).finish()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::once(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::once(bytes)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::once(s)
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::once(s)
    }
}

/// Error returned by [`Body::collect`].
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    /// Reading from the underlying stream failed.
    #[error("failed to read body: {0}")]
    Io(BoxError),
    /// The body was larger than the limit.
    #[error("request body exceeded the limit of {0} bytes")]
    ExceededLimit(usize),
}

impl BodyError {
    /// The status code a request should be rejected with.
    pub fn status(&self) -> StatusCode {
        match self {
            BodyError::Io(_) => StatusCode::BAD_REQUEST,
            BodyError::ExceededLimit(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}
