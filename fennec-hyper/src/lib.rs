//! Serve a [`fennec::App`] with [`hyper`].
//!
//! ```rust,ignore
//! use fennec_hyper::Serve;
//!
//! let app = fennec::App::new();
//! app.get("/", hello);
//! app.listen(([127, 0, 0, 1], 3000))?.await?;
//! ```

use std::convert::Infallible;
use std::future::{ready, Future, Ready};
use std::io;
use std::net::*;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use fennec::{App, RemoteAddr};
use futures_core::Stream;
use hyper::server::conn::{AddrIncoming, AddrStream};
use hyper::service::Service;

pub use hyper::Server;

/// Run an application on a hyper server.
pub trait Serve {
    /// Bind a server to `addr`.
    fn listen(self, addr: impl ToSocketAddr) -> io::Result<Server<AddrIncoming, FennecMakeService>>;
    /// A service creating a [`FennecService`] for every connection.
    fn into_make_service(self) -> FennecMakeService;
    /// A service handling requests with the application.
    fn into_service(self) -> FennecService;
}

impl Serve for App {
    fn listen(self, addr: impl ToSocketAddr) -> io::Result<Server<AddrIncoming, FennecMakeService>> {
        let addr = addr.to_socket_addr()?;
        let server = hyper::Server::try_bind(&addr)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

        tracing::info!(%addr, app = %self.config().app_name, "listening");
        Ok(server.serve(self.into_make_service()))
    }

    fn into_make_service(self) -> FennecMakeService {
        FennecMakeService {
            service: self.into_service(),
        }
    }

    fn into_service(self) -> FennecService {
        FennecService {
            app: self,
            remote: None,
        }
    }
}

#[derive(Clone)]
pub struct FennecMakeService {
    service: FennecService,
}

impl<'a> Service<&'a AddrStream> for FennecMakeService {
    type Response = FennecService;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Infallible>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, conn: &'a AddrStream) -> Self::Future {
        let mut service = self.service.clone();
        service.remote = Some(conn.remote_addr());
        ready(Ok(service))
    }
}

/// Handles the requests of one connection.
#[derive(Clone)]
pub struct FennecService {
    app: App,
    remote: Option<SocketAddr>,
}

impl Service<hyper::Request<hyper::Body>> for FennecService {
    type Response = hyper::Response<FennecHttpBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: hyper::Request<hyper::Body>) -> Self::Future {
        let (mut parts, body) = req.into_parts();
        if let Some(remote) = self.remote {
            parts.extensions.insert(RemoteAddr(remote));
        }

        let req = hyper::Request::from_parts(parts, fennec::http::Body::stream(body));
        let app = self.app.clone();

        Box::pin(async move {
            let resp = app.serve(req).await;
            let (parts, body) = resp.into_parts();
            Ok(hyper::Response::from_parts(parts, FennecHttpBody { inner: body }))
        })
    }
}

/// A [`fennec::http::Body`] as an [`http_body::Body`].
pub struct FennecHttpBody {
    inner: fennec::http::Body,
}

impl http_body::Body for FennecHttpBody {
    type Data = fennec::http::Bytes;
    type Error = fennec::BoxError;

    fn poll_data(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _: &mut Context<'_>,
    ) -> Poll<Result<Option<hyper::HeaderMap>, Self::Error>> {
        Poll::Ready(Ok(None))
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self.inner.as_bytes() {
            Some(bytes) => http_body::SizeHint::with_exact(bytes.len() as u64),
            None => {
                let (lower, upper) = self.inner.size_hint();

                let mut hint = http_body::SizeHint::new();
                hint.set_lower(lower as _);
                if let Some(upper) = upper {
                    hint.set_upper(upper as _);
                }

                hint
            }
        }
    }
}

/// Types that resolve to a single socket address.
pub trait ToSocketAddr {
    fn to_socket_addr(self) -> io::Result<SocketAddr>;
}

impl ToSocketAddr for SocketAddr {
    fn to_socket_addr(self) -> io::Result<SocketAddr> {
        Ok(self)
    }
}

impl ToSocketAddr for ([u8; 4], u16) {
    fn to_socket_addr(self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from(self))
    }
}

macro_rules! to_socket_addr {
    ($($ty:ty),*) => {$(
        impl ToSocketAddr for $ty {
            fn to_socket_addr(self) -> io::Result<SocketAddr> {
                self.to_socket_addrs()?.next().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "could not resolve to any address")
                })
            }
        }
    )*}
}

to_socket_addr! {
    &str,
    String,
    (&str, u16),
    (IpAddr, u16),
    (String, u16),
    (Ipv4Addr, u16),
    (Ipv6Addr, u16),
    SocketAddrV4,
    SocketAddrV6
}
