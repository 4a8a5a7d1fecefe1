#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use fennec::http::{Body, HeaderMap, Method, Request, StatusCode};
use fennec::{handler_fn, App, Handler};

/// Records the order handlers run in.
pub type Log = Arc<Mutex<Vec<&'static str>>>;

pub fn log() -> Log {
    Log::default()
}

pub fn entries(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

pub fn request(method: Method, uri: &str) -> Request {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|value| value.to_str().unwrap())
    }
}

pub async fn send(app: &App, request: Request) -> Reply {
    let (parts, body) = app.serve(request).await.into_parts();
    let body = body.collect(usize::MAX).await.unwrap();

    Reply {
        status: parts.status,
        headers: parts.headers,
        body: String::from_utf8(body.to_vec()).unwrap(),
    }
}

pub async fn call(app: &App, method: Method, uri: &str) -> Reply {
    send(app, request(method, uri)).await
}

/// Middleware recording `entry` before passing control on.
pub fn push(log: &Log, entry: &'static str) -> impl Handler {
    let log = log.clone();
    handler_fn(move |c| {
        let log = log.clone();
        Box::pin(async move {
            log.lock().unwrap().push(entry);
            c.next().await
        })
    })
}

/// An endpoint recording `entry` and sending it as the body.
pub fn reply(log: &Log, entry: &'static str) -> impl Handler {
    let log = log.clone();
    handler_fn(move |c| {
        let log = log.clone();
        Box::pin(async move {
            log.lock().unwrap().push(entry);
            c.send_string(entry);
            Ok(())
        })
    })
}
