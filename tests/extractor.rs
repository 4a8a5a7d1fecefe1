mod common;

use common::send;
use fennec::http::{header, Body, Method, Request, StatusCode};
use fennec::{handler_fn, App, Error, ExtractError, Extractor, Source};

fn extracting(route: &str, extractor: Extractor) -> App {
    let app = App::new();
    app.all(
        route,
        handler_fn(move |c| {
            let result = extractor.extract_with_source(c);
            Box::pin(async move {
                let body = match result {
                    Ok((value, source)) => format!("{} {:?}", value, source),
                    Err(err) => format!("error: {}", err),
                };
                c.send_string(body);
                Ok(())
            })
        }),
    );
    app
}

fn request(uri: &str, headers: &[(&str, &str)]) -> Request {
    let mut builder = http::Request::builder().method(Method::GET).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    builder.body(Body::empty()).unwrap()
}

async fn extract(app: &App, uri: &str, headers: &[(&str, &str)]) -> String {
    send(app, request(uri, headers)).await.body
}

#[tokio::test]
async fn chain_prefers_earlier_sources() {
    let token = Extractor::chain(vec![
        Extractor::from_header("X-Token"),
        Extractor::from_query("token"),
    ]);
    assert_eq!(token.source(), Source::Header);
    assert_eq!(token.key(), "X-Token");

    let app = extracting("/", token);

    assert_eq!(extract(&app, "/?token=q", &[("x-token", "h")]).await, "h Header");
    assert_eq!(extract(&app, "/?token=q", &[]).await, "q Query");
    assert_eq!(extract(&app, "/", &[]).await, "error: value not found");
}

#[tokio::test]
async fn auth_header() {
    let app = extracting("/", Extractor::from_auth_header("Bearer"));

    let bearer = [("authorization", "bearer  abc.def")];
    assert_eq!(extract(&app, "/", &bearer).await, "abc.def AuthHeader");

    let basic = [("authorization", "Basic dXNlcg==")];
    assert_eq!(extract(&app, "/", &basic).await, "error: value not found");

    let glued = [("authorization", "Bearerabc")];
    assert_eq!(extract(&app, "/", &glued).await, "error: value not found");

    let any = extracting("/", Extractor::from_auth_header(""));
    assert_eq!(extract(&any, "/", &basic).await, "Basic dXNlcg== AuthHeader");
}

#[tokio::test]
async fn cookies_and_params() {
    let app = extracting("/", Extractor::from_cookie("session"));
    let cookie = [("cookie", "theme=dark; session=s3cr3t")];
    assert_eq!(extract(&app, "/", &cookie).await, "s3cr3t Cookie");

    let app = extracting("/users/:id?", Extractor::from_param("id"));
    assert_eq!(extract(&app, "/users/42", &[]).await, "42 Param");
    assert_eq!(extract(&app, "/users", &[]).await, "error: value not found");
}

#[tokio::test]
async fn form_fields() {
    let app = extracting("/login", Extractor::from_form("user"));

    let request = http::Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::once("user=ada&password=x"))
        .unwrap();

    assert_eq!(send(&app, request).await.body, "ada Form");
}

#[tokio::test]
async fn blank_values_are_missing() {
    let app = extracting("/", Extractor::from_header("X-Token"));

    assert_eq!(extract(&app, "/", &[("x-token", "  ")]).await, "error: value not found");
    assert_eq!(extract(&app, "/", &[("x-token", " t ")]).await, "t Header");
}

#[tokio::test]
async fn custom_extractors() {
    let length = Extractor::from_custom("length", |c| {
        match c.get("content-length") {
            Some(length) => Ok(length.into_owned()),
            None => Err(ExtractError::Other(Error::new(
                StatusCode::LENGTH_REQUIRED,
                "no content length",
            ))),
        }
    });
    assert_eq!(length.source(), Source::Custom);
    assert_eq!(length.key(), "length");

    let chained = Extractor::chain(vec![Extractor::from_query("length"), length.clone()]);

    let app = extracting("/", length);
    assert_eq!(extract(&app, "/", &[("content-length", "0")]).await, "0 Custom");
    assert_eq!(extract(&app, "/", &[]).await, "error: no content length");

    // a chain reports the last error when nothing is found
    let app = extracting("/", chained);
    assert_eq!(extract(&app, "/?length=3", &[]).await, "3 Query");
    assert_eq!(extract(&app, "/", &[]).await, "error: no content length");
}

#[tokio::test]
async fn empty_chain() {
    let empty = Extractor::chain(Vec::new());
    assert_eq!(empty.key(), "");

    let app = extracting("/", empty);
    assert_eq!(extract(&app, "/", &[]).await, "error: value not found");
}
