use std::time::Instant;

use fennec::http::StatusCode;
use fennec::{App, Config, Context, Error, Extractor, Result};
use fennec_hyper::Serve;
use tracing_subscriber::EnvFilter;

async fn logger(c: &mut Context) -> Result {
    let start = Instant::now();
    let result = c.next().await;

    tracing::info!(
        method = %c.method(),
        path = %c.path(),
        status = c.response_status().as_u16(),
        elapsed = ?start.elapsed(),
        "request"
    );

    result
}

async fn auth(c: &mut Context) -> Result {
    let token = Extractor::chain(vec![
        Extractor::from_auth_header("Bearer"),
        Extractor::from_query("token"),
    ]);

    match token.extract(c) {
        Ok(token) if token == "secret" => c.next().await,
        _ => Err(Error::from_status(StatusCode::UNAUTHORIZED)),
    }
}

async fn hello(c: &mut Context) -> Result {
    let name = c.params("name").to_owned();
    c.send_string(format!("Hello {}!", name));
    Ok(())
}

async fn user(c: &mut Context) -> Result {
    let id: u64 = c.params_parse("id")?;
    c.json(&serde_json::json!({ "id": id }))
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = App::with_config(Config {
        app_name: String::from("demo"),
        server_header: Some(String::from("fennec")),
        ..Config::default()
    });

    app.use_(logger);
    app.get("/hello/:name", hello).name("hello");

    let api = app.group_with("/api", auth);
    api.get("/users/:id", user);

    app.listen(([127, 0, 0, 1], 3000))?.await?;
    Ok(())
}
