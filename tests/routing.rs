mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{call, entries, log, push, reply};
use fennec::http::{Method, StatusCode};
use fennec::{handler_fn, handlers, App, Config, Context, Result};

async fn hello(c: &mut Context) -> Result {
    c.send_string("Hello");
    Ok(())
}

async fn echo_params(c: &mut Context) -> Result {
    let params = c
        .all_params()
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    c.send_string(params);
    Ok(())
}

#[tokio::test]
async fn root() {
    let app = App::new();
    app.get("/", hello);

    let reply = call(&app, Method::GET, "/").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "Hello");
    assert_eq!(reply.header("content-type"), Some("text/plain; charset=utf-8"));
    assert_eq!(reply.header("content-length"), Some("5"));
}

#[tokio::test]
async fn params() {
    let app = App::new();
    app.get("/users/:id", echo_params);
    app.get("/files/:dir/:name?", echo_params);
    app.get("/posts/:slug+", echo_params);
    app.get("/orders/:id([0-9]+)", echo_params);

    assert_eq!(call(&app, Method::GET, "/users/42").await.body, "id=42");
    assert_eq!(call(&app, Method::GET, "/files/a/b").await.body, "dir=a&name=b");
    assert_eq!(call(&app, Method::GET, "/files/a").await.body, "dir=a&name=");
    assert_eq!(call(&app, Method::GET, "/posts/2021/hello").await.body, "slug=2021/hello");
    assert_eq!(call(&app, Method::GET, "/orders/17").await.body, "id=17");
    assert_eq!(
        call(&app, Method::GET, "/orders/abc").await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn params_keep_request_case() {
    async fn name(c: &mut Context) -> Result {
        let name = c.params("name").to_owned();
        c.send_string(name);
        Ok(())
    }

    let app = App::new();
    app.get("/Users/:Name", name);

    let reply = call(&app, Method::GET, "/users/Alice").await;
    assert_eq!(reply.body, "Alice");
}

#[tokio::test]
async fn wildcard() {
    async fn rest(c: &mut Context) -> Result {
        let rest = format!("[{}]", c.param_at(0));
        c.send_string(rest);
        Ok(())
    }

    let app = App::new();
    app.get("/*", rest);

    assert_eq!(call(&app, Method::GET, "/a/b/c").await.body, "[a/b/c]");
    assert_eq!(call(&app, Method::GET, "/").await.body, "[]");
}

#[tokio::test]
async fn optional_params_with_short_prefixes() {
    let app = App::new();
    app.get("/a/:x?", echo_params);
    app.get("/b/:rest*", echo_params);
    app.get("/ab/:x?", echo_params);
    app.get("/:lang?", echo_params);

    assert_eq!(call(&app, Method::GET, "/a/1").await.body, "x=1");
    assert_eq!(call(&app, Method::GET, "/a").await.body, "x=");
    assert_eq!(call(&app, Method::GET, "/b").await.body, "rest=");
    assert_eq!(call(&app, Method::GET, "/b/c/d").await.body, "rest=c/d");
    assert_eq!(call(&app, Method::GET, "/ab").await.body, "x=");
    assert_eq!(call(&app, Method::GET, "/en").await.body, "lang=en");
    assert_eq!(call(&app, Method::GET, "/").await.body, "lang=");
}

#[tokio::test]
async fn method_not_allowed() {
    let app = App::new();
    app.post("/users", hello);
    app.put("/users", hello);

    let reply = call(&app, Method::GET, "/users").await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.header("allow"), Some("POST, PUT"));

    let reply = call(&app, Method::GET, "/nope").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, "Cannot GET /nope");
}

#[tokio::test]
async fn unknown_method() {
    let app = App::new();
    app.all("/", hello);

    let purge = Method::from_bytes(b"PURGE").unwrap();
    let reply = call(&app, purge, "/").await;
    assert_eq!(reply.status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn custom_methods() {
    let app = App::with_config(Config {
        request_methods: vec![String::from("GET"), String::from("PURGE")],
        ..Config::default()
    });

    let purge = Method::from_bytes(b"PURGE").unwrap();
    app.add(&[purge.clone()], "/cache", hello);

    assert_eq!(call(&app, purge, "/cache").await.body, "Hello");
    assert_eq!(
        call(&app, Method::POST, "/cache").await.status,
        StatusCode::NOT_IMPLEMENTED
    );
}

#[tokio::test]
async fn middleware_order() {
    let log = log();
    let app = App::new();
    app.use_(push(&log, "mw1"));
    app.use_(push(&log, "mw2"));
    app.get("/x", reply(&log, "handler"));

    let reply = call(&app, Method::GET, "/x").await;
    assert_eq!(reply.body, "handler");
    assert_eq!(entries(&log), ["mw1", "mw2", "handler"]);
}

#[tokio::test]
async fn middleware_without_next_stops_the_chain() {
    let log = log();
    let app = App::new();
    app.use_(reply(&log, "mw1"));
    app.use_(push(&log, "mw2"));
    app.get("/x", reply(&log, "handler"));

    let reply = call(&app, Method::GET, "/x").await;
    assert_eq!(reply.body, "mw1");
    assert_eq!(entries(&log), ["mw1"]);
}

#[tokio::test]
async fn middleware_registered_later_runs_after_next() {
    let log = log();
    let app = App::new();
    app.get("/x", push(&log, "handler"));
    app.use_(reply(&log, "late"));

    call(&app, Method::GET, "/x").await;
    assert_eq!(entries(&log), ["handler", "late"]);
}

#[tokio::test]
async fn use_prefix() {
    let log = log();
    let app = App::new();
    app.use_at("/api", push(&log, "mw"));
    app.get("/api/items", reply(&log, "items"));
    app.get("/api", reply(&log, "api"));
    app.get("/apix", reply(&log, "apix"));
    app.get("/other", reply(&log, "other"));

    call(&app, Method::GET, "/api/items").await;
    call(&app, Method::GET, "/api").await;
    call(&app, Method::GET, "/apix").await;
    call(&app, Method::GET, "/other").await;
    assert_eq!(entries(&log), ["mw", "items", "mw", "api", "apix", "other"]);
}

#[tokio::test]
async fn consecutive_registrations_coalesce() {
    let log = log();
    let app = App::new();
    app.use_(push(&log, "a"));
    app.use_(push(&log, "b"));
    app.get("/", handlers![push(&log, "c"), reply(&log, "d")]);

    for routes in app.stack() {
        assert_eq!(routes[0].handlers_len(), 2);
    }

    let get: Vec<_> = app
        .routes()
        .into_iter()
        .filter(|route| route.method() == Method::GET)
        .collect();
    assert_eq!(get.len(), 2);
    assert!(get[0].is_use());
    assert_eq!(get[1].handlers_len(), 2);
    assert_eq!(app.handlers_count(), 6);

    call(&app, Method::GET, "/").await;
    assert_eq!(entries(&log), ["a", "b", "c", "d"]);
}

#[tokio::test]
#[should_panic(expected = "missing handler")]
async fn endpoint_without_handlers() {
    let app = App::new();
    app.get("/", handlers![]);
}

#[tokio::test]
#[should_panic(expected = "failed to insert route")]
async fn invalid_pattern() {
    let app = App::new();
    app.get("/:id/:id", hello);
}

#[tokio::test]
async fn empty_path_is_root() {
    let app = App::new();
    app.get("", hello);

    assert_eq!(app.routes()[0].path(), "/");
    assert_eq!(call(&app, Method::GET, "/").await.body, "Hello");
}

#[tokio::test]
async fn case_sensitivity() {
    let insensitive = App::new();
    insensitive.get("/Users", hello);
    assert_eq!(call(&insensitive, Method::GET, "/users").await.status, StatusCode::OK);

    let sensitive = App::with_config(Config {
        case_sensitive: true,
        ..Config::default()
    });
    sensitive.get("/Users", hello);
    assert_eq!(call(&sensitive, Method::GET, "/users").await.status, StatusCode::NOT_FOUND);
    assert_eq!(call(&sensitive, Method::GET, "/Users").await.status, StatusCode::OK);
}

#[tokio::test]
async fn strict_routing() {
    let lenient = App::new();
    lenient.get("/about", hello);
    assert_eq!(call(&lenient, Method::GET, "/about/").await.status, StatusCode::OK);

    let strict = App::with_config(Config {
        strict_routing: true,
        ..Config::default()
    });
    strict.get("/about", hello);
    assert_eq!(call(&strict, Method::GET, "/about").await.status, StatusCode::OK);
    assert_eq!(call(&strict, Method::GET, "/about/").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn head_answers_get_routes() {
    let app = App::new();
    app.get("/", hello);

    let reply = call(&app, Method::HEAD, "/").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "");
    assert_eq!(reply.header("content-length"), Some("5"));
}

#[tokio::test]
async fn groups() {
    let log = log();
    let app = App::new();

    let api = app.group_with("/api/", push(&log, "api"));
    let v1 = api.group_with("v1", push(&log, "v1"));
    v1.get("/users", reply(&log, "users"));
    api.use_(push(&log, "api-use"));

    assert_eq!(v1.prefix(), "/api/v1");

    let reply = call(&app, Method::GET, "/api/v1/users").await;
    assert_eq!(reply.body, "users");
    assert_eq!(entries(&log), ["api", "v1", "users"]);

    let users = app
        .routes()
        .into_iter()
        .find(|route| route.method() == Method::GET && route.path() == "/api/v1/users")
        .unwrap();
    assert_eq!(users.group_prefix(), Some("/api/v1"));
    assert_eq!(users.handlers_len(), 3);
}

#[tokio::test]
async fn group_middleware_is_not_retroactive() {
    let log = log();
    let app = App::new();

    let admin = app.group("/admin");
    admin.get("/", reply(&log, "dashboard"));
    let admin = app.group_with("/admin", push(&log, "auth"));
    admin.get("/settings", reply(&log, "settings"));

    call(&app, Method::GET, "/admin").await;
    call(&app, Method::GET, "/admin/settings").await;
    assert_eq!(entries(&log), ["dashboard", "auth", "settings"]);
}

#[tokio::test]
async fn named_routes() {
    let app = App::new();
    app.get("/users/:id/posts/:post?", hello).name("post");

    let admin = app.group("/admin").with_name("admin.");
    admin.get("/stats", hello).name("stats");

    assert_eq!(app.get_route("post").unwrap().path(), "/users/:id/posts/:post?");
    assert_eq!(app.get_route("admin.stats").unwrap().path(), "/admin/stats");
    assert!(app.get_route("missing").is_none());

    async fn urls(c: &mut Context) -> Result {
        let full = c.get_route_url("post", &[("id", "7"), ("post", "hello")])?;
        let short = c.get_route_url("post", &[("id", "7")])?;
        c.send_string(format!("{} {}", full, short));
        Ok(())
    }

    app.get("/url", urls);

    let reply = call(&app, Method::GET, "/url").await;
    assert_eq!(reply.body, "/users/7/posts/hello /users/7/posts");
}

#[tokio::test]
async fn hooks() {
    let routes = Arc::new(AtomicUsize::new(0));
    let names = Arc::new(AtomicUsize::new(0));
    let groups = Arc::new(AtomicUsize::new(0));

    let app = App::new();
    {
        let routes = routes.clone();
        app.on_route(move |_| {
            routes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
    }
    {
        let names = names.clone();
        app.on_name(move |route| {
            assert_eq!(route.name(), "home");
            names.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
    }
    {
        let groups = groups.clone();
        app.on_group(move |group| {
            assert_eq!(group.prefix(), "/api");
            groups.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
    }

    // HEAD and GET
    app.get("/", hello).name("home");
    app.group("/api").post("/items", hello);

    assert_eq!(routes.load(Ordering::Relaxed), 3);
    assert_eq!(names.load(Ordering::Relaxed), 1);
    assert_eq!(groups.load(Ordering::Relaxed), 1);
}

#[tokio::test]
#[should_panic(expected = "route hook failed")]
async fn failing_hook_aborts_registration() {
    let app = App::new();
    app.on_route(|route| match route.path() {
        "/forbidden" => Err(fennec::Error::from_status(StatusCode::FORBIDDEN)),
        _ => Ok(()),
    });
    app.post("/forbidden", hello);
}

#[tokio::test]
async fn mount() {
    async fn fail(_: &mut Context) -> Result {
        Err(fennec::Error::from_status(StatusCode::BAD_REQUEST))
    }

    let log = log();

    let sub = App::with_config(Config::default().error_handler(|c, err| {
        c.status(err.status()).send_string("sub app error");
        Ok(())
    }));
    sub.use_(push(&log, "sub-mw"));
    sub.get("/users", reply(&log, "users"));
    sub.get("/fail", fail);

    let mounted = Arc::new(AtomicUsize::new(0));
    {
        let mounted = mounted.clone();
        sub.on_mount(move |parent| {
            assert!(parent.routes_count() > 0);
            mounted.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
    }

    let app = App::new();
    app.get("/users", reply(&log, "root users"));
    app.mount("/api", &sub);
    sub.get("/late", hello);

    assert_eq!(mounted.load(Ordering::Relaxed), 1);
    assert!(app.routes().iter().any(|route| route.is_mount()));

    assert_eq!(call(&app, Method::GET, "/api/users").await.body, "users");
    assert_eq!(entries(&log), ["sub-mw", "users"]);

    assert_eq!(call(&app, Method::GET, "/users").await.body, "root users");

    let fail = call(&app, Method::GET, "/api/fail").await;
    assert_eq!(fail.status, StatusCode::BAD_REQUEST);
    assert_eq!(fail.body, "sub app error");

    // outside the prefix the parent's error handler applies
    let missing = call(&app, Method::GET, "/missing").await;
    assert_eq!(missing.body, "Cannot GET /missing");

    assert_eq!(call(&app, Method::GET, "/api/late").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn routes_added_while_serving() {
    let app = App::new();
    app.get("/a", hello);
    assert_eq!(call(&app, Method::GET, "/a").await.status, StatusCode::OK);
    assert_eq!(call(&app, Method::GET, "/b").await.status, StatusCode::NOT_FOUND);

    app.get("/b", hello);
    assert_eq!(call(&app, Method::GET, "/b").await.status, StatusCode::OK);
}

#[tokio::test]
async fn restart_routing() {
    async fn old(c: &mut Context) -> Result {
        c.set_path("/new");
        c.restart_routing().await
    }

    async fn new(c: &mut Context) -> Result {
        let body = format!("{} {}", c.path(), c.original_url());
        c.send_string(body);
        Ok(())
    }

    let app = App::new();
    app.get("/old", old);
    app.get("/new", new);

    let reply = call(&app, Method::GET, "/old?x=1").await;
    assert_eq!(reply.body, "/new /old?x=1");
}

async fn describe_route(c: &mut Context) -> Result {
    let route = c.route().unwrap();
    let body = format!("{} {:?}", route.path(), route.params());
    c.send_string(body);
    Ok(())
}

#[tokio::test]
async fn route_is_visible_to_handlers() {
    let app = App::new();
    app.use_(handler_fn(|c| {
        Box::pin(async move {
            assert!(c.route().unwrap().is_use());
            c.next().await
        })
    }));
    app.get("/items/:id", describe_route);

    let reply = call(&app, Method::GET, "/items/3").await;
    assert_eq!(reply.body, "/items/:id [\"id\"]");
}

#[tokio::test]
async fn state() {
    struct Greeting(&'static str);

    async fn greet(c: &mut Context) -> Result {
        let greeting = c.state::<Greeting>().map_or("none", |g| g.0);
        c.send_string(greeting);
        Ok(())
    }

    let app = App::new();
    app.inject(Greeting("hi"));
    app.get("/", greet);

    assert_eq!(call(&app, Method::GET, "/").await.body, "hi");

    app.inject(Greeting("hello"));
    assert_eq!(call(&app, Method::GET, "/").await.body, "hello");
}
