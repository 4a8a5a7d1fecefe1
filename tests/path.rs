use fennec::path::{canonicalize, detection_path, ParseError, RouteParser};
use proptest::prelude::*;

fn parse(pattern: &str) -> RouteParser {
    RouteParser::parse(pattern, false, false).unwrap()
}

fn matches(pattern: &str, path: &str) -> Option<Vec<String>> {
    let detection = detection_path(path, false, false);
    parse(pattern).matches(&detection, path, false)
}

#[test]
fn literal_segments() {
    assert_eq!(matches("/about", "/about"), Some(vec![]));
    assert_eq!(matches("/about", "/About/"), Some(vec![]));
    assert_eq!(matches("/about", "/about/us"), None);
    assert_eq!(matches("/about", "/aboutus"), None);
    assert_eq!(matches("/", "/"), Some(vec![]));
    assert_eq!(matches("/", "/x"), None);
}

#[test]
fn parameters() {
    assert_eq!(
        matches("/users/:id/books/:title", "/users/7/books/Dune"),
        Some(vec![String::from("7"), String::from("Dune")])
    );
    assert_eq!(matches("/users/:id", "/users/"), None);
    assert_eq!(matches("/users/:id?", "/users"), Some(vec![String::new()]));
    assert_eq!(
        matches("/users/:id?/edit", "/users/edit"),
        Some(vec![String::new()])
    );
    assert_eq!(matches("/:lang?", "/"), Some(vec![String::new()]));
    assert_eq!(matches("/:lang?", "/en"), Some(vec![String::from("en")]));
    assert_eq!(matches("/:a?/:b?", "/"), Some(vec![String::new(), String::new()]));
    assert_eq!(matches("/:user_id", "/7"), Some(vec![String::from("7")]));
}

#[test]
fn wildcards() {
    assert_eq!(matches("/files/*", "/files"), Some(vec![String::new()]));
    assert_eq!(
        matches("/files/*", "/files/a/b.txt"),
        Some(vec![String::from("a/b.txt")])
    );
    assert_eq!(matches("/files/:path+", "/files"), None);
    assert_eq!(
        matches("/files/:path+", "/files/a/b"),
        Some(vec![String::from("a/b")])
    );
}

#[test]
fn constraints() {
    assert_eq!(matches(r"/posts/:id(\d+)", "/posts/12"), Some(vec![String::from("12")]));
    assert_eq!(matches(r"/posts/:id(\d+)", "/posts/abc"), None);
    assert_eq!(
        matches("/date/:ymd([0-9]{4}-[0-9]{2})", "/date/2021-07"),
        Some(vec![String::from("2021-07")])
    );
}

#[test]
fn escaped_characters() {
    assert_eq!(matches(r"/v1\:list", "/v1:list"), Some(vec![]));
    assert_eq!(canonicalize(r"/v1\:list", false, false), "/v1:list");
}

#[test]
fn partial_matches_stop_at_segment_boundaries() {
    let api = parse("/api");

    assert!(api.matches("/api/users", "/api/users", true).is_some());
    assert!(api.matches("/api", "/api", true).is_some());
    assert!(api.matches("/apis", "/apis", true).is_none());
    assert!(api.matches("/api/users", "/api/users", false).is_none());
}

#[test]
fn strict_trailing_slash() {
    let strict = RouteParser::parse("/docs/", false, true).unwrap();

    assert!(strict.matches("/docs/", "/docs/", false).is_some());
    assert!(strict.matches("/docs", "/docs", false).is_none());
}

#[test]
fn values_keep_the_request_case() {
    let path = "/Users/Ada";
    let detection = detection_path(path, false, false);
    assert_eq!(detection, "/users/ada");

    let values = parse("/users/:name").matches(&detection, path, false);
    assert_eq!(values, Some(vec![String::from("Ada")]));
}

#[test]
fn malformed_patterns() {
    let err = |pattern| RouteParser::parse(pattern, false, false).unwrap_err();

    assert!(matches!(err("/:id/:id"), ParseError::DuplicateParam { .. }));
    assert!(matches!(err("/*/more"), ParseError::GreedyNotLast { .. }));
    assert!(matches!(err("/:rest+/x"), ParseError::GreedyNotLast { .. }));
    assert!(matches!(err("/:/x"), ParseError::MissingName(_)));
    assert!(matches!(err("/:id(\\d+"), ParseError::UnterminatedConstraint(_)));
    assert!(matches!(err("/:id(["), ParseError::UnterminatedConstraint(_)));
    assert!(matches!(err("/:id([)"), ParseError::Constraint { .. }));
    assert!(matches!(err("/:id!"), ParseError::TrailingCharacters { .. }));
    assert!(matches!(err("/:id-x"), ParseError::TrailingCharacters { .. }));
    assert!(matches!(err("/:id?x"), ParseError::TrailingCharacters { .. }));

    let many: String = (0..31).map(|i| format!("/:p{}", i)).collect();
    assert!(matches!(err(many.as_str()), ParseError::TooManyParams(_)));
}

#[test]
fn canonical_forms() {
    assert_eq!(canonicalize("users", false, false), "/users");
    assert_eq!(canonicalize("/Users/", false, false), "/users");
    assert_eq!(canonicalize("/Users/", true, true), "/Users/");
    assert_eq!(canonicalize("/", false, false), "/");
    assert_eq!(canonicalize("", false, false), "/");
}

proptest! {
    #[test]
    fn canonicalize_is_idempotent(
        pattern in "[a-zA-Z0-9/:?*+]{0,24}",
        case_sensitive in any::<bool>(),
        strict in any::<bool>(),
    ) {
        let once = canonicalize(&pattern, case_sensitive, strict);
        prop_assert!(once.starts_with('/'));
        prop_assert_eq!(canonicalize(&once, case_sensitive, strict), once);
    }

    #[test]
    fn detection_keeps_byte_offsets(
        path in "/[a-zA-Z0-9/]{0,24}",
        case_sensitive in any::<bool>(),
    ) {
        let detection = detection_path(&path, case_sensitive, true);
        prop_assert_eq!(detection.len(), path.len());
        prop_assert!(detection.eq_ignore_ascii_case(&path));

        let lenient = detection_path(&path, case_sensitive, false);
        prop_assert!(path.to_ascii_lowercase().starts_with(&lenient.to_ascii_lowercase()));
    }
}
