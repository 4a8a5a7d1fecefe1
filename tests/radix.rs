use std::collections::HashMap;

use fennec::radix::{Match, RadixTree};
use proptest::prelude::*;

fn tree(keys: &[&str]) -> RadixTree<usize> {
    let tree = RadixTree::new();
    for (i, key) in keys.iter().enumerate() {
        tree.insert(*key, i);
    }
    tree
}

#[test]
fn longest_prefix() {
    let tree = tree(&["/", "/foo", "/foobar", "/bar"]);

    assert_eq!(
        tree.longest_prefix("/foobar/baz"),
        Some(Match {
            prefix: String::from("/foobar"),
            value: 2
        })
    );
    assert_eq!(tree.longest_prefix("/unknown").unwrap().prefix, "/");
    assert_eq!(tree.longest_prefix("/fo").unwrap().prefix, "/");
    assert_eq!(tree.longest_prefix("/foob").unwrap().prefix, "/foo");
    assert_eq!(tree.longest_prefix("").map(|m| m.prefix), None);
}

#[test]
fn exact_lookups() {
    let tree = tree(&["/api", "/api/users"]);

    assert_eq!(tree.get("/api"), Some(0));
    assert_eq!(tree.get("/api/users"), Some(1));
    assert_eq!(tree.get("/api/"), None);
    assert_eq!(tree.get("/ap"), None);
    assert_eq!(tree.len(), 2);
}

#[test]
fn insert_replaces() {
    let tree = RadixTree::new();
    assert!(tree.insert("/a", 1));
    assert!(tree.insert("/a", 2));

    assert_eq!(tree.get("/a"), Some(2));
    assert_eq!(tree.len(), 1);
}

#[test]
fn frozen_trees_ignore_inserts() {
    let tree = tree(&["/a", "/b"]);
    tree.freeze();
    tree.freeze();

    assert!(tree.is_frozen());
    assert!(!tree.insert("/c", 9));
    assert_eq!(tree.get("/c"), None);
    assert_eq!(tree.longest_prefix("/b/c").unwrap().value, 1);
    assert_eq!(tree.len(), 2);
}

#[test]
fn cached_lookups_see_later_inserts() {
    let tree = RadixTree::with_cache(8);
    tree.insert("/", "root");

    assert_eq!(tree.lookup("/admin/users").unwrap().value, "root");
    assert_eq!(tree.lookup("/admin/users").unwrap().value, "root");

    // inserting drops the cache
    tree.insert("/admin", "admin");
    assert_eq!(tree.lookup("/admin/users").unwrap().value, "admin");
}

#[test]
fn cache_capacity_is_bounded() {
    let tree = RadixTree::with_cache(2);
    tree.insert("/", 0);

    for path in ["/a", "/b", "/c", "/d"] {
        assert_eq!(tree.lookup(path).unwrap().prefix, "/");
    }
}

#[test]
fn many_children() {
    let keys: Vec<String> = (0u8..64).map(|b| format!("/{}", (b'0' + b) as char)).collect();
    let tree = RadixTree::new();
    for (i, key) in keys.iter().enumerate() {
        tree.insert(key.as_str(), i);
    }

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(tree.get(key), Some(i));
        assert_eq!(tree.longest_prefix(&format!("{}/x", key)).unwrap().value, i);
    }

    tree.freeze();
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(tree.get(key), Some(i));
    }
}

#[test]
fn concurrent_inserts_invalidate_cached_lookups() {
    let tree = RadixTree::with_cache(64);
    tree.insert("/", 0);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    tree.lookup("/a/b/c/x");
                }
            });
        }

        for (i, key) in ["/a", "/a/b", "/a/b/c"].into_iter().enumerate() {
            tree.insert(key, i + 1);
        }
    });

    assert_eq!(tree.lookup("/a/b/c/x").unwrap().prefix, "/a/b/c");
    assert_eq!(tree.lookup("/a/b/c/x").unwrap().value, 3);
}

proptest! {
    #[test]
    fn matches_a_linear_scan(
        keys in prop::collection::vec("/[a-c]{0,4}", 0..12),
        queries in prop::collection::vec("/[a-c/]{0,6}", 1..8),
        freeze in any::<bool>(),
    ) {
        let tree = RadixTree::with_cache(4);
        let mut expected = HashMap::new();
        for (i, key) in keys.iter().enumerate() {
            tree.insert(key.as_str(), i);
            expected.insert(key.clone(), i);
        }

        if freeze {
            tree.freeze();
        }

        for query in &queries {
            let linear = expected
                .iter()
                .filter(|(key, _)| query.starts_with(key.as_str()))
                .max_by_key(|(key, _)| key.len())
                .map(|(key, value)| Match { prefix: key.clone(), value: *value });

            prop_assert_eq!(tree.longest_prefix(query), linear.clone());
            prop_assert_eq!(tree.lookup(query), linear);
        }

        let mut sorted: Vec<_> = expected.into_iter().collect();
        sorted.sort();
        prop_assert_eq!(tree.entries(), sorted);
    }
}
