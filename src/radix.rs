//! A radix tree mapping string keys to values, with longest-prefix lookups.
//!
//! The tree is mutable during setup and can be frozen afterwards, at
//! which point lookups no longer take a lock. An optional cache of
//! lookup results is published as a whole map, so readers never observe
//! a partially updated cache.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

// Number of children stored inline before switching to a full byte table.
const SMALL_EDGES: usize = 16;

/// The result of a lookup: the matched key and its value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match<V> {
    pub prefix: String,
    pub value: V,
}

// Cached lookups, tagged with the number of inserts they were computed after.
struct Cache<V> {
    generation: u64,
    entries: HashMap<String, Match<V>>,
}

impl<V> Cache<V> {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            entries: HashMap::new(),
        }
    }
}

/// A concurrent radix tree.
pub struct RadixTree<V> {
    root: RwLock<Node<V>>,
    frozen: OnceCell<Node<V>>,
    cache: ArcSwap<Cache<V>>,
    cache_capacity: usize,
    len: AtomicUsize,
}

impl<V> RadixTree<V>
where
    V: Clone,
{
    /// Create an empty tree without a lookup cache.
    pub fn new() -> Self {
        Self::with_cache(0)
    }

    /// Create an empty tree caching up to `capacity` results of [`lookup`](Self::lookup).
    pub fn with_cache(capacity: usize) -> Self {
        Self {
            root: RwLock::new(Node::new(Vec::new())),
            frozen: OnceCell::new(),
            cache: ArcSwap::from_pointee(Cache::new(0)),
            cache_capacity: capacity,
            len: AtomicUsize::new(0),
        }
    }

    /// Insert a key, replacing the value of an existing key.
    ///
    /// Returns `false` if the tree is frozen, in which case nothing is inserted.
    pub fn insert(&self, key: impl Into<String>, value: V) -> bool {
        let key = key.into();
        let mut root = self.root.write();

        if self.is_frozen() {
            return false;
        }

        let leaf = Leaf {
            key: key.clone(),
            value,
        };

        if root.insert(key.as_bytes(), leaf) {
            self.len.fetch_add(1, Ordering::Relaxed);
        }

        if self.cache_capacity > 0 {
            let generation = self.cache.load().generation + 1;
            self.cache.store(Arc::new(Cache::new(generation)));
        }

        true
    }

    /// Returns the value stored under exactly `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.read(|root| root.get(key.as_bytes()).map(|leaf| leaf.value.clone()))
    }

    /// Returns the longest inserted key that is a prefix of `key`, with its value.
    pub fn longest_prefix(&self, key: &str) -> Option<Match<V>> {
        self.read(|root| root.longest_prefix(key.as_bytes()).map(Leaf::to_match))
    }

    /// Like [`longest_prefix`](Self::longest_prefix), but consults and
    /// populates the lookup cache.
    pub fn lookup(&self, key: &str) -> Option<Match<V>> {
        if self.cache_capacity == 0 {
            return self.longest_prefix(key);
        }

        let (generation, full) = {
            let cache = self.cache.load();
            if let Some(hit) = cache.entries.get(key) {
                return Some(hit.clone());
            }
            (cache.generation, cache.entries.len() >= self.cache_capacity)
        };

        let found = self.longest_prefix(key)?;

        if !full {
            self.remember(generation, key, &found);
        }

        Some(found)
    }

    // Cache a lookup result computed while `generation` was current. A
    // result computed before a concurrent insert must not outlive it.
    fn remember(&self, generation: u64, key: &str, found: &Match<V>) {
        self.cache.rcu(|cache| {
            if cache.generation != generation || cache.entries.len() >= self.cache_capacity {
                return Arc::clone(cache);
            }

            let mut entries = cache.entries.clone();
            entries.insert(key.to_owned(), found.clone());
            Arc::new(Cache {
                generation,
                entries,
            })
        });
    }

    /// All keys and their values, in byte order of the keys.
    pub fn entries(&self) -> Vec<(String, V)> {
        self.read(|root| {
            let mut entries = Vec::with_capacity(self.len());
            root.walk(&mut |leaf| entries.push((leaf.key.clone(), leaf.value.clone())));
            entries
        })
    }

    /// Make the tree immutable.
    ///
    /// Later inserts are ignored, and lookups no longer lock. Calling
    /// this more than once has no effect.
    pub fn freeze(&self) {
        let mut root = self.root.write();

        if self.is_frozen() {
            return;
        }

        let mut node = mem::replace(&mut *root, Node::new(Vec::new()));
        node.compact();

        // the write lock serializes freezes, so the cell is always empty here
        let _ = self.frozen.set(node);
    }

    /// Whether [`freeze`](Self::freeze) was called.
    pub fn is_frozen(&self) -> bool {
        self.frozen.get().is_some()
    }

    /// The number of keys in the tree.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether the tree contains no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&Node<V>) -> T) -> T {
        match self.frozen.get() {
            Some(root) => f(root),
            None => f(&self.root.read()),
        }
    }
}

impl<V: Clone> Default for RadixTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for RadixTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadixTree")
            .field("len", &self.len.load(Ordering::Relaxed))
            .field("frozen", &self.frozen.get().is_some())
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}

struct Leaf<V> {
    key: String,
    value: V,
}

impl<V: Clone> Leaf<V> {
    fn to_match(&self) -> Match<V> {
        Match {
            prefix: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

struct Node<V> {
    prefix: Vec<u8>,
    leaf: Option<Leaf<V>>,
    edges: Edges<V>,
}

impl<V> Node<V> {
    fn new(prefix: Vec<u8>) -> Self {
        Self {
            prefix,
            leaf: None,
            edges: Edges::Small {
                labels: Vec::new(),
                nodes: Vec::new(),
            },
        }
    }

    // Returns true if the key was not present before.
    fn insert(&mut self, search: &[u8], leaf: Leaf<V>) -> bool {
        if search.is_empty() {
            return self.leaf.replace(leaf).is_none();
        }

        let child = match self.edges.get_mut(search[0]) {
            Some(child) => child,
            None => {
                let mut node = Node::new(search.to_vec());
                node.leaf = Some(leaf);
                self.edges.add(search[0], node);
                return true;
            }
        };

        let common = child
            .prefix
            .iter()
            .zip(search)
            .take_while(|(a, b)| a == b)
            .count();

        if common == child.prefix.len() {
            return child.insert(&search[common..], leaf);
        }

        // split the child at the common prefix
        let mut old = mem::replace(child, Node::new(search[..common].to_vec()));
        old.prefix.drain(..common);
        child.edges.add(old.prefix[0], old);

        let rest = &search[common..];
        if rest.is_empty() {
            child.leaf = Some(leaf);
        } else {
            let mut node = Node::new(rest.to_vec());
            node.leaf = Some(leaf);
            child.edges.add(rest[0], node);
        }

        true
    }

    fn get(&self, key: &[u8]) -> Option<&Leaf<V>> {
        let mut node = self;
        let mut search = key;

        while !search.is_empty() {
            node = node
                .edges
                .get(search[0])
                .filter(|child| search.starts_with(&child.prefix))?;
            search = &search[node.prefix.len()..];
        }

        node.leaf.as_ref()
    }

    fn longest_prefix(&self, key: &[u8]) -> Option<&Leaf<V>> {
        let mut node = self;
        let mut search = key;
        let mut last = None;

        loop {
            if let Some(ref leaf) = node.leaf {
                last = Some(leaf);
            }

            let child = match search.first().and_then(|&label| node.edges.get(label)) {
                Some(child) if search.starts_with(&child.prefix) => child,
                _ => return last,
            };

            search = &search[child.prefix.len()..];
            node = child;
        }
    }

    fn walk(&self, f: &mut impl FnMut(&Leaf<V>)) {
        if let Some(ref leaf) = self.leaf {
            f(leaf);
        }

        match self.edges {
            Edges::Small { ref nodes, .. } => {
                for node in nodes {
                    node.walk(&mut *f);
                }
            }
            Edges::Dense(ref slots) => {
                for node in slots.iter().flatten() {
                    node.walk(&mut *f);
                }
            }
        }
    }

    // Replace every dense table with the compact representation.
    fn compact(&mut self) {
        if let Edges::Dense(ref mut slots) = self.edges {
            let mut labels = Vec::new();
            let mut nodes = Vec::new();

            for (label, slot) in slots.iter_mut().enumerate() {
                if let Some(node) = slot.take() {
                    labels.push(label as u8);
                    nodes.push(node);
                }
            }

            self.edges = Edges::Small { labels, nodes };
        }

        if let Edges::Small { ref mut nodes, .. } = self.edges {
            for node in nodes {
                node.compact();
            }
        }
    }
}

enum Edges<V> {
    // labels are kept sorted, `nodes[i]` is the child for `labels[i]`
    Small {
        labels: Vec<u8>,
        nodes: Vec<Node<V>>,
    },
    Dense(Box<[Option<Node<V>>]>),
}

impl<V> Edges<V> {
    fn get(&self, label: u8) -> Option<&Node<V>> {
        match self {
            Edges::Small { labels, nodes } => {
                let i = labels.binary_search(&label).ok()?;
                Some(&nodes[i])
            }
            Edges::Dense(slots) => slots[label as usize].as_ref(),
        }
    }

    fn get_mut(&mut self, label: u8) -> Option<&mut Node<V>> {
        match self {
            Edges::Small { labels, nodes } => {
                let i = labels.binary_search(&label).ok()?;
                Some(&mut nodes[i])
            }
            Edges::Dense(slots) => slots[label as usize].as_mut(),
        }
    }

    fn add(&mut self, label: u8, node: Node<V>) {
        match self {
            Edges::Small { labels, nodes } if labels.len() < SMALL_EDGES => {
                let i = labels.binary_search(&label).unwrap_or_else(|i| i);
                labels.insert(i, label);
                nodes.insert(i, node);
            }
            Edges::Small { labels, nodes } => {
                let mut slots: Box<[Option<Node<V>>]> = (0..256).map(|_| None).collect();
                for (label, node) in labels.drain(..).zip(nodes.drain(..)) {
                    slots[label as usize] = Some(node);
                }
                slots[label as usize] = Some(node);
                *self = Edges::Dense(slots);
            }
            Edges::Dense(slots) => slots[label as usize] = Some(node),
        }
    }
}
