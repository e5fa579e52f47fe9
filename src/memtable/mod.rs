//! Sorted in-memory key-value index backing the memtable.
//!
//! A classic skip list: probabilistic multi-level forward links over nodes
//! kept in strictly increasing key order, giving expected O(log n) search,
//! insert, and erase. Nodes live in an arena indexed by `usize`, with a free
//! list recycling slots vacated by `erase`; links are plain indices, so no
//! unsafe pointer juggling is needed.
//!
//! Level selection is geometric with promotion probability `p` (default
//! 1/4) up to `max_level` (default 16), driven by a seedable PRNG so tests
//! can replay exact tower shapes.
//!
//! Not thread-safe: callers share a list across threads only under external
//! synchronization, and any mutation invalidates outstanding iterators.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default maximum tower height.
pub const DEFAULT_MAX_LEVEL: usize = 16;

/// Default promotion probability, as a fraction.
pub const DEFAULT_P_NUM: u32 = 1;
pub const DEFAULT_P_DEN: u32 = 4;

/// Sentinel "no node" link.
const NIL: usize = usize::MAX;

/// Arena slot of the head sentinel.
const HEAD: usize = 0;

struct Node {
    key: Vec<u8>,
    value: Vec<u8>,
    /// Forward links, one per level of this node's tower.
    forward: Vec<usize>,
}

/// Single-threaded skip list over byte-string keys and values.
pub struct SkipList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    max_level: usize,
    /// Current tallest occupied level, in `1..=max_level`.
    level: usize,
    len: usize,
    p_num: u32,
    p_den: u32,
    rng: StdRng,
}

impl SkipList {
    /// Creates an empty list with default parameters and an entropy seed.
    pub fn new() -> Self {
        Self::with_params(
            DEFAULT_MAX_LEVEL,
            DEFAULT_P_NUM,
            DEFAULT_P_DEN,
            rand::thread_rng().gen(),
        )
    }

    /// Creates an empty list with default parameters and a fixed seed, so a
    /// test can reproduce the exact tower layout.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_params(DEFAULT_MAX_LEVEL, DEFAULT_P_NUM, DEFAULT_P_DEN, seed)
    }

    /// Creates an empty list with explicit parameters.
    ///
    /// `max_level` is clamped to at least one. A promotion fraction that is
    /// not a proper fraction in (0, 1) falls back to 1/4.
    pub fn with_params(max_level: usize, p_num: u32, p_den: u32, seed: u64) -> Self {
        let max_level = max_level.max(1);
        let (p_num, p_den) = if p_den <= 1 || p_num < 1 || p_num >= p_den {
            (DEFAULT_P_NUM, DEFAULT_P_DEN)
        } else {
            (p_num, p_den)
        };

        let head = Node {
            key: Vec::new(),
            value: Vec::new(),
            forward: vec![NIL; max_level],
        };
        Self {
            nodes: vec![head],
            free: Vec::new(),
            max_level,
            level: 1,
            len: 0,
            p_num,
            p_den,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every entry and resets the list to its initial state.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        for link in self.nodes[HEAD].forward.iter_mut() {
            *link = NIL;
        }
        self.free.clear();
        self.level = 1;
        self.len = 0;
    }

    /// True iff `key` is present.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let x = self.find_greater_or_equal(key);
        if x != NIL && self.nodes[x].key == key {
            Some(&self.nodes[x].value)
        } else {
            None
        }
    }

    /// Inserts a new entry. Returns `false` (without touching the stored
    /// value) when `key` is already present.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> bool {
        let mut update = vec![HEAD; self.max_level];
        let x = self.find_predecessors(key, &mut update);
        if x != NIL && self.nodes[x].key == key {
            return false;
        }
        self.splice_new(key, value, &update);
        true
    }

    /// Upsert: overwrites in place when `key` exists, inserts otherwise.
    /// Returns `true` when a new entry was created.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> bool {
        let mut update = vec![HEAD; self.max_level];
        let x = self.find_predecessors(key, &mut update);
        if x != NIL && self.nodes[x].key == key {
            self.nodes[x].value.clear();
            self.nodes[x].value.extend_from_slice(value);
            return false;
        }
        self.splice_new(key, value, &update);
        true
    }

    /// Removes `key` if present, unlinking its node at every level of its
    /// tower. Returns whether a node was removed.
    pub fn erase(&mut self, key: &[u8]) -> bool {
        let mut update = vec![HEAD; self.max_level];
        let x = self.find_predecessors(key, &mut update);
        if x == NIL || self.nodes[x].key != key {
            return false;
        }

        for lvl in 0..self.level {
            let pred = update[lvl];
            if self.nodes[pred].forward[lvl] == x {
                let succ = self.nodes[x].forward[lvl];
                self.nodes[pred].forward[lvl] = succ;
            }
        }

        // Drop the buffers now; the slot itself is recycled by later
        // insertions.
        self.nodes[x].key = Vec::new();
        self.nodes[x].value = Vec::new();
        self.free.push(x);
        self.len -= 1;

        while self.level > 1 && self.nodes[HEAD].forward[self.level - 1] == NIL {
            self.level -= 1;
        }
        true
    }

    /// Forward iterator from the smallest key.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            node: self.nodes[HEAD].forward[0],
        }
    }

    /// Forward iterator positioned at the first entry with key >= `target`;
    /// exhausted immediately when no such entry exists.
    pub fn seek(&self, target: &[u8]) -> Iter<'_> {
        Iter {
            list: self,
            node: self.find_greater_or_equal(target),
        }
    }

    /// First node with key >= `target`, or `NIL`.
    fn find_greater_or_equal(&self, target: &[u8]) -> usize {
        let mut x = HEAD;
        for lvl in (0..self.level).rev() {
            loop {
                let next = self.nodes[x].forward[lvl];
                if next != NIL && self.nodes[next].key.as_slice() < target {
                    x = next;
                } else {
                    break;
                }
            }
        }
        self.nodes[x].forward[0]
    }

    /// Same walk, but records the last node < `target` at every level so
    /// callers can splice in or out.
    fn find_predecessors(&self, target: &[u8], update: &mut [usize]) -> usize {
        let mut x = HEAD;
        for lvl in (0..self.level).rev() {
            loop {
                let next = self.nodes[x].forward[lvl];
                if next != NIL && self.nodes[next].key.as_slice() < target {
                    x = next;
                } else {
                    break;
                }
            }
            update[lvl] = x;
        }
        self.nodes[x].forward[0]
    }

    /// Links a freshly allocated node behind the recorded predecessors.
    fn splice_new(&mut self, key: &[u8], value: &[u8], update: &[usize]) {
        let height = self.random_level();
        if height > self.level {
            // Predecessors above the old top level are the head sentinel,
            // which `update` was initialized with.
            self.level = height;
        }

        let node = self.alloc(key, value, height);
        for lvl in 0..height {
            let pred = update[lvl];
            let succ = self.nodes[pred].forward[lvl];
            self.nodes[node].forward[lvl] = succ;
            self.nodes[pred].forward[lvl] = node;
        }
        self.len += 1;
    }

    fn alloc(&mut self, key: &[u8], value: &[u8], height: usize) -> usize {
        let node = Node {
            key: key.to_vec(),
            value: value.to_vec(),
            forward: vec![NIL; height],
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Geometric tower height in `1..=max_level`: keep promoting while a
    /// trial with probability `p_num/p_den` succeeds.
    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < self.max_level && self.rng.gen_range(0..self.p_den) < self.p_num {
            level += 1;
        }
        level
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SkipList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipList")
            .field("len", &self.len)
            .field("level", &self.level)
            .field("max_level", &self.max_level)
            .finish()
    }
}

/// Read-only forward iterator over list entries in ascending key order.
///
/// Invalidated by any mutating operation on the list; the borrow checker
/// enforces this, since mutation needs `&mut SkipList`.
pub struct Iter<'a> {
    list: &'a SkipList,
    node: usize,
}

impl<'a> Iter<'a> {
    /// Whether the iterator currently points at an entry.
    pub fn valid(&self) -> bool {
        self.node != NIL
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.node == NIL {
            return None;
        }
        let node = &self.list.nodes[self.node];
        self.node = node.forward[0];
        Some((node.key.as_slice(), node.value.as_slice()))
    }
}

impl<'a> IntoIterator for &'a SkipList {
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
