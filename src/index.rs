//! The LITS index façade: public operations, descent loops, and the
//! path-stack count walk that drives online resizing.

use std::cmp::Ordering;

use thiserror::Error;

use crate::cnode::CNode;
use crate::hpt::Hpt;
use crate::iter::LitsIter;
use crate::kv::{BuildBatch, Kv};
use crate::node::{pmss_bulk, Census, Item, MAX_DEPTH};
use crate::pmss::{Pmss, PmssConfig};
use crate::trace::debug_log;

/// Minimum batch size for training the string model during bulk load.
pub const MIN_BULK_LOAD_SIZE: usize = 1000;

/// Why a bulk load was rejected. The index is left untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BulkloadError {
    /// The batch is too small to train the string model.
    #[error("bulk load needs at least {min} keys, got {got}")]
    TooFewKeys {
        /// Number of keys supplied.
        got: usize,
        /// Required minimum ([`MIN_BULK_LOAD_SIZE`]).
        min: usize,
    },
    /// Key at `index` sorts below its predecessor.
    #[error("input keys are not sorted at index {index}")]
    Unsorted {
        /// Offending position in the input.
        index: usize,
    },
    /// Key at `index` repeats its predecessor.
    #[error("input keys are not unique at index {index}")]
    Duplicate {
        /// Offending position in the input.
        index: usize,
    },
}

/// Structural snapshot of the index, for introspection and tests.
#[derive(Clone, Copy, Debug)]
pub struct IndexStats {
    /// Number of stored keys.
    pub keys: usize,
    /// Item variant counts across the tree.
    pub census: Census,
    /// Heap footprint of the trained string model.
    pub model_bytes: usize,
}

/// One recorded step of a mutating descent: which slot was taken in a
/// model node, and the confirmed prefix length on entering it.
struct PathEntry {
    slot: usize,
    ccpl: usize,
}

/// An in-memory ordered index over null-terminated byte strings.
///
/// Built once from a sorted-unique batch, then queried and mutated point
/// by point. Keys are handled as `&[u8]` slices over the byte alphabet
/// `1..=127` (the zero terminator is implicit and must not occur inside a
/// key); values are opaque `u64` words.
///
/// # Example
///
/// ```rust
/// use lits::Lits;
///
/// let keys: Vec<String> = (0..1000).map(|i| format!("user{i:06}")).collect();
/// let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_bytes()).collect();
/// let values: Vec<u64> = (0..1000).collect();
///
/// let mut index = Lits::new();
/// index.bulkload(&refs, &values).unwrap();
///
/// assert_eq!(index.lookup(b"user000500").map(|kv| kv.read()), Some(500));
/// assert!(index.insert(b"zzz", 1));
/// assert_eq!(index.upsert(b"zzz", 2), 1);
/// ```
pub struct Lits {
    built: bool,
    hpt: Option<Box<Hpt>>,
    pmss: Pmss,
    root: Item,
    len: usize,
}

impl Lits {
    /// An empty, unbuilt index with the default structural policy.
    pub fn new() -> Lits {
        Lits::with_config(PmssConfig::default())
    }

    /// An empty, unbuilt index with a custom structural policy.
    pub fn with_config(config: PmssConfig) -> Lits {
        Lits {
            built: false,
            hpt: None,
            pmss: Pmss::new(config),
            root: Item::Null,
            len: 0,
        }
    }

    /// Build the index from a sorted-unique batch, training a fresh
    /// string model over it. Must be called exactly once before any
    /// other operation.
    pub fn bulkload(&mut self, keys: &[&[u8]], values: &[u64]) -> Result<(), BulkloadError> {
        assert_eq!(keys.len(), values.len(), "keys and values must be parallel");
        Self::check_batch(keys)?;
        let batch = BuildBatch::from_pairs(keys, values);
        let hpt = Hpt::train_batch(&batch);
        self.build_from(batch, Box::new(hpt));
        Ok(())
    }

    /// [`Lits::bulkload`] with an already-trained model, enabling model
    /// reuse across index instances.
    pub fn bulkload_with_model(
        &mut self,
        keys: &[&[u8]],
        values: &[u64],
        model: Box<Hpt>,
    ) -> Result<(), BulkloadError> {
        assert_eq!(keys.len(), values.len(), "keys and values must be parallel");
        Self::check_batch(keys)?;
        self.build_from(BuildBatch::from_pairs(keys, values), model);
        Ok(())
    }

    fn check_batch(keys: &[&[u8]]) -> Result<(), BulkloadError> {
        if keys.len() < MIN_BULK_LOAD_SIZE {
            return Err(BulkloadError::TooFewKeys {
                got: keys.len(),
                min: MIN_BULK_LOAD_SIZE,
            });
        }
        for i in 1..keys.len() {
            match keys[i - 1].cmp(keys[i]) {
                Ordering::Less => {}
                Ordering::Equal => return Err(BulkloadError::Duplicate { index: i }),
                Ordering::Greater => return Err(BulkloadError::Unsorted { index: i }),
            }
        }
        Ok(())
    }

    fn build_from(&mut self, mut batch: BuildBatch, hpt: Box<Hpt>) {
        assert!(!self.built, "index is already bulk loaded");
        let n = batch.len();
        self.root = pmss_bulk(&mut batch, 0, n, 0, &hpt, &self.pmss);
        self.hpt = Some(hpt);
        self.len = n;
        self.built = true;
        debug_log!("bulk loaded {n} keys");
    }

    /// Release all storage and return to the unbuilt state.
    pub fn destroy(&mut self) {
        assert!(self.built, "index is not built");
        self.root = Item::Null;
        self.hpt = None;
        self.len = 0;
        self.built = false;
    }

    /// Number of stored keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index stores no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The trained string model, once built.
    pub fn model(&self) -> Option<&Hpt> {
        self.hpt.as_deref()
    }

    /// Structural snapshot of the current tree.
    pub fn stats(&self) -> IndexStats {
        let mut census = Census::default();
        self.root.census_into(&mut census);
        IndexStats {
            keys: self.len,
            census,
            model_bytes: self.hpt.as_ref().map_or(0, |h| h.size_bytes()),
        }
    }

    /// Point lookup. `None` when the key is absent.
    pub fn lookup(&self, key: &[u8]) -> Option<&Kv> {
        assert!(self.built, "index is not built");
        let hpt = self.hpt.as_deref().expect("built index has a model");

        let mut ccpl = 0usize;
        let mut item = &self.root;
        loop {
            match item {
                Item::Null => return None,
                Item::Single(kv) => return kv.verify(key, ccpl).then_some(kv.as_ref()),
                Item::Compact(cnode) => return cnode.search(key),
                Item::Trie(trie) => return trie.lookup(key),
                Item::Model(node) => {
                    let slot = node.predict_slot(key, &mut ccpl, hpt);
                    item = &node.items[slot];
                }
            }
        }
    }

    /// Insert a fresh key. Returns false when the key is present.
    pub fn insert(&mut self, key: &[u8], value: u64) -> bool {
        assert!(self.built, "index is not built");
        let hpt = self.hpt.as_deref().expect("built index has a model");
        let pmss = &self.pmss;

        let mut path: Vec<PathEntry> = Vec::new();
        let mut ccpl = 0usize;
        let mut item: &mut Item = &mut self.root;
        let inserted = loop {
            match item {
                Item::Model(node) => {
                    assert!(path.len() < MAX_DEPTH, "descent exceeded maximum depth");
                    let entry_ccpl = ccpl;
                    let slot = node.predict_slot(key, &mut ccpl, hpt);
                    path.push(PathEntry {
                        slot,
                        ccpl: entry_ccpl,
                    });
                    item = &mut node.items[slot];
                }
                Item::Null => {
                    *item = Item::Single(Kv::new(key, value));
                    break true;
                }
                Item::Single(kv) => {
                    if kv.keycmp(key, ccpl) == Ordering::Equal {
                        break false;
                    }
                    let Item::Single(existing) = std::mem::take(&mut *item) else {
                        unreachable!()
                    };
                    *item = Item::Compact(CNode::pair(ccpl, existing, key, value));
                    break true;
                }
                Item::Compact(cnode) => {
                    if !cnode.is_full() {
                        break cnode.insert(key, value);
                    }
                    if cnode.contains(key).is_some() {
                        break false;
                    }
                    // At capacity: spill the slot into a freshly built
                    // subtree holding all seventeen entries.
                    let Item::Compact(cnode) = std::mem::take(&mut *item) else {
                        unreachable!()
                    };
                    let node_ccpl = cnode.ccpl;
                    let kvs = cnode.extract_with(key, value);
                    let count = kvs.len();
                    let mut batch = BuildBatch::from_kvs(kvs);
                    *item = pmss_bulk(&mut batch, 0, count, node_ccpl, hpt, pmss);
                    break true;
                }
                Item::Trie(trie) => break trie.insert(key, value),
            }
        };

        if inserted {
            self.len += 1;
            self.bump_counts(&path, 1);
        }
        inserted
    }

    /// Insert or update. Returns the previous value, or 0 when the key
    /// was inserted fresh (callers storing meaningful zeros must wrap
    /// the API).
    pub fn upsert(&mut self, key: &[u8], value: u64) -> u64 {
        assert!(self.built, "index is not built");
        let hpt = self.hpt.as_deref().expect("built index has a model");
        let pmss = &self.pmss;

        let mut path: Vec<PathEntry> = Vec::new();
        let mut ccpl = 0usize;
        let mut item: &mut Item = &mut self.root;
        let old = loop {
            match item {
                Item::Model(node) => {
                    assert!(path.len() < MAX_DEPTH, "descent exceeded maximum depth");
                    let entry_ccpl = ccpl;
                    let slot = node.predict_slot(key, &mut ccpl, hpt);
                    path.push(PathEntry {
                        slot,
                        ccpl: entry_ccpl,
                    });
                    item = &mut node.items[slot];
                }
                Item::Null => {
                    *item = Item::Single(Kv::new(key, value));
                    break None;
                }
                Item::Single(kv) => {
                    if kv.keycmp(key, ccpl) == Ordering::Equal {
                        let old = kv.read();
                        kv.update(value);
                        break Some(old);
                    }
                    let Item::Single(existing) = std::mem::take(&mut *item) else {
                        unreachable!()
                    };
                    *item = Item::Compact(CNode::pair(ccpl, existing, key, value));
                    break None;
                }
                Item::Compact(cnode) => {
                    if !cnode.is_full() {
                        break cnode.upsert(key, value);
                    }
                    if let Some(i) = cnode.contains(key) {
                        break Some(cnode.update_at(i, value));
                    }
                    let Item::Compact(cnode) = std::mem::take(&mut *item) else {
                        unreachable!()
                    };
                    let node_ccpl = cnode.ccpl;
                    let kvs = cnode.extract_with(key, value);
                    let count = kvs.len();
                    let mut batch = BuildBatch::from_kvs(kvs);
                    *item = pmss_bulk(&mut batch, 0, count, node_ccpl, hpt, pmss);
                    break None;
                }
                Item::Trie(trie) => break trie.upsert(key, value),
            }
        };

        if old.is_none() {
            self.len += 1;
            self.bump_counts(&path, 1);
        }
        old.unwrap_or(0)
    }

    /// Remove a key. Returns false (with no effect) when absent.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        assert!(self.built, "index is not built");
        let hpt = self.hpt.as_deref().expect("built index has a model");

        let mut path: Vec<PathEntry> = Vec::new();
        let mut ccpl = 0usize;
        let mut item: &mut Item = &mut self.root;
        let removed = loop {
            match item {
                Item::Model(node) => {
                    assert!(path.len() < MAX_DEPTH, "descent exceeded maximum depth");
                    let entry_ccpl = ccpl;
                    let slot = node.predict_slot(key, &mut ccpl, hpt);
                    path.push(PathEntry {
                        slot,
                        ccpl: entry_ccpl,
                    });
                    item = &mut node.items[slot];
                }
                Item::Null => break false,
                Item::Single(kv) => {
                    if kv.keycmp(key, ccpl) != Ordering::Equal {
                        break false;
                    }
                    *item = Item::Null;
                    break true;
                }
                Item::Compact(cnode) => {
                    if cnode.len() > 2 {
                        break cnode.remove(key);
                    }
                    // Two entries left: a hit degrades the slot back to a
                    // single entry.
                    let Item::Compact(cnode) = std::mem::take(&mut *item) else {
                        unreachable!()
                    };
                    match cnode.degrade(key) {
                        Ok(survivor) => {
                            *item = Item::Single(survivor);
                            break true;
                        }
                        Err(cnode) => {
                            *item = Item::Compact(cnode);
                            break false;
                        }
                    }
                }
                Item::Trie(trie) => break trie.remove(key),
            }
        };

        if removed {
            self.len -= 1;
            self.bump_counts(&path, -1);
        }
        removed
    }

    /// Iterator positioned exactly at `key` (invalid when absent), for
    /// forward scans from that key onward.
    pub fn find(&self, key: &[u8]) -> LitsIter<'_> {
        assert!(self.built, "index is not built");
        let hpt = self.hpt.as_deref().expect("built index has a model");

        let mut iter = LitsIter::new();
        let mut ccpl = 0usize;
        let mut item = &self.root;
        loop {
            match item {
                Item::Null => {
                    iter.set_invalid();
                    return iter;
                }
                Item::Single(kv) => {
                    if kv.verify(key, ccpl) {
                        iter.set_single(kv);
                    } else {
                        iter.set_invalid();
                    }
                    return iter;
                }
                Item::Compact(cnode) => {
                    match cnode.position_of(key) {
                        Some(i) => iter.set_compact(cnode, i),
                        None => iter.set_invalid(),
                    }
                    return iter;
                }
                Item::Trie(trie) => {
                    match trie.find(key) {
                        Some(it) => iter.set_trie(it),
                        None => iter.set_invalid(),
                    }
                    return iter;
                }
                Item::Model(node) => {
                    let slot = node.predict_slot(key, &mut ccpl, hpt);
                    iter.push_frame(&node.items, slot);
                    item = &node.items[slot];
                }
            }
        }
    }

    /// Iterator positioned on the smallest key.
    pub fn begin(&self) -> LitsIter<'_> {
        assert!(self.built, "index is not built");
        let mut iter = LitsIter::new();
        iter.init_first(&self.root);
        iter
    }

    /// Walk the recorded descent from the root, adjusting each model
    /// node's key count. The first ancestor that drifts out of its
    /// density window is extracted and re-bulk-built in place; outer
    /// ancestors are left for later operations.
    fn bump_counts(&mut self, path: &[PathEntry], delta: i64) {
        let hpt = self.hpt.as_deref().expect("built index has a model");
        let pmss = &self.pmss;

        let mut item: &mut Item = &mut self.root;
        for entry in path {
            let rebuild = {
                let Item::Model(node) = &mut *item else {
                    unreachable!("count walk landed on a non-model item");
                };
                if delta > 0 {
                    node.key_count += 1;
                } else {
                    node.key_count -= 1;
                }
                node.needs_rebuild()
            };

            if rebuild {
                let old = std::mem::take(&mut *item);
                let mut kvs = Vec::new();
                old.extract_into(&mut kvs);
                let count = kvs.len();
                debug_log!("resizing subtree of {count} keys at ccpl {}", entry.ccpl);
                let mut batch = BuildBatch::from_kvs(kvs);
                *item = pmss_bulk(&mut batch, 0, count, entry.ccpl, hpt, pmss);
                return;
            }

            let Item::Model(node) = item else {
                unreachable!()
            };
            item = &mut node.items[entry.slot];
        }
    }
}

impl Default for Lits {
    fn default() -> Self {
        Lits::new()
    }
}
