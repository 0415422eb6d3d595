//! Compact leaf node: a small sorted run of hash-tagged entries.

use std::cmp::Ordering;

use crate::bytestr::hash16;
use crate::kv::{BuildBatch, Kv, TaggedKv};

/// Maximum number of entries a compact node holds before its slot is
/// rebuilt as a full subtree.
pub(crate) const CNODE_CAPACITY: usize = 16;

/// A compact node: up to [`CNODE_CAPACITY`] entries sorted by key, all
/// sharing the descent path's confirmed common prefix. Every operation is
/// a linear scan; the per-entry hash tag short-circuits key comparisons.
#[derive(Debug)]
pub(crate) struct CNode {
    /// Confirmed common prefix length of the enclosing path; comparisons
    /// skip this many leading bytes.
    pub ccpl: usize,
    entries: Vec<TaggedKv>,
}

impl CNode {
    /// Build from a sorted batch range `[l, r)` under prefix `ccpl`.
    pub fn build(batch: &mut BuildBatch, l: usize, r: usize, ccpl: usize) -> Box<CNode> {
        debug_assert!(r - l >= 2 && r - l <= CNODE_CAPACITY);
        let entries = (l..r).map(|i| TaggedKv::new(batch.take(i))).collect();
        Box::new(CNode { ccpl, entries })
    }

    /// A fresh two-entry node from an existing entry and a new key, the
    /// spill path of a single-entry slot.
    pub fn pair(ccpl: usize, existing: Box<Kv>, key: &[u8], value: u64) -> Box<CNode> {
        let fresh = Kv::new(key, value);
        let entries = match existing.keycmp(key, ccpl) {
            // New key sorts after the existing entry.
            Ordering::Greater => vec![TaggedKv::new(existing), TaggedKv::new(fresh)],
            _ => vec![TaggedKv::new(fresh), TaggedKv::new(existing)],
        };
        Box::new(CNode { ccpl, entries })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= CNODE_CAPACITY
    }

    /// Hash-guarded point lookup.
    pub fn search(&self, key: &[u8]) -> Option<&Kv> {
        let tag = hash16(key);
        self.entries
            .iter()
            .find(|e| e.tag == tag && e.kv.verify(key, self.ccpl))
            .map(|e| e.kv.as_ref())
    }

    /// Index of the entry holding `key`, if present. Hash-guarded.
    pub fn position_of(&self, key: &[u8]) -> Option<usize> {
        let tag = hash16(key);
        self.entries
            .iter()
            .position(|e| e.tag == tag && e.kv.verify(key, self.ccpl))
    }

    /// Entry at `idx`, for iteration.
    #[inline]
    pub fn entry(&self, idx: usize) -> &Kv {
        &self.entries[idx].kv
    }

    /// Insert into a node with room. Returns false if the key exists.
    pub fn insert(&mut self, key: &[u8], value: u64) -> bool {
        debug_assert!(!self.is_full());
        let mut at = self.entries.len();
        for (i, e) in self.entries.iter().enumerate() {
            match e.kv.keycmp(key, self.ccpl) {
                Ordering::Equal => return false,
                // The stored key is the greater one: insert before it.
                Ordering::Less => {
                    at = i;
                    break;
                }
                Ordering::Greater => {}
            }
        }
        self.entries.insert(at, TaggedKv::new(Kv::new(key, value)));
        true
    }

    /// Upsert into a node with room. Returns the previous value, or
    /// `None` if the key was inserted fresh.
    pub fn upsert(&mut self, key: &[u8], value: u64) -> Option<u64> {
        let tag = hash16(key);
        for e in &mut self.entries {
            if e.tag == tag && e.kv.verify(key, self.ccpl) {
                let old = e.kv.read();
                e.kv.update(value);
                return Some(old);
            }
        }
        let inserted = self.insert(key, value);
        debug_assert!(inserted);
        None
    }

    /// Remove from a node that keeps at least two entries afterwards.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        debug_assert!(self.entries.len() > 2);
        match self.position_of(key) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Remove from a two-entry node, degrading to the surviving entry.
    /// Returns the node unchanged when the key is absent.
    pub fn degrade(mut self: Box<Self>, key: &[u8]) -> Result<Box<Kv>, Box<CNode>> {
        assert_eq!(self.entries.len(), 2);
        match self.position_of(key) {
            Some(i) => {
                self.entries.remove(i);
                Ok(self.entries.pop().expect("survivor entry").kv)
            }
            None => Err(self),
        }
    }

    /// Whether `key` is stored, by full comparison (no hash guard); used
    /// before committing to a capacity rebuild.
    pub fn contains(&self, key: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.kv.keycmp(key, self.ccpl) == Ordering::Equal)
    }

    /// Value update in place by index; pairs with [`CNode::contains`].
    pub fn update_at(&mut self, idx: usize, value: u64) -> u64 {
        let old = self.entries[idx].kv.read();
        self.entries[idx].kv.update(value);
        old
    }

    /// Consume the node into its entries plus one new key spliced into
    /// sorted position, feeding a capacity rebuild. The caller has already
    /// checked the key is absent.
    pub fn extract_with(self: Box<Self>, key: &[u8], value: u64) -> Vec<Box<Kv>> {
        let ccpl = self.ccpl;
        let mut out: Vec<Box<Kv>> = Vec::with_capacity(self.entries.len() + 1);
        let mut fresh = Some(Kv::new(key, value));
        for e in self.entries {
            if let Some(f) = &fresh {
                // First stored key sorting above the fresh one: splice here.
                if f.keycmp(e.kv.key(), ccpl) == Ordering::Greater {
                    out.push(fresh.take().expect("unspliced entry"));
                }
            }
            out.push(e.kv);
        }
        if let Some(f) = fresh {
            out.push(f);
        }
        out
    }

    /// Consume the node into its entries in key order.
    pub fn extract_into(self: Box<Self>, out: &mut Vec<Box<Kv>>) {
        out.extend(self.entries.into_iter().map(|e| e.kv));
    }
}
