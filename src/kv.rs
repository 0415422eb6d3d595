//! Owned key-value records and the bulk-build batch.

use std::cmp::Ordering;

use crate::bytestr::{self, dist_prefix_len, dist_prefix_len3};

/// An owned key-value entry: a copied key and a 64-bit value.
///
/// Entries are allocated once (by a user mutation or by bulk build) and
/// then moved between slots; only the value is ever mutated in place.
#[derive(Debug, PartialEq)]
pub struct Kv {
    value: u64,
    key: Box<[u8]>,
}

impl Kv {
    /// Allocate a new entry, copying the key bytes.
    pub(crate) fn new(key: &[u8], value: u64) -> Box<Kv> {
        Box::new(Kv {
            value,
            key: key.into(),
        })
    }

    /// The stored key bytes (without the implicit terminator).
    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The current value.
    #[inline]
    pub fn read(&self) -> u64 {
        self.value
    }

    /// Overwrite the value in place.
    #[inline]
    pub(crate) fn update(&mut self, value: u64) {
        self.value = value;
    }

    /// Whether the stored key equals `key`, comparing only from `from`.
    /// The caller guarantees the first `from` bytes already matched.
    #[inline]
    pub(crate) fn verify(&self, key: &[u8], from: usize) -> bool {
        bytestr::tail(&self.key, from) == bytestr::tail(key, from)
    }

    /// 3-way comparison of `key` against the stored key, from `from`.
    #[inline]
    pub(crate) fn keycmp(&self, key: &[u8], from: usize) -> Ordering {
        bytestr::cmp_from(key, &self.key, from)
    }
}

/// A compact-node entry: an owned record plus the 16-bit hash of its key.
///
/// The hash rides alongside the owning box, preserving the tagged-pointer
/// trick (hash in the high bits) in a memory-safe layout. Scans check the
/// tag first and only then compare key bytes.
#[derive(Debug)]
pub(crate) struct TaggedKv {
    pub tag: u16,
    pub kv: Box<Kv>,
}

impl TaggedKv {
    #[inline]
    pub fn new(kv: Box<Kv>) -> TaggedKv {
        let tag = bytestr::hash16(kv.key());
        TaggedKv { tag, kv }
    }
}

/// The key/value sequence consumed by bulk construction.
///
/// Bulk build reads keys freely while partitioning, then takes each entry
/// exactly once when it lands in its final slot. Both input shapes of the
/// index (caller-supplied parallel slices and extracted subtrees) are
/// normalized into this form.
pub(crate) struct BuildBatch {
    slots: Vec<Option<Box<Kv>>>,
}

impl BuildBatch {
    /// Batch from caller-supplied parallel key/value slices, copying keys.
    pub fn from_pairs(keys: &[&[u8]], values: &[u64]) -> BuildBatch {
        debug_assert_eq!(keys.len(), values.len());
        BuildBatch {
            slots: keys
                .iter()
                .zip(values.iter())
                .map(|(k, &v)| Some(Kv::new(k, v)))
                .collect(),
        }
    }

    /// Batch from already-owned entries (subtree extraction).
    pub fn from_kvs(kvs: Vec<Box<Kv>>) -> BuildBatch {
        BuildBatch {
            slots: kvs.into_iter().map(Some).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Key bytes of the entry at `i`. Must not have been taken yet.
    #[inline]
    pub fn key(&self, i: usize) -> &[u8] {
        self.slots[i]
            .as_deref()
            .expect("batch entry already consumed")
            .key()
    }

    /// Move the entry at `i` out of the batch. Each index is taken once.
    #[inline]
    pub fn take(&mut self, i: usize) -> Box<Kv> {
        self.slots[i].take().expect("batch entry already consumed")
    }
}

/// Group partial-key length of the sorted batch range `[l, r)`: the mean
/// distinguishing-prefix length across the group minus the group common
/// prefix length. Scores how much each extra byte discriminates; small
/// values mean neighbors separate right after the shared prefix.
pub(crate) fn group_partial_key_len(batch: &BuildBatch, l: usize, r: usize) -> f64 {
    debug_assert!(r - l >= 2);
    let gcpl = bytestr::common_prefix_len(batch.key(l), batch.key(r - 1)) as f64;

    let mut dkl_sum = 0usize;
    for i in l..r {
        dkl_sum += if i == l {
            dist_prefix_len(batch.key(l), batch.key(l + 1))
        } else if i == r - 1 {
            dist_prefix_len(batch.key(r - 2), batch.key(r - 1))
        } else {
            dist_prefix_len3(batch.key(i - 1), batch.key(i), batch.key(i + 1))
        };
    }

    dkl_sum as f64 / (r - l) as f64 - gcpl
}
