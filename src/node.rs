//! The polymorphic node fabric: tagged item slots, the model-based inner
//! node, and the bulk-build recursion that chooses between variants.

use std::cmp::Ordering;

use crate::bytestr::{common_prefix_len, cmp_prefix};
use crate::cnode::{CNode, CNODE_CAPACITY};
use crate::hpt::Hpt;
use crate::kv::{group_partial_key_len, BuildBatch, Kv};
use crate::pmss::{Pmss, Structure};
use crate::trace::debug_log;
use crate::trie::Trie;

/// Maximum descent depth; deeper paths are a structural corruption.
pub(crate) const MAX_DEPTH: usize = 128;

/// Item-array slots per key in a freshly built model node.
const SCALE_FACTOR: usize = 2;

/// One child slot. Each slot independently holds one of the four
/// structural variants, or nothing. This is the safe rendering of the
/// original 3-bit-tag/48-bit-pointer word: every payload is a single
/// owning pointer.
#[derive(Debug, Default)]
pub(crate) enum Item {
    #[default]
    Null,
    /// A single key-value entry.
    Single(Box<Kv>),
    /// A compact leaf of up to 16 hash-tagged entries.
    Compact(Box<CNode>),
    /// A model-based inner node.
    Model(Box<MNode>),
    /// A fallback trie subtree.
    Trie(Box<Trie>),
}

impl Item {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Item::Null)
    }

    /// Consume the subtree, pushing every record into `out` in key order.
    pub fn extract_into(self, out: &mut Vec<Box<Kv>>) {
        match self {
            Item::Null => {}
            Item::Single(kv) => out.push(kv),
            Item::Compact(cnode) => cnode.extract_into(out),
            Item::Model(node) => {
                let MNode { items, .. } = *node;
                for item in items.into_vec() {
                    item.extract_into(out);
                }
            }
            Item::Trie(mut trie) => trie.extract_into(out),
        }
    }

    /// Visit every reachable record in key order without consuming.
    pub fn for_each_kv<'a>(&'a self, f: &mut impl FnMut(&'a Kv)) {
        match self {
            Item::Null => {}
            Item::Single(kv) => f(kv),
            Item::Compact(cnode) => {
                for i in 0..cnode.len() {
                    f(cnode.entry(i));
                }
            }
            Item::Model(node) => {
                for item in node.items.iter() {
                    item.for_each_kv(f);
                }
            }
            Item::Trie(trie) => {
                let mut it = trie.begin();
                while let Some(kv) = it.current() {
                    f(kv);
                    it.advance();
                }
            }
        }
    }

    /// Count item variants across the subtree.
    pub fn census_into(&self, census: &mut Census) {
        match self {
            Item::Null => {}
            Item::Single(_) => census.singles += 1,
            Item::Compact(_) => census.compact_nodes += 1,
            Item::Model(node) => {
                census.model_nodes += 1;
                for item in node.items.iter() {
                    item.census_into(census);
                }
            }
            Item::Trie(trie) => {
                census.tries += 1;
                census.trie_keys += trie.len();
            }
        }
    }
}

/// Structural counts of a subtree, mostly for introspection and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Census {
    /// Single-entry slots.
    pub singles: usize,
    /// Compact leaf nodes.
    pub compact_nodes: usize,
    /// Model-based inner nodes.
    pub model_nodes: usize,
    /// Fallback trie subtrees.
    pub tries: usize,
    /// Keys stored inside fallback tries.
    pub trie_keys: usize,
}

/// Model-based inner node: a linear model over the learned CDF plus a
/// sparse item array indexed by predicted position.
///
/// Slots 0 and `len - 1` are boundary sentinels, never populated by
/// build; the prefix comparison routes keys outside the node's key range
/// to them, so the model clamp into `[1, len - 2]` is always safe.
#[derive(Debug)]
pub(crate) struct MNode {
    /// Reachable records below this node; maintained by mutations.
    pub key_count: usize,
    slope: f64,
    intercept: f64,
    /// Incremental common prefix: the bytes all keys below share past the
    /// ancestors' confirmed prefix.
    prefix: Box<[u8]>,
    pub items: Box<[Item]>,
}

impl MNode {
    /// The count walk rebuilds this node once it drifts out of the
    /// density window `(len/4, 2*len)`.
    #[inline]
    pub fn needs_rebuild(&self) -> bool {
        self.key_count >= 2 * self.items.len() || 4 * self.key_count <= self.items.len()
    }

    /// Slot for `key`, advancing `ccpl` over the node's prefix.
    ///
    /// A key ordered below every stored key routes to sentinel slot 0,
    /// above every stored key to the last slot; both hold `Null` unless a
    /// later insert claimed them.
    pub fn predict_slot(&self, key: &[u8], ccpl: &mut usize, hpt: &Hpt) -> usize {
        let n = self.items.len();

        if !self.prefix.is_empty() {
            match cmp_prefix(&self.prefix, key, *ccpl) {
                // Stored prefix sorts below the key: past the whole range.
                Ordering::Less => return n - 1,
                Ordering::Greater => return 0,
                Ordering::Equal => {}
            }
        }
        *ccpl += self.prefix.len();

        let size = n - 2;
        let raw = if *ccpl > 0 {
            hpt.predict(key, size, *ccpl, self.slope, self.intercept)
        } else {
            hpt.predict_from_start(key, size, self.slope, self.intercept)
        };
        (raw + 1).clamp(1, size as i64) as usize
    }
}

/// Attempt to build a model node over the sorted batch range `[l, r)`.
///
/// Fails (returning `None`, consuming nothing) when the trained model
/// cannot express the group: a degenerate CDF range, the first and last
/// key colliding on one slot, or a non-monotone prediction sweep.
fn try_build_model_node(
    batch: &mut BuildBatch,
    l: usize,
    r: usize,
    ccpl: usize,
    hpt: &Hpt,
    pmss: &Pmss,
) -> Option<Box<MNode>> {
    let size = r - l;
    let n = size * SCALE_FACTOR;

    let gcpl = common_prefix_len(batch.key(l), batch.key(r - 1));
    debug_assert!(gcpl >= ccpl, "group must share the confirmed prefix");

    let min = hpt.cdf(batch.key(l), gcpl);
    let max = hpt.cdf(batch.key(r - 1), gcpl);
    if max <= min {
        return None;
    }

    let mut node = Box::new(MNode {
        key_count: size,
        slope: 1.0 / (max - min),
        intercept: min / (min - max),
        prefix: batch.key(l)[ccpl..gcpl].into(),
        items: std::iter::repeat_with(Item::default).take(n).collect(),
    });

    // The model must separate at least the group's boundary keys.
    let (mut c_first, mut c_last) = (ccpl, ccpl);
    let first = node.predict_slot(batch.key(l), &mut c_first, hpt);
    let last = node.predict_slot(batch.key(r - 1), &mut c_last, hpt);
    if first >= last {
        return None;
    }

    // Sweep the group in order; contiguous keys predicted onto the same
    // slot form one child group. Nothing is consumed until the whole
    // sweep has proven monotone.
    let mut runs: Vec<(usize, usize, usize)> = Vec::new();
    let mut cur: Option<(usize, usize)> = None;
    for i in l..r {
        let mut c = ccpl;
        let slot = node.predict_slot(batch.key(i), &mut c, hpt);
        match cur {
            Some((s, _)) if slot == s => {}
            Some((s, start)) => {
                if slot < s {
                    return None;
                }
                runs.push((s, start, i));
                cur = Some((slot, i));
            }
            None => cur = Some((slot, i)),
        }
    }
    let (s, start) = cur.expect("non-empty group");
    runs.push((s, start, r));

    for (slot, run_l, run_r) in runs {
        node.items[slot] = pmss_bulk(batch, run_l, run_r, gcpl, hpt, pmss);
    }

    Some(node)
}

/// Build the item for the sorted batch range `[l, r)` under `ccpl`:
/// singletons become single entries, small groups compact leaves, and
/// larger groups a model node or a trie per the structural chooser, with
/// an unconditional trie fallback when the model build fails.
pub(crate) fn pmss_bulk(
    batch: &mut BuildBatch,
    l: usize,
    r: usize,
    ccpl: usize,
    hpt: &Hpt,
    pmss: &Pmss,
) -> Item {
    let size = r - l;
    debug_assert!(size >= 1);

    if size == 1 {
        return Item::Single(batch.take(l));
    }
    if size <= CNODE_CAPACITY {
        return Item::Compact(CNode::build(batch, l, r, ccpl));
    }

    if pmss.choose(size, group_partial_key_len(batch, l, r)) == Structure::Items {
        if let Some(node) = try_build_model_node(batch, l, r, ccpl, hpt, pmss) {
            return Item::Model(node);
        }
        debug_log!("model build failed for group of {size} keys, using trie");
    }

    Item::Trie(Trie::bulk_load(batch, l, r))
}

/// Walk the subtree asserting the structural invariants: model-node
/// prefixes cover every reachable key, key counts match reachable
/// records, and no node sits outside its density window.
#[cfg(test)]
pub(crate) fn check_invariants(item: &Item, ccpl: usize) -> usize {
    match item {
        Item::Null => 0,
        Item::Single(_) => 1,
        Item::Compact(cnode) => {
            for i in 1..cnode.len() {
                assert_eq!(
                    cnode.entry(i - 1).keycmp(cnode.entry(i).key(), cnode.ccpl),
                    Ordering::Greater,
                    "compact node entries out of order"
                );
            }
            cnode.len()
        }
        Item::Model(node) => {
            assert!(!node.needs_rebuild(), "model node outside density window");
            let mut reachable = 0usize;
            for it in node.items.iter() {
                it.for_each_kv(&mut |kv| {
                    assert_eq!(
                        cmp_prefix(&node.prefix, kv.key(), ccpl),
                        Ordering::Equal,
                        "stored key misses the node prefix"
                    );
                });
                reachable += check_invariants(it, ccpl + node.prefix.len());
            }
            assert_eq!(reachable, node.key_count, "key count drifted");
            reachable
        }
        Item::Trie(trie) => trie.len(),
    }
}
