//! Forward DFS iterator over the mixed-variant tree.
//!
//! The cursor is always positioned on a single record. Its state is a
//! bounded stack of model-node frames down to the current leaf, plus one
//! active leaf cursor: a single entry, a compact-node index, or a trie
//! iterator. Advancing exhausts the leaf cursor first, then scans the
//! enclosing frames upward for the next non-empty slot.

use crate::cnode::CNode;
use crate::kv::Kv;
use crate::node::{Item, MAX_DEPTH};
use crate::trie::TrieIter;

struct Frame<'a> {
    items: &'a [Item],
    idx: usize,
}

enum Leaf<'a> {
    None,
    Single(&'a Kv),
    Compact { cnode: &'a CNode, idx: usize },
    Trie(TrieIter<'a>),
}

/// A cursor over the index, produced by `find` (exact-start scan) or
/// `begin` (leftmost). While a cursor is live the index cannot be
/// mutated.
pub struct LitsIter<'a> {
    valid: bool,
    ended: bool,
    frames: Vec<Frame<'a>>,
    leaf: Leaf<'a>,
}

impl<'a> LitsIter<'a> {
    pub(crate) fn new() -> LitsIter<'a> {
        LitsIter {
            valid: true,
            ended: false,
            frames: Vec::new(),
            leaf: Leaf::None,
        }
    }

    /// Whether the cursor was successfully positioned. `find` on an
    /// absent key yields an invalid cursor.
    #[inline]
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Whether the cursor is positioned and has not yet walked off the
    /// end. Always false for an invalid cursor.
    #[inline]
    pub fn not_finish(&self) -> bool {
        self.valid && !self.ended
    }

    /// The record under the cursor, if any.
    pub fn get_kv(&self) -> Option<&'a Kv> {
        if !self.valid || self.ended {
            return None;
        }
        match &self.leaf {
            Leaf::None => None,
            Leaf::Single(kv) => Some(kv),
            Leaf::Compact { cnode, idx } => Some(cnode.entry(*idx)),
            Leaf::Trie(it) => it.current(),
        }
    }

    /// Value of the record under the cursor, if any.
    #[inline]
    pub fn read(&self) -> Option<u64> {
        self.get_kv().map(Kv::read)
    }

    /// Advance to the next record in ascending key order.
    pub fn next(&mut self) {
        if !self.valid || self.ended {
            return;
        }
        match &mut self.leaf {
            Leaf::Trie(it) => {
                it.advance();
                if it.current().is_some() {
                    return;
                }
                self.advance_frames();
            }
            Leaf::Compact { cnode, idx } => {
                if *idx + 1 < cnode.len() {
                    *idx += 1;
                    return;
                }
                self.advance_frames();
            }
            Leaf::Single(_) | Leaf::None => self.advance_frames(),
        }
    }

    /// Scan the frame stack upward for the next non-empty slot and enter
    /// its leftmost record; marks the cursor ended when none remains.
    fn advance_frames(&mut self) {
        loop {
            let (items, idx) = match self.frames.last_mut() {
                None => {
                    self.ended = true;
                    self.leaf = Leaf::None;
                    return;
                }
                Some(frame) => {
                    frame.idx += 1;
                    while frame.idx < frame.items.len() && frame.items[frame.idx].is_null() {
                        frame.idx += 1;
                    }
                    (frame.items, frame.idx)
                }
            };
            if idx >= items.len() {
                self.frames.pop();
                continue;
            }
            if self.enter(&items[idx]) {
                return;
            }
            // Only an emptied trie subtree refuses entry; keep scanning.
        }
    }

    /// Position the cursor on the leftmost record of `item`, pushing
    /// frames for traversed model nodes. False when the subtree holds no
    /// record (a trie drained by removals).
    pub(crate) fn enter(&mut self, item: &'a Item) -> bool {
        match item {
            Item::Null => false,
            Item::Single(kv) => {
                self.leaf = Leaf::Single(kv);
                true
            }
            Item::Compact(cnode) => {
                self.leaf = Leaf::Compact { cnode, idx: 0 };
                true
            }
            Item::Trie(trie) => {
                let it = trie.begin();
                if it.current().is_some() {
                    self.leaf = Leaf::Trie(it);
                    true
                } else {
                    false
                }
            }
            Item::Model(node) => {
                assert!(self.frames.len() < MAX_DEPTH, "iterator depth exceeded");
                let items: &'a [Item] = &node.items;
                for (i, child) in items.iter().enumerate() {
                    if child.is_null() {
                        continue;
                    }
                    self.frames.push(Frame { items, idx: i });
                    if self.enter(child) {
                        return true;
                    }
                    self.frames.pop();
                }
                false
            }
        }
    }

    /// Leftmost positioning from the root; an empty tree ends the cursor.
    pub(crate) fn init_first(&mut self, root: &'a Item) {
        if !self.enter(root) {
            self.ended = true;
        }
    }

    pub(crate) fn set_invalid(&mut self) {
        self.valid = false;
    }

    /// Record a traversed model-node frame during an exact-key descent.
    pub(crate) fn push_frame(&mut self, items: &'a [Item], idx: usize) {
        assert!(self.frames.len() < MAX_DEPTH, "iterator depth exceeded");
        self.frames.push(Frame { items, idx });
    }

    pub(crate) fn set_single(&mut self, kv: &'a Kv) {
        self.leaf = Leaf::Single(kv);
    }

    pub(crate) fn set_compact(&mut self, cnode: &'a CNode, idx: usize) {
        self.leaf = Leaf::Compact { cnode, idx };
    }

    pub(crate) fn set_trie(&mut self, it: TrieIter<'a>) {
        self.leaf = Leaf::Trie(it);
    }
}
