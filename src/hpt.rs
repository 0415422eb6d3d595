//! Hash-enhanced Prefix Table: the learned string-to-CDF model.
//!
//! The table models, for each (position bucket, previous-byte bucket,
//! current byte) triple, the cumulative distribution of byte values seen
//! in the training corpus. Folding a key through the table yields a
//! pseudo-CDF in `[0, 1)`, and model nodes rescale that CDF into a slot
//! position with a per-node linear model.
//!
//! The table is trained once over the bulk batch and immutable afterwards;
//! a trained table can be cloned and reused across index instances.

use crate::bytestr::{byte_at, common_prefix_len, dist_prefix_len, dist_prefix_len3};
use crate::kv::BuildBatch;

/// Supported alphabet size: byte values `0..128`.
pub(crate) const MAX_CH: usize = 128;

/// Position buckets (positions are hashed by `pos & 31`).
const PS_SIZE: usize = 32;
/// Previous-byte buckets (hashed by `byte & 31`).
const FC_SIZE: usize = 32;

const PS_MASK: usize = PS_SIZE - 1;
const FC_MASK: usize = FC_SIZE - 1;

/// Per-key weight attenuation: byte `d` past the batch common prefix
/// counts with weight `0.5^d`.
const ATTENUATION: f64 = 0.5;

/// Depth horizon of the attenuation schedule; deeper bytes weigh nothing.
const WEIGHT_DEPTH: usize = 256;

/// The raw-CDF fold stops once the running probability factor underflows.
const MIN_FACTOR: f64 = 1.0 / (1u64 << 52) as f64;

/// One table cell: exclusive cumulative mass below the byte, and the
/// byte's own probability within its line.
#[derive(Clone, Copy, Default)]
struct Uni {
    cdf: f64,
    pro: f64,
}

/// The trained prefix table. Roughly 2 MiB of `f64` cells; heap-allocated
/// and cheap to move.
#[derive(Clone)]
pub struct Hpt {
    cells: Box<[Uni]>,
}

#[inline]
fn cell_index(pos: usize, prev: u8, ch: u8) -> usize {
    ((pos & PS_MASK) << 12) | ((usize::from(prev) & FC_MASK) << 7) | (usize::from(ch) & (MAX_CH - 1))
}

impl Hpt {
    fn zeroed() -> Hpt {
        Hpt {
            cells: vec![Uni::default(); PS_SIZE * FC_SIZE * MAX_CH].into_boxed_slice(),
        }
    }

    /// Train a table over a sorted-unique key sequence.
    ///
    /// Fewer than two keys leave the table empty (every fold returns 0).
    pub fn train(keys: &[&[u8]]) -> Hpt {
        Hpt::train_impl(keys.len(), |i| keys[i])
    }

    pub(crate) fn train_batch(batch: &BuildBatch) -> Hpt {
        Hpt::train_impl(batch.len(), |i| batch.key(i))
    }

    fn train_impl<'a>(n: usize, key: impl Fn(usize) -> &'a [u8]) -> Hpt {
        let mut hpt = Hpt::zeroed();
        if n < 2 {
            return hpt;
        }

        let gcpl = common_prefix_len(key(0), key(n - 1));

        let mut weight = [0.0f64; WEIGHT_DEPTH];
        weight[0] = 1.0;
        for d in 1..WEIGHT_DEPTH {
            weight[d] = weight[d - 1] * ATTENUATION;
        }

        // Count byte occurrences, but only within each key's distinguishing
        // prefix: bytes past the point where a key separates from both
        // neighbors carry no ordering information.
        for i in 0..n {
            let k = key(i);
            let max_len = if i == 0 {
                dist_prefix_len(key(0), key(1))
            } else if i == n - 1 {
                dist_prefix_len(key(n - 2), key(n - 1))
            } else {
                dist_prefix_len3(key(i - 1), k, key(i + 1))
            };

            for b in gcpl..k.len().min(max_len) {
                let ch = k[b];
                let prev = if b == 0 { 0 } else { k[b - 1] };
                let w = weight[(b - gcpl).min(WEIGHT_DEPTH - 1)];
                hpt.cells[cell_index(b, prev, ch)].cdf += w;
            }
        }

        // Normalize each (position, previous-byte) line into per-byte
        // probabilities, then convert to an exclusive cumulative sum.
        for ps in 0..PS_SIZE {
            for fc in 0..FC_SIZE {
                let base = (ps << 12) | (fc << 7);
                let line = &mut hpt.cells[base..base + MAX_CH];

                let total: f64 = line.iter().map(|u| u.cdf).sum();
                if total <= 0.0 {
                    continue;
                }
                let mut below = 0.0;
                for u in line.iter_mut() {
                    let p = u.cdf / total;
                    u.pro = p;
                    u.cdf = below;
                    below += p;
                }
            }
        }

        hpt
    }

    /// Predicted slot for `key` in a model node whose descent has already
    /// confirmed `from >= 1` bytes, under the node's linear model.
    ///
    /// Folds `size*b + sum(size*k * prod(pro) * cdf)` over the key bytes
    /// until the key ends or the running factor drops below one slot.
    pub(crate) fn predict(&self, key: &[u8], size: usize, from: usize, k: f64, b: f64) -> i64 {
        debug_assert!(from >= 1);
        let mut factor = size as f64 * k;
        let mut pos = size as f64 * b;

        let mut i = from;
        loop {
            let ch = byte_at(key, i);
            if ch == 0 || factor < 1.0 {
                break;
            }
            let u = &self.cells[cell_index(i, byte_at(key, i - 1), ch)];
            pos += factor * u.cdf;
            factor *= u.pro;
            i += 1;
        }

        pos as i64
    }

    /// [`predict`] for a descent that has confirmed no bytes yet: the
    /// first byte is read against the zeroed previous-byte bucket.
    pub(crate) fn predict_from_start(&self, key: &[u8], size: usize, k: f64, b: f64) -> i64 {
        let mut factor = size as f64 * k;
        let mut pos = size as f64 * b;

        let u = &self.cells[cell_index(0, 0, byte_at(key, 0))];
        pos += factor * u.cdf;
        factor *= u.pro;

        let mut i = 1;
        loop {
            let ch = byte_at(key, i);
            if ch == 0 || factor < 1.0 {
                break;
            }
            let u = &self.cells[cell_index(i, byte_at(key, i - 1), ch)];
            pos += factor * u.cdf;
            factor *= u.pro;
            i += 1;
        }

        pos as i64
    }

    /// Raw pseudo-CDF of `key` starting at byte `from`, unscaled by any
    /// node model. Used to derive a node's slope and intercept from its
    /// first and last key.
    pub(crate) fn cdf(&self, key: &[u8], from: usize) -> f64 {
        let mut factor = 1.0f64;
        let mut cdf = 0.0f64;

        let mut i = from;
        loop {
            let ch = byte_at(key, i);
            if ch == 0 || factor < MIN_FACTOR {
                break;
            }
            let prev = if i == 0 { 0 } else { byte_at(key, i - 1) };
            let u = &self.cells[cell_index(i, prev, ch)];
            cdf += factor * u.cdf;
            factor *= u.pro;
            i += 1;
        }

        cdf
    }

    /// Heap footprint of the table in bytes.
    pub fn size_bytes(&self) -> usize {
        self.cells.len() * std::mem::size_of::<Uni>()
    }
}
