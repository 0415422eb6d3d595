//! Demo driver: load a key file (or a generated workload), bulk-load the
//! index, and time each operation phase.
//!
//! ```bash
//! cargo run --release --example wordbench -- --kind idcards --count 2000000
//! cargo run --release --example wordbench -- --path words.txt
//! ```

use std::fs;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use lits::keygen::{self, KeyKind};
use lits::Lits;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Idcards,
    Randstr,
}

#[derive(Parser, Debug)]
#[command(name = "wordbench")]
#[command(about = "Bulk-load a key file and measure index operation throughput")]
struct Args {
    /// Path to an input file (one key per line, sorted not required).
    /// When absent, a generated dataset is used and cached on disk.
    #[arg(short, long)]
    path: Option<String>,

    /// Generated workload family (used when --path is absent).
    #[arg(short, long, value_enum, default_value_t = Kind::Idcards)]
    kind: Kind,

    /// Number of generated keys.
    #[arg(short, long, default_value_t = 2_000_000)]
    count: usize,

    /// Number of point operations per mutation phase.
    #[arg(short, long, default_value_t = 100_000)]
    ops: usize,

    /// Scan length per seek in the scan phase.
    #[arg(long, default_value_t = 100)]
    scan_range: usize,
}

fn load_keys(args: &Args) -> Vec<String> {
    let mut keys = match &args.path {
        Some(path) => {
            let data = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("cannot read {path}: {e}");
                std::process::exit(1);
            });
            data.lines().map(str::to_owned).collect::<Vec<_>>()
        }
        None => {
            let (kind, cache) = match args.kind {
                Kind::Idcards => (KeyKind::IdCards, "idcards.txt"),
                Kind::Randstr => (KeyKind::RandStr, "randstr.txt"),
            };
            println!("Loading {} {:?} keys (cache: {cache}) ...", args.count, kind);
            keygen::load_or_generate(cache, args.count, kind, 42).unwrap_or_else(|e| {
                eprintln!("cannot prepare dataset: {e}");
                std::process::exit(1);
            })
        }
    };

    keys.sort();
    keys.dedup();
    keys
}

fn mops(ops: usize, secs: f64) -> f64 {
    ops as f64 / secs / 1e6
}

fn main() {
    let args = Args::parse();
    let keys = load_keys(&args);
    let n = keys.len();
    println!("{n} unique keys");

    // Every other key goes into the bulk batch; the rest feed the
    // insert/upsert phases.
    let bulk: Vec<&[u8]> = keys.iter().step_by(2).map(|k| k.as_bytes()).collect();
    let held_out: Vec<&[u8]> = keys
        .iter()
        .skip(1)
        .step_by(2)
        .take(args.ops)
        .map(|k| k.as_bytes())
        .collect();
    let values: Vec<u64> = (1..=bulk.len() as u64).collect();

    let mut index = Lits::new();

    let t = Instant::now();
    index.bulkload(&bulk, &values).expect("sorted unique batch");
    let secs = t.elapsed().as_secs_f64();
    println!(
        "bulkload: {} keys in {secs:.3}s ({:.2} Mops/s)",
        bulk.len(),
        mops(bulk.len(), secs)
    );

    let probes: Vec<&[u8]> = bulk.iter().copied().take(args.ops).collect();
    let t = Instant::now();
    let mut hits = 0usize;
    for key in &probes {
        if index.lookup(key).is_some() {
            hits += 1;
        }
    }
    let secs = t.elapsed().as_secs_f64();
    println!(
        "lookup: {hits}/{} hits in {secs:.3}s ({:.2} Mops/s)",
        probes.len(),
        mops(probes.len(), secs)
    );

    let t = Instant::now();
    let mut fresh = 0usize;
    for (i, key) in held_out.iter().enumerate() {
        if index.insert(key, i as u64 + 1) {
            fresh += 1;
        }
    }
    let secs = t.elapsed().as_secs_f64();
    println!(
        "insert: {fresh}/{} fresh in {secs:.3}s ({:.2} Mops/s)",
        held_out.len(),
        mops(held_out.len(), secs)
    );

    let t = Instant::now();
    for (i, key) in held_out.iter().enumerate() {
        index.upsert(key, i as u64 + 7);
    }
    let secs = t.elapsed().as_secs_f64();
    println!(
        "upsert: {} keys in {secs:.3}s ({:.2} Mops/s)",
        held_out.len(),
        mops(held_out.len(), secs)
    );

    let seeks = args.ops / args.scan_range.max(1);
    let t = Instant::now();
    let mut scanned = 0usize;
    for key in probes.iter().take(seeks) {
        let mut it = index.find(key);
        let mut steps = 0usize;
        while it.not_finish() && steps < args.scan_range {
            if it.get_kv().is_some() {
                scanned += 1;
            }
            it.next();
            steps += 1;
        }
    }
    let secs = t.elapsed().as_secs_f64();
    println!(
        "scan: {scanned} entries over {seeks} seeks in {secs:.3}s ({:.2} Mops/s)",
        mops(scanned, secs)
    );

    let t = Instant::now();
    let mut removed = 0usize;
    for key in &held_out {
        if index.remove(key) {
            removed += 1;
        }
    }
    let secs = t.elapsed().as_secs_f64();
    println!(
        "remove: {removed}/{} in {secs:.3}s ({:.2} Mops/s)",
        held_out.len(),
        mops(held_out.len(), secs)
    );

    let stats = index.stats();
    println!(
        "final: {} keys | {} model nodes, {} compact, {} singles, {} tries ({} trie keys) | model {} KiB",
        stats.keys,
        stats.census.model_nodes,
        stats.census.compact_nodes,
        stats.census.singles,
        stats.census.tries,
        stats.census.trie_keys,
        stats.model_bytes / 1024
    );

    // Spot-check correctness before exiting.
    let mut it = index.begin();
    let mut last: Option<Vec<u8>> = None;
    let mut count = 0usize;
    while it.not_finish() {
        let kv = it.get_kv().expect("cursor on a record");
        if let Some(prev) = &last {
            assert!(prev.as_slice() < kv.key(), "iteration out of order");
        }
        last = Some(kv.key().to_vec());
        count += 1;
        it.next();
    }
    assert_eq!(count, index.len(), "iteration missed keys");
    println!("verified: full scan of {count} keys in order");
}
