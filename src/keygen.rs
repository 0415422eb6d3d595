//! Workload generators and a file-backed dataset cache for demos and
//! benchmarks.
//!
//! Two key families: 18-digit identity-card style numbers (structured
//! fields with heavy shared prefixes) and fixed-length random lowercase
//! strings. Both come out sorted and unique, ready for bulk loading.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Which key family to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    /// 18-digit identity-card style numbers.
    IdCards,
    /// Fixed-length random lowercase strings.
    RandStr,
}

/// Length of the random-string keys.
pub const RAND_STR_LEN: usize = 20;

const PROVINCE_CODES: [u32; 34] = [
    11, 12, 13, 14, 15, 21, 22, 23, 31, 32, 33, 34, 35, 36, 37, 41, 42, 43, 44, 45, 46, 50, 51,
    52, 53, 54, 61, 62, 63, 64, 65, 71, 81, 82,
];

/// One identity-card style key: province, city, county, birth date,
/// police station, gender, and check digits.
pub fn id_card(rng: &mut StdRng) -> String {
    let province = PROVINCE_CODES[rng.gen_range(0..PROVINCE_CODES.len())];
    let city = rng.gen_range(0..80u32);
    let county = rng.gen_range(0..70u32);
    let year = rng.gen_range(1949..2024u32);
    let month = rng.gen_range(1..=12u32);
    let day = match month {
        4 | 6 | 9 | 11 => rng.gen_range(1..=30u32),
        2 => rng.gen_range(1..=28u32),
        _ => rng.gen_range(1..=31u32),
    };
    let police = rng.gen_range(0..100u32);
    let gender = rng.gen_range(0..10u32);
    let check = rng.gen_range(0..10u32);
    format!("{province}{city:02}{county:02}{year}{month:02}{day:02}{police:02}{gender}{check}")
}

/// One random lowercase string of [`RAND_STR_LEN`] bytes.
pub fn rand_str(rng: &mut StdRng) -> String {
    (0..RAND_STR_LEN)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

/// Generate `count` unique keys of the given kind, sorted ascending.
pub fn generate_keys(count: usize, kind: KeyKind, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut set = BTreeSet::new();
    while set.len() < count {
        let key = match kind {
            KeyKind::IdCards => id_card(&mut rng),
            KeyKind::RandStr => rand_str(&mut rng),
        };
        set.insert(key);
    }
    set.into_iter().collect()
}

/// Load a cached dataset from `path`, or generate it and write the cache.
/// The cache holds one key per line, sorted.
pub fn load_or_generate(
    path: impl AsRef<Path>,
    count: usize,
    kind: KeyKind,
    seed: u64,
) -> io::Result<Vec<String>> {
    let path = path.as_ref();
    if path.exists() {
        let data = fs::read_to_string(path)?;
        return Ok(data.lines().map(str::to_owned).collect());
    }

    let keys = generate_keys(count, kind, seed);
    let mut file = fs::File::create(path)?;
    for key in &keys {
        writeln!(file, "{key}")?;
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_card_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let id = id_card(&mut rng);
            assert_eq!(id.len(), 18);
            assert!(id.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generated_keys_sorted_unique() {
        let keys = generate_keys(2000, KeyKind::IdCards, 3);
        assert_eq!(keys.len(), 2000);
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1]);
        }

        let keys = generate_keys(500, KeyKind::RandStr, 3);
        assert!(keys.iter().all(|k| k.len() == RAND_STR_LEN));
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(
            generate_keys(100, KeyKind::RandStr, 9),
            generate_keys(100, KeyKind::RandStr, 9)
        );
    }
}
